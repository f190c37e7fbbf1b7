use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sqljudge",
    version,
    about = "Grade SQL submissions against problem fixtures in isolated in-memory databases"
)]
pub struct Cli {
    /// Wall-clock budget for one sandboxed execution
    #[arg(long, global = true, env = "SQLJUDGE_DEADLINE_MS", default_value_t = 3000)]
    pub deadline_ms: u64,

    /// Row cap for `run` previews
    #[arg(long, global = true, env = "SQLJUDGE_MAX_ROWS", default_value_t = 1000)]
    pub max_rows: usize,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ungraded preview of one statement against the fixture's setup
    Run(RunArgs),
    /// Grade a submission against every test case
    Submit(SubmitArgs),
    /// Policy gate only
    Check(CheckArgs),
    Validate(ValidateArgs),
    /// Fill expectations by running the fixture's referenceSQL
    Record(RecordArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SqlInput {
    /// SQL text
    #[arg(long, conflicts_with = "sql_file", required_unless_present = "sql_file")]
    pub sql: Option<String>,

    /// File holding the SQL text
    #[arg(long)]
    pub sql_file: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long)]
    pub fixture: PathBuf,

    #[command(flatten)]
    pub input: SqlInput,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SubmitArgs {
    #[arg(long)]
    pub fixture: PathBuf,

    #[command(flatten)]
    pub input: SqlInput,

    #[arg(long, default_value = "text")]
    pub format: String, // text|json

    /// Also write a JUnit report
    #[arg(long)]
    pub junit: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
    /// read | write
    #[arg(long, default_value = "read")]
    pub mode: String,

    #[command(flatten)]
    pub input: SqlInput,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long)]
    pub fixture: PathBuf,

    /// Fail on unknown fixture fields
    #[arg(long, default_value = "false")]
    pub strict: bool,

    #[arg(long, default_value = "text")]
    pub format: String, // text|json
}

#[derive(clap::Args, Debug, Clone)]
pub struct RecordArgs {
    #[arg(long)]
    pub fixture: PathBuf,

    /// Output path; may be the input fixture itself
    #[arg(long)]
    pub out: PathBuf,
}
