use super::args::*;
use anyhow::Context;
use sqljudge_core::config::{load_fixture, write_fixture, JudgeSettings};
use sqljudge_core::errors::ServiceError;
use sqljudge_core::judge::expectations::record_expectations;
use sqljudge_core::judge::Judge;
use sqljudge_core::model::{ProblemFixture, VerdictStatus};
use sqljudge_core::policy;
use sqljudge_core::report::{console, junit};
use sqljudge_core::sandbox::Sandbox;
use sqljudge_core::service::{InMemoryFixtures, JudgeService};
use std::sync::Arc;

pub mod validate;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const TEST_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const POLICY_REJECTED: i32 = 3;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let settings = JudgeSettings {
        deadline_ms: cli.deadline_ms,
        max_rows: cli.max_rows,
    };
    match cli.cmd {
        Command::Run(args) => cmd_run(args, settings).await,
        Command::Submit(args) => cmd_submit(args, settings).await,
        Command::Check(args) => cmd_check(args),
        Command::Validate(args) => validate::run(args, settings),
        Command::Record(args) => cmd_record(args, settings),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

pub(crate) fn judge_for(settings: JudgeSettings) -> Judge {
    Judge::new(Sandbox::new(settings.sandbox_limits()))
}

fn read_sql(input: &SqlInput) -> anyhow::Result<String> {
    match (&input.sql, &input.sql_file) {
        (Some(sql), _) => Ok(sql.clone()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read SQL file {}", path.display())),
        (None, None) => anyhow::bail!("either --sql or --sql-file is required"),
    }
}

fn service_for(fixture: &ProblemFixture, settings: JudgeSettings) -> JudgeService {
    JudgeService::new(
        Arc::new(InMemoryFixtures::single(fixture.clone())),
        judge_for(settings),
    )
}

fn report_policy(e: &ServiceError) -> Option<i32> {
    if let ServiceError::Policy(v) = e {
        eprintln!("❌ {} ({})", v, v.detail());
        return Some(exit_codes::POLICY_REJECTED);
    }
    None
}

async fn cmd_run(args: RunArgs, settings: JudgeSettings) -> anyhow::Result<i32> {
    let fixture = load_fixture(&args.fixture, false)
        .with_context(|| format!("failed to load fixture {}", args.fixture.display()))?;
    let sql = read_sql(&args.input)?;

    let res = match service_for(&fixture, settings)
        .run_submission(&fixture.key, &sql)
        .await
    {
        Ok(res) => res,
        Err(e) => {
            if let Some(code) = report_policy(&e) {
                return Ok(code);
            }
            eprintln!("error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    println!("{}", serde_json::to_string_pretty(&res)?);
    Ok(if res.success {
        exit_codes::OK
    } else {
        exit_codes::TEST_FAILED
    })
}

async fn cmd_submit(args: SubmitArgs, settings: JudgeSettings) -> anyhow::Result<i32> {
    let fixture = load_fixture(&args.fixture, false)
        .with_context(|| format!("failed to load fixture {}", args.fixture.display()))?;
    let sql = read_sql(&args.input)?;

    let verdict = match service_for(&fixture, settings)
        .submit_solution(&fixture.key, &sql)
        .await
    {
        Ok(v) => v,
        Err(e) => {
            if let Some(code) = report_policy(&e) {
                return Ok(code);
            }
            return Err(e.into());
        }
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        console::print_verdict(&fixture.key, &verdict);
    }

    if let Some(out) = &args.junit {
        junit::write_junit(&fixture.key, &verdict, out)
            .with_context(|| format!("failed to write JUnit report {}", out.display()))?;
    }

    Ok(match verdict.status {
        VerdictStatus::Passed => exit_codes::OK,
        VerdictStatus::Failed => exit_codes::TEST_FAILED,
        VerdictStatus::Error => exit_codes::CONFIG_ERROR,
    })
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<i32> {
    let sql = read_sql(&args.input)?;
    match policy::check_str(&sql, &args.mode) {
        Ok(()) => {
            println!("{}", serde_json::json!({ "allowed": true }));
            Ok(exit_codes::OK)
        }
        Err(v) => {
            println!(
                "{}",
                serde_json::json!({
                    "allowed": false,
                    "reason": v.reason.reason_code(),
                    "message": v.message,
                    "detail": v.detail(),
                })
            );
            Ok(exit_codes::POLICY_REJECTED)
        }
    }
}

fn cmd_record(args: RecordArgs, settings: JudgeSettings) -> anyhow::Result<i32> {
    let fixture = load_fixture(&args.fixture, false)
        .with_context(|| format!("failed to load fixture {}", args.fixture.display()))?;
    let recorded = match record_expectations(&judge_for(settings), &fixture) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("record failed: {:#}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    write_fixture(&args.out, &recorded)
        .with_context(|| format!("failed to write fixture {}", args.out.display()))?;
    eprintln!(
        "recorded {} case(s) into {}",
        recorded.test_cases.len(),
        args.out.display()
    );
    Ok(exit_codes::OK)
}
