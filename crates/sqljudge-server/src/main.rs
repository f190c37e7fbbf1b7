use anyhow::Result;
use clap::Parser;
use sqljudge_server::config::ServerConfig;
use sqljudge_server::server::Server;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding `<key>.yaml` problem fixtures
    #[arg(long, default_value = "problems")]
    fixture_root: PathBuf,
}

/// Builds the filter from `SQLJUDGE_LOG`, then `RUST_LOG`, then `info`.
///
/// Returns the rejected directive, if any, so it can be reported once the
/// subscriber is installed.
fn log_filter(configured: &str) -> (EnvFilter, Option<String>) {
    match EnvFilter::try_new(configured) {
        Ok(filter) => (filter, None),
        Err(_) => {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            (filter, Some(configured.to_string()))
        }
    }
}

fn init_logging(cfg: &ServerConfig) {
    let (filter, rejected) = log_filter(&cfg.log_level);

    // stdout carries JSON-RPC only
    fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(directive) = rejected {
        tracing::warn!(event = "log_filter_invalid", directive = %directive);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = ServerConfig::from_env();
    init_logging(&cfg);

    tracing::info!(
        event = "server_start",
        fixture_root = ?args.fixture_root,
        deadline_ms = cfg.deadline_ms,
        timeout_ms = cfg.timeout_ms,
        max_rows = cfg.max_rows,
        cache_entries = cfg.cache_entries
    );

    Server::run(args.fixture_root, cfg).await
}
