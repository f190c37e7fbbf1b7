use sqljudge_core::config::{load_fixture, JudgeSettings};
use sqljudge_core::errors::diagnostic::{codes, Diagnostic};
use sqljudge_core::validate::{validate_fixture, ValidateReport};
use serde_json::json;

use super::{exit_codes, judge_for};
use crate::cli::args::ValidateArgs;

pub fn run(args: ValidateArgs, settings: JudgeSettings) -> anyhow::Result<i32> {
    let fixture = match load_fixture(&args.fixture, args.strict) {
        Ok(f) => f,
        Err(e) => {
            // nothing to validate without a parsed fixture
            let diag = Diagnostic::new(codes::E_CFG_PARSE, format!("Failed to load fixture: {}", e))
                .with_fix_step("check the YAML syntax and field names");
            print_report(
                &ValidateReport {
                    diagnostics: vec![diag],
                },
                &args.format,
            );
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let report = validate_fixture(&judge_for(settings), &fixture);
    print_report(&report, &args.format);

    // Any error severity -> 2. Warnings only -> 0.
    if report.has_errors() {
        Ok(exit_codes::CONFIG_ERROR)
    } else {
        Ok(exit_codes::OK)
    }
}

fn print_report(report: &ValidateReport, format: &str) {
    if format == "json" {
        let errors: Vec<&Diagnostic> = report.diagnostics.iter().filter(|d| d.is_error()).collect();
        let warnings: Vec<&Diagnostic> =
            report.diagnostics.iter().filter(|d| !d.is_error()).collect();

        let output = json!({
            "schema_version": 1,
            "ok": errors.is_empty(),
            "errors": errors,
            "warnings": warnings,
            "summary": {
                "diagnostic_count": report.diagnostics.len()
            }
        });
        println!("{}", output);
        return;
    }

    if report.diagnostics.is_empty() {
        eprintln!("✅ fixture is valid");
        return;
    }
    for d in &report.diagnostics {
        eprintln!("{}", d.format_terminal());
    }
}
