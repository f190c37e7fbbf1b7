use crate::model::{CaseResult, Verdict, VerdictStatus};

pub fn print_verdict(fixture: &str, verdict: &Verdict) {
    eprintln!("\nJudging {} ({} cases)...", fixture, verdict.cases.len());

    if verdict.status == VerdictStatus::Error {
        eprintln!(
            "💥 judge could not run: {}",
            verdict.error.as_deref().unwrap_or("unknown error")
        );
        return;
    }

    for c in &verdict.cases {
        if c.passed {
            eprintln!("✅ {:<24} PASS", c.name);
        } else {
            eprintln!("❌ {:<24} FAIL", c.name);
            print_case_detail(c);
        }
    }

    let passed = verdict.cases.iter().filter(|c| c.passed).count();
    let duration = verdict
        .duration_ms
        .map(|d| format!(" in {:.1}s", d as f64 / 1000.0))
        .unwrap_or_default();
    eprintln!(
        "\nSummary: {} passed, {} failed{}",
        passed,
        verdict.cases.len() - passed,
        duration
    );
}

fn print_case_detail(c: &CaseResult) {
    if let Some(e) = &c.error {
        eprintln!("    Error: {}", e);
    }
    if c.diff_count > 0 {
        eprintln!("    Row count off by {}", c.diff_count);
    }
    if !c.expected_sample.is_empty() {
        eprintln!("    Expected: {}", sample_json(&c.expected_sample));
    }
    if !c.got_sample.is_empty() {
        eprintln!("    Got:      {}", sample_json(&c.got_sample));
    }
}

fn sample_json<T: serde::Serialize>(rows: &T) -> String {
    serde_json::to_string(rows).unwrap_or_default()
}
