//! Grading: runs a submission against every test case of a fixture and folds
//! the per-case comparisons into one [`Verdict`].

pub mod expectations;

use crate::model::{
    expected_to_raw, CaseResult, CheckType, ProblemFixture, Row, TestCase, Verdict,
    VerdictStatus,
};
use crate::normalize::{normalize, same_sequence, sort_for_comparison};
use crate::sandbox::{ExecutionRequest, Sandbox};
use std::time::Instant;

/// Rows kept in `expectedSample` / `gotSample`.
pub const SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct Judge {
    sandbox: Sandbox,
}

/// Sandbox call for one test case: its effective setup, cap, follow-up and inspected table.
pub(crate) fn request_for<'a>(
    fixture: &'a ProblemFixture,
    tc: &'a TestCase,
    sql: &'a str,
) -> ExecutionRequest<'a> {
    let mut req = ExecutionRequest::new(tc.effective_setup(fixture), sql, tc.max_rows);
    req.follow_up_sql = tc.follow_up_sql.as_deref();
    req.inspect_table = tc.inspect_table.as_deref();
    req
}

impl Judge {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Grades `user_sql`. Never fails: execution errors land in the case results,
    /// and a request that cannot be graded at all yields `status = error`.
    pub fn judge(&self, fixture: &ProblemFixture, user_sql: &str) -> Verdict {
        let start = Instant::now();

        if fixture.test_cases.is_empty() {
            tracing::warn!(event = "judge_structural_error", fixture = %fixture.key, reason = "no_test_cases");
            return Verdict::structural_error(format!(
                "fixture '{}' has no test cases",
                fixture.key
            ));
        }
        if user_sql.trim().is_empty() {
            return Verdict::structural_error("submission SQL is empty");
        }

        let cases: Vec<CaseResult> = fixture
            .test_cases
            .iter()
            .map(|tc| self.judge_case(fixture, tc, user_sql))
            .collect();

        let status = if cases.iter().all(|c| c.passed) {
            VerdictStatus::Passed
        } else {
            VerdictStatus::Failed
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            event = "judge_done",
            fixture = %fixture.key,
            status = status.as_str(),
            cases = cases.len(),
            failed = cases.iter().filter(|c| !c.passed).count(),
            duration_ms
        );

        Verdict {
            status,
            cases,
            error: None,
            duration_ms: Some(duration_ms),
        }
    }

    fn judge_case(&self, fixture: &ProblemFixture, tc: &TestCase, user_sql: &str) -> CaseResult {
        let outcome = self.sandbox.run(&request_for(fixture, tc, user_sql));

        let expected_raw: Vec<_> = tc.expected_rows.iter().map(expected_to_raw).collect();
        let expected = normalize(&expected_raw);
        let expected_count = match (tc.check_type, tc.expected_rows_count) {
            (CheckType::RowsCount, Some(n)) => n as usize,
            _ => expected.len(),
        };

        let (passed, error, got) = match (tc.check_type, outcome) {
            (CheckType::Error, Err(e)) => {
                let message = e.to_string();
                let passed = tc
                    .expected_error
                    .as_deref()
                    .map_or(true, |want| message.contains(want));
                (passed, Some(message), Vec::new())
            }
            (CheckType::Error, Ok(out)) => (false, None, normalize(&out.rows)),
            // unexpected error: the case fails as-is, nothing is compared
            (_, Err(e)) => (false, Some(e.to_string()), Vec::new()),
            (CheckType::RowsCount, Ok(out)) if tc.expected_rows_count.is_some() => {
                let got = normalize(&out.rows);
                (got.len() == expected_count, None, got)
            }
            (_, Ok(out)) => {
                let got = normalize(&out.rows);
                (rows_match(&expected, &got, tc.ordered), None, got)
            }
        };

        let result = CaseResult {
            name: tc.name.clone(),
            passed,
            error,
            expected_sample: sample(&expected),
            got_sample: sample(&got),
            diff_count: got.len().abs_diff(expected_count),
        };

        tracing::debug!(
            event = "case_done",
            case = %result.name,
            check_type = tc.check_type.as_str(),
            passed = result.passed,
            diff_count = result.diff_count
        );
        result
    }
}

fn rows_match(expected: &[Row], got: &[Row], ordered: bool) -> bool {
    if ordered {
        same_sequence(expected, got)
    } else {
        sort_for_comparison(expected) == sort_for_comparison(got)
    }
}

fn sample(rows: &[Row]) -> Vec<Row> {
    rows.iter().take(SAMPLE_ROWS).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExpectedRow, Mode};
    use serde_json::json;

    fn rows(v: serde_json::Value) -> Vec<ExpectedRow> {
        serde_json::from_value(v).unwrap()
    }

    fn fixture(cases: Vec<TestCase>) -> ProblemFixture {
        ProblemFixture {
            key: "scores".into(),
            title: None,
            mode: Mode::Read,
            setup_sql: "CREATE TABLE s(id INT, v REAL); INSERT INTO s VALUES (1, 0.1), (2, 0.2);"
                .into(),
            reference_sql: None,
            test_cases: cases,
        }
    }

    #[test]
    fn test_ordered_comparison_is_order_sensitive() {
        let tc = TestCase {
            ordered: true,
            expected_rows: rows(json!([{"id": 2}, {"id": 1}])),
            ..Default::default()
        };
        let judge = Judge::default();
        let f = fixture(vec![tc]);

        let v = judge.judge(&f, "SELECT id FROM s ORDER BY id DESC");
        assert_eq!(v.status, VerdictStatus::Passed);

        let v = judge.judge(&f, "SELECT id FROM s ORDER BY id ASC");
        assert_eq!(v.status, VerdictStatus::Failed);
        assert_eq!(v.cases[0].diff_count, 0);
    }

    #[test]
    fn test_float_sums_match_two_decimal_expectations() {
        let tc = TestCase {
            expected_rows: rows(json!([{"total": 0.3}])),
            ..Default::default()
        };
        let v = Judge::default().judge(&fixture(vec![tc]), "SELECT SUM(v) AS total FROM s");
        assert!(v.passed(), "{:?}", v);
    }

    #[test]
    fn test_unexpected_error_fails_case_with_message() {
        let tc = TestCase {
            expected_rows: rows(json!([{"id": 1}, {"id": 2}])),
            ..Default::default()
        };
        let v = Judge::default().judge(&fixture(vec![tc]), "SELECT nope FROM s");
        assert_eq!(v.status, VerdictStatus::Failed);
        let case = &v.cases[0];
        assert!(!case.passed);
        assert!(case.error.as_deref().unwrap_or("").contains("no such column"));
        assert!(case.got_sample.is_empty());
        assert_eq!(case.diff_count, 2);
    }

    #[test]
    fn test_error_check_without_expected_error_accepts_any_error() {
        let tc = TestCase {
            check_type: CheckType::Error,
            ..Default::default()
        };
        let judge = Judge::default();
        let f = fixture(vec![tc]);
        assert!(judge.judge(&f, "SELECT * FROM missing").passed());
        assert!(!judge.judge(&f, "SELECT 1").passed());
    }

    #[test]
    fn test_samples_are_capped() {
        let tc = TestCase {
            check_type: CheckType::RowsCount,
            expected_rows_count: Some(20),
            ..Default::default()
        };
        let v = Judge::default().judge(
            &fixture(vec![tc]),
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 20) SELECT x FROM n",
        );
        assert!(v.passed());
        assert_eq!(v.cases[0].got_sample.len(), SAMPLE_ROWS);
    }

    #[test]
    fn test_structural_errors() {
        let judge = Judge::default();
        let v = judge.judge(&fixture(vec![]), "SELECT 1");
        assert_eq!(v.status, VerdictStatus::Error);
        assert!(v.cases.is_empty());

        let v = judge.judge(&fixture(vec![TestCase::default()]), "   ");
        assert_eq!(v.status, VerdictStatus::Error);
        assert!(v.error.is_some());
    }
}
