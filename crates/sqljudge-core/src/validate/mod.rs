use crate::errors::diagnostic::{codes, Diagnostic};
use crate::judge::Judge;
use crate::model::{CheckType, Mode, ProblemFixture};
use crate::policy;

#[derive(Debug, Clone, Default)]
pub struct ValidateReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidateReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Structural and semantic checks on a fixture. When reference SQL is present
/// it is graded against the fixture's own test cases.
pub fn validate_fixture(judge: &Judge, fixture: &ProblemFixture) -> ValidateReport {
    let mut diags = Vec::new();

    if fixture.test_cases.is_empty() {
        diags.push(
            Diagnostic::new(codes::E_NO_TEST_CASES, "fixture has no test cases")
                .with_fix_step("add at least one entry under testCases"),
        );
        return ValidateReport { diagnostics: diags };
    }

    for tc in &fixture.test_cases {
        match tc.check_type {
            CheckType::RowsCount if tc.expected_rows_count.is_none() => diags.push(
                Diagnostic::new(
                    codes::W_ROWS_COUNT_UNSET,
                    "rows_count case has no expectedRowsCount; it is compared as final_table",
                )
                .with_test_case(&tc.name),
            ),
            CheckType::FinalTable | CheckType::Statement if tc.expected_rows.is_empty() => diags
                .push(
                    Diagnostic::new(
                        codes::W_EXPECTED_EMPTY,
                        "expectedRows is empty; only an empty result passes",
                    )
                    .with_test_case(&tc.name)
                    .with_fix_step("run `sqljudge record` to fill expectations from referenceSQL"),
                ),
            _ => {}
        }
        if tc.follow_up_sql.is_some() && fixture.mode == Mode::Read {
            diags.push(
                Diagnostic::new(
                    codes::W_FOLLOW_UP_READ_MODE,
                    "followUpSQL on a read-mode fixture",
                )
                .with_test_case(&tc.name),
            );
        }
        if tc.max_rows == 0 {
            diags.push(
                Diagnostic::new(codes::W_MAX_ROWS_ZERO, "maxRows is 0; every result is empty")
                    .with_test_case(&tc.name),
            );
        }
    }

    let Some(reference) = fixture
        .reference_sql
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    else {
        diags.push(Diagnostic::new(
            codes::W_REFERENCE_MISSING,
            "referenceSQL is missing; expectations cannot be re-recorded",
        ));
        return ValidateReport { diagnostics: diags };
    };

    if let Err(v) = policy::check(reference, fixture.mode) {
        diags.push(
            Diagnostic::new(
                codes::E_REFERENCE_POLICY,
                format!(
                    "referenceSQL is rejected in {} mode: {}",
                    fixture.mode,
                    v.detail()
                ),
            )
            .with_fix_step("submissions are gated the same way; rewrite the reference"),
        );
        return ValidateReport { diagnostics: diags };
    }

    let verdict = judge.judge(fixture, reference);
    for case in verdict.cases.iter().filter(|c| !c.passed) {
        let message = match &case.error {
            Some(e) => format!("referenceSQL fails this case: {}", e),
            None => format!(
                "referenceSQL fails this case ({} row(s) off)",
                case.diff_count
            ),
        };
        diags.push(
            Diagnostic::new(codes::E_REFERENCE_FAILS, message)
                .with_test_case(&case.name)
                .with_fix_step("re-record expectations with `sqljudge record`"),
        );
    }

    ValidateReport { diagnostics: diags }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestCase;

    fn fixture(reference: Option<&str>, cases: Vec<TestCase>) -> ProblemFixture {
        ProblemFixture {
            key: "t".into(),
            title: None,
            mode: Mode::Read,
            setup_sql: "CREATE TABLE t(x INT); INSERT INTO t VALUES (1), (2);".into(),
            reference_sql: reference.map(String::from),
            test_cases: cases,
        }
    }

    fn codes_of(r: &ValidateReport) -> Vec<&str> {
        r.diagnostics.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn test_empty_fixture_is_an_error() {
        let r = validate_fixture(&Judge::default(), &fixture(Some("SELECT 1"), vec![]));
        assert!(r.has_errors());
        assert_eq!(codes_of(&r), vec![codes::E_NO_TEST_CASES]);
    }

    #[test]
    fn test_reference_grading() {
        let ok = TestCase {
            check_type: CheckType::RowsCount,
            expected_rows_count: Some(2),
            ..Default::default()
        };
        let r = validate_fixture(&Judge::default(), &fixture(Some("SELECT x FROM t"), vec![ok]));
        assert!(!r.has_errors(), "{:?}", r);

        let wrong = TestCase {
            name: "three".into(),
            check_type: CheckType::RowsCount,
            expected_rows_count: Some(3),
            ..Default::default()
        };
        let r = validate_fixture(&Judge::default(), &fixture(Some("SELECT x FROM t"), vec![wrong]));
        assert_eq!(codes_of(&r), vec![codes::E_REFERENCE_FAILS]);
        assert_eq!(r.diagnostics[0].test_case.as_deref(), Some("three"));
    }

    #[test]
    fn test_reference_rejected_by_policy() {
        let tc = TestCase {
            check_type: CheckType::RowsCount,
            expected_rows_count: Some(0),
            ..Default::default()
        };
        let r = validate_fixture(&Judge::default(), &fixture(Some("DELETE FROM t"), vec![tc]));
        assert_eq!(codes_of(&r), vec![codes::E_REFERENCE_POLICY]);
    }

    #[test]
    fn test_rows_count_without_count_warns() {
        let tc = TestCase {
            check_type: CheckType::RowsCount,
            ..Default::default()
        };
        let r = validate_fixture(&Judge::default(), &fixture(None, vec![tc]));
        assert_eq!(
            codes_of(&r),
            vec![codes::W_ROWS_COUNT_UNSET, codes::W_REFERENCE_MISSING]
        );
        assert!(!r.has_errors());
    }
}
