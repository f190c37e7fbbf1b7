use super::{request_for, Judge};
use crate::model::{CheckType, ExpectedRow, ProblemFixture};
use crate::normalize::normalize;
use anyhow::{anyhow, bail};

/// Produces expectations offline by running the fixture's reference SQL through
/// the same sandbox path a submission takes.
///
/// `final_table`/`statement` cases get `expectedRows`, `rows_count` cases get
/// `expectedRowsCount`, and `error` cases get `expectedError` when it is unset.
pub fn record_expectations(judge: &Judge, fixture: &ProblemFixture) -> anyhow::Result<ProblemFixture> {
    let reference = fixture
        .reference_sql
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow!("fixture '{}' has no referenceSQL to record from", fixture.key))?;

    let mut recorded = fixture.clone();
    for (tc, out) in fixture.test_cases.iter().zip(recorded.test_cases.iter_mut()) {
        let result = judge.sandbox().run(&request_for(fixture, tc, reference));

        match (tc.check_type, result) {
            (CheckType::Error, Err(e)) => {
                if out.expected_error.is_none() {
                    out.expected_error = Some(e.engine_message());
                }
            }
            (CheckType::Error, Ok(_)) => {
                bail!(
                    "case '{}': reference SQL succeeded but the case expects an error",
                    tc.name
                );
            }
            (_, Err(e)) => {
                bail!("case '{}': reference SQL failed: {}", tc.name, e);
            }
            (CheckType::RowsCount, Ok(exec)) => {
                out.expected_rows_count = Some(exec.rows.len() as u64);
            }
            (_, Ok(exec)) => {
                out.expected_rows = normalize(&exec.rows)
                    .into_iter()
                    .map(|row| row.into_iter().collect::<ExpectedRow>())
                    .collect();
            }
        }

        tracing::debug!(event = "expectation_recorded", case = %tc.name, check_type = tc.check_type.as_str());
    }
    Ok(recorded)
}
