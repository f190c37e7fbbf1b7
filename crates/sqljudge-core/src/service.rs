//! Request-facing facade: fixture lookup by key, the policy gate, and the
//! two entry points a request layer calls (`run_submission`, `submit_solution`).

use crate::errors::ServiceError;
use crate::judge::Judge;
use crate::model::{ProblemFixture, Row, Verdict};
use crate::normalize::normalize;
use crate::policy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Where fixtures come from. Persistence is the implementor's business.
#[async_trait]
pub trait FixtureSource: Send + Sync {
    async fn fetch(&self, key: &str) -> anyhow::Result<Option<ProblemFixture>>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryFixtures {
    fixtures: HashMap<String, ProblemFixture>,
}

impl InMemoryFixtures {
    pub fn new(fixtures: impl IntoIterator<Item = ProblemFixture>) -> Self {
        Self {
            fixtures: fixtures.into_iter().map(|f| (f.key.clone(), f)).collect(),
        }
    }

    pub fn single(fixture: ProblemFixture) -> Self {
        Self::new([fixture])
    }

    pub fn insert(&mut self, fixture: ProblemFixture) {
        self.fixtures.insert(fixture.key.clone(), fixture);
    }
}

#[async_trait]
impl FixtureSource for InMemoryFixtures {
    async fn fetch(&self, key: &str) -> anyhow::Result<Option<ProblemFixture>> {
        Ok(self.fixtures.get(key).cloned())
    }
}

/// Ungraded preview result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    pub fn ok(rows: Vec<Row>) -> Self {
        // columns follow the first row's (sorted) keys
        let columns = rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            success: true,
            columns: Some(columns),
            rows: Some(rows),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            columns: None,
            rows: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Clone)]
pub struct JudgeService {
    source: Arc<dyn FixtureSource>,
    judge: Arc<Judge>,
}

impl JudgeService {
    pub fn new(source: Arc<dyn FixtureSource>, judge: Judge) -> Self {
        Self {
            source,
            judge: Arc::new(judge),
        }
    }

    pub fn judge(&self) -> &Judge {
        &self.judge
    }

    pub async fn fixture(&self, key: &str) -> Result<ProblemFixture, ServiceError> {
        self.source
            .fetch(key)
            .await
            .map_err(ServiceError::Source)?
            .ok_or_else(|| ServiceError::UnknownFixture(key.to_string()))
    }

    /// Single-statement preview against the fixture's top-level setup, capped at
    /// the sandbox's default row limit.
    ///
    /// Engine errors come back as `success: false`; only request problems and
    /// policy rejections are `Err`.
    pub async fn run_submission(&self, key: &str, sql: &str) -> Result<RunResult, ServiceError> {
        if key.trim().is_empty() || sql.trim().is_empty() {
            return Err(ServiceError::MissingInput);
        }
        let fixture = self.fixture(key).await?;
        policy::check(sql, fixture.mode)?;

        let judge = self.judge.clone();
        let sql = sql.to_string();
        let outcome = tokio::task::spawn_blocking(move || {
            let sandbox = judge.sandbox();
            sandbox.execute(&fixture.setup_sql, &sql, sandbox.limits().default_max_rows)
        })
        .await
        .map_err(|e| ServiceError::Worker(e.to_string()))?;

        Ok(match outcome {
            Ok(out) => RunResult::ok(normalize(&out.rows)),
            Err(e) => {
                tracing::debug!(event = "run_failed", fixture = key, error = %e);
                RunResult::failed(e.to_string())
            }
        })
    }

    /// Full graded run. Missing input and unknown fixtures are reported as an
    /// `error` verdict; a policy rejection never reaches the judge.
    pub async fn submit_solution(&self, key: &str, sql: &str) -> Result<Verdict, ServiceError> {
        if key.trim().is_empty() || sql.trim().is_empty() {
            return Ok(Verdict::structural_error(ServiceError::MissingInput.to_string()));
        }
        let fixture = match self.fixture(key).await {
            Ok(f) => f,
            Err(e @ ServiceError::UnknownFixture(_)) => {
                return Ok(Verdict::structural_error(e.to_string()))
            }
            Err(e) => return Err(e),
        };
        policy::check(sql, fixture.mode)?;

        let judge = self.judge.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || judge.judge(&fixture, &sql))
            .await
            .map_err(|e| ServiceError::Worker(e.to_string()))
    }
}
