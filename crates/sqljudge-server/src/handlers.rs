use crate::config::ServerConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqljudge_core::errors::ServiceError;
use sqljudge_core::model::Verdict;
use sqljudge_core::policy;
use sqljudge_core::service::JudgeService;

pub struct HandlerContext {
    pub service: JudgeService,
    pub cfg: ServerConfig,
}

/// Application-level failure reported inside a successful JSON-RPC response.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub code: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Maps a facade error to a stable code, keeping codes raised by the file store.
    pub fn from_service(e: &ServiceError) -> Self {
        if let ServiceError::Source(inner) = e {
            if let Some(he) = inner.downcast_ref::<HandlerError>() {
                return he.clone();
            }
        }
        Self::new(e.code(), &e.to_string())
    }
}

pub const METHODS: [&str; 4] = ["judge/run", "judge/submit", "judge/describe", "policy/check"];

#[derive(Debug, Default, Deserialize)]
struct SubmissionParams {
    #[serde(default)]
    fixture: String,
    #[serde(default)]
    sql: String,
}

#[derive(Debug, Default, Deserialize)]
struct DescribeParams {
    #[serde(default)]
    fixture: String,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyParams {
    #[serde(default)]
    sql: String,
    #[serde(default)]
    mode: String,
}

/// Result body for a failed call, shaped like the method's normal result.
pub fn failure(method: &str, err: &HandlerError) -> Value {
    match method {
        "judge/run" => json!({
            "success": false,
            "error": err.message,
            "code": err.code,
        }),
        "judge/submit" => {
            let mut v = serde_json::to_value(Verdict::structural_error(err.message.clone()))
                .unwrap_or_else(|_| json!({ "status": "error", "error": err.message }));
            v["code"] = json!(err.code);
            v
        }
        _ => json!({ "error": err }),
    }
}

pub async fn handle_call(ctx: &HandlerContext, method: &str, params: &Value) -> anyhow::Result<Value> {
    match method {
        "judge/run" => {
            let p: SubmissionParams = serde_json::from_value(params.clone())?;
            if let Some(e) = oversized_sql(ctx, &p.sql) {
                return Ok(failure(method, &e));
            }
            match ctx.service.run_submission(&p.fixture, &p.sql).await {
                Ok(res) => Ok(serde_json::to_value(res)?),
                Err(e) => Ok(failure(method, &HandlerError::from_service(&e))),
            }
        }
        "judge/submit" => {
            let p: SubmissionParams = serde_json::from_value(params.clone())?;
            if let Some(e) = oversized_sql(ctx, &p.sql) {
                return Ok(failure(method, &e));
            }
            match ctx.service.submit_solution(&p.fixture, &p.sql).await {
                Ok(verdict) => Ok(serde_json::to_value(verdict)?),
                Err(e) => Ok(failure(method, &HandlerError::from_service(&e))),
            }
        }
        "judge/describe" => {
            let p: DescribeParams = serde_json::from_value(params.clone())?;
            describe(ctx, &p.fixture).await
        }
        "policy/check" => {
            let p: PolicyParams = serde_json::from_value(params.clone())?;
            if let Some(e) = oversized_sql(ctx, &p.sql) {
                return Ok(failure(method, &e));
            }
            Ok(match policy::check_str(&p.sql, &p.mode) {
                Ok(()) => json!({ "allowed": true }),
                Err(v) => json!({
                    "allowed": false,
                    "reason": v.reason.reason_code(),
                    "message": v.message,
                }),
            })
        }
        other => anyhow::bail!("unknown method {}", other),
    }
}

fn oversized_sql(ctx: &HandlerContext, sql: &str) -> Option<HandlerError> {
    (sql.len() > ctx.cfg.max_sql_bytes).then(|| {
        HandlerError::new(
            "E_LIMIT_EXCEEDED",
            &format!("sql bytes={} > max={}", sql.len(), ctx.cfg.max_sql_bytes),
        )
    })
}

/// Public view of a fixture: schema and test-case metadata, never expectations.
async fn describe(ctx: &HandlerContext, key: &str) -> anyhow::Result<Value> {
    if key.trim().is_empty() {
        return Ok(failure(
            "judge/describe",
            &HandlerError::from_service(&ServiceError::MissingInput),
        ));
    }
    let fixture = match ctx.service.fixture(key).await {
        Ok(f) => f,
        Err(e) => return Ok(failure("judge/describe", &HandlerError::from_service(&e))),
    };

    let sandbox = ctx.service.judge().sandbox().clone();
    let setup = fixture.setup_sql.clone();
    let schema = tokio::task::spawn_blocking(move || sandbox.describe_schema(&setup)).await?;
    let schema = match schema {
        Ok(tables) => tables,
        Err(e) => {
            return Ok(failure(
                "judge/describe",
                &HandlerError::new("E_FIXTURE_SETUP", &e.to_string()),
            ))
        }
    };

    Ok(json!({
        "key": fixture.key,
        "title": fixture.title,
        "mode": fixture.mode,
        "setupSQL": fixture.setup_sql,
        "schema": schema,
        "testCases": fixture.test_case_meta(),
    }))
}
