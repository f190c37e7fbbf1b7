use crate::config::ServerConfig;
use crate::fixtures::FileFixtures;
use crate::handlers::{self, HandlerContext, HandlerError};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqljudge_core::judge::Judge;
use sqljudge_core::sandbox::{Sandbox, SandboxLimits};
use sqljudge_core::service::JudgeService;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

static RID: AtomicU64 = AtomicU64::new(1);

fn next_rid() -> String {
    let n = RID.fetch_add(1, Ordering::Relaxed);
    format!("r-{n:06}")
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Option<Value>,
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError { code, message }),
            id,
        }
    }
}

fn write_response(stdout: &mut impl Write, resp: &JsonRpcResponse) -> Result<()> {
    let resp_json = serde_json::to_string(resp)?;
    writeln!(stdout, "{}", resp_json)?;
    stdout.flush()?;
    Ok(())
}

pub struct Server;

impl Server {
    pub async fn run(fixture_root: std::path::PathBuf, cfg: ServerConfig) -> Result<()> {
        // Canonicalize root once
        let root_canon = std::fs::canonicalize(&fixture_root)
            .map_err(|e| anyhow::anyhow!("invalid --fixture-root: {e}"))?;

        let files = Arc::new(FileFixtures::new(root_canon, cfg.cache_entries));
        let judge = Judge::new(Sandbox::new(SandboxLimits {
            deadline_ms: cfg.deadline_ms,
            default_max_rows: cfg.max_rows,
        }));
        let ctx = HandlerContext {
            service: JudgeService::new(files, judge),
            cfg: cfg.clone(),
        };

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        for line in stdin.lock().lines() {
            let line = line?;
            let rid = next_rid();

            if line.len() > cfg.max_msg_bytes {
                tracing::warn!(
                    event = "limit_exceeded",
                    rid = %rid,
                    bytes_in = line.len(),
                    max = cfg.max_msg_bytes
                );
                let err = HandlerError::new(
                    "E_LIMIT_EXCEEDED",
                    &format!("message bytes={} > max={}", line.len(), cfg.max_msg_bytes),
                );
                write_response(
                    &mut stdout,
                    &JsonRpcResponse::ok(None, serde_json::json!({ "error": err })),
                )?;
                continue;
            }

            if line.trim().is_empty() {
                continue;
            }

            let req: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(event = "json_parse_error", rid = %rid, error = %e);
                    continue;
                }
            };

            let resp = match req.method.as_str() {
                "initialize" => JsonRpcResponse::ok(
                    req.id.clone(),
                    serde_json::json!({
                        "serverInfo": {
                            "name": "sqljudge-server",
                            "version": env!("CARGO_PKG_VERSION")
                        },
                        "methods": handlers::METHODS,
                        "limits": {
                            "timeoutMs": cfg.timeout_ms,
                            "deadlineMs": cfg.deadline_ms,
                            "maxRows": cfg.max_rows,
                            "maxSqlBytes": cfg.max_sql_bytes
                        }
                    }),
                ),
                method if handlers::METHODS.contains(&method) => match &req.params {
                    Some(params) if params.is_object() => {
                        let result = Self::call(&ctx, &rid, method, params).await;
                        JsonRpcResponse::ok(req.id.clone(), result)
                    }
                    _ => JsonRpcResponse::error(req.id.clone(), -32602, "Missing params".to_string()),
                },
                _ => JsonRpcResponse::error(
                    req.id.clone(),
                    -32601,
                    format!("Method not found: {}", req.method),
                ),
            };

            write_response(&mut stdout, &resp)?;
        }

        Ok(())
    }

    async fn call(ctx: &HandlerContext, rid: &str, method: &str, params: &Value) -> Value {
        let fixture = params.get("fixture").and_then(|v| v.as_str()).unwrap_or("");
        let start = std::time::Instant::now();

        tracing::info!(event = "call_start", rid = %rid, method = method, fixture = fixture);

        let fut = handlers::handle_call(ctx, method, params);
        let result = match timeout(Duration::from_millis(ctx.cfg.timeout_ms), fut).await {
            Ok(res) => res,
            Err(_) => {
                let dur = start.elapsed().as_millis() as u64;
                tracing::warn!(
                    event = "call_timeout",
                    rid = %rid,
                    method = method,
                    duration_ms = dur,
                    code = "E_TIMEOUT"
                );
                return handlers::failure(
                    method,
                    &HandlerError::new(
                        "E_TIMEOUT",
                        &format!("Request exceeded {}ms", ctx.cfg.timeout_ms),
                    ),
                );
            }
        };

        let dur = start.elapsed().as_millis() as u64;
        match result {
            Ok(val) => {
                let code = val
                    .get("code")
                    .or_else(|| val.get("error").and_then(|e| e.get("code")))
                    .and_then(|c| c.as_str());
                tracing::info!(
                    event = "call_done",
                    rid = %rid,
                    method = method,
                    fixture = fixture,
                    duration_ms = dur,
                    outcome = if code.is_some() { "app_error" } else { "ok" },
                    code = code.unwrap_or("")
                );
                val
            }
            Err(e) => {
                tracing::error!(
                    event = "call_crash",
                    rid = %rid,
                    method = method,
                    duration_ms = dur,
                    error = %e
                );
                handlers::failure(method, &HandlerError::new("E_INTERNAL", &e.to_string()))
            }
        }
    }
}
