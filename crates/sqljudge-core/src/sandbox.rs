//! Per-call, in-memory SQLite execution.
//!
//! Isolation contract: every `execute`/`run` call opens its own volatile
//! engine instance through [`Sandbox::open_instance`], and that instance is
//! owned by the call's stack frame. It is dropped (closed) before the call
//! returns on every path, so no state can be shared between submissions.
//! There is no process-wide connection.

use crate::errors::ExecutionError;
use crate::model::{Cell, RawRow, DEFAULT_MAX_ROWS};
use crate::policy::{query_head, strip_comments};
use regex::Regex;
use rusqlite::limits::Limit;
use rusqlite::{Connection, ErrorCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

pub const DEFAULT_DEADLINE_MS: u64 = 3000;

/// VM instructions between deadline checks.
const PROGRESS_OPS: i32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxLimits {
    /// Wall-clock budget for one whole call: setup, submission and follow-up.
    pub deadline_ms: u64,
    /// Row cap for ungraded previews; graded cases carry their own `maxRows`.
    pub default_max_rows: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_DEADLINE_MS,
            default_max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Query,
    Command,
}

/// Everything one sandbox call needs.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest<'a> {
    pub setup_sql: &'a str,
    pub user_sql: &'a str,
    pub max_rows: usize,
    pub follow_up_sql: Option<&'a str>,
    pub inspect_table: Option<&'a str>,
}

impl<'a> ExecutionRequest<'a> {
    pub fn new(setup_sql: &'a str, user_sql: &'a str, max_rows: usize) -> Self {
        Self {
            setup_sql,
            user_sql,
            max_rows,
            follow_up_sql: None,
            inspect_table: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    pub kind: StatementKind,
    pub rows: Vec<RawRow>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<String>,
}

/// Factory and runner for isolated engine instances.
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    limits: SandboxLimits,
    live: Arc<AtomicUsize>,
}

/// One engine instance. Closing happens on drop.
struct Instance {
    conn: Connection,
    deadline: Instant,
    limit_ms: u64,
    live: Arc<AtomicUsize>,
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(event = "sandbox_close");
    }
}

impl Instance {
    fn engine_error(
        &self,
        err: rusqlite::Error,
        wrap: fn(String) -> ExecutionError,
    ) -> ExecutionError {
        let interrupted = matches!(
            &err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::OperationInterrupted
        );
        if interrupted && Instant::now() >= self.deadline {
            tracing::warn!(event = "sandbox_deadline_exceeded", limit_ms = self.limit_ms);
            return ExecutionError::DeadlineExceeded {
                limit_ms: self.limit_ms,
            };
        }
        wrap(err.to_string())
    }

    fn query_rows(&self, sql: &str, max_rows: usize) -> rusqlite::Result<Vec<RawRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut out = Vec::new();
        let mut rows = stmt.query([])?;
        while out.len() < max_rows {
            let Some(row) = rows.next()? else {
                break;
            };
            let mut raw = RawRow::new();
            for (i, name) in names.iter().enumerate() {
                // duplicate column names collapse, last one wins
                raw.insert(name.clone(), Cell::from(row.get_ref(i)?));
            }
            out.push(raw);
        }
        Ok(out)
    }
}

fn limit_clause() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\blimit\b").expect("valid limit regex"))
}

/// Drops trailing semicolons and whitespace.
pub fn trim_statement(sql: &str) -> &str {
    sql.trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// Comments are ignored when deciding; the statement itself is executed verbatim.
pub fn is_query(sql: &str) -> bool {
    query_head().is_match(&strip_comments(sql))
}

/// Appends `LIMIT <max_rows>` to a query that has no `limit` of its own.
pub fn with_row_cap(query: &str, max_rows: usize) -> String {
    if limit_clause().is_match(&strip_comments(query)) {
        query.to_string()
    } else {
        // own line, so a trailing `-- comment` cannot swallow it
        format!("{}\nLIMIT {}", query, max_rows)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl Sandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self {
            limits,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }

    /// Engine instances currently open through this sandbox.
    pub fn live_instances(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Builds a brand-new, empty, memory-backed engine instance.
    fn open_instance(&self) -> Result<Instance, ExecutionError> {
        let conn =
            Connection::open_in_memory().map_err(|e| ExecutionError::Open(e.to_string()))?;
        self.live.fetch_add(1, Ordering::SeqCst);

        // no way to reach any other database from inside the instance
        let _ = conn.set_limit(Limit::SQLITE_LIMIT_ATTACHED, 0);

        let deadline = Instant::now() + Duration::from_millis(self.limits.deadline_ms);
        conn.progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));

        tracing::trace!(event = "sandbox_open", deadline_ms = self.limits.deadline_ms);
        Ok(Instance {
            conn,
            deadline,
            limit_ms: self.limits.deadline_ms,
            live: self.live.clone(),
        })
    }

    /// Applies `setup_sql` to a fresh instance, runs `user_sql` and returns its rows.
    pub fn execute(
        &self,
        setup_sql: &str,
        user_sql: &str,
        max_rows: usize,
    ) -> Result<ExecutionOutput, ExecutionError> {
        self.run(&ExecutionRequest::new(setup_sql, user_sql, max_rows))
    }

    pub fn run(&self, req: &ExecutionRequest<'_>) -> Result<ExecutionOutput, ExecutionError> {
        let start = Instant::now();
        let instance = self.open_instance()?;

        instance
            .conn
            .execute_batch(req.setup_sql)
            .map_err(|e| instance.engine_error(e, ExecutionError::Setup))?;

        let statement = trim_statement(req.user_sql);
        let (kind, mut rows) = if is_query(statement) {
            let sql = with_row_cap(statement, req.max_rows);
            let rows = instance
                .query_rows(&sql, req.max_rows)
                .map_err(|e| instance.engine_error(e, ExecutionError::Statement))?;
            (StatementKind::Query, rows)
        } else {
            instance
                .conn
                .execute_batch(statement)
                .map_err(|e| instance.engine_error(e, ExecutionError::Statement))?;
            (StatementKind::Command, Vec::new())
        };

        if let Some(follow_up) = req.follow_up_sql {
            instance
                .conn
                .execute_batch(follow_up)
                .map_err(|e| instance.engine_error(e, ExecutionError::FollowUp))?;
        }

        if let Some(table) = req.inspect_table {
            let sql = format!("SELECT * FROM {} LIMIT {}", quote_ident(table), req.max_rows);
            rows = instance
                .query_rows(&sql, req.max_rows)
                .map_err(|e| instance.engine_error(e, ExecutionError::Statement))?;
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            event = "sandbox_done",
            kind = ?kind,
            rows = rows.len(),
            duration_ms = elapsed_ms
        );

        Ok(ExecutionOutput {
            kind,
            rows,
            elapsed_ms,
        })
    }

    /// Table and column names produced by `setup_sql`, in creation order.
    pub fn describe_schema(&self, setup_sql: &str) -> Result<Vec<TableInfo>, ExecutionError> {
        let instance = self.open_instance()?;
        instance
            .conn
            .execute_batch(setup_sql)
            .map_err(|e| instance.engine_error(e, ExecutionError::Setup))?;

        let tables = instance
            .query_rows(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
                usize::MAX,
            )
            .map_err(|e| instance.engine_error(e, ExecutionError::Statement))?;

        let mut out = Vec::new();
        for t in tables {
            let Some(Cell::Text(name)) = t.get("name").cloned() else {
                continue;
            };
            let columns = column_names(&instance.conn, &name)
                .map_err(|e| instance.engine_error(e, ExecutionError::Statement))?;
            out.push(TableInfo { name, columns });
        }
        Ok(out)
    }
}

fn column_names(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let stmt = conn.prepare(&format!("SELECT * FROM {} LIMIT 0", quote_ident(table)))?;
    Ok(stmt.column_names().into_iter().map(String::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_statement() {
        assert_eq!(trim_statement("  SELECT 1;;  \n"), "SELECT 1");
        assert_eq!(trim_statement("SELECT 1 ; ;"), "SELECT 1");
        assert_eq!(trim_statement("INSERT INTO t VALUES (1)"), "INSERT INTO t VALUES (1)");
    }

    #[test]
    fn test_row_cap_respects_existing_limit() {
        assert_eq!(with_row_cap("SELECT * FROM t", 10), "SELECT * FROM t\nLIMIT 10");
        assert_eq!(
            with_row_cap("SELECT * FROM t -- no limit here", 10),
            "SELECT * FROM t -- no limit here\nLIMIT 10"
        );
        assert_eq!(with_row_cap("select * from t limit 3", 10), "select * from t limit 3");
        assert_eq!(
            with_row_cap("SELECT speed_limit FROM t", 5),
            "SELECT speed_limit FROM t\nLIMIT 5"
        );
    }

    #[test]
    fn test_query_detection() {
        assert!(is_query("SELECT 1"));
        assert!(is_query("\n with x as (select 1) select * from x"));
        assert!(!is_query("INSERT INTO t SELECT 1"));
        assert!(!is_query("selectivity"));
        assert!(is_query("-- preview\nSELECT 1"));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("employees"), "\"employees\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
