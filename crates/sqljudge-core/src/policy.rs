//! Textual allow/deny gate for submitted SQL.
//!
//! This is a keyword filter, not a parser. The per-call in-memory sandbox is
//! the real isolation boundary; this gate only keeps obviously wrong or
//! engine-level statements from ever reaching it.

use crate::model::Mode;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ViolationReason {
    MultipleStatements { count: usize },
    ForbiddenKeyword { keyword: String },
    NotAQuery,
    UnsupportedMode { mode: String },
}

impl ViolationReason {
    pub fn reason_code(&self) -> &'static str {
        match self {
            ViolationReason::MultipleStatements { .. } => "E_MULTIPLE_STATEMENTS",
            ViolationReason::ForbiddenKeyword { .. } => "E_FORBIDDEN_KEYWORD",
            ViolationReason::NotAQuery => "E_NOT_A_QUERY",
            ViolationReason::UnsupportedMode { .. } => "E_UNSUPPORTED_MODE",
        }
    }

    fn detail(&self) -> String {
        match self {
            ViolationReason::MultipleStatements { count } => {
                format!("{} statements found, exactly one is allowed", count)
            }
            ViolationReason::ForbiddenKeyword { keyword } => {
                format!("'{}' is not allowed here", keyword)
            }
            ViolationReason::NotAQuery => "statement must start with SELECT or WITH".to_string(),
            ViolationReason::UnsupportedMode { mode } => format!("unsupported mode '{}'", mode),
        }
    }
}

/// Submission rejected before any engine instance was created.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct PolicyViolation {
    pub mode: String,
    pub reason: ViolationReason,
    pub message: String,
}

impl PolicyViolation {
    fn new(mode: &str, reason: ViolationReason) -> Self {
        let message = match mode {
            "read" => "Disallowed SQL. Use a single SELECT/WITH query.",
            "write" => "Disallowed SQL. Certain engine-level commands are blocked.",
            _ => "Disallowed SQL. Unsupported problem mode.",
        };
        Self {
            mode: mode.to_string(),
            reason,
            message: message.to_string(),
        }
    }

    pub fn detail(&self) -> String {
        self.reason.detail()
    }
}

fn line_comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)--.*$").expect("valid line comment regex"))
}

fn block_comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment regex"))
}

fn forbidden_read() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(insert|update|delete|create|drop|alter|replace|pragma|attach|detach|vacuum|begin|commit|rollback)\b",
        )
        .expect("valid read keyword regex")
    })
}

fn forbidden_write() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(attach|detach|vacuum|pragma|alter\s+database|drop\s+database)\b")
            .expect("valid write keyword regex")
    })
}

/// Leading `SELECT`/`WITH`; shared with the sandbox's query detection.
pub(crate) fn query_head() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(with|select)\b").expect("valid query head regex"))
}

/// Removes `-- line` comments, then `/* block */` comments, and trims.
pub fn strip_comments(sql: &str) -> String {
    let without_lines = line_comment().replace_all(sql, "");
    block_comment()
        .replace_all(&without_lines, "")
        .trim()
        .to_string()
}

/// Number of non-empty `;`-separated statements after comment stripping.
pub fn statement_count(cleaned: &str) -> usize {
    cleaned.split(';').filter(|s| !s.trim().is_empty()).count()
}

/// Typed gate: `Ok(())` means the submission may be executed in `mode`.
pub fn check(sql: &str, mode: Mode) -> Result<(), PolicyViolation> {
    let cleaned = strip_comments(sql);

    let count = statement_count(&cleaned);
    if count > 1 {
        return Err(PolicyViolation::new(
            mode.as_str(),
            ViolationReason::MultipleStatements { count },
        ));
    }

    match mode {
        Mode::Read => {
            if let Some(m) = forbidden_read().find(&cleaned) {
                return Err(PolicyViolation::new(
                    mode.as_str(),
                    ViolationReason::ForbiddenKeyword {
                        keyword: m.as_str().to_ascii_lowercase(),
                    },
                ));
            }
            if !query_head().is_match(&cleaned) {
                return Err(PolicyViolation::new(mode.as_str(), ViolationReason::NotAQuery));
            }
            Ok(())
        }
        Mode::Write => {
            if let Some(m) = forbidden_write().find(&cleaned) {
                let keyword = m
                    .as_str()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_ascii_lowercase();
                return Err(PolicyViolation::new(
                    mode.as_str(),
                    ViolationReason::ForbiddenKeyword { keyword },
                ));
            }
            Ok(())
        }
    }
}

/// Same gate for a mode given as free text; anything but `read`/`write` is rejected.
pub fn check_str(sql: &str, mode: &str) -> Result<(), PolicyViolation> {
    match mode.parse::<Mode>() {
        Ok(m) => check(sql, m),
        Err(_) => Err(PolicyViolation::new(
            mode,
            ViolationReason::UnsupportedMode {
                mode: mode.to_string(),
            },
        )),
    }
}

/// Boolean contract used by request layers: never panics, never errors.
pub fn is_allowed(sql: &str, mode: &str) -> bool {
    let res = check_str(sql, mode);
    if let Err(v) = &res {
        tracing::info!(
            event = "policy_rejected",
            mode = %v.mode,
            reason = v.reason.reason_code(),
            detail = %v.detail()
        );
    }
    res.is_ok()
}
