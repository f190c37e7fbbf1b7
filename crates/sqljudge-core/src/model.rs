use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Expected rows are authored as plain JSON/YAML maps.
pub type ExpectedRow = serde_json::Map<String, serde_json::Value>;

/// A raw result row straight from the engine (or converted from an expected row).
pub type RawRow = BTreeMap<String, Cell>;

/// A normalized, key-sorted row. Serializing it yields the canonical comparison form.
pub type Row = BTreeMap<String, serde_json::Value>;

pub const DEFAULT_MAX_ROWS: usize = 1000;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Read,
    Write,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Read => "read",
            Mode::Write => "write",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Mode::Read),
            "write" => Ok(Mode::Write),
            other => Err(format!("unsupported mode '{}' (expected read|write)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    #[default]
    FinalTable,
    Error,
    RowsCount,
    Statement,
}

impl CheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::FinalTable => "final_table",
            CheckType::Error => "error",
            CheckType::RowsCount => "rows_count",
            CheckType::Statement => "statement",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemFixture {
    #[serde(default, alias = "slug")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub mode: Mode,
    #[serde(rename = "setupSQL", alias = "setup_sql")]
    pub setup_sql: String,
    #[serde(
        default,
        rename = "referenceSQL",
        alias = "solutionSQL",
        alias = "reference_sql",
        skip_serializing_if = "Option::is_none"
    )]
    pub reference_sql: Option<String>,
    #[serde(default, rename = "testCases", alias = "test_cases")]
    pub test_cases: Vec<TestCase>,
}

impl ProblemFixture {
    /// Expectation-free view of the test cases, safe to hand to a client.
    pub fn test_case_meta(&self) -> Vec<TestCaseMeta> {
        self.test_cases.iter().map(TestCase::meta).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default = "default_case_name")]
    pub name: String,
    #[serde(
        default,
        rename = "setupSQL",
        alias = "setupSQLOverride",
        skip_serializing_if = "Option::is_none"
    )]
    pub setup_sql_override: Option<String>,
    #[serde(default, rename = "checkType", alias = "check_type")]
    pub check_type: CheckType,
    #[serde(
        default,
        rename = "expectedRows",
        alias = "expected_rows",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub expected_rows: Vec<ExpectedRow>,
    #[serde(default)]
    pub ordered: bool,
    #[serde(default = "default_max_rows", rename = "maxRows", alias = "max_rows")]
    pub max_rows: usize,
    #[serde(
        default,
        rename = "expectedError",
        alias = "expected_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_error: Option<String>,
    #[serde(
        default,
        rename = "expectedRowsCount",
        alias = "expected_rows_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_rows_count: Option<u64>,
    /// Runs in the same instance right after the submission (e.g. to fire a trigger).
    #[serde(
        default,
        rename = "followUpSQL",
        alias = "userSQL",
        skip_serializing_if = "Option::is_none"
    )]
    pub follow_up_sql: Option<String>,
    /// When set, actual rows are read from this table after the submission ran.
    #[serde(
        default,
        rename = "table",
        alias = "inspect_table",
        skip_serializing_if = "Option::is_none"
    )]
    pub inspect_table: Option<String>,
}

impl Default for TestCase {
    fn default() -> Self {
        Self {
            name: default_case_name(),
            setup_sql_override: None,
            check_type: CheckType::FinalTable,
            expected_rows: Vec::new(),
            ordered: false,
            max_rows: DEFAULT_MAX_ROWS,
            expected_error: None,
            expected_rows_count: None,
            follow_up_sql: None,
            inspect_table: None,
        }
    }
}

impl TestCase {
    pub fn meta(&self) -> TestCaseMeta {
        TestCaseMeta {
            name: self.name.clone(),
            ordered: self.ordered,
            max_rows: self.max_rows,
            check_type: self.check_type,
        }
    }

    /// Setup SQL that applies to this case: its own override, else the fixture's.
    pub fn effective_setup<'a>(&'a self, fixture: &'a ProblemFixture) -> &'a str {
        self.setup_sql_override
            .as_deref()
            .unwrap_or(fixture.setup_sql.as_str())
    }
}

fn default_case_name() -> String {
    "Case".to_string()
}

fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseMeta {
    pub name: String,
    pub ordered: bool,
    pub max_rows: usize,
    pub check_type: CheckType,
}

/// A single scalar as produced by the engine or authored in an expectation.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// SQLite has no temporal storage class, so neither conversion below
    /// produces this; rows built directly by an embedding caller can.
    Timestamp(chrono::DateTime<chrono::Utc>),
    /// Nested values from authored expectations pass through untouched.
    Json(serde_json::Value),
}

impl From<serde_json::Value> for Cell {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Cell::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    // beyond i64: keep every digit
                    Cell::Text(u.to_string())
                } else {
                    Cell::Real(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Cell::Text(s),
            other => Cell::Json(other),
        }
    }
}

impl From<rusqlite::types::ValueRef<'_>> for Cell {
    fn from(v: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;
        match v {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(f) => Cell::Real(f),
            ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
        }
    }
}

pub fn expected_to_raw(row: &ExpectedRow) -> RawRow {
    row.iter()
        .map(|(k, v)| (k.clone(), Cell::from(v.clone())))
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Passed,
    Failed,
    Error,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Passed => "passed",
            VerdictStatus::Failed => "failed",
            VerdictStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub name: String,
    pub passed: bool,
    pub error: Option<String>,
    pub expected_sample: Vec<Row>,
    pub got_sample: Vec<Row>,
    pub diff_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub status: VerdictStatus,
    pub cases: Vec<CaseResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Verdict {
    /// The judge could not evaluate the request at all.
    pub fn structural_error(message: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Error,
            cases: Vec::new(),
            error: Some(message.into()),
            duration_ms: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == VerdictStatus::Passed
    }
}
