use serde::{Deserialize, Serialize};

pub mod codes {
    pub const E_CFG_PARSE: &str = "E_CFG_PARSE";
    pub const E_NO_TEST_CASES: &str = "E_NO_TEST_CASES";
    pub const W_REFERENCE_MISSING: &str = "W_REFERENCE_MISSING";
    pub const E_REFERENCE_POLICY: &str = "E_REFERENCE_POLICY";
    pub const E_REFERENCE_FAILS: &str = "E_REFERENCE_FAILS";
    pub const W_ROWS_COUNT_UNSET: &str = "W_ROWS_COUNT_UNSET";
    pub const W_EXPECTED_EMPTY: &str = "W_EXPECTED_EMPTY";
    pub const W_FOLLOW_UP_READ_MODE: &str = "W_FOLLOW_UP_READ_MODE";
    pub const W_MAX_ROWS_ZERO: &str = "W_MAX_ROWS_ZERO";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: String,
    pub severity: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_step: Option<String>,
}

impl Diagnostic {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        let severity = if code.starts_with("W_") { "warn" } else { "error" };
        Self {
            code: code.to_string(),
            severity: severity.to_string(),
            message: message.into(),
            test_case: None,
            fix_step: None,
        }
    }

    pub fn with_test_case(mut self, name: &str) -> Self {
        self.test_case = Some(name.to_string());
        self
    }

    pub fn with_fix_step(mut self, step: &str) -> Self {
        self.fix_step = Some(step.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }

    pub fn format_terminal(&self) -> String {
        let icon = if self.is_error() { "✖" } else { "⚠" };
        let mut out = match &self.test_case {
            Some(tc) => format!("{} [{}] {} (case: {})", icon, self.code, self.message, tc),
            None => format!("{} [{}] {}", icon, self.code, self.message),
        };
        if let Some(step) = &self.fix_step {
            out.push_str(&format!("\n    fix: {}", step));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_code_prefix() {
        assert!(Diagnostic::new(codes::E_NO_TEST_CASES, "x").is_error());
        assert!(!Diagnostic::new(codes::W_EXPECTED_EMPTY, "x").is_error());
    }

    #[test]
    fn test_format_terminal_includes_case_and_fix() {
        let d = Diagnostic::new(codes::E_REFERENCE_FAILS, "reference fails")
            .with_test_case("Case 2")
            .with_fix_step("re-record expectations");
        let s = d.format_terminal();
        assert!(s.contains("[E_REFERENCE_FAILS]"));
        assert!(s.contains("case: Case 2"));
        assert!(s.contains("fix: re-record expectations"));
    }
}
