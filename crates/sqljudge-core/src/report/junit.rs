use crate::model::{Verdict, VerdictStatus};
use std::path::Path;

pub fn write_junit(suite: &str, verdict: &Verdict, out: &Path) -> anyhow::Result<()> {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(r#"<testsuite name="{}">"#, escape(suite)));
    xml.push('\n');

    if verdict.status == VerdictStatus::Error {
        // no cases ran; report the judge failure as one errored case
        let msg = verdict.error.as_deref().unwrap_or("judge error");
        xml.push_str(&format!(
            r#"  <testcase name="{}"><error message="{}"/></testcase>"#,
            escape(suite),
            escape(msg)
        ));
        xml.push('\n');
    }

    for c in &verdict.cases {
        xml.push_str(&format!(r#"  <testcase name="{}">"#, escape(&c.name)));
        if !c.passed {
            let msg = match &c.error {
                Some(e) => e.clone(),
                None => format!("result mismatch ({} row(s) off)", c.diff_count),
            };
            xml.push_str(&format!(r#"<failure message="{}"/>"#, escape(&msg)));
        }
        xml.push_str("</testcase>\n");
    }

    xml.push_str("</testsuite>\n");
    std::fs::write(out, xml)?;
    Ok(())
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CaseResult;

    fn case(name: &str, passed: bool, error: Option<&str>) -> CaseResult {
        CaseResult {
            name: name.into(),
            passed,
            error: error.map(String::from),
            expected_sample: vec![],
            got_sample: vec![],
            diff_count: if passed { 0 } else { 2 },
        }
    }

    #[test]
    fn test_junit_output_structure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("junit.xml");

        let verdict = Verdict {
            status: VerdictStatus::Failed,
            cases: vec![
                case("basic", true, None),
                case("ordering", false, None),
                case("bad <sql>", false, Some("no such table: \"x\"")),
            ],
            error: None,
            duration_ms: Some(12),
        };

        write_junit("employees", &verdict, &path).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains(r#"<testsuite name="employees">"#));
        assert!(content.contains(r#"<testcase name="basic"></testcase>"#));
        assert!(content.contains(r#"<failure message="result mismatch (2 row(s) off)"/>"#));
        assert!(content.contains(r#"<testcase name="bad &lt;sql&gt;">"#));
        assert!(content.contains(r#"<failure message="no such table: &quot;x&quot;"/>"#));
    }

    #[test]
    fn test_structural_error_becomes_error_case() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("junit.xml");

        write_junit("empty", &Verdict::structural_error("fixture 'empty' has no test cases"), &path)
            .unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains(r#"<error message="fixture 'empty' has no test cases"/>"#));
    }
}
