use crate::errors::ConfigError;
use crate::model::{ProblemFixture, DEFAULT_MAX_ROWS};
use crate::sandbox::{SandboxLimits, DEFAULT_DEADLINE_MS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Engine limits shared by the CLI and the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeSettings {
    pub deadline_ms: u64,
    pub max_rows: usize,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_DEADLINE_MS,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl JudgeSettings {
    pub fn sandbox_limits(&self) -> SandboxLimits {
        SandboxLimits {
            deadline_ms: self.deadline_ms,
            default_max_rows: self.max_rows,
        }
    }
}

/// Parses fixture text (YAML, or JSON as a YAML subset). Unknown keys are
/// returned alongside the fixture rather than dropped silently.
pub fn parse_fixture(raw: &str) -> Result<(ProblemFixture, BTreeSet<String>), ConfigError> {
    let mut ignored_keys = BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);

    let fixture: ProblemFixture = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse fixture: {}", e)))?;

    Ok((fixture, ignored_keys))
}

pub fn load_fixture(path: &Path, strict: bool) -> Result<ProblemFixture, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read fixture {}: {}", path.display(), e)))?;

    let (mut fixture, ignored_keys) = parse_fixture(&raw)
        .map_err(|e| ConfigError(format!("{} (file: {})", e, path.display())))?;

    // anchors and extension keys are allowed anywhere
    let unknown: Vec<_> = ignored_keys
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();

    if !unknown.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "Unknown fields detected in strict mode: {:?} (file: {})",
                unknown,
                path.display()
            )));
        }
        tracing::warn!(
            event = "fixture_unknown_fields",
            file = %path.display(),
            fields = ?unknown
        );
    }

    if fixture.key.trim().is_empty() {
        fixture.key = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
    }

    Ok(fixture)
}

pub fn write_fixture(path: &Path, fixture: &ProblemFixture) -> Result<(), ConfigError> {
    let yaml = serde_yaml::to_string(fixture)
        .map_err(|e| ConfigError(format!("failed to serialize fixture: {}", e)))?;
    std::fs::write(path, yaml)
        .map_err(|e| ConfigError(format!("failed to write fixture {}: {}", path.display(), e)))?;
    Ok(())
}
