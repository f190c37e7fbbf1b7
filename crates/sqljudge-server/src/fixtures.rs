use crate::cache::{self, FixtureCache};
use crate::security::resolve_fixture_path;
use async_trait::async_trait;
use sqljudge_core::config::parse_fixture;
use sqljudge_core::model::ProblemFixture;
use sqljudge_core::service::FixtureSource;
use std::path::PathBuf;
use std::sync::Arc;

/// Fixtures read from a jailed directory, parsed once per content hash.
pub struct FileFixtures {
    root_canon: PathBuf,
    cache: FixtureCache,
}

impl FileFixtures {
    pub fn new(root_canon: PathBuf, cache_entries: u64) -> Self {
        Self {
            root_canon,
            cache: FixtureCache::new(cache_entries),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root_canon
    }

    async fn load(&self, key: &str) -> anyhow::Result<Option<Arc<ProblemFixture>>> {
        let Some(path) = resolve_fixture_path(&self.root_canon, key)? else {
            return Ok(None);
        };

        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            crate::handlers::HandlerError::new(
                "E_FIXTURE_READ",
                &format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        let cache_key = cache::key(&path.to_string_lossy(), &cache::sha256_hex(raw.as_bytes()));

        if let Some(hit) = self.cache.fixtures.get(&cache_key) {
            tracing::debug!(event = "fixture_cache_hit", fixture = key);
            return Ok(Some(hit));
        }
        tracing::debug!(event = "fixture_cache_miss", fixture = key);

        let (mut fixture, ignored) = parse_fixture(&raw).map_err(|e| {
            crate::handlers::HandlerError::new("E_FIXTURE_READ", &format!("{} ({})", e, key))
        })?;
        if !ignored.is_empty() {
            tracing::warn!(event = "fixture_unknown_fields", fixture = key, fields = ?ignored);
        }
        if fixture.key.trim().is_empty() {
            fixture.key = key.to_string();
        }

        let parsed = Arc::new(fixture);
        self.cache.fixtures.insert(cache_key, parsed.clone());
        Ok(Some(parsed))
    }
}

#[async_trait]
impl FixtureSource for FileFixtures {
    async fn fetch(&self, key: &str) -> anyhow::Result<Option<ProblemFixture>> {
        Ok(self.load(key).await?.map(|f| (*f).clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_parses_and_reparses_on_change() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let root = std::fs::canonicalize(dir.path())?;
        let path = root.join("emp.yaml");
        std::fs::write(&path, "setupSQL: 'CREATE TABLE t(x INT);'\ntestCases: []\n")?;

        let files = FileFixtures::new(root, 8);
        let f = files.fetch("emp").await?.expect("fixture exists");
        assert_eq!(f.key, "emp");
        assert_eq!(f.setup_sql, "CREATE TABLE t(x INT);");

        std::fs::write(&path, "title: Changed\nsetupSQL: ''\ntestCases: []\n")?;
        let f = files.fetch("emp").await?.expect("fixture exists");
        assert_eq!(f.title.as_deref(), Some("Changed"));

        assert!(files.fetch("ghost").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_traversal_error_keeps_its_code() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let files = FileFixtures::new(std::fs::canonicalize(dir.path())?, 8);
        let err = files.fetch("../outside").await.unwrap_err();
        let he = err
            .downcast_ref::<crate::handlers::HandlerError>()
            .expect("handler error");
        assert_eq!(he.code, "E_PERMISSION_DENIED");
        Ok(())
    }
}
