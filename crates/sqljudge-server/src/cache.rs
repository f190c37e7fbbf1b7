use moka::sync::Cache;
use sha2::{Digest, Sha256};
use sqljudge_core::model::ProblemFixture;
use std::sync::Arc;

pub type ParsedFixture = Arc<ProblemFixture>;

/// Parsed fixtures keyed by `path:sha256(content)`, so an edited file is
/// re-parsed on its next lookup.
pub struct FixtureCache {
    pub fixtures: Cache<String, ParsedFixture>,
}

impl FixtureCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            fixtures: Cache::new(max_entries),
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn key(abs_path: &str, sha: &str) -> String {
    format!("{}:{}", abs_path, sha)
}
