use std::env;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Whole-request budget, fixture lookup included.
    pub timeout_ms: u64,
    /// Per-execution sandbox deadline.
    pub deadline_ms: u64,
    /// Row cap for `judge/run` previews.
    pub max_rows: usize,
    pub max_msg_bytes: usize,
    pub max_sql_bytes: usize,
    pub cache_entries: u64,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            deadline_ms: 3000,
            max_rows: 1000,
            max_msg_bytes: 1_000_000,
            max_sql_bytes: 64_000,
            cache_entries: 128,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("SQLJUDGE_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                cfg.timeout_ms = n;
            }
        }
        if let Ok(v) = env::var("SQLJUDGE_DEADLINE_MS") {
            if let Ok(n) = v.parse() {
                cfg.deadline_ms = n;
            }
        }
        if let Ok(v) = env::var("SQLJUDGE_MAX_ROWS") {
            if let Ok(n) = v.parse() {
                cfg.max_rows = n;
            }
        }
        if let Ok(v) = env::var("SQLJUDGE_MAX_BYTES") {
            if let Ok(n) = v.parse() {
                cfg.max_msg_bytes = n;
            }
        }
        if let Ok(v) = env::var("SQLJUDGE_MAX_SQL_BYTES") {
            if let Ok(n) = v.parse() {
                cfg.max_sql_bytes = n;
            }
        }
        if let Ok(v) = env::var("SQLJUDGE_CACHE_ENTRIES") {
            if let Ok(n) = v.parse() {
                cfg.cache_entries = n;
            }
        }
        if let Ok(v) = env::var("SQLJUDGE_LOG") {
            cfg.log_level = v;
        }
        cfg
    }
}
