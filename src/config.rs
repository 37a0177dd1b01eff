//! Configuration for achievement-ledger

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("achievement-ledger")
}

/// Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding both stores
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// SQLite file for users, profiles and references (relative to storage_dir)
    #[serde(default = "default_relational_db_file")]
    pub relational_db_file: String,

    /// sled directory for achievement content (relative to storage_dir)
    #[serde(default = "default_content_db_dir")]
    pub content_db_dir: String,

    /// Max pooled SQLite connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// SQLite busy timeout
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// sled page cache in bytes
    #[serde(default = "default_content_cache_bytes")]
    pub content_cache_bytes: u64,

    /// Page size when a list request gives none
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Upper bound on requested page sizes
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    #[serde(default = "default_ten")]
    pub top_students_limit: usize,

    /// Monthly buckets in statistics timelines
    #[serde(default = "default_period_buckets")]
    pub period_buckets: usize,

    #[serde(default = "default_ten")]
    pub recent_achievements_limit: usize,
}

fn default_relational_db_file() -> String {
    "ledger.db".to_string()
}

fn default_content_db_dir() -> String {
    "content.sled".to_string()
}

fn default_pool_size() -> u32 {
    8
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_content_cache_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_page_size() -> u32 {
    10
}

fn default_max_page_size() -> u32 {
    100
}

fn default_ten() -> usize {
    10
}

fn default_period_buckets() -> usize {
    12
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            relational_db_file: default_relational_db_file(),
            content_db_dir: default_content_db_dir(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            content_cache_bytes: default_content_cache_bytes(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            top_students_limit: 10,
            period_buckets: default_period_buckets(),
            recent_achievements_limit: 10,
        }
    }
}

impl Config {
    /// Defaults rooted at `storage_dir`
    pub fn in_dir(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Default::default()
        }
    }

    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn relational_db_path(&self) -> PathBuf {
        self.storage_dir.join(&self.relational_db_file)
    }

    pub fn content_db_path(&self) -> PathBuf {
        self.storage_dir.join(&self.content_db_dir)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("pool_size = 2\nmax_page_size = 50\n").unwrap();
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.relational_db_file, "ledger.db");
        assert_eq!(config.period_buckets, 12);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::in_dir(temp_dir.path());
        config.save(config.config_path()).unwrap();

        let loaded = Config::load(config.config_path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.content_db_path(), temp_dir.path().join("content.sled"));
    }
}
