//! YAML configuration
//!
//! One small file covers the deployment surface: where to listen, where
//! the database lives, and engine tuning. Every field has a default so a
//! minimal config can be a single line.

use latch_core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Process configuration, loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP surface binds to
    pub listen_addr: String,
    /// Directory holding the embedded engine's files
    pub db_path: PathBuf,
    /// Engine page-cache size in bytes
    pub cache_bytes: u64,
    /// Seconds a watch call blocks before returning "no change"
    pub watch_timeout_s: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "127.0.0.1:8081".to_string(),
            db_path: PathBuf::from("./latch-data"),
            cache_bytes: 256 << 20,
            watch_timeout_s: latch_engine::WATCH_TIMEOUT_S,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let text = std::fs::read_to_string(path.as_ref())?;
        serde_yaml::from_str(&text).map_err(|e| Error::validation(format!("config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8081");
        assert_eq!(config.watch_timeout_s, 30);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("listen_addr: 0.0.0.0:9000\n").unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.db_path, PathBuf::from("./latch-data"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "db_path: /tmp/latch\ncache_bytes: 1048576").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/latch"));
        assert_eq!(config.cache_bytes, 1 << 20);
    }

    #[test]
    fn test_malformed_yaml_is_validation_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen_addr: [not, a, string").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(Error::Validation(_))
        ));
    }
}
