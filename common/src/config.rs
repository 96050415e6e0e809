use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_POLLING_URL: &str = "http://localhost:3000/api/polling";
pub const DEFAULT_READER_INTERVAL_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// On-disk settings for the polling reader. Every field is optional; the
/// command line overrides whatever is set here.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReaderConfig {
    pub polling_url: Option<String>,
    pub interval_ms: Option<u64>,
    pub max_history: Option<usize>,
}

impl ReaderConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Config loaded from {:?}", path);
        Ok(config)
    }

    pub fn polling_url(&self) -> &str {
        self.polling_url.as_deref().unwrap_or(DEFAULT_POLLING_URL)
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms.unwrap_or(DEFAULT_READER_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReaderConfig::load(&dir.path().join("reader.json")).unwrap();
        assert_eq!(config, ReaderConfig::default());
        assert_eq!(config.polling_url(), DEFAULT_POLLING_URL);
        assert_eq!(config.interval_ms(), DEFAULT_READER_INTERVAL_MS);
    }

    #[test]
    fn test_camel_case_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"pollingUrl":"http://example.test/api/polling","intervalMs":250,"maxHistory":10}}"#
        )
        .unwrap();

        let config = ReaderConfig::load(file.path()).unwrap();
        assert_eq!(config.polling_url(), "http://example.test/api/polling");
        assert_eq!(config.interval_ms(), 250);
        assert_eq!(config.max_history, Some(10));
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = ReaderConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
