//! Search configuration injected into the session and fetch engine.
//!
//! The core never reads configuration from ambient global state: a
//! [`SearchConfig`] is constructed by the caller (defaults, a TOML file, or
//! CLI overrides) and passed down explicitly.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default index node queried when none is specified.
pub const DEFAULT_INDEX_NODE: &str = "esgf-node.ipsl.upmc.fr";

/// Default number of documents requested per page.
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Default maximum concurrent requests per index host.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default per-request HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

/// Maximum allowed per-host concurrency.
const MAX_MAX_CONCURRENT: usize = 50;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or has unknown fields.
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// `page_limit` must be at least 1 for page-mode requests.
    #[error("invalid page_limit {value}: must be at least 1")]
    InvalidPageLimit {
        /// The invalid value that was provided.
        value: usize,
    },

    /// `max_concurrent` outside the supported range.
    #[error("invalid max_concurrent {value}: must be between 1 and {MAX_MAX_CONCURRENT}")]
    InvalidMaxConcurrent {
        /// The invalid value that was provided.
        value: usize,
    },

    /// `http_timeout_secs` of zero would make every request fail.
    #[error("invalid http_timeout_secs: must be at least 1")]
    InvalidTimeout,
}

/// Configuration surface consumed by the search core.
///
/// All fields have defaults, so a partial TOML file (or an empty one) is
/// valid. The struct is cheap to clone and is cloned into the [`Session`]
/// rather than shared.
///
/// [`Session`]: crate::search::Session
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Hostname of the default index node.
    pub index_node: String,
    /// Per-request HTTP timeout in seconds.
    pub http_timeout_secs: u64,
    /// Maximum documents per paginated request.
    pub page_limit: usize,
    /// Maximum concurrent in-flight requests per index host.
    pub max_concurrent: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_node: DEFAULT_INDEX_NODE.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            page_limit: DEFAULT_PAGE_LIMIT,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl SearchConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid TOML, or a validation
    /// error for out-of-range values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates field ranges.
    ///
    /// # Errors
    ///
    /// Returns the corresponding [`ConfigError`] variant for the first
    /// out-of-range field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_limit == 0 {
            return Err(ConfigError::InvalidPageLimit {
                value: self.page_limit,
            });
        }
        if !(1..=MAX_MAX_CONCURRENT).contains(&self.max_concurrent) {
            return Err(ConfigError::InvalidMaxConcurrent {
                value: self.max_concurrent,
            });
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Returns the per-request timeout as a [`Duration`].
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SearchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.index_node, DEFAULT_INDEX_NODE);
        assert_eq!(config.page_limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.http_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "page_limit = 10").unwrap();
        let config = SearchConfig::load(file.path()).unwrap();
        assert_eq!(config.page_limit, 10);
        assert_eq!(config.index_node, DEFAULT_INDEX_NODE);
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "page_size = 10").unwrap();
        let result = SearchConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = SearchConfig::load(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_page_limit() {
        let config = SearchConfig {
            page_limit: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPageLimit { value: 0 })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_concurrency() {
        for value in [0, 51] {
            let config = SearchConfig {
                max_concurrent: value,
                ..SearchConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidMaxConcurrent { .. })
            ));
        }
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = SearchConfig {
            http_timeout_secs: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }
}
