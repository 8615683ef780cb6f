use grok_loader::LoaderConfig;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Configuration for a [`Store`](crate::Store).
///
/// Every field has a default, so a TOML document only needs the keys it
/// changes:
///
/// ```toml
/// api_prefix = "/api"
/// max_batch_size = 50
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path prepended to every endpoint.
    pub api_prefix: String,
    /// Largest number of ids fetched in one batch request; unbounded when
    /// absent.
    pub max_batch_size: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api".into(),
            max_batch_size: None,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(source: &str) -> StoreResult<Self> {
        toml::from_str(source).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            max_batch_size: self.max_batch_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.api_prefix, "/api");
        assert!(c.max_batch_size.is_none());
        assert_eq!(c.loader_config(), LoaderConfig::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = StoreConfig::from_toml_str("max_batch_size = 25").unwrap();
        assert_eq!(c.api_prefix, "/api");
        assert_eq!(c.loader_config().max_batch_size, Some(25));

        let c = StoreConfig::from_toml_str("api_prefix = \"/v2\"").unwrap();
        assert_eq!(c.api_prefix, "/v2");
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = StoreConfig::from_toml_str("max_batch_size = \"many\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
