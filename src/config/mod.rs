//! Configuration loading and management

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default session pool bound of the in-memory store
pub const DEFAULT_POOL_SIZE: usize = 64;

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

/// Per-resource overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Reject list requests with 405
    #[serde(default)]
    pub no_list: Option<bool>,

    /// Forced page size of list requests
    #[serde(default)]
    pub list_limit: Option<u64>,
}

/// Complete configuration of a resource API
///
/// ```yaml
/// base_url: /api
/// pool_size: 16
/// resources:
///   comments:
///     no_list: true
///   posts:
///     list_limit: 50
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Prefix of generated links
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default)]
    pub resources: HashMap<String, ResourceConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            pool_size: DEFAULT_POOL_SIZE,
            resources: HashMap::new(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Overrides for a resource
    pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_yaml_str() {
        let config = ApiConfig::from_yaml_str(
            r#"
base_url: /api
resources:
  comments:
    no_list: true
  posts:
    list_limit: 50
"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "/api");
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.resource("comments").unwrap().no_list, Some(true));
        assert_eq!(config.resource("posts").unwrap().list_limit, Some(50));
        assert!(config.resource("selections").is_none());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = ApiConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, ApiConfig::default());
    }

    #[test]
    fn test_invalid_yaml_is_load_error() {
        let result = ApiConfig::from_yaml_str("pool_size: many");
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pool_size: 4").unwrap();
        writeln!(file, "resources:").unwrap();
        writeln!(file, "  posts:").unwrap();
        writeln!(file, "    no_list: false").unwrap();

        let config = ApiConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.resource("posts").unwrap().no_list, Some(false));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let result = ApiConfig::from_yaml_file("/nonexistent/api.yaml");
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
