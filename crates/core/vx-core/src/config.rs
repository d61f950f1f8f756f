//! Configuration management
//!
//! A small trait shared by every configurable component, plus a builder that
//! layers defaults, files and explicit overrides.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Common configuration interface.
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use vx_core::config::{Config, ConfigError};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct CacheConfig {
///     capacity: usize,
/// }
///
/// impl Config for CacheConfig {
///     fn validate(&self) -> Result<(), ConfigError> {
///         if self.capacity == 0 {
///             return Err(ConfigError::Invalid("capacity must be > 0".to_string()));
///         }
///         Ok(())
///     }
///
///     fn defaults() -> Self {
///         Self { capacity: 64 }
///     }
///
///     fn merge(&self, other: &Self) -> Result<Self, ConfigError> {
///         Ok(other.clone())
///     }
/// }
///
/// let config = CacheConfig::from_toml("capacity = 8").unwrap();
/// assert!(config.validate().is_ok());
/// ```
pub trait Config: Serialize + DeserializeOwned {
    /// Check the configuration for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a field is out of range.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Built-in defaults.
    fn defaults() -> Self;

    /// Merge `other` over `self`; `other` has the higher priority.
    fn merge(&self, other: &Self) -> Result<Self, ConfigError>
    where
        Self: Sized;

    /// Parse from a TOML document.
    fn from_toml(toml: &str) -> Result<Self, ConfigError>
    where
        Self: Sized,
    {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(format!("TOML parse error: {}", e)))
    }

    /// Parse from a JSON document.
    fn from_json(json: &str) -> Result<Self, ConfigError>
    where
        Self: Sized,
    {
        serde_json::from_str(json)
            .map_err(|e| ConfigError::Parse(format!("JSON parse error: {}", e)))
    }

    fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(format!("TOML serialize error: {}", e)))
    }

    fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(format!("JSON serialize error: {}", e)))
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration merge conflict: {0}")]
    MergeConflict(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Layers configuration sources.
///
/// Priority, lowest first: defaults, files in the order added, overrides in
/// the order added.
///
/// ```rust,ignore
/// let config = ConfigBuilder::<ResolverConfig>::with_defaults()
///     .with_file("resolver.toml")?
///     .build()?;
/// ```
pub struct ConfigBuilder<C: Config> {
    base: C,
    layers: Vec<C>,
}

impl<C: Config> ConfigBuilder<C> {
    /// Start from [`Config::defaults`].
    pub fn with_defaults() -> Self {
        Self {
            base: C::defaults(),
            layers: Vec::new(),
        }
    }

    /// Start from an explicit base configuration.
    pub fn from_base(base: C) -> Self {
        Self {
            base,
            layers: Vec::new(),
        }
    }

    /// Add a TOML file as the next layer.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

        self.layers.push(C::from_toml(&content)?);
        Ok(self)
    }

    /// Add an in-memory configuration as the next layer.
    pub fn with_override(mut self, config: C) -> Self {
        self.layers.push(config);
        self
    }

    /// Merge all layers and validate the result.
    pub fn build(self) -> Result<C, ConfigError> {
        let mut current = self.base;
        for layer in &self.layers {
            current = current.merge(layer)?;
        }

        current.validate()?;
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct LimitsConfig {
        max_width: u32,
        label: String,
    }

    impl Config for LimitsConfig {
        fn validate(&self) -> Result<(), ConfigError> {
            if self.max_width == 0 {
                return Err(ConfigError::Invalid("max_width must be > 0".to_string()));
            }
            Ok(())
        }

        fn defaults() -> Self {
            Self {
                max_width: 65536,
                label: "default".to_string(),
            }
        }

        fn merge(&self, other: &Self) -> Result<Self, ConfigError> {
            Ok(Self {
                max_width: other.max_width,
                label: if other.label.is_empty() {
                    self.label.clone()
                } else {
                    other.label.clone()
                },
            })
        }
    }

    #[test]
    fn test_from_toml_and_back() {
        let config = LimitsConfig::from_toml("max_width = 4096\nlabel = \"gpu\"").unwrap();
        assert_eq!(config.max_width, 4096);

        let text = config.to_toml().unwrap();
        assert!(text.contains("max_width = 4096"));
        assert!(text.contains("label = \"gpu\""));
    }

    #[test]
    fn test_from_json() {
        let config = LimitsConfig::from_json(r#"{"max_width": 8, "label": ""}"#).unwrap();
        assert_eq!(config.max_width, 8);
        assert!(config.label.is_empty());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = LimitsConfig::from_toml("max_width = \"wide\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_builder_layers_in_order() {
        let config = ConfigBuilder::<LimitsConfig>::with_defaults()
            .with_override(LimitsConfig {
                max_width: 1024,
                label: "first".to_string(),
            })
            .with_override(LimitsConfig {
                max_width: 2048,
                label: String::new(),
            })
            .build()
            .unwrap();

        assert_eq!(config.max_width, 2048);
        assert_eq!(config.label, "first");
    }

    #[test]
    fn test_builder_validates() {
        let err = ConfigBuilder::from_base(LimitsConfig::defaults())
            .with_override(LimitsConfig {
                max_width: 0,
                label: "broken".to_string(),
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file() {
        let result =
            ConfigBuilder::<LimitsConfig>::with_defaults().with_file("/nonexistent/limits.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
