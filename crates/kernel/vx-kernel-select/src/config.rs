//! Resolver configuration

use serde::{Deserialize, Serialize};
use vx_core::config::{Config, ConfigError};

use crate::families::OperatorFamily;
use crate::shape::GPU_TENSOR_MAX_WIDTH;

/// Device limits and family switches.
///
/// ```toml
/// max_tensor_width = 65536
/// output_scale_epsilon = 1e-5
/// disabled_families = ["col2im"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Exclusive limit on the first two dimensions of any launched tensor.
    pub max_tensor_width: usize,
    /// Output scales below this invert to zero.
    pub output_scale_epsilon: f32,
    /// Families that always resolve as unsupported.
    pub disabled_families: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_tensor_width: GPU_TENSOR_MAX_WIDTH,
            output_scale_epsilon: 1e-5,
            disabled_families: Vec::new(),
        }
    }
}

impl ResolverConfig {
    pub fn is_disabled(&self, family: &OperatorFamily) -> bool {
        let name = family.name();
        self.disabled_families.iter().any(|f| f == name)
    }
}

impl Config for ResolverConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tensor_width < 2 || !self.max_tensor_width.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "max_tensor_width must be a power of two >= 2, got {}",
                self.max_tensor_width
            )));
        }
        if !self.output_scale_epsilon.is_finite() || self.output_scale_epsilon < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "output_scale_epsilon must be finite and >= 0, got {}",
                self.output_scale_epsilon
            )));
        }
        if let Some(unknown) = self
            .disabled_families
            .iter()
            .find(|f| !OperatorFamily::NAMES.contains(&f.as_str()))
        {
            return Err(ConfigError::Invalid(format!(
                "unknown operator family '{}'",
                unknown
            )));
        }
        Ok(())
    }

    fn defaults() -> Self {
        Self::default()
    }

    fn merge(&self, other: &Self) -> Result<Self, ConfigError> {
        let mut disabled = self.disabled_families.clone();
        for family in &other.disabled_families {
            if !disabled.contains(family) {
                disabled.push(family.clone());
            }
        }
        // Layers are deserialized with defaults filled in, so a field still at
        // its default is treated as unset.
        let defaults = Self::default();
        Ok(Self {
            max_tensor_width: if other.max_tensor_width != defaults.max_tensor_width {
                other.max_tensor_width
            } else {
                self.max_tensor_width
            },
            output_scale_epsilon: if other.output_scale_epsilon != defaults.output_scale_epsilon {
                other.output_scale_epsilon
            } else {
                self.output_scale_epsilon
            },
            disabled_families: disabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vx_core::config::ConfigBuilder;

    #[test]
    fn test_defaults_are_valid() {
        let config = ResolverConfig::defaults();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_tensor_width, 65536);
    }

    #[test]
    fn test_toml_partial_document() {
        let config = ResolverConfig::from_toml("disabled_families = [\"col2im\"]").unwrap();
        assert_eq!(config.max_tensor_width, 65536);
        assert!(config.is_disabled(&OperatorFamily::Col2Im));
        assert!(!config.is_disabled(&OperatorFamily::Erf));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ResolverConfig::default();
        config.max_tensor_width = 1000;
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::default();
        config.output_scale_epsilon = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::default();
        config.disabled_families = vec!["conv2d".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_merge_unions_disabled_families() {
        let base = ResolverConfig {
            disabled_families: vec!["tile".to_string()],
            ..ResolverConfig::default()
        };
        let layer = ResolverConfig {
            max_tensor_width: 8192,
            disabled_families: vec!["tile".to_string(), "erf".to_string()],
            ..ResolverConfig::default()
        };

        let merged = ConfigBuilder::from_base(base)
            .with_override(layer)
            .build()
            .unwrap();
        assert_eq!(merged.max_tensor_width, 8192);
        assert_eq!(merged.disabled_families, vec!["tile", "erf"]);
    }

    #[test]
    fn test_partial_file_layer_keeps_earlier_limits() {
        let dir = std::env::temp_dir().join(format!("vx-resolver-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("resolver.toml");
        std::fs::write(&path, "disabled_families = [\"col2im\"]\n").unwrap();

        let narrow = ResolverConfig {
            max_tensor_width: 8192,
            output_scale_epsilon: 1e-3,
            ..ResolverConfig::default()
        };
        let merged = ConfigBuilder::<ResolverConfig>::with_defaults()
            .with_override(narrow)
            .with_file(&path)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(merged.max_tensor_width, 8192);
        assert_eq!(merged.output_scale_epsilon, 1e-3);
        assert_eq!(merged.disabled_families, vec!["col2im"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
