use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::geometry::{preset, GeometryError, MaterialLayer, DEFAULT_PRESET, PRESET_NAMES};
use crate::recorder::ConversionSettings;

/// Run configuration as read from YAML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub general: GeneralConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Number of primaries to simulate
    pub events: u64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Two-column energy spectrum; relative paths are taken from the config file's directory
    #[serde(default = "default_spectrum")]
    pub spectrum: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Layer stack, either a preset keyword or an explicit list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeometryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<MaterialLayer>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionConfig {
    #[serde(default = "default_threshold")]
    pub threshold: u64,
    /// eV per ionization electron for the energy column of the conversion tree
    #[serde(default = "default_w_value")]
    pub w_value: f64,
}

fn default_seed() -> u64 {
    12345
}

fn default_spectrum() -> PathBuf {
    PathBuf::from("xray-spectrum.csv")
}

fn default_threshold() -> u64 {
    20
}

fn default_w_value() -> f64 {
    31.2
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            events: 100_000,
            seed: default_seed(),
            spectrum: default_spectrum(),
            log_level: Some("info".to_string()),
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            w_value: default_w_value(),
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.general.spectrum.as_os_str().is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "spectrum path cannot be empty".to_string(),
            ));
        }
        if let Some(level) = &self.general.log_level {
            if !["error", "warn", "info", "debug", "trace", "off"].contains(&level.to_lowercase().as_str()) {
                return Err(ValidationError::InvalidGeneral(format!("unknown log level '{}'", level)));
            }
        }

        match (&self.geometry.preset, &self.geometry.layers) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::InvalidGeometry(
                    "give either a preset or a layer list, not both".to_string(),
                ));
            }
            (Some(name), None) => {
                if preset(name).is_none() {
                    return Err(ValidationError::InvalidGeometry(format!(
                        "unknown preset '{}' (known: {})",
                        name,
                        PRESET_NAMES.join(", ")
                    )));
                }
            }
            (None, Some(layers)) => {
                if layers.iter().all(MaterialLayer::is_vacuum) {
                    return Err(ValidationError::InvalidGeometry(
                        "layer list has no solid layers".to_string(),
                    ));
                }
                for (i, layer) in layers.iter().enumerate() {
                    if !(layer.thickness.is_finite() && layer.thickness > 0.0) {
                        return Err(ValidationError::InvalidGeometry(format!(
                            "layer {} ({}) has thickness {} mm",
                            i, layer.material, layer.thickness
                        )));
                    }
                }
            }
            (None, None) => {}
        }

        if !(self.conversion.w_value.is_finite() && self.conversion.w_value > 0.0) {
            return Err(ValidationError::InvalidConversion(format!(
                "w_value must be positive, got {}",
                self.conversion.w_value
            )));
        }
        Ok(())
    }

    /// Layer stack for this run; a keyword given on the command line wins
    pub fn resolve_layers(&self, keyword: Option<&str>) -> Result<Vec<MaterialLayer>, GeometryError> {
        if let Some(name) = keyword {
            return preset(name).ok_or_else(|| GeometryError::UnknownPreset(name.to_string()));
        }
        if let Some(layers) = &self.geometry.layers {
            return Ok(layers.clone());
        }
        let name = self.geometry.preset.as_deref().unwrap_or(DEFAULT_PRESET);
        preset(name).ok_or_else(|| GeometryError::UnknownPreset(name.to_string()))
    }

    /// Anchor a relative spectrum path at `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.general.spectrum.is_relative() {
            self.general.spectrum = base.join(&self.general.spectrum);
        }
    }

    pub fn conversion_settings(&self) -> ConversionSettings {
        ConversionSettings {
            threshold: self.conversion.threshold,
            w_value: self.conversion.w_value,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid geometry configuration: {0}")]
    InvalidGeometry(String),
    #[error("Invalid conversion configuration: {0}")]
    InvalidConversion(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = config("general:\n  events: 10\n");
        assert_eq!(cfg.general.seed, 12345);
        assert_eq!(cfg.general.spectrum, PathBuf::from("xray-spectrum.csv"));
        assert_eq!(cfg.conversion, ConversionConfig::default());
        assert!(cfg.validate().is_ok());
        let layers = cfg.resolve_layers(None).unwrap();
        assert_eq!(layers, preset(DEFAULT_PRESET).unwrap());
    }

    #[test]
    fn test_keyword_overrides_config() {
        let cfg = config(
            r#"
general:
  events: 10
geometry:
  layers:
    - { material: pvc, thickness: 1.0 }
"#,
        );
        assert_eq!(cfg.resolve_layers(None).unwrap(), vec![MaterialLayer::new("pvc", 1.0)]);
        assert_eq!(cfg.resolve_layers(Some("10x10")).unwrap(), preset("10x10").unwrap());
        assert!(matches!(
            cfg.resolve_layers(Some("bogus")),
            Err(GeometryError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_validation_errors() {
        // An empty run is valid; it just produces no output file
        let zero = config("general:\n  events: 0\n");
        assert!(zero.validate().is_ok());

        let both = config("general:\n  events: 1\ngeometry:\n  preset: ME0\n  layers: []\n");
        assert!(matches!(both.validate(), Err(ValidationError::InvalidGeometry(_))));

        let unknown = config("general:\n  events: 1\ngeometry:\n  preset: me0\n");
        assert!(matches!(unknown.validate(), Err(ValidationError::InvalidGeometry(_))));

        let vacuum = config("general:\n  events: 1\ngeometry:\n  layers:\n    - { material: vacuum, thickness: 2 }\n");
        assert!(matches!(vacuum.validate(), Err(ValidationError::InvalidGeometry(_))));

        let w = config("general:\n  events: 1\nconversion:\n  w_value: 0\n");
        assert!(matches!(w.validate(), Err(ValidationError::InvalidConversion(_))));

        let level = config("general:\n  events: 1\n  log_level: loud\n");
        assert!(matches!(level.validate(), Err(ValidationError::InvalidGeneral(_))));
    }

    #[test]
    fn test_resolve_relative_spectrum() {
        let mut cfg = config("general:\n  events: 1\n  spectrum: data/spectrum.csv\n");
        cfg.resolve_paths(Path::new("/runs"));
        assert_eq!(cfg.general.spectrum, PathBuf::from("/runs/data/spectrum.csv"));

        let mut abs = config("general:\n  events: 1\n  spectrum: /tmp/s.csv\n");
        abs.resolve_paths(Path::new("/runs"));
        assert_eq!(abs.general.spectrum, PathBuf::from("/tmp/s.csv"));
    }

    #[test]
    fn test_conversion_settings() {
        let cfg = config("general:\n  events: 1\nconversion:\n  threshold: 50\n");
        let settings = cfg.conversion_settings();
        assert_eq!(settings.threshold, 50);
        assert_eq!(settings.w_value, 31.2);
    }
}
