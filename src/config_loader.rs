use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load, anchor and validate a run configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open config file {}", config_path.display()))?;

    let mut config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse config file {}", config_path.display()))?;

    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base);

    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
general:
  events: 500
  seed: 7
  spectrum: "xray-spectrum.csv"
geometry:
  preset: "ME0"
conversion:
  threshold: 20
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.general.events, 500);
        assert_eq!(config.general.seed, 7);
        assert_eq!(config.geometry.preset.as_deref(), Some("ME0"));
        // Relative spectrum path is anchored next to the config
        let dir = temp_file.path().parent().unwrap();
        assert_eq!(config.general.spectrum, dir.join("xray-spectrum.csv"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "general:\n  events: 1\n  log_level: loud\n").unwrap();
        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_malformed_yaml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "general: [not, a, map\n").unwrap();
        let err = load_config(temp_file.path()).unwrap_err();
        assert!(format!("{:?}", err).contains("Failed to parse"));
    }

    #[test]
    fn test_missing_file() {
        assert!(load_config(Path::new("/nonexistent/run.yaml")).is_err());
    }
}
