//! Config file resolution and loading.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::env::substitute_env;
use crate::schema::CapforgeConfig;
use crate::validation::validate;

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the capforge config directory.
/// Priority: `CAPFORGE_CONFIG_DIR` env > `~/.capforge/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CAPFORGE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".capforge");
    }
    PathBuf::from(".capforge")
}

/// Resolve the full path to the main config file.
pub fn config_file_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Load and parse the config from disk.
///
/// Pipeline: YAML text → `${VAR}` substitution → typed schema → validation.
/// Returns defaults if the file doesn't exist (first run).
pub async fn load_config(path: &Path) -> Result<CapforgeConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(CapforgeConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let value: serde_json::Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse config YAML at: {}", path.display()))?;
    let value = substitute_env(&value)
        .with_context(|| format!("failed to resolve env vars in: {}", path.display()))?;

    let config: CapforgeConfig = serde_json::from_value(value)
        .with_context(|| format!("invalid config structure in: {}", path.display()))?;
    validate(&config)?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("config.yaml")).await.unwrap();
        assert_eq!(config, CapforgeConfig::default());
    }

    #[tokio::test]
    async fn loads_yaml_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"session:\n  maxSessionTurns: 2\ntelemetry:\n  enabled: true\n")
            .unwrap();

        let config = load_config(file.path()).await.unwrap();
        assert_eq!(config.session.max_session_turns, 2);
        assert!(config.telemetry.enabled);
    }

    #[tokio::test]
    async fn invalid_yaml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"session: [unclosed").unwrap();
        assert!(load_config(file.path()).await.is_err());
    }

    #[tokio::test]
    async fn invalid_values_fail_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"tools:\n  maxReadBytes: 0\n").unwrap();
        let err = load_config(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("maxReadBytes"));
    }
}
