//! Judge configuration persistence
//!
//! Registrations survive restarts as a JSON file. Only the configs are
//! persisted; backends are re-attached at startup by whoever wires the
//! registry.

use std::path::Path;

use thiserror::Error;

use crate::types::JudgeConfig;

/// Errors from the configuration store
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A loaded config was rejected by the registry (e.g. a hand-edited
    /// file carrying a negative weight)
    #[error("config rejected: {0}")]
    Rejected(#[from] crate::registry::RegistryError),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Write judge configs to a JSON file
pub fn save_judges(configs: &[JudgeConfig], path: &Path) -> ConfigResult<()> {
    let json = serde_json::to_string_pretty(configs)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load judge configs from a JSON file
///
/// Returns `Ok(None)` when the file does not exist yet.
pub fn load_judges(path: &Path) -> ConfigResult<Option<Vec<JudgeConfig>>> {
    if !path.exists() {
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)?;
    let configs: Vec<JudgeConfig> = serde_json::from_str(&json)?;
    Ok(Some(configs))
}

/// Delete the persisted config file
pub fn clear_judges(path: &Path) -> ConfigResult<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provider;
    use tempfile::tempdir;

    #[test]
    fn test_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("judges.json");

        let configs = vec![
            JudgeConfig::new("fast", Provider::Local).with_cost_per_unit(0.001),
            JudgeConfig::new("deep", Provider::Anthropic)
                .with_weight(1.5)
                .disabled(),
        ];
        save_judges(&configs, &path).unwrap();

        let loaded = load_judges(&path).unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "fast");
        assert_eq!(loaded[1].weight, 1.5);
        assert!(!loaded[1].enabled);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let loaded = load_judges(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("judges.json");
        save_judges(&[], &path).unwrap();
        clear_judges(&path).unwrap();
        assert!(!path.exists());
        // Clearing an already-missing file is fine
        clear_judges(&path).unwrap();
    }
}
