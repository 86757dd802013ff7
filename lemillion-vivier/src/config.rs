use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::calibrator::CalibrationSettings;
use crate::guard::DEFAULT_MAX_ATTEMPTS;
use crate::window::WindowConfig;

/// Réglages persistants du moteur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub windows: WindowConfig,
    pub calibration: CalibrationSettings,
    pub max_attempts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            windows: WindowConfig::default(),
            calibration: CalibrationSettings::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Fichier absent → configuration par défaut.
pub fn load_config(path: &Path) -> anyhow::Result<EngineConfig> {
    if !path.exists() {
        log::debug!("{} absent, configuration par défaut", path.display());
        return Ok(EngineConfig::default());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Lecture de {} impossible", path.display()))?;
    let config = serde_json::from_str(&json)
        .with_context(|| format!("Configuration invalide dans {}", path.display()))?;
    Ok(config)
}

pub fn save_config(config: &EngineConfig, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json).with_context(|| format!("Écriture de {} impossible", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::FamilyWindow;

    #[test]
    fn test_missing_file_gives_default() {
        let path = std::env::temp_dir().join("lemillion_config_absente_0f3a.json");
        let _ = std::fs::remove_file(&path);
        assert_eq!(load_config(&path).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("lemillion_config_{}.json", std::process::id()));
        let mut config = EngineConfig::default();
        config.windows.trend = FamilyWindow::last(250).with_recent(40);
        config.max_attempts = 50;
        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_attempts": 20}"#).unwrap();
        assert_eq!(config.max_attempts, 20);
        assert_eq!(config.windows, WindowConfig::default());
        assert_eq!(config.calibration.step, 10);
    }
}
