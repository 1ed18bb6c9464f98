use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use miloto_db::error::MilotoError;
use miloto_db::models::Method;

use crate::prospects::DEFAULT_THRESHOLD;

/// Nombre de tirages d'historique avant la première étape notée.
pub const DEFAULT_WARMUP: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub warmup: usize,
    /// Seuil strict sur la métrique pour retenir un numéro candidat.
    pub threshold: f64,
    pub methods: Vec<Method>,
    /// Ajoute une dernière étape qui prédit le tirage suivant l'historique connu.
    pub predict_next: bool,
    /// Borne exclusive sur l'index d'étape (nombre de tirages considérés).
    pub stop_at: Option<usize>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            warmup: DEFAULT_WARMUP,
            threshold: DEFAULT_THRESHOLD,
            methods: Method::ALL.to_vec(),
            predict_next: true,
            stop_at: None,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> miloto_db::error::Result<()> {
        if !self.threshold.is_finite() {
            return Err(MilotoError::Validation(format!(
                "seuil non fini : {}",
                self.threshold
            )));
        }
        let mut seen = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            if seen.contains(method) {
                return Err(MilotoError::Validation(format!("méthode en double : {}", method)));
            }
            seen.push(*method);
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<BacktestConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {:?}", path))?;
    let config: BacktestConfig = serde_json::from_str(&json)
        .with_context(|| format!("Configuration invalide dans {:?}", path))?;
    Ok(config)
}

pub fn save_config(config: &BacktestConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BacktestConfig::default();
        assert_eq!(config.warmup, 10);
        assert!((config.threshold - 0.65).abs() < 1e-12);
        assert_eq!(config.methods, vec![Method::Fusion, Method::Mean, Method::Median]);
        assert!(config.predict_next);
        assert!(config.stop_at.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: BacktestConfig =
            serde_json::from_str(r#"{"methods": ["Fusion"], "stop_at": 206}"#).unwrap();
        assert_eq!(config.methods, vec![Method::Fusion]);
        assert_eq!(config.stop_at, Some(206));
        assert_eq!(config.warmup, 10);
        assert!(config.predict_next);
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backtest.json");
        let config = BacktestConfig {
            warmup: 25,
            threshold: 0.7,
            methods: vec![Method::Median],
            predict_next: false,
            stop_at: Some(100),
        };
        save_config(&config, &path).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_threshold() {
        let config = BacktestConfig { threshold: f64::NAN, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_method() {
        let config = BacktestConfig {
            methods: vec![Method::Mean, Method::Mean],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
