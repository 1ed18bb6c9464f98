use thiserror::Error;

use crate::models::Method;

#[derive(Debug, Error)]
pub enum MilotoError {
    /// Tirage mal formé ou historique mal ordonné.
    #[error("données invalides : {0}")]
    Validation(String),

    /// Stockage des prospects illisible ou impossible à écrire (distinct d'une absence).
    #[error("persistance des prospects {method} du tirage {draw_id} : {reason}")]
    Persistence {
        draw_id: u32,
        method: Method,
        reason: String,
    },

    #[error("génération des prospects {method} : {reason}")]
    Generation { method: Method, reason: String },

    /// Échec d'une étape du backtest ; `source` porte la cause.
    #[error("étape {step} (tirage {draw_id}) : {source}")]
    Step {
        step: usize,
        draw_id: u32,
        #[source]
        source: Box<MilotoError>,
    },
}

impl MilotoError {
    pub fn persistence(draw_id: u32, method: Method, reason: impl std::fmt::Display) -> Self {
        MilotoError::Persistence {
            draw_id,
            method,
            reason: reason.to_string(),
        }
    }

    pub fn at_step(self, step: usize, draw_id: u32) -> Self {
        MilotoError::Step {
            step,
            draw_id,
            source: Box::new(self),
        }
    }
}

pub type Result<T, E = MilotoError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MilotoError::Validation("test".to_string());
        assert!(err.to_string().contains("données invalides"));
    }

    #[test]
    fn test_persistence_names_key() {
        let err = MilotoError::persistence(42, Method::Median, "disque plein");
        let msg = err.to_string();
        assert!(msg.contains("Median"));
        assert!(msg.contains("42"));
        assert!(msg.contains("disque plein"));
    }

    #[test]
    fn test_step_wraps_source() {
        let err = MilotoError::Generation {
            method: Method::Fusion,
            reason: "NaN".to_string(),
        }
        .at_step(17, 118);
        let msg = err.to_string();
        assert!(msg.contains("étape 17"));
        assert!(msg.contains("tirage 118"));
        assert!(msg.contains("Fusion"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
