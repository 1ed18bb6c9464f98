use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{MilotoError, Result};

/// Nombre de boules par tirage (et par prospect).
pub const PICK_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    pub draw_id: u32,
    pub numbers: [u32; PICK_COUNT],
}

impl Draw {
    pub fn new(draw_id: u32, numbers: [u32; PICK_COUNT]) -> Self {
        Self { draw_id, numbers }
    }

    pub fn number_set(&self) -> BTreeSet<u32> {
        self.numbers.iter().copied().collect()
    }
}

/// Métrique de récurrence utilisée pour filtrer et pondérer un prospect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    Fusion,
    Mean,
    Median,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Fusion, Method::Mean, Method::Median];

    pub fn label(&self) -> &'static str {
        match self {
            Method::Fusion => "Fusion",
            Method::Mean => "Mean",
            Method::Median => "Median",
        }
    }

    pub fn from_label(label: &str) -> Option<Method> {
        Method::ALL.into_iter().find(|m| m.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prospect {
    /// Triés par ordre croissant.
    pub numbers: [u32; PICK_COUNT],
    pub weight: f64,
    pub method: Method,
}

impl Prospect {
    /// Identité d'un prospect : le poids n'en fait pas partie.
    pub fn key(&self) -> ([u32; PICK_COUNT], Method) {
        (self.numbers, self.method)
    }
}

pub fn validate_draw(draw: &Draw) -> Result<()> {
    if draw.draw_id == 0 {
        return Err(MilotoError::Validation(
            "identifiant de tirage nul (doit être positif)".to_string(),
        ));
    }
    if let Some(&n) = draw.numbers.iter().find(|&&n| n == 0) {
        return Err(MilotoError::Validation(format!(
            "tirage {} : numéro {} hors limites (doit être positif)",
            draw.draw_id, n
        )));
    }
    Ok(())
}

/// Vérifie chaque tirage et l'ordre strictement croissant des identifiants.
pub fn validate_history(draws: &[Draw]) -> Result<()> {
    for draw in draws {
        validate_draw(draw)?;
    }
    for pair in draws.windows(2) {
        if pair[1].draw_id <= pair[0].draw_id {
            return Err(MilotoError::Validation(format!(
                "identifiants non strictement croissants : {} puis {}",
                pair[0].draw_id, pair[1].draw_id
            )));
        }
    }
    Ok(())
}
