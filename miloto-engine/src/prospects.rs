use std::collections::BTreeMap;

use miloto_db::error::{MilotoError, Result};
use miloto_db::models::{Method, Prospect, PICK_COUNT};

use crate::gaps::{Metric, NumberStat};

pub const DEFAULT_THRESHOLD: f64 = 0.65;

/// Au-delà, l'énumération devient coûteuse ; on prévient sans plafonner.
const LARGE_COMBINATION_COUNT: u128 = 100_000;

/// Combinaisons de `k` indices parmi `0..n`, en ordre lexicographique.
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self.indices.clone();

        let k = self.indices.len();
        let mut i = k;
        loop {
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
            if self.indices[i] != i + self.n - k {
                self.indices[i] += 1;
                for j in (i + 1)..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                break;
            }
        }

        Some(current)
    }
}

pub fn binomial(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1u128, |acc, i| acc * (n - i) as u128 / (i as u128 + 1))
}

/// Candidats retenus : métrique strictement supérieure au seuil, triés par
/// métrique décroissante puis numéro croissant.
pub fn select_candidates(
    stats: &BTreeMap<u32, NumberStat>,
    metric: Metric,
    label: Method,
    threshold: f64,
) -> Result<Vec<(u32, f64)>> {
    let mut candidates = Vec::new();
    for stat in stats.values() {
        let value = stat.score(metric);
        if value.is_nan() {
            return Err(MilotoError::Generation {
                method: label,
                reason: format!("score non comparable pour le numéro {}", stat.number),
            });
        }
        if value > threshold {
            candidates.push((stat.number, value));
        }
    }
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    Ok(candidates)
}

/// Toutes les combinaisons de cinq candidats, pondérées par la somme de la métrique
/// et triées par poids décroissant (à poids égal, par numéros croissants).
pub fn generate_prospects(
    stats: &BTreeMap<u32, NumberStat>,
    metric: Metric,
    label: Method,
    threshold: f64,
) -> Result<Vec<Prospect>> {
    let candidates = select_candidates(stats, metric, label, threshold)?;
    if candidates.len() < PICK_COUNT {
        return Ok(Vec::new());
    }

    let expected = binomial(candidates.len(), PICK_COUNT);
    if expected > LARGE_COMBINATION_COUNT {
        log::warn!(
            "{} : {} candidats au-dessus de {}, {} combinaisons à énumérer",
            label,
            candidates.len(),
            threshold,
            expected
        );
    }

    let mut prospects: Vec<Prospect> = Combinations::new(candidates.len(), PICK_COUNT)
        .map(|combo| {
            let mut numbers = [0u32; PICK_COUNT];
            let mut weight = 0.0f64;
            for (slot, &idx) in combo.iter().enumerate() {
                let (number, value) = candidates[idx];
                numbers[slot] = number;
                weight += value;
            }
            numbers.sort_unstable();
            Prospect { numbers, weight, method: label }
        })
        .collect();

    prospects.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.numbers.cmp(&b.numbers))
    });
    Ok(prospects)
}
