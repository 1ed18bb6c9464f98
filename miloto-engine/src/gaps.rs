use std::collections::BTreeMap;

use serde::Serialize;

use miloto_db::error::Result;
use miloto_db::models::{validate_history, Draw, Method};

/// Score de récurrence servant de métrique de filtrage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    ScoreMean,
    ScoreMedian,
    ScoreFusion,
}

impl From<Method> for Metric {
    fn from(method: Method) -> Self {
        match method {
            Method::Fusion => Metric::ScoreFusion,
            Method::Mean => Metric::ScoreMean,
            Method::Median => Metric::ScoreMedian,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberStat {
    pub number: u32,
    /// Écart d'ouverture, écarts entre apparitions, puis écart de fermeture éventuel.
    pub gaps: Vec<u32>,
    pub mean_gap: f64,
    pub median_gap: f64,
    /// Tirages écoulés depuis la dernière apparition.
    pub current_gap: u32,
    pub score_mean: f64,
    pub score_median: f64,
    pub score_fusion: f64,
}

impl NumberStat {
    pub fn score(&self, metric: Metric) -> f64 {
        match metric {
            Metric::ScoreMean => self.score_mean,
            Metric::ScoreMedian => self.score_median,
            Metric::ScoreFusion => self.score_fusion,
        }
    }
}

/// Statistiques d'écart par numéro sur une fenêtre d'historique (ordre chronologique).
///
/// Les cinq positions d'un tirage sont interchangeables. Un numéro jamais sorti dans
/// la fenêtre est absent du résultat ; une fenêtre vide donne une table vide.
pub fn compute_gaps(window: &[Draw]) -> Result<BTreeMap<u32, NumberStat>> {
    validate_history(window)?;
    let (first, last) = match (window.first(), window.last()) {
        (Some(first), Some(last)) => (first.draw_id, last.draw_id),
        _ => return Ok(BTreeMap::new()),
    };

    let mut appearances: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for draw in window {
        for &n in &draw.numbers {
            appearances.entry(n).or_default().push(draw.draw_id);
        }
    }

    let stats = appearances
        .into_iter()
        .filter_map(|(number, ids)| {
            let stat = number_stat(number, &ids, first, last)?;
            Some((number, stat))
        })
        .collect();
    Ok(stats)
}

fn number_stat(number: u32, ids: &[u32], window_start: u32, window_end: u32) -> Option<NumberStat> {
    let first_seen = *ids.first()?;
    let last_seen = *ids.last()?;

    let mut gaps = Vec::with_capacity(ids.len() + 1);
    gaps.push(first_seen - window_start);
    gaps.extend(ids.windows(2).map(|w| w[1] - w[0]));
    if last_seen < window_end {
        gaps.push(window_end - last_seen);
    }

    let mean_gap = mean(&gaps);
    let median_gap = median(&gaps);
    let current_gap = window_end - last_seen;

    let score_mean = ratio_score(current_gap as f64, mean_gap);
    let score_median = ratio_score(current_gap as f64, median_gap);

    Some(NumberStat {
        number,
        gaps,
        mean_gap,
        median_gap,
        current_gap,
        score_mean,
        score_median,
        score_fusion: (score_mean + score_median) / 2.0,
    })
}

fn mean(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

fn median(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    } else {
        sorted[mid] as f64
    }
}

/// min/max entre l'écart courant et la tendance centrale ; 1 si l'un des deux est nul.
pub fn ratio_score(current: f64, central: f64) -> f64 {
    if current <= 0.0 || central <= 0.0 {
        return 1.0;
    }
    current.min(central) / current.max(central)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::make_test_draws;
    use miloto_db::error::MilotoError;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Tirages 1..=12, le 7 sort aux tirages 2, 5 et 9.
    fn seven_history() -> Vec<Draw> {
        (1..=12u32)
            .map(|id| {
                let first = if [2, 5, 9].contains(&id) { 7 } else { 30 + id };
                Draw::new(id, [first, 1, 2, 3, 4])
            })
            .collect()
    }

    #[test]
    fn test_seven_scenario() {
        let stats = compute_gaps(&seven_history()).unwrap();
        let seven = &stats[&7];
        assert_eq!(seven.gaps, vec![1, 3, 4, 3]);
        assert!((seven.mean_gap - 2.75).abs() < 1e-12);
        assert!((seven.median_gap - 3.0).abs() < 1e-12);
        assert_eq!(seven.current_gap, 3);
        assert!((seven.score_mean - 2.75 / 3.0).abs() < 1e-12);
        assert!((seven.score_median - 1.0).abs() < 1e-12);
        assert!((seven.score_fusion - (2.75 / 3.0 + 1.0) / 2.0).abs() < 1e-12);
        assert!((seven.score_fusion - 0.9583).abs() < 1e-4);
    }

    #[test]
    fn test_absent_numbers_excluded() {
        let stats = compute_gaps(&seven_history()).unwrap();
        assert!(!stats.contains_key(&8));
        assert!(!stats.contains_key(&43));
        // 1..4 sortent à chaque tirage, 31..42 sauf 32/35/39, plus le 7
        assert_eq!(stats.len(), 4 + 1 + 9);
    }

    #[test]
    fn test_number_in_every_draw() {
        let stats = compute_gaps(&seven_history()).unwrap();
        let one = &stats[&1];
        // Ouverture nulle puis onze écarts de 1, pas d'écart de fermeture
        assert_eq!(one.gaps.len(), 12);
        assert_eq!(one.gaps[0], 0);
        assert_eq!(one.current_gap, 0);
        assert_eq!(one.score_mean, 1.0);
        assert_eq!(one.score_median, 1.0);
    }

    #[test]
    fn test_trailing_gap_only_when_not_last() {
        let stats = compute_gaps(&seven_history()).unwrap();
        // 42 sort au dernier tirage (12) : aucun écart de fermeture
        let last = &stats[&42];
        assert_eq!(last.gaps, vec![11]);
        assert_eq!(last.current_gap, 0);
        // 41 sort au tirage 11 : fermeture de 1
        let before = &stats[&41];
        assert_eq!(before.gaps, vec![10, 1]);
        assert_eq!(before.current_gap, 1);
    }

    #[test]
    fn test_empty_window() {
        assert!(compute_gaps(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_single_draw_window() {
        let stats = compute_gaps(&[Draw::new(5, [1, 2, 3, 4, 5])]).unwrap();
        assert_eq!(stats.len(), 5);
        for stat in stats.values() {
            assert_eq!(stat.gaps, vec![0]);
            assert_eq!(stat.score_fusion, 1.0);
        }
    }

    #[test]
    fn test_rejects_non_increasing_ids() {
        let draws = vec![Draw::new(3, [1, 2, 3, 4, 5]), Draw::new(2, [1, 2, 3, 4, 5])];
        assert!(matches!(compute_gaps(&draws), Err(MilotoError::Validation(_))));
    }

    #[test]
    fn test_rejects_zero_number() {
        let draws = vec![Draw::new(1, [0, 2, 3, 4, 5])];
        assert!(matches!(compute_gaps(&draws), Err(MilotoError::Validation(_))));
    }

    #[test]
    fn test_ratio_score() {
        assert_eq!(ratio_score(3.0, 3.0), 1.0);
        assert!((ratio_score(2.0, 8.0) - 0.25).abs() < 1e-12);
        assert!((ratio_score(8.0, 2.0) - 0.25).abs() < 1e-12);
        assert_eq!(ratio_score(0.0, 4.0), 1.0);
        assert_eq!(ratio_score(4.0, 0.0), 1.0);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[4, 1, 3]), 3.0);
        assert_eq!(median(&[4, 1, 3, 2]), 2.5);
    }

    #[test]
    fn test_synthetic_histories_invariants() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let len = rng.random_range(1..60usize);
            let mut id = 0u32;
            let draws: Vec<Draw> = (0..len)
                .map(|_| {
                    id += rng.random_range(1..3u32);
                    let mut numbers = [0u32; 5];
                    for n in &mut numbers {
                        *n = rng.random_range(1..=43);
                    }
                    Draw::new(id, numbers)
                })
                .collect();

            let stats = compute_gaps(&draws).unwrap();
            let seen: std::collections::BTreeSet<u32> =
                draws.iter().flat_map(|d| d.numbers).collect();
            assert_eq!(stats.keys().copied().collect::<std::collections::BTreeSet<_>>(), seen);

            for stat in stats.values() {
                assert!(!stat.gaps.is_empty());
                for score in [stat.score_mean, stat.score_median, stat.score_fusion] {
                    assert!((0.0..=1.0).contains(&score), "score = {}", score);
                }
                assert_eq!(stat.score_fusion, (stat.score_mean + stat.score_median) / 2.0);
            }
        }
    }

    #[test]
    fn test_metric_mapping() {
        let stats = compute_gaps(&make_test_draws(20)).unwrap();
        let stat = stats.values().next().unwrap();
        assert_eq!(stat.score(Metric::from(Method::Fusion)), stat.score_fusion);
        assert_eq!(stat.score(Metric::from(Method::Mean)), stat.score_mean);
        assert_eq!(stat.score(Metric::from(Method::Median)), stat.score_median);
    }
}
