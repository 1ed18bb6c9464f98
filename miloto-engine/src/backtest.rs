use std::collections::BTreeSet;
use std::ops::Range;

use serde::Serialize;

use miloto_db::error::{MilotoError, Result};
use miloto_db::models::{validate_history, Draw, Prospect, PICK_COUNT};
use miloto_db::store::ProspectStore;

use crate::config::BacktestConfig;
use crate::gaps::compute_gaps;
use crate::prospects::generate_prospects;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRecord {
    pub draw_id: u32,
    /// Vide pour l'étape qui prédit un tirage pas encore connu.
    pub actual_numbers: BTreeSet<u32>,
    pub predicted_numbers: BTreeSet<u32>,
    pub hit_count: usize,
    pub hit_numbers: BTreeSet<u32>,
    pub prospect_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestSummary {
    pub steps: usize,
    /// Étapes comparées à un tirage réel.
    pub scored_steps: usize,
    pub total_hits: usize,
    pub mean_hits: f64,
    /// hit_histogram[k] = nombre d'étapes notées avec k numéros trouvés.
    pub hit_histogram: [usize; PICK_COUNT + 1],
    /// (tirage, numéros trouvés) de la meilleure étape notée ; la première en cas d'égalité.
    pub best_step: Option<(u32, usize)>,
}

impl BacktestSummary {
    pub fn from_records(records: &[ComparisonRecord]) -> Self {
        let scored: Vec<&ComparisonRecord> =
            records.iter().filter(|r| !r.actual_numbers.is_empty()).collect();
        let total_hits: usize = scored.iter().map(|r| r.hit_count).sum();

        let mut hit_histogram = [0usize; PICK_COUNT + 1];
        for r in &scored {
            hit_histogram[r.hit_count.min(PICK_COUNT)] += 1;
        }

        let mut best_step: Option<(u32, usize)> = None;
        for r in &scored {
            if best_step.map_or(true, |(_, hits)| r.hit_count > hits) {
                best_step = Some((r.draw_id, r.hit_count));
            }
        }

        Self {
            steps: records.len(),
            scored_steps: scored.len(),
            total_hits,
            mean_hits: if scored.is_empty() {
                0.0
            } else {
                total_hits as f64 / scored.len() as f64
            },
            hit_histogram,
            best_step,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub records: Vec<ComparisonRecord>,
    pub summary: BacktestSummary,
}

/// Trie par identifiant puis valide l'historique complet.
pub fn prepare_history(mut draws: Vec<Draw>) -> Result<Vec<Draw>> {
    draws.sort_by_key(|d| d.draw_id);
    validate_history(&draws)?;
    Ok(draws)
}

/// Compare l'union des numéros prospectés au tirage réel.
pub fn compare_prospects(
    draw_id: u32,
    actual_numbers: BTreeSet<u32>,
    prospects: &[Prospect],
) -> ComparisonRecord {
    let predicted_numbers: BTreeSet<u32> =
        prospects.iter().flat_map(|p| p.numbers).collect();
    let hit_numbers: BTreeSet<u32> = actual_numbers
        .intersection(&predicted_numbers)
        .copied()
        .collect();
    ComparisonRecord {
        draw_id,
        hit_count: hit_numbers.len(),
        actual_numbers,
        predicted_numbers,
        hit_numbers,
        prospect_count: prospects.len(),
    }
}

/// Prospects de toutes les méthodes configurées pour le tirage `target_id`,
/// lus depuis le cache ou générés sur `history` puis sauvegardés.
pub fn prospects_for_target<S: ProspectStore + ?Sized>(
    history: &[Draw],
    target_id: u32,
    config: &BacktestConfig,
    store: &mut S,
) -> Result<Vec<Prospect>> {
    let stats = compute_gaps(history)?;
    let mut prospects = Vec::new();

    for &method in &config.methods {
        let batch = match store.load(method, target_id)? {
            Some(cached) => {
                log::debug!("Tirage {} : {} prospects {} en cache", target_id, cached.len(), method);
                cached
            }
            None => {
                let generated = generate_prospects(&stats, method.into(), method, config.threshold)?;
                log::debug!("Tirage {} : {} prospects {} générés", target_id, generated.len(), method);
                store.save(&generated, method, target_id)?;
                generated
            }
        };
        prospects.extend(batch);
    }

    Ok(prospects)
}

/// Prospects pour le tirage qui suit tout l'historique connu.
pub fn prospects_for_next<S: ProspectStore + ?Sized>(
    draws: Vec<Draw>,
    config: &BacktestConfig,
    store: &mut S,
) -> Result<(u32, Vec<Prospect>)> {
    config.validate()?;
    let draws = prepare_history(draws)?;
    let next_id = next_draw_id(&draws)?;
    let prospects = prospects_for_target(&draws, next_id, config, store)
        .map_err(|e| e.at_step(draws.len(), next_id))?;
    Ok((next_id, prospects))
}

/// Identifiant du tirage qui suit l'historique ; 1 pour un historique vide.
fn next_draw_id(draws: &[Draw]) -> Result<u32> {
    match draws.last() {
        None => Ok(1),
        Some(last) => last.draw_id.checked_add(1).ok_or_else(|| {
            MilotoError::Validation(format!(
                "aucun identifiant ne peut suivre le tirage {}",
                last.draw_id
            ))
        }),
    }
}

/// Tirage visé par l'étape `idx` ; au-delà de l'historique, le tirage suivant le dernier.
fn step_target(draws: &[Draw], idx: usize) -> Result<(u32, Option<&Draw>)> {
    match draws.get(idx) {
        Some(draw) => Ok((draw.draw_id, Some(draw))),
        None => Ok((next_draw_id(draws)?, None)),
    }
}

/// Rejoue l'historique tirage par tirage : l'étape `idx` prédit `draws[idx]`
/// à partir de `draws[..idx]`.
pub struct BacktestDriver<'a, S: ProspectStore + ?Sized> {
    draws: Vec<Draw>,
    config: &'a BacktestConfig,
    store: &'a mut S,
}

impl<'a, S: ProspectStore + ?Sized> BacktestDriver<'a, S> {
    pub fn new(draws: Vec<Draw>, config: &'a BacktestConfig, store: &'a mut S) -> Result<Self> {
        config.validate()?;
        let draws = prepare_history(draws)?;
        Ok(Self { draws, config, store })
    }

    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    /// Indices d'étape ; inclut `draws.len()` quand la prédiction du tirage suivant est demandée.
    pub fn step_range(&self) -> Range<usize> {
        let n = self.draws.len();
        let end = self.config.stop_at.map_or(n, |stop| stop.min(n));
        let end = if self.config.predict_next && end == n { n + 1 } else { end };
        let start = self.config.warmup.min(end);
        start..end
    }

    pub fn step_count(&self) -> usize {
        self.step_range().len()
    }

    pub fn run_step(&mut self, idx: usize) -> Result<ComparisonRecord> {
        let (target_id, target) = step_target(&self.draws, idx)?;
        let history = &self.draws[..idx.min(self.draws.len())];

        let prospects = prospects_for_target(history, target_id, self.config, &mut *self.store)
            .map_err(|e| e.at_step(idx, target_id))?;

        let actual = target.map(Draw::number_set).unwrap_or_default();
        let record = compare_prospects(target_id, actual, &prospects);
        log::debug!(
            "Étape {} (tirage {}) : {} prospects, {} numéros trouvés",
            idx,
            target_id,
            record.prospect_count,
            record.hit_count
        );
        Ok(record)
    }

    pub fn run_with<F: FnMut(&ComparisonRecord)>(mut self, mut on_step: F) -> Result<Report> {
        let range = self.step_range();
        if range.is_empty() {
            log::warn!(
                "Historique trop court : {} tirages pour un échauffement de {}",
                self.draws.len(),
                self.config.warmup
            );
        }

        let mut records = Vec::with_capacity(range.len());
        for idx in range {
            let record = self.run_step(idx)?;
            on_step(&record);
            records.push(record);
        }

        let summary = BacktestSummary::from_records(&records);
        log::info!(
            "Backtest terminé : {} étapes, {} numéros trouvés ({:.3} par tirage)",
            summary.steps,
            summary.total_hits,
            summary.mean_hits
        );
        Ok(Report { records, summary })
    }

    pub fn run(self) -> Result<Report> {
        self.run_with(|_| {})
    }
}

pub fn run<S: ProspectStore + ?Sized>(
    draws: Vec<Draw>,
    config: &BacktestConfig,
    store: &mut S,
) -> Result<Report> {
    BacktestDriver::new(draws, config, store)?.run()
}
