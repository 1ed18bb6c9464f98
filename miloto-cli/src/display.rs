use std::collections::BTreeMap;

use comfy_table::{Table, ContentArrangement, presets::UTF8_FULL, Cell, Color};

use crate::import::ImportResult;
use miloto_db::models::{Draw, Prospect};
use miloto_engine::backtest::{BacktestSummary, ComparisonRecord};
use miloto_engine::gaps::NumberStat;
use miloto_engine::report::format_numbers;

fn join_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:2}", n))
        .collect::<Vec<_>>()
        .join(" - ")
}

pub fn display_draws(draws: &[Draw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Tirage", "Numéros"]);

    for draw in draws {
        let mut sorted = draw.numbers;
        sorted.sort();
        table.add_row(vec![draw.draw_id.to_string(), join_numbers(&sorted)]);
    }

    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Total lignes lues : {}", result.total_records);
    println!("  Insérés           : {}", result.inserted);
    println!("  Doublons ignorés  : {}", result.skipped);
    if result.errors > 0 {
        println!("  Erreurs           : {}", result.errors);
    }
    if !result.missing.is_empty() {
        let ids = result.missing.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ");
        println!("  Tirages absents   : {}", ids);
    }
}

fn score_cell(score: f64, threshold: f64) -> Cell {
    let cell = Cell::new(format!("{:.4}", score));
    if score > threshold {
        cell.fg(Color::Green)
    } else {
        cell
    }
}

pub fn display_stats(stats: &BTreeMap<u32, NumberStat>, window: usize, threshold: f64) {
    println!("\n📊 Écarts sur les {} derniers tirages\n", window);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Numéro", "Sorties", "Écart moyen", "Écart médian", "Retard", "Moyenne", "Médiane", "Fusion",
        ]);

    let mut sorted: Vec<&NumberStat> = stats.values().collect();
    sorted.sort_by(|a, b| b.score_fusion.total_cmp(&a.score_fusion).then(a.number.cmp(&b.number)));

    for stat in sorted {
        // Un écart de fermeture ne compte pas comme une sortie
        let appearances = stat.gaps.len() - usize::from(stat.current_gap > 0);
        table.add_row(vec![
            Cell::new(format!("{:2}", stat.number)),
            Cell::new(appearances),
            Cell::new(format!("{:.2}", stat.mean_gap)),
            Cell::new(format!("{:.1}", stat.median_gap)),
            Cell::new(stat.current_gap),
            score_cell(stat.score_mean, threshold),
            score_cell(stat.score_median, threshold),
            score_cell(stat.score_fusion, threshold),
        ]);
    }
    println!("{table}");
}

pub fn display_prospects(draw_id: u32, prospects: &[Prospect], limit: usize) {
    println!("\n🎯 Prospects pour le tirage {} ({} au total)\n", draw_id, prospects.len());
    if prospects.is_empty() {
        println!("Aucun numéro au-dessus du seuil : pas de prospect.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Numéros", "Poids", "Méthode"]);

    let mut sorted = prospects.to_vec();
    sorted.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.numbers.cmp(&b.numbers)));

    for (i, p) in sorted.iter().take(limit).enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            join_numbers(&p.numbers),
            format!("{:.4}", p.weight),
            p.method.to_string(),
        ]);
    }
    println!("{table}");
}

pub fn display_comparison(records: &[ComparisonRecord]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Tirage", "Sortis", "Prospects", "Numéros prospectés", "Trouvés"]);

    for r in records {
        let hits = if r.actual_numbers.is_empty() {
            Cell::new("—")
        } else {
            let color = match r.hit_count {
                0 => Color::Red,
                1 | 2 => Color::White,
                _ => Color::Green,
            };
            Cell::new(format!("{} ({})", r.hit_count, format_numbers(&r.hit_numbers))).fg(color)
        };
        table.add_row(vec![
            Cell::new(r.draw_id),
            Cell::new(format_numbers(&r.actual_numbers)),
            Cell::new(r.prospect_count),
            Cell::new(r.predicted_numbers.len()),
            hits,
        ]);
    }
    println!("{table}");
}

pub fn display_summary(summary: &BacktestSummary) {
    println!("\n== Résumé du backtest ==\n");
    println!("  Étapes            : {}", summary.steps);
    println!("  Étapes notées     : {}", summary.scored_steps);
    println!("  Numéros trouvés   : {}", summary.total_hits);
    println!("  Moyenne / tirage  : {:.3}", summary.mean_hits);
    if let Some((draw_id, hits)) = summary.best_step {
        println!("  Meilleur tirage   : {} ({} trouvés)", draw_id, hits);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Trouvés", "Étapes"]);
    for (hits, count) in summary.hit_histogram.iter().enumerate() {
        table.add_row(vec![hits.to_string(), count.to_string()]);
    }
    println!("{table}");
}
