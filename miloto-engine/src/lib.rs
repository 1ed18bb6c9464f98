pub mod backtest;
pub mod config;
pub mod gaps;
pub mod prospects;
pub mod report;
pub mod source;

use miloto_db::models::Draw;

/// Historique cyclique de période 8 : le groupe `i % 8` sort les numéros 5g+1..5g+5.
pub fn make_test_draws(n: usize) -> Vec<Draw> {
    (0..n)
        .map(|i| {
            let base = (i % 8) as u32 * 5;
            Draw::new(
                i as u32 + 1,
                [base + 1, base + 2, base + 3, base + 4, base + 5],
            )
        })
        .collect()
}
