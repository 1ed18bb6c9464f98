use std::ops::RangeInclusive;

use anyhow::Result;

use miloto_db::models::Draw;

/// Fournisseur de tirages par identifiant (scraper, fichier, base...).
pub trait DrawFetcher {
    /// `Ok(None)` quand le tirage n'existe pas chez le fournisseur.
    fn fetch(&self, draw_id: u32) -> Result<Option<Draw>>;
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub draws: Vec<Draw>,
    pub missing: Vec<u32>,
}

/// Récupère chaque tirage de la plage ; les absents sont notés et ignorés.
pub fn collect_draws(fetcher: &dyn DrawFetcher, ids: RangeInclusive<u32>) -> Result<FetchOutcome> {
    let mut outcome = FetchOutcome::default();
    for draw_id in ids {
        match fetcher.fetch(draw_id)? {
            Some(draw) => outcome.draws.push(draw),
            None => {
                log::warn!("Tirage {} non trouvé", draw_id);
                outcome.missing.push(draw_id);
            }
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Fixed(HashMap<u32, Draw>);

    impl DrawFetcher for Fixed {
        fn fetch(&self, draw_id: u32) -> Result<Option<Draw>> {
            Ok(self.0.get(&draw_id).cloned())
        }
    }

    struct Failing;

    impl DrawFetcher for Failing {
        fn fetch(&self, draw_id: u32) -> Result<Option<Draw>> {
            anyhow::bail!("connexion refusée pour {}", draw_id)
        }
    }

    #[test]
    fn test_collect_skips_missing() {
        let fetcher = Fixed(
            [1, 2, 4]
                .into_iter()
                .map(|id| (id, Draw::new(id, [1, 2, 3, 4, 5])))
                .collect(),
        );
        let outcome = collect_draws(&fetcher, 1..=5).unwrap();
        assert_eq!(outcome.draws.iter().map(|d| d.draw_id).collect::<Vec<_>>(), vec![1, 2, 4]);
        assert_eq!(outcome.missing, vec![3, 5]);
    }

    #[test]
    fn test_collect_propagates_failures() {
        assert!(collect_draws(&Failing, 1..=3).is_err());
    }
}
