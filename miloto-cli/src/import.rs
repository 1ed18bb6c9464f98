use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use miloto_db::rusqlite::Connection;

use miloto_db::db::insert_draw;
use miloto_db::models::{Draw, PICK_COUNT, validate_draw};
use miloto_engine::source::{DrawFetcher, collect_draws};

fn parse_record(record: &csv::StringRecord) -> Result<Draw> {
    if record.len() != PICK_COUNT + 1 {
        bail!("{} colonnes, {} attendues", record.len(), PICK_COUNT + 1);
    }

    let get_u32 = |idx: usize| -> Result<u32> {
        let s = record
            .get(idx)
            .map(str::trim)
            .with_context(|| format!("Champ manquant à l'index {}", idx))?;
        s.parse::<u32>()
            .with_context(|| format!("Impossible de parser '{}' (index {})", s, idx))
    };

    let draw = Draw::new(
        get_u32(0)?,
        [get_u32(1)?, get_u32(2)?, get_u32(3)?, get_u32(4)?, get_u32(5)?],
    );
    validate_draw(&draw)?;
    Ok(draw)
}

/// Tirages lus depuis le CSV d'entrée, indexés par identifiant.
pub struct DrawTable {
    draws: HashMap<u32, Draw>,
    pub total_records: u32,
    pub errors: u32,
}

impl DrawTable {
    pub fn id_range(&self) -> Option<(u32, u32)> {
        let min = self.draws.keys().min()?;
        let max = self.draws.keys().max()?;
        Some((*min, *max))
    }
}

impl DrawFetcher for DrawTable {
    fn fetch(&self, draw_id: u32) -> Result<Option<Draw>> {
        Ok(self.draws.get(&draw_id).cloned())
    }
}

/// Fichier sans en-tête : `id,n1,n2,n3,n4,n5`.
pub fn read_draws_csv<R: std::io::Read>(input: R) -> DrawTable {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut table = DrawTable {
        draws: HashMap::new(),
        total_records: 0,
        errors: 0,
    };

    for record_result in reader.records() {
        table.total_records += 1;
        match record_result {
            Ok(record) => match parse_record(&record) {
                Ok(draw) => {
                    if table.draws.insert(draw.draw_id, draw).is_some() {
                        log::warn!("Ligne {} : tirage en double, dernière occurrence gardée", table.total_records);
                    }
                }
                Err(e) => {
                    eprintln!("Erreur parsing ligne {}: {}", table.total_records, e);
                    table.errors += 1;
                }
            },
            Err(e) => {
                eprintln!("Erreur lecture ligne {}: {}", table.total_records, e);
                table.errors += 1;
            }
        }
    }

    table
}

pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
    pub missing: Vec<u32>,
}

pub fn import_csv(conn: &Connection, path: &Path, from: Option<u32>, to: Option<u32>) -> Result<ImportResult> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
    let table = read_draws_csv(file);

    let mut result = ImportResult {
        total_records: table.total_records,
        inserted: 0,
        skipped: 0,
        errors: table.errors,
        missing: Vec::new(),
    };

    let Some((min_id, max_id)) = table.id_range() else {
        return Ok(result);
    };
    let first = from.unwrap_or(min_id);
    let last = to.unwrap_or(max_id);
    if first > last {
        bail!("Plage de tirages vide : {} > {}", first, last);
    }

    let outcome = collect_draws(&table, first..=last)?;
    result.missing = outcome.missing;

    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;
    for draw in &outcome.draws {
        match insert_draw(&tx, draw) {
            Ok(true) => result.inserted += 1,
            Ok(false) => result.skipped += 1,
            Err(e) => {
                eprintln!("Erreur insertion tirage {}: {}", draw.draw_id, e);
                result.errors += 1;
            }
        }
    }
    tx.commit().context("Échec du commit")?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use miloto_db::db::{count_draws, fetch_all_draws, migrate};

    #[test]
    fn test_read_draws_csv() {
        let data = "3,1,2,3,4,5\n1, 10, 20, 30, 40, 43\nabc,1,2,3,4,5\n2,1,2,3\n";
        let table = read_draws_csv(data.as_bytes());
        assert_eq!(table.total_records, 4);
        assert_eq!(table.errors, 2);
        assert_eq!(table.id_range(), Some((1, 3)));
        assert_eq!(table.fetch(1).unwrap().unwrap().numbers, [10, 20, 30, 40, 43]);
        assert!(table.fetch(2).unwrap().is_none());
    }

    #[test]
    fn test_extra_columns_rejected() {
        let table = read_draws_csv("1,1,2,3,4,5,6,7\n2,10,20,30,40,43\n".as_bytes());
        assert_eq!(table.total_records, 2);
        assert_eq!(table.errors, 1);
        assert!(table.fetch(1).unwrap().is_none());
        assert_eq!(table.id_range(), Some((2, 2)));
    }

    #[test]
    fn test_zero_number_rejected() {
        let table = read_draws_csv("1,0,2,3,4,5\n".as_bytes());
        assert_eq!(table.errors, 1);
        assert!(table.id_range().is_none());
    }

    #[test]
    fn test_import_reports_missing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "1,1,2,3,4,5\n2,6,7,8,9,10\n4,1,2,3,4,5\n").unwrap();

        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let result = import_csv(&conn, &path, None, None).unwrap();
        assert_eq!(result.inserted, 3);
        assert_eq!(result.missing, vec![3]);
        assert_eq!(count_draws(&conn).unwrap(), 3);

        let again = import_csv(&conn, &path, Some(2), Some(5)).unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.skipped, 2);
        assert_eq!(again.missing, vec![3, 5]);

        let ids: Vec<u32> = fetch_all_draws(&conn).unwrap().iter().map(|d| d.draw_id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }
}
