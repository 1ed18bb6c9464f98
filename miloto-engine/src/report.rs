use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};

use crate::backtest::ComparisonRecord;

pub const REPORT_HEADERS: [&str; 5] = [
    "IdSorteo",
    "Numeros_Sorteo",
    "Numeros_Prospecto",
    "Aciertos",
    "Numeros_Acertados",
];

/// Numéros séparés par des espaces, ordre croissant.
pub fn format_numbers(numbers: &BTreeSet<u32>) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn write_report<W: std::io::Write>(records: &[ComparisonRecord], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(REPORT_HEADERS)?;
    for r in records {
        writer.write_record([
            r.draw_id.to_string(),
            format_numbers(&r.actual_numbers),
            format_numbers(&r.predicted_numbers),
            r.hit_count.to_string(),
            format_numbers(&r.hit_numbers),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_report(records: &[ComparisonRecord], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Impossible de créer {:?}", path))?;
    write_report(records, file)
        .with_context(|| format!("Échec de l'écriture de {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::compare_prospects;
    use miloto_db::models::{Method, Prospect};

    #[test]
    fn test_format_numbers() {
        let set: BTreeSet<u32> = [41, 3, 22].into_iter().collect();
        assert_eq!(format_numbers(&set), "3 22 41");
        assert_eq!(format_numbers(&BTreeSet::new()), "");
    }

    #[test]
    fn test_write_report_columns() {
        let record = compare_prospects(
            120,
            [3, 11, 22, 34, 41].into_iter().collect(),
            &[Prospect { numbers: [3, 9, 22, 41, 43], weight: 4.1, method: Method::Fusion }],
        );
        let mut buf = Vec::new();
        write_report(&[record], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "IdSorteo,Numeros_Sorteo,Numeros_Prospecto,Aciertos,Numeros_Acertados");
        assert_eq!(lines[1], "120,3 11 22 34 41,3 9 22 41 43,3,3 22 41");
    }

    #[test]
    fn test_empty_report_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comparing_results.csv");
        save_report(&[], &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim(), REPORT_HEADERS.join(","));
    }
}
