use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MilotoError, Result};
use crate::models::{Method, Prospect};

/// Cache clé-valeur des prospects générés : (tirage, méthode) -> ensemble de prospects.
pub trait ProspectStore {
    /// `None` quand rien n'a été persisté pour cette clé ; ce n'est pas une erreur.
    fn load(&self, method: Method, draw_id: u32) -> Result<Option<Vec<Prospect>>>;

    /// Fusionne avec l'existant (union dédupliquée sur `(numbers, method)`) puis écrase la clé.
    fn save(&mut self, prospects: &[Prospect], method: Method, draw_id: u32) -> Result<()>;
}

/// Union des prospects existants et entrants ; premier arrivé conservé.
pub fn merge_prospects(existing: Vec<Prospect>, incoming: &[Prospect]) -> Vec<Prospect> {
    let mut seen = HashSet::with_capacity(existing.len() + incoming.len());
    existing
        .into_iter()
        .chain(incoming.iter().cloned())
        .filter(|p| seen.insert(p.key()))
        .collect()
}

#[derive(Debug, Default)]
pub struct MemoryProspectStore {
    entries: BTreeMap<(u32, Method), Vec<Prospect>>,
}

impl MemoryProspectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    pub fn total_prospects(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl ProspectStore for MemoryProspectStore {
    fn load(&self, method: Method, draw_id: u32) -> Result<Option<Vec<Prospect>>> {
        Ok(self.entries.get(&(draw_id, method)).cloned())
    }

    fn save(&mut self, prospects: &[Prospect], method: Method, draw_id: u32) -> Result<()> {
        let existing = self.entries.remove(&(draw_id, method)).unwrap_or_default();
        self.entries
            .insert((draw_id, method), merge_prospects(existing, prospects));
        Ok(())
    }
}

pub const PROSPECT_HEADERS: [&str; 7] = ["N1", "N2", "N3", "N4", "N5", "Peso", "MetodoCalculo"];

#[derive(Debug, Serialize, Deserialize)]
struct ProspectRow {
    #[serde(rename = "N1")]
    n1: u32,
    #[serde(rename = "N2")]
    n2: u32,
    #[serde(rename = "N3")]
    n3: u32,
    #[serde(rename = "N4")]
    n4: u32,
    #[serde(rename = "N5")]
    n5: u32,
    #[serde(rename = "Peso")]
    weight: f64,
    #[serde(rename = "MetodoCalculo")]
    method: Method,
}

impl From<&Prospect> for ProspectRow {
    fn from(p: &Prospect) -> Self {
        let [n1, n2, n3, n4, n5] = p.numbers;
        Self { n1, n2, n3, n4, n5, weight: p.weight, method: p.method }
    }
}

impl From<ProspectRow> for Prospect {
    fn from(row: ProspectRow) -> Self {
        Prospect {
            numbers: [row.n1, row.n2, row.n3, row.n4, row.n5],
            weight: row.weight,
            method: row.method,
        }
    }
}

/// Écrit un tableau de prospects avec son en-tête, même vide.
pub fn write_prospects_csv(path: &Path, prospects: &[Prospect]) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(PROSPECT_HEADERS)?;
    for p in prospects {
        writer.serialize(ProspectRow::from(p))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_prospects_csv(path: &Path) -> Result<Vec<Prospect>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize::<ProspectRow>()
        .map(|row| row.map(Prospect::from))
        .collect()
}

/// Un fichier `prospectos_{tirage}_{méthode}.csv` par clé.
#[derive(Debug, Clone)]
pub struct CsvProspectStore {
    dir: PathBuf,
}

impl CsvProspectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, method: Method, draw_id: u32) -> PathBuf {
        self.dir
            .join(format!("prospectos_{}_{}.csv", draw_id, method.label()))
    }
}

impl ProspectStore for CsvProspectStore {
    fn load(&self, method: Method, draw_id: u32) -> Result<Option<Vec<Prospect>>> {
        let path = self.path_for(method, draw_id);
        if !path.exists() {
            log::debug!("Aucun prospect {} pour le tirage {}", method, draw_id);
            return Ok(None);
        }
        let prospects = read_prospects_csv(&path)
            .map_err(|e| MilotoError::persistence(draw_id, method, format!("{:?} : {}", path, e)))?;
        log::debug!("Prospects chargés depuis {:?}", path);
        Ok(Some(prospects))
    }

    fn save(&mut self, prospects: &[Prospect], method: Method, draw_id: u32) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            MilotoError::persistence(draw_id, method, format!("{:?} : {}", self.dir, e))
        })?;
        let existing = self.load(method, draw_id)?.unwrap_or_default();
        let merged = merge_prospects(existing, prospects);
        let path = self.path_for(method, draw_id);
        write_prospects_csv(&path, &merged)
            .map_err(|e| MilotoError::persistence(draw_id, method, format!("{:?} : {}", path, e)))?;
        log::debug!("Prospects sauvegardés dans {:?}", path);
        Ok(())
    }
}
