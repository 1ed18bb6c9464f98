use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::error::MilotoError;
use crate::models::{Draw, Method, Prospect};
use crate::store::ProspectStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    draw_id  INTEGER PRIMARY KEY,
    n1       INTEGER NOT NULL,
    n2       INTEGER NOT NULL,
    n3       INTEGER NOT NULL,
    n4       INTEGER NOT NULL,
    n5       INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS prospect_keys (
    draw_id  INTEGER NOT NULL,
    method   TEXT NOT NULL,
    PRIMARY KEY (draw_id, method)
);

CREATE TABLE IF NOT EXISTS prospects (
    draw_id   INTEGER NOT NULL,
    method    TEXT NOT NULL,
    position  INTEGER NOT NULL,
    n1        INTEGER NOT NULL,
    n2        INTEGER NOT NULL,
    n3        INTEGER NOT NULL,
    n4        INTEGER NOT NULL,
    n5        INTEGER NOT NULL,
    weight    REAL NOT NULL,
    PRIMARY KEY (draw_id, method, n1, n2, n3, n4, n5)
);
";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("miloto.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

pub fn insert_draw(conn: &Connection, draw: &Draw) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO draws (draw_id, n1, n2, n3, n4, n5)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            draw.draw_id,
            draw.numbers[0],
            draw.numbers[1],
            draw.numbers[2],
            draw.numbers[3],
            draw.numbers[4],
        ],
    ).context("Échec de l'insertion")?;
    Ok(changed > 0)
}

fn row_to_draw(row: &rusqlite::Row<'_>) -> rusqlite::Result<Draw> {
    Ok(Draw {
        draw_id: row.get(0)?,
        numbers: [
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ],
    })
}

/// Tous les tirages, du plus ancien au plus récent.
pub fn fetch_all_draws(conn: &Connection) -> Result<Vec<Draw>> {
    let mut stmt = conn.prepare(
        "SELECT draw_id, n1, n2, n3, n4, n5 FROM draws ORDER BY draw_id ASC"
    )?;
    let draws = stmt.query_map([], row_to_draw)?.collect::<Result<Vec<_>, _>>()?;
    Ok(draws)
}

/// Les `limit` derniers tirages, le plus récent en premier.
pub fn fetch_last_draws(conn: &Connection, limit: u32) -> Result<Vec<Draw>> {
    let mut stmt = conn.prepare(
        "SELECT draw_id, n1, n2, n3, n4, n5 FROM draws ORDER BY draw_id DESC LIMIT ?1"
    )?;
    let draws = stmt.query_map([limit], row_to_draw)?.collect::<Result<Vec<_>, _>>()?;
    Ok(draws)
}

pub fn count_draws(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))?;
    Ok(count)
}

/// Cache des prospects dans la même base que les tirages.
pub struct SqliteProspectStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteProspectStore<'a> {
    /// La connexion doit avoir été migrée.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn read(&self, method: Method, draw_id: u32) -> rusqlite::Result<Option<Vec<Prospect>>> {
        let known: Option<u32> = self.conn.query_row(
            "SELECT draw_id FROM prospect_keys WHERE draw_id = ?1 AND method = ?2",
            rusqlite::params![draw_id, method.label()],
            |row| row.get(0),
        ).optional()?;
        if known.is_none() {
            return Ok(None);
        }

        let mut stmt = self.conn.prepare(
            "SELECT n1, n2, n3, n4, n5, weight FROM prospects
             WHERE draw_id = ?1 AND method = ?2 ORDER BY position ASC"
        )?;
        let prospects = stmt.query_map(rusqlite::params![draw_id, method.label()], |row| {
            Ok(Prospect {
                numbers: [row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?],
                weight: row.get(5)?,
                method,
            })
        })?.collect::<Result<Vec<_>, _>>()?;
        Ok(Some(prospects))
    }

    fn write(&self, prospects: &[Prospect], method: Method, draw_id: u32) -> rusqlite::Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO prospect_keys (draw_id, method) VALUES (?1, ?2)",
            rusqlite::params![draw_id, method.label()],
        )?;
        let next_position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM prospects WHERE draw_id = ?1 AND method = ?2",
            rusqlite::params![draw_id, method.label()],
            |row| row.get(0),
        )?;

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO prospects (draw_id, method, position, n1, n2, n3, n4, n5, weight)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            )?;
            for (offset, p) in prospects.iter().enumerate() {
                inserted += stmt.execute(rusqlite::params![
                    draw_id,
                    method.label(),
                    next_position + offset as i64,
                    p.numbers[0],
                    p.numbers[1],
                    p.numbers[2],
                    p.numbers[3],
                    p.numbers[4],
                    p.weight,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }
}

impl ProspectStore for SqliteProspectStore<'_> {
    fn load(&self, method: Method, draw_id: u32) -> crate::error::Result<Option<Vec<Prospect>>> {
        self.read(method, draw_id)
            .map_err(|e| MilotoError::persistence(draw_id, method, e))
    }

    fn save(&mut self, prospects: &[Prospect], method: Method, draw_id: u32) -> crate::error::Result<()> {
        let inserted = self
            .write(prospects, method, draw_id)
            .map_err(|e| MilotoError::persistence(draw_id, method, e))?;
        log::debug!("{} nouveaux prospects {} pour le tirage {}", inserted, method, draw_id);
        Ok(())
    }
}
