mod display;
mod import;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use miloto_db::db::{count_draws, db_path, fetch_all_draws, fetch_last_draws, migrate, open_db, SqliteProspectStore};
use miloto_db::models::Method;
use miloto_db::rusqlite::Connection;
use miloto_db::store::{CsvProspectStore, MemoryProspectStore, ProspectStore};
use miloto_engine::backtest::{prospects_for_next, BacktestDriver};
use miloto_engine::config::{load_config, save_config, BacktestConfig};
use miloto_engine::gaps::compute_gaps;
use miloto_engine::report::save_report;
use crate::display::{
    display_comparison, display_draws, display_import_summary, display_prospects, display_stats,
    display_summary,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StoreKind {
    /// Table `prospects` de la base SQLite
    Sqlite,
    /// Fichiers prospectos_{tirage}_{méthode}.csv
    Csv,
    /// Aucun cache persistant
    Memory,
}

/// Accepte les libellés stockés (Fusion, Mean, Median), sans tenir compte de la casse.
fn parse_method(s: &str) -> Result<Method, String> {
    Method::from_label(s).ok_or_else(|| format!("méthode inconnue '{}' (Fusion, Mean, Median)", s))
}

#[derive(Parser)]
#[command(name = "miloto", about = "Analyse des écarts et backtest de prospects MiLoto")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct EngineArgs {
    /// Fichier de configuration JSON (les options ci-dessous le surchargent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seuil strict de la métrique pour retenir un numéro
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Méthodes de calcul (séparées par des virgules)
    #[arg(short, long, value_delimiter = ',', value_parser = parse_method)]
    methods: Option<Vec<Method>>,

    /// Cache des prospects
    #[arg(long, default_value = "sqlite")]
    store: StoreKind,

    /// Répertoire des fichiers de prospects (avec --store csv)
    #[arg(long, default_value = "prospectos")]
    store_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Importer les tirages depuis un fichier CSV (id,n1,n2,n3,n4,n5 sans en-tête)
    Import {
        /// Chemin vers le fichier CSV
        #[arg(short, long, default_value = "data.csv")]
        file: PathBuf,

        /// Premier tirage à importer
        #[arg(long)]
        from: Option<u32>,

        /// Dernier tirage à importer
        #[arg(long)]
        to: Option<u32>,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Lister les derniers tirages
    List {
        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Afficher les écarts et scores de récurrence par numéro
    Stats {
        /// Fenêtre d'analyse (nombre de tirages, défaut : tout l'historique)
        #[arg(short, long)]
        window: Option<u32>,

        /// Seuil utilisé pour surligner les scores
        #[arg(short, long, default_value = "0.65")]
        threshold: f64,
    },

    /// Générer les prospects du prochain tirage
    Predict {
        #[command(flatten)]
        engine: EngineArgs,

        /// Nombre de prospects à afficher
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Rejouer l'historique et comparer les prospects aux tirages réels
    Backtest {
        #[command(flatten)]
        engine: EngineArgs,

        /// Tirages d'historique avant la première étape
        #[arg(short, long)]
        warmup: Option<usize>,

        /// Borne exclusive sur l'index d'étape
        #[arg(long)]
        stop_at: Option<usize>,

        /// Ne pas prédire le tirage suivant l'historique
        #[arg(long)]
        no_predict_next: bool,

        /// Fichier de sortie des comparaisons
        #[arg(short, long, default_value = "comparing_results.csv")]
        output: PathBuf,

        /// Sauvegarder la configuration effective
        #[arg(long)]
        save_config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let path = db_path();
    let conn = open_db(&path)?;
    migrate(&conn)?;

    match cli.command {
        Command::Import { file, from, to } => cmd_import(&conn, &file, from, to),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::List { last } => cmd_list(&conn, last),
        Command::Stats { window, threshold } => cmd_stats(&conn, window, threshold),
        Command::Predict { engine, limit } => cmd_predict(&conn, &engine, limit),
        Command::Backtest {
            engine,
            warmup,
            stop_at,
            no_predict_next,
            output,
            save_config: config_out,
        } => {
            let mut config = resolve_config(&engine)?;
            if let Some(w) = warmup {
                config.warmup = w;
            }
            if stop_at.is_some() {
                config.stop_at = stop_at;
            }
            if no_predict_next {
                config.predict_next = false;
            }
            if let Some(p) = config_out {
                save_config(&config, &p)?;
                println!("Configuration sauvegardée dans : {}", p.display());
            }
            cmd_backtest(&conn, &engine, &config, &output)
        }
    }
}

fn resolve_config(engine: &EngineArgs) -> Result<BacktestConfig> {
    let mut config = match &engine.config {
        Some(p) => load_config(p)?,
        None => BacktestConfig::default(),
    };
    if let Some(t) = engine.threshold {
        config.threshold = t;
    }
    if let Some(m) = &engine.methods {
        config.methods = m.clone();
    }
    Ok(config)
}

fn open_store<'a>(conn: &'a Connection, engine: &EngineArgs) -> Box<dyn ProspectStore + 'a> {
    match engine.store {
        StoreKind::Sqlite => Box::new(SqliteProspectStore::new(conn)),
        StoreKind::Csv => Box::new(CsvProspectStore::new(engine.store_dir.clone())),
        StoreKind::Memory => Box::new(MemoryProspectStore::new()),
    }
}

fn ensure_not_empty(conn: &Connection) -> Result<u32> {
    let n = count_draws(conn)?;
    if n == 0 {
        bail!("Base vide. Lancez d'abord : miloto import");
    }
    Ok(n)
}

fn cmd_import(conn: &Connection, file: &PathBuf, from: Option<u32>, to: Option<u32>) -> Result<()> {
    let result = import::import_csv(conn, file, from, to)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_list(conn: &Connection, last: u32) -> Result<()> {
    ensure_not_empty(conn)?;
    let draws = fetch_last_draws(conn, last)?;
    display_draws(&draws);
    Ok(())
}

fn cmd_stats(conn: &Connection, window: Option<u32>, threshold: f64) -> Result<()> {
    let n = ensure_not_empty(conn)?;
    let effective_window = window.unwrap_or(n).min(n);
    let mut draws = fetch_last_draws(conn, effective_window)?;
    draws.reverse();

    let stats = compute_gaps(&draws)?;
    display_stats(&stats, draws.len(), threshold);
    Ok(())
}

fn cmd_predict(conn: &Connection, engine: &EngineArgs, limit: usize) -> Result<()> {
    ensure_not_empty(conn)?;
    let config = resolve_config(engine)?;
    let draws = fetch_all_draws(conn)?;

    let mut store = open_store(conn, engine);
    let (next_id, prospects) = prospects_for_next(draws, &config, &mut *store)?;
    display_prospects(next_id, &prospects, limit);
    Ok(())
}

fn cmd_backtest(conn: &Connection, engine: &EngineArgs, config: &BacktestConfig, output: &PathBuf) -> Result<()> {
    ensure_not_empty(conn)?;
    let draws = fetch_all_draws(conn)?;
    let mut store = open_store(conn, engine);

    let driver = BacktestDriver::new(draws, config, &mut *store)?;
    let methods = config.methods.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(", ");
    println!(
        "Backtest sur {} tirages : {} étapes, méthodes {}, seuil {}",
        driver.draws().len(),
        driver.step_count(),
        methods,
        config.threshold
    );

    let pb = ProgressBar::new(driver.step_count() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .context("Modèle de barre de progression invalide")?
        .progress_chars("=> "));

    let report = driver.run_with(|record| {
        pb.set_message(format!("tirage {}", record.draw_id));
        pb.inc(1);
    })?;
    pb.finish_with_message("Backtest terminé");

    display_comparison(&report.records);
    display_summary(&report.summary);

    save_report(&report.records, output)?;
    println!("\nComparaisons sauvegardées dans : {}", output.display());
    Ok(())
}
