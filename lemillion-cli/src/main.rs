mod display;
mod import;
mod store;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::display::{
    display_calibration, display_calibration_chart, display_combinations, display_draws,
    display_family_stats, display_import_summary, display_issued,
};
use crate::store::SqliteStore;
use lemillion_db::db::{count_draws, db_path, fetch_issued, fetch_last_draws, insert_issued, migrate, open_db};
use lemillion_db::models::{Draw, Pool};
use lemillion_db::rusqlite::Connection;
use lemillion_vivier::calibrator::{
    calibrate_outcome, load_report, save_report, CalibrationReport, DynamicWindows,
};
use lemillion_vivier::config::{load_config, EngineConfig};
use lemillion_vivier::generator::{CategoryPlan, CategoryWeights, GenerationRequest, Generator};
use lemillion_vivier::guard::{GenerationContext, UniquenessGuard};
use lemillion_vivier::providers::{checked_history, TariffResolver};
use lemillion_vivier::sampler::VivierSize;
use lemillion_vivier::scoring::{Criterion, Influence, PriorityOrder};
use lemillion_vivier::stats::candidate_metrics;
use lemillion_vivier::tariff::TariffTable;
use lemillion_vivier::window::WindowConfig;
use lemillion_vivier::{SignalFamily, VivierError};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FamilyArg {
    High,
    Surrepresentation,
    Trend,
    Dormant,
}

impl From<FamilyArg> for SignalFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::High => SignalFamily::High,
            FamilyArg::Surrepresentation => SignalFamily::Surrepresentation,
            FamilyArg::Trend => SignalFamily::Trend,
            FamilyArg::Dormant => SignalFamily::Dormant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum CriterionArg {
    Frequency,
    Surrepresentation,
    Trend,
}

impl From<CriterionArg> for Criterion {
    fn from(arg: CriterionArg) -> Self {
        match arg {
            CriterionArg::Frequency => Criterion::Frequency,
            CriterionArg::Surrepresentation => Criterion::Surrepresentation,
            CriterionArg::Trend => Criterion::Trend,
        }
    }
}

#[derive(Parser)]
#[command(name = "lemillion", about = "Viviers statistiques et générateur de combinaisons EuroMillions")]
struct Cli {
    /// Configuration du moteur (fenêtres, calibration, tentatives)
    #[arg(long, global = true, default_value = "data/engine.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer les tirages depuis un fichier CSV
    Import {
        /// Chemin vers le fichier CSV
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Lister les derniers tirages
    List {
        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Statistiques d'une famille de signaux sur sa fenêtre
    Stats {
        #[arg(short, long, default_value = "high")]
        family: FamilyArg,

        /// Rapport de calibration à appliquer s'il existe
        #[arg(long, default_value = "data/calibration.json")]
        calibration: PathBuf,
    },

    /// Calibrer les fenêtres de chaque famille
    Calibrate {
        #[arg(short, long, default_value = "data/calibration.json")]
        output: PathBuf,
    },

    /// Générer des combinaisons inédites pour un tirage
    Generate {
        /// Date du tirage visé (AAAA-MM-JJ), par défaut le prochain mardi ou vendredi
        #[arg(short, long)]
        date: Option<NaiveDate>,

        #[arg(long, default_value = "5")]
        numbers: usize,

        #[arg(long, default_value = "2")]
        stars: usize,

        /// Nombre de combinaisons
        #[arg(short, long, default_value = "1")]
        count: usize,

        #[arg(long, default_value = "5")]
        influence_frequency: u8,

        #[arg(long, default_value = "5")]
        influence_surrepresentation: u8,

        #[arg(long, default_value = "5")]
        influence_trend: u8,

        /// Ordre de priorité des critères
        #[arg(long, value_delimiter = ',', default_value = "frequency,surrepresentation,trend")]
        priority: Vec<CriterionArg>,

        /// Niveau du vivier (0 = objectif seul, 10 = tout le pool)
        #[arg(long, default_value = "5")]
        vivier: u8,

        /// Taille forcée du vivier de boules
        #[arg(long, requires = "vivier_stars")]
        vivier_balls: Option<usize>,

        /// Taille forcée du vivier d'étoiles
        #[arg(long, requires = "vivier_balls")]
        vivier_stars: Option<usize>,

        /// Déterminisme (0 = uniforme, 10 = toujours les meilleurs)
        #[arg(long, default_value = "5")]
        determinism: u8,

        #[arg(long, default_value = "0")]
        dormant_numbers: u8,

        #[arg(long, default_value = "0")]
        dormant_stars: u8,

        /// Boules à prendre parmi les fortes
        #[arg(long)]
        balls_from_high: Option<f64>,

        /// Boules à prendre parmi les dormeurs
        #[arg(long)]
        balls_from_dormant: Option<f64>,

        #[arg(long)]
        stars_from_high: Option<f64>,

        #[arg(long)]
        stars_from_dormant: Option<f64>,

        #[arg(long, default_value = "data/calibration.json")]
        calibration: PathBuf,

        /// Seed pour la reproductibilité (défaut : date du tirage AAAAMMJJ)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Lister les combinaisons émises pour une date
    Issued {
        #[arg(short, long)]
        date: NaiveDate,
    },
}

/// Seed déterministe AAAAMMJJ.
fn date_seed(date: NaiveDate) -> u64 {
    let y = date.year() as u64;
    let m = date.month() as u64;
    let d = date.day() as u64;
    y * 10_000 + m * 100 + d
}

/// Prochain mardi ou vendredi, aujourd'hui compris.
fn next_draw_date(from: NaiveDate) -> NaiveDate {
    from.iter_days()
        .find(|d| matches!(d.weekday(), Weekday::Tue | Weekday::Fri))
        .unwrap_or(from)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let path = db_path();
    let conn = open_db(&path)?;
    migrate(&conn)?;

    match cli.command {
        Command::Import { file } => cmd_import(&conn, &file),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::List { last } => cmd_list(&conn, last),
        Command::Stats { family, calibration } => cmd_stats(&conn, &cli.config, family.into(), &calibration),
        Command::Calibrate { output } => cmd_calibrate(&conn, &cli.config, &output),
        Command::Generate {
            date,
            numbers,
            stars,
            count,
            influence_frequency,
            influence_surrepresentation,
            influence_trend,
            priority,
            vivier,
            vivier_balls,
            vivier_stars,
            determinism,
            dormant_numbers,
            dormant_stars,
            balls_from_high,
            balls_from_dormant,
            stars_from_high,
            stars_from_dormant,
            calibration,
            seed,
        } => {
            let weights = |high: Option<f64>, dormant: Option<f64>| match (high, dormant) {
                (None, None) => None,
                (h, d) => Some(CategoryWeights { high: h.unwrap_or(0.0), dormant: d.unwrap_or(0.0) }),
            };
            let balls_plan = weights(balls_from_high, balls_from_dormant);
            let stars_plan = weights(stars_from_high, stars_from_dormant);
            let category_weights = match (balls_plan, stars_plan) {
                (None, None) => None,
                (balls, stars) => Some(CategoryPlan { balls, stars }),
            };

            let request = GenerationRequest {
                target_numbers: numbers,
                target_stars: stars,
                influence: Influence {
                    frequency: influence_frequency,
                    surrepresentation: influence_surrepresentation,
                    trend: influence_trend,
                },
                vivier_level: vivier,
                vivier: vivier_balls
                    .zip(vivier_stars)
                    .map(|(balls, stars)| VivierSize { balls, stars }),
                determinism_level: determinism,
                dormant_numbers_level: dormant_numbers,
                dormant_stars_level: dormant_stars,
                category_weights,
                priority_order: PriorityOrder::new(priority.into_iter().map(Criterion::from).collect())?,
            };
            let date = date.unwrap_or_else(|| next_draw_date(chrono::Local::now().date_naive()));
            cmd_generate(&conn, &cli.config, &calibration, date, &request, count, seed)
        }
        Command::Issued { date } => cmd_issued(&conn, date),
    }
}

fn cmd_import(conn: &Connection, file: &Path) -> Result<()> {
    let result = import::import_csv(conn, file)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_list(conn: &Connection, last: u32) -> Result<()> {
    let n = count_draws(conn)?;
    if n == 0 {
        println!("Base vide. Lancez d'abord : lemillion import");
        return Ok(());
    }
    let draws = fetch_last_draws(conn, last)?;
    display_draws(&draws);
    Ok(())
}

fn load_history(conn: &Connection) -> Result<Option<Vec<Draw>>> {
    let history = checked_history(&SqliteStore::new(conn))?;
    if history.is_empty() {
        println!("Base vide. Lancez d'abord : lemillion import");
        return Ok(None);
    }
    Ok(Some(history))
}

/// Fenêtres dynamiques si un rapport existe, recalibrées si l'historique a grandi.
fn calibrated_windows(history: &[Draw], config: &EngineConfig, report_path: &Path) -> Result<WindowConfig> {
    if !report_path.exists() {
        log::info!("Pas de rapport de calibration : fenêtres statiques");
        return Ok(config.windows.clone());
    }
    let report = load_report(report_path)
        .with_context(|| format!("Rapport de calibration illisible : {}", report_path.display()))?;
    let mut dynamic = DynamicWindows::with_report(config.calibration.clone(), report);
    if dynamic.refresh(history) {
        if let Some(report) = dynamic.report() {
            save_report(report, report_path)?;
            println!("Historique modifié : calibration recalculée ({})", report_path.display());
        }
    }
    Ok(dynamic.windows(&config.windows))
}

fn cmd_stats(conn: &Connection, config_path: &Path, family: SignalFamily, calibration: &Path) -> Result<()> {
    let Some(history) = load_history(conn)? else {
        return Ok(());
    };
    let config = load_config(config_path)?;
    let windows = calibrated_windows(&history, &config, calibration)?;
    let resolved = windows.resolve(&history, family)?;

    for pool in Pool::ALL {
        let metrics = candidate_metrics(resolved.draws, pool, resolved.recent);
        display_family_stats(family, pool, &metrics, resolved.draws.len(), resolved.recent);
    }
    Ok(())
}

fn cmd_calibrate(conn: &Connection, config_path: &Path, output: &Path) -> Result<()> {
    let Some(history) = load_history(conn)? else {
        return Ok(());
    };
    let config = load_config(config_path)?;

    println!("Calibration de {} familles sur {} tirages...", SignalFamily::ALL.len(), history.len());
    let pb = ProgressBar::new(SignalFamily::ALL.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut outcomes = Vec::with_capacity(SignalFamily::ALL.len());
    for family in SignalFamily::ALL {
        pb.set_message(family.to_string());
        outcomes.push(calibrate_outcome(&history, family, &config.calibration));
        pb.inc(1);
    }
    pb.finish_and_clear();

    let report = CalibrationReport::new(&history, outcomes);
    display_calibration(&report);
    display_calibration_chart(&report);

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    save_report(&report, output)?;
    println!("\nRapport enregistré : {}", output.display());
    Ok(())
}

fn cmd_generate(
    conn: &Connection,
    config_path: &Path,
    calibration: &Path,
    date: NaiveDate,
    request: &GenerationRequest,
    count: usize,
    seed: Option<u64>,
) -> Result<()> {
    let Some(history) = load_history(conn)? else {
        return Ok(());
    };
    let config = load_config(config_path)?;
    let windows = calibrated_windows(&history, &config, calibration)?;

    let store = SqliteStore::new(conn);
    let tariff = TariffTable::euromillions();
    let generator = Generator::new(&history, windows)?;
    let ctx = GenerationContext::new(date, request.vivier_sizes());
    let mut guard = UniquenessGuard::new(config.max_attempts);
    let mut rng = StdRng::seed_from_u64(seed.unwrap_or_else(|| date_seed(date)));

    let mut combos = Vec::with_capacity(count);
    for _ in 0..count {
        match generator.generate(request, &ctx, &mut guard, &store, &tariff, &mut rng) {
            Ok(combo) => {
                insert_issued(conn, date, &combo.numbers(), &combo.star_numbers())?;
                combos.push(combo);
            }
            Err(e @ VivierError::GenerationExhausted { .. }) => {
                eprintln!("{e}");
                eprintln!("Astuce : augmentez --vivier ou baissez --determinism.");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let price = tariff
        .resolve(request.target_numbers, request.target_stars)
        .unwrap_or_default();
    display_combinations(date, &combos, price);
    Ok(())
}

fn cmd_issued(conn: &Connection, date: NaiveDate) -> Result<()> {
    let issued = fetch_issued(conn, date)?;
    display_issued(date, &issued);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_seed_format() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        assert_eq!(date_seed(date), 20261020);
    }

    #[test]
    fn test_next_draw_date() {
        // Lundi 19/10/2026 → mardi 20
        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(next_draw_date(monday), NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
        // Samedi → mardi suivant
        let saturday = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert_eq!(next_draw_date(saturday), monday.succ_opt().unwrap());
        // Vendredi : le jour même
        let friday = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(next_draw_date(friday), friday);
    }

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "lemillion",
            "generate",
            "--date",
            "2026-10-20",
            "--priority",
            "trend,frequency,surrepresentation",
            "--vivier-balls",
            "6",
            "--vivier-stars",
            "2",
        ])
        .unwrap();
        match cli.command {
            Command::Generate { date, priority, vivier_balls, .. } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 10, 20));
                assert_eq!(priority[0], CriterionArg::Trend);
                assert_eq!(vivier_balls, Some(6));
            }
            _ => panic!("sous-commande inattendue"),
        }
    }

    #[test]
    fn test_calibrated_windows_without_report() {
        let history = lemillion_vivier::testing::make_history(50, 1);
        let path = std::env::temp_dir().join("lemillion_calibration_absente_81c2.json");
        let _ = std::fs::remove_file(&path);
        let windows = calibrated_windows(&history, &EngineConfig::default(), &path).unwrap();
        assert_eq!(windows, WindowConfig::default());
    }
}
