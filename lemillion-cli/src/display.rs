use chrono::NaiveDate;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use textplots::Plot;

use crate::import::ImportResult;
use lemillion_db::models::{Draw, IssuedCombination, Pool};
use lemillion_vivier::calibrator::{CalibrationReport, FamilyOutcome};
use lemillion_vivier::generator::{GeneratedCombination, Pick, SourceTag};
use lemillion_vivier::stats::{absence_ranking, CandidateMetric, TrendDirection};
use lemillion_vivier::SignalFamily;

fn join_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:2}", n))
        .collect::<Vec<_>>()
        .join(" - ")
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn display_draws(draws: &[Draw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table(vec!["Tirage", "Date", "Jour", "Boules", "Étoiles"]);
    for draw in draws {
        let mut balls = draw.balls;
        balls.sort();
        let mut stars = draw.stars;
        stars.sort();

        table.add_row(vec![
            draw.draw_id.clone(),
            draw.date.format("%d/%m/%Y").to_string(),
            draw.day.clone(),
            join_numbers(&balls),
            join_numbers(&stars),
        ]);
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
}

fn trend_color(direction: TrendDirection) -> Color {
    match direction {
        TrendDirection::Rising => Color::Green,
        TrendDirection::Falling => Color::Red,
        TrendDirection::Stable => Color::White,
    }
}

/// Métriques d'un pool, triées selon la famille.
pub fn display_family_stats(
    family: SignalFamily,
    pool: Pool,
    metrics: &[CandidateMetric],
    window: usize,
    recent: Option<usize>,
) {
    let recent_label = recent.map(|r| format!(", R = {r}")).unwrap_or_default();
    println!("\n── {} : {} ({} tirages{}) ──", pool.label(), family, window, recent_label);

    let ordered: Vec<&CandidateMetric> = match family {
        SignalFamily::Dormant => absence_ranking(metrics)
            .iter()
            .filter_map(|n| metrics.iter().find(|m| m.number == *n))
            .collect(),
        _ => {
            let mut sorted: Vec<&CandidateMetric> = metrics.iter().collect();
            sorted.sort_by(|a, b| {
                let key = |m: &CandidateMetric| match family {
                    SignalFamily::Surrepresentation => m.surrepr_z,
                    SignalFamily::Trend => m.trend_direction.sign() * m.trend_score as f64,
                    _ => m.frequency as f64,
                };
                key(b).total_cmp(&key(a)).then(a.number.cmp(&b.number))
            });
            sorted
        }
    };

    let mut table = new_table(vec!["Numéro", "Fréquence", "Percentile", "Retard", "z", "Tendance"]);
    for m in ordered {
        table.add_row(vec![
            Cell::new(format!("{:2}", m.number)),
            Cell::new(m.frequency.to_string()),
            Cell::new(format!("{:.0}", m.frequency_percentile)),
            Cell::new(m.absence.to_string()),
            Cell::new(format!("{:+.2}", m.surrepr_z)),
            Cell::new(format!("{} {}", m.trend_direction, m.trend_score)).fg(trend_color(m.trend_direction)),
        ]);
    }
    println!("{table}");
}

pub fn display_calibration(report: &CalibrationReport) {
    let latest = report
        .latest_date
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| "—".to_string());
    println!("\n== Calibration sur {} tirages (dernier : {}) ==\n", report.history_len, latest);

    let mut table = new_table(vec!["Famille", "Standard", "Sous-séries", "Bande P20-P80", "Dynamique"]);
    for outcome in &report.families {
        match outcome {
            FamilyOutcome::Resolved(cal) => {
                let point = |w: usize, r: Option<usize>| match r {
                    Some(r) => format!("N={w} R={r}"),
                    None => format!("N={w}"),
                };
                let band = match &cal.band {
                    Some(b) => match b.recent {
                        Some((rlo, rhi)) => format!(
                            "[{:.0}, {:.0}] R [{:.0}, {:.0}]",
                            b.window.0, b.window.1, rlo, rhi
                        ),
                        None => format!("[{:.0}, {:.0}]", b.window.0, b.window.1),
                    },
                    None => "—".to_string(),
                };
                table.add_row(vec![
                    Cell::new(cal.family.to_string()),
                    Cell::new(point(cal.standard.window, cal.standard.recent)),
                    Cell::new(cal.samples.len().to_string()),
                    Cell::new(band),
                    Cell::new(point(cal.dynamic.window, cal.dynamic.recent)).fg(Color::Green),
                ]);
            }
            FamilyOutcome::Unresolved { family } => {
                table.add_row(vec![
                    Cell::new(family.to_string()),
                    Cell::new("non résolue").fg(Color::Red),
                    Cell::new("—"),
                    Cell::new("—"),
                    Cell::new("fenêtre statique").fg(Color::Yellow),
                ]);
            }
        }
    }
    println!("{table}");
}

/// ρ de Spearman des boules en fonction de N, pour les familles à classement.
pub fn display_calibration_chart(report: &CalibrationReport) {
    for outcome in &report.families {
        let FamilyOutcome::Resolved(cal) = outcome else {
            continue;
        };
        if cal.curve.is_empty() {
            continue;
        }
        let points: Vec<(f32, f32)> = cal
            .curve
            .iter()
            .filter(|p| p.rho_balls.is_finite())
            .map(|p| (p.window as f32, p.rho_balls as f32))
            .collect();
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            continue;
        };
        let x_min = first.0;
        let x_max = if last.0 > x_min { last.0 } else { x_min + 10.0 };
        let y_min = points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min).min(0.9) - 0.02;

        println!("\n  {} : ρ boules (N → N+50)", cal.family);
        let shape = textplots::Shape::Lines(&points);
        let mut chart = textplots::Chart::new_with_y_range(120, 40, x_min, x_max, y_min, 1.0);
        println!("{}", chart.lineplot(&shape));
    }
}

fn tagged(picks: &[Pick]) -> String {
    picks
        .iter()
        .map(|p| match p.source {
            SourceTag::Dormant => format!("{:2}*", p.number),
            SourceTag::High => format!("{:2}", p.number),
        })
        .collect::<Vec<_>>()
        .join(" - ")
}

pub fn display_combinations(target_date: NaiveDate, combos: &[GeneratedCombination], price: f64) {
    println!("\n🎲 Combinaisons pour le tirage du {}\n", target_date.format("%d/%m/%Y"));

    let mut table = new_table(vec!["#", "Boules", "Étoiles", "Score moyen", "Clé"]);
    for (i, combo) in combos.iter().enumerate() {
        let all: Vec<f64> = combo.balls.iter().chain(combo.stars.iter()).map(|p| p.score).collect();
        let mean = if all.is_empty() { 0.0 } else { all.iter().sum::<f64>() / all.len() as f64 };
        table.add_row(vec![
            format!("{}", i + 1),
            tagged(&combo.balls),
            tagged(&combo.stars),
            format!("{:+.3}", mean),
            combo.canonical_key(),
        ]);
    }
    println!("{table}");
    println!("  * dormeur   Prix unitaire : {:.2} €", price);
}

pub fn display_issued(target_date: NaiveDate, issued: &[IssuedCombination]) {
    if issued.is_empty() {
        println!("Aucune combinaison émise pour le {}.", target_date.format("%d/%m/%Y"));
        return;
    }
    let mut table = new_table(vec!["#", "Boules", "Étoiles"]);
    for (i, combo) in issued.iter().enumerate() {
        table.add_row(vec![format!("{}", i + 1), join_numbers(&combo.balls), join_numbers(&combo.stars)]);
    }
    println!("{table}");
}
