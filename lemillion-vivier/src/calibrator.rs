//! Calibration des fenêtres par famille de signaux.
//!
//! Pour chaque famille on cherche la plus petite fenêtre N (en tirages) dont le
//! classement est stable, puis on robustifie ce point « standard » sur des
//! sous-séries tronquées de l'historique : la valeur finale (« dynamique ») est
//! le standard ramené dans la bande [P20, P80] des sous-séries.

use std::path::Path;

use chrono::NaiveDate;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use lemillion_db::models::{Draw, Pool};

use crate::stats::{absences, classify_trend, TrendDirection};
use crate::{Result, SignalFamily, VivierError};

/// Critère de stabilité propre à chaque famille.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StabilityCriterion {
    /// Corrélation de Spearman et recouvrement du top-K entre N et N + delta.
    Ranking {
        delta: usize,
        top_k_balls: usize,
        top_k_stars: usize,
        rho_min: f64,
        overlap_min: f64,
        confirmations: usize,
        max_window: Option<usize>,
    },
    /// Concordance des étiquettes de tendance entre R, R + pas et R + 2·pas.
    Concordance {
        min_concordance: f64,
        recent_start: usize,
        recent_step: usize,
    },
    /// Chaque numéro et chaque étoile sortis au moins une fois.
    Coverage,
}

impl StabilityCriterion {
    pub fn for_family(family: SignalFamily) -> Self {
        match family {
            SignalFamily::High => StabilityCriterion::Ranking {
                delta: 50,
                top_k_balls: 12,
                top_k_stars: 4,
                rho_min: 0.95,
                overlap_min: 0.75,
                confirmations: 3,
                max_window: None,
            },
            SignalFamily::Surrepresentation => StabilityCriterion::Ranking {
                delta: 50,
                top_k_balls: 12,
                top_k_stars: 4,
                rho_min: 0.90,
                overlap_min: 0.70,
                confirmations: 2,
                max_window: Some(450),
            },
            SignalFamily::Trend => StabilityCriterion::Concordance {
                min_concordance: 0.82,
                recent_start: 10,
                recent_step: 5,
            },
            SignalFamily::Dormant => StabilityCriterion::Coverage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    pub start: usize,
    pub step: usize,
    /// Nombre de tirages récents retirés à chaque sous-série supplémentaire.
    pub subset_stride: usize,
    pub max_subsets: usize,
    /// Longueur minimale d'une sous-série.
    pub min_tail: usize,
    pub low_percentile: f64,
    pub high_percentile: f64,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            start: 50,
            step: 10,
            subset_stride: 150,
            max_subsets: 6,
            min_tail: 600,
            low_percentile: 20.0,
            high_percentile: 80.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub window: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilityProbe {
    pub window: usize,
    pub rho_balls: f64,
    pub rho_stars: f64,
    pub overlap_balls: f64,
    pub overlap_stars: f64,
    pub ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyBand {
    pub window: (f64, f64),
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyCalibration {
    pub family: SignalFamily,
    pub standard: CalibrationPoint,
    pub samples: Vec<CalibrationPoint>,
    pub band: Option<SafetyBand>,
    pub dynamic: CalibrationPoint,
    /// Sondes de stabilité du balayage standard (familles à classement).
    #[serde(default)]
    pub curve: Vec<StabilityProbe>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FamilyOutcome {
    Resolved(FamilyCalibration),
    Unresolved { family: SignalFamily },
}

impl FamilyOutcome {
    pub fn family(&self) -> SignalFamily {
        match self {
            FamilyOutcome::Resolved(c) => c.family,
            FamilyOutcome::Unresolved { family } => *family,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub history_len: usize,
    pub latest_date: Option<NaiveDate>,
    pub families: Vec<FamilyOutcome>,
}

impl CalibrationReport {
    pub fn new(history: &[Draw], families: Vec<FamilyOutcome>) -> Self {
        Self {
            history_len: history.len(),
            latest_date: history.first().map(|d| d.date),
            families,
        }
    }

    pub fn get(&self, family: SignalFamily) -> Option<&FamilyCalibration> {
        self.families.iter().find_map(|o| match o {
            FamilyOutcome::Resolved(c) if c.family == family => Some(c),
            _ => None,
        })
    }

    pub fn dynamic(&self, family: SignalFamily) -> Option<CalibrationPoint> {
        self.get(family).map(|c| c.dynamic)
    }

    /// Vrai si le rapport a été calculé sur cet historique.
    pub fn matches(&self, history: &[Draw]) -> bool {
        self.history_len == history.len() && self.latest_date == history.first().map(|d| d.date)
    }
}

// ════════════════════════════════════════════════════════════════
// Outils de classement
// ════════════════════════════════════════════════════════════════

/// Rangs moyens (1 = plus petite valeur), les ex aequo partagent la moyenne.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Corrélation de rang de Spearman (Pearson sur rangs moyens).
pub fn spearman(a: &[f64], b: &[f64]) -> f64 {
    let ra = average_ranks(a);
    let rb = average_ranks(b);
    let n = ra.len().min(rb.len());
    if n == 0 {
        return 0.0;
    }
    let mean_a = ra[..n].iter().sum::<f64>() / n as f64;
    let mean_b = rb[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = ra[i] - mean_a;
        let db = rb[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    match (var_a > 0.0, var_b > 0.0) {
        (false, false) => 1.0,
        (true, true) => cov / (var_a.sqrt() * var_b.sqrt()),
        _ => 0.0,
    }
}

/// Indices des k plus grandes valeurs (à égalité, le plus petit indice d'abord).
pub fn top_k(values: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));
    order.truncate(k);
    order
}

pub fn top_k_overlap(a: &[f64], b: &[f64], k: usize) -> f64 {
    if k == 0 {
        return 1.0;
    }
    let top_a = top_k(a, k);
    let top_b = top_k(b, k);
    let common = top_a.iter().filter(|i| top_b.contains(i)).count();
    common as f64 / k as f64
}

pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

fn round_to(value: f64, multiple: usize) -> usize {
    let m = multiple.max(1) as f64;
    ((value / m).round() * m).max(m) as usize
}

// ════════════════════════════════════════════════════════════════
// Comptes cumulés
// ════════════════════════════════════════════════════════════════

/// `counts(pool, n)` = fréquences sur les n premiers tirages, en O(1).
struct PrefixCounts {
    balls: Vec<Vec<u32>>,
    stars: Vec<Vec<u32>>,
}

impl PrefixCounts {
    fn new(draws: &[Draw]) -> Self {
        let build = |pool: Pool| {
            let mut rows = Vec::with_capacity(draws.len() + 1);
            let mut current = vec![0u32; pool.size()];
            rows.push(current.clone());
            for draw in draws {
                for &n in pool.numbers_from(draw) {
                    let idx = (n - 1) as usize;
                    if idx < current.len() {
                        current[idx] += 1;
                    }
                }
                rows.push(current.clone());
            }
            rows
        };
        Self { balls: build(Pool::Balls), stars: build(Pool::Stars) }
    }

    fn counts(&self, pool: Pool, n: usize) -> &[u32] {
        match pool {
            Pool::Balls => &self.balls[n],
            Pool::Stars => &self.stars[n],
        }
    }

    fn scores(&self, pool: Pool, n: usize, family: SignalFamily) -> Vec<f64> {
        let counts = self.counts(pool, n);
        match family {
            SignalFamily::Surrepresentation => crate::stats::z_scores(counts, n, pool),
            _ => counts.iter().map(|&c| c as f64).collect(),
        }
    }

    /// Étiquettes de tendance des R premiers tirages sur une fenêtre de W.
    fn trend_labels(&self, pool: Pool, window: usize, recent: usize) -> Vec<TrendDirection> {
        let total = self.counts(pool, window);
        let head = self.counts(pool, recent);
        total
            .iter()
            .zip(head.iter())
            .map(|(&t, &r)| {
                let expected = (t as f64 / window as f64) * recent as f64;
                let ratio = if expected > 0.0 { r as f64 / expected } else { 0.0 };
                classify_trend(ratio).0
            })
            .collect()
    }
}

/// Part des numéros dont l'étiquette est identique dans toutes les lectures.
pub fn concordance(readings: &[Vec<TrendDirection>]) -> f64 {
    let Some(first) = readings.first() else {
        return 0.0;
    };
    if first.is_empty() {
        return 0.0;
    }
    let same = (0..first.len())
        .filter(|&i| readings.iter().all(|r| r.get(i) == Some(&first[i])))
        .count();
    same as f64 / first.len() as f64
}

// ════════════════════════════════════════════════════════════════
// Recherche du point standard
// ════════════════════════════════════════════════════════════════

fn ranking_probe(
    prefix: &PrefixCounts,
    family: SignalFamily,
    n: usize,
    delta: usize,
    (k_balls, k_stars): (usize, usize),
    (rho_min, overlap_min): (f64, f64),
) -> StabilityProbe {
    let measure = |pool: Pool, k: usize| {
        let at_n = prefix.scores(pool, n, family);
        let at_nd = prefix.scores(pool, n + delta, family);
        (spearman(&at_n, &at_nd), top_k_overlap(&at_n, &at_nd, k))
    };
    let (rho_balls, overlap_balls) = measure(Pool::Balls, k_balls);
    let (rho_stars, overlap_stars) = measure(Pool::Stars, k_stars);
    let ok = rho_balls >= rho_min
        && rho_stars >= rho_min
        && overlap_balls >= overlap_min
        && overlap_stars >= overlap_min;
    StabilityProbe { window: n, rho_balls, rho_stars, overlap_balls, overlap_stars, ok }
}

/// Sonde une fenêtre N pour une famille à classement.
pub fn probe(history: &[Draw], family: SignalFamily, n: usize) -> Option<StabilityProbe> {
    let StabilityCriterion::Ranking { delta, top_k_balls, top_k_stars, rho_min, overlap_min, .. } =
        StabilityCriterion::for_family(family)
    else {
        return None;
    };
    if n == 0 || n + delta > history.len() {
        return None;
    }
    let prefix = PrefixCounts::new(&history[..n + delta]);
    Some(ranking_probe(&prefix, family, n, delta, (top_k_balls, top_k_stars), (rho_min, overlap_min)))
}

fn scan(
    history: &[Draw],
    family: SignalFamily,
    settings: &CalibrationSettings,
) -> (Option<CalibrationPoint>, Vec<StabilityProbe>) {
    let step = settings.step.max(1);
    let start = settings.start.max(1);
    let prefix = PrefixCounts::new(history);
    let len = history.len();

    match StabilityCriterion::for_family(family) {
        StabilityCriterion::Ranking {
            delta,
            top_k_balls,
            top_k_stars,
            rho_min,
            overlap_min,
            confirmations,
            max_window,
        } => {
            let mut curve = Vec::new();
            let mut run_start = None;
            let mut run_len = 0usize;
            let mut n = start;
            while n + delta <= len && max_window.map_or(true, |max| n <= max) {
                let p = ranking_probe(
                    &prefix,
                    family,
                    n,
                    delta,
                    (top_k_balls, top_k_stars),
                    (rho_min, overlap_min),
                );
                curve.push(p);
                if p.ok {
                    run_start.get_or_insert(n);
                    run_len += 1;
                    if run_len >= confirmations.max(1) {
                        let window = run_start.unwrap_or(n);
                        return (Some(CalibrationPoint { window, recent: None }), curve);
                    }
                } else {
                    run_start = None;
                    run_len = 0;
                }
                n += step;
            }
            (None, curve)
        }
        StabilityCriterion::Concordance { min_concordance, recent_start, recent_step } => {
            let mut w = start;
            while w <= len {
                let mut r = recent_start.max(1);
                while r + 2 * recent_step <= w / 2 {
                    let stable = Pool::ALL.iter().all(|&pool| {
                        let readings: Vec<Vec<TrendDirection>> = (0..3)
                            .map(|i| prefix.trend_labels(pool, w, r + i * recent_step))
                            .collect();
                        concordance(&readings) >= min_concordance
                    });
                    if stable {
                        return (Some(CalibrationPoint { window: w, recent: Some(r) }), Vec::new());
                    }
                    r += recent_step;
                }
                w += step;
            }
            (None, Vec::new())
        }
        StabilityCriterion::Coverage => {
            let gaps_balls = absences(history, Pool::Balls);
            let gaps_stars = absences(history, Pool::Stars);
            let sentinel = len as u32;
            let worst = gaps_balls.iter().chain(gaps_stars.iter()).copied().max();
            match worst {
                Some(worst) if worst < sentinel => {
                    (Some(CalibrationPoint { window: coverage_window(worst, len, step), recent: None }), Vec::new())
                }
                _ => (None, Vec::new()),
            }
        }
    }
}

/// Plus petite fenêtre multiple de `step` couvrant la plus longue absence.
///
/// Si ce multiple dépasse l'historique, la fenêtre vaut `len` : arrondir vers
/// le bas perdrait le numéro le plus absent. `standard.window` n'est alors pas
/// un multiple de `step`.
fn coverage_window(worst: u32, len: usize, step: usize) -> usize {
    let needed = worst as usize + 1;
    (needed.div_ceil(step) * step).max(step).min(len)
}

/// Premier point stable pour l'historique donné, en balayant du plus petit au plus grand.
pub fn search_standard(
    history: &[Draw],
    family: SignalFamily,
    settings: &CalibrationSettings,
) -> Option<CalibrationPoint> {
    scan(history, family, settings).0
}

pub fn calibrate_family(
    history: &[Draw],
    family: SignalFamily,
    settings: &CalibrationSettings,
) -> Result<FamilyCalibration> {
    let (standard, curve) = scan(history, family, settings);
    let standard = standard.ok_or(VivierError::CalibrationUnresolved(family))?;

    let offsets: Vec<usize> = (1..=settings.max_subsets)
        .map(|k| k * settings.subset_stride)
        .filter(|&offset| offset < history.len() && history.len() - offset >= settings.min_tail)
        .collect();

    let samples: Vec<CalibrationPoint> = offsets
        .par_iter()
        .filter_map(|&offset| search_standard(&history[offset..], family, settings))
        .collect();
    debug!("{family} : {} sous-séries, {} résolues", offsets.len(), samples.len());

    let (band, dynamic) = if samples.len() >= 2 {
        let windows: Vec<f64> = samples.iter().map(|p| p.window as f64).collect();
        let band_of = |values: &[f64]| -> Option<(f64, f64)> {
            Some((
                percentile(values, settings.low_percentile)?,
                percentile(values, settings.high_percentile)?,
            ))
        };
        let window_band = band_of(&windows);
        let recents: Vec<f64> = samples.iter().filter_map(|p| p.recent.map(|r| r as f64)).collect();
        let recent_band = if recents.is_empty() { None } else { band_of(&recents) };

        let window = match window_band {
            Some((lo, hi)) => round_to((standard.window as f64).clamp(lo, hi), 10),
            None => round_to(standard.window as f64, 10),
        };
        let recent = standard.recent.map(|r| match recent_band {
            Some((lo, hi)) => round_to((r as f64).clamp(lo, hi), 5),
            None => round_to(r as f64, 5),
        });
        (
            window_band.map(|window| SafetyBand { window, recent: recent_band }),
            CalibrationPoint { window, recent },
        )
    } else {
        let dynamic = CalibrationPoint {
            window: round_to(standard.window as f64, 10),
            recent: standard.recent.map(|r| round_to(r as f64, 5)),
        };
        (None, dynamic)
    };

    info!(
        "{family} : standard N={} dynamique N={}{}",
        standard.window,
        dynamic.window,
        dynamic.recent.map(|r| format!(" R={r}")).unwrap_or_default()
    );

    Ok(FamilyCalibration { family, standard, samples, band, dynamic, curve })
}

pub fn calibrate_outcome(history: &[Draw], family: SignalFamily, settings: &CalibrationSettings) -> FamilyOutcome {
    match calibrate_family(history, family, settings) {
        Ok(calibration) => FamilyOutcome::Resolved(calibration),
        Err(e) => {
            warn!("{e}");
            FamilyOutcome::Unresolved { family }
        }
    }
}

pub fn calibrate_all(history: &[Draw], settings: &CalibrationSettings) -> CalibrationReport {
    let families = SignalFamily::ALL
        .iter()
        .map(|&family| calibrate_outcome(history, family, settings))
        .collect();
    CalibrationReport::new(history, families)
}

pub fn save_report(report: &CalibrationReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_report(path: &Path) -> anyhow::Result<CalibrationReport> {
    let json = std::fs::read_to_string(path)?;
    let report: CalibrationReport = serde_json::from_str(&json)?;
    Ok(report)
}

/// Fenêtres dynamiques courantes, recalculées quand l'historique grandit.
#[derive(Debug, Clone, Default)]
pub struct DynamicWindows {
    settings: CalibrationSettings,
    report: Option<CalibrationReport>,
}

impl DynamicWindows {
    pub fn new(settings: CalibrationSettings) -> Self {
        Self { settings, report: None }
    }

    pub fn with_report(settings: CalibrationSettings, report: CalibrationReport) -> Self {
        Self { settings, report: Some(report) }
    }

    /// Recalibre si l'historique a changé. Retourne vrai si un calcul a eu lieu.
    pub fn refresh(&mut self, history: &[Draw]) -> bool {
        if self.report.as_ref().is_some_and(|r| r.matches(history)) {
            return false;
        }
        self.report = Some(calibrate_all(history, &self.settings));
        true
    }

    pub fn report(&self) -> Option<&CalibrationReport> {
        self.report.as_ref()
    }

    pub fn windows(&self, defaults: &crate::window::WindowConfig) -> crate::window::WindowConfig {
        match &self.report {
            Some(report) => defaults.with_calibration(report),
            None => defaults.clone(),
        }
    }
}
