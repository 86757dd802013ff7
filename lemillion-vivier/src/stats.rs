//! Statistiques par fenêtre : fréquences, absences, tendance et z-score.
//! Toutes les fonctions sont pures ; `draws[0]` est le tirage le plus récent.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use lemillion_db::models::{Draw, Pool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl TrendDirection {
    pub fn sign(&self) -> f64 {
        match self {
            TrendDirection::Rising => 1.0,
            TrendDirection::Falling => -1.0,
            TrendDirection::Stable => 0.0,
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Rising => write!(f, "↑"),
            TrendDirection::Falling => write!(f, "↓"),
            TrendDirection::Stable => write!(f, "="),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendReading {
    pub direction: TrendDirection,
    pub score: u8,
    pub ratio: f64,
}

/// Métriques d'un numéro sur une fenêtre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetric {
    pub number: u8,
    pub frequency: u32,
    pub frequency_percentile: f64,
    pub trend_score: u8,
    pub trend_direction: TrendDirection,
    /// Tirages depuis la dernière sortie, ou longueur de fenêtre si jamais sorti.
    pub absence: u32,
    pub surrepr_z: f64,
}

pub fn frequencies(draws: &[Draw], pool: Pool) -> Vec<u32> {
    let mut counts = vec![0u32; pool.size()];
    for draw in draws {
        for &n in pool.numbers_from(draw) {
            let idx = (n - 1) as usize;
            if idx < counts.len() {
                counts[idx] += 1;
            }
        }
    }
    counts
}

/// Min-max sur 0..100. Tous à 0 si les comptes sont égaux.
pub fn normalized_frequencies(counts: &[u32]) -> Vec<f64> {
    let min = counts.iter().copied().min().unwrap_or(0);
    let max = counts.iter().copied().max().unwrap_or(0);
    if max == min {
        return vec![0.0; counts.len()];
    }
    let span = (max - min) as f64;
    counts.iter().map(|&c| (c - min) as f64 * 100.0 / span).collect()
}

pub fn absences(draws: &[Draw], pool: Pool) -> Vec<u32> {
    let sentinel = draws.len() as u32;
    let mut gaps = vec![sentinel; pool.size()];
    for (i, draw) in draws.iter().enumerate() {
        for &n in pool.numbers_from(draw) {
            let idx = (n - 1) as usize;
            if idx < gaps.len() && gaps[idx] == sentinel {
                gaps[idx] = i as u32;
            }
        }
    }
    gaps
}

/// Classe un rapport observé/attendu.
pub fn classify_trend(ratio: f64) -> (TrendDirection, u8) {
    if ratio > 1.2 {
        let score = ((ratio - 1.0) * 10.0).round().min(10.0);
        (TrendDirection::Rising, score as u8)
    } else if ratio < 0.8 {
        let score = (ratio * 5.0).round().max(0.0);
        (TrendDirection::Falling, score as u8)
    } else {
        (TrendDirection::Stable, 5)
    }
}

/// Compare les `recent` premiers tirages à la fenêtre entière.
pub fn trend_readings(draws: &[Draw], pool: Pool, recent: usize) -> Vec<TrendReading> {
    let recent = recent.min(draws.len());
    let total = frequencies(draws, pool);
    let recent_counts = frequencies(&draws[..recent], pool);
    let total_len = draws.len() as f64;

    total
        .iter()
        .zip(recent_counts.iter())
        .map(|(&total_count, &recent_count)| {
            let expected = if total_len > 0.0 {
                (total_count as f64 / total_len) * recent as f64
            } else {
                0.0
            };
            let ratio = if expected > 0.0 { recent_count as f64 / expected } else { 0.0 };
            let (direction, score) = classify_trend(ratio);
            TrendReading { direction, score, ratio }
        })
        .collect()
}

/// z = (observé − N·p0) / sqrt(N·p0·(1−p0)).
pub fn z_scores(counts: &[u32], window_len: usize, pool: Pool) -> Vec<f64> {
    let p0 = pool.base_probability();
    let n = window_len as f64;
    let expected = n * p0;
    let sd = (n * p0 * (1.0 - p0)).sqrt();
    counts
        .iter()
        .map(|&c| if sd > 0.0 { (c as f64 - expected) / sd } else { 0.0 })
        .collect()
}

/// Sous-fenêtre de tendance par défaut : un cinquième de la fenêtre.
pub fn default_recent(window_len: usize) -> usize {
    (window_len / 5).max(1)
}

pub fn candidate_metrics(draws: &[Draw], pool: Pool, recent: Option<usize>) -> Vec<CandidateMetric> {
    let counts = frequencies(draws, pool);
    let percentiles = normalized_frequencies(&counts);
    let gaps = absences(draws, pool);
    let trends = trend_readings(draws, pool, recent.unwrap_or_else(|| default_recent(draws.len())));
    let z = z_scores(&counts, draws.len(), pool);

    (0..pool.size())
        .map(|i| CandidateMetric {
            number: (i + 1) as u8,
            frequency: counts[i],
            frequency_percentile: percentiles[i],
            trend_score: trends[i].score,
            trend_direction: trends[i].direction,
            absence: gaps[i],
            surrepr_z: z[i],
        })
        .collect()
}

/// Classement des dormeurs : plus longue absence, puis plus faible fréquence, puis numéro.
pub fn absence_ranking(metrics: &[CandidateMetric]) -> Vec<u8> {
    let mut sorted: Vec<&CandidateMetric> = metrics.iter().collect();
    sorted.sort_by(|a, b| {
        b.absence
            .cmp(&a.absence)
            .then(a.frequency.cmp(&b.frequency))
            .then(a.number.cmp(&b.number))
    });
    sorted.iter().map(|m| m.number).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    pool: Pool,
    len: usize,
    latest: Option<NaiveDate>,
    recent: Option<usize>,
}

/// Mémoïsation des métriques par fenêtre résolue. Possédée par l'appelant.
#[derive(Debug, Default)]
pub struct StatsCache {
    entries: HashMap<CacheKey, Vec<CandidateMetric>>,
    hits: usize,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&mut self, draws: &[Draw], pool: Pool, recent: Option<usize>) -> &[CandidateMetric] {
        let key = CacheKey {
            pool,
            len: draws.len(),
            latest: draws.first().map(|d| d.date),
            recent,
        };
        if self.entries.contains_key(&key) {
            self.hits += 1;
            log::debug!("Cache statistiques : {:?} ({} tirages)", pool, draws.len());
        }
        self.entries
            .entry(key)
            .or_insert_with(|| candidate_metrics(draws, pool, recent))
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
