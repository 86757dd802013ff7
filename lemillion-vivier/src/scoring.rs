//! Score multicritère : fréquence, surreprésentation et tendance, pondérés par
//! les influences et l'ordre de priorité.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::stats::CandidateMetric;
use crate::{Result, VivierError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Frequency,
    Surrepresentation,
    Trend,
}

impl Criterion {
    pub const ALL: [Criterion; 3] = [Criterion::Frequency, Criterion::Surrepresentation, Criterion::Trend];
}

/// Coefficients par rang de priorité (1er, 2e, 3e).
const PRIORITY_COEFFICIENTS: [f64; 3] = [1.0, 0.4, 0.25];

/// Permutation des trois critères.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Criterion>", into = "Vec<Criterion>")]
pub struct PriorityOrder([Criterion; 3]);

impl PriorityOrder {
    pub fn new(order: Vec<Criterion>) -> Result<Self> {
        let is_permutation =
            order.len() == 3 && Criterion::ALL.iter().all(|c| order.iter().filter(|o| *o == c).count() == 1);
        if !is_permutation {
            return Err(VivierError::InvalidRequest(format!(
                "ordre de priorité invalide : {:?} (les trois critères exactement une fois)",
                order
            )));
        }
        Ok(Self([order[0], order[1], order[2]]))
    }

    pub fn criteria(&self) -> &[Criterion; 3] {
        &self.0
    }

    pub fn position(&self, criterion: Criterion) -> usize {
        self.0.iter().position(|&c| c == criterion).unwrap_or(2)
    }

    pub fn coefficient(&self, criterion: Criterion) -> f64 {
        PRIORITY_COEFFICIENTS[self.position(criterion)]
    }
}

impl Default for PriorityOrder {
    fn default() -> Self {
        Self(Criterion::ALL)
    }
}

impl TryFrom<Vec<Criterion>> for PriorityOrder {
    type Error = VivierError;

    fn try_from(order: Vec<Criterion>) -> Result<Self> {
        Self::new(order)
    }
}

impl From<PriorityOrder> for Vec<Criterion> {
    fn from(order: PriorityOrder) -> Self {
        order.0.to_vec()
    }
}

/// Réglages d'influence 0..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Influence {
    pub frequency: u8,
    pub surrepresentation: u8,
    pub trend: u8,
}

impl Default for Influence {
    fn default() -> Self {
        Self { frequency: 5, surrepresentation: 5, trend: 5 }
    }
}

impl Influence {
    pub fn uniform(level: u8) -> Self {
        Self { frequency: level, surrepresentation: level, trend: level }
    }

    pub fn validate(&self) -> Result<()> {
        for criterion in Criterion::ALL {
            let value = self.level(criterion);
            if value > 10 {
                return Err(VivierError::InvalidRequest(format!(
                    "influence {:?} hors bornes : {} (0..=10)",
                    criterion, value
                )));
            }
        }
        Ok(())
    }

    pub fn level(&self, criterion: Criterion) -> u8 {
        match criterion {
            Criterion::Frequency => self.frequency,
            Criterion::Surrepresentation => self.surrepresentation,
            Criterion::Trend => self.trend,
        }
    }

    /// Poids dans [0, 1].
    pub fn weight(&self, criterion: Criterion) -> f64 {
        self.level(criterion).min(10) as f64 / 10.0
    }

    /// Le critère actif quand il est le seul non nul.
    pub fn single_active(&self) -> Option<Criterion> {
        let mut active = Criterion::ALL.into_iter().filter(|&c| self.level(c) > 0);
        match (active.next(), active.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SubScores {
    pub frequency: f64,
    pub surrepresentation: f64,
    pub trend: f64,
}

impl SubScores {
    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Frequency => self.frequency,
            Criterion::Surrepresentation => self.surrepresentation,
            Criterion::Trend => self.trend,
        }
    }
}

/// Candidat noté. Les valeurs brutes servent au départage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub number: u8,
    pub score: f64,
    pub sub: SubScores,
    pub frequency: u32,
    pub z: f64,
    pub trend_score: u8,
    pub trend_sign: f64,
}

impl ScoredCandidate {
    /// Valeur brute d'un critère pour le départage.
    pub fn raw(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Frequency => self.frequency as f64,
            Criterion::Surrepresentation => self.z,
            Criterion::Trend => self.trend_sign * self.trend_score as f64,
        }
    }
}

/// Classement de compétition (égalité = meilleur rang partagé).
pub fn frequency_subscores(metrics: &[CandidateMetric]) -> Vec<f64> {
    let size = metrics.len();
    metrics
        .iter()
        .map(|m| {
            if size <= 1 {
                return 1.0;
            }
            let rank = 1 + metrics.iter().filter(|o| o.frequency > m.frequency).count();
            1.0 - (rank - 1) as f64 / (size - 1) as f64
        })
        .collect()
}

pub fn surrepresentation_subscores(metrics: &[CandidateMetric]) -> Vec<f64> {
    metrics.iter().map(|m| (m.surrepr_z / 2.5).tanh()).collect()
}

pub fn trend_subscores(metrics: &[CandidateMetric]) -> Vec<f64> {
    metrics
        .iter()
        .map(|m| m.trend_direction.sign() * (m.trend_score as f64 / 10.0).clamp(0.0, 1.0))
        .collect()
}

/// Métriques de chaque famille, calculées sur sa propre fenêtre, par numéro.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInputs<'a> {
    pub frequency: &'a [CandidateMetric],
    pub surrepresentation: &'a [CandidateMetric],
    pub trend: &'a [CandidateMetric],
}

/// Ordre total : score décroissant, puis valeurs brutes selon la priorité, puis numéro.
pub fn compare(a: &ScoredCandidate, b: &ScoredCandidate, priority: &PriorityOrder) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| {
            priority
                .criteria()
                .iter()
                .map(|&c| b.raw(c).total_cmp(&a.raw(c)))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        })
        .then(a.number.cmp(&b.number))
}

pub fn rank_candidates(
    inputs: ScoringInputs<'_>,
    influence: &Influence,
    priority: &PriorityOrder,
) -> Result<Vec<ScoredCandidate>> {
    let size = inputs.frequency.len();
    if inputs.surrepresentation.len() != size || inputs.trend.len() != size {
        return Err(VivierError::InvalidRequest(format!(
            "métriques incohérentes : {} / {} / {}",
            size,
            inputs.surrepresentation.len(),
            inputs.trend.len()
        )));
    }

    let freq = frequency_subscores(inputs.frequency);
    let surr = surrepresentation_subscores(inputs.surrepresentation);
    let trend = trend_subscores(inputs.trend);
    let single = influence.single_active();

    let mut basket: Vec<ScoredCandidate> = (0..size)
        .map(|i| {
            let sub = SubScores { frequency: freq[i], surrepresentation: surr[i], trend: trend[i] };
            let score: f64 = match single {
                Some(criterion) => sub.get(criterion),
                None => Criterion::ALL
                    .iter()
                    .map(|&c| priority.coefficient(c) * influence.weight(c) * sub.get(c))
                    .sum(),
            };
            // -0.0 → 0.0 pour que total_cmp ne sépare pas deux scores nuls
            let score = score + 0.0;
            let t = &inputs.trend[i];
            ScoredCandidate {
                number: inputs.frequency[i].number,
                score,
                sub,
                frequency: inputs.frequency[i].frequency,
                z: inputs.surrepresentation[i].surrepr_z,
                trend_score: t.trend_score,
                trend_sign: t.trend_direction.sign(),
            }
        })
        .collect();

    basket.sort_by(|a, b| compare(a, b, priority));
    Ok(basket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{candidate_metrics, TrendDirection};
    use crate::testing::{make_history, periodic_history};
    use lemillion_db::models::Pool;

    fn metric(number: u8, frequency: u32, z: f64, trend: (TrendDirection, u8)) -> CandidateMetric {
        CandidateMetric {
            number,
            frequency,
            frequency_percentile: 0.0,
            trend_score: trend.1,
            trend_direction: trend.0,
            absence: 0,
            surrepr_z: z,
        }
    }

    #[test]
    fn test_priority_order_permutation() {
        use Criterion::*;
        assert!(PriorityOrder::new(vec![Trend, Frequency, Surrepresentation]).is_ok());
        assert!(PriorityOrder::new(vec![Trend, Trend, Frequency]).is_err());
        assert!(PriorityOrder::new(vec![Trend, Frequency]).is_err());

        let order = PriorityOrder::new(vec![Trend, Frequency, Surrepresentation]).unwrap();
        assert_eq!(order.coefficient(Trend), 1.0);
        assert_eq!(order.coefficient(Frequency), 0.4);
        assert_eq!(order.coefficient(Surrepresentation), 0.25);
    }

    #[test]
    fn test_priority_order_serde_rejects_duplicates() {
        let ok: PriorityOrder = serde_json::from_str(r#"["trend","frequency","surrepresentation"]"#).unwrap();
        assert_eq!(ok.criteria()[0], Criterion::Trend);
        assert!(serde_json::from_str::<PriorityOrder>(r#"["trend","trend","frequency"]"#).is_err());
    }

    #[test]
    fn test_frequency_subscores_competition_rank() {
        let metrics = vec![
            metric(1, 5, 0.0, (TrendDirection::Stable, 5)),
            metric(2, 9, 0.0, (TrendDirection::Stable, 5)),
            metric(3, 9, 0.0, (TrendDirection::Stable, 5)),
            metric(4, 1, 0.0, (TrendDirection::Stable, 5)),
            metric(5, 0, 0.0, (TrendDirection::Stable, 5)),
        ];
        assert_eq!(frequency_subscores(&metrics), vec![0.5, 1.0, 1.0, 0.25, 0.0]);
    }

    #[test]
    fn test_trend_and_surrepr_subscores() {
        let metrics = vec![
            metric(1, 0, 2.5, (TrendDirection::Rising, 8)),
            metric(2, 0, -5.0, (TrendDirection::Falling, 3)),
            metric(3, 0, 0.0, (TrendDirection::Stable, 5)),
        ];
        let t = trend_subscores(&metrics);
        assert!((t[0] - 0.8).abs() < 1e-12);
        assert!((t[1] + 0.3).abs() < 1e-12);
        assert_eq!(t[2], 0.0);

        let s = surrepresentation_subscores(&metrics);
        assert!((s[0] - 1.0f64.tanh()).abs() < 1e-12);
        assert!(s[1] > -1.0 && s[1] < -0.96);
    }

    #[test]
    fn test_single_active_bypass() {
        // Seule la tendance est active : l'ordre suit le sous-score tendance pur
        let metrics = vec![
            metric(1, 10, 3.0, (TrendDirection::Falling, 2)),
            metric(2, 0, -3.0, (TrendDirection::Rising, 9)),
        ];
        let inputs = ScoringInputs { frequency: &metrics, surrepresentation: &metrics, trend: &metrics };
        let influence = Influence { frequency: 0, surrepresentation: 0, trend: 3 };
        let order = PriorityOrder::new(vec![Criterion::Frequency, Criterion::Surrepresentation, Criterion::Trend])
            .unwrap();
        let basket = rank_candidates(inputs, &influence, &order).unwrap();
        assert_eq!(basket[0].number, 2);
        assert!((basket[0].score - 0.9).abs() < 1e-12);
        assert!((basket[1].score + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_blend_uses_priority_coefficients() {
        let metrics = vec![
            metric(1, 4, 0.0, (TrendDirection::Stable, 5)),
            metric(2, 2, 0.0, (TrendDirection::Rising, 10)),
        ];
        let inputs = ScoringInputs { frequency: &metrics, surrepresentation: &metrics, trend: &metrics };
        let influence = Influence::uniform(10);

        // Fréquence d'abord : 1.0 contre 0.25
        let order = PriorityOrder::default();
        let basket = rank_candidates(inputs, &influence, &order).unwrap();
        assert_eq!(basket[0].number, 1);
        assert!((basket[0].score - 1.0).abs() < 1e-12);
        assert!((basket[1].score - 0.25).abs() < 1e-12);

        // Tendance d'abord : 0.4 contre 1.0
        let order = PriorityOrder::new(vec![Criterion::Trend, Criterion::Frequency, Criterion::Surrepresentation])
            .unwrap();
        let basket = rank_candidates(inputs, &influence, &order).unwrap();
        assert_eq!(basket[0].number, 2);
    }

    #[test]
    fn test_tie_chain_follows_priority() {
        // Scores nuls (influences à 0) : seul le départage compte
        let metrics = vec![
            metric(1, 3, 0.5, (TrendDirection::Stable, 5)),
            metric(2, 1, 2.0, (TrendDirection::Stable, 5)),
            metric(3, 1, 2.0, (TrendDirection::Stable, 5)),
        ];
        let inputs = ScoringInputs { frequency: &metrics, surrepresentation: &metrics, trend: &metrics };
        let influence = Influence::uniform(0);

        let basket = rank_candidates(inputs, &influence, &PriorityOrder::default()).unwrap();
        let order: Vec<u8> = basket.iter().map(|c| c.number).collect();
        assert_eq!(order, vec![1, 2, 3]);

        let surr_first =
            PriorityOrder::new(vec![Criterion::Surrepresentation, Criterion::Frequency, Criterion::Trend]).unwrap();
        let basket = rank_candidates(inputs, &influence, &surr_first).unwrap();
        let order: Vec<u8> = basket.iter().map(|c| c.number).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn test_periodic_basket_top() {
        let history = periodic_history(300);
        let metrics = candidate_metrics(&history[..200], Pool::Balls, Some(20));
        let inputs = ScoringInputs { frequency: &metrics, surrepresentation: &metrics, trend: &metrics };
        let basket = rank_candidates(inputs, &Influence::uniform(10), &PriorityOrder::default()).unwrap();
        let top: Vec<u8> = basket.iter().take(6).map(|c| c.number).collect();
        assert_eq!(top, vec![1, 2, 3, 4, 31, 30]);
    }

    #[test]
    fn test_rank_is_repeatable() {
        let history = make_history(150, 12);
        let metrics = candidate_metrics(&history, Pool::Balls, None);
        let inputs = ScoringInputs { frequency: &metrics, surrepresentation: &metrics, trend: &metrics };
        let a = rank_candidates(inputs, &Influence::default(), &PriorityOrder::default()).unwrap();
        let b = rank_candidates(inputs, &Influence::default(), &PriorityOrder::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
    }

    #[test]
    fn test_mismatched_inputs_rejected() {
        let history = make_history(40, 1);
        let balls = candidate_metrics(&history, Pool::Balls, None);
        let stars = candidate_metrics(&history, Pool::Stars, None);
        let inputs = ScoringInputs { frequency: &balls, surrepresentation: &stars, trend: &balls };
        assert!(rank_candidates(inputs, &Influence::default(), &PriorityOrder::default()).is_err());
    }
}
