//! Pipeline de génération : fenêtres → métriques → panier noté → tirage →
//! dormeurs → garde d'unicité.

use std::collections::BTreeMap;

use log::debug;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use lemillion_db::models::{canonical_key, Draw, Pool};

pub use crate::composition::{CategoryWeights, Pick, SourceTag};
use crate::composition::compose;
use crate::dormant::replace_weakest;
use crate::guard::{GenerationContext, Keyed, UniquenessGuard};
use crate::providers::{validate_history, IssuedCombinationsProvider, TariffResolver};
use crate::sampler::{effective_vivier, pick, VivierSize};
use crate::scoring::{rank_candidates, Influence, PriorityOrder, ScoredCandidate, ScoringInputs};
use crate::stats::{absence_ranking, StatsCache};
use crate::window::WindowConfig;
use crate::{Result, SignalFamily, VivierError};

/// Objectifs par catégorie, par pool.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryPlan {
    #[serde(default)]
    pub balls: Option<CategoryWeights>,
    #[serde(default)]
    pub stars: Option<CategoryWeights>,
}

impl CategoryPlan {
    pub fn get(&self, pool: Pool) -> Option<&CategoryWeights> {
        match pool {
            Pool::Balls => self.balls.as_ref(),
            Pool::Stars => self.stars.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub target_numbers: usize,
    pub target_stars: usize,
    pub influence: Influence,
    pub vivier_level: u8,
    pub vivier: Option<VivierSize>,
    pub determinism_level: u8,
    pub dormant_numbers_level: u8,
    pub dormant_stars_level: u8,
    pub category_weights: Option<CategoryPlan>,
    pub priority_order: PriorityOrder,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            target_numbers: 5,
            target_stars: 2,
            influence: Influence::default(),
            vivier_level: 5,
            vivier: None,
            determinism_level: 5,
            dormant_numbers_level: 0,
            dormant_stars_level: 0,
            category_weights: None,
            priority_order: PriorityOrder::default(),
        }
    }
}

impl GenerationRequest {
    pub fn target(&self, pool: Pool) -> usize {
        match pool {
            Pool::Balls => self.target_numbers,
            Pool::Stars => self.target_stars,
        }
    }

    pub fn dormant_level(&self, pool: Pool) -> u8 {
        match pool {
            Pool::Balls => self.dormant_numbers_level,
            Pool::Stars => self.dormant_stars_level,
        }
    }

    /// Tailles effectives du vivier pour cette requête.
    pub fn vivier_sizes(&self) -> VivierSize {
        let size = |pool: Pool| effective_vivier(pool, self.target(pool), self.vivier_level, self.vivier.as_ref());
        VivierSize { balls: size(Pool::Balls), stars: size(Pool::Stars) }
    }
}

fn check_level(name: &str, value: u8) -> Result<()> {
    if value > 10 {
        return Err(VivierError::InvalidRequest(format!("{name} hors bornes : {value} (0..=10)")));
    }
    Ok(())
}

/// Préconditions de la requête, vérifiées avant toute tentative.
pub fn validate<T: TariffResolver + ?Sized>(request: &GenerationRequest, tariff: &T) -> Result<()> {
    if tariff.resolve(request.target_numbers, request.target_stars).is_none() {
        return Err(VivierError::InvalidRequest(format!(
            "aucun tarif pour {} numéros et {} étoiles",
            request.target_numbers, request.target_stars
        )));
    }
    for pool in Pool::ALL {
        let target = request.target(pool);
        if target == 0 || target > pool.size() {
            return Err(VivierError::InvalidRequest(format!(
                "{} : objectif {} hors de 1..={}",
                pool.label(),
                target,
                pool.size()
            )));
        }
    }

    request.influence.validate()?;
    check_level("vivier", request.vivier_level)?;
    check_level("déterminisme", request.determinism_level)?;
    check_level("dormeurs numéros", request.dormant_numbers_level)?;
    check_level("dormeurs étoiles", request.dormant_stars_level)?;

    if let Some(plan) = &request.category_weights {
        for pool in Pool::ALL {
            if plan.get(pool).is_some_and(|w| !w.is_valid()) {
                return Err(VivierError::InvalidRequest(format!(
                    "{} : effectifs par catégorie invalides",
                    pool.label()
                )));
            }
        }
    }
    Ok(())
}

/// Partie déterministe d'un pool : panier noté complet et classement des absences.
#[derive(Debug, Clone)]
pub struct PreparedPool {
    pub pool: Pool,
    pub target: usize,
    pub vivier: usize,
    pub basket: Vec<ScoredCandidate>,
    pub absence_ranking: Vec<u8>,
}

impl PreparedPool {
    /// Les `vivier` meilleurs candidats.
    pub fn vivier_basket(&self) -> &[ScoredCandidate] {
        &self.basket[..self.vivier.min(self.basket.len())]
    }

    pub fn score_of(&self, number: u8) -> f64 {
        self.basket
            .iter()
            .find(|c| c.number == number)
            .map(|c| c.score)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct PreparedPools {
    pub balls: PreparedPool,
    pub stars: PreparedPool,
}

impl PreparedPools {
    pub fn get(&self, pool: Pool) -> &PreparedPool {
        match pool {
            Pool::Balls => &self.balls,
            Pool::Stars => &self.stars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCombination {
    pub balls: Vec<Pick>,
    pub stars: Vec<Pick>,
}

impl GeneratedCombination {
    pub fn new(mut balls: Vec<Pick>, mut stars: Vec<Pick>) -> Self {
        balls.sort_by_key(|p| p.number);
        stars.sort_by_key(|p| p.number);
        Self { balls, stars }
    }

    pub fn numbers(&self) -> Vec<u8> {
        self.balls.iter().map(|p| p.number).collect()
    }

    pub fn star_numbers(&self) -> Vec<u8> {
        self.stars.iter().map(|p| p.number).collect()
    }

    pub fn canonical_key(&self) -> String {
        canonical_key(&self.numbers(), &self.star_numbers())
    }

    pub fn picks(&self, pool: Pool) -> &[Pick] {
        match pool {
            Pool::Balls => &self.balls,
            Pool::Stars => &self.stars,
        }
    }

    pub fn source_tags(&self, pool: Pool) -> BTreeMap<u8, SourceTag> {
        self.picks(pool).iter().map(|p| (p.number, p.source)).collect()
    }
}

impl Keyed for GeneratedCombination {
    fn key(&self) -> String {
        self.canonical_key()
    }
}

pub struct Generator<'a> {
    history: &'a [Draw],
    windows: WindowConfig,
}

impl<'a> Generator<'a> {
    pub fn new(history: &'a [Draw], windows: WindowConfig) -> Result<Self> {
        validate_history(history)?;
        Ok(Self { history, windows })
    }

    pub fn windows(&self) -> &WindowConfig {
        &self.windows
    }

    fn prepare_pool(&self, pool: Pool, request: &GenerationRequest, cache: &mut StatsCache) -> Result<PreparedPool> {
        let mut metrics_for = |family: SignalFamily| -> Result<Vec<_>> {
            let window = self.windows.resolve(self.history, family)?;
            Ok(cache.metrics(window.draws, pool, window.recent).to_vec())
        };
        let frequency = metrics_for(SignalFamily::High)?;
        let surrepresentation = metrics_for(SignalFamily::Surrepresentation)?;
        let trend = metrics_for(SignalFamily::Trend)?;
        let dormant = metrics_for(SignalFamily::Dormant)?;

        let basket = rank_candidates(
            ScoringInputs { frequency: &frequency, surrepresentation: &surrepresentation, trend: &trend },
            &request.influence,
            &request.priority_order,
        )?;
        let target = request.target(pool);
        let vivier = effective_vivier(pool, target, request.vivier_level, request.vivier.as_ref());
        debug!("{} : vivier de {} sur {}", pool.label(), vivier, basket.len());

        Ok(PreparedPool {
            pool,
            target,
            vivier,
            basket,
            absence_ranking: absence_ranking(&dormant),
        })
    }

    /// Étapes déterministes, calculées une fois pour toutes les tentatives.
    pub fn prepare(&self, request: &GenerationRequest, cache: &mut StatsCache) -> Result<PreparedPools> {
        Ok(PreparedPools {
            balls: self.prepare_pool(Pool::Balls, request, cache)?,
            stars: self.prepare_pool(Pool::Stars, request, cache)?,
        })
    }

    fn attempt_pool(
        &self,
        prepared: &PreparedPool,
        request: &GenerationRequest,
        rng: &mut StdRng,
    ) -> Result<Vec<Pick>> {
        let level = request.determinism_level as f64;
        let basket = prepared.vivier_basket();

        let mut picks: Vec<Pick> = match request.category_weights.as_ref().and_then(|p| p.get(prepared.pool)) {
            Some(weights) => {
                let high: Vec<u8> = basket.iter().map(|c| c.number).collect();
                let dormant: Vec<u8> = prepared.absence_ranking.iter().copied().take(prepared.vivier).collect();
                let mut combined = high.clone();
                combined.extend(dormant.iter().filter(|n| !high.contains(n)));
                compose(&high, &dormant, &combined, weights, prepared.target, level, rng)?
                    .into_iter()
                    .map(|(number, source)| Pick { number, score: prepared.score_of(number), source })
                    .collect()
            }
            None => pick(basket, prepared.target, level, rng)?
                .into_iter()
                .map(|c| Pick { number: c.number, score: c.score, source: SourceTag::High })
                .collect(),
        };

        replace_weakest(
            &mut picks,
            &prepared.absence_ranking,
            request.dormant_level(prepared.pool),
            |n| prepared.score_of(n),
        );
        Ok(picks)
    }

    /// Une tentative : tirage, composition et remplacement par les dormeurs.
    pub fn attempt(
        &self,
        prepared: &PreparedPools,
        request: &GenerationRequest,
        rng: &mut StdRng,
    ) -> Result<GeneratedCombination> {
        let balls = self.attempt_pool(&prepared.balls, request, rng)?;
        let stars = self.attempt_pool(&prepared.stars, request, rng)?;
        Ok(GeneratedCombination::new(balls, stars))
    }

    /// Pipeline complet sous la garde d'unicité.
    pub fn generate<I, T>(
        &self,
        request: &GenerationRequest,
        ctx: &GenerationContext,
        guard: &mut UniquenessGuard,
        issued: &I,
        tariff: &T,
        rng: &mut StdRng,
    ) -> Result<GeneratedCombination>
    where
        I: IssuedCombinationsProvider + ?Sized,
        T: TariffResolver + ?Sized,
    {
        validate(request, tariff)?;
        let mut cache = StatsCache::new();
        let prepared = self.prepare(request, &mut cache)?;
        guard.run(ctx, issued, |i| {
            debug!("Génération pour le {} : tentative {i}", ctx.target_date);
            self.attempt(&prepared, request, rng)
        })
    }
}
