//! Garde d'unicité : aucune combinaison déjà émise pour la même date de tirage.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use log::{debug, warn};

use crate::providers::IssuedCombinationsProvider;
use crate::sampler::VivierSize;
use crate::{Result, VivierError};

pub const DEFAULT_MAX_ATTEMPTS: usize = 180;

/// Valeur identifiée par une clé canonique.
pub trait Keyed {
    fn key(&self) -> String;
}

/// Clés émises par date, lues une seule fois par session.
///
/// Deux appelants concurrents sur une date absente peuvent lancer chacun la
/// lecture ; seul le premier résultat est conservé et tous reçoivent celui-là.
#[derive(Debug, Default)]
pub struct IssuedCache {
    slots: Mutex<HashMap<NaiveDate, Arc<HashSet<String>>>>,
}

impl IssuedCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cached(&self, date: NaiveDate) -> Option<Arc<HashSet<String>>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(&date).cloned()
    }

    pub fn get_or_fetch<P>(&self, date: NaiveDate, provider: &P) -> Result<Arc<HashSet<String>>>
    where
        P: IssuedCombinationsProvider + ?Sized,
    {
        if let Some(keys) = self.cached(date) {
            return Ok(keys);
        }

        // Lecture hors verrou
        let fetched = provider.issued_keys(date)?;
        debug!("Combinaisons émises pour le {date} : {}", fetched.len());

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slots.entry(date).or_insert_with(|| Arc::new(fetched)).clone())
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Contexte d'une génération : date visée et configuration du vivier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationContext {
    pub target_date: NaiveDate,
    pub vivier: VivierSize,
}

impl GenerationContext {
    pub fn new(target_date: NaiveDate, vivier: VivierSize) -> Self {
        Self { target_date, vivier }
    }
}

#[derive(Debug)]
pub struct UniquenessGuard {
    issued: IssuedCache,
    session: HashMap<NaiveDate, HashSet<String>>,
    max_attempts: usize,
}

impl Default for UniquenessGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl UniquenessGuard {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            issued: IssuedCache::new(),
            session: HashMap::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn issued(&self) -> &IssuedCache {
        &self.issued
    }

    /// Clés émises ailleurs ∪ clés générées dans la session, pour la date.
    pub fn forbidden<P>(&self, ctx: &GenerationContext, provider: &P) -> Result<HashSet<String>>
    where
        P: IssuedCombinationsProvider + ?Sized,
    {
        let issued = self.issued.get_or_fetch(ctx.target_date, provider)?;
        let mut forbidden: HashSet<String> = issued.as_ref().clone();
        if let Some(session) = self.session.get(&ctx.target_date) {
            forbidden.extend(session.iter().cloned());
        }
        Ok(forbidden)
    }

    pub fn session_keys(&self, date: NaiveDate) -> Option<&HashSet<String>> {
        self.session.get(&date)
    }

    pub fn record(&mut self, date: NaiveDate, key: String) -> bool {
        self.session.entry(date).or_default().insert(key)
    }

    /// Relance `attempt` jusqu'à obtenir une clé inédite pour la date.
    pub fn run<T, P, F>(&mut self, ctx: &GenerationContext, provider: &P, mut attempt: F) -> Result<T>
    where
        T: Keyed,
        P: IssuedCombinationsProvider + ?Sized,
        F: FnMut(usize) -> Result<T>,
    {
        let forbidden = self.forbidden(ctx, provider)?;

        for i in 1..=self.max_attempts {
            let candidate = attempt(i)?;
            let key = candidate.key();
            if forbidden.contains(&key) {
                debug!("Tentative {i} : {key} déjà émise");
                continue;
            }
            debug!("Tentative {i} : {key} acceptée");
            self.record(ctx.target_date, key);
            return Ok(candidate);
        }

        warn!(
            "Aucune combinaison inédite pour le {} après {} tentatives (vivier {}+{})",
            ctx.target_date, self.max_attempts, ctx.vivier.balls, ctx.vivier.stars
        );
        Err(VivierError::GenerationExhausted {
            target_date: ctx.target_date,
            attempts: self.max_attempts,
        })
    }
}
