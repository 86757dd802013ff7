use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::sampler::pick;
use crate::Result;

/// Provenance d'un numéro retenu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    High,
    Dormant,
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceTag::High => write!(f, "fort"),
            SourceTag::Dormant => write!(f, "dormeur"),
        }
    }
}

/// Numéro retenu avec le score enregistré au moment du tirage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub number: u8,
    pub score: f64,
    pub source: SourceTag,
}

/// Effectifs demandés par catégorie (parties fractionnaires ignorées).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub high: f64,
    pub dormant: f64,
}

impl CategoryWeights {
    pub fn is_valid(&self) -> bool {
        self.high.is_finite() && self.dormant.is_finite() && self.high >= 0.0 && self.dormant >= 0.0
    }
}

/// Effectifs entiers (fort, dormeur) dont la somme ne dépasse pas `total`.
/// L'excédent est retiré aux dormeurs d'abord, puis aux forts.
pub fn allocate(weights: &CategoryWeights, total: usize) -> (usize, usize) {
    let mut high = weights.high.max(0.0).floor() as usize;
    let mut dormant = weights.dormant.max(0.0).floor() as usize;
    while high + dormant > total {
        if dormant > 0 {
            dormant -= 1;
        } else {
            high -= 1;
        }
    }
    (high, dormant)
}

fn draw_excluding(
    basket: &[u8],
    count: usize,
    level: f64,
    taken: &[(u8, SourceTag)],
    rng: &mut StdRng,
) -> Result<Vec<u8>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let free: Vec<u8> = basket
        .iter()
        .copied()
        .filter(|n| !taken.iter().any(|(t, _)| t == n))
        .collect();
    pick(&free, count, level, rng)
}

/// Tirage par catégories puis complément depuis le panier combiné.
pub fn compose(
    high_basket: &[u8],
    dormant_basket: &[u8],
    combined_basket: &[u8],
    weights: &CategoryWeights,
    total: usize,
    level: f64,
    rng: &mut StdRng,
) -> Result<Vec<(u8, SourceTag)>> {
    let (high_count, dormant_count) = allocate(weights, total);
    let mut selected: Vec<(u8, SourceTag)> = Vec::with_capacity(total);

    for n in draw_excluding(high_basket, high_count, level, &selected, rng)? {
        selected.push((n, SourceTag::High));
    }
    for n in draw_excluding(dormant_basket, dormant_count, level, &selected, rng)? {
        selected.push((n, SourceTag::Dormant));
    }

    let missing = total.saturating_sub(selected.len());
    if missing > 0 {
        log::debug!("Composition : {missing} numéro(s) complété(s) depuis le panier combiné");
        for n in draw_excluding(combined_basket, missing, level, &selected, rng)? {
            let tag = if dormant_basket.contains(&n) && !high_basket.contains(&n) {
                SourceTag::Dormant
            } else {
                SourceTag::High
            };
            selected.push((n, tag));
        }
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_allocate_floors_and_trims_dormant_first() {
        let w = CategoryWeights { high: 3.9, dormant: 1.2 };
        assert_eq!(allocate(&w, 5), (3, 1));
        let w = CategoryWeights { high: 4.0, dormant: 3.0 };
        assert_eq!(allocate(&w, 5), (4, 1));
        let w = CategoryWeights { high: 7.0, dormant: 2.0 };
        assert_eq!(allocate(&w, 5), (5, 0));
        let w = CategoryWeights { high: -1.0, dormant: 2.5 };
        assert_eq!(allocate(&w, 5), (0, 2));
    }

    #[test]
    fn test_compose_respects_categories() {
        let high = [1u8, 2, 3, 4, 5, 6];
        let dormant = [40u8, 41, 42];
        let combined = [1u8, 2, 3, 4, 5, 6, 40, 41, 42];
        let w = CategoryWeights { high: 3.0, dormant: 2.0 };
        let mut rng = StdRng::seed_from_u64(5);
        let out = compose(&high, &dormant, &combined, &w, 5, 10.0, &mut rng).unwrap();
        assert_eq!(
            out,
            vec![
                (1, SourceTag::High),
                (2, SourceTag::High),
                (3, SourceTag::High),
                (40, SourceTag::Dormant),
                (41, SourceTag::Dormant),
            ]
        );
    }

    #[test]
    fn test_compose_fills_shortfall_without_duplicates() {
        // Le panier dormeur recoupe les forts et ne suffit pas
        let high = [1u8, 2];
        let dormant = [2u8, 9];
        let combined = [1u8, 2, 9, 10, 11, 12];
        let w = CategoryWeights { high: 2.0, dormant: 3.0 };
        let mut rng = StdRng::seed_from_u64(1);
        let out = compose(&high, &dormant, &combined, &w, 5, 10.0, &mut rng).unwrap();
        let numbers: Vec<u8> = out.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 9, 10, 11]);
        assert_eq!(out[2].1, SourceTag::Dormant);
        assert_eq!(out[3].1, SourceTag::High);
    }

    #[test]
    fn test_compose_random_levels_unique() {
        let high: Vec<u8> = (1..=20).collect();
        let dormant: Vec<u8> = (15..=30).collect();
        let combined: Vec<u8> = (1..=30).collect();
        let w = CategoryWeights { high: 3.0, dormant: 2.0 };
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = compose(&high, &dormant, &combined, &w, 5, 4.0, &mut rng).unwrap();
            let mut numbers: Vec<u8> = out.iter().map(|(n, _)| *n).collect();
            numbers.sort();
            numbers.dedup();
            assert_eq!(numbers.len(), 5);
        }
    }
}
