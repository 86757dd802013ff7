use rand::distr::weighted::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use lemillion_db::models::Pool;

use crate::{Result, VivierError};

/// Température du tirage pondéré : plus le niveau est bas, plus la loi est plate.
pub fn temperature(level: f64) -> f64 {
    (10.0 - level) * 0.5 + 0.2
}

/// Tire `count` éléments d'un panier déjà trié selon le niveau de déterminisme.
///
/// - `level >= 9` : les `count` premiers, sans hasard.
/// - `level <= 0.5` : tirage uniforme.
/// - sinon : tirage sans remise, poids `exp(-r / T)` où `r` est la position dans le panier.
pub fn pick<T: Clone>(basket: &[T], count: usize, level: f64, rng: &mut StdRng) -> Result<Vec<T>> {
    if basket.len() <= count {
        return Ok(basket.to_vec());
    }

    if level >= 9.0 {
        return Ok(basket[..count].to_vec());
    }

    if level <= 0.5 {
        let mut shuffled = basket.to_vec();
        shuffled.shuffle(rng);
        shuffled.truncate(count);
        return Ok(shuffled);
    }

    let t = temperature(level);
    let mut available: Vec<usize> = (0..basket.len()).collect();
    let mut selected = Vec::with_capacity(count);

    for _ in 0..count {
        // Décalage par la meilleure position restante : évite le sous-dépassement
        let offset = available.first().copied().unwrap_or(0) as f64;
        let weights: Vec<f64> = available.iter().map(|&r| (-(r as f64 - offset) / t).exp()).collect();
        let dist = WeightedIndex::new(&weights).map_err(|e| VivierError::Sampling(e.to_string()))?;
        let idx = dist.sample(rng);
        let position = available.remove(idx);
        selected.push(basket[position].clone());
    }

    Ok(selected)
}

/// Taille forcée du vivier, prioritaire sur le niveau.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VivierSize {
    pub balls: usize,
    pub stars: usize,
}

impl VivierSize {
    pub fn get(&self, pool: Pool) -> usize {
        match pool {
            Pool::Balls => self.balls,
            Pool::Stars => self.stars,
        }
    }
}

/// Taille du vivier : de `target` (niveau 0) à tout le pool (niveau 10).
pub fn vivier_size(pool: Pool, target: usize, level: u8) -> usize {
    let size = pool.size();
    let target = target.min(size);
    let extra = ((size - target) as f64 * level.min(10) as f64 / 10.0).round() as usize;
    (target + extra).clamp(target, size)
}

/// Taille effective : surcharge bornée à `[target, pool.size()]`, sinon le niveau.
pub fn effective_vivier(pool: Pool, target: usize, level: u8, forced: Option<&VivierSize>) -> usize {
    match forced {
        Some(v) => v.get(pool).clamp(target.min(pool.size()), pool.size()),
        None => vivier_size(pool, target, level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn basket() -> Vec<u8> {
        (1..=20).collect()
    }

    #[test]
    fn test_temperature() {
        assert!((temperature(10.0) - 0.2).abs() < 1e-12);
        assert!((temperature(0.0) - 5.2).abs() < 1e-12);
    }

    #[test]
    fn test_pole_position() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick(&basket(), 5, 10.0, &mut rng).unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(pick(&basket(), 5, 9.0, &mut rng).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_small_basket_returned_whole() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick(&[4u8, 2, 9], 5, 3.0, &mut rng).unwrap(), vec![4, 2, 9]);
        assert_eq!(pick(&[4u8, 2], 2, 0.0, &mut rng).unwrap(), vec![4, 2]);
    }

    #[test]
    fn test_no_duplicates_and_reproducible() {
        for level in [0.0, 3.0, 6.5, 8.9] {
            let a = pick(&basket(), 8, level, &mut StdRng::seed_from_u64(42)).unwrap();
            let b = pick(&basket(), 8, level, &mut StdRng::seed_from_u64(42)).unwrap();
            assert_eq!(a, b);
            let mut sorted = a.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted.len(), 8);
        }
    }

    #[test]
    fn test_high_level_favors_top() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut top_hits = 0;
        for _ in 0..500 {
            let picked = pick(&basket(), 1, 8.5, &mut rng).unwrap();
            if picked[0] <= 3 {
                top_hits += 1;
            }
        }
        // T = 0.95 : P(r < 3) ≈ 0.96
        assert!(top_hits > 440, "top_hits = {top_hits}");
    }

    #[test]
    fn test_uniform_level_spreads() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut counts = [0u32; 20];
        for _ in 0..4000 {
            for n in pick(&basket(), 1, 0.0, &mut rng).unwrap() {
                counts[(n - 1) as usize] += 1;
            }
        }
        // Espérance 200 par numéro
        assert!(counts.iter().all(|&c| (130..=270).contains(&c)), "{counts:?}");
    }

    #[test]
    fn test_vivier_size() {
        assert_eq!(vivier_size(Pool::Balls, 5, 0), 5);
        assert_eq!(vivier_size(Pool::Balls, 5, 10), 50);
        assert_eq!(vivier_size(Pool::Balls, 5, 5), 28); // 5 + round(22.5)
        assert_eq!(vivier_size(Pool::Stars, 2, 5), 7);
        assert_eq!(vivier_size(Pool::Stars, 12, 3), 12);
    }

    #[test]
    fn test_forced_vivier_clamped() {
        let forced = VivierSize { balls: 3, stars: 40 };
        assert_eq!(effective_vivier(Pool::Balls, 5, 10, Some(&forced)), 5);
        assert_eq!(effective_vivier(Pool::Stars, 2, 0, Some(&forced)), 12);
        assert_eq!(effective_vivier(Pool::Balls, 5, 0, None), 5);
    }
}
