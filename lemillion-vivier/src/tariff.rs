use std::collections::BTreeMap;

use crate::providers::TariffResolver;

/// Prix d'une grille simple (5 numéros + 2 étoiles), en euros.
pub const UNIT_PRICE: f64 = 2.50;

pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1u64, |acc, i| acc * (n - i) as u64 / (i + 1) as u64)
}

/// Grilles multiples autorisées et leur prix.
#[derive(Debug, Clone, PartialEq)]
pub struct TariffTable {
    entries: BTreeMap<(usize, usize), f64>,
}

impl TariffTable {
    /// De 5 à 10 numéros et de 2 à 12 étoiles.
    pub fn euromillions() -> Self {
        let mut entries = BTreeMap::new();
        for numbers in 5..=10 {
            for stars in 2..=12 {
                let grids = binomial(numbers, 5) * binomial(stars, 2);
                entries.insert((numbers, stars), UNIT_PRICE * grids as f64);
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.entries.iter().map(|(&(n, s), &price)| (n, s, price))
    }
}

impl Default for TariffTable {
    fn default() -> Self {
        Self::euromillions()
    }
}

impl TariffResolver for TariffTable {
    fn resolve(&self, numbers: usize, stars: usize) -> Option<f64> {
        self.entries.get(&(numbers, stars)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(5, 5), 1);
        assert_eq!(binomial(6, 5), 6);
        assert_eq!(binomial(10, 5), 252);
        assert_eq!(binomial(12, 2), 66);
        assert_eq!(binomial(2, 3), 0);
    }

    #[test]
    fn test_euromillions_table() {
        let table = TariffTable::euromillions();
        assert_eq!(table.resolve(5, 2), Some(2.50));
        assert_eq!(table.resolve(6, 2), Some(15.0));
        assert_eq!(table.resolve(5, 3), Some(7.50));
        assert_eq!(table.resolve(4, 2), None);
        assert_eq!(table.resolve(5, 1), None);
        assert_eq!(table.resolve(11, 2), None);
        assert_eq!(table.entries().count(), 6 * 11);
    }
}
