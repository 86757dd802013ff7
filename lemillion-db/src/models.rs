use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Un tirage enregistré. Immuable une fois en base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub draw_id: String,
    pub day: String,
    pub date: NaiveDate,
    pub balls: [u8; 5],
    pub stars: [u8; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pool {
    Balls,
    Stars,
}

impl Pool {
    pub const ALL: [Pool; 2] = [Pool::Balls, Pool::Stars];

    pub fn size(&self) -> usize {
        match self {
            Pool::Balls => 50,
            Pool::Stars => 12,
        }
    }

    pub fn pick_count(&self) -> usize {
        match self {
            Pool::Balls => 5,
            Pool::Stars => 2,
        }
    }

    /// Probabilité de sortie d'un numéro donné sur un tirage (p0 du z-score).
    pub fn base_probability(&self) -> f64 {
        self.pick_count() as f64 / self.size() as f64
    }

    pub fn label(&self) -> &'static str {
        match self {
            Pool::Balls => "Boules",
            Pool::Stars => "Étoiles",
        }
    }

    pub fn numbers_from<'a>(&self, draw: &'a Draw) -> &'a [u8] {
        match self {
            Pool::Balls => &draw.balls,
            Pool::Stars => &draw.stars,
        }
    }
}

/// Combinaison déjà émise pour une date de tirage cible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCombination {
    pub target_date: NaiveDate,
    pub balls: Vec<u8>,
    pub stars: Vec<u8>,
    pub key: String,
}

pub fn validate_draw(balls: &[u8; 5], stars: &[u8; 2]) -> Result<()> {
    for &b in balls {
        if !(1..=50).contains(&b) {
            bail!("Boule {} hors limites (1-50)", b);
        }
    }
    for &s in stars {
        if !(1..=12).contains(&s) {
            bail!("Étoile {} hors limites (1-12)", s);
        }
    }
    for i in 0..balls.len() {
        for j in (i + 1)..balls.len() {
            if balls[i] == balls[j] {
                bail!("Boule en double : {}", balls[i]);
            }
        }
    }
    if stars[0] == stars[1] {
        bail!("Étoile en double : {}", stars[0]);
    }
    Ok(())
}

/// Clé canonique d'une combinaison : numéros triés, `|`, étoiles triées.
/// Ex. `3-12-18-33-47|2-9`.
pub fn canonical_key(balls: &[u8], stars: &[u8]) -> String {
    let join = |values: &[u8]| {
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        sorted
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("-")
    };
    format!("{}|{}", join(balls), join(stars))
}

/// Décode une clé canonique en (boules, étoiles).
pub fn parse_canonical_key(key: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let Some((balls, stars)) = key.split_once('|') else {
        bail!("Clé de combinaison invalide : '{}'", key);
    };
    let parse = |part: &str| -> Result<Vec<u8>> {
        if part.is_empty() {
            return Ok(Vec::new());
        }
        part.split('-')
            .map(|s| {
                s.parse::<u8>()
                    .map_err(|_| anyhow::anyhow!("Numéro invalide '{}' dans la clé '{}'", s, key))
            })
            .collect()
    };
    Ok((parse(balls)?, parse(stars)?))
}

/// Vrai si l'historique est trié du plus récent au plus ancien, sans date en double.
pub fn is_descending(draws: &[Draw]) -> bool {
    draws.windows(2).all(|w| w[0].date > w[1].date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_on(date: &str) -> Draw {
        Draw {
            draw_id: "001".to_string(),
            day: "MARDI".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            balls: [1, 2, 3, 4, 5],
            stars: [6, 7],
        }
    }

    #[test]
    fn test_validate_draw_ok() {
        assert!(validate_draw(&[1, 2, 3, 4, 5], &[1, 2]).is_ok());
        assert!(validate_draw(&[50, 49, 48, 47, 46], &[11, 12]).is_ok());
    }

    #[test]
    fn test_validate_draw_out_of_range() {
        assert!(validate_draw(&[0, 2, 3, 4, 5], &[1, 2]).is_err());
        assert!(validate_draw(&[1, 2, 3, 4, 51], &[1, 2]).is_err());
        assert!(validate_draw(&[1, 2, 3, 4, 5], &[1, 13]).is_err());
    }

    #[test]
    fn test_validate_draw_duplicates() {
        assert!(validate_draw(&[1, 1, 3, 4, 5], &[1, 2]).is_err());
        assert!(validate_draw(&[1, 2, 3, 4, 5], &[3, 3]).is_err());
    }

    #[test]
    fn test_pool_base_probability() {
        assert!((Pool::Balls.base_probability() - 0.1).abs() < 1e-12);
        assert!((Pool::Stars.base_probability() - 2.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_pool_numbers_from() {
        let draw = draw_on("2024-01-02");
        assert_eq!(Pool::Balls.numbers_from(&draw), &[1, 2, 3, 4, 5]);
        assert_eq!(Pool::Stars.numbers_from(&draw), &[6, 7]);
    }

    #[test]
    fn test_canonical_key_ignores_order() {
        assert_eq!(canonical_key(&[47, 3, 33, 12, 18], &[9, 2]), "3-12-18-33-47|2-9");
        assert_eq!(
            canonical_key(&[3, 12, 18, 33, 47], &[2, 9]),
            canonical_key(&[18, 47, 12, 3, 33], &[9, 2])
        );
    }

    #[test]
    fn test_parse_canonical_key() {
        let (balls, stars) = parse_canonical_key("3-12-18-33-47|2-9").unwrap();
        assert_eq!(balls, vec![3, 12, 18, 33, 47]);
        assert_eq!(stars, vec![2, 9]);
        assert!(parse_canonical_key("3-12-18").is_err());
        assert!(parse_canonical_key("3-x|1-2").is_err());
    }

    #[test]
    fn test_is_descending() {
        let draws = vec![draw_on("2024-01-05"), draw_on("2024-01-02")];
        assert!(is_descending(&draws));
        let draws = vec![draw_on("2024-01-02"), draw_on("2024-01-05")];
        assert!(!is_descending(&draws));
        let draws = vec![draw_on("2024-01-02"), draw_on("2024-01-02")];
        assert!(!is_descending(&draws));
    }
}
