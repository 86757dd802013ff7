//! Collaborateurs externes du moteur : historique, combinaisons déjà émises, tarif.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use lemillion_db::models::{is_descending, validate_draw, Draw};

use crate::{Result, VivierError};

pub trait HistoryProvider {
    /// Tirages du plus récent au plus ancien, sans date en double.
    fn history(&self) -> Result<Vec<Draw>>;
}

impl HistoryProvider for Vec<Draw> {
    fn history(&self) -> Result<Vec<Draw>> {
        Ok(self.clone())
    }
}

impl HistoryProvider for [Draw] {
    fn history(&self) -> Result<Vec<Draw>> {
        Ok(self.to_vec())
    }
}

/// Refuse un historique non strictement décroissant ou contenant un tirage invalide.
pub fn validate_history(history: &[Draw]) -> Result<()> {
    if !is_descending(history) {
        return Err(VivierError::InvalidRequest(
            "historique non trié par date décroissante ou date en double".into(),
        ));
    }
    for draw in history {
        validate_draw(&draw.balls, &draw.stars).map_err(|e| {
            VivierError::InvalidRequest(format!("tirage du {} invalide : {e}", draw.date))
        })?;
    }
    Ok(())
}

/// Historique du fournisseur, validé.
pub fn checked_history<P: HistoryProvider + ?Sized>(provider: &P) -> Result<Vec<Draw>> {
    let history = provider.history()?;
    validate_history(&history)?;
    Ok(history)
}

pub trait IssuedCombinationsProvider {
    /// Clés canoniques déjà émises pour une date de tirage.
    fn issued_keys(&self, target_date: NaiveDate) -> Result<HashSet<String>>;
}

impl IssuedCombinationsProvider for HashMap<NaiveDate, HashSet<String>> {
    fn issued_keys(&self, target_date: NaiveDate) -> Result<HashSet<String>> {
        Ok(self.get(&target_date).cloned().unwrap_or_default())
    }
}

pub trait TariffResolver {
    /// Prix d'une grille (numéros, étoiles), `None` si l'association n'existe pas.
    fn resolve(&self, numbers: usize, stars: usize) -> Option<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::make_history;

    struct FailingSource;

    impl IssuedCombinationsProvider for FailingSource {
        fn issued_keys(&self, _: NaiveDate) -> Result<HashSet<String>> {
            Err(VivierError::Source("service indisponible".into()))
        }
    }

    #[test]
    fn test_checked_history() {
        let history = make_history(20, 1);
        assert_eq!(checked_history(&history).unwrap().len(), 20);

        let mut reversed = history.clone();
        reversed.reverse();
        assert!(matches!(checked_history(&reversed), Err(VivierError::InvalidRequest(_))));

        let slice: &[Draw] = &history[..5];
        assert_eq!(checked_history(slice).unwrap().len(), 5);
    }

    #[test]
    fn test_checked_history_rejects_invalid_draw() {
        let mut zero_ball = make_history(20, 2);
        zero_ball[5].balls[0] = 0;
        assert!(matches!(checked_history(&zero_ball), Err(VivierError::InvalidRequest(_))));

        let mut bad_star = make_history(20, 2);
        bad_star[0].stars[1] = 13;
        assert!(matches!(validate_history(&bad_star), Err(VivierError::InvalidRequest(_))));

        let mut twin = make_history(20, 2);
        twin[3].balls[1] = twin[3].balls[0];
        assert!(matches!(validate_history(&twin), Err(VivierError::InvalidRequest(_))));
    }

    #[test]
    fn test_issued_map_provider() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let mut map = HashMap::new();
        map.insert(date, HashSet::from(["1-2-3-4-5|1-2".to_string()]));
        assert_eq!(map.issued_keys(date).unwrap().len(), 1);
        assert!(map.issued_keys(date.succ_opt().unwrap()).unwrap().is_empty());
        assert!(FailingSource.issued_keys(date).is_err());
    }
}
