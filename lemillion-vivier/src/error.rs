use chrono::NaiveDate;
use thiserror::Error;

use crate::SignalFamily;

/// Erreurs du moteur. Toutes sont récupérables par l'appelant
/// (nouvelle requête avec des paramètres ajustés).
#[derive(Debug, Error)]
pub enum VivierError {
    /// Paire (numéros, étoiles) hors grille tarifaire, ordre de priorité invalide, curseur hors bornes.
    #[error("requête invalide : {0}")]
    InvalidRequest(String),

    /// La fenêtre demandée ne contient aucun tirage exploitable.
    #[error("statistiques indisponibles ({family}) : {reason}")]
    StatisticsUnavailable { family: SignalFamily, reason: String },

    /// Aucune fenêtre stable trouvée dans les bornes de recherche.
    #[error("aucune fenêtre stable trouvée pour la famille {0}")]
    CalibrationUnresolved(SignalFamily),

    /// La garde d'unicité a épuisé ses tentatives.
    #[error("génération épuisée pour le {target_date} après {attempts} tentatives (élargir le vivier ou baisser le déterminisme)")]
    GenerationExhausted { target_date: NaiveDate, attempts: usize },

    #[error("échantillonnage impossible : {0}")]
    Sampling(String),

    /// Échec d'un fournisseur externe (historique, combinaisons émises).
    #[error("source de données indisponible : {0}")]
    Source(String),
}

pub type Result<T> = std::result::Result<T, VivierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = VivierError::CalibrationUnresolved(SignalFamily::Trend);
        assert_eq!(err.to_string(), "aucune fenêtre stable trouvée pour la famille Tendance");

        let err = VivierError::StatisticsUnavailable {
            family: SignalFamily::High,
            reason: "historique vide".into(),
        };
        assert_eq!(err.to_string(), "statistiques indisponibles (Fréquence) : historique vide");
    }

    #[test]
    fn test_exhausted_is_distinct() {
        let err = VivierError::GenerationExhausted {
            target_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            attempts: 180,
        };
        assert!(matches!(err, VivierError::GenerationExhausted { attempts: 180, .. }));
        assert!(err.to_string().contains("2026-10-20"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VivierError>();
    }
}
