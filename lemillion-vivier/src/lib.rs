//! Moteur de viviers : statistiques par famille de signaux, calibration des
//! fenêtres, scoring multi-critères, échantillonnage à température,
//! remplacement par les dormeurs et garde d'unicité.

pub mod calibrator;
pub mod composition;
pub mod config;
pub mod dormant;
pub mod error;
pub mod generator;
pub mod guard;
pub mod providers;
pub mod sampler;
pub mod scoring;
pub mod stats;
pub mod tariff;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod window;

pub use error::{Result, VivierError};

use serde::{Deserialize, Serialize};

/// Famille de signaux : chacune possède sa propre fenêtre d'analyse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalFamily {
    High,
    Surrepresentation,
    Trend,
    Dormant,
}

impl SignalFamily {
    pub const ALL: [SignalFamily; 4] = [
        SignalFamily::High,
        SignalFamily::Surrepresentation,
        SignalFamily::Trend,
        SignalFamily::Dormant,
    ];
}

impl std::fmt::Display for SignalFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalFamily::High => write!(f, "Fréquence"),
            SignalFamily::Surrepresentation => write!(f, "Surreprésentation"),
            SignalFamily::Trend => write!(f, "Tendance"),
            SignalFamily::Dormant => write!(f, "Dormeurs"),
        }
    }
}
