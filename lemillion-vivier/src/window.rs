use chrono::{Duration, Months, NaiveDate};
use log::warn;
use serde::{Deserialize, Serialize};

use lemillion_db::models::Draw;

use crate::calibrator::CalibrationReport;
use crate::{Result, SignalFamily, VivierError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowUnit {
    Draws,
    Weeks,
    Months,
    Years,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WindowSpec {
    All,
    LastDraws { n: usize },
    LastYear,
    Custom { value: usize, unit: WindowUnit },
}

impl WindowSpec {
    /// Préfixe de l'historique couvert par la fenêtre (index 0 = plus récent).
    pub fn resolve<'a>(&self, history: &'a [Draw], family: SignalFamily) -> Result<&'a [Draw]> {
        let unavailable = |reason: String| VivierError::StatisticsUnavailable { family, reason };

        let Some(latest) = history.first() else {
            return Err(unavailable("historique vide".into()));
        };

        let len = match *self {
            WindowSpec::All => history.len(),
            WindowSpec::LastDraws { n } => {
                if n == 0 {
                    return Err(unavailable("fenêtre de 0 tirage".into()));
                }
                n.min(history.len())
            }
            WindowSpec::LastYear => since(history, one_period(latest.date, 1, WindowUnit::Years)),
            WindowSpec::Custom { value, unit: WindowUnit::Draws } => {
                if value > history.len() {
                    return Err(unavailable(format!(
                        "fenêtre de {} tirages demandée, {} disponibles",
                        value,
                        history.len()
                    )));
                }
                value
            }
            WindowSpec::Custom { value, unit } => since(history, one_period(latest.date, value, unit)),
        };

        if len == 0 {
            return Err(unavailable(format!("la fenêtre {:?} ne contient aucun tirage", self)));
        }
        Ok(&history[..len])
    }
}

/// Date limite (exclue) d'une fenêtre temporelle de `value` unités.
fn one_period(latest: NaiveDate, value: usize, unit: WindowUnit) -> Option<NaiveDate> {
    let value = u32::try_from(value).ok()?;
    match unit {
        WindowUnit::Draws => None,
        WindowUnit::Weeks => latest.checked_sub_signed(Duration::weeks(value as i64)),
        WindowUnit::Months => latest.checked_sub_months(Months::new(value)),
        WindowUnit::Years => latest.checked_sub_months(Months::new(value.saturating_mul(12))),
    }
}

fn since(history: &[Draw], cutoff: Option<NaiveDate>) -> usize {
    match cutoff {
        Some(cutoff) => history.iter().take_while(|d| d.date > cutoff).count(),
        // Période plus longue que le calendrier : tout l'historique
        None => history.len(),
    }
}

/// Fenêtre d'une famille ; `recent` est la sous-fenêtre R de la tendance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyWindow {
    pub spec: WindowSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent: Option<usize>,
}

impl FamilyWindow {
    pub fn last(n: usize) -> Self {
        Self { spec: WindowSpec::LastDraws { n }, recent: None }
    }

    pub fn with_recent(mut self, recent: usize) -> Self {
        self.recent = Some(recent);
        self
    }
}

/// Configuration famille → fenêtre. Les fenêtres sont indépendantes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub high: FamilyWindow,
    pub surrepresentation: FamilyWindow,
    pub trend: FamilyWindow,
    pub dormant: FamilyWindow,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            high: FamilyWindow::last(200),
            surrepresentation: FamilyWindow::last(300),
            trend: FamilyWindow::last(100).with_recent(20),
            dormant: FamilyWindow::last(150),
        }
    }
}

/// Fenêtre résolue d'une famille.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedWindow<'a> {
    pub family: SignalFamily,
    pub draws: &'a [Draw],
    pub recent: Option<usize>,
}

impl WindowConfig {
    pub fn get(&self, family: SignalFamily) -> &FamilyWindow {
        match family {
            SignalFamily::High => &self.high,
            SignalFamily::Surrepresentation => &self.surrepresentation,
            SignalFamily::Trend => &self.trend,
            SignalFamily::Dormant => &self.dormant,
        }
    }

    fn get_mut(&mut self, family: SignalFamily) -> &mut FamilyWindow {
        match family {
            SignalFamily::High => &mut self.high,
            SignalFamily::Surrepresentation => &mut self.surrepresentation,
            SignalFamily::Trend => &mut self.trend,
            SignalFamily::Dormant => &mut self.dormant,
        }
    }

    pub fn resolve<'a>(&self, history: &'a [Draw], family: SignalFamily) -> Result<ResolvedWindow<'a>> {
        let window = self.get(family);
        let draws = window.spec.resolve(history, family)?;

        let recent = match (family, window.recent) {
            (SignalFamily::Trend, None | Some(0)) => {
                return Err(VivierError::InvalidRequest(
                    "la famille Tendance exige une période récente R > 0".into(),
                ));
            }
            (SignalFamily::Trend, Some(r)) => Some(r.min(draws.len())),
            (_, recent) => recent.map(|r| r.min(draws.len())),
        };

        Ok(ResolvedWindow { family, draws, recent })
    }

    /// Remplace chaque fenêtre par sa valeur dynamique calibrée ; les familles
    /// non résolues gardent leur valeur statique.
    pub fn with_calibration(&self, report: &CalibrationReport) -> Self {
        let mut config = self.clone();
        for family in SignalFamily::ALL {
            match report.dynamic(family) {
                Some(point) => {
                    let target = config.get_mut(family);
                    target.spec = WindowSpec::LastDraws { n: point.window };
                    if let Some(r) = point.recent {
                        target.recent = Some(r);
                    }
                }
                None => warn!(
                    "Calibration non résolue pour {family} : fenêtre statique {:?} conservée",
                    config.get(family).spec
                ),
            }
        }
        config
    }
}
