//! # Calibration Engine
//!
//! Uncertainty propagation and constant tuning against field data.
//!
//! - [`distributions`] - Normal, LogNormal, Uniform, Gumbel
//! - [`monte_carlo`] - summaries, importance sampling, reliability index
//! - [`sensitivity`] - one-at-a-time swings and Sobol indices
//! - [`tuning`] - safe-direction search for tunable constants
//!
//! A [`CalibrationReport`] collects tuning suggestions. Publishing it creates
//! a new constants version in a [`ConstantsStore`]; earlier versions stay
//! readable and unchanged.
//!
//! ## Example
//!
//! ```rust
//! use signcalc_core::calibration::{CalibrationReport, UncertaintyBand};
//! use signcalc_core::standards::store::ConstantsStore;
//!
//! let store = ConstantsStore::default();
//! let report = CalibrationReport::new("2024.1", vec![], "no field data yet");
//! assert!(report.publish(&store).unwrap().is_none());
//!
//! let band = UncertaintyBand::at_confidence(100.0, 0.1, 0.90).unwrap();
//! assert!(band.low < 100.0 && band.high > 100.0);
//! ```

pub mod distributions;
pub mod monte_carlo;
pub mod sensitivity;
pub mod tuning;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::{ensure_finite, CalcError, CalcResult};
use crate::standards::constants::ConstantsTable;
use crate::standards::store::{ConstantUpdate, ConstantsStore};
use distributions::standard_normal_quantile;

pub use distributions::Distribution;
pub use monte_carlo::{monte_carlo, reliability, MonteCarloSettings, SampleSummary, UncertainInput};
pub use tuning::{tune, CalibrationModel, DepthCalibrationModel, Observation, TuningSettings, TuningSuggestion};

/// Result of one calibration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Constants version the suggestions were computed against
    pub constants_version: String,
    pub suggestions: Vec<TuningSuggestion>,
    pub note: String,
}

impl CalibrationReport {
    pub fn new(constants_version: &str, suggestions: Vec<TuningSuggestion>, note: &str) -> Self {
        CalibrationReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            constants_version: constants_version.to_string(),
            suggestions,
            note: note.to_string(),
        }
    }

    /// Updates for the suggestions that actually move a constant
    pub fn to_updates(&self) -> Vec<ConstantUpdate> {
        self.suggestions
            .iter()
            .filter(|s| s.changed())
            .map(|s| ConstantUpdate {
                key: s.key.clone(),
                before: s.before,
                after: s.after,
            })
            .collect()
    }

    /// Publish the changes as a new constants version.
    ///
    /// Returns `None` when nothing changed. The store re-checks the safe
    /// direction of every update.
    pub fn publish(&self, store: &ConstantsStore) -> CalcResult<Option<Arc<ConstantsTable>>> {
        let updates = self.to_updates();
        if updates.is_empty() {
            return Ok(None);
        }
        let current = store.current()?;
        if current.version != self.constants_version {
            return Err(CalcError::PolicyViolation {
                key: "constants_version".to_string(),
                reason: format!(
                    "report was computed against {} but the store is at {}",
                    self.constants_version, current.version
                ),
            });
        }
        let table = store.publish(&updates, Some(self.id), self.note.clone())?;
        info!(report = %self.id, version = %table.version, "calibration report published");
        Ok(Some(table))
    }
}

/// Symmetric band `nominal ± z·cov·|nominal|`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyBand {
    pub nominal: f64,
    pub low: f64,
    pub high: f64,
    pub cov: f64,
    pub z: f64,
}

impl UncertaintyBand {
    pub fn new(nominal: f64, cov: f64, z: f64) -> CalcResult<Self> {
        ensure_finite("nominal", nominal)?;
        ensure_finite("cov", cov)?;
        ensure_finite("z", z)?;
        if cov < 0.0 || z < 0.0 {
            return Err(CalcError::invalid_input(
                "cov",
                format!("cov={} z={}", cov, z),
                "Coefficient of variation and z must be non-negative",
            ));
        }
        let half = z * cov * nominal.abs();
        Ok(UncertaintyBand {
            nominal,
            low: nominal - half,
            high: nominal + half,
            cov,
            z,
        })
    }

    /// Two-sided band at a confidence level such as 0.90
    pub fn at_confidence(nominal: f64, cov: f64, level: f64) -> CalcResult<Self> {
        if !(level > 0.0 && level < 1.0) {
            return Err(CalcError::invalid_input(
                "level",
                level.to_string(),
                "Confidence level must be in (0, 1)",
            ));
        }
        Self::new(nominal, cov, standard_normal_quantile(0.5 + level / 2.0))
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.low..=self.high).contains(&value)
    }
}
