//! # Constant Tuning
//!
//! Fits one tunable constant to observed outcomes. The search only walks
//! the constant's safe half-line from its current value:
//!
//! ```text
//! value_k = current · (1 + sign · k · max_relative_change / steps),  k = 0..=steps
//! ```
//!
//! where `sign` comes from [`SafeDirection`]. The grid point with the lowest
//! RMSE wins (ties go to the smaller move). When moving in the safe
//! direction does not help, the suggestion is the current value.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};
use crate::foundation::depth::{solve_depth, DepthInput, DepthOutcome, DepthSettings};
use crate::standards::constants::{keys, ConstantsTable, SafeDirection};

/// A model whose prediction depends on one tunable constant
pub trait CalibrationModel: Sync {
    type Case: Sync;

    fn constant_key(&self) -> &str;

    /// Predicted value for a case, `None` when the case is outside the
    /// model's range and should not count toward the fit
    fn predict(&self, case: &Self::Case, constants: &ConstantsTable) -> CalcResult<Option<f64>>;
}

/// One field observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation<C> {
    pub label: String,
    pub case: C,
    pub observed: f64,
}

/// Goodness of fit over the usable cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    pub cases: usize,
    pub rmse: f64,
    /// Undefined when every observation is identical
    pub r_squared: Option<f64>,
    /// Mean of `predicted - observed`
    pub bias: f64,
}

impl FitMetrics {
    pub fn from_pairs(pairs: &[(f64, f64)]) -> CalcResult<Self> {
        if pairs.is_empty() {
            return Err(CalcError::invalid_input(
                "observations",
                "[]",
                "No observation falls inside the model's range",
            ));
        }
        let n = pairs.len() as f64;
        let mean_obs = pairs.iter().map(|(_, o)| o).sum::<f64>() / n;
        let ss_res: f64 = pairs.iter().map(|(p, o)| (p - o).powi(2)).sum();
        let ss_tot: f64 = pairs.iter().map(|(_, o)| (o - mean_obs).powi(2)).sum();
        Ok(FitMetrics {
            cases: pairs.len(),
            rmse: (ss_res / n).sqrt(),
            r_squared: (ss_tot > 0.0).then(|| 1.0 - ss_res / ss_tot),
            bias: pairs.iter().map(|(p, o)| p - o).sum::<f64>() / n,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningSettings {
    pub steps: u32,
    /// Largest move as a fraction of the current value
    pub max_relative_change: f64,
}

impl Default for TuningSettings {
    fn default() -> Self {
        TuningSettings {
            steps: 50,
            max_relative_change: 0.5,
        }
    }
}

/// Result of tuning one constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningSuggestion {
    pub key: String,
    pub before: f64,
    pub after: f64,
    pub direction: SafeDirection,
    pub before_fit: FitMetrics,
    pub after_fit: FitMetrics,
}

impl TuningSuggestion {
    pub fn changed(&self) -> bool {
        self.after != self.before
    }
}

fn fit<M: CalibrationModel>(
    model: &M,
    observations: &[Observation<M::Case>],
    constants: &ConstantsTable,
) -> CalcResult<FitMetrics> {
    let mut pairs = Vec::with_capacity(observations.len());
    for obs in observations {
        if let Some(predicted) = model.predict(&obs.case, constants)? {
            pairs.push((predicted, obs.observed));
        }
    }
    FitMetrics::from_pairs(&pairs)
}

/// Search the safe half-line for the best value of the model's constant.
pub fn tune<M: CalibrationModel>(
    model: &M,
    observations: &[Observation<M::Case>],
    constants: &ConstantsTable,
    settings: &TuningSettings,
) -> CalcResult<TuningSuggestion> {
    let key = model.constant_key();
    let entry = constants.entry(key)?;
    let direction = entry.safe_direction.ok_or_else(|| CalcError::PolicyViolation {
        key: key.to_string(),
        reason: "constant is not calibration-tunable".to_string(),
    })?;
    if settings.steps == 0 || !(settings.max_relative_change > 0.0 && settings.max_relative_change < 1.0) {
        return Err(CalcError::invalid_input(
            "tuning",
            format!("steps={} max_relative_change={}", settings.steps, settings.max_relative_change),
            "Need at least one step and a relative change in (0, 1)",
        ));
    }

    let before = entry.value;
    let step = settings.max_relative_change / settings.steps as f64;
    let grid: Vec<f64> = (0..=settings.steps)
        .map(|k| before * (1.0 + direction.sign() * k as f64 * step))
        .collect();

    let fits = grid
        .par_iter()
        .map(|&value| {
            let table = constants.with_override(key, value)?;
            fit(model, observations, &table)
        })
        .collect::<CalcResult<Vec<FitMetrics>>>()?;

    // Grid is ordered by distance from `before`; strict < keeps the smaller move
    let mut best = 0;
    for (i, f) in fits.iter().enumerate().skip(1) {
        if f.rmse < fits[best].rmse {
            best = i;
        }
    }
    let after = grid[best];
    if !direction.permits(before, after) {
        return Err(CalcError::PolicyViolation {
            key: key.to_string(),
            reason: format!("{} -> {} moves against {:?}", before, after, direction),
        });
    }

    Ok(TuningSuggestion {
        key: key.to_string(),
        before,
        after,
        direction,
        before_fit: fits[0].clone(),
        after_fit: fits[best].clone(),
    })
}

// ============================================================================
// Embedment depth model
// ============================================================================

/// Calibrates the lateral bearing ratio against observed embedment depths.
pub struct DepthCalibrationModel {
    pub settings: DepthSettings,
}

impl Default for DepthCalibrationModel {
    fn default() -> Self {
        DepthCalibrationModel {
            settings: DepthSettings::default(),
        }
    }
}

impl CalibrationModel for DepthCalibrationModel {
    type Case = DepthInput;

    fn constant_key(&self) -> &str {
        keys::LATERAL_BEARING_RATIO
    }

    fn predict(&self, case: &DepthInput, constants: &ConstantsTable) -> CalcResult<Option<f64>> {
        match solve_depth(case, constants, &self.settings)? {
            DepthOutcome::Solved(s) => Ok(Some(s.depth_ft)),
            DepthOutcome::ExceedsMaximum { .. } | DepthOutcome::NonConverged { .. } => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cases() -> Vec<DepthInput> {
        [(20.0, 2.5), (35.0, 3.0), (50.0, 3.0), (60.0, 3.5), (80.0, 4.0)]
            .iter()
            .map(|&(m, b)| DepthInput {
                moment_kipft: m,
                load_arm_ft: 12.0,
                diameter_ft: b,
                soil_bearing_psf: 2500.0,
                safety_factor: 1.5,
            })
            .collect()
    }

    /// Observations produced with the ratio set to `truth`
    fn observations(truth: f64) -> Vec<Observation<DepthInput>> {
        let model = DepthCalibrationModel::default();
        let table = ConstantsTable::builtin()
            .with_override(keys::LATERAL_BEARING_RATIO, truth)
            .unwrap();
        cases()
            .into_iter()
            .enumerate()
            .map(|(i, case)| {
                let observed = model.predict(&case, &table).unwrap().unwrap();
                Observation {
                    label: format!("site-{}", i),
                    case,
                    observed,
                }
            })
            .collect()
    }

    #[test]
    fn test_tunes_toward_weaker_soil() {
        let model = DepthCalibrationModel::default();
        let obs = observations(0.04);
        let s = tune(&model, &obs, &ConstantsTable::builtin(), &TuningSettings::default()).unwrap();
        assert!(s.changed());
        assert!(s.after < s.before);
        assert!((s.after - 0.04).abs() < 0.0011, "after = {}", s.after);
        assert!(s.after_fit.rmse < s.before_fit.rmse);
        assert!(s.before_fit.bias < 0.0);
    }

    #[test]
    fn test_never_moves_in_unsafe_direction() {
        // Stronger soil would call for a larger ratio, which is unsafe
        let model = DepthCalibrationModel::default();
        let obs = observations(0.06);
        let s = tune(&model, &obs, &ConstantsTable::builtin(), &TuningSettings::default()).unwrap();
        assert!(!s.changed());
        assert_eq!(s.after, 0.05);
        assert!(s.direction.permits(s.before, s.after));
    }

    #[test]
    fn test_fit_metrics() {
        let m = FitMetrics::from_pairs(&[(1.0, 1.0), (2.0, 3.0), (3.0, 3.0)]).unwrap();
        assert_eq!(m.cases, 3);
        assert!((m.rmse - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((m.bias + 1.0 / 3.0).abs() < 1e-12);
        assert!(m.r_squared.unwrap() < 1.0);
        assert!(FitMetrics::from_pairs(&[(1.0, 2.0)]).unwrap().r_squared.is_none());
        assert!(FitMetrics::from_pairs(&[]).is_err());
    }
}
