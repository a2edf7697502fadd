//! Sensitivity of a model output to its uncertain inputs.
//!
//! - One-at-a-time swings: every input at its median, one moved to its 5th
//!   and 95th percentiles.
//! - Sobol first-order indices with the Saltelli (2010) estimator,
//!   `S_i = mean(f(B)·(f(A_B^i) - f(A))) / Var(Y)`, at a cost of `N·(d + 2)`
//!   model runs. `f(B)` is centered on the sample mean first, which leaves
//!   the expectation unchanged and keeps the estimator usable for outputs
//!   far from zero.
//!
//! Both results come back ranked, most influential first.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use super::monte_carlo::{evaluate_model, map_point, validate_inputs, UncertainInput};
use crate::errors::{CalcError, CalcResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingEntry {
    pub name: String,
    /// Output with this input at its 5th percentile
    pub low: f64,
    /// Output with this input at its 95th percentile
    pub high: f64,
    pub swing: f64,
}

/// One-at-a-time swing analysis around the medians.
pub fn one_at_a_time<F>(inputs: &[UncertainInput], model: F) -> CalcResult<Vec<SwingEntry>>
where
    F: Fn(&[f64]) -> CalcResult<f64>,
{
    validate_inputs(inputs)?;
    let medians: Vec<f64> = vec![0.5; inputs.len()];

    let mut entries = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let mut u = medians.clone();
        u[i] = 0.05;
        let low = evaluate_model(&model, &map_point(inputs, &u))?;
        u[i] = 0.95;
        let high = evaluate_model(&model, &map_point(inputs, &u))?;
        entries.push(SwingEntry {
            name: input.name.clone(),
            low,
            high,
            swing: high - low,
        });
    }
    entries.sort_by(|a, b| b.swing.abs().total_cmp(&a.swing.abs()).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SobolSettings {
    /// Base sample size N
    pub samples: usize,
    pub seed: u64,
}

impl Default for SobolSettings {
    fn default() -> Self {
        SobolSettings {
            samples: 4096,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SobolIndex {
    pub name: String,
    pub first_order: f64,
}

/// Sobol first-order indices.
///
/// A model whose output does not vary has no meaningful indices and is
/// reported as a numeric failure.
pub fn sobol_first_order<F>(
    inputs: &[UncertainInput],
    model: F,
    settings: &SobolSettings,
) -> CalcResult<Vec<SobolIndex>>
where
    F: Fn(&[f64]) -> CalcResult<f64>,
{
    validate_inputs(inputs)?;
    if settings.samples < 2 {
        return Err(CalcError::invalid_input(
            "samples",
            settings.samples.to_string(),
            "At least two samples are required",
        ));
    }

    let d = inputs.len();
    let n = settings.samples;
    let mut rng = ChaCha20Rng::seed_from_u64(settings.seed);
    let draw = |rng: &mut ChaCha20Rng| -> Vec<Vec<f64>> {
        (0..n).map(|_| (0..d).map(|_| rng.gen::<f64>()).collect()).collect()
    };
    let a = draw(&mut rng);
    let b = draw(&mut rng);

    let f_a = a
        .iter()
        .map(|u| evaluate_model(&model, &map_point(inputs, u)))
        .collect::<CalcResult<Vec<f64>>>()?;
    let f_b = b
        .iter()
        .map(|u| evaluate_model(&model, &map_point(inputs, u)))
        .collect::<CalcResult<Vec<f64>>>()?;

    let all: Vec<f64> = f_a.iter().chain(&f_b).copied().collect();
    let mean = all.iter().sum::<f64>() / all.len() as f64;
    let variance = all.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / (all.len() - 1) as f64;
    if !(variance > 0.0) {
        return Err(CalcError::numeric("output_variance", variance));
    }

    let mut indices = Vec::with_capacity(d);
    for (i, input) in inputs.iter().enumerate() {
        let mut acc = 0.0;
        for j in 0..n {
            let mut mixed = a[j].clone();
            mixed[i] = b[j][i];
            let f_ab = evaluate_model(&model, &map_point(inputs, &mixed))?;
            acc += (f_b[j] - mean) * (f_ab - f_a[j]);
        }
        indices.push(SobolIndex {
            name: input.name.clone(),
            first_order: acc / n as f64 / variance,
        });
    }
    indices.sort_by(|x, y| y.first_order.total_cmp(&x.first_order).then_with(|| x.name.cmp(&y.name)));
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::distributions::Distribution;

    fn inputs() -> Vec<UncertainInput> {
        vec![
            UncertainInput::new("minor", Distribution::Uniform { low: 0.0, high: 1.0 }),
            UncertainInput::new("major", Distribution::Uniform { low: 0.0, high: 1.0 }),
        ]
    }

    fn model(x: &[f64]) -> CalcResult<f64> {
        Ok(x[0] + 4.0 * x[1])
    }

    #[test]
    fn test_swing_ranking() {
        let swings = one_at_a_time(&inputs(), model).unwrap();
        assert_eq!(swings[0].name, "major");
        assert!((swings[0].swing - 3.6).abs() < 1e-9);
        assert!((swings[1].swing - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_sobol_additive_model() {
        let settings = SobolSettings {
            samples: 16_384,
            ..SobolSettings::default()
        };
        let s = sobol_first_order(&inputs(), model, &settings).unwrap();
        assert_eq!(s[0].name, "major");
        assert!((s[0].first_order - 16.0 / 17.0).abs() < 0.05, "{}", s[0].first_order);
        assert!((s[1].first_order - 1.0 / 17.0).abs() < 0.05, "{}", s[1].first_order);
    }

    #[test]
    fn test_constant_model_is_numeric_failure() {
        let err = sobol_first_order(&inputs(), |_| Ok(1.0), &SobolSettings::default()).unwrap_err();
        assert!(matches!(err, CalcError::NumericFailure { .. }));
    }
}
