//! # Monte Carlo Propagation
//!
//! - [`monte_carlo`] - output statistics with optional antithetic pairs
//! - [`exceedance_probability`] - `P(Y > threshold)` with defensive-mixture
//!   importance sampling on one input's upper tail
//! - [`reliability`] - failure probability and reliability index of a
//!   resistance/load pair
//!
//! All sampling happens in the unit hypercube and is mapped through each
//! input's quantile function, so one seeded `ChaCha20Rng` stream drives
//! every estimator.
//!
//! ## Importance sampling
//!
//! For the chosen input the proposal density in `u`-space is the mixture
//!
//! ```text
//! q(u) = (1 - α) + α · 1{u ≥ u_t} / (1 - u_t)
//! ```
//!
//! and each sample carries the weight `1/q(u)`. The uniform component keeps
//! every weight bounded by `1/(1 - α)`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use super::distributions::{standard_normal_quantile, Distribution};
use crate::errors::{CalcError, CalcResult};

/// A named uncertain model input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertainInput {
    pub name: String,
    pub distribution: Distribution,
}

impl UncertainInput {
    pub fn new(name: &str, distribution: Distribution) -> Self {
        UncertainInput {
            name: name.to_string(),
            distribution,
        }
    }
}

pub(crate) fn validate_inputs(inputs: &[UncertainInput]) -> CalcResult<()> {
    if inputs.is_empty() {
        return Err(CalcError::missing_field("inputs"));
    }
    for input in inputs {
        input.distribution.validate().map_err(|e| match e {
            CalcError::InvalidInput { field, value, reason } => CalcError::InvalidInput {
                field: format!("{}.{}", input.name, field),
                value,
                reason,
            },
            other => other,
        })?;
    }
    Ok(())
}

pub(crate) fn evaluate_model<F>(model: &F, x: &[f64]) -> CalcResult<f64>
where
    F: Fn(&[f64]) -> CalcResult<f64>,
{
    let y = model(x)?;
    if !y.is_finite() {
        return Err(CalcError::numeric("model_output", y));
    }
    Ok(y)
}

pub(crate) fn map_point(inputs: &[UncertainInput], u: &[f64]) -> Vec<f64> {
    inputs
        .iter()
        .zip(u)
        .map(|(input, &ui)| input.distribution.quantile(ui))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloSettings {
    /// Model evaluations (rounded up to an even count with antithetic pairs)
    pub samples: usize,
    pub antithetic: bool,
    pub seed: u64,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        MonteCarloSettings {
            samples: 10_000,
            antithetic: true,
            seed: 42,
        }
    }
}

/// Output statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub samples: usize,
    pub mean: f64,
    pub std_dev: f64,
    /// Standard error of the mean (from pair means when antithetic)
    pub standard_error: f64,
    pub p05: f64,
    pub p50: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

/// Linear-interpolated percentile of sorted data, `q` in [0, 1]
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = if values.len() > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    (mean, var)
}

/// Propagate input uncertainty through `model`.
pub fn monte_carlo<F>(
    inputs: &[UncertainInput],
    model: F,
    settings: &MonteCarloSettings,
) -> CalcResult<SampleSummary>
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

    let mut rng = ChaCha20Rng::seed_from_u64(settings.seed);
    let dim = inputs.len();
    let mut values = Vec::with_capacity(settings.samples + 1);
    let mut pair_means = Vec::new();

    if settings.antithetic {
        let pairs = settings.samples.div_ceil(2);
        pair_means.reserve(pairs);
        for _ in 0..pairs {
            let u: Vec<f64> = (0..dim).map(|_| rng.gen::<f64>()).collect();
            let mirror: Vec<f64> = u.iter().map(|ui| 1.0 - ui).collect();
            let a = evaluate_model(&model, &map_point(inputs, &u))?;
            let b = evaluate_model(&model, &map_point(inputs, &mirror))?;
            values.push(a);
            values.push(b);
            pair_means.push((a + b) / 2.0);
        }
    } else {
        for _ in 0..settings.samples {
            let u: Vec<f64> = (0..dim).map(|_| rng.gen::<f64>()).collect();
            values.push(evaluate_model(&model, &map_point(inputs, &u))?);
        }
    }

    let (mean, var) = mean_and_variance(&values);
    let standard_error = if settings.antithetic {
        let (_, pair_var) = mean_and_variance(&pair_means);
        (pair_var / pair_means.len() as f64).sqrt()
    } else {
        (var / values.len() as f64).sqrt()
    };

    let mut sorted = values;
    sorted.sort_by(f64::total_cmp);
    Ok(SampleSummary {
        samples: sorted.len(),
        mean,
        std_dev: var.sqrt(),
        standard_error,
        p05: percentile(&sorted, 0.05),
        p50: percentile(&sorted, 0.50),
        p95: percentile(&sorted, 0.95),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
    })
}

// ============================================================================
// Importance Sampling
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceSettings {
    pub samples: usize,
    /// Input whose upper tail is oversampled; plain Monte Carlo when `None`
    pub tail_input: Option<usize>,
    /// Tail starts at this quantile of the chosen input
    pub tail_quantile: f64,
    /// Share of draws taken from the tail component, α
    pub mixture_weight: f64,
    pub seed: u64,
}

impl Default for ImportanceSettings {
    fn default() -> Self {
        ImportanceSettings {
            samples: 20_000,
            tail_input: Some(0),
            tail_quantile: 0.9,
            mixture_weight: 0.5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceedanceEstimate {
    pub threshold: f64,
    pub probability: f64,
    pub standard_error: f64,
    /// Kish effective sample size, `(Σw)² / Σw²`
    pub effective_sample_size: f64,
    pub samples: usize,
    pub exceedances: usize,
}

/// Estimate `P(model(X) > threshold)`.
pub fn exceedance_probability<F>(
    inputs: &[UncertainInput],
    model: F,
    threshold: f64,
    settings: &ImportanceSettings,
) -> CalcResult<ExceedanceEstimate>
where
    F: Fn(&[f64]) -> CalcResult<f64>,
{
    validate_inputs(inputs)?;
    if settings.samples == 0 {
        return Err(CalcError::invalid_input("samples", "0", "At least one sample is required"));
    }
    if let Some(i) = settings.tail_input {
        if i >= inputs.len() {
            return Err(CalcError::invalid_input(
                "tail_input",
                i.to_string(),
                format!("Only {} inputs are defined", inputs.len()),
            ));
        }
    }
    if !(0.0..1.0).contains(&settings.tail_quantile) || !(0.0..1.0).contains(&settings.mixture_weight) {
        return Err(CalcError::invalid_input(
            "tail_quantile",
            format!("{}/{}", settings.tail_quantile, settings.mixture_weight),
            "Tail quantile and mixture weight must lie in [0, 1)",
        ));
    }

    let mut rng = ChaCha20Rng::seed_from_u64(settings.seed);
    let alpha = settings.mixture_weight;
    let ut = settings.tail_quantile;
    let n = settings.samples;

    let mut sum_w = 0.0;
    let mut sum_w2 = 0.0;
    let mut hits = Vec::with_capacity(n);
    let mut exceedances = 0;

    for _ in 0..n {
        let mut u: Vec<f64> = (0..inputs.len()).map(|_| rng.gen::<f64>()).collect();
        let mut weight = 1.0;
        if let Some(i) = settings.tail_input {
            if rng.gen::<f64>() < alpha {
                u[i] = ut + (1.0 - ut) * u[i];
            }
            let density = (1.0 - alpha) + if u[i] >= ut { alpha / (1.0 - ut) } else { 0.0 };
            weight = 1.0 / density;
        }
        let y = evaluate_model(&model, &map_point(inputs, &u))?;
        sum_w += weight;
        sum_w2 += weight * weight;
        let hit = if y > threshold {
            exceedances += 1;
            weight
        } else {
            0.0
        };
        hits.push(hit);
    }

    let (probability, var) = mean_and_variance(&hits);
    Ok(ExceedanceEstimate {
        threshold,
        probability,
        standard_error: (var / n as f64).sqrt(),
        effective_sample_size: sum_w * sum_w / sum_w2,
        samples: n,
        exceedances,
    })
}

// ============================================================================
// Reliability
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityResult {
    pub failure_probability: f64,
    /// `β = -Φ⁻¹(pf)`
    pub beta: f64,
    /// No failures were sampled; `beta` is a lower bound from `pf < 1/N`
    pub beta_is_lower_bound: bool,
    pub target_beta: f64,
    pub meets_target: bool,
    pub samples: usize,
}

/// Closed-form β for normal resistance and load
pub fn normal_reliability_index(mean_r: f64, sd_r: f64, mean_q: f64, sd_q: f64) -> f64 {
    (mean_r - mean_q) / (sd_r * sd_r + sd_q * sd_q).sqrt()
}

/// Sample the limit state `g = R - Q`.
pub fn reliability(
    resistance: &Distribution,
    load: &Distribution,
    target_beta: f64,
    settings: &MonteCarloSettings,
) -> CalcResult<ReliabilityResult> {
    resistance.validate()?;
    load.validate()?;
    if settings.samples == 0 {
        return Err(CalcError::invalid_input("samples", "0", "At least one sample is required"));
    }

    let mut rng = ChaCha20Rng::seed_from_u64(settings.seed);
    let mut failures = 0usize;
    let mut drawn = 0usize;
    while drawn < settings.samples {
        let (ur, uq) = (rng.gen::<f64>(), rng.gen::<f64>());
        let mut draws = vec![(ur, uq)];
        if settings.antithetic {
            draws.push((1.0 - ur, 1.0 - uq));
        }
        for (a, b) in draws {
            if resistance.quantile(a) - load.quantile(b) < 0.0 {
                failures += 1;
            }
            drawn += 1;
        }
    }

    let n = drawn as f64;
    let (pf, lower_bound) = if failures == 0 {
        (0.0, true)
    } else {
        (failures as f64 / n, false)
    };
    let beta = -standard_normal_quantile(if lower_bound { 1.0 / n } else { pf });
    Ok(ReliabilityResult {
        failure_probability: pf,
        beta,
        beta_is_lower_bound: lower_bound,
        target_beta,
        meets_target: beta >= target_beta,
        samples: drawn,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(x: &[f64]) -> CalcResult<f64> {
        Ok(2.0 * x[0] + x[1])
    }

    fn inputs() -> Vec<UncertainInput> {
        vec![
            UncertainInput::new("a", Distribution::Normal { mean: 10.0, std_dev: 1.0 }),
            UncertainInput::new("b", Distribution::Uniform { low: 0.0, high: 2.0 }),
        ]
    }

    #[test]
    fn test_summary_matches_moments() {
        let s = monte_carlo(&inputs(), linear, &MonteCarloSettings::default()).unwrap();
        assert!((s.mean - 21.0).abs() < 0.02);
        // Var = 4·1 + 4/12
        assert!((s.std_dev - (4.0f64 + 1.0 / 3.0).sqrt()).abs() < 0.05);
        assert!(s.p05 < s.p50 && s.p50 < s.p95);
        assert_eq!(s.samples, 10_000);
    }

    #[test]
    fn test_antithetic_reduces_error_for_monotone_model() {
        let anti = monte_carlo(&inputs(), linear, &MonteCarloSettings::default()).unwrap();
        let plain = monte_carlo(
            &inputs(),
            linear,
            &MonteCarloSettings {
                antithetic: false,
                ..MonteCarloSettings::default()
            },
        )
        .unwrap();
        assert!(anti.standard_error < plain.standard_error);
    }

    #[test]
    fn test_importance_sampling_tail_probability() {
        let input = vec![UncertainInput::new("z", Distribution::Normal { mean: 0.0, std_dev: 1.0 })];
        let est = exceedance_probability(&input, |x| Ok(x[0]), 2.5, &ImportanceSettings::default()).unwrap();
        // P(Z > 2.5) = 0.00621
        assert!((est.probability - 0.00621).abs() < 0.0015, "{}", est.probability);
        assert!(est.effective_sample_size > 0.0 && est.effective_sample_size <= est.samples as f64);
        assert!(est.exceedances > 100);
    }

    #[test]
    fn test_reliability_matches_closed_form() {
        let r = Distribution::Normal { mean: 25.0, std_dev: 3.0 };
        let q = Distribution::Normal { mean: 15.0, std_dev: 3.0 };
        let exact = normal_reliability_index(25.0, 3.0, 15.0, 3.0);
        let settings = MonteCarloSettings {
            samples: 200_000,
            ..MonteCarloSettings::default()
        };
        let result = reliability(&r, &q, 3.5, &settings).unwrap();
        assert!((result.beta - exact).abs() < 0.05, "{} vs {}", result.beta, exact);
        assert!(!result.meets_target);
        assert!(!result.beta_is_lower_bound);
    }

    #[test]
    fn test_reliability_without_failures_is_lower_bound() {
        let r = Distribution::Uniform { low: 10.0, high: 11.0 };
        let q = Distribution::Uniform { low: 1.0, high: 2.0 };
        let result = reliability(&r, &q, 3.5, &MonteCarloSettings::default()).unwrap();
        assert_eq!(result.failure_probability, 0.0);
        assert!(result.beta_is_lower_bound);
        assert!(result.beta.is_finite());
    }

    #[test]
    fn test_non_finite_model_output_rejected() {
        let err = monte_carlo(&inputs(), |_| Ok(f64::NAN), &MonteCarloSettings::default()).unwrap_err();
        assert!(matches!(err, CalcError::NumericFailure { .. }));
    }
}
