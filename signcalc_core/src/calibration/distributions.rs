//! Probability distributions for uncertain inputs.
//!
//! Sampling goes through the inverse CDF ([`Distribution::quantile`]) so a
//! uniform draw `u` and its antithetic partner `1 - u` map to mirrored
//! samples of any distribution.

use std::f64::consts::{PI, SQRT_2};

use serde::{Deserialize, Serialize};

use crate::errors::{ensure_finite, ensure_positive, CalcError, CalcResult};

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Uniform draws are clamped to `[U_EPS, 1 - U_EPS]` before inversion
pub const U_EPS: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    Normal { mean: f64, std_dev: f64 },
    /// `ln X ~ Normal(mu, sigma)`
    LogNormal { mu: f64, sigma: f64 },
    Uniform { low: f64, high: f64 },
    /// Extreme value type I (maxima), used for annual wind speeds
    Gumbel { location: f64, scale: f64 },
}

impl Distribution {
    /// Log-normal with a given arithmetic mean and coefficient of variation
    pub fn lognormal_from_mean_cov(mean: f64, cov: f64) -> CalcResult<Self> {
        ensure_positive("mean", mean)?;
        ensure_positive("cov", cov)?;
        let sigma2 = (1.0 + cov * cov).ln();
        Ok(Distribution::LogNormal {
            mu: mean.ln() - sigma2 / 2.0,
            sigma: sigma2.sqrt(),
        })
    }

    /// Gumbel with a given mean and coefficient of variation
    pub fn gumbel_from_mean_cov(mean: f64, cov: f64) -> CalcResult<Self> {
        ensure_positive("mean", mean)?;
        ensure_positive("cov", cov)?;
        let scale = cov * mean * 6f64.sqrt() / PI;
        Ok(Distribution::Gumbel {
            location: mean - EULER_GAMMA * scale,
            scale,
        })
    }

    pub fn validate(&self) -> CalcResult<()> {
        match *self {
            Distribution::Normal { mean, std_dev } => {
                ensure_finite("mean", mean)?;
                ensure_finite("std_dev", std_dev)?;
                if std_dev < 0.0 {
                    return Err(CalcError::invalid_input("std_dev", std_dev.to_string(), "Standard deviation cannot be negative"));
                }
            }
            Distribution::LogNormal { mu, sigma } => {
                ensure_finite("mu", mu)?;
                ensure_positive("sigma", sigma)?;
            }
            Distribution::Uniform { low, high } => {
                ensure_finite("low", low)?;
                ensure_finite("high", high)?;
                if low > high {
                    return Err(CalcError::invalid_input(
                        "low",
                        low.to_string(),
                        format!("Lower bound exceeds upper bound {}", high),
                    ));
                }
            }
            Distribution::Gumbel { location, scale } => {
                ensure_finite("location", location)?;
                ensure_positive("scale", scale)?;
            }
        }
        Ok(())
    }

    pub fn mean(&self) -> f64 {
        match *self {
            Distribution::Normal { mean, .. } => mean,
            Distribution::LogNormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
            Distribution::Uniform { low, high } => (low + high) / 2.0,
            Distribution::Gumbel { location, scale } => location + EULER_GAMMA * scale,
        }
    }

    pub fn std_dev(&self) -> f64 {
        match *self {
            Distribution::Normal { std_dev, .. } => std_dev,
            Distribution::LogNormal { mu, sigma } => {
                let s2 = sigma * sigma;
                ((s2.exp() - 1.0) * (2.0 * mu + s2).exp()).sqrt()
            }
            Distribution::Uniform { low, high } => (high - low) / 12f64.sqrt(),
            Distribution::Gumbel { scale, .. } => PI * scale / 6f64.sqrt(),
        }
    }

    /// Inverse CDF. `u` is clamped into the open unit interval.
    pub fn quantile(&self, u: f64) -> f64 {
        let u = u.clamp(U_EPS, 1.0 - U_EPS);
        match *self {
            Distribution::Normal { mean, std_dev } => mean + std_dev * standard_normal_quantile(u),
            Distribution::LogNormal { mu, sigma } => (mu + sigma * standard_normal_quantile(u)).exp(),
            Distribution::Uniform { low, high } => low + u * (high - low),
            Distribution::Gumbel { location, scale } => location - scale * (-u.ln()).ln(),
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match *self {
            Distribution::Normal { mean, std_dev } => {
                if std_dev == 0.0 {
                    return if x < mean { 0.0 } else { 1.0 };
                }
                standard_normal_cdf((x - mean) / std_dev)
            }
            Distribution::LogNormal { mu, sigma } => {
                if x <= 0.0 {
                    0.0
                } else {
                    standard_normal_cdf((x.ln() - mu) / sigma)
                }
            }
            Distribution::Uniform { low, high } => {
                if high == low {
                    return if x < low { 0.0 } else { 1.0 };
                }
                ((x - low) / (high - low)).clamp(0.0, 1.0)
            }
            Distribution::Gumbel { location, scale } => (-(-(x - location) / scale).exp()).exp(),
        }
    }
}

/// Standard normal CDF, `Φ(x)`.
pub fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Complementary error function (Chebyshev fit, fractional error < 1.2e-7).
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * poly.exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

/// Inverse standard normal CDF, `Φ⁻¹(p)` (Acklam's rational approximation,
/// relative error below 1.2e-9). Returns `±∞` at the end points.
pub fn standard_normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_quantile_known_values() {
        assert!(standard_normal_quantile(0.5).abs() < 1e-12);
        assert!((standard_normal_quantile(0.95) - 1.644_853_6).abs() < 1e-6);
        assert!((standard_normal_quantile(0.01) + 2.326_347_9).abs() < 1e-6);
        // β = 3.5 ⇔ pf ≈ 2.33e-4
        assert!((standard_normal_quantile(2.326_290_8e-4) + 3.5).abs() < 1e-5);
        assert_eq!(standard_normal_quantile(0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_cdf_inverts_quantile() {
        for p in [0.001, 0.02, 0.3, 0.5, 0.8, 0.99] {
            let x = standard_normal_quantile(p);
            assert!((standard_normal_cdf(x) - p).abs() < 1e-6, "p={}", p);
        }
    }

    #[test]
    fn test_moments_from_mean_cov() {
        let ln = Distribution::lognormal_from_mean_cov(100.0, 0.2).unwrap();
        assert!((ln.mean() - 100.0).abs() < 1e-9);
        assert!((ln.std_dev() - 20.0).abs() < 1e-9);

        let g = Distribution::gumbel_from_mean_cov(90.0, 0.15).unwrap();
        assert!((g.mean() - 90.0).abs() < 1e-9);
        assert!((g.std_dev() - 13.5).abs() < 1e-9);
    }

    #[test]
    fn test_quantiles_are_monotone_and_antithetic() {
        let dists = [
            Distribution::Normal { mean: 10.0, std_dev: 2.0 },
            Distribution::lognormal_from_mean_cov(10.0, 0.3).unwrap(),
            Distribution::Uniform { low: 5.0, high: 15.0 },
            Distribution::gumbel_from_mean_cov(10.0, 0.2).unwrap(),
        ];
        for d in &dists {
            let mut last = f64::NEG_INFINITY;
            for i in 1..100 {
                let x = d.quantile(i as f64 / 100.0);
                assert!(x > last);
                last = x;
            }
        }
        // Symmetric distributions mirror around the mean
        let n = &dists[0];
        assert!((n.quantile(0.2) + n.quantile(0.8) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_validation() {
        assert!(Distribution::Uniform { low: 2.0, high: 1.0 }.validate().is_err());
        assert!(Distribution::Normal { mean: 0.0, std_dev: -1.0 }.validate().is_err());
        assert!(Distribution::Gumbel { location: 1.0, scale: 0.0 }.validate().is_err());
        assert!(Distribution::LogNormal { mu: 0.0, sigma: 0.5 }.validate().is_ok());
    }
}
