//! # Embedded Pole Depth (IBC 2024 §1807.3.2.1, nonconstrained)
//!
//! ```text
//! d  = 0.5·A·(1 + √(1 + 4.36·h/A))          (Eq. 18-1)
//! A  = 2.34·P / (S1·b)
//! P  = SF · M / h                            (lateral force at the load arm)
//! S1 = L · min(d/3, 15)                      (lateral bearing at d/3, Table 1806.2)
//! L  = soil · ratio · isolated-pole increase (psf per ft of depth)
//! ```
//!
//! Eq. 18-1 is implicit in `d` because S1 depends on depth. Written as
//! `0.5·(A + √(A² + 4.36·h·A))`, the right-hand side never increases with
//! depth or with diameter, so "d is adequate" (`d ≥ rhs(d)`) is an
//! upward-closed predicate on depth.
//!
//! The solver bisects over a fixed grid from the minimum to the maximum
//! embedment with a fixed resolution and returns the first adequate grid
//! depth. Because the grid does not depend on the diameter and a smaller
//! diameter can only make the predicate harder to satisfy, a smaller
//! diameter can never produce a shallower answer.
//!
//! ## Example
//!
//! ```rust
//! use signcalc_core::foundation::depth::{solve_depth, DepthInput, DepthOutcome, DepthSettings};
//! use signcalc_core::standards::constants::ConstantsTable;
//!
//! let constants = ConstantsTable::builtin();
//! let input = DepthInput {
//!     moment_kipft: 50.0,
//!     load_arm_ft: 10.0,
//!     diameter_ft: 3.0,
//!     soil_bearing_psf: 3000.0,
//!     safety_factor: 1.0,
//! };
//! match solve_depth(&input, &constants, &DepthSettings::default()).unwrap() {
//!     DepthOutcome::Solved(sol) => assert!(sol.depth_ft > 9.0 && sol.depth_ft < 9.5),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::CheckResult;
use crate::errors::{ensure_positive, CalcError, CalcResult};
use crate::standards::constants::{keys, ConstantsTable};
use crate::standards::POLE_EMBEDMENT;
use crate::units::{FtLb, KipFt};

/// Depth solver inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthInput {
    /// Overturning moment at grade (kip-ft)
    pub moment_kipft: f64,
    /// Height of the lateral resultant above grade, `h` (ft)
    pub load_arm_ft: f64,
    /// Footing diameter, `b` (ft)
    pub diameter_ft: f64,
    /// Allowable vertical soil bearing (psf)
    pub soil_bearing_psf: f64,
    /// Factor applied to the lateral force (≥ 1)
    pub safety_factor: f64,
}

impl DepthInput {
    pub fn validate(&self) -> CalcResult<()> {
        // Soil first: a non-positive bearing value is rejected before anything else
        ensure_positive("soil_bearing_psf", self.soil_bearing_psf)?;
        ensure_positive("moment_kipft", self.moment_kipft)?;
        ensure_positive("load_arm_ft", self.load_arm_ft)?;
        ensure_positive("diameter_ft", self.diameter_ft)?;
        ensure_positive("safety_factor", self.safety_factor)?;
        if self.safety_factor < 1.0 {
            return Err(CalcError::invalid_input(
                "safety_factor",
                self.safety_factor.to_string(),
                "Safety factor must be at least 1.0",
            ));
        }
        Ok(())
    }
}

/// Bisection controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthSettings {
    /// Grid spacing of returned depths (ft)
    pub resolution_ft: f64,
    /// Bisection step cap
    pub max_iterations: u32,
}

impl Default for DepthSettings {
    fn default() -> Self {
        DepthSettings {
            resolution_ft: 0.01,
            max_iterations: 32,
        }
    }
}

impl DepthSettings {
    pub fn validate(&self) -> CalcResult<()> {
        ensure_positive("depth.resolution_ft", self.resolution_ft)?;
        if self.max_iterations == 0 {
            return Err(CalcError::invalid_input(
                "depth.max_iterations",
                "0",
                "At least one bisection step is required",
            ));
        }
        Ok(())
    }

    /// Settings for the single retry after non-convergence
    pub fn relaxed(&self) -> Self {
        DepthSettings {
            resolution_ft: self.resolution_ft * 5.0,
            max_iterations: self.max_iterations.saturating_mul(2),
        }
    }
}

/// A solved embedment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthSolution {
    /// Returned embedment depth (ft), the first adequate grid point
    pub depth_ft: f64,
    pub diameter_ft: f64,
    /// Right-hand side of Eq. 18-1 evaluated at `depth_ft`
    pub required_at_depth_ft: f64,
    /// Factored lateral force P (lb)
    pub lateral_force_lb: f64,
    /// Lateral bearing per foot of depth, L (psf/ft)
    pub lateral_bearing_psf_per_ft: f64,
    /// S1 at the returned depth (psf)
    pub s1_psf: f64,
    /// A at the returned depth (ft)
    pub coefficient_a_ft: f64,
    pub iterations: u32,
    /// The minimum embedment governed
    pub governed_by_minimum: bool,
    pub check: CheckResult,
}

/// Depth solver outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DepthOutcome {
    Solved(DepthSolution),
    /// Even the maximum embedment is inadequate; needs engineering review
    ExceedsMaximum {
        max_depth_ft: f64,
        required_at_max_ft: f64,
    },
    /// The bisection cap was hit before the bracket closed
    NonConverged {
        iterations: u32,
        bracket_low_ft: f64,
        bracket_high_ft: f64,
    },
}

struct Embedment {
    lateral_force_lb: f64,
    lateral_per_ft: f64,
    max_multiple: f64,
    coeff_a: f64,
    coeff_depth: f64,
    arm_ft: f64,
    diameter_ft: f64,
}

impl Embedment {
    fn s1(&self, depth_ft: f64) -> f64 {
        self.lateral_per_ft * (depth_ft / 3.0).min(self.max_multiple)
    }

    fn coefficient_a(&self, depth_ft: f64) -> f64 {
        self.coeff_a * self.lateral_force_lb / (self.s1(depth_ft) * self.diameter_ft)
    }

    /// Eq. 18-1 right-hand side at a trial depth
    fn required(&self, depth_ft: f64) -> f64 {
        let a = self.coefficient_a(depth_ft);
        0.5 * (a + (a * a + self.coeff_depth * self.arm_ft * a).sqrt())
    }

    fn adequate(&self, depth_ft: f64) -> CalcResult<bool> {
        let required = self.required(depth_ft);
        if !required.is_finite() {
            return Err(CalcError::numeric("embedment_required_depth", required));
        }
        Ok(depth_ft >= required)
    }
}

/// Solve for the minimum embedment depth.
pub fn solve_depth(
    input: &DepthInput,
    constants: &ConstantsTable,
    settings: &DepthSettings,
) -> CalcResult<DepthOutcome> {
    input.validate()?;
    settings.validate()?;

    let min_depth = constants.get(keys::MIN_EMBEDMENT_FT)?;
    let max_depth = constants.get(keys::MAX_EMBEDMENT_FT)?;
    if min_depth > max_depth {
        return Err(CalcError::invalid_input(
            keys::MIN_EMBEDMENT_FT,
            min_depth.to_string(),
            format!("Minimum embedment exceeds maximum ({} ft)", max_depth),
        ));
    }

    let moment: FtLb = KipFt(input.moment_kipft).into();
    let embedment = Embedment {
        lateral_force_lb: input.safety_factor * moment.value() / input.load_arm_ft,
        lateral_per_ft: input.soil_bearing_psf
            * constants.get(keys::LATERAL_BEARING_RATIO)?
            * constants.get(keys::ISOLATED_POLE_INCREASE)?,
        max_multiple: constants.get(keys::LATERAL_BEARING_MAX_MULTIPLE)?,
        coeff_a: constants.get(keys::IBC_COEFF_A)?,
        coeff_depth: constants.get(keys::IBC_COEFF_DEPTH)?,
        arm_ft: input.load_arm_ft,
        diameter_ft: input.diameter_ft,
    };

    // Grid: depth(k) = min + k·res, last point clamped to max
    let steps = ((max_depth - min_depth) / settings.resolution_ft).ceil() as u64;
    let depth_at = |k: u64| (min_depth + k as f64 * settings.resolution_ft).min(max_depth);

    let solved = |k: u64, iterations: u32| -> DepthOutcome {
        let depth = depth_at(k);
        let required = embedment.required(depth);
        DepthOutcome::Solved(DepthSolution {
            depth_ft: depth,
            diameter_ft: input.diameter_ft,
            required_at_depth_ft: required,
            lateral_force_lb: embedment.lateral_force_lb,
            lateral_bearing_psf_per_ft: embedment.lateral_per_ft,
            s1_psf: embedment.s1(depth),
            coefficient_a_ft: embedment.coefficient_a(depth),
            iterations,
            governed_by_minimum: k == 0,
            check: CheckResult::new(
                "embedment_depth",
                required,
                depth,
                "ft",
                POLE_EMBEDMENT.citation(),
            ),
        })
    };

    if embedment.adequate(depth_at(0))? {
        return Ok(solved(0, 0));
    }
    if !embedment.adequate(depth_at(steps))? {
        return Ok(DepthOutcome::ExceedsMaximum {
            max_depth_ft: max_depth,
            required_at_max_ft: embedment.required(max_depth),
        });
    }

    // Invariant: lo inadequate, hi adequate
    let (mut lo, mut hi) = (0u64, steps);
    let mut iterations = 0u32;
    while hi - lo > 1 {
        if iterations >= settings.max_iterations {
            return Ok(DepthOutcome::NonConverged {
                iterations,
                bracket_low_ft: depth_at(lo),
                bracket_high_ft: depth_at(hi),
            });
        }
        iterations += 1;
        let mid = lo + (hi - lo) / 2;
        if embedment.adequate(depth_at(mid))? {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    Ok(solved(hi, iterations))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(diameter_ft: f64) -> DepthInput {
        DepthInput {
            moment_kipft: 50.0,
            load_arm_ft: 10.0,
            diameter_ft,
            soil_bearing_psf: 3000.0,
            safety_factor: 1.0,
        }
    }

    fn depth(input: &DepthInput) -> f64 {
        match solve_depth(input, &ConstantsTable::builtin(), &DepthSettings::default()).unwrap() {
            DepthOutcome::Solved(s) => s.depth_ft,
            other => panic!("expected solution, got {:?}", other),
        }
    }

    #[test]
    fn test_smaller_diameter_is_deeper() {
        let d1 = depth(&input(3.0));
        let d2 = depth(&input(2.0));
        assert!(d2 > d1, "D2={} should exceed D1={}", d2, d1);
        assert!((d1 - 9.22).abs() < 0.05, "D1={}", d1);
        assert!((d2 - 10.83).abs() < 0.05, "D2={}", d2);
    }

    #[test]
    fn test_solution_satisfies_equation() {
        let constants = ConstantsTable::builtin();
        match solve_depth(&input(3.0), &constants, &DepthSettings::default()).unwrap() {
            DepthOutcome::Solved(s) => {
                assert!(s.depth_ft >= s.required_at_depth_ft);
                assert!(s.depth_ft - s.required_at_depth_ft < 0.05);
                assert!(s.check.passes);
                assert!(s.iterations <= 11);
                assert_eq!(s.lateral_bearing_psf_per_ft, 300.0);
                assert!(!s.governed_by_minimum);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_minimum_governs_small_moment() {
        let mut i = input(3.0);
        i.moment_kipft = 0.01;
        let constants = ConstantsTable::builtin();
        match solve_depth(&i, &constants, &DepthSettings::default()).unwrap() {
            DepthOutcome::Solved(s) => {
                assert!(s.governed_by_minimum);
                assert_eq!(s.depth_ft, 2.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_exceeds_maximum_flags_review() {
        let mut i = input(1.0);
        i.moment_kipft = 400.0;
        let outcome = solve_depth(&i, &ConstantsTable::builtin(), &DepthSettings::default()).unwrap();
        match outcome {
            DepthOutcome::ExceedsMaximum { max_depth_ft, required_at_max_ft } => {
                assert_eq!(max_depth_ft, 15.0);
                assert!(required_at_max_ft > 15.0);
            }
            other => panic!("expected ExceedsMaximum, got {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_soil_rejected() {
        let constants = ConstantsTable::builtin();
        for soil in [0.0, -100.0] {
            let mut i = input(3.0);
            i.soil_bearing_psf = soil;
            let err = solve_depth(&i, &constants, &DepthSettings::default()).unwrap_err();
            assert_eq!(err.field(), Some("soil_bearing_psf"));
        }
    }

    #[test]
    fn test_safety_factor_below_one_rejected() {
        let mut i = input(3.0);
        i.safety_factor = 0.8;
        assert!(solve_depth(&i, &ConstantsTable::builtin(), &DepthSettings::default()).is_err());
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let settings = DepthSettings {
            resolution_ft: 0.01,
            max_iterations: 5,
        };
        let outcome = solve_depth(&input(3.0), &ConstantsTable::builtin(), &settings).unwrap();
        match outcome {
            DepthOutcome::NonConverged { iterations, bracket_low_ft, bracket_high_ft } => {
                assert_eq!(iterations, 5);
                assert!(bracket_low_ft < bracket_high_ft);
            }
            other => panic!("expected NonConverged, got {:?}", other),
        }
        // The relaxed retry has enough steps
        let relaxed = settings.relaxed();
        assert_eq!(relaxed.max_iterations, 10);
        assert!(matches!(
            solve_depth(&input(3.0), &ConstantsTable::builtin(), &relaxed).unwrap(),
            DepthOutcome::Solved(_)
        ));
    }

    #[test]
    fn test_bitwise_deterministic() {
        let a = depth(&input(2.7));
        let b = depth(&input(2.7));
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
