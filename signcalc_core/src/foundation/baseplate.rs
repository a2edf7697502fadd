//! # Base Plate Connection
//!
//! Square steel plate welded to the pole and anchored to a concrete pier
//! with a square anchor pattern (bolts split evenly among four sides).
//!
//! ## Checks
//!
//! | Check | Demand | Capacity |
//! |-------|--------|----------|
//! | anchor_tension | `T = M / (n_t · 2a)` | `min(φ·Ase·Fu, φ·kc·√f'c·hef^1.5)` |
//! | anchor_shear | `V / n` | `φ·0.6·Ase·Fu` |
//! | anchor_interaction | `T/φNn + V/φVn` | 1.2 |
//! | plate_bending | `T·n_t·(a − D/2)` | `φ·Fy·W·t²/4` |
//! | weld_strength | `M/Sw + V/Lw` | `φ·0.6·Fexx·0.707·w` |
//! | concrete_bearing | `P/W² + M/(W³/6)` | `φ·0.85·f'c` |
//! | min_plate_thickness | `max(t_min, 0.75·db)` | `t` |
//! | bolt_clearance | `D/2 + c + db/2` | `a` |
//! | min_weld_size | AISC Table J2.4 | `w` |
//!
//! where `a = W/2 − 1.5·db` is the bolt line offset from the plate center,
//! `n_t = n/4 + 1` is the number of anchors in the tension row,
//! `Ase = 0.75·π·db²/4` and `hef = 12·db`.
//!
//! ## Cost
//!
//! ```text
//! cost = plate_lb · $/lb + n · $/bolt · (db/0.75)² + Lw · $/in · (w/0.25)²
//! ```

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::CheckResult;
use crate::errors::{ensure_finite, ensure_positive, CalcError, CalcResult};
use crate::standards::constants::{keys, ConstantsTable};
use crate::standards::sections::Section;
use crate::standards::{ANCHOR_DESIGN, POLE_FLEXURE, WELD_DESIGN};
use crate::units::{KipFt, KipIn};

// ============================================================================
// Fabrication Options
// ============================================================================

/// Plate widths (in), whole inches
pub const PLATE_WIDTHS_IN: [f64; 27] = [
    10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0, 18.0, 19.0, 20.0, 21.0, 22.0, 23.0, 24.0,
    25.0, 26.0, 27.0, 28.0, 29.0, 30.0, 31.0, 32.0, 33.0, 34.0, 35.0, 36.0,
];

/// Plate thicknesses (in), 1/8 in steps
pub const PLATE_THICKNESSES_IN: [f64; 21] = [
    0.5, 0.625, 0.75, 0.875, 1.0, 1.125, 1.25, 1.375, 1.5, 1.625, 1.75, 1.875, 2.0, 2.125,
    2.25, 2.375, 2.5, 2.625, 2.75, 2.875, 3.0,
];

/// Anchor rod diameters (in)
pub const BOLT_DIAMETERS_IN: [f64; 7] = [0.75, 0.875, 1.0, 1.25, 1.5, 1.75, 2.0];

/// Anchor counts (multiples of four)
pub const BOLT_COUNTS: [u32; 3] = [4, 8, 12];

/// Fillet weld leg sizes (in)
pub const WELD_SIZES_IN: [f64; 5] = [0.1875, 0.25, 0.3125, 0.375, 0.5];

/// Minimum fillet weld leg for the thinner joined part (AISC 360 Table J2.4).
pub fn min_fillet_weld_in(thinner_part_in: f64) -> f64 {
    if thinner_part_in <= 0.25 {
        0.125
    } else if thinner_part_in <= 0.5 {
        0.1875
    } else if thinner_part_in <= 0.75 {
        0.25
    } else {
        0.3125
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Loads at the pole base
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasePlateLoads {
    pub moment_kipft: f64,
    pub shear_kip: f64,
    pub axial_kip: f64,
}

/// The part of the pole section the connection sees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoleProfile {
    /// Outside width or diameter (in)
    pub outer_dim_in: f64,
    /// Wall thickness (in)
    pub wall_in: f64,
    pub is_round: bool,
}

impl From<&Section> for PoleProfile {
    fn from(section: &Section) -> Self {
        PoleProfile {
            outer_dim_in: section.outer_dim_in,
            wall_in: section.wall_in,
            is_round: section.family.is_round(),
        }
    }
}

impl PoleProfile {
    /// Section modulus of the weld treated as a line (in²)
    pub fn weld_modulus_in2(&self) -> f64 {
        let d = self.outer_dim_in;
        if self.is_round {
            PI * d * d / 4.0
        } else {
            4.0 * d * d / 3.0
        }
    }

    /// All-around weld length (in)
    pub fn weld_length_in(&self) -> f64 {
        if self.is_round {
            PI * self.outer_dim_in
        } else {
            4.0 * self.outer_dim_in
        }
    }
}

/// Everything a base plate evaluation needs besides the design itself.
///
/// ## JSON Example
///
/// ```json
/// {
///   "loads": { "moment_kipft": 60.0, "shear_kip": 3.0, "axial_kip": 1.0 },
///   "pole": { "outer_dim_in": 8.0, "wall_in": 0.233, "is_round": false },
///   "concrete_fc_psi": 3000.0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasePlateInput {
    pub loads: BasePlateLoads,
    pub pole: PoleProfile,
    pub concrete_fc_psi: f64,
}

impl BasePlateInput {
    pub fn validate(&self) -> CalcResult<()> {
        ensure_positive("loads.moment_kipft", self.loads.moment_kipft)?;
        ensure_finite("loads.shear_kip", self.loads.shear_kip)?;
        ensure_finite("loads.axial_kip", self.loads.axial_kip)?;
        if self.loads.shear_kip < 0.0 || self.loads.axial_kip < 0.0 {
            return Err(CalcError::invalid_input(
                "loads",
                format!("V={} P={}", self.loads.shear_kip, self.loads.axial_kip),
                "Shear and axial load cannot be negative",
            ));
        }
        ensure_positive("pole.outer_dim_in", self.pole.outer_dim_in)?;
        ensure_positive("pole.wall_in", self.pole.wall_in)?;
        ensure_positive("concrete_fc_psi", self.concrete_fc_psi)?;
        Ok(())
    }
}

/// One base plate design
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasePlateDesign {
    pub width_in: f64,
    pub thickness_in: f64,
    pub bolt_diameter_in: f64,
    pub bolt_count: u32,
    pub weld_in: f64,
}

impl BasePlateDesign {
    pub fn validate(&self) -> CalcResult<()> {
        ensure_positive("width_in", self.width_in)?;
        ensure_positive("thickness_in", self.thickness_in)?;
        ensure_positive("bolt_diameter_in", self.bolt_diameter_in)?;
        ensure_positive("weld_in", self.weld_in)?;
        if self.bolt_count < 4 || self.bolt_count % 4 != 0 {
            return Err(CalcError::invalid_input(
                "bolt_count",
                self.bolt_count.to_string(),
                "Anchor count must be a positive multiple of 4",
            ));
        }
        Ok(())
    }

    /// Edge distance from bolt center to plate edge (in)
    pub fn edge_distance_in(&self, ratio: f64) -> f64 {
        ratio * self.bolt_diameter_in
    }

    /// Anchors in the tension row
    pub fn tension_row(&self) -> u32 {
        self.bolt_count / 4 + 1
    }

    /// Effective tensile area of one anchor (in²)
    pub fn anchor_area_in2(&self) -> f64 {
        0.75 * PI * self.bolt_diameter_in.powi(2) / 4.0
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Checks and cost of one design
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasePlateEvaluation {
    pub design: BasePlateDesign,
    pub checks: Vec<CheckResult>,
    pub all_pass: bool,
    /// Check with the highest utilization
    pub governing: String,
    pub max_utilization: f64,
    /// Relative fabrication cost ($)
    pub cost: f64,
}

impl BasePlateEvaluation {
    /// Failing checks, for diagnostics
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passes)
    }
}

/// Fabrication cost of a design
pub fn baseplate_cost(
    design: &BasePlateDesign,
    pole: &PoleProfile,
    constants: &ConstantsTable,
) -> CalcResult<f64> {
    let plate_lb = design.width_in.powi(2) * design.thickness_in * constants.get(keys::STEEL_DENSITY_PCI)?;
    let plate = plate_lb * constants.get(keys::PLATE_COST_PER_LB)?;
    let anchors = design.bolt_count as f64
        * constants.get(keys::ANCHOR_COST_PER_BOLT)?
        * (design.bolt_diameter_in / 0.75).powi(2);
    let weld = pole.weld_length_in()
        * constants.get(keys::WELD_COST_PER_IN)?
        * (design.weld_in / 0.25).powi(2);
    Ok(plate + anchors + weld)
}

/// Run every check against one design.
pub fn evaluate_baseplate(
    input: &BasePlateInput,
    design: &BasePlateDesign,
    constants: &ConstantsTable,
) -> CalcResult<BasePlateEvaluation> {
    input.validate()?;
    design.validate()?;

    let m: KipIn = KipFt(input.loads.moment_kipft).into();
    let m = m.value();
    let v = input.loads.shear_kip;
    let p = input.loads.axial_kip;
    let pole = &input.pole;
    let d = pole.outer_dim_in;
    let db = design.bolt_diameter_in;
    let w = design.width_in;
    let t = design.thickness_in;

    let edge = design.edge_distance_in(constants.get(keys::EDGE_DISTANCE_RATIO)?);
    let offset = w / 2.0 - edge;
    if offset <= 0.0 {
        return Err(CalcError::invalid_input(
            "width_in",
            w.to_string(),
            format!("Plate too narrow for {} in anchors", db),
        ));
    }

    let anchor = ANCHOR_DESIGN.citation();
    let weld_ref = WELD_DESIGN.citation();
    let flexure = POLE_FLEXURE.citation();
    let mut checks = Vec::with_capacity(9);

    // Anchors
    let n_t = design.tension_row() as f64;
    let tension = m / (n_t * 2.0 * offset);
    let fu = constants.get(keys::ANCHOR_FU_KSI)?;
    let ase = design.anchor_area_in2();
    let steel_tension = constants.get(keys::PHI_ANCHOR_TENSION)? * ase * fu;
    let hef = constants.get(keys::ANCHOR_EMBED_RATIO)? * db;
    let breakout = constants.get(keys::PHI_BREAKOUT)?
        * constants.get(keys::BREAKOUT_KC)?
        * input.concrete_fc_psi.sqrt()
        * hef.powf(1.5)
        / 1000.0;
    let phi_nn = steel_tension.min(breakout);
    checks.push(CheckResult::new("anchor_tension", tension, phi_nn, "kip", anchor.clone()));

    let shear = v / design.bolt_count as f64;
    let phi_vn = constants.get(keys::PHI_ANCHOR_SHEAR)? * 0.6 * ase * fu;
    checks.push(CheckResult::new("anchor_shear", shear, phi_vn, "kip", anchor.clone()));

    let interaction = tension / phi_nn + shear / phi_vn;
    checks.push(CheckResult::new(
        "anchor_interaction",
        interaction,
        constants.get(keys::INTERACTION_LIMIT)?,
        "ratio",
        anchor,
    ));

    // Plate bending at the pole face
    let cantilever = (offset - d / 2.0).max(0.0);
    let plate_moment = tension * n_t * cantilever;
    let plate_capacity = constants.get(keys::PHI_BENDING)? * constants.get(keys::PLATE_FY_KSI)? * w * t * t / 4.0;
    checks.push(CheckResult::new("plate_bending", plate_moment, plate_capacity, "kip-in", flexure));

    // Pole-to-plate weld
    let weld_demand = m / pole.weld_modulus_in2() + v / pole.weld_length_in();
    let weld_capacity = constants.get(keys::PHI_WELD)? * 0.6 * constants.get(keys::WELD_FEXX_KSI)? * 0.707 * design.weld_in;
    checks.push(CheckResult::new("weld_strength", weld_demand, weld_capacity, "kip/in", weld_ref.clone()));

    // Concrete bearing under the plate
    let bearing = p / (w * w) + m / (w.powi(3) / 6.0);
    let bearing_capacity = constants.get(keys::PHI_BEARING)? * 0.85 * input.concrete_fc_psi / 1000.0;
    checks.push(CheckResult::new("concrete_bearing", bearing, bearing_capacity, "ksi", weld_ref.clone()));

    // Detailing
    let min_t = constants.get(keys::MIN_PLATE_THICKNESS_IN)?.max(0.75 * db);
    checks.push(CheckResult::new("min_plate_thickness", min_t, t, "in", "Detailing".to_string()));

    let needed_offset = d / 2.0 + constants.get(keys::POLE_CLEARANCE_IN)? + db / 2.0;
    checks.push(CheckResult::new("bolt_clearance", needed_offset, offset, "in", "Detailing".to_string()));

    let min_weld = min_fillet_weld_in(t.min(pole.wall_in));
    checks.push(CheckResult::new("min_weld_size", min_weld, design.weld_in, "in", weld_ref));

    let all_pass = checks.iter().all(|c| c.passes);
    let (governing, max_utilization) = checks
        .iter()
        .max_by(|a, b| a.utilization.total_cmp(&b.utilization))
        .map(|c| (c.name.clone(), c.utilization))
        .unwrap_or_default();
    let cost = baseplate_cost(design, pole, constants)?;

    Ok(BasePlateEvaluation {
        design: *design,
        checks,
        all_pass,
        governing,
        max_utilization,
        cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> BasePlateInput {
        BasePlateInput {
            loads: BasePlateLoads {
                moment_kipft: 40.0,
                shear_kip: 2.5,
                axial_kip: 1.0,
            },
            pole: PoleProfile {
                outer_dim_in: 8.0,
                wall_in: 0.233,
                is_round: false,
            },
            concrete_fc_psi: 3000.0,
        }
    }

    fn stout() -> BasePlateDesign {
        BasePlateDesign {
            width_in: 24.0,
            thickness_in: 2.0,
            bolt_diameter_in: 1.5,
            bolt_count: 8,
            weld_in: 0.5,
        }
    }

    #[test]
    fn test_stout_design_passes() {
        let eval = evaluate_baseplate(&input(), &stout(), &ConstantsTable::builtin()).unwrap();
        for c in &eval.checks {
            assert!(c.passes, "{} failed: {} > {}", c.name, c.demand, c.capacity);
        }
        assert!(eval.all_pass);
        assert!(eval.max_utilization <= 1.0);
        assert_eq!(eval.checks.len(), 9);
    }

    #[test]
    fn test_undersized_design_fails() {
        let thin = BasePlateDesign {
            width_in: 12.0,
            thickness_in: 0.5,
            bolt_diameter_in: 0.75,
            bolt_count: 4,
            weld_in: 0.1875,
        };
        let eval = evaluate_baseplate(&input(), &thin, &ConstantsTable::builtin()).unwrap();
        assert!(!eval.all_pass);
        assert!(eval.failures().count() > 0);
        assert!(eval.max_utilization > 1.0);
    }

    #[test]
    fn test_tension_row_and_geometry() {
        let d = stout();
        assert_eq!(d.tension_row(), 3);
        assert_eq!(d.edge_distance_in(1.5), 2.25);
        let eval = evaluate_baseplate(&input(), &d, &ConstantsTable::builtin()).unwrap();
        let tension = eval.checks.iter().find(|c| c.name == "anchor_tension").unwrap();
        // M = 480 kip-in, a = 12 - 2.25 = 9.75, T = 480 / (3 * 19.5)
        assert!((tension.demand - 480.0 / 58.5).abs() < 1e-9);
    }

    #[test]
    fn test_min_weld_table() {
        assert_eq!(min_fillet_weld_in(0.233), 0.125);
        assert_eq!(min_fillet_weld_in(0.5), 0.1875);
        assert_eq!(min_fillet_weld_in(0.75), 0.25);
        assert_eq!(min_fillet_weld_in(1.0), 0.3125);
    }

    #[test]
    fn test_cost_grows_with_material() {
        let c = ConstantsTable::builtin();
        let pole = input().pole;
        let base = baseplate_cost(&stout(), &pole, &c).unwrap();
        let mut bigger = stout();
        bigger.thickness_in = 2.5;
        assert!(baseplate_cost(&bigger, &pole, &c).unwrap() > base);
        let mut more_bolts = stout();
        more_bolts.bolt_count = 12;
        assert!(baseplate_cost(&more_bolts, &pole, &c).unwrap() > base);
    }

    #[test]
    fn test_invalid_designs_rejected() {
        let c = ConstantsTable::builtin();
        let mut d = stout();
        d.bolt_count = 6;
        assert!(evaluate_baseplate(&input(), &d, &c).is_err());
        let mut i = input();
        i.concrete_fc_psi = 0.0;
        assert!(evaluate_baseplate(&i, &stout(), &c).is_err());
    }
}
