//! # Wind Loads on Solid Freestanding Signs
//!
//! ASCE 7-22 directional procedure (Chapters 26 and 29).
//!
//! ```text
//! qz = 0.00256 · Kz · Kzt · Kd · Ke · V²        (Eq. 26.10-1, psf)
//! p  = qz · G · Cf · Iw                          (design pressure, psf)
//! F  = p · As                                    (Eq. 29.3-1, lb)
//! M  = F · z̄ · load factor                       (moment at grade, kip-ft)
//! ```
//!
//! `Kz` is evaluated at the top of the sign from Table 26.10-1 with linear
//! interpolation and the 15 ft floor. The solver is closed-form and has no
//! hidden state: identical inputs and constants give bit-identical outputs.
//!
//! ## Example
//!
//! ```rust
//! use signcalc_core::loads::wind::{design_pressure_psf, ExposureCategory, RiskCategory};
//! use signcalc_core::standards::constants::ConstantsTable;
//!
//! let constants = ConstantsTable::builtin();
//! let p = design_pressure_psf(115.0, ExposureCategory::C, RiskCategory::II, 20.0, &constants).unwrap();
//! assert!((p - 26.42).abs() < 0.01);
//! ```

use serde::{Deserialize, Serialize};

use super::geometry::Geometry;
use crate::errors::{ensure_finite, CalcError, CalcResult};
use crate::standards::constants::{keys, ConstantsTable};
use crate::units::{Feet, KipFt, Kips, Pounds, Psf, SqFt};

// ============================================================================
// Categories
// ============================================================================

/// Surface roughness exposure category (ASCE 7-22 26.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExposureCategory {
    B,
    C,
    D,
}

impl ExposureCategory {
    /// Parse a category code. Unknown codes are rejected, not defaulted.
    pub fn from_code(code: &str) -> CalcResult<Self> {
        match code.trim().to_uppercase().as_str() {
            "B" => Ok(ExposureCategory::B),
            "C" => Ok(ExposureCategory::C),
            "D" => Ok(ExposureCategory::D),
            _ => Err(CalcError::unknown_category("exposure", code, &["B", "C", "D"])),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ExposureCategory::B => "B",
            ExposureCategory::C => "C",
            ExposureCategory::D => "D",
        }
    }

    fn kz_column(&self) -> &'static [f64; KZ_HEIGHTS.len()] {
        match self {
            ExposureCategory::B => &KZ_B,
            ExposureCategory::C => &KZ_C,
            ExposureCategory::D => &KZ_D,
        }
    }
}

/// Risk category (ASCE 7-22 Table 1.5-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    I,
    II,
    III,
    IV,
}

impl RiskCategory {
    pub fn from_code(code: &str) -> CalcResult<Self> {
        match code.trim().to_uppercase().as_str() {
            "I" | "1" => Ok(RiskCategory::I),
            "II" | "2" => Ok(RiskCategory::II),
            "III" | "3" => Ok(RiskCategory::III),
            "IV" | "4" => Ok(RiskCategory::IV),
            _ => Err(CalcError::unknown_category(
                "risk_category",
                code,
                &["I", "II", "III", "IV"],
            )),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RiskCategory::I => "I",
            RiskCategory::II => "II",
            RiskCategory::III => "III",
            RiskCategory::IV => "IV",
        }
    }

    fn importance_key(&self) -> &'static str {
        match self {
            RiskCategory::I => keys::IMPORTANCE_I,
            RiskCategory::II => keys::IMPORTANCE_II,
            RiskCategory::III => keys::IMPORTANCE_III,
            RiskCategory::IV => keys::IMPORTANCE_IV,
        }
    }
}

// ============================================================================
// Table 26.10-1
// ============================================================================

const KZ_HEIGHTS: [f64; 15] = [
    0.0, 15.0, 20.0, 25.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 120.0, 140.0, 160.0,
];
const KZ_B: [f64; 15] = [
    0.57, 0.57, 0.62, 0.66, 0.70, 0.76, 0.81, 0.85, 0.89, 0.93, 0.96, 0.99, 1.04, 1.09, 1.13,
];
const KZ_C: [f64; 15] = [
    0.85, 0.85, 0.90, 0.94, 0.98, 1.04, 1.09, 1.13, 1.17, 1.21, 1.24, 1.26, 1.31, 1.36, 1.39,
];
const KZ_D: [f64; 15] = [
    1.03, 1.03, 1.08, 1.12, 1.16, 1.22, 1.27, 1.31, 1.34, 1.38, 1.40, 1.43, 1.48, 1.52, 1.55,
];

/// Velocity pressure exposure coefficient at height `z_ft`.
///
/// Heights below 15 ft use the 15 ft value; heights above the table use the
/// last row (callers validate the height range first).
pub fn kz(exposure: ExposureCategory, z_ft: f64) -> f64 {
    let column = exposure.kz_column();
    let z = z_ft.max(15.0);
    for i in 1..KZ_HEIGHTS.len() {
        if z == KZ_HEIGHTS[i] {
            return column[i];
        }
        if z < KZ_HEIGHTS[i] {
            let (z0, z1) = (KZ_HEIGHTS[i - 1], KZ_HEIGHTS[i]);
            let (k0, k1) = (column[i - 1], column[i]);
            return k0 + (k1 - k0) * (z - z0) / (z1 - z0);
        }
    }
    column[column.len() - 1]
}

// ============================================================================
// Inputs and Results
// ============================================================================

/// Typed site conditions after defaults have been resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConditions {
    /// Basic wind speed V (mph)
    pub wind_speed_mph: f64,
    pub exposure: ExposureCategory,
    pub risk_category: RiskCategory,
    /// Allowable vertical soil bearing (psf), needed only for embedded poles
    #[serde(default)]
    pub soil_bearing_psf: Option<f64>,
}

/// Wind demand on the sign. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteLoad {
    pub wind_speed_mph: f64,
    pub exposure: ExposureCategory,
    pub risk_category: RiskCategory,
    pub soil_bearing_psf: Option<f64>,
    /// Height Kz was evaluated at (ft)
    pub reference_height_ft: f64,
    pub kz: f64,
    /// Velocity pressure qz (psf)
    pub qz_psf: f64,
    /// Design wind pressure p (psf)
    pub design_pressure_psf: f64,
    /// Projected sign area (ft²)
    pub area_ft2: f64,
    /// Resultant wind force (lb)
    pub wind_force_lb: f64,
    /// Base shear (kips)
    pub shear_kip: f64,
    /// Height of the resultant above grade (ft)
    pub load_arm_ft: f64,
    /// Factored moment at grade (kip-ft)
    pub moment_kipft: f64,
    /// Cabinet dead load (kips)
    pub axial_kip: f64,
}

fn validate_speed(wind_speed_mph: f64, constants: &ConstantsTable) -> CalcResult<()> {
    ensure_finite("wind_speed_mph", wind_speed_mph)?;
    if wind_speed_mph <= 0.0 {
        return Err(CalcError::invalid_input(
            "wind_speed_mph",
            wind_speed_mph.to_string(),
            "Wind speed must be positive",
        ));
    }
    let max = constants.get(keys::WIND_SPEED_MAX_MPH)?;
    if wind_speed_mph > max {
        return Err(CalcError::invalid_input(
            "wind_speed_mph",
            wind_speed_mph.to_string(),
            format!("Wind speed exceeds the mapped maximum of {} mph", max),
        ));
    }
    Ok(())
}

fn validate_height(height_ft: f64, constants: &ConstantsTable) -> CalcResult<()> {
    ensure_finite("height_ft", height_ft)?;
    let max = constants.get(keys::HEIGHT_MAX_FT)?;
    if height_ft <= 0.0 || height_ft > max {
        return Err(CalcError::invalid_input(
            "height_ft",
            height_ft.to_string(),
            format!("Height must be in (0, {}] ft", max),
        ));
    }
    Ok(())
}

/// Velocity pressure qz (psf), Eq. 26.10-1.
pub fn velocity_pressure_psf(
    wind_speed_mph: f64,
    exposure: ExposureCategory,
    height_ft: f64,
    constants: &ConstantsTable,
) -> CalcResult<f64> {
    validate_speed(wind_speed_mph, constants)?;
    validate_height(height_ft, constants)?;
    let coeff = constants.get(keys::VELOCITY_PRESSURE_COEFF)?;
    let kzt = constants.get(keys::KZT)?;
    let kd = constants.get(keys::KD)?;
    let ke = constants.get(keys::KE)?;
    Ok(coeff * kz(exposure, height_ft) * kzt * kd * ke * wind_speed_mph * wind_speed_mph)
}

/// Design wind pressure p = qz·G·Cf·Iw (psf).
pub fn design_pressure_psf(
    wind_speed_mph: f64,
    exposure: ExposureCategory,
    risk_category: RiskCategory,
    height_ft: f64,
    constants: &ConstantsTable,
) -> CalcResult<f64> {
    let qz = velocity_pressure_psf(wind_speed_mph, exposure, height_ft, constants)?;
    let g = constants.get(keys::GUST_FACTOR)?;
    let cf = constants.get(keys::FORCE_COEFFICIENT)?;
    let iw = constants.get(risk_category.importance_key())?;
    Ok(qz * g * cf * iw)
}

/// Compute the wind demand for a validated geometry.
pub fn compute_site_load(
    site: &SiteConditions,
    geometry: &Geometry,
    constants: &ConstantsTable,
) -> CalcResult<SiteLoad> {
    if let Some(soil) = site.soil_bearing_psf {
        ensure_finite("soil_bearing_psf", soil)?;
    }

    let z = geometry.overall_height_ft;
    let qz = velocity_pressure_psf(site.wind_speed_mph, site.exposure, z, constants)?;
    let p = design_pressure_psf(site.wind_speed_mph, site.exposure, site.risk_category, z, constants)?;
    let load_factor = constants.get(keys::WIND_LOAD_FACTOR)?;

    let force: Pounds = Psf(p) * SqFt(geometry.area_ft2);
    let shear: Kips = force.into();
    let moment: KipFt = shear * Feet(geometry.centroid_ft) * load_factor;
    let axial: Kips = Pounds(geometry.weight_lb).into();

    let load = SiteLoad {
        wind_speed_mph: site.wind_speed_mph,
        exposure: site.exposure,
        risk_category: site.risk_category,
        soil_bearing_psf: site.soil_bearing_psf,
        reference_height_ft: z,
        kz: kz(site.exposure, z),
        qz_psf: qz,
        design_pressure_psf: p,
        area_ft2: geometry.area_ft2,
        wind_force_lb: force.value(),
        shear_kip: shear.value() * load_factor,
        load_arm_ft: geometry.centroid_ft,
        moment_kipft: moment.value(),
        axial_kip: axial.value(),
    };

    for (name, value) in [
        ("qz_psf", load.qz_psf),
        ("design_pressure_psf", load.design_pressure_psf),
        ("moment_kipft", load.moment_kipft),
    ] {
        if !value.is_finite() {
            return Err(CalcError::numeric(name, value));
        }
    }

    Ok(load)
}
