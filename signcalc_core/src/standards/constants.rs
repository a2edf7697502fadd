//! # Code and Calibration Constants
//!
//! Versioned key→value table of every numeric constant the solvers read.
//! Each entry carries its code reference and, for calibration-tunable
//! constants, the direction in which a change makes designs more
//! conservative.
//!
//! Tables are immutable once built. New values arrive only through
//! [`super::store::ConstantsStore::publish`], which derives a new version.
//!
//! ## Example
//!
//! ```rust
//! use signcalc_core::standards::constants::{keys, ConstantsTable};
//!
//! let table = ConstantsTable::builtin();
//! assert_eq!(table.get(keys::KD).unwrap(), 0.85);
//! assert!(table.get("no_such_constant").is_err());
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{CalcError, CalcResult};

/// Version string of the built-in table
pub const BUILTIN_CONSTANTS_VERSION: &str = "2024.1";

/// Constant keys. Use these instead of string literals.
pub mod keys {
    // Wind (ASCE 7-22 ch. 26 and 29)
    pub const VELOCITY_PRESSURE_COEFF: &str = "velocity_pressure_coeff";
    pub const KD: &str = "kd";
    pub const KZT: &str = "kzt";
    pub const KE: &str = "ke";
    pub const GUST_FACTOR: &str = "gust_factor";
    pub const FORCE_COEFFICIENT: &str = "force_coefficient";
    pub const WIND_LOAD_FACTOR: &str = "wind_load_factor";
    pub const WIND_SPEED_MAX_MPH: &str = "wind_speed_max_mph";
    pub const HEIGHT_MAX_FT: &str = "height_max_ft";
    pub const IMPORTANCE_I: &str = "importance_risk_i";
    pub const IMPORTANCE_II: &str = "importance_risk_ii";
    pub const IMPORTANCE_III: &str = "importance_risk_iii";
    pub const IMPORTANCE_IV: &str = "importance_risk_iv";

    // Pole selection (AISC 360-22)
    pub const PHI_BENDING: &str = "phi_bending";
    pub const CANTILEVER_K: &str = "cantilever_k";
    pub const SLENDERNESS_LIMIT: &str = "slenderness_limit";

    // Embedded pole foundations (IBC 2024 1806 and 1807.3)
    pub const IBC_COEFF_A: &str = "ibc_1807_coeff_a";
    pub const IBC_COEFF_DEPTH: &str = "ibc_1807_coeff_depth";
    pub const LATERAL_BEARING_RATIO: &str = "lateral_bearing_ratio";
    pub const ISOLATED_POLE_INCREASE: &str = "isolated_pole_increase";
    pub const LATERAL_BEARING_MAX_MULTIPLE: &str = "lateral_bearing_max_multiple";
    pub const FOUNDATION_SAFETY_FACTOR: &str = "foundation_safety_factor";
    pub const MIN_EMBEDMENT_FT: &str = "min_embedment_ft";
    pub const MAX_EMBEDMENT_FT: &str = "max_embedment_ft";
    pub const DEFAULT_FOOTING_DIAMETER_FT: &str = "default_footing_diameter_ft";

    // Baseplate and anchors (AISC 360-22, ACI 318-19)
    pub const PLATE_FY_KSI: &str = "plate_fy_ksi";
    pub const ANCHOR_FU_KSI: &str = "anchor_fu_ksi";
    pub const WELD_FEXX_KSI: &str = "weld_fexx_ksi";
    pub const PHI_ANCHOR_TENSION: &str = "phi_anchor_tension";
    pub const PHI_ANCHOR_SHEAR: &str = "phi_anchor_shear";
    pub const PHI_BREAKOUT: &str = "phi_concrete_breakout";
    pub const BREAKOUT_KC: &str = "breakout_kc";
    pub const ANCHOR_EMBED_RATIO: &str = "anchor_embed_ratio";
    pub const PHI_WELD: &str = "phi_weld";
    pub const PHI_BEARING: &str = "phi_bearing";
    pub const INTERACTION_LIMIT: &str = "anchor_interaction_limit";
    pub const MIN_PLATE_THICKNESS_IN: &str = "min_plate_thickness_in";
    pub const EDGE_DISTANCE_RATIO: &str = "edge_distance_ratio";
    pub const POLE_CLEARANCE_IN: &str = "pole_clearance_in";
    pub const DEFAULT_CONCRETE_FC_PSI: &str = "default_concrete_fc_psi";
    pub const STEEL_DENSITY_PCI: &str = "steel_density_pci";

    // Cost model
    pub const PLATE_COST_PER_LB: &str = "plate_cost_per_lb";
    pub const ANCHOR_COST_PER_BOLT: &str = "anchor_cost_per_bolt";
    pub const WELD_COST_PER_IN: &str = "weld_cost_per_in";
    pub const POLE_COST_PER_LB_HSS_SQUARE: &str = "pole_cost_per_lb_hss_square";
    pub const POLE_COST_PER_LB_HSS_ROUND: &str = "pole_cost_per_lb_hss_round";
    pub const POLE_COST_PER_LB_PIPE: &str = "pole_cost_per_lb_pipe";

    // Reliability
    pub const TARGET_BETA: &str = "target_reliability_index";
}

/// Direction in which changing a constant produces a more conservative design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafeDirection {
    Increase,
    Decrease,
}

impl SafeDirection {
    /// +1.0 for increase, -1.0 for decrease
    pub fn sign(self) -> f64 {
        match self {
            SafeDirection::Increase => 1.0,
            SafeDirection::Decrease => -1.0,
        }
    }

    /// True if moving from `before` to `after` never goes against this direction
    pub fn permits(self, before: f64, after: f64) -> bool {
        (after - before) * self.sign() >= 0.0
    }
}

/// One constant with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantEntry {
    pub value: f64,
    /// Code reference or calibration note
    pub reference: String,
    /// Present only for calibration-tunable constants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_direction: Option<SafeDirection>,
}

/// A single immutable version of the constants table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantsTable {
    /// Version identifier recorded in every trace
    pub version: String,
    /// Version this one was derived from
    #[serde(default)]
    pub parent: Option<String>,
    /// When this version was published (None for the built-in table)
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Calibration report that produced this version
    #[serde(default)]
    pub source_report: Option<Uuid>,
    /// Free-form publication note
    #[serde(default)]
    pub note: String,
    entries: BTreeMap<String, ConstantEntry>,
}

static BUILTIN: Lazy<ConstantsTable> = Lazy::new(build_builtin);

impl ConstantsTable {
    /// The built-in table shipped with the engine
    pub fn builtin() -> ConstantsTable {
        BUILTIN.clone()
    }

    /// Look up a value. Missing keys are a data gap.
    pub fn get(&self, key: &str) -> CalcResult<f64> {
        self.entry(key).map(|e| e.value)
    }

    /// Look up an entry with its reference
    pub fn entry(&self, key: &str) -> CalcResult<&ConstantEntry> {
        self.entries
            .get(key)
            .ok_or_else(|| CalcError::constant_not_found(key, &self.version))
    }

    /// Iterate all entries in key order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ConstantEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys that calibration may adjust
    pub fn tunable_keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.safe_direction.is_some())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Derive a child table with some values replaced.
    ///
    /// Used by the store when publishing; the parent is left untouched.
    pub(crate) fn derive(
        &self,
        version: String,
        updates: &[(String, f64)],
        source_report: Option<Uuid>,
        note: String,
    ) -> CalcResult<ConstantsTable> {
        let mut entries = self.entries.clone();
        for (key, value) in updates {
            let entry = entries
                .get_mut(key)
                .ok_or_else(|| CalcError::constant_not_found(key, &self.version))?;
            entry.value = *value;
            entry.reference = format!("{} (calibrated in {})", base_reference(&entry.reference), version);
        }
        Ok(ConstantsTable {
            version,
            parent: Some(self.version.clone()),
            published_at: Some(Utc::now()),
            source_report,
            note,
            entries,
        })
    }

    /// Table with a single value overridden, for what-if evaluation during tuning.
    pub fn with_override(&self, key: &str, value: f64) -> CalcResult<ConstantsTable> {
        let mut table = self.clone();
        let entry = table
            .entries
            .get_mut(key)
            .ok_or_else(|| CalcError::constant_not_found(key, &self.version))?;
        entry.value = value;
        table.version = format!("{}~{}={}", self.version, key, value);
        Ok(table)
    }
}

fn base_reference(reference: &str) -> &str {
    reference
        .split(" (calibrated in ")
        .next()
        .unwrap_or(reference)
}

fn build_builtin() -> ConstantsTable {
    use keys::*;
    use SafeDirection::{Decrease, Increase};

    let rows: &[(&str, f64, &str, Option<SafeDirection>)] = &[
        (VELOCITY_PRESSURE_COEFF, 0.00256, "ASCE 7-22 Eq. 26.10-1", None),
        (KD, 0.85, "ASCE 7-22 Table 26.6-1 (solid freestanding signs)", None),
        (KZT, 1.0, "ASCE 7-22 26.8 (flat terrain)", None),
        (KE, 1.0, "ASCE 7-22 Table 26.9-1 (sea level)", None),
        (GUST_FACTOR, 0.85, "ASCE 7-22 26.11.1 (rigid structure)", Some(Increase)),
        (FORCE_COEFFICIENT, 1.2, "ASCE 7-22 Fig. 29.3-1 (flat sign)", Some(Increase)),
        (WIND_LOAD_FACTOR, 1.0, "ASCE 7-22 2.3.1 (LRFD wind)", Some(Increase)),
        (WIND_SPEED_MAX_MPH, 200.0, "ASCE 7-22 Fig. 26.5-1 (mapped range)", None),
        (HEIGHT_MAX_FT, 100.0, "Validated range of this engine", None),
        (IMPORTANCE_I, 0.87, "Risk category I wind factor", None),
        (IMPORTANCE_II, 1.0, "Risk category II wind factor", None),
        (IMPORTANCE_III, 1.15, "Risk category III wind factor", None),
        (IMPORTANCE_IV, 1.15, "Risk category IV wind factor", None),
        (PHI_BENDING, 0.9, "AISC 360-22 F1", None),
        (CANTILEVER_K, 2.1, "AISC 360-22 Comm. App. 7 (flagpole)", None),
        (SLENDERNESS_LIMIT, 200.0, "AISC 360-22 E2 user note", None),
        (IBC_COEFF_A, 2.34, "IBC 2024 Eq. 18-1", None),
        (IBC_COEFF_DEPTH, 4.36, "IBC 2024 Eq. 18-1", None),
        (LATERAL_BEARING_RATIO, 0.05, "IBC 2024 Table 1806.2 (lateral per ft / vertical)", Some(Decrease)),
        (ISOLATED_POLE_INCREASE, 2.0, "IBC 2024 1806.3.4", Some(Decrease)),
        (LATERAL_BEARING_MAX_MULTIPLE, 15.0, "IBC 2024 Table 1806.2 note b", None),
        (FOUNDATION_SAFETY_FACTOR, 1.5, "Overturning safety factor", Some(Increase)),
        (MIN_EMBEDMENT_FT, 2.0, "Minimum embedment", None),
        (MAX_EMBEDMENT_FT, 15.0, "Maximum embedment before engineering review", None),
        (DEFAULT_FOOTING_DIAMETER_FT, 3.0, "Typical drilled pier diameter", None),
        (PLATE_FY_KSI, 36.0, "ASTM A36", None),
        (ANCHOR_FU_KSI, 58.0, "ASTM F1554 Gr. 36", None),
        (WELD_FEXX_KSI, 70.0, "E70 electrode", None),
        (PHI_ANCHOR_TENSION, 0.75, "ACI 318-19 17.5.3 (ductile steel)", None),
        (PHI_ANCHOR_SHEAR, 0.65, "ACI 318-19 17.5.3 (ductile steel)", None),
        (PHI_BREAKOUT, 0.70, "ACI 318-19 17.5.3 (cast-in, condition B)", None),
        (BREAKOUT_KC, 24.0, "ACI 318-19 17.6.2.2.1 (cast-in)", None),
        (ANCHOR_EMBED_RATIO, 12.0, "Embedment / anchor diameter", None),
        (PHI_WELD, 0.75, "AISC 360-22 J2.4", None),
        (PHI_BEARING, 0.65, "AISC 360-22 J8", None),
        (INTERACTION_LIMIT, 1.2, "ACI 318-19 17.8.3", None),
        (MIN_PLATE_THICKNESS_IN, 0.5, "Minimum baseplate thickness", None),
        (EDGE_DISTANCE_RATIO, 1.5, "AISC 360-22 Table J3.4 (approx.)", None),
        (POLE_CLEARANCE_IN, 0.5, "Wrench clearance from pole face", None),
        (DEFAULT_CONCRETE_FC_PSI, 3000.0, "Normal-weight concrete", None),
        (STEEL_DENSITY_PCI, 0.2836, "Steel unit weight (490 pcf)", None),
        (PLATE_COST_PER_LB, 2.0, "Fabricated plate", None),
        (ANCHOR_COST_PER_BOLT, 5.0, "Per 3/4 in anchor, scales with area", None),
        (WELD_COST_PER_IN, 0.5, "Per inch of 1/4 in fillet, scales with area", None),
        (POLE_COST_PER_LB_HSS_SQUARE, 1.10, "Square HSS supply", None),
        (POLE_COST_PER_LB_HSS_ROUND, 1.25, "Round HSS supply", None),
        (POLE_COST_PER_LB_PIPE, 1.00, "Pipe supply", None),
        (TARGET_BETA, 3.5, "ASCE 7-22 Table 1.3-1 (RC II, not sudden)", None),
    ];

    let entries = rows
        .iter()
        .map(|(key, value, reference, dir)| {
            (
                key.to_string(),
                ConstantEntry {
                    value: *value,
                    reference: reference.to_string(),
                    safe_direction: *dir,
                },
            )
        })
        .collect();

    ConstantsTable {
        version: BUILTIN_CONSTANTS_VERSION.to_string(),
        parent: None,
        published_at: None,
        source_report: None,
        note: "Built-in constants".to_string(),
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_values() {
        let table = ConstantsTable::builtin();
        assert_eq!(table.version, BUILTIN_CONSTANTS_VERSION);
        assert_eq!(table.get(keys::GUST_FACTOR).unwrap(), 0.85);
        assert_eq!(table.get(keys::FORCE_COEFFICIENT).unwrap(), 1.2);
        assert_eq!(table.get(keys::IBC_COEFF_DEPTH).unwrap(), 4.36);
    }

    #[test]
    fn test_missing_key_is_data_gap() {
        let table = ConstantsTable::builtin();
        let err = table.get("unknown_key").unwrap_err();
        assert_eq!(err.error_code(), "CONSTANT_NOT_FOUND");
    }

    #[test]
    fn test_tunable_keys_have_directions() {
        let table = ConstantsTable::builtin();
        let tunable = table.tunable_keys();
        assert!(tunable.contains(&keys::LATERAL_BEARING_RATIO));
        assert!(!tunable.contains(&keys::KD));
    }

    #[test]
    fn test_safe_direction_permits() {
        assert!(SafeDirection::Decrease.permits(0.05, 0.04));
        assert!(SafeDirection::Decrease.permits(0.05, 0.05));
        assert!(!SafeDirection::Decrease.permits(0.05, 0.06));
        assert!(SafeDirection::Increase.permits(1.2, 1.3));
    }

    #[test]
    fn test_derive_leaves_parent_untouched() {
        let parent = ConstantsTable::builtin();
        let child = parent
            .derive(
                "2024.1+cal1".to_string(),
                &[(keys::LATERAL_BEARING_RATIO.to_string(), 0.045)],
                None,
                "test".to_string(),
            )
            .unwrap();
        assert_eq!(parent.get(keys::LATERAL_BEARING_RATIO).unwrap(), 0.05);
        assert_eq!(child.get(keys::LATERAL_BEARING_RATIO).unwrap(), 0.045);
        assert_eq!(child.parent.as_deref(), Some(BUILTIN_CONSTANTS_VERSION));
        assert!(child
            .entry(keys::LATERAL_BEARING_RATIO)
            .unwrap()
            .reference
            .contains("calibrated in 2024.1+cal1"));
    }

    #[test]
    fn test_table_json_roundtrip() {
        let table = ConstantsTable::builtin();
        let json = serde_json::to_string(&table).unwrap();
        let back: ConstantsTable = serde_json::from_str(&json).unwrap();
        assert_eq!(table, back);
    }
}
