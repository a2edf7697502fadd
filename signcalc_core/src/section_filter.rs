//! # Section Filter
//!
//! Linear scan of the section catalog for support poles that satisfy a
//! strength requirement and a slenderness bound.
//!
//! ## Rules
//!
//! - Strength: `Sx ≥ Sx,req`. A moment requirement is converted per section
//!   with its own yield stress, `Sx,req = Mu / (φb·Fy)`.
//! - Slenderness: `K·L/r ≤ limit` when an unbraced length is given.
//! - Order: lightest first, then designation, so equal inputs always give
//!   the same list.
//!
//! An empty list is a valid answer ("no section in the catalog works"), not
//! an error.
//!
//! ## Example
//!
//! ```rust
//! use signcalc_core::section_filter::{filter_sections, SectionQuery, StrengthRequirement};
//! use signcalc_core::standards::StandardsSnapshot;
//!
//! let snap = StandardsSnapshot::builtin().unwrap();
//! let query = SectionQuery::new(StrengthRequirement::SectionModulus { sx_in3: 10.0 });
//! let result = filter_sections(&query, &snap.catalog, &snap.constants).unwrap();
//! assert!(result.candidates.iter().all(|c| c.section.sx_in3 >= 10.0));
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{ensure_positive, CalcResult};
use crate::standards::constants::{keys, ConstantsTable};
use crate::standards::sections::{Section, SectionCatalog, SectionFamily};
use crate::units::{Feet, Inches};

/// What the pole must resist
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrengthRequirement {
    /// Required elastic section modulus (in³)
    SectionModulus { sx_in3: f64 },
    /// Required factored moment (kip-in)
    Moment { mu_kipin: f64 },
}

/// A section query.
///
/// ## JSON Example
///
/// ```json
/// {
///   "requirement": { "kind": "moment", "mu_kipin": 600.0 },
///   "family": "hss_square",
///   "unbraced_length_ft": 20.0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionQuery {
    pub requirement: StrengthRequirement,
    /// Restrict to one family
    #[serde(default)]
    pub family: Option<SectionFamily>,
    /// Unbraced (cantilever) length; no slenderness check when absent
    #[serde(default)]
    pub unbraced_length_ft: Option<f64>,
    /// Effective length factor override
    #[serde(default)]
    pub k_factor: Option<f64>,
    /// Slenderness limit override
    #[serde(default)]
    pub slenderness_limit: Option<f64>,
}

impl SectionQuery {
    pub fn new(requirement: StrengthRequirement) -> Self {
        SectionQuery {
            requirement,
            family: None,
            unbraced_length_ft: None,
            k_factor: None,
            slenderness_limit: None,
        }
    }

    pub fn with_family(mut self, family: SectionFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn with_unbraced_length(mut self, length_ft: f64) -> Self {
        self.unbraced_length_ft = Some(length_ft);
        self
    }

    pub fn validate(&self) -> CalcResult<()> {
        match self.requirement {
            StrengthRequirement::SectionModulus { sx_in3 } => {
                ensure_positive("requirement.sx_in3", sx_in3)?;
            }
            StrengthRequirement::Moment { mu_kipin } => {
                ensure_positive("requirement.mu_kipin", mu_kipin)?;
            }
        }
        if let Some(l) = self.unbraced_length_ft {
            ensure_positive("unbraced_length_ft", l)?;
        }
        if let Some(k) = self.k_factor {
            ensure_positive("k_factor", k)?;
        }
        if let Some(limit) = self.slenderness_limit {
            ensure_positive("slenderness_limit", limit)?;
        }
        Ok(())
    }
}

/// A section that passed the filter, with its query-specific checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionCandidate {
    #[serde(flatten)]
    pub section: Section,
    /// Required Sx for this section's Fy (in³)
    pub required_sx_in3: f64,
    /// Design flexural strength φb·Fy·Sx (kip-in)
    pub phi_mn_kipin: f64,
    /// Demand / capacity
    pub utilization: f64,
    /// K·L/r, when an unbraced length was given
    pub slenderness: Option<f64>,
}

/// Strongest section the catalog offers, reported when nothing passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosestAlternative {
    pub designation: String,
    pub sx_in3: f64,
    /// Required / available
    pub shortfall_ratio: f64,
}

/// Ordered filter output plus scan statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub candidates: Vec<SectionCandidate>,
    pub scanned: usize,
    pub rejected_strength: usize,
    pub rejected_slenderness: usize,
    /// Only present when `candidates` is empty
    pub closest: Option<ClosestAlternative>,
}

impl FilterResult {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Lightest passing section
    pub fn lightest(&self) -> Option<&SectionCandidate> {
        self.candidates.first()
    }
}

/// Filter and rank the catalog.
pub fn filter_sections(
    query: &SectionQuery,
    catalog: &SectionCatalog,
    constants: &ConstantsTable,
) -> CalcResult<FilterResult> {
    query.validate()?;

    let phi = constants.get(keys::PHI_BENDING)?;
    let k = match query.k_factor {
        Some(k) => k,
        None => constants.get(keys::CANTILEVER_K)?,
    };
    let limit = match query.slenderness_limit {
        Some(l) => l,
        None => constants.get(keys::SLENDERNESS_LIMIT)?,
    };
    let length_in = query
        .unbraced_length_ft
        .map(|l| Inches::from(Feet(l)).value());

    let mut scanned = 0;
    let mut rejected_strength = 0;
    let mut rejected_slenderness = 0;
    let mut candidates = Vec::new();
    let mut nearest: Option<ClosestAlternative> = None;

    for section in catalog.sections() {
        if query.family.map_or(false, |f| f != section.family) {
            continue;
        }
        scanned += 1;

        let required_sx = match query.requirement {
            StrengthRequirement::SectionModulus { sx_in3 } => sx_in3,
            StrengthRequirement::Moment { mu_kipin } => mu_kipin / (phi * section.fy_ksi),
        };
        let phi_mn = phi * section.fy_ksi * section.sx_in3;

        if section.sx_in3 < required_sx {
            rejected_strength += 1;
            let shortfall = required_sx / section.sx_in3;
            let closer = nearest
                .as_ref()
                .map_or(true, |c| shortfall < c.shortfall_ratio);
            if closer {
                nearest = Some(ClosestAlternative {
                    designation: section.designation.clone(),
                    sx_in3: section.sx_in3,
                    shortfall_ratio: shortfall,
                });
            }
            continue;
        }

        let slenderness = length_in.map(|l| section.slenderness(k, l));
        if slenderness.map_or(false, |s| s > limit) {
            rejected_slenderness += 1;
            continue;
        }

        candidates.push(SectionCandidate {
            section: section.clone(),
            required_sx_in3: required_sx,
            phi_mn_kipin: phi_mn,
            utilization: required_sx / section.sx_in3,
            slenderness,
        });
    }

    candidates.sort_by(|a, b| {
        a.section
            .weight_plf
            .total_cmp(&b.section.weight_plf)
            .then_with(|| a.section.designation.cmp(&b.section.designation))
    });

    let closest = if candidates.is_empty() { nearest } else { None };

    Ok(FilterResult {
        candidates,
        scanned,
        rejected_strength,
        rejected_slenderness,
        closest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standards::StandardsSnapshot;

    fn snap() -> StandardsSnapshot {
        StandardsSnapshot::builtin().unwrap()
    }

    #[test]
    fn test_modulus_filter_and_order() {
        let s = snap();
        let q = SectionQuery::new(StrengthRequirement::SectionModulus { sx_in3: 15.0 });
        let r = filter_sections(&q, &s.catalog, &s.constants).unwrap();
        assert!(!r.is_empty());
        assert!(r.candidates.iter().all(|c| c.section.sx_in3 >= 15.0));
        for pair in r.candidates.windows(2) {
            assert!(pair[0].section.weight_plf <= pair[1].section.weight_plf);
        }
        assert_eq!(r.lightest().unwrap().section.designation, "HSS8X8X1/4");
    }

    #[test]
    fn test_moment_uses_section_yield() {
        let s = snap();
        // 600 kip-in: Sx,req = 14.49 for Fy 46, 19.05 for Fy 35
        let q = SectionQuery::new(StrengthRequirement::Moment { mu_kipin: 600.0 })
            .with_family(SectionFamily::Pipe);
        let r = filter_sections(&q, &s.catalog, &s.constants).unwrap();
        let first = r.lightest().unwrap();
        assert_eq!(first.section.designation, "PIPE10STD");
        assert!((first.required_sx_in3 - 600.0 / (0.9 * 35.0)).abs() < 1e-9);
        assert!(first.utilization <= 1.0);
        assert!(first.phi_mn_kipin >= 600.0);
    }

    #[test]
    fn test_slenderness_excludes_small_radius() {
        let s = snap();
        let q = SectionQuery::new(StrengthRequirement::SectionModulus { sx_in3: 1.0 })
            .with_unbraced_length(20.0);
        let r = filter_sections(&q, &s.catalog, &s.constants).unwrap();
        // 2.1 * 240 / r <= 200  =>  r >= 2.52
        assert!(r.candidates.iter().all(|c| c.section.r_in >= 2.52));
        assert!(r.rejected_slenderness > 0);
        assert!(r.candidates.iter().all(|c| c.slenderness.unwrap() <= 200.0));
    }

    #[test]
    fn test_infeasible_requirement_is_empty_not_error() {
        let s = snap();
        let q = SectionQuery::new(StrengthRequirement::SectionModulus { sx_in3: 500.0 });
        let r = filter_sections(&q, &s.catalog, &s.constants).unwrap();
        assert!(r.is_empty());
        let closest = r.closest.unwrap();
        assert_eq!(closest.designation, "HSS12X12X1/2");
        assert!(closest.shortfall_ratio > 1.0);
    }

    #[test]
    fn test_invalid_requirement_rejected() {
        let s = snap();
        let q = SectionQuery::new(StrengthRequirement::SectionModulus { sx_in3: -1.0 });
        assert!(filter_sections(&q, &s.catalog, &s.constants).is_err());
        let q = SectionQuery::new(StrengthRequirement::Moment { mu_kipin: 100.0 }).with_unbraced_length(0.0);
        assert!(filter_sections(&q, &s.catalog, &s.constants).is_err());
    }
}
