//! # Standards Tables
//!
//! Read-only reference data the solvers run against:
//!
//! - [`sections`] - AISC hollow section catalog (embedded CSV)
//! - [`constants`] - versioned code and calibration constants
//! - [`store`] - append-only history of published constants versions
//!
//! Solvers never reach for globals. They take a [`StandardsSnapshot`], which
//! pins one catalog and one constants version for the whole computation.

pub mod constants;
pub mod sections;
pub mod store;

use std::sync::Arc;

use serde::Serialize;

use crate::errors::CalcResult;
use constants::ConstantsTable;
use sections::SectionCatalog;

// ============================================================================
// Code References
// ============================================================================

/// Reference to a design code or standard, cited in traces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum CodeReference {
    /// ASCE 7 - Minimum Design Loads for Buildings
    ASCE7 { year: u16, section: &'static str },
    /// AISC 360 - Specification for Structural Steel Buildings
    AISC360 { year: u16, chapter: &'static str },
    /// ACI 318 - Building Code Requirements for Structural Concrete
    ACI318 { year: u16, section: &'static str },
    /// International Building Code
    IBC { year: u16, section: &'static str },
}

impl CodeReference {
    /// Format the reference for traces and reports
    pub fn citation(&self) -> String {
        match self {
            CodeReference::ASCE7 { year, section } => {
                format!("ASCE 7-{} Section {}", year % 100, section)
            }
            CodeReference::AISC360 { year, chapter } => {
                format!("AISC 360-{} Chapter {}", year % 100, chapter)
            }
            CodeReference::ACI318 { year, section } => {
                format!("ACI 318-{} Section {}", year % 100, section)
            }
            CodeReference::IBC { year, section } => format!("IBC {} Section {}", year, section),
        }
    }
}

pub const WIND_VELOCITY_PRESSURE: CodeReference = CodeReference::ASCE7 { year: 2022, section: "26.10" };
pub const WIND_SIGN_FORCE: CodeReference = CodeReference::ASCE7 { year: 2022, section: "29.3" };
pub const POLE_FLEXURE: CodeReference = CodeReference::AISC360 { year: 2022, chapter: "F" };
pub const POLE_EMBEDMENT: CodeReference = CodeReference::IBC { year: 2024, section: "1807.3.2.1" };
pub const LATERAL_BEARING: CodeReference = CodeReference::IBC { year: 2024, section: "1806.3.4" };
pub const ANCHOR_DESIGN: CodeReference = CodeReference::ACI318 { year: 2019, section: "17" };
pub const WELD_DESIGN: CodeReference = CodeReference::AISC360 { year: 2022, chapter: "J" };

// ============================================================================
// Snapshot
// ============================================================================

/// One catalog plus one constants version, shared cheaply between solves.
#[derive(Debug, Clone)]
pub struct StandardsSnapshot {
    pub catalog: Arc<SectionCatalog>,
    pub constants: Arc<ConstantsTable>,
}

impl StandardsSnapshot {
    pub fn new(catalog: Arc<SectionCatalog>, constants: Arc<ConstantsTable>) -> Self {
        StandardsSnapshot { catalog, constants }
    }

    /// Embedded catalog with the built-in constants
    pub fn builtin() -> CalcResult<Self> {
        Ok(StandardsSnapshot {
            catalog: Arc::new(SectionCatalog::builtin()?),
            constants: Arc::new(ConstantsTable::builtin()),
        })
    }

    /// Same catalog, different constants version
    pub fn with_constants(&self, constants: Arc<ConstantsTable>) -> Self {
        StandardsSnapshot {
            catalog: Arc::clone(&self.catalog),
            constants,
        }
    }

    pub fn constants_version(&self) -> &str {
        &self.constants.version
    }

    pub fn catalog_version(&self) -> &str {
        &self.catalog.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citations() {
        assert_eq!(WIND_VELOCITY_PRESSURE.citation(), "ASCE 7-22 Section 26.10");
        assert_eq!(POLE_EMBEDMENT.citation(), "IBC 2024 Section 1807.3.2.1");
        assert_eq!(POLE_FLEXURE.citation(), "AISC 360-22 Chapter F");
    }

    #[test]
    fn test_snapshot_versions() {
        let snap = StandardsSnapshot::builtin().unwrap();
        assert_eq!(snap.constants_version(), constants::BUILTIN_CONSTANTS_VERSION);
        assert_eq!(snap.catalog_version(), sections::BUILTIN_CATALOG_VERSION);
    }
}
