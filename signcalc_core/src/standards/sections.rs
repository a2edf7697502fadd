//! Section Properties Catalog (AISC)
//!
//! Hollow steel sections used as sign support poles: square HSS, round HSS
//! and standard/extra-strong pipe.
//!
//! ## Data Source
//!
//! Properties are a subset of the AISC Shapes Database v16.0, shipped inside
//! the binary from `assets/sections/catalog.csv` so the catalog is available
//! without touching the filesystem at solve time. Yield strengths are the
//! customary grades for each family (A500 Gr. B for HSS, A53 Gr. B for pipe).
//!
//! ## Example
//!
//! ```rust
//! use signcalc_core::standards::sections::{SectionCatalog, SectionFamily};
//!
//! let catalog = SectionCatalog::builtin().unwrap();
//! let pipe = catalog.lookup("pipe8std").unwrap();
//! assert_eq!(pipe.family, SectionFamily::Pipe);
//! assert!(pipe.sx_in3 > 15.0);
//! ```

use std::collections::HashMap;
use std::str::FromStr;

use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};

/// Version tag for the embedded catalog. Recorded in every trace.
pub const BUILTIN_CATALOG_VERSION: &str = "aisc-v16-signpoles-1";

#[derive(RustEmbed)]
#[folder = "assets/sections/"]
struct SectionAssets;

/// Section family used for the family constraint in queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionFamily {
    /// Square hollow structural section
    HssSquare,
    /// Round hollow structural section
    HssRound,
    /// Pipe (standard and extra strong)
    Pipe,
}

impl SectionFamily {
    /// All families for iteration
    pub const ALL: [SectionFamily; 3] = [
        SectionFamily::HssSquare,
        SectionFamily::HssRound,
        SectionFamily::Pipe,
    ];

    /// Parse from the catalog family code
    pub fn from_code(code: &str) -> CalcResult<Self> {
        match code.trim().to_uppercase().as_str() {
            "HSS_SQUARE" | "HSS-SQUARE" | "TUBE" => Ok(SectionFamily::HssSquare),
            "HSS_ROUND" | "HSS-ROUND" => Ok(SectionFamily::HssRound),
            "PIPE" => Ok(SectionFamily::Pipe),
            _ => Err(CalcError::unknown_category(
                "family",
                code,
                &["HSS_SQUARE", "HSS_ROUND", "PIPE"],
            )),
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            SectionFamily::HssSquare => "HSS Square",
            SectionFamily::HssRound => "HSS Round",
            SectionFamily::Pipe => "Pipe",
        }
    }

    /// Round sections weld and bear on a circular perimeter
    pub fn is_round(&self) -> bool {
        matches!(self, SectionFamily::HssRound | SectionFamily::Pipe)
    }
}

impl std::fmt::Display for SectionFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A catalog section with the properties the pole and baseplate checks use.
///
/// All dimensional values are in inches, in², in³, in⁴.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// AISC Manual label (e.g., "HSS8X8X1/4", "PIPE8STD")
    pub designation: String,

    /// Section family
    pub family: SectionFamily,

    /// Nominal weight per linear foot (lb/ft)
    pub weight_plf: f64,

    /// Cross-sectional area (in²)
    pub area_in2: f64,

    /// Moment of inertia (in⁴)
    pub ix_in4: f64,

    /// Elastic section modulus (in³)
    pub sx_in3: f64,

    /// Plastic section modulus (in³)
    pub zx_in3: f64,

    /// Radius of gyration (in)
    pub r_in: f64,

    /// Outside width (square) or outside diameter (round)
    pub outer_dim_in: f64,

    /// Design wall thickness (in)
    pub wall_in: f64,

    /// Specified minimum yield stress (ksi)
    pub fy_ksi: f64,
}

impl Section {
    /// Slenderness K·L/r for an unbraced length in inches
    pub fn slenderness(&self, k: f64, unbraced_length_in: f64) -> f64 {
        k * unbraced_length_in / self.r_in
    }

    /// Perimeter used for the base weld (in)
    pub fn perimeter_in(&self) -> f64 {
        if self.family.is_round() {
            std::f64::consts::PI * self.outer_dim_in
        } else {
            4.0 * self.outer_dim_in
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:.2} plf, Sx = {:.2} in³)",
            self.designation, self.weight_plf, self.sx_in3
        )
    }
}

/// Immutable section catalog.
///
/// Sections are stored sorted by designation so every scan has a stable order.
#[derive(Debug, Clone)]
pub struct SectionCatalog {
    /// Catalog version recorded in traces
    pub version: String,

    sections: Vec<Section>,

    index: HashMap<String, usize>,
}

impl SectionCatalog {
    /// Build a catalog from sections, rejecting duplicates and bad values.
    pub fn from_sections(version: impl Into<String>, mut sections: Vec<Section>) -> CalcResult<Self> {
        sections.sort_by(|a, b| a.designation.cmp(&b.designation));
        let mut index = HashMap::with_capacity(sections.len());
        for (i, s) in sections.iter().enumerate() {
            for (name, value) in [
                ("weight_plf", s.weight_plf),
                ("sx_in3", s.sx_in3),
                ("r_in", s.r_in),
                ("outer_dim_in", s.outer_dim_in),
                ("wall_in", s.wall_in),
                ("fy_ksi", s.fy_ksi),
            ] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(CalcError::invalid_input(
                        format!("{}.{}", s.designation, name),
                        value.to_string(),
                        "Catalog properties must be positive",
                    ));
                }
            }
            if index.insert(s.designation.to_uppercase(), i).is_some() {
                return Err(CalcError::invalid_input(
                    "designation",
                    s.designation.clone(),
                    "Duplicate designation in catalog",
                ));
            }
        }
        Ok(SectionCatalog {
            version: version.into(),
            sections,
            index,
        })
    }

    /// Parse the catalog CSV format.
    ///
    /// Columns: `Designation,Family,W,A,Ix,Sx,Zx,r,Dim,t,Fy`.
    pub fn from_csv(version: impl Into<String>, source: &str, csv: &str) -> CalcResult<Self> {
        let mut lines = csv.lines().enumerate();
        let (_, header) = lines
            .next()
            .ok_or_else(|| CalcError::file_error("read", source, "CSV is empty"))?;

        let headers: Vec<&str> = header.split(',').map(str::trim).collect();
        let col = |name: &str| -> CalcResult<usize> {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| CalcError::file_error("parse", source, format!("Missing '{}' column", name)))
        };

        let idx_des = col("Designation")?;
        let idx_family = col("Family")?;
        let idx_w = col("W")?;
        let idx_a = col("A")?;
        let idx_ix = col("Ix")?;
        let idx_sx = col("Sx")?;
        let idx_zx = col("Zx")?;
        let idx_r = col("r")?;
        let idx_dim = col("Dim")?;
        let idx_t = col("t")?;
        let idx_fy = col("Fy")?;

        let mut sections = Vec::new();
        for (line_no, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            let field = |i: usize| -> CalcResult<&str> {
                fields.get(i).copied().ok_or_else(|| {
                    CalcError::file_error("parse", source, format!("Line {} is missing columns", line_no + 1))
                })
            };
            let number = |i: usize| -> CalcResult<f64> {
                let raw = field(i)?;
                parse_f64(raw).ok_or_else(|| {
                    CalcError::file_error(
                        "parse",
                        source,
                        format!("Line {}: '{}' is not a number", line_no + 1, raw),
                    )
                })
            };

            sections.push(Section {
                designation: field(idx_des)?.trim().to_uppercase(),
                family: SectionFamily::from_code(field(idx_family)?)?,
                weight_plf: number(idx_w)?,
                area_in2: number(idx_a)?,
                ix_in4: number(idx_ix)?,
                sx_in3: number(idx_sx)?,
                zx_in3: number(idx_zx)?,
                r_in: number(idx_r)?,
                outer_dim_in: number(idx_dim)?,
                wall_in: number(idx_t)?,
                fy_ksi: number(idx_fy)?,
            });
        }

        Self::from_sections(version, sections)
    }

    /// Load the catalog embedded in the binary.
    pub fn builtin() -> CalcResult<Self> {
        let file = SectionAssets::get("catalog.csv").ok_or_else(|| {
            CalcError::file_error("embed", "assets/sections/catalog.csv", "Embedded catalog missing")
        })?;
        let text = std::str::from_utf8(file.data.as_ref())
            .map_err(|e| CalcError::file_error("decode", "assets/sections/catalog.csv", e.to_string()))?;
        Self::from_csv(BUILTIN_CATALOG_VERSION, "assets/sections/catalog.csv", text)
    }

    /// Look up a section by designation (case-insensitive)
    pub fn lookup(&self, designation: &str) -> CalcResult<&Section> {
        self.index
            .get(&designation.trim().to_uppercase())
            .and_then(|&i| self.sections.get(i))
            .ok_or_else(|| CalcError::section_not_found(designation, &self.version))
    }

    /// All sections in designation order
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Sections of one family in designation order
    pub fn of_family(&self, family: SectionFamily) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(move |s| s.family == family)
    }

    /// Largest elastic section modulus available, optionally within a family
    pub fn max_sx(&self, family: Option<SectionFamily>) -> Option<&Section> {
        self.sections
            .iter()
            .filter(|s| family.map_or(true, |f| s.family == f))
            .max_by(|a, b| a.sx_in3.total_cmp(&b.sx_in3))
    }

    /// Number of sections in the catalog
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

fn parse_f64(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return None;
    }
    f64::from_str(trimmed).ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = SectionCatalog::builtin().unwrap();
        assert_eq!(catalog.version, BUILTIN_CATALOG_VERSION);
        assert!(catalog.len() >= 25);
        for family in SectionFamily::ALL {
            assert!(catalog.of_family(family).count() > 0, "no {:?} sections", family);
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = SectionCatalog::builtin().unwrap();
        let a = catalog.lookup("HSS8X8X1/4").unwrap();
        let b = catalog.lookup("hss8x8x1/4").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.family, SectionFamily::HssSquare);
        assert!((a.sx_in3 - 17.7).abs() < 1e-9);
    }

    #[test]
    fn test_lookup_missing_is_data_gap() {
        let catalog = SectionCatalog::builtin().unwrap();
        let err = catalog.lookup("W14X90").unwrap_err();
        assert_eq!(err.error_code(), "SECTION_NOT_FOUND");
    }

    #[test]
    fn test_sections_sorted_by_designation() {
        let catalog = SectionCatalog::builtin().unwrap();
        let names: Vec<&str> = catalog.sections().iter().map(|s| s.designation.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_csv_rejects_bad_rows() {
        let csv = "Designation,Family,W,A,Ix,Sx,Zx,r,Dim,t,Fy\nX1,PIPE,abc,1,1,1,1,1,1,1,35\n";
        assert!(SectionCatalog::from_csv("t", "inline", csv).is_err());

        let csv = "Designation,Family,W,A,Ix,Sx,Zx,r,Dim,t,Fy\nX1,BEAM,1,1,1,1,1,1,1,1,35\n";
        let err = SectionCatalog::from_csv("t", "inline", csv).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_CATEGORY");
    }

    #[test]
    fn test_duplicate_designation_rejected() {
        let csv = "Designation,Family,W,A,Ix,Sx,Zx,r,Dim,t,Fy\n\
                   P1,PIPE,1,1,1,1,1,1,1,1,35\n\
                   p1,PIPE,1,1,1,1,1,1,1,1,35\n";
        assert!(SectionCatalog::from_csv("t", "inline", csv).is_err());
    }

    #[test]
    fn test_perimeter() {
        let catalog = SectionCatalog::builtin().unwrap();
        let square = catalog.lookup("HSS6X6X1/4").unwrap();
        assert!((square.perimeter_in() - 24.0).abs() < 1e-9);
        let round = catalog.lookup("PIPE6STD").unwrap();
        assert!((round.perimeter_in() - std::f64::consts::PI * 6.625).abs() < 1e-9);
    }

    #[test]
    fn test_max_sx() {
        let catalog = SectionCatalog::builtin().unwrap();
        assert_eq!(catalog.max_sx(None).unwrap().designation, "HSS12X12X1/2");
        assert_eq!(
            catalog.max_sx(Some(SectionFamily::Pipe)).unwrap().designation,
            "PIPE12XS"
        );
    }
}
