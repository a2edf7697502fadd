//! Sign geometry and environmental loads.
//!
//! - [`geometry`] - validated cabinet stack and derived area/centroid/weight
//! - [`wind`] - ASCE 7-22 wind pressure, shear and moment at grade
//!
//! # Example
//!
//! ```
//! use signcalc_core::loads::geometry::{Cabinet, Geometry};
//! use signcalc_core::loads::wind::{compute_site_load, ExposureCategory, RiskCategory, SiteConditions};
//! use signcalc_core::standards::constants::ConstantsTable;
//!
//! let geometry = Geometry::new(12.0, vec![Cabinet { width_ft: 10.0, height_ft: 8.0, weight_psf: 8.0 }]).unwrap();
//! let site = SiteConditions {
//!     wind_speed_mph: 115.0,
//!     exposure: ExposureCategory::C,
//!     risk_category: RiskCategory::II,
//!     soil_bearing_psf: Some(3000.0),
//! };
//! let load = compute_site_load(&site, &geometry, &ConstantsTable::builtin()).unwrap();
//! assert!(load.moment_kipft > 0.0);
//! ```

pub mod geometry;
pub mod wind;

pub use geometry::{Cabinet, Geometry};
pub use wind::{compute_site_load, ExposureCategory, RiskCategory, SiteConditions, SiteLoad};
