//! # signcalc_core - Sign Structure Design Engine
//!
//! `signcalc_core` designs single-pole sign structures: wind load on the
//! cabinets, the lightest passing support pole, and a direct-burial or base
//! plate foundation. Every answer comes back in an [`Envelope`] with its
//! assumptions, a confidence score and a reproducibility trace. All inputs
//! and outputs are JSON-serializable.
//!
//! ## Design Philosophy
//!
//! - **Deterministic**: same request, same constants version, same answer
//!   (optimizers are seeded)
//! - **Honest**: missing data abstains, infeasible is an outcome, not a guess
//! - **Versioned**: solvers run against a pinned [`StandardsSnapshot`]
//! - **Rich Errors**: structured error types and diagnostics, not strings
//!
//! ## Quick Start
//!
//! ```rust
//! use signcalc_core::engine::{DesignRequest, FoundationRequest, SiteInput};
//! use signcalc_core::loads::Cabinet;
//!
//! let request = DesignRequest {
//!     label: "Pylon".to_string(),
//!     site: SiteInput {
//!         wind_speed_mph: Some(115.0),
//!         exposure: Some("C".to_string()),
//!         risk_category: Some("II".to_string()),
//!         soil_bearing_psf: Some(3000.0),
//!     },
//!     clearance_ft: Some(12.0),
//!     cabinets: vec![Cabinet { width_ft: 10.0, height_ft: 8.0, weight_psf: 8.0 }],
//!     ..DesignRequest::default()
//! };
//! let envelope = signcalc_core::solve(&request).unwrap();
//! assert!(envelope.is_feasible());
//! println!("{}", serde_json::to_string_pretty(&envelope).unwrap());
//! ```
//!
//! ## Modules
//!
//! - [`standards`] - section catalog, versioned constants, constants store
//! - [`loads`] - sign geometry and ASCE 7 wind load
//! - [`section_filter`] - catalog scan for passing poles
//! - [`foundation`] - embedment depth and base plate checks
//! - [`optimize`] - genetic and Pareto search
//! - [`calibration`] - uncertainty propagation and constant tuning
//! - [`engine`] - the end-to-end pipeline
//! - [`batch`] - cached, parallel batch runs
//! - [`envelope`] / [`diagnostics`] - result wrapper and failure reports
//! - [`settings`] - engine settings document
//! - [`units`] - type-safe unit wrappers
//! - [`errors`] - structured error types
//! - [`file_io`] - atomic saves and locking for the constants history

pub mod batch;
pub mod calibration;
pub mod diagnostics;
pub mod engine;
pub mod envelope;
pub mod errors;
pub mod file_io;
pub mod foundation;
pub mod loads;
pub mod optimize;
pub mod section_filter;
pub mod settings;
pub mod standards;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use batch::{BatchOrchestrator, BatchReport, BatchSettings};
pub use diagnostics::{Diagnostic, Severity};
pub use engine::{solve, DesignEngine, DesignRequest, DesignResult};
pub use envelope::{Envelope, Outcome};
pub use errors::{CalcError, CalcResult};
pub use file_io::{load_constants_store, save_constants_store, FileLock};
pub use settings::EngineSettings;
pub use standards::StandardsSnapshot;
