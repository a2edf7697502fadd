//! # Failure-Mode Diagnostics
//!
//! Structured explanations for every way a computation can fail to produce
//! a trustworthy answer, with a remediation a user can act on.
//!
//! ## Scanners
//!
//! - [`scan_non_finite`] - NaN/Inf anywhere in a [`NumericFields`] value
//! - [`check_bounds`] - contradictory `min > max` constraints
//! - [`check_non_empty`] - empty discrete option sets
//! - [`non_convergence`] - solver stopped before converging
//! - [`from_error`] - classify a [`CalcError`]
//!
//! ## JSON Example
//!
//! ```json
//! {
//!   "check": "numeric_scan",
//!   "severity": "numeric_fault",
//!   "message": "Non-finite values in site_load",
//!   "offending_values": { "site_load.qz_psf": "NaN" },
//!   "remediation": "Check inputs for extreme or degenerate values ..."
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, ErrorClass};

/// What kind of problem a diagnostic describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The request is malformed or contradictory
    InputError,
    /// The solver could not finish within its limits
    SolverLimitation,
    /// Required reference data is missing
    DataGap,
    /// NaN or infinity appeared in a computation
    NumericFault,
}

/// One diagnostic record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Name of the check that produced this record
    pub check: String,
    pub severity: Severity,
    pub message: String,
    /// Field path to offending value
    #[serde(default)]
    pub offending_values: BTreeMap<String, String>,
    pub remediation: String,
}

impl Diagnostic {
    pub fn new(check: &str, severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            check: check.to_string(),
            severity,
            message: message.into(),
            offending_values: BTreeMap::new(),
            remediation: troubleshooting(check, severity).to_string(),
        }
    }

    pub fn with_value(mut self, path: impl Into<String>, value: impl ToString) -> Self {
        self.offending_values.insert(path.into(), value.to_string());
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = remediation.into();
        self
    }
}

// ============================================================================
// Troubleshooting Guide
// ============================================================================

/// Remediation text for a check, falling back to the severity's general advice.
pub fn troubleshooting(check: &str, severity: Severity) -> &'static str {
    match check {
        "missing_field" => "Provide the missing field; the engine never guesses required site or geometry data.",
        "section_filter" => {
            "No catalog section satisfies the demand. Reduce sign area or height, allow other section families, or add larger sections to the catalog."
        }
        "embedment_depth" => {
            "Required embedment exceeds the maximum. Increase the footing diameter, verify the soil bearing value, or refer the foundation for engineering review."
        }
        "depth_solver" => "Increase the iteration cap or coarsen the depth resolution in the depth settings.",
        "baseplate_optimizer" => {
            "No base plate in the fabrication options passes every check. Use a larger pole, a higher concrete strength, or refer for engineering review."
        }
        "bounds" => "A lower bound exceeds its upper bound. Correct the contradictory limits.",
        "empty_set" => "A discrete option set is empty. Supply at least one option.",
        "numeric_scan" => {
            "Check inputs for extreme or degenerate values (zero areas, huge speeds) that drive the computation to NaN or infinity."
        }
        "timeout" => "The request exceeded its time budget. Raise the budget or reduce optimizer population and generations.",
        "panic" => "The computation failed unexpectedly. Report the request with its trace.",
        _ => match severity {
            Severity::InputError => "Correct the highlighted input and resubmit.",
            Severity::SolverLimitation => "Relax solver settings or simplify the request, then resubmit.",
            Severity::DataGap => "Add the missing catalog or constants entry, or select a version that has it.",
            Severity::NumericFault => "Check the inputs for degenerate values.",
        },
    }
}

// ============================================================================
// Numeric Scan
// ============================================================================

/// Types that can list their numeric fields for NaN/Inf scanning
pub trait NumericFields {
    /// `(path, value)` for every numeric field, paths relative to `self`
    fn numeric_fields(&self) -> Vec<(String, f64)>;
}

/// Implement [`NumericFields`] from a list of `f64` fields.
#[macro_export]
macro_rules! impl_numeric_fields {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::diagnostics::NumericFields for $ty {
            fn numeric_fields(&self) -> Vec<(String, f64)> {
                vec![$((stringify!($field).to_string(), self.$field as f64)),+]
            }
        }
    };
}

impl<T: NumericFields> NumericFields for Vec<T> {
    fn numeric_fields(&self) -> Vec<(String, f64)> {
        self.iter()
            .enumerate()
            .flat_map(|(i, item)| {
                item.numeric_fields()
                    .into_iter()
                    .map(move |(path, v)| (format!("[{}].{}", i, path), v))
            })
            .collect()
    }
}

impl<T: NumericFields> NumericFields for Option<T> {
    fn numeric_fields(&self) -> Vec<(String, f64)> {
        self.as_ref().map(|v| v.numeric_fields()).unwrap_or_default()
    }
}

/// Report every non-finite field of `value` under `name`.
pub fn scan_non_finite<T: NumericFields + ?Sized>(name: &str, value: &T) -> Option<Diagnostic> {
    let bad: Vec<(String, f64)> = value
        .numeric_fields()
        .into_iter()
        .filter(|(_, v)| !v.is_finite())
        .collect();
    if bad.is_empty() {
        return None;
    }
    let mut diagnostic = Diagnostic::new(
        "numeric_scan",
        Severity::NumericFault,
        format!("Non-finite values in {}", name),
    );
    for (path, v) in bad {
        diagnostic = diagnostic.with_value(format!("{}.{}", name, path), v);
    }
    Some(diagnostic)
}

// ============================================================================
// Constraint Scanners
// ============================================================================

/// `min > max` is a contradiction
pub fn check_bounds(name: &str, min: f64, max: f64) -> Option<Diagnostic> {
    if min <= max {
        return None;
    }
    Some(
        Diagnostic::new("bounds", Severity::InputError, format!("{}: minimum exceeds maximum", name))
            .with_value(format!("{}.min", name), min)
            .with_value(format!("{}.max", name), max),
    )
}

pub fn check_non_empty(name: &str, len: usize) -> Option<Diagnostic> {
    (len == 0).then(|| {
        Diagnostic::new("empty_set", Severity::InputError, format!("{} has no options", name))
            .with_value(name, 0)
    })
}

/// Solver stopped at its iteration cap
pub fn non_convergence(solver: &str, iterations: u32, detail: impl Into<String>) -> Diagnostic {
    Diagnostic::new(solver, Severity::SolverLimitation, detail).with_value(format!("{}.iterations", solver), iterations)
}

/// Classify an error into a diagnostic
pub fn from_error(error: &CalcError) -> Diagnostic {
    let severity = match error.class() {
        ErrorClass::Validation => Severity::InputError,
        ErrorClass::DataGap => Severity::DataGap,
        ErrorClass::Numeric => Severity::NumericFault,
        ErrorClass::Io | ErrorClass::Internal => Severity::SolverLimitation,
    };
    let check = match error {
        CalcError::MissingField { .. } => "missing_field",
        CalcError::NumericFailure { .. } => "numeric_scan",
        _ => error.error_code(),
    };
    let diagnostic = Diagnostic::new(check, severity, error.to_string());
    match error {
        CalcError::InvalidInput { field, value, .. } | CalcError::UnknownCategory { field, value, .. } => {
            diagnostic.with_value(field.clone(), value)
        }
        CalcError::NumericFailure { quantity, value } => diagnostic.with_value(quantity.clone(), value),
        _ => match error.field() {
            Some(field) => diagnostic.with_value(field, ""),
            None => diagnostic,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        a: f64,
        b: f64,
    }

    impl_numeric_fields!(Sample { a, b });

    #[test]
    fn test_scan_reports_paths() {
        let clean = Sample { a: 1.0, b: 2.0 };
        assert!(scan_non_finite("sample", &clean).is_none());

        let dirty = vec![Sample { a: 1.0, b: f64::NAN }, Sample { a: f64::INFINITY, b: 0.0 }];
        let d = scan_non_finite("rows", &dirty).unwrap();
        assert_eq!(d.severity, Severity::NumericFault);
        assert_eq!(d.offending_values.get("rows.[0].b").map(String::as_str), Some("NaN"));
        assert_eq!(d.offending_values.get("rows.[1].a").map(String::as_str), Some("inf"));
        assert_eq!(d.offending_values.len(), 2);
    }

    #[test]
    fn test_bounds_and_empty_sets() {
        assert!(check_bounds("embedment", 2.0, 15.0).is_none());
        let d = check_bounds("embedment", 16.0, 15.0).unwrap();
        assert_eq!(d.severity, Severity::InputError);
        assert_eq!(d.offending_values.len(), 2);
        assert!(check_non_empty("bolt_counts", 3).is_none());
        assert!(check_non_empty("bolt_counts", 0).is_some());
    }

    #[test]
    fn test_error_classification() {
        let d = from_error(&CalcError::invalid_input("soil_bearing_psf", "-1", "Value must be positive"));
        assert_eq!(d.severity, Severity::InputError);
        assert_eq!(d.offending_values.get("soil_bearing_psf").map(String::as_str), Some("-1"));

        let d = from_error(&CalcError::missing_field("wind_speed_mph"));
        assert_eq!(d.check, "missing_field");
        assert!(d.remediation.contains("never guesses"));

        let d = from_error(&CalcError::constant_not_found("kd", "2024.1"));
        assert_eq!(d.severity, Severity::DataGap);

        let d = from_error(&CalcError::numeric("qz", f64::NAN));
        assert_eq!(d.severity, Severity::NumericFault);
    }

    #[test]
    fn test_non_convergence_record() {
        let d = non_convergence("depth_solver", 32, "bracket still open");
        assert_eq!(d.severity, Severity::SolverLimitation);
        assert!(d.remediation.contains("iteration cap"));
    }
}
