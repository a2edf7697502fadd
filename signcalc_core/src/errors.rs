//! # Error Types
//!
//! Structured error types for signcalc_core. Every variant carries enough
//! context for a caller to correct the request without reading a stack trace.
//!
//! Errors here cover the *rejecting* paths: input validation, data gaps in
//! the standards tables, numeric faults and I/O. Expected engineering
//! outcomes (no feasible design, solver did not converge) are not errors;
//! they are variants of [`crate::envelope::Outcome`].
//!
//! ## Example
//!
//! ```rust
//! use signcalc_core::errors::{CalcError, CalcResult};
//!
//! fn validate_wind(speed_mph: f64) -> CalcResult<()> {
//!     if speed_mph <= 0.0 {
//!         return Err(CalcError::invalid_input(
//!             "wind_speed_mph",
//!             speed_mph.to_string(),
//!             "Wind speed must be positive",
//!         ));
//!     }
//!     Ok(())
//! }
//!
//! assert!(validate_wind(-5.0).is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for signcalc_core operations
pub type CalcResult<T> = Result<T, CalcError>;

/// Structured error type for engine operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CalcError {
    /// An input value is invalid (out of range, non-finite, etc.)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A field the computation cannot proceed without is absent
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// A categorical code (exposure, risk category, family) is not recognized
    #[error("Unknown {field} '{value}' (expected one of: {allowed})")]
    UnknownCategory {
        field: String,
        value: String,
        allowed: String,
    },

    /// Section designation not present in the catalog
    #[error("Section not found: {designation} (catalog {catalog_version})")]
    SectionNotFound {
        designation: String,
        catalog_version: String,
    },

    /// Constant key not present in the constants table
    #[error("Constant '{key}' not found in constants version {version}")]
    ConstantNotFound { key: String, version: String },

    /// Requested constants version does not exist in the store
    #[error("Constants version not found: {version}")]
    ConstantsVersionNotFound { version: String },

    /// NaN or infinity produced while computing a quantity
    #[error("Numeric failure in {quantity}: value {value}")]
    NumericFailure { quantity: String, value: String },

    /// A calibration suggestion tried to move a constant away from its safe direction
    #[error("Calibration policy violation for '{key}': {reason}")]
    PolicyViolation { key: String, reason: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// History file held by another publisher
    #[error("File locked: '{path}' is locked by {locked_by} since {locked_at}")]
    FileLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    /// JSON could not be read or written
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// History file written by an incompatible schema
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },

    /// Broken internal invariant (poisoned lock, empty store)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Top-level failure classes used by diagnostics and the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed or out-of-range request field
    Validation,
    /// Catalog entry or constant missing
    DataGap,
    /// NaN/Inf detected
    Numeric,
    /// Environment problems (files, locks, serialization)
    Io,
    /// Bug or broken invariant
    Internal,
}

impl CalcError {
    /// Field present but unusable
    pub fn invalid_input(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CalcError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Required field absent
    pub fn missing_field(field: impl Into<String>) -> Self {
        CalcError::MissingField {
            field: field.into(),
        }
    }

    /// Create an UnknownCategory error
    pub fn unknown_category(
        field: impl Into<String>,
        value: impl Into<String>,
        allowed: &[&str],
    ) -> Self {
        CalcError::UnknownCategory {
            field: field.into(),
            value: value.into(),
            allowed: allowed.join(", "),
        }
    }

    /// Create a SectionNotFound error
    pub fn section_not_found(
        designation: impl Into<String>,
        catalog_version: impl Into<String>,
    ) -> Self {
        CalcError::SectionNotFound {
            designation: designation.into(),
            catalog_version: catalog_version.into(),
        }
    }

    /// Create a ConstantNotFound error
    pub fn constant_not_found(key: impl Into<String>, version: impl Into<String>) -> Self {
        CalcError::ConstantNotFound {
            key: key.into(),
            version: version.into(),
        }
    }

    /// Create a NumericFailure error
    pub fn numeric(quantity: impl Into<String>, value: f64) -> Self {
        CalcError::NumericFailure {
            quantity: quantity.into(),
            value: value.to_string(),
        }
    }

    /// I/O failure on a history or request file
    pub fn file_error(
        operation: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CalcError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Another publisher holds the history file
    pub fn file_locked(
        path: impl Into<String>,
        locked_by: impl Into<String>,
        locked_at: impl Into<String>,
    ) -> Self {
        CalcError::FileLocked {
            path: path.into(),
            locked_by: locked_by.into(),
            locked_at: locked_at.into(),
        }
    }

    /// Create a SerializationError from any displayable error
    pub fn serialization(err: impl std::fmt::Display) -> Self {
        CalcError::SerializationError {
            reason: err.to_string(),
        }
    }

    /// Only a held publisher lock clears up by waiting
    ///
    /// Validation and data-gap errors need caller correction and are never
    /// retried. Only transient environment conditions are.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CalcError::FileLocked { .. })
    }

    /// Classify into the engine's failure taxonomy
    pub fn class(&self) -> ErrorClass {
        match self {
            CalcError::InvalidInput { .. }
            | CalcError::MissingField { .. }
            | CalcError::UnknownCategory { .. }
            | CalcError::PolicyViolation { .. } => ErrorClass::Validation,
            CalcError::SectionNotFound { .. }
            | CalcError::ConstantNotFound { .. }
            | CalcError::ConstantsVersionNotFound { .. } => ErrorClass::DataGap,
            CalcError::NumericFailure { .. } => ErrorClass::Numeric,
            CalcError::FileError { .. }
            | CalcError::FileLocked { .. }
            | CalcError::SerializationError { .. }
            | CalcError::VersionMismatch { .. } => ErrorClass::Io,
            CalcError::Internal { .. } => ErrorClass::Internal,
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            CalcError::InvalidInput { .. } => "INVALID_INPUT",
            CalcError::MissingField { .. } => "MISSING_FIELD",
            CalcError::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            CalcError::SectionNotFound { .. } => "SECTION_NOT_FOUND",
            CalcError::ConstantNotFound { .. } => "CONSTANT_NOT_FOUND",
            CalcError::ConstantsVersionNotFound { .. } => "CONSTANTS_VERSION_NOT_FOUND",
            CalcError::NumericFailure { .. } => "NUMERIC_FAILURE",
            CalcError::PolicyViolation { .. } => "POLICY_VIOLATION",
            CalcError::FileError { .. } => "FILE_ERROR",
            CalcError::FileLocked { .. } => "FILE_LOCKED",
            CalcError::SerializationError { .. } => "SERIALIZATION_ERROR",
            CalcError::VersionMismatch { .. } => "VERSION_MISMATCH",
            CalcError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Field name the error points at, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            CalcError::InvalidInput { field, .. }
            | CalcError::MissingField { field }
            | CalcError::UnknownCategory { field, .. } => Some(field),
            CalcError::ConstantNotFound { key, .. } | CalcError::PolicyViolation { key, .. } => {
                Some(key)
            }
            _ => None,
        }
    }
}

/// Reject NaN and infinities in an input field.
pub fn ensure_finite(field: &str, value: f64) -> CalcResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalcError::invalid_input(field, value.to_string(), "Value must be finite"))
    }
}

/// Reject non-positive (or non-finite) values in an input field.
pub fn ensure_positive(field: &str, value: f64) -> CalcResult<f64> {
    ensure_finite(field, value)?;
    if value <= 0.0 {
        return Err(CalcError::invalid_input(field, value.to_string(), "Value must be positive"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = CalcError::invalid_input("wind_speed_mph", "-5", "Wind speed must be positive");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"type\":\"InvalidInput\""));
        let roundtrip: CalcError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CalcError::missing_field("test").error_code(), "MISSING_FIELD");
        assert_eq!(
            CalcError::section_not_found("HSS99X99", "test").error_code(),
            "SECTION_NOT_FOUND"
        );
        assert_eq!(
            CalcError::unknown_category("exposure", "Z", &["B", "C", "D"]).error_code(),
            "UNKNOWN_CATEGORY"
        );
    }

    #[test]
    fn test_classification() {
        assert_eq!(CalcError::missing_field("x").class(), ErrorClass::Validation);
        assert_eq!(
            CalcError::constant_not_found("kd", "2024.1").class(),
            ErrorClass::DataGap
        );
        assert_eq!(CalcError::numeric("qz", f64::NAN).class(), ErrorClass::Numeric);
        assert!(!CalcError::missing_field("x").is_recoverable());
    }

    #[test]
    fn test_unknown_category_message() {
        let err = CalcError::unknown_category("exposure", "Q", &["B", "C", "D"]);
        assert_eq!(err.to_string(), "Unknown exposure 'Q' (expected one of: B, C, D)");
        assert_eq!(err.field(), Some("exposure"));
    }

    #[test]
    fn test_ensure_helpers() {
        assert!(ensure_positive("soil", 0.0).is_err());
        assert!(ensure_positive("soil", f64::INFINITY).is_err());
        assert_eq!(ensure_positive("soil", 3000.0).unwrap(), 3000.0);
        assert!(ensure_finite("x", f64::NAN).is_err());
    }
}
