//! # Result Envelope
//!
//! Every engine answer is wrapped in an [`Envelope`]: the outcome, the
//! assumptions made along the way, a confidence score, a reproducibility
//! trace and any diagnostics.
//!
//! ## Outcomes
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `feasible` | A design that passes every check |
//! | `infeasible` | Nothing in the search space passes; closest data attached |
//! | `non_converged` | A solver hit its iteration cap, even after the relaxed retry |
//! | `invalid_input` | The request was rejected |
//! | `numeric_failure` | NaN/Inf appeared in a result |
//! | `abstain` | Not enough information or confidence to answer |
//!
//! ## Confidence
//!
//! Starts at 1.0 and is multiplied by a factor per assumption (see
//! [`AssumptionKind::factor`]). Missing required data caps it at 0.25, and
//! a composite result can never be more confident than its least confident
//! input. A feasible result below the abstain floor is turned into an
//! abstention, and every non-feasible outcome reports
//! [`ABSTAIN_CONFIDENCE`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::diagnostics::Diagnostic;
use crate::errors::{CalcError, CalcResult};
use crate::standards::{CodeReference, StandardsSnapshot};

/// Confidence reported for anything that is not a feasible design
pub const ABSTAIN_CONFIDENCE: f64 = 0.0;
/// Feasible results below this confidence abstain
pub const DEFAULT_ABSTAIN_FLOOR: f64 = 0.5;
/// Ceiling on confidence once required data is missing
pub const MISSING_DATA_CAP: f64 = 0.25;

/// Version string recorded in every trace
pub const CODE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Outcome
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Feasible {
        result: T,
    },
    Infeasible {
        /// Best partial result, when there is one
        closest: Option<T>,
        diagnostic: Diagnostic,
    },
    NonConverged {
        diagnostic: Diagnostic,
    },
    InvalidInput {
        diagnostic: Diagnostic,
    },
    NumericFailure {
        diagnostic: Diagnostic,
    },
    Abstain {
        reason: String,
        recommendation: String,
    },
}

impl<T> Outcome<T> {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Outcome::Feasible { .. })
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            Outcome::Feasible { result } => Some(result),
            _ => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Feasible { .. } => "feasible",
            Outcome::Infeasible { .. } => "infeasible",
            Outcome::NonConverged { .. } => "non_converged",
            Outcome::InvalidInput { .. } => "invalid_input",
            Outcome::NumericFailure { .. } => "numeric_failure",
            Outcome::Abstain { .. } => "abstain",
        }
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Outcome::Infeasible { diagnostic, .. }
            | Outcome::NonConverged { diagnostic }
            | Outcome::InvalidInput { diagnostic }
            | Outcome::NumericFailure { diagnostic } => Some(diagnostic),
            Outcome::Feasible { .. } | Outcome::Abstain { .. } => None,
        }
    }

    /// Outcome for a rejected computation, classified by diagnostic severity
    pub fn from_diagnostic(diagnostic: Diagnostic) -> Self {
        use crate::diagnostics::Severity;
        match diagnostic.severity {
            Severity::InputError | Severity::DataGap => Outcome::InvalidInput { diagnostic },
            Severity::NumericFault => Outcome::NumericFailure { diagnostic },
            Severity::SolverLimitation => Outcome::NonConverged { diagnostic },
        }
    }
}

// ============================================================================
// Confidence
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionKind {
    /// An optional input was filled with its default
    DefaultValue,
    /// A simplification that errs on the safe side
    ConservativeSimplification,
    /// A solver result was accepted from a relaxed retry
    RelaxedRetry,
    /// An optimizer stopped at its generation cap
    OptimizerCap,
    /// A fallback path replaced the primary method
    Fallback,
    /// Result needs an engineer's review before use
    ManualReview,
}

impl AssumptionKind {
    pub fn factor(self) -> f64 {
        match self {
            AssumptionKind::DefaultValue => 0.95,
            AssumptionKind::ConservativeSimplification => 0.97,
            AssumptionKind::RelaxedRetry => 0.85,
            AssumptionKind::OptimizerCap => 0.90,
            AssumptionKind::Fallback => 0.90,
            AssumptionKind::ManualReview => 0.60,
        }
    }
}

/// One multiplicative change to the confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAdjustment {
    pub kind: AssumptionKind,
    pub factor: f64,
    pub description: String,
}

/// Accumulates assumptions and the confidence they cost.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceTracker {
    value: f64,
    assumptions: Vec<String>,
    adjustments: Vec<ConfidenceAdjustment>,
    missing: Vec<String>,
}

impl Default for ConfidenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfidenceTracker {
    pub fn new() -> Self {
        ConfidenceTracker {
            value: 1.0,
            assumptions: Vec::new(),
            adjustments: Vec::new(),
            missing: Vec::new(),
        }
    }

    pub fn assume(&mut self, kind: AssumptionKind, description: impl Into<String>) {
        let description = description.into();
        let factor = kind.factor();
        self.value *= factor;
        self.assumptions.push(description.clone());
        self.adjustments.push(ConfidenceAdjustment {
            kind,
            factor,
            description,
        });
    }

    /// Record a required field that was not supplied
    pub fn missing(&mut self, field: impl Into<String>) {
        let field = field.into();
        self.assumptions
            .push(format!("Required field {} was not supplied; no value was assumed", field));
        self.missing.push(field);
    }

    /// Never more confident than an upstream result
    pub fn inherit(&mut self, upstream: f64) {
        self.value = self.value.min(upstream);
    }

    pub fn confidence(&self) -> f64 {
        if self.missing.is_empty() {
            self.value
        } else {
            self.value.min(MISSING_DATA_CAP)
        }
    }

    pub fn missing_fields(&self) -> &[String] {
        &self.missing
    }

    pub fn assumptions(&self) -> &[String] {
        &self.assumptions
    }

    pub fn adjustments(&self) -> &[ConfidenceAdjustment] {
        &self.adjustments
    }
}

// ============================================================================
// Trace
// ============================================================================

/// Everything needed to reproduce a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub inputs: serde_json::Value,
    /// Named intermediate quantities, sorted by name
    pub intermediates: BTreeMap<String, f64>,
    pub outputs: serde_json::Value,
    pub code_version: String,
    pub constants_version: String,
    pub catalog_version: String,
    pub references: Vec<String>,
    pub confidence_adjustments: Vec<ConfidenceAdjustment>,
}

impl Trace {
    pub fn new<I: Serialize + ?Sized>(inputs: &I, snapshot: &StandardsSnapshot) -> Self {
        Trace {
            inputs: serde_json::to_value(inputs).unwrap_or(serde_json::Value::Null),
            intermediates: BTreeMap::new(),
            outputs: serde_json::Value::Null,
            code_version: CODE_VERSION.to_string(),
            constants_version: snapshot.constants_version().to_string(),
            catalog_version: snapshot.catalog_version().to_string(),
            references: Vec::new(),
            confidence_adjustments: Vec::new(),
        }
    }

    pub fn record(&mut self, name: &str, value: f64) {
        self.intermediates.insert(name.to_string(), value);
    }

    pub fn cite(&mut self, reference: &CodeReference) {
        let citation = reference.citation();
        if !self.references.contains(&citation) {
            self.references.push(citation);
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub outcome: Outcome<T>,
    pub assumptions: Vec<String>,
    pub confidence: f64,
    pub trace: Trace,
    pub diagnostics: Vec<Diagnostic>,
}

/// Hashed view of an envelope; the inputs and versions pin the outcome
#[derive(Serialize)]
struct HashView<'a, T> {
    outcome: &'a Outcome<T>,
    assumptions: &'a [String],
    confidence: f64,
    inputs: &'a serde_json::Value,
    code_version: &'a str,
    constants_version: &'a str,
    catalog_version: &'a str,
}

impl<T: Serialize> Envelope<T> {
    /// Assemble the envelope and apply the abstain policy.
    ///
    /// Missing required data always abstains. A feasible outcome below
    /// `floor` abstains. Any other non-feasible outcome keeps its status
    /// and reports [`ABSTAIN_CONFIDENCE`].
    pub fn finish(
        outcome: Outcome<T>,
        tracker: ConfidenceTracker,
        mut trace: Trace,
        mut diagnostics: Vec<Diagnostic>,
        floor: f64,
    ) -> Self {
        let confidence = tracker.confidence();
        let outcome = if !tracker.missing_fields().is_empty() {
            Outcome::Abstain {
                reason: format!("Missing required data: {}", tracker.missing_fields().join(", ")),
                recommendation: "Provide the missing fields and resubmit".to_string(),
            }
        } else {
            match outcome {
                Outcome::Feasible { .. } if confidence < floor => Outcome::Abstain {
                    reason: format!("Confidence {:.3} is below the floor of {:.3}", confidence, floor),
                    recommendation: "Replace defaulted inputs with site-specific values or refer for engineering review"
                        .to_string(),
                },
                other => other,
            }
        };
        if let Some(d) = outcome.diagnostic() {
            if !diagnostics.contains(d) {
                diagnostics.push(d.clone());
            }
        }
        if let Outcome::Feasible { result } = &outcome {
            trace.outputs = serde_json::to_value(result).unwrap_or(serde_json::Value::Null);
        }
        trace.confidence_adjustments = tracker.adjustments().to_vec();

        let confidence = if outcome.is_feasible() {
            confidence
        } else {
            ABSTAIN_CONFIDENCE
        };
        Envelope {
            outcome,
            assumptions: tracker.assumptions().to_vec(),
            confidence,
            trace,
            diagnostics,
        }
    }

    /// Envelope for a computation rejected by an error
    pub fn from_error(error: &CalcError, tracker: ConfidenceTracker, trace: Trace, floor: f64) -> Self {
        let diagnostic = crate::diagnostics::from_error(error);
        Self::finish(Outcome::from_diagnostic(diagnostic), tracker, trace, Vec::new(), floor)
    }

    pub fn is_feasible(&self) -> bool {
        self.outcome.is_feasible()
    }

    pub fn result(&self) -> Option<&T> {
        self.outcome.result()
    }

    /// SHA-256 over the outcome, assumptions, confidence, inputs and
    /// versions. Two envelopes for the same request on the same versions
    /// hash equal.
    pub fn content_hash(&self) -> CalcResult<String> {
        let view = HashView {
            outcome: &self.outcome,
            assumptions: &self.assumptions,
            confidence: self.confidence,
            inputs: &self.trace.inputs,
            code_version: &self.trace.code_version,
            constants_version: &self.trace.constants_version,
            catalog_version: &self.trace.catalog_version,
        };
        let bytes = serde_json::to_vec(&view).map_err(CalcError::serialization)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    fn trace() -> Trace {
        Trace::new(&serde_json::json!({ "x": 1.0 }), &StandardsSnapshot::builtin().unwrap())
    }

    #[test]
    fn test_confidence_factors_multiply() {
        let mut t = ConfidenceTracker::new();
        t.assume(AssumptionKind::DefaultValue, "risk category II");
        t.assume(AssumptionKind::ConservativeSimplification, "Kz at top of sign");
        assert!((t.confidence() - 0.95 * 0.97).abs() < 1e-12);
        assert_eq!(t.assumptions().len(), 2);
        t.inherit(0.5);
        assert_eq!(t.confidence(), 0.5);
    }

    #[test]
    fn test_missing_data_abstains() {
        let mut t = ConfidenceTracker::new();
        t.missing("wind_speed_mph");
        assert_eq!(t.confidence(), MISSING_DATA_CAP);
        assert!(t.adjustments().is_empty());
        let env = Envelope::finish(Outcome::Feasible { result: 1.0 }, t, trace(), vec![], DEFAULT_ABSTAIN_FLOOR);
        assert_eq!(env.outcome.status(), "abstain");
        assert_eq!(env.confidence, ABSTAIN_CONFIDENCE);
        match env.outcome {
            Outcome::Abstain { reason, .. } => assert!(reason.contains("wind_speed_mph")),
            other => panic!("expected abstain, got {:?}", other),
        }
        assert_eq!(env.assumptions.len(), 1);
        assert!(env.assumptions[0].contains("wind_speed_mph"));
    }

    #[test]
    fn test_low_confidence_abstains() {
        let mut t = ConfidenceTracker::new();
        for _ in 0..2 {
            t.assume(AssumptionKind::ManualReview, "review");
        }
        // 0.6² = 0.36 < 0.5
        let env = Envelope::finish(Outcome::Feasible { result: 1.0 }, t, trace(), vec![], DEFAULT_ABSTAIN_FLOOR);
        assert_eq!(env.outcome.status(), "abstain");
        assert_eq!(env.trace.confidence_adjustments.len(), 2);
    }

    #[test]
    fn test_feasible_records_outputs() {
        let env = Envelope::finish(
            Outcome::Feasible { result: 2.5 },
            ConfidenceTracker::new(),
            trace(),
            vec![],
            DEFAULT_ABSTAIN_FLOOR,
        );
        assert!(env.is_feasible());
        assert_eq!(env.confidence, 1.0);
        assert_eq!(env.trace.outputs, serde_json::json!(2.5));
        assert_eq!(env.result(), Some(&2.5));
    }

    #[test]
    fn test_failures_report_zero_confidence() {
        let err = CalcError::invalid_input("clearance_ft", "-1", "Clearance cannot be negative");
        let env: Envelope<f64> = Envelope::from_error(&err, ConfidenceTracker::new(), trace(), DEFAULT_ABSTAIN_FLOOR);
        assert_eq!(env.outcome.status(), "invalid_input");
        assert_eq!(env.confidence, ABSTAIN_CONFIDENCE);
        assert_eq!(env.diagnostics.len(), 1);
        assert_eq!(env.diagnostics[0].severity, Severity::InputError);
    }

    #[test]
    fn test_content_hash_is_stable() {
        let make = || {
            Envelope::finish(
                Outcome::Feasible { result: 3.0 },
                ConfidenceTracker::new(),
                trace(),
                vec![],
                DEFAULT_ABSTAIN_FLOOR,
            )
        };
        let a = make().content_hash().unwrap();
        assert_eq!(a, make().content_hash().unwrap());
        assert_eq!(a.len(), 64);

        let other = Envelope::finish(
            Outcome::Feasible { result: 3.5 },
            ConfidenceTracker::new(),
            trace(),
            vec![],
            DEFAULT_ABSTAIN_FLOOR,
        );
        assert_ne!(a, other.content_hash().unwrap());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let o: Outcome<f64> = Outcome::Abstain {
            reason: "r".into(),
            recommendation: "x".into(),
        };
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["status"], "abstain");
    }
}
