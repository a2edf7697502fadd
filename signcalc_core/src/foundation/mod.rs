//! Foundation design.
//!
//! - [`depth`] - direct-burial embedment depth (IBC 1807.3.2.1)
//! - [`baseplate`] - base plate, anchor and weld checks with fabrication cost

pub mod baseplate;
pub mod depth;

use serde::{Deserialize, Serialize};

pub use baseplate::{evaluate_baseplate, BasePlateDesign, BasePlateEvaluation, BasePlateInput};
pub use depth::{solve_depth, DepthInput, DepthOutcome, DepthSettings, DepthSolution};

/// One demand/capacity check.
///
/// `utilization = demand / capacity`. A zero or negative capacity gives an
/// infinite utilization and fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub demand: f64,
    pub capacity: f64,
    pub unit: String,
    pub utilization: f64,
    pub passes: bool,
    pub reference: String,
}

impl CheckResult {
    pub fn new(
        name: &str,
        demand: f64,
        capacity: f64,
        unit: &str,
        reference: impl Into<String>,
    ) -> Self {
        let utilization = if capacity > 0.0 {
            demand / capacity
        } else {
            f64::INFINITY
        };
        CheckResult {
            name: name.to_string(),
            demand,
            capacity,
            unit: unit.to_string(),
            utilization,
            passes: utilization.is_finite() && utilization <= 1.0,
            reference: reference.into(),
        }
    }
}

/// Foundation chosen for a sign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FoundationDesign {
    DirectBurial(DepthSolution),
    BasePlate(BasePlateEvaluation),
}

impl FoundationDesign {
    pub fn checks(&self) -> Vec<&CheckResult> {
        match self {
            FoundationDesign::DirectBurial(s) => vec![&s.check],
            FoundationDesign::BasePlate(e) => e.checks.iter().collect(),
        }
    }

    pub fn all_pass(&self) -> bool {
        self.checks().iter().all(|c| c.passes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_utilization() {
        let c = CheckResult::new("x", 5.0, 10.0, "kip", "ref");
        assert_eq!(c.utilization, 0.5);
        assert!(c.passes);
        let c = CheckResult::new("x", 11.0, 10.0, "kip", "ref");
        assert!(!c.passes);
        let c = CheckResult::new("x", 1.0, 0.0, "kip", "ref");
        assert!(c.utilization.is_infinite());
        assert!(!c.passes);
    }
}
