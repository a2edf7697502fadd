//! # Design Engine
//!
//! The end-to-end pipeline from a loosely-typed [`DesignRequest`] to an
//! [`Envelope`]:
//!
//! ```text
//! request ─► required fields ─► geometry ─► wind load ─► section filter ─► foundation ─► numeric scan
//!               │ missing            │ invalid       │ NaN         │ empty          │ infeasible / non-converged
//!               ▼                    ▼               ▼             ▼                ▼
//!            abstain            invalid_input  numeric_failure  infeasible     infeasible / non_converged
//! ```
//!
//! Required data is never guessed. Optional data (risk category, footing
//! diameter, safety factor, concrete strength, unbraced length) falls back
//! to a default, and each default is recorded as an assumption that lowers
//! the confidence score.
//!
//! ## JSON Example
//!
//! ```json
//! {
//!   "label": "Store front pylon",
//!   "site": { "wind_speed_mph": 115.0, "exposure": "C", "soil_bearing_psf": 3000.0 },
//!   "clearance_ft": 12.0,
//!   "cabinets": [{ "width_ft": 10.0, "height_ft": 8.0, "weight_psf": 8.0 }],
//!   "foundation": { "type": "direct_burial", "diameter_ft": 3.0 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::diagnostics::{
    self, check_bounds, check_non_empty, non_convergence, scan_non_finite, Diagnostic, NumericFields, Severity,
};
use crate::envelope::{AssumptionKind, ConfidenceTracker, Envelope, Outcome, Trace};
use crate::errors::CalcResult;
use crate::foundation::baseplate::{BasePlateLoads, PoleProfile};
use crate::foundation::{
    solve_depth, BasePlateDesign, BasePlateEvaluation, BasePlateInput, CheckResult, DepthInput, DepthOutcome,
    DepthSolution, FoundationDesign,
};
use crate::loads::{compute_site_load, Cabinet, ExposureCategory, Geometry, RiskCategory, SiteConditions, SiteLoad};
use crate::optimize::genetic::StopReason;
use crate::optimize::{
    optimize, pareto_search, BasePlateProblem, GeneticOutcome, ParetoFront, PoleSelectionProblem, SearchSpace,
};
use crate::section_filter::{filter_sections, FilterResult, SectionCandidate, SectionQuery, StrengthRequirement};
use crate::settings::EngineSettings;
use crate::standards::constants::keys;
use crate::standards::sections::{Section, SectionFamily};
use crate::standards::{
    StandardsSnapshot, ANCHOR_DESIGN, LATERAL_BEARING, POLE_EMBEDMENT, POLE_FLEXURE, WELD_DESIGN,
    WIND_SIGN_FORCE, WIND_VELOCITY_PRESSURE,
};
use crate::units::{KipFt, KipIn};

// ============================================================================
// Request
// ============================================================================

/// Site data as supplied. Categories stay strings until validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteInput {
    #[serde(default)]
    pub wind_speed_mph: Option<f64>,
    #[serde(default)]
    pub exposure: Option<String>,
    #[serde(default)]
    pub risk_category: Option<String>,
    #[serde(default)]
    pub soil_bearing_psf: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoleInput {
    /// Restrict the pole to one section family
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub unbraced_length_ft: Option<f64>,
    /// Search every family when the requested one has no passing section
    #[serde(default)]
    pub allow_family_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FoundationRequest {
    DirectBurial {
        #[serde(default)]
        diameter_ft: Option<f64>,
        #[serde(default)]
        safety_factor: Option<f64>,
    },
    BasePlate {
        #[serde(default)]
        concrete_fc_psi: Option<f64>,
    },
}

impl Default for FoundationRequest {
    fn default() -> Self {
        FoundationRequest::DirectBurial {
            diameter_ft: None,
            safety_factor: None,
        }
    }
}

/// One sign to design
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignRequest {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub site: SiteInput,
    #[serde(default)]
    pub clearance_ft: Option<f64>,
    #[serde(default)]
    pub cabinets: Vec<Cabinet>,
    #[serde(default)]
    pub pole: PoleInput,
    #[serde(default)]
    pub foundation: FoundationRequest,
}

impl DesignRequest {
    /// Required fields that are absent, as request paths
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.site.wind_speed_mph.is_none() {
            missing.push("site.wind_speed_mph");
        }
        if self.site.exposure.is_none() {
            missing.push("site.exposure");
        }
        if self.clearance_ft.is_none() {
            missing.push("clearance_ft");
        }
        if self.cabinets.is_empty() {
            missing.push("cabinets");
        }
        if matches!(self.foundation, FoundationRequest::DirectBurial { .. }) && self.site.soil_bearing_psf.is_none() {
            missing.push("site.soil_bearing_psf");
        }
        missing
    }
}

// ============================================================================
// Results
// ============================================================================

/// A complete sign design
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignResult {
    pub label: String,
    pub geometry: Geometry,
    pub load: SiteLoad,
    pub pole: SectionCandidate,
    /// Next-lightest passing sections
    pub pole_alternatives: Vec<SectionCandidate>,
    pub foundation: FoundationDesign,
    /// Runner-up base plates; empty for direct burial
    pub foundation_alternatives: Vec<BasePlateEvaluation>,
}

/// Base plate search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasePlateSelection {
    pub best: BasePlateEvaluation,
    pub alternatives: Vec<BasePlateEvaluation>,
    pub generations: u32,
    pub evaluations: usize,
}

crate::impl_numeric_fields!(SiteLoad {
    wind_speed_mph,
    reference_height_ft,
    kz,
    qz_psf,
    design_pressure_psf,
    area_ft2,
    wind_force_lb,
    shear_kip,
    load_arm_ft,
    moment_kipft,
    axial_kip,
});

crate::impl_numeric_fields!(SectionCandidate {
    required_sx_in3,
    phi_mn_kipin,
    utilization,
});

crate::impl_numeric_fields!(CheckResult { demand, capacity });

crate::impl_numeric_fields!(BasePlateDesign {
    width_in,
    thickness_in,
    bolt_diameter_in,
    weld_in,
});

impl NumericFields for DepthSolution {
    fn numeric_fields(&self) -> Vec<(String, f64)> {
        let mut fields = vec![
            ("depth_ft".to_string(), self.depth_ft),
            ("required_at_depth_ft".to_string(), self.required_at_depth_ft),
            ("lateral_force_lb".to_string(), self.lateral_force_lb),
            ("s1_psf".to_string(), self.s1_psf),
            ("coefficient_a_ft".to_string(), self.coefficient_a_ft),
        ];
        fields.extend(prefixed("check", self.check.numeric_fields()));
        fields
    }
}

impl NumericFields for BasePlateEvaluation {
    fn numeric_fields(&self) -> Vec<(String, f64)> {
        let mut fields = vec![
            ("max_utilization".to_string(), self.max_utilization),
            ("cost".to_string(), self.cost),
        ];
        fields.extend(prefixed("design", self.design.numeric_fields()));
        fields.extend(prefixed("checks", self.checks.numeric_fields()));
        fields
    }
}

impl NumericFields for FoundationDesign {
    fn numeric_fields(&self) -> Vec<(String, f64)> {
        match self {
            FoundationDesign::DirectBurial(s) => s.numeric_fields(),
            FoundationDesign::BasePlate(e) => e.numeric_fields(),
        }
    }
}

impl NumericFields for DesignResult {
    fn numeric_fields(&self) -> Vec<(String, f64)> {
        let mut fields = prefixed("load", self.load.numeric_fields());
        fields.extend(prefixed("pole", self.pole.numeric_fields()));
        fields.extend(prefixed("foundation", self.foundation.numeric_fields()));
        fields
    }
}

impl NumericFields for BasePlateSelection {
    fn numeric_fields(&self) -> Vec<(String, f64)> {
        let mut fields = prefixed("best", self.best.numeric_fields());
        fields.extend(prefixed("alternatives", self.alternatives.numeric_fields()));
        fields
    }
}

impl NumericFields for FilterResult {
    fn numeric_fields(&self) -> Vec<(String, f64)> {
        prefixed("candidates", self.candidates.numeric_fields())
    }
}

fn prefixed(prefix: &str, fields: Vec<(String, f64)>) -> Vec<(String, f64)> {
    fields
        .into_iter()
        .map(|(path, v)| {
            let sep = if path.starts_with('[') { "" } else { "." };
            (format!("{}{}{}", prefix, sep, path), v)
        })
        .collect()
}

/// A stop short of a design, carried up to the envelope
enum Halt {
    Infeasible(Diagnostic),
    NonConverged(Diagnostic),
}

impl Halt {
    fn into_outcome<T>(self) -> Outcome<T> {
        match self {
            Halt::Infeasible(diagnostic) => Outcome::Infeasible {
                closest: None,
                diagnostic,
            },
            Halt::NonConverged(diagnostic) => Outcome::NonConverged { diagnostic },
        }
    }
}

fn checked<T: NumericFields>(name: &str, result: T) -> Outcome<T> {
    match scan_non_finite(name, &result) {
        Some(diagnostic) => Outcome::NumericFailure { diagnostic },
        None => Outcome::Feasible { result },
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Pipeline bound to one standards snapshot and one settings document
#[derive(Debug, Clone)]
pub struct DesignEngine {
    snapshot: StandardsSnapshot,
    settings: EngineSettings,
}

impl DesignEngine {
    pub fn new(snapshot: StandardsSnapshot, settings: EngineSettings) -> CalcResult<Self> {
        settings.validate()?;
        Ok(DesignEngine { snapshot, settings })
    }

    /// Embedded catalog, built-in constants and default settings
    pub fn builtin() -> CalcResult<Self> {
        Self::new(StandardsSnapshot::builtin()?, EngineSettings::default())
    }

    pub fn snapshot(&self) -> &StandardsSnapshot {
        &self.snapshot
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run a stage and wrap whatever it returns.
    fn wrap<T, I, F>(&self, inputs: &I, stage: F) -> Envelope<T>
    where
        T: Serialize,
        I: Serialize + ?Sized,
        F: FnOnce(&mut ConfidenceTracker, &mut Trace) -> CalcResult<Outcome<T>>,
    {
        let mut tracker = ConfidenceTracker::new();
        let mut trace = Trace::new(inputs, &self.snapshot);
        let outcome = stage(&mut tracker, &mut trace).unwrap_or_else(|e| {
            warn!(error = %e, code = e.error_code(), "computation rejected");
            Outcome::from_diagnostic(diagnostics::from_error(&e))
        });
        Envelope::finish(outcome, tracker, trace, Vec::new(), self.settings.abstain_floor)
    }

    /// Design one sign end to end.
    pub fn solve(&self, request: &DesignRequest) -> Envelope<DesignResult> {
        let envelope = self.wrap(request, |tracker, trace| self.run(request, tracker, trace));
        info!(
            label = %request.label,
            status = envelope.outcome.status(),
            confidence = envelope.confidence,
            "design complete"
        );
        envelope
    }

    fn run(
        &self,
        request: &DesignRequest,
        tracker: &mut ConfidenceTracker,
        trace: &mut Trace,
    ) -> CalcResult<Outcome<DesignResult>> {
        let constants = &self.snapshot.constants;

        let missing = request.missing_fields();
        for field in &missing {
            tracker.missing(*field);
        }
        let (Some(speed), Some(exposure), Some(clearance), true) = (
            request.site.wind_speed_mph,
            request.site.exposure.as_deref(),
            request.clearance_ft,
            missing.is_empty(),
        ) else {
            debug!(?missing, "required data missing");
            return Ok(Outcome::Abstain {
                reason: format!("Missing required data: {}", missing.join(", ")),
                recommendation: "Provide the missing fields and resubmit".to_string(),
            });
        };

        // Loads
        let exposure = ExposureCategory::from_code(exposure)?;
        let risk_category = match request.site.risk_category.as_deref() {
            Some(code) => RiskCategory::from_code(code)?,
            None => {
                tracker.assume(AssumptionKind::DefaultValue, "Risk category II assumed");
                RiskCategory::II
            }
        };
        let geometry = Geometry::new(clearance, request.cabinets.clone())?;
        let site = SiteConditions {
            wind_speed_mph: speed,
            exposure,
            risk_category,
            soil_bearing_psf: request.site.soil_bearing_psf,
        };
        tracker.assume(
            AssumptionKind::ConservativeSimplification,
            "Kz evaluated at the top of the sign for the whole face",
        );
        let load = compute_site_load(&site, &geometry, constants)?;
        trace.cite(&WIND_VELOCITY_PRESSURE);
        trace.cite(&WIND_SIGN_FORCE);
        for (name, value) in [
            ("kz", load.kz),
            ("qz_psf", load.qz_psf),
            ("design_pressure_psf", load.design_pressure_psf),
            ("wind_force_lb", load.wind_force_lb),
            ("load_arm_ft", load.load_arm_ft),
            ("moment_kipft", load.moment_kipft),
        ] {
            trace.record(name, value);
        }
        if let Some(diagnostic) = scan_non_finite("load", &load) {
            return Ok(Outcome::NumericFailure { diagnostic });
        }

        // Pole
        let family = request.pole.family.as_deref().map(SectionFamily::from_code).transpose()?;
        let unbraced_ft = match request.pole.unbraced_length_ft {
            Some(l) => l,
            None => {
                tracker.assume(
                    AssumptionKind::DefaultValue,
                    format!(
                        "Pole unbraced length taken as the overall height, {:.2} ft",
                        geometry.overall_height_ft
                    ),
                );
                geometry.overall_height_ft
            }
        };
        let mu_kipin = KipIn::from(KipFt(load.moment_kipft)).value();
        let mut query = SectionQuery::new(StrengthRequirement::Moment { mu_kipin }).with_unbraced_length(unbraced_ft);
        if let Some(f) = family {
            query = query.with_family(f);
        }
        let mut filtered = filter_sections(&query, &self.snapshot.catalog, constants)?;
        if let (true, true, Some(f)) = (filtered.is_empty(), request.pole.allow_family_fallback, query.family) {
            query.family = None;
            let any_family = filter_sections(&query, &self.snapshot.catalog, constants)?;
            if !any_family.is_empty() {
                debug!(family = %f, "falling back to all section families");
                tracker.assume(
                    AssumptionKind::Fallback,
                    format!("No {} section passes; pole selected from all families", f),
                );
                filtered = any_family;
            }
        }
        trace.cite(&POLE_FLEXURE);
        trace.record("mu_kipin", mu_kipin);
        if filtered.is_empty() {
            return Ok(Outcome::Infeasible {
                closest: None,
                diagnostic: no_section_diagnostic(&filtered, mu_kipin),
            });
        }
        let mut candidates = filtered.candidates;
        let pole = candidates.remove(0);
        candidates.truncate(self.settings.alternatives);
        trace.record("pole_utilization", pole.utilization);

        // Foundation
        let (foundation, foundation_alternatives) = match &request.foundation {
            FoundationRequest::DirectBurial {
                diameter_ft,
                safety_factor,
            } => {
                let diameter_ft = self.default_or(tracker, *diameter_ft, keys::DEFAULT_FOOTING_DIAMETER_FT, "Footing diameter")?;
                let safety_factor =
                    self.default_or(tracker, *safety_factor, keys::FOUNDATION_SAFETY_FACTOR, "Overturning safety factor")?;
                tracker.assume(
                    AssumptionKind::ConservativeSimplification,
                    "Nonconstrained pole: no lateral restraint at grade",
                );
                let input = DepthInput {
                    moment_kipft: load.moment_kipft,
                    load_arm_ft: load.load_arm_ft,
                    diameter_ft,
                    soil_bearing_psf: request.site.soil_bearing_psf.unwrap_or_default(),
                    safety_factor,
                };
                match self.embed(&input, tracker, trace)? {
                    Ok(solution) => (FoundationDesign::DirectBurial(solution), Vec::new()),
                    Err(halt) => return Ok(halt.into_outcome()),
                }
            }
            FoundationRequest::BasePlate { concrete_fc_psi } => {
                let fc = self.default_or(tracker, *concrete_fc_psi, keys::DEFAULT_CONCRETE_FC_PSI, "Concrete strength")?;
                tracker.assume(
                    AssumptionKind::ConservativeSimplification,
                    "Rigid base plate; tension row carries the full overturning moment",
                );
                let input = BasePlateInput {
                    loads: BasePlateLoads {
                        moment_kipft: load.moment_kipft,
                        shear_kip: load.shear_kip,
                        axial_kip: load.axial_kip,
                    },
                    pole: PoleProfile::from(&pole.section),
                    concrete_fc_psi: fc,
                };
                match self.plate(&input, tracker, trace)? {
                    Ok(selection) => (FoundationDesign::BasePlate(selection.best), selection.alternatives),
                    Err(halt) => return Ok(halt.into_outcome()),
                }
            }
        };

        Ok(checked(
            "result",
            DesignResult {
                label: request.label.clone(),
                geometry,
                load,
                pole,
                pole_alternatives: candidates,
                foundation,
                foundation_alternatives,
            },
        ))
    }

    /// Supplied value, or the constants default recorded as an assumption
    fn default_or(
        &self,
        tracker: &mut ConfidenceTracker,
        supplied: Option<f64>,
        key: &str,
        what: &str,
    ) -> CalcResult<f64> {
        match supplied {
            Some(v) => Ok(v),
            None => {
                let v = self.snapshot.constants.get(key)?;
                tracker.assume(AssumptionKind::DefaultValue, format!("{} defaulted to {}", what, v));
                Ok(v)
            }
        }
    }

    /// Depth solve with one relaxed retry on non-convergence
    fn embed(
        &self,
        input: &DepthInput,
        tracker: &mut ConfidenceTracker,
        trace: &mut Trace,
    ) -> CalcResult<Result<DepthSolution, Halt>> {
        let constants = &self.snapshot.constants;
        trace.cite(&POLE_EMBEDMENT);
        trace.cite(&LATERAL_BEARING);
        if let Some(d) = check_bounds(
            "embedment_ft",
            constants.get(keys::MIN_EMBEDMENT_FT)?,
            constants.get(keys::MAX_EMBEDMENT_FT)?,
        ) {
            return Ok(Err(Halt::Infeasible(d)));
        }

        let mut outcome = solve_depth(input, constants, &self.settings.depth)?;
        if let DepthOutcome::NonConverged { iterations, .. } = outcome {
            let relaxed = self.settings.depth.relaxed();
            debug!(iterations, resolution_ft = relaxed.resolution_ft, "retrying depth solve with relaxed settings");
            outcome = solve_depth(input, constants, &relaxed)?;
            if matches!(outcome, DepthOutcome::Solved(_)) {
                tracker.assume(
                    AssumptionKind::RelaxedRetry,
                    format!("Embedment solved at a relaxed {} ft resolution", relaxed.resolution_ft),
                );
            }
        }

        match outcome {
            DepthOutcome::Solved(solution) => {
                trace.record("embedment_depth_ft", solution.depth_ft);
                trace.record("embedment_lateral_force_lb", solution.lateral_force_lb);
                trace.record("embedment_s1_psf", solution.s1_psf);
                Ok(Ok(solution))
            }
            DepthOutcome::ExceedsMaximum {
                max_depth_ft,
                required_at_max_ft,
            } => {
                tracker.assume(
                    AssumptionKind::ManualReview,
                    "Embedment beyond the maximum depth requires engineering review",
                );
                Ok(Err(Halt::Infeasible(
                    Diagnostic::new(
                        "embedment_depth",
                        Severity::SolverLimitation,
                        format!(
                            "Required embedment exceeds the {} ft maximum; manual engineering review required",
                            max_depth_ft
                        ),
                    )
                    .with_value("max_depth_ft", max_depth_ft)
                    .with_value("required_at_max_ft", required_at_max_ft)
                    .with_value("diameter_ft", input.diameter_ft),
                )))
            }
            DepthOutcome::NonConverged {
                iterations,
                bracket_low_ft,
                bracket_high_ft,
            } => Ok(Err(Halt::NonConverged(
                non_convergence(
                    "depth_solver",
                    iterations,
                    format!(
                        "Depth bracket [{:.3}, {:.3}] ft still open after the relaxed retry",
                        bracket_low_ft, bracket_high_ft
                    ),
                )
                .with_value("bracket_low_ft", bracket_low_ft)
                .with_value("bracket_high_ft", bracket_high_ft),
            ))),
        }
    }

    fn plate(
        &self,
        input: &BasePlateInput,
        tracker: &mut ConfidenceTracker,
        trace: &mut Trace,
    ) -> CalcResult<Result<BasePlateSelection, Halt>> {
        input.validate()?;
        trace.cite(&ANCHOR_DESIGN);
        trace.cite(&WELD_DESIGN);
        let problem = BasePlateProblem::new(input, &self.snapshot.constants);
        let empty = problem
            .gene_cardinalities()
            .into_iter()
            .enumerate()
            .find_map(|(i, n)| check_non_empty(&format!("baseplate.gene[{}]", i), n));
        if let Some(d) = empty {
            return Ok(Err(Halt::Infeasible(d)));
        }
        match optimize(&problem, &self.settings.genetic)? {
            GeneticOutcome::Found(solution) => {
                if solution.stop_reason == StopReason::GenerationCap {
                    tracker.assume(
                        AssumptionKind::OptimizerCap,
                        format!("Base plate search stopped at the {} generation cap", solution.generations),
                    );
                }
                trace.record("baseplate_generations", solution.generations as f64);
                trace.record("baseplate_evaluations", solution.evaluations as f64);
                let best = problem.check(&solution.best.candidate)?;
                trace.record("baseplate_cost", best.cost);
                let alternatives = solution
                    .alternatives
                    .iter()
                    .map(|a| problem.check(&a.candidate))
                    .collect::<CalcResult<Vec<_>>>()?;
                Ok(Ok(BasePlateSelection {
                    best,
                    alternatives,
                    generations: solution.generations,
                    evaluations: solution.evaluations,
                }))
            }
            GeneticOutcome::NoFeasibleDesign {
                generations,
                evaluations,
            } => Ok(Err(Halt::Infeasible(
                Diagnostic::new(
                    "baseplate_optimizer",
                    Severity::SolverLimitation,
                    format!(
                        "No base plate passed every check after {} generations ({} designs)",
                        generations, evaluations
                    ),
                )
                .with_value("loads.moment_kipft", input.loads.moment_kipft)
                .with_value("pole.outer_dim_in", input.pole.outer_dim_in),
            ))),
        }
    }

    // ========================================================================
    // Stand-alone operations
    // ========================================================================

    /// Filter the catalog. An empty list is `infeasible` with the filter
    /// statistics as the closest result.
    pub fn select_sections(&self, query: &SectionQuery) -> Envelope<FilterResult> {
        self.wrap(query, |_, trace| {
            let result = filter_sections(query, &self.snapshot.catalog, &self.snapshot.constants)?;
            trace.cite(&POLE_FLEXURE);
            trace.record("scanned", result.scanned as f64);
            if result.is_empty() {
                let required = match query.requirement {
                    StrengthRequirement::Moment { mu_kipin } => mu_kipin,
                    StrengthRequirement::SectionModulus { sx_in3 } => sx_in3,
                };
                let diagnostic = no_section_diagnostic(&result, required);
                return Ok(Outcome::Infeasible {
                    closest: Some(result),
                    diagnostic,
                });
            }
            Ok(checked("sections", result))
        })
    }

    /// Embedment depth for a direct-burial pole
    pub fn design_depth(&self, input: &DepthInput) -> Envelope<DepthSolution> {
        self.wrap(input, |tracker, trace| match self.embed(input, tracker, trace)? {
            Ok(solution) => Ok(checked("depth", solution)),
            Err(halt) => Ok(halt.into_outcome()),
        })
    }

    /// Cheapest passing base plate with runners-up
    pub fn design_baseplate(&self, input: &BasePlateInput) -> Envelope<BasePlateSelection> {
        self.wrap(input, |tracker, trace| match self.plate(input, tracker, trace)? {
            Ok(selection) => Ok(checked("baseplate", selection)),
            Err(halt) => Ok(halt.into_outcome()),
        })
    }

    /// Cost / weight / margin trade-off across the catalog
    pub fn pole_tradeoff(
        &self,
        mu_kipin: f64,
        pole_length_ft: f64,
        family: Option<SectionFamily>,
        primary: &str,
    ) -> Envelope<ParetoFront<Section>> {
        let inputs = serde_json::json!({
            "mu_kipin": mu_kipin,
            "pole_length_ft": pole_length_ft,
            "family": family,
            "primary": primary,
        });
        self.wrap(&inputs, |_, trace| self.pole_front(mu_kipin, pole_length_ft, family, primary, trace))
    }

    /// Pole trade-off for the demand of an already solved design. The
    /// front is never more confident than the design it was taken from.
    pub fn pole_tradeoff_for(&self, design: &Envelope<DesignResult>, primary: &str) -> Envelope<ParetoFront<Section>> {
        let inputs = serde_json::json!({
            "design": design.content_hash().ok(),
            "primary": primary,
        });
        self.wrap(&inputs, |tracker, trace| {
            let Some(result) = design.result() else {
                return Ok(Outcome::Abstain {
                    reason: format!("Upstream design is {}", design.outcome.status()),
                    recommendation: "Resolve the upstream design before exploring trade-offs".to_string(),
                });
            };
            tracker.inherit(design.confidence);
            trace.record("upstream_confidence", design.confidence);
            let mu_kipin = KipIn::from(KipFt(result.load.moment_kipft)).value();
            self.pole_front(mu_kipin, result.geometry.overall_height_ft, None, primary, trace)
        })
    }

    fn pole_front(
        &self,
        mu_kipin: f64,
        pole_length_ft: f64,
        family: Option<SectionFamily>,
        primary: &str,
        trace: &mut Trace,
    ) -> CalcResult<Outcome<ParetoFront<Section>>> {
        let problem = PoleSelectionProblem::new(
            &self.snapshot.catalog,
            family,
            mu_kipin,
            pole_length_ft,
            &self.snapshot.constants,
        )?;
        let front = pareto_search(&problem, &self.settings.pareto, primary)?;
        trace.cite(&POLE_FLEXURE);
        Ok(front_outcome(front, trace))
    }

    /// Cost / margin trade-off for base plates
    pub fn baseplate_tradeoff(&self, input: &BasePlateInput, primary: &str) -> Envelope<ParetoFront<BasePlateDesign>> {
        self.wrap(input, |_, trace| {
            input.validate()?;
            let problem = BasePlateProblem::new(input, &self.snapshot.constants);
            let front = pareto_search(&problem, &self.settings.pareto, primary)?;
            trace.cite(&ANCHOR_DESIGN);
            trace.cite(&WELD_DESIGN);
            Ok(front_outcome(front, trace))
        })
    }
}

fn front_outcome<C>(front: ParetoFront<C>, trace: &mut Trace) -> Outcome<ParetoFront<C>> {
    trace.record("front_size", front.points.len() as f64);
    trace.record("generations", front.generations as f64);
    if front.is_empty() {
        return Outcome::Infeasible {
            closest: None,
            diagnostic: Diagnostic::new(
                "pareto_front",
                Severity::SolverLimitation,
                format!("No feasible design found in {} evaluations", front.evaluations),
            )
            .with_remediation("Widen the search space or reduce the demand."),
        };
    }
    Outcome::Feasible { result: front }
}

fn no_section_diagnostic(result: &FilterResult, required: f64) -> Diagnostic {
    let mut diagnostic = Diagnostic::new(
        "section_filter",
        Severity::SolverLimitation,
        format!(
            "No section passes: {} scanned, {} too weak, {} too slender",
            result.scanned, result.rejected_strength, result.rejected_slenderness
        ),
    )
    .with_value("requirement", required);
    if let Some(closest) = &result.closest {
        diagnostic = diagnostic
            .with_value("closest.designation", &closest.designation)
            .with_value("closest.shortfall_ratio", closest.shortfall_ratio);
    }
    diagnostic
}

/// Design one sign with the embedded catalog, built-in constants and
/// default settings.
pub fn solve(request: &DesignRequest) -> CalcResult<Envelope<DesignResult>> {
    Ok(DesignEngine::builtin()?.solve(request))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::envelope::ABSTAIN_CONFIDENCE;
    use crate::standards::constants::ConstantsTable;

    fn request() -> DesignRequest {
        DesignRequest {
            label: "pylon".to_string(),
            site: SiteInput {
                wind_speed_mph: Some(115.0),
                exposure: Some("C".to_string()),
                risk_category: Some("II".to_string()),
                soil_bearing_psf: Some(3000.0),
            },
            clearance_ft: Some(12.0),
            cabinets: vec![Cabinet {
                width_ft: 10.0,
                height_ft: 8.0,
                weight_psf: 8.0,
            }],
            pole: PoleInput::default(),
            foundation: FoundationRequest::DirectBurial {
                diameter_ft: Some(3.0),
                safety_factor: Some(1.5),
            },
        }
    }

    fn engine() -> DesignEngine {
        DesignEngine::builtin().unwrap()
    }

    #[test]
    fn test_direct_burial_design() {
        let env = engine().solve(&request());
        let result = env.result().expect("feasible design");
        assert!(result.pole.utilization <= 1.0);
        assert!(result.foundation.all_pass());
        assert!(matches!(result.foundation, FoundationDesign::DirectBurial(_)));
        assert!(result.pole_alternatives.len() <= 3);
        // Kz simplification, unbraced length default, nonconstrained pole
        assert!((env.confidence - 0.97 * 0.95 * 0.97).abs() < 1e-9);
        assert!(env.trace.references.iter().any(|r| r.contains("1807.3.2.1")));
        assert!(env.trace.intermediates.contains_key("embedment_depth_ft"));
        assert_eq!(env.trace.constants_version, "2024.1");
    }

    #[test]
    fn test_missing_wind_speed_abstains() {
        let mut req = request();
        req.site.wind_speed_mph = None;
        let env = engine().solve(&req);
        assert_eq!(env.outcome.status(), "abstain");
        assert_eq!(env.confidence, ABSTAIN_CONFIDENCE);
    }

    #[test]
    fn test_defaults_are_assumptions() {
        let mut req = request();
        req.site.risk_category = None;
        req.foundation = FoundationRequest::default();
        let env = engine().solve(&req);
        assert!(env.is_feasible());
        assert!(env.assumptions.iter().any(|a| a.contains("Risk category II")));
        assert!(env.assumptions.iter().any(|a| a.contains("Footing diameter")));
        assert!(env.confidence < 0.97 * 0.95 * 0.97);
    }

    #[test]
    fn test_unknown_exposure_is_invalid_input() {
        let mut req = request();
        req.site.exposure = Some("Q".to_string());
        let env = engine().solve(&req);
        assert_eq!(env.outcome.status(), "invalid_input");
        assert_eq!(env.diagnostics[0].severity, Severity::InputError);
    }

    #[test]
    fn test_oversized_sign_is_infeasible() {
        let mut req = request();
        req.site.wind_speed_mph = Some(150.0);
        req.clearance_ft = Some(20.0);
        req.cabinets = vec![Cabinet {
            width_ft: 40.0,
            height_ft: 20.0,
            weight_psf: 10.0,
        }];
        let env = engine().solve(&req);
        assert_eq!(env.outcome.status(), "infeasible");
        let d = env.outcome.diagnostic().unwrap();
        assert_eq!(d.check, "section_filter");
        assert!(d.offending_values.contains_key("closest.designation"));
    }

    #[test]
    fn test_family_fallback_is_opt_in() {
        // ~2000 kip-in: beyond the largest round HSS, within the square range
        let mut req = request();
        req.clearance_ft = Some(15.0);
        req.cabinets = vec![Cabinet {
            width_ft: 24.0,
            height_ft: 12.0,
            weight_psf: 8.0,
        }];
        req.site.soil_bearing_psf = Some(4000.0);
        req.foundation = FoundationRequest::DirectBurial {
            diameter_ft: Some(4.0),
            safety_factor: Some(1.5),
        };
        req.pole.family = Some("HSS_ROUND".to_string());

        let strict = engine().solve(&req);
        assert_eq!(strict.outcome.status(), "infeasible");
        assert_eq!(strict.outcome.diagnostic().unwrap().check, "section_filter");

        req.pole.allow_family_fallback = true;
        let relaxed = engine().solve(&req);
        assert!(relaxed.assumptions.iter().any(|a| a.contains("all families")));
        assert!(relaxed.outcome.diagnostic().map_or(true, |d| d.check != "section_filter"));
        if let Some(result) = relaxed.result() {
            assert_eq!(result.pole.section.family, SectionFamily::HssSquare);
        }
    }

    #[test]
    fn test_base_plate_design() {
        let mut req = request();
        req.site.soil_bearing_psf = None;
        req.foundation = FoundationRequest::BasePlate {
            concrete_fc_psi: Some(4000.0),
        };
        let env = engine().solve(&req);
        let result = env.result().expect("feasible base plate");
        match &result.foundation {
            FoundationDesign::BasePlate(e) => assert!(e.all_pass),
            other => panic!("expected base plate, got {:?}", other),
        }
        assert!(result.foundation_alternatives.iter().all(|e| e.all_pass));
    }

    #[test]
    fn test_same_request_same_hash() {
        let e = engine();
        let a = e.solve(&request()).content_hash().unwrap();
        let b = e.solve(&request()).content_hash().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_select_sections_empty_is_infeasible() {
        let query = SectionQuery::new(StrengthRequirement::SectionModulus { sx_in3: 500.0 });
        let env = engine().select_sections(&query);
        assert_eq!(env.outcome.status(), "infeasible");
        match env.outcome {
            Outcome::Infeasible { closest, .. } => assert!(closest.unwrap().closest.is_some()),
            other => panic!("expected infeasible, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_beyond_maximum_needs_review() {
        let input = DepthInput {
            moment_kipft: 400.0,
            load_arm_ft: 10.0,
            diameter_ft: 1.0,
            soil_bearing_psf: 3000.0,
            safety_factor: 1.5,
        };
        let env = engine().design_depth(&input);
        assert_eq!(env.outcome.status(), "infeasible");
        assert!(env.assumptions.iter().any(|a| a.contains("engineering review")));
    }

    #[test]
    fn test_contradictory_embedment_limits_are_infeasible() {
        let constants = ConstantsTable::builtin().with_override(keys::MIN_EMBEDMENT_FT, 20.0).unwrap();
        let snapshot = StandardsSnapshot::builtin().unwrap().with_constants(Arc::new(constants));
        let engine = DesignEngine::new(snapshot, EngineSettings::default()).unwrap();
        let input = DepthInput {
            moment_kipft: 30.0,
            load_arm_ft: 10.0,
            diameter_ft: 3.0,
            soil_bearing_psf: 3000.0,
            safety_factor: 1.5,
        };
        let env = engine.design_depth(&input);
        match env.outcome {
            Outcome::Infeasible { diagnostic, .. } => {
                assert_eq!(diagnostic.check, "bounds");
                assert_eq!(diagnostic.offending_values.len(), 2);
            }
            other => panic!("expected infeasible, got {:?}", other),
        }
    }

    #[test]
    fn test_tradeoff_inherits_design_confidence() {
        let engine = engine();
        let design = engine.solve(&request());
        assert!(design.is_feasible());
        let env = engine.pole_tradeoff_for(&design, "cost");
        assert!(env.is_feasible());
        assert!(env.confidence <= design.confidence);
        assert_eq!(env.trace.intermediates["upstream_confidence"], design.confidence);

        let mut missing = request();
        missing.site.wind_speed_mph = None;
        let abstained = engine.solve(&missing);
        let env = engine.pole_tradeoff_for(&abstained, "cost");
        assert_eq!(env.outcome.status(), "abstain");
        assert_eq!(env.confidence, ABSTAIN_CONFIDENCE);
    }

    #[test]
    fn test_pole_tradeoff_front() {
        let env = engine().pole_tradeoff(400.0, 15.0, None, "cost");
        let front = env.result().expect("front");
        assert!(!front.points.is_empty());
        let costs: Vec<f64> = front.points.iter().map(|p| p.values[0]).collect();
        assert!(costs.windows(2).all(|w| w[0] <= w[1]));
    }
}
