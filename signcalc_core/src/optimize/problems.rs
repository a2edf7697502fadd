//! Concrete design problems for the optimizers.

use serde::{Deserialize, Serialize};

use super::genetic::GeneticProblem;
use super::pareto::{Objective, ParetoProblem};
use super::SearchSpace;
use crate::errors::{ensure_positive, CalcResult};
use crate::foundation::baseplate::{
    evaluate_baseplate, BasePlateDesign, BasePlateEvaluation, BasePlateInput, BOLT_COUNTS,
    BOLT_DIAMETERS_IN, PLATE_THICKNESSES_IN, PLATE_WIDTHS_IN, WELD_SIZES_IN,
};
use crate::standards::constants::{keys, ConstantsTable};
use crate::standards::sections::{Section, SectionCatalog, SectionFamily};
use crate::units::{Feet, Inches};

// ============================================================================
// Base Plate
// ============================================================================

/// Cheapest base plate that passes every check.
///
/// Fitness is `-cost + margin_weight·(1 - max_utilization)`, so among
/// designs of similar cost the one with more reserve wins.
pub struct BasePlateProblem<'a> {
    pub input: &'a BasePlateInput,
    pub constants: &'a ConstantsTable,
    pub margin_weight: f64,
}

impl<'a> BasePlateProblem<'a> {
    pub fn new(input: &'a BasePlateInput, constants: &'a ConstantsTable) -> Self {
        BasePlateProblem {
            input,
            constants,
            margin_weight: 10.0,
        }
    }

    /// Run every base plate check on one design
    pub fn check(&self, design: &BasePlateDesign) -> CalcResult<BasePlateEvaluation> {
        evaluate_baseplate(self.input, design, self.constants)
    }
}

impl SearchSpace for BasePlateProblem<'_> {
    type Candidate = BasePlateDesign;

    fn gene_cardinalities(&self) -> Vec<usize> {
        vec![
            PLATE_WIDTHS_IN.len(),
            PLATE_THICKNESSES_IN.len(),
            BOLT_DIAMETERS_IN.len(),
            BOLT_COUNTS.len(),
            WELD_SIZES_IN.len(),
        ]
    }

    fn decode(&self, genome: &[usize]) -> BasePlateDesign {
        BasePlateDesign {
            width_in: PLATE_WIDTHS_IN[genome[0]],
            thickness_in: PLATE_THICKNESSES_IN[genome[1]],
            bolt_diameter_in: BOLT_DIAMETERS_IN[genome[2]],
            bolt_count: BOLT_COUNTS[genome[3]],
            weld_in: WELD_SIZES_IN[genome[4]],
        }
    }
}

impl GeneticProblem for BasePlateProblem<'_> {
    fn fitness(&self, design: &BasePlateDesign) -> CalcResult<Option<f64>> {
        let eval = self.check(design)?;
        if !eval.all_pass {
            return Ok(None);
        }
        Ok(Some(-eval.cost + self.margin_weight * (1.0 - eval.max_utilization)))
    }

    fn verify(&self, design: &BasePlateDesign) -> CalcResult<bool> {
        Ok(self.check(design)?.all_pass)
    }
}

impl ParetoProblem for BasePlateProblem<'_> {
    fn objectives(&self) -> Vec<Objective> {
        vec![Objective::minimize("cost"), Objective::maximize("margin")]
    }

    fn evaluate(&self, design: &BasePlateDesign) -> CalcResult<Option<Vec<f64>>> {
        let eval = self.check(design)?;
        if !eval.all_pass {
            return Ok(None);
        }
        Ok(Some(vec![eval.cost, 1.0 - eval.max_utilization]))
    }
}

// ============================================================================
// Pole Selection
// ============================================================================

/// Supply price per pound for a section family
pub fn pole_price_per_lb(family: SectionFamily, constants: &ConstantsTable) -> CalcResult<f64> {
    let key = match family {
        SectionFamily::HssSquare => keys::POLE_COST_PER_LB_HSS_SQUARE,
        SectionFamily::HssRound => keys::POLE_COST_PER_LB_HSS_ROUND,
        SectionFamily::Pipe => keys::POLE_COST_PER_LB_PIPE,
    };
    constants.get(key)
}

/// Cost, weight and margin of one pole choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoleMetrics {
    pub cost: f64,
    pub weight_lb: f64,
    /// `1 - Mu/φMn`
    pub margin: f64,
    pub slenderness: f64,
}

/// Trade-off between cost, weight and flexural reserve across the catalog.
pub struct PoleSelectionProblem<'a> {
    sections: Vec<&'a Section>,
    mu_kipin: f64,
    pole_length_ft: f64,
    constants: &'a ConstantsTable,
}

impl<'a> PoleSelectionProblem<'a> {
    pub fn new(
        catalog: &'a SectionCatalog,
        family: Option<SectionFamily>,
        mu_kipin: f64,
        pole_length_ft: f64,
        constants: &'a ConstantsTable,
    ) -> CalcResult<Self> {
        ensure_positive("mu_kipin", mu_kipin)?;
        ensure_positive("pole_length_ft", pole_length_ft)?;
        let sections = match family {
            Some(f) => catalog.of_family(f).collect(),
            None => catalog.sections().iter().collect(),
        };
        Ok(PoleSelectionProblem {
            sections,
            mu_kipin,
            pole_length_ft,
            constants,
        })
    }

    /// Metrics for a section, `None` if it fails strength or slenderness
    pub fn metrics(&self, section: &Section) -> CalcResult<Option<PoleMetrics>> {
        let phi_mn = self.constants.get(keys::PHI_BENDING)? * section.fy_ksi * section.sx_in3;
        let utilization = self.mu_kipin / phi_mn;
        let length_in = Inches::from(Feet(self.pole_length_ft)).value();
        let slenderness = section.slenderness(self.constants.get(keys::CANTILEVER_K)?, length_in);
        if utilization > 1.0 || slenderness > self.constants.get(keys::SLENDERNESS_LIMIT)? {
            return Ok(None);
        }
        let weight_lb = section.weight_plf * self.pole_length_ft;
        Ok(Some(PoleMetrics {
            cost: weight_lb * pole_price_per_lb(section.family, self.constants)?,
            weight_lb,
            margin: 1.0 - utilization,
            slenderness,
        }))
    }
}

impl SearchSpace for PoleSelectionProblem<'_> {
    type Candidate = Section;

    fn gene_cardinalities(&self) -> Vec<usize> {
        vec![self.sections.len()]
    }

    fn decode(&self, genome: &[usize]) -> Section {
        self.sections[genome[0]].clone()
    }
}

impl ParetoProblem for PoleSelectionProblem<'_> {
    fn objectives(&self) -> Vec<Objective> {
        vec![
            Objective::minimize("cost"),
            Objective::minimize("weight"),
            Objective::maximize("margin"),
        ]
    }

    fn evaluate(&self, section: &Section) -> CalcResult<Option<Vec<f64>>> {
        Ok(self
            .metrics(section)?
            .map(|m| vec![m.cost, m.weight_lb, m.margin]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::baseplate::{BasePlateLoads, PoleProfile};
    use crate::optimize::genetic::{optimize, GeneticOutcome, GeneticSettings};
    use crate::optimize::pareto::{dominates, pareto_search, ParetoSettings};

    fn plate_input() -> BasePlateInput {
        BasePlateInput {
            loads: BasePlateLoads {
                moment_kipft: 40.0,
                shear_kip: 2.5,
                axial_kip: 1.0,
            },
            pole: PoleProfile {
                outer_dim_in: 8.0,
                wall_in: 0.233,
                is_round: false,
            },
            concrete_fc_psi: 3000.0,
        }
    }

    #[test]
    fn test_baseplate_ga_returns_passing_design() {
        let input = plate_input();
        let constants = ConstantsTable::builtin();
        let problem = BasePlateProblem::new(&input, &constants);
        match optimize(&problem, &GeneticSettings::default()).unwrap() {
            GeneticOutcome::Found(sol) => {
                let eval = problem.check(&sol.best.candidate).unwrap();
                assert!(eval.all_pass);
                for alt in &sol.alternatives {
                    assert!(problem.check(&alt.candidate).unwrap().all_pass);
                    assert!(alt.fitness <= sol.best.fitness);
                }
            }
            other => panic!("expected a design, got {:?}", other),
        }
    }

    #[test]
    fn test_impossible_moment_has_no_design() {
        let mut input = plate_input();
        input.loads.moment_kipft = 50_000.0;
        let constants = ConstantsTable::builtin();
        let problem = BasePlateProblem::new(&input, &constants);
        let settings = GeneticSettings {
            max_generations: 10,
            ..GeneticSettings::default()
        };
        assert!(matches!(
            optimize(&problem, &settings).unwrap(),
            GeneticOutcome::NoFeasibleDesign { .. }
        ));
    }

    #[test]
    fn test_pole_front_non_dominated() {
        let catalog = SectionCatalog::builtin().unwrap();
        let constants = ConstantsTable::builtin();
        let problem = PoleSelectionProblem::new(&catalog, None, 600.0, 20.0, &constants).unwrap();
        let front = pareto_search(&problem, &ParetoSettings::default(), "cost").unwrap();
        assert!(!front.is_empty());
        for a in &front.points {
            assert!(problem.metrics(&a.candidate).unwrap().is_some());
            for b in &front.points {
                assert!(!dominates(&a.values, &b.values, &front.objectives));
            }
        }
        for pair in front.points.windows(2) {
            assert!(pair[0].values[0] <= pair[1].values[0]);
        }
    }

    #[test]
    fn test_pole_price_by_family() {
        let c = ConstantsTable::builtin();
        assert_eq!(pole_price_per_lb(SectionFamily::Pipe, &c).unwrap(), 1.0);
        assert!(pole_price_per_lb(SectionFamily::HssRound, &c).unwrap() > pole_price_per_lb(SectionFamily::HssSquare, &c).unwrap());
    }
}
