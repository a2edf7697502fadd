//! # Discrete Optimizers
//!
//! Search over designs built from catalog choices (plate widths, bolt sizes,
//! pole sections). A candidate is encoded as a genome of option indices, one
//! gene per choice, and decoded by its [`SearchSpace`].
//!
//! - [`genetic`] - single-objective genetic algorithm with elitism
//! - [`pareto`] - multi-objective archive search
//! - [`problems`] - base plate and pole selection problems
//!
//! Every run is seeded (`ChaCha20Rng`), so equal inputs and seed give equal
//! results.

pub mod genetic;
pub mod pareto;
pub mod problems;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};

pub use genetic::{optimize, GeneticOutcome, GeneticProblem, GeneticSettings, GeneticSolution};
pub use pareto::{pareto_search, Objective, ParetoFront, ParetoProblem, ParetoSettings};
pub use problems::{BasePlateProblem, PoleSelectionProblem};

/// A discrete design space.
pub trait SearchSpace {
    type Candidate: Clone;

    /// Number of options per gene
    fn gene_cardinalities(&self) -> Vec<usize>;

    /// Build the candidate a genome describes. Genes are always in range.
    fn decode(&self, genome: &[usize]) -> Self::Candidate;
}

/// Reject spaces a search cannot sample from.
pub(crate) fn checked_cardinalities<S: SearchSpace + ?Sized>(space: &S) -> CalcResult<Vec<usize>> {
    let cards = space.gene_cardinalities();
    if cards.is_empty() {
        return Err(CalcError::invalid_input(
            "search_space",
            "[]",
            "Search space has no genes",
        ));
    }
    if let Some(i) = cards.iter().position(|&c| c == 0) {
        return Err(CalcError::invalid_input(
            format!("search_space.gene[{}]", i),
            "0",
            "Discrete option set is empty",
        ));
    }
    Ok(cards)
}

pub(crate) fn random_genome<R: Rng + ?Sized>(rng: &mut R, cards: &[usize]) -> Vec<usize> {
    cards.iter().map(|&c| rng.gen_range(0..c)).collect()
}

pub(crate) fn uniform_crossover<R: Rng + ?Sized>(rng: &mut R, a: &[usize], b: &[usize]) -> Vec<usize> {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| if rng.gen::<bool>() { x } else { y })
        .collect()
}

/// Resample each gene with probability `rate`.
pub(crate) fn mutate<R: Rng + ?Sized>(rng: &mut R, genome: &mut [usize], cards: &[usize], rate: f64) {
    for (gene, &card) in genome.iter_mut().zip(cards) {
        if card > 1 && rng.gen::<f64>() < rate {
            *gene = rng.gen_range(0..card);
        }
    }
}

/// Optimization direction of an objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    Minimize,
    Maximize,
}

impl Sense {
    /// True if `a` is strictly better than `b`
    pub fn better(self, a: f64, b: f64) -> bool {
        match self {
            Sense::Minimize => a < b,
            Sense::Maximize => a > b,
        }
    }

    /// True if `a` is at least as good as `b`
    pub fn no_worse(self, a: f64, b: f64) -> bool {
        match self {
            Sense::Minimize => a <= b,
            Sense::Maximize => a >= b,
        }
    }
}

/// Stop once the best value improves by less than `tolerance` (relative)
/// for `patience` consecutive generations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveStopping {
    pub tolerance: f64,
    pub patience: u32,
}

impl Default for AdaptiveStopping {
    fn default() -> Self {
        AdaptiveStopping {
            tolerance: 1e-3,
            patience: 8,
        }
    }
}

impl AdaptiveStopping {
    pub fn validate(&self) -> CalcResult<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(CalcError::invalid_input(
                "stopping.tolerance",
                self.tolerance.to_string(),
                "Tolerance must be a non-negative number",
            ));
        }
        if self.patience == 0 {
            return Err(CalcError::invalid_input(
                "stopping.patience",
                "0",
                "Patience must be at least one generation",
            ));
        }
        Ok(())
    }

    pub fn tracker(&self) -> ProgressTracker {
        ProgressTracker {
            rule: self.clone(),
            best: None,
            stalled: 0,
        }
    }
}

/// Running state of an [`AdaptiveStopping`] rule (higher is better).
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    rule: AdaptiveStopping,
    best: Option<f64>,
    stalled: u32,
}

impl ProgressTracker {
    /// Record this generation's best value. Returns true on a real improvement.
    pub fn observe(&mut self, value: f64) -> bool {
        let Some(best) = self.best else {
            self.best = Some(value);
            self.stalled = 0;
            return true;
        };
        let gain = (value - best) / best.abs().max(f64::EPSILON);
        if value > best {
            self.best = Some(value);
        }
        if gain >= self.rule.tolerance && gain > 0.0 {
            self.stalled = 0;
            true
        } else {
            self.stalled += 1;
            false
        }
    }

    pub fn stalled(&self) -> u32 {
        self.stalled
    }

    pub fn converged(&self) -> bool {
        self.stalled >= self.rule.patience
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_tracker_converges_after_patience() {
        let mut t = AdaptiveStopping { tolerance: 1e-3, patience: 3 }.tracker();
        assert!(t.observe(-100.0));
        assert!(t.observe(-50.0));
        assert!(!t.observe(-50.0));
        assert!(!t.observe(-49.99));
        assert!(!t.converged());
        assert!(!t.observe(-49.99));
        assert!(t.converged());
        assert!(t.observe(-10.0));
        assert_eq!(t.stalled(), 0);
    }

    #[test]
    fn test_genome_operators_stay_in_range() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let cards = [3, 1, 7, 2];
        for _ in 0..200 {
            let a = random_genome(&mut rng, &cards);
            let b = random_genome(&mut rng, &cards);
            let mut c = uniform_crossover(&mut rng, &a, &b);
            mutate(&mut rng, &mut c, &cards, 0.5);
            assert!(c.iter().zip(&cards).all(|(&g, &n)| g < n));
            assert_eq!(c[1], 0);
        }
    }

    #[test]
    fn test_sense() {
        assert!(Sense::Minimize.better(1.0, 2.0));
        assert!(Sense::Maximize.better(2.0, 1.0));
        assert!(Sense::Minimize.no_worse(1.0, 1.0));
        assert!(!Sense::Maximize.no_worse(0.5, 1.0));
    }

    #[test]
    fn test_stopping_validation() {
        assert!(AdaptiveStopping { tolerance: -1.0, patience: 3 }.validate().is_err());
        assert!(AdaptiveStopping { tolerance: 1e-3, patience: 0 }.validate().is_err());
        assert!(AdaptiveStopping::default().validate().is_ok());
    }
}
