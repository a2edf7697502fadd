//! # Genetic Algorithm
//!
//! Single-objective search over a [`SearchSpace`].
//!
//! - Fitness is maximized. Infeasible candidates score `-∞`; they stay in the
//!   population (they still carry genes) but can never be returned.
//! - Elitism: the top `elite_fraction` of each generation survives unchanged.
//! - Parents by tournament, children by uniform crossover and per-gene
//!   mutation.
//! - The mutation rate is raised by `mutation_boost` after every
//!   `stagnation_generations` generations without improvement (up to
//!   `max_mutation_rate`) and drops back to the base rate on improvement.
//! - Stops at the generation cap or when [`AdaptiveStopping`] reports
//!   convergence.
//!
//! Candidates are re-verified before they are returned. When nothing
//! feasible was found the outcome is [`GeneticOutcome::NoFeasibleDesign`].

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{checked_cardinalities, mutate, random_genome, uniform_crossover, AdaptiveStopping, SearchSpace};
use crate::errors::{CalcError, CalcResult};

/// A problem the genetic algorithm can solve
pub trait GeneticProblem: SearchSpace {
    /// Fitness to maximize, or `None` when the candidate violates a constraint
    fn fitness(&self, candidate: &Self::Candidate) -> CalcResult<Option<f64>>;

    /// Full constraint check, run again on every candidate before it is returned
    fn verify(&self, candidate: &Self::Candidate) -> CalcResult<bool>;
}

/// Genetic algorithm controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticSettings {
    pub population_size: usize,
    pub max_generations: u32,
    pub elite_fraction: f64,
    pub tournament_size: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub mutation_boost: f64,
    pub max_mutation_rate: f64,
    pub stagnation_generations: u32,
    pub stopping: AdaptiveStopping,
    /// Feasible runners-up returned besides the best
    pub alternatives: usize,
    pub seed: u64,
}

impl Default for GeneticSettings {
    fn default() -> Self {
        GeneticSettings {
            population_size: 50,
            max_generations: 100,
            elite_fraction: 0.1,
            tournament_size: 3,
            crossover_rate: 0.9,
            mutation_rate: 0.1,
            mutation_boost: 1.5,
            max_mutation_rate: 0.6,
            stagnation_generations: 5,
            stopping: AdaptiveStopping::default(),
            alternatives: 3,
            seed: 42,
        }
    }
}

impl GeneticSettings {
    pub fn validate(&self) -> CalcResult<()> {
        if self.population_size < 2 {
            return Err(CalcError::invalid_input(
                "genetic.population_size",
                self.population_size.to_string(),
                "Population needs at least two members",
            ));
        }
        if self.max_generations == 0 {
            return Err(CalcError::invalid_input(
                "genetic.max_generations",
                "0",
                "At least one generation is required",
            ));
        }
        if self.tournament_size == 0 {
            return Err(CalcError::invalid_input(
                "genetic.tournament_size",
                "0",
                "Tournament needs at least one entrant",
            ));
        }
        for (field, value) in [
            ("genetic.elite_fraction", self.elite_fraction),
            ("genetic.crossover_rate", self.crossover_rate),
            ("genetic.mutation_rate", self.mutation_rate),
            ("genetic.max_mutation_rate", self.max_mutation_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CalcError::invalid_input(field, value.to_string(), "Must be between 0 and 1"));
            }
        }
        if self.mutation_rate > self.max_mutation_rate {
            return Err(CalcError::invalid_input(
                "genetic.mutation_rate",
                self.mutation_rate.to_string(),
                format!("Base rate exceeds max_mutation_rate ({})", self.max_mutation_rate),
            ));
        }
        if !(self.mutation_boost >= 1.0) {
            return Err(CalcError::invalid_input(
                "genetic.mutation_boost",
                self.mutation_boost.to_string(),
                "Boost must be at least 1.0",
            ));
        }
        self.stopping.validate()
    }

    fn elite_count(&self) -> usize {
        ((self.population_size as f64 * self.elite_fraction).ceil() as usize).min(self.population_size)
    }
}

/// Why the search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Converged,
    GenerationCap,
}

/// A verified design with its fitness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate<C> {
    pub candidate: C,
    pub genome: Vec<usize>,
    pub fitness: f64,
}

/// Successful search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticSolution<C> {
    pub best: ScoredCandidate<C>,
    /// Next-best distinct feasible designs, best first
    pub alternatives: Vec<ScoredCandidate<C>>,
    pub generations: u32,
    pub evaluations: usize,
    pub stop_reason: StopReason,
    /// Best feasible fitness per generation (`-∞` before the first feasible)
    pub history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GeneticOutcome<C> {
    Found(GeneticSolution<C>),
    NoFeasibleDesign { generations: u32, evaluations: usize },
}

struct Evaluator<'a, P: GeneticProblem> {
    problem: &'a P,
    cache: HashMap<Vec<usize>, f64>,
}

impl<'a, P: GeneticProblem> Evaluator<'a, P> {
    fn score(&mut self, genome: &[usize]) -> CalcResult<f64> {
        if let Some(&f) = self.cache.get(genome) {
            return Ok(f);
        }
        let candidate = self.problem.decode(genome);
        let fitness = match self.problem.fitness(&candidate)? {
            Some(f) if f.is_finite() => f,
            Some(f) => return Err(CalcError::numeric("fitness", f)),
            None => f64::NEG_INFINITY,
        };
        self.cache.insert(genome.to_vec(), fitness);
        Ok(fitness)
    }
}

fn tournament<'p, R: Rng + ?Sized>(
    rng: &mut R,
    population: &'p [(Vec<usize>, f64)],
    size: usize,
) -> &'p [usize] {
    let mut winner = &population[rng.gen_range(0..population.len())];
    for _ in 1..size {
        let entrant = &population[rng.gen_range(0..population.len())];
        if entrant.1 > winner.1 {
            winner = entrant;
        }
    }
    &winner.0
}

fn rank(population: &mut [(Vec<usize>, f64)]) {
    population.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

/// Run the genetic algorithm.
pub fn optimize<P: GeneticProblem>(
    problem: &P,
    settings: &GeneticSettings,
) -> CalcResult<GeneticOutcome<P::Candidate>> {
    settings.validate()?;
    let cards = checked_cardinalities(problem)?;

    let mut rng = ChaCha20Rng::seed_from_u64(settings.seed);
    let mut eval = Evaluator {
        problem,
        cache: HashMap::new(),
    };
    let mut population = Vec::with_capacity(settings.population_size);
    for _ in 0..settings.population_size {
        let genome = random_genome(&mut rng, &cards);
        let fitness = eval.score(&genome)?;
        population.push((genome, fitness));
    }

    let mut tracker = settings.stopping.tracker();
    let mut rate = settings.mutation_rate;
    let mut history = Vec::new();
    let mut generation = 0;
    let stop_reason = loop {
        generation += 1;
        rank(&mut population);
        let best = population[0].1;
        history.push(best);

        if best.is_finite() {
            if tracker.observe(best) {
                rate = settings.mutation_rate;
            } else if tracker.stalled() % settings.stagnation_generations.max(1) == 0 {
                rate = (rate * settings.mutation_boost).min(settings.max_mutation_rate);
                debug!(generation, rate, "raising mutation rate");
            }
            if tracker.converged() {
                break StopReason::Converged;
            }
        }
        if generation >= settings.max_generations {
            break StopReason::GenerationCap;
        }

        let elites = settings.elite_count();
        let mut next: Vec<(Vec<usize>, f64)> = population[..elites].to_vec();
        while next.len() < settings.population_size {
            let a = tournament(&mut rng, &population, settings.tournament_size);
            let b = tournament(&mut rng, &population, settings.tournament_size);
            let mut child = if rng.gen::<f64>() < settings.crossover_rate {
                uniform_crossover(&mut rng, a, b)
            } else {
                a.to_vec()
            };
            mutate(&mut rng, &mut child, &cards, rate);
            let fitness = eval.score(&child)?;
            next.push((child, fitness));
        }
        population = next;
    };

    let evaluations = eval.cache.len();
    debug!(generation, evaluations, ?stop_reason, "genetic search finished");

    // Every distinct feasible genome seen, best first, re-verified before return
    let mut feasible: Vec<(Vec<usize>, f64)> = eval
        .cache
        .into_iter()
        .filter(|(_, f)| f.is_finite())
        .collect();
    rank(&mut feasible);

    let mut verified = Vec::new();
    for (genome, fitness) in feasible {
        let candidate = problem.decode(&genome);
        if problem.verify(&candidate)? {
            verified.push(ScoredCandidate {
                candidate,
                genome,
                fitness,
            });
            if verified.len() > settings.alternatives {
                break;
            }
        }
    }

    let mut verified = verified.into_iter();
    match verified.next() {
        Some(best) => Ok(GeneticOutcome::Found(GeneticSolution {
            best,
            alternatives: verified.collect(),
            generations: generation,
            evaluations,
            stop_reason,
            history,
        })),
        None => Ok(GeneticOutcome::NoFeasibleDesign {
            generations: generation,
            evaluations,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Maximize 100 - (x-7)² - 2(y-3)² subject to x + y ≤ 9.
    struct Quadratic;

    impl SearchSpace for Quadratic {
        type Candidate = (usize, usize);
        fn gene_cardinalities(&self) -> Vec<usize> {
            vec![10, 10]
        }
        fn decode(&self, genome: &[usize]) -> (usize, usize) {
            (genome[0], genome[1])
        }
    }

    impl GeneticProblem for Quadratic {
        fn fitness(&self, c: &(usize, usize)) -> CalcResult<Option<f64>> {
            if c.0 + c.1 > 9 {
                return Ok(None);
            }
            let (x, y) = (c.0 as f64, c.1 as f64);
            Ok(Some(100.0 - (x - 7.0).powi(2) - 2.0 * (y - 3.0).powi(2)))
        }
        fn verify(&self, c: &(usize, usize)) -> CalcResult<bool> {
            Ok(c.0 + c.1 <= 9)
        }
    }

    struct Impossible;

    impl SearchSpace for Impossible {
        type Candidate = usize;
        fn gene_cardinalities(&self) -> Vec<usize> {
            vec![5]
        }
        fn decode(&self, genome: &[usize]) -> usize {
            genome[0]
        }
    }

    impl GeneticProblem for Impossible {
        fn fitness(&self, _: &usize) -> CalcResult<Option<f64>> {
            Ok(None)
        }
        fn verify(&self, _: &usize) -> CalcResult<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_finds_constrained_optimum() {
        let outcome = optimize(&Quadratic, &GeneticSettings::default()).unwrap();
        match outcome {
            GeneticOutcome::Found(sol) => {
                assert_eq!(sol.best.candidate, (6, 3));
                assert!(sol.best.candidate.0 + sol.best.candidate.1 <= 9);
                assert!(sol.alternatives.iter().all(|a| a.fitness <= sol.best.fitness));
                assert!(sol.alternatives.iter().all(|a| a.candidate.0 + a.candidate.1 <= 9));
                assert!(sol.generations <= 100);
            }
            other => panic!("expected a design, got {:?}", other),
        }
    }

    #[test]
    fn test_no_feasible_design() {
        let settings = GeneticSettings {
            max_generations: 5,
            ..GeneticSettings::default()
        };
        let outcome = optimize(&Impossible, &settings).unwrap();
        assert_eq!(
            outcome,
            GeneticOutcome::NoFeasibleDesign {
                generations: 5,
                evaluations: 5
            }
        );
    }

    #[test]
    fn test_same_seed_same_answer() {
        let a = optimize(&Quadratic, &GeneticSettings::default()).unwrap();
        let b = optimize(&Quadratic, &GeneticSettings::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_history_never_regresses() {
        if let GeneticOutcome::Found(sol) = optimize(&Quadratic, &GeneticSettings::default()).unwrap() {
            for pair in sol.history.windows(2) {
                assert!(pair[1] >= pair[0]);
            }
        }
    }

    #[test]
    fn test_rejects_bad_settings() {
        let settings = GeneticSettings {
            population_size: 1,
            ..GeneticSettings::default()
        };
        assert!(optimize(&Quadratic, &settings).is_err());
    }
}
