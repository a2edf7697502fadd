//! # Pareto Search
//!
//! Multi-objective search that keeps an elitist archive of non-dominated
//! designs.
//!
//! Candidate A dominates B when A is no worse than B on every objective and
//! strictly better on at least one (with each objective's [`Sense`]).
//!
//! Each generation breeds children from the archive and the current
//! population, evaluates them and merges the feasible ones into the archive.
//! An archive member is only removed when something dominates it, or when
//! the archive is over its size limit and the member sits in the most
//! crowded region. The search stops after `stagnation_generations`
//! generations without an archive change, or at the generation cap.

use std::collections::HashSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{checked_cardinalities, mutate, random_genome, uniform_crossover, SearchSpace, Sense};
use crate::errors::{CalcError, CalcResult};

/// A named objective with its direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    pub sense: Sense,
}

impl Objective {
    pub fn minimize(name: &str) -> Self {
        Objective {
            name: name.to_string(),
            sense: Sense::Minimize,
        }
    }

    pub fn maximize(name: &str) -> Self {
        Objective {
            name: name.to_string(),
            sense: Sense::Maximize,
        }
    }
}

/// A problem with several competing objectives
pub trait ParetoProblem: SearchSpace {
    fn objectives(&self) -> Vec<Objective>;

    /// Objective values in [`ParetoProblem::objectives`] order, or `None`
    /// when the candidate is infeasible.
    fn evaluate(&self, candidate: &Self::Candidate) -> CalcResult<Option<Vec<f64>>>;
}

/// True when `a` dominates `b`
pub fn dominates(a: &[f64], b: &[f64], objectives: &[Objective]) -> bool {
    let mut strictly = false;
    for ((x, y), o) in a.iter().zip(b).zip(objectives) {
        if !o.sense.no_worse(*x, *y) {
            return false;
        }
        if o.sense.better(*x, *y) {
            strictly = true;
        }
    }
    strictly
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParetoSettings {
    pub population_size: usize,
    pub max_generations: u32,
    /// Archive size before crowding thinning kicks in
    pub archive_limit: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    /// Generations without an archive change before stopping
    pub stagnation_generations: u32,
    pub seed: u64,
}

impl Default for ParetoSettings {
    fn default() -> Self {
        ParetoSettings {
            population_size: 40,
            max_generations: 60,
            archive_limit: 50,
            crossover_rate: 0.9,
            mutation_rate: 0.15,
            stagnation_generations: 10,
            seed: 42,
        }
    }
}

impl ParetoSettings {
    pub fn validate(&self) -> CalcResult<()> {
        if self.population_size < 2 {
            return Err(CalcError::invalid_input(
                "pareto.population_size",
                self.population_size.to_string(),
                "Population needs at least two members",
            ));
        }
        if self.archive_limit < 2 {
            return Err(CalcError::invalid_input(
                "pareto.archive_limit",
                self.archive_limit.to_string(),
                "Archive must hold at least two designs",
            ));
        }
        if self.max_generations == 0 || self.stagnation_generations == 0 {
            return Err(CalcError::invalid_input(
                "pareto.max_generations",
                format!("{}/{}", self.max_generations, self.stagnation_generations),
                "Generation cap and stagnation window must be positive",
            ));
        }
        for (field, value) in [
            ("pareto.crossover_rate", self.crossover_rate),
            ("pareto.mutation_rate", self.mutation_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CalcError::invalid_input(field, value.to_string(), "Must be between 0 and 1"));
            }
        }
        Ok(())
    }
}

/// One non-dominated design
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoPoint<C> {
    pub candidate: C,
    pub genome: Vec<usize>,
    pub values: Vec<f64>,
}

/// The final non-dominated set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoFront<C> {
    pub objectives: Vec<Objective>,
    /// Sorted best-first on `primary`
    pub points: Vec<ParetoPoint<C>>,
    pub primary: String,
    pub generations: u32,
    pub evaluations: usize,
    /// Stopped because the archive stabilized (not at the cap)
    pub converged: bool,
}

impl<C> ParetoFront<C> {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Value of a named objective for one point
    pub fn value(&self, point: &ParetoPoint<C>, objective: &str) -> Option<f64> {
        self.objectives
            .iter()
            .position(|o| o.name == objective)
            .and_then(|i| point.values.get(i).copied())
    }
}

struct Archive<C> {
    points: Vec<ParetoPoint<C>>,
}

impl<C: Clone> Archive<C> {
    /// Merge one point. Returns true if the archive changed.
    fn offer(&mut self, point: ParetoPoint<C>, objectives: &[Objective]) -> bool {
        if self
            .points
            .iter()
            .any(|p| p.genome == point.genome || p.values == point.values || dominates(&p.values, &point.values, objectives))
        {
            return false;
        }
        self.points.retain(|p| !dominates(&point.values, &p.values, objectives));
        self.points.push(point);
        true
    }

    /// Drop the most crowded members until the archive fits
    fn thin(&mut self, limit: usize, objectives: &[Objective]) {
        while self.points.len() > limit {
            let distances = crowding_distances(&self.points, objectives.len());
            let Some(victim) = distances
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
            else {
                return;
            };
            self.points.remove(victim);
        }
    }
}

/// NSGA-II crowding distance; boundary points get `+∞`
fn crowding_distances<C>(points: &[ParetoPoint<C>], n_objectives: usize) -> Vec<f64> {
    let n = points.len();
    let mut distance = vec![0.0; n];
    for m in 0..n_objectives {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| points[a].values[m].total_cmp(&points[b].values[m]));
        let lo = points[order[0]].values[m];
        let hi = points[order[n - 1]].values[m];
        distance[order[0]] = f64::INFINITY;
        distance[order[n - 1]] = f64::INFINITY;
        let span = hi - lo;
        if span <= 0.0 {
            continue;
        }
        for w in 1..n - 1 {
            let gap = points[order[w + 1]].values[m] - points[order[w - 1]].values[m];
            distance[order[w]] += gap / span;
        }
    }
    distance
}

/// Run the archive search and sort the front on `primary`.
pub fn pareto_search<P: ParetoProblem>(
    problem: &P,
    settings: &ParetoSettings,
    primary: &str,
) -> CalcResult<ParetoFront<P::Candidate>> {
    settings.validate()?;
    let cards = checked_cardinalities(problem)?;
    let objectives = problem.objectives();
    let Some(primary_index) = objectives.iter().position(|o| o.name == primary) else {
        return Err(CalcError::unknown_category(
            "primary",
            primary,
            &objectives.iter().map(|o| o.name.as_str()).collect::<Vec<_>>(),
        ));
    };

    let mut rng = ChaCha20Rng::seed_from_u64(settings.seed);
    let mut archive = Archive { points: Vec::new() };
    let mut seen: HashSet<Vec<usize>> = HashSet::new();

    let mut evaluate = |genome: Vec<usize>, archive: &mut Archive<P::Candidate>| -> CalcResult<bool> {
        if !seen.insert(genome.clone()) {
            return Ok(false);
        }
        let candidate = problem.decode(&genome);
        let Some(values) = problem.evaluate(&candidate)? else {
            return Ok(false);
        };
        if values.len() != objectives.len() {
            return Err(CalcError::Internal {
                message: format!("{} objective values for {} objectives", values.len(), objectives.len()),
            });
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(CalcError::numeric("objective", *bad));
        }
        Ok(archive.offer(ParetoPoint { candidate, genome, values }, &objectives))
    };

    let mut population: Vec<Vec<usize>> = (0..settings.population_size)
        .map(|_| random_genome(&mut rng, &cards))
        .collect();
    for genome in &population {
        evaluate(genome.clone(), &mut archive)?;
    }
    archive.thin(settings.archive_limit, &objectives);

    let mut stale = 0;
    let mut generation = 1;
    let mut converged = false;
    while generation < settings.max_generations {
        generation += 1;

        let mut parents: Vec<Vec<usize>> = archive.points.iter().map(|p| p.genome.clone()).collect();
        parents.extend(population.iter().cloned());

        let mut children = Vec::with_capacity(settings.population_size);
        let mut changed = false;
        for _ in 0..settings.population_size {
            let a = &parents[rng.gen_range(0..parents.len())];
            let b = &parents[rng.gen_range(0..parents.len())];
            let mut child = if rng.gen::<f64>() < settings.crossover_rate {
                uniform_crossover(&mut rng, a, b)
            } else {
                a.clone()
            };
            mutate(&mut rng, &mut child, &cards, settings.mutation_rate);
            changed |= evaluate(child.clone(), &mut archive)?;
            children.push(child);
        }
        archive.thin(settings.archive_limit, &objectives);
        population = children;

        stale = if changed { 0 } else { stale + 1 };
        if stale >= settings.stagnation_generations {
            converged = true;
            break;
        }
    }

    let evaluations = seen.len();
    let sense = objectives[primary_index].sense;
    let mut points = archive.points;
    points.sort_by(|a, b| {
        let (x, y) = (a.values[primary_index], b.values[primary_index]);
        let ord = x.total_cmp(&y);
        let ord = if sense == Sense::Maximize { ord.reverse() } else { ord };
        ord.then_with(|| a.genome.cmp(&b.genome))
    });
    debug!(generation, evaluations, front = points.len(), converged, "pareto search finished");

    Ok(ParetoFront {
        objectives,
        points,
        primary: primary.to_string(),
        generations: generation,
        evaluations,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// x in 0..20: cost = x, benefit = sqrt(x); every point is non-dominated
    /// except that odd x are infeasible.
    struct Tradeoff;

    impl SearchSpace for Tradeoff {
        type Candidate = usize;
        fn gene_cardinalities(&self) -> Vec<usize> {
            vec![20]
        }
        fn decode(&self, genome: &[usize]) -> usize {
            genome[0]
        }
    }

    impl ParetoProblem for Tradeoff {
        fn objectives(&self) -> Vec<Objective> {
            vec![Objective::minimize("cost"), Objective::maximize("benefit")]
        }
        fn evaluate(&self, x: &usize) -> CalcResult<Option<Vec<f64>>> {
            if x % 2 == 1 {
                return Ok(None);
            }
            Ok(Some(vec![*x as f64, (*x as f64).sqrt()]))
        }
    }

    #[test]
    fn test_dominance() {
        let objs = vec![Objective::minimize("cost"), Objective::maximize("margin")];
        assert!(dominates(&[1.0, 0.5], &[2.0, 0.5], &objs));
        assert!(!dominates(&[1.0, 0.5], &[1.0, 0.5], &objs));
        assert!(!dominates(&[1.0, 0.4], &[2.0, 0.5], &objs));
    }

    #[test]
    fn test_front_is_non_dominated_and_sorted() {
        let front = pareto_search(&Tradeoff, &ParetoSettings::default(), "cost").unwrap();
        assert!(!front.is_empty());
        for a in &front.points {
            assert!(a.candidate % 2 == 0);
            for b in &front.points {
                assert!(!dominates(&a.values, &b.values, &front.objectives));
            }
        }
        for pair in front.points.windows(2) {
            assert!(pair[0].values[0] <= pair[1].values[0]);
        }
        assert_eq!(front.points.len(), 10);
    }

    #[test]
    fn test_primary_maximize_sorts_descending() {
        let front = pareto_search(&Tradeoff, &ParetoSettings::default(), "benefit").unwrap();
        for pair in front.points.windows(2) {
            assert!(pair[0].values[1] >= pair[1].values[1]);
        }
        assert_eq!(front.value(&front.points[0], "benefit"), Some(18f64.sqrt()));
    }

    #[test]
    fn test_archive_limit_keeps_extremes() {
        let settings = ParetoSettings {
            archive_limit: 4,
            ..ParetoSettings::default()
        };
        let front = pareto_search(&Tradeoff, &settings, "cost").unwrap();
        assert_eq!(front.points.len(), 4);
        assert_eq!(front.points[0].candidate, 0);
        assert_eq!(front.points[3].candidate, 18);
    }

    #[test]
    fn test_unknown_primary_rejected() {
        assert!(pareto_search(&Tradeoff, &ParetoSettings::default(), "weight").is_err());
    }
}
