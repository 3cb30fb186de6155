//! Core data types of the generational loop.

use std::fmt;

/// Thread-safe uniform(0, 1) source handed to user callbacks.
///
/// Draws are serialized over the engine's seeded generator, so callbacks
/// running on worker threads may call it freely.
pub type Rnd01<'a> = dyn Fn() -> f64 + Sync + 'a;

/// A candidate solution together with its evaluation results.
///
/// `genes` and `middle_costs` are opaque to the engine: genes encode the
/// candidate, middle costs carry whatever intermediate data the user's
/// evaluator wants to hand to the fitness callbacks.
#[derive(Debug, Clone)]
pub struct Chromosome<G, M> {
    /// User-defined candidate representation.
    pub genes: G,
    /// User-defined intermediate evaluation data.
    pub middle_costs: M,
    /// Scalar cost, filled in single-objective modes.
    pub total_cost: f64,
    /// Objective vector, filled in many-objective mode.
    pub objectives: Vec<f64>,
}

impl<G, M: Default> Chromosome<G, M> {
    pub(crate) fn from_genes(genes: G) -> Self {
        Self {
            genes,
            middle_costs: M::default(),
            total_cost: 0.0,
            objectives: Vec::new(),
        }
    }
}

/// One generation of the population, with its ranking artifacts.
#[derive(Debug, Clone)]
pub struct Generation<G, M> {
    /// Members of this generation.
    pub chromosomes: Vec<Chromosome<G, M>>,
    /// Minimum total cost (single-objective).
    pub best_total_cost: f64,
    /// Arithmetic mean of total costs (single-objective).
    pub average_cost: f64,
    /// Index of the best chromosome, set by the generation summary
    /// (single-objective).
    pub best_chromosome_index: Option<usize>,
    /// Chromosome indices ordered by ascending total cost
    /// (single-objective).
    pub sorted_indices: Vec<usize>,
    /// Pareto fronts: `fronts[0]` is the current non-dominated set
    /// (many-objective).
    pub fronts: Vec<Vec<usize>>,
    /// Non-decreasing cumulative selection distribution over chromosome
    /// indices; the final entry is 1.0.
    pub selection_chance_cumulative: Vec<f64>,
    /// Wall-clock seconds spent producing this generation.
    pub exe_time: f64,
}

impl<G, M> Default for Generation<G, M> {
    fn default() -> Self {
        Self {
            chromosomes: Vec::new(),
            best_total_cost: f64::INFINITY,
            average_cost: 0.0,
            best_chromosome_index: None,
            sorted_indices: Vec::new(),
            fronts: Vec::new(),
            selection_chance_cumulative: Vec::new(),
            exe_time: 0.0,
        }
    }
}

/// Compact per-generation record kept for stall detection.
#[derive(Debug, Clone, Copy)]
pub struct SoAbstract {
    /// Best total cost of the generation.
    pub best_total_cost: f64,
    /// Average total cost of the generation.
    pub average_cost: f64,
}

impl SoAbstract {
    pub(crate) fn of<G, M>(generation: &Generation<G, M>) -> Self {
        Self {
            best_total_cost: generation.best_total_cost,
            average_cost: generation.average_cost,
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No stop criterion has fired yet.
    Undefined,
    /// The generation cap was reached.
    MaxGenerations,
    /// Average cost stalled for the configured window.
    StallAverage,
    /// Best cost stalled for the configured window.
    StallBest,
    /// The external stop flag was raised.
    UserRequest,
}

impl StopReason {
    /// Human-readable description of the stop reason.
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Undefined => "No-stop",
            StopReason::MaxGenerations => "Maximum generation reached",
            StopReason::StallAverage => "Average stalled",
            StopReason::StallBest => "Best stalled",
            StopReason::UserRequest => "User request",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_default() {
        let g: Generation<f64, ()> = Generation::default();
        assert!(g.chromosomes.is_empty());
        assert!(g.best_total_cost.is_infinite());
        assert_eq!(g.average_cost, 0.0);
        assert!(g.best_chromosome_index.is_none());
        assert!(g.sorted_indices.is_empty());
        assert!(g.fronts.is_empty());
    }

    #[test]
    fn test_stop_reason_strings() {
        assert_eq!(StopReason::Undefined.as_str(), "No-stop");
        assert_eq!(
            StopReason::MaxGenerations.as_str(),
            "Maximum generation reached"
        );
        assert_eq!(StopReason::StallAverage.as_str(), "Average stalled");
        assert_eq!(StopReason::StallBest.as_str(), "Best stalled");
        assert_eq!(StopReason::UserRequest.as_str(), "User request");
        assert_eq!(StopReason::StallBest.to_string(), "Best stalled");
    }

    #[test]
    fn test_so_abstract_copies_summary() {
        let mut g: Generation<f64, ()> = Generation::default();
        g.best_total_cost = 1.5;
        g.average_cost = 2.5;
        let a = SoAbstract::of(&g);
        assert_eq!(a.best_total_cost, 1.5);
        assert_eq!(a.average_cost, 2.5);
    }
}
