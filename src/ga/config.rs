//! Engine configuration.
//!
//! [`Config`] holds all parameters that control the generational loop.

use super::error::{Error, Result};

/// Problem mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Single-objective, non-interactive: each chromosome is scored by a
    /// per-chromosome fitness callback.
    Soga,
    /// Single-objective, interactive: a whole generation is scored at once
    /// and only elites carry over between generations.
    Iga,
    /// Many-objective via non-dominated sorting and reference-point
    /// niching.
    NsgaIii,
}

impl Mode {
    /// Whether this mode ranks by a scalar total cost.
    pub fn is_single_objective(self) -> bool {
        matches!(self, Mode::Soga | Mode::Iga)
    }

    /// Whether this mode requires user interaction per generation.
    ///
    /// Interactive runs never fan out to worker threads: the scoring
    /// callbacks may not be reentrant.
    pub fn is_interactive(self) -> bool {
        matches!(self, Mode::Iga)
    }
}

fn detected_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
}

/// Configuration for the genetic engine.
///
/// # Defaults
///
/// ```
/// use evokit::ga::{Config, Mode};
///
/// let config = Config::default();
/// assert_eq!(config.mode, Mode::Soga);
/// assert_eq!(config.population, 50);
/// assert_eq!(config.generation_max, 100);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use evokit::ga::{Config, Mode};
///
/// let config = Config::default()
///     .with_mode(Mode::NsgaIii)
///     .with_population(200)
///     .with_mutation_rate(0.2)
///     .with_seed(42);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Problem mode.
    pub mode: Mode,

    /// Target population size. Must be at least 1.
    pub population: usize,

    /// Fraction of the population produced by variation each generation,
    /// in `(0, 1]`. The offspring count is `round(population * fraction)`.
    pub crossover_fraction: f64,

    /// Per-child mutation probability, in `[0, 1]`.
    pub mutation_rate: f64,

    /// Number of top-ranked chromosomes transferred verbatim by
    /// single-objective selection. Must not exceed `population`.
    pub elite_count: usize,

    /// Hard generation cap.
    pub generation_max: usize,

    /// Average-cost stall tolerance: consecutive generations whose average
    /// cost changes by less than this count toward the stall window.
    pub tol_stall_average: f64,

    /// Number of stalled generations of average cost before stopping.
    pub average_stall_max: usize,

    /// Best-cost stall tolerance.
    pub tol_stall_best: f64,

    /// Number of stalled generations of best cost before stopping.
    pub best_stall_max: usize,

    /// Das–Dennis divisions for reference-vector generation. `0` selects
    /// the smallest division count whose vector count covers the
    /// population.
    pub reference_vector_divisions: usize,

    /// When disabled, the overflow front is filled uniformly at random
    /// instead of by niche counts.
    pub enable_reference_vectors: bool,

    /// Enables the worker pool for initialization and variation.
    pub multi_threading: bool,

    /// With the pool enabled: dynamic per-slot dispatch (`true`) or static
    /// chunked partitioning (`false`).
    pub dynamic_threading: bool,

    /// Worker count. Defaults to the detected hardware concurrency, 8 when
    /// detection fails. Must be at least 1.
    pub n_threads: usize,

    /// Driver idle sleep between result scans, in microseconds.
    pub idle_delay_us: u64,

    /// Sort backend for single-objective ranking: the hand-written
    /// quicksort (`true`) or the library sort (`false`).
    pub use_quick_sort: bool,

    /// Emits run diagnostics through `log::info!`.
    pub verbose: bool,

    /// Random seed. `None` draws a fresh seed per engine.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Soga,
            population: 50,
            crossover_fraction: 0.7,
            mutation_rate: 0.1,
            elite_count: 5,
            generation_max: 100,
            tol_stall_average: 1e-4,
            average_stall_max: 10,
            tol_stall_best: 1e-6,
            best_stall_max: 10,
            reference_vector_divisions: 0,
            enable_reference_vectors: true,
            multi_threading: true,
            dynamic_threading: true,
            n_threads: detected_threads(),
            idle_delay_us: 1000,
            use_quick_sort: true,
            verbose: false,
            seed: None,
        }
    }
}

impl Config {
    /// Sets the problem mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the population size.
    pub fn with_population(mut self, n: usize) -> Self {
        self.population = n;
        self
    }

    /// Sets the crossover fraction.
    pub fn with_crossover_fraction(mut self, fraction: f64) -> Self {
        self.crossover_fraction = fraction;
        self
    }

    /// Sets the mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    /// Sets the elite count.
    pub fn with_elite_count(mut self, n: usize) -> Self {
        self.elite_count = n;
        self
    }

    /// Sets the generation cap.
    pub fn with_generation_max(mut self, n: usize) -> Self {
        self.generation_max = n;
        self
    }

    /// Sets the average-cost stall tolerance.
    pub fn with_tol_stall_average(mut self, tol: f64) -> Self {
        self.tol_stall_average = tol;
        self
    }

    /// Sets the average-cost stall window.
    pub fn with_average_stall_max(mut self, n: usize) -> Self {
        self.average_stall_max = n;
        self
    }

    /// Sets the best-cost stall tolerance.
    pub fn with_tol_stall_best(mut self, tol: f64) -> Self {
        self.tol_stall_best = tol;
        self
    }

    /// Sets the best-cost stall window.
    pub fn with_best_stall_max(mut self, n: usize) -> Self {
        self.best_stall_max = n;
        self
    }

    /// Sets the reference-vector divisions (`0` = auto-select).
    pub fn with_reference_vector_divisions(mut self, divisions: usize) -> Self {
        self.reference_vector_divisions = divisions;
        self
    }

    /// Enables or disables reference-point niching in the overflow front.
    pub fn with_enable_reference_vectors(mut self, enable: bool) -> Self {
        self.enable_reference_vectors = enable;
        self
    }

    /// Enables or disables the worker pool.
    pub fn with_multi_threading(mut self, enable: bool) -> Self {
        self.multi_threading = enable;
        self
    }

    /// Selects dynamic (`true`) or static (`false`) pool scheduling.
    pub fn with_dynamic_threading(mut self, dynamic: bool) -> Self {
        self.dynamic_threading = dynamic;
        self
    }

    /// Sets the worker count.
    pub fn with_n_threads(mut self, n: usize) -> Self {
        self.n_threads = n;
        self
    }

    /// Sets the driver idle delay in microseconds.
    pub fn with_idle_delay_us(mut self, us: u64) -> Self {
        self.idle_delay_us = us;
        self
    }

    /// Selects the single-objective sort backend.
    pub fn with_use_quick_sort(mut self, quick: bool) -> Self {
        self.use_quick_sort = quick;
        self
    }

    /// Enables or disables run diagnostics.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the random seed for reproducible sequential runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the numeric options.
    ///
    /// Returns a descriptive [`Error::Config`] for the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.population < 1 {
            return Err(Error::config("population is below 1"));
        }
        if self.n_threads < 1 {
            return Err(Error::config("number of threads is below 1"));
        }
        if self.crossover_fraction <= 0.0 || self.crossover_fraction > 1.0 {
            return Err(Error::config(
                "crossover_fraction must be within (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(Error::config("mutation_rate must be within [0, 1]"));
        }
        if self.elite_count > self.population {
            return Err(Error::config(
                "elite_count must not exceed the population",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.mode, Mode::Soga);
        assert_eq!(config.population, 50);
        assert!((config.crossover_fraction - 0.7).abs() < 1e-10);
        assert!((config.mutation_rate - 0.1).abs() < 1e-10);
        assert_eq!(config.elite_count, 5);
        assert_eq!(config.generation_max, 100);
        assert_eq!(config.average_stall_max, 10);
        assert_eq!(config.best_stall_max, 10);
        assert_eq!(config.reference_vector_divisions, 0);
        assert!(config.enable_reference_vectors);
        assert!(config.multi_threading);
        assert!(config.dynamic_threading);
        assert!(config.n_threads >= 1);
        assert_eq!(config.idle_delay_us, 1000);
        assert!(config.use_quick_sort);
        assert!(!config.verbose);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = Config::default()
            .with_mode(Mode::NsgaIii)
            .with_population(200)
            .with_crossover_fraction(0.5)
            .with_mutation_rate(0.25)
            .with_elite_count(10)
            .with_generation_max(1000)
            .with_reference_vector_divisions(4)
            .with_multi_threading(false)
            .with_n_threads(2)
            .with_use_quick_sort(false)
            .with_seed(42);

        assert_eq!(config.mode, Mode::NsgaIii);
        assert_eq!(config.population, 200);
        assert!((config.crossover_fraction - 0.5).abs() < 1e-10);
        assert!((config.mutation_rate - 0.25).abs() < 1e-10);
        assert_eq!(config.elite_count, 10);
        assert_eq!(config.generation_max, 1000);
        assert_eq!(config.reference_vector_divisions, 4);
        assert!(!config.multi_threading);
        assert_eq!(config.n_threads, 2);
        assert!(!config.use_quick_sort);
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn test_mode_predicates() {
        assert!(Mode::Soga.is_single_objective());
        assert!(Mode::Iga.is_single_objective());
        assert!(!Mode::NsgaIii.is_single_objective());
        assert!(Mode::Iga.is_interactive());
        assert!(!Mode::Soga.is_interactive());
        assert!(!Mode::NsgaIii.is_interactive());
    }

    #[test]
    fn test_validate_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_population_too_small() {
        let config = Config::default().with_population(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_threads() {
        let config = Config::default().with_n_threads(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_crossover_fraction_bounds() {
        assert!(Config::default()
            .with_crossover_fraction(0.0)
            .validate()
            .is_err());
        assert!(Config::default()
            .with_crossover_fraction(1.5)
            .validate()
            .is_err());
        assert!(Config::default()
            .with_crossover_fraction(1.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validate_mutation_rate_bounds() {
        assert!(Config::default()
            .with_mutation_rate(-0.1)
            .validate()
            .is_err());
        assert!(Config::default().with_mutation_rate(1.1).validate().is_err());
        assert!(Config::default().with_mutation_rate(1.0).validate().is_ok());
    }

    #[test]
    fn test_validate_elite_exceeds_population() {
        let config = Config::default().with_population(4).with_elite_count(5);
        assert!(config.validate().is_err());
    }
}
