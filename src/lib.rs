//! Generational evolutionary optimization engine.
//!
//! Drives a population of candidate solutions toward optima of user-defined
//! objective functions. Three problem modes share one generational driver:
//!
//! - **SOGA**: single-objective genetic optimization with rank-biased
//!   roulette selection and elitism.
//! - **IGA**: interactive single-objective optimization, where a whole
//!   generation is scored at once by a user callback and only elites carry
//!   over between generations.
//! - **NSGA-III**: many-objective optimization via fast non-dominated
//!   sorting, hyperplane normalization, and reference-point niching on
//!   Das–Dennis directions.
//!
//! # Architecture
//!
//! The engine is polymorphic over the user's problem: gene encoding,
//! evaluation, mutation, crossover, fitness, and reporting are injected as
//! closures on [`ga::Engine`]. Candidate production (population
//! initialization and offspring variation) fans out to a bounded worker
//! pool with either dynamic per-slot dispatch or static chunked
//! partitioning; everything else runs on the driver thread.
//!
//! # Key Types
//!
//! - [`ga::Config`]: algorithm parameters (mode, population, operators,
//!   threading, stall windows)
//! - [`ga::Engine`]: the generational driver
//! - [`ga::StopReason`]: why a run ended

pub mod ga;
pub mod random;
