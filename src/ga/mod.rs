//! Genetic optimization engine.
//!
//! A generic, domain-agnostic generational driver. Users define their
//! problem by injecting closures for gene initialization, evaluation,
//! crossover, mutation, and fitness; the engine runs the
//! `init → (variation → evaluate → rank → select → rank → summarize)*`
//! loop until a stop criterion fires.
//!
//! # Key Types
//!
//! - [`Config`]: algorithm parameters (mode, population size, operator
//!   rates, threading, stall windows)
//! - [`Engine`]: executes the generational loop
//! - [`Generation`] / [`Chromosome`]: population state exposed to
//!   callbacks and reports
//! - [`StopReason`]: soft-termination outcome of a run
//!
//! # References
//!
//! - Deb & Jain (2014), "An Evolutionary Many-Objective Optimization
//!   Algorithm Using Reference-Point-Based Nondominated Sorting"
//! - Das & Dennis (1998), "Normal-Boundary Intersection"
//! - Goldberg (1989), *Genetic Algorithms in Search, Optimization, and
//!   Machine Learning*

mod config;
mod error;
mod niching;
mod parallel;
mod runner;
mod selection;
mod types;

pub mod multi_objective;

pub use config::{Config, Mode};
pub use error::{Error, Result};
pub use runner::Engine;
pub use types::{Chromosome, Generation, Rnd01, SoAbstract, StopReason};
