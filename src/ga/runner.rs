//! Generational loop execution.
//!
//! [`Engine`] orchestrates the complete evolutionary process:
//! initialization → (variation → evaluation → ranking → selection →
//! ranking → summary) until a stop criterion fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use ndarray::Array2;

use super::config::{Config, Mode};
use super::error::{Error, Result};
use super::multi_objective;
use super::niching;
use super::parallel::{self, IdleWait, Threading};
use super::selection;
use super::types::{Chromosome, Generation, Rnd01, SoAbstract, StopReason};
use crate::random::SharedRng;

type InitGenesFn<G> = Box<dyn Fn(&mut G, &Rnd01<'_>) + Send + Sync>;
type EvalFn<G, M> = Box<dyn Fn(&G, &mut M) -> bool + Send + Sync>;
type EvalIgaFn<G, M> = Box<dyn Fn(&G, &mut M, &Generation<G, M>) -> bool + Send + Sync>;
type MutateFn<G> = Box<dyn Fn(&G, &Rnd01<'_>, f64) -> G + Send + Sync>;
type CrossoverFn<G> = Box<dyn Fn(&G, &G, &Rnd01<'_>) -> G + Send + Sync>;
type SoFitnessFn<G, M> = Box<dyn Fn(&Chromosome<G, M>) -> f64 + Send + Sync>;
type MoObjectivesFn<G, M> = Box<dyn Fn(&Chromosome<G, M>) -> Vec<f64> + Send + Sync>;
type IgaFitnessFn<G, M> = Box<dyn Fn(&mut Generation<G, M>) + Send + Sync>;
type ReductionFn = Box<dyn Fn(&[f64]) -> Vec<f64> + Send + Sync>;
type SoReportFn<G, M> = Box<dyn Fn(i64, &Generation<G, M>, &G) + Send + Sync>;
type MoReportFn<G, M> = Box<dyn Fn(i64, &Generation<G, M>, &[usize]) + Send + Sync>;
type ShrinkFn = Box<dyn Fn(i64, &Rnd01<'_>) -> f64 + Send + Sync>;
type RefreshFn = Box<dyn Fn() + Send + Sync>;

/// Decaying mutation-shrink schedule: full scale for the first five
/// generations, then `1/sqrt(g - 4)`, squared with probability 0.4 or
/// reset to 1.0 with probability 0.1 (independent draws).
fn default_shrink_scale(step: i64, rnd01: &Rnd01<'_>) -> f64 {
    let mut scale = if step <= 5 {
        1.0
    } else {
        1.0 / ((step - 5 + 1) as f64).sqrt()
    };
    if rnd01() < 0.4 {
        scale *= scale;
    } else if rnd01() < 0.1 {
        scale = 1.0;
    }
    scale
}

/// The generational optimization driver.
///
/// Generic over the gene type `G` and the intermediate cost type `M`,
/// both opaque to the engine. Problem behavior is injected through the
/// `with_*` builder methods; which callbacks must (and must not) be set
/// depends on [`Config::mode`] and is validated by
/// [`solve_init`](Engine::solve_init).
///
/// # Usage
///
/// ```ignore
/// let config = Config::default().with_population(100).with_seed(42);
/// let mut engine: Engine<MyGenes, MyCost> = Engine::new(config)
///     .with_init_genes(|genes, rnd01| { /* randomize */ })
///     .with_eval_solution(|genes, cost| { /* evaluate */ true })
///     .with_crossover(|a, b, rnd01| { /* recombine */ })
///     .with_mutate(|genes, rnd01, shrink| { /* perturb */ })
///     .with_so_fitness(|chromosome| chromosome.middle_costs.objective)
///     .with_so_report(|step, generation, best| println!("{step}: {best:?}"));
/// let reason = engine.solve()?;
/// ```
pub struct Engine<G, M> {
    config: Config,
    rng: SharedRng,
    stop: Arc<AtomicBool>,
    generation_step: i64,
    average_stall_count: usize,
    best_stall_count: usize,
    history: Vec<SoAbstract>,
    last_generation: Generation<G, M>,
    user_initial_solutions: Vec<G>,

    // many-objective state
    ideal_objectives: Vec<f64>,
    extreme_objectives: Array2<f64>,
    scalarized_objectives_min: Vec<f64>,
    reference_vectors: Option<Array2<f64>>,
    n_reduced: usize,
    divisions: usize,

    init_genes: Option<InitGenesFn<G>>,
    eval_solution: Option<EvalFn<G, M>>,
    eval_solution_iga: Option<EvalIgaFn<G, M>>,
    mutate: Option<MutateFn<G>>,
    crossover: Option<CrossoverFn<G>>,
    so_fitness: Option<SoFitnessFn<G, M>>,
    mo_objectives: Option<MoObjectivesFn<G, M>>,
    iga_fitness: Option<IgaFitnessFn<G, M>>,
    objective_reduction: Option<ReductionFn>,
    so_report: Option<SoReportFn<G, M>>,
    mo_report: Option<MoReportFn<G, M>>,
    shrink_scale: ShrinkFn,
    custom_refresh: Option<RefreshFn>,
}

impl<G, M> Engine<G, M>
where
    G: Clone + Default + Send + Sync,
    M: Clone + Default + Send + Sync,
{
    /// Creates an engine with no callbacks installed.
    ///
    /// The generator is seeded from [`Config::seed`], or from a fresh
    /// random seed when unset.
    pub fn new(config: Config) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            rng: SharedRng::new(seed),
            stop: Arc::new(AtomicBool::new(false)),
            generation_step: -1,
            average_stall_count: 0,
            best_stall_count: 0,
            history: Vec::new(),
            last_generation: Generation::default(),
            user_initial_solutions: Vec::new(),
            ideal_objectives: Vec::new(),
            extreme_objectives: Array2::zeros((0, 0)),
            scalarized_objectives_min: Vec::new(),
            reference_vectors: None,
            n_reduced: 0,
            divisions: 0,
            init_genes: None,
            eval_solution: None,
            eval_solution_iga: None,
            mutate: None,
            crossover: None,
            so_fitness: None,
            mo_objectives: None,
            iga_fitness: None,
            objective_reduction: None,
            so_report: None,
            mo_report: None,
            shrink_scale: Box::new(default_shrink_scale),
            custom_refresh: None,
            config,
        }
    }

    /// Sets the gene initializer (required in every mode).
    pub fn with_init_genes(
        mut self,
        f: impl Fn(&mut G, &Rnd01<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.init_genes = Some(Box::new(f));
        self
    }

    /// Sets the evaluator for non-interactive modes. Returning `false`
    /// rejects the candidate and a fresh one is generated.
    pub fn with_eval_solution(
        mut self,
        f: impl Fn(&G, &mut M) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.eval_solution = Some(Box::new(f));
        self
    }

    /// Sets the interactive evaluator, which additionally observes the
    /// generation built so far.
    pub fn with_eval_solution_iga(
        mut self,
        f: impl Fn(&G, &mut M, &Generation<G, M>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.eval_solution_iga = Some(Box::new(f));
        self
    }

    /// Sets the mutation operator (required in every mode).
    pub fn with_mutate(
        mut self,
        f: impl Fn(&G, &Rnd01<'_>, f64) -> G + Send + Sync + 'static,
    ) -> Self {
        self.mutate = Some(Box::new(f));
        self
    }

    /// Sets the crossover operator (required in every mode).
    pub fn with_crossover(
        mut self,
        f: impl Fn(&G, &G, &Rnd01<'_>) -> G + Send + Sync + 'static,
    ) -> Self {
        self.crossover = Some(Box::new(f));
        self
    }

    /// Sets the per-chromosome scalar fitness (SOGA only).
    pub fn with_so_fitness(
        mut self,
        f: impl Fn(&Chromosome<G, M>) -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.so_fitness = Some(Box::new(f));
        self
    }

    /// Sets the per-chromosome objective calculator (NSGA-III only).
    pub fn with_mo_objectives(
        mut self,
        f: impl Fn(&Chromosome<G, M>) -> Vec<f64> + Send + Sync + 'static,
    ) -> Self {
        self.mo_objectives = Some(Box::new(f));
        self
    }

    /// Sets the whole-generation fitness filler (IGA only).
    pub fn with_iga_fitness(
        mut self,
        f: impl Fn(&mut Generation<G, M>) + Send + Sync + 'static,
    ) -> Self {
        self.iga_fitness = Some(Box::new(f));
        self
    }

    /// Sets the optional objective reducer applied before ideal-point and
    /// niching computations (NSGA-III only).
    pub fn with_objective_reduction(
        mut self,
        f: impl Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    ) -> Self {
        self.objective_reduction = Some(Box::new(f));
        self
    }

    /// Sets the per-generation report for single-objective modes.
    pub fn with_so_report(
        mut self,
        f: impl Fn(i64, &Generation<G, M>, &G) + Send + Sync + 'static,
    ) -> Self {
        self.so_report = Some(Box::new(f));
        self
    }

    /// Sets the per-generation report for NSGA-III, receiving front 0.
    pub fn with_mo_report(
        mut self,
        f: impl Fn(i64, &Generation<G, M>, &[usize]) + Send + Sync + 'static,
    ) -> Self {
        self.mo_report = Some(Box::new(f));
        self
    }

    /// Replaces the default mutation-shrink schedule.
    pub fn with_shrink_scale(
        mut self,
        f: impl Fn(i64, &Rnd01<'_>) -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.shrink_scale = Box::new(f);
        self
    }

    /// Sets a hook invoked while the driver waits on workers.
    pub fn with_custom_refresh(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.custom_refresh = Some(Box::new(f));
        self
    }

    /// Seeds generation 0 with user-supplied genes. Accepted seeds occupy
    /// the lowest slots.
    pub fn with_initial_solutions(mut self, solutions: Vec<G>) -> Self {
        self.user_initial_solutions = solutions;
        self
    }

    /// The configuration this engine runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The most recently finalized generation.
    pub fn last_generation(&self) -> &Generation<G, M> {
        &self.last_generation
    }

    /// Best/average cost per finalized generation, oldest first.
    pub fn history(&self) -> &[SoAbstract] {
        &self.history
    }

    /// The current generation counter (-1 before initialization).
    pub fn generation_step(&self) -> i64 {
        self.generation_step
    }

    /// The Das–Dennis reference vectors, once built by the first
    /// many-objective selection.
    pub fn reference_vectors(&self) -> Option<&Array2<f64>> {
        self.reference_vectors.as_ref()
    }

    /// A handle for raising the stop flag from another thread.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Raises the stop flag: in-flight slots finish, reporting and stall
    /// accounting are skipped, and the next stop check returns
    /// [`StopReason::UserRequest`].
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Runs the full loop: initialization, then generations until a stop
    /// criterion fires.
    pub fn solve(&mut self) -> Result<StopReason> {
        self.solve_init()?;
        let mut stop = StopReason::Undefined;
        while stop == StopReason::Undefined {
            stop = self.solve_next_generation()?;
        }
        if self.config.verbose {
            info!("stop criteria: {stop}");
        }
        Ok(stop)
    }

    /// Validates the configuration and produces generation 0.
    pub fn solve_init(&mut self) -> Result<()> {
        self.check_settings()?;
        self.average_stall_count = 0;
        self.best_stall_count = 0;
        self.generation_step = -1;
        if self.config.verbose {
            info!(
                "GA started: population={}, elite_count={}, crossover_fraction={}, mutation_rate={}",
                self.config.population,
                self.config.elite_count,
                self.config.crossover_fraction,
                self.config.mutation_rate
            );
        }
        let timer = Instant::now();

        let (mut generation0, attempts) = self.init_population()?;
        if self.config.verbose {
            info!(
                "initial population of {} created with {} attempts",
                self.config.population, attempts
            );
        }
        self.generation_step = 0;
        self.finalize_objectives(&mut generation0)?;

        if !self.config.mode.is_single_objective() && !self.stop_requested() {
            self.calculate_n_reduced(&generation0)?;
            self.divisions = self.config.reference_vector_divisions;
            if self.divisions == 0 {
                if self.n_reduced == 1 {
                    return Err(Error::config(
                        "the objective vector has length 1 in a multi-objective optimization",
                    ));
                }
                self.divisions = 2;
                while niching::combination_count(
                    (self.n_reduced + self.divisions) as i64,
                    (self.divisions + 1) as i64,
                ) <= self.config.population as i64
                {
                    self.divisions += 1;
                }
                if self.config.verbose {
                    info!("reference vector divisions auto-selected: {}", self.divisions);
                }
            }
        }

        self.rank_population(&mut generation0)?;
        self.finalize_generation(&mut generation0);
        if !self.config.mode.is_single_objective() {
            self.update_ideal_objectives(&generation0, true)?;
            self.extreme_objectives = Array2::zeros((0, 0));
            self.scalarized_objectives_min.clear();
        }
        generation0.exe_time = timer.elapsed().as_secs_f64();

        if !self.stop_requested() {
            self.history.push(SoAbstract::of(&generation0));
            self.report_generation(&generation0)?;
        }
        self.last_generation = generation0;
        Ok(())
    }

    /// Advances one generation and returns the stop check's verdict.
    pub fn solve_next_generation(&mut self) -> Result<StopReason> {
        let timer = Instant::now();
        self.generation_step += 1;

        let mut new_generation = Generation::default();
        self.transfer(&mut new_generation);
        self.crossover_and_mutation(&mut new_generation)?;
        self.finalize_objectives(&mut new_generation)?;
        self.rank_population(&mut new_generation)?;
        let mut selected = self.select_population(&new_generation)?;
        self.rank_population(&mut selected)?;
        self.finalize_generation(&mut selected);
        selected.exe_time = timer.elapsed().as_secs_f64();

        if !self.stop_requested() {
            self.history.push(SoAbstract::of(&selected));
            self.report_generation(&selected)?;
        }
        self.last_generation = selected;
        Ok(self.stop_criteria())
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn threading(&self) -> Threading {
        if !self.config.multi_threading
            || self.config.n_threads == 1
            || self.config.mode.is_interactive()
        {
            Threading::Sequential
        } else if self.config.dynamic_threading {
            Threading::Dynamic {
                threads: self.config.n_threads,
            }
        } else {
            Threading::Static {
                threads: self.config.n_threads,
            }
        }
    }

    fn idle_wait(&self) -> IdleWait<'_> {
        IdleWait {
            delay: Duration::from_micros(self.config.idle_delay_us),
            refresh: self.custom_refresh.as_deref(),
        }
    }

    fn check_settings(&self) -> Result<()> {
        self.config.validate()?;
        if self.config.mode.is_interactive() {
            if self.iga_fitness.is_none() {
                return Err(Error::config("iga_fitness is not set in interactive mode"));
            }
            if self.so_fitness.is_some() {
                return Err(Error::config("so_fitness is set in interactive mode"));
            }
            if self.mo_objectives.is_some() {
                return Err(Error::config("mo_objectives is set in interactive mode"));
            }
            if self.objective_reduction.is_some() {
                return Err(Error::config(
                    "objective_reduction is set in interactive mode",
                ));
            }
            if self.eval_solution_iga.is_none() {
                return Err(Error::config(
                    "eval_solution_iga is not set in interactive mode",
                ));
            }
            if self.eval_solution.is_some() {
                return Err(Error::config(
                    "eval_solution is set in interactive mode (use eval_solution_iga)",
                ));
            }
        } else {
            if self.iga_fitness.is_some() {
                return Err(Error::config(
                    "iga_fitness is set in non-interactive mode",
                ));
            }
            if self.eval_solution_iga.is_some() {
                return Err(Error::config(
                    "eval_solution_iga is set in non-interactive mode",
                ));
            }
            if self.eval_solution.is_none() {
                return Err(Error::config("eval_solution is not set"));
            }
            if self.config.mode.is_single_objective() {
                if self.so_fitness.is_none() {
                    return Err(Error::config(
                        "so_fitness is not set in single-objective mode",
                    ));
                }
                if self.mo_objectives.is_some() {
                    return Err(Error::config(
                        "mo_objectives is set in single-objective mode",
                    ));
                }
                if self.objective_reduction.is_some() {
                    return Err(Error::config(
                        "objective_reduction is set in single-objective mode",
                    ));
                }
            } else {
                if self.so_fitness.is_some() {
                    return Err(Error::config(
                        "so_fitness is set in multi-objective mode",
                    ));
                }
                if self.mo_objectives.is_none() {
                    return Err(Error::config(
                        "mo_objectives is not set in multi-objective mode",
                    ));
                }
            }
        }
        if self.init_genes.is_none() {
            return Err(Error::config("init_genes is not set"));
        }
        if self.mutate.is_none() {
            return Err(Error::config("mutate is not set"));
        }
        if self.crossover.is_none() {
            return Err(Error::config("crossover is not set"));
        }
        if self.config.mode.is_single_objective() {
            if self.so_report.is_none() {
                return Err(Error::config(
                    "so_report is not set in single-objective mode",
                ));
            }
            if self.mo_report.is_some() {
                return Err(Error::config(
                    "mo_report is set in single-objective mode",
                ));
            }
        } else {
            if self.so_report.is_some() {
                return Err(Error::config("so_report is set in multi-objective mode"));
            }
            if self.mo_report.is_none() {
                return Err(Error::config(
                    "mo_report is not set in multi-objective mode",
                ));
            }
        }
        Ok(())
    }

    fn init_genes_fn(&self) -> Result<&InitGenesFn<G>> {
        self.init_genes
            .as_ref()
            .ok_or_else(|| Error::invariant("init_genes missing after validation"))
    }

    fn eval_fn(&self) -> Result<&EvalFn<G, M>> {
        self.eval_solution
            .as_ref()
            .ok_or_else(|| Error::invariant("eval_solution missing after validation"))
    }

    fn eval_iga_fn(&self) -> Result<&EvalIgaFn<G, M>> {
        self.eval_solution_iga
            .as_ref()
            .ok_or_else(|| Error::invariant("eval_solution_iga missing after validation"))
    }

    fn mutate_fn(&self) -> Result<&MutateFn<G>> {
        self.mutate
            .as_ref()
            .ok_or_else(|| Error::invariant("mutate missing after validation"))
    }

    fn crossover_fn(&self) -> Result<&CrossoverFn<G>> {
        self.crossover
            .as_ref()
            .ok_or_else(|| Error::invariant("crossover missing after validation"))
    }

    fn reduced_objectives(&self, objectives: &[f64]) -> Vec<f64> {
        match &self.objective_reduction {
            Some(reduce) => reduce(objectives),
            None => objectives.to_vec(),
        }
    }

    fn init_population(&self) -> Result<(Generation<G, M>, usize)> {
        let mut generation = Generation::default();
        let population = self.config.population;

        for genes in &self.user_initial_solutions {
            let mut candidate = Chromosome::from_genes(genes.clone());
            let accepted = if self.config.mode.is_interactive() {
                let eval = self.eval_iga_fn()?;
                eval(&candidate.genes, &mut candidate.middle_costs, &generation)
            } else {
                let eval = self.eval_fn()?;
                eval(&candidate.genes, &mut candidate.middle_costs)
            };
            if accepted {
                generation.chromosomes.push(candidate);
            }
            if generation.chromosomes.len() >= population {
                break;
            }
        }

        let n_add = population.saturating_sub(generation.chromosomes.len());
        let init_genes = self.init_genes_fn()?;
        let rng = &self.rng;
        let rnd01 = move || rng.uniform01();
        let mut total_attempts = 0usize;

        if self.config.mode.is_interactive() {
            let eval = self.eval_iga_fn()?;
            let mut added = 0usize;
            'slots: while added < n_add {
                loop {
                    if self.stop_requested() {
                        break 'slots;
                    }
                    let mut genes = G::default();
                    init_genes(&mut genes, &rnd01);
                    let mut candidate = Chromosome::from_genes(genes);
                    total_attempts += 1;
                    if eval(&candidate.genes, &mut candidate.middle_costs, &generation) {
                        generation.chromosomes.push(candidate);
                        added += 1;
                        break;
                    }
                }
            }
        } else {
            let eval = self.eval_fn()?;
            let stop = self.stop.as_ref();
            let producer = |_slot: usize| {
                let mut attempts = 0usize;
                loop {
                    if stop.load(Ordering::Relaxed) {
                        return None;
                    }
                    let mut genes = G::default();
                    init_genes(&mut genes, &rnd01);
                    let mut candidate = Chromosome::from_genes(genes);
                    attempts += 1;
                    if eval(&candidate.genes, &mut candidate.middle_costs) {
                        return Some((candidate, attempts));
                    }
                }
            };
            let idle = self.idle_wait();
            let (produced, attempts) =
                parallel::fill_slots(n_add, self.threading(), &idle, stop, producer);
            generation.chromosomes.extend(produced);
            total_attempts += attempts;
        }

        Ok((generation, total_attempts))
    }

    fn transfer(&self, new_generation: &mut Generation<G, M>) {
        if self.stop_requested() {
            return;
        }
        if !self.config.mode.is_interactive() {
            new_generation
                .chromosomes
                .extend(self.last_generation.chromosomes.iter().cloned());
        } else {
            // Final evaluation is expensive in interactive runs; only the
            // elites carry over.
            for i in 0..self.config.elite_count {
                let index = self.last_generation.sorted_indices[i];
                new_generation
                    .chromosomes
                    .push(self.last_generation.chromosomes[index].clone());
            }
        }
    }

    fn crossover_and_mutation(&self, new_generation: &mut Generation<G, M>) -> Result<usize> {
        if self.stop_requested() {
            return Ok(0);
        }
        if self.generation_step <= 0 {
            return Ok(0);
        }
        let population = self.config.population;
        let n_add = (population as f64 * self.config.crossover_fraction).round() as usize;
        if self.config.mode.is_interactive() && n_add + self.config.elite_count != population {
            return Err(Error::mode(
                "in interactive mode, elite count plus offspring count must equal the population",
            ));
        }

        let crossover = self.crossover_fn()?;
        let mutate = self.mutate_fn()?;
        let last = &self.last_generation;
        let mutation_rate = self.config.mutation_rate;
        let step = self.generation_step;
        let shrink = &self.shrink_scale;
        let rng = &self.rng;
        let rnd01 = move || rng.uniform01();
        let mut total_attempts = 0usize;

        if self.config.mode.is_interactive() {
            let eval = self.eval_iga_fn()?;
            let mut added = 0usize;
            'slots: while added < n_add {
                loop {
                    if self.stop_requested() {
                        break 'slots;
                    }
                    let p1 =
                        selection::sample_cumulative(&last.selection_chance_cumulative, rnd01());
                    let p2 =
                        selection::sample_cumulative(&last.selection_chance_cumulative, rnd01());
                    if p1 == p2 {
                        continue;
                    }
                    let mut genes = crossover(
                        &last.chromosomes[p1].genes,
                        &last.chromosomes[p2].genes,
                        &rnd01,
                    );
                    if rnd01() <= mutation_rate {
                        let scale = shrink(step, &rnd01);
                        genes = mutate(&genes, &rnd01, scale);
                    }
                    let mut candidate = Chromosome::from_genes(genes);
                    if eval(&candidate.genes, &mut candidate.middle_costs, new_generation) {
                        new_generation.chromosomes.push(candidate);
                        added += 1;
                        break;
                    }
                    total_attempts += 1;
                }
            }
        } else {
            let eval = self.eval_fn()?;
            let stop = self.stop.as_ref();
            let producer = |_slot: usize| {
                let mut attempts = 0usize;
                loop {
                    if stop.load(Ordering::Relaxed) {
                        return None;
                    }
                    let p1 =
                        selection::sample_cumulative(&last.selection_chance_cumulative, rnd01());
                    let p2 =
                        selection::sample_cumulative(&last.selection_chance_cumulative, rnd01());
                    if p1 == p2 {
                        continue;
                    }
                    let mut genes = crossover(
                        &last.chromosomes[p1].genes,
                        &last.chromosomes[p2].genes,
                        &rnd01,
                    );
                    if rnd01() <= mutation_rate {
                        let scale = shrink(step, &rnd01);
                        genes = mutate(&genes, &rnd01, scale);
                    }
                    let mut candidate = Chromosome::from_genes(genes);
                    if eval(&candidate.genes, &mut candidate.middle_costs) {
                        return Some((candidate, attempts));
                    }
                    attempts += 1;
                }
            };
            let idle = self.idle_wait();
            let (produced, attempts) =
                parallel::fill_slots(n_add, self.threading(), &idle, stop, producer);
            new_generation.chromosomes.extend(produced);
            total_attempts = attempts;
        }

        if self.config.verbose {
            info!("{n_add} offspring produced with {total_attempts} rejected evaluations");
        }
        Ok(total_attempts)
    }

    fn finalize_objectives(&self, generation: &mut Generation<G, M>) -> Result<()> {
        if self.stop_requested() {
            return Ok(());
        }
        match self.config.mode {
            Mode::Soga => {
                let fitness = self
                    .so_fitness
                    .as_ref()
                    .ok_or_else(|| Error::invariant("so_fitness missing after validation"))?;
                for i in 0..generation.chromosomes.len() {
                    let cost = fitness(&generation.chromosomes[i]);
                    generation.chromosomes[i].total_cost = cost;
                }
            }
            Mode::Iga => {
                let fitness = self
                    .iga_fitness
                    .as_ref()
                    .ok_or_else(|| Error::invariant("iga_fitness missing after validation"))?;
                fitness(generation);
            }
            Mode::NsgaIii => {
                let objectives = self
                    .mo_objectives
                    .as_ref()
                    .ok_or_else(|| Error::invariant("mo_objectives missing after validation"))?;
                for i in 0..generation.chromosomes.len() {
                    let values = objectives(&generation.chromosomes[i]);
                    generation.chromosomes[i].objectives = values;
                }
            }
        }
        Ok(())
    }

    fn calculate_n_reduced(&mut self, generation: &Generation<G, M>) -> Result<()> {
        let first = generation.chromosomes.first().ok_or_else(|| {
            Error::invariant("cannot derive the objective dimension from an empty generation")
        })?;
        self.n_reduced = self.reduced_objectives(&first.objectives).len();
        if self.n_reduced == 0 {
            return Err(Error::config("the reduced objective vector is empty"));
        }
        Ok(())
    }

    fn rank_population(&self, generation: &mut Generation<G, M>) -> Result<()> {
        if self.stop_requested() {
            return Ok(());
        }
        if self.config.mode.is_single_objective() {
            self.rank_population_so(generation);
            Ok(())
        } else {
            self.rank_population_mo(generation)
        }
    }

    fn rank_population_so(&self, generation: &mut Generation<G, M>) {
        let costs: Vec<f64> = generation
            .chromosomes
            .iter()
            .map(|c| c.total_cost)
            .collect();
        generation.sorted_indices =
            selection::sort_indices_by_cost(&costs, self.config.use_quick_sort);
        let mut ranks = vec![0usize; costs.len()];
        for (rank, &index) in generation.sorted_indices.iter().enumerate() {
            ranks[index] = rank;
        }
        generation.selection_chance_cumulative = selection::cumulative_selection_chances(&ranks);
    }

    fn rank_population_mo(&self, generation: &mut Generation<G, M>) -> Result<()> {
        let objectives: Vec<Vec<f64>> = generation
            .chromosomes
            .iter()
            .map(|c| c.objectives.clone())
            .collect();
        let sorted = multi_objective::non_dominated_sort(&objectives)?;
        generation.fronts = sorted.fronts;
        generation.selection_chance_cumulative =
            selection::cumulative_selection_chances(&sorted.ranks);
        Ok(())
    }

    fn select_population(&mut self, combined: &Generation<G, M>) -> Result<Generation<G, M>> {
        if self.stop_requested() {
            return Ok(Generation::default());
        }
        if self.config.mode.is_single_objective() {
            Ok(self.select_population_so(combined))
        } else {
            self.select_population_mo(combined)
        }
    }

    fn select_population_so(&self, combined: &Generation<G, M>) -> Generation<G, M> {
        if self.generation_step <= 0 {
            return combined.clone();
        }
        let rng = &self.rng;
        let rnd01 = move || rng.uniform01();
        let picked = selection::select_so_indices(
            &combined.sorted_indices,
            &combined.selection_chance_cumulative,
            self.config.population,
            self.config.elite_count,
            &rnd01,
        );
        debug!("selected members: {picked:?}");
        let mut selected = Generation::default();
        for index in picked {
            selected
                .chromosomes
                .push(combined.chromosomes[index].clone());
        }
        selected
    }

    fn update_ideal_objectives(
        &mut self,
        generation: &Generation<G, M>,
        reset: bool,
    ) -> Result<()> {
        if self.stop_requested() {
            return Ok(());
        }
        if self.config.mode.is_single_objective() {
            return Err(Error::mode(
                "ideal-point update requires a multi-objective mode",
            ));
        }
        if reset {
            let first = generation.chromosomes.first().ok_or_else(|| {
                Error::invariant("cannot reset the ideal point from an empty generation")
            })?;
            self.ideal_objectives = self.reduced_objectives(&first.objectives);
        }
        let width = self.ideal_objectives.len();
        for chromosome in &generation.chromosomes {
            let reduced = self.reduced_objectives(&chromosome.objectives);
            if reduced.len() != width {
                return Err(Error::invariant(
                    "objective reduction changed its output length",
                ));
            }
            for i in 0..width {
                if reduced[i] < self.ideal_objectives[i] {
                    self.ideal_objectives[i] = reduced[i];
                }
            }
        }
        Ok(())
    }

    fn select_population_mo(&mut self, combined: &Generation<G, M>) -> Result<Generation<G, M>> {
        self.update_ideal_objectives(combined, false)?;
        if self.generation_step <= 0 {
            return Ok(combined.clone());
        }
        if self.n_reduced == 0 {
            return Err(Error::invariant("reduced objective dimension is zero"));
        }

        let n = combined.chromosomes.len();
        let mut zb = Array2::<f64>::zeros((n, self.n_reduced));
        for i in 0..n {
            let reduced = self.reduced_objectives(&combined.chromosomes[i].objectives);
            if reduced.len() != self.n_reduced {
                return Err(Error::invariant(
                    "objective reduction changed its output length",
                ));
            }
            for j in 0..self.n_reduced {
                zb[[i, j]] = reduced[j] - self.ideal_objectives[j];
            }
        }
        niching::scalarize_extremes(
            &zb,
            &mut self.extreme_objectives,
            &mut self.scalarized_objectives_min,
        );
        let intercepts = match niching::hyperplane_intercepts(&self.extreme_objectives) {
            Some(intercepts) => intercepts,
            None => {
                debug!("singular extreme-objective system; using per-axis maxima as intercepts");
                niching::fallback_intercepts(&zb)
            }
        };
        let mut norm_objectives = Array2::<f64>::zeros((n, self.n_reduced));
        for i in 0..n {
            for j in 0..self.n_reduced {
                norm_objectives[[i, j]] = zb[[i, j]] / intercepts[j];
            }
        }

        if n == self.config.population {
            return Ok(combined.clone());
        }

        if self.reference_vectors.is_none() {
            self.reference_vectors =
                Some(niching::reference_vectors(self.n_reduced, self.divisions)?);
        }
        let references = self
            .reference_vectors
            .as_ref()
            .ok_or_else(|| Error::invariant("reference vectors missing after generation"))?;
        let mut association = niching::associate(&norm_objectives, references)?;

        let mut selected = Generation::default();
        let mut front_index = 0;
        while selected.chromosomes.len() + combined.fronts[front_index].len()
            <= self.config.population
        {
            for &i in &combined.fronts[front_index] {
                selected.chromosomes.push(combined.chromosomes[i].clone());
            }
            front_index += 1;
        }
        let needed = self.config.population - selected.chromosomes.len();
        let rng = &self.rng;
        let rnd01 = move || rng.uniform01();
        let picked = niching::niche_fill(
            needed,
            &combined.fronts[front_index],
            &mut association,
            n,
            self.config.enable_reference_vectors,
            &rnd01,
        );
        for i in picked {
            selected.chromosomes.push(combined.chromosomes[i].clone());
        }
        Ok(selected)
    }

    fn finalize_generation(&self, generation: &mut Generation<G, M>) {
        if self.stop_requested() {
            return;
        }
        if !self.config.mode.is_single_objective() {
            return;
        }
        let Some(first) = generation.chromosomes.first() else {
            return;
        };
        let mut best = first.total_cost;
        let mut best_index = 0usize;
        let mut sum = 0.0;
        for (i, chromosome) in generation.chromosomes.iter().enumerate() {
            let cost = chromosome.total_cost;
            sum += cost;
            if cost <= best {
                best_index = i;
                best = cost;
            }
        }
        generation.best_chromosome_index = Some(best_index);
        generation.best_total_cost = best;
        generation.average_cost = sum / generation.chromosomes.len() as f64;
    }

    fn report_generation(&self, generation: &Generation<G, M>) -> Result<()> {
        if self.config.mode.is_single_objective() {
            let report = self
                .so_report
                .as_ref()
                .ok_or_else(|| Error::invariant("so_report missing after validation"))?;
            let best = generation.best_chromosome_index.ok_or_else(|| {
                Error::invariant("generation summary missing before report")
            })?;
            report(
                self.generation_step,
                generation,
                &generation.chromosomes[best].genes,
            );
        } else {
            let report = self
                .mo_report
                .as_ref()
                .ok_or_else(|| Error::invariant("mo_report missing after validation"))?;
            let front0 = generation
                .fronts
                .first()
                .ok_or_else(|| Error::invariant("fronts missing before report"))?;
            report(self.generation_step, generation, front0);
        }
        Ok(())
    }

    fn stop_criteria(&mut self) -> StopReason {
        if self.generation_step < 2 && !self.stop_requested() {
            return StopReason::Undefined;
        }
        if self.config.mode.is_single_objective() && self.history.len() >= 2 {
            let previous = self.history[self.history.len() - 2];
            let current = self.history[self.history.len() - 1];
            if (previous.best_total_cost - current.best_total_cost).abs()
                < self.config.tol_stall_best
            {
                self.best_stall_count += 1;
            } else {
                self.best_stall_count = 0;
            }
            if (previous.average_cost - current.average_cost).abs() < self.config.tol_stall_average
            {
                self.average_stall_count += 1;
            } else {
                self.average_stall_count = 0;
            }
        }
        if self.generation_step >= self.config.generation_max as i64 {
            return StopReason::MaxGenerations;
        }
        if self.average_stall_count >= self.config.average_stall_max {
            return StopReason::StallAverage;
        }
        if self.best_stall_count >= self.config.best_stall_max {
            return StopReason::StallBest;
        }
        if self.stop_requested() {
            return StopReason::UserRequest;
        }
        StopReason::Undefined
    }
}
