//! Multi-objective ranking.
//!
//! Fast non-dominated sorting for minimization objectives: each chromosome
//! gets a Pareto rank, and chromosomes are grouped into fronts. Rank 0 is
//! the current Pareto front.
//!
//! # References
//!
//! - Deb et al. (2002), "A Fast and Elitist Multiobjective Genetic
//!   Algorithm: NSGA-II"

use super::error::{Error, Result};

/// Result of non-dominated sorting.
///
/// `ranks[i]` is the index of the front containing chromosome `i`;
/// `fronts[k]` lists the chromosome indices of front `k`.
#[derive(Debug, Clone)]
pub struct SortResult {
    /// Pareto rank per chromosome (0 = non-dominated).
    pub ranks: Vec<usize>,
    /// Chromosome indices grouped by front.
    pub fronts: Vec<Vec<usize>>,
}

/// Fast non-dominated sorting over minimization objective vectors.
///
/// Every unordered pair is compared once; dominated counters and
/// domination lists drive the front peeling. All objective vectors must
/// share one length, and the input must be non-empty — violations are
/// reported as invariant errors.
///
/// # Complexity
///
/// O(m · n²) for `n` chromosomes and `m` objectives.
///
/// # Example
///
/// ```
/// use evokit::ga::multi_objective::non_dominated_sort;
///
/// let objectives = vec![
///     vec![1.0, 5.0],
///     vec![3.0, 3.0],
///     vec![5.0, 1.0],
///     vec![4.0, 4.0], // dominated by (3, 3)
/// ];
/// let sorted = non_dominated_sort(&objectives).unwrap();
/// assert_eq!(sorted.ranks, vec![0, 0, 0, 1]);
/// ```
pub fn non_dominated_sort(objectives: &[Vec<f64>]) -> Result<SortResult> {
    let n = objectives.len();
    if n == 0 {
        return Err(Error::invariant("cannot rank an empty generation"));
    }
    let width = objectives[0].len();
    if objectives.iter().any(|o| o.len() != width) {
        return Err(Error::invariant(
            "objective vectors must share one length",
        ));
    }

    let mut domination_set: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut dominated_count = vec![0usize; n];
    let mut ranks = vec![0usize; n];
    let mut pareto_front = Vec::new();

    for i in 0..n {
        for j in (i + 1)..n {
            match dominance_cmp(&objectives[i], &objectives[j]) {
                Dominance::Left => {
                    domination_set[i].push(j);
                    dominated_count[j] += 1;
                }
                Dominance::Right => {
                    domination_set[j].push(i);
                    dominated_count[i] += 1;
                }
                Dominance::Neither => {}
            }
        }
        if dominated_count[i] == 0 {
            pareto_front.push(i);
        }
    }

    let mut fronts = vec![pareto_front];
    loop {
        let current = fronts.last().expect("fronts starts non-empty");
        let mut next_front = Vec::new();
        for &i in current {
            for &j in &domination_set[i] {
                dominated_count[j] -= 1;
                if dominated_count[j] == 0 {
                    ranks[j] = fronts.len();
                    next_front.push(j);
                }
            }
        }
        if next_front.is_empty() {
            break;
        }
        fronts.push(next_front);
    }

    Ok(SortResult { ranks, fronts })
}

#[derive(Debug, PartialEq)]
enum Dominance {
    /// Left dominates right.
    Left,
    /// Right dominates left.
    Right,
    /// Neither dominates the other.
    Neither,
}

/// Pareto dominance for minimization: a side dominates when it is no worse
/// anywhere and strictly better somewhere.
fn dominance_cmp(a: &[f64], b: &[f64]) -> Dominance {
    let mut a_better = false;
    let mut b_better = false;
    for (&va, &vb) in a.iter().zip(b.iter()) {
        if va < vb {
            a_better = true;
        } else if vb < va {
            b_better = true;
        }
    }
    match (a_better, b_better) {
        (true, false) => Dominance::Left,
        (false, true) => Dominance::Right,
        _ => Dominance::Neither,
    }
}
