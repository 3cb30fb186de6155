//! Reference-point niching for many-objective selection.
//!
//! Implements the NSGA-III selection machinery: Das–Dennis reference
//! vectors on the unit simplex, extreme-point tracking by achievement
//! scalarization, hyperplane intercepts from an LU solve, perpendicular
//! association of normalized objectives to reference directions, and the
//! minimum-niche fill of the overflow front.
//!
//! # References
//!
//! - Deb & Jain (2014), "An Evolutionary Many-Objective Optimization
//!   Algorithm Using Reference-Point-Based Nondominated Sorting"
//! - Das & Dennis (1998), "Normal-Boundary Intersection"

use ndarray::Array2;

use super::error::{Error, Result};
use super::types::Rnd01;

/// Binomial coefficient C(n, r).
///
/// Callers must ensure `n >= r >= 0`; other inputs return nonsense rather
/// than an error.
pub(crate) fn combination_count(n: i64, mut r: i64) -> i64 {
    if r * 2 > n {
        r = n - r;
    }
    if r == 0 {
        return 1;
    }
    let mut count = n;
    for i in 2..=r {
        count *= n - i + 1;
        count /= i;
    }
    count
}

/// Enumerates all non-negative integer vectors of length `dim` summing to
/// `budget`, in lexicographic order of the leading component.
fn integer_lattice(dim: usize, budget: i64) -> Vec<Vec<f64>> {
    if dim == 1 {
        return vec![vec![budget as f64]];
    }
    let mut result = Vec::new();
    for i in 0..=budget {
        for tail in integer_lattice(dim - 1, budget - i) {
            let mut v = Vec::with_capacity(tail.len() + 1);
            v.push(i as f64);
            v.extend(tail);
            result.push(v);
        }
    }
    result
}

/// Generates Das–Dennis reference vectors: the integer simplex lattice for
/// `divisions`, scaled onto the unit simplex.
///
/// The row count equals `C(dim + divisions - 1, divisions)`.
pub(crate) fn reference_vectors(dim: usize, divisions: usize) -> Result<Array2<f64>> {
    if dim < 1 {
        return Err(Error::invariant(
            "reference vector dimension must be at least 1",
        ));
    }
    let rows = integer_lattice(dim, divisions as i64);
    let mut vectors = Array2::<f64>::zeros((rows.len(), dim));
    for (i, row) in rows.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            vectors[[i, j]] = value / divisions as f64;
        }
    }
    Ok(vectors)
}

/// Updates per-axis extreme points by achievement scalarization.
///
/// `zb` holds ideal-translated objectives, one row per chromosome. For
/// axis `i` the weights are `1e-10` everywhere except `w_i = 1`; the
/// chromosome minimizing `max_k(zb_jk / w_k)` becomes the axis extreme
/// whenever it improves the running per-axis minimum. The extreme matrix
/// and the minima are lazily initialized on first use.
pub(crate) fn scalarize_extremes(
    zb: &Array2<f64>,
    extremes: &mut Array2<f64>,
    scalarized_min: &mut Vec<f64>,
) {
    let n_objectives = zb.ncols();
    if scalarized_min.is_empty() {
        *extremes = Array2::zeros((n_objectives, n_objectives));
        scalarized_min.resize(n_objectives, f64::INFINITY);
    }
    for i in 0..n_objectives {
        let mut weights = vec![1e-10; n_objectives];
        weights[i] = 1.0;
        let mut min_index = 0usize;
        let mut min_value = f64::INFINITY;
        for j in 0..zb.nrows() {
            let mut value: f64 = -1.0e300;
            for k in 0..n_objectives {
                value = value.max(zb[[j, k]] / weights[k]);
            }
            if value < min_value {
                min_value = value;
                min_index = j;
            }
        }
        if min_value < scalarized_min[i] {
            scalarized_min[i] = min_value;
            for j in 0..n_objectives {
                extremes[[i, j]] = zb[[min_index, j]];
            }
        }
    }
}

/// Solves `extremes^T · x = 1` by LU factorization with a unit lower
/// diagonal and no pivoting, then returns the per-axis intercepts
/// `1 / x_i`.
///
/// Returns `None` when a pivot vanishes or an intercept comes out
/// non-finite; callers fall back to [`fallback_intercepts`].
pub(crate) fn hyperplane_intercepts(extremes: &Array2<f64>) -> Option<Vec<f64>> {
    debug_assert_eq!(
        extremes.nrows(),
        extremes.ncols(),
        "extreme-objective matrix must be square"
    );
    let n = extremes.nrows();
    let mut lower = Array2::<f64>::zeros((n, n));
    let mut upper = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for k in i..n {
            let mut sum = 0.0;
            for j in 0..i {
                sum += lower[[i, j]] * upper[[j, k]];
            }
            upper[[i, k]] = extremes[[k, i]] - sum;
        }
        if upper[[i, i]].abs() < 1e-12 {
            return None;
        }
        for k in i..n {
            if i == k {
                lower[[i, i]] = 1.0;
            } else {
                let mut sum = 0.0;
                for j in 0..i {
                    sum += lower[[k, j]] * upper[[j, i]];
                }
                lower[[k, i]] = (extremes[[i, k]] - sum) / upper[[i, i]];
            }
        }
    }
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = 0.0;
        for k in 0..i {
            sum += lower[[i, k]] * y[k];
        }
        y[i] = (1.0 - sum) / lower[[i, i]];
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for k in (i + 1)..n {
            sum += upper[[i, k]] * x[k];
        }
        x[i] = (y[i] - sum) / upper[[i, i]];
    }
    let intercepts: Vec<f64> = x.iter().map(|&v| 1.0 / v).collect();
    if intercepts.iter().all(|v| v.is_finite()) {
        Some(intercepts)
    } else {
        None
    }
}

/// Degenerate-case intercepts: per-axis maxima of the translated
/// objectives, 1.0 where a column has no positive spread.
pub(crate) fn fallback_intercepts(zb: &Array2<f64>) -> Vec<f64> {
    (0..zb.ncols())
        .map(|j| {
            let max = zb.column(j).iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            if max > 0.0 {
                max
            } else {
                1.0
            }
        })
        .collect()
}

/// Association of a generation to the reference vectors.
pub(crate) struct Association {
    /// Index of the nearest reference vector per chromosome.
    pub assigned: Vec<usize>,
    /// Chromosomes currently associated with each reference vector.
    pub niche_count: Vec<usize>,
    /// Perpendicular distance of every chromosome (row) to every
    /// reference vector (column).
    pub distances: Array2<f64>,
}

/// Associates each normalized objective row with its nearest reference
/// vector by perpendicular distance to the line through the origin.
pub(crate) fn associate(
    norm_objectives: &Array2<f64>,
    references: &Array2<f64>,
) -> Result<Association> {
    if references.ncols() != norm_objectives.ncols() {
        return Err(Error::invariant(
            "objective and reference vector lengths differ",
        ));
    }
    let n_ref = references.nrows();
    let n_x = norm_objectives.nrows();
    let mut assigned = vec![0usize; n_x];
    let mut niche_count = vec![0usize; n_ref];
    let mut distances = Array2::<f64>::zeros((n_x, n_ref));
    for i in 0..n_x {
        let mut dist_min = 0.0;
        let mut dist_min_index = 0;
        for j in 0..n_ref {
            let norm = references
                .row(j)
                .iter()
                .map(|v| v * v)
                .sum::<f64>()
                .sqrt();
            let objective = norm_objectives.row(i);
            let mut dot = 0.0;
            for (w, o) in references.row(j).iter().zip(objective.iter()) {
                dot += (w / norm) * o;
            }
            let mut dist2 = 0.0;
            for (w, o) in references.row(j).iter().zip(objective.iter()) {
                let d = o - dot * (w / norm);
                dist2 += d * d;
            }
            let dist = dist2.sqrt();
            distances[[i, j]] = dist;
            if j == 0 || dist < dist_min {
                dist_min = dist;
                dist_min_index = j;
            }
        }
        assigned[i] = dist_min_index;
        niche_count[dist_min_index] += 1;
    }
    Ok(Association {
        assigned,
        niche_count,
        distances,
    })
}

/// Picks `needed` members from the overflow front.
///
/// With reference vectors enabled, each pick targets the vector with the
/// minimum niche count: its closest associated member when the count is
/// zero, a uniform draw among its associated members otherwise. A vector
/// with no remaining associated members has its count marked
/// `10 * pool_size` and the scan retries. With reference vectors disabled,
/// picks are uniform draws from the remaining front.
pub(crate) fn niche_fill(
    needed: usize,
    overflow_front: &[usize],
    association: &mut Association,
    pool_size: usize,
    use_reference_vectors: bool,
    rnd01: &Rnd01<'_>,
) -> Vec<usize> {
    let mut remaining = overflow_front.to_vec();
    let mut picked = Vec::with_capacity(needed);
    while picked.len() < needed {
        if !use_reference_vectors {
            let len = remaining.len();
            let mut index = (len as f64 * rnd01()).floor() as usize;
            if index >= len {
                index = 0;
            }
            picked.push(remaining.remove(index));
            continue;
        }

        let min_niche_index = index_of_min(&association.niche_count);
        let neighbors: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| association.assigned[i] == min_niche_index)
            .collect();
        if neighbors.is_empty() {
            association.niche_count[min_niche_index] = 10 * pool_size;
            continue;
        }
        let next = if association.niche_count[min_niche_index] == 0 {
            let mut best = neighbors[0];
            let mut best_dist = association.distances[[best, min_niche_index]];
            for &i in &neighbors {
                let dist = association.distances[[i, min_niche_index]];
                if dist < best_dist {
                    best = i;
                    best_dist = dist;
                }
            }
            best
        } else {
            let len = neighbors.len();
            let mut index = (len as f64 * rnd01()).floor() as usize;
            if index >= len {
                index = 0;
            }
            neighbors[index]
        };
        picked.push(next);
        remaining.retain(|&i| i != next);
        association.niche_count[min_niche_index] += 1;
    }
    picked
}

fn index_of_min(values: &[usize]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v < values[best] {
            best = i;
        }
    }
    best
}
