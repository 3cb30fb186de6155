//! Single-objective ranking and parent selection.
//!
//! Chromosomes are ordered by ascending total cost, ranks feed a
//! rank-biased cumulative selection distribution (`1/sqrt(rank + 1)`),
//! and the combined parent/offspring pool is trimmed back to the target
//! population with elites kept verbatim.

use std::cmp::Ordering;

use super::types::Rnd01;

/// Sorts chromosome indices by ascending cost.
///
/// `use_quick_sort` selects the hand-written quicksort; otherwise the
/// library sort is used. Both produce a permutation of `0..costs.len()`.
pub(crate) fn sort_indices_by_cost(costs: &[f64], use_quick_sort: bool) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..costs.len()).collect();
    if use_quick_sort {
        quicksort_indices(&mut indices, costs, 0, costs.len() as isize - 1);
    } else {
        indices.sort_by(|&a, &b| costs[a].partial_cmp(&costs[b]).unwrap_or(Ordering::Equal));
    }
    indices
}

/// Recursive quicksort over indices keyed by cost: the leftmost element is
/// the pivot, partitioned Hoare-style.
fn quicksort_indices(indices: &mut [usize], costs: &[f64], left: isize, right: isize) {
    if left >= right {
        return;
    }
    let pivot = costs[indices[left as usize]];
    let mut l = left;
    let mut r = right;
    while l < r {
        while costs[indices[l as usize]] <= pivot && l < right {
            l += 1;
        }
        while costs[indices[r as usize]] > pivot && r >= left {
            r -= 1;
        }
        if l < r {
            indices.swap(l as usize, r as usize);
        }
    }
    let middle = r;
    indices.swap(left as usize, middle as usize);
    quicksort_indices(indices, costs, left, middle - 1);
    quicksort_indices(indices, costs, middle + 1, right);
}

/// Builds the cumulative selection distribution from ranks.
///
/// Weight `1/sqrt(rank + 1)` is accumulated in chromosome order and
/// normalized so the final entry equals 1.0.
pub(crate) fn cumulative_selection_chances(ranks: &[usize]) -> Vec<f64> {
    let mut cumulative = 0.0;
    let mut chances = Vec::with_capacity(ranks.len());
    for &rank in ranks {
        cumulative += 1.0 / ((rank + 1) as f64).sqrt();
        chances.push(cumulative);
    }
    if let Some(&total) = chances.last() {
        for chance in &mut chances {
            *chance /= total;
        }
    }
    chances
}

/// Samples the cumulative distribution: the smallest index whose
/// cumulative chance is at least `r`.
pub(crate) fn sample_cumulative(chances: &[f64], r: f64) -> usize {
    let mut position = 0;
    while position < chances.len() && chances[position] < r {
        position += 1;
    }
    position.min(chances.len().saturating_sub(1))
}

/// Trims a combined pool to `population` chromosome indices.
///
/// The first `elite_count` entries of `sorted_indices` are kept verbatim
/// and blocked against reselection; the remaining slots are filled by
/// sampling the cumulative distribution. A raw draw `j` is rejected while
/// `j` is in the blocked set, and the rank-mapped index
/// `sorted_indices[j]` is what gets recorded as blocked.
pub(crate) fn select_so_indices(
    sorted_indices: &[usize],
    chances: &[f64],
    population: usize,
    elite_count: usize,
    rnd01: &Rnd01<'_>,
) -> Vec<usize> {
    let mut picked = Vec::with_capacity(population);
    let mut blocked = Vec::with_capacity(population);
    for &elite in sorted_indices.iter().take(elite_count) {
        picked.push(elite);
        blocked.push(elite);
    }
    for _ in 0..population.saturating_sub(elite_count) {
        let j = loop {
            let j = sample_cumulative(chances, rnd01());
            if !blocked.contains(&j) {
                break j;
            }
        };
        picked.push(j);
        blocked.push(sorted_indices[j]);
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{create_rng, SharedRng};
    use rand::Rng;

    fn is_sorted_by_cost(indices: &[usize], costs: &[f64]) -> bool {
        indices
            .windows(2)
            .all(|w| costs[w[0]] <= costs[w[1]])
    }

    fn is_permutation(indices: &[usize], n: usize) -> bool {
        let mut seen = vec![false; n];
        indices.len() == n
            && indices.iter().all(|&i| {
                if i < n && !seen[i] {
                    seen[i] = true;
                    true
                } else {
                    false
                }
            })
    }

    #[test]
    fn test_quicksort_orders_by_cost() {
        let costs = vec![5.0, 1.0, 4.0, 2.0, 3.0];
        let indices = sort_indices_by_cost(&costs, true);
        assert_eq!(indices, vec![1, 3, 4, 2, 0]);
    }

    #[test]
    fn test_library_sort_orders_by_cost() {
        let costs = vec![5.0, 1.0, 4.0, 2.0, 3.0];
        let indices = sort_indices_by_cost(&costs, false);
        assert_eq!(indices, vec![1, 3, 4, 2, 0]);
    }

    #[test]
    fn test_sort_backends_agree_on_random_data() {
        let mut rng = create_rng(42);
        for _ in 0..50 {
            let n = rng.random_range(1..40);
            let costs: Vec<f64> = (0..n).map(|_| rng.random_range(-100.0..100.0)).collect();
            let quick = sort_indices_by_cost(&costs, true);
            let library = sort_indices_by_cost(&costs, false);
            assert!(is_permutation(&quick, n));
            assert!(is_sorted_by_cost(&quick, &costs));
            assert!(is_sorted_by_cost(&library, &costs));
        }
    }

    #[test]
    fn test_quicksort_handles_duplicates() {
        let costs = vec![2.0, 1.0, 2.0, 1.0, 2.0, 1.0];
        let indices = sort_indices_by_cost(&costs, true);
        assert!(is_permutation(&indices, 6));
        assert!(is_sorted_by_cost(&indices, &costs));
    }

    #[test]
    fn test_quicksort_trivial_inputs() {
        assert!(sort_indices_by_cost(&[], true).is_empty());
        assert_eq!(sort_indices_by_cost(&[7.0], true), vec![0]);
        assert_eq!(sort_indices_by_cost(&[2.0, 1.0], true), vec![1, 0]);
    }

    #[test]
    fn test_cumulative_chances_monotone_and_normalized() {
        let ranks = vec![3, 0, 2, 1, 4];
        let chances = cumulative_selection_chances(&ranks);
        assert_eq!(chances.len(), 5);
        for w in chances.windows(2) {
            assert!(w[0] <= w[1], "not monotone: {chances:?}");
        }
        let last = chances.last().copied().unwrap_or(0.0);
        assert!((last - 1.0).abs() < 1e-12, "last entry {last}");
    }

    #[test]
    fn test_cumulative_chances_favor_low_ranks() {
        // Rank 0 at index 1: its increment 1/sqrt(1) is the largest.
        let ranks = vec![1, 0];
        let chances = cumulative_selection_chances(&ranks);
        let first_weight = chances[0];
        let second_weight = chances[1] - chances[0];
        assert!(second_weight > first_weight);
    }

    #[test]
    fn test_sample_cumulative_bounds() {
        let chances = vec![0.25, 0.5, 0.75, 1.0];
        assert_eq!(sample_cumulative(&chances, 0.0), 0);
        assert_eq!(sample_cumulative(&chances, 0.25), 0);
        assert_eq!(sample_cumulative(&chances, 0.26), 1);
        assert_eq!(sample_cumulative(&chances, 0.99), 3);
    }

    #[test]
    fn test_select_keeps_elites_first() {
        // Costs ascending with index, so sorted order is the identity.
        let sorted: Vec<usize> = (0..6).collect();
        let ranks: Vec<usize> = (0..6).collect();
        let chances = cumulative_selection_chances(&ranks);
        let rng = SharedRng::new(9);
        let rnd01 = || rng.uniform01();
        let picked = select_so_indices(&sorted, &chances, 4, 2, &rnd01);
        assert_eq!(picked.len(), 4);
        assert_eq!(&picked[..2], &[0, 1]);
    }

    #[test]
    fn test_select_fills_population_from_combined_pool() {
        // Combined pool of 10 trimmed to 5 with 2 elites.
        let costs = vec![9.0, 1.0, 8.0, 2.0, 7.0, 3.0, 6.0, 4.0, 5.0, 0.5];
        let sorted = sort_indices_by_cost(&costs, true);
        let mut ranks = vec![0usize; costs.len()];
        for (i, &idx) in sorted.iter().enumerate() {
            ranks[idx] = i;
        }
        let chances = cumulative_selection_chances(&ranks);
        let rng = SharedRng::new(4);
        let rnd01 = || rng.uniform01();
        let picked = select_so_indices(&sorted, &chances, 5, 2, &rnd01);
        assert_eq!(picked.len(), 5);
        assert_eq!(picked[0], 9, "best chromosome kept first");
        assert_eq!(picked[1], 1, "second best kept next");
        assert!(picked.iter().all(|&i| i < costs.len()));
    }
}
