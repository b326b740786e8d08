//! One-dimensional DBSCAN over trade sizes.
//!
//! Both backends share the neighbour predicate `|a - b| <= eps` and the same
//! expansion order, so they label every input identically. Cluster ids are
//! assigned in discovery order (lowest unvisited core index first).

use std::cmp::Ordering;
use std::collections::VecDeque;

/// `None` marks noise.
pub type Labels = Vec<Option<usize>>;

pub trait DensityClustering: Send + Sync {
    fn name(&self) -> &'static str;
    fn cluster(&self, values: &[f64], eps: f64, min_samples: usize) -> Labels;
}

fn within(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

/// Shared expansion loop, parameterised by the neighbourhood query.
fn dbscan_with<F>(n: usize, min_samples: usize, mut region: F) -> Labels
where
    F: FnMut(usize) -> Vec<usize>,
{
    let mut labels: Labels = vec![None; n];
    let mut visited = vec![false; n];
    let mut next_id = 0;

    for p in 0..n {
        if visited[p] {
            continue;
        }
        visited[p] = true;
        let seeds = region(p);
        if seeds.len() < min_samples {
            continue;
        }

        let id = next_id;
        next_id += 1;
        labels[p] = Some(id);

        let mut queue: VecDeque<usize> = seeds.into();
        while let Some(q) = queue.pop_front() {
            if labels[q].is_none() {
                labels[q] = Some(id);
            }
            if visited[q] {
                continue;
            }
            visited[q] = true;
            let reach = region(q);
            if reach.len() >= min_samples {
                queue.extend(reach);
            }
        }
    }
    labels
}

/// Quadratic scan. Always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScanDbscan;

impl DensityClustering for LinearScanDbscan {
    fn name(&self) -> &'static str {
        "linear_scan"
    }

    fn cluster(&self, values: &[f64], eps: f64, min_samples: usize) -> Labels {
        dbscan_with(values.len(), min_samples, |p| {
            (0..values.len())
                .filter(|&j| within(values[p], values[j], eps))
                .collect()
        })
    }
}

/// Sort once, answer each neighbourhood with two binary searches.
/// Requires finite input.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortedDbscan;

impl SortedDbscan {
    pub fn supports(values: &[f64]) -> bool {
        values.iter().all(|v| v.is_finite())
    }
}

impl DensityClustering for SortedDbscan {
    fn name(&self) -> &'static str {
        "sorted"
    }

    fn cluster(&self, values: &[f64], eps: f64, min_samples: usize) -> Labels {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
        let sorted: Vec<f64> = order.iter().map(|&i| values[i]).collect();

        dbscan_with(values.len(), min_samples, |p| {
            let v = values[p];
            // The predicate is monotone along the sorted axis on both sides of v.
            let lo = sorted.partition_point(|&x| x < v && !within(x, v, eps));
            let hi = sorted.partition_point(|&x| x <= v || within(x, v, eps));
            order[lo..hi].to_vec()
        })
    }
}

/// Prefers the sorted backend when it is enabled and the input allows it.
pub fn select_backend(values: &[f64], fast_enabled: bool) -> &'static dyn DensityClustering {
    static SORTED: SortedDbscan = SortedDbscan;
    static LINEAR: LinearScanDbscan = LinearScanDbscan;
    if fast_enabled && SortedDbscan::supports(values) {
        &SORTED
    } else {
        &LINEAR
    }
}

/// Groups member indices per cluster id.
pub fn members(labels: &Labels) -> Vec<Vec<usize>> {
    let n_clusters = labels.iter().flatten().max().map_or(0, |m| m + 1);
    let mut groups = vec![Vec::new(); n_clusters];
    for (i, label) in labels.iter().enumerate() {
        if let Some(id) = label {
            groups[*id].push(i);
        }
    }
    groups
}
