//! Spatial coherence of a block assignment

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

use crate::cluster::{BlockAssignment, DEGENERATE_SCORE};
use crate::data::SpatialLayout;

/// Above this many points the per-point work is spread over the thread pool
const PARALLEL_THRESHOLD: usize = 1000;

fn distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Silhouette coefficient of one point given dense cluster ids `0..k`
fn point_silhouette(points: &Array2<f64>, clusters: &[usize], sizes: &[usize], i: usize) -> f64 {
    let own = clusters[i];
    if sizes[own] <= 1 {
        return 0.0;
    }

    let mut sums = vec![0.0; sizes.len()];
    let p = points.row(i);
    for (j, &cluster) in clusters.iter().enumerate() {
        if j != i {
            sums[cluster] += distance(p, points.row(j));
        }
    }

    let a = sums[own] / (sizes[own] - 1) as f64;
    let b = sums
        .iter()
        .zip(sizes)
        .enumerate()
        .filter(|&(c, (_, &size))| c != own && size > 0)
        .map(|(_, (&sum, &size))| sum / size as f64)
        .fold(f64::INFINITY, f64::min);

    let denom = a.max(b);
    if denom > 0.0 && denom.is_finite() {
        (b - a) / denom
    } else {
        0.0
    }
}

/// Mean silhouette coefficient of labelled points.
///
/// Returns [`DEGENERATE_SCORE`] when fewer than two distinct labels are given.
/// Points alone in their cluster contribute 0.
pub fn silhouette_score(points: &Array2<f64>, labels: &[u32]) -> f64 {
    debug_assert_eq!(points.nrows(), labels.len());

    let mut dense = std::collections::HashMap::new();
    let clusters: Vec<usize> = labels
        .iter()
        .map(|label| {
            let next = dense.len();
            *dense.entry(*label).or_insert(next)
        })
        .collect();

    if dense.len() < 2 {
        return DEGENERATE_SCORE;
    }

    let mut sizes = vec![0usize; dense.len()];
    for &c in &clusters {
        sizes[c] += 1;
    }

    let n = labels.len();
    let total: f64 = if n < PARALLEL_THRESHOLD {
        (0..n).map(|i| point_silhouette(points, &clusters, &sizes, i)).sum()
    } else {
        (0..n)
            .into_par_iter()
            .map(|i| point_silhouette(points, &clusters, &sizes, i))
            .sum()
    };

    total / n as f64
}

/// Score an assignment against a layout.
///
/// Only nodes present in both are scored; the assignment itself is left as is.
pub fn score_against_layout(assignment: &BlockAssignment, layout: &SpatialLayout) -> f64 {
    let mut flat = Vec::with_capacity(assignment.len() * 2);
    let mut labels = Vec::with_capacity(assignment.len());

    for (user_id, &block) in assignment.user_ids.iter().zip(&assignment.blocks) {
        if let Some(row) = layout.position(user_id) {
            flat.extend(layout.point(row).iter().copied());
            labels.push(block);
        }
    }

    let points = match Array2::from_shape_vec((labels.len(), 2), flat) {
        Ok(points) => points,
        Err(_) => return DEGENERATE_SCORE,
    };

    silhouette_score(&points, &labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn well_separated_clusters_score_high() {
        let points = array![[0.0, 0.0], [0.0, 1.0], [10.0, 0.0], [10.0, 1.0]];
        let score = silhouette_score(&points, &[1, 1, 2, 2]);
        // a = 1, b = mean(10, sqrt(101)) for every point
        let b = (10.0 + 101.0_f64.sqrt()) / 2.0;
        assert_abs_diff_eq!(score, (b - 1.0) / b, epsilon = 1e-12);
    }

    #[test]
    fn single_cluster_is_degenerate() {
        let points = array![[0.0, 0.0], [1.0, 1.0]];
        assert_eq!(silhouette_score(&points, &[3, 3]), DEGENERATE_SCORE);
        assert_eq!(silhouette_score(&Array2::zeros((0, 2)), &[]), DEGENERATE_SCORE);
    }

    #[test]
    fn score_stays_in_range() {
        let points = array![[0.0, 0.0], [5.0, 5.0], [0.1, 0.0], [5.0, 5.1], [2.5, 2.5]];
        let score = silhouette_score(&points, &[1, 1, 2, 2, 1]);
        assert!((-1.0..=1.0).contains(&score));
        assert!(score < 0.0);
    }

    #[test]
    fn singletons_contribute_zero() {
        let points = array![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]];
        assert_abs_diff_eq!(silhouette_score(&points, &[1, 2, 3]), 0.0);
    }

    #[test]
    fn layout_join_drops_only_unplaced_nodes() {
        let assignment = BlockAssignment {
            user_ids: vec!["a".into(), "b".into(), "c".into(), "ghost".into()],
            blocks: vec![1, 1, 2, 2],
            indegree: vec![0; 4],
            outdegree: vec![0; 4],
        };
        let layout = SpatialLayout::from_points(vec![
            ("a".to_string(), 0.0, 0.0),
            ("b".to_string(), 0.0, 1.0),
            ("c".to_string(), 10.0, 0.0),
        ]);

        let score = score_against_layout(&assignment, &layout);
        assert!(score > 0.0 && score <= 1.0);
        assert_eq!(assignment.len(), 4);

        let lone = SpatialLayout::from_points(vec![("a".to_string(), 0.0, 0.0)]);
        assert_eq!(score_against_layout(&assignment, &lone), DEGENERATE_SCORE);
    }
}
