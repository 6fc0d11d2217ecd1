use log::debug;

use super::{rows, ClusterLabel, RawClusterResult};
use crate::error::{Error, Result};
use crate::types::Fingerprints;

/// Lloyd's k-means with deterministic farthest-point seeding.
///
/// The first fingerprint seeds centroid 0; every further centroid is the
/// fingerprint farthest from all chosen ones. Iterates until no assignment
/// changes or `max_iterations` is reached.
pub(super) fn cluster(
    fingerprints: &Fingerprints,
    k: usize,
    max_iterations: usize,
) -> Result<RawClusterResult> {
    let (ids, data) = rows(fingerprints)?;
    let n = ids.len();

    if max_iterations == 0 {
        return Err(Error::Clusterer(
            "k-means needs at least one iteration".to_string(),
        ));
    }
    if k == 0 {
        return Err(Error::Clusterer("number of clusters must be positive".to_string()));
    }
    if k > n {
        return Err(Error::Clusterer(format!(
            "cannot form {} clusters from {} fingerprints",
            k, n
        )));
    }
    let dims = data[0].len();

    let mut centroids: Vec<Vec<f64>> = vec![to_f64(data[0])];
    let mut nearest_seed: Vec<f64> = data
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();
    while centroids.len() < k {
        let mut farthest = 0;
        for (i, &d) in nearest_seed.iter().enumerate() {
            if d > nearest_seed[farthest] {
                farthest = i;
            }
        }
        let seed = to_f64(data[farthest]);
        for (slot, p) in nearest_seed.iter_mut().zip(&data) {
            *slot = slot.min(squared_distance(p, &seed));
        }
        centroids.push(seed);
    }

    let mut assignments = vec![usize::MAX; n];
    for iteration in 0..max_iterations {
        let mut changed = false;
        for (slot, p) in assignments.iter_mut().zip(&data) {
            let c = nearest_centroid(p, &centroids);
            if *slot != c {
                *slot = c;
                changed = true;
            }
        }
        if !changed {
            debug!("k-means converged after {} iterations", iteration);
            break;
        }

        let mut sums = vec![vec![0.0f64; dims]; k];
        let mut counts = vec![0usize; k];
        for (&c, p) in assignments.iter().zip(&data) {
            counts[c] += 1;
            for (s, &v) in sums[c].iter_mut().zip(p.iter()) {
                *s += v as f64;
            }
        }
        // An empty cluster keeps its previous centroid
        for ((centroid, sum), &count) in centroids.iter_mut().zip(sums).zip(&counts) {
            if count > 0 {
                *centroid = sum.into_iter().map(|s| s / count as f64).collect();
            }
        }
    }

    Ok(RawClusterResult::Partition(
        ids.into_iter()
            .cloned()
            .zip(assignments.into_iter().map(ClusterLabel::Index))
            .collect(),
    ))
}

fn to_f64(p: &[f32]) -> Vec<f64> {
    p.iter().map(|&v| v as f64).collect()
}

fn squared_distance(p: &[f32], c: &[f64]) -> f64 {
    p.iter()
        .zip(c)
        .map(|(&x, &y)| {
            let d = x as f64 - y;
            d * d
        })
        .sum()
}

fn nearest_centroid(p: &[f32], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(p, c);
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fingerprints() -> Fingerprints {
        [
            ("a.png", [0.0f32, 0.0]),
            ("b.png", [9.0, 9.0]),
            ("c.png", [0.2, 0.1]),
            ("d.png", [9.1, 8.8]),
            ("e.png", [0.1, 0.3]),
        ]
        .iter()
        .map(|(name, p)| (PathBuf::from(name), p.to_vec()))
        .collect()
    }

    fn labels(result: RawClusterResult) -> Vec<(String, ClusterLabel)> {
        let RawClusterResult::Partition(assignments) = result else {
            panic!("expected partition result");
        };
        assignments
            .into_iter()
            .map(|(id, label)| (id.display().to_string(), label))
            .collect()
    }

    #[test]
    fn test_two_clusters() {
        let result = labels(cluster(&fingerprints(), 2, 300).unwrap());

        let expected = vec![
            ("a.png".to_string(), ClusterLabel::Index(0)),
            ("b.png".to_string(), ClusterLabel::Index(1)),
            ("c.png".to_string(), ClusterLabel::Index(0)),
            ("d.png".to_string(), ClusterLabel::Index(1)),
            ("e.png".to_string(), ClusterLabel::Index(0)),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn test_single_cluster() {
        let result = labels(cluster(&fingerprints(), 1, 300).unwrap());
        assert!(result.iter().all(|(_, l)| *l == ClusterLabel::Index(0)));
    }

    #[test]
    fn test_k_equals_n_separates_everything() {
        let result = labels(cluster(&fingerprints(), 5, 300).unwrap());
        let mut seen: Vec<_> = result.into_iter().map(|(_, l)| l).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_zero_iterations_is_rejected() {
        let result = cluster(&fingerprints(), 2, 0);
        assert!(matches!(result, Err(Error::Clusterer(_))));
    }

    #[test]
    fn test_single_iteration_assigns_every_point() {
        let result = labels(cluster(&fingerprints(), 2, 1).unwrap());
        assert!(result
            .iter()
            .all(|(_, label)| matches!(label, ClusterLabel::Index(i) if *i < 2)));
    }

    #[test]
    fn test_invalid_k() {
        assert!(matches!(
            cluster(&fingerprints(), 0, 300),
            Err(Error::Clusterer(_))
        ));
        assert!(matches!(
            cluster(&fingerprints(), 6, 300),
            Err(Error::Clusterer(_))
        ));
    }
}
