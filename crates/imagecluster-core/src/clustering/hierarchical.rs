use log::debug;
use std::collections::BTreeMap;

use super::{euclidean, rows, RawClusterResult};
use crate::error::{Error, Result};
use crate::types::Fingerprints;

/// Average-linkage agglomerative clustering on euclidean distance.
///
/// Clusters keep merging while their average distance is at most
/// `max_pairwise_distance * (1 - similarity)`. The result groups clusters by
/// size; clusters with fewer than `min_csize` members are dropped. Members
/// keep fingerprint order and clusters of one size are ordered by their first
/// member.
pub(super) fn cluster(
    fingerprints: &Fingerprints,
    similarity: f64,
    min_csize: usize,
) -> Result<RawClusterResult> {
    if !(0.0..=1.0).contains(&similarity) {
        return Err(Error::Clusterer(format!(
            "similarity must be in 0..1, got {}",
            similarity
        )));
    }

    let (ids, data) = rows(fingerprints)?;
    let n = ids.len();

    let mut dist = vec![vec![0.0f64; n]; n];
    let mut max_dist = 0.0f64;
    for i in 0..n {
        for j in (i + 1)..n {
            let d = euclidean(data[i], data[j]);
            dist[i][j] = d;
            dist[j][i] = d;
            max_dist = max_dist.max(d);
        }
    }
    let threshold = max_dist * (1.0 - similarity);
    debug!(
        "Clustering {} fingerprints, max distance {:.4}, cut at {:.4}",
        n, max_dist, threshold
    );

    // Slot i holds the members of the cluster represented by index i
    let mut clusters: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();

    loop {
        let mut closest: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if clusters[i].is_none() {
                continue;
            }
            for j in (i + 1)..n {
                if clusters[j].is_none() {
                    continue;
                }
                let d = dist[i][j];
                if closest.map_or(true, |(_, _, best)| d < best) {
                    closest = Some((i, j, d));
                }
            }
        }

        let Some((a, b, d)) = closest else { break };
        if d > threshold {
            break;
        }

        let merged = match clusters[b].take() {
            Some(members) => members,
            None => break,
        };
        let size_a = clusters[a].as_ref().map_or(0, Vec::len) as f64;
        let size_b = merged.len() as f64;
        for k in 0..n {
            if k == a || k == b || clusters[k].is_none() {
                continue;
            }
            let avg = (size_a * dist[a][k] + size_b * dist[b][k]) / (size_a + size_b);
            dist[a][k] = avg;
            dist[k][a] = avg;
        }
        if let Some(members) = clusters[a].as_mut() {
            members.extend(merged);
        }
    }

    let mut groups: Vec<Vec<usize>> = clusters
        .into_iter()
        .flatten()
        .map(|mut members| {
            members.sort_unstable();
            members
        })
        .collect();
    groups.sort_by_key(|members| members[0]);

    let mut by_size = BTreeMap::new();
    for members in groups.into_iter().filter(|m| m.len() >= min_csize) {
        by_size
            .entry(members.len())
            .or_insert_with(Vec::new)
            .push(members.iter().map(|&i| ids[i].clone()).collect());
    }

    Ok(RawClusterResult::Hierarchical(by_size))
}
