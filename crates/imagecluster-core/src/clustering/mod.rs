//! Clustering of fingerprints and the two shapes of clustering results.

mod hierarchical;
mod kmeans;
mod normalize;

pub use normalize::{normalize, CanonicalGrouping, ClusterGroup, ClusterId, ClusterSizeStats};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::types::{Fingerprints, ImageId};

/// Label assigned to an image by a partitioning clusterer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClusterLabel {
    Index(usize),
    Name(String),
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterLabel::Index(i) => write!(f, "{}", i),
            ClusterLabel::Name(name) => f.write_str(name),
        }
    }
}

/// Raw output of a clusterer
#[derive(Debug, Clone, PartialEq)]
pub enum RawClusterResult {
    /// Cluster size -> clusters of that size, each an ordered list of images
    Hierarchical(BTreeMap<usize, Vec<Vec<ImageId>>>),
    /// One label per image, in input order
    Partition(Vec<(ImageId, ClusterLabel)>),
}

/// How a run should cluster
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClusterMethod {
    /// Group by similarity threshold (0..1)
    Hierarchical { similarity: f64 },
    /// Partition into `k` clusters
    Partition { k: usize },
}

/// Groups fingerprints into clusters
pub trait Clusterer {
    fn cluster_hierarchical(
        &self,
        fingerprints: &Fingerprints,
        similarity: f64,
    ) -> Result<RawClusterResult>;

    fn cluster_partition(&self, fingerprints: &Fingerprints, k: usize) -> Result<RawClusterResult>;

    fn cluster(&self, fingerprints: &Fingerprints, method: ClusterMethod) -> Result<RawClusterResult> {
        match method {
            ClusterMethod::Hierarchical { similarity } => {
                self.cluster_hierarchical(fingerprints, similarity)
            }
            ClusterMethod::Partition { k } => self.cluster_partition(fingerprints, k),
        }
    }
}

/// Average-linkage hierarchical clustering and k-means
#[derive(Debug, Clone)]
pub struct DefaultClusterer {
    /// Hierarchical clusters with fewer members are dropped
    pub min_csize: usize,
    /// Iteration cap for k-means
    pub max_iterations: usize,
}

impl Default for DefaultClusterer {
    fn default() -> Self {
        Self {
            min_csize: 2,
            max_iterations: 300,
        }
    }
}

impl DefaultClusterer {
    pub fn with_min_csize(mut self, min_csize: usize) -> Self {
        self.min_csize = min_csize;
        self
    }
}

impl Clusterer for DefaultClusterer {
    fn cluster_hierarchical(
        &self,
        fingerprints: &Fingerprints,
        similarity: f64,
    ) -> Result<RawClusterResult> {
        hierarchical::cluster(fingerprints, similarity, self.min_csize)
    }

    fn cluster_partition(&self, fingerprints: &Fingerprints, k: usize) -> Result<RawClusterResult> {
        kmeans::cluster(fingerprints, k, self.max_iterations)
    }
}

/// Fingerprints as rows, in key order; fails on inconsistent lengths
fn rows(fingerprints: &Fingerprints) -> Result<(Vec<&ImageId>, Vec<&[f32]>)> {
    let dims = fingerprints.values().next().map(Vec::len).unwrap_or(0);
    let mut ids = Vec::with_capacity(fingerprints.len());
    let mut data = Vec::with_capacity(fingerprints.len());
    for (id, fp) in fingerprints {
        if fp.len() != dims {
            return Err(crate::Error::Clusterer(format!(
                "fingerprint of {} has length {}, expected {}",
                id.display(),
                fp.len(),
                dims
            )));
        }
        ids.push(id);
        data.push(fp.as_slice());
    }
    Ok((ids, data))
}

fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (*x - *y) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
