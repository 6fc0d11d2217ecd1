use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use super::{ClusterLabel, RawClusterResult};
use crate::types::ImageId;

/// Identifies one cluster of a canonical grouping
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClusterId {
    /// The `index`-th cluster among those with `size` members
    Sized { size: usize, index: usize },
    /// A partition label
    Label(ClusterLabel),
}

impl ClusterId {
    /// Relative directory the cluster's links go into
    pub fn subdir(&self) -> PathBuf {
        match self {
            ClusterId::Sized { size, index } => PathBuf::from(format!("cluster_with_{}", size))
                .join(format!("cluster_{}", index)),
            ClusterId::Label(label) => PathBuf::from(format!("cluster_{}", label)),
        }
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterId::Sized { size, index } => write!(f, "size={}/idx={}", size, index),
            ClusterId::Label(label) => write!(f, "{}", label),
        }
    }
}

/// One cluster and its members in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterGroup {
    pub id: ClusterId,
    pub members: Vec<ImageId>,
}

/// Clustering result in a single shape: ordered clusters of ordered members.
/// Every image of the source result appears in exactly one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalGrouping {
    groups: Vec<ClusterGroup>,
}

impl CanonicalGrouping {
    pub fn groups(&self) -> &[ClusterGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Members of the cluster `id`
    pub fn get(&self, id: &ClusterId) -> Option<&[ImageId]> {
        self.groups
            .iter()
            .find(|g| &g.id == id)
            .map(|g| g.members.as_slice())
    }

    /// All members of all clusters, in grouping order
    pub fn members(&self) -> impl Iterator<Item = &ImageId> {
        self.groups.iter().flat_map(|g| g.members.iter())
    }

    pub fn size_stats(&self) -> ClusterSizeStats {
        ClusterSizeStats::from_grouping(self)
    }
}

impl FromIterator<ClusterGroup> for CanonicalGrouping {
    fn from_iter<I: IntoIterator<Item = ClusterGroup>>(iter: I) -> Self {
        Self {
            groups: iter.into_iter().collect(),
        }
    }
}

/// Number of clusters per cluster size, ascending by size
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSizeStats {
    rows: BTreeMap<usize, usize>,
}

impl ClusterSizeStats {
    pub fn from_grouping(grouping: &CanonicalGrouping) -> Self {
        let mut rows = BTreeMap::new();
        for group in grouping.groups() {
            *rows.entry(group.members.len()).or_insert(0) += 1;
        }
        Self { rows }
    }

    /// Drop every size above `max_csize`
    pub fn capped(mut self, max_csize: Option<usize>) -> Self {
        if let Some(max) = max_csize {
            self.rows.retain(|&size, _| size <= max);
        }
        self
    }

    /// `(size, count)` rows
    pub fn rows(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows.iter().map(|(&size, &count)| (size, count))
    }

    /// Total number of clusters
    pub fn cluster_count(&self) -> usize {
        self.rows.values().sum()
    }

    /// Largest cluster size, 0 if empty
    pub fn max_size(&self) -> usize {
        self.rows.keys().next_back().copied().unwrap_or(0)
    }

    /// Number of images in clusters
    pub fn image_count(&self) -> usize {
        self.rows().map(|(size, count)| size * count).sum()
    }
}

impl fmt::Display for ClusterSizeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#images : #clusters")?;
        for (size, count) in self.rows() {
            writeln!(f, "{} : {}", size, count)?;
        }
        write!(
            f,
            "#images in clusters total: {}",
            self.image_count()
        )
    }
}

/// Convert either raw result shape into a canonical grouping.
///
/// Hierarchical results yield one `Sized` id per (size, index) pair, sizes
/// ascending. Partition results are grouped by label in order of first
/// appearance. Disjointness of the input is assumed.
pub fn normalize(raw: &RawClusterResult) -> CanonicalGrouping {
    match raw {
        RawClusterResult::Hierarchical(by_size) => by_size
            .iter()
            .flat_map(|(&size, clusters)| {
                clusters.iter().enumerate().map(move |(index, members)| ClusterGroup {
                    id: ClusterId::Sized { size, index },
                    members: members.clone(),
                })
            })
            .collect(),
        RawClusterResult::Partition(assignments) => {
            let mut groups: Vec<ClusterGroup> = Vec::new();
            let mut slots: HashMap<&ClusterLabel, usize> = HashMap::new();
            for (id, label) in assignments {
                let slot = *slots.entry(label).or_insert_with(|| {
                    groups.push(ClusterGroup {
                        id: ClusterId::Label(label.clone()),
                        members: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[slot].members.push(id.clone());
            }
            CanonicalGrouping { groups }
        }
    }
}
