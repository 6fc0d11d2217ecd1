use log::info;
use std::fs;
use std::io;
use std::path::Path;

use crate::clustering::CanonicalGrouping;
use crate::error::{Error, Result};
use crate::logging::log_fs_modification;

/// Write `grouping` as a tree of symlinks under `target_dir`.
///
/// Any existing `target_dir` is removed first. Each cluster gets its own
/// subdirectory holding one link per member, named by the member's file name
/// and pointing at its canonical absolute path. Two members of one cluster
/// with the same file name make the second link fail.
pub fn materialize(grouping: &CanonicalGrouping, target_dir: &Path) -> Result<()> {
    info!("cluster dir: {}", target_dir.display());

    if target_dir.exists() {
        fs::remove_dir_all(target_dir).map_err(|e| Error::filesystem(target_dir, e))?;
        log_fs_modification("remove-dir", target_dir, Some("stale link tree"));
    }
    fs::create_dir_all(target_dir).map_err(|e| Error::filesystem(target_dir, e))?;

    let mut link_count = 0;
    for group in grouping.groups() {
        let dir = target_dir.join(group.id.subdir());
        fs::create_dir_all(&dir).map_err(|e| Error::filesystem(&dir, e))?;

        for member in &group.members {
            let source = fs::canonicalize(member).map_err(|e| Error::filesystem(member, e))?;
            let name = member.file_name().ok_or_else(|| {
                Error::filesystem(
                    member,
                    io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"),
                )
            })?;
            let link = dir.join(name);
            symlink(&source, &link).map_err(|e| Error::filesystem(&link, e))?;
            link_count += 1;
        }
    }

    log_fs_modification(
        "create-links",
        target_dir,
        Some(&format!(
            "{} links in {} clusters",
            link_count,
            grouping.len()
        )),
    );
    Ok(())
}

#[cfg(unix)]
fn symlink(source: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, link)
}

#[cfg(windows)]
fn symlink(source: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, link)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::clustering::{normalize, ClusterLabel, RawClusterResult};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"DUMMY IMAGE DATA").unwrap();
        path
    }

    fn link_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_hierarchical_link_tree() {
        let images = tempdir().unwrap();
        let [a, b, c, d] = ["a.jpg", "b.jpg", "c.jpg", "d.jpg"].map(|n| touch(images.path(), n));

        let mut by_size = BTreeMap::new();
        by_size.insert(2, vec![vec![a.clone(), b], vec![c, d]]);
        let grouping = normalize(&RawClusterResult::Hierarchical(by_size));

        let target = images.path().join("imagecluster").join("clusters");
        materialize(&grouping, &target).unwrap();

        let first = target.join("cluster_with_2").join("cluster_0");
        let second = target.join("cluster_with_2").join("cluster_1");
        assert_eq!(link_names(&target.join("cluster_with_2")), vec!["cluster_0", "cluster_1"]);
        assert_eq!(link_names(&first), vec!["a.jpg", "b.jpg"]);
        assert_eq!(link_names(&second), vec!["c.jpg", "d.jpg"]);

        let link = first.join("a.jpg");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), fs::canonicalize(&a).unwrap());
    }

    #[test]
    fn test_rebuild_removes_stale_links() {
        let images = tempdir().unwrap();
        let [a, b, c] = ["a.jpg", "b.jpg", "c.jpg"].map(|n| touch(images.path(), n));
        let target = images.path().join("clusters");

        let first = normalize(&RawClusterResult::Partition(vec![
            (a.clone(), ClusterLabel::Index(0)),
            (b.clone(), ClusterLabel::Index(1)),
            (c.clone(), ClusterLabel::Index(2)),
        ]));
        materialize(&first, &target).unwrap();
        assert_eq!(link_names(&target), vec!["cluster_0", "cluster_1", "cluster_2"]);

        let second = normalize(&RawClusterResult::Partition(vec![
            (a, ClusterLabel::Index(5)),
            (c, ClusterLabel::Index(5)),
        ]));
        materialize(&second, &target).unwrap();

        assert_eq!(link_names(&target), vec!["cluster_5"]);
        assert_eq!(link_names(&target.join("cluster_5")), vec!["a.jpg", "c.jpg"]);
    }

    #[test]
    fn test_basename_collision_fails() {
        let images = tempdir().unwrap();
        fs::create_dir(images.path().join("x")).unwrap();
        fs::create_dir(images.path().join("y")).unwrap();
        let first = touch(&images.path().join("x"), "same.jpg");
        let second = touch(&images.path().join("y"), "same.jpg");

        let grouping = normalize(&RawClusterResult::Partition(vec![
            (first, ClusterLabel::Index(0)),
            (second, ClusterLabel::Index(0)),
        ]));
        let result = materialize(&grouping, &images.path().join("clusters"));

        assert!(matches!(result, Err(Error::Filesystem { .. })));
    }

    #[test]
    fn test_missing_source_fails() {
        let images = tempdir().unwrap();
        let grouping = normalize(&RawClusterResult::Partition(vec![(
            images.path().join("gone.jpg"),
            ClusterLabel::Index(0),
        )]));

        let result = materialize(&grouping, &images.path().join("clusters"));
        assert!(matches!(result, Err(Error::Filesystem { .. })));
    }

    #[test]
    fn test_empty_grouping_leaves_empty_dir() {
        let images = tempdir().unwrap();
        let target = images.path().join("clusters");
        fs::create_dir_all(target.join("cluster_0")).unwrap();

        materialize(&CanonicalGrouping::default(), &target).unwrap();

        assert!(target.is_dir());
        assert!(link_names(&target).is_empty());
    }
}
