use log::info;

use crate::clustering::{CanonicalGrouping, ClusterGroup};
use crate::error::{Error, Result};
use crate::types::{ImageArray, ImageArrays};

/// Tile the clusters of `grouping` into one white canvas.
///
/// One column per cluster, one row per member, clusters ordered by ascending
/// size. Clusters with more than `max_csize` members are left out entirely.
/// Fails with [`Error::MemoryLimitExceeded`] before allocating if the canvas
/// would need more than `mem_limit` bytes.
pub fn render(
    grouping: &CanonicalGrouping,
    images: &ImageArrays,
    max_csize: Option<usize>,
    mem_limit: u64,
) -> Result<ImageArray> {
    let stats = grouping.size_stats().capped(max_csize);
    let ncols = stats.cluster_count();
    let nrows = stats.max_size();
    if ncols == 0 || nrows == 0 {
        return Err(Error::NothingToRender);
    }

    let (cell_h, cell_w) = images
        .values()
        .next()
        .map(ImageArray::shape)
        .ok_or(Error::NothingToRender)?;

    let required = nrows as u128 * cell_h as u128 * ncols as u128 * cell_w as u128 * 3;
    if required > mem_limit as u128 {
        return Err(Error::MemoryLimitExceeded {
            required,
            limit: mem_limit,
        });
    }

    let canvas_h = u32::try_from(nrows as u64 * cell_h as u64)
        .map_err(|_| Error::Configuration(format!("mosaic with {} rows is too tall", nrows)))?;
    let canvas_w = u32::try_from(ncols as u64 * cell_w as u64)
        .map_err(|_| Error::Configuration(format!("mosaic with {} columns is too wide", ncols)))?;

    let mut clusters: Vec<&ClusterGroup> = grouping
        .groups()
        .iter()
        .filter(|g| max_csize.map_or(true, |max| g.members.len() <= max))
        .collect();
    clusters.sort_by_key(|g| g.members.len());

    let mut canvas = ImageArray::filled(canvas_w, canvas_h, 255);
    for (icol, group) in clusters.iter().enumerate() {
        for (irow, id) in group.members.iter().enumerate() {
            let img = images
                .get(id)
                .ok_or_else(|| Error::MissingImage(id.clone()))?;
            if img.shape() != (cell_h, cell_w) || img.pixels.len() != img.row_len() * cell_h as usize
            {
                return Err(Error::ShapeMismatch {
                    path: id.clone(),
                    expected: (cell_h, cell_w),
                    actual: img.shape(),
                });
            }
            blit(
                &mut canvas,
                img,
                irow * cell_h as usize,
                icol * cell_w as usize,
            );
        }
    }

    info!(
        "mosaic array ({}x{}) size: {:.1} MiB",
        canvas_w,
        canvas_h,
        canvas.pixels.len() as f64 / (1024.0 * 1024.0)
    );
    Ok(canvas)
}

/// Copy `img` into `canvas` with its top-left pixel at (`top`, `left`)
fn blit(canvas: &mut ImageArray, img: &ImageArray, top: usize, left: usize) {
    let canvas_row = canvas.row_len();
    let img_row = img.row_len();
    for y in 0..img.height as usize {
        let dst = (top + y) * canvas_row + left * 3;
        let src = y * img_row;
        canvas.pixels[dst..dst + img_row].copy_from_slice(&img.pixels[src..src + img_row]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::{normalize, RawClusterResult};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    const CELL: u32 = 2;

    fn arrays(names: &[(&str, u8)]) -> ImageArrays {
        names
            .iter()
            .map(|(name, value)| (PathBuf::from(name), ImageArray::filled(CELL, CELL, *value)))
            .collect()
    }

    fn grouping(by_size: Vec<(usize, Vec<Vec<&str>>)>) -> CanonicalGrouping {
        let by_size: BTreeMap<usize, Vec<Vec<PathBuf>>> = by_size
            .into_iter()
            .map(|(size, clusters)| {
                (
                    size,
                    clusters
                        .into_iter()
                        .map(|c| c.into_iter().map(PathBuf::from).collect())
                        .collect(),
                )
            })
            .collect();
        normalize(&RawClusterResult::Hierarchical(by_size))
    }

    /// Value of the top-left pixel of cell (row, col)
    fn cell(canvas: &ImageArray, row: usize, col: usize) -> u8 {
        let y = row * CELL as usize;
        let x = col * CELL as usize;
        canvas.pixels[y * canvas.row_len() + x * 3]
    }

    #[test]
    fn test_tiles_clusters_by_size() {
        let images = arrays(&[("a", 10), ("b", 20), ("c", 30), ("d", 40)]);
        let grouping = grouping(vec![(1, vec![vec!["a"]]), (3, vec![vec!["b", "c", "d"]])]);

        let canvas = render(&grouping, &images, None, u64::MAX).unwrap();

        assert_eq!(canvas.shape(), (3 * CELL, 2 * CELL));
        assert_eq!(cell(&canvas, 0, 0), 10);
        assert_eq!(cell(&canvas, 1, 0), 255);
        assert_eq!(cell(&canvas, 2, 0), 255);
        assert_eq!(cell(&canvas, 0, 1), 20);
        assert_eq!(cell(&canvas, 1, 1), 30);
        assert_eq!(cell(&canvas, 2, 1), 40);
    }

    #[test]
    fn test_max_csize_excludes_large_clusters() {
        let images = arrays(&[("a", 10), ("b", 20), ("c", 30), ("d", 40), ("e", 50)]);
        let grouping = grouping(vec![
            (2, vec![vec!["a", "b"], vec!["c", "d"]]),
            (3, vec![vec!["a", "b", "e"]]),
        ]);

        let canvas = render(&grouping, &images, Some(2), u64::MAX).unwrap();

        assert_eq!(canvas.shape(), (2 * CELL, 2 * CELL));
        assert_eq!(cell(&canvas, 0, 1), 30);
        assert_eq!(cell(&canvas, 1, 1), 40);
    }

    #[test]
    fn test_memory_limit() {
        let images = arrays(&[("a", 10), ("b", 20)]);
        let grouping = grouping(vec![(2, vec![vec!["a", "b"]])]);

        // 2 rows x 1 column of 2x2 RGB cells
        let required = 2 * 2 * 2 * 3;
        let result = render(&grouping, &images, None, required - 1);
        match result {
            Err(Error::MemoryLimitExceeded { required: r, limit }) => {
                assert_eq!(r, required as u128);
                assert_eq!(limit, required - 1);
            }
            other => panic!("expected memory limit error, got {:?}", other),
        }

        assert!(render(&grouping, &images, None, required).is_ok());
    }

    #[test]
    fn test_nothing_to_render() {
        let images = arrays(&[("a", 10), ("b", 20), ("c", 30)]);
        let grouping = grouping(vec![(3, vec![vec!["a", "b", "c"]])]);

        assert!(matches!(
            render(&grouping, &images, Some(2), u64::MAX),
            Err(Error::NothingToRender)
        ));
        assert!(matches!(
            render(&CanonicalGrouping::default(), &images, None, u64::MAX),
            Err(Error::NothingToRender)
        ));
    }

    #[test]
    fn test_missing_image() {
        let images = arrays(&[("a", 10)]);
        let grouping = grouping(vec![(2, vec![vec!["a", "zz"]])]);

        assert!(matches!(
            render(&grouping, &images, None, u64::MAX),
            Err(Error::MissingImage(p)) if p == PathBuf::from("zz")
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let mut images = arrays(&[("a", 10)]);
        images.insert(PathBuf::from("b"), ImageArray::filled(3, 2, 0));
        let grouping = grouping(vec![(2, vec![vec!["a", "b"]])]);

        assert!(matches!(
            render(&grouping, &images, None, u64::MAX),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
