use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::types::ImageFormat;

/// Discover the images of one imagedir, sorted by path.
///
/// Returns files with a supported extension, including symlinks to such
/// files; a directory of links picks a subset of a larger collection. The
/// returned path is the link, not its target. Dangling links are skipped, as
/// is the `namespace` directory holding artifacts and link trees.
pub fn discover_images(
    imagedir: &Path,
    namespace: &str,
    max_depth: Option<usize>,
) -> Result<Vec<PathBuf>> {
    if !imagedir.is_dir() {
        return Err(Error::NotFound(imagedir.to_path_buf()));
    }

    let max_depth = max_depth.unwrap_or(usize::MAX);

    let mut image_files: Vec<PathBuf> = WalkDir::new(imagedir)
        .max_depth(max_depth)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_namespace_dir(e, imagedir, namespace))
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| is_image_path(path))
        .collect();

    image_files.sort();
    Ok(image_files)
}

fn is_namespace_dir(entry: &DirEntry, imagedir: &Path, namespace: &str) -> bool {
    entry.file_type().is_dir()
        && entry.depth() == 1
        && entry.path().parent() == Some(imagedir)
        && entry.file_name() == namespace
}

/// Get image format from file extension
fn get_image_format(path: &Path) -> Option<ImageFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(ImageFormat::from_extension)
}

/// Returns if the given path has a supported image extension
pub fn is_image_path(path: &Path) -> bool {
    match get_image_format(path) {
        Some(format) => format.is_supported(),
        None => false,
    }
}

// -- Tests --
