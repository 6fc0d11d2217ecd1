use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use super::ImageDecoder;
use crate::discovery::discover_images;
use crate::error::{Error, Result};
use crate::types::{ImageArray, ImageArrays, ImageSize};
use crate::Config;

/// Decodes the images of a directory with the `image` crate.
///
/// Any unreadable image fails the whole collection.
#[derive(Debug, Clone)]
pub struct DirectoryDecoder {
    namespace: String,
    max_depth: Option<usize>,
    threads: usize,
}

impl DirectoryDecoder {
    pub fn new(config: &Config) -> Self {
        Self {
            namespace: config.namespace.clone(),
            max_depth: config.max_depth,
            threads: config.threads,
        }
    }
}

impl ImageDecoder for DirectoryDecoder {
    fn decode_all(&self, imagedir: &Path, size: ImageSize) -> Result<ImageArrays> {
        let paths = discover_images(imagedir, &self.namespace, self.max_depth)?;
        if paths.is_empty() {
            warn!("No images found in {}", imagedir.display());
            return Ok(ImageArrays::new());
        }
        info!(
            "Decoding {} images from {} at {}",
            paths.len(),
            imagedir.display(),
            size
        );

        let num_threads = if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build thread pool: {}", e)))?;

        let progress_bar = ProgressBar::new(paths.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("[{eta}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        progress_bar.set_message("Decoding images...");

        let decoded: Result<Vec<(PathBuf, ImageArray)>> = pool.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    let array = decode_one(path, size);
                    progress_bar.inc(1);
                    array.map(|a| (path.clone(), a))
                })
                .collect()
        });

        progress_bar.finish_and_clear();
        Ok(decoded?.into_iter().collect())
    }
}

fn decode_one(path: &Path, size: ImageSize) -> Result<ImageArray> {
    let img = image::open(path).map_err(|e| {
        error!("Failed to decode image {}: {}", path.display(), e);
        Error::Image(e)
    })?;
    Ok(ImageArray::from_image(&img, size))
}
