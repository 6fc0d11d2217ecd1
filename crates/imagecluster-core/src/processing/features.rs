//! Thumbnail fingerprints.
//!
//! Each image is downscaled to a small square grid and the grid's pixel
//! intensities, scaled to [0, 1], form the fingerprint. Grayscale layers use
//! the luma weights 0.299 R + 0.587 G + 0.114 B.

use indicatif::ProgressBar;
use log::info;
use rayon::prelude::*;
use std::str::FromStr;

use super::{ExtractorFactory, FeatureExtractor};
use crate::error::{Error, Result};
use crate::types::{Fingerprint, Fingerprints, ImageArray, ImageArrays, ImageSize};

/// Available fingerprint layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailLayer {
    /// Grayscale grid of `n x n` values
    Gray(u32),
    /// RGB grid of `n x n x 3` values
    Rgb(u32),
}

impl ThumbnailLayer {
    /// Length of the fingerprints this layer produces
    pub fn dimensions(&self) -> usize {
        match *self {
            ThumbnailLayer::Gray(n) => (n * n) as usize,
            ThumbnailLayer::Rgb(n) => (n * n * 3) as usize,
        }
    }

    fn grid(&self) -> u32 {
        match *self {
            ThumbnailLayer::Gray(n) | ThumbnailLayer::Rgb(n) => n,
        }
    }
}

impl FromStr for ThumbnailLayer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gray8" => Ok(ThumbnailLayer::Gray(8)),
            "gray16" => Ok(ThumbnailLayer::Gray(16)),
            "gray32" => Ok(ThumbnailLayer::Gray(32)),
            "rgb8" => Ok(ThumbnailLayer::Rgb(8)),
            other => Err(Error::Extractor(format!(
                "unknown feature layer '{}' (available: gray8, gray16, gray32, rgb8)",
                other
            ))),
        }
    }
}

/// Extracts thumbnail fingerprints from images of one fixed size
#[derive(Debug, Clone)]
pub struct ThumbnailExtractor {
    layer: ThumbnailLayer,
    input_size: ImageSize,
}

impl ThumbnailExtractor {
    pub fn new(layer: ThumbnailLayer, input_size: ImageSize) -> Self {
        Self { layer, input_size }
    }

    fn fingerprint(&self, array: &ImageArray) -> Result<Fingerprint> {
        let img = array
            .to_rgb_image()
            .ok_or_else(|| Error::Extractor("pixel buffer does not match dimensions".to_string()))?;

        let grid = self.layer.grid();
        let small = image::imageops::resize(
            &img,
            grid,
            grid,
            image::imageops::FilterType::Triangle,
        );

        let mut values = Vec::with_capacity(self.layer.dimensions());
        for pixel in small.pixels() {
            let [r, g, b] = pixel.0;
            match self.layer {
                ThumbnailLayer::Gray(_) => {
                    let gray = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
                    values.push(gray / 255.0);
                }
                ThumbnailLayer::Rgb(_) => {
                    values.extend([r, g, b].iter().map(|&c| c as f32 / 255.0));
                }
            }
        }

        Ok(values)
    }
}

impl FeatureExtractor for ThumbnailExtractor {
    fn extract(&self, images: &ImageArrays) -> Result<Fingerprints> {
        info!(
            "Running {} images through {:?} extractor",
            images.len(),
            self.layer
        );

        let expected = (self.input_size.height, self.input_size.width);
        if let Some((path, array)) = images.iter().find(|(_, a)| a.shape() != expected) {
            return Err(Error::Extractor(format!(
                "{} is {:?}, extractor expects {:?}",
                path.display(),
                array.shape(),
                expected
            )));
        }

        let progress_bar = ProgressBar::new(images.len() as u64);
        let fingerprints: Result<Vec<_>> = images
            .par_iter()
            .map(|(path, array)| {
                let fp = self.fingerprint(array);
                progress_bar.inc(1);
                fp.map(|fp| (path.clone(), fp))
            })
            .collect();
        progress_bar.finish_and_clear();

        Ok(fingerprints?.into_iter().collect())
    }
}

/// Builds [`ThumbnailExtractor`]s from layer names
#[derive(Debug, Clone, Copy, Default)]
pub struct ThumbnailExtractorFactory;

impl ExtractorFactory for ThumbnailExtractorFactory {
    fn build(&self, layer: &str, size: ImageSize) -> Result<Box<dyn FeatureExtractor>> {
        let layer: ThumbnailLayer = layer.parse()?;
        Ok(Box::new(ThumbnailExtractor::new(layer, size)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn images(size: ImageSize) -> ImageArrays {
        let mut images = ImageArrays::new();
        images.insert(
            PathBuf::from("black.png"),
            ImageArray::filled(size.width, size.height, 0),
        );
        images.insert(
            PathBuf::from("white.png"),
            ImageArray::filled(size.width, size.height, 255),
        );
        images
    }

    #[test]
    fn test_unknown_layer_fails_to_build() {
        let result = ThumbnailExtractorFactory.build("fc2", ImageSize::default());
        assert!(matches!(result, Err(Error::Extractor(_))));
    }

    #[test]
    fn test_fingerprint_lengths() {
        let size = ImageSize::new(32, 32);
        for (name, len) in [("gray8", 64), ("gray16", 256), ("gray32", 1024), ("rgb8", 192)] {
            let extractor = ThumbnailExtractorFactory.build(name, size).unwrap();
            let fps = extractor.extract(&images(size)).unwrap();
            assert_eq!(fps.len(), 2);
            assert!(fps.values().all(|fp| fp.len() == len), "layer {}", name);
        }
    }

    #[test]
    fn test_fingerprint_values() {
        let size = ImageSize::new(16, 16);
        let extractor = ThumbnailExtractor::new(ThumbnailLayer::Gray(8), size);
        let fps = extractor.extract(&images(size)).unwrap();

        let black = &fps[&PathBuf::from("black.png")];
        let white = &fps[&PathBuf::from("white.png")];
        assert!(black.iter().all(|&v| v.abs() < 1e-3));
        assert!(white.iter().all(|&v| (v - 1.0).abs() < 1e-2));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let size = ImageSize::new(16, 16);
        let extractor = ThumbnailExtractor::new(ThumbnailLayer::Rgb(8), size);
        let first = extractor.extract(&images(size)).unwrap();
        let second = extractor.extract(&images(size)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_size_mismatch_fails() {
        let extractor = ThumbnailExtractor::new(ThumbnailLayer::Gray(8), ImageSize::new(32, 32));
        let result = extractor.extract(&images(ImageSize::new(16, 16)));
        assert!(matches!(result, Err(Error::Extractor(_))));
    }
}
