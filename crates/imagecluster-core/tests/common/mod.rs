#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use imagecluster_core::processing::{
    DirectoryDecoder, ExtractorFactory, FeatureExtractor, ImageDecoder, ThumbnailExtractorFactory,
};
use imagecluster_core::{Config, Error, Fingerprints, ImageArrays, ImageSize, Result};

/// Size every fixture is decoded at
pub const TEST_SIZE: u32 = 32;

/// Write a solid-color PNG into `dir`
pub fn write_png(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(48, 40, Rgb(color))
        .save(&path)
        .unwrap();
    path
}

/// Two dark and two bright images: a, b look alike, and so do c, d
pub fn write_two_pairs(dir: &Path) -> [PathBuf; 4] {
    [
        write_png(dir, "a.png", [0, 0, 0]),
        write_png(dir, "b.png", [12, 12, 12]),
        write_png(dir, "c.png", [250, 250, 250]),
        write_png(dir, "d.png", [238, 238, 238]),
    ]
}

/// Small, fast configuration for tests
pub fn test_config() -> Config {
    Config {
        layer: "gray8".to_string(),
        image_size: ImageSize::new(TEST_SIZE, TEST_SIZE),
        threads: 2,
        ..Default::default()
    }
}

/// Shared call counter
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// [`DirectoryDecoder`] that counts its calls; clones share the count
#[derive(Clone)]
pub struct CountingDecoder {
    inner: DirectoryDecoder,
    pub calls: Calls,
}

impl CountingDecoder {
    pub fn new(config: &Config) -> Self {
        Self {
            inner: DirectoryDecoder::new(config),
            calls: Calls::default(),
        }
    }
}

impl ImageDecoder for CountingDecoder {
    fn decode_all(&self, imagedir: &Path, size: ImageSize) -> Result<ImageArrays> {
        self.calls.bump();
        self.inner.decode_all(imagedir, size)
    }
}

/// [`ThumbnailExtractorFactory`] that counts builds and extractions
#[derive(Default)]
pub struct CountingFactory {
    pub builds: Calls,
    pub extractions: Calls,
}

impl ExtractorFactory for CountingFactory {
    fn build(&self, layer: &str, size: ImageSize) -> Result<Box<dyn FeatureExtractor>> {
        self.builds.bump();
        let inner = ThumbnailExtractorFactory.build(layer, size)?;
        Ok(Box::new(CountingExtractor {
            inner,
            calls: self.extractions.clone(),
        }))
    }
}

struct CountingExtractor {
    inner: Box<dyn FeatureExtractor>,
    calls: Calls,
}

impl FeatureExtractor for CountingExtractor {
    fn extract(&self, images: &ImageArrays) -> Result<Fingerprints> {
        self.calls.bump();
        self.inner.extract(images)
    }
}

/// Factory whose extractor can never be built
pub struct BrokenFactory;

impl ExtractorFactory for BrokenFactory {
    fn build(&self, layer: &str, _size: ImageSize) -> Result<Box<dyn FeatureExtractor>> {
        Err(Error::Extractor(format!("weights for {} are missing", layer)))
    }
}

/// Factory whose extractors build fine but fail on every collection
pub struct FailingExtractionFactory;

struct FailingExtractor;

impl FeatureExtractor for FailingExtractor {
    fn extract(&self, images: &ImageArrays) -> Result<Fingerprints> {
        Err(Error::Extractor(format!(
            "out of memory after {} images",
            images.len()
        )))
    }
}

impl ExtractorFactory for FailingExtractionFactory {
    fn build(&self, _layer: &str, _size: ImageSize) -> Result<Box<dyn FeatureExtractor>> {
        Ok(Box::new(FailingExtractor))
    }
}
