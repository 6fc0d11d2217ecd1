//! Turning an imagedir into fingerprints.
//!
//! The pipeline only talks to the traits in this module. The bundled
//! implementations decode with the `image` crate, fingerprint with downscaled
//! thumbnails and reduce with PCA.

mod decode;
mod features;
mod reduction;

pub use decode::DirectoryDecoder;
pub use features::{ThumbnailExtractor, ThumbnailExtractorFactory, ThumbnailLayer};
pub use reduction::Pca;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Fingerprints, ImageArrays, ImageSize};

/// Decodes every image of a directory into fixed-size arrays
pub trait ImageDecoder {
    fn decode_all(&self, imagedir: &Path, size: ImageSize) -> Result<ImageArrays>;
}

/// Produces one fixed-length fingerprint per image.
/// Must be deterministic for a fixed layer and input size.
pub trait FeatureExtractor {
    fn extract(&self, images: &ImageArrays) -> Result<Fingerprints>;
}

/// Builds a feature extractor for a layer and input size
pub trait ExtractorFactory {
    fn build(&self, layer: &str, size: ImageSize) -> Result<Box<dyn FeatureExtractor>>;
}

/// Projects fingerprints to fewer dimensions
pub trait DimensionalityReducer {
    fn reduce(&self, fingerprints: &Fingerprints, params: &PcaParams) -> Result<Fingerprints>;
}

/// How many principal components to keep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PcaComponents {
    /// Keep exactly this many components (capped by the data rank)
    Count(usize),
    /// Keep the fewest components explaining at least this fraction of variance
    Fraction(f64),
}

/// Parameters for dimensionality reduction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PcaParams {
    pub n_components: PcaComponents,
}

impl Default for PcaParams {
    fn default() -> Self {
        Self {
            n_components: PcaComponents::Fraction(0.9),
        }
    }
}

impl PcaParams {
    pub fn validate(&self) -> Result<()> {
        match self.n_components {
            PcaComponents::Count(0) => Err(Error::Configuration(
                "PCA component count must be at least 1".to_string(),
            )),
            PcaComponents::Fraction(f) if !(f > 0.0 && f <= 1.0) => Err(Error::Configuration(
                format!("PCA variance fraction must be in (0, 1], got {}", f),
            )),
            _ => Ok(()),
        }
    }
}

impl std::str::FromStr for PcaComponents {
    type Err = Error;

    /// `"0.9"` is a variance fraction, `"12"` a component count
    fn from_str(s: &str) -> Result<Self> {
        if let Ok(count) = s.parse::<usize>() {
            return Ok(PcaComponents::Count(count));
        }
        s.parse::<f64>()
            .map(PcaComponents::Fraction)
            .map_err(|_| Error::Configuration(format!("Invalid PCA components: {}", s)))
    }
}
