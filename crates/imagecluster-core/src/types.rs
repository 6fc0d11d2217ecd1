use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identifies one input image by its filesystem path
pub type ImageId = PathBuf;

/// Feature vector of one image
pub type Fingerprint = Vec<f32>;

/// Decoded images of one imagedir, keyed and ordered by path
pub type ImageArrays = BTreeMap<ImageId, ImageArray>;

/// Fingerprints of one imagedir, keyed and ordered by path
pub type Fingerprints = BTreeMap<ImageId, Fingerprint>;

/// Supported image formats
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Tiff,
    Gif,
    Webp,
    Bmp,
    Other(String),
}

impl ImageFormat {
    /// Determine format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "tif" | "tiff" => Self::Tiff,
            "gif" => Self::Gif,
            "webp" => Self::Webp,
            "bmp" => Self::Bmp,
            other => Self::Other(other.to_string()),
        }
    }

    /// Check if format is supported
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// Target size images are resized to before feature extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self::new(224, 224)
    }
}

/// Parses `224` (square) or `224x160` (width x height)
impl FromStr for ImageSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| Error::Configuration(format!("Invalid image size: {}", s)))
        };
        match s.split_once('x') {
            Some((w, h)) => Ok(Self::new(parse(w)?, parse(h)?)),
            None => {
                let n = parse(s)?;
                Ok(Self::new(n, n))
            }
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decoded RGB image, row-major, 3 bytes per pixel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArray {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageArray {
    /// Allocate an array filled with a single byte value
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width as usize * height as usize * 3],
        }
    }

    /// Resize `img` to exactly `size` and keep its RGB channels
    pub fn from_image(img: &DynamicImage, size: ImageSize) -> Self {
        let rgb = img
            .resize_exact(
                size.width,
                size.height,
                image::imageops::FilterType::Triangle,
            )
            .to_rgb8();
        Self::from(rgb)
    }

    /// (height, width), the order rows and columns are tiled in
    pub fn shape(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    /// Bytes in one row of pixels
    pub fn row_len(&self) -> usize {
        self.width as usize * 3
    }

    /// Convert to an `image` buffer, e.g. for saving to disk.
    /// Returns `None` if the pixel buffer does not match the dimensions.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}

impl From<RgbImage> for ImageArray {
    fn from(img: RgbImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            pixels: img.into_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ImageFormat::from_extension("JPG"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("tif"), ImageFormat::Tiff);
        assert!(ImageFormat::from_extension("webp").is_supported());
        assert!(!ImageFormat::from_extension("txt").is_supported());
    }

    #[test]
    fn test_from_image_resizes() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, image::Rgb([10, 20, 30])));
        let arr = ImageArray::from_image(&img, ImageSize::new(8, 4));

        assert_eq!(arr.shape(), (4, 8));
        assert_eq!(arr.pixels.len(), 8 * 4 * 3);
        for (got, want) in arr.pixels[..3].iter().zip([10u8, 20, 30]) {
            assert!(got.abs_diff(want) <= 1);
        }
    }

    #[test]
    fn test_parse_image_size() {
        assert_eq!("64".parse::<ImageSize>().unwrap(), ImageSize::new(64, 64));
        assert_eq!("224x160".parse::<ImageSize>().unwrap(), ImageSize::new(224, 160));
        assert!("big".parse::<ImageSize>().is_err());
        assert!("10x".parse::<ImageSize>().is_err());
    }

    #[test]
    fn test_rgb_image_conversion() {
        let arr = ImageArray::filled(3, 2, 255);
        let img = arr.to_rgb_image().unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(ImageArray::from(img), arr);
    }
}
