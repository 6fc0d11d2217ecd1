use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the imagecluster library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding error
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Artifact or directory does not exist. For artifacts this is an
    /// ordinary cache miss.
    #[error("Not found: {0}")]
    NotFound(PathBuf),

    /// A cached artifact exists but cannot be decoded
    #[error("Corrupt artifact {path}: {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    /// An artifact could not be encoded for writing
    #[error("Failed to encode artifact: {0}")]
    Serialization(String),

    /// Feature extractor failed to build or to run
    #[error("Feature extraction failed: {0}")]
    Extractor(String),

    /// Clustering failed
    #[error("Clustering failed: {0}")]
    Clusterer(String),

    /// Dimensionality reduction failed
    #[error("Dimensionality reduction failed: {0}")]
    Reduction(String),

    /// Link tree could not be written
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Mosaic canvas would exceed the configured memory limit
    #[error(
        "size of mosaic array ({:.1} MiB) > mem_limit ({:.1} MiB)",
        mib(.required),
        mib(.limit)
    )]
    MemoryLimitExceeded { required: u128, limit: u64 },

    /// No cluster survived the mosaic filters
    #[error("Nothing to render")]
    NothingToRender,

    /// Grouping references an image that has no decoded array
    #[error("No image array for {0}")]
    MissingImage(PathBuf),

    /// Image array dimensions differ from the rest of the collection
    #[error("Image {path} is {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        path: PathBuf,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

fn mib<T: Copy + Into<u128>>(bytes: &T) -> f64 {
    let bytes: u128 = (*bytes).into();
    bytes as f64 / (1024.0 * 1024.0)
}

impl Error {
    /// Build a `Filesystem` error for `path`
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Build a `CorruptArtifact` error for `path`
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::CorruptArtifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
