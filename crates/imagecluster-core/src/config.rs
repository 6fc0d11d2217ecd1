use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::processing::PcaParams;
use crate::types::ImageSize;

/// Default hard limit for the mosaic canvas (1 GiB)
pub const DEFAULT_MEM_LIMIT: u64 = 1024 * 1024 * 1024;

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Configuration for building fingerprints and materializing clusters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the directory inside the imagedir holding artifacts and links
    pub namespace: String,

    /// Feature layer the extractor is built for
    pub layer: String,

    /// Size images are resized to before extraction. Must match the layer.
    pub image_size: ImageSize,

    /// Maximum directory depth for scanning (1 = only the imagedir itself)
    pub max_depth: Option<usize>,

    /// Number of threads used for decoding (0 = auto)
    pub threads: usize,

    /// Run PCA on fingerprints before clustering
    pub pca: Option<PcaParams>,

    /// Whether to create a directory of links per cluster
    pub links: bool,

    /// Hierarchical clusters with fewer members are dropped
    pub min_csize: usize,

    /// Mosaic only shows clusters with at most this many members
    pub max_csize: Option<usize>,

    /// Hard memory limit in bytes for the mosaic canvas
    pub mem_limit: u64,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "imagecluster".to_string(),
            layer: "gray32".to_string(),
            image_size: ImageSize::default(),
            max_depth: Some(1),
            threads: 0, // Auto
            pca: None,
            links: true,
            min_csize: 2,
            max_csize: None,
            mem_limit: DEFAULT_MEM_LIMIT,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.namespace.contains(std::path::is_separator) {
            return Err(Error::Configuration(
                "Namespace must be a single non-empty path component".to_string(),
            ));
        }

        if self.image_size.width == 0 || self.image_size.height == 0 {
            return Err(Error::Configuration(format!(
                "Image size must be non-zero, got {}",
                self.image_size
            )));
        }

        if self.min_csize == 0 {
            return Err(Error::Configuration(
                "Minimum cluster size must be at least 1".to_string(),
            ));
        }

        if self.mem_limit == 0 {
            return Err(Error::Configuration(
                "Mosaic memory limit must be positive".to_string(),
            ));
        }

        if let Some(pca) = &self.pca {
            pca.validate()?;
        }

        Ok(())
    }
}
