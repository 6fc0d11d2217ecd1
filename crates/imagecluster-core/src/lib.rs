//! Core functionality for clustering a directory of images.
//!
//! This library provides the building blocks of the clustering pipeline:
//! - Image discovery and decoding
//! - Fingerprint extraction, optional PCA and clustering
//! - Cached artifacts under a namespace directory inside the imagedir
//! - Link trees and mosaics of the clustering result

// -- External Dependencies --
use log::info;

// -- Standard Library --
use std::path::{Path, PathBuf};
use std::time::Instant;

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::*;
pub use error::{Error, Result};
pub use types::*;

// -- Public Modules --
pub mod action;
pub mod clustering;
pub mod config;
pub mod discovery;
pub mod logging;
pub mod persistence;
pub mod processing;
pub mod types;

use clustering::{
    normalize, CanonicalGrouping, ClusterMethod, Clusterer, DefaultClusterer, RawClusterResult,
};
use logging::{log_stage_error, Stage};
use persistence::{ArtifactKey, ArtifactStore, FileArtifactStore};
use processing::{
    DimensionalityReducer, DirectoryDecoder, ExtractorFactory, ImageDecoder, Pca,
    ThumbnailExtractorFactory,
};

/// Name of the link tree directory inside the namespace directory
pub const CLUSTERS_DIR: &str = "clusters";

/// Result of one clustering run
#[derive(Debug, Clone)]
pub struct ClusterRun {
    /// What the clusterer returned
    pub raw: RawClusterResult,
    /// The same result in canonical form
    pub grouping: CanonicalGrouping,
}

/// The imagedir a run works on, used to attribute stage failures
#[derive(Debug, Clone, Copy)]
struct RunContext<'a> {
    imagedir: &'a Path,
}

impl<'a> RunContext<'a> {
    fn new(imagedir: &'a Path) -> Self {
        Self { imagedir }
    }

    /// Run one stage, logging its error before handing it back
    fn stage<T>(&self, stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
        f().map_err(|e| {
            log_stage_error(self.imagedir, stage, &e);
            e
        })
    }
}

/// Main entry point for the clustering pipeline
pub struct Pipeline {
    config: Config,
    store: Box<dyn ArtifactStore>,
    decoder: Box<dyn ImageDecoder>,
    extractors: Box<dyn ExtractorFactory>,
    reducer: Box<dyn DimensionalityReducer>,
    clusterer: Box<dyn Clusterer>,
}

impl Pipeline {
    /// Create a pipeline with the default collaborators for `config`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            store: Box::new(FileArtifactStore::new(config.namespace.clone())),
            decoder: Box::new(DirectoryDecoder::new(&config)),
            extractors: Box::new(ThumbnailExtractorFactory),
            reducer: Box::new(Pca::default()),
            clusterer: Box::new(DefaultClusterer::default().with_min_csize(config.min_csize)),
            config,
        })
    }

    pub fn with_store(mut self, store: impl ArtifactStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn with_decoder(mut self, decoder: impl ImageDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn with_extractors(mut self, extractors: impl ExtractorFactory + 'static) -> Self {
        self.extractors = Box::new(extractors);
        self
    }

    pub fn with_reducer(mut self, reducer: impl DimensionalityReducer + 'static) -> Self {
        self.reducer = Box::new(reducer);
        self
    }

    pub fn with_clusterer(mut self, clusterer: impl Clusterer + 'static) -> Self {
        self.clusterer = Box::new(clusterer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Where the link tree for `imagedir` goes
    pub fn links_dir(&self, imagedir: &Path) -> PathBuf {
        imagedir.join(&self.config.namespace).join(CLUSTERS_DIR)
    }

    /// Fingerprints for every image in `imagedir`.
    ///
    /// Loaded from the fingerprint artifact when present. Otherwise the
    /// extractor is built first, then the image arrays are loaded or decoded,
    /// and the fingerprints are extracted and saved. PCA, if configured, is
    /// applied to the result but never saved.
    pub fn fingerprints(&self, imagedir: &Path) -> Result<Fingerprints> {
        let ctx = RunContext::new(imagedir);
        let key = ArtifactKey::fingerprints(imagedir);

        let fingerprints = if self.store.exists(&key) {
            let fps = ctx.stage(Stage::LoadFingerprints, || {
                self.store.load_fingerprints(imagedir)
            })?;
            info!(
                "loaded {} fingerprints from {}",
                fps.len(),
                self.store.describe(&key).display()
            );
            fps
        } else {
            self.build_fingerprints(&ctx)?
        };

        match &self.config.pca {
            Some(params) => ctx.stage(Stage::Reduce, || {
                self.reducer.reduce(&fingerprints, params)
            }),
            None => Ok(fingerprints),
        }
    }

    fn build_fingerprints(&self, ctx: &RunContext<'_>) -> Result<Fingerprints> {
        let imagedir = ctx.imagedir;
        let extractor = ctx.stage(Stage::BuildExtractor, || {
            self.extractors
                .build(&self.config.layer, self.config.image_size)
        })?;

        let images = self.load_or_decode(ctx)?;

        let start = Instant::now();
        let fingerprints = ctx.stage(Stage::ExtractFingerprints, || extractor.extract(&images))?;
        info!(
            "extracted {} fingerprints in {:.2?}",
            fingerprints.len(),
            start.elapsed()
        );

        ctx.stage(Stage::SaveFingerprints, || {
            self.store.save_fingerprints(imagedir, fingerprints)
        })
    }

    /// Decoded image arrays for `imagedir`, from the artifact or freshly decoded
    pub fn image_arrays(&self, imagedir: &Path) -> Result<ImageArrays> {
        self.load_or_decode(&RunContext::new(imagedir))
    }

    fn load_or_decode(&self, ctx: &RunContext<'_>) -> Result<ImageArrays> {
        let imagedir = ctx.imagedir;
        let key = ArtifactKey::images(imagedir);

        if self.store.exists(&key) {
            let images = ctx.stage(Stage::LoadImages, || self.store.load_images(imagedir))?;
            info!(
                "loaded {} image arrays from {}",
                images.len(),
                self.store.describe(&key).display()
            );
            return Ok(images);
        }

        let start = Instant::now();
        let images = ctx.stage(Stage::DecodeImages, || {
            self.decoder.decode_all(imagedir, self.config.image_size)
        })?;
        info!("decoded {} images in {:.2?}", images.len(), start.elapsed());

        ctx.stage(Stage::SaveImages, || self.store.save_images(imagedir, images))
    }

    /// Cluster `imagedir` and, if enabled, write the link tree
    pub fn run(&self, imagedir: &Path, method: ClusterMethod) -> Result<ClusterRun> {
        let ctx = RunContext::new(imagedir);
        let fingerprints = self.fingerprints(imagedir)?;

        let start = Instant::now();
        let raw = ctx.stage(Stage::Cluster, || self.clusterer.cluster(&fingerprints, method))?;
        let grouping = normalize(&raw);
        info!(
            "found {} clusters in {:.2?}",
            grouping.len(),
            start.elapsed()
        );
        info!("cluster stats:\n{}", grouping.size_stats());

        if self.config.links {
            let target = self.links_dir(imagedir);
            ctx.stage(Stage::Links, || action::materialize(&grouping, &target))?;
        }

        Ok(ClusterRun { raw, grouping })
    }

    /// Render `grouping` as one mosaic image
    pub fn mosaic(&self, imagedir: &Path, grouping: &CanonicalGrouping) -> Result<ImageArray> {
        let ctx = RunContext::new(imagedir);
        let images = self.load_or_decode(&ctx)?;

        ctx.stage(Stage::Mosaic, || {
            action::render(
                grouping,
                &images,
                self.config.max_csize,
                self.config.mem_limit,
            )
        })
    }
}
