//! Cached intermediate artifacts.
//!
//! An artifact is the decoded image collection or the fingerprint collection
//! of one imagedir. Artifacts are written once, read on every later run and
//! only ever replaced whole.

mod file_store;

pub use file_store::FileArtifactStore;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{Fingerprints, ImageArrays};

/// Which collection an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Images,
    Fingerprints,
}

impl ArtifactKind {
    /// File stem used for this kind on disk
    pub fn stem(&self) -> &'static str {
        match self {
            ArtifactKind::Images => "images",
            ArtifactKind::Fingerprints => "fingerprints",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            ArtifactKind::Images => 1,
            ArtifactKind::Fingerprints => 2,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ArtifactKind::Images),
            2 => Some(ArtifactKind::Fingerprints),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// Identifies one artifact: the imagedir it was computed from and its kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub imagedir: PathBuf,
    pub kind: ArtifactKind,
}

impl ArtifactKey {
    pub fn new(imagedir: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        Self {
            imagedir: imagedir.into(),
            kind,
        }
    }

    pub fn images(imagedir: &Path) -> Self {
        Self::new(imagedir, ArtifactKind::Images)
    }

    pub fn fingerprints(imagedir: &Path) -> Self {
        Self::new(imagedir, ArtifactKind::Fingerprints)
    }
}

/// A persisted collection
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Images(ImageArrays),
    Fingerprints(Fingerprints),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Images(_) => ArtifactKind::Images,
            Artifact::Fingerprints(_) => ArtifactKind::Fingerprints,
        }
    }

    /// The image collection, or the artifact itself if it holds something else
    pub fn into_images(self) -> std::result::Result<ImageArrays, Self> {
        match self {
            Artifact::Images(images) => Ok(images),
            other => Err(other),
        }
    }

    /// The fingerprints, or the artifact itself if it holds something else
    pub fn into_fingerprints(self) -> std::result::Result<Fingerprints, Self> {
        match self {
            Artifact::Fingerprints(fps) => Ok(fps),
            other => Err(other),
        }
    }
}

/// Persistence for artifacts.
///
/// `load` fails with [`Error::NotFound`] on a cache miss and with
/// [`Error::CorruptArtifact`] when a stored artifact cannot be decoded.
/// `save` must never leave a previously stored artifact partially overwritten.
pub trait ArtifactStore {
    fn exists(&self, key: &ArtifactKey) -> bool;

    fn load(&self, key: &ArtifactKey) -> Result<Artifact>;

    fn save(&self, key: &ArtifactKey, artifact: &Artifact) -> Result<()>;

    /// Load the image collection stored under `imagedir`
    fn load_images(&self, imagedir: &Path) -> Result<ImageArrays> {
        let key = ArtifactKey::images(imagedir);
        self.load(&key)?
            .into_images()
            .map_err(|other| kind_mismatch(self, &key, other.kind()))
    }

    /// Load the fingerprint collection stored under `imagedir`
    fn load_fingerprints(&self, imagedir: &Path) -> Result<Fingerprints> {
        let key = ArtifactKey::fingerprints(imagedir);
        self.load(&key)?
            .into_fingerprints()
            .map_err(|other| kind_mismatch(self, &key, other.kind()))
    }

    /// Save the image collection of `imagedir` and hand it back
    fn save_images(&self, imagedir: &Path, images: ImageArrays) -> Result<ImageArrays> {
        let key = ArtifactKey::images(imagedir);
        let artifact = Artifact::Images(images);
        self.save(&key, &artifact)?;
        artifact
            .into_images()
            .map_err(|other| kind_mismatch(self, &key, other.kind()))
    }

    /// Save the fingerprints of `imagedir` and hand them back
    fn save_fingerprints(&self, imagedir: &Path, fps: Fingerprints) -> Result<Fingerprints> {
        let key = ArtifactKey::fingerprints(imagedir);
        let artifact = Artifact::Fingerprints(fps);
        self.save(&key, &artifact)?;
        artifact
            .into_fingerprints()
            .map_err(|other| kind_mismatch(self, &key, other.kind()))
    }

    /// Where the artifact lives, for messages
    fn describe(&self, key: &ArtifactKey) -> PathBuf {
        key.imagedir.join(key.kind.stem())
    }
}

fn kind_mismatch<S: ArtifactStore + ?Sized>(
    store: &S,
    key: &ArtifactKey,
    found: ArtifactKind,
) -> Error {
    Error::corrupt(
        store.describe(key),
        format!("expected {} artifact, found {}", key.kind, found),
    )
}
