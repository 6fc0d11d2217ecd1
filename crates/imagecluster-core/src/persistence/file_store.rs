use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use super::{Artifact, ArtifactKey, ArtifactKind, ArtifactStore};
use crate::error::{Error, Result};
use crate::logging::log_fs_modification;

/// Artifact file header: magic, format version, kind tag, blake3 digest of the payload.
/// The payload is a list of (raw path bytes, value) pairs.
const MAGIC: [u8; 4] = *b"ICAR";
const FORMAT_VERSION: u8 = 2;
const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + 2 + DIGEST_LEN;

const EXTENSION: &str = "bin";

/// Stores artifacts as files under `<imagedir>/<namespace>/`
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    namespace: String,
}

impl FileArtifactStore {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Path of the artifact file for `key`
    pub fn path(&self, key: &ArtifactKey) -> PathBuf {
        key.imagedir
            .join(&self.namespace)
            .join(format!("{}.{}", key.kind.stem(), EXTENSION))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn exists(&self, key: &ArtifactKey) -> bool {
        self.path(key).is_file()
    }

    fn load(&self, key: &ArtifactKey) -> Result<Artifact> {
        let path = self.path(key);

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotFound(path)),
            Err(e) => return Err(e.into()),
        };

        let payload = check_header(&path, &data, key.kind)?;
        debug!(
            "Loading {} artifact from {} ({} bytes)",
            key.kind,
            path.display(),
            data.len()
        );

        let artifact = match key.kind {
            ArtifactKind::Images => Artifact::Images(decode_keyed(&path, payload)?),
            ArtifactKind::Fingerprints => Artifact::Fingerprints(decode_keyed(&path, payload)?),
        };

        Ok(artifact)
    }

    fn save(&self, key: &ArtifactKey, artifact: &Artifact) -> Result<()> {
        if artifact.kind() != key.kind {
            return Err(Error::Configuration(format!(
                "Cannot store {} artifact under a {} key",
                artifact.kind(),
                key.kind
            )));
        }

        let path = self.path(key);
        let payload = match artifact {
            Artifact::Images(images) => encode_keyed(images)?,
            Artifact::Fingerprints(fps) => encode_keyed(fps)?,
        };

        let mut data = Vec::with_capacity(HEADER_LEN + payload.len());
        data.extend_from_slice(&MAGIC);
        data.push(FORMAT_VERSION);
        data.push(key.kind.tag());
        data.extend_from_slice(blake3::hash(&payload).as_bytes());
        data.extend_from_slice(&payload);

        let parent = path
            .parent()
            .ok_or_else(|| Error::Configuration(format!("{} has no parent", path.display())))?;
        fs::create_dir_all(parent)?;

        // Write a uniquely named sibling, then swap it in. Dropping it on
        // error removes it.
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(&data)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        info!("Wrote {} artifact {}", key.kind, path.display());
        log_fs_modification(
            "save-artifact",
            &path,
            Some(&format!("{} bytes", data.len())),
        );
        Ok(())
    }

    fn describe(&self, key: &ArtifactKey) -> PathBuf {
        self.path(key)
    }
}

/// Validate the header and return the payload slice
fn check_header<'a>(path: &Path, data: &'a [u8], expected: ArtifactKind) -> Result<&'a [u8]> {
    if data.len() < HEADER_LEN {
        return Err(Error::corrupt(path, "file shorter than header"));
    }
    if data[..4] != MAGIC {
        return Err(Error::corrupt(path, "bad magic bytes"));
    }
    if data[4] != FORMAT_VERSION {
        return Err(Error::corrupt(
            path,
            format!("unsupported format version {}", data[4]),
        ));
    }

    let kind = ArtifactKind::from_tag(data[5])
        .ok_or_else(|| Error::corrupt(path, format!("unknown artifact tag {}", data[5])))?;
    if kind != expected {
        return Err(Error::corrupt(
            path,
            format!("expected {} artifact, found {}", expected, kind),
        ));
    }

    let (digest, payload) = data[6..].split_at(DIGEST_LEN);
    if blake3::hash(payload).as_bytes() != digest {
        return Err(Error::corrupt(path, "checksum mismatch"));
    }

    Ok(payload)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a path-keyed map with the paths as raw bytes, so names that are
/// not valid UTF-8 survive
fn encode_keyed<V: Serialize>(map: &BTreeMap<PathBuf, V>) -> Result<Vec<u8>> {
    let entries = map
        .iter()
        .map(|(id, value)| -> Result<_> { Ok((path_to_bytes(id)?, value)) })
        .collect::<Result<Vec<_>>>()?;
    encode(&entries)
}

fn decode_keyed<V: DeserializeOwned>(path: &Path, payload: &[u8]) -> Result<BTreeMap<PathBuf, V>> {
    let entries: Vec<(Vec<u8>, V)> = decode(path, payload)?;
    entries
        .into_iter()
        .map(|(id, value)| -> Result<_> { Ok((path_from_bytes(path, id)?, value)) })
        .collect()
}

#[cfg(unix)]
fn path_to_bytes(id: &Path) -> Result<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    Ok(id.as_os_str().as_bytes().to_vec())
}

#[cfg(unix)]
fn path_from_bytes(_artifact: &Path, bytes: Vec<u8>) -> Result<PathBuf> {
    use std::os::unix::ffi::OsStringExt;
    Ok(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn path_to_bytes(id: &Path) -> Result<Vec<u8>> {
    id.to_str()
        .map(|s| s.as_bytes().to_vec())
        .ok_or_else(|| Error::Serialization(format!("path is not valid Unicode: {}", id.display())))
}

#[cfg(not(unix))]
fn path_from_bytes(artifact: &Path, bytes: Vec<u8>) -> Result<PathBuf> {
    String::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|e| Error::corrupt(artifact, e))
}

fn decode<T: DeserializeOwned>(path: &Path, payload: &[u8]) -> Result<T> {
    let (value, read) = bincode::serde::decode_from_slice(payload, bincode::config::standard())
        .map_err(|e| Error::corrupt(path, e))?;
    if read != payload.len() {
        return Err(Error::corrupt(
            path,
            format!("{} trailing bytes", payload.len() - read),
        ));
    }
    Ok(value)
}
