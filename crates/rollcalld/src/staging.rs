//! Decodes captured frames and stages them on disk before upload.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use rollcall_core::ProbeImage;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StagingError {
    /// The payload was not a `data:` URL carrying a base64 body.
    #[error("image payload has no data URL separator")]
    MissingSeparator,
    #[error("image payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to create staging directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write staged file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StagingError {
    /// True when the payload itself was unusable, as opposed to a local
    /// filesystem failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingSeparator | Self::Base64(_))
    }
}

/// Strips the `data:image/png;base64,` header a canvas capture carries
/// and decodes the remainder.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, StagingError> {
    let (_header, payload) = data_url
        .split_once(',')
        .ok_or(StagingError::MissingSeparator)?;
    Ok(general_purpose::STANDARD.decode(payload)?)
}

/// Staging area for captured frames.
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    /// Opens the staging area, creating the directory when missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StagingError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StagingError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Decodes one captured frame and writes a staging copy under a fresh
    /// uuid name. The file name doubles as the probe's object key, so no
    /// two requests ever share a key.
    pub async fn stage(&self, data_url: &str) -> Result<StagedProbe, StagingError> {
        let bytes = decode_data_url(data_url)?;
        let key = format!("{}.png", Uuid::new_v4());
        let path = self.dir.join(&key);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| StagingError::Write {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "frame staged");
        Ok(StagedProbe {
            probe: ProbeImage { key, bytes },
            path,
        })
    }
}

/// A decoded frame staged on disk, ready to travel to the bucket.
pub struct StagedProbe {
    pub probe: ProbeImage,
    pub path: PathBuf,
}

/// Removes a staging copy once its request is done. Failure is logged
/// and ignored.
pub fn discard(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        tracing::debug!(path = %path.display(), error = %err, "failed to remove staged file");
    }
}
