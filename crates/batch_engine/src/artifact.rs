use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use batch_core::{MediaKind, SourceRef};
use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::ArtifactError;

/// A raw input file ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub source: SourceRef,
    pub bytes: Bytes,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, media_kind: MediaKind, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let source = SourceRef {
            file_name: file_name.into(),
            media_kind,
            byte_len: bytes.len() as u64,
            fingerprint: fingerprint(&bytes),
        };
        Self { source, bytes }
    }

    /// Read a file from disk, accepting only non-empty PDF, JPEG and PNG files.
    pub fn read(path: &Path) -> Result<Self, ArtifactError> {
        let display = path.display().to_string();
        let media_kind =
            MediaKind::from_path(path).ok_or_else(|| ArtifactError::UnsupportedMedia(display.clone()))?;
        let bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Err(ArtifactError::Empty(display));
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or(display);
        Ok(Self::new(file_name, media_kind, bytes))
    }
}

/// Hex SHA-256 of the artifact bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
