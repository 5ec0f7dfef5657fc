//! Digest of the last notified set, for change-only notifications.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::arbitrage::Opportunity;
use crate::error::NotifyError;

/// SHA-256 over the canonical JSON of the notify set, hex encoded.
///
/// The notify set is already sorted, so equal sets give equal digests.
pub fn fingerprint(opportunities: &[Opportunity]) -> Result<String, NotifyError> {
    let canonical = serde_json::to_vec(opportunities)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// File holding the last sent digest.
#[derive(Debug, Clone)]
pub struct DigestStore {
    path: PathBuf,
}

impl DigestStore {
    /// Create a store at `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last stored digest; `None` when no file exists.
    pub fn load(&self) -> Result<Option<String>, NotifyError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let digest = contents.trim();
                Ok((!digest.is_empty()).then(|| digest.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `digest` matches the stored one.
    pub fn is_unchanged(&self, digest: &str) -> Result<bool, NotifyError> {
        Ok(self.load()?.as_deref() == Some(digest))
    }

    /// Persist a digest.
    pub fn store(&self, digest: &str) -> Result<(), NotifyError> {
        std::fs::write(&self.path, digest)?;
        debug!(path = %self.path.display(), "Stored notify digest");
        Ok(())
    }
}
