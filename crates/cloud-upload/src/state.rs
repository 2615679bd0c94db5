//! Sidecar file holding upload resumption state.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::UploadError;
use crate::types::UploadState;

/// `<file>.state.json` next to the file being uploaded.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// Sidecar for `file`.
    pub fn for_file(file: &Path) -> Self {
        let mut name = OsString::from(file.as_os_str());
        name.push(".state.json");
        Self {
            path: PathBuf::from(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted state.
    ///
    /// A missing file yields `None`; an unreadable one is logged and also
    /// yields `None`.
    pub async fn load(&self) -> Option<UploadState> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read state file, starting fresh");
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "invalid state file, starting fresh");
                None
            }
        }
    }

    /// Persists `state`, replacing any previous file atomically.
    pub async fn save(&self, state: &UploadState) -> Result<(), UploadError> {
        let json = serde_json::to_vec_pretty(state)?;
        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), offset = state.offset, "state saved");
        Ok(())
    }

    /// Deletes the sidecar; absence is not an error.
    pub async fn clear(&self) -> Result<(), UploadError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "state cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
