//! Error taxonomy shared by every Dock Hider component.
//!
//! Every variant is recoverable: callers log or report it and carry on.
//! Reads never produce these errors (they degrade to "visible"); writes,
//! terminations and relaunches do.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DockError {
    /// The bundle's Info.plist is missing, unreadable or not a dictionary
    #[error("cannot read metadata at {path}: {reason}")]
    MetadataUnreadable { path: PathBuf, reason: String },

    /// Serializing or replacing the Info.plist failed; the original is intact
    #[error("cannot write metadata at {path}")]
    MetadataWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bundle to relaunch no longer exists on disk
    #[error("application not found: {0}")]
    ProcessNotFound(PathBuf),

    #[error("failed to relaunch {path}")]
    RelaunchFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to terminate {name} (pid {pid})")]
    TerminationFailed { name: String, pid: u32 },

    #[error("{name} did not exit within {timeout:?}")]
    TerminationTimeout { name: String, timeout: Duration },

    #[error("cannot read Dock preferences at {path}: {reason}")]
    PinListUnreadable { path: PathBuf, reason: String },

    #[error("scripting bridge failed: {0}")]
    ScriptingFailed(String),
}

impl DockError {
    /// Build a `MetadataWriteFailed` from a non-io failure (plist serializer)
    pub(crate) fn write_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DockError::MetadataWriteFailed {
            path: path.into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, reason.to_string()),
        }
    }
}
