use std::io;
use std::path::PathBuf;

use thiserror::Error;

use adb::{AdbError, ScanError};
use walk::WalkError;

/// Fatal failure that aborts a pull run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid options (relative remote root, zero concurrency, ...).
    #[error("configuration error: {0}")]
    Config(String),
    /// Remote enumeration failed or is unsupported on the device.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// adb could not be driven at all.
    #[error(transparent)]
    Transport(#[from] AdbError),
    /// The local target tree could not be scanned.
    #[error(transparent)]
    Walk(#[from] WalkError),
    /// The local target tree could not be prepared or written.
    #[error("filesystem error at '{}': {source}", path.display())]
    Filesystem {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The run was cancelled; in-flight work was cleaned up.
    #[error("cancelled")]
    Cancelled,
}

impl EngineError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Per-file failure, recovered by retries and recorded when they exhaust.
///
/// The run continues past these; they surface in the summary and turn the
/// final exit status non-zero.
#[derive(Debug, Error)]
pub enum ActionError {
    /// `adb pull` failed after retries.
    #[error("pull failed: {0}")]
    Pull(#[source] AdbError),
    /// Hard link creation failed for a reason other than lack of support.
    #[error("hard link failed: {source}")]
    Link {
        /// Underlying I/O error.
        source: io::Error,
    },
    /// Byte-copy from the reference snapshot failed.
    #[error("copy failed: {source}")]
    Copy {
        /// Underlying I/O error.
        source: io::Error,
    },
    /// A finished staging file could not be renamed into place.
    #[error("failed to move staging file into place: {source}")]
    Rename {
        /// Underlying I/O error.
        source: io::Error,
    },
    /// A stale entry could not be removed.
    #[error("delete failed: {source}")]
    Delete {
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The destination timestamp could not be applied.
    #[error("set mtime failed: {source}")]
    Mtime {
        /// Underlying I/O error.
        source: io::Error,
    },
    /// A directory could not be created.
    #[error("create dir failed: {source}")]
    CreateDir {
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// One entry of the run-level failure list.
#[derive(Debug)]
pub struct ActionFailure {
    /// Root-relative path of the affected entry.
    pub path: PathBuf,
    /// What went wrong after the final retry.
    pub error: ActionError,
}
