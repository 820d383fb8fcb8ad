use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure encountered while traversing the local tree.
///
/// Apart from [`WalkError::RootMetadata`], these are reported per entry and
/// do not terminate the walk.
#[derive(Debug, Error)]
pub enum WalkError {
    /// The traversal root could not be inspected.
    #[error("failed to inspect traversal root '{}': {source}", path.display())]
    RootMetadata {
        /// Path that failed to provide metadata.
        path: PathBuf,
        /// Underlying operating system error.
        source: io::Error,
    },
    /// A directory's contents could not be read.
    #[error("failed to read directory '{}': {source}", path.display())]
    ReadDir {
        /// Directory whose contents could not be read.
        path: PathBuf,
        /// Underlying operating system error.
        source: io::Error,
    },
    /// Metadata for an entry could not be retrieved.
    #[error("failed to inspect metadata for '{}': {source}", path.display())]
    Metadata {
        /// Path whose metadata could not be retrieved.
        path: PathBuf,
        /// Underlying operating system error.
        source: io::Error,
    },
}

impl WalkError {
    /// Returns the filesystem path tied to the failure.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            WalkError::RootMetadata { path, .. }
            | WalkError::ReadDir { path, .. }
            | WalkError::Metadata { path, .. } => path,
        }
    }
}
