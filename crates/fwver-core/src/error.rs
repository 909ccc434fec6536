//! Error types for the fwver-core library.
//!
//! This module provides error handling using the `thiserror` crate. The
//! taxonomy is deliberately small: reading the image can fail, and the
//! cascade can come up empty. Garbage byte content mid-scan is never an
//! error; decoding is lossy and always succeeds.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fwver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all fwver operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read the firmware image from disk
    #[error("failed to read image '{path}': {source}")]
    FileRead {
        /// Path to the image that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// All strategies exhausted without an accepted candidate.
    ///
    /// This is an ordinary outcome for stripped or malformed images, not a
    /// fault: callers decide whether to prompt for a version, abort a build
    /// step, or move on.
    #[error("no version string found in image")]
    VersionNotFound,
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this is the "no version found" outcome, as opposed
    /// to a failure to read the image at all
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::VersionNotFound)
    }
}
