//! Error types for routine loading and compilation

use std::path::PathBuf;

use crate::backend::Backend;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while acquiring a routine set
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// The external compiler failed or produced no binary
    #[error("building routine {name} failed: {reason}")]
    Build { name: String, reason: String },

    /// A binary exists but could not be opened or lacks mandatory entry points
    #[error("loading routine library {path} failed: {reason}")]
    Load { path: PathBuf, reason: String },

    /// A device backend was requested from a host-only routine set
    #[error("backend {backend} is not available: routine {name} was built without device support")]
    UnsupportedBackend { backend: Backend, name: String },

    /// Filesystem error around the build directory
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoaderError {
    /// Create a build error
    pub fn build(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Build {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a load error
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
