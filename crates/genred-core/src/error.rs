//! Error types for genred-core operations

use std::fmt;
use std::path::PathBuf;

use genred_loader::{Backend, LoaderError};

use crate::signature::Category;

/// Result type for genred-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which buffer of a call an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPosition {
    Result,
    /// Zero-based position in the argument list (signature order)
    Argument(usize),
}

impl fmt::Display for BufferPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Result => write!(f, "result"),
            Self::Argument(i) => write!(f, "argument {i}"),
        }
    }
}

/// Shape constraints violated by a call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("expected {expected} arguments, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("{position} is {ndim}-dimensional, expected a 2-D array")]
    NotTwoDimensional { position: BufferPosition, ndim: usize },

    #[error("argument {position} ({category}) has {actual} rows but earlier {category} arguments have {expected}")]
    RowCountMismatch {
        position: usize,
        category: Category,
        expected: usize,
        actual: usize,
    },

    #[error("{position} has dimension {actual}, declared dimension is {expected}")]
    DimensionMismatch {
        position: BufferPosition,
        expected: usize,
        actual: usize,
    },

    #[error("parameter argument {position} has shape {shape:?}, expected ({dim},) or (1, {dim})")]
    ParameterShape {
        position: usize,
        shape: Vec<usize>,
        dim: usize,
    },

    #[error("reductions cannot produce a parameter-indexed result")]
    ParameterOutput,

    #[error("result is declared {category} but sum_index makes the output {sum_index}")]
    SumIndexMismatch { category: Category, sum_index: Category },

    #[error("result has {actual} rows, expected {expected} ({category})")]
    ResultRowMismatch {
        category: Category,
        expected: usize,
        actual: usize,
    },

    #[error("{axis} = {value} does not fit in a C int")]
    ExtentOverflow { axis: &'static str, value: usize },
}

/// Errors that can occur in genred-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed variable declaration
    #[error("invalid declaration {declaration:?}: {reason}")]
    Validation { declaration: String, reason: String },

    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    /// A point cloud has no rows (or no argument defines it)
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// Bad backend hint, mixed memory spaces or mixed precisions
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("backend {backend} is not available for routine {routine}")]
    UnsupportedBackend { backend: Backend, routine: String },

    #[error("{position} is not contiguous; pass a standard-layout copy")]
    Contiguity { position: BufferPosition },

    #[error("building routine {name} failed: {reason}")]
    Build { name: String, reason: String },

    #[error("loading routine library {path} failed: {reason}")]
    Load { path: PathBuf, reason: String },

    /// The GPU driver rejected an allocation or a copy
    #[error("{operation} failed on the device: {reason}")]
    Device { operation: String, reason: String },
}

impl Error {
    pub(crate) fn validation(declaration: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            declaration: declaration.into(),
            reason: reason.into(),
        }
    }

    #[cfg_attr(not(feature = "cuda"), allow(dead_code))]
    pub(crate) fn device(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Device {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

impl From<LoaderError> for Error {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::Build { name, reason } => Self::Build { name, reason },
            LoaderError::Load { path, reason } => Self::Load { path, reason },
            LoaderError::UnsupportedBackend { backend, name } => Self::UnsupportedBackend { backend, routine: name },
            LoaderError::Io { path, source } => Self::Build {
                name: path.display().to_string(),
                reason: source.to_string(),
            },
        }
    }
}
