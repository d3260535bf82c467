//! Generic pairwise reductions
//!
//! A reduction is described by a formula over named variables and a list of
//! declarations. For every point `i` of a first cloud (or `j` of a second
//! one) it sums the formula over all points of the other cloud, without
//! ever materializing the pairwise matrix.
//!
//! ```text
//! declarations ──parse_types──▶ aliases, Signature, SumIndex
//!                                        │
//! buffers ──────────resolve────────────▶ (nx, ny, Backend)
//!                                        │
//! formula ─────RoutineCache::acquire───▶ RoutineSet ──invoke──▶ output
//! ```
//!
//! Gradients are reductions too: [`ReductionNode::backward`] wraps the
//! formula in `Grad(..)` and runs it through the same pipeline.
//!
//! Host buffers are `ndarray` arrays; with the `cuda` feature,
//! [`device::DeviceArray`] holds device-resident data.

pub mod autodiff;
pub mod buffer;
#[cfg(feature = "cuda")]
pub mod device;
pub mod element;
pub mod error;
pub mod formula;
pub mod genred;
pub mod invoke;
pub mod resolve;
pub mod signature;

pub use autodiff::{Gradients, ReductionNode};
pub use buffer::{Operand, ReductionArray, ReductionArrayMut};
#[cfg(feature = "cuda")]
pub use device::DeviceArray;
pub use element::Element;
pub use error::{BufferPosition, Error, Result, ShapeError};
pub use formula::{Formula, VarRef};
pub use genred::{reduce_into, GenericSum, Reduction};
pub use invoke::invoke;
pub use resolve::{infer_extents, resolve, BackendHint, Resolution};
pub use signature::{parse_types, Category, ParsedTypes, Signature, VarSpec};

pub use genred_loader::{
    global_cache, Backend, CacheStats, LoaderConfig, MemorySpace, Precision, RoutineCache, SumIndex,
};
