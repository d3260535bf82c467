//! Routine loading for genred
//!
//! A *routine* is a compiled pairwise reduction: one shared library per
//! (aliases, formula, precision) triple, exporting a host entry point pair
//! and optionally the GPU entry points. This crate owns everything between a
//! formula string and a callable function pointer:
//!
//! - [`RoutineRequest`] / [`RoutineKey`]: content-addressed naming
//! - [`RoutineCompiler`]: invoking the external compiler ([`CmakeCompiler`])
//! - [`RoutineLoader`]: opening built binaries ([`DylibLoader`])
//! - [`RoutineCache`]: memoization with at-most-once compilation per key
//!
//! Shape validation and argument marshalling live in `genred-core`.

pub mod backend;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod error;
pub mod key;
pub mod library;
pub mod precision;
pub mod routine;

pub use backend::{Backend, MemorySpace, Tiling, UnknownBackend};
pub use cache::{global_cache, CacheStats, RoutineCache};
pub use compiler::{BuildManifest, CmakeCompiler, RoutineCompiler};
pub use config::LoaderConfig;
pub use error::{LoaderError, Result};
pub use key::{RoutineKey, RoutineRequest};
pub use library::{DylibLoader, RoutineLoader, DEVICE_SYMBOLS, HOST_SYMBOLS};
pub use precision::Precision;
pub use routine::{DeviceRoutines, EntryPoint, RoutinePair, RoutineSet, SumIndex};
