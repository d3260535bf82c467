//! Callable routine sets
//!
//! Every compiled binary exports the same calling convention for all of its
//! entry points:
//!
//! ```text
//! void Entry(int nx, int ny, T* out, T** args);
//! ```
//!
//! The element type `T` is `float` or `double` depending on the precision
//! the binary was built for, so entry points are stored type-erased.

use std::os::raw::{c_int, c_void};
use std::sync::Arc;

use libloading::Library;

use crate::backend::Backend;
use crate::error::{LoaderError, Result};

/// Type-erased routine entry point
pub type EntryPoint = unsafe extern "C" fn(nx: c_int, ny: c_int, out: *mut c_void, args: *mut *mut c_void);

/// Which axis survives the reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SumIndex {
    /// Sum over j; the output has one row per i (nx rows)
    Row,
    /// Sum over i; the output has one row per j (ny rows)
    Column,
}

impl SumIndex {
    /// Integer code (0 for rows, 1 for columns)
    pub fn code(self) -> u8 {
        match self {
            Self::Row => 0,
            Self::Column => 1,
        }
    }
}

/// Row- and column-indexed variants of one backend
#[derive(Clone, Copy)]
pub struct RoutinePair {
    /// Result indexed by i (`*Conv`)
    pub row: EntryPoint,
    /// Result indexed by j (`*TransConv`)
    pub column: EntryPoint,
}

impl RoutinePair {
    pub fn new(row: EntryPoint, column: EntryPoint) -> Self {
        Self { row, column }
    }

    pub fn select(&self, sum_index: SumIndex) -> EntryPoint {
        match sum_index {
            SumIndex::Row => self.row,
            SumIndex::Column => self.column,
        }
    }
}

/// The GPU entry points of a routine set
#[derive(Clone, Copy)]
pub struct DeviceRoutines {
    pub host_1d: RoutinePair,
    pub host_2d: RoutinePair,
    pub device_1d: RoutinePair,
    pub device_2d: RoutinePair,
}

/// All entry points of one compiled formula.
///
/// Built once per cache key and never mutated. When the set was loaded from a
/// shared library it keeps that library alive, so the stored function
/// pointers stay valid for as long as the set exists.
pub struct RoutineSet {
    name: String,
    host: RoutinePair,
    device: Option<DeviceRoutines>,
    _library: Option<Arc<Library>>,
}

impl RoutineSet {
    /// Wrap entry points that are linked into the current process
    pub fn from_entry_points(name: impl Into<String>, host: RoutinePair, device: Option<DeviceRoutines>) -> Self {
        Self {
            name: name.into(),
            host,
            device,
            _library: None,
        }
    }

    pub(crate) fn from_library(
        name: impl Into<String>,
        host: RoutinePair,
        device: Option<DeviceRoutines>,
        library: Arc<Library>,
    ) -> Self {
        Self {
            name: name.into(),
            host,
            device,
            _library: Some(library),
        }
    }

    /// Routine name (the key digest for loaded binaries)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the GPU entry points were bound
    pub fn has_device_support(&self) -> bool {
        self.device.is_some()
    }

    /// Check that `backend` can be served by this set
    pub fn ensure_available(&self, backend: Backend) -> Result<()> {
        if backend.uses_device() && self.device.is_none() {
            return Err(LoaderError::UnsupportedBackend {
                backend,
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Entry point for a backend and reduction direction
    pub fn entry(&self, backend: Backend, sum_index: SumIndex) -> Result<EntryPoint> {
        self.ensure_available(backend)?;
        let pair = match (backend, &self.device) {
            (Backend::Cpu, _) => &self.host,
            (Backend::Gpu1DHost, Some(d)) => &d.host_1d,
            (Backend::Gpu2DHost, Some(d)) => &d.host_2d,
            (Backend::Gpu1DDevice, Some(d)) => &d.device_1d,
            (Backend::Gpu2DDevice, Some(d)) => &d.device_2d,
            (backend, None) => {
                return Err(LoaderError::UnsupportedBackend {
                    backend,
                    name: self.name.clone(),
                })
            }
        };
        Ok(pair.select(sum_index))
    }
}

impl std::fmt::Debug for RoutineSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutineSet")
            .field("name", &self.name)
            .field("device_support", &self.device.is_some())
            .field("from_library", &self._library.is_some())
            .finish()
    }
}
