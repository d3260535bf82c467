//! Loading compiled routine libraries from the build directory

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;

use crate::error::{LoaderError, Result};
use crate::key::{RoutineKey, RoutineRequest};
use crate::routine::{DeviceRoutines, EntryPoint, RoutinePair, RoutineSet};

/// Host entry points; every binary must export them
pub const HOST_SYMBOLS: (&str, &str) = ("CpuConv", "CpuTransConv");

/// GPU entry points, in `DeviceRoutines` field order
pub const DEVICE_SYMBOLS: [(&str, &str); 4] = [
    ("GpuConv1D", "GpuTransConv1D"),
    ("GpuConv2D", "GpuTransConv2D"),
    ("GpuConv1D_FromDevice", "GpuTransConv1D_FromDevice"),
    ("GpuConv2D_FromDevice", "GpuTransConv2D_FromDevice"),
];

/// Source of already-built routine sets
pub trait RoutineLoader: Send + Sync {
    /// Open the routine set for `request`.
    ///
    /// Returns `Ok(None)` when nothing has been built for this key yet; any
    /// other failure is an error and must not trigger a rebuild.
    fn open(&self, request: &RoutineRequest) -> Result<Option<RoutineSet>>;
}

/// Opens `lib<digest>.so` (or the platform equivalent) from a build directory
#[derive(Debug, Clone)]
pub struct DylibLoader {
    build_dir: PathBuf,
}

impl DylibLoader {
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
        }
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Where the binary for `key` is expected
    pub fn library_path(&self, key: &RoutineKey) -> PathBuf {
        self.build_dir.join(key.library_file_name())
    }
}

impl RoutineLoader for DylibLoader {
    fn open(&self, request: &RoutineRequest) -> Result<Option<RoutineSet>> {
        let path = self.library_path(request.key());
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no compiled routine on disk");
            return Ok(None);
        }

        let library = open_library(&path).map_err(|e| LoaderError::load(&path, e.to_string()))?;
        let library = Arc::new(library);

        let host = bind_pair(&library, HOST_SYMBOLS).map_err(|e| LoaderError::load(&path, e.to_string()))?;

        let device = match bind_device(&library) {
            Ok(device) => Some(device),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "routine built without device entry points");
                None
            }
        };

        tracing::debug!(
            routine = request.key().name(),
            device_support = device.is_some(),
            "loaded routine library"
        );

        Ok(Some(RoutineSet::from_library(
            request.key().name(),
            host,
            device,
            library,
        )))
    }
}

/// Open with global symbol visibility so that routines sharing helper
/// symbols resolve against each other.
fn open_library(path: &Path) -> std::result::Result<Library, libloading::Error> {
    #[cfg(unix)]
    {
        use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};
        // SAFETY: the library is a routine binary produced by the build step;
        // its initializers do not run foreign code beyond static setup.
        unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL).map(Library::from) }
    }
    #[cfg(not(unix))]
    {
        // SAFETY: see above.
        unsafe { Library::new(path) }
    }
}

fn bind(library: &Library, name: &str) -> std::result::Result<EntryPoint, libloading::Error> {
    // SAFETY: every exported routine uses the `EntryPoint` calling convention.
    // The pointer is only used while `library` is kept alive by the RoutineSet.
    unsafe { library.get::<EntryPoint>(name.as_bytes()).map(|symbol| *symbol) }
}

fn bind_pair(library: &Library, (row, column): (&str, &str)) -> std::result::Result<RoutinePair, libloading::Error> {
    Ok(RoutinePair::new(bind(library, row)?, bind(library, column)?))
}

fn bind_device(library: &Library) -> std::result::Result<DeviceRoutines, libloading::Error> {
    let [host_1d, host_2d, device_1d, device_2d] = DEVICE_SYMBOLS;
    Ok(DeviceRoutines {
        host_1d: bind_pair(library, host_1d)?,
        host_2d: bind_pair(library, host_2d)?,
        device_1d: bind_pair(library, device_1d)?,
        device_2d: bind_pair(library, device_2d)?,
    })
}
