//! Concrete execution backends and memory spaces

use std::fmt;
use std::str::FromStr;

/// Where a buffer lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemorySpace {
    /// Host RAM
    Host,
    /// GPU device memory
    Device,
}

impl MemorySpace {
    /// Suffix used in backend names (`host` / `device`)
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Device => "device",
        }
    }
}

impl fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// GPU tiling scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tiling {
    OneD,
    TwoD,
}

/// A fully resolved execution backend.
///
/// Combines the compute device, the tiling scheme and the residency of the
/// data handed to the routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Host loops over host buffers
    Cpu,
    /// GPU, 1D scheme, buffers on the host
    Gpu1DHost,
    /// GPU, 2D scheme, buffers on the host
    Gpu2DHost,
    /// GPU, 1D scheme, buffers already on the device
    Gpu1DDevice,
    /// GPU, 2D scheme, buffers already on the device
    Gpu2DDevice,
}

impl Backend {
    pub const ALL: [Backend; 5] = [
        Backend::Cpu,
        Backend::Gpu1DHost,
        Backend::Gpu2DHost,
        Backend::Gpu1DDevice,
        Backend::Gpu2DDevice,
    ];

    /// Canonical name, as accepted by [`FromStr`]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Gpu1DHost => "GPU_1D_host",
            Self::Gpu2DHost => "GPU_2D_host",
            Self::Gpu1DDevice => "GPU_1D_device",
            Self::Gpu2DDevice => "GPU_2D_device",
        }
    }

    /// Build a GPU backend from a tiling scheme and a residency
    pub fn gpu(tiling: Tiling, space: MemorySpace) -> Self {
        match (tiling, space) {
            (Tiling::OneD, MemorySpace::Host) => Self::Gpu1DHost,
            (Tiling::TwoD, MemorySpace::Host) => Self::Gpu2DHost,
            (Tiling::OneD, MemorySpace::Device) => Self::Gpu1DDevice,
            (Tiling::TwoD, MemorySpace::Device) => Self::Gpu2DDevice,
        }
    }

    /// Whether the routine runs on a GPU (needs the device entry points)
    pub fn uses_device(self) -> bool {
        !matches!(self, Self::Cpu)
    }

    /// Memory space the routine expects its buffers in
    pub fn residency(self) -> MemorySpace {
        match self {
            Self::Gpu1DDevice | Self::Gpu2DDevice => MemorySpace::Device,
            _ => MemorySpace::Host,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no concrete backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backend {0:?}")]
pub struct UnknownBackend(pub String);

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|backend| backend.as_str() == s)
            .ok_or_else(|| UnknownBackend(s.to_string()))
    }
}
