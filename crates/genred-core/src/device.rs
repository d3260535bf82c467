//! Device-resident buffers (`cuda` feature)

use std::os::raw::c_void;
use std::sync::Arc;

use cudarc::driver::{CudaDevice, CudaSlice, DevicePtr, DevicePtrMut, DeviceRepr, DriverError, ValidAsZeroBits};
use genred_loader::{MemorySpace, Precision};
use ndarray::Array2;

use crate::buffer::{Operand, ReductionArray, ReductionArrayMut};
use crate::element::Element;
use crate::error::{Error, Result};

/// Row-major 2-D array in GPU memory
pub struct DeviceArray<T> {
    device: Arc<CudaDevice>,
    data: CudaSlice<T>,
    shape: [usize; 2],
}

fn driver_error(operation: &str, err: DriverError) -> Error {
    Error::device(operation, format!("{err:?}"))
}

impl<T> DeviceArray<T>
where
    T: Element + DeviceRepr + ValidAsZeroBits + Unpin,
{
    /// Open GPU `ordinal`
    pub fn device(ordinal: usize) -> Result<Arc<CudaDevice>> {
        CudaDevice::new(ordinal).map_err(|e| driver_error("device open", e))
    }

    pub fn zeros(device: &Arc<CudaDevice>, shape: (usize, usize)) -> Result<Self> {
        let data = device
            .alloc_zeros::<T>(shape.0 * shape.1)
            .map_err(|e| driver_error("allocation", e))?;
        Ok(Self {
            device: Arc::clone(device),
            data,
            shape: [shape.0, shape.1],
        })
    }

    /// Upload a host array
    pub fn from_host(device: &Arc<CudaDevice>, host: &Array2<T>) -> Result<Self> {
        let contiguous = host.as_standard_layout();
        let slice = contiguous
            .as_slice()
            .ok_or_else(|| Error::Configuration("host array has no contiguous storage".to_string()))?;
        let data = device
            .htod_sync_copy(slice)
            .map_err(|e| driver_error("host to device copy", e))?;
        Ok(Self {
            device: Arc::clone(device),
            data,
            shape: [host.nrows(), host.ncols()],
        })
    }

    /// Download into a host array
    pub fn to_host(&self) -> Result<Array2<T>> {
        let values = self
            .device
            .dtoh_sync_copy(&self.data)
            .map_err(|e| driver_error("device to host copy", e))?;
        Array2::from_shape_vec((self.shape[0], self.shape[1]), values)
            .map_err(|e| Error::device("device to host copy", format!("unexpected buffer length: {e}")))
    }
}

impl<T: Element> ReductionArray for DeviceArray<T> {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn is_contiguous(&self) -> bool {
        true
    }

    fn memory_space(&self) -> MemorySpace {
        MemorySpace::Device
    }

    fn precision(&self) -> Precision {
        T::PRECISION
    }

    fn as_raw_ptr(&self) -> *const c_void {
        *self.data.device_ptr() as *const c_void
    }
}

impl<T: Element> ReductionArrayMut for DeviceArray<T> {
    fn as_raw_mut_ptr(&mut self) -> *mut c_void {
        *self.data.device_ptr_mut() as *mut c_void
    }
}

impl<T> Operand for DeviceArray<T>
where
    T: Element + DeviceRepr + ValidAsZeroBits + Unpin,
{
    fn zeros_like(&self, shape: (usize, usize)) -> Result<Self> {
        Self::zeros(&self.device, shape)
    }

    /// Round-trips through host memory; the result is `(1, cols)` so the
    /// transfer back is small.
    fn contract_rows(&self) -> Result<Self> {
        let host = self.to_host()?;
        Self::from_host(&self.device, &host.contract_rows()?)
    }
}
