//! Buffer capability interface
//!
//! Everything the resolver and invoker need to know about a buffer is
//! queried once through [`ReductionArray`]. Host arrays get it from a single
//! blanket impl over `ndarray::ArrayBase`, so owned arrays, views and shared
//! arrays all work; device arrays implement it in [`crate::device`].

use std::os::raw::c_void;

use genred_loader::{MemorySpace, Precision};
use ndarray::{Array2, ArrayBase, Data, DataMut, Dimension};

use crate::element::Element;
use crate::error::Result;

/// Read access to a buffer taking part in a reduction
pub trait ReductionArray {
    fn shape(&self) -> &[usize];

    /// Dense row-major storage with no gaps between rows
    fn is_contiguous(&self) -> bool;

    fn memory_space(&self) -> MemorySpace;

    fn precision(&self) -> Precision;

    /// Address of the first element, in the buffer's own memory space
    fn as_raw_ptr(&self) -> *const c_void;

    fn ndim(&self) -> usize {
        self.shape().len()
    }

    fn row_count(&self) -> usize {
        self.shape().first().copied().unwrap_or(1)
    }

    fn column_count(&self) -> usize {
        self.shape().get(1).copied().unwrap_or(1)
    }

    fn element_count(&self) -> usize {
        self.shape().iter().product()
    }
}

/// Buffers a routine can write its output into
pub trait ReductionArrayMut: ReductionArray {
    fn as_raw_mut_ptr(&mut self) -> *mut c_void;
}

/// Owned 2-D buffers the high-level API allocates and differentiates.
pub trait Operand: ReductionArrayMut + Sized + Send + Sync + 'static {
    /// Zero-filled `(rows, cols)` buffer in the same memory space (and on
    /// the same device) as `self`
    fn zeros_like(&self, shape: (usize, usize)) -> Result<Self>;

    /// Sum over rows as a `(1, n) x (n, cols)` product with a ones vector,
    /// giving a `(1, cols)` buffer.
    fn contract_rows(&self) -> Result<Self>;
}

impl<A, S, D> ReductionArray for ArrayBase<S, D>
where
    A: Element,
    S: Data<Elem = A>,
    D: Dimension,
{
    fn shape(&self) -> &[usize] {
        ArrayBase::shape(self)
    }

    fn is_contiguous(&self) -> bool {
        self.is_standard_layout()
    }

    fn memory_space(&self) -> MemorySpace {
        MemorySpace::Host
    }

    fn precision(&self) -> Precision {
        A::PRECISION
    }

    fn as_raw_ptr(&self) -> *const c_void {
        self.as_ptr().cast()
    }
}

impl<A, S, D> ReductionArrayMut for ArrayBase<S, D>
where
    A: Element,
    S: DataMut<Elem = A>,
    D: Dimension,
{
    fn as_raw_mut_ptr(&mut self) -> *mut c_void {
        self.as_mut_ptr().cast()
    }
}

impl<A: Element> Operand for Array2<A> {
    fn zeros_like(&self, shape: (usize, usize)) -> Result<Self> {
        Ok(Array2::zeros(shape))
    }

    fn contract_rows(&self) -> Result<Self> {
        Ok(Array2::<A>::ones((1, self.nrows())).dot(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s, Array1};

    #[test]
    fn host_arrays_report_their_layout() {
        let a = Array2::<f32>::zeros((4, 3));
        assert_eq!(ReductionArray::shape(&a), &[4, 3]);
        assert_eq!(a.row_count(), 4);
        assert_eq!(a.column_count(), 3);
        assert_eq!(a.element_count(), 12);
        assert_eq!(a.memory_space(), MemorySpace::Host);
        assert_eq!(a.precision(), Precision::Float);
        assert!(ReductionArray::is_contiguous(&a));
    }

    #[test]
    fn transposed_and_strided_views_are_not_contiguous() {
        let a = Array2::<f64>::zeros((4, 3));
        assert!(!ReductionArray::is_contiguous(&a.t()));
        assert!(!ReductionArray::is_contiguous(&a.slice(s![.., ..2])));
        assert!(ReductionArray::is_contiguous(&a.slice(s![1..3, ..])));
    }

    #[test]
    fn one_dimensional_arrays() {
        let p = Array1::<f64>::zeros(5);
        assert_eq!(p.ndim(), 1);
        assert_eq!(p.row_count(), 5);
        assert_eq!(p.column_count(), 1);
        assert_eq!(p.precision(), Precision::Double);
    }

    #[test]
    fn contract_rows_sums_columns() {
        let a = array![[1.0f64, 2.0], [3.0, 4.0], [5.0, 6.0]];
        assert_eq!(a.contract_rows().unwrap(), array![[9.0, 12.0]]);
    }

    #[test]
    fn zeros_like_allocates_requested_shape() {
        let a = Array2::<f32>::ones((2, 2));
        let z = a.zeros_like((7, 3)).unwrap();
        assert_eq!(z.dim(), (7, 3));
        assert!(z.iter().all(|&v| v == 0.0));
    }
}
