//! Calling a routine on validated buffers

use std::os::raw::{c_int, c_void};

use genred_loader::{Backend, EntryPoint, RoutineSet, SumIndex};
use genred_tracing::performance::record_reduction;
use genred_tracing::perf_span;

use crate::buffer::{ReductionArray, ReductionArrayMut};
use crate::error::{BufferPosition, Error, Result, ShapeError};

/// Per-call state handed to the routine
struct ExecutionContext {
    nx: c_int,
    ny: c_int,
    out: *mut c_void,
    args: Vec<*mut c_void>,
}

impl ExecutionContext {
    /// # Safety
    ///
    /// `entry` must follow the routine calling convention, and every pointer
    /// must address a live buffer of the size the routine expects for
    /// `nx`/`ny`.
    unsafe fn run(mut self, entry: EntryPoint) {
        entry(self.nx, self.ny, self.out, self.args.as_mut_ptr());
    }
}

fn to_c_int(axis: &'static str, value: usize) -> Result<c_int> {
    c_int::try_from(value).map_err(|_| ShapeError::ExtentOverflow { axis, value }.into())
}

/// Run the routine for `backend`/`sum_index`, writing into `result`.
///
/// Shapes must already have been checked with [`crate::resolve::resolve`];
/// this only enforces what the calling convention itself needs.
pub fn invoke(
    routines: &RoutineSet,
    backend: Backend,
    sum_index: SumIndex,
    nx: usize,
    ny: usize,
    result: &mut dyn ReductionArrayMut,
    args: &[&dyn ReductionArray],
) -> Result<()> {
    if !result.is_contiguous() {
        return Err(Error::Contiguity {
            position: BufferPosition::Result,
        });
    }
    if let Some(position) = args.iter().position(|a| !a.is_contiguous()) {
        return Err(Error::Contiguity {
            position: BufferPosition::Argument(position),
        });
    }

    let entry = routines.entry(backend, sum_index)?;

    let context = ExecutionContext {
        nx: to_c_int("nx", nx)?,
        ny: to_c_int("ny", ny)?,
        out: result.as_raw_mut_ptr(),
        // Routines take `T**` but never write through argument pointers
        args: args.iter().map(|a| a.as_raw_ptr().cast_mut()).collect(),
    };

    let span = perf_span!("invoke", backend = backend.as_str(), routine = routines.name(), nx = nx, ny = ny);
    let _entered = span.enter();
    // SAFETY: the resolver checked every buffer against the signature the
    // routine was compiled for, and all buffers are contiguous and borrowed
    // for the duration of the call.
    unsafe { context.run(entry) };
    record_reduction(backend.as_str(), nx, ny, span.elapsed_us());

    Ok(())
}
