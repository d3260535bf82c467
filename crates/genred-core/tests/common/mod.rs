//! Shared fixtures: in-process routines standing in for compiled binaries.
//!
//! Every formula the tests use has a hand-written `extern "C"` kernel with
//! the routine calling convention. The fake compiler "builds" a formula by
//! marking its key as present; the fake loader then serves those kernels,
//! optionally also as the device entry point family.

#![allow(dead_code)]

use std::collections::HashSet;
use std::os::raw::{c_int, c_void};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use genred_core::{
    MemorySpace, Operand, Precision, ReductionArray, ReductionArrayMut, Result as CoreResult, RoutineCache,
};
use genred_loader::{
    DeviceRoutines, LoaderError, Result, RoutineCompiler, RoutineLoader, RoutinePair, RoutineRequest, RoutineSet,
};
use ndarray::Array2;
use parking_lot::Mutex;

pub const SCENARIO: [&str; 4] = ["out = Vx(2)", "x = Vx(3)", "y = Vy(3)", "b = Vy(2)"];
pub const SCENARIO_FORMULA: &str = "SqDist(x,y)*b";

pub const PARAMETER: [&str; 5] = ["out = Vx(2)", "x = Vx(3)", "y = Vy(3)", "b = Vy(2)", "p = Pm(1)"];
pub const PARAMETER_FORMULA: &str = "p*SqDist(x,y)*b";

// ---------------------------------------------------------------------------
// Kernels
// ---------------------------------------------------------------------------

unsafe fn arg<'a>(args: *mut *mut c_void, k: usize, len: usize) -> &'a [f64] {
    std::slice::from_raw_parts(*args.add(k) as *const f64, len)
}

unsafe fn output<'a>(out: *mut c_void, len: usize) -> &'a mut [f64] {
    std::slice::from_raw_parts_mut(out as *mut f64, len)
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(u, v)| (u - v) * (u - v)).sum()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(u, v)| u * v).sum()
}

fn extents(nx: c_int, ny: c_int) -> (usize, usize) {
    (nx as usize, ny as usize)
}

/// Stand-in for a direction a formula is never reduced along
unsafe extern "C" fn unsupported(_: c_int, _: c_int, out: *mut c_void, _: *mut *mut c_void) {
    *(out as *mut f64) = f64::NAN;
}

/// out_i = sum_j |x_i - y_j|^2 b_j
unsafe extern "C" fn weighted_sum_rows(nx: c_int, ny: c_int, out: *mut c_void, args: *mut *mut c_void) {
    let (nx, ny) = extents(nx, ny);
    let (x, y, b) = (arg(args, 0, nx * 3), arg(args, 1, ny * 3), arg(args, 2, ny * 2));
    let out = output(out, nx * 2);
    for i in 0..nx {
        let (mut o0, mut o1) = (0.0, 0.0);
        for j in 0..ny {
            let d = sq_dist(&x[3 * i..3 * i + 3], &y[3 * j..3 * j + 3]);
            o0 += d * b[2 * j];
            o1 += d * b[2 * j + 1];
        }
        out[2 * i] = o0;
        out[2 * i + 1] = o1;
    }
}

/// out_j = sum_i |x_i - y_j|^2 b_j
unsafe extern "C" fn weighted_sum_columns(nx: c_int, ny: c_int, out: *mut c_void, args: *mut *mut c_void) {
    let (nx, ny) = extents(nx, ny);
    let (x, y, b) = (arg(args, 0, nx * 3), arg(args, 1, ny * 3), arg(args, 2, ny * 2));
    let out = output(out, ny * 2);
    for j in 0..ny {
        let total: f64 = (0..nx).map(|i| sq_dist(&x[3 * i..3 * i + 3], &y[3 * j..3 * j + 3])).sum();
        out[2 * j] = total * b[2 * j];
        out[2 * j + 1] = total * b[2 * j + 1];
    }
}

/// Gradient in x: out_i = sum_j 2 (x_i - y_j) <b_j, g_i>
unsafe extern "C" fn grad_x_rows(nx: c_int, ny: c_int, out: *mut c_void, args: *mut *mut c_void) {
    let (nx, ny) = extents(nx, ny);
    let (x, y, b, g) = (
        arg(args, 0, nx * 3),
        arg(args, 1, ny * 3),
        arg(args, 2, ny * 2),
        arg(args, 3, nx * 2),
    );
    let out = output(out, nx * 3);
    for i in 0..nx {
        for k in 0..3 {
            out[3 * i + k] = (0..ny)
                .map(|j| 2.0 * (x[3 * i + k] - y[3 * j + k]) * dot(&b[2 * j..2 * j + 2], &g[2 * i..2 * i + 2]))
                .sum();
        }
    }
}

/// Gradient in y: out_j = sum_i -2 (x_i - y_j) <b_j, g_i>
unsafe extern "C" fn grad_y_columns(nx: c_int, ny: c_int, out: *mut c_void, args: *mut *mut c_void) {
    let (nx, ny) = extents(nx, ny);
    let (x, y, b, g) = (
        arg(args, 0, nx * 3),
        arg(args, 1, ny * 3),
        arg(args, 2, ny * 2),
        arg(args, 3, nx * 2),
    );
    let out = output(out, ny * 3);
    for j in 0..ny {
        for k in 0..3 {
            out[3 * j + k] = (0..nx)
                .map(|i| -2.0 * (x[3 * i + k] - y[3 * j + k]) * dot(&b[2 * j..2 * j + 2], &g[2 * i..2 * i + 2]))
                .sum();
        }
    }
}

/// Gradient in b: out_j = sum_i |x_i - y_j|^2 g_i
unsafe extern "C" fn grad_b_columns(nx: c_int, ny: c_int, out: *mut c_void, args: *mut *mut c_void) {
    let (nx, ny) = extents(nx, ny);
    let (x, y, g) = (arg(args, 0, nx * 3), arg(args, 1, ny * 3), arg(args, 3, nx * 2));
    let out = output(out, ny * 2);
    for j in 0..ny {
        let (mut o0, mut o1) = (0.0, 0.0);
        for i in 0..nx {
            let d = sq_dist(&x[3 * i..3 * i + 3], &y[3 * j..3 * j + 3]);
            o0 += d * g[2 * i];
            o1 += d * g[2 * i + 1];
        }
        out[2 * j] = o0;
        out[2 * j + 1] = o1;
    }
}

/// out_i = p sum_j |x_i - y_j|^2 b_j
unsafe extern "C" fn scaled_sum_rows(nx: c_int, ny: c_int, out: *mut c_void, args: *mut *mut c_void) {
    let (rows, _) = extents(nx, ny);
    weighted_sum_rows(nx, ny, out, args);
    let p = arg(args, 3, 1)[0];
    for value in output(out, rows * 2) {
        *value *= p;
    }
}

/// Gradient in p before contraction: out_j = sum_i |x_i - y_j|^2 <b_j, g_i>
unsafe extern "C" fn grad_p_columns(nx: c_int, ny: c_int, out: *mut c_void, args: *mut *mut c_void) {
    let (nx, ny) = extents(nx, ny);
    let (x, y, b, g) = (
        arg(args, 0, nx * 3),
        arg(args, 1, ny * 3),
        arg(args, 2, ny * 2),
        arg(args, 4, nx * 2),
    );
    let out = output(out, ny);
    for j in 0..ny {
        out[j] = (0..nx)
            .map(|i| sq_dist(&x[3 * i..3 * i + 3], &y[3 * j..3 * j + 3]) * dot(&b[2 * j..2 * j + 2], &g[2 * i..2 * i + 2]))
            .sum();
    }
}

/// out_i = log sum_j exp(-|x_i - y_j|^2)
unsafe extern "C" fn log_sum_exp_rows(nx: c_int, ny: c_int, out: *mut c_void, args: *mut *mut c_void) {
    let (nx, ny) = extents(nx, ny);
    let (x, y) = (arg(args, 0, nx * 3), arg(args, 1, ny * 3));
    let out = output(out, nx);
    for i in 0..nx {
        let total: f64 = (0..ny)
            .map(|j| (-sq_dist(&x[3 * i..3 * i + 3], &y[3 * j..3 * j + 3])).exp())
            .sum();
        out[i] = total.ln();
    }
}

/// Kernels by normalized formula text
pub fn kernel_for(formula: &str) -> Option<RoutinePair> {
    let pair = match formula {
        "SqDist(x,y)*b" => RoutinePair::new(weighted_sum_rows, weighted_sum_columns),
        "Grad(SqDist(x,y)*b,Var(0,3,0),Var(3,2,0))" => RoutinePair::new(grad_x_rows, unsupported),
        "Grad(SqDist(x,y)*b,Var(1,3,1),Var(3,2,0))" => RoutinePair::new(unsupported, grad_y_columns),
        "Grad(SqDist(x,y)*b,Var(2,2,1),Var(3,2,0))" => RoutinePair::new(unsupported, grad_b_columns),
        "p*SqDist(x,y)*b" => RoutinePair::new(scaled_sum_rows, unsupported),
        "Grad(p*SqDist(x,y)*b,Var(3,1,2),Var(4,2,0))" => RoutinePair::new(unsupported, grad_p_columns),
        "LogSumExp(-SqDist(x,y))" => RoutinePair::new(log_sum_exp_rows, unsupported),
        _ => return None,
    };
    Some(pair)
}

// ---------------------------------------------------------------------------
// Fake build directory
// ---------------------------------------------------------------------------

/// Shared state between the fake compiler and loader
#[derive(Default)]
pub struct FakeBuildDir {
    built: Mutex<HashSet<String>>,
    compiled: Mutex<Vec<(Vec<String>, String)>>,
    compilations: AtomicUsize,
}

impl FakeBuildDir {
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }

    /// `(aliases, formula)` of every compiler run, in order
    pub fn compiled(&self) -> Vec<(Vec<String>, String)> {
        self.compiled.lock().clone()
    }
}

struct FakeLoader {
    dir: Arc<FakeBuildDir>,
    device: bool,
}

impl RoutineLoader for FakeLoader {
    fn open(&self, request: &RoutineRequest) -> Result<Option<RoutineSet>> {
        let name = request.key().name();
        if !self.dir.built.lock().contains(name) {
            return Ok(None);
        }
        let pair = kernel_for(request.formula())
            .ok_or_else(|| LoaderError::load(format!("/fake/{name}"), "missing symbol CpuConv"))?;
        let device = self.device.then_some(DeviceRoutines {
            host_1d: pair,
            host_2d: pair,
            device_1d: pair,
            device_2d: pair,
        });
        Ok(Some(RoutineSet::from_entry_points(name, pair, device)))
    }
}

struct FakeCompiler {
    dir: Arc<FakeBuildDir>,
}

impl RoutineCompiler for FakeCompiler {
    fn compile(&self, request: &RoutineRequest) -> Result<()> {
        self.dir.compilations.fetch_add(1, Ordering::SeqCst);
        self.dir
            .compiled
            .lock()
            .push((request.aliases().to_vec(), request.formula().to_string()));
        if kernel_for(request.formula()).is_none() {
            return Err(LoaderError::build(
                request.key().name(),
                format!("no kernel for {}", request.formula()),
            ));
        }
        self.dir.built.lock().insert(request.key().name().to_string());
        Ok(())
    }
}

/// A cache backed by the test kernels. With `device`, routine sets also
/// expose the GPU entry point family.
pub fn fake_cache(device: bool) -> (Arc<RoutineCache>, Arc<FakeBuildDir>) {
    genred_tracing::init_for_tests();
    let dir = Arc::new(FakeBuildDir::default());
    let cache = RoutineCache::new(
        Box::new(FakeLoader {
            dir: Arc::clone(&dir),
            device,
        }),
        Box::new(FakeCompiler { dir: Arc::clone(&dir) }),
    );
    (Arc::new(cache), dir)
}

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

/// Host memory that reports itself as device-resident
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMock(pub Array2<f64>);

impl ReductionArray for DeviceMock {
    fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    fn is_contiguous(&self) -> bool {
        self.0.is_standard_layout()
    }

    fn memory_space(&self) -> MemorySpace {
        MemorySpace::Device
    }

    fn precision(&self) -> Precision {
        Precision::Double
    }

    fn as_raw_ptr(&self) -> *const c_void {
        self.0.as_ptr().cast()
    }
}

impl ReductionArrayMut for DeviceMock {
    fn as_raw_mut_ptr(&mut self) -> *mut c_void {
        self.0.as_mut_ptr().cast()
    }
}

impl Operand for DeviceMock {
    fn zeros_like(&self, shape: (usize, usize)) -> CoreResult<Self> {
        Ok(Self(Array2::zeros(shape)))
    }

    fn contract_rows(&self) -> CoreResult<Self> {
        Ok(Self(self.0.contract_rows()?))
    }
}

/// Deterministic, well-spread test data
pub fn points(rows: usize, cols: usize, seed: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(i, k)| ((i * 31 + k * 17 + seed * 7) as f64 * 0.37).sin())
}

/// Direct evaluation of `SqDist(x,y)*b` summed over j
pub fn reference_weighted_sum(x: &Array2<f64>, y: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    Array2::from_shape_fn((x.nrows(), b.ncols()), |(i, c)| {
        (0..y.nrows())
            .map(|j| {
                let d: f64 = x.row(i).iter().zip(y.row(j)).map(|(u, v)| (u - v) * (u - v)).sum();
                d * b[[j, c]]
            })
            .sum()
    })
}

pub fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(u, v)| (u - v).abs()).fold(0.0, f64::max)
}
