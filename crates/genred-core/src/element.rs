//! Scalar types routines can be compiled for

use std::fmt::Debug;

use genred_loader::Precision;
use ndarray::LinalgScalar;

/// Element type of reduction buffers
pub trait Element: LinalgScalar + Debug + Send + Sync {
    const PRECISION: Precision;
}

impl Element for f32 {
    const PRECISION: Precision = Precision::Float;
}

impl Element for f64 {
    const PRECISION: Precision = Precision::Double;
}
