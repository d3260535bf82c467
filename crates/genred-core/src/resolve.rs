//! Shape validation and backend resolution

use std::fmt;
use std::str::FromStr;

use genred_loader::{Backend, MemorySpace, SumIndex, Tiling};

use crate::buffer::ReductionArray;
use crate::error::{BufferPosition, Error, Result, ShapeError};
use crate::signature::{Category, Signature};

/// User-facing backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendHint {
    /// CPU for host buffers, 1D GPU for device buffers
    #[default]
    Auto,
    /// 1D GPU in the buffers' memory space
    Gpu,
    Gpu1D,
    Gpu2D,
    /// A fully qualified backend, used as is
    Explicit(Backend),
}

impl BackendHint {
    /// Concrete backend for buffers living in `space`
    pub fn resolve(self, space: MemorySpace) -> Backend {
        match self {
            Self::Explicit(backend) => backend,
            Self::Auto => match space {
                MemorySpace::Host => Backend::Cpu,
                MemorySpace::Device => Backend::Gpu1DDevice,
            },
            Self::Gpu | Self::Gpu1D => Backend::gpu(Tiling::OneD, space),
            Self::Gpu2D => Backend::gpu(Tiling::TwoD, space),
        }
    }
}

impl FromStr for BackendHint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "GPU" => Ok(Self::Gpu),
            "GPU_1D" => Ok(Self::Gpu1D),
            "GPU_2D" => Ok(Self::Gpu2D),
            other => other.parse::<Backend>().map(Self::Explicit).map_err(|_| {
                Error::Configuration(format!(
                    "unknown backend {other:?}; expected auto, GPU, GPU_1D, GPU_2D or one of {}",
                    Backend::ALL.map(Backend::as_str).join(", ")
                ))
            }),
        }
    }
}

impl fmt::Display for BackendHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Gpu => f.write_str("GPU"),
            Self::Gpu1D => f.write_str("GPU_1D"),
            Self::Gpu2D => f.write_str("GPU_2D"),
            Self::Explicit(backend) => write!(f, "{backend}"),
        }
    }
}

/// Outcome of validating one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub nx: usize,
    pub ny: usize,
    pub backend: Backend,
    pub memory_space: MemorySpace,
}

impl Resolution {
    /// Row count of the output for `sum_index`
    pub fn output_rows(&self, sum_index: SumIndex) -> usize {
        match sum_index {
            SumIndex::Row => self.nx,
            SumIndex::Column => self.ny,
        }
    }
}

/// Validate the arguments against the signature and return `(nx, ny)`.
///
/// Used on its own to size an output buffer before it exists.
pub fn infer_extents(signature: &Signature, args: &[&dyn ReductionArray]) -> Result<(usize, usize)> {
    if args.len() != signature.arity() {
        return Err(ShapeError::ArityMismatch {
            expected: signature.arity(),
            actual: args.len(),
        }
        .into());
    }

    let mut nx = None;
    let mut ny = None;

    for (position, (arg, spec)) in args.iter().zip(signature.args()).enumerate() {
        let shape = arg.shape();
        let extent = match spec.category {
            Category::Parameter => {
                let well_formed = match shape {
                    [n] => *n == spec.dim,
                    [1, n] => *n == spec.dim,
                    _ => false,
                };
                if !well_formed {
                    if arg.element_count() != spec.dim {
                        return Err(ShapeError::DimensionMismatch {
                            position: BufferPosition::Argument(position),
                            expected: spec.dim,
                            actual: arg.element_count(),
                        }
                        .into());
                    }
                    return Err(ShapeError::ParameterShape {
                        position,
                        shape: shape.to_vec(),
                        dim: spec.dim,
                    }
                    .into());
                }
                continue;
            }
            Category::Row => &mut nx,
            Category::Column => &mut ny,
        };

        if shape.len() != 2 {
            return Err(ShapeError::NotTwoDimensional {
                position: BufferPosition::Argument(position),
                ndim: shape.len(),
            }
            .into());
        }
        if shape[1] != spec.dim {
            return Err(ShapeError::DimensionMismatch {
                position: BufferPosition::Argument(position),
                expected: spec.dim,
                actual: shape[1],
            }
            .into());
        }
        match *extent {
            None => *extent = Some(shape[0]),
            Some(expected) if expected != shape[0] => {
                return Err(ShapeError::RowCountMismatch {
                    position,
                    category: spec.category,
                    expected,
                    actual: shape[0],
                }
                .into());
            }
            Some(_) => {}
        }
    }

    Ok((non_empty(nx, "nx", Category::Row)?, non_empty(ny, "ny", Category::Column)?))
}

fn non_empty(extent: Option<usize>, axis: &str, category: Category) -> Result<usize> {
    match extent {
        None => Err(Error::EmptyInput(format!("no {category} argument determines {axis}"))),
        Some(0) => Err(Error::EmptyInput(format!("{category} arguments have zero rows ({axis} = 0)"))),
        Some(n) => Ok(n),
    }
}

/// Validate a complete call and pick its backend
#[tracing::instrument(level = "debug", skip_all, fields(hint = %hint))]
pub fn resolve(
    signature: &Signature,
    sum_index: SumIndex,
    result: &dyn ReductionArray,
    args: &[&dyn ReductionArray],
    hint: BackendHint,
) -> Result<Resolution> {
    let precision = result.precision();
    if let Some(position) = args.iter().position(|a| a.precision() != precision) {
        return Err(Error::Configuration(format!(
            "argument {position} is {} but the result is {precision}",
            args[position].precision()
        )));
    }

    let (nx, ny) = infer_extents(signature, args)?;

    let declared = signature.result();
    if declared.category == Category::Parameter {
        return Err(ShapeError::ParameterOutput.into());
    }
    if declared.category != Category::from(sum_index) {
        return Err(ShapeError::SumIndexMismatch {
            category: declared.category,
            sum_index: sum_index.into(),
        }
        .into());
    }
    let result_shape = result.shape();
    if result_shape.len() != 2 {
        return Err(ShapeError::NotTwoDimensional {
            position: BufferPosition::Result,
            ndim: result_shape.len(),
        }
        .into());
    }
    if result_shape[1] != declared.dim {
        return Err(ShapeError::DimensionMismatch {
            position: BufferPosition::Result,
            expected: declared.dim,
            actual: result_shape[1],
        }
        .into());
    }
    let expected_rows = if declared.category == Category::Row { nx } else { ny };
    if result_shape[0] != expected_rows {
        return Err(ShapeError::ResultRowMismatch {
            category: declared.category,
            expected: expected_rows,
            actual: result_shape[0],
        }
        .into());
    }

    let memory_space = result.memory_space();
    if let Some(position) = args.iter().position(|a| a.memory_space() != memory_space) {
        return Err(Error::Configuration(format!(
            "mixed memory spaces: the result is in {memory_space} memory but argument {position} is in {} memory",
            args[position].memory_space()
        )));
    }

    let backend = hint.resolve(memory_space);
    if backend.residency() != memory_space {
        return Err(Error::Configuration(format!(
            "backend {backend} reads {} memory but the buffers are in {memory_space} memory",
            backend.residency()
        )));
    }

    tracing::debug!(nx, ny, %backend, "resolved reduction");
    Ok(Resolution {
        nx,
        ny,
        backend,
        memory_space,
    })
}
