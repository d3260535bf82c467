//! Public reduction API

use std::sync::Arc;

use genred_loader::{global_cache, RoutineCache, SumIndex};

use crate::autodiff::ReductionNode;
use crate::buffer::{Operand, ReductionArray, ReductionArrayMut};
use crate::error::{Result, ShapeError};
use crate::formula::Formula;
use crate::invoke::invoke;
use crate::resolve::{infer_extents, resolve, BackendHint};
use crate::signature::{parse_types, Signature};

/// Everything that identifies a reduction apart from its buffers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub formula: Formula,
    pub aliases: Arc<[String]>,
    pub signature: Signature,
    pub sum_index: SumIndex,
}

impl Reduction {
    pub fn new(formula: Formula, aliases: impl Into<Arc<[String]>>, signature: Signature, sum_index: SumIndex) -> Self {
        Self {
            formula,
            aliases: aliases.into(),
            signature,
            sum_index,
        }
    }
}

/// Validate, resolve, acquire and invoke in one step, writing into `result`.
///
/// Works on any buffers implementing the capability traits, including
/// views into larger arrays, as long as they are contiguous.
#[tracing::instrument(skip_all, fields(formula = %reduction.formula, hint = %hint))]
pub fn reduce_into<R: ReductionArrayMut>(
    reduction: &Reduction,
    hint: BackendHint,
    result: &mut R,
    args: &[&dyn ReductionArray],
    cache: &RoutineCache,
) -> Result<()> {
    let resolution = resolve(&reduction.signature, reduction.sum_index, &*result, args, hint)?;

    let routines = cache.acquire_for(
        &reduction.aliases[..],
        &reduction.formula.to_string(),
        result.precision(),
        resolution.backend,
    )?;

    invoke(
        &routines,
        resolution.backend,
        reduction.sum_index,
        resolution.nx,
        resolution.ny,
        result,
        args,
    )
}

/// Allocate the output next to `inputs[0]` and reduce into it
pub(crate) fn reduce_operands<O: Operand>(
    reduction: &Reduction,
    hint: BackendHint,
    inputs: &[&O],
    cache: &RoutineCache,
) -> Result<O> {
    let args: Vec<&dyn ReductionArray> = inputs.iter().map(|input| *input as &dyn ReductionArray).collect();
    let first = inputs.first().ok_or(ShapeError::ArityMismatch {
        expected: reduction.signature.arity(),
        actual: 0,
    })?;

    let (nx, ny) = infer_extents(&reduction.signature, &args)?;
    let rows = match reduction.sum_index {
        SumIndex::Row => nx,
        SumIndex::Column => ny,
    };
    let mut output = first.zeros_like((rows, reduction.signature.result().dim))?;

    reduce_into(reduction, hint, &mut output, &args, cache)?;
    Ok(output)
}

/// A summation reduction built from a formula and variable declarations
///
/// ```no_run
/// use genred_core::{BackendHint, GenericSum};
/// use ndarray::Array2;
///
/// let kernel = GenericSum::new(
///     "SqDist(x,y)*b",
///     &["out = Vx(2)", "x = Vx(3)", "y = Vy(3)", "b = Vy(2)"],
/// )?;
/// let x = Array2::<f32>::zeros((500, 3));
/// let y = Array2::<f32>::zeros((400, 3));
/// let b = Array2::<f32>::zeros((400, 2));
/// let out = kernel.call(&[&x, &y, &b], BackendHint::Auto)?;
/// assert_eq!(out.dim(), (500, 2));
/// # Ok::<(), genred_core::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct GenericSum {
    reduction: Reduction,
    cache: Option<Arc<RoutineCache>>,
}

impl GenericSum {
    pub fn new<S: AsRef<str>>(formula: &str, declarations: &[S]) -> Result<Self> {
        Self::from_formula(Formula::expr(formula), declarations)
    }

    /// Log-sum-exp reduction of `formula`
    pub fn logsumexp<S: AsRef<str>>(formula: &str, declarations: &[S]) -> Result<Self> {
        Self::from_formula(Formula::expr(formula).log_sum_exp(), declarations)
    }

    fn from_formula<S: AsRef<str>>(formula: Formula, declarations: &[S]) -> Result<Self> {
        let parsed = parse_types(declarations)?;
        Ok(Self {
            reduction: Reduction::new(formula, parsed.aliases, parsed.signature, parsed.sum_index),
            cache: None,
        })
    }

    /// Use `cache` instead of the process-wide one
    pub fn with_cache(mut self, cache: Arc<RoutineCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn reduction(&self) -> &Reduction {
        &self.reduction
    }

    fn cache(&self) -> Arc<RoutineCache> {
        self.cache.clone().unwrap_or_else(global_cache)
    }

    pub fn call<O: Operand>(&self, inputs: &[&O], hint: BackendHint) -> Result<O> {
        reduce_operands(&self.reduction, hint, inputs, &self.cache())
    }

    /// Like [`call`](Self::call), also returning a node for the backward pass
    pub fn call_with_grad<O: Operand>(&self, inputs: Vec<Arc<O>>, hint: BackendHint) -> Result<(O, ReductionNode<O>)> {
        ReductionNode::apply(self.reduction.clone(), hint, inputs, self.cache())
    }
}
