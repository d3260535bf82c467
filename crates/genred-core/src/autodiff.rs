//! Reverse-mode differentiation by formula rewriting
//!
//! The gradient of a reduction is itself a reduction: for input `k`, the
//! formula `F` becomes `Grad(F, Var(k,dim_k,cat_k), Var(N,dim_out,cat_out))`
//! where the incoming gradient is passed as one extra argument at index `N`.
//! Aliases are never extended, so gradients of any order share one alias
//! list and the routine cache sees stable keys.

use std::sync::Arc;

use genred_loader::{RoutineCache, SumIndex};

use crate::buffer::Operand;
use crate::error::{Result, ShapeError};
use crate::formula::VarRef;
use crate::genred::{reduce_operands, Reduction};
use crate::resolve::BackendHint;
use crate::signature::{Category, VarSpec};

/// One reduction recorded for the backward pass
pub struct ReductionNode<O> {
    reduction: Reduction,
    hint: BackendHint,
    inputs: Vec<Arc<O>>,
    cache: Arc<RoutineCache>,
}

/// Result of [`ReductionNode::backward`]
///
/// Slots line up with the arguments of the forward call: five slots that
/// never carry a gradient (formula, aliases, signature, sum index, backend)
/// followed by one slot per input.
pub struct Gradients<O> {
    slots: Vec<Option<O>>,
    nodes: Vec<Option<ReductionNode<O>>>,
}

impl<O> Gradients<O> {
    /// Leading slots for the non-differentiable forward arguments
    pub const NON_DIFFERENTIABLE: usize = 5;

    pub fn slots(&self) -> &[Option<O>] {
        &self.slots
    }

    /// Gradient with respect to input `k`, if it was requested
    pub fn input(&self, k: usize) -> Option<&O> {
        self.slots.get(Self::NON_DIFFERENTIABLE + k).and_then(Option::as_ref)
    }

    /// The reduction that produced the gradient of input `k`, for
    /// differentiating again. For parameters this is the reduction before
    /// the row contraction.
    pub fn node(&self, k: usize) -> Option<&ReductionNode<O>> {
        self.nodes.get(k).and_then(Option::as_ref)
    }

    pub fn into_slots(self) -> Vec<Option<O>> {
        self.slots
    }
}

impl<O: Operand> ReductionNode<O> {
    /// Run the forward reduction and keep what the backward pass needs
    pub fn apply(
        reduction: Reduction,
        hint: BackendHint,
        inputs: Vec<Arc<O>>,
        cache: Arc<RoutineCache>,
    ) -> Result<(O, Self)> {
        let refs: Vec<&O> = inputs.iter().map(Arc::as_ref).collect();
        let output = reduce_operands(&reduction, hint, &refs, &cache)?;
        Ok((
            output,
            Self {
                reduction,
                hint,
                inputs,
                cache,
            },
        ))
    }

    pub fn reduction(&self) -> &Reduction {
        &self.reduction
    }

    pub fn inputs(&self) -> &[Arc<O>] {
        &self.inputs
    }

    /// Gradients of `sum(output * grad_output)` with respect to the inputs
    /// flagged in `needs_input_grad`.
    #[tracing::instrument(skip_all, fields(formula = %self.reduction.formula))]
    pub fn backward(&self, grad_output: O, needs_input_grad: &[bool]) -> Result<Gradients<O>> {
        let n = self.inputs.len();
        if needs_input_grad.len() != n {
            return Err(ShapeError::ArityMismatch {
                expected: n,
                actual: needs_input_grad.len(),
            }
            .into());
        }

        let signature = &self.reduction.signature;
        let eta = VarRef::new(n, signature.result());

        let mut inputs = self.inputs.clone();
        inputs.push(Arc::new(grad_output));

        let mut slots: Vec<Option<O>> = (0..Gradients::<O>::NON_DIFFERENTIABLE).map(|_| None).collect();
        let mut nodes = Vec::with_capacity(n);

        for (k, (&needed, &spec)) in needs_input_grad.iter().zip(signature.args()).enumerate() {
            if !needed {
                slots.push(None);
                nodes.push(None);
                continue;
            }

            let formula = self.reduction.formula.clone().grad(VarRef::new(k, spec), eta);
            let (output_spec, sum_index) = match spec.category {
                Category::Row => (spec, SumIndex::Row),
                Category::Column => (spec, SumIndex::Column),
                // Indexed like a column variable first, contracted below
                Category::Parameter => (VarSpec::new(spec.dim, Category::Column), SumIndex::Column),
            };
            let reduction = Reduction::new(
                formula,
                Arc::clone(&self.reduction.aliases),
                signature.for_gradient(output_spec),
                sum_index,
            );

            tracing::debug!(input = k, formula = %reduction.formula, "gradient reduction");
            let (gradient, node) = Self::apply(reduction, self.hint, inputs.clone(), Arc::clone(&self.cache))?;
            let gradient = match spec.category {
                Category::Parameter => gradient.contract_rows()?,
                _ => gradient,
            };

            slots.push(Some(gradient));
            nodes.push(Some(node));
        }

        Ok(Gradients { slots, nodes })
    }
}

impl<O> std::fmt::Debug for Gradients<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let requested: Vec<usize> = (0..self.nodes.len()).filter(|&k| self.input(k).is_some()).collect();
        f.debug_struct("Gradients")
            .field("slots", &self.slots.len())
            .field("requested", &requested)
            .finish()
    }
}

impl<O> std::fmt::Debug for ReductionNode<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReductionNode")
            .field("formula", &self.reduction.formula.to_string())
            .field("hint", &self.hint)
            .field("inputs", &self.inputs.len())
            .finish()
    }
}
