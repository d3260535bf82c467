//! Formula IR
//!
//! Formulas are opaque to this crate except for the wrappers it adds itself
//! (`LogSumExp`, `Grad`). The rendered string is what the compiler sees and
//! what the routine cache hashes.

use std::fmt;
use std::sync::Arc;

use crate::signature::{Category, VarSpec};

/// Reference to a variable by position, without a name.
///
/// Gradients refer to variables this way so the alias list, and with it the
/// routine key prefix, stays the same at every differentiation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarRef {
    pub index: usize,
    pub dim: usize,
    pub category: Category,
}

impl VarRef {
    pub fn new(index: usize, spec: VarSpec) -> Self {
        Self {
            index,
            dim: spec.dim,
            category: spec.category,
        }
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Var({},{},{})", self.index, self.dim, self.category.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    /// User-supplied expression text
    Expr(Arc<str>),
    LogSumExp(Arc<Formula>),
    /// Gradient of `body` with respect to `var`, contracted with `eta`
    Grad {
        body: Arc<Formula>,
        var: VarRef,
        eta: VarRef,
    },
}

impl Formula {
    pub fn expr(text: impl AsRef<str>) -> Self {
        Self::Expr(Arc::from(text.as_ref()))
    }

    pub fn log_sum_exp(self) -> Self {
        Self::LogSumExp(Arc::new(self))
    }

    pub fn grad(self, var: VarRef, eta: VarRef) -> Self {
        Self::Grad {
            body: Arc::new(self),
            var,
            eta,
        }
    }

    /// Number of nested `Grad` wrappers
    pub fn order(&self) -> usize {
        match self {
            Self::Expr(_) => 0,
            Self::LogSumExp(inner) => inner.order(),
            Self::Grad { body, .. } => 1 + body.order(),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expr(text) => f.write_str(text),
            Self::LogSumExp(inner) => write!(f, "LogSumExp({inner})"),
            Self::Grad { body, var, eta } => write!(f, "Grad({body},{var},{eta})"),
        }
    }
}

impl From<&str> for Formula {
    fn from(text: &str) -> Self {
        Self::expr(text)
    }
}
