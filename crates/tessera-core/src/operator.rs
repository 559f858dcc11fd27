//! Operator trait for the extensible operation system.

use crate::Result;
use crate::ir::{Call, Expr};
use crate::ir_builder::BlockBuilder;
use crate::types::StructInfo;
use std::sync::Arc;

/// Legalization callback: rewrites a call whose shapes are fully known into
/// a backend-executable expression.
///
/// The builder may be used to emit intermediate bindings ahead of the
/// returned expression.
pub type LegalizeFn = Arc<dyn Fn(&mut BlockBuilder<'_>, &Call) -> Result<Expr> + Send + Sync>;

/// One entry of an operator's argument schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: &'static str,
    pub description: &'static str,
}

impl ArgSpec {
    pub const fn tensor(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: "Tensor",
            description,
        }
    }
}

/// Trait for implementing operators.
///
/// An operator declares its arity and argument schema, infers the descriptor
/// of its result from its inputs, and may provide a legalization callback.
///
/// # Example
///
/// ```ignore
/// struct ExpOp;
///
/// impl Operator for ExpOp {
///     fn name(&self) -> &str {
///         "exp"
///     }
///
///     fn num_inputs(&self) -> usize {
///         1
///     }
///
///     fn infer_struct_info(&self, call: &Call) -> Result<StructInfo> {
///         infer_unary(call, true)
///     }
/// }
/// ```
pub trait Operator: Send + Sync {
    /// Get the operator name (e.g., "add", "max_pool2d").
    fn name(&self) -> &str;

    /// Number of inputs the operator takes.
    fn num_inputs(&self) -> usize;

    /// Argument schema, in input order.
    fn arguments(&self) -> &[ArgSpec] {
        &[]
    }

    /// Infer the descriptor of the call's result.
    ///
    /// Argument descriptors are already attached when this is called.
    fn infer_struct_info(&self, call: &Call) -> Result<StructInfo>;

    /// Built-in legalization callback, if any.
    fn legalizer(&self) -> Option<LegalizeFn> {
        None
    }
}
