//! Core operator registry.

use tessera_core::{CALL_TIR_OP, OperatorRegistry};

use crate::families::{BinaryOp, ReductionOp, UNARY_ARITH_OPS, UNARY_CHECK_OPS, UnaryOp};
use crate::operators::{CallTirOp, GradOp, Pool2dOp, TransposeOp};

/// Returns an operator registry pre-populated with the core operators.
///
/// The registry includes:
/// - unary elementwise operators (arithmetic and check)
/// - binary broadcasting operators (arithmetic and comparison)
/// - reductions (sum, mean)
/// - transpose and 2-D pooling
/// - gradient operators
/// - the `call_tir` kernel-call marker
///
/// Custom operators can be added to the returned registry via
/// `registry.register(name, operator)`.
pub fn core_operator_registry() -> OperatorRegistry {
    let mut registry = OperatorRegistry::new();

    for &(name, require_float) in UNARY_ARITH_OPS {
        registry.register(name, UnaryOp::arith(name, require_float));
    }
    for &name in UNARY_CHECK_OPS {
        registry.register(name, UnaryOp::check(name));
    }

    registry
        .register("add", BinaryOp::add())
        .register("subtract", BinaryOp::subtract())
        .register("multiply", BinaryOp::multiply())
        .register("divide", BinaryOp::divide())
        .register("floor_divide", BinaryOp::floor_divide())
        .register("less", BinaryOp::less())
        .register("greater", BinaryOp::greater())
        .register("equal", BinaryOp::equal());

    registry
        .register("sum", ReductionOp::sum())
        .register("mean", ReductionOp::mean());

    registry
        .register("transpose", TransposeOp)
        .register("max_pool2d", Pool2dOp::max_pool2d())
        .register("avg_pool2d", Pool2dOp::avg_pool2d());

    registry
        .register("nll_loss_backward", GradOp::nll_loss_backward())
        .register("max_pool2d_backward", GradOp::max_pool2d_backward())
        .register("avg_pool2d_backward", GradOp::avg_pool2d_backward())
        .register("take_backward", GradOp::take_backward());

    registry.register(CALL_TIR_OP, CallTirOp);

    tracing::debug!(operators = registry.len(), "built core operator registry");
    registry
}
