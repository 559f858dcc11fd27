//! Core operator implementations for Tessera.
//!
//! A reference operator catalogue built on the `tessera-core` framework.
//! Every operator declares its arity and argument schema, infers its result
//! descriptor with the shared descriptor utilities, and (except gradient
//! operators) legalizes to a `call_tir` kernel call.
//!
//! # Operator Families
//!
//! - **Unary**: abs, exp, sqrt, tanh, ... and isfinite/isinf/isnan
//! - **Binary**: add, subtract, multiply, divide, floor_divide, less, greater, equal
//! - **Reduction**: sum, mean
//!
//! # Individual Operators
//!
//! - Transpose
//! - Pooling (max_pool2d, avg_pool2d)
//! - Gradients (nll_loss_backward, max_pool2d_backward, avg_pool2d_backward, take_backward)
//! - `call_tir` marker

pub mod families;
pub mod operators;

mod helpers;
mod registry;

pub use families::{BinaryOp, ReductionOp, UnaryOp};
pub use helpers::kernel_call;
pub use operators::{CallTirOp, GradOp, Pool2dOp, TransposeOp};
pub use registry::core_operator_registry;
