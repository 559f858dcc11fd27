//! Operator families that share inference and legalization logic.
//!
//! Each family implements the shared structure once and parameterizes only
//! the differences (name, dtype rules, kernel).

pub mod binary;
pub mod reduction;
pub mod unary;

pub use binary::BinaryOp;
pub use reduction::ReductionOp;
pub use unary::{UNARY_ARITH_OPS, UNARY_CHECK_OPS, UnaryOp};
