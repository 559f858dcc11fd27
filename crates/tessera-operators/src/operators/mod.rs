//! Individual operator implementations.

mod call_tir;
mod grad;
mod pool;
mod transpose;

pub use call_tir::CallTirOp;
pub use grad::GradOp;
pub use pool::Pool2dOp;
pub use transpose::TransposeOp;
