//! Common test utilities for operator tests.

use tessera_core::{Expr, TensorDesc, Var};

// Re-export types commonly used in tests
pub use tessera_core::{AttrValue, DataType};
pub use tessera_operators::core_operator_registry;

/// Create a tensor variable with the given descriptor.
pub fn tensor(name: &str, desc: TensorDesc) -> Expr {
    Expr::var(&Var::new(name, desc))
}
