//! Operator registry for name-based dispatch.

use crate::operator::{LegalizeFn, Operator};
use std::collections::HashMap;

/// Registry for operator implementations.
///
/// Maps operator names (e.g., "add", "max_pool2d") to their `Operator`
/// implementations. Populated once before any pass runs and read-only
/// afterwards.
///
/// # Example
///
/// ```ignore
/// let mut registry = OperatorRegistry::new();
/// registry.register("add", BinaryOp::add());
///
/// let op = registry.get("add").unwrap();
/// let info = op.infer_struct_info(&call)?;
/// ```
pub struct OperatorRegistry {
    /// Map from operator name to implementation.
    operators: HashMap<String, Box<dyn Operator>>,
}

impl OperatorRegistry {
    /// Create a new empty operator registry.
    pub fn new() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Register an operator under `name`, replacing any earlier entry.
    ///
    /// Returns `self` for method chaining.
    pub fn register<O>(&mut self, name: &str, operator: O) -> &mut Self
    where
        O: Operator + 'static,
    {
        if self
            .operators
            .insert(name.to_string(), Box::new(operator))
            .is_some()
        {
            tracing::warn!(
                op = name,
                "operator registered twice, keeping the later one"
            );
        }
        self
    }

    /// Look up an operator by name.
    pub fn get(&self, name: &str) -> Option<&dyn Operator> {
        self.operators.get(name).map(|op| op.as_ref())
    }

    /// Built-in legalization callback of an operator.
    pub fn legalizer(&self, name: &str) -> Option<LegalizeFn> {
        self.get(name)?.legalizer()
    }

    /// Check if an operator is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Iterate over all registered operator names.
    pub fn operator_names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(|s| s.as_str())
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
