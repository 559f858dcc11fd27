//! Compiler pass trait and stage definitions.

use crate::Result;
use crate::ir::IrModule;
use crate::registry::OperatorRegistry;

/// Compilation stage for organizing passes.
///
/// Passes are grouped into stages and run in a fixed order. Within each stage,
/// passes run in the order they were registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Descriptor inference for every call (earliest stage).
    Inference,

    /// Rewrite operator calls whose shapes are fully known into backend
    /// kernel calls.
    Legalization,

    /// Module cleanup (dead bindings, etc.).
    Optimization,

    /// Remove symbolic shape constructs. Runs last.
    Lowering,
}

/// Trait for implementing compiler passes.
///
/// A pass is a module-to-module transform. The input module is never
/// modified; the pass returns a new one.
///
/// # Example
///
/// ```ignore
/// struct IdentityPass;
///
/// impl Pass for IdentityPass {
///     fn name(&self) -> &str {
///         "identity"
///     }
///
///     fn stage(&self) -> Stage {
///         Stage::Optimization
///     }
///
///     fn run(&self, module: &IrModule, _registry: &OperatorRegistry) -> Result<IrModule> {
///         Ok(module.clone())
///     }
/// }
/// ```
pub trait Pass: Send + Sync {
    /// Get the pass name (used for logging and debugging).
    fn name(&self) -> &str;

    /// Get the compilation stage this pass belongs to.
    fn stage(&self) -> Stage;

    /// Run the pass on the given module.
    fn run(&self, module: &IrModule, registry: &OperatorRegistry) -> Result<IrModule>;
}
