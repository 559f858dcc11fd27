//! Compiler passes over binding-block modules.

mod dead_code;
mod legalize;
mod normalize;
mod shape_lower;

pub use dead_code::remove_all_unused;
pub use legalize::{LegalizeOps, LegalizeReport};
pub use normalize::NormalizePass;
pub use shape_lower::ShapeLowerPass;

use tessera_core::{Function, IrModule, ModuleFunc};

/// Dataflow functions of a module, in declaration order.
fn graph_functions(module: &IrModule) -> impl Iterator<Item = (&str, &Function)> {
    module
        .functions()
        .filter_map(|(name, func)| match func {
            ModuleFunc::Graph(func) => Some((name, func)),
            ModuleFunc::Prim(_) => None,
        })
}
