//! Common test utilities for pass tests.
#![allow(dead_code)]

use tessera_core::{Binding, ExprKind, Function, IrModule, ModuleFunc};

pub use tessera_core::{
    AttrValue, BlockBuilder, Call, DataType, Expr, SymbolicExpr, TensorDesc, Var,
};
pub use tessera_operators::core_operator_registry;

/// Install a test subscriber; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Module holding `func` as `main`.
pub fn module_with_main(func: Function) -> IrModule {
    let mut module = IrModule::new();
    module
        .add("main", ModuleFunc::Graph(func))
        .expect("fresh module");
    module
}

pub fn main_of(module: &IrModule) -> &Function {
    module.function("main").expect("main function")
}

/// Callee names of every call binding, in program order.
pub fn callees(func: &Function) -> Vec<String> {
    func.body
        .bindings()
        .filter_map(|b| b.value().as_call())
        .map(|c| c.callee_name().to_string())
        .collect()
}

/// Whether any symbolic shape construct is left at the top level of `func`.
pub fn has_shape_constructs(func: &Function) -> bool {
    func.body.bindings().any(|b| {
        matches!(b, Binding::MatchShape { .. }) || matches!(b.value().kind(), ExprKind::Shape(_))
    }) || matches!(func.body.body.kind(), ExprKind::Shape(_))
}

pub fn kernel_of(expr: &Expr) -> Option<&str> {
    expr.as_call()?.attr("kernel")?.as_str()
}
