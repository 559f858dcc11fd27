//! Block builder: emits bindings, normalizes expressions and collects
//! generated functions.
//!
//! Every pass rebuilds function bodies through a `BlockBuilder`. The builder
//! keeps a stack of open binding blocks (nested functions open their own
//! blocks on top), attaches descriptors to new expressions by asking the
//! operator registry, and owns the module that generated functions are
//! added to.

use crate::ir::{Binding, BindingBlock, Call, Callee, Expr, ExprKind, IrModule, ModuleFunc, Var};
use crate::registry::OperatorRegistry;
use crate::symbolic_expr::SymbolicExpr;
use crate::types::StructInfo;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Generates unique names within one pass invocation.
#[derive(Debug, Default, Clone)]
pub struct NameTable {
    /// Next suffix to try per prefix.
    counters: HashMap<String, usize>,
    used: HashSet<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a name as taken.
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    /// Return `prefix` if it is free, otherwise `prefix1`, `prefix2`, ...
    pub fn unique(&mut self, prefix: &str) -> String {
        let mut candidate = prefix.to_string();
        while self.used.contains(&candidate) {
            let counter = self.counters.entry(prefix.to_string()).or_insert(0);
            *counter += 1;
            candidate = format!("{prefix}{counter}");
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

#[derive(Debug)]
struct BlockFrame {
    bindings: Vec<Binding>,
    dataflow: bool,
}

/// Builder for binding blocks.
pub struct BlockBuilder<'r> {
    registry: &'r OperatorRegistry,
    module: IrModule,
    names: NameTable,
    frames: Vec<BlockFrame>,
    var_remap: HashMap<Var, Var>,
}

impl<'r> BlockBuilder<'r> {
    /// Create a builder with an empty context module.
    pub fn new(registry: &'r OperatorRegistry) -> Self {
        Self::with_module(registry, IrModule::new())
    }

    /// Create a builder whose context module starts as `module`.
    ///
    /// Names of existing functions are reserved.
    pub fn with_module(registry: &'r OperatorRegistry, module: IrModule) -> Self {
        let mut names = NameTable::new();
        for name in module.names() {
            names.reserve(name);
        }
        Self {
            registry,
            module,
            names,
            frames: Vec::new(),
            var_remap: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &'r OperatorRegistry {
        self.registry
    }

    /// The context module.
    pub fn module(&self) -> &IrModule {
        &self.module
    }

    /// Finish building and return the context module.
    pub fn into_module(self) -> IrModule {
        self.module
    }

    // ── Blocks ─────────────────────────────────────────────────────────

    /// Open a new binding block.
    pub fn begin_block(&mut self, dataflow: bool) {
        self.frames.push(BlockFrame {
            bindings: Vec::new(),
            dataflow,
        });
    }

    /// Close the innermost binding block.
    pub fn end_block(&mut self) -> Result<BindingBlock> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Error::InvalidIr("end_block without an open block".to_string()))?;
        Ok(BindingBlock {
            bindings: frame.bindings,
            dataflow: frame.dataflow,
        })
    }

    fn current_frame(&mut self) -> Result<&mut BlockFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Error::InvalidIr("no open binding block".to_string()))
    }

    // ── Emission ───────────────────────────────────────────────────────

    /// Normalize `expr` and bind it to a fresh variable.
    pub fn emit(&mut self, expr: Expr, name_hint: &str) -> Result<Var> {
        let value = self.normalize(expr)?;
        let info = value.struct_info().cloned().unwrap_or(StructInfo::Object);
        let var = Var::new(name_hint, info);
        self.emit_binding(Binding::Var {
            var: var.clone(),
            value,
        })?;
        Ok(var)
    }

    /// Append an already-formed binding to the innermost block.
    pub fn emit_binding(&mut self, binding: Binding) -> Result<()> {
        self.current_frame()?.bindings.push(binding);
        Ok(())
    }

    /// Emit a match-shape binding; `name_hint` re-binds the value to a new
    /// variable.
    pub fn emit_match_shape(
        &mut self,
        value: Expr,
        pattern: Vec<SymbolicExpr>,
        name_hint: Option<&str>,
    ) -> Result<Option<Var>> {
        let value = self.normalize(value)?;
        let info = value.struct_info().cloned().unwrap_or(StructInfo::Object);
        let var = name_hint.map(|hint| Var::new(hint, info));
        self.emit_binding(Binding::MatchShape {
            var: var.clone(),
            value,
            pattern,
        })?;
        Ok(var)
    }

    // ── Normalization ──────────────────────────────────────────────────

    /// Attach a descriptor to `expr` and to any sub-expression missing one.
    ///
    /// Operator calls are inferred through the registry. Calls to module or
    /// runtime functions take their first declared descriptor.
    pub fn normalize(&self, expr: Expr) -> Result<Expr> {
        if expr.struct_info().is_some() {
            return Ok(expr);
        }

        match expr.kind() {
            ExprKind::Call(call) => {
                let mut call = call.clone();
                for arg in &mut call.args {
                    *arg = self.normalize(arg.clone())?;
                }
                let info = self.infer_call(&call)?;
                Ok(Expr::annotated(ExprKind::Call(call), info))
            }
            ExprKind::Tuple(fields) => {
                let fields = fields
                    .iter()
                    .map(|f| self.normalize(f.clone()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::tuple(fields))
            }
            ExprKind::TupleGetItem(tuple, index) => {
                let tuple = self.normalize(tuple.clone())?;
                match tuple.struct_info() {
                    Some(StructInfo::Tuple(fields)) if *index >= fields.len() => {
                        Err(Error::InvalidIr(format!(
                            "tuple index {index} out of range for {} fields",
                            fields.len()
                        )))
                    }
                    _ => Ok(Expr::get_item(tuple, *index)),
                }
            }
            // Vars, shapes and functions carry descriptors from construction.
            _ => Ok(expr.with_info(StructInfo::Object)),
        }
    }

    fn infer_call(&self, call: &Call) -> Result<StructInfo> {
        if let Callee::Op(name) = &call.callee
            && let Some(op) = self.registry.get(name)
        {
            return op.infer_struct_info(call);
        }
        let declared = call.sinfo_args.first().cloned();
        Ok(declared.unwrap_or(StructInfo::Object))
    }

    // ── Variable remapping ─────────────────────────────────────────────

    /// Record that uses of `from` should now refer to `to`.
    pub fn remap_var(&mut self, from: &Var, to: Var) {
        self.var_remap.insert(from.clone(), to);
    }

    /// Current replacement for `var` (itself when not remapped).
    pub fn lookup_var(&self, var: &Var) -> Var {
        self.var_remap
            .get(var)
            .cloned()
            .unwrap_or_else(|| var.clone())
    }

    // ── Module ─────────────────────────────────────────────────────────

    /// Add a function under a fresh name derived from `name_hint`.
    pub fn add_function(&mut self, name_hint: &str, func: ModuleFunc) -> Result<String> {
        let name = self.names.unique(name_hint);
        self.module.add(name.clone(), func)?;
        tracing::debug!(name = %name, "added function to module");
        Ok(name)
    }

    /// Replace (or add) a function under a fixed name.
    pub fn update_function(&mut self, name: &str, func: ModuleFunc) {
        self.names.reserve(name);
        self.module.update(name, func);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::infer_unary;
    use crate::ir::Function;
    use crate::operator::Operator;
    use crate::types::{DataType, TensorDesc};

    struct ExpOp;
    impl Operator for ExpOp {
        fn name(&self) -> &str {
            "exp"
        }
        fn num_inputs(&self) -> usize {
            1
        }
        fn infer_struct_info(&self, call: &Call) -> Result<StructInfo> {
            infer_unary(call, true)
        }
    }

    fn registry() -> OperatorRegistry {
        let mut registry = OperatorRegistry::new();
        registry.register("exp", ExpOp);
        registry
    }

    #[test]
    fn test_name_table() {
        let mut names = NameTable::new();
        names.reserve("shape_func");
        assert_eq!(names.unique("shape_func"), "shape_func1");
        assert_eq!(names.unique("shape_func"), "shape_func2");
        assert_eq!(names.unique("main"), "main");
    }

    #[test]
    fn test_emit_infers_through_registry() {
        let registry = registry();
        let mut bb = BlockBuilder::new(&registry);
        let x = Var::new("x", TensorDesc::fixed(&[2, 3], DataType::F32));

        bb.begin_block(true);
        let y = bb
            .emit(Call::op("exp", vec![Expr::var(&x)]).into(), "y")
            .unwrap();
        let block = bb.end_block().unwrap();

        assert!(block.dataflow);
        assert_eq!(block.bindings.len(), 1);
        assert_eq!(
            y.struct_info(),
            &TensorDesc::fixed(&[2, 3], DataType::F32).into()
        );
    }

    #[test]
    fn test_inference_error_propagates() {
        let registry = registry();
        let mut bb = BlockBuilder::new(&registry);
        let x = Var::new("x", TensorDesc::fixed(&[2], DataType::I32));

        bb.begin_block(false);
        let err = bb
            .emit(Call::op("exp", vec![Expr::var(&x)]).into(), "y")
            .unwrap_err();
        assert!(matches!(err, Error::DtypeMismatch { .. }));
    }

    #[test]
    fn test_extern_call_uses_declared_info() {
        let registry = registry();
        let bb = BlockBuilder::new(&registry);
        let out = StructInfo::shape_of(vec![]);
        let call = Call::extern_func("runtime_fn", vec![]).with_sinfo(out.clone());
        let expr = bb.normalize(call.into()).unwrap();
        assert_eq!(expr.struct_info(), Some(&out));
    }

    #[test]
    fn test_emit_requires_open_block() {
        let registry = registry();
        let mut bb = BlockBuilder::new(&registry);
        assert!(bb.emit(Expr::shape(vec![]), "s").is_err());
        assert!(bb.end_block().is_err());
    }

    #[test]
    fn test_add_function_unique_names() {
        let registry = registry();
        let func = ModuleFunc::Graph(Function::new(vec![], vec![], Expr::tuple(vec![])));
        let mut module = IrModule::new();
        module.add("shape_func", func.clone()).unwrap();

        let mut bb = BlockBuilder::with_module(&registry, module);
        assert_eq!(
            bb.add_function("shape_func", func.clone()).unwrap(),
            "shape_func1"
        );
        assert_eq!(bb.add_function("shape_func", func).unwrap(), "shape_func2");
        assert_eq!(bb.into_module().len(), 3);
    }
}
