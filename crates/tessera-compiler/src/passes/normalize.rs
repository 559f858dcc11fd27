//! Descriptor inference pass.
//!
//! Re-infers the descriptor of every operator call through the registry.
//! Bindings whose descriptor changes are re-bound to fresh variables and
//! downstream uses follow.

use tessera_core::mutator::walk_call;
use tessera_core::{
    BlockBuilder, Call, Expr, ExprMutator, IrModule, ModuleFunc, OperatorRegistry, Pass, Result,
    Stage,
};

use super::graph_functions;

/// Pass that attaches an up-to-date descriptor to every call.
pub struct NormalizePass;

impl NormalizePass {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NormalizePass {
    fn default() -> Self {
        Self::new()
    }
}

struct Normalizer<'r> {
    builder: BlockBuilder<'r>,
}

impl<'r> ExprMutator<'r> for Normalizer<'r> {
    fn builder(&mut self) -> &mut BlockBuilder<'r> {
        &mut self.builder
    }

    fn visit_call(&mut self, expr: &Expr, call: &Call) -> Result<Expr> {
        let visited = walk_call(self, expr, call)?;
        if !Expr::ptr_eq(&visited, expr) {
            // Rebuilt or inferred for the first time.
            return Ok(visited);
        }

        let fresh = self.builder.normalize(Expr::call(call.clone()))?;
        if fresh.struct_info() == expr.struct_info() {
            Ok(visited)
        } else {
            Ok(fresh)
        }
    }
}

impl Pass for NormalizePass {
    fn name(&self) -> &str {
        "normalize"
    }

    fn stage(&self) -> Stage {
        Stage::Inference
    }

    fn run(&self, module: &IrModule, registry: &OperatorRegistry) -> Result<IrModule> {
        let mut normalizer = Normalizer {
            builder: BlockBuilder::with_module(registry, module.clone()),
        };

        for (name, func) in graph_functions(module) {
            let func = normalizer.rewrite_function(func)?;
            normalizer
                .builder
                .update_function(name, ModuleFunc::Graph(func));
        }

        Ok(normalizer.builder.into_module())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{
        Binding, BindingBlock, DataType, Function, Operator, StructInfo, TensorDesc, Var,
        infer_unary,
    };

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

    #[test]
    fn test_stale_descriptors_are_reinferred() {
        let mut registry = OperatorRegistry::new();
        registry.register("exp", ExpOp);

        let x = Var::new("x", TensorDesc::fixed(&[3], DataType::F32));
        let y = Var::new("y", StructInfo::Object);
        let z = Var::new("z", StructInfo::Object);
        let func = Function::new(
            vec![x.clone()],
            vec![BindingBlock::dataflow(vec![
                Binding::Var {
                    var: y.clone(),
                    value: Call::op("exp", vec![Expr::var(&x)]).into(),
                },
                Binding::Var {
                    var: z.clone(),
                    value: Call::op("exp", vec![Expr::var(&y)]).into(),
                },
            ])],
            Expr::var(&z),
        );
        let mut module = IrModule::new();
        module.add("main", ModuleFunc::Graph(func)).unwrap();

        let out = NormalizePass.run(&module, &registry).unwrap();
        let main = out.function("main").unwrap();
        let expected: StructInfo = TensorDesc::fixed(&[3], DataType::F32).into();

        for binding in main.body.bindings() {
            assert_eq!(binding.var().unwrap().struct_info(), &expected);
        }
        assert_eq!(main.ret_info, expected);
        // The second call now reads the re-bound variable.
        let second = main.body.bindings().nth(1).unwrap().value();
        let second = second.as_call().unwrap();
        assert_eq!(
            second.args[0].as_var(),
            main.body.bindings().next().unwrap().var()
        );
    }
}
