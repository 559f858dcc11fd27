//! Legalization over whole modules.

mod common;

use common::*;
use std::sync::Arc;
use tessera_compiler::LegalizeOps;
use tessera_core::{Binding, BindingBlock, CALL_TIR_OP, Error, Function, LegalizeFn, StructInfo};

fn unary_main(op: &str, desc: TensorDesc) -> tessera_core::IrModule {
    let registry = core_operator_registry();
    let x = Var::new("x", desc);
    let mut bb = BlockBuilder::new(&registry);
    bb.begin_block(true);
    let y = bb
        .emit(Call::op(op, vec![Expr::var(&x)]).into(), "y")
        .unwrap();
    let block = bb.end_block().unwrap();
    module_with_main(Function::new(vec![x], vec![block], Expr::var(&y)))
}

#[test]
fn test_static_call_is_replaced() {
    init_tracing();
    let registry = core_operator_registry();
    let module = unary_main("exp", TensorDesc::fixed(&[2, 3], DataType::F32));

    let (out, report) = LegalizeOps::new().legalize(&module, &registry).unwrap();
    assert!(report.is_clean());

    let main = main_of(&out);
    let value = main.body.bindings().next().unwrap().value();
    assert_eq!(value.as_call().unwrap().op_name(), Some(CALL_TIR_OP));
    assert_eq!(kernel_of(value), Some("exp"));
    assert_eq!(
        main.ret_info,
        TensorDesc::fixed(&[2, 3], DataType::F32).into()
    );

    // The input module is untouched.
    assert_eq!(callees(main_of(&module)), vec!["exp"]);
}

#[test]
fn test_unannotated_call_is_inferred_then_replaced() {
    let registry = core_operator_registry();
    let x = Var::new("x", TensorDesc::fixed(&[2, 3], DataType::F32));
    let y = Var::new("y", StructInfo::Object);
    let func = Function::new(
        vec![x.clone()],
        vec![BindingBlock::dataflow(vec![Binding::Var {
            var: y.clone(),
            value: Call::op("exp", vec![Expr::var(&x)]).into(),
        }])],
        Expr::var(&y),
    );
    let module = module_with_main(func);

    let (out, report) = LegalizeOps::new().legalize(&module, &registry).unwrap();
    assert!(report.is_clean());

    let main = main_of(&out);
    assert_eq!(callees(main), vec![CALL_TIR_OP]);
    let value = main.body.bindings().next().unwrap().value();
    assert_eq!(kernel_of(value), Some("exp"));
    assert_eq!(
        main.ret_info,
        TensorDesc::fixed(&[2, 3], DataType::F32).into()
    );
}

#[test]
fn test_symbolic_call_is_unchanged() {
    let registry = core_operator_registry();
    let n = SymbolicExpr::var("n");
    let module = unary_main(
        "exp",
        TensorDesc::symbolic(vec![n, SymbolicExpr::lit(3)], DataType::F32),
    );

    let (out, report) = LegalizeOps::new().legalize(&module, &registry).unwrap();
    assert!(report.is_clean());
    assert_eq!(main_of(&out), main_of(&module));
}

#[test]
fn test_mean_keeps_intermediate_sum() {
    let registry = core_operator_registry();
    let x = Var::new("x", TensorDesc::fixed(&[4, 6], DataType::F32));
    let mut bb = BlockBuilder::new(&registry);
    bb.begin_block(true);
    let m = bb
        .emit(
            Call::op("mean", vec![Expr::var(&x)])
                .with_attr("axes", AttrValue::Ints(vec![1]))
                .into(),
            "m",
        )
        .unwrap();
    let block = bb.end_block().unwrap();
    let module = module_with_main(Function::new(vec![x], vec![block], Expr::var(&m)));

    let (out, _) = LegalizeOps::new().legalize(&module, &registry).unwrap();
    let main = main_of(&out);
    let kernels: Vec<_> = main
        .body
        .bindings()
        .map(|b| kernel_of(b.value()).unwrap().to_string())
        .collect();
    assert_eq!(kernels, vec!["sum", "divide"]);
    assert!(main.body.blocks[0].dataflow);
}

#[test]
fn test_customization_overrides_registry_and_dead_code_is_removed() {
    let registry = core_operator_registry();
    let x = Var::new("x", TensorDesc::fixed(&[4], DataType::F32));
    let z = Var::new("z", TensorDesc::fixed(&[4], DataType::F32));

    let mut bb = BlockBuilder::new(&registry);
    bb.begin_block(true);
    let a = bb
        .emit(Call::op("exp", vec![Expr::var(&x)]).into(), "a")
        .unwrap();
    let add = Call::op("add", vec![Expr::var(&a), Expr::var(&z)]);
    let b = bb.emit(add.into(), "b").unwrap();
    let block = bb.end_block().unwrap();
    let module = module_with_main(Function::new(vec![x, z.clone()], vec![block], Expr::var(&b)));

    // Keep only the right-hand operand: `a` becomes dead.
    let keep_rhs: LegalizeFn =
        Arc::new(|_bb: &mut BlockBuilder<'_>, call: &Call| Ok(call.args[1].clone()));
    let pass = LegalizeOps::new().customize("add", keep_rhs);
    let (out, _) = pass.legalize(&module, &registry).unwrap();

    let main = main_of(&out);
    let bindings: Vec<_> = main.body.bindings().collect();
    assert_eq!(bindings.len(), 1);
    let Binding::Var { var, value } = bindings[0] else {
        panic!("expected a variable binding");
    };
    assert_eq!(var, &b);
    assert_eq!(value.as_var(), Some(&z));
}

#[test]
fn test_missing_legalization_is_a_warning() {
    let registry = core_operator_registry();
    let desc = TensorDesc::fixed(&[8], DataType::F32);
    let x = Var::new("x", desc.clone());

    let mut bb = BlockBuilder::new(&registry);
    bb.begin_block(true);
    let custom = bb
        .emit(
            Call::op("my_custom_op", vec![Expr::var(&x)])
                .with_sinfo(desc.clone().into())
                .into(),
            "custom",
        )
        .unwrap();
    let kernel = bb
        .emit(
            tessera_operators::kernel_call(
                "exp",
                vec![Expr::var(&custom)],
                Default::default(),
                desc.into(),
            ),
            "kernel",
        )
        .unwrap();
    let block = bb.end_block().unwrap();
    let module = module_with_main(Function::new(vec![x], vec![block], Expr::var(&kernel)));

    let (out, report) = LegalizeOps::new().legalize(&module, &registry).unwrap();

    // The kernel-call marker is already legal and does not warn.
    let missing: Vec<_> = report.missing_ops().collect();
    assert_eq!(missing, vec!["my_custom_op"]);
    assert!(report.warnings.iter().all(Error::is_warning));
    assert_eq!(callees(main_of(&out)), vec!["my_custom_op", CALL_TIR_OP]);
}

#[test]
fn test_callback_failure_aborts() {
    let registry = core_operator_registry();
    let module = unary_main("exp", TensorDesc::fixed(&[2], DataType::F32));

    let failing: LegalizeFn = Arc::new(|_bb: &mut BlockBuilder<'_>, _call: &Call| {
        Err(Error::Attribute("unsupported layout".to_string()))
    });
    let err = LegalizeOps::new()
        .customize("exp", failing)
        .legalize(&module, &registry)
        .unwrap_err();
    assert!(matches!(err, Error::Attribute(_)));
}
