//! Descriptor inference through the core operator registry.

mod common;

use common::*;
use tessera_core::{
    BlockBuilder, Call, Error, Expr, OperatorRegistry, StructInfo, SymbolicExpr, TensorDesc,
    TensorShape,
};

/// Emit `call` into a fresh block and return the inferred descriptor.
fn infer(registry: &OperatorRegistry, call: Call) -> tessera_core::Result<StructInfo> {
    let mut bb = BlockBuilder::new(registry);
    bb.begin_block(true);
    let var = bb.emit(call.into(), "out")?;
    Ok(var.struct_info().clone())
}

/// Shorthand for a list of literal dimensions.
fn lits(dims: &[i64]) -> Vec<SymbolicExpr> {
    dims.iter().map(|&d| SymbolicExpr::lit(d)).collect()
}

#[test]
fn test_registry_contents() {
    let registry = core_operator_registry();
    for name in [
        "exp",
        "isnan",
        "add",
        "less",
        "sum",
        "mean",
        "transpose",
        "max_pool2d",
        "avg_pool2d",
        "nll_loss_backward",
        "take_backward",
        "call_tir",
    ] {
        assert!(registry.contains(name), "missing operator {name}");
    }
    assert_eq!(registry.get("take_backward").unwrap().num_inputs(), 3);
}

#[test]
fn test_chain_of_inferred_descriptors() {
    let registry = core_operator_registry();
    let mut bb = tessera_core::BlockBuilder::new(&registry);

    let x = tensor("x", TensorDesc::fixed(&[4, 1, 3], DataType::F32));
    let y = tensor("y", TensorDesc::fixed(&[1, 5, 3], DataType::F32));

    bb.begin_block(true);
    let sum = bb.emit(Call::op("add", vec![x, y]).into(), "sum").unwrap();
    let t = bb
        .emit(
            Call::op("transpose", vec![Expr::var(&sum)])
                .with_attr("axes", AttrValue::Ints(vec![2, 0, 1]))
                .into(),
            "t",
        )
        .unwrap();
    let m = bb
        .emit(
            Call::op("mean", vec![Expr::var(&t)])
                .with_attr("axes", AttrValue::Ints(vec![0]))
                .into(),
            "m",
        )
        .unwrap();
    let block = bb.end_block().unwrap();

    assert_eq!(block.bindings.len(), 3);
    assert_eq!(
        sum.struct_info(),
        &TensorDesc::fixed(&[4, 5, 3], DataType::F32).into()
    );
    assert_eq!(
        t.struct_info(),
        &TensorDesc::fixed(&[3, 4, 5], DataType::F32).into()
    );
    assert_eq!(
        m.struct_info(),
        &TensorDesc::fixed(&[4, 5], DataType::F32).into()
    );
}

#[test]
fn test_symbolic_broadcast_is_soft() {
    let registry = core_operator_registry();
    let n = SymbolicExpr::var("n");
    let x = tensor(
        "x",
        TensorDesc::symbolic(vec![SymbolicExpr::lit(4), n], DataType::F32),
    );
    let y = tensor("y", TensorDesc::fixed(&[4, 5], DataType::F32));

    let info = infer(&registry, Call::op("add", vec![x, y])).unwrap();
    assert_eq!(
        info,
        TensorDesc::new(TensorShape::Rank(2), Some(DataType::F32)).into()
    );
}

#[test]
fn test_arity_and_type_errors() {
    let registry = core_operator_registry();
    let x = tensor("x", TensorDesc::fixed(&[2], DataType::F32));

    let err = infer(&registry, Call::op("add", vec![x.clone()])).unwrap_err();
    assert!(matches!(
        err,
        Error::ArityMismatch {
            expected: 2,
            actual: 1,
            ..
        }
    ));
    assert!(err.to_string().contains("add(x)"));

    let shape = Expr::shape(lits(&[2]));
    let err = infer(&registry, Call::op("add", vec![x, shape])).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { index: 1, .. }));
}

#[test]
fn test_pooling_then_gradient() {
    let registry = core_operator_registry();
    let data_desc = TensorDesc::fixed(&[1, 8, 8, 3], DataType::F32);
    let data = tensor("data", data_desc.clone());

    let pooled = infer(
        &registry,
        Call::op("max_pool2d", vec![data.clone()])
            .with_attr("pool_size", AttrValue::Ints(vec![2]))
            .with_attr("strides", AttrValue::Ints(vec![2]))
            .with_attr("layout", AttrValue::Str("NHWC".to_string())),
    )
    .unwrap();
    assert_eq!(
        pooled,
        TensorDesc::fixed(&[1, 4, 4, 3], DataType::F32).into()
    );

    let grad = tensor("grad", pooled.as_tensor().unwrap().clone());
    let info = infer(&registry, Call::op("max_pool2d_backward", vec![grad, data])).unwrap();
    assert_eq!(info, data_desc.into());
}

#[test]
fn test_zero_stride_pooling_is_rejected() {
    let registry = core_operator_registry();
    let data = tensor("data", TensorDesc::fixed(&[1, 3, 8, 8], DataType::F32));
    let call = Call::op("max_pool2d", vec![data])
        .with_attr("pool_size", AttrValue::Ints(vec![2]))
        .with_attr("strides", AttrValue::Ints(vec![0]));

    let err = infer(&registry, call).unwrap_err();
    assert!(matches!(err, Error::Attribute(ref msg) if msg.contains("strides")));
}
