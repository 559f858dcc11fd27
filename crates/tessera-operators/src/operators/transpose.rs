//! Transpose operator.

use crate::helpers::{attr_ints, kernel_call};
use std::sync::Arc;
use tessera_core::{
    ArgSpec, AttrValue, Attrs, BlockBuilder, Call, Error, Expr, LegalizeFn, Operator, Result,
    StructInfo, TensorDesc, TensorShape, input_tensor_descs, normalize_axes,
};

const ARGS: &[ArgSpec] = &[ArgSpec::tensor("x", "The input tensor.")];

/// Permutes the dimensions of a tensor.
///
/// The `axes` attribute lists, for every output dimension, the input
/// dimension it takes. Without it the dimensions are reversed.
pub struct TransposeOp;

impl TransposeOp {
    /// Normalized permutation for an input of rank `ndim`.
    fn permutation(call: &Call, ndim: usize) -> Result<Vec<usize>> {
        match attr_ints(call, "axes")? {
            None => Ok((0..ndim).rev().collect()),
            Some(axes) if axes.len() != ndim => Err(Error::Attribute(format!(
                "{call}: transpose axes {axes:?} must have one entry per dimension ({ndim})"
            ))),
            Some(axes) => normalize_axes(call, ndim, &axes),
        }
    }

    fn infer(call: &Call) -> Result<StructInfo> {
        let mut inputs = input_tensor_descs(call, 1)?;
        let x = inputs.remove(0);

        let Some(ndim) = x.ndim() else {
            return Ok(x.into());
        };
        let perm = Self::permutation(call, ndim)?;

        let shape = match x.shape.dims() {
            Some(dims) => TensorShape::Known(perm.iter().map(|&p| dims[p].clone()).collect()),
            None => TensorShape::Rank(ndim),
        };
        Ok(TensorDesc::new(shape, x.dtype).into())
    }

    fn legalize(_bb: &mut BlockBuilder<'_>, call: &Call) -> Result<Expr> {
        let out = Self::infer(call)?;
        let ndim = input_tensor_descs(call, 1)?[0].ndim().unwrap_or(0);
        let perm = Self::permutation(call, ndim)?;

        let mut attrs = Attrs::new();
        attrs.insert(
            "axes".to_string(),
            AttrValue::Ints(perm.iter().map(|&p| p as i64).collect()),
        );
        Ok(kernel_call("transpose", call.args.clone(), attrs, out))
    }
}

impl Operator for TransposeOp {
    fn name(&self) -> &str {
        "transpose"
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn arguments(&self) -> &[ArgSpec] {
        ARGS
    }

    fn infer_struct_info(&self, call: &Call) -> Result<StructInfo> {
        Self::infer(call)
    }

    fn legalizer(&self) -> Option<LegalizeFn> {
        Some(Arc::new(Self::legalize))
    }
}
