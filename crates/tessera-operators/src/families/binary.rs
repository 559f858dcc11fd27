//! Binary broadcasting operator family.
//!
//! Covers: add, subtract, multiply, divide, floor_divide, less, greater, equal

use crate::helpers::kernel_call;
use std::sync::Arc;
use tessera_core::{
    ArgSpec, Attrs, BlockBuilder, Call, DataType, LegalizeFn, Operator, Result, StructInfo,
    TensorDesc, TensorShape, infer_binary_dtype, infer_broadcast_shape, input_tensor_descs,
};

const ARGS: &[ArgSpec] = &[
    ArgSpec::tensor("x1", "The first input tensor."),
    ArgSpec::tensor("x2", "The second input tensor."),
];

/// Binary broadcasting operator family.
///
/// All members share the same structure:
/// - Two input tensors with matching dtypes
/// - Output shape = NumPy broadcast of the input shapes
///
/// Comparison members produce a boolean tensor.
pub struct BinaryOp {
    name: &'static str,
    is_comparison: bool,
}

impl BinaryOp {
    fn arith(name: &'static str) -> Self {
        Self {
            name,
            is_comparison: false,
        }
    }

    fn comparison(name: &'static str) -> Self {
        Self {
            name,
            is_comparison: true,
        }
    }

    pub fn add() -> Self {
        Self::arith("add")
    }

    pub fn subtract() -> Self {
        Self::arith("subtract")
    }

    pub fn multiply() -> Self {
        Self::arith("multiply")
    }

    pub fn divide() -> Self {
        Self::arith("divide")
    }

    pub fn floor_divide() -> Self {
        Self::arith("floor_divide")
    }

    pub fn less() -> Self {
        Self::comparison("less")
    }

    pub fn greater() -> Self {
        Self::comparison("greater")
    }

    pub fn equal() -> Self {
        Self::comparison("equal")
    }

    fn infer(call: &Call, is_comparison: bool) -> Result<StructInfo> {
        let inputs = input_tensor_descs(call, 2)?;
        let (x1, x2) = (&inputs[0], &inputs[1]);

        let dtype = infer_binary_dtype(call, x1, x2)?;
        let dtype = if is_comparison {
            Some(DataType::Bool)
        } else {
            dtype
        };

        let shape = match (x1.shape.dims(), x2.shape.dims()) {
            (Some(a), Some(b)) => match infer_broadcast_shape(call, a, b)? {
                Some(dims) => TensorShape::Known(dims),
                None => TensorShape::Rank(a.len().max(b.len())),
            },
            _ => match (x1.ndim(), x2.ndim()) {
                (Some(a), Some(b)) => TensorShape::Rank(a.max(b)),
                _ => TensorShape::Unknown,
            },
        };

        Ok(TensorDesc::new(shape, dtype).into())
    }
}

impl Operator for BinaryOp {
    fn name(&self) -> &str {
        self.name
    }

    fn num_inputs(&self) -> usize {
        2
    }

    fn arguments(&self) -> &[ArgSpec] {
        ARGS
    }

    fn infer_struct_info(&self, call: &Call) -> Result<StructInfo> {
        Self::infer(call, self.is_comparison)
    }

    fn legalizer(&self) -> Option<LegalizeFn> {
        let (kernel, is_comparison) = (self.name, self.is_comparison);
        Some(Arc::new(move |_bb: &mut BlockBuilder<'_>, call: &Call| {
            let out = Self::infer(call, is_comparison)?;
            Ok(kernel_call(kernel, call.args.clone(), Attrs::new(), out))
        }))
    }
}
