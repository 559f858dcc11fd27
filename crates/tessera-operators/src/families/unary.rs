//! Unary elementwise operator family.
//!
//! Covers the arithmetic ops (abs, exp, sqrt, ...) and the check ops
//! (isfinite, isinf, isnan).

use crate::helpers::kernel_call;
use std::sync::Arc;
use tessera_core::{
    ArgSpec, Attrs, BlockBuilder, Call, DataType, LegalizeFn, Operator, Result, StructInfo,
    TensorDesc, infer_unary,
};

/// Arithmetic unary operators and whether each requires a float input.
pub const UNARY_ARITH_OPS: &[(&str, bool)] = &[
    ("abs", false),
    ("acos", true),
    ("acosh", true),
    ("asin", true),
    ("asinh", true),
    ("atan", true),
    ("atanh", true),
    ("ceil", false),
    ("cos", true),
    ("cosh", true),
    ("exp", true),
    ("floor", false),
    ("log", true),
    ("negative", false),
    ("round", false),
    ("sigmoid", true),
    ("sign", false),
    ("sin", true),
    ("sinh", true),
    ("square", true),
    ("sqrt", true),
    ("tan", true),
    ("tanh", true),
];

/// Check operators: same shape as the input, boolean result.
pub const UNARY_CHECK_OPS: &[&str] = &["isfinite", "isinf", "isnan"];

const ARGS: &[ArgSpec] = &[ArgSpec::tensor("x", "The input tensor.")];

/// Unary elementwise operator family.
///
/// All members share the same structure:
/// - Single input tensor
/// - Output shape = input shape
/// - Legalizes to the kernel of the same name
///
/// The differences are whether a float input is required and whether the
/// result is boolean.
pub struct UnaryOp {
    name: &'static str,
    require_float: bool,
    is_check: bool,
}

impl UnaryOp {
    /// Create an arithmetic unary operator.
    pub fn arith(name: &'static str, require_float: bool) -> Self {
        Self {
            name,
            require_float,
            is_check: false,
        }
    }

    /// Create a check operator returning a boolean tensor.
    pub fn check(name: &'static str) -> Self {
        Self {
            name,
            require_float: false,
            is_check: true,
        }
    }

    fn infer(call: &Call, require_float: bool, is_check: bool) -> Result<StructInfo> {
        let info = infer_unary(call, require_float)?;
        match info {
            StructInfo::Tensor(desc) if is_check => {
                Ok(TensorDesc::new(desc.shape, Some(DataType::Bool)).into())
            }
            other => Ok(other),
        }
    }
}

impl Operator for UnaryOp {
    fn name(&self) -> &str {
        self.name
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn arguments(&self) -> &[ArgSpec] {
        ARGS
    }

    fn infer_struct_info(&self, call: &Call) -> Result<StructInfo> {
        Self::infer(call, self.require_float, self.is_check)
    }

    fn legalizer(&self) -> Option<LegalizeFn> {
        let (kernel, require_float, is_check) = (self.name, self.require_float, self.is_check);
        Some(Arc::new(move |_bb: &mut BlockBuilder<'_>, call: &Call| {
            let out = Self::infer(call, require_float, is_check)?;
            Ok(kernel_call(kernel, call.args.clone(), Attrs::new(), out))
        }))
    }
}
