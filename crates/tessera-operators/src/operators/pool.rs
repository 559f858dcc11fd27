//! 2-D pooling operators.
//!
//! Covers: max_pool2d, avg_pool2d

use crate::helpers::{attr_bool, attr_ints, attr_str, kernel_call};
use std::sync::Arc;
use tessera_core::{
    ArgSpec, BlockBuilder, Call, Error, Expr, LegalizeFn, Operator, Result, StructInfo,
    SymbolicExpr, TensorDesc, TensorShape, check_layout_convertible, check_rank_and_extract_shape,
    complete_padding_2d, input_tensor_descs,
};

const ARGS: &[ArgSpec] = &[ArgSpec::tensor("data", "The input tensor.")];

/// Spatial layout every pooling computation is carried out in.
const CANONICAL_LAYOUT: &str = "NCHW";

/// 2-D pooling over the H and W axes of the input.
///
/// Attributes:
/// - `pool_size`: window size, 1 or 2 values (required)
/// - `strides`, `dilation`: 1 or 2 values (default 1)
/// - `padding`: 1, 2 or 4 values, `(top, left, bottom, right)` (default 0)
/// - `ceil_mode`: round the output size up (default `false`)
/// - `layout`: input layout convertible to `NCHW` (default `NCHW`)
/// - `out_layout`: output layout (default = `layout`)
pub struct Pool2dOp {
    name: &'static str,
}

struct PoolParams {
    pool_size: [i64; 2],
    strides: [i64; 2],
    dilation: [i64; 2],
    padding: Vec<i64>,
    ceil_mode: bool,
}

fn pair(call: &Call, key: &str, default: Option<i64>) -> Result<[i64; 2]> {
    let values = match (attr_ints(call, key)?, default) {
        (Some(values), _) => values,
        (None, Some(d)) => vec![d],
        (None, None) => {
            return Err(Error::Attribute(format!("{call}: missing required attribute '{key}'")));
        }
    };
    let pair = match values.as_slice() {
        [v] => [*v, *v],
        [a, b] => [*a, *b],
        _ => {
            return Err(Error::Attribute(format!(
                "{call}: attribute '{key}' must have 1 or 2 values, got {values:?}"
            )));
        }
    };
    if pair.iter().any(|v| *v < 1) {
        return Err(Error::Attribute(format!(
            "{call}: attribute '{key}' must be positive, got {values:?}"
        )));
    }
    Ok(pair)
}

fn overflow(call: &Call) -> Error {
    Error::Attribute(format!("{call}: pooling window size overflows"))
}

impl Pool2dOp {
    pub fn max_pool2d() -> Self {
        Self { name: "max_pool2d" }
    }

    pub fn avg_pool2d() -> Self {
        Self { name: "avg_pool2d" }
    }

    fn params(call: &Call) -> Result<PoolParams> {
        let padding = attr_ints(call, "padding")?.unwrap_or_else(|| vec![0]);
        let padding = complete_padding_2d(call, &padding)?;
        if padding.iter().any(|p| *p < 0) {
            return Err(Error::Attribute(format!(
                "{call}: attribute 'padding' must not be negative, got {padding:?}"
            )));
        }
        Ok(PoolParams {
            pool_size: pair(call, "pool_size", None)?,
            strides: pair(call, "strides", Some(1))?,
            dilation: pair(call, "dilation", Some(1))?,
            padding,
            ceil_mode: attr_bool(call, "ceil_mode", false)?,
        })
    }

    /// Output extent of one spatial axis.
    fn out_extent(
        call: &Call,
        input: &SymbolicExpr,
        axis: usize,
        p: &PoolParams,
    ) -> Result<SymbolicExpr> {
        // padding is (top, left, bottom, right); axis 0 is H, axis 1 is W
        let pad = p.padding[axis]
            .checked_add(p.padding[axis + 2])
            .ok_or_else(|| overflow(call))?;
        let window = (p.pool_size[axis] - 1)
            .checked_mul(p.dilation[axis])
            .and_then(|w| w.checked_add(1))
            .ok_or_else(|| overflow(call))?;
        let mut numerator = input
            .clone()
            .add(SymbolicExpr::lit(pad))
            .sub(SymbolicExpr::lit(window));
        if p.ceil_mode {
            numerator = numerator.add(SymbolicExpr::lit(p.strides[axis] - 1));
        }
        let out = numerator
            .div(SymbolicExpr::lit(p.strides[axis]))
            .add(SymbolicExpr::lit(1));
        Ok(out.try_fold().map_or(out, SymbolicExpr::Literal))
    }

    fn infer(call: &Call) -> Result<StructInfo> {
        let mut inputs = input_tensor_descs(call, 1)?;
        let data = inputs.remove(0);

        let layout = attr_str(call, "layout", CANONICAL_LAYOUT)?;
        let out_layout = attr_str(call, "out_layout", layout)?;
        let (data_layout, data2nchw) = check_layout_convertible(call, layout, CANONICAL_LAYOUT)?;
        let (out_layout, out2nchw) = check_layout_convertible(call, out_layout, CANONICAL_LAYOUT)?;
        let params = Self::params(call)?;

        let unknown_shape = || TensorDesc::new(TensorShape::Rank(out_layout.ndim()), data.dtype);
        let Some(shape) = check_rank_and_extract_shape(call, &data, &data_layout)? else {
            return Ok(unknown_shape().into());
        };
        let Some(mut nchw) = data2nchw.forward_shape(&shape) else {
            return Ok(unknown_shape().into());
        };

        nchw[2] = Self::out_extent(call, &nchw[2], 0, &params)?;
        nchw[3] = Self::out_extent(call, &nchw[3], 1, &params)?;

        match out2nchw.backward_shape(&nchw) {
            Some(dims) => Ok(TensorDesc::new(TensorShape::Known(dims), data.dtype).into()),
            None => Ok(unknown_shape().into()),
        }
    }
}

impl Operator for Pool2dOp {
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
        Self::infer(call)
    }

    fn legalizer(&self) -> Option<LegalizeFn> {
        let kernel = self.name;
        Some(Arc::new(move |_bb: &mut BlockBuilder<'_>, call: &Call| -> Result<Expr> {
            let out = Self::infer(call)?;
            Ok(kernel_call(kernel, call.args.clone(), call.attrs.clone(), out))
        }))
    }
}
