//! Reduction operator family.
//!
//! Covers: sum, mean

use crate::helpers::{attr_bool, attr_ints, kernel_call};
use std::sync::Arc;
use tessera_core::{
    ArgSpec, AttrValue, Attrs, BlockBuilder, Call, Error, Expr, LegalizeFn, Operator, Result,
    StructInfo, SymbolicExpr, TensorDesc, TensorShape, input_tensor_descs, normalize_axes,
};

const ARGS: &[ArgSpec] = &[ArgSpec::tensor("data", "The input tensor.")];

/// Reduction operator family.
///
/// Attributes:
/// - `axes`: axes to reduce (all axes when absent)
/// - `keepdims`: keep reduced axes as size-1 dimensions (default `false`)
///
/// `sum` legalizes to a single `sum` kernel. `mean` legalizes to a `sum`
/// kernel followed by a `divide` kernel over the number of reduced elements.
pub struct ReductionOp {
    name: &'static str,
}

impl ReductionOp {
    pub fn sum() -> Self {
        Self { name: "sum" }
    }

    pub fn mean() -> Self {
        Self { name: "mean" }
    }

    /// Normalized reduction axes and the `keepdims` flag.
    fn reduce_params(call: &Call, ndim: usize) -> Result<(Vec<usize>, bool)> {
        let keepdims = attr_bool(call, "keepdims", false)?;
        let axes = match attr_ints(call, "axes")? {
            Some(axes) => normalize_axes(call, ndim, &axes)?,
            None => (0..ndim).collect(),
        };
        Ok((axes, keepdims))
    }

    fn infer(call: &Call) -> Result<StructInfo> {
        let mut inputs = input_tensor_descs(call, 1)?;
        let data = inputs.remove(0);

        let Some(ndim) = data.ndim() else {
            return Ok(TensorDesc::new(TensorShape::Unknown, data.dtype).into());
        };
        let (axes, keepdims) = Self::reduce_params(call, ndim)?;

        let shape = match data.shape.dims() {
            Some(dims) => TensorShape::Known(
                dims.iter()
                    .enumerate()
                    .filter_map(|(i, d)| match (axes.contains(&i), keepdims) {
                        (false, _) => Some(d.clone()),
                        (true, true) => Some(SymbolicExpr::lit(1)),
                        (true, false) => None,
                    })
                    .collect(),
            ),
            None if keepdims => TensorShape::Rank(ndim),
            None => TensorShape::Rank(ndim - axes.len()),
        };

        Ok(TensorDesc::new(shape, data.dtype).into())
    }

    fn kernel_attrs(axes: &[usize], keepdims: bool) -> Attrs {
        let mut attrs = Attrs::new();
        attrs.insert(
            "axes".to_string(),
            AttrValue::Ints(axes.iter().map(|&a| a as i64).collect()),
        );
        attrs.insert("keepdims".to_string(), AttrValue::Bool(keepdims));
        attrs
    }

    fn legalize_sum(call: &Call) -> Result<Expr> {
        let out = Self::infer(call)?;
        let ndim = input_tensor_descs(call, 1)?[0].ndim().unwrap_or(0);
        let (axes, keepdims) = Self::reduce_params(call, ndim)?;
        Ok(kernel_call(
            "sum",
            call.args.clone(),
            Self::kernel_attrs(&axes, keepdims),
            out,
        ))
    }

    fn legalize_mean(bb: &mut BlockBuilder<'_>, call: &Call) -> Result<Expr> {
        let data = input_tensor_descs(call, 1)?.remove(0);
        let dims = data
            .shape
            .as_static()
            .ok_or_else(|| Error::InvalidIr(format!("{call}: mean requires a static shape")))?;
        let (axes, keepdims) = Self::reduce_params(call, dims.len())?;
        let count: i64 = axes.iter().map(|&a| dims[a]).product();

        let out = Self::infer(call)?;
        let sum = bb.emit(
            kernel_call(
                "sum",
                call.args.clone(),
                Self::kernel_attrs(&axes, keepdims),
                out.clone(),
            ),
            "sum",
        )?;

        let mut attrs = Attrs::new();
        attrs.insert("divisor".to_string(), AttrValue::Int(count));
        Ok(kernel_call("divide", vec![Expr::var(&sum)], attrs, out))
    }
}

impl Operator for ReductionOp {
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
        match self.name {
            "mean" => Some(Arc::new(Self::legalize_mean)),
            _ => Some(Arc::new(|_bb: &mut BlockBuilder<'_>, call: &Call| {
                Self::legalize_sum(call)
            })),
        }
    }
}
