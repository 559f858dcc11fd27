//! Descriptor utilities shared by operator inference callbacks.
//!
//! Every function here is pure. Failures carry the offending call.

use crate::ir::Call;
use crate::types::{DataType, StructInfo, TensorDesc};
use crate::{Error, Result};

fn boxed(call: &Call) -> Box<Call> {
    Box::new(call.clone())
}

/// Check the call's arity and return the tensor descriptor of every input.
///
/// Fails with `ArityMismatch` when the argument count differs from
/// `num_inputs`, and with `TypeMismatch` when an argument is not a tensor.
pub fn input_tensor_descs(call: &Call, num_inputs: usize) -> Result<Vec<TensorDesc>> {
    if call.args.len() != num_inputs {
        return Err(Error::ArityMismatch {
            call: boxed(call),
            expected: num_inputs,
            actual: call.args.len(),
        });
    }

    call.args
        .iter()
        .enumerate()
        .map(|(index, arg)| match arg.struct_info() {
            Some(StructInfo::Tensor(desc)) => Ok(desc.clone()),
            other => Err(Error::TypeMismatch {
                call: boxed(call),
                index,
                found: other.map_or("Object", StructInfo::kind),
            }),
        })
        .collect()
}

/// Infer the result of a shape-preserving unary elementwise operator.
///
/// With `require_float`, a known non-float input dtype is rejected.
pub fn infer_unary(call: &Call, require_float: bool) -> Result<StructInfo> {
    let mut inputs = input_tensor_descs(call, 1)?;
    let input = inputs.remove(0);

    if let Some(dtype) = input.dtype.filter(|d| require_float && !d.is_float()) {
        return Err(Error::DtypeMismatch {
            call: boxed(call),
            message: format!("requires a float input, got {dtype}"),
        });
    }

    Ok(StructInfo::Tensor(input))
}

/// Infer the element type of a binary operator's result.
///
/// Unknown when either side is unknown; otherwise both sides must agree.
pub fn infer_binary_dtype(
    call: &Call,
    x1: &TensorDesc,
    x2: &TensorDesc,
) -> Result<Option<DataType>> {
    match (x1.dtype, x2.dtype) {
        (Some(a), Some(b)) if a != b => Err(Error::DtypeMismatch {
            call: boxed(call),
            message: format!("operand dtypes must match, got {a} and {b}"),
        }),
        (Some(a), Some(_)) => Ok(Some(a)),
        _ => Ok(None),
    }
}

/// Normalize a single axis into `[0, ndim)`.
pub fn normalize_axis(call: &Call, ndim: usize, axis: i64) -> Result<usize> {
    let rank = ndim as i64;
    let normalized = if axis < 0 { axis + rank } else { axis };
    if !(0..rank).contains(&normalized) {
        return Err(Error::AxisOutOfRange {
            call: boxed(call),
            axis,
            ndim,
        });
    }
    Ok(normalized as usize)
}

/// Normalize a list of axes into `[0, ndim)`, rejecting duplicates.
pub fn normalize_axes(call: &Call, ndim: usize, axes: &[i64]) -> Result<Vec<usize>> {
    let mut seen = vec![false; ndim];
    let mut result = Vec::with_capacity(axes.len());

    for &axis in axes {
        let normalized = normalize_axis(call, ndim, axis)?;
        if std::mem::replace(&mut seen[normalized], true) {
            return Err(Error::DuplicateAxis {
                call: boxed(call),
                axis: normalized,
            });
        }
        result.push(normalized);
    }

    Ok(result)
}

/// Expand 2-D padding to `(top, left, bottom, right)`.
///
/// - `[p]` -> `[p, p, p, p]`
/// - `[a, b]` -> `[a, b, a, b]`
/// - `[a, b, c, d]` -> unchanged
pub fn complete_padding_2d<T: Clone>(call: &Call, padding: &[T]) -> Result<Vec<T>> {
    match padding {
        [p] => Ok(vec![p.clone(), p.clone(), p.clone(), p.clone()]),
        [a, b] => Ok(vec![a.clone(), b.clone(), a.clone(), b.clone()]),
        [_, _, _, _] => Ok(padding.to_vec()),
        _ => Err(Error::InvalidPaddingLength {
            call: boxed(call),
            len: padding.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Expr, Var};
    use crate::types::TensorShape;

    fn call_with(args: &[StructInfo]) -> Call {
        let args = args
            .iter()
            .enumerate()
            .map(|(i, info)| Expr::var(&Var::new(format!("x{i}"), info.clone())))
            .collect();
        Call::op("test", args)
    }

    #[test]
    fn test_input_tensor_descs() {
        let desc = TensorDesc::fixed(&[2, 3], DataType::F32);
        let call = call_with(&[desc.clone().into()]);
        assert_eq!(input_tensor_descs(&call, 1).unwrap(), vec![desc]);
    }

    #[test]
    fn test_arity_mismatch() {
        let call = call_with(&[TensorDesc::fixed(&[2], DataType::F32).into()]);
        let err = input_tensor_descs(&call, 2).unwrap_err();
        assert!(matches!(
            err,
            Error::ArityMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
        assert!(err.call().is_some());
    }

    #[test]
    fn test_type_mismatch() {
        let call = call_with(&[
            TensorDesc::fixed(&[2], DataType::F32).into(),
            StructInfo::shape_of(vec![]),
        ]);
        let err = input_tensor_descs(&call, 2).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                index: 1,
                found: "Shape",
                ..
            }
        ));
    }

    #[test]
    fn test_infer_unary() {
        let float = call_with(&[TensorDesc::fixed(&[4], DataType::F32).into()]);
        assert_eq!(
            infer_unary(&float, true).unwrap(),
            TensorDesc::fixed(&[4], DataType::F32).into()
        );

        let int = call_with(&[TensorDesc::fixed(&[4], DataType::I32).into()]);
        assert!(matches!(
            infer_unary(&int, true).unwrap_err(),
            Error::DtypeMismatch { .. }
        ));
        assert!(infer_unary(&int, false).is_ok());

        // Unknown dtype passes the float check.
        let unknown = call_with(&[TensorDesc::new(TensorShape::Unknown, None).into()]);
        assert!(infer_unary(&unknown, true).is_ok());
    }

    #[test]
    fn test_infer_binary_dtype() {
        let call = call_with(&[]);
        let f32 = TensorDesc::fixed(&[1], DataType::F32);
        let i32 = TensorDesc::fixed(&[1], DataType::I32);
        let unknown = TensorDesc::new(TensorShape::Unknown, None);

        assert_eq!(
            infer_binary_dtype(&call, &f32, &f32).unwrap(),
            Some(DataType::F32)
        );
        assert_eq!(infer_binary_dtype(&call, &f32, &unknown).unwrap(), None);
        assert!(infer_binary_dtype(&call, &f32, &i32).is_err());
    }

    #[test]
    fn test_normalize_axes() {
        let call = call_with(&[]);
        assert_eq!(normalize_axes(&call, 4, &[-1]).unwrap(), vec![3]);
        assert_eq!(normalize_axes(&call, 3, &[0, -1]).unwrap(), vec![0, 2]);
        assert!(matches!(
            normalize_axes(&call, 3, &[1, 1]).unwrap_err(),
            Error::DuplicateAxis { axis: 1, .. }
        ));
        assert!(matches!(
            normalize_axes(&call, 3, &[1, -2]).unwrap_err(),
            Error::DuplicateAxis { axis: 1, .. }
        ));
        assert!(matches!(
            normalize_axes(&call, 3, &[5]).unwrap_err(),
            Error::AxisOutOfRange {
                axis: 5,
                ndim: 3,
                ..
            }
        ));
        assert!(normalize_axis(&call, 3, -4).is_err());
    }

    #[test]
    fn test_complete_padding_2d() {
        let call = call_with(&[]);
        assert_eq!(complete_padding_2d(&call, &[1]).unwrap(), vec![1, 1, 1, 1]);
        assert_eq!(
            complete_padding_2d(&call, &[1, 2]).unwrap(),
            vec![1, 2, 1, 2]
        );
        assert_eq!(
            complete_padding_2d(&call, &[1, 2, 3, 4]).unwrap(),
            vec![1, 2, 3, 4]
        );

        let err = complete_padding_2d(&call, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidPaddingLength { len: 3, .. }));
        assert_eq!(err.call(), Some(&call));
        assert!(complete_padding_2d::<i64>(&call, &[]).is_err());
    }
}
