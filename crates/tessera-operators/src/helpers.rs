//! Helper functions for operator implementation.

use tessera_core::{
    AttrValue, Attrs, CALL_TIR_OP, Call, Callee, Error, Expr, ExprKind, Result, StructInfo,
};

fn attr_error(call: &Call, key: &str, expected: &str, found: &AttrValue) -> Error {
    Error::Attribute(format!(
        "{}: attribute '{key}' must be {expected}, got {found:?}",
        call.callee_name()
    ))
}

/// Read an integer-list attribute; `None` if absent.
pub fn attr_ints(call: &Call, key: &str) -> Result<Option<Vec<i64>>> {
    match call.attr(key) {
        None => Ok(None),
        Some(AttrValue::Ints(v)) => Ok(Some(v.clone())),
        Some(AttrValue::Int(v)) => Ok(Some(vec![*v])),
        Some(other) => Err(attr_error(call, key, "a list of integers", other)),
    }
}

/// Read a boolean attribute, falling back to `default` if absent.
pub fn attr_bool(call: &Call, key: &str, default: bool) -> Result<bool> {
    match call.attr(key) {
        None => Ok(default),
        Some(AttrValue::Bool(b)) => Ok(*b),
        Some(other) => Err(attr_error(call, key, "a boolean", other)),
    }
}

/// Read a string attribute, falling back to `default` if absent.
pub fn attr_str<'a>(call: &'a Call, key: &str, default: &'a str) -> Result<&'a str> {
    match call.attr(key) {
        None => Ok(default),
        Some(AttrValue::Str(s)) => Ok(s),
        Some(other) => Err(attr_error(call, key, "a string", other)),
    }
}

/// Build a call to a backend kernel.
///
/// The kernel arguments are packed into a tuple, the kernel is named by the
/// `kernel` attribute and the result descriptor is declared up front.
pub fn kernel_call(kernel: &str, args: Vec<Expr>, mut attrs: Attrs, out: StructInfo) -> Expr {
    attrs.insert("kernel".to_string(), AttrValue::Str(kernel.to_string()));
    let call = Call {
        callee: Callee::Op(CALL_TIR_OP.to_string()),
        args: vec![Expr::tuple(args)],
        attrs,
        sinfo_args: vec![out.clone()],
    };
    Expr::annotated(ExprKind::Call(call), out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{DataType, TensorDesc, Var};

    #[test]
    fn test_attr_readers() {
        let call = Call::op("sum", vec![])
            .with_attr("axes", AttrValue::Ints(vec![0, 1]))
            .with_attr("keepdims", AttrValue::Bool(true))
            .with_attr("layout", AttrValue::Str("NHWC".to_string()));

        assert_eq!(attr_ints(&call, "axes").unwrap(), Some(vec![0, 1]));
        assert_eq!(attr_ints(&call, "missing").unwrap(), None);
        assert!(attr_bool(&call, "keepdims", false).unwrap());
        assert!(!attr_bool(&call, "missing", false).unwrap());
        assert_eq!(attr_str(&call, "layout", "NCHW").unwrap(), "NHWC");
        assert!(matches!(
            attr_bool(&call, "axes", false).unwrap_err(),
            Error::Attribute(_)
        ));
    }

    #[test]
    fn test_kernel_call() {
        let x = Var::new("x", TensorDesc::fixed(&[2], DataType::F32));
        let out: StructInfo = TensorDesc::fixed(&[2], DataType::F32).into();
        let expr = kernel_call("exp", vec![Expr::var(&x)], Attrs::new(), out.clone());

        let call = expr.as_call().unwrap();
        assert_eq!(call.op_name(), Some(CALL_TIR_OP));
        assert_eq!(
            call.attr("kernel"),
            Some(&AttrValue::Str("exp".to_string()))
        );
        assert_eq!(call.sinfo_args, vec![out.clone()]);
        assert_eq!(expr.struct_info(), Some(&out));
    }
}
