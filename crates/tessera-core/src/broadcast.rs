//! Broadcasting shape helper for binary elementwise operators.

use crate::ir::Call;
use crate::symbolic_expr::SymbolicExpr;
use crate::{Error, Result};

/// Compute the NumPy-style broadcast output shape of two symbolic shapes.
///
/// Implements NumPy broadcasting rules:
/// - Shapes are aligned from the rightmost dimension
/// - Dimensions match if they are equal or one of them is 1
/// - Missing dimensions in shorter shapes are treated as 1
///
/// Two symbolic dimensions are equal only when they are structurally
/// identical. When any output dimension cannot be determined (e.g. `n` vs
/// `5`), the result is `Ok(None)`: no partial shape is ever returned.
/// Literal mismatches are errors.
///
/// # Example
///
/// ```text
/// [4, 1, 3] with [1, 5, 3] -> Some([4, 5, 3])
/// [4, n]    with [5]       -> None
/// [4, 2]    with [4, 3]    -> ShapeBroadcastError
/// ```
pub fn infer_broadcast_shape(
    call: &Call,
    a: &[SymbolicExpr],
    b: &[SymbolicExpr],
) -> Result<Option<Vec<SymbolicExpr>>> {
    let max_rank = a.len().max(b.len());
    let one = SymbolicExpr::Literal(1);
    let mut result = Vec::with_capacity(max_rank);
    let mut determined = true;

    for i in 0..max_rank {
        let da = if i < max_rank - a.len() {
            &one
        } else {
            &a[i - (max_rank - a.len())]
        };
        let db = if i < max_rank - b.len() {
            &one
        } else {
            &b[i - (max_rank - b.len())]
        };

        if da == db {
            result.push(da.clone());
        } else if *da == one {
            result.push(db.clone());
        } else if *db == one {
            result.push(da.clone());
        } else {
            match (da.as_literal(), db.as_literal()) {
                (Some(lhs), Some(rhs)) => {
                    return Err(Error::ShapeBroadcastError {
                        call: Box::new(call.clone()),
                        dim: i,
                        lhs,
                        rhs,
                    });
                }
                // Keep scanning: a later literal mismatch is still an error.
                _ => determined = false,
            }
        }
    }

    Ok(determined.then_some(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lits(dims: &[i64]) -> Vec<SymbolicExpr> {
        dims.iter().map(|&d| SymbolicExpr::lit(d)).collect()
    }

    fn call() -> Call {
        Call::op("add", vec![])
    }

    #[test]
    fn test_broadcast_same_shape() {
        assert_eq!(
            infer_broadcast_shape(&call(), &lits(&[2, 3, 4]), &lits(&[2, 3, 4])).unwrap(),
            Some(lits(&[2, 3, 4]))
        );
    }

    #[test]
    fn test_broadcast_ones() {
        assert_eq!(
            infer_broadcast_shape(&call(), &lits(&[4, 1, 3]), &lits(&[1, 5, 3])).unwrap(),
            Some(lits(&[4, 5, 3]))
        );
    }

    #[test]
    fn test_broadcast_missing_dims() {
        assert_eq!(
            infer_broadcast_shape(&call(), &lits(&[8, 1, 6, 1]), &lits(&[7, 1, 5])).unwrap(),
            Some(lits(&[8, 7, 6, 5]))
        );
    }

    #[test]
    fn test_broadcast_incompatible() {
        let err = infer_broadcast_shape(&call(), &lits(&[4, 2]), &lits(&[4, 3])).unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeBroadcastError {
                dim: 1,
                lhs: 2,
                rhs: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_broadcast_symbolic_undetermined() {
        let a = vec![SymbolicExpr::lit(4), SymbolicExpr::var("n")];
        let out = infer_broadcast_shape(&call(), &a, &lits(&[4, 5])).unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn test_broadcast_symbolic_identical() {
        let a = vec![SymbolicExpr::var("n"), SymbolicExpr::lit(1)];
        let b = vec![SymbolicExpr::var("n"), SymbolicExpr::lit(3)];
        assert_eq!(
            infer_broadcast_shape(&call(), &a, &b).unwrap(),
            Some(vec![SymbolicExpr::var("n"), SymbolicExpr::lit(3)])
        );
    }
}
