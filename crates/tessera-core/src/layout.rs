//! Named-axis tensor layouts and conversions between them.
//!
//! A layout string lists one letter per tensor dimension. Upper-case letters
//! are primal axes (`N`, `C`, `H`, `W`). A lower-case letter prefixed by a
//! factor is a split of the matching primal axis: `NCHW4c` stores `C` as
//! `C/4` blocks of 4 channels.

use crate::ir::Call;
use crate::symbolic_expr::SymbolicExpr;
use crate::types::TensorDesc;
use crate::{Error, Result};
use std::fmt;

/// One dimension of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutAxis {
    Primal(char),
    Split { factor: i64, name: char },
}

impl LayoutAxis {
    /// Upper-case name of the primal axis this axis belongs to.
    pub fn primal(&self) -> char {
        match self {
            LayoutAxis::Primal(c) => *c,
            LayoutAxis::Split { name, .. } => name.to_ascii_uppercase(),
        }
    }
}

/// A parsed layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Layout {
    name: String,
    axes: Vec<LayoutAxis>,
}

impl Layout {
    /// Parse a layout string such as `NCHW` or `NCHW4c`.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = |msg: String| Error::InvalidIr(format!("invalid layout '{name}': {msg}"));
        let mut axes = Vec::new();
        let mut factor: Option<i64> = None;

        for c in name.chars() {
            if let Some(d) = c.to_digit(10) {
                let f = factor.unwrap_or(0);
                factor = Some(
                    f.checked_mul(10)
                        .and_then(|f| f.checked_add(i64::from(d)))
                        .ok_or_else(|| invalid("split factor overflows".to_string()))?,
                );
            } else if c.is_ascii_uppercase() {
                if factor.is_some() {
                    return Err(invalid(format!("primal axis '{c}' cannot have a factor")));
                }
                axes.push(LayoutAxis::Primal(c));
            } else if c.is_ascii_lowercase() {
                match factor.take() {
                    Some(f) if f > 0 => axes.push(LayoutAxis::Split { factor: f, name: c }),
                    _ => return Err(invalid(format!("split axis '{c}' needs a positive factor"))),
                }
            } else {
                return Err(invalid(format!("unexpected character '{c}'")));
            }
        }

        if factor.is_some() {
            return Err(invalid("trailing split factor".to_string()));
        }

        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].contains(axis) {
                return Err(invalid(format!("axis {} appears twice", axis.primal())));
            }
            if matches!(axis, LayoutAxis::Split { .. })
                && !axes.contains(&LayoutAxis::Primal(axis.primal()))
            {
                return Err(invalid(format!(
                    "split axis of {} without the primal axis",
                    axis.primal()
                )));
            }
        }
        // Primal and split of the same letter may coexist, but not two splits.
        for (i, axis) in axes.iter().enumerate() {
            if let LayoutAxis::Split { name, .. } = axis
                && axes[..i]
                    .iter()
                    .any(|a| matches!(a, LayoutAxis::Split { name: n, .. } if n == name))
            {
                return Err(invalid(format!("axis {name} is split twice")));
            }
        }

        Ok(Self {
            name: name.to_string(),
            axes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn axes(&self) -> &[LayoutAxis] {
        &self.axes
    }

    /// Number of dimensions described by the layout.
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Position of the primal axis `c`.
    pub fn index_of(&self, c: char) -> Option<usize> {
        self.axes.iter().position(|a| *a == LayoutAxis::Primal(c))
    }

    /// Split factor of primal axis `c`, if it is split.
    fn split_factor(&self, c: char) -> Option<i64> {
        self.axes.iter().find_map(|a| match a {
            LayoutAxis::Split { factor, name } if name.to_ascii_uppercase() == c => Some(*factor),
            _ => None,
        })
    }

    fn primal_axes(&self) -> impl Iterator<Item = char> + '_ {
        self.axes.iter().filter_map(|a| match a {
            LayoutAxis::Primal(c) => Some(*c),
            LayoutAxis::Split { .. } => None,
        })
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A conversion between two layouts over the same primal axes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BijectiveLayout {
    src: Layout,
    dst: Layout,
}

impl BijectiveLayout {
    /// Build the conversion, or `None` when the primal axes differ.
    pub fn new(src: Layout, dst: Layout) -> Option<Self> {
        let mut a: Vec<char> = src.primal_axes().collect();
        let mut b: Vec<char> = dst.primal_axes().collect();
        a.sort_unstable();
        b.sort_unstable();
        (a == b).then_some(Self { src, dst })
    }

    pub fn src(&self) -> &Layout {
        &self.src
    }

    pub fn dst(&self) -> &Layout {
        &self.dst
    }

    /// Conversion in the opposite direction.
    pub fn inverse(&self) -> Self {
        Self {
            src: self.dst.clone(),
            dst: self.src.clone(),
        }
    }

    /// For every primal axis of the destination, its position in the source.
    pub fn primal_permutation(&self) -> Vec<usize> {
        self.dst
            .primal_axes()
            .filter_map(|c| self.src.index_of(c))
            .collect()
    }

    /// Convert a shape in the source layout to the destination layout.
    ///
    /// Returns `None` when the shape's rank does not match the source layout.
    pub fn forward_shape(&self, shape: &[SymbolicExpr]) -> Option<Vec<SymbolicExpr>> {
        if shape.len() != self.src.ndim() {
            return None;
        }

        self.dst
            .axes
            .iter()
            .map(|axis| match axis {
                LayoutAxis::Split { factor, .. } => Some(SymbolicExpr::lit(*factor)),
                LayoutAxis::Primal(c) => {
                    let mut extent = shape[self.src.index_of(*c)?].clone();
                    if let Some(f) = self.src.split_factor(*c) {
                        extent = fold(extent.mul(SymbolicExpr::lit(f)));
                    }
                    if let Some(f) = self.dst.split_factor(*c) {
                        extent = fold(extent.div(SymbolicExpr::lit(f)));
                    }
                    Some(extent)
                }
            })
            .collect()
    }

    /// Convert a shape in the destination layout back to the source layout.
    pub fn backward_shape(&self, shape: &[SymbolicExpr]) -> Option<Vec<SymbolicExpr>> {
        self.inverse().forward_shape(shape)
    }
}

fn fold(expr: SymbolicExpr) -> SymbolicExpr {
    expr.try_fold().map_or(expr, SymbolicExpr::Literal)
}

/// Check that `tensor_layout` converts to `target_layout`.
///
/// Returns the parsed tensor layout and the conversion to the target.
pub fn check_layout_convertible(
    call: &Call,
    tensor_layout: &str,
    target_layout: &str,
) -> Result<(Layout, BijectiveLayout)> {
    let incompatible = || Error::IncompatibleLayout {
        call: Box::new(call.clone()),
        source_layout: tensor_layout.to_string(),
        target_layout: target_layout.to_string(),
    };

    let src = Layout::parse(tensor_layout).map_err(|_| incompatible())?;
    let dst = Layout::parse(target_layout).map_err(|_| incompatible())?;
    let conversion = BijectiveLayout::new(src.clone(), dst).ok_or_else(incompatible)?;
    Ok((src, conversion))
}

/// Check a tensor's rank against a layout and return its dimensions.
///
/// Unknown rank passes the check. Returns `None` when the tensor's
/// dimensions are not described.
pub fn check_rank_and_extract_shape(
    call: &Call,
    desc: &TensorDesc,
    layout: &Layout,
) -> Result<Option<Vec<SymbolicExpr>>> {
    if let Some(ndim) = desc.ndim()
        && ndim != layout.ndim()
    {
        return Err(Error::ShapeRankMismatch {
            call: Box::new(call.clone()),
            layout: layout.name().to_string(),
            expected: layout.ndim(),
            actual: ndim,
        });
    }
    Ok(desc.shape.dims().map(<[SymbolicExpr]>::to_vec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn lits(dims: &[i64]) -> Vec<SymbolicExpr> {
        dims.iter().map(|&d| SymbolicExpr::lit(d)).collect()
    }

    fn call() -> Call {
        Call::op("max_pool2d", vec![])
    }

    #[test]
    fn test_parse() {
        let layout = Layout::parse("NCHW4c").unwrap();
        assert_eq!(layout.ndim(), 5);
        assert_eq!(
            layout.axes()[4],
            LayoutAxis::Split {
                factor: 4,
                name: 'c'
            }
        );
        assert_eq!(layout.to_string(), "NCHW4c");

        assert!(Layout::parse("NCHW4").is_err());
        assert!(Layout::parse("NCHc").is_err());
        assert!(Layout::parse("NCHH").is_err());
        assert!(Layout::parse("N4C").is_err());
        assert!(Layout::parse("NHW4c").is_err());
    }

    #[test]
    fn test_convertible() {
        let (src, conv) = check_layout_convertible(&call(), "NHWC", "NCHW").unwrap();
        assert_eq!(src.name(), "NHWC");
        assert_eq!(conv.primal_permutation(), vec![0, 3, 1, 2]);
        assert_eq!(
            conv.forward_shape(&lits(&[1, 8, 8, 3])),
            Some(lits(&[1, 3, 8, 8]))
        );
        assert_eq!(
            conv.backward_shape(&lits(&[1, 3, 4, 4])),
            Some(lits(&[1, 4, 4, 3]))
        );
    }

    #[test]
    fn test_split_conversion() {
        let (_, conv) = check_layout_convertible(&call(), "NCHW4c", "NCHW").unwrap();
        assert_eq!(
            conv.forward_shape(&lits(&[1, 2, 8, 8, 4])),
            Some(lits(&[1, 8, 8, 8]))
        );
        assert_eq!(
            conv.backward_shape(&lits(&[1, 8, 8, 8])),
            Some(lits(&[1, 2, 8, 8, 4]))
        );
    }

    #[test]
    fn test_incompatible() {
        let err = check_layout_convertible(&call(), "NCDHW", "NCHW").unwrap_err();
        assert!(matches!(err, Error::IncompatibleLayout { .. }));
        assert!(check_layout_convertible(&call(), "NC?W", "NCHW").is_err());
    }

    #[test]
    fn test_check_rank_and_extract_shape() {
        let layout = Layout::parse("NCHW").unwrap();
        let desc = TensorDesc::fixed(&[1, 3, 8, 8], DataType::F32);
        assert_eq!(
            check_rank_and_extract_shape(&call(), &desc, &layout).unwrap(),
            Some(lits(&[1, 3, 8, 8]))
        );

        let rank_only = TensorDesc::with_rank(4, Some(DataType::F32));
        assert_eq!(
            check_rank_and_extract_shape(&call(), &rank_only, &layout).unwrap(),
            None
        );

        let wrong = TensorDesc::fixed(&[1, 3, 8], DataType::F32);
        assert!(matches!(
            check_rank_and_extract_shape(&call(), &wrong, &layout).unwrap_err(),
            Error::ShapeRankMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }
}
