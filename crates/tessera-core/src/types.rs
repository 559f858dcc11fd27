//! Tensor value descriptors: shape, rank and element type metadata.

use crate::symbolic_expr::SymbolicExpr;
use std::fmt;

/// Tensor element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    F16,
    F32,
    F64,
    I32,
    I64,
    U8,
    U32,
    Bool,
}

impl DataType {
    /// Whether this is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F16 | DataType::F32 | DataType::F64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::F16 => "float16",
            DataType::F32 => "float32",
            DataType::F64 => "float64",
            DataType::I32 => "int32",
            DataType::I64 => "int64",
            DataType::U8 => "uint8",
            DataType::U32 => "uint32",
            DataType::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// Shape of a tensor as far as it is known at compile time.
///
/// When the rank is unknown no per-dimension data exists. When the rank is
/// known but a dimension is not statically determinable, that dimension is a
/// free symbolic expression rather than a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TensorShape {
    /// Every dimension is described (literal or symbolic).
    Known(Vec<SymbolicExpr>),

    /// Rank is known, dimensions are not.
    Rank(usize),

    /// Neither rank nor dimensions are known.
    Unknown,
}

impl TensorShape {
    /// Build a shape whose dimensions are all literals.
    pub fn fixed(dims: &[i64]) -> Self {
        TensorShape::Known(dims.iter().map(|&d| SymbolicExpr::Literal(d)).collect())
    }

    /// Number of dimensions, if known.
    pub fn ndim(&self) -> Option<usize> {
        match self {
            TensorShape::Known(dims) => Some(dims.len()),
            TensorShape::Rank(ndim) => Some(*ndim),
            TensorShape::Unknown => None,
        }
    }

    /// Per-dimension expressions, if known.
    pub fn dims(&self) -> Option<&[SymbolicExpr]> {
        match self {
            TensorShape::Known(dims) => Some(dims),
            _ => None,
        }
    }

    /// Check if every dimension is a literal.
    pub fn is_static(&self) -> bool {
        self.dims()
            .is_some_and(|dims| dims.iter().all(SymbolicExpr::is_literal))
    }

    /// Literal dimensions, if every dimension is a literal.
    pub fn as_static(&self) -> Option<Vec<i64>> {
        self.dims()?.iter().map(SymbolicExpr::as_literal).collect()
    }
}

/// Descriptor of a tensor value.
///
/// `dtype == None` means the element type is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorDesc {
    pub shape: TensorShape,
    pub dtype: Option<DataType>,
}

impl TensorDesc {
    pub fn new(shape: TensorShape, dtype: Option<DataType>) -> Self {
        Self { shape, dtype }
    }

    /// Tensor with literal dimensions and a known dtype.
    pub fn fixed(dims: &[i64], dtype: DataType) -> Self {
        Self::new(TensorShape::fixed(dims), Some(dtype))
    }

    /// Tensor with the given dimension expressions and a known dtype.
    pub fn symbolic(dims: Vec<SymbolicExpr>, dtype: DataType) -> Self {
        Self::new(TensorShape::Known(dims), Some(dtype))
    }

    /// Tensor of known rank whose dimensions are unknown.
    pub fn with_rank(ndim: usize, dtype: Option<DataType>) -> Self {
        Self::new(TensorShape::Rank(ndim), dtype)
    }

    pub fn ndim(&self) -> Option<usize> {
        self.shape.ndim()
    }
}

/// Descriptor attached to every expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StructInfo {
    /// A tensor value.
    Tensor(TensorDesc),

    /// A runtime shape value. `values` is present when the dimension
    /// expressions are known.
    Shape {
        ndim: Option<usize>,
        values: Option<Vec<SymbolicExpr>>,
    },

    /// A tuple of values.
    Tuple(Vec<StructInfo>),

    /// A function value.
    Func,

    /// Anything else; also the result of calls made for side effects.
    Object,
}

impl StructInfo {
    /// Shape descriptor for a known list of dimension expressions.
    pub fn shape_of(values: Vec<SymbolicExpr>) -> Self {
        StructInfo::Shape {
            ndim: Some(values.len()),
            values: Some(values),
        }
    }

    /// Empty tuple, used as the result of calls evaluated for side effects.
    pub fn void() -> Self {
        StructInfo::Tuple(Vec::new())
    }

    pub fn as_tensor(&self) -> Option<&TensorDesc> {
        match self {
            StructInfo::Tensor(desc) => Some(desc),
            _ => None,
        }
    }

    /// Kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            StructInfo::Tensor(_) => "Tensor",
            StructInfo::Shape { .. } => "Shape",
            StructInfo::Tuple(_) => "Tuple",
            StructInfo::Func => "Function",
            StructInfo::Object => "Object",
        }
    }

    /// Whether every shape value carried by this descriptor is a literal.
    ///
    /// Values with no shape component (functions, opaque objects) count as
    /// fully known.
    pub fn know_all_shape_values(&self) -> bool {
        match self {
            StructInfo::Tensor(desc) => desc.shape.is_static(),
            StructInfo::Shape { values, .. } => values
                .as_ref()
                .is_some_and(|v| v.iter().all(SymbolicExpr::is_literal)),
            StructInfo::Tuple(fields) => fields.iter().all(StructInfo::know_all_shape_values),
            StructInfo::Func | StructInfo::Object => true,
        }
    }
}

impl From<TensorDesc> for StructInfo {
    fn from(desc: TensorDesc) -> Self {
        StructInfo::Tensor(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_queries() {
        let shape = TensorShape::fixed(&[2, 3]);
        assert_eq!(shape.ndim(), Some(2));
        assert!(shape.is_static());
        assert_eq!(shape.as_static(), Some(vec![2, 3]));

        let symbolic = TensorShape::Known(vec![SymbolicExpr::var("n"), SymbolicExpr::lit(3)]);
        assert!(!symbolic.is_static());
        assert_eq!(symbolic.as_static(), None);

        assert_eq!(TensorShape::Rank(4).ndim(), Some(4));
        assert_eq!(TensorShape::Rank(4).dims(), None);
        assert_eq!(TensorShape::Unknown.ndim(), None);
    }

    #[test]
    fn test_know_all_shape_values() {
        assert!(
            StructInfo::from(TensorDesc::fixed(&[1, 2], DataType::F32)).know_all_shape_values()
        );
        assert!(!StructInfo::from(TensorDesc::with_rank(2, None)).know_all_shape_values());
        assert!(
            !StructInfo::Tuple(vec![
                TensorDesc::fixed(&[1], DataType::F32).into(),
                TensorDesc::symbolic(vec![SymbolicExpr::var("n")], DataType::F32).into(),
            ])
            .know_all_shape_values()
        );
        assert!(StructInfo::shape_of(vec![SymbolicExpr::lit(4)]).know_all_shape_values());
        assert!(StructInfo::Object.know_all_shape_values());
    }

    #[test]
    fn test_dtype_float() {
        assert!(DataType::F16.is_float());
        assert!(!DataType::I64.is_float());
        assert_eq!(DataType::F32.to_string(), "float32");
    }
}
