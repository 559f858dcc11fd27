//! Scalar subroutines over the shape heap.
//!
//! Shape lowering compiles each symbolic shape computation into a `PrimFunc`:
//! a straight-line list of stores into heap slots, where every operand is a
//! constant or a load from another slot.

use crate::symbolic_expr::BinOpKind;
use crate::{Error, Result};
use std::fmt;

/// Scalar expression evaluated against the heap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HeapExpr {
    Const(i64),

    /// Read the integer stored in a slot.
    Load(usize),

    Binary(Box<HeapExpr>, BinOpKind, Box<HeapExpr>),
}

impl HeapExpr {
    pub fn eval(&self, heap: &[i64]) -> Result<i64> {
        match self {
            HeapExpr::Const(v) => Ok(*v),
            HeapExpr::Load(slot) => heap.get(*slot).copied().ok_or_else(|| {
                Error::InvalidIr(format!(
                    "heap load from slot {slot} out of bounds (heap size {})",
                    heap.len()
                ))
            }),
            HeapExpr::Binary(lhs, op, rhs) => op.apply(lhs.eval(heap)?, rhs.eval(heap)?),
        }
    }

    /// Slots read by this expression, in evaluation order.
    pub fn loads(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_loads(&mut out);
        out
    }

    fn collect_loads(&self, out: &mut Vec<usize>) {
        match self {
            HeapExpr::Const(_) => {}
            HeapExpr::Load(slot) => out.push(*slot),
            HeapExpr::Binary(lhs, _, rhs) => {
                lhs.collect_loads(out);
                rhs.collect_loads(out);
            }
        }
    }
}

/// Statement of a heap subroutine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HeapStmt {
    Store { slot: usize, value: HeapExpr },
}

/// A generated scalar subroutine taking the heap as its only parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimFunc {
    /// Name of the heap parameter.
    pub heap_param: String,
    pub body: Vec<HeapStmt>,
}

impl PrimFunc {
    pub fn new(heap_param: impl Into<String>, body: Vec<HeapStmt>) -> Self {
        Self {
            heap_param: heap_param.into(),
            body,
        }
    }

    /// Execute the subroutine against a heap.
    pub fn run(&self, heap: &mut [i64]) -> Result<()> {
        for stmt in &self.body {
            match stmt {
                HeapStmt::Store { slot, value } => {
                    let v = value.eval(heap)?;
                    let len = heap.len();
                    let cell = heap.get_mut(*slot).ok_or_else(|| {
                        Error::InvalidIr(format!(
                            "heap store to slot {slot} out of bounds (heap size {len})"
                        ))
                    })?;
                    *cell = v;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for HeapExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapExpr::Const(v) => write!(f, "{v}"),
            HeapExpr::Load(slot) => write!(f, "heap[{slot}]"),
            HeapExpr::Binary(lhs, op, rhs) => write!(f, "({lhs} {op} {rhs})"),
        }
    }
}

impl fmt::Display for PrimFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "prim_func({}) {{", self.heap_param)?;
        for stmt in &self.body {
            match stmt {
                HeapStmt::Store { slot, value } => writeln!(f, "  heap[{slot}] = {value}")?,
            }
        }
        f.write_str("}")
    }
}
