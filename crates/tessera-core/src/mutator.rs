//! Post-order expression rewriting over binding blocks.
//!
//! An `ExprMutator` walks a function body through its `BlockBuilder`,
//! re-emitting every binding into freshly opened blocks. Children are
//! rewritten before parents. When none of a node's children change, the
//! original node is returned unchanged (same `Arc`), so untouched parts of
//! the graph stay shared.
//!
//! Override a `visit_*` method to intercept a node kind, and call the
//! matching `walk_*` function to fall back to the default behavior.

use crate::Result;
use crate::ir::{Binding, BindingBlock, Call, Expr, ExprKind, Function, SeqExpr, Var};
use crate::ir_builder::BlockBuilder;
use crate::symbolic_expr::SymbolicExpr;
use crate::types::StructInfo;

pub trait ExprMutator<'r> {
    fn builder(&mut self) -> &mut BlockBuilder<'r>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Expr> {
        walk_expr(self, expr)
    }

    fn visit_call(&mut self, expr: &Expr, call: &Call) -> Result<Expr> {
        walk_call(self, expr, call)
    }

    /// Shape construction. Unchanged by default.
    fn visit_shape(&mut self, expr: &Expr, _values: &[SymbolicExpr]) -> Result<Expr> {
        Ok(expr.clone())
    }

    /// Local function. Its body is rewritten by default.
    fn visit_function(&mut self, _expr: &Expr, func: &Function) -> Result<Expr> {
        Ok(Expr::function(self.rewrite_function(func)?))
    }

    fn visit_binding(&mut self, binding: &Binding) -> Result<()> {
        walk_binding(self, binding)
    }

    fn visit_block(&mut self, block: &BindingBlock) -> Result<BindingBlock> {
        self.builder().begin_block(block.dataflow);
        for binding in &block.bindings {
            self.visit_binding(binding)?;
        }
        self.builder().end_block()
    }

    /// Rewrite every block, then the trailing expression inside a block of
    /// its own so that bindings it emits precede it.
    fn visit_seq_expr(&mut self, seq: &SeqExpr) -> Result<SeqExpr> {
        let mut blocks = Vec::with_capacity(seq.blocks.len() + 1);
        for block in &seq.blocks {
            let block = self.visit_block(block)?;
            if !block.is_empty() {
                blocks.push(block);
            }
        }

        self.builder().begin_block(false);
        let body = self.visit_expr(&seq.body)?;
        let trailing = self.builder().end_block()?;
        if !trailing.is_empty() {
            blocks.push(trailing);
        }

        Ok(SeqExpr::new(blocks, body))
    }

    fn rewrite_function(&mut self, func: &Function) -> Result<Function> {
        let body = self.visit_seq_expr(&func.body)?;
        let ret_info = body
            .body
            .struct_info()
            .cloned()
            .unwrap_or_else(|| func.ret_info.clone());
        Ok(Function {
            params: func.params.clone(),
            body,
            ret_info,
        })
    }
}

/// Default expression dispatch.
pub fn walk_expr<'r, M: ExprMutator<'r> + ?Sized>(m: &mut M, expr: &Expr) -> Result<Expr> {
    match expr.kind() {
        ExprKind::Var(var) => {
            let mapped = m.builder().lookup_var(var);
            if mapped == *var {
                Ok(expr.clone())
            } else {
                Ok(Expr::var(&mapped))
            }
        }
        ExprKind::Shape(values) => m.visit_shape(expr, values),
        ExprKind::Tuple(fields) => {
            let new_fields = fields
                .iter()
                .map(|f| m.visit_expr(f))
                .collect::<Result<Vec<_>>>()?;
            if unchanged(fields, &new_fields) {
                return Ok(expr.clone());
            }
            m.builder().normalize(Expr::tuple(new_fields))
        }
        ExprKind::TupleGetItem(tuple, index) => {
            let new_tuple = m.visit_expr(tuple)?;
            if Expr::ptr_eq(tuple, &new_tuple) {
                return Ok(expr.clone());
            }
            m.builder().normalize(Expr::get_item(new_tuple, *index))
        }
        ExprKind::Call(call) => m.visit_call(expr, call),
        ExprKind::Function(func) => m.visit_function(expr, func),
    }
}

/// Rewrite the arguments of a call. The call is rebuilt when an argument
/// changes and re-inferred when it has no descriptor yet.
pub fn walk_call<'r, M: ExprMutator<'r> + ?Sized>(
    m: &mut M,
    expr: &Expr,
    call: &Call,
) -> Result<Expr> {
    let new_args = call
        .args
        .iter()
        .map(|a| m.visit_expr(a))
        .collect::<Result<Vec<_>>>()?;
    if !unchanged(&call.args, &new_args) {
        let mut new_call = call.clone();
        new_call.args = new_args;
        return m.builder().normalize(Expr::call(new_call));
    }
    if expr.struct_info().is_some() {
        return Ok(expr.clone());
    }
    m.builder().normalize(expr.clone())
}

/// Rewrite a binding's value and re-emit it.
///
/// A variable whose descriptor changes is replaced by a fresh one, and later
/// uses are remapped to it.
pub fn walk_binding<'r, M: ExprMutator<'r> + ?Sized>(m: &mut M, binding: &Binding) -> Result<()> {
    match binding {
        Binding::Var { var, value } => {
            let new_value = m.visit_expr(value)?;
            if Expr::ptr_eq(value, &new_value) {
                return m.builder().emit_binding(binding.clone());
            }
            let new_value = m.builder().normalize(new_value)?;
            let var = rebind(m.builder(), var, new_value.struct_info());
            m.builder().emit_binding(Binding::Var {
                var,
                value: new_value,
            })
        }
        Binding::MatchShape {
            var,
            value,
            pattern,
        } => {
            let new_value = m.visit_expr(value)?;
            if Expr::ptr_eq(value, &new_value) {
                return m.builder().emit_binding(binding.clone());
            }
            let new_value = m.builder().normalize(new_value)?;
            let var = var
                .as_ref()
                .map(|v| rebind(m.builder(), v, new_value.struct_info()));
            m.builder().emit_binding(Binding::MatchShape {
                var,
                value: new_value,
                pattern: pattern.clone(),
            })
        }
    }
}

fn rebind(builder: &mut BlockBuilder<'_>, var: &Var, info: Option<&StructInfo>) -> Var {
    match info {
        Some(info) if info != var.struct_info() => {
            let fresh = Var::new(var.name_hint(), info.clone());
            builder.remap_var(var, fresh.clone());
            fresh
        }
        _ => var.clone(),
    }
}

fn unchanged(old: &[Expr], new: &[Expr]) -> bool {
    old.iter().zip(new).all(|(a, b)| Expr::ptr_eq(a, b))
}
