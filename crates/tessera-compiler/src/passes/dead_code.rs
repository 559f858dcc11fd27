//! Dead-binding elimination.
//!
//! Builds a use graph over the bindings of a function and keeps only the
//! bindings reachable from the return expression or from bindings that must
//! run for their side effects.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{HashMap, HashSet};
use tessera_core::{Binding, BindingBlock, Callee, Expr, ExprKind, Function, SeqExpr, Var};

/// Remove every binding whose variable is never referenced and whose value
/// has no side effect.
///
/// Operator calls and plain value constructions are side-effect free.
/// Match-shape bindings and calls to module or runtime functions are always
/// kept. Local functions bound in the body are cleaned recursively.
pub fn remove_all_unused(func: &Function) -> Function {
    let uses = build_use_graph(&func.body);

    let mut roots = Vec::new();
    func.body.body.visit_vars(&mut |v| {
        if let Some(&idx) = uses.nodes.get(v) {
            roots.push(idx);
        }
    });
    for binding in func.body.bindings() {
        if has_side_effect(binding) {
            binding.value().visit_vars(&mut |v| {
                if let Some(&idx) = uses.nodes.get(v) {
                    roots.push(idx);
                }
            });
        }
    }

    let mut live = HashSet::new();
    for root in roots {
        let mut dfs = Dfs::new(&uses.graph, root);
        while let Some(idx) = dfs.next(&uses.graph) {
            live.insert(idx);
        }
    }

    let blocks: Vec<BindingBlock> = func
        .body
        .blocks
        .iter()
        .map(|block| BindingBlock {
            bindings: block
                .bindings
                .iter()
                .filter(|b| {
                    has_side_effect(b)
                        || b.var()
                            .and_then(|v| uses.nodes.get(v))
                            .is_some_and(|idx| live.contains(idx))
                })
                .map(clean_local_function)
                .collect(),
            dataflow: block.dataflow,
        })
        .filter(|block| !block.is_empty())
        .collect();

    let removed = func.body.bindings().count()
        - blocks.iter().map(|b| b.bindings.len()).sum::<usize>();
    if removed > 0 {
        tracing::trace!(removed, "removed unused bindings");
    }

    Function {
        params: func.params.clone(),
        body: SeqExpr::new(blocks, func.body.body.clone()),
        ret_info: func.ret_info.clone(),
    }
}

/// Use graph: an edge `a -> b` means the binding of `a` reads `b`.
struct UseGraph {
    graph: DiGraph<Var, ()>,
    nodes: HashMap<Var, NodeIndex>,
}

fn build_use_graph(seq: &SeqExpr) -> UseGraph {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for binding in seq.bindings() {
        if let Some(var) = binding.var() {
            let idx = graph.add_node(var.clone());
            nodes.insert(var.clone(), idx);
        }
    }

    for binding in seq.bindings() {
        let Some(user) = binding.var().and_then(|v| nodes.get(v)).copied() else {
            continue;
        };
        binding.value().visit_vars(&mut |v| {
            if let Some(&used) = nodes.get(v) {
                graph.add_edge(user, used, ());
            }
        });
    }

    UseGraph { graph, nodes }
}

fn has_side_effect(binding: &Binding) -> bool {
    match binding {
        Binding::MatchShape { .. } => true,
        Binding::Var { value, .. } => matches!(
            value.as_call().map(|c| &c.callee),
            Some(Callee::Global(_) | Callee::Extern(_))
        ),
    }
}

fn clean_local_function(binding: &Binding) -> Binding {
    match binding {
        Binding::Var { var, value } => match value.kind() {
            ExprKind::Function(func) => Binding::Var {
                var: var.clone(),
                value: Expr::function(remove_all_unused(func)),
            },
            _ => binding.clone(),
        },
        Binding::MatchShape { .. } => binding.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Call, DataType, TensorDesc};

    fn tensor_var(name: &str) -> Var {
        Var::new(name, TensorDesc::fixed(&[4], DataType::F32))
    }

    #[test]
    fn test_removes_unreferenced_chain() {
        let x = tensor_var("x");
        let a = tensor_var("a");
        let b = tensor_var("b");
        let c = tensor_var("c");

        let func = Function::new(
            vec![x.clone()],
            vec![BindingBlock::dataflow(vec![
                Binding::Var {
                    var: a.clone(),
                    value: Call::op("exp", vec![Expr::var(&x)]).into(),
                },
                // b only feeds c, and c is never used
                Binding::Var {
                    var: b.clone(),
                    value: Call::op("exp", vec![Expr::var(&x)]).into(),
                },
                Binding::Var {
                    var: c.clone(),
                    value: Call::op("exp", vec![Expr::var(&b)]).into(),
                },
            ])],
            Expr::var(&a),
        );

        let out = remove_all_unused(&func);
        let kept: Vec<_> = out.body.bindings().filter_map(Binding::var).collect();
        assert_eq!(kept, vec![&a]);
    }

    #[test]
    fn test_keeps_side_effects_and_their_inputs() {
        let x = tensor_var("x");
        let heap = tensor_var("heap");
        let unused = tensor_var("unused");
        let status = Var::new("status", tessera_core::StructInfo::void());

        let func = Function::new(
            vec![x.clone()],
            vec![
                BindingBlock::new(vec![Binding::Var {
                    var: heap.clone(),
                    value: Call::op("exp", vec![Expr::var(&x)]).into(),
                }]),
                BindingBlock::new(vec![
                    Binding::Var {
                        var: status,
                        value: Call::extern_func("release", vec![Expr::var(&heap)]).into(),
                    },
                    Binding::Var {
                        var: unused,
                        value: Call::op("exp", vec![Expr::var(&x)]).into(),
                    },
                ]),
            ],
            Expr::var(&x),
        );

        let out = remove_all_unused(&func);
        assert_eq!(out.body.blocks.len(), 2);
        assert_eq!(out.body.blocks[0].bindings[0].var(), Some(&heap));
        assert_eq!(out.body.blocks[1].bindings.len(), 1);
    }

    #[test]
    fn test_empty_blocks_are_dropped() {
        let x = tensor_var("x");
        let dead = tensor_var("dead");
        let func = Function::new(
            vec![x.clone()],
            vec![BindingBlock::dataflow(vec![Binding::Var {
                var: dead,
                value: Expr::var(&x),
            }])],
            Expr::var(&x),
        );
        assert!(remove_all_unused(&func).body.blocks.is_empty());
    }
}
