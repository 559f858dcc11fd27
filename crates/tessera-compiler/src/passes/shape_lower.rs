//! Shape lowering pass.
//!
//! Removes every symbolic shape construct from a function. Dynamic dimension
//! values live in one integer heap per function:
//!
//! 1. A pre-pass gives each distinct dimension expression a heap slot, in
//!    post-order of first appearance.
//! 2. The function allocates the heap on entry and frees it after its last
//!    binding.
//! 3. Match-shape bindings become `decode_shape` calls that write the runtime
//!    dimensions into their slots.
//! 4. Shape constructions become a call to a generated `PrimFunc` that
//!    computes the dimensions into their slots, followed by a
//!    `construct_shape` call that reads them back.
//!
//! Local functions are lowered with their own slot map and heap.

use std::collections::HashMap;
use tessera_core::mutator::walk_binding;
use tessera_core::{
    AttrValue, Binding, BlockBuilder, Call, Callee, DataType, Error, Expr, ExprKind,
    ExprMutator, Function, HeapExpr, HeapStmt, IrModule, ModuleFunc, OperatorRegistry, Pass,
    PrimFunc, Result, SeqExpr, Stage, StructInfo, SymbolicExpr, TensorDesc, Var,
};

use super::graph_functions;
use crate::runtime::{
    ALLOC_SHAPE_HEAP, CONSTRUCT_SHAPE, DECODE_SHAPE, FREE_SHAPE_HEAP, SIZE_ATTR, SLOTS_ATTR,
};

/// Name hint of generated shape subroutines.
const SHAPE_FUNC_HINT: &str = "shape_func";

/// Pass that threads dynamic dimensions through a runtime shape heap.
pub struct ShapeLowerPass;

impl ShapeLowerPass {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShapeLowerPass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for ShapeLowerPass {
    fn name(&self) -> &str {
        "shape_lower"
    }

    fn stage(&self) -> Stage {
        Stage::Lowering
    }

    fn run(&self, module: &IrModule, registry: &OperatorRegistry) -> Result<IrModule> {
        let mut lowerer = ShapeLowerer {
            builder: BlockBuilder::with_module(registry, module.clone()),
            slots: SlotMap::default(),
            heap: None,
        };

        for (name, func) in graph_functions(module) {
            let _span = tracing::debug_span!("function", name).entered();
            let func = lowerer.lower_function(func)?;
            lowerer
                .builder
                .update_function(name, ModuleFunc::Graph(func));
        }

        Ok(lowerer.builder.into_module())
    }
}

/// Dimension expression to heap slot, in assignment order.
#[derive(Debug, Default)]
struct SlotMap {
    slots: HashMap<SymbolicExpr, usize>,
    order: Vec<SymbolicExpr>,
}

impl SlotMap {
    /// Build the slot map of one function body without entering local
    /// functions.
    fn collect(seq: &SeqExpr) -> Self {
        let mut map = Self::default();
        for binding in seq.bindings() {
            map.visit_expr(binding.value());
            if let Binding::MatchShape { pattern, .. } = binding {
                pattern.iter().for_each(|e| map.assign(e));
            }
        }
        map.visit_expr(&seq.body);
        map
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr.kind() {
            ExprKind::Shape(values) => values.iter().for_each(|e| self.assign(e)),
            ExprKind::Tuple(fields) => fields.iter().for_each(|f| self.visit_expr(f)),
            ExprKind::TupleGetItem(tuple, _) => self.visit_expr(tuple),
            ExprKind::Call(call) => call.args.iter().for_each(|a| self.visit_expr(a)),
            ExprKind::Var(_) | ExprKind::Function(_) => {}
        }
    }

    fn assign(&mut self, expr: &SymbolicExpr) {
        if !self.slots.contains_key(expr) {
            self.slots.insert(expr.clone(), self.order.len());
            self.order.push(expr.clone());
        }
    }

    fn get(&self, expr: &SymbolicExpr) -> Result<usize> {
        self.slots
            .get(expr)
            .copied()
            .ok_or_else(|| Error::UnresolvedSlot(expr.clone()))
    }

    fn slot_attr(&self, exprs: &[SymbolicExpr]) -> Result<AttrValue> {
        let slots = exprs
            .iter()
            .map(|e| self.get(e).map(|slot| slot as i64))
            .collect::<Result<Vec<_>>>()?;
        Ok(AttrValue::Ints(slots))
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    /// Heap expression computing `expr`, with every variable loaded from its
    /// slot.
    fn heap_expr(&self, expr: &SymbolicExpr) -> Result<HeapExpr> {
        Ok(match expr {
            SymbolicExpr::Literal(v) => HeapExpr::Const(*v),
            SymbolicExpr::Variable(_) => HeapExpr::Load(self.get(expr)?),
            SymbolicExpr::BinOp(lhs, op, rhs) => HeapExpr::Binary(
                Box::new(self.heap_expr(lhs)?),
                *op,
                Box::new(self.heap_expr(rhs)?),
            ),
        })
    }
}

struct ShapeLowerer<'r> {
    builder: BlockBuilder<'r>,
    /// Slot map of the function being lowered.
    slots: SlotMap,
    /// Heap variable of the function being lowered.
    heap: Option<Var>,
}

impl ShapeLowerer<'_> {
    fn lower_function(&mut self, func: &Function) -> Result<Function> {
        if is_lowered(func) {
            tracing::debug!("already lowered, skipping");
            return Ok(func.clone());
        }

        let slots = SlotMap::collect(&func.body);
        let heap_size = slots.len();
        tracing::debug!(heap_size, slots = ?slots.order, "assigned heap slots");

        let heap = Var::new(
            "shape_heap",
            TensorDesc::fixed(&[heap_size as i64], DataType::I64),
        );
        let outer_slots = std::mem::replace(&mut self.slots, slots);
        let outer_heap = self.heap.replace(heap.clone());

        let lowered = self.lower_body(func, &heap, heap_size);

        self.slots = outer_slots;
        self.heap = outer_heap;
        lowered
    }

    fn lower_body(&mut self, func: &Function, heap: &Var, heap_size: usize) -> Result<Function> {
        let mut blocks = Vec::with_capacity(func.body.blocks.len() + 2);

        self.builder.begin_block(false);
        let alloc = Call::extern_func(ALLOC_SHAPE_HEAP, vec![])
            .with_attr(SIZE_ATTR, AttrValue::Int(heap_size as i64))
            .with_sinfo(heap.struct_info().clone());
        let alloc = self.builder.normalize(alloc.into())?;
        self.builder.emit_binding(Binding::Var {
            var: heap.clone(),
            value: alloc,
        })?;
        blocks.push(self.builder.end_block()?);

        for block in &func.body.blocks {
            let block = self.visit_block(block)?;
            if !block.is_empty() {
                blocks.push(block);
            }
        }

        self.builder.begin_block(false);
        let body = self.visit_expr(&func.body.body)?;
        let free = Call::extern_func(FREE_SHAPE_HEAP, vec![Expr::var(heap)])
            .with_sinfo(StructInfo::void());
        self.builder.emit(free.into(), "_")?;
        blocks.push(self.builder.end_block()?);

        let ret_info = body
            .struct_info()
            .cloned()
            .unwrap_or_else(|| func.ret_info.clone());
        Ok(Function {
            params: func.params.clone(),
            body: SeqExpr::new(blocks, body),
            ret_info,
        })
    }

    fn heap(&self) -> Result<Var> {
        self.heap
            .clone()
            .ok_or_else(|| Error::InvalidIr("shape construct outside of a function".to_string()))
    }
}

impl<'r> ExprMutator<'r> for ShapeLowerer<'r> {
    fn builder(&mut self) -> &mut BlockBuilder<'r> {
        &mut self.builder
    }

    fn visit_binding(&mut self, binding: &Binding) -> Result<()> {
        let Binding::MatchShape {
            var,
            value,
            pattern,
        } = binding
        else {
            return walk_binding(self, binding);
        };

        let value = self.visit_expr(value)?;
        let decode = Call::extern_func(DECODE_SHAPE, vec![value.clone(), Expr::var(&self.heap()?)])
            .with_attr(SLOTS_ATTR, self.slots.slot_attr(pattern)?)
            .with_sinfo(StructInfo::void());
        self.builder.emit(decode.into(), "_")?;

        if let Some(var) = var {
            let value = self.builder.normalize(value)?;
            self.builder.emit_binding(Binding::Var {
                var: var.clone(),
                value,
            })?;
        }
        Ok(())
    }

    fn visit_shape(&mut self, _expr: &Expr, values: &[SymbolicExpr]) -> Result<Expr> {
        let heap = self.heap()?;

        let body = values
            .iter()
            .map(|e| -> Result<HeapStmt> {
                Ok(HeapStmt::Store {
                    slot: self.slots.get(e)?,
                    value: self.slots.heap_expr(e)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let shape_func = ModuleFunc::Prim(PrimFunc::new("heap", body));
        let name = self.builder.add_function(SHAPE_FUNC_HINT, shape_func)?;

        let compute = Call::global(name, vec![Expr::var(&heap)]).with_sinfo(StructInfo::void());
        self.builder.emit(compute.into(), "_")?;

        let construct = Call::extern_func(CONSTRUCT_SHAPE, vec![Expr::var(&heap)])
            .with_attr(SLOTS_ATTR, self.slots.slot_attr(values)?)
            .with_sinfo(StructInfo::shape_of(values.to_vec()));
        let sh = self.builder.emit(construct.into(), "sh")?;
        Ok(Expr::var(&sh))
    }

    fn visit_function(&mut self, _expr: &Expr, func: &Function) -> Result<Expr> {
        Ok(Expr::function(self.lower_function(func)?))
    }
}

/// A lowered function allocates its heap in its first binding.
fn is_lowered(func: &Function) -> bool {
    func.body
        .bindings()
        .next()
        .and_then(|b| b.value().as_call())
        .is_some_and(|call| {
            matches!(&call.callee, Callee::Extern(name) if name == ALLOC_SHAPE_HEAP)
        })
}
