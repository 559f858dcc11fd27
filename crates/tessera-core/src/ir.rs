//! Intermediate representation for the compiler.
//!
//! A program is a module of functions. A function body is an ordered list of
//! binding blocks followed by a trailing return expression:
//! - **Expressions** (`Expr`) are immutable, reference-counted nodes. A
//!   rewrite builds new nodes and leaves every other holder of the original
//!   graph untouched.
//! - **Bindings** (`Binding`) bind a write-once variable to an expression, or
//!   match a runtime value against a pattern of symbolic dimensions.
//! - **Descriptors** (`StructInfo`) are attached to expressions once they
//!   have been normalized by a `BlockBuilder`.

use crate::prim_func::PrimFunc;
use crate::symbolic_expr::SymbolicExpr;
use crate::types::{DataType, StructInfo};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Name of the operator that calls a backend kernel directly. Calls to it are
/// already legalized.
pub const CALL_TIR_OP: &str = "call_tir";

// Monotonic, never reused; only uniqueness matters.
static NEXT_VAR_ID: AtomicUsize = AtomicUsize::new(0);

// ──────────────────────────────── Var ────────────────────────────────────

/// A write-once variable.
///
/// Variables compare and hash by identity: two variables with the same name
/// hint are still distinct.
#[derive(Debug, Clone)]
pub struct Var(Arc<VarNode>);

#[derive(Debug)]
struct VarNode {
    id: usize,
    name_hint: String,
    info: StructInfo,
}

impl Var {
    /// Create a fresh variable.
    pub fn new(name_hint: impl Into<String>, info: impl Into<StructInfo>) -> Self {
        Self(Arc::new(VarNode {
            id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
            name_hint: name_hint.into(),
            info: info.into(),
        }))
    }

    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn name_hint(&self) -> &str {
        &self.0.name_hint
    }

    pub fn struct_info(&self) -> &StructInfo {
        &self.0.info
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Var {}

impl std::hash::Hash for Var {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

// ──────────────────────────────── Attributes ─────────────────────────────

/// Call attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Ints(Vec<i64>),
    Float(f64),
    Str(String),
    Bool(bool),
    DType(DataType),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            AttrValue::Ints(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Attributes record of a call, ordered by key.
pub type Attrs = BTreeMap<String, AttrValue>;

// ──────────────────────────────── Call ───────────────────────────────────

/// What a call invokes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Callee {
    /// A registered operator.
    Op(String),

    /// A function of the enclosing module.
    Global(String),

    /// A runtime-provided function.
    Extern(String),
}

/// A call to an operator or subroutine.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: Callee,
    pub args: Vec<Expr>,
    pub attrs: Attrs,
    /// Declared result descriptors, for callees whose result cannot be
    /// inferred from the arguments.
    pub sinfo_args: Vec<StructInfo>,
}

impl Call {
    pub fn new(callee: Callee, args: Vec<Expr>) -> Self {
        Self {
            callee,
            args,
            attrs: Attrs::new(),
            sinfo_args: Vec::new(),
        }
    }

    /// Call a registered operator.
    pub fn op(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(Callee::Op(name.into()), args)
    }

    /// Call a runtime-provided function.
    pub fn extern_func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(Callee::Extern(name.into()), args)
    }

    /// Call a function of the enclosing module.
    pub fn global(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(Callee::Global(name.into()), args)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn with_sinfo(mut self, info: StructInfo) -> Self {
        self.sinfo_args.push(info);
        self
    }

    /// Operator name, if the callee is a registered operator.
    pub fn op_name(&self) -> Option<&str> {
        match &self.callee {
            Callee::Op(name) => Some(name),
            _ => None,
        }
    }

    /// Name of the callee, whatever its kind.
    pub fn callee_name(&self) -> &str {
        match &self.callee {
            Callee::Op(name) | Callee::Global(name) | Callee::Extern(name) => name,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }
}

// ──────────────────────────────── Expr ───────────────────────────────────

/// Shared handle to an immutable expression node.
#[derive(Debug, Clone)]
pub struct Expr(Arc<ExprNode>);

#[derive(Debug, PartialEq)]
struct ExprNode {
    kind: ExprKind,
    info: Option<StructInfo>,
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Reference to a bound variable or parameter.
    Var(Var),

    /// Shape construction: packages dimension expressions into a runtime
    /// shape value.
    Shape(Vec<SymbolicExpr>),

    Tuple(Vec<Expr>),

    TupleGetItem(Expr, usize),

    Call(Call),

    /// A local function.
    Function(Function),
}

impl Expr {
    fn from_parts(kind: ExprKind, info: Option<StructInfo>) -> Self {
        Self(Arc::new(ExprNode { kind, info }))
    }

    /// Wrap an expression kind with no descriptor attached yet.
    pub fn new(kind: ExprKind) -> Self {
        Self::from_parts(kind, None)
    }

    /// Wrap an expression kind together with its descriptor.
    pub fn annotated(kind: ExprKind, info: StructInfo) -> Self {
        Self::from_parts(kind, Some(info))
    }

    pub fn var(var: &Var) -> Self {
        let info = var.struct_info().clone();
        Self::from_parts(ExprKind::Var(var.clone()), Some(info))
    }

    pub fn shape(values: Vec<SymbolicExpr>) -> Self {
        let info = StructInfo::shape_of(values.clone());
        Self::from_parts(ExprKind::Shape(values), Some(info))
    }

    pub fn tuple(fields: Vec<Expr>) -> Self {
        let info = fields
            .iter()
            .map(|f| f.struct_info().cloned())
            .collect::<Option<Vec<_>>>()
            .map(StructInfo::Tuple);
        Self::from_parts(ExprKind::Tuple(fields), info)
    }

    pub fn get_item(tuple: Expr, index: usize) -> Self {
        let info = match tuple.struct_info() {
            Some(StructInfo::Tuple(fields)) => fields.get(index).cloned(),
            _ => None,
        };
        Self::from_parts(ExprKind::TupleGetItem(tuple, index), info)
    }

    pub fn call(call: Call) -> Self {
        Self::new(ExprKind::Call(call))
    }

    pub fn function(func: Function) -> Self {
        Self::from_parts(ExprKind::Function(func), Some(StructInfo::Func))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    /// Descriptor, if the expression has been normalized.
    pub fn struct_info(&self) -> Option<&StructInfo> {
        self.0.info.as_ref()
    }

    /// Same expression with the given descriptor attached.
    pub fn with_info(&self, info: StructInfo) -> Self {
        Self::from_parts(self.0.kind.clone(), Some(info))
    }

    pub fn as_call(&self) -> Option<&Call> {
        match &self.0.kind {
            ExprKind::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&Var> {
        match &self.0.kind {
            ExprKind::Var(var) => Some(var),
            _ => None,
        }
    }

    /// Whether both handles share the same node.
    pub fn ptr_eq(a: &Expr, b: &Expr) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Visit every variable reference, including those inside local
    /// functions.
    pub fn visit_vars(&self, f: &mut impl FnMut(&Var)) {
        match self.kind() {
            ExprKind::Var(var) => f(var),
            ExprKind::Shape(_) => {}
            ExprKind::Tuple(fields) => fields.iter().for_each(|e| e.visit_vars(f)),
            ExprKind::TupleGetItem(tuple, _) => tuple.visit_vars(f),
            ExprKind::Call(call) => call.args.iter().for_each(|e| e.visit_vars(f)),
            ExprKind::Function(func) => func.body.visit_vars(f),
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Expr::ptr_eq(self, other) || self.0 == other.0
    }
}

impl From<&Var> for Expr {
    fn from(var: &Var) -> Self {
        Expr::var(var)
    }
}

impl From<Call> for Expr {
    fn from(call: Call) -> Self {
        Expr::call(call)
    }
}

// ──────────────────────────────── Bindings ───────────────────────────────

/// One entry of a binding block.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// `var = value`
    Var { var: Var, value: Expr },

    /// Match the runtime shape of `value` against `pattern`, solving the
    /// symbolic dimensions it names. Optionally re-binds `value` to `var`.
    MatchShape {
        var: Option<Var>,
        value: Expr,
        pattern: Vec<SymbolicExpr>,
    },
}

impl Binding {
    pub fn var(&self) -> Option<&Var> {
        match self {
            Binding::Var { var, .. } => Some(var),
            Binding::MatchShape { var, .. } => var.as_ref(),
        }
    }

    pub fn value(&self) -> &Expr {
        match self {
            Binding::Var { value, .. } | Binding::MatchShape { value, .. } => value,
        }
    }
}

/// Ordered bindings executed in program order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BindingBlock {
    pub bindings: Vec<Binding>,
    /// Dataflow blocks contain only side-effect-free bindings.
    pub dataflow: bool,
}

impl BindingBlock {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self {
            bindings,
            dataflow: false,
        }
    }

    pub fn dataflow(bindings: Vec<Binding>) -> Self {
        Self {
            bindings,
            dataflow: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Binding blocks followed by a trailing expression.
#[derive(Debug, Clone, PartialEq)]
pub struct SeqExpr {
    pub blocks: Vec<BindingBlock>,
    pub body: Expr,
}

impl SeqExpr {
    pub fn new(blocks: Vec<BindingBlock>, body: Expr) -> Self {
        Self { blocks, body }
    }

    /// Iterate over every binding of every block.
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.blocks.iter().flat_map(|b| b.bindings.iter())
    }

    fn visit_vars(&self, f: &mut impl FnMut(&Var)) {
        for binding in self.bindings() {
            binding.value().visit_vars(f);
        }
        self.body.visit_vars(f);
    }
}

// ──────────────────────────────── Functions ──────────────────────────────

/// A dataflow function.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub params: Vec<Var>,
    pub body: SeqExpr,
    pub ret_info: StructInfo,
}

impl Function {
    /// Create a function; the return descriptor is taken from the body.
    pub fn new(params: Vec<Var>, blocks: Vec<BindingBlock>, body: Expr) -> Self {
        let ret_info = body.struct_info().cloned().unwrap_or(StructInfo::Object);
        Self {
            params,
            body: SeqExpr::new(blocks, body),
            ret_info,
        }
    }
}

/// A module-level function.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleFunc {
    /// A dataflow function built from bindings.
    Graph(Function),

    /// A generated scalar subroutine over the shape heap.
    Prim(PrimFunc),
}

impl ModuleFunc {
    pub fn as_graph(&self) -> Option<&Function> {
        match self {
            ModuleFunc::Graph(func) => Some(func),
            ModuleFunc::Prim(_) => None,
        }
    }

    pub fn as_prim(&self) -> Option<&PrimFunc> {
        match self {
            ModuleFunc::Prim(func) => Some(func),
            ModuleFunc::Graph(_) => None,
        }
    }
}

// ──────────────────────────────── IrModule ───────────────────────────────

/// A compilation unit: named functions in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IrModule {
    functions: Vec<(String, ModuleFunc)>,

    /// Lookup table: function name -> position in `functions`.
    index: HashMap<String, usize>,
}

impl IrModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new function.
    pub fn add(&mut self, name: impl Into<String>, func: ModuleFunc) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(Error::InvalidIr(format!("function '{name}' is already defined")));
        }
        self.index.insert(name.clone(), self.functions.len());
        self.functions.push((name, func));
        Ok(())
    }

    /// Replace a function in place, or append it if it does not exist.
    pub fn update(&mut self, name: &str, func: ModuleFunc) {
        match self.index.get(name) {
            Some(&pos) => self.functions[pos].1 = func,
            None => {
                self.index.insert(name.to_string(), self.functions.len());
                self.functions.push((name.to_string(), func));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModuleFunc> {
        self.index.get(name).map(|&pos| &self.functions[pos].1)
    }

    /// Look up a dataflow function by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.get(name).and_then(ModuleFunc::as_graph)
    }

    /// Look up a generated scalar subroutine by name.
    pub fn prim_func(&self, name: &str) -> Option<&PrimFunc> {
        self.get(name).and_then(ModuleFunc::as_prim)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterate over functions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = (&str, &ModuleFunc)> {
        self.functions.iter().map(|(n, f)| (n.as_str(), f))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

// ──────────────────────────────── Display ────────────────────────────────

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name_hint())
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.callee_name())?;
        write_list(f, &self.args)?;
        f.write_str(")")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Var(var) => write!(f, "{var}"),
            ExprKind::Shape(values) => {
                f.write_str("shape(")?;
                write_list(f, values)?;
                f.write_str(")")
            }
            ExprKind::Tuple(fields) => {
                f.write_str("(")?;
                write_list(f, fields)?;
                f.write_str(")")
            }
            ExprKind::TupleGetItem(tuple, index) => write!(f, "{tuple}[{index}]"),
            ExprKind::Call(call) => write!(f, "{call}"),
            ExprKind::Function(func) => {
                f.write_str("fn(")?;
                write_list(f, &func.params)?;
                f.write_str(")")
            }
        }
    }
}
