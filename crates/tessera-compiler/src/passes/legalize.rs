//! Legalization pass.
//!
//! Rewrites operator calls into backend kernel calls once every shape they
//! touch is known. Callbacks come from a caller-supplied customization map
//! first and the operator registry second. After each function is rewritten,
//! bindings left dead by the replacements are removed.

use std::collections::HashMap;
use tessera_core::mutator::walk_call;
use tessera_core::{
    BlockBuilder, CALL_TIR_OP, Call, Error, Expr, ExprMutator, IrModule, LegalizeFn, ModuleFunc,
    OperatorRegistry, Pass, Result, Stage,
};

use super::{graph_functions, remove_all_unused};

/// Pass that lowers operator calls through their legalization callbacks.
#[derive(Default)]
pub struct LegalizeOps {
    customize: HashMap<String, LegalizeFn>,
}

/// Non-fatal diagnostics collected during one legalization run.
#[derive(Debug, Default)]
pub struct LegalizeReport {
    pub warnings: Vec<Error>,
}

impl LegalizeReport {
    /// Operators that had no legalization callback, in encounter order.
    pub fn missing_ops(&self) -> impl Iterator<Item = &str> {
        self.warnings.iter().filter_map(|w| match w {
            Error::MissingLegalization { op } => Some(op.as_str()),
            _ => None,
        })
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl LegalizeOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pass whose callbacks override the registry's for the named
    /// operators.
    pub fn with_customization(customize: HashMap<String, LegalizeFn>) -> Self {
        Self { customize }
    }

    /// Override the callback for one operator.
    pub fn customize(mut self, op: impl Into<String>, legalize: LegalizeFn) -> Self {
        self.customize.insert(op.into(), legalize);
        self
    }

    /// Legalize every function of `module` and return the new module along
    /// with the warnings raised.
    #[tracing::instrument(skip_all, fields(functions = module.len()))]
    pub fn legalize(
        &self,
        module: &IrModule,
        registry: &OperatorRegistry,
    ) -> Result<(IrModule, LegalizeReport)> {
        let mut legalizer = Legalizer {
            builder: BlockBuilder::with_module(registry, module.clone()),
            customize: &self.customize,
            report: LegalizeReport::default(),
        };

        for (name, func) in graph_functions(module) {
            let func = legalizer.rewrite_function(func)?;
            let func = remove_all_unused(&func);
            legalizer
                .builder
                .update_function(name, ModuleFunc::Graph(func));
        }

        Ok((legalizer.builder.into_module(), legalizer.report))
    }
}

struct Legalizer<'a, 'r> {
    builder: BlockBuilder<'r>,
    customize: &'a HashMap<String, LegalizeFn>,
    report: LegalizeReport,
}

impl Legalizer<'_, '_> {
    fn resolve(&self, op: &str) -> Option<LegalizeFn> {
        self.customize
            .get(op)
            .cloned()
            .or_else(|| self.builder.registry().legalizer(op))
    }
}

impl<'r> ExprMutator<'r> for Legalizer<'_, 'r> {
    fn builder(&mut self) -> &mut BlockBuilder<'r> {
        &mut self.builder
    }

    fn visit_call(&mut self, expr: &Expr, call: &Call) -> Result<Expr> {
        let visited = walk_call(self, expr, call)?;
        let Some(call) = visited.as_call() else {
            return Ok(visited);
        };
        let Some(op) = call.op_name() else {
            return Ok(visited);
        };

        let Some(legalize) = self.resolve(op) else {
            if op != CALL_TIR_OP {
                tracing::warn!(op, "no legalization callback found");
                self.report.warnings.push(Error::MissingLegalization {
                    op: op.to_string(),
                });
            }
            return Ok(visited);
        };

        if !know_all_shapes(&visited, call) {
            tracing::trace!(%call, "shape not fully known, skipping");
            return Ok(visited);
        }

        legalize(&mut self.builder, call)
    }
}

/// Whether every argument and the result of a call have fully known shapes.
fn know_all_shapes(expr: &Expr, call: &Call) -> bool {
    call.args
        .iter()
        .chain(std::iter::once(expr))
        .all(|e| matches!(e.struct_info(), Some(info) if info.know_all_shape_values()))
}

impl Pass for LegalizeOps {
    fn name(&self) -> &str {
        "legalize_ops"
    }

    fn stage(&self) -> Stage {
        Stage::Legalization
    }

    fn run(&self, module: &IrModule, registry: &OperatorRegistry) -> Result<IrModule> {
        let (module, report) = self.legalize(module, registry)?;
        if !report.is_clean() {
            tracing::debug!(
                warnings = report.warnings.len(),
                "legalization left calls in place"
            );
        }
        Ok(module)
    }
}
