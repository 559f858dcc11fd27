//! Pass pipeline for the Tessera compiler.
//!
//! This crate takes a module of binding-block functions and lowers it
//! towards backend code generation. Passes run in stages:
//! 1. **Inference** - Attach an up-to-date descriptor to every operator call
//! 2. **Legalization** - Rewrite calls with fully known shapes into kernel calls
//! 3. **Optimization** - Custom passes (empty by default)
//! 4. **Lowering** - Thread symbolic dimensions through a runtime shape heap
//!
//! # Example
//!
//! ```ignore
//! use tessera_compiler::CompilerPipeline;
//!
//! let registry = tessera_operators::core_operator_registry();
//! let lowered = CompilerPipeline::new().run(&module, &registry)?;
//! ```

pub mod passes;
pub mod runtime;

pub use passes::{LegalizeOps, LegalizeReport, NormalizePass, ShapeLowerPass, remove_all_unused};
pub use runtime::{ALLOC_SHAPE_HEAP, CONSTRUCT_SHAPE, DECODE_SHAPE, FREE_SHAPE_HEAP};

// Re-export commonly used types from tessera-core
pub use tessera_core::{IrModule, Pass, Stage};

use tessera_core::{OperatorRegistry, Result};

/// Compiler pipeline with pluggable passes.
///
/// The pipeline runs in fixed stages: Inference → Legalization →
/// Optimization → Lowering. Built-in passes are registered in their stages,
/// and custom passes can be added via `add_pass()`.
pub struct CompilerPipeline {
    /// All passes to run, ordered by (stage, registration order).
    passes: Vec<Box<dyn Pass>>,
}

impl CompilerPipeline {
    /// Create a pipeline with built-in passes.
    ///
    /// The built-in passes are:
    /// - `NormalizePass` (Inference stage)
    /// - `LegalizeOps` with no customization (Legalization stage)
    /// - `ShapeLowerPass` (Lowering stage)
    pub fn new() -> Self {
        Self::with_legalizer(LegalizeOps::new())
    }

    /// Create a pipeline whose legalization stage uses `legalize`, e.g. one
    /// carrying customized callbacks.
    pub fn with_legalizer(legalize: LegalizeOps) -> Self {
        let mut pipeline = Self::empty();
        pipeline
            .add_pass(NormalizePass::new())
            .add_pass(legalize)
            .add_pass(ShapeLowerPass::new());
        pipeline
    }

    /// Create a pipeline with no passes.
    pub fn empty() -> Self {
        Self { passes: Vec::new() }
    }

    /// Add a custom pass to the pipeline.
    ///
    /// The pass will be inserted into the appropriate stage (determined by
    /// `pass.stage()`). Within a stage, passes run in the order they were
    /// registered.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Names of the registered passes, in execution order.
    pub fn pass_names(&self) -> Vec<&str> {
        let mut passes: Vec<_> = self.passes.iter().collect();
        passes.sort_by_key(|p| p.stage());
        passes.into_iter().map(|p| p.name()).collect()
    }

    /// Run every pass in stage order and return the lowered module.
    ///
    /// The input module is left untouched. The first failing pass aborts the
    /// run.
    #[tracing::instrument(skip_all, fields(functions = module.len(), passes = self.passes.len()))]
    pub fn run(&mut self, module: &IrModule, registry: &OperatorRegistry) -> Result<IrModule> {
        // Stable: registration order is kept within a stage
        self.passes.sort_by_key(|p| p.stage());

        let mut module = module.clone();
        for pass in &self.passes {
            let _span =
                tracing::debug_span!("pass", name = pass.name(), stage = ?pass.stage()).entered();
            module = pass.run(&module, registry)?;
        }
        Ok(module)
    }
}

impl Default for CompilerPipeline {
    fn default() -> Self {
        Self::new()
    }
}
