pub mod const_fold;
pub mod cse;
pub mod dce;
pub mod inline;
pub mod validate;

pub use const_fold::ConstFoldPass;
pub use cse::CsePass;
pub use dce::DcePass;
pub use inline::InlinePass;
pub use validate::ValidatePass;

use std::collections::HashMap;

use crate::config::OptimizerConfig;
use crate::error::PassError;
use crate::ir::instr::IrInstr;
use crate::ir::module::IrModule;
use crate::ir::value::{Operand, ValueId};

/// A compiler pass that operates on an `IrModule` in place.
///
/// Passes must be deterministic: given the same `IrModule`, the transformed
/// output must be identical across runs (no global mutable state, no randomness).
pub trait Pass {
    /// Human-readable name, used in error messages and diagnostics.
    fn name(&self) -> &'static str;

    /// Run the pass on the module.
    ///
    /// On success, the module is in a valid state for the next pass.
    /// On error, the module state is unspecified and the pipeline aborts.
    fn run(&mut self, module: &mut IrModule) -> Result<(), PassError>;
}

/// Manages and executes an ordered sequence of compiler passes.
///
/// Passes run in the order they were registered. The pipeline aborts at the
/// first error.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Builds the standard pipeline for `config`:
    /// `validate → cse → inline → const-fold → cse → dce → validate`.
    pub fn from_config(config: &OptimizerConfig) -> Self {
        let mut pm = Self::new();
        pm.add_pass(ValidatePass);
        if config.cse {
            pm.add_pass(CsePass);
        }
        if config.inline {
            pm.add_pass(InlinePass {
                max_instrs: config.max_inline_instrs,
            });
        }
        if config.const_fold {
            pm.add_pass(ConstFoldPass);
        }
        if config.cse && (config.inline || config.const_fold) {
            pm.add_pass(CsePass);
        }
        if config.cse || config.inline || config.const_fold {
            pm.add_pass(DcePass);
            pm.add_pass(ValidatePass);
        }
        pm
    }

    /// Appends a pass to the end of the pipeline.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Runs all passes in registration order on `module`.
    ///
    /// Returns `Err((pass_name, error))` at the first failure.
    pub fn run(&mut self, module: &mut IrModule) -> Result<(), (String, PassError)> {
        for pass in &mut self.passes {
            let before: usize = module.functions().iter().map(|f| f.instr_count()).sum();
            pass.run(module).map_err(|e| (pass.name().to_owned(), e))?;
            let after: usize = module.functions().iter().map(|f| f.instr_count()).sum();
            tracing::debug!(pass = pass.name(), before, after, "pass complete");
        }
        Ok(())
    }

    /// Returns the names of all registered passes in pipeline order.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the optimizer pipeline on a copy of `module` and returns the copy.
pub fn optimize(module: &IrModule, config: &OptimizerConfig) -> Result<IrModule, PassError> {
    let mut out = module.clone();
    let mut pm = PassManager::from_config(config);
    pm.run(&mut out).map_err(|(pass, e)| {
        tracing::error!(pass = %pass, error = %e, "optimizer invariant violated");
        e
    })?;
    Ok(out)
}

/// Rewrites every operand that has a pending replacement.
pub(crate) fn apply_replacements(instr: &mut IrInstr, reps: &HashMap<ValueId, Operand>) {
    if reps.is_empty() {
        return;
    }
    for op in instr.operands_mut() {
        if let Operand::Value(v) = op {
            if let Some(r) = resolve_replacement(*v, reps) {
                *op = r;
            }
        }
    }
}

/// Follows a replacement chain to its end.
pub(crate) fn resolve_replacement(v: ValueId, reps: &HashMap<ValueId, Operand>) -> Option<Operand> {
    let mut current = *reps.get(&v)?;
    // Replaced values are never reintroduced, so chains cannot cycle.
    while let Operand::Value(next) = current {
        match reps.get(&next) {
            Some(r) => current = *r,
            None => break,
        }
    }
    Some(current)
}

/// Applies `reps` to every instruction of every block in `func`.
pub(crate) fn sweep_replacements(
    func: &mut crate::ir::function::IrFunction,
    reps: &HashMap<ValueId, Operand>,
) {
    if reps.is_empty() {
        return;
    }
    for block in &mut func.blocks {
        for instr in &mut block.instrs {
            apply_replacements(instr, reps);
        }
    }
    for old in reps.keys() {
        func.value_types.remove(old);
    }
}
