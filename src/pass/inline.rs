//! Function inlining.
//!
//! Only expression-bodied, pure callees are expanded. A statement-bodied
//! function (loops, branches, multiple returns) always stays behind a call,
//! as does any impure function. Expansion is recursive: a callee's own calls
//! are inlined too, guarded by a stack of the functions currently being
//! expanded so that a cycle in the call graph leaves the closing call
//! out-of-line instead of expanding forever.

use std::collections::HashMap;

use crate::error::PassError;
use crate::ir::function::{BodyKind, IrFunction};
use crate::ir::instr::IrInstr;
use crate::ir::module::IrModule;
use crate::ir::value::{Operand, ValueId};
use crate::pass::{apply_replacements, sweep_replacements, Pass};

pub struct InlinePass {
    /// Callees with more non-terminator instructions than this stay out-of-line.
    pub max_instrs: usize,
}

impl Default for InlinePass {
    fn default() -> Self {
        Self { max_instrs: 32 }
    }
}

impl Pass for InlinePass {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn run(&mut self, module: &mut IrModule) -> Result<(), PassError> {
        // Snapshot of the callees as they were before this pass touched any
        // function, so expansion never sees a half-rewritten body.
        let candidates: HashMap<String, IrFunction> = module
            .functions()
            .iter()
            .filter(|f| self.is_candidate(f))
            .map(|f| (f.name.clone(), f.clone()))
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }

        for caller in module.functions_mut() {
            let inlined = inline_into(caller, &candidates);
            if inlined > 0 {
                tracing::debug!(function = %caller.name, inlined, "inline");
            }
        }
        Ok(())
    }
}

impl InlinePass {
    fn is_candidate(&self, f: &IrFunction) -> bool {
        if f.body_kind != BodyKind::Expression || !f.purity.is_pure() || f.blocks.len() != 1 {
            return false;
        }
        let body = f.blocks[0].instrs.iter().filter(|i| !i.is_terminator()).count();
        body <= self.max_instrs
    }
}

/// Expands every eligible call in `caller`. Returns the number of call sites
/// replaced at the top level.
fn inline_into(caller: &mut IrFunction, candidates: &HashMap<String, IrFunction>) -> usize {
    let mut stack = vec![caller.name.clone()];
    let mut aliases: HashMap<ValueId, Operand> = HashMap::new();
    let mut inlined = 0;

    for block_idx in 0..caller.blocks.len() {
        let instrs = std::mem::take(&mut caller.blocks[block_idx].instrs);
        let mut out = Vec::with_capacity(instrs.len());

        for mut instr in instrs {
            apply_replacements(&mut instr, &aliases);
            let Some((callee, args, results)) = expandable(&instr, candidates, &stack) else {
                out.push(instr);
                continue;
            };
            tracing::trace!(caller = %caller.name, callee = %callee.name, "inlining call");
            stack.push(callee.name.clone());
            let returned = expand(caller, callee, &args, candidates, &mut stack, &mut out);
            stack.pop();
            for (r, v) in results.into_iter().zip(returned) {
                aliases.insert(r, v);
            }
            inlined += 1;
        }
        caller.blocks[block_idx].instrs = out;
    }

    sweep_replacements(caller, &aliases);
    inlined
}

/// Returns the callee, arguments, and call results if `instr` is a call that
/// may be inlined given the current expansion stack.
fn expandable<'c>(
    instr: &IrInstr,
    candidates: &'c HashMap<String, IrFunction>,
    stack: &[String],
) -> Option<(&'c IrFunction, Vec<Operand>, Vec<ValueId>)> {
    let IrInstr::Call {
        callee,
        args,
        results,
        ..
    } = instr
    else {
        return None;
    };
    if stack.iter().any(|s| s == callee) {
        return None;
    }
    let f = candidates.get(callee)?;
    Some((f, args.clone(), results.clone()))
}

/// Emits a copy of `callee`'s body into `out`, with parameters bound to
/// `args` and every defined value renamed to a fresh value of `caller`.
/// Returns the operands standing in for the callee's return values.
fn expand(
    caller: &mut IrFunction,
    callee: &IrFunction,
    args: &[Operand],
    candidates: &HashMap<String, IrFunction>,
    stack: &mut Vec<String>,
    out: &mut Vec<IrInstr>,
) -> Vec<Operand> {
    let mut val_map: HashMap<ValueId, Operand> = HashMap::new();
    for (param, arg) in callee.blocks[0].params.iter().zip(args) {
        val_map.insert(param.id, *arg);
    }

    let mut returned = Vec::new();
    for instr in &callee.blocks[0].instrs {
        let mut ci = instr.clone();
        remap(&mut ci, &val_map);

        if let IrInstr::Return { values } = &ci {
            returned = values.clone();
            break;
        }

        if let Some((nested, nested_args, results)) = expandable(&ci, candidates, stack) {
            stack.push(nested.name.clone());
            let nested_ret = expand(caller, nested, &nested_args, candidates, stack, out);
            stack.pop();
            for (r, v) in results.into_iter().zip(nested_ret) {
                val_map.insert(r, v);
            }
            continue;
        }

        for r in ci.results_mut() {
            let fresh = caller.fresh_value();
            if let Some(ty) = callee.value_type(*r) {
                caller.value_types.insert(fresh, ty);
            }
            val_map.insert(*r, Operand::Value(fresh));
            *r = fresh;
        }
        out.push(ci);
    }
    returned
}

/// Single-step operand renaming. Keys are callee values and targets are
/// caller values, so chains must not be followed.
fn remap(instr: &mut IrInstr, map: &HashMap<ValueId, Operand>) {
    for op in instr.operands_mut() {
        if let Operand::Value(v) = op {
            if let Some(r) = map.get(v) {
                *op = *r;
            }
        }
    }
}
