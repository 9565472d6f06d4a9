//! Dead Code Elimination.
//!
//! Backward reachability from instructions that must run: terminators,
//! impure built-ins, calls to impure functions, and anything that may raise
//! a runtime error. Pure instructions whose results are never reached are
//! removed.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::PassError;
use crate::ir::function::IrFunction;
use crate::ir::instr::IrInstr;
use crate::ir::module::IrModule;
use crate::ir::value::ValueId;
use crate::pass::Pass;

pub struct DcePass;

impl Pass for DcePass {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&mut self, module: &mut IrModule) -> Result<(), PassError> {
        let roots = Roots {
            pure_callees: module.pure_functions(),
            infallible_callees: module.infallible_functions(),
        };
        for func in module.functions_mut() {
            dce_function(func, &roots);
        }
        Ok(())
    }
}

struct Roots {
    pure_callees: HashSet<String>,
    infallible_callees: HashSet<String>,
}

impl Roots {
    /// An instruction that must run even when nothing reads its results.
    fn contains(&self, instr: &IrInstr) -> bool {
        !instr.is_pure(&self.pure_callees) || instr.may_fail(&self.infallible_callees)
    }
}

fn dce_function(func: &mut IrFunction, roots: &Roots) {
    // Build result → operands map for backward reachability.
    let mut result_ops: HashMap<ValueId, Vec<ValueId>> = HashMap::new();
    for block in &func.blocks {
        for instr in &block.instrs {
            let ops = instr.value_operands();
            for r in instr.results() {
                result_ops.insert(r, ops.clone());
            }
        }
    }

    // Seed the live set with operands of every root.
    let mut live: HashSet<ValueId> = HashSet::new();
    let mut queue: VecDeque<ValueId> = VecDeque::new();
    for block in &func.blocks {
        for instr in &block.instrs {
            if roots.contains(instr) {
                for op in instr.value_operands() {
                    if live.insert(op) {
                        queue.push_back(op);
                    }
                }
            }
        }
    }

    // BFS: if a value is live, the values it depends on are also live.
    while let Some(vid) = queue.pop_front() {
        if let Some(ops) = result_ops.get(&vid) {
            for &op in ops {
                if live.insert(op) {
                    queue.push_back(op);
                }
            }
        }
    }

    let mut removed = 0usize;
    for block in &mut func.blocks {
        block.instrs.retain(|instr| {
            let keep = roots.contains(instr)
                || instr.results().iter().any(|r| live.contains(r));
            if !keep {
                removed += 1;
                for r in instr.results() {
                    func.value_types.remove(&r);
                }
            }
            keep
        });
    }
    if removed > 0 {
        tracing::debug!(function = %func.name, removed, "dce");
    }
}
