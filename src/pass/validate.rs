//! SSA validation pass.
//!
//! Runs before and after optimization. A failure before optimization means the
//! flattener emitted bad IR; a failure afterwards means an optimizing pass
//! broke an invariant. Either way the pipeline stops rather than produce
//! wrong results.

use std::collections::HashSet;

use crate::error::PassError;
use crate::ir::instr::IrInstr;
use crate::ir::module::IrModule;
use crate::ir::value::ValueId;
use crate::pass::Pass;

/// Validates SSA invariants across the entire module.
///
/// Checks:
/// 1. Every value used in an instruction is defined before its first use
///    (linear scan within each function; every block is created after the
///    blocks that dominate it, so definition order follows block order).
/// 2. Every value is defined exactly once.
/// 3. Every block ends with exactly one terminator as its last instruction.
/// 4. Every call names a function in the module and passes the right number
///    of arguments.
pub struct ValidatePass;

impl Pass for ValidatePass {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn run(&mut self, module: &mut IrModule) -> Result<(), PassError> {
        for func in module.functions() {
            let func_name = &func.name;
            let mut defined: HashSet<ValueId> = HashSet::new();

            for block in func.blocks() {
                let block_label = block
                    .name
                    .as_deref()
                    .map(|s| format!("{} ({})", block.id, s))
                    .unwrap_or_else(|| block.id.to_string());

                // Block params are defined at block entry.
                for param in &block.params {
                    if !defined.insert(param.id) {
                        return Err(PassError::MultipleDefinition {
                            func: func_name.clone(),
                            value: param.id.to_string(),
                        });
                    }
                }

                let n = block.instrs.len();
                for (i, instr) in block.instrs.iter().enumerate() {
                    if instr.is_terminator() && i != n - 1 {
                        return Err(PassError::MissingTerminator {
                            func: func_name.clone(),
                            block: block_label.clone(),
                        });
                    }

                    for operand in instr.value_operands() {
                        if !defined.contains(&operand) {
                            return Err(PassError::UseBeforeDef {
                                func: func_name.clone(),
                                value: operand.to_string(),
                            });
                        }
                    }

                    if let IrInstr::Call { callee, args, .. } = instr {
                        let target = module.function_by_name(callee).ok_or_else(|| {
                            PassError::UnknownCallee {
                                func: func_name.clone(),
                                callee: callee.clone(),
                            }
                        })?;
                        if target.params.len() != args.len() {
                            return Err(PassError::CallArity {
                                func: func_name.clone(),
                                callee: callee.clone(),
                                expected: target.params.len(),
                                found: args.len(),
                            });
                        }
                    }

                    for result in instr.results() {
                        if !defined.insert(result) {
                            return Err(PassError::MultipleDefinition {
                                func: func_name.clone(),
                                value: result.to_string(),
                            });
                        }
                    }
                }

                if !block.is_sealed() {
                    return Err(PassError::MissingTerminator {
                        func: func_name.clone(),
                        block: block_label,
                    });
                }
            }
        }
        Ok(())
    }
}
