//! Constant folding and identity simplification.
//!
//! `ConstFoldPass` walks each block forward and applies two reductions:
//!
//! **A. Constant evaluation.** An operator or pure element-wise built-in whose
//! operands are all literals is evaluated with the evaluator's own arithmetic
//! and its result becomes a literal operand. Only scalar and bool results are
//! folded; matrices stay as instructions.
//!
//! **B. Identity simplification.** `x * 1`, `1 * x` and `x / 1` are replaced
//! by `x`. These are exact for every IEEE-754 value; `x + 0` is not (it turns
//! `-0` into `+0`) and is left alone.
//!
//! `ifelse` with a literal predicate selects its branch operand directly.
//! Anything whose evaluation would fail at run time is left for the evaluator
//! to report.

use std::collections::HashMap;

use crate::error::PassError;
use crate::interp::ops::{eval_binary, eval_pure_builtin, eval_unary};
use crate::interp::Value;
use crate::ir::builtin::Builtin;
use crate::ir::function::IrFunction;
use crate::ir::instr::{BinOp, IrInstr};
use crate::ir::module::IrModule;
use crate::ir::value::{Operand, ValueId};
use crate::pass::{apply_replacements, sweep_replacements, Pass};

pub struct ConstFoldPass;

impl Pass for ConstFoldPass {
    fn name(&self) -> &'static str {
        "const-fold"
    }

    fn run(&mut self, module: &mut IrModule) -> Result<(), PassError> {
        for func in module.functions_mut() {
            let folded = const_fold_func(func);
            if folded > 0 {
                tracing::debug!(function = %func.name, folded, "const-fold");
            }
        }
        Ok(())
    }
}

fn literal(op: &Operand) -> Option<Value> {
    match op {
        Operand::Scalar(x) => Some(Value::Scalar(*x)),
        Operand::Bool(b) => Some(Value::Bool(*b)),
        Operand::Value(_) => None,
    }
}

fn to_operand(v: Value) -> Option<Operand> {
    match v {
        Value::Scalar(x) => Some(Operand::Scalar(x)),
        Value::Bool(b) => Some(Operand::Bool(b)),
        Value::Matrix(_) => None,
    }
}

fn is_one(op: &Operand) -> bool {
    matches!(op, Operand::Scalar(x) if *x == 1.0)
}

/// What an instruction reduces to, if anything.
fn fold(instr: &IrInstr) -> Option<(ValueId, Operand)> {
    match instr {
        IrInstr::BinOp {
            result,
            op,
            lhs,
            rhs,
            ..
        } => {
            if let (Some(l), Some(r)) = (literal(lhs), literal(rhs)) {
                let v = eval_binary(*op, &l, &r).ok()?;
                return Some((*result, to_operand(v)?));
            }
            match op {
                BinOp::Mul if is_one(rhs) => Some((*result, *lhs)),
                BinOp::Mul if is_one(lhs) => Some((*result, *rhs)),
                BinOp::Div if is_one(rhs) => Some((*result, *lhs)),
                _ => None,
            }
        }
        IrInstr::UnaryOp {
            result, op, operand, ..
        } => {
            let v = eval_unary(*op, &literal(operand)?).ok()?;
            Some((*result, to_operand(v)?))
        }
        IrInstr::Intrinsic {
            result: Some(result),
            op: Builtin::IfElse,
            args,
            ..
        } => match args.first()? {
            Operand::Bool(true) => Some((*result, *args.get(1)?)),
            Operand::Bool(false) => Some((*result, *args.get(2)?)),
            _ => None,
        },
        IrInstr::Intrinsic {
            result: Some(result),
            op,
            args,
            ..
        } if op.is_pure() && op.is_elementwise() => {
            let argv = args.iter().map(literal).collect::<Option<Vec<_>>>()?;
            let v = eval_pure_builtin(*op, &argv).ok()?;
            Some((*result, to_operand(v)?))
        }
        _ => None,
    }
}

/// Returns the number of instructions removed.
fn const_fold_func(func: &mut IrFunction) -> usize {
    let mut reps: HashMap<ValueId, Operand> = HashMap::new();
    let mut folded = 0;

    for block in &mut func.blocks {
        let mut new_instrs = Vec::with_capacity(block.instrs.len());
        for mut instr in block.instrs.drain(..) {
            apply_replacements(&mut instr, &reps);
            match fold(&instr) {
                Some((result, replacement)) => {
                    tracing::trace!(function = %func.name, value = %result, to = %replacement, "folded");
                    reps.insert(result, replacement);
                    folded += 1;
                }
                None => new_instrs.push(instr),
            }
        }
        block.instrs = new_instrs;
    }

    // Block arguments on back edges may refer to values folded later in
    // block order.
    sweep_replacements(func, &reps);
    folded
}
