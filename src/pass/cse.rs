//! Common Subexpression Elimination.
//!
//! Deduplication of pure instructions along the dominator tree: the first
//! occurrence of a computation in program order is kept, and later
//! occurrences in the same block or in any block it dominates are dropped
//! and their results redirected to the first one's. A computation in one
//! branch of an `if` never stands in for one in the other branch.
//!
//! Operands compare by identity: two SSA values are the same operand only if
//! they are the same `ValueId`. Literals compare structurally (by bit
//! pattern), so `f(2)` and `f(2)` share a key while two separately computed
//! but numerically equal matrices do not.

use std::collections::{HashMap, HashSet};

use crate::error::PassError;
use crate::ir::builtin::Builtin;
use crate::ir::function::IrFunction;
use crate::ir::instr::{BinOp, IrInstr, UnaryOp};
use crate::ir::module::IrModule;
use crate::ir::value::{Operand, ValueId};
use crate::pass::{apply_replacements, sweep_replacements, Pass};

pub struct CsePass;

impl Pass for CsePass {
    fn name(&self) -> &'static str {
        "cse"
    }

    fn run(&mut self, module: &mut IrModule) -> Result<(), PassError> {
        let pure_callees = module.pure_functions();
        for func in module.functions_mut() {
            let eliminated = cse_function(func, &pure_callees);
            if eliminated > 0 {
                tracing::debug!(function = %func.name, eliminated, "cse");
            }
        }
        Ok(())
    }
}

/// A literal or value identity, hashable and totally ordered.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
enum OperandKey {
    Value(u32),
    Scalar(u64),
    Bool(bool),
}

impl From<&Operand> for OperandKey {
    fn from(op: &Operand) -> Self {
        match op {
            Operand::Value(v) => OperandKey::Value(v.0),
            Operand::Scalar(x) => OperandKey::Scalar(x.to_bits()),
            Operand::Bool(b) => OperandKey::Bool(*b),
        }
    }
}

fn keys(ops: &[Operand]) -> Vec<OperandKey> {
    ops.iter().map(OperandKey::from).collect()
}

/// A hashable key that identifies a pure instruction's computation.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CseKey {
    BinOp {
        op: BinOp,
        a: OperandKey,
        b: OperandKey,
    },
    UnaryOp {
        op: UnaryOp,
        operand: OperandKey,
    },
    Intrinsic {
        op: Builtin,
        args: Vec<OperandKey>,
    },
    MakeMatrix {
        rows: usize,
        cols: usize,
        elems: Vec<OperandKey>,
    },
    Index {
        base: OperandKey,
        row: OperandKey,
        col: OperandKey,
    },
    Call {
        callee: String,
        args: Vec<OperandKey>,
    },
}

/// Returns `None` for instructions that must never be merged: terminators,
/// impure built-ins, and calls to impure functions.
fn cse_key(instr: &IrInstr, pure_callees: &HashSet<String>) -> Option<CseKey> {
    if !instr.is_pure(pure_callees) {
        return None;
    }
    match instr {
        IrInstr::BinOp { op, lhs, rhs, .. } => {
            let (mut a, mut b) = (OperandKey::from(lhs), OperandKey::from(rhs));
            if op.is_commutative() && a > b {
                std::mem::swap(&mut a, &mut b);
            }
            Some(CseKey::BinOp { op: *op, a, b })
        }
        IrInstr::UnaryOp { op, operand, .. } => Some(CseKey::UnaryOp {
            op: *op,
            operand: operand.into(),
        }),
        IrInstr::Intrinsic {
            op,
            args,
            result: Some(_),
            ..
        } => Some(CseKey::Intrinsic {
            op: *op,
            args: keys(args),
        }),
        IrInstr::MakeMatrix {
            rows, cols, elems, ..
        } => Some(CseKey::MakeMatrix {
            rows: *rows,
            cols: *cols,
            elems: keys(elems),
        }),
        IrInstr::Index { base, row, col, .. } => Some(CseKey::Index {
            base: base.into(),
            row: row.into(),
            col: col.into(),
        }),
        IrInstr::Call { callee, args, .. } => Some(CseKey::Call {
            callee: callee.clone(),
            args: keys(args),
        }),
        _ => None,
    }
}

/// Immediate dominator of every block, by index. `None` for the entry block
/// and for blocks no path from the entry reaches.
fn immediate_dominators(func: &IrFunction) -> Vec<Option<usize>> {
    let n = func.blocks.len();
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, block) in func.blocks.iter().enumerate() {
        for succ in block.terminator().map(IrInstr::successors).unwrap_or_default() {
            if let Some(p) = preds.get_mut(succ.0 as usize) {
                p.push(i);
            }
        }
    }

    // `dom[b][d]` is true when `d` dominates `b`; `None` until `b` is reached.
    let mut dom: Vec<Option<Vec<bool>>> = vec![None; n];
    if let Some(entry) = dom.first_mut() {
        let mut set = vec![false; n];
        set[0] = true;
        *entry = Some(set);
    }
    let mut changed = true;
    while changed {
        changed = false;
        for b in 1..n {
            let mut set: Option<Vec<bool>> = None;
            for &p in &preds[b] {
                if let Some(pd) = &dom[p] {
                    set = Some(match set {
                        None => pd.clone(),
                        Some(acc) => acc.iter().zip(pd).map(|(x, y)| *x && *y).collect(),
                    });
                }
            }
            if let Some(mut set) = set {
                set[b] = true;
                if dom[b].as_ref() != Some(&set) {
                    dom[b] = Some(set);
                    changed = true;
                }
            }
        }
    }

    // Strict dominators form a chain; the nearest one has the most
    // dominators of its own.
    let depth = |d: usize| dom[d].as_ref().map_or(0, |s| s.iter().filter(|x| **x).count());
    (0..n)
        .map(|b| {
            let set = dom[b].as_ref()?;
            (0..n).filter(|&d| d != b && set[d]).max_by_key(|&d| depth(d))
        })
        .collect()
}

/// Returns the number of instructions removed.
fn cse_function(func: &mut IrFunction, pure_callees: &HashSet<String>) -> usize {
    let idom = immediate_dominators(func);
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); idom.len()];
    let mut roots = Vec::new();
    for (b, parent) in idom.iter().enumerate() {
        match parent {
            Some(d) => children[*d].push(b),
            None => roots.push(b),
        }
    }

    let mut replacements: HashMap<ValueId, Operand> = HashMap::new();
    let mut eliminated = 0;

    // Preorder walk of the dominator tree. Each block starts from the
    // computations available at the end of its immediate dominator.
    let mut stack: Vec<(usize, HashMap<CseKey, Vec<ValueId>>)> = roots
        .into_iter()
        .rev()
        .map(|b| (b, HashMap::new()))
        .collect();
    while let Some((b, mut known)) = stack.pop() {
        let block = &mut func.blocks[b];
        let mut kept = Vec::with_capacity(block.instrs.len());

        for mut instr in block.instrs.drain(..) {
            apply_replacements(&mut instr, &replacements);
            match cse_key(&instr, pure_callees) {
                Some(key) => {
                    if let Some(first) = known.get(&key) {
                        for (dup, orig) in instr.results().into_iter().zip(first) {
                            tracing::trace!(
                                function = %func.name,
                                eliminated = %dup,
                                kept = %orig,
                                "cse: redundant computation"
                            );
                            replacements.insert(dup, Operand::Value(*orig));
                        }
                        eliminated += 1;
                    } else {
                        known.insert(key, instr.results());
                        kept.push(instr);
                    }
                }
                None => kept.push(instr),
            }
        }
        block.instrs = kept;

        for &child in children[b].iter().rev() {
            stack.push((child, known.clone()));
        }
    }

    // Block arguments on back edges and joins see the replacements too.
    sweep_replacements(func, &replacements);
    eliminated
}
