use std::collections::HashSet;

use crate::ir::block::BlockId;
use crate::ir::builtin::Builtin;
use crate::ir::types::IrType;
use crate::ir::value::{Operand, ValueId};

/// Binary operations. Arithmetic is element-wise when either side is a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    /// `%%`, floored modulus.
    Mod,
    Pow,
    /// `%*%`
    MatMul,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    /// Both operands are always evaluated.
    And,
    Or,
}

impl BinOp {
    /// Operators whose operands may be swapped without changing the result.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Mul | BinOp::CmpEq | BinOp::CmpNe | BinOp::And | BinOp::Or
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::CmpEq | BinOp::CmpNe | BinOp::CmpLt | BinOp::CmpLe | BinOp::CmpGt | BinOp::CmpGe
        )
    }

    /// Source-level spelling, used in diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%%",
            BinOp::Pow => "^",
            BinOp::MatMul => "%*%",
            BinOp::CmpEq => "==",
            BinOp::CmpNe => "!=",
            BinOp::CmpLt => "<",
            BinOp::CmpLe => "<=",
            BinOp::CmpGt => ">",
            BinOp::CmpGe => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Mod => "mod",
            BinOp::Pow => "pow",
            BinOp::MatMul => "matmul",
            BinOp::CmpEq => "cmpeq",
            BinOp::CmpNe => "cmpne",
            BinOp::CmpLt => "cmplt",
            BinOp::CmpLe => "cmple",
            BinOp::CmpGt => "cmpgt",
            BinOp::CmpGe => "cmpge",
            BinOp::And => "and",
            BinOp::Or => "or",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnaryOp {
    /// Arithmetic negation: `-x`
    Neg,
    /// Boolean NOT: `!x`
    Not,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Neg => f.write_str("neg"),
            UnaryOp::Not => f.write_str("not"),
        }
    }
}

/// A single instruction in SSA form.
///
/// Invariants:
/// - Every result `ValueId` is assigned exactly once per function.
/// - Terminators (`Br`, `CondBr`, `Return`) are the last instruction in a block.
/// - No instruction may appear after a terminator.
#[derive(Debug, Clone)]
pub enum IrInstr {
    BinOp {
        result: ValueId,
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
        ty: IrType,
    },
    UnaryOp {
        result: ValueId,
        op: UnaryOp,
        operand: Operand,
        ty: IrType,
    },
    /// A call to a built-in. `result` is `None` only for `print`.
    Intrinsic {
        result: Option<ValueId>,
        op: Builtin,
        args: Vec<Operand>,
        ty: Option<IrType>,
    },
    /// A matrix literal, elements in row-major order.
    MakeMatrix {
        result: ValueId,
        rows: usize,
        cols: usize,
        elems: Vec<Operand>,
    },
    /// 1-based cell read `base[row, col]`.
    Index {
        result: ValueId,
        base: Operand,
        row: Operand,
        col: Operand,
    },
    /// A call to a user-defined function, one result per declared return value.
    Call {
        results: Vec<ValueId>,
        callee: String,
        args: Vec<Operand>,
        result_tys: Vec<IrType>,
    },

    // ---- Control flow (terminators) ----
    /// Unconditional branch with block arguments (SSA block params).
    Br {
        target: BlockId,
        args: Vec<Operand>,
    },
    CondBr {
        cond: Operand,
        then_block: BlockId,
        then_args: Vec<Operand>,
        else_block: BlockId,
        else_args: Vec<Operand>,
    },
    /// Return from function. Values must match the function's return types.
    Return {
        values: Vec<Operand>,
    },
}

impl IrInstr {
    /// Returns the `ValueId`s produced by this instruction.
    pub fn results(&self) -> Vec<ValueId> {
        match self {
            IrInstr::BinOp { result, .. }
            | IrInstr::UnaryOp { result, .. }
            | IrInstr::MakeMatrix { result, .. }
            | IrInstr::Index { result, .. } => vec![*result],
            IrInstr::Intrinsic { result, .. } => result.iter().copied().collect(),
            IrInstr::Call { results, .. } => results.clone(),
            IrInstr::Br { .. } | IrInstr::CondBr { .. } | IrInstr::Return { .. } => vec![],
        }
    }

    /// Returns each result paired with its type.
    pub fn typed_results(&self) -> Vec<(ValueId, IrType)> {
        match self {
            IrInstr::BinOp { result, ty, .. } | IrInstr::UnaryOp { result, ty, .. } => {
                vec![(*result, *ty)]
            }
            IrInstr::Intrinsic { result, ty, .. } => match (result, ty) {
                (Some(r), Some(t)) => vec![(*r, *t)],
                _ => vec![],
            },
            IrInstr::MakeMatrix { result, .. } => vec![(*result, IrType::Matrix)],
            IrInstr::Index { result, .. } => vec![(*result, IrType::Scalar)],
            IrInstr::Call {
                results,
                result_tys,
                ..
            } => results.iter().copied().zip(result_tys.iter().copied()).collect(),
            IrInstr::Br { .. } | IrInstr::CondBr { .. } | IrInstr::Return { .. } => vec![],
        }
    }

    /// Returns `true` if this instruction is a block terminator.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            IrInstr::Br { .. } | IrInstr::CondBr { .. } | IrInstr::Return { .. }
        )
    }

    /// Whether this instruction may be merged with an identical one or dropped
    /// when its results are unused. Calls are pure only when the callee is in
    /// `pure_callees`; unknown callees count as impure.
    pub fn is_pure(&self, pure_callees: &HashSet<String>) -> bool {
        match self {
            IrInstr::Intrinsic { op, .. } => op.is_pure(),
            IrInstr::Call { callee, .. } => pure_callees.contains(callee),
            IrInstr::Br { .. } | IrInstr::CondBr { .. } | IrInstr::Return { .. } => false,
            IrInstr::BinOp { .. }
            | IrInstr::UnaryOp { .. }
            | IrInstr::MakeMatrix { .. }
            | IrInstr::Index { .. } => true,
        }
    }

    /// Whether evaluating this instruction can raise a runtime error even
    /// though the program type-checked. Such instructions stay live in DCE
    /// so that an optimized run fails exactly where an unoptimized one does.
    /// Matrix-valued operators may see mismatched shapes and indexing may
    /// be out of bounds. Calls fail unless the callee is in
    /// `infallible_callees`.
    pub fn may_fail(&self, infallible_callees: &HashSet<String>) -> bool {
        match self {
            IrInstr::BinOp { ty, .. } => *ty == IrType::Matrix,
            IrInstr::Intrinsic { op, .. } => op.may_fail(),
            IrInstr::Index { .. } => true,
            IrInstr::Call { callee, .. } => !infallible_callees.contains(callee),
            IrInstr::UnaryOp { .. }
            | IrInstr::MakeMatrix { .. }
            | IrInstr::Br { .. }
            | IrInstr::CondBr { .. }
            | IrInstr::Return { .. } => false,
        }
    }

    /// Returns all operands consumed by this instruction, in evaluation order.
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            IrInstr::BinOp { lhs, rhs, .. } => vec![*lhs, *rhs],
            IrInstr::UnaryOp { operand, .. } => vec![*operand],
            IrInstr::Intrinsic { args, .. } | IrInstr::Call { args, .. } => args.clone(),
            IrInstr::MakeMatrix { elems, .. } => elems.clone(),
            IrInstr::Index { base, row, col, .. } => vec![*base, *row, *col],
            IrInstr::Br { args, .. } => args.clone(),
            IrInstr::CondBr {
                cond,
                then_args,
                else_args,
                ..
            } => {
                let mut ops = vec![*cond];
                ops.extend_from_slice(then_args);
                ops.extend_from_slice(else_args);
                ops
            }
            IrInstr::Return { values } => values.clone(),
        }
    }

    /// Returns the `ValueId`s among this instruction's operands.
    pub fn value_operands(&self) -> Vec<ValueId> {
        self.operands().iter().filter_map(Operand::as_value).collect()
    }

    /// Mutable access to every operand, for rewriting passes.
    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            IrInstr::BinOp { lhs, rhs, .. } => vec![lhs, rhs],
            IrInstr::UnaryOp { operand, .. } => vec![operand],
            IrInstr::Intrinsic { args, .. } | IrInstr::Call { args, .. } => {
                args.iter_mut().collect()
            }
            IrInstr::MakeMatrix { elems, .. } => elems.iter_mut().collect(),
            IrInstr::Index { base, row, col, .. } => vec![base, row, col],
            IrInstr::Br { args, .. } => args.iter_mut().collect(),
            IrInstr::CondBr {
                cond,
                then_args,
                else_args,
                ..
            } => {
                let mut ops = vec![cond];
                ops.extend(then_args.iter_mut());
                ops.extend(else_args.iter_mut());
                ops
            }
            IrInstr::Return { values } => values.iter_mut().collect(),
        }
    }

    /// Mutable access to every defined value, for renaming during inlining.
    pub fn results_mut(&mut self) -> Vec<&mut ValueId> {
        match self {
            IrInstr::BinOp { result, .. }
            | IrInstr::UnaryOp { result, .. }
            | IrInstr::MakeMatrix { result, .. }
            | IrInstr::Index { result, .. } => vec![result],
            IrInstr::Intrinsic { result, .. } => result.iter_mut().collect(),
            IrInstr::Call { results, .. } => results.iter_mut().collect(),
            IrInstr::Br { .. } | IrInstr::CondBr { .. } | IrInstr::Return { .. } => vec![],
        }
    }

    /// Blocks this terminator may transfer control to.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            IrInstr::Br { target, .. } => vec![*target],
            IrInstr::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            _ => vec![],
        }
    }
}
