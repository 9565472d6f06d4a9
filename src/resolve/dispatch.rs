//! Operator and built-in typing rules.
//!
//! Scalar/matrix overloading is a closed table keyed by operator and operand
//! kinds. Anything not listed is a type error.

use crate::ir::{BinOp, Builtin, IrType};
use crate::ir::IrType::{Bool as B, Matrix as M, Scalar as S};

/// `(operator, lhs, rhs) -> result`
const BINARY_TABLE: &[(BinOp, IrType, IrType, IrType)] = &[
    // Element-wise arithmetic broadcasts scalars over matrices.
    (BinOp::Add, S, S, S),
    (BinOp::Add, S, M, M),
    (BinOp::Add, M, S, M),
    (BinOp::Add, M, M, M),
    (BinOp::Sub, S, S, S),
    (BinOp::Sub, S, M, M),
    (BinOp::Sub, M, S, M),
    (BinOp::Sub, M, M, M),
    (BinOp::Mul, S, S, S),
    (BinOp::Mul, S, M, M),
    (BinOp::Mul, M, S, M),
    (BinOp::Mul, M, M, M),
    (BinOp::Div, S, S, S),
    (BinOp::Div, S, M, M),
    (BinOp::Div, M, S, M),
    (BinOp::Div, M, M, M),
    (BinOp::Mod, S, S, S),
    (BinOp::Mod, S, M, M),
    (BinOp::Mod, M, S, M),
    (BinOp::Mod, M, M, M),
    (BinOp::Pow, S, S, S),
    (BinOp::Pow, M, S, M),
    (BinOp::Pow, M, M, M),
    (BinOp::MatMul, M, M, M),
    // Scalar comparisons yield bools; matrix comparisons yield 0/1 matrices.
    (BinOp::CmpEq, S, S, B),
    (BinOp::CmpEq, B, B, B),
    (BinOp::CmpEq, M, M, M),
    (BinOp::CmpEq, M, S, M),
    (BinOp::CmpNe, S, S, B),
    (BinOp::CmpNe, B, B, B),
    (BinOp::CmpNe, M, M, M),
    (BinOp::CmpNe, M, S, M),
    (BinOp::CmpLt, S, S, B),
    (BinOp::CmpLt, M, M, M),
    (BinOp::CmpLt, M, S, M),
    (BinOp::CmpLe, S, S, B),
    (BinOp::CmpLe, M, M, M),
    (BinOp::CmpLe, M, S, M),
    (BinOp::CmpGt, S, S, B),
    (BinOp::CmpGt, M, M, M),
    (BinOp::CmpGt, M, S, M),
    (BinOp::CmpGe, S, S, B),
    (BinOp::CmpGe, M, M, M),
    (BinOp::CmpGe, M, S, M),
    (BinOp::And, B, B, B),
    (BinOp::Or, B, B, B),
];

pub fn binary_result(op: BinOp, lhs: IrType, rhs: IrType) -> Option<IrType> {
    BINARY_TABLE
        .iter()
        .find(|(o, l, r, _)| *o == op && *l == lhs && *r == rhs)
        .map(|(_, _, _, out)| *out)
}

/// Operand kinds an operator accepts, for diagnostics.
pub fn binary_expected(op: BinOp) -> String {
    let mut kinds: Vec<String> = BINARY_TABLE
        .iter()
        .filter(|(o, ..)| *o == op)
        .map(|(_, l, r, _)| format!("{} {} {}", l, op.symbol(), r))
        .collect();
    kinds.dedup();
    kinds.join(" | ")
}

pub fn unary_neg_result(operand: IrType) -> Option<IrType> {
    match operand {
        S => Some(S),
        M => Some(M),
        B => None,
    }
}

/// Checks a built-in call's argument kinds.
///
/// Returns the result type (`None` for `print`), or the expected signature
/// and the index of the first offending argument.
pub fn builtin_result(
    b: Builtin,
    args: &[IrType],
) -> Result<Option<IrType>, (String, usize)> {
    let fixed = |params: &[IrType], ret: IrType| -> Result<Option<IrType>, (String, usize)> {
        match params.iter().zip(args).position(|(p, a)| p != a) {
            None => Ok(Some(ret)),
            Some(i) => Err((params[i].to_string(), i)),
        }
    };
    match b {
        Builtin::Matrix => fixed(&[S, S, S], M),
        Builtin::Sum
        | Builtin::Mean
        | Builtin::Min
        | Builtin::Max
        | Builtin::Nrow
        | Builtin::Ncol
        | Builtin::AsScalar => fixed(&[M], S),
        Builtin::T => fixed(&[M], M),
        Builtin::Rand => fixed(&[S, S], M),
        Builtin::Random => Ok(Some(S)),
        Builtin::Sqrt
        | Builtin::Abs
        | Builtin::Exp
        | Builtin::Log
        | Builtin::Floor
        | Builtin::Ceil => match args[0] {
            B => Err(("scalar or matrix".to_owned(), 0)),
            ty => Ok(Some(ty)),
        },
        Builtin::IfElse => {
            if args[0] != B {
                return Err((B.to_string(), 0));
            }
            if args[1] != args[2] {
                return Err((args[1].to_string(), 2));
            }
            Ok(Some(args[1]))
        }
        Builtin::Print => Ok(None),
    }
}
