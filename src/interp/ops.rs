//! Value-level arithmetic.
//!
//! The evaluator and the constant folder both call into this module, so a
//! folded expression produces exactly the bits the evaluator would.

use crate::error::InterpError;
use crate::interp::value::{Matrix, Value};
use crate::ir::{BinOp, Builtin, UnaryOp};

fn scalar_op(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Mod => floored_mod(a, b),
        BinOp::Pow => a.powf(b),
        BinOp::CmpEq => bool_to_f64(a == b),
        BinOp::CmpNe => bool_to_f64(a != b),
        BinOp::CmpLt => bool_to_f64(a < b),
        BinOp::CmpLe => bool_to_f64(a <= b),
        BinOp::CmpGt => bool_to_f64(a > b),
        BinOp::CmpGe => bool_to_f64(a >= b),
        // Not element-wise; rejected by the caller.
        BinOp::MatMul | BinOp::And | BinOp::Or => f64::NAN,
    }
}

/// `a %% b` takes the sign of the divisor.
pub fn floored_mod(a: f64, b: f64) -> f64 {
    a - b * (a / b).floor()
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn shape_str(m: &Matrix) -> String {
    format!("{}x{}", m.rows, m.cols)
}

fn type_error(op: BinOp, l: &Value, r: &Value) -> InterpError {
    InterpError::TypeError {
        detail: format!("'{}' is not defined for {} and {}", op.symbol(), l.ty(), r.ty()),
    }
}

/// Evaluates a binary operator.
pub fn eval_binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, InterpError> {
    match (op, lhs, rhs) {
        (BinOp::And, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
        (BinOp::Or, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
        (BinOp::CmpEq, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a == b)),
        (BinOp::CmpNe, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a != b)),
        (BinOp::And | BinOp::Or, ..) => Err(type_error(op, lhs, rhs)),

        (BinOp::MatMul, Value::Matrix(a), Value::Matrix(b)) => matmul(a, b).map(Value::Matrix),
        (BinOp::MatMul, ..) => Err(type_error(op, lhs, rhs)),

        (_, Value::Scalar(a), Value::Scalar(b)) => {
            let v = scalar_op(op, *a, *b);
            if op.is_comparison() {
                Ok(Value::Bool(v != 0.0))
            } else {
                Ok(Value::Scalar(v))
            }
        }
        (_, Value::Matrix(a), Value::Scalar(b)) => Ok(Value::Matrix(a.map(|x| scalar_op(op, x, *b)))),
        (_, Value::Scalar(a), Value::Matrix(b)) if !op.is_comparison() => {
            Ok(Value::Matrix(b.map(|x| scalar_op(op, *a, x))))
        }
        (_, Value::Matrix(a), Value::Matrix(b)) => {
            if a.shape() != b.shape() {
                return Err(InterpError::DimensionMismatch {
                    op: op.symbol().to_owned(),
                    lhs: shape_str(a),
                    rhs: shape_str(b),
                });
            }
            let data = a
                .data
                .iter()
                .zip(&b.data)
                .map(|(&x, &y)| scalar_op(op, x, y))
                .collect();
            Ok(Value::Matrix(Matrix {
                rows: a.rows,
                cols: a.cols,
                data,
            }))
        }
        _ => Err(type_error(op, lhs, rhs)),
    }
}

fn matmul(a: &Matrix, b: &Matrix) -> Result<Matrix, InterpError> {
    if a.cols != b.rows {
        return Err(InterpError::DimensionMismatch {
            op: BinOp::MatMul.symbol().to_owned(),
            lhs: shape_str(a),
            rhs: shape_str(b),
        });
    }
    let mut out = Matrix::try_filled(a.rows, b.cols, 0.0)?;
    for i in 0..a.rows {
        for k in 0..a.cols {
            let aik = a.get(i, k);
            for j in 0..b.cols {
                out.data[i * b.cols + j] += aik * b.get(k, j);
            }
        }
    }
    Ok(out)
}

pub fn eval_unary(op: UnaryOp, operand: &Value) -> Result<Value, InterpError> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Scalar(x)) => Ok(Value::Scalar(-x)),
        (UnaryOp::Neg, Value::Matrix(m)) => Ok(Value::Matrix(m.map(|x| -x))),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, v) => Err(InterpError::TypeError {
            detail: format!("'{}' is not defined for {}", op, v.ty()),
        }),
    }
}

/// 1-based cell read.
pub fn eval_index(base: &Value, row: &Value, col: &Value) -> Result<Value, InterpError> {
    let m = base.as_matrix()?;
    let (r, c) = (row.as_scalar()?, col.as_scalar()?);
    let (ri, ci) = (r as i64, c as i64);
    let in_bounds = r.fract() == 0.0
        && c.fract() == 0.0
        && ri >= 1
        && ci >= 1
        && ri as usize <= m.rows
        && ci as usize <= m.cols;
    if !in_bounds {
        return Err(InterpError::IndexOutOfBounds {
            row: ri,
            col: ci,
            rows: m.rows,
            cols: m.cols,
        });
    }
    Ok(Value::Scalar(m.get(ri as usize - 1, ci as usize - 1)))
}

/// Converts a scalar dimension argument to a count.
pub fn dimension(v: &Value, what: &str) -> Result<usize, InterpError> {
    let x = v.as_scalar()?;
    if x < 0.0 || x.fract() != 0.0 || !x.is_finite() {
        return Err(InterpError::TypeError {
            detail: format!("{} must be a non-negative integer, found {}", what, x),
        });
    }
    Ok(x as usize)
}

/// Evaluates a pure built-in. Impure built-ins are rejected here; the
/// evaluator handles them itself.
pub fn eval_pure_builtin(op: Builtin, args: &[Value]) -> Result<Value, InterpError> {
    if args.len() != op.arity() {
        return Err(InterpError::TypeError {
            detail: format!("'{}' expects {} argument(s), got {}", op, op.arity(), args.len()),
        });
    }
    let elementwise = |f: fn(f64) -> f64| -> Result<Value, InterpError> {
        match &args[0] {
            Value::Scalar(x) => Ok(Value::Scalar(f(*x))),
            Value::Matrix(m) => Ok(Value::Matrix(m.map(f))),
            other => Err(InterpError::TypeError {
                detail: format!("'{}' is not defined for {}", op, other.ty()),
            }),
        }
    };
    match op {
        Builtin::Matrix => {
            let v = args[0].as_scalar()?;
            let r = dimension(&args[1], "row count")?;
            let c = dimension(&args[2], "column count")?;
            Ok(Value::Matrix(Matrix::try_filled(r, c, v)?))
        }
        Builtin::Sum => Ok(Value::Scalar(args[0].as_matrix()?.data.iter().sum())),
        Builtin::Mean => {
            let m = args[0].as_matrix()?;
            let n = m.data.len() as f64;
            Ok(Value::Scalar(m.data.iter().sum::<f64>() / n))
        }
        Builtin::Min => {
            let m = args[0].as_matrix()?;
            Ok(Value::Scalar(m.data.iter().copied().fold(f64::INFINITY, f64::min)))
        }
        Builtin::Max => {
            let m = args[0].as_matrix()?;
            Ok(Value::Scalar(
                m.data.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ))
        }
        Builtin::Nrow => Ok(Value::Scalar(args[0].as_matrix()?.rows as f64)),
        Builtin::Ncol => Ok(Value::Scalar(args[0].as_matrix()?.cols as f64)),
        Builtin::T => Ok(Value::Matrix(args[0].as_matrix()?.transpose())),
        Builtin::Sqrt => elementwise(f64::sqrt),
        Builtin::Abs => elementwise(f64::abs),
        Builtin::Exp => elementwise(f64::exp),
        Builtin::Log => elementwise(f64::ln),
        Builtin::Floor => elementwise(f64::floor),
        Builtin::Ceil => elementwise(f64::ceil),
        Builtin::AsScalar => {
            let m = args[0].as_matrix()?;
            if m.shape() != (1, 1) {
                return Err(InterpError::DimensionMismatch {
                    op: op.name().to_owned(),
                    lhs: shape_str(m),
                    rhs: "1x1".to_owned(),
                });
            }
            Ok(Value::Scalar(m.data[0]))
        }
        Builtin::IfElse => {
            if args[0].as_bool()? {
                Ok(args[1].clone())
            } else {
                Ok(args[2].clone())
            }
        }
        Builtin::Rand | Builtin::Random | Builtin::Print => Err(InterpError::TypeError {
            detail: format!("'{}' is not a pure built-in", op),
        }),
    }
}
