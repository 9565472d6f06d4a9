use crate::error::FlattenError;
use crate::ir::{IrInstr, IrType, Operand};
use crate::lower::Flattener;
use crate::resolve::typed::{CallTarget, TypedExpr, TypedExprKind};

impl Flattener {
    /// Flattens one expression and returns the operand holding its value.
    ///
    /// Operands are flattened before the node that consumes them, left to
    /// right, so every argument is evaluated before the call that uses it.
    pub(crate) fn flatten_expr(&mut self, expr: &TypedExpr) -> Result<Operand, FlattenError> {
        match &expr.kind {
            TypedExprKind::Number(x) => Ok(Operand::Scalar(*x)),
            TypedExprKind::Bool(b) => Ok(Operand::Bool(*b)),
            TypedExprKind::Var(name) => Ok(self.lookup(name, expr.span)?.0),

            TypedExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.flatten_expr(lhs)?;
                let rhs = self.flatten_expr(rhs)?;
                let result = self.builder.fresh_value();
                self.builder.push_instr(IrInstr::BinOp {
                    result,
                    op: *op,
                    lhs,
                    rhs,
                    ty: expr.ty,
                });
                Ok(Operand::Value(result))
            }

            TypedExprKind::Unary { op, operand } => {
                let operand = self.flatten_expr(operand)?;
                let result = self.builder.fresh_value();
                self.builder.push_instr(IrInstr::UnaryOp {
                    result,
                    op: *op,
                    operand,
                    ty: expr.ty,
                });
                Ok(Operand::Value(result))
            }

            TypedExprKind::Call { target, args } => {
                let results = self.flatten_call(target, args, &[expr.ty])?;
                match results.first() {
                    Some(v) => Ok(*v),
                    None => Err(FlattenError::UnsupportedConstruct {
                        construct: format!("value-less call to '{}'", target.name()),
                        span: expr.span,
                    }),
                }
            }

            TypedExprKind::Index { base, row, col } => {
                let base = self.flatten_expr(base)?;
                let row = self.flatten_expr(row)?;
                let col = self.flatten_expr(col)?;
                let result = self.builder.fresh_value();
                self.builder.push_instr(IrInstr::Index {
                    result,
                    base,
                    row,
                    col,
                });
                Ok(Operand::Value(result))
            }

            TypedExprKind::Matrix { rows, cols, elems } => {
                let mut ops = Vec::with_capacity(elems.len());
                for e in elems {
                    ops.push(self.flatten_expr(e)?);
                }
                let result = self.builder.fresh_value();
                self.builder.push_instr(IrInstr::MakeMatrix {
                    result,
                    rows: *rows,
                    cols: *cols,
                    elems: ops,
                });
                Ok(Operand::Value(result))
            }

            TypedExprKind::If { .. } => Err(FlattenError::UnsupportedConstruct {
                construct: "a conditional expression".into(),
                span: expr.span,
            }),
        }
    }

    /// Emits a call and returns one operand per result.
    ///
    /// `result_tys` is empty for calls that yield nothing (`print`).
    pub(crate) fn flatten_call(
        &mut self,
        target: &CallTarget,
        args: &[TypedExpr],
        result_tys: &[IrType],
    ) -> Result<Vec<Operand>, FlattenError> {
        let mut ops = Vec::with_capacity(args.len());
        for a in args {
            ops.push(self.flatten_expr(a)?);
        }
        match target {
            CallTarget::Builtin(op) => {
                let ty = result_tys.first().copied();
                let result = ty.map(|_| self.builder.fresh_value());
                self.builder.push_instr(IrInstr::Intrinsic {
                    result,
                    op: *op,
                    args: ops,
                    ty,
                });
                Ok(result.into_iter().map(Operand::Value).collect())
            }
            CallTarget::User { name, .. } => {
                let results: Vec<_> = result_tys
                    .iter()
                    .map(|_| self.builder.fresh_value())
                    .collect();
                self.builder.push_instr(IrInstr::Call {
                    results: results.clone(),
                    callee: name.clone(),
                    args: ops,
                    result_tys: result_tys.to_vec(),
                });
                Ok(results.into_iter().map(Operand::Value).collect())
            }
        }
    }
}
