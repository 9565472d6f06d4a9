use std::collections::BTreeMap;

use crate::error::FlattenError;
use crate::ir::{BinOp, BlockId, IrInstr, IrType, Operand};
use crate::lower::{find_rebound_vars, Flattener};
use crate::parser::lexer::Span;
use crate::resolve::typed::{TypedExpr, TypedStmt};

type Scope = BTreeMap<String, (Operand, IrType)>;

impl Flattener {
    pub(crate) fn flatten_stmts(&mut self, stmts: &[TypedStmt]) -> Result<(), FlattenError> {
        for stmt in stmts {
            self.flatten_stmt(stmt)?;
        }
        Ok(())
    }

    fn flatten_stmt(&mut self, stmt: &TypedStmt) -> Result<(), FlattenError> {
        match stmt {
            TypedStmt::Assign { name, value } => {
                let op = self.flatten_expr(value)?;
                self.scope.insert(name.clone(), (op, value.ty));
            }
            TypedStmt::MultiAssign {
                targets,
                target,
                args,
                result_tys,
            } => {
                let results = self.flatten_call(target, args, result_tys)?;
                for ((name, op), ty) in targets.iter().zip(results).zip(result_tys) {
                    self.scope.insert(name.clone(), (op, *ty));
                }
            }
            TypedStmt::Call {
                target,
                args,
                result_tys,
                ..
            } => {
                self.flatten_call(target, args, result_tys)?;
            }
            TypedStmt::Discard(expr) => {
                self.flatten_expr(expr)?;
            }
            TypedStmt::Input { name, ty } => {
                let op = self
                    .inputs
                    .get(name)
                    .copied()
                    .ok_or_else(|| FlattenError::UnboundVariable {
                        name: name.clone(),
                        span: Span::at(0),
                    })?;
                self.scope.insert(name.clone(), (op, *ty));
            }
            TypedStmt::Output { names } => {
                for name in names {
                    let binding = self.lookup(name, Span::at(0))?;
                    self.outputs.insert(name.clone(), binding);
                }
            }
            TypedStmt::If {
                cond,
                then_body,
                else_body,
            } => self.flatten_if(cond, then_body, else_body)?,
            TypedStmt::While { cond, body } => self.flatten_while(cond, body)?,
            TypedStmt::For {
                var,
                start,
                end,
                body,
            } => self.flatten_for(var, start, end, body)?,
        }
        Ok(())
    }

    /// Lowers `if` to then/else/merge blocks.
    ///
    /// Variables bound on both paths flow into the merge block as block
    /// parameters. Names bound on only one path go out of scope.
    fn flatten_if(
        &mut self,
        cond: &TypedExpr,
        then_body: &[TypedStmt],
        else_body: &[TypedStmt],
    ) -> Result<(), FlattenError> {
        // The predicate (including any calls in it) is evaluated before branching.
        let cond = self.flatten_expr(cond)?;
        let before = self.scope.clone();

        let then_bb = self.builder.create_block(Some("if_then"));
        let else_bb = self.builder.create_block(Some("if_else"));
        let merge_bb = self.builder.create_block(Some("if_merge"));

        self.builder.push_instr(IrInstr::CondBr {
            cond,
            then_block: then_bb,
            then_args: vec![],
            else_block: else_bb,
            else_args: vec![],
        });

        self.builder.set_current_block(then_bb);
        self.flatten_stmts(then_body)?;
        let then_exit = self.builder.current_block();
        let then_scope = std::mem::replace(&mut self.scope, before);

        self.builder.set_current_block(else_bb);
        self.flatten_stmts(else_body)?;
        let else_exit = self.builder.current_block();
        let else_scope = std::mem::take(&mut self.scope);

        // Bound on both paths: identical operands pass straight through,
        // differing ones become merge-block parameters.
        let mut merged = Scope::new();
        let mut then_args = Vec::new();
        let mut else_args = Vec::new();
        for (name, (then_op, ty)) in &then_scope {
            let Some((else_op, _)) = else_scope.get(name) else {
                continue;
            };
            if then_op == else_op {
                merged.insert(name.clone(), (*then_op, *ty));
            } else {
                let p = self.builder.add_block_param(merge_bb, Some(name), *ty);
                then_args.push(*then_op);
                else_args.push(*else_op);
                merged.insert(name.clone(), (Operand::Value(p), *ty));
            }
        }

        self.seal_with_branch(then_exit, merge_bb, then_args);
        self.seal_with_branch(else_exit, merge_bb, else_args);

        self.builder.set_current_block(merge_bb);
        self.scope = merged;
        Ok(())
    }

    /// Lowers `while` to header/body/exit blocks.
    ///
    /// Loop-carried variables become header parameters. The predicate is
    /// re-evaluated in the header on every iteration. The exit block is only
    /// reachable from the header, so it reads the header parameters directly.
    fn flatten_while(&mut self, cond: &TypedExpr, body: &[TypedStmt]) -> Result<(), FlattenError> {
        let carried = self.loop_carried(body, None);

        let header_bb = self.builder.create_block(Some("while_header"));
        let body_bb = self.builder.create_block(Some("while_body"));
        let exit_bb = self.builder.create_block(Some("while_exit"));

        let initial: Vec<Operand> = carried.iter().map(|(_, op, _)| *op).collect();
        self.builder.push_instr(IrInstr::Br {
            target: header_bb,
            args: initial,
        });

        self.builder.set_current_block(header_bb);
        for (name, _, ty) in &carried {
            let p = self.builder.add_block_param(header_bb, Some(name), *ty);
            self.scope.insert(name.clone(), (Operand::Value(p), *ty));
        }
        let header_scope = self.scope.clone();

        let cond = self.flatten_expr(cond)?;
        self.builder.push_instr(IrInstr::CondBr {
            cond,
            then_block: body_bb,
            then_args: vec![],
            else_block: exit_bb,
            else_args: vec![],
        });

        self.builder.set_current_block(body_bb);
        self.flatten_stmts(body)?;
        let back_args = self.carried_values(&carried, &header_scope);
        let body_exit = self.builder.current_block();
        self.seal_with_branch(body_exit, header_bb, back_args);

        self.builder.set_current_block(exit_bb);
        self.scope = header_scope;
        Ok(())
    }

    /// Lowers `for (var in start:end)` to header/body/exit blocks.
    ///
    /// `start` and `end` are evaluated once, before the loop. The loop
    /// variable steps by one and the range is inclusive; `start > end` runs
    /// the body zero times.
    fn flatten_for(
        &mut self,
        var: &str,
        start: &TypedExpr,
        end: &TypedExpr,
        body: &[TypedStmt],
    ) -> Result<(), FlattenError> {
        let start = self.flatten_expr(start)?;
        let end = self.flatten_expr(end)?;
        self.scope.remove(var);
        let carried = self.loop_carried(body, Some(var));

        let header_bb = self.builder.create_block(Some("for_header"));
        let body_bb = self.builder.create_block(Some("for_body"));
        let exit_bb = self.builder.create_block(Some("for_exit"));

        let mut initial = vec![start];
        initial.extend(carried.iter().map(|(_, op, _)| *op));
        self.builder.push_instr(IrInstr::Br {
            target: header_bb,
            args: initial,
        });

        self.builder.set_current_block(header_bb);
        let iv = self
            .builder
            .add_block_param(header_bb, Some(var), IrType::Scalar);
        for (name, _, ty) in &carried {
            let p = self.builder.add_block_param(header_bb, Some(name), *ty);
            self.scope.insert(name.clone(), (Operand::Value(p), *ty));
        }
        let header_scope = self.scope.clone();

        let in_range = self.builder.fresh_value();
        self.builder.push_instr(IrInstr::BinOp {
            result: in_range,
            op: BinOp::CmpLe,
            lhs: Operand::Value(iv),
            rhs: end,
            ty: IrType::Bool,
        });
        self.builder.push_instr(IrInstr::CondBr {
            cond: Operand::Value(in_range),
            then_block: body_bb,
            then_args: vec![],
            else_block: exit_bb,
            else_args: vec![],
        });

        self.builder.set_current_block(body_bb);
        self.scope
            .insert(var.to_owned(), (Operand::Value(iv), IrType::Scalar));
        self.flatten_stmts(body)?;
        let next = self.builder.fresh_value();
        self.builder.push_instr(IrInstr::BinOp {
            result: next,
            op: BinOp::Add,
            lhs: Operand::Value(iv),
            rhs: Operand::Scalar(1.0),
            ty: IrType::Scalar,
        });
        let mut back_args = vec![Operand::Value(next)];
        back_args.extend(self.carried_values(&carried, &header_scope));
        let body_exit = self.builder.current_block();
        self.seal_with_branch(body_exit, header_bb, back_args);

        self.builder.set_current_block(exit_bb);
        self.scope = header_scope;
        Ok(())
    }

    /// Variables already in scope that the loop body may rebind.
    fn loop_carried(
        &self,
        body: &[TypedStmt],
        loop_var: Option<&str>,
    ) -> Vec<(String, Operand, IrType)> {
        find_rebound_vars(body)
            .into_iter()
            .filter(|name| Some(name.as_str()) != loop_var)
            .filter_map(|name| {
                let (op, ty) = self.scope.get(&name).copied()?;
                Some((name, op, ty))
            })
            .collect()
    }

    /// Values of the carried variables at the end of a loop body.
    fn carried_values(
        &self,
        carried: &[(String, Operand, IrType)],
        header_scope: &Scope,
    ) -> Vec<Operand> {
        carried
            .iter()
            .map(|(name, _, _)| {
                self.scope
                    .get(name)
                    .or_else(|| header_scope.get(name))
                    .map(|(op, _)| *op)
                    .unwrap_or(Operand::Scalar(0.0))
            })
            .collect()
    }

    fn seal_with_branch(&mut self, from: BlockId, target: BlockId, args: Vec<Operand>) {
        self.builder.set_current_block(from);
        self.builder.push_instr(IrInstr::Br { target, args });
    }
}
