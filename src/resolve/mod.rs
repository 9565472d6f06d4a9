//! Name and type resolution.
//!
//! Binds every call site to its target (a built-in or a user function),
//! checks arity and operand kinds against the dispatch table, and computes the
//! purity and recursion attributes the optimizer relies on. The resolver
//! consumes the AST by reference and produces a separate [`ResolvedProgram`].

pub mod dispatch;
pub mod purity;
pub mod symbols;
pub mod typed;

use indexmap::IndexMap;

use crate::error::ResolveError;
use crate::ir::{BinOp, Builtin, IrType, UnaryOp, MAIN_FUNCTION};
use crate::parser::ast::{
    AstBinOp, AstBlock, AstExpr, AstFnBody, AstFunction, AstProgram, AstStmt, AstUnaryOp, Ident,
};
use crate::parser::lexer::Span;

use self::purity::CallFacts;
use self::symbols::{lower_type, FunctionTable, SymbolTable};
use self::typed::{
    CallTarget, ResolvedProgram, TypedBody, TypedExpr, TypedExprKind, TypedFunction, TypedStmt,
};

pub use self::purity::CallGraphSummary;

/// Where a statement list appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Directly in the script, outside any block.
    TopLevel,
    /// Inside a top-level `if`/`while`/`for` block.
    Nested,
    /// Inside a function body.
    Function,
}

/// Resolves a parsed program.
pub fn resolve_program(program: &AstProgram) -> Result<ResolvedProgram, ResolveError> {
    Resolver::new(program)?.resolve()
}

pub struct Resolver<'a> {
    program: &'a AstProgram,
    table: FunctionTable,
}

/// Per-body accumulator for the call graph and the script's I/O declarations.
#[derive(Default)]
struct BodyFacts {
    calls: CallFacts,
    inputs: Vec<(String, IrType)>,
    outputs: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(program: &'a AstProgram) -> Result<Self, ResolveError> {
        let table = FunctionTable::build(&program.functions)?;
        Ok(Self { program, table })
    }

    pub fn resolve(&self) -> Result<ResolvedProgram, ResolveError> {
        let mut functions = Vec::with_capacity(self.program.functions.len());
        let mut graph: IndexMap<String, CallFacts> = IndexMap::new();

        for f in &self.program.functions {
            let mut facts = BodyFacts::default();
            let typed = self.resolve_function(f, &mut facts)?;
            graph.insert(f.name.name.clone(), facts.calls);
            functions.push(typed);
        }

        let mut facts = BodyFacts::default();
        let (main, _) = self.resolve_stmts(
            &self.program.stmts,
            &SymbolTable::new(),
            Scope::TopLevel,
            &mut facts,
        )?;

        let summary = purity::analyze(&graph);
        for f in &mut functions {
            if let Some(p) = summary.purity.get(&f.name) {
                f.purity = p.clone();
            }
            f.recursive = summary.recursive.contains(&f.name);
            tracing::debug!(
                function = %f.name,
                purity = %f.purity,
                recursive = f.recursive,
                "resolved function"
            );
        }

        Ok(ResolvedProgram {
            functions,
            main,
            inputs: facts.inputs,
            outputs: facts.outputs,
        })
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    fn resolve_function(
        &self,
        f: &AstFunction,
        facts: &mut BodyFacts,
    ) -> Result<TypedFunction, ResolveError> {
        let params: Vec<(String, IrType)> = f
            .params
            .iter()
            .map(|p| (p.name.name.clone(), lower_type(p.ty.kind)))
            .collect();
        let returns: Vec<IrType> = f.returns.iter().map(|t| lower_type(t.kind)).collect();

        let scope = params
            .iter()
            .fold(SymbolTable::new(), |table, (name, ty)| table.bind(name, *ty));

        let body = match &f.body {
            AstFnBody::Expr(expr) => {
                if returns.len() != 1 {
                    return Err(ResolveError::OutputCountMismatch {
                        name: f.name.name.clone(),
                        expected: returns.len(),
                        found: 1,
                        span: expr.span(),
                    });
                }
                let typed = self.resolve_value_expr(expr, &scope, facts)?;
                expect_type(returns[0], &typed, "function result")?;
                TypedBody::Expr(typed)
            }
            AstFnBody::Block {
                stmts,
                returns: ret_exprs,
                return_span,
            } => {
                let (stmts, scope) = self.resolve_stmts(stmts, &scope, Scope::Function, facts)?;
                if ret_exprs.len() != returns.len() {
                    return Err(ResolveError::OutputCountMismatch {
                        name: f.name.name.clone(),
                        expected: returns.len(),
                        found: ret_exprs.len(),
                        span: *return_span,
                    });
                }
                let mut typed_returns = Vec::with_capacity(ret_exprs.len());
                for (expr, ty) in ret_exprs.iter().zip(&returns) {
                    let typed = self.resolve_value_expr(expr, &scope, facts)?;
                    expect_type(*ty, &typed, "function result")?;
                    typed_returns.push(typed);
                }
                TypedBody::Block {
                    stmts,
                    returns: typed_returns,
                }
            }
        };

        Ok(TypedFunction {
            name: f.name.name.clone(),
            params,
            returns,
            body,
            purity: crate::ir::Purity::Pure,
            recursive: false,
            span: f.span,
        })
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn resolve_stmts(
        &self,
        stmts: &[AstStmt],
        scope: &SymbolTable,
        kind: Scope,
        facts: &mut BodyFacts,
    ) -> Result<(Vec<TypedStmt>, SymbolTable), ResolveError> {
        let mut out = Vec::with_capacity(stmts.len());
        let mut scope = scope.clone();
        for stmt in stmts {
            let (typed, next) = self.resolve_stmt(stmt, &scope, kind, facts)?;
            out.push(typed);
            scope = next;
        }
        Ok((out, scope))
    }

    fn resolve_block(
        &self,
        block: &AstBlock,
        scope: &SymbolTable,
        kind: Scope,
        facts: &mut BodyFacts,
    ) -> Result<(Vec<TypedStmt>, SymbolTable), ResolveError> {
        let inner = if kind == Scope::TopLevel {
            Scope::Nested
        } else {
            kind
        };
        self.resolve_stmts(&block.stmts, scope, inner, facts)
    }

    fn resolve_stmt(
        &self,
        stmt: &AstStmt,
        scope: &SymbolTable,
        kind: Scope,
        facts: &mut BodyFacts,
    ) -> Result<(TypedStmt, SymbolTable), ResolveError> {
        match stmt {
            AstStmt::Assign { target, value, .. } => {
                let value = self.resolve_value_expr(value, scope, facts)?;
                let next = scope.bind(&target.name, value.ty);
                Ok((
                    TypedStmt::Assign {
                        name: target.name.clone(),
                        value,
                    },
                    next,
                ))
            }

            AstStmt::MultiAssign {
                targets,
                callee,
                args,
                span,
            } => {
                let (target, args, result_tys) =
                    self.resolve_call(callee, args, *span, scope, facts)?;
                if result_tys.len() != targets.len() {
                    return Err(ResolveError::OutputCountMismatch {
                        name: callee.name.clone(),
                        expected: result_tys.len(),
                        found: targets.len(),
                        span: *span,
                    });
                }
                let next = targets
                    .iter()
                    .zip(&result_tys)
                    .fold(scope.clone(), |t, (name, ty)| t.bind(&name.name, *ty));
                Ok((
                    TypedStmt::MultiAssign {
                        targets: targets.iter().map(|t| t.name.clone()).collect(),
                        target,
                        args,
                        result_tys,
                    },
                    next,
                ))
            }

            AstStmt::If {
                cond,
                then_body,
                else_body,
                ..
            } => {
                let cond = self.resolve_value_expr(cond, scope, facts)?;
                expect_type(IrType::Bool, &cond, "if condition")?;
                let (then_stmts, then_scope) = self.resolve_block(then_body, scope, kind, facts)?;
                let (else_stmts, else_scope) = match else_body {
                    Some(block) => self.resolve_block(block, scope, kind, facts)?,
                    None => (Vec::new(), scope.clone()),
                };
                let merged = merge_branches(&then_scope, &else_scope, then_body.span)?;
                Ok((
                    TypedStmt::If {
                        cond,
                        then_body: then_stmts,
                        else_body: else_stmts,
                    },
                    merged,
                ))
            }

            AstStmt::While { cond, body, span } => {
                let cond = self.resolve_value_expr(cond, scope, facts)?;
                expect_type(IrType::Bool, &cond, "while condition")?;
                let (body_stmts, body_scope) = self.resolve_block(body, scope, kind, facts)?;
                check_loop_carried(scope, &body_scope, *span)?;
                Ok((
                    TypedStmt::While {
                        cond,
                        body: body_stmts,
                    },
                    scope.clone(),
                ))
            }

            AstStmt::For {
                var,
                start,
                end,
                body,
                span,
            } => {
                let start = self.resolve_value_expr(start, scope, facts)?;
                expect_type(IrType::Scalar, &start, "for-loop start")?;
                let end = self.resolve_value_expr(end, scope, facts)?;
                expect_type(IrType::Scalar, &end, "for-loop end")?;
                // The loop variable is scoped to the body.
                let outer = scope.unbind(&var.name);
                let inner = outer.bind(&var.name, IrType::Scalar);
                let (body_stmts, body_scope) = self.resolve_block(body, &inner, kind, facts)?;
                check_loop_carried(&outer, &body_scope, *span)?;
                Ok((
                    TypedStmt::For {
                        var: var.name.clone(),
                        start,
                        end,
                        body: body_stmts,
                    },
                    outer,
                ))
            }

            AstStmt::Input { name, ty, span } => {
                if kind != Scope::TopLevel {
                    return Err(ResolveError::TopLevelOnly {
                        what: "input".into(),
                        span: *span,
                    });
                }
                let ty = lower_type(ty.kind);
                facts.inputs.push((name.name.clone(), ty));
                Ok((
                    TypedStmt::Input {
                        name: name.name.clone(),
                        ty,
                    },
                    scope.bind(&name.name, ty),
                ))
            }

            AstStmt::Output { names, span } => {
                if kind != Scope::TopLevel {
                    return Err(ResolveError::TopLevelOnly {
                        what: "output".into(),
                        span: *span,
                    });
                }
                for name in names {
                    if scope.lookup(&name.name).is_none() {
                        return Err(ResolveError::UnresolvedSymbol {
                            name: name.name.clone(),
                            span: name.span,
                        });
                    }
                    if !facts.outputs.contains(&name.name) {
                        facts.outputs.push(name.name.clone());
                    }
                }
                Ok((
                    TypedStmt::Output {
                        names: names.iter().map(|n| n.name.clone()).collect(),
                    },
                    scope.clone(),
                ))
            }

            AstStmt::Expr(expr) => match expr.as_ref() {
                AstExpr::Call { callee, args, span } => {
                    let (target, args, result_tys) =
                        self.resolve_call(callee, args, *span, scope, facts)?;
                    Ok((
                        TypedStmt::Call {
                            target,
                            args,
                            result_tys,
                            span: *span,
                        },
                        scope.clone(),
                    ))
                }
                other => {
                    let typed = self.resolve_value_expr(other, scope, facts)?;
                    Ok((TypedStmt::Discard(typed), scope.clone()))
                }
            },
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// Resolves an expression that must produce exactly one value.
    fn resolve_value_expr(
        &self,
        expr: &AstExpr,
        scope: &SymbolTable,
        facts: &mut BodyFacts,
    ) -> Result<TypedExpr, ResolveError> {
        let span = expr.span();
        let typed = match expr {
            AstExpr::Number { value, .. } => TypedExpr {
                kind: TypedExprKind::Number(*value),
                ty: IrType::Scalar,
                span,
            },
            AstExpr::Bool { value, .. } => TypedExpr {
                kind: TypedExprKind::Bool(*value),
                ty: IrType::Bool,
                span,
            },
            AstExpr::Ident(ident) => {
                let ty = scope
                    .lookup(&ident.name)
                    .ok_or_else(|| ResolveError::UnresolvedSymbol {
                        name: ident.name.clone(),
                        span: ident.span,
                    })?;
                TypedExpr {
                    kind: TypedExprKind::Var(ident.name.clone()),
                    ty,
                    span,
                }
            }
            AstExpr::BinOp { op, lhs, rhs, .. } => {
                let lhs = self.resolve_value_expr(lhs, scope, facts)?;
                let rhs = self.resolve_value_expr(rhs, scope, facts)?;
                let op = lower_binop(*op);
                let ty = dispatch::binary_result(op, lhs.ty, rhs.ty).ok_or_else(|| {
                    ResolveError::TypeMismatch {
                        expected: dispatch::binary_expected(op),
                        found: format!("{} {} {}", lhs.ty, op.symbol(), rhs.ty),
                        context: format!("operands of '{}'", op.symbol()),
                        span,
                    }
                })?;
                TypedExpr {
                    kind: TypedExprKind::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    ty,
                    span,
                }
            }
            AstExpr::UnaryOp { op, expr: inner, .. } => {
                let operand = self.resolve_value_expr(inner, scope, facts)?;
                let (op, ty) = match op {
                    AstUnaryOp::Neg => (UnaryOp::Neg, dispatch::unary_neg_result(operand.ty)),
                    AstUnaryOp::Not => (
                        UnaryOp::Not,
                        (operand.ty == IrType::Bool).then_some(IrType::Bool),
                    ),
                };
                let ty = ty.ok_or_else(|| ResolveError::TypeMismatch {
                    expected: match op {
                        UnaryOp::Neg => "scalar or matrix".into(),
                        UnaryOp::Not => "bool".into(),
                    },
                    found: operand.ty.to_string(),
                    context: format!("operand of '{}'", op),
                    span,
                })?;
                TypedExpr {
                    kind: TypedExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    ty,
                    span,
                }
            }
            AstExpr::Call { callee, args, .. } => {
                let (target, args, result_tys) =
                    self.resolve_call(callee, args, span, scope, facts)?;
                let ty = match result_tys.as_slice() {
                    [ty] => *ty,
                    [] => {
                        return Err(ResolveError::NoValue {
                            name: callee.name.clone(),
                            span,
                        })
                    }
                    many => {
                        return Err(ResolveError::MultiOutputInExpression {
                            name: callee.name.clone(),
                            count: many.len(),
                            span,
                        })
                    }
                };
                TypedExpr {
                    kind: TypedExprKind::Call { target, args },
                    ty,
                    span,
                }
            }
            AstExpr::Index { base, row, col, .. } => {
                let base = self.resolve_value_expr(base, scope, facts)?;
                expect_type(IrType::Matrix, &base, "indexed value")?;
                let row = self.resolve_value_expr(row, scope, facts)?;
                expect_type(IrType::Scalar, &row, "row index")?;
                let col = self.resolve_value_expr(col, scope, facts)?;
                expect_type(IrType::Scalar, &col, "column index")?;
                TypedExpr {
                    kind: TypedExprKind::Index {
                        base: Box::new(base),
                        row: Box::new(row),
                        col: Box::new(col),
                    },
                    ty: IrType::Scalar,
                    span,
                }
            }
            AstExpr::MatrixLit {
                rows, cols, elems, ..
            } => {
                let mut typed = Vec::with_capacity(elems.len());
                for e in elems {
                    let t = self.resolve_value_expr(e, scope, facts)?;
                    expect_type(IrType::Scalar, &t, "matrix literal element")?;
                    typed.push(t);
                }
                TypedExpr {
                    kind: TypedExprKind::Matrix {
                        rows: *rows,
                        cols: *cols,
                        elems: typed,
                    },
                    ty: IrType::Matrix,
                    span,
                }
            }
            AstExpr::If {
                cond,
                then_expr,
                else_expr,
                ..
            } => {
                let cond = self.resolve_value_expr(cond, scope, facts)?;
                expect_type(IrType::Bool, &cond, "if condition")?;
                let then_expr = self.resolve_value_expr(then_expr, scope, facts)?;
                let else_expr = self.resolve_value_expr(else_expr, scope, facts)?;
                expect_type(then_expr.ty, &else_expr, "else branch")?;
                TypedExpr {
                    ty: then_expr.ty,
                    kind: TypedExprKind::If {
                        cond: Box::new(cond),
                        then_expr: Box::new(then_expr),
                        else_expr: Box::new(else_expr),
                    },
                    span,
                }
            }
        };
        Ok(typed)
    }

    /// Resolves a call site. Arguments are resolved first, left to right, so
    /// nested calls bind before their enclosing call.
    fn resolve_call(
        &self,
        callee: &Ident,
        args: &[AstExpr],
        span: Span,
        scope: &SymbolTable,
        facts: &mut BodyFacts,
    ) -> Result<(CallTarget, Vec<TypedExpr>, Vec<IrType>), ResolveError> {
        let mut typed_args = Vec::with_capacity(args.len());
        for arg in args {
            // `print` accepts any value; everything else is checked below.
            typed_args.push(self.resolve_value_expr(arg, scope, facts)?);
        }
        let arg_tys: Vec<IrType> = typed_args.iter().map(|a| a.ty).collect();

        if let Some(builtin) = Builtin::from_name(&callee.name) {
            if typed_args.len() != builtin.arity() {
                return Err(ResolveError::ArityMismatch {
                    name: callee.name.clone(),
                    expected: builtin.arity(),
                    found: typed_args.len(),
                    span,
                });
            }
            let result = dispatch::builtin_result(builtin, &arg_tys).map_err(|(expected, i)| {
                ResolveError::TypeMismatch {
                    expected,
                    found: arg_tys[i].to_string(),
                    context: format!("argument {} of '{}'", i + 1, builtin.name()),
                    span: typed_args[i].span,
                }
            })?;
            facts.calls.record_builtin(builtin);
            return Ok((
                CallTarget::Builtin(builtin),
                typed_args,
                result.into_iter().collect(),
            ));
        }

        let sig = match self.table.get(&callee.name) {
            Some(sig) if callee.name != MAIN_FUNCTION => sig,
            _ => {
                return Err(ResolveError::UnresolvedSymbol {
                    name: callee.name.clone(),
                    span: callee.span,
                })
            }
        };
        if typed_args.len() != sig.params.len() {
            return Err(ResolveError::ArityMismatch {
                name: callee.name.clone(),
                expected: sig.params.len(),
                found: typed_args.len(),
                span,
            });
        }
        for (arg, (pname, pty)) in typed_args.iter().zip(&sig.params) {
            expect_type(
                *pty,
                arg,
                &format!("parameter '{}' of '{}'", pname, sig.name),
            )?;
        }
        facts.calls.record_user(&sig.name);
        Ok((
            CallTarget::User {
                func: sig.func,
                name: sig.name.clone(),
            },
            typed_args,
            sig.returns.clone(),
        ))
    }
}

fn expect_type(expected: IrType, expr: &TypedExpr, context: &str) -> Result<(), ResolveError> {
    if expr.ty == expected {
        Ok(())
    } else {
        Err(ResolveError::TypeMismatch {
            expected: expected.to_string(),
            found: expr.ty.to_string(),
            context: context.to_owned(),
            span: expr.span,
        })
    }
}

/// Variables visible after an `if`: those bound on both paths, which must
/// agree on type. A name bound on only one path goes out of scope.
fn merge_branches(
    then_scope: &SymbolTable,
    else_scope: &SymbolTable,
    span: Span,
) -> Result<SymbolTable, ResolveError> {
    let mut merged = SymbolTable::new();
    for (name, then_ty) in then_scope.iter() {
        if let Some(else_ty) = else_scope.lookup(name) {
            if else_ty != then_ty {
                return Err(ResolveError::TypeMismatch {
                    expected: then_ty.to_string(),
                    found: else_ty.to_string(),
                    context: format!("'{}' after if/else", name),
                    span,
                });
            }
            merged = merged.bind(name, then_ty);
        }
    }
    Ok(merged)
}

/// A variable reassigned in a loop body must end each iteration with the type
/// it had on entry.
fn check_loop_carried(
    before: &SymbolTable,
    after_body: &SymbolTable,
    span: Span,
) -> Result<(), ResolveError> {
    for (name, ty) in before.iter() {
        if let Some(body_ty) = after_body.lookup(name) {
            if body_ty != ty {
                return Err(ResolveError::TypeMismatch {
                    expected: ty.to_string(),
                    found: body_ty.to_string(),
                    context: format!("loop-carried variable '{}'", name),
                    span,
                });
            }
        }
    }
    Ok(())
}

fn lower_binop(op: AstBinOp) -> BinOp {
    match op {
        AstBinOp::Add => BinOp::Add,
        AstBinOp::Sub => BinOp::Sub,
        AstBinOp::Mul => BinOp::Mul,
        AstBinOp::Div => BinOp::Div,
        AstBinOp::Mod => BinOp::Mod,
        AstBinOp::Pow => BinOp::Pow,
        AstBinOp::MatMul => BinOp::MatMul,
        AstBinOp::CmpEq => BinOp::CmpEq,
        AstBinOp::CmpNe => BinOp::CmpNe,
        AstBinOp::CmpLt => BinOp::CmpLt,
        AstBinOp::CmpLe => BinOp::CmpLe,
        AstBinOp::CmpGt => BinOp::CmpGt,
        AstBinOp::CmpGe => BinOp::CmpGe,
        AstBinOp::And => BinOp::And,
        AstBinOp::Or => BinOp::Or,
    }
}
