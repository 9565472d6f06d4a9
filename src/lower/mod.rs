//! Expression flattening: resolved program → SSA IR.
//!
//! Every nested call becomes its own instruction with a fresh result value,
//! emitted after its arguments (post-order, left to right). Literals and
//! variable references never allocate temporaries; they are used directly as
//! operands.

mod expr;
mod stmt;

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::error::FlattenError;
use crate::ir::{
    BodyKind, IrFunction, IrFunctionBuilder, IrInstr, IrModule, IrType, Operand, Param, Purity,
    MAIN_FUNCTION,
};
use crate::parser::lexer::Span;
use crate::resolve::typed::{ResolvedProgram, TypedBody, TypedFunction, TypedStmt};

/// Flattens a resolved program into an IR module.
///
/// User functions are emitted in definition order, followed by `main`, which
/// holds the top-level statements and returns the declared outputs.
pub fn flatten(program: &ResolvedProgram, module_name: &str) -> Result<IrModule, FlattenError> {
    let mut module = IrModule::new(module_name);

    for f in &program.functions {
        let func = flatten_function(f)?;
        add(&mut module, func)?;
    }

    let main = flatten_main(program)?;
    add(&mut module, main)?;
    module.set_outputs(program.outputs.clone());
    Ok(module)
}

fn add(module: &mut IrModule, func: IrFunction) -> Result<(), FlattenError> {
    tracing::debug!(
        function = %func.name,
        blocks = func.blocks().len(),
        instrs = func.instr_count(),
        "flattened function"
    );
    let name = func.name.clone();
    // Names were made unique by the resolver.
    module
        .add_function(func)
        .map_err(|_| FlattenError::DuplicateFunction { name })?;
    Ok(())
}

fn flatten_function(f: &TypedFunction) -> Result<IrFunction, FlattenError> {
    let params: Vec<Param> = f
        .params
        .iter()
        .map(|(name, ty)| Param {
            name: name.clone(),
            ty: *ty,
        })
        .collect();
    let body_kind = match f.body {
        TypedBody::Expr(_) => BodyKind::Expression,
        TypedBody::Block { .. } => BodyKind::Statements,
    };
    let mut builder = IrFunctionBuilder::new(
        f.name.clone(),
        params,
        f.returns.clone(),
        body_kind,
        f.purity.clone(),
    );
    builder.set_recursive(f.recursive);

    let mut fl = Flattener::new(builder);
    let entry = fl.builder.entry_block();
    for (name, ty) in &f.params {
        let v = fl.builder.add_block_param(entry, Some(name), *ty);
        fl.scope.insert(name.clone(), (Operand::Value(v), *ty));
    }

    let values = match &f.body {
        TypedBody::Expr(expr) => vec![fl.flatten_expr(expr)?],
        TypedBody::Block { stmts, returns } => {
            fl.flatten_stmts(stmts)?;
            let mut values = Vec::with_capacity(returns.len());
            for r in returns {
                values.push(fl.flatten_expr(r)?);
            }
            values
        }
    };
    fl.builder.push_instr(IrInstr::Return { values });
    Ok(fl.builder.build())
}

fn flatten_main(program: &ResolvedProgram) -> Result<IrFunction, FlattenError> {
    let params: Vec<Param> = program
        .inputs
        .iter()
        .map(|(name, ty)| Param {
            name: name.clone(),
            ty: *ty,
        })
        .collect();
    let builder = IrFunctionBuilder::new(
        MAIN_FUNCTION,
        params,
        Vec::new(),
        BodyKind::Statements,
        Purity::Impure("program entry point".into()),
    );
    let mut fl = Flattener::new(builder);
    let entry = fl.builder.entry_block();
    for (name, ty) in &program.inputs {
        let v = fl.builder.add_block_param(entry, Some(name), *ty);
        fl.inputs.insert(name.clone(), Operand::Value(v));
    }

    fl.flatten_stmts(&program.main)?;

    let mut values = Vec::with_capacity(program.outputs.len());
    let mut tys = Vec::with_capacity(program.outputs.len());
    for name in &program.outputs {
        let (op, ty) = fl
            .outputs
            .get(name)
            .copied()
            .ok_or_else(|| FlattenError::UnboundVariable {
                name: name.clone(),
                span: Span::at(0),
            })?;
        values.push(op);
        tys.push(ty);
    }
    fl.builder.set_return_tys(tys);
    fl.builder.push_instr(IrInstr::Return { values });
    Ok(fl.builder.build())
}

/// Per-function flattening state.
pub(crate) struct Flattener {
    pub(crate) builder: IrFunctionBuilder,
    /// Current bindings: name → (operand, type). Ordered so that block
    /// parameters are created in a stable order.
    pub(crate) scope: BTreeMap<String, (Operand, IrType)>,
    /// `main` only: entry parameters backing `input` declarations.
    pub(crate) inputs: BTreeMap<String, Operand>,
    /// `main` only: values captured by `output` statements.
    pub(crate) outputs: IndexMap<String, (Operand, IrType)>,
}

impl Flattener {
    fn new(builder: IrFunctionBuilder) -> Self {
        Self {
            builder,
            scope: BTreeMap::new(),
            inputs: BTreeMap::new(),
            outputs: IndexMap::new(),
        }
    }

    pub(crate) fn lookup(&self, name: &str, span: Span) -> Result<(Operand, IrType), FlattenError> {
        self.scope
            .get(name)
            .copied()
            .ok_or_else(|| FlattenError::UnboundVariable {
                name: name.to_owned(),
                span,
            })
    }
}

/// Scans statements for variables that may be rebound, in discovery order.
///
/// Includes assignment and multi-assignment targets at any nesting depth.
/// `for` loop variables are scoped to their body and are not reported.
pub(crate) fn find_rebound_vars(stmts: &[TypedStmt]) -> Vec<String> {
    let mut names = Vec::new();
    collect_rebound(stmts, &mut names);
    names
}

fn collect_rebound(stmts: &[TypedStmt], names: &mut Vec<String>) {
    fn push(name: &String, names: &mut Vec<String>) {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    for stmt in stmts {
        match stmt {
            TypedStmt::Assign { name, .. } => push(name, names),
            TypedStmt::MultiAssign { targets, .. } => {
                for t in targets {
                    push(t, names);
                }
            }
            TypedStmt::If {
                then_body,
                else_body,
                ..
            } => {
                collect_rebound(then_body, names);
                collect_rebound(else_body, names);
            }
            TypedStmt::While { body, .. } | TypedStmt::For { body, .. } => {
                collect_rebound(body, names);
            }
            _ => {}
        }
    }
}
