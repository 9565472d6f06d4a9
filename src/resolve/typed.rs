//! The resolved program: every name bound, every expression typed, every call
//! annotated with its concrete target.

use crate::ir::{BinOp, Builtin, IrType, Purity, UnaryOp};
use crate::parser::lexer::Span;

/// Index of a user function in [`ResolvedProgram::functions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FnRef(pub usize);

/// What a call site invokes.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    Builtin(Builtin),
    User { func: FnRef, name: String },
}

impl CallTarget {
    pub fn name(&self) -> &str {
        match self {
            CallTarget::Builtin(b) => b.name(),
            CallTarget::User { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: IrType,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypedExprKind {
    Number(f64),
    Bool(bool),
    Var(String),
    Binary {
        op: BinOp,
        lhs: Box<TypedExpr>,
        rhs: Box<TypedExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<TypedExpr>,
    },
    /// A single-valued call. Arguments are already resolved.
    Call {
        target: CallTarget,
        args: Vec<TypedExpr>,
    },
    Index {
        base: Box<TypedExpr>,
        row: Box<TypedExpr>,
        col: Box<TypedExpr>,
    },
    Matrix {
        rows: usize,
        cols: usize,
        elems: Vec<TypedExpr>,
    },
    If {
        cond: Box<TypedExpr>,
        then_expr: Box<TypedExpr>,
        else_expr: Box<TypedExpr>,
    },
}

#[derive(Debug, Clone)]
pub enum TypedStmt {
    Assign {
        name: String,
        value: TypedExpr,
    },
    /// `(a, b) = f(...)`, one target per declared return value.
    MultiAssign {
        targets: Vec<String>,
        target: CallTarget,
        args: Vec<TypedExpr>,
        result_tys: Vec<IrType>,
    },
    If {
        cond: TypedExpr,
        then_body: Vec<TypedStmt>,
        else_body: Vec<TypedStmt>,
    },
    While {
        cond: TypedExpr,
        body: Vec<TypedStmt>,
    },
    /// Ascending inclusive range; `start > end` runs zero iterations.
    For {
        var: String,
        start: TypedExpr,
        end: TypedExpr,
        body: Vec<TypedStmt>,
    },
    Input {
        name: String,
        ty: IrType,
    },
    Output {
        names: Vec<String>,
    },
    /// A call in statement position; any results are discarded.
    Call {
        target: CallTarget,
        args: Vec<TypedExpr>,
        result_tys: Vec<IrType>,
        span: Span,
    },
    /// A non-call expression evaluated for nothing.
    Discard(TypedExpr),
}

#[derive(Debug, Clone)]
pub enum TypedBody {
    Expr(TypedExpr),
    Block {
        stmts: Vec<TypedStmt>,
        returns: Vec<TypedExpr>,
    },
}

#[derive(Debug, Clone)]
pub struct TypedFunction {
    pub name: String,
    pub params: Vec<(String, IrType)>,
    pub returns: Vec<IrType>,
    pub body: TypedBody,
    pub purity: Purity,
    pub recursive: bool,
    pub span: Span,
}

/// Output of name/type resolution; input to the flattener.
#[derive(Debug, Clone, Default)]
pub struct ResolvedProgram {
    pub functions: Vec<TypedFunction>,
    /// Top-level statements in source order.
    pub main: Vec<TypedStmt>,
    /// `input` declarations in source order.
    pub inputs: Vec<(String, IrType)>,
    /// `output` names in first-declaration order.
    pub outputs: Vec<String>,
}

impl ResolvedProgram {
    pub fn function(&self, f: FnRef) -> Option<&TypedFunction> {
        self.functions.get(f.0)
    }
}
