use crate::parser::lexer::Span;

/// An identifier with its source location.
#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// Value kinds as written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstTypeKind {
    Scalar,
    Matrix,
    Bool,
}

/// A parsed type annotation.
#[derive(Debug, Clone, Copy)]
pub struct AstType {
    pub kind: AstTypeKind,
    pub span: Span,
}

/// A function parameter.
#[derive(Debug, Clone)]
pub struct AstParam {
    pub name: Ident,
    pub ty: AstType,
}

/// A function body: either a single expression or statements ending in `return`.
#[derive(Debug, Clone)]
pub enum AstFnBody {
    /// `def f(x: scalar) -> scalar = x * x + 1;`
    Expr(Box<AstExpr>),
    /// `def g(...) -> scalar { ...; return acc; }`
    Block {
        stmts: Vec<AstStmt>,
        /// One expression per declared return value.
        returns: Vec<AstExpr>,
        return_span: Span,
    },
}

/// A function definition.
#[derive(Debug, Clone)]
pub struct AstFunction {
    pub name: Ident,
    pub params: Vec<AstParam>,
    /// Declared return types; more than one makes this a multi-output function.
    pub returns: Vec<AstType>,
    pub body: AstFnBody,
    pub span: Span,
}

/// A `{ ... }` statement list.
#[derive(Debug, Clone)]
pub struct AstBlock {
    pub stmts: Vec<AstStmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum AstStmt {
    /// `name = expr;`
    Assign {
        target: Ident,
        value: Box<AstExpr>,
        span: Span,
    },
    /// `(a, b) = f(...);`
    MultiAssign {
        targets: Vec<Ident>,
        callee: Ident,
        args: Vec<AstExpr>,
        span: Span,
    },
    If {
        cond: Box<AstExpr>,
        then_body: AstBlock,
        else_body: Option<AstBlock>,
        span: Span,
    },
    While {
        cond: Box<AstExpr>,
        body: AstBlock,
        span: Span,
    },
    /// `for (i in start:end) { ... }`
    For {
        var: Ident,
        start: Box<AstExpr>,
        end: Box<AstExpr>,
        body: AstBlock,
        span: Span,
    },
    /// `input x: scalar;` declares a value bound by the caller.
    Input {
        name: Ident,
        ty: AstType,
        span: Span,
    },
    /// `output R, S;`
    Output { names: Vec<Ident>, span: Span },
    /// An expression evaluated for its side effects, e.g. `print(x);`.
    Expr(Box<AstExpr>),
}

/// Binary operators as parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    MatMul,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstUnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
pub enum AstExpr {
    Number {
        value: f64,
        span: Span,
    },
    Bool {
        value: bool,
        span: Span,
    },
    Ident(Ident),
    BinOp {
        op: AstBinOp,
        lhs: Box<AstExpr>,
        rhs: Box<AstExpr>,
        span: Span,
    },
    UnaryOp {
        op: AstUnaryOp,
        expr: Box<AstExpr>,
        span: Span,
    },
    /// A call in expression position; may nest anywhere an operand is legal.
    Call {
        callee: Ident,
        args: Vec<AstExpr>,
        span: Span,
    },
    /// `X[i, j]`, 1-based.
    Index {
        base: Box<AstExpr>,
        row: Box<AstExpr>,
        col: Box<AstExpr>,
        span: Span,
    },
    /// `[1, 2; 3, 4]`, stored row-major.
    MatrixLit {
        rows: usize,
        cols: usize,
        elems: Vec<AstExpr>,
        span: Span,
    },
    /// `if (p) a else b` in expression position.
    If {
        cond: Box<AstExpr>,
        then_expr: Box<AstExpr>,
        else_expr: Box<AstExpr>,
        span: Span,
    },
}

impl AstExpr {
    pub fn span(&self) -> Span {
        match self {
            AstExpr::Number { span, .. } => *span,
            AstExpr::Bool { span, .. } => *span,
            AstExpr::Ident(ident) => ident.span,
            AstExpr::BinOp { span, .. } => *span,
            AstExpr::UnaryOp { span, .. } => *span,
            AstExpr::Call { span, .. } => *span,
            AstExpr::Index { span, .. } => *span,
            AstExpr::MatrixLit { span, .. } => *span,
            AstExpr::If { span, .. } => *span,
        }
    }
}

/// A parsed script: function definitions plus top-level statements in source order.
#[derive(Debug, Clone, Default)]
pub struct AstProgram {
    pub functions: Vec<AstFunction>,
    pub stmts: Vec<AstStmt>,
}
