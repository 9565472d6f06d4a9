use thiserror::Error;

use crate::parser::lexer::Span;

/// Top-level error type for the mscript compiler pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", format_error_pretty("syntax error", &format!("{}", _0)))]
    Parse(#[from] ParseError),

    #[error("{}", format_error_pretty("resolve error", &format!("{}", _0)))]
    Resolve(#[from] ResolveError),

    #[error("{}", format_error_pretty("flatten error", &format!("{}", _0)))]
    Flatten(#[from] FlattenError),

    #[error("{}", format_error_pretty("optimizer error", &format!("{}", _0)))]
    Pass(#[from] PassError),

    #[error("{}", format_error_pretty("runtime error", &format!("{}", _0)))]
    Interp(#[from] InterpError),

    #[error("{}", format_error_pretty("output error", &format!("{}", _0)))]
    Output(#[from] OutputError),

    #[error("plan rendering failed: {0}")]
    Explain(#[from] std::fmt::Error),
}

/// Formats a compiler error in a human-friendly style.
fn format_error_pretty(category: &str, msg: &str) -> String {
    format!("[{}] {}", category, msg)
}

/// The pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Resolve,
    Flatten,
    Optimize,
    Execute,
    Output,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Parse => "parse",
            Stage::Resolve => "resolve",
            Stage::Flatten => "flatten",
            Stage::Optimize => "optimize",
            Stage::Execute => "execute",
            Stage::Output => "output",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected character '{ch}' (at byte {pos})")]
    UnexpectedChar { ch: char, pos: u32 },

    #[error("invalid literal '{text}': this does not look like a valid number")]
    InvalidLiteral { text: String, span: Span },

    #[error("expected {expected}, but found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("'return' may only appear as the last statement of a function body")]
    MisplacedReturn { span: Span },

    #[error("matrix literal rows must all have the same length (row {row} has {found} elements, expected {expected})")]
    RaggedMatrix {
        row: usize,
        expected: usize,
        found: usize,
        span: Span,
    },
}

// ---------------------------------------------------------------------------
// Resolution errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot find '{name}': this variable or function is not defined in the current scope")]
    UnresolvedSymbol { name: String, span: Span },

    #[error("'{name}' expects {expected} argument(s) but was called with {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("type mismatch: expected '{expected}' but found '{found}' ({context})")]
    TypeMismatch {
        expected: String,
        found: String,
        context: String,
        span: Span,
    },

    #[error("'{name}' is already defined; function names must be unique and may not shadow built-ins")]
    DuplicateFunction { name: String, span: Span },

    #[error("'{name}' returns {count} values and cannot be used inside an expression; bind it with `(a, b) = {name}(...)`")]
    MultiOutputInExpression {
        name: String,
        count: usize,
        span: Span,
    },

    #[error("'{name}' produces no value and can only be used as a statement")]
    NoValue { name: String, span: Span },

    #[error("cannot bind {found} name(s) to '{name}', which returns {expected} value(s)")]
    OutputCountMismatch {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("'{what}' is only allowed at the top level of a script")]
    TopLevelOnly { what: String, span: Span },
}

// ---------------------------------------------------------------------------
// Flattening errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("unsupported construct: {construct} cannot be flattened in an expression context")]
    UnsupportedConstruct { construct: String, span: Span },

    #[error("internal error: variable '{name}' has no binding during flattening")]
    UnboundVariable { name: String, span: Span },

    #[error("internal error: function '{name}' was flattened twice")]
    DuplicateFunction { name: String },
}

// ---------------------------------------------------------------------------
// Pass errors (internal optimizer invariant violations)
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PassError {
    #[error("in function '{func}': value '{value}' is used before it is defined")]
    UseBeforeDef { func: String, value: String },

    #[error("in function '{func}': value '{value}' is defined more than once")]
    MultipleDefinition { func: String, value: String },

    #[error("in function '{func}': block '{block}' does not end with exactly one terminator")]
    MissingTerminator { func: String, block: String },

    #[error("in function '{func}': call to unknown function '{callee}'")]
    UnknownCallee { func: String, callee: String },

    #[error("in function '{func}': call to '{callee}' passes {found} argument(s), expected {expected}")]
    CallArity {
        func: String,
        callee: String,
        expected: usize,
        found: usize,
    },
}

// ---------------------------------------------------------------------------
// Interpreter errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum InterpError {
    #[error("internal error: undefined value %{id}")]
    UndefinedValue { id: u32 },

    #[error("dimension mismatch in '{op}': {lhs} vs {rhs}")]
    DimensionMismatch { op: String, lhs: String, rhs: String },

    #[error("index ({row}, {col}) out of bounds for a {rows}x{cols} matrix")]
    IndexOutOfBounds {
        row: i64,
        col: i64,
        rows: usize,
        cols: usize,
    },

    #[error("type error: {detail}")]
    TypeError { detail: String },

    #[error("no function named '{name}' in the compiled program")]
    UnknownFunction { name: String },

    #[error("missing value for input '{name}'")]
    MissingInput { name: String },

    #[error("a {rows}x{cols} matrix exceeds the limit of {limit} cells")]
    MatrixTooLarge { rows: usize, cols: usize, limit: usize },

    #[error("exceeded step limit of {limit} (infinite loop?)")]
    StepLimit { limit: usize },

    #[error("exceeded call depth of {limit} (unbounded recursion?)")]
    CallDepth { limit: usize },
}

// ---------------------------------------------------------------------------
// Output artifact errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("the script declares no outputs to write")]
    NoOutputs,

    #[error("output '{name}' is a {kind}, only scalars and matrices can be written")]
    NotNumeric { name: String, kind: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed result file '{path}': {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Returns the pipeline stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Error::Parse(_) => Stage::Parse,
            Error::Resolve(_) => Stage::Resolve,
            Error::Flatten(_) => Stage::Flatten,
            Error::Pass(_) | Error::Explain(_) => Stage::Optimize,
            Error::Interp(_) => Stage::Execute,
            Error::Output(_) => Stage::Output,
        }
    }

    /// Returns a stable diagnostic code for this error.
    pub fn diagnostic_code(&self) -> &'static str {
        match self {
            Error::Parse(p) => match p {
                ParseError::UnexpectedChar { .. } => "E0001",
                ParseError::InvalidLiteral { .. } => "E0002",
                ParseError::UnexpectedToken { .. } => "E0003",
                ParseError::MisplacedReturn { .. } => "E0004",
                ParseError::RaggedMatrix { .. } => "E0005",
            },
            Error::Resolve(r) => match r {
                ResolveError::UnresolvedSymbol { .. } => "E0100",
                ResolveError::ArityMismatch { .. } => "E0101",
                ResolveError::TypeMismatch { .. } => "E0102",
                ResolveError::DuplicateFunction { .. } => "E0103",
                ResolveError::MultiOutputInExpression { .. } => "E0104",
                ResolveError::NoValue { .. } => "E0105",
                ResolveError::OutputCountMismatch { .. } => "E0106",
                ResolveError::TopLevelOnly { .. } => "E0107",
            },
            Error::Flatten(f) => match f {
                FlattenError::UnsupportedConstruct { .. } => "E0200",
                FlattenError::UnboundVariable { .. } => "E0201",
                FlattenError::DuplicateFunction { .. } => "E0202",
            },
            Error::Pass(_) | Error::Explain(_) => "E0300",
            Error::Interp(_) => "E0400",
            Error::Output(_) => "E0500",
        }
    }

    /// Returns the source span of the offending construct, if the error has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Parse(p) => match p {
                ParseError::UnexpectedChar { pos, .. } => Some(Span::at(*pos)),
                ParseError::InvalidLiteral { span, .. }
                | ParseError::UnexpectedToken { span, .. }
                | ParseError::MisplacedReturn { span }
                | ParseError::RaggedMatrix { span, .. } => Some(*span),
            },
            Error::Resolve(r) => match r {
                ResolveError::UnresolvedSymbol { span, .. }
                | ResolveError::ArityMismatch { span, .. }
                | ResolveError::TypeMismatch { span, .. }
                | ResolveError::DuplicateFunction { span, .. }
                | ResolveError::MultiOutputInExpression { span, .. }
                | ResolveError::NoValue { span, .. }
                | ResolveError::OutputCountMismatch { span, .. }
                | ResolveError::TopLevelOnly { span, .. } => Some(*span),
            },
            Error::Flatten(f) => match f {
                FlattenError::UnsupportedConstruct { span, .. }
                | FlattenError::UnboundVariable { span, .. } => Some(*span),
                FlattenError::DuplicateFunction { .. } => None,
            },
            _ => None,
        }
    }
}
