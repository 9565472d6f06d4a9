/// The closed table of built-in functions.
///
/// Every entry carries an explicit purity attribute; the optimizer consults
/// [`Builtin::is_pure`] and never infers purity from the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Builtin {
    /// `matrix(v, r, c)`: an `r x c` matrix filled with `v`.
    Matrix,
    Sum,
    Mean,
    Min,
    Max,
    Nrow,
    Ncol,
    /// Transpose.
    T,
    Sqrt,
    Abs,
    Exp,
    Log,
    Floor,
    Ceil,
    /// Extracts the only cell of a 1x1 matrix.
    AsScalar,
    /// `ifelse(p, a, b)`: both branches are evaluated.
    IfElse,
    /// `rand(r, c)`: uniform [0, 1) matrix.
    Rand,
    /// `random()`: uniform [0, 1) scalar.
    Random,
    Print,
}

impl Builtin {
    pub const ALL: [Builtin; 19] = [
        Builtin::Matrix,
        Builtin::Sum,
        Builtin::Mean,
        Builtin::Min,
        Builtin::Max,
        Builtin::Nrow,
        Builtin::Ncol,
        Builtin::T,
        Builtin::Sqrt,
        Builtin::Abs,
        Builtin::Exp,
        Builtin::Log,
        Builtin::Floor,
        Builtin::Ceil,
        Builtin::AsScalar,
        Builtin::IfElse,
        Builtin::Rand,
        Builtin::Random,
        Builtin::Print,
    ];

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.iter().copied().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Matrix => "matrix",
            Builtin::Sum => "sum",
            Builtin::Mean => "mean",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Nrow => "nrow",
            Builtin::Ncol => "ncol",
            Builtin::T => "t",
            Builtin::Sqrt => "sqrt",
            Builtin::Abs => "abs",
            Builtin::Exp => "exp",
            Builtin::Log => "log",
            Builtin::Floor => "floor",
            Builtin::Ceil => "ceil",
            Builtin::AsScalar => "as_scalar",
            Builtin::IfElse => "ifelse",
            Builtin::Rand => "rand",
            Builtin::Random => "random",
            Builtin::Print => "print",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Random => 0,
            Builtin::Rand => 2,
            Builtin::Matrix | Builtin::IfElse => 3,
            _ => 1,
        }
    }

    /// Pure built-ins return identical outputs for identical inputs and have
    /// no observable side effects.
    pub fn is_pure(self) -> bool {
        !matches!(self, Builtin::Rand | Builtin::Random | Builtin::Print)
    }

    /// Built-ins that can raise a runtime error on well-typed arguments: a
    /// bad or oversized shape, or a non-1x1 matrix for `as_scalar`.
    pub fn may_fail(self) -> bool {
        matches!(self, Builtin::Matrix | Builtin::Rand | Builtin::AsScalar)
    }

    /// Why an impure built-in is impure.
    pub fn impurity(self) -> Option<&'static str> {
        match self {
            Builtin::Rand | Builtin::Random => Some("draws random numbers"),
            Builtin::Print => Some("performs I/O"),
            _ => None,
        }
    }

    /// Element-wise unary math that maps scalars to scalars and matrices to matrices.
    pub fn is_elementwise(self) -> bool {
        matches!(
            self,
            Builtin::Sqrt
                | Builtin::Abs
                | Builtin::Exp
                | Builtin::Log
                | Builtin::Floor
                | Builtin::Ceil
        )
    }
}

impl std::fmt::Display for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
