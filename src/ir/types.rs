/// The value kinds the language distinguishes at compile time.
///
/// Matrices carry no static shape; dimensions are checked when the program runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IrType {
    Scalar,
    Matrix,
    Bool,
}

impl std::fmt::Display for IrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrType::Scalar => f.write_str("scalar"),
            IrType::Matrix => f.write_str("matrix"),
            IrType::Bool => f.write_str("bool"),
        }
    }
}
