use crate::ir::types::IrType;

/// An opaque, index-based reference to an SSA value within a function.
///
/// Invariant: `ValueId(n)` is only valid within the `IrFunction` that produced
/// it. The inliner renames callee values before moving them into a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub u32);

impl std::fmt::Display for ValueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A block parameter in SSA form.
///
/// Block parameters take the place of phi instructions. Entry-block
/// parameters are the function arguments.
#[derive(Debug, Clone)]
pub struct BlockParam {
    pub id: ValueId,
    pub ty: IrType,
    pub name: Option<String>,
}

/// An instruction operand.
///
/// Literals are carried inline, so neither literals nor variable references
/// allocate a temporary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Value(ValueId),
    Scalar(f64),
    Bool(bool),
}

impl Operand {
    pub fn as_value(&self) -> Option<ValueId> {
        match self {
            Operand::Value(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<ValueId> for Operand {
    fn from(v: ValueId) -> Self {
        Operand::Value(v)
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{}", v),
            Operand::Scalar(x) => write!(f, "{:?}", x),
            Operand::Bool(b) => write!(f, "{}", b),
        }
    }
}
