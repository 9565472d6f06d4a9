pub mod block;
pub mod builtin;
pub mod function;
pub mod instr;
pub mod module;
pub mod types;
pub mod value;

pub use block::{BlockId, IrBlock};
pub use builtin::Builtin;
pub use function::{BodyKind, FunctionId, IrFunction, Param, Purity};
pub use instr::{BinOp, IrInstr, UnaryOp};
pub use module::{IrFunctionBuilder, IrModule, MAIN_FUNCTION};
pub use types::IrType;
pub use value::{BlockParam, Operand, ValueId};
