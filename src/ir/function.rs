use std::collections::HashMap;

use crate::ir::block::{BlockId, IrBlock};
use crate::ir::types::IrType;
use crate::ir::value::ValueId;

/// Uniquely identifies a function within an `IrModule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub u32);

/// A named, typed parameter of a function.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: IrType,
}

/// Whether calls to a function may be merged or dropped by the optimizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Purity {
    Pure,
    /// Carries a human-readable reason, e.g. "calls 'print' (performs I/O)".
    Impure(String),
}

impl Purity {
    pub fn is_pure(&self) -> bool {
        matches!(self, Purity::Pure)
    }
}

impl std::fmt::Display for Purity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Purity::Pure => f.write_str("pure"),
            Purity::Impure(_) => f.write_str("impure"),
        }
    }
}

/// How a function body was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// `def f(x: scalar) -> scalar = expr;`. The only kind the inliner expands.
    Expression,
    /// A statement block ending in `return`.
    Statements,
}

/// A compiled function in SSA form.
///
/// Internal representation uses flat `Vec`s indexed by `BlockId`. The entry
/// block is always `blocks[0]`; its block params are the function arguments.
#[derive(Debug, Clone)]
pub struct IrFunction {
    pub id: FunctionId,
    pub name: String,
    pub params: Vec<Param>,
    pub return_tys: Vec<IrType>,
    pub body_kind: BodyKind,
    pub purity: Purity,
    /// Set when the function sits on a call-graph cycle.
    pub recursive: bool,
    /// Flat list of blocks. `BlockId(n)` indexes `blocks[n]`.
    pub(crate) blocks: Vec<IrBlock>,
    /// Maps `ValueId` to its type. Populated during construction.
    pub(crate) value_types: HashMap<ValueId, IrType>,
    /// Counter for allocating fresh `ValueId`s.
    pub(crate) next_value: u32,
}

impl IrFunction {
    /// Returns the entry block (always `BlockId(0)`).
    pub fn entry_block(&self) -> Option<&IrBlock> {
        self.blocks.first()
    }

    pub fn block(&self, id: BlockId) -> Option<&IrBlock> {
        self.blocks.get(id.0 as usize)
    }

    pub fn blocks(&self) -> &[IrBlock] {
        &self.blocks
    }

    /// Returns the type of a value, if known.
    pub fn value_type(&self, v: ValueId) -> Option<IrType> {
        self.value_types.get(&v).copied()
    }

    /// Whether any branch targets a block at or before its own position.
    /// Blocks are laid out after the blocks that dominate them, so this is
    /// exactly the presence of a loop.
    pub fn has_back_edge(&self) -> bool {
        self.blocks.iter().any(|b| {
            b.terminator()
                .map_or(false, |t| t.successors().iter().any(|s| s.0 <= b.id.0))
        })
    }

    /// Total number of instructions, terminators included.
    pub fn instr_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instrs.len()).sum()
    }

    /// Allocates a fresh `ValueId`.
    pub(crate) fn fresh_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }
}
