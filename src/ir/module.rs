use std::collections::{HashMap, HashSet};

use crate::ir::block::{BlockId, IrBlock};
use crate::ir::function::{BodyKind, FunctionId, IrFunction, Param, Purity};
use crate::ir::instr::IrInstr;
use crate::ir::types::IrType;
use crate::ir::value::{BlockParam, ValueId};

/// Name of the function holding a script's top-level statements.
pub const MAIN_FUNCTION: &str = "main";

/// The top-level IR container.
///
/// Invariants:
/// - Function names are unique within a module.
/// - `FunctionId(n)` always indexes `functions[n]`.
/// - Passes never mutate a module handed to `optimize`; they work on a clone.
#[derive(Debug, Clone, Default)]
pub struct IrModule {
    pub name: String,
    pub(crate) functions: Vec<IrFunction>,
    pub(crate) function_index: HashMap<String, FunctionId>,
    /// Names bound by `output` statements, in declaration order. `main`
    /// returns their final values in this order.
    pub(crate) outputs: Vec<String>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            function_index: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    pub fn function(&self, id: FunctionId) -> Option<&IrFunction> {
        self.functions.get(id.0 as usize)
    }

    pub fn function_by_name(&self, name: &str) -> Option<&IrFunction> {
        let id = self.function_index.get(name)?;
        self.functions.get(id.0 as usize)
    }

    pub fn functions(&self) -> &[IrFunction] {
        &self.functions
    }

    pub(crate) fn functions_mut(&mut self) -> &mut [IrFunction] {
        &mut self.functions
    }

    /// The entry function built from top-level statements.
    pub fn main(&self) -> Option<&IrFunction> {
        self.function_by_name(MAIN_FUNCTION)
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub(crate) fn set_outputs(&mut self, outputs: Vec<String>) {
        self.outputs = outputs;
    }

    /// Registers a function built by `IrFunctionBuilder`.
    /// Returns `Err` if the name is already taken.
    pub fn add_function(&mut self, mut func: IrFunction) -> Result<FunctionId, String> {
        if self.function_index.contains_key(&func.name) {
            return Err(format!("function '{}' already defined", func.name));
        }
        let id = FunctionId(self.functions.len() as u32);
        func.id = id;
        self.function_index.insert(func.name.clone(), id);
        self.functions.push(func);
        Ok(id)
    }

    /// Names of the functions whose purity attribute is `Pure`.
    pub fn pure_functions(&self) -> HashSet<String> {
        self.functions
            .iter()
            .filter(|f| f.purity.is_pure())
            .map(|f| f.name.clone())
            .collect()
    }

    /// Names of functions whose calls always complete without a runtime
    /// error: loop-free, non-recursive bodies made only of instructions that
    /// cannot fail, calling only other such functions.
    pub fn infallible_functions(&self) -> HashSet<String> {
        let mut infallible: HashSet<String> = HashSet::new();
        loop {
            let before = infallible.len();
            for f in &self.functions {
                if infallible.contains(&f.name) || f.recursive || f.has_back_edge() {
                    continue;
                }
                let safe = f
                    .blocks
                    .iter()
                    .flat_map(|b| &b.instrs)
                    .all(|i| !i.may_fail(&infallible));
                if safe {
                    infallible.insert(f.name.clone());
                }
            }
            if infallible.len() == before {
                return infallible;
            }
        }
    }
}

/// Builder for constructing an `IrFunction` incrementally.
///
/// Call order:
/// 1. `new()` allocates the entry block and makes it current
/// 2. `create_block()` / `add_block_param()` for additional blocks
/// 3. `set_current_block()` to move the cursor
/// 4. `push_instr()` to emit instructions into the current block
/// 5. `build()` to consume the builder
pub struct IrFunctionBuilder {
    func: IrFunction,
    current_block: BlockId,
}

impl IrFunctionBuilder {
    pub fn new(
        name: impl Into<String>,
        params: Vec<Param>,
        return_tys: Vec<IrType>,
        body_kind: BodyKind,
        purity: Purity,
    ) -> Self {
        let mut func = IrFunction {
            id: FunctionId(0), // reassigned by IrModule::add_function
            name: name.into(),
            params,
            return_tys,
            body_kind,
            purity,
            recursive: false,
            blocks: Vec::new(),
            value_types: HashMap::new(),
            next_value: 0,
        };
        func.blocks
            .push(IrBlock::new(BlockId(0), Some("entry".to_owned())));
        Self {
            func,
            current_block: BlockId(0),
        }
    }

    pub fn set_recursive(&mut self, recursive: bool) {
        self.func.recursive = recursive;
    }

    /// `main` learns its return types only after its outputs are flattened.
    pub fn set_return_tys(&mut self, tys: Vec<IrType>) {
        self.func.return_tys = tys;
    }

    pub fn entry_block(&self) -> BlockId {
        BlockId(0)
    }

    /// Creates a new block and returns its `BlockId`.
    pub fn create_block(&mut self, name: Option<&str>) -> BlockId {
        let id = BlockId(self.func.blocks.len() as u32);
        self.func
            .blocks
            .push(IrBlock::new(id, name.map(str::to_owned)));
        id
    }

    /// Adds a typed parameter to a block. Returns the `ValueId` of the new param.
    pub fn add_block_param(&mut self, block: BlockId, name: Option<&str>, ty: IrType) -> ValueId {
        let value_id = self.func.fresh_value();
        let param = BlockParam {
            id: value_id,
            ty,
            name: name.map(str::to_owned),
        };
        self.func.blocks[block.0 as usize].params.push(param);
        self.func.value_types.insert(value_id, ty);
        value_id
    }

    /// Returns the current insertion block.
    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    /// Sets the current insertion block.
    pub fn set_current_block(&mut self, block: BlockId) {
        self.current_block = block;
    }

    /// Appends an instruction to the current block and records the types of
    /// its results.
    ///
    /// Instructions pushed after a terminator are dropped; the flattener only
    /// does this for code following a sealed branch.
    pub fn push_instr(&mut self, instr: IrInstr) {
        let block = &mut self.func.blocks[self.current_block.0 as usize];
        if block.is_sealed() {
            return;
        }
        for (id, ty) in instr.typed_results() {
            self.func.value_types.insert(id, ty);
        }
        block.instrs.push(instr);
    }

    /// Returns true if the current block already ends with a terminator.
    pub fn is_current_block_terminated(&self) -> bool {
        self.func.blocks[self.current_block.0 as usize].is_sealed()
    }

    /// Allocates a fresh `ValueId` without attaching it to any instruction.
    pub fn fresh_value(&mut self) -> ValueId {
        self.func.fresh_value()
    }

    /// Consumes the builder and returns the completed `IrFunction`.
    ///
    /// Unsealed blocks are left as-is so the `validate` pass can report them.
    pub fn build(self) -> IrFunction {
        self.func
    }
}
