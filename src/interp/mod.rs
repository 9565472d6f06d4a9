//! IR evaluator.
//!
//! Executes an `IrModule` by walking its SSA instructions and threading
//! values through block parameters at branches. Every user-function call
//! is counted, so tests can observe how many calls an optimization removed.

pub mod ops;
pub mod rng;
pub mod value;

pub use value::{Matrix, Value};

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::config::ExecOptions;
use crate::error::InterpError;
use crate::ir::block::BlockId;
use crate::ir::builtin::Builtin;
use crate::ir::function::IrFunction;
use crate::ir::instr::IrInstr;
use crate::ir::module::IrModule;
use crate::ir::value::{Operand, ValueId};
use rng::RngStream;

/// Counters collected during one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecStats {
    /// Calls per function, `main` included, in first-call order.
    pub calls: IndexMap<String, usize>,
    /// Instructions executed across all functions.
    pub instructions: usize,
}

impl ExecStats {
    pub fn call_count(&self, function: &str) -> usize {
        self.calls.get(function).copied().unwrap_or(0)
    }

    /// Calls to user-defined functions, `main` excluded.
    pub fn user_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|(name, _)| name.as_str() != crate::ir::MAIN_FUNCTION)
            .map(|(_, n)| *n)
            .sum()
    }
}

/// The result of running a module's `main`.
#[derive(Debug, Clone)]
pub struct Execution {
    /// Output values, keyed by output name in declaration order.
    pub outputs: IndexMap<String, Value>,
    /// Lines written by `print`.
    pub printed: Vec<String>,
    pub stats: ExecStats,
}

/// Runs `main` with the given input bindings.
pub fn execute(
    module: &IrModule,
    inputs: &HashMap<String, Value>,
    options: &ExecOptions,
) -> Result<Execution, InterpError> {
    let main = module
        .main()
        .ok_or_else(|| InterpError::UnknownFunction {
            name: crate::ir::MAIN_FUNCTION.to_owned(),
        })?;

    let mut args = Vec::with_capacity(main.params.len());
    for p in &main.params {
        let v = inputs
            .get(&p.name)
            .cloned()
            .ok_or_else(|| InterpError::MissingInput {
                name: p.name.clone(),
            })?;
        if v.ty() != p.ty {
            return Err(InterpError::TypeError {
                detail: format!("input '{}' must be a {}, found a {}", p.name, p.ty, v.ty()),
            });
        }
        args.push(v);
    }

    let mut interp = Interpreter::new(module, options);
    let returns = interp.call(main, args)?;
    let outputs = module
        .outputs()
        .iter()
        .cloned()
        .zip(returns)
        .collect();
    Ok(Execution {
        outputs,
        printed: interp.printed,
        stats: interp.stats,
    })
}

/// Calls a single function by name. Used for testing functions in isolation.
pub fn call_function(
    module: &IrModule,
    name: &str,
    args: Vec<Value>,
    options: &ExecOptions,
) -> Result<(Vec<Value>, ExecStats), InterpError> {
    let func = module
        .function_by_name(name)
        .ok_or_else(|| InterpError::UnknownFunction {
            name: name.to_owned(),
        })?;
    let mut interp = Interpreter::new(module, options);
    let values = interp.call(func, args)?;
    Ok((values, interp.stats))
}

// ---------------------------------------------------------------------------
// Interpreter state
// ---------------------------------------------------------------------------

struct Interpreter<'m> {
    module: &'m IrModule,
    stats: ExecStats,
    printed: Vec<String>,
    rng: RngStream,
    max_steps: usize,
    max_depth: usize,
    depth: usize,
}

impl<'m> Interpreter<'m> {
    fn new(module: &'m IrModule, options: &ExecOptions) -> Self {
        Self {
            module,
            stats: ExecStats::default(),
            printed: Vec::new(),
            rng: RngStream::new(options.seed),
            max_steps: options.max_steps,
            max_depth: options.max_depth,
            depth: 0,
        }
    }

    fn call(&mut self, func: &'m IrFunction, args: Vec<Value>) -> Result<Vec<Value>, InterpError> {
        if self.depth >= self.max_depth {
            return Err(InterpError::CallDepth {
                limit: self.max_depth,
            });
        }
        *self.stats.calls.entry(func.name.clone()).or_insert(0) += 1;
        self.depth += 1;
        let result = self.run(func, args);
        self.depth -= 1;
        result
    }

    fn run(&mut self, func: &'m IrFunction, args: Vec<Value>) -> Result<Vec<Value>, InterpError> {
        let mut values: HashMap<ValueId, Value> = HashMap::new();

        let entry = func.entry_block().ok_or_else(|| InterpError::TypeError {
            detail: format!("function '{}' has no blocks", func.name),
        })?;
        for (param, arg) in entry.params.iter().zip(args) {
            values.insert(param.id, arg);
        }

        let mut current = BlockId(0);
        'blocks: loop {
            let block = func
                .block(current)
                .ok_or(InterpError::UndefinedValue { id: current.0 })?;

            for instr in &block.instrs {
                self.stats.instructions += 1;
                if self.stats.instructions > self.max_steps {
                    return Err(InterpError::StepLimit {
                        limit: self.max_steps,
                    });
                }

                match instr {
                    IrInstr::BinOp {
                        result,
                        op,
                        lhs,
                        rhs,
                        ..
                    } => {
                        let l = operand(&values, lhs)?;
                        let r = operand(&values, rhs)?;
                        values.insert(*result, ops::eval_binary(*op, &l, &r)?);
                    }

                    IrInstr::UnaryOp {
                        result,
                        op,
                        operand: x,
                        ..
                    } => {
                        let v = operand(&values, x)?;
                        values.insert(*result, ops::eval_unary(*op, &v)?);
                    }

                    IrInstr::Intrinsic {
                        result, op, args, ..
                    } => {
                        let argv = operands(&values, args)?;
                        let out = self.intrinsic(*op, &argv)?;
                        if let (Some(r), Some(v)) = (result, out) {
                            values.insert(*r, v);
                        }
                    }

                    IrInstr::MakeMatrix {
                        result,
                        rows,
                        cols,
                        elems,
                    } => {
                        let mut data = Vec::with_capacity(elems.len());
                        for e in elems {
                            data.push(operand(&values, e)?.as_scalar()?);
                        }
                        let m = Matrix::from_rows(*rows, *cols, data).ok_or_else(|| {
                            InterpError::DimensionMismatch {
                                op: "matrix literal".to_owned(),
                                lhs: format!("{}x{}", rows, cols),
                                rhs: format!("{} elements", elems.len()),
                            }
                        })?;
                        values.insert(*result, Value::Matrix(m));
                    }

                    IrInstr::Index {
                        result,
                        base,
                        row,
                        col,
                    } => {
                        let b = operand(&values, base)?;
                        let r = operand(&values, row)?;
                        let c = operand(&values, col)?;
                        values.insert(*result, ops::eval_index(&b, &r, &c)?);
                    }

                    IrInstr::Call {
                        results,
                        callee,
                        args,
                        ..
                    } => {
                        let module = self.module;
                        let target = module.function_by_name(callee).ok_or_else(|| {
                            InterpError::UnknownFunction {
                                name: callee.clone(),
                            }
                        })?;
                        let argv = operands(&values, args)?;
                        let rets = self.call(target, argv)?;
                        for (r, v) in results.iter().zip(rets) {
                            values.insert(*r, v);
                        }
                    }

                    IrInstr::Br { target, args } => {
                        let argv = operands(&values, args)?;
                        bind_block_params(func, *target, argv, &mut values)?;
                        current = *target;
                        continue 'blocks;
                    }

                    IrInstr::CondBr {
                        cond,
                        then_block,
                        then_args,
                        else_block,
                        else_args,
                    } => {
                        let taken = operand(&values, cond)?.as_bool()?;
                        let (target, args) = if taken {
                            (*then_block, then_args)
                        } else {
                            (*else_block, else_args)
                        };
                        let argv = operands(&values, args)?;
                        bind_block_params(func, target, argv, &mut values)?;
                        current = target;
                        continue 'blocks;
                    }

                    IrInstr::Return { values: rets } => {
                        return operands(&values, rets);
                    }
                }
            }

            return Err(InterpError::TypeError {
                detail: format!("block {} of '{}' fell through without a terminator", current, func.name),
            });
        }
    }

    /// Evaluates a built-in. Returns `None` for `print`.
    fn intrinsic(&mut self, op: Builtin, args: &[Value]) -> Result<Option<Value>, InterpError> {
        match op {
            Builtin::Random => Ok(Some(Value::Scalar(self.rng.uniform()))),
            Builtin::Rand => {
                let [r, c] = args else {
                    return Err(InterpError::TypeError {
                        detail: format!("'rand' expects 2 arguments, got {}", args.len()),
                    });
                };
                let rows = ops::dimension(r, "row count")?;
                let cols = ops::dimension(c, "column count")?;
                let n = value::cell_count(rows, cols)?;
                let data = (0..n).map(|_| self.rng.uniform()).collect();
                Ok(Some(Value::Matrix(Matrix { rows, cols, data })))
            }
            Builtin::Print => {
                let line = args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
                tracing::info!(target: "mscript::print", "{}", line);
                self.printed.push(line);
                Ok(None)
            }
            _ => ops::eval_pure_builtin(op, args).map(Some),
        }
    }
}

fn operand(values: &HashMap<ValueId, Value>, op: &Operand) -> Result<Value, InterpError> {
    match op {
        Operand::Scalar(x) => Ok(Value::Scalar(*x)),
        Operand::Bool(b) => Ok(Value::Bool(*b)),
        Operand::Value(id) => values
            .get(id)
            .cloned()
            .ok_or(InterpError::UndefinedValue { id: id.0 }),
    }
}

fn operands(values: &HashMap<ValueId, Value>, ops: &[Operand]) -> Result<Vec<Value>, InterpError> {
    ops.iter().map(|op| operand(values, op)).collect()
}

fn bind_block_params(
    func: &IrFunction,
    target: BlockId,
    args: Vec<Value>,
    values: &mut HashMap<ValueId, Value>,
) -> Result<(), InterpError> {
    let block = func
        .block(target)
        .ok_or(InterpError::UndefinedValue { id: target.0 })?;
    for (param, arg) in block.params.iter().zip(args) {
        values.insert(param.id, arg);
    }
    Ok(())
}
