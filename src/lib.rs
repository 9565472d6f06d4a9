//! mscript: a small matrix scripting language with function calls in
//! expressions.
//!
//! Compiler pipeline:
//!
//! ```text
//! source → Lexer → [Tokens] → Parser → [AST]
//!   → Resolver → [ResolvedProgram] → Flattener → [IrModule]
//!   → PassManager → Evaluator → outputs
//! ```
//!
//! Passes (in order, each rewrite can be switched off in `OptimizerConfig`):
//! 1. `ValidatePass`  - SSA structural correctness
//! 2. `CsePass`       - merges repeated pure computations, calls included
//! 3. `InlinePass`    - expands pure expression-bodied callees
//! 4. `ConstFoldPass` - literal arithmetic and exact identities
//! 5. `CsePass`       - again, over the inlined bodies
//! 6. `DcePass`       - drops pure instructions nobody reads
//! 7. `ValidatePass`  - the optimized module must still be well formed

pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod interp;
pub mod ir;
pub mod lower;
pub mod output;
pub mod parser;
pub mod pass;
pub mod resolve;

use std::collections::HashMap;

use indexmap::IndexMap;

pub use config::{ExecOptions, OptimizerConfig};
pub use error::Error;
pub use interp::{ExecStats, Matrix, Value};

use crate::ir::IrModule;
use crate::parser::ast::AstProgram;

/// Controls what the `compile()` function emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    /// Pretty-printed IR after optimization.
    Ir,
    /// The execution plan: per-function summary plus IR.
    Plan,
    /// Run the script with default options and print its outputs.
    Eval,
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Output values in declaration order.
    pub outputs: IndexMap<String, Value>,
    /// Lines written by `print`.
    pub printed: Vec<String>,
    pub stats: ExecStats,
    /// The optimized plan, when `ExecOptions::explain` is set.
    pub plan: Option<String>,
}

impl RunReport {
    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    /// The named output as a number. A 1x1 matrix counts as a scalar.
    pub fn scalar(&self, name: &str) -> Option<f64> {
        match self.outputs.get(name)? {
            Value::Scalar(x) => Some(*x),
            Value::Matrix(m) if m.shape() == (1, 1) => Some(m.data[0]),
            _ => None,
        }
    }
}

/// Lexes and parses a script.
pub fn parse(source: &str) -> Result<AstProgram, Error> {
    let tokens = parser::Lexer::new(source).tokenize()?;
    Ok(parser::Parser::new(&tokens).parse_program()?)
}

/// Parses, resolves, flattens, and validates a script. No rewrites run.
pub fn compile_to_module(source: &str, module_name: &str) -> Result<IrModule, Error> {
    let ast = parse(source)?;
    let resolved = resolve::resolve_program(&ast)?;
    let module = lower::flatten(&resolved, module_name)?;
    Ok(pass::optimize(&module, &OptimizerConfig::none())?)
}

/// Compiles a script and runs the optimizer pipeline over it.
pub fn compile_optimized(
    source: &str,
    module_name: &str,
    config: &OptimizerConfig,
) -> Result<IrModule, Error> {
    let module = compile_to_module(source, module_name)?;
    Ok(pass::optimize(&module, config)?)
}

/// Compiles a script through the full pipeline with default options.
///
/// Returns the emitted output as a `String`, or an `Error` if any
/// stage fails. The pipeline aborts at the first error.
pub fn compile(source: &str, module_name: &str, emit: EmitKind) -> Result<String, Error> {
    match emit {
        EmitKind::Ir => {
            let module = compile_optimized(source, module_name, &OptimizerConfig::default())?;
            Ok(codegen::emit_ir_text(&module)?)
        }
        EmitKind::Plan => {
            let module = compile_optimized(source, module_name, &OptimizerConfig::default())?;
            Ok(codegen::emit_plan_text(&module)?)
        }
        EmitKind::Eval => {
            let report = run(source, &ExecOptions::default())?;
            let mut out = String::new();
            for line in &report.printed {
                out.push_str(line);
                out.push('\n');
            }
            for (name, value) in &report.outputs {
                out.push_str(&format!("{} = {}\n", name, value));
            }
            Ok(out)
        }
    }
}

/// Compiles and runs a script that declares no inputs.
pub fn run(source: &str, options: &ExecOptions) -> Result<RunReport, Error> {
    run_with_inputs(source, &[], options)
}

/// Compiles and runs a script, binding its `input` declarations by name.
///
/// When `options.output_path` is set, the first declared output is written
/// there after a successful run. A failure at any stage writes nothing.
pub fn run_with_inputs(
    source: &str,
    inputs: &[(&str, Value)],
    options: &ExecOptions,
) -> Result<RunReport, Error> {
    let module = compile_optimized(source, "script", &options.optimizer)?;

    let plan = if options.explain {
        let text = codegen::emit_plan_text(&module)?;
        tracing::info!(target: "mscript::explain", "\n{}", text);
        Some(text)
    } else {
        None
    };

    let bindings: HashMap<String, Value> = inputs
        .iter()
        .map(|(name, v)| ((*name).to_owned(), v.clone()))
        .collect();
    let exec = interp::execute(&module, &bindings, options)?;
    tracing::debug!(
        instructions = exec.stats.instructions,
        user_calls = exec.stats.user_calls(),
        "run complete"
    );

    if let Some(path) = &options.output_path {
        let (name, value) = exec
            .outputs
            .first()
            .ok_or(error::OutputError::NoOutputs)?;
        output::write_value(path, name, value)?;
    }

    Ok(RunReport {
        outputs: exec.outputs,
        printed: exec.printed,
        stats: exec.stats,
        plan,
    })
}
