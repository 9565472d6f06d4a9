//! Pipeline configuration.

use std::path::PathBuf;

/// Which optimizing rewrites run between flattening and evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerConfig {
    pub cse: bool,
    pub inline: bool,
    pub const_fold: bool,
    /// Callees with more non-terminator instructions than this are never inlined.
    pub max_inline_instrs: usize,
}

impl OptimizerConfig {
    /// Validation only; the IR is evaluated exactly as flattened.
    pub fn none() -> Self {
        Self {
            cse: false,
            inline: false,
            const_fold: false,
            ..Self::default()
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            cse: true,
            inline: true,
            const_fold: true,
            max_inline_instrs: 32,
        }
    }
}

/// Options for a full compile-and-run.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Attach the optimized plan to the report and log it at `info`.
    pub explain: bool,
    /// Where the first declared output is written. Nothing is written on failure.
    pub output_path: Option<PathBuf>,
    pub optimizer: OptimizerConfig,
    /// Instruction budget for one run.
    pub max_steps: usize,
    /// Maximum nesting of user-function calls.
    pub max_depth: usize,
    /// Seed for `rand` and `random`.
    pub seed: u64,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            explain: false,
            output_path: None,
            optimizer: OptimizerConfig::default(),
            max_steps: 1_000_000,
            max_depth: 500,
            seed: 7,
        }
    }
}
