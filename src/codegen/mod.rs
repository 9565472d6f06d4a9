pub mod printer;

pub use printer::{emit_ir_text, emit_plan_text};
