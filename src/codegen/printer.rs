//! IR pretty-printer.
//!
//! Emits a human-readable text representation of an `IrModule`.
//! Output is deterministic: functions are printed in `FunctionId` order,
//! blocks in `BlockId` order, instructions in program order.

use std::fmt::{self, Write};

use crate::ir::function::IrFunction;
use crate::ir::instr::IrInstr;
use crate::ir::module::IrModule;
use crate::ir::value::Operand;

/// Emits a full text dump of the IR module.
pub fn emit_ir_text(module: &IrModule) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "// mscript module: {}", module.name)?;
    for func in module.functions() {
        writeln!(out)?;
        emit_function(&mut out, func)?;
    }
    Ok(out)
}

/// Emits the execution plan: a per-function summary followed by the IR.
///
/// This is what `explain` shows after optimization, so it reflects which
/// calls were merged and which callees were inlined.
pub fn emit_plan_text(module: &IrModule) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "PLAN {}", module.name)?;
    if !module.outputs().is_empty() {
        writeln!(out, "  outputs: {}", module.outputs().join(", "))?;
    }
    for func in module.functions() {
        let calls = func
            .blocks()
            .iter()
            .flat_map(|b| &b.instrs)
            .filter(|i| matches!(i, IrInstr::Call { .. }))
            .count();
        write!(
            out,
            "  {}: {}, {:?} body, {} block(s), {} instr(s), {} call(s)",
            func.name,
            func.purity,
            func.body_kind,
            func.blocks().len(),
            func.instr_count(),
            calls
        )?;
        if func.recursive {
            write!(out, ", recursive")?;
        }
        writeln!(out)?;
    }
    writeln!(out)?;
    out.push_str(&emit_ir_text(module)?);
    Ok(out)
}

fn emit_function(out: &mut String, func: &IrFunction) -> fmt::Result {
    write!(out, "def {}(", func.name)?;
    for (i, param) in func.params.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "{}: {}", param.name, param.ty)?;
    }
    write!(out, ") -> (")?;
    for (i, ty) in func.return_tys.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "{}", ty)?;
    }
    writeln!(out, ") [{}] {{", func.purity)?;

    for block in func.blocks() {
        let label = block.name.as_deref().unwrap_or("bb");
        write!(out, "  {}{}(", label, block.id.0)?;
        for (i, param) in block.params.iter().enumerate() {
            if i > 0 {
                write!(out, ", ")?;
            }
            let name = param.name.as_deref().unwrap_or("_");
            write!(out, "{} {}: {}", param.id, name, param.ty)?;
        }
        writeln!(out, "):")?;

        for instr in &block.instrs {
            write!(out, "    ")?;
            emit_instr(out, instr)?;
            writeln!(out)?;
        }
    }
    writeln!(out, "}}")
}

fn emit_instr(out: &mut String, instr: &IrInstr) -> fmt::Result {
    match instr {
        IrInstr::BinOp {
            result,
            op,
            lhs,
            rhs,
            ty,
        } => write!(out, "{} = {} {}, {} : {}", result, op, lhs, rhs, ty),

        IrInstr::UnaryOp {
            result,
            op,
            operand,
            ty,
        } => write!(out, "{} = {} {} : {}", result, op, operand, ty),

        IrInstr::Intrinsic {
            result, op, args, ty,
        } => {
            if let Some(r) = result {
                write!(out, "{} = ", r)?;
            }
            write!(out, "builtin.{}(", op)?;
            emit_operands(out, args)?;
            write!(out, ")")?;
            match ty {
                Some(t) => write!(out, " : {}", t),
                None => Ok(()),
            }
        }

        IrInstr::MakeMatrix {
            result,
            rows,
            cols,
            elems,
        } => {
            write!(out, "{} = matrix.{}x{} [", result, rows, cols)?;
            emit_operands(out, elems)?;
            write!(out, "]")
        }

        IrInstr::Index {
            result,
            base,
            row,
            col,
        } => write!(out, "{} = index {}[{}, {}]", result, base, row, col),

        IrInstr::Call {
            results,
            callee,
            args,
            ..
        } => {
            if !results.is_empty() {
                for (i, r) in results.iter().enumerate() {
                    if i > 0 {
                        write!(out, ", ")?;
                    }
                    write!(out, "{}", r)?;
                }
                write!(out, " = ")?;
            }
            write!(out, "call @{}(", callee)?;
            emit_operands(out, args)?;
            write!(out, ")")
        }

        IrInstr::Br { target, args } => {
            write!(out, "br {}(", target)?;
            emit_operands(out, args)?;
            write!(out, ")")
        }

        IrInstr::CondBr {
            cond,
            then_block,
            then_args,
            else_block,
            else_args,
        } => {
            write!(out, "condbr {}, {}(", cond, then_block)?;
            emit_operands(out, then_args)?;
            write!(out, "), {}(", else_block)?;
            emit_operands(out, else_args)?;
            write!(out, ")")
        }

        IrInstr::Return { values } => {
            write!(out, "ret")?;
            if !values.is_empty() {
                write!(out, " ")?;
                emit_operands(out, values)?;
            }
            Ok(())
        }
    }
}

fn emit_operands(out: &mut String, ops: &[Operand]) -> fmt::Result {
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "{}", op)?;
    }
    Ok(())
}
