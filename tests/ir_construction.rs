//! Tests that construct IR using the builder API directly, without parsing.
//! These verify IR invariants at the type and structure level.

use mscript::codegen::{emit_ir_text, emit_plan_text};
use mscript::config::ExecOptions;
use mscript::interp::{call_function, Value};
use mscript::ir::function::{BodyKind, Param, Purity};
use mscript::ir::instr::{BinOp, IrInstr};
use mscript::ir::module::{IrFunctionBuilder, IrModule};
use mscript::ir::types::IrType;
use mscript::ir::value::Operand;

/// `def clamp_sum(n: scalar) -> scalar`: sums 1..n with a while-style loop
/// built by hand from header parameters and a back edge.
fn build_loop_module() -> IrModule {
    let mut module = IrModule::new("loops");
    let mut b = IrFunctionBuilder::new(
        "clamp_sum",
        vec![Param {
            name: "n".into(),
            ty: IrType::Scalar,
        }],
        vec![IrType::Scalar],
        BodyKind::Statements,
        Purity::Pure,
    );
    let entry = b.entry_block();
    let n = b.add_block_param(entry, Some("n"), IrType::Scalar);

    let header = b.create_block(Some("header"));
    let body = b.create_block(Some("body"));
    let exit = b.create_block(Some("exit"));

    b.push_instr(IrInstr::Br {
        target: header,
        args: vec![Operand::Scalar(1.0), Operand::Scalar(0.0)],
    });

    b.set_current_block(header);
    let i = b.add_block_param(header, Some("i"), IrType::Scalar);
    let s = b.add_block_param(header, Some("s"), IrType::Scalar);
    let cond = b.fresh_value();
    b.push_instr(IrInstr::BinOp {
        result: cond,
        op: BinOp::CmpLe,
        lhs: Operand::Value(i),
        rhs: Operand::Value(n),
        ty: IrType::Bool,
    });
    b.push_instr(IrInstr::CondBr {
        cond: Operand::Value(cond),
        then_block: body,
        then_args: vec![],
        else_block: exit,
        else_args: vec![],
    });

    b.set_current_block(body);
    let s2 = b.fresh_value();
    b.push_instr(IrInstr::BinOp {
        result: s2,
        op: BinOp::Add,
        lhs: Operand::Value(s),
        rhs: Operand::Value(i),
        ty: IrType::Scalar,
    });
    let i2 = b.fresh_value();
    b.push_instr(IrInstr::BinOp {
        result: i2,
        op: BinOp::Add,
        lhs: Operand::Value(i),
        rhs: Operand::Scalar(1.0),
        ty: IrType::Scalar,
    });
    b.push_instr(IrInstr::Br {
        target: header,
        args: vec![Operand::Value(i2), Operand::Value(s2)],
    });

    b.set_current_block(exit);
    b.push_instr(IrInstr::Return {
        values: vec![Operand::Value(s)],
    });
    assert!(b.is_current_block_terminated());

    module.add_function(b.build()).unwrap();
    module
}

#[test]
fn test_builder_creates_entry_block() {
    let b = IrFunctionBuilder::new(
        "empty",
        Vec::new(),
        Vec::new(),
        BodyKind::Statements,
        Purity::Pure,
    );
    let f = b.build();
    assert_eq!(f.blocks().len(), 1);
    assert_eq!(f.blocks()[0].name.as_deref(), Some("entry"));
    assert!(f.entry_block().unwrap().instrs.is_empty());
}

#[test]
fn test_value_types_recorded() {
    let module = build_loop_module();
    let f = module.function_by_name("clamp_sum").unwrap();
    let header = &f.blocks()[1];
    assert_eq!(header.params.len(), 2);
    for p in &header.params {
        assert_eq!(f.value_type(p.id), Some(IrType::Scalar));
    }
    let cond = f.blocks()[1].instrs[0].results()[0];
    assert_eq!(f.value_type(cond), Some(IrType::Bool));
}

#[test]
fn test_instructions_after_terminator_are_dropped() {
    let mut b = IrFunctionBuilder::new(
        "sealed",
        Vec::new(),
        vec![IrType::Scalar],
        BodyKind::Expression,
        Purity::Pure,
    );
    b.push_instr(IrInstr::Return {
        values: vec![Operand::Scalar(1.0)],
    });
    let v = b.fresh_value();
    b.push_instr(IrInstr::BinOp {
        result: v,
        op: BinOp::Add,
        lhs: Operand::Scalar(1.0),
        rhs: Operand::Scalar(1.0),
        ty: IrType::Scalar,
    });
    let f = b.build();
    assert_eq!(f.instr_count(), 1);
    assert_eq!(f.value_type(v), None);
}

#[test]
fn test_duplicate_function_names_rejected() {
    let mut module = build_loop_module();
    let b = IrFunctionBuilder::new(
        "clamp_sum",
        Vec::new(),
        Vec::new(),
        BodyKind::Statements,
        Purity::Pure,
    );
    assert!(module.add_function(b.build()).is_err());
}

#[test]
fn test_hand_built_loop_evaluates() {
    let module = build_loop_module();
    let (values, stats) = call_function(
        &module,
        "clamp_sum",
        vec![Value::Scalar(4.0)],
        &ExecOptions::default(),
    )
    .unwrap();
    assert_eq!(values, vec![Value::Scalar(10.0)]);
    assert_eq!(stats.call_count("clamp_sum"), 1);
}

#[test]
fn test_ir_printer_contains_expected_tokens() {
    let module = build_loop_module();
    let text = emit_ir_text(&module).unwrap();
    assert!(text.starts_with("// mscript module: loops"), "{}", text);
    assert!(text.contains("def clamp_sum(n: scalar) -> (scalar) [pure] {"), "{}", text);
    assert!(text.contains("header1("), "{}", text);
    assert!(text.contains("condbr"), "{}", text);
    assert!(text.contains("br bb1(1.0, 0.0)"), "{}", text);
    assert!(text.contains("ret %"), "{}", text);
}

#[test]
fn test_plan_summarizes_functions() {
    let module = build_loop_module();
    let plan = emit_plan_text(&module).unwrap();
    assert!(plan.starts_with("PLAN loops"), "{}", plan);
    assert!(
        plan.contains("clamp_sum: pure, Statements body, 4 block(s)"),
        "{}",
        plan
    );
    assert!(plan.contains("0 call(s)"), "{}", plan);
}
