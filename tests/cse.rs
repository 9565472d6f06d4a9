//! Common-subexpression elimination over calls: repeated pure calls with
//! identical arguments collapse to one, impure calls never do.

use mscript::ir::IrInstr;
use mscript::pass::{CsePass, Pass};
use mscript::{compile_optimized, compile_to_module, run, ExecOptions, OptimizerConfig};

fn cse_only() -> OptimizerConfig {
    OptimizerConfig {
        cse: true,
        inline: false,
        const_fold: false,
        ..OptimizerConfig::default()
    }
}

fn options(optimizer: OptimizerConfig) -> ExecOptions {
    ExecOptions {
        optimizer,
        ..ExecOptions::default()
    }
}

fn main_call_count(src: &str, config: &OptimizerConfig) -> usize {
    let m = compile_optimized(src, "t", config).unwrap();
    m.main()
        .unwrap()
        .blocks()
        .iter()
        .flat_map(|b| &b.instrs)
        .filter(|i| matches!(i, IrInstr::Call { .. }))
        .count()
}

const REPEATED: &str = r#"
def f(x: scalar) -> scalar = x * x + 1;
R = f(2) + f(2) + f(3);
output R;
"#;

#[test]
fn test_repeated_pure_call_evaluated_once() {
    let plain = run(REPEATED, &options(OptimizerConfig::none())).unwrap();
    assert_eq!(plain.scalar("R"), Some(20.0));
    assert_eq!(plain.stats.call_count("f"), 3);

    let merged = run(REPEATED, &options(cse_only())).unwrap();
    assert_eq!(merged.scalar("R"), Some(20.0));
    assert_eq!(merged.stats.call_count("f"), 2);
}

#[test]
fn test_merged_call_result_is_reused() {
    assert_eq!(main_call_count(REPEATED, &OptimizerConfig::none()), 3);
    assert_eq!(main_call_count(REPEATED, &cse_only()), 2);
}

#[test]
fn test_cse_pass_runs_standalone() {
    let mut m = compile_to_module(REPEATED, "t").unwrap();
    let mut pass = CsePass;
    assert_eq!(pass.name(), "cse");
    pass.run(&mut m).unwrap();
    let calls: Vec<_> = m
        .main()
        .unwrap()
        .blocks()
        .iter()
        .flat_map(|b| &b.instrs)
        .filter_map(|i| match i {
            IrInstr::Call { results, .. } => Some(results[0]),
            _ => None,
        })
        .collect();
    assert_eq!(calls.len(), 2);
    // The surviving first call feeds the first addition twice.
    let first_add = m
        .main()
        .unwrap()
        .blocks()
        .iter()
        .flat_map(|b| &b.instrs)
        .find(|i| matches!(i, IrInstr::BinOp { .. }))
        .cloned()
        .unwrap();
    let used = first_add.value_operands();
    assert_eq!(used, vec![calls[0], calls[0]]);
}

#[test]
fn test_different_arguments_not_merged() {
    let src = r#"
def f(x: scalar) -> scalar = x * x + 1;
R = f(1) + f(2) + f(3);
output R;
"#;
    let report = run(src, &options(cse_only())).unwrap();
    assert_eq!(report.stats.call_count("f"), 3);
    assert_eq!(report.scalar("R"), Some(2.0 + 5.0 + 10.0));
}

#[test]
fn test_commutative_operands_merge() {
    let src = r#"
def f(x: scalar, y: scalar) -> scalar = x * y;
a = 3;
b = 4;
R = f(a + b, 1) + f(b + a, 1);
output R;
"#;
    let report = run(src, &options(cse_only())).unwrap();
    assert_eq!(report.stats.call_count("f"), 1);
    assert_eq!(report.scalar("R"), Some(14.0));
}

#[test]
fn test_impure_calls_never_merged() {
    let src = r#"
def noisy(x: scalar) -> scalar {
    print(x);
    return x;
}
R = noisy(1) + noisy(1);
output R;
"#;
    let report = run(src, &ExecOptions::default()).unwrap();
    assert_eq!(report.scalar("R"), Some(2.0));
    assert_eq!(report.stats.call_count("noisy"), 2);
    assert_eq!(report.printed.len(), 2);
}

#[test]
fn test_random_draws_stay_distinct() {
    let src = r#"
def draw(x: scalar) -> scalar = random() + x;
R = draw(0) - draw(0);
output R;
"#;
    let report = run(src, &ExecOptions::default()).unwrap();
    assert_eq!(report.stats.call_count("draw"), 2);
    let r = report.scalar("R").unwrap();
    assert!(r != 0.0, "two random draws were merged");
}

#[test]
fn test_calls_inside_impure_callers_still_merge() {
    // Purity is a property of the callee; the caller may print.
    let src = r#"
def f(x: scalar) -> scalar = x * x + 1;
def report(x: scalar) -> scalar {
    y = f(x) + f(x);
    print(y);
    return y;
}
R = report(2);
output R;
"#;
    let report = run(src, &options(cse_only())).unwrap();
    assert_eq!(report.scalar("R"), Some(10.0));
    assert_eq!(report.stats.call_count("f"), 1);
    assert_eq!(report.printed.len(), 1);
}

#[test]
fn test_repeated_pure_builtins_merge() {
    let src = r#"
M = matrix(2, 3, 3);
R = sum(M) + sum(M);
output R;
"#;
    let m = compile_optimized(src, "t", &cse_only()).unwrap();
    let sums = m
        .main()
        .unwrap()
        .blocks()
        .iter()
        .flat_map(|b| &b.instrs)
        .filter(|i| matches!(i, IrInstr::Intrinsic { op, .. } if op.name() == "sum"))
        .count();
    assert_eq!(sums, 1);
    let report = run(src, &options(cse_only())).unwrap();
    assert_eq!(report.scalar("R"), Some(36.0));
}

#[test]
fn test_impure_builtins_not_merged() {
    let src = r#"
A = rand(2, 2);
B = rand(2, 2);
R = sum(A - B);
output R;
"#;
    let m = compile_optimized(src, "t", &OptimizerConfig::default()).unwrap();
    let rands = m
        .main()
        .unwrap()
        .blocks()
        .iter()
        .flat_map(|b| &b.instrs)
        .filter(|i| matches!(i, IrInstr::Intrinsic { op, .. } if op.name() == "rand"))
        .count();
    assert_eq!(rands, 2);
}

#[test]
fn test_call_in_dominated_branch_reuses_earlier_result() {
    let src = r#"
def f(x: scalar) -> scalar = x * x + 1;
a = f(2);
if (a > 0) {
    R = f(2) + 2;
} else {
    R = 0;
}
output R;
"#;
    let plain = run(src, &options(OptimizerConfig::none())).unwrap();
    assert_eq!(plain.stats.call_count("f"), 2);

    let merged = run(src, &options(cse_only())).unwrap();
    assert_eq!(merged.scalar("R"), Some(7.0));
    assert_eq!(merged.stats.call_count("f"), 1);
    assert_eq!(main_call_count(src, &cse_only()), 1);
}

#[test]
fn test_sibling_branches_not_merged() {
    let src = r#"
def f(x: scalar) -> scalar = x * x + 1;
c = 1 > 0;
if (c) {
    R = f(2);
} else {
    R = f(2) + 1;
}
output R;
"#;
    assert_eq!(main_call_count(src, &cse_only()), 2);
    let report = run(src, &options(cse_only())).unwrap();
    assert_eq!(report.scalar("R"), Some(5.0));
    assert_eq!(report.stats.call_count("f"), 1);
}

#[test]
fn test_call_in_loop_body_reuses_value_from_before_loop() {
    let src = r#"
def f(x: scalar) -> scalar = x * x + 1;
a = f(2);
s = 0;
for (i in 1:3) {
    s = s + f(2);
}
R = s - a - 3;
output R;
"#;
    let plain = run(src, &options(OptimizerConfig::none())).unwrap();
    assert_eq!(plain.scalar("R"), Some(7.0));
    assert_eq!(plain.stats.call_count("f"), 4);

    let merged = run(src, &options(cse_only())).unwrap();
    assert_eq!(merged.scalar("R"), Some(7.0));
    assert_eq!(merged.stats.call_count("f"), 1);
}
