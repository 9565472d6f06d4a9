//! Inliner tests: pure expression-bodied callees are expanded at their call
//! sites; everything else stays behind a call, and cycles terminate.

use mscript::codegen::emit_ir_text;
use mscript::error::{Error, InterpError};
use mscript::ir::{IrInstr, IrModule};
use mscript::pass::{InlinePass, Pass};
use mscript::{compile_optimized, compile_to_module, run, ExecOptions, OptimizerConfig};

fn inline_only() -> OptimizerConfig {
    OptimizerConfig {
        cse: false,
        inline: true,
        const_fold: false,
        ..OptimizerConfig::default()
    }
}

fn calls_in(m: &IrModule, func: &str) -> Vec<String> {
    m.function_by_name(func)
        .unwrap()
        .blocks()
        .iter()
        .flat_map(|b| &b.instrs)
        .filter_map(|i| match i {
            IrInstr::Call { callee, .. } => Some(callee.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_pure_expression_callee_is_inlined() {
    let src = r#"
def f(x: scalar) -> scalar = x * x + 1;
R = f(3) * 2 - 1;
output R;
"#;
    let m = compile_optimized(src, "t", &inline_only()).unwrap();
    assert!(calls_in(&m, "main").is_empty());
    let report = run(
        src,
        &ExecOptions {
            optimizer: inline_only(),
            ..ExecOptions::default()
        },
    )
    .unwrap();
    assert_eq!(report.scalar("R"), Some(19.0));
    assert_eq!(report.stats.call_count("f"), 0);
}

#[test]
fn test_nested_pure_callees_fully_expanded() {
    let src = r#"
def sq(x: scalar) -> scalar = x * x;
def inc(x: scalar) -> scalar = x + 1;
def both(x: scalar) -> scalar = inc(sq(x));
R = both(2) + both(1);
output R;
"#;
    let m = compile_optimized(src, "t", &inline_only()).unwrap();
    assert!(calls_in(&m, "main").is_empty());
    assert!(calls_in(&m, "both").is_empty());
    let report = run(src, &ExecOptions::default()).unwrap();
    assert_eq!(report.scalar("R"), Some(7.0));
    assert_eq!(report.stats.user_calls(), 0);
}

#[test]
fn test_statement_bodied_callee_stays_out_of_line() {
    let src = r#"
def g(n: scalar) -> scalar {
    s = 0;
    for (i in 1:n) {
        s = s + i;
    }
    return s;
}
R = g(3) + 1;
output R;
"#;
    let m = compile_optimized(src, "t", &OptimizerConfig::default()).unwrap();
    assert_eq!(calls_in(&m, "main"), vec!["g"]);
    let report = run(src, &ExecOptions::default()).unwrap();
    assert_eq!(report.scalar("R"), Some(7.0));
    assert_eq!(report.stats.call_count("g"), 1);
}

#[test]
fn test_impure_expression_callee_stays_out_of_line() {
    let src = r#"
def draw(x: scalar) -> scalar = random() * 0 + x;
R = draw(4);
output R;
"#;
    let m = compile_optimized(src, "t", &OptimizerConfig::default()).unwrap();
    assert_eq!(calls_in(&m, "main"), vec!["draw"]);
}

#[test]
fn test_oversized_callee_stays_out_of_line() {
    let src = r#"
def big(x: scalar) -> scalar = x + 1 + 2 + 3 + 4 + 5;
R = big(0);
output R;
"#;
    let config = OptimizerConfig {
        max_inline_instrs: 2,
        ..inline_only()
    };
    let m = compile_optimized(src, "t", &config).unwrap();
    assert_eq!(calls_in(&m, "main"), vec!["big"]);
}

#[test]
fn test_self_recursive_expression_function_terminates() {
    let src = r#"
def loop(x: scalar) -> scalar = ifelse(x > 0, loop(x - 1), 0);
R = loop(3);
output R;
"#;
    // Compilation must finish; the recursive call stays a call.
    let m = compile_optimized(src, "t", &OptimizerConfig::default()).unwrap();
    assert!(calls_in(&m, "main").contains(&"loop".to_owned()));
    assert_eq!(calls_in(&m, "loop"), vec!["loop"]);

    // `ifelse` evaluates both arms, so evaluation never bottoms out.
    let err = run(
        src,
        &ExecOptions {
            max_depth: 64,
            ..ExecOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Interp(InterpError::CallDepth { limit: 64 })
    ));
}

#[test]
fn test_mutual_recursion_terminates() {
    let src = r#"
def even(n: scalar) -> bool = ifelse(n == 0, true, odd(n - 1));
def odd(n: scalar) -> bool = ifelse(n == 0, false, even(n - 1));
R = even(4);
output R;
"#;
    let m = compile_optimized(src, "t", &inline_only()).unwrap();
    // Each function keeps exactly the call that closes the cycle.
    assert_eq!(calls_in(&m, "even"), vec!["even"]);
    assert_eq!(calls_in(&m, "odd"), vec!["odd"]);
    assert_eq!(calls_in(&m, "main"), vec!["even"]);
}

#[test]
fn test_recursive_statement_function_evaluates() {
    let src = r#"
def fact(n: scalar) -> scalar {
    r = 1;
    if (n > 1) {
        r = n * fact(n - 1);
    }
    return r;
}
R = fact(5);
output R;
"#;
    let report = run(src, &ExecOptions::default()).unwrap();
    assert_eq!(report.scalar("R"), Some(120.0));
    assert_eq!(report.stats.call_count("fact"), 5);
}

#[test]
fn test_inlining_is_deterministic() {
    let src = r#"
def f(x: scalar) -> scalar = x * x + 1;
def g(x: scalar, y: scalar) -> scalar = f(x) + f(y) * 2;
R = g(1, 2) + g(f(3), 4);
output R;
"#;
    let a = emit_ir_text(&compile_optimized(src, "t", &OptimizerConfig::default()).unwrap()).unwrap();
    let b = emit_ir_text(&compile_optimized(src, "t", &OptimizerConfig::default()).unwrap()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_inline_pass_runs_standalone() {
    let src = r#"
def f(x: scalar) -> scalar = x * 2;
R = f(f(1));
output R;
"#;
    let mut m = compile_to_module(src, "t").unwrap();
    let mut pass = InlinePass::default();
    assert_eq!(pass.name(), "inline");
    pass.run(&mut m).unwrap();
    assert!(calls_in(&m, "main").is_empty());
    // The callee itself is untouched.
    assert_eq!(m.function_by_name("f").unwrap().instr_count(), 2);
}
