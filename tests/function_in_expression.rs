//! End-to-end scripts that call user functions inside expressions. Each one
//! evaluates to 7, with and without the optimizer, and writes its result
//! file through the normal output path.

use mscript::output::read_cell;
use mscript::{run, ExecOptions, OptimizerConfig, RunReport};

const EPS: f64 = 1e-13;

fn run_to_file(src: &str, optimizer: OptimizerConfig) -> (RunReport, f64) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("R.json");
    let options = ExecOptions {
        optimizer,
        output_path: Some(path.clone()),
        ..ExecOptions::default()
    };
    let report = run(src, &options).unwrap_or_else(|e| panic!("{}\n{}", e, src));
    let cell = read_cell(&path, 1, 1).unwrap();
    (report, cell)
}

fn assert_seven(src: &str) -> RunReport {
    let (plain, plain_cell) = run_to_file(src, OptimizerConfig::none());
    let (optimized, opt_cell) = run_to_file(src, OptimizerConfig::default());
    for (label, v) in [("unoptimized", plain_cell), ("optimized", opt_cell)] {
        assert!((v - 7.0).abs() < EPS, "{} result {} != 7 for\n{}", label, v, src);
    }
    assert_eq!(plain.scalar("R"), optimized.scalar("R"));
    optimized
}

#[test]
fn test_call_as_operand() {
    assert_seven(
        r#"
def f(x: scalar) -> scalar = x + 1;
R = f(3) * 2 - 1;
output R;
"#,
    );
}

#[test]
fn test_call_as_argument() {
    assert_seven(
        r#"
def sq(x: scalar) -> scalar = x * x;
def inc(x: scalar) -> scalar = x + 1;
R = inc(sq(2)) + sq(1) + 1;
output R;
"#,
    );
}

#[test]
fn test_matrix_function_in_builtin_argument() {
    assert_seven(
        r#"
def scale(M: matrix, k: scalar) -> matrix = M * k;
R = sum(scale(matrix(1, 2, 2), 2)) - 1;
output R;
"#,
    );
}

#[test]
fn test_repeated_and_cancelling_calls() {
    let report = assert_seven(
        r#"
def f(x: scalar) -> scalar = x * x + 1;
R = f(2) + f(1) + f(1) - f(1);
output R;
"#,
    );
    // Inlined away entirely.
    assert_eq!(report.stats.call_count("f"), 0);
}

#[test]
fn test_call_in_if_predicate() {
    assert_seven(
        r#"
def f(x: scalar) -> scalar = x * x + 1;
def pos(x: scalar) -> bool = x > 0;
if (pos(f(1))) {
    R = 7;
} else {
    R = 0;
}
output R;
"#,
    );
}

#[test]
fn test_index_into_call_result() {
    assert_seven(
        r#"
def m(a: scalar) -> matrix = [a, a + 1; a + 2, a + 3];
R = m(1)[2, 2] + m(1)[1, 2] + 1;
output R;
"#,
    );
}

#[test]
fn test_loop_function_in_expression() {
    let report = assert_seven(
        r#"
def g(n: scalar) -> scalar {
    s = 0;
    for (i in 1:n) {
        s = s + i;
    }
    return s;
}
R = g(3) + 1;
output R;
"#,
    );
    assert_eq!(report.stats.call_count("g"), 1);
}

#[test]
fn test_repeated_loop_function_evaluated_once() {
    let src = r#"
def g(n: scalar) -> scalar {
    s = 0;
    i = 1;
    while (i <= n) {
        s = s + i;
        i = i + 1;
    }
    return s;
}
R = g(2) + g(2) + 1;
output R;
"#;
    let report = assert_seven(src);
    assert_eq!(report.stats.call_count("g"), 1);
    let (plain, _) = run_to_file(src, OptimizerConfig::none());
    assert_eq!(plain.stats.call_count("g"), 2);
}

#[test]
fn test_multi_output_call() {
    assert_seven(
        r#"
def h(x: scalar) -> (scalar, scalar) {
    return (x + 1, x * 2);
}
(p, q) = h(2);
R = p + q;
output R;
"#,
    );
}
