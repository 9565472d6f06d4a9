//! Evaluator tests: operator semantics, runtime errors, inputs, seeded
//! randomness, explain output, and result files.

use mscript::diagnostics::render_error;
use mscript::error::{Error, InterpError, OutputError};
use mscript::ir::IrInstr;
use mscript::output::{read_cell, read_matrix, write_matrix};
use mscript::{
    compile, compile_optimized, run, run_with_inputs, EmitKind, ExecOptions, Matrix,
    OptimizerConfig, Value,
};

fn eval(src: &str) -> f64 {
    let report = run(src, &ExecOptions::default()).unwrap_or_else(|e| panic!("{}\n{}", e, src));
    report.scalar("R").expect("scalar output R")
}

fn run_err(src: &str, options: &ExecOptions) -> Error {
    match run(src, options) {
        Ok(report) => panic!("expected a failure, got {:?}", report.outputs),
        Err(e) => e,
    }
}

// ------------------------------------------------------------------
// Semantics
// ------------------------------------------------------------------

#[test]
fn test_arithmetic_and_precedence() {
    assert_eq!(eval("R = 1 + 2 * 3 - 4 / 2; output R;"), 5.0);
    assert_eq!(eval("R = 2 ^ 3 ^ 2; output R;"), 512.0);
    assert_eq!(eval("R = -2 ^ 2; output R;"), -4.0);
}

#[test]
fn test_modulus_is_floored() {
    assert_eq!(eval("a = 0 - 7; R = a %% 3; output R;"), 2.0);
    assert_eq!(eval("R = 7 %% 3; output R;"), 1.0);
}

#[test]
fn test_matrix_operations() {
    assert_eq!(
        eval("A = [1, 2; 3, 4]; v = [1; 1]; R = sum(A %*% v); output R;"),
        10.0
    );
    assert_eq!(eval("R = sum(matrix(2, 2, 2) > 1); output R;"), 4.0);
    assert_eq!(eval("R = sum(t([1, 2, 3]) * 2); output R;"), 12.0);
    assert_eq!(eval("R = nrow(t(matrix(0, 2, 5))); output R;"), 5.0);
    assert_eq!(eval("R = as_scalar(matrix(3, 1, 1)) + 1; output R;"), 4.0);
}

#[test]
fn test_loops_and_branches() {
    let src = r#"
s = 0;
for (i in 1:4) {
    if (i %% 2 == 0) {
        s = s + i;
    } else {
        s = s - 1;
    }
}
R = s;
output R;
"#;
    assert_eq!(eval(src), 4.0);
}

#[test]
fn test_print_output_captured() {
    let report = run("x = 3; print(x); print(x > 2); R = x; output R;", &ExecOptions::default())
        .unwrap();
    assert_eq!(report.printed, vec!["3".to_owned(), "true".to_owned()]);
}

#[test]
fn test_inputs_bound_by_name() {
    let src = r#"
input X: matrix;
input k: scalar;
R = sum(X) * k;
output R;
"#;
    let x = Matrix::from_rows(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let report = run_with_inputs(
        src,
        &[("X", Value::Matrix(x)), ("k", Value::Scalar(2.0))],
        &ExecOptions::default(),
    )
    .unwrap();
    assert_eq!(report.scalar("R"), Some(20.0));
}

#[test]
fn test_missing_input_reported() {
    let err = run_err("input k: scalar; R = k; output R;", &ExecOptions::default());
    assert!(matches!(
        err,
        Error::Interp(InterpError::MissingInput { ref name }) if name == "k"
    ));
}

#[test]
fn test_seeded_randomness_is_reproducible() {
    let src = "R = sum(rand(3, 3)) + random(); output R;";
    let seeded = |seed| {
        run(
            src,
            &ExecOptions {
                seed,
                ..ExecOptions::default()
            },
        )
        .unwrap()
        .scalar("R")
        .unwrap()
    };
    assert_eq!(seeded(42), seeded(42));
    assert_ne!(seeded(42), seeded(43));
    let v = seeded(1);
    assert!((0.0..10.0).contains(&v));
}

#[test]
fn test_eval_emit_lists_outputs() {
    let src = r#"
def f(x: scalar) -> scalar = x + 1;
R = f(3) * 2 - 1;
print(R);
output R;
"#;
    let text = compile(src, "t", EmitKind::Eval).unwrap();
    assert_eq!(text, "7\nR = 7\n");
}

// ------------------------------------------------------------------
// Runtime errors
// ------------------------------------------------------------------

#[test]
fn test_dimension_mismatch() {
    let err = run_err(
        "A = matrix(1, 2, 2); B = matrix(1, 3, 3); R = sum(A + B); output R;",
        &ExecOptions::default(),
    );
    assert!(matches!(
        err,
        Error::Interp(InterpError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_index_out_of_bounds() {
    let err = run_err(
        "R = matrix(1, 2, 2)[3, 1]; output R;",
        &ExecOptions::default(),
    );
    match err {
        Error::Interp(InterpError::IndexOutOfBounds { row, col, .. }) => {
            assert_eq!((row, col), (3, 1));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_as_scalar_requires_one_by_one() {
    let err = run_err(
        "R = as_scalar(matrix(1, 2, 2)); output R;",
        &ExecOptions::default(),
    );
    assert!(matches!(
        err,
        Error::Interp(InterpError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_step_limit_stops_runaway_loops() {
    let src = r#"
i = 0;
while (true) {
    i = i + 1;
}
output i;
"#;
    let err = run_err(
        src,
        &ExecOptions {
            max_steps: 1000,
            ..ExecOptions::default()
        },
    );
    assert!(matches!(
        err,
        Error::Interp(InterpError::StepLimit { limit: 1000 })
    ));
    assert_eq!(err.stage().to_string(), "execute");
}

#[test]
fn test_oversized_matrix_is_an_error() {
    for src in [
        "R = sum(matrix(1, 10000000000, 10000000000)); output R;",
        "R = sum(rand(10000000000, 10000000000)); output R;",
        "R = sum(matrix(1, 100000, 100000)); output R;",
    ] {
        let err = run_err(src, &ExecOptions::default());
        assert!(
            matches!(err, Error::Interp(InterpError::MatrixTooLarge { .. })),
            "{:?} for {}",
            err,
            src
        );
    }
}

#[test]
fn test_unused_failing_computations_fail_at_every_optimization_level() {
    let cse_only = OptimizerConfig {
        inline: false,
        const_fold: false,
        ..OptimizerConfig::default()
    };
    let cases = [
        "M = matrix(1, 2, 2); x = M[5, 5]; R = 1; output R;",
        "x = as_scalar(matrix(1, 2, 2)); R = 1; output R;",
        "A = matrix(1, 2, 2); B = matrix(1, 3, 3); C = A + B; R = 1; output R;",
        "def pick(M: matrix) -> scalar = M[3, 3];\nx = pick(matrix(1, 2, 2)); R = 1; output R;",
    ];
    for src in cases {
        for optimizer in [OptimizerConfig::none(), OptimizerConfig::default(), cse_only.clone()] {
            let result = run(
                src,
                &ExecOptions {
                    optimizer: optimizer.clone(),
                    ..ExecOptions::default()
                },
            );
            assert!(result.is_err(), "{:?} succeeded for\n{}", optimizer, src);
        }
    }
}

#[test]
fn test_unused_infallible_call_is_removed() {
    let config = OptimizerConfig {
        inline: false,
        const_fold: false,
        ..OptimizerConfig::default()
    };
    let calls = |src: &str| {
        compile_optimized(src, "t", &config)
            .unwrap()
            .main()
            .unwrap()
            .blocks()
            .iter()
            .flat_map(|b| &b.instrs)
            .filter(|i| matches!(i, IrInstr::Call { .. }))
            .count()
    };
    assert_eq!(
        calls("def g(x: scalar) -> scalar = x + 1;\nx = g(1); R = 1; output R;"),
        0
    );
    assert_eq!(
        calls("def pick(M: matrix) -> scalar = M[1, 1];\nx = pick(matrix(1, 2, 2)); R = 1; output R;"),
        1
    );
}

// ------------------------------------------------------------------
// Explain and diagnostics
// ------------------------------------------------------------------

#[test]
fn test_explain_attaches_plan() {
    let src = r#"
def f(x: scalar) -> scalar = x * x + 1;
R = f(2) + f(2);
output R;
"#;
    let plain = run(src, &ExecOptions::default()).unwrap();
    assert!(plain.plan.is_none());

    let explained = run(
        src,
        &ExecOptions {
            explain: true,
            ..ExecOptions::default()
        },
    )
    .unwrap();
    let plan = explained.plan.expect("plan");
    assert!(plan.starts_with("PLAN script"), "{}", plan);
    assert!(plan.contains("outputs: R"), "{}", plan);
    assert!(plan.contains("f: pure, Expression body"), "{}", plan);
    assert!(plan.contains("def main("), "{}", plan);
}

#[test]
fn test_render_error_points_at_call() {
    let src = "def f(x: scalar) -> scalar = x;\nR = f(1, 2);";
    let err = run_err(src, &ExecOptions::default());
    let rendered = render_error(src, &err);
    assert!(rendered.starts_with("error[E0101]"), "{}", rendered);
    assert!(rendered.contains(" --> 2:5"), "{}", rendered);
    assert!(rendered.contains('^'), "{}", rendered);
}

// ------------------------------------------------------------------
// Result files
// ------------------------------------------------------------------

#[test]
fn test_matrix_output_written_sparse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");
    let report = run(
        "R = [1, 0; 0, 4]; output R;",
        &ExecOptions {
            output_path: Some(path.clone()),
            ..ExecOptions::default()
        },
    )
    .unwrap();
    assert!(matches!(report.output("R"), Some(Value::Matrix(_))));
    let text = std::fs::read_to_string(&path).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["rows"], 2);
    assert_eq!(doc["cells"].as_array().unwrap().len(), 2);
    let back = read_matrix(&path).unwrap();
    assert_eq!(back.get(1, 1), 4.0);
    assert_eq!(back.get(0, 1), 0.0);
}

#[test]
fn test_failed_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");
    let options = ExecOptions {
        output_path: Some(path.clone()),
        ..ExecOptions::default()
    };
    run_err("R = matrix(1, 2, 2)[5, 5]; output R;", &options);
    assert!(!path.exists());
}

#[test]
fn test_boolean_output_cannot_be_written() {
    let dir = tempfile::tempdir().unwrap();
    let options = ExecOptions {
        output_path: Some(dir.path().join("out.json")),
        ..ExecOptions::default()
    };
    let err = run_err("R = 1 > 0; output R;", &options);
    assert!(matches!(
        err,
        Error::Output(OutputError::NotNumeric { .. })
    ));
}

#[test]
fn test_script_without_outputs_cannot_be_written() {
    let dir = tempfile::tempdir().unwrap();
    let options = ExecOptions {
        output_path: Some(dir.path().join("out.json")),
        ..ExecOptions::default()
    };
    let err = run_err("R = 1;", &options);
    assert!(matches!(err, Error::Output(OutputError::NoOutputs)));
}

#[test]
fn test_result_file_round_trip_pads_missing_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m.json");
    write_matrix(&path, &Matrix::filled(2, 3, 0.0)).unwrap();
    let m = read_matrix(&path).unwrap();
    assert_eq!(m.shape(), (2, 3));
    assert!(m.data.iter().all(|v| *v == 0.0));
    assert_eq!(read_cell(&path, 9, 9).unwrap(), 0.0);
}

#[test]
fn test_non_finite_and_negative_zero_cells_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("special.json");
    let m = Matrix::from_rows(
        2,
        2,
        vec![f64::INFINITY, f64::NEG_INFINITY, f64::NAN, -0.0],
    )
    .unwrap();
    write_matrix(&path, &m).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"Infinity\""), "{}", text);
    assert!(text.contains("\"-Infinity\""), "{}", text);
    assert!(text.contains("\"NaN\""), "{}", text);

    let back = read_matrix(&path).unwrap();
    assert_eq!(back.get(0, 0), f64::INFINITY);
    assert_eq!(back.get(0, 1), f64::NEG_INFINITY);
    assert!(back.get(1, 0).is_nan());
    assert_eq!(back.get(1, 1).to_bits(), (-0.0f64).to_bits());
}

#[test]
fn test_infinite_result_is_readable_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("R.json");
    let report = run(
        "R = 1 / 0; output R;",
        &ExecOptions {
            output_path: Some(path.clone()),
            ..ExecOptions::default()
        },
    )
    .unwrap();
    assert_eq!(report.scalar("R"), Some(f64::INFINITY));
    assert_eq!(read_cell(&path, 1, 1).unwrap(), f64::INFINITY);
}
