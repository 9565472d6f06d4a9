//! Resolver tests: call binding, arity and type checking, purity and
//! recursion attributes, and the operator dispatch table.

use mscript::error::{Error, ResolveError};
use mscript::ir::{BinOp, Builtin, IrType, Purity};
use mscript::parse;
use mscript::resolve::dispatch::{binary_result, builtin_result, unary_neg_result};
use mscript::resolve::resolve_program;
use mscript::resolve::typed::ResolvedProgram;

fn resolve(src: &str) -> Result<ResolvedProgram, ResolveError> {
    let ast = parse(src).expect("parse failed");
    resolve_program(&ast)
}

fn resolve_err(src: &str) -> ResolveError {
    match resolve(src) {
        Ok(_) => panic!("expected a resolve error for:\n{}", src),
        Err(e) => e,
    }
}

fn purity_of(program: &ResolvedProgram, name: &str) -> Purity {
    program
        .functions
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.purity.clone())
        .unwrap_or_else(|| panic!("no function '{}'", name))
}

// ------------------------------------------------------------------
// Errors
// ------------------------------------------------------------------

#[test]
fn test_unknown_function_is_unresolved() {
    let err = resolve_err("R = g(1) + 1;");
    assert!(matches!(err, ResolveError::UnresolvedSymbol { ref name, .. } if name == "g"));
}

#[test]
fn test_unknown_variable_is_unresolved() {
    let err = resolve_err("def f(x: scalar) -> scalar = x + y;");
    assert!(matches!(err, ResolveError::UnresolvedSymbol { ref name, .. } if name == "y"));
}

#[test]
fn test_nested_call_resolved_before_enclosing_call() {
    // Both calls are bad; the inner one is reported.
    let err = resolve_err("R = missing_outer(missing_inner(1));");
    assert!(
        matches!(err, ResolveError::UnresolvedSymbol { ref name, .. } if name == "missing_inner"),
        "got {:?}",
        err
    );
}

#[test]
fn test_user_function_arity_mismatch() {
    let src = r#"
def f(x: scalar) -> scalar = x * x + 1;
R = f(1, 2);
"#;
    match resolve_err(src) {
        ResolveError::ArityMismatch {
            name,
            expected,
            found,
            ..
        } => {
            assert_eq!(name, "f");
            assert_eq!(expected, 1);
            assert_eq!(found, 2);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_builtin_arity_mismatch() {
    let err = resolve_err("R = sum(matrix(1, 2, 2), 3);");
    assert!(matches!(err, ResolveError::ArityMismatch { ref name, .. } if name == "sum"));
}

#[test]
fn test_matrix_passed_for_scalar_parameter() {
    let src = r#"
def f(x: scalar) -> scalar = x + 1;
R = f(matrix(0, 2, 2));
"#;
    match resolve_err(src) {
        ResolveError::TypeMismatch {
            expected, found, ..
        } => {
            assert_eq!(expected, "scalar");
            assert_eq!(found, "matrix");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_operator_type_mismatch() {
    let err = resolve_err("R = true + 1;");
    assert!(matches!(err, ResolveError::TypeMismatch { .. }));
}

#[test]
fn test_return_type_checked() {
    let err = resolve_err("def f(x: scalar) -> matrix = x + 1;");
    assert!(matches!(err, ResolveError::TypeMismatch { .. }));
}

#[test]
fn test_if_condition_must_be_bool() {
    let err = resolve_err("x = 1; if (x) { y = 2; }");
    assert!(matches!(err, ResolveError::TypeMismatch { .. }));
}

#[test]
fn test_duplicate_function() {
    let src = r#"
def f(x: scalar) -> scalar = x;
def f(x: scalar) -> scalar = x + 1;
"#;
    let err = resolve_err(src);
    assert!(matches!(err, ResolveError::DuplicateFunction { ref name, .. } if name == "f"));
}

#[test]
fn test_builtin_name_cannot_be_redefined() {
    let err = resolve_err("def sum(x: scalar) -> scalar = x;");
    assert!(matches!(err, ResolveError::DuplicateFunction { .. }));
}

#[test]
fn test_multi_output_call_in_expression_rejected() {
    let src = r#"
def h(x: scalar) -> (scalar, scalar) {
    return (x, x + 1);
}
R = h(1) + 1;
"#;
    let err = resolve_err(src);
    assert!(matches!(
        err,
        ResolveError::MultiOutputInExpression { count: 2, .. }
    ));
}

#[test]
fn test_print_has_no_value() {
    let err = resolve_err("R = print(1) + 1;");
    assert!(matches!(err, ResolveError::NoValue { .. }));
}

#[test]
fn test_multi_assign_count_checked() {
    let src = r#"
def h(x: scalar) -> (scalar, scalar) {
    return (x, x + 1);
}
(a, b, c) = h(1);
"#;
    let err = resolve_err(src);
    assert!(matches!(
        err,
        ResolveError::OutputCountMismatch {
            expected: 2,
            found: 3,
            ..
        }
    ));
}

#[test]
fn test_output_inside_function_rejected() {
    let src = r#"
def g(x: scalar) -> scalar {
    output x;
    return x;
}
"#;
    let err = resolve_err(src);
    assert!(matches!(err, ResolveError::TopLevelOnly { .. }));
}

#[test]
fn test_variable_bound_on_one_branch_goes_out_of_scope() {
    let src = r#"
c = true;
if (c) { y = 1; }
R = y;
"#;
    let err = resolve_err(src);
    assert!(matches!(err, ResolveError::UnresolvedSymbol { ref name, .. } if name == "y"));
}

#[test]
fn test_resolve_error_wraps_into_pipeline_error() {
    let err = mscript::compile_to_module("R = nope(1);", "t").unwrap_err();
    assert!(matches!(err, Error::Resolve(ResolveError::UnresolvedSymbol { .. })));
    assert_eq!(err.stage().to_string(), "resolve");
    assert_eq!(err.diagnostic_code(), "E0100");
    let rendered = mscript::diagnostics::render_error("R = nope(1);", &err);
    assert!(rendered.contains(" --> 1:5"), "{}", rendered);
    assert!(rendered.contains("^^^^"), "{}", rendered);
}

// ------------------------------------------------------------------
// Purity and recursion
// ------------------------------------------------------------------

#[test]
fn test_arithmetic_function_is_pure() {
    let program = resolve("def f(x: scalar) -> scalar = x * x + 1;").unwrap();
    assert_eq!(purity_of(&program, "f"), Purity::Pure);
}

#[test]
fn test_print_and_random_make_functions_impure() {
    let src = r#"
def noisy(x: scalar) -> scalar {
    print(x);
    return x;
}
def draw(x: scalar) -> scalar = random() + x;
"#;
    let program = resolve(src).unwrap();
    assert!(!purity_of(&program, "noisy").is_pure());
    assert!(!purity_of(&program, "draw").is_pure());
}

#[test]
fn test_impurity_propagates_through_callers() {
    let src = r#"
def noisy(x: scalar) -> scalar {
    print(x);
    return x;
}
def wrapper(x: scalar) -> scalar = noisy(x) * 2;
def clean(x: scalar) -> scalar = x * 2;
"#;
    let program = resolve(src).unwrap();
    match purity_of(&program, "wrapper") {
        Purity::Impure(reason) => assert!(reason.contains("noisy"), "reason: {}", reason),
        Purity::Pure => panic!("wrapper should be impure"),
    }
    assert!(purity_of(&program, "clean").is_pure());
}

#[test]
fn test_recursive_functions_flagged() {
    let src = r#"
def fact(n: scalar) -> scalar {
    r = 1;
    if (n > 1) {
        r = n * fact(n - 1);
    }
    return r;
}
def even(n: scalar) -> bool = ifelse(n == 0, true, odd(n - 1));
def odd(n: scalar) -> bool = ifelse(n == 0, false, even(n - 1));
def leaf(n: scalar) -> scalar = n;
"#;
    let program = resolve(src).unwrap();
    let flag = |name: &str| program.functions.iter().find(|f| f.name == name).unwrap().recursive;
    assert!(flag("fact"));
    assert!(flag("even"));
    assert!(flag("odd"));
    assert!(!flag("leaf"));
    // Recursion alone does not make a function impure.
    assert!(purity_of(&program, "fact").is_pure());
}

#[test]
fn test_inputs_and_outputs_recorded() {
    let src = r#"
input X: matrix;
input k: scalar;
R = sum(X) * k;
output R;
"#;
    let program = resolve(src).unwrap();
    assert_eq!(
        program.inputs,
        vec![("X".to_owned(), IrType::Matrix), ("k".to_owned(), IrType::Scalar)]
    );
    assert_eq!(program.outputs, vec!["R".to_owned()]);
}

// ------------------------------------------------------------------
// Dispatch table
// ------------------------------------------------------------------

#[test]
fn test_dispatch_arithmetic_broadcasts_scalars() {
    use IrType::*;
    assert_eq!(binary_result(BinOp::Add, Scalar, Scalar), Some(Scalar));
    assert_eq!(binary_result(BinOp::Mul, Scalar, Matrix), Some(Matrix));
    assert_eq!(binary_result(BinOp::Sub, Matrix, Scalar), Some(Matrix));
    assert_eq!(binary_result(BinOp::Add, Bool, Scalar), None);
}

#[test]
fn test_dispatch_matmul_and_pow() {
    use IrType::*;
    assert_eq!(binary_result(BinOp::MatMul, Matrix, Matrix), Some(Matrix));
    assert_eq!(binary_result(BinOp::MatMul, Scalar, Matrix), None);
    assert_eq!(binary_result(BinOp::Pow, Matrix, Scalar), Some(Matrix));
    assert_eq!(binary_result(BinOp::Pow, Scalar, Matrix), None);
}

#[test]
fn test_dispatch_comparisons_and_logic() {
    use IrType::*;
    assert_eq!(binary_result(BinOp::CmpLt, Scalar, Scalar), Some(Bool));
    assert_eq!(binary_result(BinOp::CmpGt, Matrix, Scalar), Some(Matrix));
    assert_eq!(binary_result(BinOp::CmpEq, Bool, Bool), Some(Bool));
    assert_eq!(binary_result(BinOp::CmpLt, Bool, Bool), None);
    assert_eq!(binary_result(BinOp::And, Bool, Bool), Some(Bool));
    assert_eq!(binary_result(BinOp::Or, Scalar, Scalar), None);
    assert_eq!(unary_neg_result(Bool), None);
    assert_eq!(unary_neg_result(Matrix), Some(Matrix));
}

#[test]
fn test_dispatch_builtins() {
    use IrType::*;
    assert_eq!(builtin_result(Builtin::Sum, &[Matrix]), Ok(Some(Scalar)));
    assert_eq!(builtin_result(Builtin::Sqrt, &[Scalar]), Ok(Some(Scalar)));
    assert_eq!(builtin_result(Builtin::Sqrt, &[Matrix]), Ok(Some(Matrix)));
    assert_eq!(builtin_result(Builtin::Print, &[Bool]), Ok(None));
    assert_eq!(builtin_result(Builtin::IfElse, &[Bool, Matrix, Matrix]), Ok(Some(Matrix)));
    assert_eq!(
        builtin_result(Builtin::IfElse, &[Scalar, Scalar, Scalar]),
        Err(("bool".to_owned(), 0))
    );
    assert_eq!(
        builtin_result(Builtin::Matrix, &[Scalar, Matrix, Scalar]),
        Err(("scalar".to_owned(), 1))
    );
}

#[test]
fn test_builtin_purity_attributes() {
    for b in Builtin::ALL {
        let expected = !matches!(b, Builtin::Rand | Builtin::Random | Builtin::Print);
        assert_eq!(b.is_pure(), expected, "purity of {}", b);
        assert_eq!(b.impurity().is_none(), expected);
    }
}
