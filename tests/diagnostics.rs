use lispet::error::{Error, SyntaxError};
use lispet::interp::Interp;
use lispet::stream::Source;

fn parse_err(source: &str) -> Error {
    let mut interp = Interp::new();
    interp.parse_str(source, Source::Repl).unwrap_err()
}

fn run_err(source: &str) -> Error {
    let mut interp = Interp::new();
    interp.parse_str(source, Source::Repl).unwrap();
    interp.run().unwrap_err()
}

#[test]
fn undefined_symbol_reports_its_source_line() {
    let err = run_err("(+ 1 2)\n(no-such-thing)");
    match err {
        Error::SymbolNotFound { line, name } => {
            assert_eq!(line, 2);
            assert_eq!(name, "no-such-thing");
        }
        other => panic!("expected symbol-not-found, got {:?}", other),
    }
}

#[test]
fn type_mismatch_reports_the_operand_line() {
    let err = run_err("(define x #t)\n(+ 1\n   x)");
    match err {
        Error::TypeMismatch { line, expected, found } => {
            assert_eq!(line, 3);
            assert_eq!(expected, "number");
            assert_eq!(found, "boolean");
        }
        other => panic!("expected type mismatch, got {:?}", other),
    }
}

#[test]
fn unpaired_string_reports_the_opening_line() {
    let err = parse_err("1\n2\n\"never closed");
    match err {
        Error::Syntax(SyntaxError::UnpairedString { line }) => assert_eq!(line, 3),
        other => panic!("expected unpaired string, got {:?}", other),
    }
}

#[test]
fn arity_errors_name_the_form() {
    let err = run_err("(if #t)");
    assert_eq!(err.to_string(), "'if' syntax error");
}

#[test]
fn diagnostics_render_location_and_source_line() {
    let mut interp = Interp::new();
    interp.parse_str("(+ 1 2)\n(car 9)", Source::Repl).unwrap();
    let error = interp.run().unwrap_err();
    let report = interp.diagnostic(error).format();

    assert!(report.contains("error: type mismatch"));
    assert!(report.contains("REPL:2:0"));
    assert!(report.contains("(car 9)"));
}

#[test]
fn file_sources_appear_in_the_report() {
    let path = std::env::temp_dir().join("lispet-diagnostics-test.scm");
    std::fs::write(&path, "(undefined-fn)\n").unwrap();

    let mut stream = lispet::stream::FileStream::new();
    stream.open(&path).unwrap();

    let mut interp = Interp::new();
    interp.parse(&mut stream, Source::File(path.clone())).unwrap();
    let error = interp.run().unwrap_err();
    let report = interp.diagnostic(error).format();

    assert!(report.contains("lispet-diagnostics-test.scm"));
    assert!(report.contains(":1:0"));

    std::fs::remove_file(&path).ok();
}

#[test]
fn failures_propagate_without_running_later_forms() {
    // The error in the middle unwinds the whole run; the final form never
    // evaluates and the interpreter reports Failed.
    let mut interp = Interp::new();
    interp
        .parse_str("(define x 1) (car 9) (set! x 2)", Source::Repl)
        .unwrap();
    assert!(interp.run().is_err());
    assert_eq!(interp.state(), lispet::interp::RunState::Failed);
}

#[test]
fn evaluating_a_bare_nil_is_invalid_syntax() {
    let err = run_err("()");
    assert!(matches!(err, Error::Syntax(SyntaxError::Malformed { .. })));
}

#[test]
fn calling_a_non_function_value_fails() {
    let err = run_err("(define x 5) (x 1)");
    match err {
        Error::TypeMismatch { expected, found, .. } => {
            assert_eq!(expected, "function");
            assert_eq!(found, "number");
        }
        other => panic!("expected type mismatch, got {:?}", other),
    }
}

#[test]
fn lambda_head_must_evaluate_to_a_function() {
    let err = run_err("((quote (1 2)) 3)");
    match err {
        Error::TypeMismatch { expected, .. } => assert_eq!(expected, "function"),
        other => panic!("expected type mismatch, got {:?}", other),
    }
}
