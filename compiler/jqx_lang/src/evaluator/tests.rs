#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::ops::ControlFlow;

use jqx_value::Value;
use pretty_assertions::assert_eq;

use super::{Completion, Evaluator};

fn json(text: &str) -> Value {
    Value::from_json(text).unwrap()
}

#[test]
fn fresh_evaluator_has_no_program() {
    let mut evaluator = Evaluator::new().unwrap();
    assert!(!evaluator.is_compiled());
    let err = evaluator.run(Value::null(), &mut |_| ControlFlow::Continue(())).unwrap_err();
    assert_eq!(err.to_string(), "no program has been compiled");
}

#[test]
fn compile_then_run() {
    let mut evaluator = Evaluator::new().unwrap();
    evaluator.compile(".a", &Value::null()).unwrap();
    assert!(evaluator.is_compiled());
    assert_eq!(evaluator.run_collect(json(r#"{"a":123}"#)).unwrap(), vec![json("123")]);
    // A program can run any number of times.
    assert_eq!(evaluator.run_collect(json(r#"{"a":4}"#)).unwrap(), vec![json("4")]);
}

#[test]
fn syntax_errors_quote_the_source_line() {
    let mut evaluator = Evaluator::new().unwrap();
    let errors = evaluator.compile("a b", &Value::null()).unwrap_err();
    assert!(!errors.is_empty());
    assert!(errors.iter().any(|e| e.to_string().contains("a b")), "{errors:?}");
}

#[test]
fn undefined_names_are_all_reported() {
    let mut evaluator = Evaluator::new().unwrap();
    let errors = evaluator.compile("foo(1) | $bar", &Value::null()).unwrap_err();
    let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, ["foo/1 is not defined", "$bar is not defined"]);
    assert_eq!(
        errors[0].to_string(),
        "foo/1 is not defined at <top-level>, line 1:\nfoo(1) | $bar"
    );
}

#[test]
fn failed_compile_discards_previous_program() {
    let mut evaluator = Evaluator::new().unwrap();
    evaluator.compile(".", &Value::null()).unwrap();
    assert!(evaluator.compile("}", &Value::null()).is_err());
    assert!(!evaluator.is_compiled());
}

#[test]
fn recompiling_replaces_the_program() {
    let mut evaluator = Evaluator::new().unwrap();
    evaluator.compile(".a", &Value::null()).unwrap();
    evaluator.compile(".b", &Value::null()).unwrap();
    assert_eq!(
        evaluator.run_collect(json(r#"{"a":1,"b":2}"#)).unwrap(),
        vec![json("2")]
    );
}

#[test]
fn arguments_as_object() {
    let mut evaluator = Evaluator::new().unwrap();
    evaluator.compile("$x + 1", &json(r#"{"x":41}"#)).unwrap();
    assert_eq!(evaluator.run_collect(Value::null()).unwrap(), vec![json("42")]);
}

#[test]
fn arguments_as_named_entries() {
    let mut evaluator = Evaluator::new().unwrap();
    let args = json(r#"[{"name":"x","value":"a"},{"name":"y","value":"b"}]"#);
    evaluator.compile("$x + $y", &args).unwrap();
    assert_eq!(evaluator.run_collect(Value::null()).unwrap(), vec![json(r#""ab""#)]);
}

#[test]
fn malformed_arguments_are_rejected() {
    let mut evaluator = Evaluator::new().unwrap();
    assert!(evaluator.compile(".", &json("[1]")).is_err());
    // Arguments that are neither object nor array bind nothing.
    evaluator.compile(".", &json("7")).unwrap();
    assert!(evaluator.compile("$x", &json("7")).is_err());
}

#[test]
fn halt_ends_the_run_quietly() {
    let mut evaluator = Evaluator::new().unwrap();
    evaluator.compile("1, halt, 2", &Value::null()).unwrap();
    let mut outputs = Vec::new();
    let completion = evaluator
        .run(Value::null(), &mut |v| {
            outputs.push(v);
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(completion, Completion::Halted);
    assert_eq!(outputs, vec![json("1")]);
}

#[test]
fn sink_can_stop_the_run() {
    let mut evaluator = Evaluator::new().unwrap();
    evaluator.compile("range(10)", &Value::null()).unwrap();
    let mut outputs = Vec::new();
    let completion = evaluator
        .run(Value::null(), &mut |v| {
            outputs.push(v);
            if outputs.len() == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
    assert_eq!(completion, Completion::Stopped);
    assert_eq!(outputs, vec![json("0"), json("1")]);
}

#[test]
fn finished_run_reports_completion() {
    let mut evaluator = Evaluator::new().unwrap();
    evaluator.compile("empty", &Value::null()).unwrap();
    let completion = evaluator.run(Value::null(), &mut |_| ControlFlow::Continue(())).unwrap();
    assert_eq!(completion, Completion::Finished);
}

#[test]
fn run_collect_keeps_partial_outputs() {
    let mut evaluator = Evaluator::new().unwrap();
    evaluator.compile(r#"1, error("x"), 2"#, &Value::null()).unwrap();
    let (outputs, err) = evaluator.run_collect(Value::null()).unwrap_err();
    assert_eq!(outputs, vec![json("1")]);
    assert_eq!(err.message(), "x");
}

#[test]
fn evaluator_moves_between_threads() {
    fn assert_send<T: Send>() {}
    assert_send::<Evaluator>();

    let mut evaluator = Evaluator::new().unwrap();
    evaluator.compile(". * 2", &Value::null()).unwrap();
    let outputs = std::thread::spawn(move || evaluator.run_collect(json("21")).unwrap())
        .join()
        .unwrap();
    assert_eq!(outputs, vec![json("42")]);
}
