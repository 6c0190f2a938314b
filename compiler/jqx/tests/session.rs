//! End-to-end tests of sessions, streams and close.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::thread;

use jqx::{Native, Session, SessionConfig, SessionError, SessionState, Stream, Value};
use pretty_assertions::assert_eq;

fn json(text: &str) -> Value {
    Value::from_json(text).unwrap()
}

fn no_args() -> Value {
    Value::empty_array()
}

// Lifecycle

#[test]
fn new_and_close_twice() {
    let session = Session::new().unwrap();
    session.close();
    session.close();
    assert_eq!(session.state(), SessionState::Closed);
}

#[test]
fn concurrent_closes() {
    let session = Session::new().unwrap();
    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| session.close());
        }
    });
    assert_eq!(session.state(), SessionState::Closed);
}

#[test]
fn close_races_a_pump_losing_its_input() {
    for _ in 0..20 {
        let session = Session::new().unwrap();
        let stream = session.start(".", &no_args()).unwrap();
        thread::scope(|scope| {
            scope.spawn(|| session.close());
            let (outputs, errors) = stream.finish();
            assert!(outputs.is_empty());
            assert!(errors.is_empty());
        });
        assert_eq!(session.state(), SessionState::Closed);
    }
}

#[test]
fn close_stops_a_pump_mid_stream() {
    let session = Session::new().unwrap();
    let stream = session.start("range(1000000)", &no_args()).unwrap();
    stream.input.send(Value::null()).unwrap();
    assert_eq!(stream.output.recv().unwrap(), json("0"));

    // The pump is now blocked handing over its next output.
    session.close();
    let input = stream.input.clone();
    let (outputs, errors) = stream.finish();
    assert!(outputs.is_empty());
    assert!(errors.is_empty());
    assert!(input.send(Value::null()).is_err());
}

#[test]
fn closed_session_refuses_work() {
    let session = Session::new().unwrap();
    session.compile(".", &no_args()).unwrap();
    session.close();

    let errors = session.compile(".", &no_args()).unwrap_err();
    assert!(matches!(errors.as_slice(), [SessionError::Closed]));
    let err = session.execute(Value::null()).unwrap_err();
    assert!(matches!(err.source, SessionError::Closed));
    assert!(matches!(
        session.start(".", &no_args()),
        Err(SessionError::Closed)
    ));
}

#[test]
fn dropping_a_session_ends_its_stream() {
    let session = Session::new().unwrap();
    let stream = session.start(".", &no_args()).unwrap();
    let input = stream.input.clone();
    drop(session);
    let (outputs, errors) = stream.finish();
    assert!(outputs.is_empty());
    assert!(errors.is_empty());
    assert!(input.send(Value::null()).is_err());
}

// Compile

#[test]
fn compile_good_program() {
    let session = Session::new().unwrap();
    session.compile(".", &no_args()).unwrap();
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn compile_error_mentions_the_program() {
    const PROGRAM: &str = "a b";
    let session = Session::new().unwrap();
    let errors = session.compile(PROGRAM, &no_args()).unwrap_err();
    assert!(!errors.is_empty(), "errors were expected but none seen");
    assert!(
        errors.iter().any(|e| e.to_string().contains(PROGRAM)),
        "no error containing the program source: {errors:?}"
    );
}

#[test]
fn start_reports_compile_errors_on_the_error_channel() {
    const PROGRAM: &str = "a b";
    let session = Session::new().unwrap();
    let stream = session.start(PROGRAM, &no_args()).unwrap();
    let (outputs, errors) = stream.finish();
    assert!(outputs.is_empty());
    assert!(!errors.is_empty(), "errors were expected but none seen");
    assert!(errors
        .iter()
        .all(|e| matches!(e, SessionError::Compile(_))));
    assert!(errors.iter().any(|e| e.to_string().contains(PROGRAM)));
}

#[test]
fn program_arguments() {
    let session = Session::new().unwrap();
    let stream = session
        .start("$greeting + .", &json(r#"{"greeting":"hello, "}"#))
        .unwrap();
    let (outputs, errors) = stream.collect_all([json(r#""world""#)]);
    assert!(errors.is_empty());
    assert_eq!(outputs, vec![json(r#""hello, world""#)]);
}

// Streaming

#[test]
fn simple_program() {
    let session = Session::new().unwrap();
    let stream = session.start(".a", &no_args()).unwrap();
    let (outputs, errors) = stream.collect_all([json(r#"{"a": 123}"#)]);
    assert!(errors.is_empty(), "expected no errors, got {errors:?}");
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].to_native(), Native::Int(123));
}

#[test]
fn runtime_error() {
    let session = Session::new().unwrap();
    let stream = session.start(".[0]", &no_args()).unwrap();
    let (outputs, errors) = stream.collect_all([json(r#"{"a": 123}"#)]);
    assert!(outputs.is_empty());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "Cannot index object with number");
}

#[test]
fn outputs_keep_input_order() {
    let session = Session::new().unwrap();
    let stream = session.start(".[]", &no_args()).unwrap();
    let (outputs, errors) = stream.collect_all([json("[1,2]"), json("[]"), json("[3]")]);
    assert!(errors.is_empty());
    assert_eq!(outputs, vec![json("1"), json("2"), json("3")]);
}

#[test]
fn an_error_does_not_end_the_stream() {
    let session = Session::new().unwrap();
    let stream = session.start(".a", &no_args()).unwrap();
    let (outputs, errors) = stream.collect_all([json("1"), json(r#"{"a":2}"#)]);
    assert_eq!(outputs, vec![json("2")]);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], SessionError::Evaluation(_)));
}

#[test]
fn halt_ends_the_stream() {
    let session = Session::new().unwrap();
    let stream = session.start("., halt", &no_args()).unwrap();
    let (outputs, errors) = stream.collect_all([json("1"), json("2")]);
    assert!(errors.is_empty());
    assert_eq!(outputs, vec![json("1")]);
}

#[test]
fn buffered_channels_run_ahead_of_the_consumer() {
    let config = SessionConfig::default().with_channel_capacity(4);
    let session = Session::with_config(config).unwrap();
    let Stream {
        input,
        output,
        errors,
    } = session.start(". * 2", &no_args()).unwrap();
    for i in 1..=3 {
        input.send(Value::from(i)).unwrap();
    }
    drop(input);

    let mut outputs = Vec::new();
    while let Ok(value) = output.recv() {
        outputs.push(value);
    }
    assert_eq!(outputs, vec![json("2"), json("4"), json("6")]);
    assert!(errors.recv().is_err());
}

#[test]
fn one_program_at_a_time() {
    let session = Session::new().unwrap();
    session.compile(".", &no_args()).unwrap();
    let stream = session.start(".", &no_args()).unwrap();

    assert!(matches!(
        session.start(".", &no_args()),
        Err(SessionError::Busy)
    ));
    let err = session.execute(Value::null()).unwrap_err();
    assert!(matches!(err.source, SessionError::Busy));

    let (outputs, _) = stream.finish();
    assert!(outputs.is_empty());
    assert_eq!(session.execute(json("5")).unwrap(), vec![json("5")]);
}

#[test]
fn oversized_repeat_is_reported_on_the_error_channel() {
    let session = Session::new().unwrap();
    let stream = session.start(r#"., "ab" * 1e19"#, &no_args()).unwrap();
    let (outputs, errors) = stream.collect_all([json("1"), json("2")]);
    assert_eq!(outputs, vec![json("1"), json("2")]);
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| e.to_string() == "Repeat string result too long"));
}

#[test]
fn deeply_nested_values_on_a_pump_thread() {
    let session = Session::new().unwrap();
    let stream = session
        .start("reduce range(300000) as $i (null; [.]) | length", &no_args())
        .unwrap();
    let (outputs, errors) = stream.collect_all([Value::null()]);
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(outputs, vec![json("1")]);
}

// Execute

#[test]
fn execute_without_channels() {
    let session = Session::new().unwrap();
    session.compile(".a", &no_args()).unwrap();
    let outputs = session.execute(json(r#"{"a": 123}"#)).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].to_native(), Native::Int(123));
}

#[test]
fn execute_needs_a_program() {
    let session = Session::new().unwrap();
    let err = session.execute(Value::null()).unwrap_err();
    assert!(matches!(err.source, SessionError::NotCompiled));
}

#[test]
fn execute_error_keeps_partial_outputs() {
    let session = Session::new().unwrap();
    session.compile(".[] | 10 / .", &no_args()).unwrap();
    let err = session.execute(json(r#"[1, 2, "x"]"#)).unwrap_err();
    assert_eq!(err.outputs, vec![json("10"), json("5")]);
    assert!(matches!(err.source, SessionError::Evaluation(_)));
}

#[test]
fn execute_reports_oversized_repeat_and_stays_usable() {
    let session = Session::new().unwrap();
    session.compile(r#"1, "ab" * 1e19"#, &no_args()).unwrap();
    let err = session.execute(Value::null()).unwrap_err();
    assert_eq!(err.outputs, vec![json("1")]);
    assert!(matches!(err.source, SessionError::Evaluation(_)));
    assert_eq!(err.to_string(), "Repeat string result too long");

    session.compile(". + 1", &no_args()).unwrap();
    assert_eq!(session.execute(json("1")).unwrap(), vec![json("2")]);
}

#[test]
fn execute_handles_deeply_nested_values() {
    let session = Session::new().unwrap();
    session
        .compile("reduce range(300000) as $i (null; [.]) | length", &no_args())
        .unwrap();
    assert_eq!(session.execute(Value::null()).unwrap(), vec![json("1")]);
}

// Tracing

#[test]
fn init_tracing_may_be_called_repeatedly() {
    jqx::init_tracing();
    jqx::init_tracing();
    let session = Session::new().unwrap();
    session.compile(".", &no_args()).unwrap();
    assert_eq!(session.execute(json("3")).unwrap(), vec![json("3")]);
}
