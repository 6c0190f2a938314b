#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::Ordering;

use jqx_value::Value;
use pretty_assertions::assert_eq;

use super::{BusyGuard, Session, SessionState};
use crate::errors::SessionError;

#[test]
fn session_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Session>();
}

#[test]
fn state_is_ready_until_close_whatever_compile_does() {
    let session = Session::new().unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.compile("a b", &Value::null()).is_err());
    assert_eq!(session.state(), SessionState::Ready);
    session.compile(".", &Value::null()).unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.compile("a b", &Value::null()).is_err());
    assert_eq!(session.state(), SessionState::Ready);

    // The failed compile dropped the program.
    let err = session.execute(Value::null()).unwrap_err();
    assert!(matches!(err.source, SessionError::NotCompiled));

    session.close();
    assert_eq!(session.state(), SessionState::Closed);
}

#[test]
fn failed_compile_on_a_stream_leaves_the_session_ready() {
    let session = Session::new().unwrap();
    let (_, errors) = session.start("a b", &Value::null()).unwrap().finish();
    assert!(!errors.is_empty());
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn busy_guard_is_exclusive() {
    let session = Session::new().unwrap();
    let guard = BusyGuard::acquire(&session.shared).unwrap();
    assert!(matches!(
        BusyGuard::acquire(&session.shared),
        Err(SessionError::Busy)
    ));
    drop(guard);
    assert!(!session.shared.busy.load(Ordering::SeqCst));
    assert!(BusyGuard::acquire(&session.shared).is_ok());
}

#[test]
fn busy_session_rejects_compile_and_execute() {
    let session = Session::new().unwrap();
    session.compile(".", &Value::null()).unwrap();
    let _guard = BusyGuard::acquire(&session.shared).unwrap();

    let errors = session.compile(".", &Value::null()).unwrap_err();
    assert!(matches!(errors.as_slice(), [SessionError::Busy]));
    let err = session.execute(Value::null()).unwrap_err();
    assert!(matches!(err.source, SessionError::Busy));
}

#[test]
fn close_releases_the_evaluator() {
    let session = Session::new().unwrap();
    session.close();
    assert!(session.shared.evaluator.lock().is_none());
    assert!(matches!(
        BusyGuard::acquire(&session.shared),
        Err(SessionError::Closed)
    ));
}

#[test]
fn consecutive_streams_reuse_the_session() {
    let session = Session::new().unwrap();
    for _ in 0..3 {
        let stream = session.start(".", &Value::null()).unwrap();
        let (outputs, errors) = stream.collect_all([Value::from(1)]);
        assert_eq!(outputs, vec![Value::from(1)]);
        assert!(errors.is_empty());
    }
    session.close();
    assert!(session.shared.pumps.lock().is_empty());
}
