//! Session errors.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use jqx_lang::{CompileError, EvalError, InitError};
use jqx_value::Value;
use tracing::error;

/// Everything that can go wrong using a [`Session`](crate::Session).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The evaluator could not be created.
    #[error(transparent)]
    Init(#[from] InitError),
    /// One diagnostic from compiling a program.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// A program raised an error while running on an input.
    #[error(transparent)]
    Evaluation(#[from] EvalError),
    #[error("no program has been compiled")]
    NotCompiled,
    #[error("session is already running a program")]
    Busy,
    #[error("session is closed")]
    Closed,
    #[error("failed to spawn pump thread")]
    Spawn(#[source] std::io::Error),
}

/// A failed [`execute`](crate::Session::execute), with the outputs produced
/// before the failure.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct ExecuteError {
    pub outputs: Vec<Value>,
    pub source: SessionError,
}

impl From<SessionError> for ExecuteError {
    fn from(source: SessionError) -> Self {
        ExecuteError {
            outputs: Vec::new(),
            source,
        }
    }
}

/// Run one evaluator call, reporting a panic inside it as an evaluation
/// error.
///
/// The evaluator sits behind a `parking_lot` mutex, which does not poison,
/// and a run leaves its compiled program untouched, so the session stays
/// usable afterwards.
pub(crate) fn catch_fault<T>(run: impl FnOnce() -> T) -> Result<T, EvalError> {
    panic::catch_unwind(AssertUnwindSafe(run)).map_err(|payload| {
        let detail = panic_detail(payload.as_ref());
        error!(%detail, "evaluator panicked");
        EvalError::new(Value::string(format!("internal evaluator fault: {detail}")))
    })
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::error::Error as _;

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn evaluation_errors_show_the_message() {
        let err = SessionError::from(EvalError::new(Value::string("boom")));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn execute_error_keeps_outputs_and_source() {
        let err = ExecuteError {
            outputs: vec![Value::from(1)],
            source: SessionError::NotCompiled,
        };
        assert_eq!(err.to_string(), "no program has been compiled");
        assert_eq!(err.outputs, vec![Value::from(1)]);
        assert!(err.source().is_some());
    }

    #[test]
    fn catch_fault_passes_results_through() {
        assert_eq!(catch_fault(|| 7).unwrap(), 7);
    }

    #[test]
    fn catch_fault_turns_a_panic_into_an_evaluation_error() {
        let err = catch_fault(|| -> u8 { panic!("index out of range") }).unwrap_err();
        assert_eq!(
            err.message(),
            "internal evaluator fault: index out of range"
        );

        let owned = format!("code {}", 42);
        let err = catch_fault(move || -> u8 { std::panic::panic_any(owned) }).unwrap_err();
        assert_eq!(err.message(), "internal evaluator fault: code 42");
    }

    #[test]
    fn lifecycle_errors_have_no_outputs() {
        let err = ExecuteError::from(SessionError::Closed);
        assert!(err.outputs.is_empty());
        assert!(matches!(err.source, SessionError::Closed));
    }
}
