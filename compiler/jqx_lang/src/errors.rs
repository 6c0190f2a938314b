//! Compile, evaluation and initialisation errors.

use std::fmt;

use jqx_value::{DumpFlags, Value};

use crate::ast::Span;

/// A problem found while compiling a filter program.
///
/// One compile may report several of these; each carries the offending line
/// so it can be shown to a user without the original source at hand.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} at <top-level>, line {line}:\n{snippet}")]
pub struct CompileError {
    pub message: String,
    pub span: Span,
    /// 1-based line of `span.start`.
    pub line: usize,
    /// 1-based column (in chars) of `span.start`.
    pub column: usize,
    /// The source line containing `span.start`.
    pub snippet: String,
}

impl CompileError {
    pub(crate) fn new(source: &str, span: Span, message: impl Into<String>) -> Self {
        let start = span.start.min(source.len());
        let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = source[start..]
            .find('\n')
            .map_or(source.len(), |i| start + i);
        CompileError {
            message: message.into(),
            line: source[..start].matches('\n').count() + 1,
            column: source[line_start..start].chars().count() + 1,
            snippet: source[line_start..line_end].to_owned(),
            span,
        }
    }
}

/// A runtime error raised by a filter.
///
/// The payload is whatever was passed to `error`, or a message string for
/// errors raised by builtins and operators.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalError {
    pub payload: Value,
}

impl EvalError {
    pub fn new(payload: Value) -> Self {
        EvalError { payload }
    }

    pub(crate) fn msg(message: impl Into<String>) -> Self {
        EvalError {
            payload: Value::string(message.into()),
        }
    }

    /// Payload as text: strings verbatim, anything else as compact JSON.
    pub fn message(&self) -> String {
        match self.payload.as_str() {
            Some(s) => s.to_owned(),
            None => self.payload.dump(DumpFlags::NONE),
        }
    }

    /// The error as an invalid value carrying the payload.
    pub fn into_invalid(self) -> Value {
        Value::invalid_with_message(self.payload)
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload.as_str() {
            Some(s) => f.write_str(s),
            None => write!(f, "{} (not a string)", self.payload.dump(DumpFlags::NONE)),
        }
    }
}

impl std::error::Error for EvalError {}

/// The evaluator could not be set up.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("builtin definitions failed to compile: {0}")]
    Prelude(CompileError),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compile_error_locates_line_and_column() {
        let src = ".a |\n  foo(1)";
        let err = CompileError::new(src, 7..10, "foo/1 is not defined");
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
        assert_eq!(err.snippet, "  foo(1)");
        assert_eq!(
            err.to_string(),
            "foo/1 is not defined at <top-level>, line 2:\n  foo(1)"
        );
    }

    #[test]
    fn eval_error_display() {
        assert_eq!(EvalError::msg("boom").to_string(), "boom");
        let obj = EvalError::new(Value::from_json(r#"{"a":1}"#).unwrap());
        assert_eq!(obj.to_string(), r#"{"a":1} (not a string)"#);
        assert_eq!(obj.message(), r#"{"a":1}"#);
    }

    #[test]
    fn eval_error_into_invalid_keeps_payload() {
        let value = EvalError::msg("boom").into_invalid();
        assert!(!value.is_valid());
        assert_eq!(value.invalid_message_as_string().as_deref(), Some("boom"));
    }
}
