//! Error types for value construction and typed access.

use crate::Kind;

/// Failure while building or inspecting a [`Value`](crate::Value).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// JSON text could not be parsed.
    #[error("{message} (while parsing '{text}')")]
    Parse { message: String, text: String },

    /// A host value has no JSON-shaped representation.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// A typed accessor was used on a value of another kind.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: Kind, got: Kind },
}

impl ValueError {
    pub(crate) fn type_mismatch(expected: Kind, got: Kind) -> Self {
        ValueError::TypeMismatch { expected, got }
    }
}
