//! Value kind tags.

use std::fmt;

/// The variant tag of a [`Value`](crate::Value).
///
/// Booleans carry two tags so a kind check also answers "which boolean".
/// The ordering of the variants is the order jq sorts values of different
/// kinds in (invalid values never take part in comparisons).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Invalid,
    Null,
    False,
    True,
    Number,
    String,
    Array,
    Object,
}

impl Kind {
    /// The name reported by `type` and in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Invalid => "<invalid>",
            Kind::Null => "null",
            Kind::False | Kind::True => "boolean",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Object => "object",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
