//! JSON text rendering with optional ANSI colouring.

use std::fmt::Write;

use jqx_stack::ensure_sufficient_stack;

use crate::{Kind, Value};

bitflags::bitflags! {
    /// Rendering options for [`Value::dump`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DumpFlags: u8 {
        /// Newlines and two-space indentation.
        const PRETTY = 1;
        /// ANSI colour escapes around every token.
        const COLOUR = 1 << 1;
        /// Sort object keys. Objects are key-ordered already, so this only
        /// documents intent at call sites.
        const SORTED = 1 << 2;
    }
}

impl DumpFlags {
    /// Plain compact JSON.
    pub const NONE: DumpFlags = DumpFlags::empty();
}

const RESET: &str = "\x1b[0m";
const FIELD_COLOUR: &str = "\x1b[34;1m";

fn colour_of(kind: Kind) -> &'static str {
    match kind {
        Kind::Null => "\x1b[1;30m",
        Kind::False | Kind::True | Kind::Number => "\x1b[0;39m",
        Kind::String => "\x1b[0;32m",
        Kind::Array | Kind::Object => "\x1b[1;39m",
        Kind::Invalid => "",
    }
}

impl Value {
    /// Serialize to JSON text.
    pub fn dump(&self, flags: DumpFlags) -> String {
        let mut out = String::new();
        Dumper {
            flags,
            out: &mut out,
        }
        .value(self, 0);
        out
    }
}

struct Dumper<'a> {
    flags: DumpFlags,
    out: &'a mut String,
}

impl Dumper<'_> {
    fn value(&mut self, value: &Value, indent: usize) {
        ensure_sufficient_stack(|| self.write_value(value, indent));
    }

    fn write_value(&mut self, value: &Value, indent: usize) {
        let colour = self
            .flags
            .contains(DumpFlags::COLOUR)
            .then(|| colour_of(value.kind()));
        if let Some(c) = colour {
            self.out.push_str(c);
        }
        match value {
            Value::Null => self.out.push_str("null"),
            Value::Bool(true) => self.out.push_str("true"),
            Value::Bool(false) => self.out.push_str("false"),
            Value::Number(n) => write_number(self.out, *n),
            Value::String(s) => write_string(self.out, s),
            Value::Array(items) if items.is_empty() => self.out.push_str("[]"),
            Value::Array(items) => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.newline(indent + 1);
                    self.element(item, colour, indent + 1);
                }
                self.newline(indent);
                self.out.push(']');
            }
            Value::Object(entries) if entries.is_empty() => self.out.push_str("{}"),
            Value::Object(entries) => {
                self.out.push('{');
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.newline(indent + 1);
                    if let Some(c) = colour {
                        self.out.push_str(RESET);
                        self.out.push_str(FIELD_COLOUR);
                        write_string(self.out, key);
                        self.out.push_str(RESET);
                        self.out.push_str(c);
                    } else {
                        write_string(self.out, key);
                    }
                    self.out.push(':');
                    if self.flags.contains(DumpFlags::PRETTY) {
                        self.out.push(' ');
                    }
                    self.element(item, colour, indent + 1);
                }
                self.newline(indent);
                self.out.push('}');
            }
            Value::Invalid(None) => self.out.push_str("<invalid>"),
            Value::Invalid(Some(message)) => {
                self.out.push_str("<invalid:");
                self.value(message, indent);
                self.out.push('>');
            }
        }
        if colour.is_some() {
            self.out.push_str(RESET);
        }
    }

    /// A container member: drop the container colour around it, then restore.
    fn element(&mut self, item: &Value, colour: Option<&str>, indent: usize) {
        if colour.is_some() {
            self.out.push_str(RESET);
        }
        self.value(item, indent);
        if let Some(c) = colour {
            self.out.push_str(c);
        }
    }

    fn newline(&mut self, indent: usize) {
        if self.flags.contains(DumpFlags::PRETTY) {
            self.out.push('\n');
            for _ in 0..indent {
                self.out.push_str("  ");
            }
        }
    }
}

/// Integral values below 1e17 print without a fraction; very large or very
/// small magnitudes use exponent notation. NaN has no JSON form and prints as
/// `null`; infinities clamp to the largest finite double.
pub(crate) fn write_number(out: &mut String, n: f64) {
    if n.is_nan() {
        out.push_str("null");
    } else if n.is_infinite() {
        out.push_str(if n > 0.0 {
            "1.7976931348623157e+308"
        } else {
            "-1.7976931348623157e+308"
        });
    } else if n.fract() == 0.0 && n.abs() < 1e17 {
        let _ = write!(out, "{}", n as i64);
    } else if (1e-5..1e17).contains(&n.abs()) {
        let _ = write!(out, "{n}");
    } else {
        let text = format!("{n:e}");
        match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                let _ = write!(out, "{mantissa}e+{exponent}");
            }
            _ => out.push_str(&text),
        }
    }
}

pub(crate) fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if c < ' ' || c == '\u{7f}' => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
