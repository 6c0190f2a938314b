//! Conversion between `Value` and loosely-typed host data.
//!
//! Host data enters through serde: anything `Serialize` that maps onto the
//! JSON data model converts. Host data leaves as [`Native`], a plain owned
//! tree that compares structurally and keeps integers apart from floats.

use std::collections::{BTreeMap, HashMap};

use jqx_stack::ensure_sufficient_stack;
use serde::{Deserialize, Serialize};

use crate::{Value, ValueError};

/// Owned host-side mirror of a valid [`Value`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Native {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Native>),
    Object(BTreeMap<String, Native>),
}

impl Value {
    /// Convert host data into a value.
    ///
    /// Fails with `UnsupportedType` when the data has no JSON shape, such as
    /// a map keyed by something other than strings or integers.
    ///
    /// JSON has no NaN or infinities, so non-finite floats convert to `null`,
    /// the same way `dump` writes a NaN.
    pub fn from_native<T: Serialize + ?Sized>(native: &T) -> Result<Value, ValueError> {
        let json =
            serde_json::to_value(native).map_err(|e| ValueError::UnsupportedType(e.to_string()))?;
        Value::deserialize(json).map_err(|e| ValueError::UnsupportedType(e.to_string()))
    }

    /// Convert into host data.
    ///
    /// Integral numbers within `i64` range come back as `Native::Int`, all
    /// others as `Native::Float`. Invalid values have no host form and map to
    /// `Native::Null`.
    pub fn to_native(&self) -> Native {
        ensure_sufficient_stack(|| match self {
            Value::Null | Value::Invalid(_) => Native::Null,
            Value::Bool(b) => Native::Bool(*b),
            Value::Number(n) => number_to_native(*n),
            Value::String(s) => Native::String(s.as_str().to_owned()),
            Value::Array(items) => Native::Array(items.iter().map(Value::to_native).collect()),
            Value::Object(entries) => Native::Object(
                entries
                    .iter()
                    .map(|(key, item)| (key.clone(), item.to_native()))
                    .collect(),
            ),
        })
    }
}

fn number_to_native(n: f64) -> Native {
    let integral = n.is_finite() && n.fract() == 0.0;
    if integral && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Native::Int(n as i64)
    } else {
        Native::Float(n)
    }
}

impl From<bool> for Native {
    fn from(b: bool) -> Self {
        Native::Bool(b)
    }
}

impl From<i32> for Native {
    fn from(n: i32) -> Self {
        Native::Int(i64::from(n))
    }
}

impl From<i64> for Native {
    fn from(n: i64) -> Self {
        Native::Int(n)
    }
}

impl From<f64> for Native {
    fn from(n: f64) -> Self {
        Native::Float(n)
    }
}

impl From<&str> for Native {
    fn from(s: &str) -> Self {
        Native::String(s.to_owned())
    }
}

impl From<String> for Native {
    fn from(s: String) -> Self {
        Native::String(s)
    }
}

impl<T: Into<Native>> From<Option<T>> for Native {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Native::Null, Into::into)
    }
}

impl<T: Into<Native>> From<Vec<T>> for Native {
    fn from(items: Vec<T>) -> Self {
        Native::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Native>> From<BTreeMap<String, T>> for Native {
    fn from(entries: BTreeMap<String, T>) -> Self {
        Native::Object(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Native>, S> From<HashMap<String, T, S>> for Native {
    fn from(entries: HashMap<String, T, S>) -> Self {
        Native::Object(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

#[cfg(test)]
mod tests;
