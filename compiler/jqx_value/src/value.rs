//! The `Value` enum, its factory methods and persistent updates.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use jqx_stack::ensure_sufficient_stack;

use crate::dump::DumpFlags;
use crate::{Heap, Kind, ValueError};

/// Object storage. Keys are kept ordered so dumps are deterministic.
pub type Map = BTreeMap<String, Value>;

/// A JSON-shaped datum.
///
/// Scalars are stored inline; strings, arrays, objects and invalid payloads
/// live behind a [`Heap`] share. `Clone` adds a share and `Drop` releases
/// one, so a copy is always paired with exactly one release. A shared value
/// is never mutated: the `with_*` updates below copy the outer container
/// when it has other shares and reuse the children as-is.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(Heap<String>),
    Array(Heap<Vec<Value>>),
    Object(Heap<Map>),
    /// An error marker, optionally carrying a payload describing the error.
    Invalid(Option<Heap<Value>>),
}

// Factory Methods (the only way to allocate heap-backed values)

impl Value {
    #[inline]
    pub fn null() -> Self {
        Value::Null
    }

    #[inline]
    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    #[inline]
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Heap::new(s.into()))
    }

    #[inline]
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Heap::new(items))
    }

    #[inline]
    pub fn empty_array() -> Self {
        Value::array(Vec::new())
    }

    #[inline]
    pub fn object(entries: Map) -> Self {
        Value::Object(Heap::new(entries))
    }

    #[inline]
    pub fn empty_object() -> Self {
        Value::object(Map::new())
    }

    /// An invalid value with no payload.
    #[inline]
    pub fn invalid() -> Self {
        Value::Invalid(None)
    }

    /// An invalid value carrying `message` as its error payload.
    #[inline]
    pub fn invalid_with_message(message: Value) -> Self {
        Value::Invalid(Some(Heap::new(message)))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<Map> for Value {
    fn from(entries: Map) -> Self {
        Value::object(entries)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::array(iter.into_iter().collect())
    }
}

// Inspection

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(false) => Kind::False,
            Value::Bool(true) => Kind::True,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
            Value::Invalid(_) => Kind::Invalid,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !matches!(self, Value::Invalid(_))
    }

    /// jq truthiness: everything except `false` and `null`.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    /// The payload of an invalid value, or `null` when there is none.
    ///
    /// Valid values have no payload and also report `null`.
    pub fn invalid_message(&self) -> Value {
        match self {
            Value::Invalid(Some(message)) => (**message).clone(),
            _ => Value::Null,
        }
    }

    /// The payload of an invalid value rendered as text.
    ///
    /// String payloads are returned verbatim, other payloads as JSON text.
    /// `None` when there is no payload.
    pub fn invalid_message_as_string(&self) -> Option<String> {
        match self {
            Value::Invalid(Some(message)) => Some(match &**message {
                Value::String(s) => s.as_str().to_owned(),
                other => other.dump(DumpFlags::NONE),
            }),
            _ => None,
        }
    }

    /// The string contents, or `TypeMismatch` for any other kind.
    pub fn as_string(&self) -> Result<&str, ValueError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(ValueError::type_mismatch(Kind::String, other.kind())),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Element count of an array or object, code points of a string.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            Value::Object(entries) => Some(entries.len()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Object field lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|entries| entries.get(key))
    }

    /// Array element lookup; negative indices count from the end.
    pub fn index(&self, i: i64) -> Option<&Value> {
        let items = self.as_array()?;
        let len = i64::try_from(items.len()).ok()?;
        let i = if i < 0 { len + i } else { i };
        usize::try_from(i).ok().and_then(|i| items.get(i))
    }

    /// Number of live handles to this value's storage.
    ///
    /// Inline scalars have no shared storage and always report 1.
    pub fn share_count(&self) -> usize {
        match self {
            Value::String(s) => Heap::share_count(s),
            Value::Array(items) => Heap::share_count(items),
            Value::Object(entries) => Heap::share_count(entries),
            Value::Invalid(Some(message)) => Heap::share_count(message),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::Invalid(None) => 1,
        }
    }
}

// Persistent updates

impl Value {
    /// Return an object with `key` set to `value`. `null` acts as `{}`.
    pub fn with_key(self, key: impl Into<String>, value: Value) -> Result<Value, ValueError> {
        let mut entries = match self {
            Value::Object(entries) => entries,
            Value::Null => Heap::new(Map::new()),
            other => return Err(ValueError::type_mismatch(Kind::Object, other.kind())),
        };
        entries.make_mut().insert(key.into(), value);
        Ok(Value::Object(entries))
    }

    /// Return an array with slot `i` set to `value`, padding with `null`.
    /// `null` acts as `[]`.
    pub fn with_element(self, i: usize, value: Value) -> Result<Value, ValueError> {
        let mut items = match self {
            Value::Array(items) => items,
            Value::Null => Heap::new(Vec::new()),
            other => return Err(ValueError::type_mismatch(Kind::Array, other.kind())),
        };
        let slots = items.make_mut();
        if i >= slots.len() {
            slots.resize(i + 1, Value::Null);
        }
        slots[i] = value;
        Ok(Value::Array(items))
    }

    /// Return an array with `value` appended. `null` acts as `[]`.
    pub fn push(self, value: Value) -> Result<Value, ValueError> {
        let mut items = match self {
            Value::Array(items) => items,
            Value::Null => Heap::new(Vec::new()),
            other => return Err(ValueError::type_mismatch(Kind::Array, other.kind())),
        };
        items.make_mut().push(value);
        Ok(Value::Array(items))
    }

    /// Take the elements of an array, copying only if the storage is shared.
    pub fn into_array(self) -> Result<Vec<Value>, ValueError> {
        match self {
            Value::Array(items) => Ok(items.into_inner()),
            other => Err(ValueError::type_mismatch(Kind::Array, other.kind())),
        }
    }

    /// Take the entries of an object, copying only if the storage is shared.
    pub fn into_object(self) -> Result<Map, ValueError> {
        match self {
            Value::Object(entries) => Ok(entries.into_inner()),
            other => Err(ValueError::type_mismatch(Kind::Object, other.kind())),
        }
    }
}

// Ordering and equality

/// Numbers order numerically with NaN below every other number.
fn compare_numbers(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| b.is_nan().cmp(&a.is_nan()))
}

impl Value {
    /// jq's total order: by kind first (null < false < true < numbers <
    /// strings < arrays < objects), then by contents. Objects compare their
    /// sorted key sets before their values.
    pub fn compare(&self, other: &Value) -> Ordering {
        ensure_sufficient_stack(|| self.compare_nested(other))
    }

    fn compare_nested(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => compare_numbers(*a, *b),
            (Value::String(a), Value::String(b)) => a.as_str().cmp(b.as_str()),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Object(a), Value::Object(b)) => {
                let keys = a.keys().cmp(b.keys());
                if keys != Ordering::Equal {
                    return keys;
                }
                for (x, y) in a.values().zip(b.values()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            }
            (Value::Invalid(a), Value::Invalid(b)) => match (a, b) {
                (Some(a), Some(b)) => a.compare(b),
                (a, b) => a.is_some().cmp(&b.is_some()),
            },
            _ => self.kind().cmp(&other.kind()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        ensure_sufficient_stack(|| match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Invalid(a), Value::Invalid(b)) => a == b,
            _ => false,
        })
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Invalid(None) => f.write_str("<invalid>"),
            Value::Invalid(Some(message)) => write!(f, "<invalid: {message:?}>"),
            other => f.write_str(&other.dump(DumpFlags::NONE)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump(DumpFlags::NONE))
    }
}
