//! Operators on values: indexing, slicing, iteration and arithmetic.
//!
//! Error messages follow jq's wording, since callers match on them.

use std::cmp::Ordering;

use jqx_stack::ensure_sufficient_stack;
use jqx_value::{DumpFlags, Map, Value};

use crate::ast::BinaryOp;
use crate::errors::EvalError;

/// Longest dump shown inside an error message.
const DESCRIBE_MAX: usize = 11;

/// Largest string, in bytes, that `string * n` may build.
const REPEAT_MAX: usize = i32::MAX as usize;

/// `kind (dump)`, with long dumps cut short.
pub(crate) fn describe(value: &Value) -> String {
    let dump = value.dump(DumpFlags::NONE);
    if dump.chars().count() > DESCRIBE_MAX {
        let short: String = dump.chars().take(DESCRIBE_MAX).collect();
        format!("{} ({short}...)", value.kind())
    } else {
        format!("{} ({dump})", value.kind())
    }
}

pub(crate) fn index(target: &Value, key: &Value) -> Result<Value, EvalError> {
    match (target, key) {
        (Value::Null, Value::Null | Value::String(_) | Value::Number(_)) => Ok(Value::null()),
        (Value::Object(map), Value::String(k)) => {
            Ok(map.get(k.as_str()).cloned().unwrap_or_else(Value::null))
        }
        (Value::Array(items), Value::Number(n)) => Ok(element(items, *n)),
        (Value::Array(items), Value::Array(needle)) => Ok(subarray_positions(items, needle)),
        (_, Value::String(k)) => Err(EvalError::msg(format!(
            "Cannot index {} with \"{}\"",
            target.kind(),
            k.as_str()
        ))),
        _ => Err(EvalError::msg(format!(
            "Cannot index {} with {}",
            target.kind(),
            key.kind()
        ))),
    }
}

fn element(items: &[Value], n: f64) -> Value {
    if n.is_nan() {
        return Value::null();
    }
    let mut i = n.floor();
    if i < 0.0 {
        i += items.len() as f64;
    }
    if i < 0.0 || i >= items.len() as f64 {
        return Value::null();
    }
    items[i as usize].clone()
}

/// Start offsets of every occurrence of `needle` in `items`.
pub(crate) fn subarray_positions(items: &[Value], needle: &[Value]) -> Value {
    if needle.is_empty() {
        return Value::null();
    }
    items
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(i, _)| Value::from(i))
        .collect()
}

/// `target[from:to]`. Bounds may be null; negatives count from the end.
pub(crate) fn slice(target: &Value, from: &Value, to: &Value) -> Result<Value, EvalError> {
    let len = match target {
        Value::Null => return Ok(Value::null()),
        Value::Array(items) => items.len(),
        Value::String(s) => s.chars().count(),
        _ => {
            return Err(EvalError::msg(format!(
                "Cannot index {} with object",
                target.kind()
            )))
        }
    };
    let bound = |v: &Value, default: f64| match v {
        Value::Null => Ok(default),
        Value::Number(n) => Ok(*n),
        _ => Err(EvalError::msg(
            "Start and end indices of an array slice must be numbers",
        )),
    };
    let (start, end) = clamp_slice(len, bound(from, 0.0)?, bound(to, len as f64)?);
    Ok(match target {
        Value::Array(items) => Value::array(items[start..end].to_vec()),
        Value::String(s) => Value::string(s.chars().skip(start).take(end - start).collect::<String>()),
        _ => Value::null(),
    })
}

/// Start rounds down and end rounds up, both clamped into `0..=len`.
fn clamp_slice(len: usize, start: f64, end: f64) -> (usize, usize) {
    let len_f = len as f64;
    let mut start = if start < 0.0 { start + len_f } else { start };
    let mut end = if end < 0.0 { end + len_f } else { end };
    start = start.clamp(0.0, len_f);
    end = end.clamp(0.0, len_f);
    if end < start {
        end = start;
    }
    let start = start.floor() as usize;
    let end = (end.ceil() as usize).min(len);
    (start, end.max(start))
}

/// Children of an array or object, in order.
pub(crate) fn children(target: &Value) -> Result<Vec<Value>, EvalError> {
    match target {
        Value::Array(items) => Ok(items.to_vec()),
        Value::Object(map) => Ok(map.values().cloned().collect()),
        Value::Null => Err(EvalError::msg("Cannot iterate over null")),
        _ => Err(EvalError::msg(format!(
            "Cannot iterate over {}",
            describe(target)
        ))),
    }
}

pub(crate) fn binary(op: BinaryOp, lhs: Value, rhs: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Sub => subtract(&lhs, rhs),
        BinaryOp::Mul => multiply(&lhs, rhs),
        BinaryOp::Div => divide(&lhs, rhs),
        BinaryOp::Mod => modulo(&lhs, rhs),
        BinaryOp::Eq => Ok(Value::from(lhs == *rhs)),
        BinaryOp::Ne => Ok(Value::from(lhs != *rhs)),
        BinaryOp::Lt => Ok(Value::from(lhs.compare(rhs) == Ordering::Less)),
        BinaryOp::Le => Ok(Value::from(lhs.compare(rhs) != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::from(lhs.compare(rhs) == Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::from(lhs.compare(rhs) != Ordering::Less)),
    }
}

fn fail(lhs: &Value, rhs: &Value, verb: &str) -> EvalError {
    EvalError::msg(format!(
        "{} and {} cannot be {verb}",
        describe(lhs),
        describe(rhs)
    ))
}

pub(crate) fn add(lhs: Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (lhs, Value::Null) => Ok(lhs),
        (Value::Null, rhs) => Ok(rhs.clone()),
        (Value::Number(a), Value::Number(b)) => Ok(Value::number(a + b)),
        (Value::String(a), Value::String(b)) => {
            let mut s = String::with_capacity(a.len() + b.len());
            s.push_str(&a);
            s.push_str(b);
            Ok(Value::string(s))
        }
        (Value::Array(a), Value::Array(b)) => {
            let mut items = a.to_vec();
            items.extend(b.iter().cloned());
            Ok(Value::array(items))
        }
        (Value::Object(a), Value::Object(b)) => {
            let mut map: Map = (*a).clone();
            for (k, v) in b.iter() {
                map.insert(k.clone(), v.clone());
            }
            Ok(Value::object(map))
        }
        (lhs, rhs) => Err(fail(&lhs, rhs, "added")),
    }
}

fn subtract(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::number(a - b)),
        (Value::Array(a), Value::Array(b)) => Ok(a
            .iter()
            .filter(|item| !b.contains(item))
            .cloned()
            .collect()),
        _ => Err(fail(lhs, rhs, "subtracted")),
    }
}

fn multiply(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::number(a * b)),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            repeat(s, *n)
        }
        (Value::Object(_), Value::Object(_)) => Ok(deep_merge(lhs.clone(), rhs)),
        _ => Err(fail(lhs, rhs, "multiplied")),
    }
}

/// `string * n`: `n` copies, rounded up; `null` unless `n` is positive.
fn repeat(s: &str, n: f64) -> Result<Value, EvalError> {
    if n <= 0.0 || n.is_nan() {
        return Ok(Value::null());
    }
    // Float to int casts saturate, so an enormous `n` stays enormous here.
    let times = n.ceil() as usize;
    match s.len().checked_mul(times) {
        Some(len) if len <= REPEAT_MAX => Ok(Value::string(s.repeat(times))),
        _ => Err(EvalError::msg("Repeat string result too long")),
    }
}

fn deep_merge(lhs: Value, rhs: &Value) -> Value {
    ensure_sufficient_stack(|| merge_objects(lhs, rhs))
}

fn merge_objects(lhs: Value, rhs: &Value) -> Value {
    let (Value::Object(a), Value::Object(b)) = (&lhs, rhs) else {
        return rhs.clone();
    };
    let mut map: Map = (**a).clone();
    for (k, v) in b.iter() {
        let merged = match map.remove(k) {
            Some(old @ Value::Object(_)) if matches!(v, Value::Object(_)) => deep_merge(old, v),
            _ => v.clone(),
        };
        map.insert(k.clone(), merged);
    }
    Value::object(map)
}

fn divide(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Number(_), Value::Number(b)) if *b == 0.0 => {
            Err(fail(lhs, rhs, "divided because the divisor is zero"))
        }
        (Value::Number(a), Value::Number(b)) => Ok(Value::number(a / b)),
        (Value::String(s), Value::String(sep)) => Ok(split(s, sep)),
        _ => Err(fail(lhs, rhs, "divided")),
    }
}

fn modulo(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (*a as i64, *b as i64);
            if b == 0 {
                return Err(fail(lhs, rhs, "divided because the divisor is zero"));
            }
            Ok(Value::from(a.checked_rem(b).unwrap_or(0)))
        }
        _ => Err(fail(lhs, rhs, "divided")),
    }
}

/// Split on a literal separator. An empty separator splits into characters.
pub(crate) fn split(s: &str, sep: &str) -> Value {
    if s.is_empty() {
        return Value::empty_array();
    }
    if sep.is_empty() {
        return s.chars().map(|c| Value::string(c.to_string())).collect();
    }
    s.split(sep).map(Value::from).collect()
}
