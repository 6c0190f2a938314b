//! Builtins implemented in Rust.
//!
//! Everything expressible in the filter language itself lives in
//! `prelude.jq` instead.

use std::cmp::Ordering;
use std::sync::Arc;

use jqx_stack::ensure_sufficient_stack;
use jqx_value::{DumpFlags, Map, Value, ValueError};

use crate::ast::Expr;
use crate::errors::EvalError;
use crate::eval::{Ctx, Env, Flow, Sink, Unwind};
use crate::ops::{self, describe};

/// Name and arity of every native builtin.
pub(crate) const NATIVES: &[(&str, usize)] = &[
    ("empty", 0),
    ("error", 0),
    ("error", 1),
    ("not", 0),
    ("length", 0),
    ("utf8bytelength", 0),
    ("keys", 0),
    ("keys_unsorted", 0),
    ("has", 1),
    ("contains", 1),
    ("indices", 1),
    ("type", 0),
    ("add", 0),
    ("range", 2),
    ("range", 3),
    ("floor", 0),
    ("ceil", 0),
    ("round", 0),
    ("trunc", 0),
    ("sqrt", 0),
    ("fabs", 0),
    ("abs", 0),
    ("log", 0),
    ("log2", 0),
    ("log10", 0),
    ("exp", 0),
    ("exp2", 0),
    ("exp10", 0),
    ("pow", 2),
    ("infinite", 0),
    ("nan", 0),
    ("isinfinite", 0),
    ("isnan", 0),
    ("isnormal", 0),
    ("tostring", 0),
    ("tonumber", 0),
    ("tojson", 0),
    ("fromjson", 0),
    ("ascii_downcase", 0),
    ("ascii_upcase", 0),
    ("explode", 0),
    ("implode", 0),
    ("sort", 0),
    ("sort_by", 1),
    ("group_by", 1),
    ("unique", 0),
    ("unique_by", 1),
    ("min", 0),
    ("max", 0),
    ("min_by", 1),
    ("max_by", 1),
    ("reverse", 0),
    ("split", 1),
    ("join", 1),
    ("startswith", 1),
    ("endswith", 1),
    ("ltrimstr", 1),
    ("rtrimstr", 1),
    ("getpath", 1),
    ("limit", 2),
    ("first", 1),
    ("isempty", 1),
    ("halt", 0),
    ("env", 0),
];

pub(crate) fn call(
    cx: &Ctx,
    name: &str,
    args: &[Arc<Expr>],
    env: &Env,
    input: Value,
    out: Sink<'_>,
) -> Flow {
    match (name, args) {
        ("empty", []) => Ok(()),
        ("halt", []) => Err(Unwind::Halt),
        ("error", []) => Err(EvalError::new(input).into()),
        ("error", [message]) => cx.eval(message, env, input, &mut |m| Err(EvalError::new(m).into())),
        ("limit", [n, f]) => cx.eval(n, env, input.clone(), &mut |n| match n {
            Value::Number(n) => take(cx, n, f, env, input.clone(), out),
            other => Err(EvalError::msg(format!(
                "Invalid limit {}: must be a number",
                describe(&other)
            ))
            .into()),
        }),
        ("first", [f]) => take(cx, 1.0, f, env, input, out),
        ("isempty", [g]) => {
            let label = cx.fresh_label();
            let mut empty = true;
            let result = cx.eval(g, env, input, &mut |_| {
                empty = false;
                Err(Unwind::Break(label))
            });
            match result {
                Ok(()) => {}
                Err(Unwind::Break(l)) if l == label => {}
                Err(other) => return Err(other),
            }
            out(Value::from(empty))
        }
        ("range", [from, upto]) => cx.eval(from, env, input.clone(), &mut |from| {
            cx.eval(upto, env, input.clone(), &mut |upto| {
                range(&from, &upto, &Value::from(1), out)
            })
        }),
        ("range", [from, upto, by]) => cx.eval(from, env, input.clone(), &mut |from| {
            cx.eval(upto, env, input.clone(), &mut |upto| {
                cx.eval(by, env, input.clone(), &mut |by| range(&from, &upto, &by, out))
            })
        }),
        ("pow", [base, exponent]) => cx.eval(base, env, input.clone(), &mut |b| {
            cx.eval(exponent, env, input.clone(), &mut |e| {
                out(Value::number(number(&b)?.powf(number(&e)?)))
            })
        }),
        ("sort_by" | "group_by" | "unique_by" | "min_by" | "max_by", [f]) => {
            let mut keyed = Vec::new();
            for item in sortable(&input)? {
                let key = Value::array(cx.collect(f, env, item.clone())?);
                keyed.push((key, item));
            }
            out(by_key(name, keyed))
        }
        (_, []) => out(nullary(name, &input)?),
        (_, [arg]) => cx.eval(arg, env, input.clone(), &mut |a| out(unary(name, &input, &a)?)),
        _ => Err(EvalError::msg(format!("{name}/{} is not defined", args.len())).into()),
    }
}

/// The first `n` outputs of `f`.
fn take(cx: &Ctx, n: f64, f: &Expr, env: &Env, input: Value, out: Sink<'_>) -> Flow {
    if n <= 0.0 {
        return Ok(());
    }
    let label = cx.fresh_label();
    let mut seen = 0.0;
    let result = cx.eval(f, env, input, &mut |v| {
        out(v)?;
        seen += 1.0;
        if seen >= n {
            Err(Unwind::Break(label))
        } else {
            Ok(())
        }
    });
    match result {
        Err(Unwind::Break(l)) if l == label => Ok(()),
        other => other,
    }
}

fn range(from: &Value, upto: &Value, by: &Value, out: Sink<'_>) -> Flow {
    let (Value::Number(from), Value::Number(upto), Value::Number(by)) = (from, upto, by) else {
        return Err(EvalError::msg("Range bounds must be numeric").into());
    };
    let (upto, by) = (*upto, *by);
    let mut x = *from;
    if by > 0.0 {
        while x < upto {
            out(Value::number(x))?;
            x += by;
        }
    } else if by < 0.0 {
        while x > upto {
            out(Value::number(x))?;
            x += by;
        }
    }
    Ok(())
}

fn number(value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(EvalError::msg(format!("{} number required", describe(other)))),
    }
}

fn string<'v>(value: &'v Value, what: &str) -> Result<&'v str, EvalError> {
    value
        .as_str()
        .ok_or_else(|| EvalError::msg(format!("{what} input must be a string")))
}

fn sortable(value: &Value) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::Array(items) => Ok(items.to_vec()),
        other => Err(EvalError::msg(format!(
            "{} cannot be sorted, as it is not an array",
            describe(other)
        ))),
    }
}

/// Builtins that take no arguments.
fn nullary(name: &str, input: &Value) -> Result<Value, EvalError> {
    let math = |f: fn(f64) -> f64| number(input).map(|n| Value::number(f(n)));
    match name {
        "not" => Ok(Value::from(!input.is_truthy())),
        "length" => length(input),
        "utf8bytelength" => match input {
            Value::String(s) => Ok(Value::from(s.len())),
            other => Err(EvalError::msg(format!(
                "{} only strings have UTF-8 byte length",
                describe(other)
            ))),
        },
        "keys" | "keys_unsorted" => keys(input),
        "type" => Ok(Value::string(input.kind().name())),
        "add" => match input {
            Value::Null => Ok(Value::null()),
            other => ops::children(other)?
                .into_iter()
                .try_fold(Value::null(), |acc, v| ops::add(acc, &v)),
        },
        "floor" => math(f64::floor),
        "ceil" => math(f64::ceil),
        "round" => math(f64::round),
        "trunc" => math(f64::trunc),
        "sqrt" => math(f64::sqrt),
        "fabs" => math(f64::abs),
        "log" => math(f64::ln),
        "log2" => math(f64::log2),
        "log10" => math(f64::log10),
        "exp" => math(f64::exp),
        "exp2" => math(f64::exp2),
        "exp10" => math(|n| 10f64.powf(n)),
        "abs" => match input {
            Value::Number(n) => Ok(Value::number(n.abs())),
            other => Err(EvalError::msg(format!(
                "{} has no absolute value",
                describe(other)
            ))),
        },
        "infinite" => Ok(Value::number(f64::INFINITY)),
        "nan" => Ok(Value::number(f64::NAN)),
        "isinfinite" => number(input).map(|n| Value::from(n.is_infinite())),
        "isnan" => number(input).map(|n| Value::from(n.is_nan())),
        "isnormal" => number(input).map(|n| Value::from(n.is_normal())),
        "tostring" => Ok(match input {
            Value::String(_) => input.clone(),
            other => Value::string(other.dump(DumpFlags::NONE)),
        }),
        "tonumber" => tonumber(input),
        "tojson" => Ok(Value::string(input.dump(DumpFlags::NONE))),
        "fromjson" => {
            let text = string(input, "fromjson")?;
            Value::from_json(text).map_err(|err| match err {
                ValueError::Parse { message, text } => {
                    EvalError::msg(format!("{message} (while parsing '{text}')"))
                }
                other => EvalError::msg(other.to_string()),
            })
        }
        "ascii_downcase" => Ok(Value::string(
            string(input, "ascii_downcase")?.to_ascii_lowercase(),
        )),
        "ascii_upcase" => Ok(Value::string(
            string(input, "ascii_upcase")?.to_ascii_uppercase(),
        )),
        "explode" => Ok(string(input, "explode")?
            .chars()
            .map(|c| Value::from(i64::from(u32::from(c))))
            .collect()),
        "implode" => implode(input),
        "sort" => {
            let mut items = sortable(input)?;
            items.sort_by(Value::compare);
            Ok(Value::array(items))
        }
        "unique" => {
            let keyed = sortable(input)?.into_iter().map(|v| (v.clone(), v)).collect();
            Ok(by_key("unique_by", keyed))
        }
        "min" | "max" => {
            let keyed = sortable(input)?.into_iter().map(|v| (v.clone(), v)).collect();
            Ok(by_key(if name == "min" { "min_by" } else { "max_by" }, keyed))
        }
        "reverse" => match input {
            Value::Null => Ok(Value::empty_array()),
            Value::Array(items) => Ok(items.iter().rev().cloned().collect()),
            Value::String(s) => Ok(Value::string(s.chars().rev().collect::<String>())),
            other => Err(EvalError::msg(format!(
                "{} cannot be reversed, as it is not an array",
                describe(other)
            ))),
        },
        "env" => Ok(env_object()),
        _ => Err(EvalError::msg(format!("{name}/0 is not defined"))),
    }
}

/// Builtins taking one value argument.
fn unary(name: &str, input: &Value, arg: &Value) -> Result<Value, EvalError> {
    match name {
        "has" => has(input, arg).map(Value::from),
        "contains" => {
            if input.kind() != arg.kind() {
                return Err(EvalError::msg(format!(
                    "{} and {} cannot have their containment checked",
                    describe(input),
                    describe(arg)
                )));
            }
            Ok(Value::from(contains(input, arg)))
        }
        "indices" => indices(input, arg),
        "split" => match (input, arg) {
            (Value::String(s), Value::String(sep)) => Ok(ops::split(s, sep)),
            _ => Err(EvalError::msg("split input and separator must be strings")),
        },
        "join" => join(input, arg),
        "startswith" | "endswith" => match (input, arg) {
            (Value::String(s), Value::String(affix)) => Ok(Value::from(if name == "startswith" {
                s.starts_with(affix.as_str())
            } else {
                s.ends_with(affix.as_str())
            })),
            _ => Err(EvalError::msg(format!("{name}() requires string inputs"))),
        },
        "ltrimstr" | "rtrimstr" => {
            let trimmed = match (input, arg) {
                (Value::String(s), Value::String(affix)) if name == "ltrimstr" => {
                    s.strip_prefix(affix.as_str())
                }
                (Value::String(s), Value::String(affix)) => s.strip_suffix(affix.as_str()),
                _ => None,
            };
            Ok(trimmed.map_or_else(|| input.clone(), Value::from))
        }
        "getpath" => getpath(input, arg),
        _ => Err(EvalError::msg(format!("{name}/1 is not defined"))),
    }
}

fn length(input: &Value) -> Result<Value, EvalError> {
    match input {
        Value::Null => Ok(Value::from(0)),
        Value::Number(n) => Ok(Value::number(n.abs())),
        Value::String(s) => Ok(Value::from(s.chars().count())),
        Value::Array(items) => Ok(Value::from(items.len())),
        Value::Object(map) => Ok(Value::from(map.len())),
        other => Err(EvalError::msg(format!("{} has no length", describe(other)))),
    }
}

fn keys(input: &Value) -> Result<Value, EvalError> {
    match input {
        Value::Object(map) => Ok(map.keys().map(|k| Value::from(k.as_str())).collect()),
        Value::Array(items) => Ok((0..items.len()).map(Value::from).collect()),
        other => Err(EvalError::msg(format!("{} has no keys", describe(other)))),
    }
}

fn has(input: &Value, key: &Value) -> Result<bool, EvalError> {
    match (input, key) {
        (Value::Object(map), Value::String(k)) => Ok(map.contains_key(k.as_str())),
        (Value::Array(items), Value::Number(n)) => Ok(*n >= 0.0 && *n < items.len() as f64),
        _ => Err(EvalError::msg(format!(
            "Cannot check whether {} has a {} key",
            input.kind(),
            key.kind()
        ))),
    }
}

/// Containment for values of the same kind. Mismatched kinds nested inside
/// containers simply do not contain each other.
fn contains(a: &Value, b: &Value) -> bool {
    ensure_sufficient_stack(|| match (a, b) {
        (Value::Object(a), Value::Object(b)) => b
            .iter()
            .all(|(k, bv)| a.get(k).is_some_and(|av| contains(av, bv))),
        (Value::Array(a), Value::Array(b)) => {
            b.iter().all(|bv| a.iter().any(|av| contains(av, bv)))
        }
        (Value::String(a), Value::String(b)) => a.contains(b.as_str()),
        _ => a.kind() == b.kind() && a == b,
    })
}

fn indices(input: &Value, needle: &Value) -> Result<Value, EvalError> {
    match (input, needle) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::null()),
        (Value::Array(items), Value::Array(sub)) => Ok(ops::subarray_positions(items, sub)),
        (Value::Array(items), other) => Ok(ops::subarray_positions(
            items,
            std::slice::from_ref(other),
        )),
        (Value::String(s), Value::String(sub)) => {
            if sub.is_empty() {
                return Ok(Value::null());
            }
            Ok(s.char_indices()
                .enumerate()
                .filter(|(_, (byte, _))| s[*byte..].starts_with(sub.as_str()))
                .map(|(i, _)| Value::from(i))
                .collect())
        }
        _ => Err(EvalError::msg(format!(
            "Cannot determine indices of {} in {}",
            describe(needle),
            describe(input)
        ))),
    }
}

fn join(input: &Value, sep: &Value) -> Result<Value, EvalError> {
    let Value::String(sep) = sep else {
        return Err(EvalError::msg(format!(
            "{} cannot be used as a separator",
            describe(sep)
        )));
    };
    let mut joined = String::new();
    for (i, item) in ops::children(input)?.iter().enumerate() {
        if i > 0 {
            joined.push_str(sep);
        }
        match item {
            Value::Null => {}
            Value::String(s) => joined.push_str(s),
            Value::Number(_) | Value::Bool(_) => joined.push_str(&item.dump(DumpFlags::NONE)),
            other => {
                return Err(EvalError::msg(format!("Cannot join with {}", other.kind())));
            }
        }
    }
    Ok(Value::string(joined))
}

fn getpath(input: &Value, path: &Value) -> Result<Value, EvalError> {
    let Value::Array(path) = path else {
        return Err(EvalError::msg("Path must be specified as an array"));
    };
    let mut current = input.clone();
    for key in path.iter() {
        if matches!(current, Value::Null) {
            return Ok(Value::null());
        }
        current = ops::index(&current, key)?;
    }
    Ok(current)
}

fn tonumber(input: &Value) -> Result<Value, EvalError> {
    match input {
        Value::Number(_) => Ok(input.clone()),
        Value::String(s) => match Value::from_json(s) {
            Ok(n @ Value::Number(_)) => Ok(n),
            _ => Err(EvalError::msg(format!(
                "Cannot parse '{}' as number",
                s.as_str()
            ))),
        },
        other => Err(EvalError::msg(format!(
            "{} cannot be parsed as a number",
            describe(other)
        ))),
    }
}

fn implode(input: &Value) -> Result<Value, EvalError> {
    let Value::Array(items) = input else {
        return Err(EvalError::msg("implode input must be an array"));
    };
    let mut s = String::with_capacity(items.len());
    for item in items.iter() {
        let c = item
            .as_number()
            .and_then(|n| u32::try_from(n as i64).ok())
            .and_then(char::from_u32)
            .ok_or_else(|| EvalError::msg("Unicode codepoint out of range"))?;
        s.push(c);
    }
    Ok(Value::string(s))
}

/// Finish the `*_by` family given `(key, item)` pairs.
fn by_key(name: &str, mut keyed: Vec<(Value, Value)>) -> Value {
    match name {
        "min_by" => keyed
            .into_iter()
            .reduce(|best, next| if next.0.compare(&best.0) == Ordering::Less { next } else { best })
            .map_or_else(Value::null, |(_, item)| item),
        "max_by" => keyed
            .into_iter()
            .reduce(|best, next| if next.0.compare(&best.0) == Ordering::Less { best } else { next })
            .map_or_else(Value::null, |(_, item)| item),
        _ => {
            keyed.sort_by(|a, b| a.0.compare(&b.0));
            match name {
                "sort_by" => keyed.into_iter().map(|(_, item)| item).collect(),
                "group_by" => groups(keyed)
                    .into_iter()
                    .map(Value::array)
                    .collect(),
                _ => groups(keyed)
                    .into_iter()
                    .filter_map(|group| group.into_iter().next())
                    .collect(),
            }
        }
    }
}

/// Runs of equal keys in an already sorted list.
fn groups(sorted: Vec<(Value, Value)>) -> Vec<Vec<Value>> {
    let mut groups: Vec<Vec<Value>> = Vec::new();
    let mut last_key: Option<Value> = None;
    for (key, item) in sorted {
        match (&last_key, groups.last_mut()) {
            (Some(last), Some(group)) if last.compare(&key) == Ordering::Equal => group.push(item),
            _ => groups.push(vec![item]),
        }
        last_key = Some(key);
    }
    groups
}

/// The process environment as an object.
pub(crate) fn env_object() -> Value {
    let map: Map = std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, Value::string(v.into_string().ok()?))))
        .collect();
    Value::object(map)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    fn json(text: &str) -> Value {
        Value::from_json(text).unwrap()
    }

    #[test]
    fn every_native_is_dispatched() {
        // Listed natives must not fall through to "not defined". Generators
        // and closures are matched in `call` itself.
        let in_call = [
            "empty", "halt", "error", "limit", "first", "isempty", "range", "pow", "sort_by",
            "group_by", "unique_by", "min_by", "max_by",
        ];
        let input = json("[3,1,2]");
        for &(name, arity) in NATIVES {
            if in_call.contains(&name) {
                continue;
            }
            let result = match arity {
                0 => nullary(name, &input),
                1 => unary(name, &input, &json("1")),
                _ => continue,
            };
            if let Err(err) = result {
                assert!(
                    !err.message().contains("is not defined"),
                    "{name}/{arity} fell through"
                );
            }
        }
    }

    #[test]
    fn length_of_each_kind() {
        assert_eq!(length(&Value::null()).unwrap(), json("0"));
        assert_eq!(length(&json("-5")).unwrap(), json("5"));
        assert_eq!(length(&json(r#""héllo""#)).unwrap(), json("5"));
        assert_eq!(length(&json(r#"{"a":1}"#)).unwrap(), json("1"));
        assert_eq!(
            length(&json("true")).unwrap_err().message(),
            "boolean (true) has no length"
        );
    }

    #[test]
    fn containment() {
        assert!(contains(&json(r#"{"a":[1,2,"xyz"]}"#), &json(r#"{"a":["y"]}"#)));
        assert!(!contains(&json("[1,2]"), &json("[3]")));
        assert!(!contains(&json(r#"["1"]"#), &json("[1]")));
        assert!(unary("contains", &json("1"), &json(r#""a""#)).is_err());
    }

    #[test]
    fn string_indices_are_character_offsets() {
        assert_eq!(
            indices(&json(r#""aéa,b, cd, efg""#), &json(r#"", ""#)).unwrap(),
            json("[5,9]")
        );
        assert_eq!(indices(&json("[0,1,2,1,3]"), &json("1")).unwrap(), json("[1,3]"));
    }

    #[test]
    fn join_renders_scalars() {
        assert_eq!(
            join(&json(r#"["a",1,null,true]"#), &json(r#""-""#)).unwrap(),
            json(r#""a-1--true""#)
        );
        assert!(join(&json("[[1]]"), &json(r#""-""#)).is_err());
    }

    #[test]
    fn by_key_family() {
        let keyed = |items: &str| -> Vec<(Value, Value)> {
            json(items)
                .as_array()
                .unwrap()
                .iter()
                .map(|v| (v.get("k").cloned().unwrap(), v.clone()))
                .collect()
        };
        let items = r#"[{"k":2,"n":"a"},{"k":1,"n":"b"},{"k":2,"n":"c"}]"#;
        assert_eq!(
            by_key("group_by", keyed(items)).to_json(),
            r#"[[{"k":1,"n":"b"}],[{"k":2,"n":"a"},{"k":2,"n":"c"}]]"#
        );
        assert_eq!(by_key("min_by", keyed(items)).get("n"), Some(&json(r#""b""#)));
        // Ties go to the last maximum.
        assert_eq!(by_key("max_by", keyed(items)).get("n"), Some(&json(r#""c""#)));
        assert_eq!(by_key("min_by", Vec::new()), Value::null());
    }

    #[test]
    fn tonumber_and_fromjson() {
        assert_eq!(tonumber(&json(r#""1.5""#)).unwrap(), json("1.5"));
        assert!(tonumber(&json(r#""abc""#)).is_err());
        let err = nullary("fromjson", &json(r#""{""#)).unwrap_err();
        assert!(err.message().contains("while parsing '{'"), "{err}");
    }

    #[test]
    fn implode_rejects_bad_codepoints() {
        assert_eq!(implode(&json("[104,105]")).unwrap(), json(r#""hi""#));
        assert!(implode(&json("[55296]")).is_err());
    }
}
