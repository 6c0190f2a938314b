#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::Kind;
use pretty_assertions::assert_eq;

#[test]
fn null() {
    let value = Value::from_native(&()).unwrap();
    assert_eq!(value.kind(), Kind::Null);
    assert_eq!(value.to_native(), Native::Null);

    let none: Option<i32> = None;
    assert_eq!(Value::from_native(&none).unwrap().kind(), Kind::Null);
}

#[test]
fn booleans() {
    let t = Value::from_native(&true).unwrap();
    let f = Value::from_native(&false).unwrap();
    assert_eq!(t.kind(), Kind::True);
    assert_eq!(f.kind(), Kind::False);
    assert_eq!(t.to_native(), Native::Bool(true));
}

#[test]
fn float_stays_float() {
    let value = Value::from_native(&1.23f64).unwrap();
    assert_eq!(value.kind(), Kind::Number);
    assert_eq!(value.to_native(), Native::Float(1.23));
}

#[test]
fn non_finite_floats_become_null() {
    for n in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let value = Value::from_native(&n).unwrap();
        assert_eq!(value.kind(), Kind::Null, "{n}");
    }
}

#[test]
fn integer_comes_back_as_integer() {
    let value = Value::from_native(&456).unwrap();
    assert_eq!(value.kind(), Kind::Number);
    assert_eq!(value.to_native(), Native::Int(456));
}

#[test]
fn parsed_integral_numbers_are_integers() {
    let value = Value::from_json("123").unwrap();
    assert_eq!(value.to_native(), Native::from(123));
    assert_eq!(Value::number(1e300).to_native(), Native::Float(1e300));
}

#[test]
fn string() {
    let value = Value::from_native("test").unwrap();
    assert_eq!(value.kind(), Kind::String);
    assert_eq!(value.to_native(), Native::from("test"));
}

#[test]
fn string_list() {
    let value = Value::from_native(&vec!["test", "one", "two"]).unwrap();
    assert_eq!(value.kind(), Kind::Array);
    let Native::Array(items) = value.to_native() else {
        panic!("expected an array");
    };
    assert_eq!(items[2], Native::from("two"));
}

#[test]
fn string_keyed_map() {
    let map: HashMap<String, i32> = [("one".to_owned(), 1), ("two".to_owned(), 2)]
        .into_iter()
        .collect();
    let value = Value::from_native(&map).unwrap();
    assert_eq!(value.kind(), Kind::Object);
    assert_eq!(value.to_native(), Native::from(map));
}

#[test]
fn native_round_trips_through_value() {
    let native = Native::from(vec![
        Native::Null,
        Native::from(1.5),
        Native::from(-3),
        Native::from(vec!["a", "b"]),
    ]);
    assert_eq!(Value::from_native(&native).unwrap().to_native(), native);
}

#[test]
fn maps_with_structured_keys_are_unsupported() {
    let mut map = BTreeMap::new();
    map.insert(vec![1u8, 2], 3);
    let err = Value::from_native(&map).unwrap_err();
    assert!(matches!(err, ValueError::UnsupportedType(_)), "{err}");
}

#[test]
fn invalid_values_have_no_native_form() {
    let value = Value::invalid_with_message(Value::string("boom"));
    assert_eq!(value.to_native(), Native::Null);
}
