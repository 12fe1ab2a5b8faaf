//! Value model tests
//!
//! Exercise the safe value wrapper against the in-process engine:
//! - Raw layout of scalars
//! - Container access and its error cases
//! - Conversion to and from host values and serde types
//! - Live objects and isolation

use sciter_core::sciter_sys::{T_INT, T_STRING, UT_STRING_SYMBOL};
use sciter_core::{
    Conversion, HostValue, MAX_ELEMENTS, MapKey, ObjectKind, SciterError, StringKind, Value,
    ValueType,
};
use serde::Deserialize;
use serde_json::json;

#[test]
fn test_int_layout() {
    let v = Value::from(7);
    let raw = v.raw();
    assert_eq!(raw.t, T_INT);
    assert_eq!(raw.u, 0);
    assert_eq!(raw.d, 7);
    assert_eq!(v.value_type(), ValueType::Int);
}

#[test]
fn test_clear_is_idempotent() {
    let mut v = Value::parse(r#"{"a": [1, 2, 3]}"#).unwrap();
    v.clear();
    assert!(v.is_undefined());
    v.clear();
    assert!(v.is_undefined());
    assert_eq!(format!("{v:?}"), "<undefined>");
}

#[test]
fn test_special_strings() {
    let sym = Value::symbol("ready");
    assert_eq!(sym.raw().t, T_STRING);
    assert_eq!(sym.raw().u, UT_STRING_SYMBOL);
    assert!(sym.is_symbol());
    assert_eq!(sym.as_string().unwrap(), "ready");

    let secret = Value::secure_string("hunter2");
    assert_eq!(secret.string_kind(), Some(StringKind::Secure));
    assert_eq!(secret.as_string().unwrap(), "hunter2");

    let err = Value::error_string("bad thing");
    assert!(err.is_error_string());
    assert_eq!(err.to_host().unwrap(), HostValue::Error("bad thing".into()));
    let back = Value::try_from(&HostValue::Error("bad thing".into())).unwrap();
    assert!(back.is_error_string());

    assert!(Value::null().is_null());
    assert!(!Value::null().is_truthy());
}

#[test]
fn test_parse_and_item_access() {
    let mut doc = Value::parse(r#"{"name": "box", "size": [10, 20]}"#).unwrap();
    assert!(doc.is_map());
    assert_eq!(doc.len().unwrap(), 2);
    assert!(doc.contains(&Value::from("name")).unwrap());
    assert!(!doc.contains(&Value::from("color")).unwrap());

    let size = doc.get_key("size").unwrap();
    assert_eq!(size.get(-1).unwrap().as_int().unwrap(), 20);
    assert_eq!(size.get_item(&Value::from(0)).unwrap().as_int().unwrap(), 10);

    doc.set_key("name", &Value::from("crate")).unwrap();
    assert_eq!(doc.get_key("name").unwrap().as_string().unwrap(), "crate");
    assert_eq!(doc.len().unwrap(), 2);

    let keys: Vec<String> = doc
        .keys()
        .unwrap()
        .iter()
        .map(|k| k.as_string().unwrap())
        .collect();
    assert_eq!(keys, ["name", "size"]);
}

#[test]
fn test_missing_index_and_key_errors() {
    let list = Value::parse("[1, 2, 3]").unwrap();
    assert!(matches!(
        list.get(3),
        Err(SciterError::IndexOutOfRange { index: 3, len: 3 })
    ));
    assert!(matches!(
        list.get(-4),
        Err(SciterError::IndexOutOfRange { index: -4, len: 3 })
    ));

    let map = Value::parse(r#"{"a": 1}"#).unwrap();
    match map.get_key("b") {
        Err(SciterError::KeyNotFound(key)) => assert_eq!(key, "\"b\""),
        other => panic!("expected KeyNotFound, got {other:?}"),
    }

    assert!(matches!(
        Value::from(1).len(),
        Err(SciterError::IncompatibleType { .. })
    ));
    assert!(matches!(
        Value::from("x").as_int(),
        Err(SciterError::IncompatibleType { .. })
    ));
}

#[test]
fn test_autovivify_containers() {
    let mut list = Value::new();
    list.set(2, &Value::from(true)).unwrap();
    assert!(list.is_array());
    assert_eq!(list.len().unwrap(), 3);
    assert!(list.get(0).unwrap().is_undefined());

    let mut map = Value::new();
    map.set_key("k", &Value::from(1.5)).unwrap();
    assert!(map.is_map());
    assert_eq!(map.get_key("k").unwrap().as_float().unwrap(), 1.5);

    assert!(matches!(
        list.set_item(&Value::from("k"), &Value::from(1)),
        Err(SciterError::IncompatibleType { .. })
    ));
}

#[test]
fn test_array_growth_is_bounded() {
    let mut list = Value::parse("[]").unwrap();
    assert!(matches!(
        list.set(20_000_000, &Value::from(1)),
        Err(SciterError::BadParameter { .. })
    ));
    assert!(matches!(
        list.set(MAX_ELEMENTS as isize, &Value::from(1)),
        Err(SciterError::BadParameter { .. })
    ));
    assert_eq!(list.len().unwrap(), 0);

    list.set(MAX_ELEMENTS as isize - 1, &Value::from(1)).unwrap();
    assert_eq!(list.len().unwrap(), MAX_ELEMENTS);

    assert!(matches!(
        Value::array(MAX_ELEMENTS + 1),
        Err(SciterError::BadParameter { .. })
    ));
    let mut fresh = Value::new();
    assert!(fresh.set(isize::MAX, &Value::from(1)).is_err());
    assert!(fresh.is_undefined());
}

#[test]
fn test_copies_are_independent() {
    let original = Value::parse("[1, 2]").unwrap();
    let mut copy = original.clone();
    copy.push(&Value::from(3)).unwrap();
    assert_eq!(original.len().unwrap(), 2);
    assert_eq!(copy.len().unwrap(), 3);
    assert_ne!(original, copy);
}

#[test]
fn test_nested_host_round_trip() {
    let mut host = HostValue::from(json!({
        "id": 42,
        "ratio": 0.25,
        "tags": ["a", "b"],
        "nested": {"deep": [{"flag": true}, null]}
    }));
    if let HostValue::Map(entries) = &mut host {
        entries.insert("blob".into(), HostValue::Bytes(vec![0, 1, 255]));
    }

    let native = Value::from_host(&host).unwrap();
    assert_eq!(native.to_host().unwrap(), host);
    assert_eq!(
        native.get_key("nested").unwrap().get_key("deep").unwrap().len().unwrap(),
        2
    );
}

#[test]
fn test_literal_conversion() {
    let v = Value::parse(r#"{"a": [1, 2.5, "s"]}"#).unwrap();
    let text = v.to_literal(Conversion::JsonLiteral).unwrap();
    assert_eq!(Value::parse(&text).unwrap(), v);
    // rendering does not modify the value
    assert!(v.is_map());

    let plain = Value::parse_as("not json", Conversion::Simple).unwrap();
    assert_eq!(plain.as_string().unwrap(), "not json");
    assert!(matches!(
        Value::parse("{broken"),
        Err(SciterError::BadParameter { .. })
    ));
}

#[derive(Debug, Deserialize, PartialEq)]
struct Window {
    title: String,
    width: i64,
    resizable: bool,
}

#[test]
fn test_deserialize_into_struct() {
    let v = Value::parse(r#"{"title": "main", "width": 640, "resizable": false}"#).unwrap();
    let window: Window = v.deserialize().unwrap();
    assert_eq!(
        window,
        Window {
            title: "main".into(),
            width: 640,
            resizable: false,
        }
    );
    assert!(matches!(
        Value::from(1).deserialize::<Window>(),
        Err(SciterError::Json(_))
    ));
}

#[test]
fn test_shared_object_isolation() {
    let mut shared = Value::parse("[1, 2]").unwrap();
    let code = unsafe { sciter_engine::set_shared_object(shared.as_mut_ptr()) };
    assert_eq!(code, sciter_core::sciter_sys::HV_OK);
    assert_eq!(shared.object_kind(), Some(ObjectKind::Array));

    // copies of a live object share it
    let mut alias = shared.clone();
    alias.set(0, &Value::from(10)).unwrap();
    assert_eq!(shared.get(0).unwrap().as_int().unwrap(), 10);

    let mut snapshot = shared.clone();
    snapshot.isolate().unwrap();
    assert!(snapshot.is_array());
    snapshot.set(1, &Value::from(20)).unwrap();
    assert_eq!(shared.get(1).unwrap().as_int().unwrap(), 2);

    // host conversion sees plain data
    assert_eq!(
        shared.to_host().unwrap(),
        HostValue::List(vec![10.into(), 2.into()])
    );
}

#[test]
fn test_host_map_lookup() {
    let host = HostValue::from(json!({"five": 5, "seven": 7}));
    let map = Value::from_host(&host).unwrap();
    assert!(map.is_map());
    assert_eq!(map.len().unwrap(), 2);
    assert_eq!(map.get_key("five").unwrap(), Value::from(5));
    assert!(matches!(
        map.get_key("missing"),
        Err(SciterError::KeyNotFound(_))
    ));
}

#[test]
fn test_equal_ints_compare_equal() {
    assert_eq!(Value::from(7), Value::from(7));
    assert_ne!(Value::from(7), Value::from(7.0));
}

#[test]
fn test_int_keyed_map_round_trip() {
    let mut original = Value::map();
    original.set_item(&Value::from(1), &Value::from("one")).unwrap();
    original.set_item(&Value::from(true), &Value::from("yes")).unwrap();

    let host = original.to_host().unwrap();
    assert_eq!(host.get(MapKey::Int(1)), Some(&HostValue::from("one")));
    assert_eq!(host.get(true), Some(&HostValue::from("yes")));

    let back = Value::from_host(&host).unwrap();
    assert_eq!(back, original);
    assert_eq!(back.keys().unwrap()[0].value_type(), ValueType::Int);
}
