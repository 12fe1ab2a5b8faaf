//! Host-side value model
//!
//! [`HostValue`] is what handlers and callables see: plain Rust data that
//! marshals to and from engine values.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{SciterError, SciterResult};
use crate::value::Value;

type CallableFn = dyn Fn(&[HostValue]) -> SciterResult<HostValue> + Send + Sync;

/// A host function that can be handed to scripts
#[derive(Clone)]
pub struct Callable(Arc<CallableFn>);

impl Callable {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[HostValue]) -> SciterResult<HostValue> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[HostValue]) -> SciterResult<HostValue> {
        (self.0)(args)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({:p})", Arc::as_ptr(&self.0))
    }
}

/// Key of a host map. Scalar keys keep their type across the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    String(String),
}

impl MapKey {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MapKey {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for MapKey {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i32> for MapKey {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for MapKey {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for MapKey {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// A value in host terms
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<HostValue>),
    Map(IndexMap<MapKey, HostValue>),
    Callable(Callable),
    /// An error string; marshals to the engine's error value
    Error(String),
    /// An engine value with no host counterpart, kept as is
    Native(Value),
}

impl HostValue {
    /// Wrap a closure as a callable value
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&[HostValue]) -> SciterResult<HostValue> + Send + Sync + 'static,
    {
        Self::Callable(Callable::new(f))
    }

    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Callable(_) => "callable",
            Self::Error(_) => "error",
            Self::Native(_) => "native",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value; integers widen to floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<MapKey, HostValue>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Entry of a map under `key`
    pub fn get(&self, key: impl Into<MapKey>) -> Option<&HostValue> {
        self.as_map()?.get(&key.into())
    }

    /// Convert to a JSON document. Callables and native values have no
    /// JSON form; bytes become an array of numbers and map keys are
    /// stringified.
    pub fn to_json(&self) -> SciterResult<serde_json::Value> {
        use serde_json::Value as Json;
        Ok(match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Self::String(s) | Self::Error(s) => Json::String(s.clone()),
            Self::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
            Self::List(items) => Json::Array(
                items
                    .iter()
                    .map(HostValue::to_json)
                    .collect::<SciterResult<_>>()?,
            ),
            Self::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.to_string(), v.to_json()?)))
                    .collect::<SciterResult<_>>()?,
            ),
            other => return Err(SciterError::type_error("JSON data", other.type_name())),
        })
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Json::Object(entries) => {
                Self::Map(
                    entries
                        .into_iter()
                        .map(|(k, v)| (MapKey::String(k), Self::from(v)))
                        .collect(),
                )
            }
        }
    }
}

impl From<()> for HostValue {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for HostValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&[u8]> for HostValue {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(v: Vec<HostValue>) -> Self {
        Self::List(v)
    }
}

impl From<IndexMap<MapKey, HostValue>> for HostValue {
    fn from(v: IndexMap<MapKey, HostValue>) -> Self {
        Self::Map(v)
    }
}

impl From<MapKey> for HostValue {
    fn from(key: MapKey) -> Self {
        match key {
            MapKey::Bool(b) => Self::Bool(b),
            MapKey::Int(i) => Self::Int(i),
            MapKey::String(s) => Self::String(s),
        }
    }
}

impl From<Callable> for HostValue {
    fn from(v: Callable) -> Self {
        Self::Callable(v)
    }
}

impl From<Value> for HostValue {
    fn from(v: Value) -> Self {
        Self::Native(v)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_key_order() {
        let host = HostValue::from(json!({"z": 1, "a": [true, null], "m": 2.5}));
        let keys: Vec<String> = host.as_map().unwrap().keys().map(MapKey::to_string).collect();
        assert_eq!(keys, ["z", "a", "m"]);
        assert_eq!(
            host.get("a"),
            Some(&HostValue::List(vec![true.into(), HostValue::Null]))
        );
        assert_eq!(host.get("m").and_then(HostValue::as_f64), Some(2.5));
    }

    #[test]
    fn test_to_json() {
        let host = HostValue::List(vec![1.into(), "x".into(), HostValue::Bytes(vec![1, 2])]);
        assert_eq!(host.to_json().unwrap(), json!([1, "x", [1, 2]]));

        let err = HostValue::callable(|_| Ok(HostValue::Null)).to_json().unwrap_err();
        assert!(matches!(err, SciterError::TypeError { .. }));
    }

    #[test]
    fn test_typed_keys_stringify_in_json() {
        let mut entries = IndexMap::new();
        entries.insert(MapKey::Int(1), HostValue::from("one"));
        entries.insert(MapKey::Bool(true), HostValue::from("yes"));
        let host = HostValue::Map(entries);
        assert_eq!(host.get(MapKey::Int(1)), Some(&HostValue::from("one")));
        assert_eq!(host.get("1"), None);
        assert_eq!(host.to_json().unwrap(), json!({"1": "one", "true": "yes"}));
    }

    #[test]
    fn test_callable_identity() {
        let f = Callable::new(|args| Ok(HostValue::Int(args.len() as i64)));
        let g = f.clone();
        assert_eq!(f, g);
        assert_ne!(f, Callable::new(|_| Ok(HostValue::Null)));
        assert_eq!(f.call(&[1.into(), 2.into()]).unwrap(), HostValue::Int(2));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(HostValue::from(None::<i32>), HostValue::Null);
        assert_eq!(HostValue::from(Some("x")), HostValue::String("x".into()));
    }
}
