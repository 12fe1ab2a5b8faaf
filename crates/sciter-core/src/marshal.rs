//! Conversion between host values and engine values.

use indexmap::IndexMap;
use sciter_sys::{VALUE, ValueApi};
use tracing::trace;

use crate::api;
use crate::error::{SciterError, SciterResult};
use crate::functor;
use crate::host::{HostValue, MapKey};
use crate::kind::{ObjectKind, StringKind, ValueType};
use crate::value::Value;

/// Largest integer a double holds exactly (2^53)
const MAX_SAFE_INTEGER: u64 = 1 << 53;

/// Convert a host value into a new engine value
pub fn to_native(value: &HostValue) -> SciterResult<Value> {
    let mut out = Value::new();
    store(&mut out, value)?;
    Ok(out)
}

/// Write a host value into `out`, replacing its contents
pub fn store(out: &mut Value, value: &HostValue) -> SciterResult<()> {
    match value {
        HostValue::Null => out.set_null(),
        HostValue::Bool(b) => out.set_bool(*b),
        HostValue::Int(i) => match i32::try_from(*i) {
            Ok(n) => out.set_int(n),
            Err(_) if i.unsigned_abs() <= MAX_SAFE_INTEGER => out.set_float(*i as f64),
            Err(_) => Err(SciterError::BadParameter {
                operation: "marshal.int",
            }),
        },
        HostValue::Float(f) => out.set_float(*f),
        HostValue::String(s) => out.set_string(s),
        HostValue::Bytes(bytes) => out.set_bytes(bytes),
        HostValue::List(items) => {
            out.set_array(items.len())?;
            for (i, item) in items.iter().enumerate() {
                out.set(i as isize, &to_native(item)?)?;
            }
            Ok(())
        }
        HostValue::Map(entries) => {
            out.set_map()?;
            for (key, item) in entries {
                let key = to_native(&HostValue::from(key.clone()))?;
                out.set_item(&key, &to_native(item)?)?;
            }
            Ok(())
        }
        HostValue::Callable(callable) => {
            *out = functor::wrap(callable.clone())?;
            Ok(())
        }
        HostValue::Error(message) => out.set_string_as(message, StringKind::Error),
        HostValue::Native(native) => out.assign(native),
    }
}

/// Convert an engine value into host terms.
///
/// Live script arrays and objects are isolated first. Types without a host
/// counterpart come back as [`HostValue::Native`].
pub fn to_host(value: &Value) -> SciterResult<HostValue> {
    Ok(match value.value_type() {
        ValueType::Undefined | ValueType::Null => HostValue::Null,
        ValueType::Bool => HostValue::Bool(value.as_bool()?),
        ValueType::Int => HostValue::Int(value.as_int()?.into()),
        ValueType::Float => HostValue::Float(value.as_float()?),
        ValueType::String if value.is_error_string() => HostValue::Error(value.as_string()?),
        ValueType::String => HostValue::String(value.as_string()?),
        ValueType::Bytes => HostValue::Bytes(value.as_bytes()?),
        ValueType::Array => HostValue::List(
            value
                .values()?
                .iter()
                .map(to_host)
                .collect::<SciterResult<_>>()?,
        ),
        ValueType::Map => {
            let mut entries = IndexMap::new();
            for (key, item) in value.items()? {
                entries.insert(map_key(&key)?, to_host(&item)?);
            }
            HostValue::Map(entries)
        }
        ValueType::Object
            if matches!(
                value.object_kind(),
                Some(ObjectKind::Array | ObjectKind::Object)
            ) =>
        {
            let mut copy = value.clone();
            copy.isolate()?;
            trace!("isolated live object for conversion");
            to_host(&copy)?
        }
        _ => HostValue::Native(value.clone()),
    })
}

/// Map keys must be strings, integers or booleans
fn map_key(key: &Value) -> SciterResult<MapKey> {
    match to_host(key)? {
        HostValue::String(s) => Ok(MapKey::String(s)),
        HostValue::Int(i) => Ok(MapKey::Int(i)),
        HostValue::Bool(b) => Ok(MapKey::Bool(b)),
        other => Err(SciterError::type_error("scalar map key", other.type_name())),
    }
}

/// Copy raw engine arguments into owned values
///
/// # Safety
/// `argv` must point to `argc` initialized values (or be null with `argc == 0`).
pub unsafe fn raw_args(argv: *const VALUE, argc: u32) -> SciterResult<Vec<Value>> {
    // SAFETY: forwarded caller contract
    unsafe { raw_args_in(argv, argc, api::current()) }
}

/// [`raw_args`] against a specific table
///
/// # Safety
/// Same contract as [`raw_args`], with the values created by `api`.
pub(crate) unsafe fn raw_args_in(
    argv: *const VALUE,
    argc: u32,
    api: &'static ValueApi,
) -> SciterResult<Vec<Value>> {
    if argc == 0 || argv.is_null() {
        return Ok(Vec::new());
    }
    (0..argc as usize)
        // SAFETY: i < argc, caller guarantees argv
        .map(|i| unsafe { Value::copy_from_raw_in(argv.add(i), api) })
        .collect()
}

/// Convert raw engine arguments into host values
///
/// # Safety
/// Same contract as [`raw_args`].
pub unsafe fn unpack_args(argv: *const VALUE, argc: u32) -> SciterResult<Vec<HostValue>> {
    // SAFETY: forwarded caller contract
    unsafe { raw_args(argv, argc) }?
        .iter()
        .map(to_host)
        .collect()
}

/// Write a host value into an engine-owned result slot
///
/// # Safety
/// `slot` must point to an initialized value created by the current table.
pub unsafe fn pack_result(slot: *mut VALUE, value: &HostValue) -> SciterResult<()> {
    let native = to_native(value)?;
    // SAFETY: forwarded caller contract
    unsafe { native.copy_to(slot) }
}
