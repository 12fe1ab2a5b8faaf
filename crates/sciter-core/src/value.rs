//! Safe wrapper around engine values
//!
//! A [`Value`] owns one `VALUE` slot and the table it was created with.
//! Dropping it releases the slot through `ValueClear`.

use sciter_sys::*;
use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use tracing::{debug, error, trace};

use crate::api;
use crate::error::{SciterError, SciterResult, check};
use crate::host::{Callable, HostValue};
use crate::kind::{Conversion, LengthUnit, ObjectKind, StringKind, ValueType};
use crate::{functor, marshal};

/// Largest number of elements an array may grow to through this wrapper.
/// Writes at or past this index, and larger array lengths, are rejected
/// with [`SciterError::BadParameter`].
pub const MAX_ELEMENTS: usize = 1 << 20;

/// An engine value with automatic release
///
/// # Thread Safety
///
/// This type is `!Send` and `!Sync`: engine values belong to the thread
/// that runs the engine.
pub struct Value {
    data: VALUE,
    api: &'static ValueApi,
    /// Marker to make this type !Send + !Sync
    _not_send: PhantomData<*mut ()>,
}

pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn to_wide_nul(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

impl Value {
    /// Create an undefined value using the process-wide table
    pub fn new() -> Self {
        Self::new_in(api::current())
    }

    /// Create an undefined value using a specific table
    pub fn new_in(api: &'static ValueApi) -> Self {
        let mut data = VALUE::default();
        // SAFETY: data is a valid, writable slot
        unsafe { (api.ValueInit)(&mut data) };
        Self {
            data,
            api,
            _not_send: PhantomData,
        }
    }

    /// Copy a value owned by the engine
    ///
    /// # Safety
    /// `src` must point to an initialized value created by the current table.
    pub unsafe fn copy_from_raw(src: *const VALUE) -> SciterResult<Self> {
        // SAFETY: forwarded caller contract
        unsafe { Self::copy_from_raw_in(src, api::current()) }
    }

    /// Copy a value owned by the engine behind `api`
    ///
    /// # Safety
    /// `src` must point to an initialized value created by `api`.
    pub unsafe fn copy_from_raw_in(src: *const VALUE, api: &'static ValueApi) -> SciterResult<Self> {
        let mut rv = Self::new_in(api);
        // SAFETY: caller guarantees src; rv owns a valid slot
        check(unsafe { (api.ValueCopy)(&mut rv.data, src) }, "ValueCopy")?;
        Ok(rv)
    }

    /// Take ownership of a raw value
    ///
    /// # Safety
    /// `raw` must be initialized by the current table and not released by
    /// anyone else.
    pub unsafe fn adopt(raw: VALUE) -> Self {
        Self {
            data: raw,
            api: api::current(),
            _not_send: PhantomData,
        }
    }

    /// Give up ownership of the raw slot; whoever receives it must clear it
    pub fn into_raw(self) -> VALUE {
        let data = self.data;
        std::mem::forget(self);
        data
    }

    /// Build a value from a fallible setter. Scalar writes cannot fail on a
    /// conforming table, so a failure is logged rather than surfaced.
    fn build(set: impl FnOnce(&mut Self) -> SciterResult<()>) -> Self {
        let mut rv = Self::new();
        if let Err(err) = set(&mut rv) {
            error!(%err, "value table rejected a scalar write");
        }
        rv
    }

    /// Explicit null
    pub fn null() -> Self {
        Self::build(|v| v.set_null())
    }

    /// Symbol with the given name
    pub fn symbol(name: &str) -> Self {
        Self::build(|v| v.set_string_as(name, StringKind::Symbol))
    }

    /// Secure string: the engine wipes its storage on release
    pub fn secure_string(s: &str) -> Self {
        Self::build(|v| v.set_string_as(s, StringKind::Secure))
    }

    /// Error string, the engine's representation of a thrown error
    pub fn error_string(message: &str) -> Self {
        Self::build(|v| v.set_string_as(message, StringKind::Error))
    }

    /// Array of `len` undefined elements
    pub fn array(len: usize) -> SciterResult<Self> {
        let mut rv = Self::new();
        rv.set_array(len)?;
        Ok(rv)
    }

    /// Empty map
    pub fn map() -> Self {
        Self::build(|v| v.set_map())
    }

    pub fn length(value: f64, unit: LengthUnit) -> Self {
        Self::build(|v| v.set_float_as(value, ValueType::Length, unit.raw()))
    }

    /// Color as `0xAABBGGRR`
    pub fn color(abgr: u32) -> Self {
        Self::build(|v| v.set_int_as(abgr as i32, ValueType::Color, 0))
    }

    /// Date as 100ns ticks since 1601-01-01; `flags` are `DT_*` bits
    pub fn date(ticks: i64, flags: u32) -> Self {
        Self::build(|v| v.set_int64_as(ticks, ValueType::Date, flags))
    }

    /// Currency in 1/10000 units
    pub fn currency(amount: i64) -> Self {
        Self::build(|v| v.set_int64_as(amount, ValueType::Currency, 0))
    }

    pub fn duration(seconds: f64) -> Self {
        Self::build(|v| v.set_float_as(seconds, ValueType::Duration, 0))
    }

    pub fn angle(radians: f64) -> Self {
        Self::build(|v| v.set_float_as(radians, ValueType::Angle, 0))
    }

    /// Wrap a host closure as a native function value
    pub fn function<F>(f: F) -> SciterResult<Self>
    where
        F: Fn(&[HostValue]) -> SciterResult<HostValue> + Send + Sync + 'static,
    {
        functor::wrap(Callable::new(f))
    }

    /// Parse a JSON literal
    pub fn parse(text: &str) -> SciterResult<Self> {
        Self::parse_as(text, Conversion::JsonLiteral)
    }

    /// Parse text with an explicit conversion mode
    pub fn parse_as(text: &str, how: Conversion) -> SciterResult<Self> {
        let wide = to_wide(text);
        let mut rv = Self::new();
        // SAFETY: wide outlives the call and its length is passed along
        let rest = unsafe {
            (rv.api.ValueFromString)(&mut rv.data, wide.as_ptr(), wide.len() as UINT, how.raw())
        };
        if rest != 0 {
            debug!(rest, "literal rejected by the engine");
            return Err(SciterError::BadParameter {
                operation: "value.parse",
            });
        }
        Ok(rv)
    }

    /// Convert a host value
    pub fn from_host(value: &HostValue) -> SciterResult<Self> {
        marshal::to_native(value)
    }

    /// Convert a JSON document
    pub fn from_json(json: &serde_json::Value) -> SciterResult<Self> {
        marshal::to_native(&HostValue::from(json.clone()))
    }

    /// Get the raw slot
    pub fn raw(&self) -> &VALUE {
        &self.data
    }

    pub fn as_ptr(&self) -> *const VALUE {
        &self.data
    }

    pub fn as_mut_ptr(&mut self) -> *mut VALUE {
        &mut self.data
    }

    /// The table this value was created with
    pub fn api(&self) -> &'static ValueApi {
        self.api
    }

    fn raw_type(&self) -> (UINT, UINT) {
        let (mut t, mut u) = (0, 0);
        // SAFETY: self.data is initialized
        unsafe { (self.api.ValueType)(&self.data, &mut t, &mut u) };
        (t, u)
    }

    pub fn value_type(&self) -> ValueType {
        ValueType::from_raw(self.raw_type().0)
    }

    /// Raw subtype (units) code
    pub fn subtype(&self) -> u32 {
        self.raw_type().1
    }

    /// Subtype of a string value
    pub fn string_kind(&self) -> Option<StringKind> {
        match self.raw_type() {
            (T_STRING, u) => StringKind::from_raw(u),
            _ => None,
        }
    }

    /// Subtype of an object value
    pub fn object_kind(&self) -> Option<ObjectKind> {
        match self.raw_type() {
            (T_OBJECT, u) => ObjectKind::from_raw(u),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.value_type() == ValueType::Undefined
    }

    pub fn is_null(&self) -> bool {
        self.value_type() == ValueType::Null
    }

    pub fn is_bool(&self) -> bool {
        self.value_type() == ValueType::Bool
    }

    pub fn is_int(&self) -> bool {
        self.value_type() == ValueType::Int
    }

    pub fn is_float(&self) -> bool {
        self.value_type() == ValueType::Float
    }

    pub fn is_string(&self) -> bool {
        self.value_type() == ValueType::String
    }

    pub fn is_bytes(&self) -> bool {
        self.value_type() == ValueType::Bytes
    }

    pub fn is_array(&self) -> bool {
        self.value_type() == ValueType::Array
    }

    pub fn is_map(&self) -> bool {
        self.value_type() == ValueType::Map
    }

    pub fn is_function(&self) -> bool {
        self.value_type() == ValueType::Function
    }

    pub fn is_object(&self) -> bool {
        self.value_type() == ValueType::Object
    }

    pub fn is_error_string(&self) -> bool {
        self.string_kind() == Some(StringKind::Error)
    }

    pub fn is_symbol(&self) -> bool {
        self.string_kind() == Some(StringKind::Symbol)
    }

    pub fn is_secure_string(&self) -> bool {
        self.string_kind() == Some(StringKind::Secure)
    }

    pub fn is_native_functor(&self) -> bool {
        // SAFETY: self.data is initialized
        unsafe { (self.api.ValueIsNativeFunctor)(&self.data) != 0 }
    }

    /// Array-like: a plain array or a script array object
    fn is_sequence(&self) -> bool {
        self.is_array() || self.object_kind() == Some(ObjectKind::Array)
    }

    /// Map-like: a plain map or a script object
    fn is_mapping(&self) -> bool {
        self.is_map() || self.object_kind() == Some(ObjectKind::Object)
    }

    /// Release the payload and become undefined. Calling it again is a no-op.
    pub fn clear(&mut self) -> &mut Self {
        // SAFETY: self.data is initialized
        unsafe { (self.api.ValueClear)(&mut self.data) };
        self
    }

    /// Replace the contents with a copy of `other`
    pub fn assign(&mut self, other: &Value) -> SciterResult<()> {
        // SAFETY: both slots are initialized
        check(
            unsafe { (self.api.ValueCopy)(&mut self.data, &other.data) },
            "ValueCopy",
        )
    }

    /// Copy the contents into a caller-owned slot
    ///
    /// # Safety
    /// `dst` must point to an initialized value created by the same table.
    pub unsafe fn copy_to(&self, dst: *mut VALUE) -> SciterResult<()> {
        // SAFETY: caller guarantees dst
        check(unsafe { (self.api.ValueCopy)(dst, &self.data) }, "ValueCopy")
    }

    /// Convert live object references into plain data
    pub fn isolate(&mut self) -> SciterResult<&mut Self> {
        // SAFETY: self.data is initialized
        check(unsafe { (self.api.ValueIsolate)(&mut self.data) }, "ValueIsolate")?;
        Ok(self)
    }

    pub fn set_null(&mut self) -> SciterResult<()> {
        self.set_int_as(0, ValueType::Null, 0)
    }

    pub fn set_bool(&mut self, v: bool) -> SciterResult<()> {
        self.set_int_as(v as i32, ValueType::Bool, 0)
    }

    pub fn set_int(&mut self, v: i32) -> SciterResult<()> {
        self.set_int_as(v, ValueType::Int, 0)
    }

    pub fn set_float(&mut self, v: f64) -> SciterResult<()> {
        self.set_float_as(v, ValueType::Float, 0)
    }

    pub fn set_string(&mut self, s: &str) -> SciterResult<()> {
        self.set_string_as(s, StringKind::Plain)
    }

    pub fn set_string_as(&mut self, s: &str, kind: StringKind) -> SciterResult<()> {
        let wide = to_wide(s);
        // SAFETY: wide outlives the call
        check(
            unsafe {
                (self.api.ValueStringDataSet)(
                    &mut self.data,
                    wide.as_ptr(),
                    wide.len() as UINT,
                    kind.raw(),
                )
            },
            "ValueStringDataSet",
        )
    }

    pub fn set_bytes(&mut self, bytes: &[u8]) -> SciterResult<()> {
        // SAFETY: bytes outlives the call
        check(
            unsafe {
                (self.api.ValueBinaryDataSet)(
                    &mut self.data,
                    bytes.as_ptr(),
                    bytes.len() as UINT,
                    T_BYTES,
                    0,
                )
            },
            "ValueBinaryDataSet",
        )
    }

    /// Become an array of `len` undefined elements
    pub fn set_array(&mut self, len: usize) -> SciterResult<()> {
        if len > MAX_ELEMENTS {
            return Err(SciterError::BadParameter {
                operation: "value.set_array",
            });
        }
        self.set_int_as(len as i32, ValueType::Array, 0)
    }

    /// Become an empty map
    pub fn set_map(&mut self) -> SciterResult<()> {
        self.set_int_as(0, ValueType::Map, 0)
    }

    pub fn set_int_as(&mut self, v: i32, t: ValueType, units: u32) -> SciterResult<()> {
        // SAFETY: self.data is initialized
        check(
            unsafe { (self.api.ValueIntDataSet)(&mut self.data, v, t.raw(), units) },
            "ValueIntDataSet",
        )
    }

    pub fn set_int64_as(&mut self, v: i64, t: ValueType, units: u32) -> SciterResult<()> {
        // SAFETY: self.data is initialized
        check(
            unsafe { (self.api.ValueInt64DataSet)(&mut self.data, v, t.raw(), units) },
            "ValueInt64DataSet",
        )
    }

    pub fn set_float_as(&mut self, v: f64, t: ValueType, units: u32) -> SciterResult<()> {
        // SAFETY: self.data is initialized
        check(
            unsafe { (self.api.ValueFloatDataSet)(&mut self.data, v, t.raw(), units) },
            "ValueFloatDataSet",
        )
    }

    pub fn as_bool(&self) -> SciterResult<bool> {
        if !self.is_bool() {
            return Err(SciterError::IncompatibleType {
                operation: "value.as_bool",
            });
        }
        Ok(self.as_int()? != 0)
    }

    pub fn as_int(&self) -> SciterResult<i32> {
        let mut v = 0;
        // SAFETY: self.data is initialized
        check(unsafe { (self.api.ValueIntData)(&self.data, &mut v) }, "ValueIntData")?;
        Ok(v)
    }

    pub fn as_int64(&self) -> SciterResult<i64> {
        let mut v = 0;
        // SAFETY: self.data is initialized
        check(
            unsafe { (self.api.ValueInt64Data)(&self.data, &mut v) },
            "ValueInt64Data",
        )?;
        Ok(v)
    }

    pub fn as_float(&self) -> SciterResult<f64> {
        let mut v = 0.0;
        // SAFETY: self.data is initialized
        check(
            unsafe { (self.api.ValueFloatData)(&self.data, &mut v) },
            "ValueFloatData",
        )?;
        Ok(v)
    }

    pub fn as_string(&self) -> SciterResult<String> {
        let mut chars: LPCWSTR = ptr::null();
        let mut len: UINT = 0;
        // SAFETY: self.data is initialized
        check(
            unsafe { (self.api.ValueStringData)(&self.data, &mut chars, &mut len) },
            "ValueStringData",
        )?;
        if chars.is_null() || len == 0 {
            return Ok(String::new());
        }
        // SAFETY: the engine reported `len` units at `chars`, valid while self lives
        let units = unsafe { std::slice::from_raw_parts(chars, len as usize) };
        Ok(String::from_utf16_lossy(units))
    }

    pub fn as_bytes(&self) -> SciterResult<Vec<u8>> {
        let mut bytes: LPCBYTE = ptr::null();
        let mut len: UINT = 0;
        // SAFETY: self.data is initialized
        check(
            unsafe { (self.api.ValueBinaryData)(&self.data, &mut bytes, &mut len) },
            "ValueBinaryData",
        )?;
        if bytes.is_null() || len == 0 {
            return Ok(Vec::new());
        }
        // SAFETY: the engine reported `len` bytes at `bytes`
        Ok(unsafe { std::slice::from_raw_parts(bytes, len as usize) }.to_vec())
    }

    /// Truthiness: undefined, null, false, zero and empty values are false
    pub fn is_truthy(&self) -> bool {
        match self.value_type() {
            ValueType::Undefined | ValueType::Null => false,
            ValueType::Bool | ValueType::Int => self.as_int().is_ok_and(|v| v != 0),
            ValueType::Float => self.as_float().is_ok_and(|v| v != 0.0),
            ValueType::String => self.as_string().is_ok_and(|s| !s.is_empty()),
            ValueType::Bytes => self.as_bytes().is_ok_and(|b| !b.is_empty()),
            ValueType::Array | ValueType::Map => self.len().is_ok_and(|n| n > 0),
            _ => true,
        }
    }

    /// Number of elements; valid for arrays, maps, functions and objects
    pub fn len(&self) -> SciterResult<usize> {
        match self.value_type() {
            ValueType::Array | ValueType::Map | ValueType::Function | ValueType::Object => {}
            _ => {
                return Err(SciterError::IncompatibleType {
                    operation: "value.len",
                });
            }
        }
        let mut n = 0;
        // SAFETY: self.data is initialized
        check(
            unsafe { (self.api.ValueElementsCount)(&self.data, &mut n) },
            "ValueElementsCount",
        )?;
        Ok(n.max(0) as usize)
    }

    pub fn is_empty(&self) -> SciterResult<bool> {
        Ok(self.len()? == 0)
    }

    fn normalize_index(&self, index: isize, len: usize) -> SciterResult<usize> {
        let resolved = if index < 0 {
            index + len as isize
        } else {
            index
        };
        if resolved < 0 || resolved as usize >= len {
            return Err(SciterError::IndexOutOfRange { index, len });
        }
        Ok(resolved as usize)
    }

    /// Element at `index`; negative indices count from the end
    pub fn get(&self, index: isize) -> SciterResult<Value> {
        if !self.is_sequence() {
            return Err(SciterError::IncompatibleType {
                operation: "value.get",
            });
        }
        let len = self.len()?;
        let n = self.normalize_index(index, len)?;
        let mut rv = Value::new_in(self.api);
        // SAFETY: both slots are initialized, n < len
        check(
            unsafe { (self.api.ValueNthElementValue)(&self.data, n as INT, &mut rv.data) },
            "ValueNthElementValue",
        )?;
        Ok(rv)
    }

    /// Value stored under `key`. Integer keys index arrays.
    pub fn get_item(&self, key: &Value) -> SciterResult<Value> {
        if self.is_sequence() && key.is_int() {
            return self.get(key.as_int()? as isize);
        }
        if !self.is_mapping() {
            return Err(SciterError::IncompatibleType {
                operation: "value.get_item",
            });
        }
        let mut rv = Value::new_in(self.api);
        // SAFETY: all slots are initialized
        check(
            unsafe { (self.api.ValueGetValueOfKey)(&self.data, &key.data, &mut rv.data) },
            "ValueGetValueOfKey",
        )?;
        if rv.is_undefined() {
            return Err(SciterError::KeyNotFound(key.to_string()));
        }
        Ok(rv)
    }

    /// [`get_item`](Self::get_item) with a string key
    pub fn get_key(&self, key: &str) -> SciterResult<Value> {
        self.get_item(&Value::from(key))
    }

    /// Store `value` at `index`. An undefined value becomes an array and
    /// arrays grow as needed up to [`MAX_ELEMENTS`]; negative indices count
    /// from the end.
    pub fn set(&mut self, index: isize, value: &Value) -> SciterResult<()> {
        if !self.is_undefined() && !self.is_sequence() {
            return Err(SciterError::IncompatibleType {
                operation: "value.set",
            });
        }
        let n = if index < 0 {
            let len = if self.is_undefined() { 0 } else { self.len()? };
            self.normalize_index(index, len)?
        } else {
            index as usize
        };
        if n >= MAX_ELEMENTS {
            return Err(SciterError::BadParameter {
                operation: "value.set",
            });
        }
        let n = n as INT;
        // SAFETY: both slots are initialized
        check(
            unsafe { (self.api.ValueNthElementValueSet)(&mut self.data, n, &value.data) },
            "ValueNthElementValueSet",
        )
    }

    /// Store `value` under `key`. An undefined value becomes a map; integer
    /// keys index arrays and other keys on arrays are rejected.
    pub fn set_item(&mut self, key: &Value, value: &Value) -> SciterResult<()> {
        if self.is_sequence() || (self.is_undefined() && key.is_int()) {
            if !key.is_int() {
                return Err(SciterError::IncompatibleType {
                    operation: "value.set_item",
                });
            }
            return self.set(key.as_int()? as isize, value);
        }
        // SAFETY: all slots are initialized
        check(
            unsafe { (self.api.ValueSetValueToKey)(&mut self.data, &key.data, &value.data) },
            "ValueSetValueToKey",
        )
    }

    /// [`set_item`](Self::set_item) with a string key
    pub fn set_key(&mut self, key: &str, value: &Value) -> SciterResult<()> {
        self.set_item(&Value::from(key), value)
    }

    /// Append to an array (or start one)
    pub fn push(&mut self, value: &Value) -> SciterResult<()> {
        let len = if self.is_undefined() { 0 } else { self.len()? };
        self.set(len as isize, value)
    }

    /// Keys of a map, in engine order
    pub fn keys(&self) -> SciterResult<Vec<Value>> {
        let len = self.len()?;
        let mut keys = Vec::with_capacity(len);
        for n in 0..len {
            let mut key = Value::new_in(self.api);
            // SAFETY: both slots are initialized, n < len
            check(
                unsafe { (self.api.ValueNthElementKey)(&self.data, n as INT, &mut key.data) },
                "ValueNthElementKey",
            )?;
            keys.push(key);
        }
        Ok(keys)
    }

    /// Elements of an array or values of a map
    pub fn values(&self) -> SciterResult<Vec<Value>> {
        let len = self.len()?;
        let mut values = Vec::with_capacity(len);
        for n in 0..len {
            let mut value = Value::new_in(self.api);
            // SAFETY: both slots are initialized, n < len
            check(
                unsafe { (self.api.ValueNthElementValue)(&self.data, n as INT, &mut value.data) },
                "ValueNthElementValue",
            )?;
            values.push(value);
        }
        Ok(values)
    }

    /// Key/value pairs; arrays enumerate with integer keys
    pub fn items(&self) -> SciterResult<Vec<(Value, Value)>> {
        let mut sink = PairSink {
            api: self.api,
            pairs: Vec::new(),
        };
        // SAFETY: sink outlives the call and is only touched by collect_pair
        check(
            unsafe {
                (self.api.ValueEnumElements)(
                    &self.data,
                    Some(collect_pair),
                    &mut sink as *mut PairSink as *mut c_void,
                )
            },
            "ValueEnumElements",
        )?;
        Ok(sink.pairs)
    }

    /// Membership: element of an array or key of a map
    pub fn contains(&self, item: &Value) -> SciterResult<bool> {
        if self.is_sequence() {
            return Ok(self.values()?.iter().any(|v| v == item));
        }
        if self.is_mapping() {
            return Ok(self.keys()?.iter().any(|k| k == item));
        }
        Err(SciterError::IncompatibleType {
            operation: "value.contains",
        })
    }

    /// Call a function value
    pub fn call(&self, args: &[Value]) -> SciterResult<Value> {
        self.call_with(None, args, None)
    }

    /// Call a function value with an explicit `this` and a name for
    /// error reports
    pub fn call_with(
        &self,
        this: Option<&Value>,
        args: &[Value],
        name: Option<&str>,
    ) -> SciterResult<Value> {
        // bitwise views: the engine only reads arguments during the call
        let argv: Vec<VALUE> = args.iter().map(|a| a.data).collect();
        let mut this = match this {
            Some(v) => v.clone(),
            None => Value::new_in(self.api),
        };
        let url = name.map(to_wide_nul);
        let mut rv = Value::new_in(self.api);
        trace!(name, argc = argv.len(), "invoking function value");

        // SAFETY: every pointer refers to a live slot or buffer owned here
        let code = unsafe {
            (self.api.ValueInvoke)(
                &self.data,
                &mut this.data,
                argv.len() as UINT,
                argv.as_ptr(),
                &mut rv.data,
                url.as_ref().map_or(ptr::null(), |u| u.as_ptr()),
            )
        };
        raise_from(rv, code, name)
    }

    /// Call with host arguments and convert the result back
    pub fn call_host(&self, args: &[HostValue]) -> SciterResult<HostValue> {
        let args = args
            .iter()
            .map(marshal::to_native)
            .collect::<SciterResult<Vec<_>>>()?;
        marshal::to_host(&self.call(&args)?)
    }

    /// Render as text without modifying this value
    pub fn to_literal(&self, how: Conversion) -> SciterResult<String> {
        let mut copy = self.clone();
        // SAFETY: copy owns an initialized slot
        check(
            unsafe { (self.api.ValueToString)(&mut copy.data, how.raw()) },
            "ValueToString",
        )?;
        copy.as_string()
    }

    /// Convert to a host value
    pub fn to_host(&self) -> SciterResult<HostValue> {
        marshal::to_host(self)
    }

    /// Convert to a JSON document
    pub fn to_json(&self) -> SciterResult<serde_json::Value> {
        self.to_host()?.to_json()
    }

    /// Deserialize into a Rust type through JSON
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> SciterResult<T> {
        Ok(serde_json::from_value(self.to_json()?)?)
    }

    fn subtype_name(&self) -> Option<&'static str> {
        let (t, u) = self.raw_type();
        if u == 0 {
            return None;
        }
        let name = match t {
            T_STRING => match StringKind::from_raw(u)? {
                StringKind::Plain => "string",
                StringKind::Error => "error",
                StringKind::Secure => "secure",
                StringKind::File => "file",
                StringKind::Symbol => "symbol",
            },
            T_OBJECT => match ObjectKind::from_raw(u)? {
                ObjectKind::Array => "array",
                ObjectKind::Object => "object",
                ObjectKind::Class => "class",
                ObjectKind::Native => "native",
                ObjectKind::Function => "function",
                ObjectKind::Error => "error",
            },
            T_LENGTH => match u {
                UT_EM => "em",
                UT_EX => "ex",
                UT_PR => "pr",
                UT_SP => "sp",
                UT_PX => "px",
                UT_IN => "in",
                UT_CM => "cm",
                UT_MM => "mm",
                UT_PT => "pt",
                UT_PC => "pc",
                UT_DIP => "dip",
                UT_URL => "url",
                _ => return None,
            },
            T_DATE if u & DT_UTC != 0 => "utc",
            _ => return None,
        };
        Some(name)
    }
}

/// Map an invocation result to the bindings' error model: an error string
/// with a failure code is a script error, an error string alone is a
/// script exception.
fn raise_from(rv: Value, code: VALUE_RESULT, name: Option<&str>) -> SciterResult<Value> {
    if rv.is_error_string() {
        let message = rv.as_string()?;
        let script = name.map(str::to_owned);
        return Err(if code > HV_OK {
            SciterError::script_error(message, script)
        } else {
            SciterError::script_exception(message, script)
        });
    }
    check(code, "ValueInvoke")?;
    Ok(rv)
}

struct PairSink {
    api: &'static ValueApi,
    pairs: Vec<(Value, Value)>,
}

unsafe extern "C" fn collect_pair(param: LPVOID, pkey: *const VALUE, pval: *const VALUE) -> BOOL {
    // SAFETY: param is the PairSink passed by Value::items
    let sink = unsafe { &mut *(param as *mut PairSink) };
    let mut key = Value::new_in(sink.api);
    let mut value = Value::new_in(sink.api);
    // SAFETY: the engine passes live key and value slots
    let copied = unsafe {
        (sink.api.ValueCopy)(&mut key.data, pkey) == HV_OK
            && (sink.api.ValueCopy)(&mut value.data, pval) == HV_OK
    };
    if !copied {
        return 0;
    }
    sink.pairs.push((key, value));
    1
}

impl Default for Value {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        // SAFETY: self.data is initialized and owned by us
        unsafe { (self.api.ValueClear)(&mut self.data) };
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        let mut rv = Value::new_in(self.api);
        if let Err(err) = rv.assign(self) {
            error!(%err, "failed to copy value");
        }
        rv
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        // SAFETY: both slots are initialized
        unsafe { (self.api.ValueCompare)(&self.data, &other.data) == HV_OK_TRUE }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_literal(Conversion::JsonLiteral) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("<?>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.value_type();
        if matches!(t, ValueType::Undefined | ValueType::Null) {
            return write!(f, "<{}>", t.name());
        }
        match self.subtype_name() {
            Some(sub) => write!(f, "<{}:{}: {}>", t.name(), sub, self),
            None => write!(f, "<{}: {}>", t.name(), self),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::build(|rv| rv.set_bool(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::build(|rv| rv.set_int(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::build(|rv| rv.set_float(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::build(|rv| rv.set_string(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::from(v.as_str())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::build(|rv| rv.set_bytes(v))
    }
}

impl TryFrom<&HostValue> for Value {
    type Error = SciterError;

    fn try_from(value: &HostValue) -> SciterResult<Self> {
        marshal::to_native(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_value_layout() {
        let v = Value::from(7);
        assert_eq!(v.raw().t, T_INT);
        assert_eq!(v.raw().u, 0);
        assert_eq!(v.raw().d, 7);
        assert_eq!(v.as_int().unwrap(), 7);
        assert_eq!(format!("{v:?}"), "<int: 7>");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut v = Value::from("text");
        v.clear();
        assert!(v.is_undefined());
        v.clear();
        assert!(v.is_undefined());
    }

    #[test]
    fn test_special_strings() {
        let sym = Value::symbol("name");
        assert!(sym.is_string() && sym.is_symbol());
        assert_eq!(sym.as_string().unwrap(), "name");
        assert_eq!(format!("{sym:?}"), r#"<string:symbol: "name">"#);

        let secret = Value::secure_string("hunter2");
        assert!(secret.is_secure_string());
        assert!(!secret.is_error_string());

        let err = Value::error_string("boom");
        assert!(err.is_error_string());
    }

    #[test]
    fn test_null_and_undefined() {
        let null = Value::null();
        assert!(null.is_null());
        assert_eq!(null.to_string(), "null");
        assert_eq!(format!("{null:?}"), "<null>");
        assert_eq!(format!("{:?}", Value::new()), "<undefined>");
        assert!(!null.is_truthy());
    }

    #[test]
    fn test_getter_type_mismatch() {
        let v = Value::from("7");
        assert!(matches!(
            v.as_int(),
            Err(SciterError::IncompatibleType { .. })
        ));
        assert!(matches!(
            Value::from(1).as_bool(),
            Err(SciterError::IncompatibleType { .. })
        ));
        assert!(matches!(
            Value::from(1).len(),
            Err(SciterError::IncompatibleType { .. })
        ));
    }

    #[test]
    fn test_parse_and_literal() {
        let v = Value::parse("[1, 2.5, \"x\"]").unwrap();
        assert!(v.is_array());
        assert_eq!(v.len().unwrap(), 3);
        assert_eq!(v.get(-1).unwrap().as_string().unwrap(), "x");
        assert_eq!(v.to_string(), "[1, 2.5, \"x\"]");
        // rendering leaves the original alone
        assert!(v.is_array());

        assert!(matches!(
            Value::parse("{nope"),
            Err(SciterError::BadParameter {
                operation: "value.parse"
            })
        ));
        assert!(Value::parse("").unwrap().is_undefined());
    }

    #[test]
    fn test_typed_scalars() {
        let len = Value::length(10.0, LengthUnit::Px);
        assert_eq!(len.value_type(), ValueType::Length);
        assert_eq!(len.as_float().unwrap(), 10.0);
        assert_eq!(format!("{len:?}"), "<length:px: 10.0px>");

        assert_eq!(Value::currency(12_5000).as_int64().unwrap(), 12_5000);
        assert_eq!(Value::duration(1.5).as_float().unwrap(), 1.5);
        assert_eq!(Value::color(0xff00_00ff).value_type(), ValueType::Color);
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::from(true).is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::map().is_truthy());
        assert!(Value::parse("[0]").unwrap().is_truthy());
    }

    #[test]
    fn test_clone_and_equality() {
        let a = Value::parse(r#"{"a": 1, "b": [true]}"#).unwrap();
        let mut b = a.clone();
        assert_eq!(a, b);
        b.set_key("c", &Value::from(3)).unwrap();
        assert_ne!(a, b);
        assert!(matches!(a.get_key("c"), Err(SciterError::KeyNotFound(_))));
    }
}
