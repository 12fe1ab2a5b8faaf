//! Raw FFI declarations for the Sciter value ABI
//!
//! This crate provides the low-level `#[repr(C)]` layout of the engine's
//! tagged value, its type/unit constants, the callback signatures and the
//! value function table. Use the safe wrappers in `sciter-core` for
//! higher-level access.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(non_snake_case)]

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uint};

pub type UINT = c_uint;
pub type INT = c_int;
pub type INT64 = i64;
pub type BOOL = c_int;
pub type FLOAT_VALUE = f64;
pub type LPVOID = *mut c_void;
pub type LPCWSTR = *const u16;
pub type LPCBYTE = *const u8;
pub type LPCSTR = *const c_char;
pub type HELEMENT = *mut c_void;

/// The engine's tagged value.
///
/// `t` is the value type, `u` the per-type unit/subtype and `d` either an
/// inline scalar or an opaque handle owned by the engine. The layout is
/// dictated by the engine and must not change.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct VALUE {
    pub t: UINT,
    pub u: UINT,
    pub d: u64,
}

const _: () = assert!(std::mem::size_of::<VALUE>() == 16);

// Value function results
pub type VALUE_RESULT = c_int;
pub const HV_OK_TRUE: VALUE_RESULT = -1;
pub const HV_OK: VALUE_RESULT = 0;
pub const HV_BAD_PARAMETER: VALUE_RESULT = 1;
pub const HV_INCOMPATIBLE_TYPE: VALUE_RESULT = 2;

// Value types
pub type VALUE_TYPE = UINT;
pub const T_UNDEFINED: VALUE_TYPE = 0;
pub const T_NULL: VALUE_TYPE = 1;
pub const T_BOOL: VALUE_TYPE = 2;
pub const T_INT: VALUE_TYPE = 3;
pub const T_FLOAT: VALUE_TYPE = 4;
pub const T_STRING: VALUE_TYPE = 5;
/// 100ns intervals since 1601-01-01 UTC (FILETIME)
pub const T_DATE: VALUE_TYPE = 6;
/// 14.4 fixed point number
pub const T_CURRENCY: VALUE_TYPE = 7;
/// int or float with a `UT_*` length unit
pub const T_LENGTH: VALUE_TYPE = 8;
pub const T_ARRAY: VALUE_TYPE = 9;
pub const T_MAP: VALUE_TYPE = 10;
pub const T_FUNCTION: VALUE_TYPE = 11;
pub const T_BYTES: VALUE_TYPE = 12;
/// Scripting object proxy
pub const T_OBJECT: VALUE_TYPE = 13;
pub const T_DOM_OBJECT: VALUE_TYPE = 14;
pub const T_RESOURCE: VALUE_TYPE = 15;
/// Integer range N..M
pub const T_RANGE: VALUE_TYPE = 16;
/// Seconds, stored as float
pub const T_DURATION: VALUE_TYPE = 17;
/// Radians, stored as float
pub const T_ANGLE: VALUE_TYPE = 18;
/// 0xAABBGGRR
pub const T_COLOR: VALUE_TYPE = 19;

// T_LENGTH units
pub type VALUE_UNIT_TYPE = UINT;
pub const UT_NONE: VALUE_UNIT_TYPE = 0;
pub const UT_EM: VALUE_UNIT_TYPE = 1;
pub const UT_EX: VALUE_UNIT_TYPE = 2;
pub const UT_PR: VALUE_UNIT_TYPE = 3;
pub const UT_SP: VALUE_UNIT_TYPE = 4;
pub const UT_PX: VALUE_UNIT_TYPE = 7;
pub const UT_IN: VALUE_UNIT_TYPE = 8;
pub const UT_CM: VALUE_UNIT_TYPE = 9;
pub const UT_MM: VALUE_UNIT_TYPE = 10;
pub const UT_PT: VALUE_UNIT_TYPE = 11;
pub const UT_PC: VALUE_UNIT_TYPE = 12;
pub const UT_DIP: VALUE_UNIT_TYPE = 13;
pub const UT_URL: VALUE_UNIT_TYPE = 22;

// T_DATE flags
pub type VALUE_UNIT_TYPE_DATE = UINT;
pub const DT_HAS_DATE: VALUE_UNIT_TYPE_DATE = 0x01;
pub const DT_HAS_TIME: VALUE_UNIT_TYPE_DATE = 0x02;
pub const DT_HAS_SECONDS: VALUE_UNIT_TYPE_DATE = 0x04;
pub const DT_UTC: VALUE_UNIT_TYPE_DATE = 0x10;

// T_OBJECT subtypes
pub type VALUE_UNIT_TYPE_OBJECT = UINT;
pub const UT_OBJECT_ARRAY: VALUE_UNIT_TYPE_OBJECT = 0;
pub const UT_OBJECT_OBJECT: VALUE_UNIT_TYPE_OBJECT = 1;
pub const UT_OBJECT_CLASS: VALUE_UNIT_TYPE_OBJECT = 2;
pub const UT_OBJECT_NATIVE: VALUE_UNIT_TYPE_OBJECT = 3;
pub const UT_OBJECT_FUNCTION: VALUE_UNIT_TYPE_OBJECT = 4;
pub const UT_OBJECT_ERROR: VALUE_UNIT_TYPE_OBJECT = 5;

// T_STRING subtypes
pub type VALUE_UNIT_TYPE_STRING = UINT;
pub const UT_STRING_STRING: VALUE_UNIT_TYPE_STRING = 0;
pub const UT_STRING_ERROR: VALUE_UNIT_TYPE_STRING = 1;
pub const UT_STRING_SECURE: VALUE_UNIT_TYPE_STRING = 2;
pub const UT_STRING_FILE: VALUE_UNIT_TYPE_STRING = 0xfffe;
pub const UT_STRING_SYMBOL: VALUE_UNIT_TYPE_STRING = 0xffff;

// ValueToString / ValueFromString conversion modes
pub type VALUE_STRING_CVT_TYPE = UINT;
pub const CVT_SIMPLE: VALUE_STRING_CVT_TYPE = 0;
pub const CVT_JSON_LITERAL: VALUE_STRING_CVT_TYPE = 1;
pub const CVT_JSON_MAP: VALUE_STRING_CVT_TYPE = 2;
pub const CVT_XJSON_LITERAL: VALUE_STRING_CVT_TYPE = 3;

// Event groups relevant to script calls
pub type EVENT_GROUPS = UINT;
pub const HANDLE_INITIALIZATION: EVENT_GROUPS = 0x0000;
pub const HANDLE_BEHAVIOR_EVENT: EVENT_GROUPS = 0x0100;
pub const HANDLE_METHOD_CALL: EVENT_GROUPS = 0x0200;
pub const HANDLE_SCRIPTING_METHOD_CALL: EVENT_GROUPS = 0x0400;
pub const HANDLE_ALL: EVENT_GROUPS = 0xFFFF;
pub const SUBSCRIPTIONS_REQUEST: EVENT_GROUPS = 0xFFFF_FFFF;

/// One inbound call from the engine's script into the host.
#[repr(C)]
#[derive(Debug)]
pub struct SCRIPTING_METHOD_PARAMS {
    pub name: LPCSTR,
    pub argv: *mut VALUE,
    pub argc: UINT,
    pub result: VALUE,
}

// Callback types
pub type NATIVE_FUNCTOR_INVOKE =
    unsafe extern "C" fn(tag: LPVOID, argc: UINT, argv: *const VALUE, retval: *mut VALUE);
pub type NATIVE_FUNCTOR_RELEASE = unsafe extern "C" fn(tag: LPVOID);
pub type KeyValueCallback =
    unsafe extern "C" fn(param: LPVOID, pkey: *const VALUE, pval: *const VALUE) -> BOOL;
pub type ElementEventProc =
    unsafe extern "C" fn(tag: LPVOID, he: HELEMENT, evtg: UINT, prms: LPVOID) -> BOOL;

/// Signature of the entry point a shared library exports to hand out its
/// value function table.
pub type ValueApiEntry = unsafe extern "C" fn() -> *const ValueApi;

/// The value function table supplied by the engine.
///
/// Field order is part of the ABI.
#[repr(C)]
pub struct ValueApi {
    pub ValueInit: unsafe extern "C" fn(pval: *mut VALUE) -> VALUE_RESULT,
    pub ValueClear: unsafe extern "C" fn(pval: *mut VALUE) -> VALUE_RESULT,
    pub ValueCompare: unsafe extern "C" fn(pval1: *const VALUE, pval2: *const VALUE) -> VALUE_RESULT,
    pub ValueCopy: unsafe extern "C" fn(pdst: *mut VALUE, psrc: *const VALUE) -> VALUE_RESULT,
    pub ValueIsolate: unsafe extern "C" fn(pdst: *mut VALUE) -> VALUE_RESULT,
    pub ValueType:
        unsafe extern "C" fn(pval: *const VALUE, ptype: *mut UINT, punits: *mut UINT) -> VALUE_RESULT,
    pub ValueStringData:
        unsafe extern "C" fn(pval: *const VALUE, pchars: *mut LPCWSTR, pnum: *mut UINT) -> VALUE_RESULT,
    pub ValueStringDataSet:
        unsafe extern "C" fn(pval: *mut VALUE, chars: LPCWSTR, num: UINT, units: UINT) -> VALUE_RESULT,
    pub ValueIntData: unsafe extern "C" fn(pval: *const VALUE, pdata: *mut INT) -> VALUE_RESULT,
    pub ValueIntDataSet:
        unsafe extern "C" fn(pval: *mut VALUE, data: INT, type_: UINT, units: UINT) -> VALUE_RESULT,
    pub ValueInt64Data: unsafe extern "C" fn(pval: *const VALUE, pdata: *mut INT64) -> VALUE_RESULT,
    pub ValueInt64DataSet:
        unsafe extern "C" fn(pval: *mut VALUE, data: INT64, type_: UINT, units: UINT) -> VALUE_RESULT,
    pub ValueFloatData:
        unsafe extern "C" fn(pval: *const VALUE, pdata: *mut FLOAT_VALUE) -> VALUE_RESULT,
    pub ValueFloatDataSet: unsafe extern "C" fn(
        pval: *mut VALUE,
        data: FLOAT_VALUE,
        type_: UINT,
        units: UINT,
    ) -> VALUE_RESULT,
    pub ValueBinaryData:
        unsafe extern "C" fn(pval: *const VALUE, pbytes: *mut LPCBYTE, pnum: *mut UINT) -> VALUE_RESULT,
    pub ValueBinaryDataSet: unsafe extern "C" fn(
        pval: *mut VALUE,
        pbytes: LPCBYTE,
        num: UINT,
        type_: UINT,
        units: UINT,
    ) -> VALUE_RESULT,
    pub ValueElementsCount: unsafe extern "C" fn(pval: *const VALUE, pn: *mut INT) -> VALUE_RESULT,
    pub ValueNthElementValue:
        unsafe extern "C" fn(pval: *const VALUE, n: INT, pretval: *mut VALUE) -> VALUE_RESULT,
    pub ValueNthElementValueSet:
        unsafe extern "C" fn(pval: *mut VALUE, n: INT, pval_to_set: *const VALUE) -> VALUE_RESULT,
    pub ValueNthElementKey:
        unsafe extern "C" fn(pval: *const VALUE, n: INT, pretval: *mut VALUE) -> VALUE_RESULT,
    pub ValueEnumElements: unsafe extern "C" fn(
        pval: *const VALUE,
        penum: Option<KeyValueCallback>,
        param: LPVOID,
    ) -> VALUE_RESULT,
    pub ValueSetValueToKey: unsafe extern "C" fn(
        pval: *mut VALUE,
        pkey: *const VALUE,
        pval_to_set: *const VALUE,
    ) -> VALUE_RESULT,
    pub ValueGetValueOfKey: unsafe extern "C" fn(
        pval: *const VALUE,
        pkey: *const VALUE,
        pretval: *mut VALUE,
    ) -> VALUE_RESULT,
    pub ValueToString: unsafe extern "C" fn(pval: *mut VALUE, how: UINT) -> VALUE_RESULT,
    pub ValueFromString:
        unsafe extern "C" fn(pval: *mut VALUE, str: LPCWSTR, str_length: UINT, how: UINT) -> UINT,
    pub ValueInvoke: unsafe extern "C" fn(
        pval: *const VALUE,
        pthis: *mut VALUE,
        argc: UINT,
        argv: *const VALUE,
        pretval: *mut VALUE,
        url: LPCWSTR,
    ) -> VALUE_RESULT,
    pub ValueNativeFunctorSet: unsafe extern "C" fn(
        pval: *mut VALUE,
        pinvoke: Option<NATIVE_FUNCTOR_INVOKE>,
        prelease: Option<NATIVE_FUNCTOR_RELEASE>,
        tag: LPVOID,
    ) -> VALUE_RESULT,
    pub ValueIsNativeFunctor: unsafe extern "C" fn(pval: *const VALUE) -> BOOL,
}

impl std::fmt::Debug for ValueApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ValueApi({:p})", self)
    }
}
