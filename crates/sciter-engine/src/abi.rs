//! C ABI functions backing the value function table.
//!
//! Every entry validates its pointers, returns `HV_BAD_PARAMETER` for null
//! inputs and `HV_INCOMPATIBLE_TYPE` when the operation does not apply to the
//! value's type. Failed calls leave their output untouched.

// Allow unsafe operations in unsafe functions (Rust 2024 compatibility)
#![allow(unsafe_op_in_unsafe_fn)]

use crate::literal;
use crate::slot::{Functor, ObjectBody, Pairs, ScriptFailure, Slot};
use sciter_sys::*;
use std::ptr;
use std::slice;

pub(crate) static API: ValueApi = ValueApi {
    ValueInit: value_init,
    ValueClear: value_clear,
    ValueCompare: value_compare,
    ValueCopy: value_copy,
    ValueIsolate: value_isolate,
    ValueType: value_type,
    ValueStringData: value_string_data,
    ValueStringDataSet: value_string_data_set,
    ValueIntData: value_int_data,
    ValueIntDataSet: value_int_data_set,
    ValueInt64Data: value_int64_data,
    ValueInt64DataSet: value_int64_data_set,
    ValueFloatData: value_float_data,
    ValueFloatDataSet: value_float_data_set,
    ValueBinaryData: value_binary_data,
    ValueBinaryDataSet: value_binary_data_set,
    ValueElementsCount: value_elements_count,
    ValueNthElementValue: value_nth_element_value,
    ValueNthElementValueSet: value_nth_element_value_set,
    ValueNthElementKey: value_nth_element_key,
    ValueEnumElements: value_enum_elements,
    ValueSetValueToKey: value_set_value_to_key,
    ValueGetValueOfKey: value_get_value_of_key,
    ValueToString: value_to_string,
    ValueFromString: value_from_string,
    ValueInvoke: value_invoke,
    ValueNativeFunctorSet: value_native_functor_set,
    ValueIsNativeFunctor: value_is_native_functor,
};

/// Replace the value at `dst`, releasing what it held before.
pub(crate) unsafe fn assign(dst: *mut VALUE, slot: Slot) -> VALUE_RESULT {
    match Slot::from_mut_ptr(dst) {
        Some(target) => {
            *target = slot;
            HV_OK
        }
        None => HV_BAD_PARAMETER,
    }
}

enum Elements<'a> {
    Items(&'a [Slot]),
    Pairs(&'a [(Slot, Slot)]),
}

impl Elements<'_> {
    fn len(&self) -> usize {
        match self {
            Self::Items(items) => items.len(),
            Self::Pairs(pairs) => pairs.len(),
        }
    }

    fn nth_value(&self, n: usize) -> Option<Slot> {
        match self {
            Self::Items(items) => items.get(n).cloned(),
            Self::Pairs(pairs) => pairs.get(n).map(|(_, v)| v.clone()),
        }
    }

    fn snapshot(&self) -> Vec<(Slot, Slot)> {
        match self {
            Self::Items(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Slot::int(T_INT, 0, i as i32), v.clone()))
                .collect(),
            Self::Pairs(pairs) => pairs.to_vec(),
        }
    }
}

enum ElementsMut<'a> {
    Items(&'a mut Vec<Slot>),
    Pairs(&'a mut Pairs),
}

fn read_elements<R>(slot: &Slot, f: impl FnOnce(Elements<'_>) -> R) -> Option<R> {
    match slot.vt() {
        T_ARRAY => slot.items().map(|items| f(Elements::Items(items))),
        T_MAP => slot.pairs().map(|pairs| f(Elements::Pairs(pairs))),
        T_FUNCTION => Some(f(Elements::Items(&[]))),
        T_OBJECT => {
            let object = slot.object_ref()?;
            let body = object.body.lock();
            let result = match &*body {
                ObjectBody::Array(items) => f(Elements::Items(items)),
                ObjectBody::Map(pairs) => f(Elements::Pairs(pairs)),
                ObjectBody::Function(_) => f(Elements::Items(&[])),
            };
            Some(result)
        }
        _ => None,
    }
}

fn write_elements<R>(slot: &mut Slot, f: impl FnOnce(ElementsMut<'_>) -> R) -> Option<R> {
    match slot.vt() {
        T_ARRAY => slot.items_mut(|items| f(ElementsMut::Items(items))),
        T_MAP => slot.pairs_mut(|pairs| f(ElementsMut::Pairs(pairs))),
        T_OBJECT => {
            let object = slot.object_ref()?;
            let mut body = object.body.lock();
            match &mut *body {
                ObjectBody::Array(items) => Some(f(ElementsMut::Items(items))),
                ObjectBody::Map(pairs) => Some(f(ElementsMut::Pairs(pairs))),
                ObjectBody::Function(_) => None,
            }
        }
        _ => None,
    }
}

fn put(pairs: &mut Pairs, key: Slot, value: Slot) {
    match pairs.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => pairs.push((key, value)),
    }
}

/// Deep copy with live objects turned into plain arrays and maps.
/// A cycle back into an object being copied becomes `null`.
pub(crate) fn isolate(slot: &Slot, seen: &mut Vec<usize>) -> Slot {
    match slot.vt() {
        T_ARRAY => Slot::array(
            slot.items()
                .into_iter()
                .flatten()
                .map(|item| isolate(item, seen))
                .collect(),
        ),
        T_MAP => Slot::map(
            slot.pairs()
                .into_iter()
                .flatten()
                .map(|(k, v)| (isolate(k, seen), isolate(v, seen)))
                .collect(),
        ),
        T_OBJECT => {
            let Some(object) = slot.object_ref() else {
                return Slot::undefined();
            };
            let id = object as *const _ as usize;
            if seen.contains(&id) {
                return Slot::scalar(T_NULL, 0, 0);
            }
            seen.push(id);
            let body = object.body.lock();
            let copy = match &*body {
                ObjectBody::Array(items) => {
                    Slot::array(items.iter().map(|item| isolate(item, seen)).collect())
                }
                ObjectBody::Map(pairs) => Slot::map(
                    pairs
                        .iter()
                        .map(|(k, v)| (isolate(k, seen), isolate(v, seen)))
                        .collect(),
                ),
                ObjectBody::Function(_) => slot.clone(),
            };
            drop(body);
            seen.pop();
            copy
        }
        _ => slot.clone(),
    }
}

unsafe extern "C" fn value_init(pval: *mut VALUE) -> VALUE_RESULT {
    if pval.is_null() {
        return HV_BAD_PARAMETER;
    }
    // uninitialized memory: write without dropping
    ptr::write(pval, VALUE::default());
    HV_OK
}

unsafe extern "C" fn value_clear(pval: *mut VALUE) -> VALUE_RESULT {
    assign(pval, Slot::undefined())
}

unsafe extern "C" fn value_compare(pval1: *const VALUE, pval2: *const VALUE) -> VALUE_RESULT {
    match (Slot::from_ptr(pval1), Slot::from_ptr(pval2)) {
        (Some(a), Some(b)) if a == b => HV_OK_TRUE,
        (Some(_), Some(_)) => HV_OK,
        _ => HV_BAD_PARAMETER,
    }
}

unsafe extern "C" fn value_copy(pdst: *mut VALUE, psrc: *const VALUE) -> VALUE_RESULT {
    let Some(src) = Slot::from_ptr(psrc) else {
        return HV_BAD_PARAMETER;
    };
    if ptr::eq(pdst, psrc) {
        return HV_OK;
    }
    let copy = src.clone();
    assign(pdst, copy)
}

unsafe extern "C" fn value_isolate(pdst: *mut VALUE) -> VALUE_RESULT {
    let Some(slot) = Slot::from_ptr(pdst) else {
        return HV_BAD_PARAMETER;
    };
    let isolated = isolate(slot, &mut Vec::new());
    assign(pdst, isolated)
}

unsafe extern "C" fn value_type(
    pval: *const VALUE,
    ptype: *mut UINT,
    punits: *mut UINT,
) -> VALUE_RESULT {
    let Some(slot) = Slot::from_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    if !ptype.is_null() {
        *ptype = slot.vt();
    }
    if !punits.is_null() {
        *punits = slot.units();
    }
    HV_OK
}

unsafe extern "C" fn value_string_data(
    pval: *const VALUE,
    pchars: *mut LPCWSTR,
    pnum: *mut UINT,
) -> VALUE_RESULT {
    let Some(slot) = Slot::from_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    let Some(text) = slot.text_ref() else {
        return HV_INCOMPATIBLE_TYPE;
    };
    if !pchars.is_null() {
        *pchars = text.as_ptr();
    }
    if !pnum.is_null() {
        *pnum = (text.len() - 1) as UINT;
    }
    HV_OK
}

unsafe extern "C" fn value_string_data_set(
    pval: *mut VALUE,
    chars: LPCWSTR,
    num: UINT,
    units: UINT,
) -> VALUE_RESULT {
    let text: &[u16] = if num == 0 {
        &[]
    } else if chars.is_null() {
        return HV_BAD_PARAMETER;
    } else {
        slice::from_raw_parts(chars, num as usize)
    };
    let slot = Slot::text(units, text);
    assign(pval, slot)
}

unsafe extern "C" fn value_int_data(pval: *const VALUE, pdata: *mut INT) -> VALUE_RESULT {
    let Some(slot) = Slot::from_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    if pdata.is_null() {
        return HV_BAD_PARAMETER;
    }
    *pdata = match slot.vt() {
        T_INT | T_BOOL | T_COLOR => slot.as_int(),
        T_LENGTH => slot.as_f64() as i32,
        _ => return HV_INCOMPATIBLE_TYPE,
    };
    HV_OK
}

unsafe extern "C" fn value_int_data_set(
    pval: *mut VALUE,
    data: INT,
    type_: UINT,
    units: UINT,
) -> VALUE_RESULT {
    let slot = match type_ {
        T_UNDEFINED | T_NULL => Slot::scalar(type_, 0, 0),
        T_BOOL => Slot::bool(data != 0),
        T_INT | T_COLOR => Slot::int(type_, units, data),
        T_FLOAT | T_LENGTH | T_DURATION | T_ANGLE => Slot::float(type_, units, data as f64),
        T_DATE | T_CURRENCY => Slot::scalar(type_, units, data as i64 as u64),
        // explicit container creation: `data` is the array length
        T_ARRAY if data >= 0 => Slot::array(vec![Slot::undefined(); data as usize]),
        T_ARRAY => return HV_BAD_PARAMETER,
        T_MAP => Slot::map(Vec::new()),
        _ => return HV_INCOMPATIBLE_TYPE,
    };
    assign(pval, slot)
}

unsafe extern "C" fn value_int64_data(pval: *const VALUE, pdata: *mut INT64) -> VALUE_RESULT {
    let Some(slot) = Slot::from_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    if pdata.is_null() {
        return HV_BAD_PARAMETER;
    }
    *pdata = match slot.vt() {
        T_INT | T_BOOL | T_COLOR => slot.as_int() as i64,
        T_DATE | T_CURRENCY | T_RANGE => slot.as_i64(),
        _ => return HV_INCOMPATIBLE_TYPE,
    };
    HV_OK
}

unsafe extern "C" fn value_int64_data_set(
    pval: *mut VALUE,
    data: INT64,
    type_: UINT,
    units: UINT,
) -> VALUE_RESULT {
    let slot = match type_ {
        T_DATE | T_CURRENCY | T_RANGE => Slot::scalar(type_, units, data as u64),
        T_INT => match i32::try_from(data) {
            Ok(v) => Slot::int(T_INT, 0, v),
            Err(_) => return HV_BAD_PARAMETER,
        },
        _ => return HV_INCOMPATIBLE_TYPE,
    };
    assign(pval, slot)
}

unsafe extern "C" fn value_float_data(pval: *const VALUE, pdata: *mut FLOAT_VALUE) -> VALUE_RESULT {
    let Some(slot) = Slot::from_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    if pdata.is_null() {
        return HV_BAD_PARAMETER;
    }
    match slot.vt() {
        T_FLOAT | T_LENGTH | T_DURATION | T_ANGLE => {
            *pdata = slot.as_f64();
            HV_OK
        }
        _ => HV_INCOMPATIBLE_TYPE,
    }
}

unsafe extern "C" fn value_float_data_set(
    pval: *mut VALUE,
    data: FLOAT_VALUE,
    type_: UINT,
    units: UINT,
) -> VALUE_RESULT {
    match type_ {
        T_FLOAT | T_LENGTH | T_DURATION | T_ANGLE => assign(pval, Slot::float(type_, units, data)),
        _ => HV_INCOMPATIBLE_TYPE,
    }
}

unsafe extern "C" fn value_binary_data(
    pval: *const VALUE,
    pbytes: *mut LPCBYTE,
    pnum: *mut UINT,
) -> VALUE_RESULT {
    let Some(slot) = Slot::from_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    let Some(bytes) = slot.bytes_ref() else {
        return HV_INCOMPATIBLE_TYPE;
    };
    if !pbytes.is_null() {
        *pbytes = bytes.as_ptr();
    }
    if !pnum.is_null() {
        *pnum = bytes.len() as UINT;
    }
    HV_OK
}

unsafe extern "C" fn value_binary_data_set(
    pval: *mut VALUE,
    pbytes: LPCBYTE,
    num: UINT,
    type_: UINT,
    _units: UINT,
) -> VALUE_RESULT {
    if type_ != T_BYTES {
        return HV_INCOMPATIBLE_TYPE;
    }
    let bytes: &[u8] = if num == 0 {
        &[]
    } else if pbytes.is_null() {
        return HV_BAD_PARAMETER;
    } else {
        slice::from_raw_parts(pbytes, num as usize)
    };
    assign(pval, Slot::bytes(bytes))
}

unsafe extern "C" fn value_elements_count(pval: *const VALUE, pn: *mut INT) -> VALUE_RESULT {
    let Some(slot) = Slot::from_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    if pn.is_null() {
        return HV_BAD_PARAMETER;
    }
    match read_elements(slot, |elements| elements.len()) {
        Some(len) => {
            *pn = len as INT;
            HV_OK
        }
        None => HV_INCOMPATIBLE_TYPE,
    }
}

unsafe extern "C" fn value_nth_element_value(
    pval: *const VALUE,
    n: INT,
    pretval: *mut VALUE,
) -> VALUE_RESULT {
    let Some(slot) = Slot::from_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    if n < 0 {
        return HV_BAD_PARAMETER;
    }
    match read_elements(slot, |elements| elements.nth_value(n as usize)) {
        Some(Some(value)) => assign(pretval, value),
        Some(None) => HV_BAD_PARAMETER,
        None => HV_INCOMPATIBLE_TYPE,
    }
}

unsafe extern "C" fn value_nth_element_value_set(
    pval: *mut VALUE,
    n: INT,
    pval_to_set: *const VALUE,
) -> VALUE_RESULT {
    // clone first: the source may live inside the container being modified
    let Some(value) = Slot::from_ptr(pval_to_set).cloned() else {
        return HV_BAD_PARAMETER;
    };
    let Some(slot) = Slot::from_mut_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    if n < 0 {
        return HV_BAD_PARAMETER;
    }
    if slot.vt() == T_UNDEFINED {
        *slot = Slot::array(Vec::new());
    }
    let n = n as usize;
    let outcome = write_elements(slot, |elements| match elements {
        ElementsMut::Items(items) => {
            if n >= items.len() {
                items.resize(n + 1, Slot::undefined());
            }
            items[n] = value;
            HV_OK
        }
        ElementsMut::Pairs(pairs) => match pairs.get_mut(n) {
            Some(entry) => {
                entry.1 = value;
                HV_OK
            }
            None => HV_BAD_PARAMETER,
        },
    });
    outcome.unwrap_or(HV_INCOMPATIBLE_TYPE)
}

unsafe extern "C" fn value_nth_element_key(
    pval: *const VALUE,
    n: INT,
    pretval: *mut VALUE,
) -> VALUE_RESULT {
    let Some(slot) = Slot::from_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    if n < 0 {
        return HV_BAD_PARAMETER;
    }
    let key = read_elements(slot, |elements| match elements {
        Elements::Pairs(pairs) => pairs.get(n as usize).map(|(k, _)| k.clone()).ok_or(HV_BAD_PARAMETER),
        Elements::Items(_) => Err(HV_INCOMPATIBLE_TYPE),
    });
    match key {
        Some(Ok(key)) => assign(pretval, key),
        Some(Err(code)) => code,
        None => HV_INCOMPATIBLE_TYPE,
    }
}

unsafe extern "C" fn value_enum_elements(
    pval: *const VALUE,
    penum: Option<KeyValueCallback>,
    param: LPVOID,
) -> VALUE_RESULT {
    let (Some(slot), Some(callback)) = (Slot::from_ptr(pval), penum) else {
        return HV_BAD_PARAMETER;
    };
    // snapshot so callbacks never run under an object lock
    let Some(entries) = read_elements(slot, |elements| elements.snapshot()) else {
        return HV_INCOMPATIBLE_TYPE;
    };
    for (key, value) in &entries {
        if callback(param, &key.0, &value.0) == 0 {
            break;
        }
    }
    HV_OK
}

unsafe extern "C" fn value_set_value_to_key(
    pval: *mut VALUE,
    pkey: *const VALUE,
    pval_to_set: *const VALUE,
) -> VALUE_RESULT {
    let (Some(key), Some(value)) = (
        Slot::from_ptr(pkey).cloned(),
        Slot::from_ptr(pval_to_set).cloned(),
    ) else {
        return HV_BAD_PARAMETER;
    };
    let Some(slot) = Slot::from_mut_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    if slot.vt() == T_UNDEFINED {
        *slot = Slot::map(Vec::new());
    }
    let outcome = write_elements(slot, |elements| match elements {
        ElementsMut::Pairs(pairs) => {
            put(pairs, key, value);
            HV_OK
        }
        ElementsMut::Items(_) => HV_INCOMPATIBLE_TYPE,
    });
    outcome.unwrap_or(HV_INCOMPATIBLE_TYPE)
}

unsafe extern "C" fn value_get_value_of_key(
    pval: *const VALUE,
    pkey: *const VALUE,
    pretval: *mut VALUE,
) -> VALUE_RESULT {
    let (Some(slot), Some(key)) = (Slot::from_ptr(pval), Slot::from_ptr(pkey)) else {
        return HV_BAD_PARAMETER;
    };
    let found = read_elements(slot, |elements| match elements {
        Elements::Pairs(pairs) => Ok(pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(Slot::undefined)),
        Elements::Items(_) => Err(HV_INCOMPATIBLE_TYPE),
    });
    match found {
        Some(Ok(value)) => assign(pretval, value),
        Some(Err(code)) => code,
        None => HV_INCOMPATIBLE_TYPE,
    }
}

unsafe extern "C" fn value_to_string(pval: *mut VALUE, how: UINT) -> VALUE_RESULT {
    let Some(slot) = Slot::from_mut_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    if how == CVT_SIMPLE && slot.vt() == T_STRING {
        return HV_OK;
    }
    let text = literal::emit(slot, how);
    *slot = Slot::string(UT_STRING_STRING, &text);
    HV_OK
}

unsafe extern "C" fn value_from_string(
    pval: *mut VALUE,
    str: LPCWSTR,
    str_length: UINT,
    how: UINT,
) -> UINT {
    let chars: &[u16] = if str_length == 0 {
        &[]
    } else if str.is_null() {
        return str_length;
    } else {
        slice::from_raw_parts(str, str_length as usize)
    };
    let text = String::from_utf16_lossy(chars);
    let Some(slot) = literal::parse(&text, how) else {
        return str_length.max(1);
    };
    if assign(pval, slot) == HV_OK {
        0
    } else {
        str_length.max(1)
    }
}

unsafe extern "C" fn value_invoke(
    pval: *const VALUE,
    _pthis: *mut VALUE,
    argc: UINT,
    argv: *const VALUE,
    pretval: *mut VALUE,
    _url: LPCWSTR,
) -> VALUE_RESULT {
    let Some(callee) = Slot::from_ptr(pval) else {
        return HV_BAD_PARAMETER;
    };
    if pretval.is_null() {
        return HV_BAD_PARAMETER;
    }
    let args: &[VALUE] = if argc == 0 {
        &[]
    } else if argv.is_null() {
        return HV_BAD_PARAMETER;
    } else {
        slice::from_raw_parts(argv, argc as usize)
    };
    // hold our own reference: the callee may clear the caller's copy
    let callee = callee.clone();
    match callee.vt() {
        T_FUNCTION => {
            let Some(functor) = callee.functor_ref() else {
                return HV_INCOMPATIBLE_TYPE;
            };
            let mut result = VALUE::default();
            (functor.invoke)(functor.tag, argc, args.as_ptr(), &mut result);
            assign(pretval, Slot::from_raw(result))
        }
        T_OBJECT if callee.units() == UT_OBJECT_FUNCTION => {
            let function = match callee.object_ref().map(|object| object.body.lock()) {
                Some(body) => match &*body {
                    ObjectBody::Function(function) => function.clone(),
                    _ => return HV_INCOMPATIBLE_TYPE,
                },
                None => return HV_INCOMPATIBLE_TYPE,
            };
            match function(args) {
                Ok(result) => assign(pretval, Slot::from_raw(result)),
                Err(ScriptFailure::Thrown(message)) => {
                    assign(pretval, Slot::string(UT_STRING_ERROR, &message))
                }
                Err(ScriptFailure::Failed(message)) => {
                    assign(pretval, Slot::string(UT_STRING_ERROR, &message));
                    HV_BAD_PARAMETER
                }
            }
        }
        _ => HV_INCOMPATIBLE_TYPE,
    }
}

unsafe extern "C" fn value_native_functor_set(
    pval: *mut VALUE,
    pinvoke: Option<NATIVE_FUNCTOR_INVOKE>,
    prelease: Option<NATIVE_FUNCTOR_RELEASE>,
    tag: LPVOID,
) -> VALUE_RESULT {
    let Some(invoke) = pinvoke else {
        return HV_BAD_PARAMETER;
    };
    if pval.is_null() {
        return HV_BAD_PARAMETER;
    }
    let functor = Functor {
        invoke,
        release: prelease,
        tag,
    };
    assign(pval, Slot::functor(functor))
}

unsafe extern "C" fn value_is_native_functor(pval: *const VALUE) -> BOOL {
    Slot::from_ptr(pval).is_some_and(|slot| slot.functor_ref().is_some()) as BOOL
}
