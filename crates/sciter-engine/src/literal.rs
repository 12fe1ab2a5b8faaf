//! Text conversion behind `ValueToString` and `ValueFromString`.
//!
//! Literals are JSON with a few extensions for engine-only types:
//! `undefined`, unit suffixes on lengths and angles, `#rrggbbaa` colors.

use crate::slot::{ObjectBody, Slot};
use sciter_sys::*;
use std::fmt::Write;

/// Render `slot` the way `ValueToString(how)` does.
pub(crate) fn emit(slot: &Slot, how: UINT) -> String {
    if how == CVT_SIMPLE
        && let Some(text) = slot.to_rust_string()
    {
        return text;
    }
    let mut out = String::new();
    emit_into(slot, &mut out, 0);
    out
}

const MAX_DEPTH: usize = 64;

fn emit_into(slot: &Slot, out: &mut String, depth: usize) {
    if depth > MAX_DEPTH {
        out.push_str("null");
        return;
    }
    match slot.vt() {
        T_UNDEFINED => out.push_str("undefined"),
        T_NULL => out.push_str("null"),
        T_BOOL => out.push_str(if slot.as_int() != 0 { "true" } else { "false" }),
        T_INT => {
            let _ = write!(out, "{}", slot.as_int());
        }
        T_FLOAT => emit_float(slot.as_f64(), out),
        T_STRING => emit_string(&slot.to_rust_string().unwrap_or_default(), out),
        T_BYTES => {
            out.push('[');
            for (i, byte) in slot.bytes_ref().into_iter().flatten().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{byte}");
            }
            out.push(']');
        }
        T_ARRAY => emit_items(slot.items().map(Vec::as_slice).unwrap_or_default(), out, depth),
        T_MAP => emit_pairs(slot.pairs().map(Vec::as_slice).unwrap_or_default(), out, depth),
        // an object that is already locked further up is a cycle
        T_OBJECT => match slot.object_ref().and_then(|object| object.body.try_lock()) {
            Some(body) => match &*body {
                ObjectBody::Array(items) => emit_items(items, out, depth),
                ObjectBody::Map(pairs) => emit_pairs(pairs, out, depth),
                ObjectBody::Function(_) => out.push_str("[function]"),
            },
            None => out.push_str("null"),
        },
        T_FUNCTION => out.push_str("[native function]"),
        T_LENGTH => {
            emit_float(slot.as_f64(), out);
            out.push_str(length_suffix(slot.units()));
        }
        T_DATE | T_CURRENCY => {
            let _ = write!(out, "{}", slot.as_i64());
        }
        T_DURATION => {
            emit_float(slot.as_f64(), out);
            out.push('s');
        }
        T_ANGLE => {
            emit_float(slot.as_f64(), out);
            out.push_str("rad");
        }
        T_RANGE => {
            let packed = slot.as_i64();
            let _ = write!(out, "{}..{}", packed as i32, (packed >> 32) as i32);
        }
        T_COLOR => {
            let _ = write!(out, "#{:08x}", slot.as_int() as u32);
        }
        other => {
            let _ = write!(out, "[type {other}]");
        }
    }
}

fn emit_items(items: &[Slot], out: &mut String, depth: usize) {
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        emit_into(item, out, depth + 1);
    }
    out.push(']');
}

fn emit_pairs(pairs: &[(Slot, Slot)], out: &mut String, depth: usize) {
    out.push('{');
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match key.to_rust_string() {
            Some(name) => emit_string(&name, out),
            None => emit_into(key, out, depth + 1),
        }
        out.push_str(": ");
        emit_into(value, out, depth + 1);
    }
    out.push('}');
}

fn emit_float(v: f64, out: &mut String) {
    if !v.is_finite() {
        out.push_str("null");
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        let _ = write!(out, "{v:.1}");
    } else {
        let _ = write!(out, "{v}");
    }
}

fn emit_string(s: &str, out: &mut String) {
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
    }
}

fn length_suffix(units: UINT) -> &'static str {
    match units {
        UT_EM => "em",
        UT_EX => "ex",
        UT_PR => "%",
        UT_SP => "*",
        UT_PX => "px",
        UT_IN => "in",
        UT_CM => "cm",
        UT_MM => "mm",
        UT_PT => "pt",
        UT_PC => "pc",
        UT_DIP => "dip",
        _ => "",
    }
}

/// Parse `text` according to `how`.
///
/// Returns `None` when the text is not a valid literal. Empty input yields
/// `undefined`.
pub(crate) fn parse(text: &str, how: UINT) -> Option<Slot> {
    if how == CVT_SIMPLE {
        return Some(Slot::string(UT_STRING_STRING, text));
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(Slot::undefined());
    }
    if trimmed == "undefined" {
        return Some(Slot::undefined());
    }
    let parsed = if how == CVT_JSON_MAP {
        serde_json::from_str::<serde_json::Value>(&format!("{{{trimmed}}}"))
    } else {
        serde_json::from_str::<serde_json::Value>(trimmed)
    };
    parsed.ok().map(|json| from_json(&json))
}

fn from_json(json: &serde_json::Value) -> Slot {
    use serde_json::Value as Json;
    match json {
        Json::Null => Slot::scalar(T_NULL, 0, 0),
        Json::Bool(b) => Slot::bool(*b),
        Json::Number(n) => match n.as_i64().and_then(|v| i32::try_from(v).ok()) {
            Some(v) => Slot::int(T_INT, 0, v),
            None => Slot::float(T_FLOAT, 0, n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Slot::string(UT_STRING_STRING, s),
        Json::Array(items) => Slot::array(items.iter().map(from_json).collect()),
        Json::Object(entries) => Slot::map(
            entries
                .iter()
                .map(|(k, v)| (Slot::string(UT_STRING_STRING, k), from_json(v)))
                .collect(),
        ),
    }
}
