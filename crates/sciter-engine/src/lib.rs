//! In-process implementation of the Sciter value function table.
//!
//! [`api()`] hands out a [`ValueApi`] whose entries are implemented in Rust,
//! so values can be created, inspected and invoked without loading the
//! engine's shared library. Hosts that do load the real engine install its
//! table instead and never touch this crate at runtime.
//!
//! Besides the table, the crate exposes two helpers for building values the
//! table alone cannot create: script functions ([`set_script_function`]) and
//! live shared objects ([`set_shared_object`]).

mod abi;
mod literal;
mod slot;

use sciter_sys::*;
use std::sync::Arc;

use crate::slot::{ObjectBody, Slot};

pub use crate::slot::{ScriptFailure, ScriptFn};

/// The in-process value function table.
pub fn api() -> &'static ValueApi {
    &abi::API
}

/// Store a script function in `pval`.
///
/// The function receives borrowed arguments and returns an owned value built
/// with this engine's table. Returning [`ScriptFailure::Thrown`] makes the
/// call succeed with an error string; [`ScriptFailure::Failed`] makes it fail.
///
/// # Safety
/// `pval` must point to an initialized `VALUE` owned by this engine.
pub unsafe fn set_script_function<F>(pval: *mut VALUE, function: F) -> VALUE_RESULT
where
    F: Fn(&[VALUE]) -> Result<VALUE, ScriptFailure> + Send + Sync + 'static,
{
    let function: ScriptFn = Arc::new(function);
    let slot = Slot::object(UT_OBJECT_FUNCTION, ObjectBody::Function(function));
    unsafe { abi::assign(pval, slot) }
}

/// Turn the array or map in `pval` into a live object shared by all copies.
///
/// # Safety
/// `pval` must point to an initialized `VALUE` owned by this engine.
pub unsafe fn set_shared_object(pval: *mut VALUE) -> VALUE_RESULT {
    let Some(slot) = (unsafe { Slot::from_ptr(pval) }) else {
        return HV_BAD_PARAMETER;
    };
    let object = match slot.vt() {
        T_ARRAY => Slot::object(
            UT_OBJECT_ARRAY,
            ObjectBody::Array(slot.items().cloned().unwrap_or_default()),
        ),
        T_MAP => Slot::object(
            UT_OBJECT_OBJECT,
            ObjectBody::Map(slot.pairs().cloned().unwrap_or_default()),
        ),
        _ => return HV_INCOMPATIBLE_TYPE,
    };
    unsafe { abi::assign(pval, object) }
}
