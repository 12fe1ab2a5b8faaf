//! Native functor bridge
//!
//! Host callables handed to the engine are kept in a process-wide registry.
//! The registry id travels through the engine as the functor tag; the engine
//! calls [`functor_invoke`] with it for every invocation and
//! [`functor_release`] exactly once when its last copy goes away.

use parking_lot::Mutex;
use sciter_sys::{LPVOID, UINT, VALUE};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

use crate::api;
use crate::error::{SciterError, SciterResult, check};
use crate::host::{Callable, HostValue};
use crate::marshal;
use crate::value::Value;

struct FunctorBinding {
    callable: Callable,
    invocations: AtomicU64,
}

struct FunctorRegistry {
    live: Mutex<HashMap<u64, Arc<FunctorBinding>>>,
    next_id: AtomicU64,
}

impl FunctorRegistry {
    fn insert(&self, callable: Callable) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let binding = FunctorBinding {
            callable,
            invocations: AtomicU64::new(0),
        };
        self.live.lock().insert(id, Arc::new(binding));
        id
    }

    /// Clone the binding out so no lock is held while it runs
    fn get(&self, id: u64) -> Option<Arc<FunctorBinding>> {
        self.live.lock().get(&id).cloned()
    }

    fn remove(&self, id: u64) -> Option<Arc<FunctorBinding>> {
        self.live.lock().remove(&id)
    }
}

fn registry() -> &'static FunctorRegistry {
    static REGISTRY: OnceLock<FunctorRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| FunctorRegistry {
        live: Mutex::new(HashMap::new()),
        next_id: AtomicU64::new(1),
    })
}

/// Number of functors the engine still holds
pub fn live_functors() -> usize {
    registry().live.lock().len()
}

/// Hand a host callable to the engine as a native function value
pub fn wrap(callable: Callable) -> SciterResult<Value> {
    let id = registry().insert(callable);
    let mut rv = Value::new();
    let api = rv.api();
    // SAFETY: rv owns an initialized slot; the trampolines accept any tag
    // produced by the registry
    let code = unsafe {
        (api.ValueNativeFunctorSet)(
            rv.as_mut_ptr(),
            Some(functor_invoke),
            Some(functor_release),
            id as usize as LPVOID,
        )
    };
    if let Err(err) = check(code, "ValueNativeFunctorSet") {
        registry().remove(id);
        return Err(err);
    }
    trace!(functor = id, "wrapped host callable");
    Ok(rv)
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic in host code".to_string())
}

fn run(binding: &FunctorBinding, argv: *const VALUE, argc: UINT) -> SciterResult<HostValue> {
    // SAFETY: the engine passes argc live arguments
    let args = unsafe { marshal::unpack_args(argv, argc) }?;
    binding.invocations.fetch_add(1, Ordering::Relaxed);
    catch_unwind(AssertUnwindSafe(|| binding.callable.call(&args)))
        .unwrap_or_else(|payload| Err(SciterError::host(panic_message(payload.as_ref()))))
}

/// Invocation trampoline registered with the engine.
///
/// Failures never cross the boundary: they are written to `retval` as an
/// error string.
///
/// # Safety
/// Called by the engine with a tag from [`wrap`], `argc` live arguments and
/// an initialized result slot.
pub unsafe extern "C" fn functor_invoke(
    tag: LPVOID,
    argc: UINT,
    argv: *const VALUE,
    retval: *mut VALUE,
) {
    if retval.is_null() {
        return;
    }
    let id = tag as usize as u64;
    let outcome = match registry().get(id) {
        Some(binding) => run(&binding, argv, argc),
        None => Err(SciterError::FunctorReleased(id)),
    };
    let result = outcome.unwrap_or_else(|err| {
        debug!(functor = id, %err, "host callable failed");
        HostValue::Error(err.message())
    });
    // SAFETY: retval is the engine's initialized result slot
    if let Err(err) = unsafe { marshal::pack_result(retval, &result) } {
        warn!(functor = id, %err, "failed to pack callable result");
        let fallback = Value::error_string(&err.message());
        // SAFETY: as above
        unsafe {
            (api::current().ValueCopy)(retval, fallback.as_ptr());
        }
    }
}

/// Release trampoline registered with the engine. Unknown tags are ignored.
///
/// # Safety
/// Called by the engine with a tag from [`wrap`].
pub unsafe extern "C" fn functor_release(tag: LPVOID) {
    let id = tag as usize as u64;
    match registry().remove(id) {
        Some(binding) => trace!(
            functor = id,
            invocations = binding.invocations.load(Ordering::Relaxed),
            "released host callable"
        ),
        None => debug!(functor = id, "release for unknown functor"),
    }
}
