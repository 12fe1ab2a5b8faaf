//! Script-call dispatch
//!
//! Routes calls made by scripts (`view.foo(1, 2)`) to host handlers. Handlers
//! come from a [`HandlerProvider`] or from explicit [`Dispatcher::register`]
//! calls; an optional catch-all handler sees every call first or only the
//! unmatched ones, depending on [`RawMode`]. Handler failures never reach the
//! engine: they become error values in the call's result slot.

use parking_lot::RwLock;
use sciter_sys::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::CStr;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::api;
use crate::config::{DispatchOptions, HandlerOptions, RawMode};
use crate::error::{SciterError, SciterResult, check};
use crate::functor::panic_message;
use crate::host::HostValue;
use crate::marshal;
use crate::value::Value;

/// `Ok(None)` means "not handled": the result slot is left alone.
pub type HandlerResult = SciterResult<Option<HostValue>>;

type HandlerFn = dyn Fn(&[HostValue]) -> HandlerResult + Send + Sync;
type CatchAllFn = dyn Fn(&str, &[HostValue]) -> HandlerResult + Send + Sync;
type ErrorHook = dyn Fn(&str, &SciterError) -> Option<HostValue> + Send + Sync;

/// A host method exposed to scripts
#[derive(Clone)]
pub struct MethodDecl {
    name: String,
    marked: bool,
    options: HandlerOptions,
    handler: Arc<HandlerFn>,
}

impl MethodDecl {
    fn new<F>(name: impl Into<String>, marked: bool, handler: F) -> Self
    where
        F: Fn(&[HostValue]) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            marked,
            options: HandlerOptions::default(),
            handler: Arc::new(handler),
        }
    }

    /// Replace the handler options
    pub fn with_options(mut self, options: HandlerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name scripts call it by
    pub fn exposed_name(&self) -> &str {
        self.options.name.as_deref().unwrap_or(&self.name)
    }

    /// Declared with [`script_method`]
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn options(&self) -> &HandlerOptions {
        &self.options
    }
}

impl fmt::Debug for MethodDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDecl")
            .field("name", &self.name)
            .field("marked", &self.marked)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Declare a method explicitly marked as callable from script
pub fn script_method<F>(name: impl Into<String>, handler: F) -> MethodDecl
where
    F: Fn(&[HostValue]) -> HandlerResult + Send + Sync + 'static,
{
    MethodDecl::new(name, true, handler)
}

/// Declare a plain method; hidden when the dispatcher requires markers
pub fn method<F>(name: impl Into<String>, handler: F) -> MethodDecl
where
    F: Fn(&[HostValue]) -> HandlerResult + Send + Sync + 'static,
{
    MethodDecl::new(name, false, handler)
}

/// Supplies the methods a handler object exposes
pub trait HandlerProvider: Send + Sync {
    fn methods(&self) -> Vec<MethodDecl>;
}

/// Routes script calls to host handlers
pub struct Dispatcher {
    options: DispatchOptions,
    provider: Option<Arc<dyn HandlerProvider>>,
    discovered: RwLock<HashMap<String, MethodDecl>>,
    registered: RwLock<HashMap<String, MethodDecl>>,
    catch_all: Option<Arc<CatchAllFn>>,
    on_error: Arc<ErrorHook>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatchOptions::default())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("options", &self.options)
            .field("handlers", &self.handler_names())
            .field("catch_all", &self.catch_all.is_some())
            .finish_non_exhaustive()
    }
}

fn default_error_hook(handler: &str, err: &SciterError) -> Option<HostValue> {
    warn!(handler, %err, "script call handler failed");
    Some(HostValue::Error(err.to_string()))
}

impl Dispatcher {
    pub fn new(options: DispatchOptions) -> Self {
        Self {
            options,
            provider: None,
            discovered: RwLock::new(HashMap::new()),
            registered: RwLock::new(HashMap::new()),
            catch_all: None,
            on_error: Arc::new(default_error_hook),
        }
    }

    /// Expose the methods of `provider`. The handler table is built now
    /// unless handlers are dynamic.
    pub fn with_provider(mut self, provider: Arc<dyn HandlerProvider>) -> Self {
        self.provider = Some(provider);
        if !self.options.dynamic_handlers {
            let table = self.build_table();
            debug!(handlers = table.len(), "built script handler table");
            *self.discovered.get_mut() = table;
        }
        self
    }

    /// Set the catch-all handler used by [`RawMode::First`] and
    /// [`RawMode::Fallback`]
    pub fn with_catch_all<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &[HostValue]) -> HandlerResult + Send + Sync + 'static,
    {
        self.catch_all = Some(Arc::new(handler));
        self
    }

    /// Replace the hook that turns failures of unsafe handlers into results
    pub fn with_error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &SciterError) -> Option<HostValue> + Send + Sync + 'static,
    {
        self.on_error = Arc::new(hook);
        self
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Register a handler under `name` with default options.
    /// Explicit registrations are exposed regardless of the marker policy.
    pub fn register<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&[HostValue]) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_method(script_method(name, handler));
    }

    /// Register a prepared declaration under its exposed name
    pub fn register_method(&self, decl: MethodDecl) {
        let name = decl.exposed_name().to_string();
        debug!(method = %name, "registered script handler");
        self.registered.write().insert(name, decl);
    }

    /// Remove an explicit registration
    pub fn unregister(&self, name: &str) -> bool {
        self.registered.write().remove(name).is_some()
    }

    /// Names currently callable from script, sorted
    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registered.read().keys().cloned().collect();
        let discovered = if self.options.dynamic_handlers {
            self.build_table()
        } else {
            self.discovered.read().clone()
        };
        names.extend(discovered.into_keys());
        names.sort();
        names.dedup();
        names
    }

    fn build_table(&self) -> HashMap<String, MethodDecl> {
        let Some(provider) = &self.provider else {
            return HashMap::new();
        };
        provider
            .methods()
            .into_iter()
            .filter(|decl| decl.marked || !self.options.require_marker)
            .map(|decl| (decl.exposed_name().to_string(), decl))
            .collect()
    }

    fn lookup(&self, name: &str) -> Option<MethodDecl> {
        if let Some(decl) = self.registered.read().get(name) {
            return Some(decl.clone());
        }
        if self.options.dynamic_handlers {
            return self.build_table().remove(name);
        }
        self.discovered.read().get(name).cloned()
    }

    /// Serve one script call. Returns whether the call was handled; the
    /// frame's result slot is only written when it was.
    pub fn dispatch(&self, frame: &mut ScriptCallFrame<'_>) -> bool {
        if !self.options.enabled {
            return false;
        }
        let name = frame.name().into_owned();
        let args = match frame.args() {
            Ok(args) => args,
            Err(err) => {
                warn!(method = %name, %err, "could not read script call arguments");
                return store_failure(frame, &err);
            }
        };
        let Some(result) = self.call(&name, &args) else {
            trace!(method = %name, "script call not handled");
            return false;
        };
        let packed = marshal::to_native(&result).unwrap_or_else(|err| {
            warn!(method = %name, %err, "could not pack handler result");
            Value::error_string(&err.message())
        });
        if let Err(err) = frame.set_result(&packed) {
            warn!(method = %name, %err, "could not store handler result");
            return store_failure(frame, &err);
        }
        true
    }

    /// Route a call by name. `None` means nothing handled it.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<HostValue> {
        if !self.options.enabled {
            return None;
        }
        debug!(method = name, argc = args.len(), "script call");

        if self.options.raw_mode == RawMode::First {
            if let Some(result) = self.run_catch_all(name, args) {
                return Some(result);
            }
        }

        if let Some(decl) = self.lookup(name) {
            let options = &decl.options;
            return self.guarded(name, options.safe, || {
                let args = host_args(args, options.convert)?;
                (decl.handler)(&args)
            });
        }

        if self.options.raw_mode == RawMode::Fallback {
            return self.run_catch_all(name, args);
        }
        None
    }

    fn run_catch_all(&self, name: &str, args: &[Value]) -> Option<HostValue> {
        let catch_all = self.catch_all.as_ref()?;
        self.guarded(name, false, || {
            let args = host_args(args, true)?;
            catch_all(name, &args)
        })
    }

    fn guarded(
        &self,
        handler: &str,
        safe: bool,
        run: impl FnOnce() -> HandlerResult,
    ) -> Option<HostValue> {
        let outcome = catch_unwind(AssertUnwindSafe(run))
            .unwrap_or_else(|payload| Err(SciterError::host(panic_message(payload.as_ref()))));
        match outcome {
            Ok(result) => result,
            Err(err) if safe => {
                debug!(handler, %err, "script call handler failed");
                Some(HostValue::Error(err.message()))
            }
            Err(err) => {
                let err = SciterError::handler(handler, err.message());
                (self.on_error)(handler, &err)
            }
        }
    }

    /// Tag to pass along with [`script_call_proc`] when attaching to the
    /// engine. The dispatcher must stay at this address while attached.
    pub fn as_tag(&self) -> LPVOID {
        self as *const Self as LPVOID
    }
}

fn host_args(args: &[Value], convert: bool) -> SciterResult<Vec<HostValue>> {
    if convert {
        args.iter().map(marshal::to_host).collect()
    } else {
        Ok(args.iter().cloned().map(HostValue::Native).collect())
    }
}

/// Report a failed call as an error string in its result slot.
/// `false` only when even that cannot be stored.
fn store_failure(frame: &mut ScriptCallFrame<'_>, err: &SciterError) -> bool {
    match frame.set_result(&Value::error_string(&err.message())) {
        Ok(()) => true,
        Err(err) => {
            warn!(%err, "could not store script call failure");
            false
        }
    }
}

/// One inbound script call, borrowed from the engine for its duration
pub struct ScriptCallFrame<'a> {
    params: &'a mut SCRIPTING_METHOD_PARAMS,
    api: &'static ValueApi,
}

impl<'a> ScriptCallFrame<'a> {
    /// Wrap the engine's call parameters
    ///
    /// # Safety
    /// `params` must be null or point to call parameters whose name, arguments
    /// and result slot stay valid for `'a`.
    pub unsafe fn from_raw(params: *mut SCRIPTING_METHOD_PARAMS) -> Option<Self> {
        // SAFETY: caller contract
        let params = unsafe { params.as_mut() }?;
        Some(Self {
            params,
            api: api::current(),
        })
    }

    /// Called method name
    pub fn name(&self) -> Cow<'_, str> {
        if self.params.name.is_null() {
            return Cow::Borrowed("");
        }
        // SAFETY: non-null names are nul-terminated per the call contract
        unsafe { CStr::from_ptr(self.params.name) }.to_string_lossy()
    }

    pub fn argc(&self) -> usize {
        self.params.argc as usize
    }

    /// Copies of the call arguments
    pub fn args(&self) -> SciterResult<Vec<Value>> {
        // SAFETY: argv holds argc live values per the call contract
        unsafe { marshal::raw_args_in(self.params.argv, self.params.argc, self.api) }
    }

    /// Copy of the current result slot
    pub fn result(&self) -> SciterResult<Value> {
        // SAFETY: the result slot is initialized
        unsafe { Value::copy_from_raw_in(&self.params.result, self.api) }
    }

    pub fn set_result(&mut self, value: &Value) -> SciterResult<()> {
        // SAFETY: the result slot is initialized and owned by the engine
        check(
            unsafe { (self.api.ValueCopy)(&mut self.params.result, value.as_ptr()) },
            "ValueCopy",
        )
    }
}

/// Element event procedure serving script calls.
///
/// Answers subscription requests with the script-call group and forwards
/// script calls to the [`Dispatcher`] behind `tag`. Panics are contained.
///
/// # Safety
/// `tag` must be null or come from [`Dispatcher::as_tag`] on a live
/// dispatcher; `prms` must match the event group per the engine contract.
pub unsafe extern "C" fn script_call_proc(
    tag: LPVOID,
    _he: HELEMENT,
    evtg: UINT,
    prms: LPVOID,
) -> BOOL {
    if tag.is_null() || prms.is_null() {
        return 0;
    }
    // SAFETY: tag comes from Dispatcher::as_tag
    let dispatcher = unsafe { &*(tag as *const Dispatcher) };
    match evtg {
        SUBSCRIPTIONS_REQUEST => {
            // SAFETY: subscription requests pass a UINT out-parameter
            unsafe { *(prms as *mut UINT) = HANDLE_INITIALIZATION | HANDLE_SCRIPTING_METHOD_CALL };
            1
        }
        HANDLE_SCRIPTING_METHOD_CALL => {
            // SAFETY: script calls pass SCRIPTING_METHOD_PARAMS
            let Some(mut frame) =
                (unsafe { ScriptCallFrame::from_raw(prms as *mut SCRIPTING_METHOD_PARAMS) })
            else {
                return 0;
            };
            catch_unwind(AssertUnwindSafe(|| dispatcher.dispatch(&mut frame))).unwrap_or(false)
                as BOOL
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sum(args: &[HostValue]) -> HandlerResult {
        let total: i64 = args.iter().filter_map(HostValue::as_i64).sum();
        Ok(Some(HostValue::Int(total)))
    }

    fn ints(values: &[i32]) -> Vec<Value> {
        values.iter().map(|v| Value::from(*v)).collect()
    }

    struct Calculator;

    impl HandlerProvider for Calculator {
        fn methods(&self) -> Vec<MethodDecl> {
            vec![
                script_method("sumall", sum),
                method("hidden", |_| Ok(Some(HostValue::from("plain")))),
                script_method("mul", |args| {
                    let product: i64 = args.iter().filter_map(HostValue::as_i64).product();
                    Ok(Some(HostValue::Int(product)))
                })
                .with_options(HandlerOptions::new().named("multiply")),
            ]
        }
    }

    #[test]
    fn test_named_handler() {
        let dispatcher = Dispatcher::default().with_provider(Arc::new(Calculator));
        assert_eq!(
            dispatcher.call("sumall", &ints(&[1, 2, 3])),
            Some(HostValue::Int(6))
        );
        assert_eq!(dispatcher.call("missing", &ints(&[1])), None);
    }

    #[test]
    fn test_exposed_name_override() {
        let dispatcher = Dispatcher::default().with_provider(Arc::new(Calculator));
        assert_eq!(
            dispatcher.call("multiply", &ints(&[2, 3])),
            Some(HostValue::Int(6))
        );
        assert_eq!(dispatcher.call("mul", &ints(&[2, 3])), None);
    }

    #[test]
    fn test_marker_policy() {
        let open = Dispatcher::default().with_provider(Arc::new(Calculator));
        assert!(open.call("hidden", &[]).is_some());

        let strict = Dispatcher::new(DispatchOptions::new().require_marker(true))
            .with_provider(Arc::new(Calculator));
        assert!(strict.call("hidden", &[]).is_none());
        assert_eq!(strict.handler_names(), ["multiply", "sumall"]);
    }

    #[test]
    fn test_disabled_dispatcher() {
        let dispatcher = Dispatcher::new(DispatchOptions::new().enabled(false))
            .with_provider(Arc::new(Calculator));
        assert!(dispatcher.call("sumall", &ints(&[1])).is_none());
    }

    #[test]
    fn test_raw_arguments() {
        let dispatcher = Dispatcher::default();
        dispatcher.register_method(
            script_method("kinds", |args| {
                let native = args.iter().all(|a| matches!(a, HostValue::Native(_)));
                Ok(Some(HostValue::Bool(native)))
            })
            .with_options(HandlerOptions::new().convert(false)),
        );
        assert_eq!(
            dispatcher.call("kinds", &ints(&[1, 2])),
            Some(HostValue::Bool(true))
        );
    }

    #[test]
    fn test_safe_handler_failure() {
        let dispatcher = Dispatcher::default();
        dispatcher.register("fail", |_| Err(SciterError::host("boom")));
        assert_eq!(
            dispatcher.call("fail", &[]),
            Some(HostValue::Error("boom".into()))
        );
    }

    #[test]
    fn test_unsafe_handler_uses_hook() {
        let hooked = Arc::new(AtomicUsize::new(0));
        let seen = hooked.clone();
        let dispatcher = Dispatcher::default().with_error_hook(move |handler, err| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_eq!(handler, "fail");
            assert!(matches!(err, SciterError::HandlerException { .. }));
            Some(HostValue::from("recovered"))
        });
        dispatcher.register_method(
            script_method("fail", |_| panic!("handler panicked"))
                .with_options(HandlerOptions::new().safe(false)),
        );
        assert_eq!(dispatcher.call("fail", &[]), Some(HostValue::from("recovered")));
        assert_eq!(hooked.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_hook_returns_error() {
        let dispatcher = Dispatcher::default();
        dispatcher.register_method(
            script_method("fail", |_| Err(SciterError::host("bad input")))
                .with_options(HandlerOptions::new().safe(false)),
        );
        assert_eq!(
            dispatcher.call("fail", &[]),
            Some(HostValue::Error("Handler 'fail' failed: bad input".into()))
        );
    }

    #[test]
    fn test_raw_mode_first_wins() {
        let dispatcher = Dispatcher::new(DispatchOptions::new().raw_mode(RawMode::First))
            .with_provider(Arc::new(Calculator))
            .with_catch_all(|name, _| {
                Ok((name == "sumall").then(|| HostValue::from("intercepted")))
            });
        assert_eq!(
            dispatcher.call("sumall", &ints(&[1, 2])),
            Some(HostValue::from("intercepted"))
        );
        // the catch-all declined, so the named handler runs
        assert_eq!(
            dispatcher.call("multiply", &ints(&[2, 5])),
            Some(HostValue::Int(10))
        );
    }

    #[test]
    fn test_raw_mode_fallback() {
        let dispatcher = Dispatcher::new(DispatchOptions::new().raw_mode(RawMode::Fallback))
            .with_provider(Arc::new(Calculator))
            .with_catch_all(|name, args| Ok(Some(HostValue::from(format!("{name}/{}", args.len())))));
        assert_eq!(
            dispatcher.call("sumall", &ints(&[1, 2])),
            Some(HostValue::Int(3))
        );
        assert_eq!(
            dispatcher.call("other", &ints(&[1, 2])),
            Some(HostValue::from("other/2"))
        );
    }

    #[test]
    fn test_catch_all_ignored_when_off() {
        let dispatcher = Dispatcher::default().with_catch_all(|_, _| Ok(Some(HostValue::Null)));
        assert!(dispatcher.call("anything", &[]).is_none());
    }

    struct Counter {
        version: AtomicUsize,
    }

    impl HandlerProvider for Counter {
        fn methods(&self) -> Vec<MethodDecl> {
            let name = format!("v{}", self.version.load(Ordering::SeqCst));
            vec![script_method(name, |_| Ok(Some(HostValue::Bool(true))))]
        }
    }

    #[test]
    fn test_dynamic_handlers() {
        let provider = Arc::new(Counter {
            version: AtomicUsize::new(1),
        });
        let dispatcher = Dispatcher::new(DispatchOptions::new().dynamic_handlers(true))
            .with_provider(provider.clone());
        assert!(dispatcher.call("v1", &[]).is_some());
        provider.version.store(2, Ordering::SeqCst);
        assert!(dispatcher.call("v1", &[]).is_none());
        assert!(dispatcher.call("v2", &[]).is_some());

        let fixed = Dispatcher::default().with_provider(provider.clone());
        provider.version.store(3, Ordering::SeqCst);
        assert!(fixed.call("v2", &[]).is_some());
        assert!(fixed.call("v3", &[]).is_none());
    }

    #[test]
    fn test_register_and_unregister() {
        let dispatcher = Dispatcher::default();
        dispatcher.register("sumall", sum);
        assert_eq!(dispatcher.handler_names(), ["sumall"]);
        assert!(dispatcher.unregister("sumall"));
        assert!(!dispatcher.unregister("sumall"));
        assert!(dispatcher.call("sumall", &[]).is_none());
    }

    /// Engine table whose copies refuse byte payloads
    fn bytes_refusing_api() -> &'static ValueApi {
        unsafe extern "C" fn copy(pdst: *mut VALUE, psrc: *const VALUE) -> VALUE_RESULT {
            if !psrc.is_null() && unsafe { (*psrc).t } == T_BYTES {
                return HV_BAD_PARAMETER;
            }
            unsafe { (sciter_engine::api().ValueCopy)(pdst, psrc) }
        }
        Box::leak(Box::new(ValueApi {
            ValueCopy: copy,
            ..*sciter_engine::api()
        }))
    }

    fn call_through(dispatcher: &Dispatcher, name: &str, args: &[Value]) -> (bool, Value) {
        let name = std::ffi::CString::new(name).unwrap();
        let mut argv: Vec<VALUE> = args.iter().map(|a| *a.raw()).collect();
        let mut params = SCRIPTING_METHOD_PARAMS {
            name: name.as_ptr(),
            argv: argv.as_mut_ptr(),
            argc: argv.len() as UINT,
            result: Value::from("untouched").into_raw(),
        };
        let mut frame = ScriptCallFrame {
            params: &mut params,
            api: bytes_refusing_api(),
        };
        let handled = dispatcher.dispatch(&mut frame);
        (handled, unsafe { Value::adopt(params.result) })
    }

    #[test]
    fn test_unreadable_arguments_become_error() {
        let dispatcher = Dispatcher::default();
        dispatcher.register("sumall", sum);
        let (handled, result) = call_through(&dispatcher, "sumall", &[Value::from(&[1u8, 2][..])]);
        assert!(handled);
        assert!(result.is_error_string());
    }

    #[test]
    fn test_unstorable_result_becomes_error() {
        let dispatcher = Dispatcher::default();
        dispatcher.register("blob", |_| Ok(Some(HostValue::Bytes(vec![1, 2, 3]))));
        let (handled, result) = call_through(&dispatcher, "blob", &[Value::from(1)]);
        assert!(handled);
        assert!(result.is_error_string());

        dispatcher.register("sumall", sum);
        let (handled, result) = call_through(&dispatcher, "sumall", &ints(&[2, 3]));
        assert!(handled);
        assert_eq!(result.as_int().unwrap(), 5);
    }
}
