//! Host/script interop tests
//!
//! Covers the paths where control crosses between engine and host:
//! - Native functor lifetime and invocation
//! - Script function failures surfacing as errors
//! - Script calls routed through the element event procedure
//!
//! NOTE: functor tests compare the process-wide live functor count, so they
//! run serially.

use sciter_core::sciter_sys::{
    HANDLE_INITIALIZATION, HANDLE_SCRIPTING_METHOD_CALL, LPVOID, SCRIPTING_METHOD_PARAMS,
    SUBSCRIPTIONS_REQUEST, UINT, VALUE,
};
use sciter_core::{
    Callable, DispatchOptions, Dispatcher, HostValue, SciterError, Value, live_functors,
    script_call_proc, wrap_callable,
};
use sciter_engine::ScriptFailure;
use serial_test::serial;
use std::ffi::CString;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Run one script call through the event procedure and return whether it
/// was handled along with the final result slot
fn script_call(dispatcher: &Dispatcher, name: &str, args: &[Value]) -> (bool, Value) {
    let name = CString::new(name).unwrap();
    let mut argv: Vec<VALUE> = args.iter().map(|a| *a.raw()).collect();
    let mut params = SCRIPTING_METHOD_PARAMS {
        name: name.as_ptr(),
        argv: argv.as_mut_ptr(),
        argc: argv.len() as UINT,
        result: Value::from("untouched").into_raw(),
    };
    let handled = unsafe {
        script_call_proc(
            dispatcher.as_tag(),
            ptr::null_mut(),
            HANDLE_SCRIPTING_METHOD_CALL,
            &mut params as *mut SCRIPTING_METHOD_PARAMS as LPVOID,
        )
    };
    (handled != 0, unsafe { Value::adopt(params.result) })
}

// ============================================================================
// Native functors
// ============================================================================

#[test]
#[serial]
fn test_functor_lifetime() {
    let baseline = live_functors();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let f = wrap_callable(Callable::new(move |args| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(HostValue::Int(args.len() as i64))
    }))
    .unwrap();
    assert_eq!(live_functors(), baseline + 1);

    for n in 0..5 {
        let args: Vec<Value> = (0..n).map(Value::from).collect();
        assert_eq!(f.call(&args).unwrap().as_int().unwrap(), n);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    let copies: Vec<Value> = (0..3).map(|_| f.clone()).collect();
    drop(f);
    assert_eq!(live_functors(), baseline + 1);
    drop(copies);
    assert_eq!(live_functors(), baseline);
}

#[test]
#[serial]
fn test_trampoline_adds_arguments() {
    let add = Value::function(|args| {
        let a = args.first().and_then(HostValue::as_i64).unwrap_or(0);
        let b = args.get(1).and_then(HostValue::as_i64).unwrap_or(0);
        Ok(HostValue::Int(a + b))
    })
    .unwrap();
    let sum = add.call(&[Value::from(3), Value::from(4)]).unwrap();
    assert_eq!(sum.to_host().unwrap(), HostValue::Int(7));
}

#[test]
#[serial]
fn test_functor_inside_container() {
    let baseline = live_functors();
    let host = HostValue::List(vec![
        HostValue::from("label"),
        HostValue::callable(|args| {
            let text = args.first().and_then(HostValue::as_str).unwrap_or_default();
            Ok(HostValue::from(text.to_uppercase()))
        }),
    ]);
    let list = Value::from_host(&host).unwrap();
    let f = list.get(1).unwrap();
    assert!(f.is_native_functor());
    assert_eq!(
        f.call_host(&[HostValue::from("abc")]).unwrap(),
        HostValue::from("ABC")
    );
    drop(f);
    drop(list);
    assert_eq!(live_functors(), baseline);
}

#[test]
#[serial]
fn test_functor_failure_becomes_exception() {
    let f = Value::function(|_| Err(SciterError::host("no such file"))).unwrap();
    match f.call(&[]) {
        Err(SciterError::ScriptException { message, .. }) => assert_eq!(message, "no such file"),
        other => panic!("expected ScriptException, got {other:?}"),
    }
}

// ============================================================================
// Script functions
// ============================================================================

#[test]
fn test_script_function_result() {
    let mut f = Value::new();
    let code = unsafe {
        sciter_engine::set_script_function(f.as_mut_ptr(), |args| {
            Ok(Value::from(args.len() as i32 * 10).into_raw())
        })
    };
    assert_eq!(code, sciter_core::sciter_sys::HV_OK);
    assert!(f.is_object());
    assert_eq!(f.call(&[Value::from(1), Value::from(2)]).unwrap().as_int().unwrap(), 20);
}

#[test]
fn test_script_errors_and_exceptions() {
    let mut thrower = Value::new();
    let mut broken = Value::new();
    unsafe {
        sciter_engine::set_script_function(thrower.as_mut_ptr(), |_| {
            Err(ScriptFailure::Thrown("value is not a number".into()))
        });
        sciter_engine::set_script_function(broken.as_mut_ptr(), |_| {
            Err(ScriptFailure::Failed("syntax error\r\nat line 3\r\n".into()))
        });
    }

    match thrower.call_with(None, &[], Some("app.js")) {
        Err(SciterError::ScriptException { message, script }) => {
            assert_eq!(message, "value is not a number");
            assert_eq!(script.as_deref(), Some("app.js"));
        }
        other => panic!("expected ScriptException, got {other:?}"),
    }

    let err = broken.call(&[]).unwrap_err();
    assert!(err.is_script_error());
    assert!(matches!(err, SciterError::ScriptError { .. }));
    assert_eq!(err.message(), "syntax error\n\nat line 3");
}

#[test]
fn test_calling_non_function() {
    assert!(matches!(
        Value::from(3).call(&[]),
        Err(SciterError::IncompatibleType { .. })
    ));
}

// ============================================================================
// Script call dispatch
// ============================================================================

#[test]
fn test_subscription_request() {
    let dispatcher = Dispatcher::default();
    let mut groups: UINT = 0;
    let accepted = unsafe {
        script_call_proc(
            dispatcher.as_tag(),
            ptr::null_mut(),
            SUBSCRIPTIONS_REQUEST,
            &mut groups as *mut UINT as LPVOID,
        )
    };
    assert_eq!(accepted, 1);
    assert_eq!(groups, HANDLE_INITIALIZATION | HANDLE_SCRIPTING_METHOD_CALL);

    let ignored = unsafe { script_call_proc(ptr::null_mut(), ptr::null_mut(), 0, ptr::null_mut()) };
    assert_eq!(ignored, 0);
}

#[test]
fn test_handled_call_writes_result() {
    let dispatcher = Dispatcher::default();
    dispatcher.register("sumall", |args| {
        Ok(Some(HostValue::Int(args.iter().filter_map(HostValue::as_i64).sum())))
    });
    let (handled, result) = script_call(
        &dispatcher,
        "sumall",
        &[Value::from(1), Value::from(2), Value::from(3)],
    );
    assert!(handled);
    assert_eq!(result.as_int().unwrap(), 6);
}

#[test]
fn test_unhandled_call_leaves_result() {
    let dispatcher = Dispatcher::default();
    let (handled, result) = script_call(&dispatcher, "nothing_here", &[Value::from(1)]);
    assert!(!handled);
    assert_eq!(result.as_string().unwrap(), "untouched");

    let disabled = Dispatcher::new(DispatchOptions::new().enabled(false));
    disabled.register("sumall", |_| Ok(Some(HostValue::Null)));
    let (handled, _) = script_call(&disabled, "sumall", &[]);
    assert!(!handled);
}

#[test]
fn test_failures_stay_on_host_side() {
    let dispatcher = Dispatcher::default();
    dispatcher.register("explode", |_| panic!("handler blew up"));
    dispatcher.register("reject", |_| Err(SciterError::host("invalid input")));

    let (handled, result) = script_call(&dispatcher, "explode", &[]);
    assert!(handled);
    assert!(result.is_error_string());
    assert_eq!(result.as_string().unwrap(), "handler blew up");

    let (handled, result) = script_call(&dispatcher, "reject", &[]);
    assert!(handled);
    assert!(result.is_error_string());
    assert_eq!(result.as_string().unwrap(), "invalid input");
}

#[test]
#[serial]
fn test_handler_can_return_callable() {
    let baseline = live_functors();
    let dispatcher = Dispatcher::default();
    dispatcher.register("adder", |args| {
        let base = args.first().and_then(HostValue::as_i64).unwrap_or(0);
        Ok(Some(HostValue::callable(move |args| {
            Ok(HostValue::Int(base + args.first().and_then(HostValue::as_i64).unwrap_or(0)))
        })))
    });
    let (handled, adder) = script_call(&dispatcher, "adder", &[Value::from(40)]);
    assert!(handled);
    assert_eq!(adder.call(&[Value::from(2)]).unwrap().as_int().unwrap(), 42);
    drop(adder);
    assert_eq!(live_functors(), baseline);
}
