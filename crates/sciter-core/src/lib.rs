//! Sciter value bindings.
//!
//! Safe access to Sciter's value model through its C value API, plus the
//! machinery to expose host code to scripts.
//!
//! # Features
//!
//! - **Values**: [`Value`] owns one engine value and releases it on drop
//! - **Marshalling**: [`HostValue`] converts to and from engine values
//! - **Native functors**: host closures become callable script functions
//! - **Dispatch**: [`Dispatcher`] routes script calls to host handlers
//! - **Pluggable engine**: the in-process engine by default, or a table
//!   loaded from a Sciter library
//!
//! # Example
//!
//! ```
//! use sciter_core::{Dispatcher, HostValue, Value};
//!
//! let mut list = Value::parse("[1, 2, 3]").unwrap();
//! list.push(&Value::from(4)).unwrap();
//! assert_eq!(list.len().unwrap(), 4);
//!
//! let dispatcher = Dispatcher::default();
//! dispatcher.register("sumall", |args| {
//!     Ok(Some(HostValue::Int(args.iter().filter_map(HostValue::as_i64).sum())))
//! });
//! let total = dispatcher.call("sumall", &list.values().unwrap());
//! assert_eq!(total, Some(HostValue::Int(10)));
//! ```

// Raw engine pointers cross most public signatures; the unsafe entry points
// carry their own contracts.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

pub mod api;
mod config;
mod dispatch;
mod error;
mod functor;
mod host;
mod kind;
pub mod marshal;
mod value;

pub use config::{BindingConfig, DispatchOptions, HandlerOptions, RawMode};
pub use dispatch::{
    Dispatcher, HandlerProvider, HandlerResult, MethodDecl, ScriptCallFrame, method,
    script_call_proc, script_method,
};
pub use error::{SciterError, SciterResult};
pub use functor::{functor_invoke, functor_release, live_functors, wrap as wrap_callable};
pub use host::{Callable, HostValue, MapKey};
pub use kind::{Conversion, LengthUnit, ObjectKind, StringKind, ValueType};
pub use value::{MAX_ELEMENTS, Value};

pub use sciter_sys;
