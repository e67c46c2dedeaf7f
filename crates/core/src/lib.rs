//! pw-bridge: exposed page bindings and custom query engine installation
//!
//! This crate is the controller side of two cross-boundary protocols with a
//! page running inside a browser engine:
//!
//! - **Bindings**: a page calls `window.<name>(...)`, the remote bootstrap
//!   parks the arguments and a resolve/reject pair under a sequence number,
//!   and [`Binding::call`] runs the Rust function and settles the pending
//!   promise.
//! - **Query engines**: before any query runs against a page,
//!   [`QueryDispatcher`] installs every registered custom engine into it.
//!
//! # Example
//!
//! ```ignore
//! use pw_bridge::{Binding, BindingRegistry};
//! use serde_json::Value;
//!
//! let registry = BindingRegistry::new();
//! registry.expose(Binding::typed("sum", |args| async move {
//!     let a = args[0].as_value().and_then(Value::as_i64).unwrap_or_default();
//!     let b = args[1].as_value().and_then(Value::as_i64).unwrap_or_default();
//!     Ok(a + b)
//! }))?;
//!
//! // For every `bindingCalled` notification from the page:
//! let outcome = registry.dispatch(context.as_ref(), &payload).await;
//! ```

pub mod binding;
pub mod query;

pub use binding::{
	Binding, BindingArg, BindingFn, BindingFuture, BindingRegistry, BindingReturn, CallOutcome, CallStage,
	DispatchOutcome, FunctionError, IgnoredCall, Rejection,
};
pub use query::{
	ARIA_ENGINE_NAME, Element, Frame, Page, Preparation, PreparationError, PreparationStep,
	QUERY_ALL_GLOBAL_PREFIX, QueryDispatcher, QueryEngine, QueryEngineRegistry, SelectorEngine,
	WaitTarget,
};

// Re-export protocol types for convenience
pub use pw_bridge_protocol;

// Re-export the runtime contracts
pub use pw_bridge_runtime;

// Re-export Error and Result from pw-bridge-runtime
pub use pw_bridge_runtime::{Error, Result};
