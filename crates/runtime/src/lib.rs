//! Bridge Runtime - contracts for talking to a remote execution context
//!
//! This crate defines what the binding bridge consumes from the browser side:
//!
//! - **Evaluation**: a function source plus arguments, run remotely; arguments
//!   are JSON values or live handles passed by reference
//! - **ExecutionContext**: issues evaluations, either materializing the result
//!   or returning a live [`RemoteHandle`]
//! - **RemoteHandle**: a disposable reference to a value that stays alive in
//!   the remote context until released
//! - **Error**: the shared error type, with transport classification
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  pw-bridge  │  Binding, BindingRegistry, QueryDispatcher
//! └──────┬──────┘
//!        │ consumes ExecutionContext / RemoteHandle
//! ┌──────▼──────┐
//! │  runtime    │  This crate
//! └──────┬──────┘
//!        │ implemented by the page transport
//! ┌──────▼──────┐
//! │  transport  │  CDP / Playwright connection (not part of this workspace)
//! └─────────────┘
//! ```

pub mod context;
pub mod error;
pub mod evaluation;
pub mod handle;

pub use context::{BoxFuture, ExecutionContext};
pub use error::{Error, Result};
pub use evaluation::{Evaluation, EvaluationArg};
pub use handle::{RemoteHandle, RemoteProperty};
