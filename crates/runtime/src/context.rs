//! The remote execution context contract.
//!
//! An [`ExecutionContext`] is one realm inside a page (the main world of a
//! frame, or an isolated world). It is torn down on navigation; every pending
//! evaluation then fails with a transport-class [`Error`](crate::Error).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::evaluation::Evaluation;
use crate::handle::RemoteHandle;

/// Boxed `Send` future used at trait seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Issues script evaluations inside a remote execution context.
///
/// Implemented by the page transport. Evaluations suspend until the remote
/// side answers; concurrent evaluations are not ordered relative to each other.
pub trait ExecutionContext: Send + Sync {
	/// Runs `evaluation` remotely and returns a structured clone of the result.
	fn evaluate(&self, evaluation: Evaluation) -> BoxFuture<'_, Result<Value>>;

	/// Runs `evaluation` remotely and returns a live reference to the result.
	///
	/// The caller owns the returned handle and must dispose it.
	fn evaluate_handle(&self, evaluation: Evaluation)
	-> BoxFuture<'_, Result<Arc<dyn RemoteHandle>>>;
}
