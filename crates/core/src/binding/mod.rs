//! Exposed bindings: controller-side functions callable from a page.
//!
//! When page script calls an exposed function, the remote bootstrap stores the
//! live arguments under `globalThis[name].args.get(seq)`, parks a resolve/reject
//! pair under `globalThis[name].callbacks.get(seq)` and notifies the controller.
//! [`Binding::call`] services exactly one such notification:
//!
//! ```text
//! ARGS_FETCHED ──▶ INVOKING ──┬──▶ RESOLVED
//!                             ├──▶ REJECTED
//!                             └──▶ ABANDONED (context gone)
//! ```
//!
//! Argument handles stay alive until the outcome has been written back, so a
//! node argument can be handed straight back to the page. They are disposed
//! afterwards, innermost first.

mod registry;
pub mod scripts;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use pw_bridge_runtime::{BoxFuture, Error, ExecutionContext, RemoteHandle, RemoteProperty};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

pub use registry::{BindingRegistry, DispatchOutcome, IgnoredCall};

/// Boxed future returned by a bound function.
pub type BindingFuture = BoxFuture<'static, Result<BindingReturn, FunctionError>>;

/// Type-erased bound function.
pub type BindingFn = Arc<dyn Fn(Vec<BindingArg>) -> BindingFuture + Send + Sync>;

/// One argument handed to a bound function.
#[derive(Debug, Clone)]
pub enum BindingArg {
	/// Structured clone produced by the remote side.
	Value(Value),
	/// Live reference to a DOM node in the page.
	///
	/// Only valid for the duration of the call; it is disposed afterwards.
	Handle(Arc<dyn RemoteHandle>),
}

impl BindingArg {
	/// Returns the materialized value, if this argument was cloned.
	pub fn as_value(&self) -> Option<&Value> {
		match self {
			Self::Value(value) => Some(value),
			Self::Handle(_) => None,
		}
	}

	/// Returns the node handle, if this argument was passed by reference.
	pub fn as_handle(&self) -> Option<&Arc<dyn RemoteHandle>> {
		match self {
			Self::Value(_) => None,
			Self::Handle(handle) => Some(handle),
		}
	}

	/// Consumes the argument, returning the materialized value if any.
	pub fn into_value(self) -> Option<Value> {
		match self {
			Self::Value(value) => Some(value),
			Self::Handle(_) => None,
		}
	}

	pub fn is_handle(&self) -> bool {
		matches!(self, Self::Handle(_))
	}
}

/// What a bound function hands back to the page.
#[derive(Debug, Clone)]
pub enum BindingReturn {
	/// Structurally cloned into the page.
	Value(Value),
	/// Resolved with the referenced object itself.
	Handle(Arc<dyn RemoteHandle>),
	/// Resolved with an array of the referenced objects.
	Handles(Vec<Arc<dyn RemoteHandle>>),
}

impl From<Value> for BindingReturn {
	fn from(value: Value) -> Self {
		Self::Value(value)
	}
}

impl From<Arc<dyn RemoteHandle>> for BindingReturn {
	fn from(handle: Arc<dyn RemoteHandle>) -> Self {
		Self::Handle(handle)
	}
}

impl From<Vec<Arc<dyn RemoteHandle>>> for BindingReturn {
	fn from(handles: Vec<Arc<dyn RemoteHandle>>) -> Self {
		Self::Handles(handles)
	}
}

impl From<BindingArg> for BindingReturn {
	fn from(arg: BindingArg) -> Self {
		match arg {
			BindingArg::Value(value) => Self::Value(value),
			BindingArg::Handle(handle) => Self::Handle(handle),
		}
	}
}

/// Failure of a bound function.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
	/// An error-shaped failure, rebuilt as an `Error` object in the page.
	#[error("{name}: {message}")]
	Thrown {
		name: String,
		message: String,
		stack: Option<String>,
	},

	/// A non-error rejection value, passed to the page verbatim.
	#[error("rejected with {0}")]
	Value(Value),

	/// A runtime error raised while the function talked to the page.
	///
	/// Errors meaning the page is gone abandon the call instead of rejecting
	/// it. Timeouts still reject, as `TimeoutError`.
	#[error(transparent)]
	Runtime(#[from] Error),
}

impl FunctionError {
	/// Creates an `Error` with the given message.
	pub fn new(message: impl Into<String>) -> Self {
		Self::named("Error", message)
	}

	/// Creates an error with a specific name, such as `TypeError`.
	pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Thrown {
			name: name.into(),
			message: message.into(),
			stack: None,
		}
	}

	/// Attaches a stack trace. No-op for non-error rejections.
	pub fn with_stack(self, stack: impl Into<String>) -> Self {
		match self {
			Self::Thrown { name, message, .. } => Self::Thrown {
				name,
				message,
				stack: Some(stack.into()),
			},
			other => other,
		}
	}

	/// Rejects with a raw value instead of an `Error` object.
	pub fn value(value: impl Into<Value>) -> Self {
		Self::Value(value.into())
	}

	/// Returns true if this failure means the page is gone.
	pub fn is_disconnected(&self) -> bool {
		matches!(self, Self::Runtime(error) if error.is_disconnected())
	}
}

impl From<serde_json::Error> for FunctionError {
	fn from(error: serde_json::Error) -> Self {
		Self::Runtime(Error::Json(error))
	}
}

/// Value a pending call was rejected with.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
	/// A rebuilt `Error` object. The stack is never empty.
	Error {
		name: String,
		message: String,
		stack: String,
	},
	/// A non-error rejection value.
	Value(Value),
}

/// Step of a call at which it was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStage {
	/// Fetching or enumerating the pending arguments.
	FetchArguments,
	/// Running the bound function.
	Invoke,
	/// Writing the resolution or rejection back to the page.
	Deliver,
}

/// How a single pending call ended.
#[derive(Debug)]
pub enum CallOutcome {
	/// The page promise was resolved with the function's result.
	Resolved,
	/// The page promise was rejected.
	Rejected(Rejection),
	/// The page went away; nothing was (or could be) written back.
	///
	/// Whatever awaited the call has already been settled independently, so
	/// this outcome is ignorable.
	Abandoned { stage: CallStage, error: Error },
}

impl CallOutcome {
	pub fn is_resolved(&self) -> bool {
		matches!(self, Self::Resolved)
	}

	pub fn is_rejected(&self) -> bool {
		matches!(self, Self::Rejected(_))
	}

	/// Returns true for outcomes that need no follow-up.
	pub fn is_ignorable(&self) -> bool {
		matches!(self, Self::Abandoned { .. })
	}

	/// Returns the rejection, if the call was rejected.
	pub fn rejection(&self) -> Option<&Rejection> {
		match self {
			Self::Rejected(rejection) => Some(rejection),
			_ => None,
		}
	}
}

/// A controller-side function exposed to a page under a fixed name.
#[derive(Clone)]
pub struct Binding {
	name: Arc<str>,
	function: BindingFn,
}

struct Failure {
	stage: CallStage,
	error: FunctionError,
}

impl Failure {
	fn new(stage: CallStage, error: impl Into<FunctionError>) -> Self {
		Self {
			stage,
			error: error.into(),
		}
	}
}

impl Binding {
	/// Creates a binding from an async function returning raw JSON.
	pub fn new<F, Fut>(name: impl Into<Arc<str>>, function: F) -> Self
	where
		F: Fn(Vec<BindingArg>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Value, FunctionError>> + Send + 'static,
	{
		Self::returning(name, function)
	}

	/// Creates a binding whose function may hand remote objects back to the
	/// page, such as a node argument or elements it looked up.
	///
	/// Returned handles that were not arguments of the call stay owned by the
	/// function's side; the binding never disposes them.
	pub fn returning<F, Fut, R>(name: impl Into<Arc<str>>, function: F) -> Self
	where
		F: Fn(Vec<BindingArg>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<R, FunctionError>> + Send + 'static,
		R: Into<BindingReturn> + 'static,
	{
		Self {
			name: name.into(),
			function: Arc::new(move |args: Vec<BindingArg>| -> BindingFuture {
				Box::pin(function(args).map(|result| result.map(Into::into)))
			}),
		}
	}

	/// Creates a binding from an async function returning any serializable value.
	///
	/// A result that fails to serialize rejects the page promise.
	pub fn typed<F, Fut, T>(name: impl Into<Arc<str>>, function: F) -> Self
	where
		F: Fn(Vec<BindingArg>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<T, FunctionError>> + Send + 'static,
		T: Serialize + 'static,
	{
		Self::new(name, move |args| {
			let result = function(args);
			async move {
				let value = result.await?;
				Ok::<_, FunctionError>(serde_json::to_value(value)?)
			}
		})
	}

	/// Creates a binding from an already type-erased function.
	pub fn from_fn(name: impl Into<Arc<str>>, function: BindingFn) -> Self {
		Self {
			name: name.into(),
			function,
		}
	}

	/// Returns the exposed name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Services one remote-initiated call of this binding.
	///
	/// `args` is the structured clone sent along with the notification. Node
	/// arguments are swapped for live handles before the function runs; indexes
	/// outside `args` are ignored.
	///
	/// Never fails: errors meaning the page is gone abandon the call, every
	/// other failure becomes a rejection in the page.
	pub async fn call(&self, context: &dyn ExecutionContext, seq: u64, args: Vec<Value>) -> CallOutcome {
		let container = match context.evaluate_handle(scripts::pending_args(&self.name, seq)).await {
			Ok(container) => container,
			Err(error) => return self.reject(context, seq, Failure::new(CallStage::FetchArguments, error)).await,
		};

		let outcome = self.call_with(context, container.as_ref(), seq, args).await;
		self.release(container.as_ref(), seq).await;
		outcome
	}

	async fn call_with(
		&self,
		context: &dyn ExecutionContext,
		container: &dyn RemoteHandle,
		seq: u64,
		args: Vec<Value>,
	) -> CallOutcome {
		let properties = match container.get_properties().await {
			Ok(properties) => properties,
			Err(error) => return self.reject(context, seq, Failure::new(CallStage::FetchArguments, error)).await,
		};

		let args = self.materialize(seq, args, &properties);
		let outcome = match self.run(args).await {
			Ok(result) => self.resolve(context, seq, result).await,
			Err(error) => self.reject(context, seq, Failure::new(CallStage::Invoke, error)).await,
		};

		for (_, handle) in &properties {
			self.release(handle.as_ref(), seq).await;
		}
		outcome
	}

	fn materialize(&self, seq: u64, args: Vec<Value>, properties: &[RemoteProperty]) -> Vec<BindingArg> {
		let mut args: Vec<BindingArg> = args.into_iter().map(BindingArg::Value).collect();
		for (key, handle) in properties {
			let Ok(index) = key.parse::<usize>() else {
				continue;
			};
			let Some(slot) = args.get_mut(index) else {
				continue;
			};
			if handle.is_node() {
				trace!(target = "pw", binding = %self.name, seq, index, "passing node argument by reference");
				*slot = BindingArg::Handle(Arc::clone(handle));
			}
		}
		args
	}

	async fn run(&self, args: Vec<BindingArg>) -> Result<BindingReturn, FunctionError> {
		let function = Arc::clone(&self.function);
		match AssertUnwindSafe(async move { function(args).await }).catch_unwind().await {
			Ok(result) => result,
			Err(panic) => Err(FunctionError::new(format!(
				"binding '{}' panicked: {}",
				self.name,
				panic_message(panic.as_ref())
			))),
		}
	}

	async fn release(&self, handle: &dyn RemoteHandle, seq: u64) {
		if let Err(error) = handle.dispose().await {
			debug!(target = "pw", binding = %self.name, seq, %error, "failed to dispose argument handle");
		}
	}

	async fn resolve(&self, context: &dyn ExecutionContext, seq: u64, result: BindingReturn) -> CallOutcome {
		match context.evaluate(scripts::resolve(&self.name, seq, result)).await {
			Ok(_) => {
				debug!(target = "pw", binding = %self.name, seq, "binding call resolved");
				CallOutcome::Resolved
			}
			Err(error) => self.reject(context, seq, Failure::new(CallStage::Deliver, error)).await,
		}
	}

	async fn reject(&self, context: &dyn ExecutionContext, seq: u64, failure: Failure) -> CallOutcome {
		let Failure { stage, error } = failure;
		let rejection = match error {
			FunctionError::Runtime(error) if abandons(stage, &error) => return self.abandon(seq, stage, error),
			error => self.rejection(error),
		};

		let evaluation = match &rejection {
			Rejection::Error { name, message, stack } => {
				scripts::reject_with_error(&self.name, seq, name, message, stack)
			}
			Rejection::Value(value) => scripts::reject_with_value(&self.name, seq, value.clone()),
		};

		match context.evaluate(evaluation).await {
			Ok(_) => {
				debug!(target = "pw", binding = %self.name, seq, ?stage, "binding call rejected");
				CallOutcome::Rejected(rejection)
			}
			Err(error) => self.abandon(seq, CallStage::Deliver, error),
		}
	}

	fn rejection(&self, error: FunctionError) -> Rejection {
		let (name, message, stack) = match error {
			FunctionError::Value(value) => return Rejection::Value(value),
			FunctionError::Thrown { name, message, stack } => (name, message, stack),
			FunctionError::Runtime(Error::Remote { name, message, stack }) => (name, message, stack),
			FunctionError::Runtime(Error::Timeout(message)) => ("TimeoutError".to_string(), message, None),
			FunctionError::Runtime(error) => ("Error".to_string(), error.to_string(), None),
		};
		let stack = stack
			.filter(|stack| !stack.is_empty())
			.unwrap_or_else(|| format!("{name}: {message}\n    at {} (exposed binding)", self.name));
		Rejection::Error { name, message, stack }
	}

	fn abandon(&self, seq: u64, stage: CallStage, error: Error) -> CallOutcome {
		debug!(target = "pw", binding = %self.name, seq, ?stage, %error, "abandoning binding call");
		CallOutcome::Abandoned { stage, error }
	}
}

impl std::fmt::Debug for Binding {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Binding").field("name", &self.name).finish_non_exhaustive()
	}
}

/// Whether `error` at `stage` ends the call without writing anything back.
///
/// The function's own failures only abandon when the page is gone. Remote
/// writes also abandon when they race a timeout.
fn abandons(stage: CallStage, error: &Error) -> bool {
	match stage {
		CallStage::Invoke => error.is_disconnected(),
		CallStage::FetchArguments | CallStage::Deliver => error.is_transport(),
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	if let Some(message) = panic.downcast_ref::<&'static str>() {
		message
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message
	} else {
		"unknown panic"
	}
}
