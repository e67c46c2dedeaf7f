//! Scripts sent to a remote execution context.

use std::borrow::Cow;
use std::sync::Arc;

use serde_json::Value;

use crate::handle::RemoteHandle;

/// One positional argument of an [`Evaluation`].
#[derive(Debug, Clone)]
pub enum EvaluationArg {
	/// Serialized and structurally cloned into the remote context.
	Value(Value),
	/// Passed by reference; the remote function receives the live object.
	///
	/// The handle must stay undisposed until the evaluation completes.
	Handle(Arc<dyn RemoteHandle>),
}

impl EvaluationArg {
	pub fn as_value(&self) -> Option<&Value> {
		match self {
			Self::Value(value) => Some(value),
			Self::Handle(_) => None,
		}
	}

	pub fn as_handle(&self) -> Option<&Arc<dyn RemoteHandle>> {
		match self {
			Self::Value(_) => None,
			Self::Handle(handle) => Some(handle),
		}
	}
}

impl PartialEq for EvaluationArg {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Value(a), Self::Value(b)) => a == b,
			(Self::Handle(a), Self::Handle(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}
}

/// A function to run inside the remote execution context.
///
/// `function` is JavaScript source text for a function expression. The remote
/// side calls it with `args` as positional parameters, so the first free
/// variables of the function are the supplied arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
	function: Cow<'static, str>,
	args: Vec<EvaluationArg>,
}

impl Evaluation {
	/// Creates an evaluation of `function` with no arguments.
	pub fn new(function: impl Into<Cow<'static, str>>) -> Self {
		Self {
			function: function.into(),
			args: Vec::new(),
		}
	}

	/// Appends an already-materialized argument.
	pub fn arg(mut self, value: impl Into<Value>) -> Self {
		self.args.push(EvaluationArg::Value(value.into()));
		self
	}

	/// Appends a live reference as the next argument.
	pub fn handle(mut self, handle: Arc<dyn RemoteHandle>) -> Self {
		self.args.push(EvaluationArg::Handle(handle));
		self
	}

	/// Appends every handle in `handles` as its own argument.
	pub fn handles(mut self, handles: impl IntoIterator<Item = Arc<dyn RemoteHandle>>) -> Self {
		self.args.extend(handles.into_iter().map(EvaluationArg::Handle));
		self
	}

	/// Returns the function source text.
	pub fn function(&self) -> &str {
		&self.function
	}

	/// Returns the positional arguments.
	pub fn args(&self) -> &[EvaluationArg] {
		&self.args
	}

	/// Returns the argument at `index` if it was passed by value.
	pub fn arg_at(&self, index: usize) -> Option<&Value> {
		self.args.get(index).and_then(EvaluationArg::as_value)
	}

	/// Returns the argument at `index` if it was passed by reference.
	pub fn handle_at(&self, index: usize) -> Option<&Arc<dyn RemoteHandle>> {
		self.args.get(index).and_then(EvaluationArg::as_handle)
	}
}
