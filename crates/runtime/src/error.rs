//! Error types for the bridge runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a remote execution context.
#[derive(Debug, Error)]
pub enum Error {
	/// Transport-level error (the pipe or socket to the browser failed).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Protocol-level error reported by the browser for a request.
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// Target was closed (browser, context, or page).
	#[error("Target closed: Cannot perform operation on closed {target_type}. {context}")]
	TargetClosed { target_type: String, context: String },

	/// The execution context was destroyed, usually by a navigation.
	#[error("Execution context was destroyed: {0}")]
	ContextDestroyed(String),

	/// Timeout waiting for operation.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// Error thrown by a script evaluated in the remote context.
	#[error("{name}: {message}")]
	Remote {
		/// Error type name (e.g., "TypeError", "Error", "TargetClosedError")
		name: String,
		/// Human-readable error message
		message: String,
		/// JavaScript stack trace (if available)
		stack: Option<String>,
	},

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// Invalid argument provided to method.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// No binding is exposed under this name.
	#[error("Binding not found: '{0}'")]
	BindingNotFound(String),

	/// A binding with this name is already exposed on the page.
	#[error("Failed to add binding: '{0}' already exists")]
	DuplicateBinding(String),

	/// A query engine with this name is already registered.
	#[error("A query engine named '{0}' already exists")]
	DuplicateQueryEngine(String),

	/// Query engine names may only contain ASCII letters.
	#[error("Query engine names may only contain [a-zA-Z], got '{0}'")]
	InvalidQueryEngineName(String),
}

impl Error {
	/// Returns the error name if this is a Remote error.
	pub fn error_name(&self) -> Option<&str> {
		match self {
			Error::Remote { name, .. } => Some(name),
			_ => None,
		}
	}

	/// Returns the stack trace if this is a Remote error with a stack.
	pub fn stack_trace(&self) -> Option<&str> {
		match self {
			Error::Remote { stack, .. } => stack.as_deref(),
			_ => None,
		}
	}

	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		match self {
			Error::Timeout(_) => true,
			Error::Remote { name, .. } => name == "TimeoutError",
			_ => false,
		}
	}

	/// Returns true if this is a target closed error.
	pub fn is_target_closed(&self) -> bool {
		match self {
			Error::TargetClosed { .. } | Error::ChannelClosed => true,
			Error::Remote { name, .. } => name == "TargetClosedError",
			_ => false,
		}
	}

	/// Returns true if the remote context the request was sent to is gone.
	///
	/// Unlike [`is_transport`](Self::is_transport), a timeout does not count:
	/// the context may still be alive and able to receive an answer.
	pub fn is_disconnected(&self) -> bool {
		match self {
			Error::TransportError(_) | Error::ProtocolError(_) | Error::ContextDestroyed(_) => true,
			_ => self.is_target_closed(),
		}
	}

	/// Returns true if the remote side is gone or the request raced a timeout.
	///
	/// Whoever awaited the remote work has already been settled independently,
	/// so callers treat these as "nothing left to do" rather than failures.
	pub fn is_transport(&self) -> bool {
		self.is_disconnected() || self.is_timeout()
	}
}
