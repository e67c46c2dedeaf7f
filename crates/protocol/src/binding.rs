//! Payloads emitted by the remote bootstrap when an exposed binding is invoked.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of binding call reported by the remote bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingCallKind {
	/// A call to a function exposed with `expose_function`.
	#[serde(rename = "exposedFun")]
	ExposedFunction,
	/// Any other bootstrap-internal call.
	#[serde(other)]
	Other,
}

/// Payload of a `bindingCalled` notification.
///
/// The remote side has already stored the live argument array under
/// `globalThis[name].args.get(seq)` and a resolve/reject pair under
/// `globalThis[name].callbacks.get(seq)` before this payload is sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingCalledPayload {
	/// Kind of call.
	#[serde(rename = "type")]
	pub kind: BindingCallKind,
	/// Binding name.
	pub name: String,
	/// Sequence number, unique per binding name for the life of the context.
	pub seq: u64,
	/// Structured clone of the arguments. Values that could not be cloned
	/// (DOM nodes, functions) arrive as `null` or `{}` placeholders.
	#[serde(default)]
	pub args: Vec<Value>,
	/// Whether the call originated from a trusted user gesture.
	#[serde(default)]
	pub is_trusted: bool,
}

impl BindingCalledPayload {
	/// Parses a raw payload string as sent by the remote bootstrap.
	pub fn parse(raw: &str) -> serde_json::Result<Self> {
		serde_json::from_str(raw)
	}

	/// Returns true if this call targets an exposed function.
	pub fn is_exposed_function(&self) -> bool {
		self.kind == BindingCallKind::ExposedFunction
	}
}
