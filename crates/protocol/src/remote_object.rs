//! Descriptions of values living inside a remote execution context.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mirror object referencing a value in the remote execution context.
///
/// The remote engine sends one of these for every value it does not fully
/// materialize. `object_id` is present when the value can be addressed later
/// (and therefore has to be released).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
	/// Object type (`object`, `function`, `string`, `number`, ...).
	#[serde(rename = "type")]
	pub kind: String,
	/// Object subtype hint, only reported for `object` values.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subtype: Option<RemoteObjectSubtype>,
	/// Constructor name of the remote object.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub class_name: Option<String>,
	/// Primitive value, or the structured clone of a serializable object.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	/// String representation of the object.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Unique identifier used to address the object remotely.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub object_id: Option<String>,
}

impl RemoteObject {
	/// Creates a description of a plain materialized value.
	pub fn from_value(value: Value) -> Self {
		let kind = match &value {
			Value::Null => "object",
			Value::Bool(_) => "boolean",
			Value::Number(_) => "number",
			Value::String(_) => "string",
			Value::Array(_) | Value::Object(_) => "object",
		};
		let subtype = match &value {
			Value::Null => Some(RemoteObjectSubtype::Null),
			Value::Array(_) => Some(RemoteObjectSubtype::Array),
			_ => None,
		};
		Self {
			kind: kind.to_string(),
			subtype,
			class_name: None,
			value: Some(value),
			description: None,
			object_id: None,
		}
	}

	/// Creates a description of a DOM node addressed by `object_id`.
	pub fn node(object_id: impl Into<String>, class_name: impl Into<String>) -> Self {
		let class_name = class_name.into();
		Self {
			kind: "object".to_string(),
			subtype: Some(RemoteObjectSubtype::Node),
			description: Some(class_name.clone()),
			class_name: Some(class_name),
			value: None,
			object_id: Some(object_id.into()),
		}
	}

	/// Returns true if the remote value is a DOM node.
	pub fn is_node(&self) -> bool {
		self.subtype.is_some_and(RemoteObjectSubtype::is_node)
	}
}

/// Subtype tag reported for remote `object` values.
///
/// Unknown tags deserialize to [`RemoteObjectSubtype::Other`] so newer engines
/// don't break argument materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteObjectSubtype {
	/// DOM node (element, text node, document, ...)
	Node,
	/// Array
	Array,
	/// `null`
	Null,
	/// Regular expression
	Regexp,
	/// Date
	Date,
	/// Map
	Map,
	/// Set
	Set,
	/// WeakMap
	Weakmap,
	/// WeakSet
	Weakset,
	/// Iterator
	Iterator,
	/// Generator
	Generator,
	/// Error object
	Error,
	/// Proxy
	Proxy,
	/// Promise
	Promise,
	/// Typed array
	Typedarray,
	/// ArrayBuffer
	Arraybuffer,
	/// DataView
	Dataview,
	/// Unrecognized subtype tag
	#[serde(other)]
	Other,
}

impl RemoteObjectSubtype {
	/// Returns true for DOM-node-like values.
	pub fn is_node(self) -> bool {
		matches!(self, Self::Node)
	}
}
