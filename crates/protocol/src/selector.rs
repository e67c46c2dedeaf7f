//! Selector query options.

use serde::{Deserialize, Serialize};

/// Default time to wait for a selector, in milliseconds.
pub const DEFAULT_SELECTOR_TIMEOUT_MS: u64 = 30_000;

/// How often the remote side re-evaluates a pending selector wait.
///
/// Serialized as `"raf"`, `"mutation"`, or a number of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polling {
	/// Re-evaluate on every animation frame.
	#[default]
	Raf,
	/// Re-evaluate on DOM mutations.
	Mutation,
	/// Re-evaluate every N milliseconds.
	Interval(u64),
}

impl Serialize for Polling {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Self::Raf => serializer.serialize_str("raf"),
			Self::Mutation => serializer.serialize_str("mutation"),
			Self::Interval(ms) => serializer.serialize_u64(*ms),
		}
	}
}

impl<'de> Deserialize<'de> for Polling {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			Name(String),
			Interval(u64),
		}

		match Raw::deserialize(deserializer)? {
			Raw::Name(name) if name == "raf" => Ok(Self::Raf),
			Raw::Name(name) if name == "mutation" => Ok(Self::Mutation),
			Raw::Name(other) => Err(serde::de::Error::custom(format!(
				"unknown polling mode '{other}'"
			))),
			Raw::Interval(ms) => Ok(Self::Interval(ms)),
		}
	}
}

/// Options for waiting until a selector matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForSelectorOptions {
	/// Wait for the element to be present and visible.
	#[serde(default)]
	pub visible: bool,
	/// Wait for the element to be absent or hidden.
	#[serde(default)]
	pub hidden: bool,
	/// Maximum time to wait in milliseconds, `0` disables the timeout.
	#[serde(default = "default_timeout")]
	pub timeout: u64,
	/// Re-evaluation strategy.
	#[serde(default)]
	pub polling: Polling,
}

fn default_timeout() -> u64 {
	DEFAULT_SELECTOR_TIMEOUT_MS
}

impl Default for WaitForSelectorOptions {
	fn default() -> Self {
		Self {
			visible: false,
			hidden: false,
			timeout: DEFAULT_SELECTOR_TIMEOUT_MS,
			polling: Polling::default(),
		}
	}
}

impl WaitForSelectorOptions {
	/// Creates a new builder for wait options.
	pub fn builder() -> WaitForSelectorOptionsBuilder {
		WaitForSelectorOptionsBuilder::default()
	}
}

/// Builder for [`WaitForSelectorOptions`].
#[derive(Debug, Clone, Default)]
pub struct WaitForSelectorOptionsBuilder {
	options: WaitForSelectorOptions,
}

impl WaitForSelectorOptionsBuilder {
	/// Waits for the element to be visible.
	pub fn visible(mut self, value: bool) -> Self {
		self.options.visible = value;
		self
	}

	/// Waits for the element to be hidden or detached.
	pub fn hidden(mut self, value: bool) -> Self {
		self.options.hidden = value;
		self
	}

	/// Sets the timeout in milliseconds.
	pub fn timeout(mut self, timeout_ms: u64) -> Self {
		self.options.timeout = timeout_ms;
		self
	}

	/// Sets the polling strategy.
	pub fn polling(mut self, polling: Polling) -> Self {
		self.options.polling = polling;
		self
	}

	pub fn build(self) -> WaitForSelectorOptions {
		self.options
	}
}
