//! Per-page registry of exposed bindings.
//!
//! Uses [`DashMap`] so `bindingCalled` notifications can be dispatched while
//! other tasks expose or remove bindings. Entries are cloned out before any
//! await, so no shard lock is held across a remote round-trip.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use pw_bridge_protocol::BindingCalledPayload;
use pw_bridge_runtime::{Error, ExecutionContext, Result};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Binding, CallOutcome};

/// Why a `bindingCalled` notification was not serviced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoredCall {
	/// The payload was not valid JSON of the expected shape.
	Malformed(String),
	/// The payload was for a bootstrap-internal binding.
	NotExposedFunction { name: String },
	/// No binding is exposed under the payload's name.
	UnknownBinding { name: String, seq: u64 },
}

/// Result of dispatching one `bindingCalled` notification.
#[derive(Debug)]
pub enum DispatchOutcome {
	/// The notification was dropped without touching the page.
	Ignored(IgnoredCall),
	/// The binding ran; see `outcome` for how the page promise ended.
	Called {
		name: String,
		seq: u64,
		outcome: CallOutcome,
	},
}

impl DispatchOutcome {
	/// Returns the call outcome, if a binding ran.
	pub fn call_outcome(&self) -> Option<&CallOutcome> {
		match self {
			Self::Called { outcome, .. } => Some(outcome),
			Self::Ignored(_) => None,
		}
	}

	pub fn is_ignored(&self) -> bool {
		matches!(self, Self::Ignored(_))
	}
}

/// Bindings exposed on one page, keyed by name.
///
/// Cloning is cheap and shares the underlying map. Scoped to the page that
/// owns it; drop it when the page closes.
#[derive(Clone, Default)]
pub struct BindingRegistry {
	bindings: Arc<DashMap<Arc<str>, Binding>>,
}

impl BindingRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `binding` under its name.
	///
	/// # Errors
	///
	/// Returns [`Error::DuplicateBinding`] if the name is already exposed.
	pub fn expose(&self, binding: Binding) -> Result<()> {
		match self.bindings.entry(Arc::clone(&binding.name)) {
			Entry::Occupied(entry) => Err(Error::DuplicateBinding(entry.key().to_string())),
			Entry::Vacant(entry) => {
				debug!(target = "pw", binding = %binding.name, "exposed binding");
				entry.insert(binding);
				Ok(())
			}
		}
	}

	/// Unregisters the binding named `name` and returns it.
	///
	/// # Errors
	///
	/// Returns [`Error::BindingNotFound`] if nothing is exposed under `name`.
	pub fn remove(&self, name: &str) -> Result<Binding> {
		self.bindings
			.remove(name)
			.map(|(_, binding)| binding)
			.ok_or_else(|| Error::BindingNotFound(name.to_string()))
	}

	pub fn get(&self, name: &str) -> Option<Binding> {
		self.bindings.get(name).map(|entry| entry.value().clone())
	}

	pub fn contains(&self, name: &str) -> bool {
		self.bindings.contains_key(name)
	}

	/// Returns the exposed names in sorted order.
	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.bindings.iter().map(|entry| entry.key().to_string()).collect();
		names.sort();
		names
	}

	pub fn len(&self) -> usize {
		self.bindings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bindings.is_empty()
	}

	/// Services one raw `bindingCalled` payload against `context`.
	///
	/// Malformed payloads, bootstrap-internal calls and unknown names are
	/// ignored; everything else runs [`Binding::call`].
	pub async fn dispatch(&self, context: &dyn ExecutionContext, payload: &str) -> DispatchOutcome {
		let payload = match BindingCalledPayload::parse(payload) {
			Ok(payload) => payload,
			Err(error) => {
				debug!(target = "pw", %error, "ignoring malformed bindingCalled payload");
				return DispatchOutcome::Ignored(IgnoredCall::Malformed(error.to_string()));
			}
		};
		if !payload.is_exposed_function() {
			return DispatchOutcome::Ignored(IgnoredCall::NotExposedFunction { name: payload.name });
		}

		let Some(binding) = self.get(&payload.name) else {
			warn!(target = "pw", binding = %payload.name, seq = payload.seq, "bindingCalled for unknown binding");
			return DispatchOutcome::Ignored(IgnoredCall::UnknownBinding {
				name: payload.name,
				seq: payload.seq,
			});
		};

		let outcome = binding.call(context, payload.seq, payload.args).await;
		DispatchOutcome::Called {
			name: payload.name,
			seq: payload.seq,
			outcome,
		}
	}

	/// Dispatches `payload` on a background task.
	///
	/// Calls for the same binding run concurrently; each is isolated by its
	/// sequence number.
	pub fn spawn_dispatch(
		&self,
		context: Arc<dyn ExecutionContext>,
		payload: String,
	) -> JoinHandle<DispatchOutcome> {
		let registry = self.clone();
		tokio::spawn(async move { registry.dispatch(context.as_ref(), &payload).await })
	}
}

impl std::fmt::Debug for BindingRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BindingRegistry").field("names", &self.names()).finish()
	}
}
