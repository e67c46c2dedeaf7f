//! Live references to values in a remote execution context.

use std::sync::Arc;

use downcast_rs::{DowncastSync, impl_downcast};
use pw_bridge_protocol::RemoteObject;

use crate::context::BoxFuture;
use crate::error::Result;

/// A named property of a remote object, as `(key, handle)`.
///
/// Array-like objects report their indexed properties with decimal keys.
pub type RemoteProperty = (String, Arc<dyn RemoteHandle>);

/// Opaque reference to a value living in the remote execution context.
///
/// The remote value stays pinned until [`dispose`](RemoteHandle::dispose) is
/// called. Transports implement this for their handle types; bound functions
/// can recover the concrete type with `downcast_arc`.
pub trait RemoteHandle: DowncastSync {
	/// Returns the description of the referenced value.
	fn remote_object(&self) -> &RemoteObject;

	/// Enumerates the object's own properties in remote order.
	///
	/// Every returned handle is owned by the caller.
	fn get_properties(&self) -> BoxFuture<'_, Result<Vec<RemoteProperty>>>;

	/// Releases the remote reference.
	fn dispose(&self) -> BoxFuture<'_, Result<()>>;

	/// Returns true if the referenced value is a DOM node.
	fn is_node(&self) -> bool {
		self.remote_object().is_node()
	}
}

impl_downcast!(sync RemoteHandle);

impl std::fmt::Debug for dyn RemoteHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let object = self.remote_object();
		f.debug_struct("RemoteHandle")
			.field("type", &object.kind)
			.field("subtype", &object.subtype)
			.field("object_id", &object.object_id)
			.finish()
	}
}
