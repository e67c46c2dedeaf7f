//! Wire types for the page binding bridge.
//!
//! This crate contains the serde-serializable types exchanged with a remote
//! execution context (a page inside the browser engine). These types represent
//! the "protocol layer" - the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization/deserialization
//! - **1:1 with protocol**: Match the remote engine's object descriptions
//! - **Stable**: Changes only when the wire protocol changes
//!
//! Higher-level APIs are built on top of these types in `pw-bridge`.

pub mod binding;
pub mod remote_object;
pub mod selector;

pub use binding::*;
pub use remote_object::*;
pub use selector::*;
