//! Remote-side scripts issued while servicing a binding call.
//!
//! They assume the remote bootstrap created `globalThis[name]` with an `args`
//! map and a `callbacks` map keyed by sequence number.

use pw_bridge_runtime::Evaluation;
use serde_json::Value;

use super::BindingReturn;

/// Returns the live argument array parked for a call.
pub const PENDING_ARGS: &str = "(name, seq) => globalThis[name].args.get(seq)";

/// Resolves the pending promise of a call and forgets it.
pub const RESOLVE_CALLBACK: &str = "(name, seq, result) => {
  const callbacks = globalThis[name].callbacks;
  callbacks.get(seq).resolve(result);
  callbacks.delete(seq);
}";

/// Resolves the pending promise of a call with the objects passed after `seq`.
pub const RESOLVE_WITH_HANDLES: &str = "(name, seq, ...results) => {
  const callbacks = globalThis[name].callbacks;
  callbacks.get(seq).resolve(results);
  callbacks.delete(seq);
}";

/// Rejects the pending promise of a call with a rebuilt `Error`.
pub const REJECT_WITH_ERROR: &str = "(name, seq, errorName, message, stack) => {
  const error = new Error(message);
  error.name = errorName;
  error.stack = stack;
  const callbacks = globalThis[name].callbacks;
  callbacks.get(seq).reject(error);
  callbacks.delete(seq);
}";

/// Rejects the pending promise of a call with an arbitrary value.
pub const REJECT_WITH_VALUE: &str = "(name, seq, error) => {
  const callbacks = globalThis[name].callbacks;
  callbacks.get(seq).reject(error);
  callbacks.delete(seq);
}";

pub(crate) fn pending_args(name: &str, seq: u64) -> Evaluation {
	Evaluation::new(PENDING_ARGS).arg(name).arg(seq)
}

pub(crate) fn resolve(name: &str, seq: u64, result: BindingReturn) -> Evaluation {
	match result {
		BindingReturn::Value(value) => Evaluation::new(RESOLVE_CALLBACK).arg(name).arg(seq).arg(value),
		BindingReturn::Handle(handle) => Evaluation::new(RESOLVE_CALLBACK).arg(name).arg(seq).handle(handle),
		BindingReturn::Handles(handles) => Evaluation::new(RESOLVE_WITH_HANDLES)
			.arg(name)
			.arg(seq)
			.handles(handles),
	}
}

pub(crate) fn reject_with_error(
	name: &str,
	seq: u64,
	error_name: &str,
	message: &str,
	stack: &str,
) -> Evaluation {
	Evaluation::new(REJECT_WITH_ERROR)
		.arg(name)
		.arg(seq)
		.arg(error_name)
		.arg(message)
		.arg(stack)
}

pub(crate) fn reject_with_value(name: &str, seq: u64, error: Value) -> Evaluation {
	Evaluation::new(REJECT_WITH_VALUE).arg(name).arg(seq).arg(error)
}
