//! Registry of custom query engines.

use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use parking_lot::RwLock;
use pw_bridge_runtime::{Error, Result};
use regex::Regex;
use tracing::debug;

/// Names taken by engines built into the remote side.
const BUILTIN_ENGINES: &[&str] = &["aria", "pierce", "text", "xpath"];

static ENGINE_NAME: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[a-zA-Z]+$").expect("engine name pattern is valid"));

/// A selector engine that runs inside the page.
///
/// Both implementations are JavaScript function source text of the form
/// `(node, selector) => ...`; they are transmitted to the page and rebuilt
/// there, never called from Rust.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEngine {
	query_one: Arc<str>,
	query_all: Arc<str>,
}

impl QueryEngine {
	/// Creates an engine from both single-match and all-matches sources.
	pub fn new(query_one: impl Into<Arc<str>>, query_all: impl Into<Arc<str>>) -> Self {
		Self {
			query_one: query_one.into(),
			query_all: query_all.into(),
		}
	}

	/// Creates an engine from a single-match source; all-matches wraps it.
	pub fn from_query_one(query_one: impl Into<Arc<str>>) -> Self {
		let query_one = query_one.into();
		let query_all = format!(
			"(node, selector) => {{ const result = ({query_one})(node, selector); return result ? [result] : []; }}"
		);
		Self {
			query_one,
			query_all: query_all.into(),
		}
	}

	/// Creates an engine from an all-matches source; single-match takes the first hit.
	pub fn from_query_all(query_all: impl Into<Arc<str>>) -> Self {
		let query_all = query_all.into();
		let query_one = format!(
			"(node, selector) => {{ for (const result of ({query_all})(node, selector)) {{ return result; }} return null; }}"
		);
		Self {
			query_one: query_one.into(),
			query_all,
		}
	}

	/// Source text of the single-match function.
	pub fn query_one_source(&self) -> &str {
		&self.query_one
	}

	/// Source text of the all-matches function.
	pub fn query_all_source(&self) -> &str {
		&self.query_all
	}
}

/// Named custom query engines, in registration order.
///
/// Cloning shares the same registry. Pass one instance to every
/// [`QueryDispatcher`](super::QueryDispatcher) that should install it.
#[derive(Debug, Clone, Default)]
pub struct QueryEngineRegistry {
	engines: Arc<RwLock<IndexMap<String, QueryEngine>>>,
}

impl QueryEngineRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `engine` under `name`.
	///
	/// # Errors
	///
	/// - [`Error::InvalidQueryEngineName`] if `name` is not made of ASCII letters
	/// - [`Error::DuplicateQueryEngine`] if `name` is taken, including by a
	///   built-in engine
	pub fn register(&self, name: &str, engine: QueryEngine) -> Result<()> {
		if !ENGINE_NAME.is_match(name) {
			return Err(Error::InvalidQueryEngineName(name.to_string()));
		}
		if BUILTIN_ENGINES.contains(&name) {
			return Err(Error::DuplicateQueryEngine(name.to_string()));
		}

		let mut engines = self.engines.write();
		if engines.contains_key(name) {
			return Err(Error::DuplicateQueryEngine(name.to_string()));
		}
		engines.insert(name.to_string(), engine);
		debug!(target = "pw", engine = name, "registered query engine");
		Ok(())
	}

	/// Removes the engine registered under `name`.
	///
	/// Pages it was already installed into keep their copy until they navigate.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] if no engine is registered under `name`.
	pub fn unregister(&self, name: &str) -> Result<QueryEngine> {
		self.engines
			.write()
			.shift_remove(name)
			.ok_or_else(|| Error::InvalidArgument(format!("Cannot unregister unknown query engine '{name}'")))
	}

	pub fn get(&self, name: &str) -> Option<QueryEngine> {
		self.engines.read().get(name).cloned()
	}

	/// Returns registered names in registration order.
	pub fn names(&self) -> Vec<String> {
		self.engines.read().keys().cloned().collect()
	}

	/// Returns a copy of every registration, in registration order.
	///
	/// Lets callers await per engine without holding the lock.
	pub fn snapshot(&self) -> Vec<(String, QueryEngine)> {
		self.engines
			.read()
			.iter()
			.map(|(name, engine)| (name.clone(), engine.clone()))
			.collect()
	}

	pub fn clear(&self) {
		self.engines.write().clear();
	}

	pub fn len(&self) -> usize {
		self.engines.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.engines.read().is_empty()
	}
}
