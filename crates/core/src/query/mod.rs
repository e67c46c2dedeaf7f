//! Custom query engine installation.
//!
//! Custom engines run against the live DOM, so they cannot be handed to the
//! page by reference: their source text is shipped with an init script that
//! rebuilds them as `window.customQuerySelectorAll_<name>`. The built-in
//! accessibility engine runs on the controller instead and is exposed to the
//! page as a binding under the same naming scheme.
//!
//! [`QueryDispatcher`] makes sure both are in place before delegating any
//! query to the underlying [`SelectorEngine`].

mod registry;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use pw_bridge_protocol::WaitForSelectorOptions;
use pw_bridge_runtime::{BoxFuture, Error, Evaluation, RemoteHandle, Result};
use tracing::debug;

use crate::binding::{Binding, BindingArg, BindingReturn, FunctionError};

pub use registry::{QueryEngine, QueryEngineRegistry};

/// Prefix of the page globals query engines are installed under.
pub const QUERY_ALL_GLOBAL_PREFIX: &str = "customQuerySelectorAll_";

/// Name of the built-in accessibility query engine.
pub const ARIA_ENGINE_NAME: &str = "aria";

/// Rebuilds an engine from its source text as a page global.
pub const INSTALL_QUERY_ENGINE: &str = "(name, functionText) => {
  Object.assign(window, {
    [`customQuerySelectorAll_${name}`]: new Function(`return ${functionText}`)(),
  });
}";

/// Returns the page global an engine named `name` is installed under.
pub fn global_name(name: &str) -> String {
	format!("{QUERY_ALL_GLOBAL_PREFIX}{name}")
}

/// Builds the init script that installs engine `name` from `query_all_source`.
pub fn installer_script(name: &str, query_all_source: &str) -> Evaluation {
	Evaluation::new(INSTALL_QUERY_ENGINE)
		.arg(name)
		.arg(query_all_source)
}

/// The page surface needed to prepare it for queries.
pub trait Page: Send + Sync {
	/// Identifier unique to this page for its whole lifetime.
	fn guid(&self) -> &str;

	/// Exposes `binding` to every frame of the page.
	///
	/// Fails if a binding with the same name is already exposed.
	fn expose_function(&self, binding: Binding) -> BoxFuture<'_, Result<()>>;

	/// Registers `evaluation` to run in every future document of the page,
	/// before any page script.
	fn evaluate_on_new_document(&self, evaluation: Evaluation) -> BoxFuture<'_, Result<()>>;
}

/// A frame, used to resolve its owning page.
pub trait Frame: Send + Sync {
	fn page(&self) -> Arc<dyn Page>;
}

/// A DOM element handle that knows which frame it belongs to.
pub trait Element: RemoteHandle {
	fn frame(&self) -> Arc<dyn Frame>;

	/// Returns the page owning this element's frame.
	fn page(&self) -> Arc<dyn Page> {
		self.frame().page()
	}
}

/// Where a selector wait is rooted.
#[derive(Clone)]
pub enum WaitTarget {
	Element(Arc<dyn Element>),
	Frame(Arc<dyn Frame>),
}

impl WaitTarget {
	/// Returns the page owning the target.
	pub fn page(&self) -> Arc<dyn Page> {
		match self {
			Self::Element(element) => element.page(),
			Self::Frame(frame) => frame.page(),
		}
	}
}

/// The selector engine implementation queries are delegated to.
pub trait SelectorEngine: Send + Sync {
	/// Returns the first element under `element` matching `selector`.
	fn query_one<'a>(
		&'a self,
		element: &'a Arc<dyn Element>,
		selector: &'a str,
	) -> BoxFuture<'a, Result<Option<Arc<dyn Element>>>>;

	/// Returns every element under `element` matching `selector`.
	fn query_all<'a>(
		&'a self,
		element: &'a Arc<dyn Element>,
		selector: &'a str,
	) -> BoxFuture<'a, Result<Vec<Arc<dyn Element>>>>;

	/// Waits until `selector` matches under `target`.
	fn wait_for<'a>(
		&'a self,
		target: &'a WaitTarget,
		selector: &'a str,
		options: &'a WaitForSelectorOptions,
	) -> BoxFuture<'a, Result<Option<Arc<dyn Element>>>>;
}

/// Preparation step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreparationStep {
	/// Exposing the accessibility engine binding.
	ExposeBinding,
	/// Registering an engine's init script.
	InstallScript,
}

impl std::fmt::Display for PreparationStep {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::ExposeBinding => write!(f, "expose binding"),
			Self::InstallScript => write!(f, "install script"),
		}
	}
}

/// An ignored failure while preparing a page.
///
/// Usually the page was already prepared, or is not ready yet and a later
/// preparation will succeed.
#[derive(Debug, thiserror::Error)]
#[error("failed to {step} for query engine '{engine}': {error}")]
pub struct PreparationError {
	pub engine: String,
	pub step: PreparationStep,
	#[source]
	pub error: Error,
}

/// Report of one [`QueryDispatcher::prepare`] run.
#[derive(Debug, Default)]
pub struct Preparation {
	installed: Vec<String>,
	skipped: Vec<String>,
	ignored: Vec<PreparationError>,
}

impl Preparation {
	/// Engines installed or exposed by this run.
	pub fn installed(&self) -> &[String] {
		&self.installed
	}

	/// Engines whose current source the page already had.
	pub fn skipped(&self) -> &[String] {
		&self.skipped
	}

	/// Failures that were ignored.
	pub fn ignored(&self) -> &[PreparationError] {
		&self.ignored
	}

	/// Returns true if every step succeeded.
	pub fn is_clean(&self) -> bool {
		self.ignored.is_empty()
	}

	fn record(&mut self, engine: &str, step: PreparationStep, result: Result<()>) {
		match result {
			Ok(()) => self.installed.push(engine.to_string()),
			Err(error) => {
				debug!(target = "pw", engine, %step, %error, "ignoring query engine preparation failure");
				self.ignored.push(PreparationError {
					engine: engine.to_string(),
					step,
					error,
				});
			}
		}
	}
}

/// Installs query engines into a page before delegating queries to it.
///
/// Every query re-runs [`prepare`](Self::prepare). Init scripts persist for
/// the page's lifetime, so the dispatcher remembers which engine sources each
/// page already has and only registers new or changed ones. Call
/// [`forget`](Self::forget) when a page closes.
#[derive(Clone)]
pub struct QueryDispatcher {
	engines: QueryEngineRegistry,
	aria: Binding,
	delegate: Arc<dyn SelectorEngine>,
	/// Page guid -> engine name -> installed all-matches source.
	installed: Arc<DashMap<String, HashMap<String, Arc<str>>>>,
}

impl QueryDispatcher {
	/// Creates a dispatcher.
	///
	/// `aria_query_all` implements the accessibility engine on the controller;
	/// it is exposed to pages as `customQuerySelectorAll_aria` and usually
	/// returns the matching element handles.
	pub fn new<F, Fut, R>(engines: QueryEngineRegistry, delegate: Arc<dyn SelectorEngine>, aria_query_all: F) -> Self
	where
		F: Fn(Vec<BindingArg>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = std::result::Result<R, FunctionError>> + Send + 'static,
		R: Into<BindingReturn> + 'static,
	{
		Self {
			engines,
			aria: Binding::returning(global_name(ARIA_ENGINE_NAME), aria_query_all),
			delegate,
			installed: Arc::default(),
		}
	}

	pub fn engines(&self) -> &QueryEngineRegistry {
		&self.engines
	}

	/// Makes every query engine available in `page`.
	///
	/// Never fails; failures are reported in the returned [`Preparation`] and
	/// otherwise ignored.
	pub async fn prepare(&self, page: &dyn Page) -> Preparation {
		let mut preparation = Preparation::default();

		let exposed = page.expose_function(self.aria.clone()).await;
		preparation.record(ARIA_ENGINE_NAME, PreparationStep::ExposeBinding, exposed);

		for (name, engine) in self.engines.snapshot() {
			let source = engine.query_all_source();
			if self.has_installed(page, &name, source) {
				preparation.skipped.push(name);
				continue;
			}

			let installed = page.evaluate_on_new_document(installer_script(&name, source)).await;
			if installed.is_ok() {
				self.installed
					.entry(page.guid().to_string())
					.or_default()
					.insert(name.clone(), Arc::from(source));
			}
			preparation.record(&name, PreparationStep::InstallScript, installed);
		}
		preparation
	}

	/// Drops what is remembered about `page`; the next preparation registers
	/// every engine again.
	pub fn forget(&self, page: &dyn Page) {
		self.installed.remove(page.guid());
	}

	fn has_installed(&self, page: &dyn Page, name: &str, source: &str) -> bool {
		self.installed
			.get(page.guid())
			.and_then(|engines| engines.get(name).map(|installed| installed.as_ref() == source))
			.unwrap_or(false)
	}

	/// Returns every element under `element` matching `selector`.
	pub async fn query_all(&self, element: &Arc<dyn Element>, selector: &str) -> Result<Vec<Arc<dyn Element>>> {
		self.prepare(element.page().as_ref()).await;
		self.delegate.query_all(element, selector).await
	}

	/// Returns the first element under `element` matching `selector`.
	pub async fn query_one(&self, element: &Arc<dyn Element>, selector: &str) -> Result<Option<Arc<dyn Element>>> {
		self.prepare(element.page().as_ref()).await;
		self.delegate.query_one(element, selector).await
	}

	/// Waits until `selector` matches under `target`.
	pub async fn wait_for(
		&self,
		target: &WaitTarget,
		selector: &str,
		options: &WaitForSelectorOptions,
	) -> Result<Option<Arc<dyn Element>>> {
		self.prepare(target.page().as_ref()).await;
		self.delegate.wait_for(target, selector, options).await
	}
}

impl std::fmt::Debug for QueryDispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("QueryDispatcher")
			.field("engines", &self.engines.names())
			.finish_non_exhaustive()
	}
}
