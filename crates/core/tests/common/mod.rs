//! In-memory stand-ins for a page's remote execution context.
//!
//! [`FakeRealm`] keeps the per-binding `args`/`callbacks` tables the remote
//! bootstrap would keep in `globalThis[name]`, hands out disposable handles and
//! records every settlement and disposal so tests can assert on them. Handles
//! passed back as evaluation arguments must still be live; a node arrives in a
//! settlement as `{"node": <className>}`.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use pw_bridge::binding::scripts;
use pw_bridge::pw_bridge_protocol::{RemoteObject, WaitForSelectorOptions};
use pw_bridge::pw_bridge_runtime::{
	BoxFuture, Error, Evaluation, EvaluationArg, ExecutionContext, RemoteHandle, RemoteProperty, Result,
};
use pw_bridge::query::INSTALL_QUERY_ENGINE;
use pw_bridge::{Binding, Element, Frame, Page, SelectorEngine, WaitTarget};
use serde_json::{Value, json};

/// A value stored in the remote argument table.
#[derive(Debug, Clone)]
pub enum RemoteValue {
	Json(Value),
	Node { class_name: String },
}

impl RemoteValue {
	pub fn json(value: impl Into<Value>) -> Self {
		Self::Json(value.into())
	}

	pub fn node(class_name: &str) -> Self {
		Self::Node {
			class_name: class_name.to_string(),
		}
	}

	/// What the structured clone in the notification would carry.
	fn clone_for_payload(&self) -> Value {
		match self {
			Self::Json(value) => value.clone(),
			Self::Node { .. } => json!({}),
		}
	}

	fn describe(&self, object_id: String) -> RemoteObject {
		match self {
			Self::Json(value) => RemoteObject::from_value(value.clone()),
			Self::Node { class_name } => RemoteObject::node(object_id, class_name.as_str()),
		}
	}
}

/// How a pending call was settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
	Resolved(Value),
	RejectedWithError { name: String, message: String, stack: String },
	RejectedWithValue(Value),
}

#[derive(Default)]
struct BindingTable {
	args: HashMap<u64, Vec<RemoteValue>>,
	callbacks: HashSet<u64>,
}

#[derive(Default)]
struct RealmState {
	torn_down: bool,
	tables: HashMap<String, BindingTable>,
	settlements: HashMap<(String, u64), Vec<Settlement>>,
	next_handle: u64,
	live_handles: HashSet<u64>,
	dispose_counts: HashMap<u64, usize>,
	dispose_order: Vec<u64>,
	container_handles: HashSet<u64>,
	fail_dispose: bool,
	fail_properties: bool,
	evaluations: Vec<Evaluation>,
}

impl RealmState {
	fn check_alive(&self) -> Result<()> {
		if self.torn_down {
			return Err(Error::ContextDestroyed("Execution context was destroyed".to_string()));
		}
		Ok(())
	}

	fn new_handle_id(&mut self) -> u64 {
		self.next_handle += 1;
		self.live_handles.insert(self.next_handle);
		self.next_handle
	}

	/// Renders an argument as the remote function would see it.
	fn receive(&self, arg: &EvaluationArg) -> Result<Value> {
		let handle = match arg {
			EvaluationArg::Value(value) => return Ok(value.clone()),
			EvaluationArg::Handle(handle) => handle,
		};
		let Some(fake) = handle.downcast_ref::<FakeHandle>() else {
			return Err(Error::InvalidArgument("handle belongs to another context".to_string()));
		};
		if !self.live_handles.contains(&fake.id) {
			return Err(Error::ProtocolError("Could not find object with given id".to_string()));
		}
		let object = fake.remote_object();
		if object.is_node() {
			return Ok(json!({"node": object.class_name.clone().unwrap_or_default()}));
		}
		Ok(object.value.clone().unwrap_or(Value::Null))
	}

	fn settle(&mut self, name: &str, seq: u64, settlement: Settlement) -> Result<Value> {
		let pending = self
			.tables
			.get_mut(name)
			.map(|table| table.callbacks.remove(&seq))
			.unwrap_or(false);
		if !pending {
			return Err(type_error("Cannot read properties of undefined (reading 'resolve')"));
		}
		if let Some(table) = self.tables.get_mut(name) {
			table.args.remove(&seq);
		}
		self.settlements
			.entry((name.to_string(), seq))
			.or_default()
			.push(settlement);
		Ok(Value::Null)
	}
}

fn type_error(message: &str) -> Error {
	Error::Remote {
		name: "TypeError".to_string(),
		message: message.to_string(),
		stack: Some(format!("TypeError: {message}\n    at <anonymous>:1:1")),
	}
}

fn str_arg(evaluation: &Evaluation, index: usize) -> String {
	evaluation
		.arg_at(index)
		.and_then(Value::as_str)
		.unwrap_or_default()
		.to_string()
}

fn seq_arg(evaluation: &Evaluation) -> u64 {
	evaluation.arg_at(1).and_then(Value::as_u64).unwrap_or_default()
}

/// A page realm holding the remote side of every exposed binding.
#[derive(Clone, Default)]
pub struct FakeRealm {
	state: Arc<Mutex<RealmState>>,
}

impl FakeRealm {
	pub fn new() -> Self {
		Self::default()
	}

	/// Simulates page script calling `window[name](...args)`.
	///
	/// Parks the arguments and a pending callback under `seq` and returns the
	/// structured clone the notification would carry.
	pub fn invoke(&self, name: &str, seq: u64, args: Vec<RemoteValue>) -> Vec<Value> {
		let payload = args.iter().map(RemoteValue::clone_for_payload).collect();
		let mut state = self.state.lock();
		let table = state.tables.entry(name.to_string()).or_default();
		table.args.insert(seq, args);
		table.callbacks.insert(seq);
		payload
	}

	/// Like [`invoke`](Self::invoke), rendered as a raw `bindingCalled` payload.
	pub fn invoke_payload(&self, name: &str, seq: u64, args: Vec<RemoteValue>) -> String {
		let args = self.invoke(name, seq, args);
		json!({"type": "exposedFun", "name": name, "seq": seq, "args": args, "isTrusted": false}).to_string()
	}

	/// Destroys the context; every later request fails.
	pub fn tear_down(&self) {
		self.state.lock().torn_down = true;
	}

	/// Makes every dispose request fail (the handles still count as released).
	pub fn fail_dispose(&self) {
		self.state.lock().fail_dispose = true;
	}

	/// Makes every property enumeration fail as if the session dropped.
	pub fn fail_properties(&self) {
		self.state.lock().fail_properties = true;
	}

	/// Hands out a live handle to a node of this realm, as a lookup inside a
	/// bound function would. The caller owns it.
	pub fn node(&self, class_name: &str) -> Arc<dyn RemoteHandle> {
		let id = self.state.lock().new_handle_id();
		Arc::new(FakeHandle {
			id,
			object: RemoteObject::node(format!("fake-object-{id}"), class_name),
			children: Vec::new(),
			realm: self.clone(),
		})
	}

	pub fn settlements(&self, name: &str, seq: u64) -> Vec<Settlement> {
		self.state
			.lock()
			.settlements
			.get(&(name.to_string(), seq))
			.cloned()
			.unwrap_or_default()
	}

	pub fn is_pending(&self, name: &str, seq: u64) -> bool {
		self.state
			.lock()
			.tables
			.get(name)
			.is_some_and(|table| table.callbacks.contains(&seq))
	}

	/// Number of handles handed out so far.
	pub fn handles_created(&self) -> u64 {
		self.state.lock().next_handle
	}

	/// Handles handed out but never disposed.
	pub fn leaked_handles(&self) -> Vec<u64> {
		let mut leaked: Vec<u64> = self.state.lock().live_handles.iter().copied().collect();
		leaked.sort();
		leaked
	}

	/// Handles disposed more than once.
	pub fn double_disposed(&self) -> Vec<u64> {
		self.state
			.lock()
			.dispose_counts
			.iter()
			.filter(|(_, count)| **count > 1)
			.map(|(id, _)| *id)
			.collect()
	}

	/// Handle ids in the order they were disposed.
	pub fn dispose_order(&self) -> Vec<u64> {
		self.state.lock().dispose_order.clone()
	}

	/// Returns true if `id` is an argument container handle.
	pub fn is_container(&self, id: u64) -> bool {
		self.state.lock().container_handles.contains(&id)
	}

	/// Functions of every evaluation issued, in order.
	pub fn evaluated_functions(&self) -> Vec<String> {
		self.state
			.lock()
			.evaluations
			.iter()
			.map(|evaluation| evaluation.function().to_string())
			.collect()
	}
}

impl ExecutionContext for FakeRealm {
	fn evaluate(&self, evaluation: Evaluation) -> BoxFuture<'_, Result<Value>> {
		Box::pin(async move {
			tokio::task::yield_now().await;
			let mut state = self.state.lock();
			state.evaluations.push(evaluation.clone());
			state.check_alive()?;

			let name = str_arg(&evaluation, 0);
			let seq = seq_arg(&evaluation);
			match evaluation.function() {
				scripts::RESOLVE_CALLBACK => {
					let result = match evaluation.args().get(2) {
						Some(arg) => state.receive(arg)?,
						None => Value::Null,
					};
					state.settle(&name, seq, Settlement::Resolved(result))
				}
				scripts::RESOLVE_WITH_HANDLES => {
					let results = evaluation
						.args()
						.iter()
						.skip(2)
						.map(|arg| state.receive(arg))
						.collect::<Result<Vec<_>>>()?;
					state.settle(&name, seq, Settlement::Resolved(Value::Array(results)))
				}
				scripts::REJECT_WITH_ERROR => {
					let settlement = Settlement::RejectedWithError {
						name: str_arg(&evaluation, 2),
						message: str_arg(&evaluation, 3),
						stack: str_arg(&evaluation, 4),
					};
					state.settle(&name, seq, settlement)
				}
				scripts::REJECT_WITH_VALUE => {
					let value = evaluation.arg_at(2).cloned().unwrap_or(Value::Null);
					state.settle(&name, seq, Settlement::RejectedWithValue(value))
				}
				other => Err(Error::InvalidArgument(format!("unsupported script: {other}"))),
			}
		})
	}

	fn evaluate_handle(&self, evaluation: Evaluation) -> BoxFuture<'_, Result<Arc<dyn RemoteHandle>>> {
		Box::pin(async move {
			tokio::task::yield_now().await;
			let mut state = self.state.lock();
			state.evaluations.push(evaluation.clone());
			state.check_alive()?;

			if evaluation.function() != scripts::PENDING_ARGS {
				return Err(Error::InvalidArgument("unsupported script".to_string()));
			}
			let name = str_arg(&evaluation, 0);
			let seq = seq_arg(&evaluation);
			let Some(args) = state.tables.get(&name).and_then(|table| table.args.get(&seq)).cloned() else {
				return Err(type_error("Cannot read properties of undefined (reading 'get')"));
			};

			let id = state.new_handle_id();
			state.container_handles.insert(id);
			let handle: Arc<dyn RemoteHandle> = Arc::new(FakeHandle {
				id,
				object: RemoteObject::from_value(json!([])),
				children: args,
				realm: self.clone(),
			});
			Ok(handle)
		})
	}
}

/// Handle into a [`FakeRealm`].
pub struct FakeHandle {
	pub id: u64,
	object: RemoteObject,
	children: Vec<RemoteValue>,
	realm: FakeRealm,
}

impl RemoteHandle for FakeHandle {
	fn remote_object(&self) -> &RemoteObject {
		&self.object
	}

	fn get_properties(&self) -> BoxFuture<'_, Result<Vec<RemoteProperty>>> {
		Box::pin(async move {
			tokio::task::yield_now().await;
			let mut state = self.realm.state.lock();
			state.check_alive()?;
			if state.fail_properties {
				return Err(Error::ProtocolError("Target closed".to_string()));
			}

			let mut properties = Vec::with_capacity(self.children.len());
			for (index, child) in self.children.iter().enumerate() {
				let id = state.new_handle_id();
				let handle: Arc<dyn RemoteHandle> = Arc::new(FakeHandle {
					id,
					object: child.describe(format!("fake-object-{id}")),
					children: Vec::new(),
					realm: self.realm.clone(),
				});
				properties.push((index.to_string(), handle));
			}
			Ok(properties)
		})
	}

	fn dispose(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let mut state = self.realm.state.lock();
			*state.dispose_counts.entry(self.id).or_default() += 1;
			state.dispose_order.push(self.id);
			state.live_handles.remove(&self.id);
			if state.fail_dispose {
				return Err(Error::ProtocolError("Could not find object with given id".to_string()));
			}
			state.check_alive()
		})
	}
}

static NEXT_PAGE: AtomicU64 = AtomicU64::new(1);

/// A page recording exposed bindings and init scripts.
pub struct FakePage {
	guid: String,
	exposed: Mutex<HashMap<String, Binding>>,
	init_scripts: Mutex<Vec<Evaluation>>,
	fail_init_scripts: Mutex<bool>,
}

impl FakePage {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			guid: format!("page@{}", NEXT_PAGE.fetch_add(1, Ordering::Relaxed)),
			exposed: Mutex::default(),
			init_scripts: Mutex::default(),
			fail_init_scripts: Mutex::default(),
		})
	}

	pub fn fail_init_scripts(&self, fail: bool) {
		*self.fail_init_scripts.lock() = fail;
	}

	pub fn exposed_names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.exposed.lock().keys().cloned().collect();
		names.sort();
		names
	}

	pub fn exposed(&self, name: &str) -> Option<Binding> {
		self.exposed.lock().get(name).cloned()
	}

	pub fn init_script_count(&self) -> usize {
		self.init_scripts.lock().len()
	}

	/// Globals a fresh document ends up with after running every init script
	/// in order, as `name -> function source`.
	pub fn installed_globals(&self) -> HashMap<String, String> {
		let mut globals = HashMap::new();
		for script in self.init_scripts.lock().iter() {
			if script.function() != INSTALL_QUERY_ENGINE {
				continue;
			}
			let name = str_arg(script, 0);
			let source = str_arg(script, 1);
			globals.insert(format!("customQuerySelectorAll_{name}"), source);
		}
		globals
	}
}

impl Page for FakePage {
	fn guid(&self) -> &str {
		&self.guid
	}

	fn expose_function(&self, binding: Binding) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let mut exposed = self.exposed.lock();
			if exposed.contains_key(binding.name()) {
				return Err(Error::DuplicateBinding(binding.name().to_string()));
			}
			exposed.insert(binding.name().to_string(), binding);
			Ok(())
		})
	}

	fn evaluate_on_new_document(&self, evaluation: Evaluation) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			if *self.fail_init_scripts.lock() {
				return Err(Error::TargetClosed {
					target_type: "Page".to_string(),
					context: "page is closing".to_string(),
				});
			}
			self.init_scripts.lock().push(evaluation);
			Ok(())
		})
	}
}

pub struct FakeFrame {
	pub page: Arc<FakePage>,
}

impl Frame for FakeFrame {
	fn page(&self) -> Arc<dyn Page> {
		self.page.clone()
	}
}

pub struct FakeElement {
	object: RemoteObject,
	frame: Arc<FakeFrame>,
}

impl FakeElement {
	pub fn new(frame: Arc<FakeFrame>, class_name: &str) -> Arc<dyn Element> {
		Arc::new(Self {
			object: RemoteObject::node(format!("element-{class_name}"), class_name),
			frame,
		})
	}
}

impl RemoteHandle for FakeElement {
	fn remote_object(&self) -> &RemoteObject {
		&self.object
	}

	fn get_properties(&self) -> BoxFuture<'_, Result<Vec<RemoteProperty>>> {
		Box::pin(async { Ok(Vec::new()) })
	}

	fn dispose(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async { Ok(()) })
	}
}

impl Element for FakeElement {
	fn frame(&self) -> Arc<dyn Frame> {
		self.frame.clone()
	}
}

/// Selector engine that records, per query, which page globals were installed
/// at the time it ran.
pub struct RecordingEngine {
	pub page: Arc<FakePage>,
	pub frame: Arc<FakeFrame>,
	pub seen: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingEngine {
	pub fn new(page: Arc<FakePage>) -> Arc<Self> {
		let frame = Arc::new(FakeFrame { page: page.clone() });
		Arc::new(Self {
			page,
			frame,
			seen: Mutex::new(Vec::new()),
		})
	}

	fn record(&self, operation: &str) {
		let mut globals: Vec<String> = self.page.installed_globals().into_keys().collect();
		globals.extend(self.page.exposed_names());
		globals.sort();
		self.seen.lock().push((operation.to_string(), globals));
	}

	fn element(&self, class_name: &str) -> Arc<dyn Element> {
		FakeElement::new(self.frame.clone(), class_name)
	}
}

impl SelectorEngine for RecordingEngine {
	fn query_one<'a>(
		&'a self,
		_element: &'a Arc<dyn Element>,
		selector: &'a str,
	) -> BoxFuture<'a, Result<Option<Arc<dyn Element>>>> {
		Box::pin(async move {
			self.record("query_one");
			Ok((!selector.is_empty()).then(|| self.element("HTMLDivElement")))
		})
	}

	fn query_all<'a>(
		&'a self,
		_element: &'a Arc<dyn Element>,
		_selector: &'a str,
	) -> BoxFuture<'a, Result<Vec<Arc<dyn Element>>>> {
		Box::pin(async move {
			self.record("query_all");
			Ok(vec![self.element("HTMLLIElement"), self.element("HTMLLIElement")])
		})
	}

	fn wait_for<'a>(
		&'a self,
		_target: &'a WaitTarget,
		_selector: &'a str,
		options: &'a WaitForSelectorOptions,
	) -> BoxFuture<'a, Result<Option<Arc<dyn Element>>>> {
		Box::pin(async move {
			self.record("wait_for");
			Ok((!options.hidden).then(|| self.element("HTMLButtonElement")))
		})
	}
}

/// Installs a test-writer subscriber once, for debugging failures.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::TRACE)
		.try_init();
}
