//! Node types.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GraphError;
use crate::graph::Graph;
use crate::proxy::Proxy;
use crate::target::Target;

/// Position of a node within its graph. Fixed at append time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
  pub(crate) fn new(index: usize) -> Self {
    Self(index)
  }

  pub fn index(self) -> usize {
    self.0
  }
}

impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "%{}", self.0)
  }
}

/// A node to append to a graph.
#[derive(Debug)]
pub enum Node {
  /// A deferred call of a target.
  Operation(Invocation),
  /// Halts execution of a sequential graph when reached.
  EarlyStop,
  /// Runs the owned child graph in place when reached.
  BridgeExecute(Graph),
}

/// Operand supplied by user code: a literal or another node's eventual result.
#[derive(Debug, Clone)]
pub enum Input {
  Value(Value),
  Proxy(Proxy),
}

impl From<Value> for Input {
  fn from(value: Value) -> Self {
    Self::Value(value)
  }
}

impl From<Proxy> for Input {
  fn from(proxy: Proxy) -> Self {
    Self::Proxy(proxy)
  }
}

impl From<&Proxy> for Input {
  fn from(proxy: &Proxy) -> Self {
    Self::Proxy(proxy.clone())
  }
}

impl From<&str> for Input {
  fn from(value: &str) -> Self {
    Self::Value(Value::from(value))
  }
}

impl From<String> for Input {
  fn from(value: String) -> Self {
    Self::Value(Value::from(value))
  }
}

impl From<i64> for Input {
  fn from(value: i64) -> Self {
    Self::Value(Value::from(value))
  }
}

impl From<f64> for Input {
  fn from(value: f64) -> Self {
    Self::Value(Value::from(value))
  }
}

impl From<bool> for Input {
  fn from(value: bool) -> Self {
    Self::Value(Value::from(value))
  }
}

/// A target plus its positional and keyword operands.
#[derive(Clone)]
pub struct Invocation {
  pub(crate) target: Rc<dyn Target>,
  pub(crate) args: Vec<Input>,
  pub(crate) kwargs: Vec<(String, Input)>,
  pub(crate) validate: Option<bool>,
}

impl Invocation {
  pub fn new(target: impl Target + 'static) -> Self {
    Self::shared(Rc::new(target))
  }

  pub fn shared(target: Rc<dyn Target>) -> Self {
    Self {
      target,
      args: Vec::new(),
      kwargs: Vec::new(),
      validate: None,
    }
  }

  pub fn arg(mut self, input: impl Into<Input>) -> Self {
    self.args.push(input.into());
    self
  }

  pub fn args<I>(mut self, inputs: I) -> Self
  where
    I: IntoIterator,
    I::Item: Into<Input>,
  {
    self.args.extend(inputs.into_iter().map(Into::into));
    self
  }

  /// Adds a keyword operand. A repeated name replaces the earlier operand.
  pub fn kwarg(mut self, name: impl Into<String>, input: impl Into<Input>) -> Self {
    let name = name.into();
    self.kwargs.retain(|(existing, _)| *existing != name);
    self.kwargs.push((name, input.into()));
    self
  }

  /// Requests (or suppresses) eager scan-mode validation at append time.
  /// When unset, the graph's configured default applies.
  pub fn validate(mut self, validate: bool) -> Self {
    self.validate = Some(validate);
    self
  }

  pub fn target_name(&self) -> &str {
    self.target.name()
  }
}

impl fmt::Debug for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Invocation")
      .field("target", &self.target.name())
      .field("args", &self.args)
      .field("kwargs", &self.kwargs)
      .field("validate", &self.validate)
      .finish()
  }
}

/// Materialization state of one node, shared with its proxies.
#[derive(Debug)]
pub(crate) struct Slot {
  node: NodeId,
  result: RefCell<Option<Value>>,
  scan: RefCell<Option<Value>>,
}

impl Slot {
  pub(crate) fn new(node: NodeId) -> Self {
    Self {
      node,
      result: RefCell::new(None),
      scan: RefCell::new(None),
    }
  }

  pub(crate) fn node(&self) -> NodeId {
    self.node
  }

  pub(crate) fn result(&self) -> Option<Value> {
    self.result.borrow().clone()
  }

  pub(crate) fn set_result(&self, value: Value) {
    *self.result.borrow_mut() = Some(value);
  }

  pub(crate) fn clear(&self) {
    self.result.borrow_mut().take();
  }

  pub(crate) fn scan_value(&self) -> Option<Value> {
    self.scan.borrow().clone()
  }

  pub(crate) fn set_scan_value(&self, value: Value) {
    *self.scan.borrow_mut() = Some(value);
  }
}

/// Recorded operand: a literal or a handle to another node's slot.
#[derive(Debug, Clone)]
pub(crate) enum Operand {
  Value(Value),
  Node(Rc<Slot>),
}

impl From<Input> for Operand {
  fn from(input: Input) -> Self {
    match input {
      Input::Value(value) => Self::Value(value),
      Input::Proxy(proxy) => Self::Node(proxy.slot().clone()),
    }
  }
}

impl Operand {
  /// Resolves the operand for an execution pass of `node`.
  pub(crate) fn materialize(&self, node: NodeId) -> Result<Value, GraphError> {
    match self {
      Self::Value(value) => Ok(value.clone()),
      Self::Node(slot) => slot.result().ok_or(GraphError::Unmaterialized {
        node,
        dependency: slot.node(),
      }),
    }
  }

  /// Resolves the operand for scan mode. Unknown results scan as `null`.
  pub(crate) fn scan_value(&self) -> Value {
    match self {
      Self::Value(value) => value.clone(),
      Self::Node(slot) => slot.scan_value().unwrap_or(Value::Null),
    }
  }

  pub(crate) fn describe(&self) -> String {
    match self {
      Self::Value(value) => value.to_string(),
      Self::Node(slot) => slot.node().to_string(),
    }
  }
}
