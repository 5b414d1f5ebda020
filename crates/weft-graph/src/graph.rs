//! Graph lifecycle and in-order execution.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument};
use weft_config::GraphConfig;

use crate::error::GraphError;
use crate::node::{Invocation, Node, NodeId, Operand, Slot};
use crate::proxy::Proxy;
use crate::summary::{GraphSummary, NodeSummary};
use crate::target::{Arguments, Target};

/// How an execution pass (or a backend dispatch) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  /// Every node ran.
  Completed,
  /// An early-stop marker was reached; later nodes did not run.
  EarlyStopped,
  /// Execution was handed to an enclosing graph and has not happened yet.
  Deferred,
}

/// Result of executing one node.
enum Step {
  Continue,
  Stop,
}

enum Recorded {
  Operation {
    target: Rc<dyn Target>,
    args: Vec<Operand>,
    kwargs: Vec<(String, Operand)>,
  },
  EarlyStop,
  BridgeExecute(Graph),
}

impl Recorded {
  fn kind(&self) -> &'static str {
    match self {
      Self::Operation { .. } => "operation",
      Self::EarlyStop => "early_stop",
      Self::BridgeExecute(_) => "bridge_execute",
    }
  }
}

struct Entry {
  slot: Rc<Slot>,
  node: Recorded,
}

impl Entry {
  fn execute(&self) -> Result<Step, GraphError> {
    let node = self.slot.node();
    match &self.node {
      Recorded::Operation {
        target,
        args,
        kwargs,
      } => {
        let args = args
          .iter()
          .map(|operand| operand.materialize(node))
          .collect::<Result<Vec<_>, _>>()?;
        let kwargs = kwargs
          .iter()
          .map(|(name, operand)| Ok((name.clone(), operand.materialize(node)?)))
          .collect::<Result<Map<_, _>, GraphError>>()?;

        let value = target
          .call(&Arguments::new(args, kwargs))
          .map_err(|source| GraphError::Operation {
            node,
            target: target.name().to_string(),
            source,
          })?;

        debug!(node = %node, target = target.name(), "node_executed");
        self.slot.set_result(value);
        Ok(Step::Continue)
      }
      Recorded::EarlyStop => Ok(Step::Stop),
      Recorded::BridgeExecute(child) => {
        debug!(node = %node, "bridged_graph_started");
        match child.execute_local()? {
          // The child's stop propagates to the enclosing graph.
          Outcome::EarlyStopped => Ok(Step::Stop),
          Outcome::Completed | Outcome::Deferred => {
            self.slot.set_result(Value::Null);
            Ok(Step::Continue)
          }
        }
      }
    }
  }

  fn summary(&self) -> Result<NodeSummary, GraphError> {
    let id = self.slot.node();
    Ok(match &self.node {
      Recorded::Operation {
        target,
        args,
        kwargs,
      } => NodeSummary::Operation {
        id,
        target: target.name().to_string(),
        args: args.iter().map(Operand::describe).collect(),
        kwargs: kwargs
          .iter()
          .map(|(name, operand)| (name.clone(), operand.describe()))
          .collect(),
        materialized: self.slot.result().is_some(),
      },
      Recorded::EarlyStop => NodeSummary::EarlyStop { id },
      Recorded::BridgeExecute(child) => NodeSummary::BridgeExecute {
        id,
        child: child.summary()?,
      },
    })
  }
}

pub(crate) struct GraphState {
  entries: RefCell<Vec<Entry>>,
  len: Cell<usize>,
  sequential: bool,
  validate: bool,
  alive: Cell<bool>,
  executing: Cell<bool>,
}

impl GraphState {
  pub(crate) fn is_alive(&self) -> bool {
    self.alive.get()
  }
}

/// Marks a graph as mid-pass until dropped.
struct Running<'a>(&'a Cell<bool>);

impl<'a> Running<'a> {
  fn enter(flag: &'a Cell<bool>) -> Result<Self, GraphError> {
    if flag.replace(true) {
      return Err(GraphError::Busy);
    }
    Ok(Self(flag))
  }
}

impl Drop for Running<'_> {
  fn drop(&mut self) {
    self.0.set(false);
  }
}

/// An ordered, owned collection of nodes plus lifecycle flags.
///
/// `Graph` is a shared handle; cloning it does not copy nodes. Contexts hold
/// one while they are building and downgrade to a [`WeakGraph`] once the
/// graph has executed or been handed to a parent.
#[derive(Clone)]
pub struct Graph(Rc<GraphState>);

impl Graph {
  pub fn new(config: &GraphConfig) -> Self {
    Self(Rc::new(GraphState {
      entries: RefCell::new(Vec::new()),
      len: Cell::new(0),
      sequential: config.sequential,
      validate: config.validate,
      alive: Cell::new(true),
      executing: Cell::new(false),
    }))
  }

  pub fn is_alive(&self) -> bool {
    self.0.is_alive()
  }

  pub fn is_sequential(&self) -> bool {
    self.0.sequential
  }

  pub fn len(&self) -> usize {
    self.0.len.get()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn downgrade(&self) -> WeakGraph {
    WeakGraph(Rc::downgrade(&self.0))
  }

  pub fn ptr_eq(&self, other: &Graph) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }

  /// Whether `graph` is this graph or is reachable through its bridge markers.
  fn reaches(&self, graph: &Graph) -> Result<bool, GraphError> {
    if self.ptr_eq(graph) {
      return Ok(true);
    }
    let entries = self.0.entries.try_borrow().map_err(|_| GraphError::Busy)?;
    for entry in entries.iter() {
      if let Recorded::BridgeExecute(child) = &entry.node {
        if child.reaches(graph)? {
          return Ok(true);
        }
      }
    }
    Ok(false)
  }

  /// Appends `node`, returning a proxy for its eventual result.
  ///
  /// Fails with [`GraphError::Dead`] once the graph has executed, and with
  /// [`GraphError::NotSequential`] for an early stop on an unordered graph.
  /// A rejected append leaves the graph unchanged.
  pub fn append(&self, node: Node) -> Result<Proxy, GraphError> {
    if !self.is_alive() {
      return Err(GraphError::Dead);
    }

    let mut entries = self
      .0
      .entries
      .try_borrow_mut()
      .map_err(|_| GraphError::Busy)?;
    let slot = Rc::new(Slot::new(NodeId::new(entries.len())));

    let node = match node {
      Node::Operation(invocation) => self.record_operation(invocation, &slot)?,
      Node::EarlyStop if !self.0.sequential => return Err(GraphError::NotSequential),
      Node::EarlyStop => Recorded::EarlyStop,
      Node::BridgeExecute(child) => {
        if child.reaches(self)? {
          return Err(GraphError::SelfBridge);
        }
        Recorded::BridgeExecute(child)
      }
    };

    debug!(node = %slot.node(), kind = node.kind(), "node_appended");
    entries.push(Entry {
      slot: slot.clone(),
      node,
    });
    self.0.len.set(entries.len());

    Ok(Proxy::new(slot, self.0.clone()))
  }

  /// Appends an early-stop marker.
  pub fn early_stop(&self) -> Result<Proxy, GraphError> {
    self.append(Node::EarlyStop)
  }

  fn record_operation(
    &self,
    invocation: Invocation,
    slot: &Slot,
  ) -> Result<Recorded, GraphError> {
    let Invocation {
      target,
      args,
      kwargs,
      validate,
    } = invocation;

    let args: Vec<Operand> = args.into_iter().map(Operand::from).collect();
    let kwargs: Vec<(String, Operand)> = kwargs
      .into_iter()
      .map(|(name, input)| (name, Operand::from(input)))
      .collect();

    if validate.unwrap_or(self.0.validate) {
      let scan_args = Arguments::new(
        args.iter().map(Operand::scan_value).collect(),
        kwargs
          .iter()
          .map(|(name, operand)| (name.clone(), operand.scan_value()))
          .collect(),
      );
      let placeholder = target
        .scan(&scan_args)
        .map_err(|source| GraphError::Validation {
          target: target.name().to_string(),
          source,
        })?;
      slot.set_scan_value(placeholder);
    }

    Ok(Recorded::Operation {
      target,
      args,
      kwargs,
    })
  }

  /// Clears every node's materialized result. Idempotent.
  pub fn reset(&self) -> Result<(), GraphError> {
    if self.0.executing.get() {
      return Err(GraphError::Busy);
    }
    let entries = self.0.entries.try_borrow().map_err(|_| GraphError::Busy)?;
    for entry in entries.iter() {
      entry.slot.clear();
    }
    Ok(())
  }

  /// Runs every node in insertion order.
  ///
  /// Stops early with [`Outcome::EarlyStopped`] when an early-stop marker is
  /// reached. The first operation failure aborts the pass. Executing a graph
  /// from inside its own pass fails with [`GraphError::Busy`].
  #[instrument(
    name = "graph_execute",
    skip(self),
    fields(nodes = self.len(), sequential = self.is_sequential())
  )]
  pub fn execute(&self) -> Result<Outcome, GraphError> {
    let _running = Running::enter(&self.0.executing)?;
    let entries = self.0.entries.try_borrow().map_err(|_| GraphError::Busy)?;
    for entry in entries.iter() {
      if let Step::Stop = entry.execute()? {
        info!(node = %entry.slot.node(), "graph_early_stopped");
        return Ok(Outcome::EarlyStopped);
      }
    }
    Ok(Outcome::Completed)
  }

  /// Resets and executes the graph, then marks it dead.
  ///
  /// The graph is marked dead on every path, including early stops and
  /// errors, before the result is returned.
  pub fn execute_local(&self) -> Result<Outcome, GraphError> {
    let result = self.reset().and_then(|()| self.execute());
    self.kill();

    match &result {
      Ok(outcome) => info!(?outcome, "graph_completed"),
      Err(e) => error!(error = %e, "graph_failed"),
    }

    result
  }

  /// Marks the graph dead. Irreversible.
  pub fn kill(&self) {
    if self.0.alive.replace(false) {
      debug!(nodes = self.len(), "graph_dead");
    }
  }

  /// Read-only view of the graph and every bridged child.
  pub fn summary(&self) -> Result<GraphSummary, GraphError> {
    let entries = self.0.entries.try_borrow().map_err(|_| GraphError::Busy)?;
    Ok(GraphSummary {
      sequential: self.is_sequential(),
      alive: self.is_alive(),
      nodes: entries
        .iter()
        .map(Entry::summary)
        .collect::<Result<Vec<_>, GraphError>>()?,
    })
  }
}

impl fmt::Debug for Graph {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut s = f.debug_struct("Graph");
    if let Ok(entries) = self.0.entries.try_borrow() {
      s.field("nodes", &entries.len());
    }
    s.field("sequential", &self.0.sequential)
      .field("alive", &self.is_alive())
      .finish()
  }
}

/// Non-owning view of a graph.
#[derive(Clone, Default)]
pub struct WeakGraph(Weak<GraphState>);

impl WeakGraph {
  pub fn upgrade(&self) -> Option<Graph> {
    self.0.upgrade().map(Graph)
  }

  /// Whether this view points at `graph`.
  pub fn refers_to(&self, graph: &Graph) -> bool {
    std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&graph.0))
  }

  pub fn is_alive(&self) -> bool {
    self.0.upgrade().is_some_and(|state| state.is_alive())
  }
}

impl fmt::Debug for WeakGraph {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.upgrade() {
      Some(graph) => f.debug_tuple("WeakGraph").field(&graph).finish(),
      None => f.write_str("WeakGraph(dropped)"),
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::target::FnTarget;

  fn constant(value: Value) -> Invocation {
    Invocation::new(FnTarget::new("const", move |_| Ok(value.clone())))
  }

  #[test]
  fn test_append_assigns_positions_in_order() {
    let graph = Graph::new(&GraphConfig::default());
    let a = graph.append(Node::Operation(constant(json!(1)))).unwrap();
    let b = graph.append(Node::Operation(constant(json!(2)))).unwrap();

    assert_eq!(a.node().index(), 0);
    assert_eq!(b.node().index(), 1);
    assert_eq!(graph.len(), 2);
  }

  #[test]
  fn test_kill_is_irreversible() {
    let graph = Graph::new(&GraphConfig::default());
    graph.kill();
    graph.kill();
    assert!(!graph.is_alive());
    assert!(matches!(
      graph.append(Node::Operation(constant(json!(1)))),
      Err(GraphError::Dead)
    ));
    assert!(graph.is_empty());
  }

  #[test]
  fn test_graph_cannot_bridge_itself() {
    let graph = Graph::new(&GraphConfig::default());
    assert!(matches!(
      graph.append(Node::BridgeExecute(graph.clone())),
      Err(GraphError::SelfBridge)
    ));
    assert!(graph.is_empty());
  }

  #[test]
  fn test_graph_cannot_bridge_through_child() {
    let a = Graph::new(&GraphConfig::default());
    let b = Graph::new(&GraphConfig::default());
    let c = Graph::new(&GraphConfig::default());
    a.append(Node::BridgeExecute(b.clone())).unwrap();
    b.append(Node::BridgeExecute(c.clone())).unwrap();

    assert!(matches!(
      c.append(Node::BridgeExecute(a.clone())),
      Err(GraphError::SelfBridge)
    ));
    assert!(matches!(
      b.append(Node::BridgeExecute(a.clone())),
      Err(GraphError::SelfBridge)
    ));
    assert!(c.is_empty());
    assert_eq!(b.len(), 1);

    assert_eq!(a.execute_local().unwrap(), Outcome::Completed);
    assert!(!c.is_alive());
  }

  #[test]
  fn test_weak_graph_tracks_drop() {
    let graph = Graph::new(&GraphConfig::default());
    let weak = graph.downgrade();
    assert!(weak.refers_to(&graph));
    assert!(weak.is_alive());

    drop(graph);
    assert!(weak.upgrade().is_none());
    assert!(!weak.is_alive());
  }

  #[test]
  fn test_proxy_keeps_storage_reachable() {
    let graph = Graph::new(&GraphConfig::default());
    let weak = graph.downgrade();
    let proxy = graph.append(Node::Operation(constant(json!(7)))).unwrap();

    graph.execute_local().unwrap();
    drop(graph);

    assert!(weak.upgrade().is_some());
    assert_eq!(proxy.value(), Some(json!(7)));
    assert!(!proxy.is_live());

    drop(proxy);
    assert!(weak.upgrade().is_none());
  }
}
