use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::graph::GraphState;
use crate::node::{NodeId, Slot};

/// Handle to a node's eventual result.
///
/// A proxy keeps the node's result and its graph's storage reachable, so a
/// graph is reclaimed once its context has let go of it and the last proxy
/// is dropped. It offers no way to change the graph's topology; new nodes
/// are appended through the owning context.
#[derive(Clone)]
pub struct Proxy {
  slot: Rc<Slot>,
  graph: Rc<GraphState>,
}

impl Proxy {
  pub(crate) fn new(slot: Rc<Slot>, graph: Rc<GraphState>) -> Self {
    Self { slot, graph }
  }

  pub(crate) fn slot(&self) -> &Rc<Slot> {
    &self.slot
  }

  pub fn node(&self) -> NodeId {
    self.slot.node()
  }

  /// Result of the most recent execution pass, if the node ran.
  pub fn value(&self) -> Option<Value> {
    self.slot.result()
  }

  /// Placeholder produced by eager validation, if the node was validated.
  pub fn scan_value(&self) -> Option<Value> {
    self.slot.scan_value()
  }

  pub fn is_materialized(&self) -> bool {
    self.slot.result().is_some()
  }

  /// Whether the node's graph still accepts new nodes.
  pub fn is_live(&self) -> bool {
    self.graph.is_alive()
  }
}

impl fmt::Debug for Proxy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Proxy")
      .field("node", &self.slot.node())
      .field("value", &self.slot.result())
      .finish()
  }
}
