//! LIFO stack linking nested construction scopes.

use std::cell::RefCell;

use tracing::debug;
use weft_graph::{Graph, WeakGraph};

/// Stack of graphs shared by reference between nested contexts.
///
/// The most recently pushed graph is the innermost open scope. Entries do
/// not keep their graphs alive. One trace session owns the bridge and all
/// pushes and pops happen on its thread.
#[derive(Debug, Default)]
pub struct Bridge {
  graphs: RefCell<Vec<WeakGraph>>,
}

impl Bridge {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&self, graph: &Graph) {
    let mut graphs = self.graphs.borrow_mut();
    graphs.push(graph.downgrade());
    debug!(depth = graphs.len(), "bridge_push");
  }

  pub fn pop(&self) -> Option<WeakGraph> {
    let mut graphs = self.graphs.borrow_mut();
    let top = graphs.pop();
    debug!(depth = graphs.len(), "bridge_pop");
    top
  }

  pub fn peek(&self) -> Option<WeakGraph> {
    self.graphs.borrow().last().cloned()
  }

  pub fn depth(&self) -> usize {
    self.graphs.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.graphs.borrow().is_empty()
  }
}

#[cfg(test)]
mod tests {
  use weft_graph::GraphConfig;

  use super::*;

  #[test]
  fn test_lifo_order() {
    let a = Graph::new(&GraphConfig::default());
    let b = Graph::new(&GraphConfig::default());
    let bridge = Bridge::new();

    bridge.push(&a);
    bridge.push(&b);
    assert_eq!(bridge.depth(), 2);
    assert!(bridge.peek().unwrap().refers_to(&b));

    let popped = bridge.pop().unwrap();
    assert!(popped.refers_to(&b));
    assert!(bridge.peek().unwrap().refers_to(&a));
    assert_eq!(bridge.depth(), 1);
  }

  #[test]
  fn test_empty_bridge() {
    let bridge = Bridge::new();
    assert!(bridge.is_empty());
    assert!(bridge.peek().is_none());
    assert!(bridge.pop().is_none());
  }

  #[test]
  fn test_entries_do_not_own_graphs() {
    let bridge = Bridge::new();
    let graph = Graph::new(&GraphConfig::default());
    bridge.push(&graph);
    drop(graph);

    assert_eq!(bridge.depth(), 1);
    assert!(bridge.peek().unwrap().upgrade().is_none());
  }
}
