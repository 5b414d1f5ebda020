//! Trace context orchestration.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, info};
use weft_config::GraphConfig;
use weft_graph::{
  Graph, GraphError, GraphSummary, Input, Invocation, Node, Outcome, Print, Proxy, WeakGraph,
};

use crate::backend::Backend;
use crate::bridge::Bridge;
use crate::error::ContextError;

/// Access a context has to its graph.
enum GraphRef {
  /// Before execution: the context may append nodes.
  Owning(Graph),
  /// After execution or hand-off: read-only, does not keep the graph alive.
  Observing(WeakGraph),
}

/// Records deferred operations into a graph and dispatches it at scope exit.
pub struct Context<'b> {
  backend: Rc<dyn Backend>,
  graph: GraphRef,
  bridge: Option<&'b Bridge>,
}

/// A context whose scope exited cleanly.
#[derive(Debug)]
pub struct Exited<'b, T> {
  pub context: Context<'b>,
  pub value: T,
  pub outcome: Outcome,
}

impl<'b> Context<'b> {
  /// Creates a context with a fresh graph.
  pub fn new(backend: impl Backend + 'static, config: &GraphConfig) -> Self {
    Self::join(backend, Graph::new(config))
  }

  /// Creates a context that records into an existing graph.
  pub fn join(backend: impl Backend + 'static, graph: Graph) -> Self {
    Self {
      backend: Rc::new(backend),
      graph: GraphRef::Owning(graph),
      bridge: None,
    }
  }

  /// Links the context into `bridge`, pushing its graph as the innermost scope.
  pub fn with_bridge(mut self, bridge: &'b Bridge) -> Self {
    if let Some(graph) = self.graph() {
      bridge.push(&graph);
    }
    self.bridge = Some(bridge);
    self
  }

  pub fn bridge(&self) -> Option<&'b Bridge> {
    self.bridge
  }

  /// The context's graph, while anything keeps it alive.
  pub fn graph(&self) -> Option<Graph> {
    match &self.graph {
      GraphRef::Owning(graph) => Some(graph.clone()),
      GraphRef::Observing(weak) => weak.upgrade(),
    }
  }

  /// Whether the context has given up ownership of its graph.
  pub fn is_observing(&self) -> bool {
    matches!(self.graph, GraphRef::Observing(_))
  }

  fn building(&self) -> Result<&Graph, ContextError> {
    match &self.graph {
      GraphRef::Owning(graph) => Ok(graph),
      GraphRef::Observing(weak) if weak.upgrade().is_some() => Err(GraphError::Dead.into()),
      GraphRef::Observing(_) => Err(ContextError::GraphDropped),
    }
  }

  /// Records a deferred call.
  pub fn apply(&mut self, invocation: Invocation) -> Result<Proxy, ContextError> {
    Ok(self.building()?.append(Node::Operation(invocation))?)
  }

  /// Records an early-stop marker. Only sequential graphs accept one.
  pub fn early_stop(&mut self) -> Result<Proxy, ContextError> {
    Ok(self.building()?.early_stop()?)
  }

  /// Records a print of `inputs` to stdout.
  pub fn log<I>(&mut self, inputs: I) -> Result<Proxy, ContextError>
  where
    I: IntoIterator,
    I::Item: Into<Input>,
  {
    self.log_to(Print::stdout(), inputs)
  }

  /// Records a print of `inputs` to a custom sink.
  pub fn log_to<I>(&mut self, print: Print, inputs: I) -> Result<Proxy, ContextError>
  where
    I: IntoIterator,
    I::Item: Into<Input>,
  {
    self.apply(Invocation::new(print).args(inputs))
  }

  /// Read-only view of the graph for rendering.
  pub fn summary(&self) -> Result<GraphSummary, ContextError> {
    let graph = self.graph().ok_or(ContextError::GraphDropped)?;
    Ok(graph.summary()?)
  }

  /// Resets and executes the graph now, then downgrades to observing.
  ///
  /// The downgrade happens on every path, including early stops and errors.
  pub fn local_execute(&mut self) -> Result<Outcome, ContextError> {
    let graph = match &self.graph {
      GraphRef::Owning(graph) => graph.clone(),
      GraphRef::Observing(weak) => weak.upgrade().ok_or(ContextError::GraphDropped)?,
    };

    let result = graph.execute_local();
    self.graph = GraphRef::Observing(graph.downgrade());

    Ok(result?)
  }

  /// Hands the graph to the enclosing scope instead of executing it.
  ///
  /// Pops this scope off the bridge and appends a bridge-execute marker that
  /// owns the graph to the new top. The graph runs when the enclosing graph
  /// reaches the marker; this context only observes it from here on.
  pub fn bridge_handoff(&mut self) -> Result<Outcome, ContextError> {
    let bridge = self.bridge.ok_or(ContextError::NoBridge)?;
    let graph = self.building()?.clone();

    if !bridge.peek().is_some_and(|top| top.refers_to(&graph)) {
      return Err(ContextError::NotInnermost);
    }
    bridge.pop();
    let parent = bridge
      .peek()
      .ok_or(ContextError::BridgeEmpty)?
      .upgrade()
      .ok_or(ContextError::ParentDropped)?;

    parent.append(Node::BridgeExecute(graph.clone()))?;
    self.graph = GraphRef::Observing(graph.downgrade());

    info!(nodes = graph.len(), depth = bridge.depth(), "graph_deferred");
    Ok(Outcome::Deferred)
  }

  /// Runs `body` as the context's construction scope.
  ///
  /// If `body` fails its error is returned untouched: the backend is not
  /// invoked and the graph stays alive and unexecuted. Otherwise the backend
  /// is invoked exactly once and its outcome returned with the context.
  pub fn enter<T, E, F>(mut self, body: F) -> Result<Exited<'b, T>, E>
  where
    F: FnOnce(&mut Self) -> Result<T, E>,
    E: From<ContextError>,
  {
    let value = match body(&mut self) {
      Ok(value) => value,
      Err(e) => {
        debug!(backend = self.backend.name(), "scope_aborted");
        return Err(e);
      }
    };

    let backend = Rc::clone(&self.backend);
    debug!(backend = backend.name(), "scope_exit");
    let outcome = backend.dispatch(&mut self)?;

    Ok(Exited {
      context: self,
      value,
      outcome,
    })
  }
}

impl fmt::Debug for Context<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let graph: &dyn fmt::Debug = match &self.graph {
      GraphRef::Owning(graph) => graph,
      GraphRef::Observing(weak) => weak,
    };
    f.debug_struct("Context")
      .field("backend", &self.backend.name())
      .field("graph", graph)
      .field("bridged", &self.bridge.is_some())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use weft_graph::FnTarget;

  use super::*;
  use crate::backend::LocalBackend;

  fn constant(value: i64) -> Invocation {
    Invocation::new(FnTarget::new("const", move |_| Ok(json!(value))))
  }

  #[test]
  fn test_local_execute_downgrades_on_error() {
    let mut context = Context::new(LocalBackend, &GraphConfig::default());
    let graph = context.graph().unwrap();
    context
      .apply(Invocation::new(FnTarget::new("boom", |_| {
        Err(weft_graph::OperationError::failed("boom"))
      })))
      .unwrap();

    assert!(context.local_execute().is_err());
    assert!(context.is_observing());
    assert!(!graph.is_alive());
  }

  #[test]
  fn test_observing_context_rejects_appends() {
    let mut context = Context::new(LocalBackend, &GraphConfig::default());
    let proxy = context.apply(constant(1)).unwrap();
    context.local_execute().unwrap();

    assert!(matches!(
      context.apply(constant(2)),
      Err(ContextError::Graph(GraphError::Dead))
    ));

    drop(proxy);
    assert!(context.graph().is_none());
    assert!(matches!(
      context.apply(constant(2)),
      Err(ContextError::GraphDropped)
    ));
    assert!(matches!(
      context.summary(),
      Err(ContextError::GraphDropped)
    ));
  }
}
