//! Context error types.

use weft_graph::GraphError;

/// Errors that can occur while building or dispatching a trace.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
  /// The graph rejected an append or failed during execution.
  #[error(transparent)]
  Graph(#[from] GraphError),

  /// A bridging backend ran on a context that was built without a bridge.
  #[error("bridging backend requires a bridge")]
  NoBridge,

  /// Another scope was pushed onto the bridge after this one and is still open.
  #[error("nested scope exited while it was not the innermost on the bridge")]
  NotInnermost,

  /// No enclosing graph was left on the bridge to hand the graph to.
  #[error("bridge has no enclosing graph")]
  BridgeEmpty,

  /// The enclosing graph on the bridge has already been dropped.
  #[error("enclosing graph was dropped before the nested scope exited")]
  ParentDropped,

  /// The context's graph has been dropped.
  #[error("graph was dropped")]
  GraphDropped,
}
