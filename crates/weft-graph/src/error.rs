//! Error types for graph construction and execution.

use thiserror::Error;

use crate::node::NodeId;

/// Errors raised while recording into or executing a graph.
#[derive(Debug, Error)]
pub enum GraphError {
  /// The graph has already executed and no longer accepts nodes.
  #[error("graph is dead: nodes cannot be appended after execution")]
  Dead,

  /// Early stop was requested on a graph whose nodes are unordered.
  #[error("early stop is only supported for sequential graphs")]
  NotSequential,

  /// Eager validation rejected an operation before it was appended.
  #[error("validation of '{target}' failed: {source}")]
  Validation {
    target: String,
    #[source]
    source: OperationError,
  },

  /// An operation failed while the graph was executing.
  #[error("node {node} ('{target}') failed: {source}")]
  Operation {
    node: NodeId,
    target: String,
    #[source]
    source: OperationError,
  },

  /// An operand refers to a node that has not produced a result in this pass.
  #[error("node {node} depends on {dependency}, which has not been materialized")]
  Unmaterialized { node: NodeId, dependency: NodeId },

  /// A bridge-execute marker would make the graph run itself.
  #[error("a graph cannot bridge-execute itself")]
  SelfBridge,

  /// The graph is being mutated or executed further up the call stack.
  #[error("graph is busy")]
  Busy,
}

/// Errors returned by a [`Target`](crate::Target).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
  #[error("invalid arguments: {message}")]
  Invalid { message: String },

  #[error("{message}")]
  Failed { message: String },
}

impl OperationError {
  pub fn invalid(message: impl Into<String>) -> Self {
    Self::Invalid {
      message: message.into(),
    }
  }

  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }
}
