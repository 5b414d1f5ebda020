//! Weft Graph
//!
//! This crate provides the deferred operation graph for weft. A [`Graph`]
//! records [`Node`]s in order while it is alive and executes them in that
//! same order later:
//! - Operation nodes call a [`Target`] with literal values and the
//!   materialized results of earlier nodes ([`Proxy`] operands)
//! - Early-stop markers truncate a sequential graph's execution
//! - Bridge-execute markers run a nested child graph in place
//!
//! A graph becomes dead exactly once, after its local execution, and rejects
//! every later append.

mod error;
mod graph;
mod node;
mod proxy;
mod summary;
mod target;

pub use error::{GraphError, OperationError};
pub use graph::{Graph, Outcome, WeakGraph};
pub use node::{Input, Invocation, Node, NodeId};
pub use proxy::Proxy;
pub use summary::{GraphSummary, NodeSummary};
pub use target::{Arguments, FnTarget, Print, Target};
pub use weft_config::GraphConfig;
