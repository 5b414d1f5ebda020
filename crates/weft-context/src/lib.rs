//! Weft Context
//!
//! This crate provides the trace [`Context`], the orchestrator user code
//! records deferred operations through. A context owns a graph while its
//! scope is open and, when the scope exits cleanly, hands it to a
//! [`Backend`]:
//! - [`LocalBackend`] executes the graph immediately
//! - [`BridgeBackend`] splices the graph into the enclosing scope's graph,
//!   found through a shared [`Bridge`]
//!
//! Either way the context only observes its graph afterwards.

mod backend;
mod bridge;
mod context;
mod error;

pub use backend::{Backend, BridgeBackend, LocalBackend};
pub use bridge::Bridge;
pub use context::{Context, Exited};
pub use error::ContextError;
