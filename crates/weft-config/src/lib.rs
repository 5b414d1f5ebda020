//! Weft Config
//!
//! This crate contains the serializable configuration types for weft.
//! [`GraphConfig`] carries the per-graph options used when a context creates
//! a fresh graph, and [`TraceScript`] describes a whole trace (steps, nested
//! scopes and operand references) before it is recorded into a graph.
//!
//! Scripts can be loaded from:
//! - JSON files (via the CLI with `weft run trace.json`)
//! - In-memory JSON strings
//!
//! The runner takes these configuration types, records them through a
//! context, and lets the context's backend decide when they execute.

mod error;
mod graph;
mod script;

pub use error::ConfigError;
pub use graph::GraphConfig;
pub use script::{Operand, Step, StepRef, TraceScript};
