//! Execution strategies invoked when a context's scope exits.

use tracing::instrument;
use weft_graph::Outcome;

use crate::context::Context;
use crate::error::ContextError;

/// Decides what happens to a context's graph at scope exit.
///
/// A backend is invoked exactly once per clean scope exit and never when the
/// scope body failed.
pub trait Backend {
  fn name(&self) -> &'static str;

  fn dispatch(&self, context: &mut Context<'_>) -> Result<Outcome, ContextError>;
}

/// Executes the graph immediately, in the caller's control flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl Backend for LocalBackend {
  fn name(&self) -> &'static str {
    "local"
  }

  #[instrument(name = "local_dispatch", skip_all)]
  fn dispatch(&self, context: &mut Context<'_>) -> Result<Outcome, ContextError> {
    context.local_execute()
  }
}

/// Defers execution into the enclosing scope's graph via the context's bridge.
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeBackend;

impl Backend for BridgeBackend {
  fn name(&self) -> &'static str {
    "bridge"
  }

  #[instrument(name = "bridge_dispatch", skip_all)]
  fn dispatch(&self, context: &mut Context<'_>) -> Result<Outcome, ContextError> {
    context.bridge_handoff()
  }
}
