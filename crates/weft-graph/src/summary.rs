//! Read-only graph summaries for external rendering.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::node::NodeId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
  pub sequential: bool,
  pub alive: bool,
  pub nodes: Vec<NodeSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeSummary {
  Operation {
    id: NodeId,
    target: String,
    args: Vec<String>,
    kwargs: BTreeMap<String, String>,
    materialized: bool,
  },
  EarlyStop {
    id: NodeId,
  },
  BridgeExecute {
    id: NodeId,
    child: GraphSummary,
  },
}

impl NodeSummary {
  pub fn id(&self) -> NodeId {
    match self {
      Self::Operation { id, .. } | Self::EarlyStop { id } | Self::BridgeExecute { id, .. } => *id,
    }
  }
}
