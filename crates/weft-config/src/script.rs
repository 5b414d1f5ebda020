//! Trace scripts.
//!
//! A script is a list of steps recorded into one scope. Operands are either
//! literal JSON values or references to an earlier step's result:
//!
//! ```json
//! {
//!   "config": { "sequential": true },
//!   "steps": [
//!     { "type": "apply", "op": "add", "args": [1, 2] },
//!     { "type": "log", "args": ["sum is", { "ref": 0 }] },
//!     { "type": "nested", "steps": [
//!       { "type": "apply", "op": "mul", "args": [{ "ref": 0, "up": 1 }, 10] }
//!     ] },
//!     { "type": "stop" },
//!     { "type": "apply", "op": "neg", "args": [{ "ref": 0 }] }
//!   ]
//! }
//! ```
//!
//! `ref` indexes the steps of a scope; `up` walks out to enclosing scopes
//! (`0` is the current one).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph::GraphConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceScript {
  #[serde(default)]
  pub config: GraphConfig,
  pub steps: Vec<Step>,
}

impl TraceScript {
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json(&content)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
  /// Record a call to a named operation.
  Apply {
    op: String,
    #[serde(default)]
    args: Vec<Operand>,
    #[serde(default)]
    kwargs: BTreeMap<String, Operand>,
    /// Overrides the scope's `validate` default.
    #[serde(skip_serializing_if = "Option::is_none")]
    validate: Option<bool>,
  },
  /// Record a print of the given operands.
  Log {
    #[serde(default)]
    args: Vec<Operand>,
  },
  /// Record an early-stop marker.
  Stop,
  /// Open a child scope whose execution is spliced into this one.
  Nested {
    /// Defaults to the enclosing scope's config.
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<GraphConfig>,
    steps: Vec<Step>,
  },
}

/// A reference to the result of step `index`, `up` scopes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepRef {
  #[serde(rename = "ref")]
  pub index: usize,
  #[serde(default)]
  pub up: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
  Ref(StepRef),
  Literal(serde_json::Value),
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use serde_json::json;

  use super::*;

  #[test]
  fn test_parse_all_step_kinds() {
    let script = TraceScript::from_json(
      r#"{
        "steps": [
          { "type": "apply", "op": "add", "args": [1, { "ref": 0 }], "kwargs": { "scale": 2 } },
          { "type": "log", "args": ["value", { "ref": 0, "up": 1 }] },
          { "type": "stop" },
          { "type": "nested", "config": { "sequential": false }, "steps": [] }
        ]
      }"#,
    )
    .unwrap();

    assert_eq!(script.config, GraphConfig::default());
    assert_eq!(script.steps.len(), 4);

    match &script.steps[0] {
      Step::Apply {
        op,
        args,
        kwargs,
        validate,
      } => {
        assert_eq!(op, "add");
        assert_eq!(args[0], Operand::Literal(json!(1)));
        assert_eq!(args[1], Operand::Ref(StepRef { index: 0, up: 0 }));
        assert_eq!(kwargs["scale"], Operand::Literal(json!(2)));
        assert_eq!(*validate, None);
      }
      other => panic!("expected apply, got {:?}", other),
    }

    match &script.steps[1] {
      Step::Log { args } => {
        assert_eq!(args[1], Operand::Ref(StepRef { index: 0, up: 1 }));
      }
      other => panic!("expected log, got {:?}", other),
    }

    assert_eq!(script.steps[2], Step::Stop);

    match &script.steps[3] {
      Step::Nested { config, steps } => {
        assert_eq!(*config, Some(GraphConfig::unordered()));
        assert!(steps.is_empty());
      }
      other => panic!("expected nested, got {:?}", other),
    }
  }

  #[test]
  fn test_object_with_extra_keys_is_literal() {
    let operand: Operand = serde_json::from_str(r#"{ "ref": 1, "label": "x" }"#).unwrap();
    assert_eq!(operand, Operand::Literal(json!({ "ref": 1, "label": "x" })));
  }

  #[test]
  fn test_unknown_step_type_is_rejected() {
    let err = TraceScript::from_json(r#"{ "steps": [{ "type": "jump" }] }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
  }

  #[test]
  fn test_from_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "config": {{ "validate": true }}, "steps": [{{ "type": "stop" }}] }}"#)
      .unwrap();

    let script = TraceScript::from_path(file.path()).unwrap();
    assert!(script.config.validate);
    assert_eq!(script.steps, vec![Step::Stop]);
  }

  #[test]
  fn test_from_missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = TraceScript::from_path(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
  }
}
