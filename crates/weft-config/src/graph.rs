use serde::{Deserialize, Serialize};

/// Options applied to a graph when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
  /// Whether node order carries control-flow meaning. Only sequential graphs
  /// accept early-stop markers.
  #[serde(default = "default_sequential")]
  pub sequential: bool,
  /// Default for eager validation of appended operations. An individual
  /// invocation may override it.
  #[serde(default)]
  pub validate: bool,
}

fn default_sequential() -> bool {
  true
}

impl Default for GraphConfig {
  fn default() -> Self {
    Self {
      sequential: default_sequential(),
      validate: false,
    }
  }
}

impl GraphConfig {
  /// Config for a graph whose nodes form an unordered operation set.
  pub fn unordered() -> Self {
    Self {
      sequential: false,
      ..Self::default()
    }
  }

  pub fn with_validation(mut self, validate: bool) -> Self {
    self.validate = validate;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_when_fields_missing() {
    let config: GraphConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, GraphConfig::default());
    assert!(config.sequential);
    assert!(!config.validate);
  }

  #[test]
  fn test_unordered_with_validation() {
    let config: GraphConfig =
      serde_json::from_str(r#"{ "sequential": false, "validate": true }"#).unwrap();
    assert_eq!(config, GraphConfig::unordered().with_validation(true));
  }
}
