//! Records trace scripts through contexts.
//!
//! The root scope gets a [`LocalBackend`]; every `nested` step opens a child
//! context with a [`BridgeBackend`] on the same bridge, so its graph runs in
//! place inside the enclosing graph.

use anyhow::{Context as _, Result, anyhow, bail};
use serde_json::Value;
use weft_config::{GraphConfig, Operand, Step, StepRef, TraceScript};
use weft_context::{Backend, Bridge, BridgeBackend, Context, ContextError, LocalBackend};
use weft_graph::{GraphSummary, Input, Invocation, Outcome, Proxy};

use crate::ops;

/// What a step left behind once recorded.
enum Recorded {
  Step(Proxy),
  Nested(Vec<Recorded>),
}

/// Proxies of the steps recorded so far, one list per open scope.
type Scopes = Vec<Vec<Option<Proxy>>>;

/// Backend that leaves the graph unexecuted so it can be inspected.
struct Inspect;

impl Backend for Inspect {
  fn name(&self) -> &'static str {
    "inspect"
  }

  fn dispatch(&self, _context: &mut Context<'_>) -> Result<Outcome, ContextError> {
    Ok(Outcome::Deferred)
  }
}

#[derive(Debug)]
pub struct Report {
  pub outcome: Outcome,
  /// Per-step results, mirroring the script's nesting. Steps that never ran
  /// (or produce nothing) are `null`.
  pub results: Value,
}

/// Records and executes `script`.
pub fn run(script: &TraceScript) -> Result<Report> {
  let bridge = Bridge::new();
  let exited = Context::new(LocalBackend, &script.config)
    .with_bridge(&bridge)
    .enter(|ctx| record(ctx, &bridge, &script.config, &script.steps, &mut Scopes::new()))
    .context("trace failed")?;

  Ok(Report {
    outcome: exited.outcome,
    results: results(&exited.value),
  })
}

/// Records `script` without executing it and returns the graph summary.
pub fn summarize(script: &TraceScript) -> Result<GraphSummary> {
  let bridge = Bridge::new();
  let exited = Context::new(Inspect, &script.config)
    .with_bridge(&bridge)
    .enter(|ctx| record(ctx, &bridge, &script.config, &script.steps, &mut Scopes::new()))
    .context("failed to record trace")?;

  Ok(exited.context.summary()?)
}

fn record<'b>(
  ctx: &mut Context<'b>,
  bridge: &'b Bridge,
  config: &GraphConfig,
  steps: &[Step],
  scopes: &mut Scopes,
) -> Result<Vec<Recorded>> {
  scopes.push(Vec::with_capacity(steps.len()));
  let mut recorded = Vec::with_capacity(steps.len());

  for (index, step) in steps.iter().enumerate() {
    let (proxy, entry) = match step {
      Step::Apply {
        op,
        args,
        kwargs,
        validate,
      } => {
        let mut invocation = Invocation::shared(ops::lookup(op)?);
        for operand in args {
          invocation = invocation.arg(resolve(operand, scopes)?);
        }
        for (name, operand) in kwargs {
          invocation = invocation.kwarg(name.as_str(), resolve(operand, scopes)?);
        }
        if let Some(validate) = validate {
          invocation = invocation.validate(*validate);
        }
        let proxy = ctx
          .apply(invocation)
          .with_context(|| format!("step {} ('{}') was rejected", index, op))?;
        (Some(proxy.clone()), Recorded::Step(proxy))
      }
      Step::Log { args } => {
        let inputs = args
          .iter()
          .map(|operand| resolve(operand, scopes))
          .collect::<Result<Vec<_>>>()?;
        let proxy = ctx.log(inputs)?;
        (Some(proxy.clone()), Recorded::Step(proxy))
      }
      Step::Stop => {
        let proxy = ctx
          .early_stop()
          .with_context(|| format!("step {} (stop) was rejected", index))?;
        (Some(proxy.clone()), Recorded::Step(proxy))
      }
      Step::Nested {
        config: nested_config,
        steps,
      } => {
        let nested_config = nested_config.unwrap_or(*config);
        let exited = Context::new(BridgeBackend, &nested_config)
          .with_bridge(bridge)
          .enter(|child| record(child, bridge, &nested_config, steps, scopes))?;
        (None, Recorded::Nested(exited.value))
      }
    };

    if let Some(scope) = scopes.last_mut() {
      scope.push(proxy);
    }
    recorded.push(entry);
  }

  scopes.pop();
  Ok(recorded)
}

fn resolve(operand: &Operand, scopes: &Scopes) -> Result<Input> {
  match operand {
    Operand::Literal(value) => Ok(Input::Value(value.clone())),
    Operand::Ref(StepRef { index, up }) => {
      let scope = scopes
        .len()
        .checked_sub(up + 1)
        .and_then(|depth| scopes.get(depth))
        .ok_or_else(|| anyhow!("reference {} scope(s) up is outside the script", up))?;
      match scope.get(*index) {
        Some(Some(proxy)) => Ok(Input::Proxy(proxy.clone())),
        Some(None) => bail!("step {} has no result to reference", index),
        None => bail!("step {} is referenced before it is recorded", index),
      }
    }
  }
}

fn results(recorded: &[Recorded]) -> Value {
  Value::Array(
    recorded
      .iter()
      .map(|entry| match entry {
        Recorded::Step(proxy) => proxy.value().unwrap_or(Value::Null),
        Recorded::Nested(children) => results(children),
      })
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use weft_graph::NodeSummary;

  use super::*;

  fn script(json: &str) -> TraceScript {
    TraceScript::from_json(json).unwrap()
  }

  #[test]
  fn test_run_with_nested_scope() {
    let report = run(&script(
      r#"{
        "steps": [
          { "type": "apply", "op": "add", "args": [1, 2] },
          { "type": "nested", "steps": [
            { "type": "apply", "op": "mul", "args": [{ "ref": 0, "up": 1 }, 10] },
            { "type": "apply", "op": "neg", "args": [{ "ref": 0 }] }
          ] },
          { "type": "apply", "op": "concat", "args": ["n=", { "ref": 0 }] }
        ]
      }"#,
    ))
    .unwrap();

    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.results, json!([3, [30, -30], "n=3"]));
  }

  #[test]
  fn test_run_stops_early() {
    let report = run(&script(
      r#"{
        "steps": [
          { "type": "apply", "op": "add", "args": [1] },
          { "type": "stop" },
          { "type": "apply", "op": "add", "args": [2] }
        ]
      }"#,
    ))
    .unwrap();

    assert_eq!(report.outcome, Outcome::EarlyStopped);
    assert_eq!(report.results, json!([1, null, null]));
  }

  #[test]
  fn test_stop_rejected_on_unordered_script() {
    let err = run(&script(
      r#"{ "config": { "sequential": false }, "steps": [{ "type": "stop" }] }"#,
    ))
    .unwrap_err();

    assert!(format!("{:#}", err).contains("sequential"));
  }

  #[test]
  fn test_validation_rejects_bad_operand() {
    let err = run(&script(
      r#"{ "config": { "validate": true },
           "steps": [{ "type": "apply", "op": "add", "args": ["x"] }] }"#,
    ))
    .unwrap_err();

    assert!(format!("{:#}", err).contains("validation of 'add' failed"));
  }

  #[test]
  fn test_operation_failure_is_reported() {
    let err = run(&script(
      r#"{ "steps": [{ "type": "apply", "op": "fail", "args": ["bad input"] }] }"#,
    ))
    .unwrap_err();

    assert!(format!("{:#}", err).contains("bad input"));
  }

  #[test]
  fn test_bad_references() {
    let forward = run(&script(
      r#"{ "steps": [{ "type": "apply", "op": "add", "args": [{ "ref": 1 }] }] }"#,
    ));
    assert!(forward.is_err());

    let nested = run(&script(
      r#"{ "steps": [
        { "type": "nested", "steps": [] },
        { "type": "apply", "op": "add", "args": [{ "ref": 0 }] }
      ] }"#,
    ));
    assert!(nested.is_err());

    let outside = run(&script(
      r#"{ "steps": [{ "type": "apply", "op": "add", "args": [{ "ref": 0, "up": 1 }] }] }"#,
    ));
    assert!(outside.is_err());
  }

  #[test]
  fn test_summarize_does_not_execute() {
    let summary = summarize(&script(
      r#"{
        "steps": [
          { "type": "apply", "op": "add", "args": [1, 2] },
          { "type": "nested", "steps": [{ "type": "apply", "op": "fail" }] }
        ]
      }"#,
    ))
    .unwrap();

    assert!(summary.alive);
    assert_eq!(summary.nodes.len(), 2);
    assert!(matches!(
      &summary.nodes[0],
      NodeSummary::Operation { materialized: false, .. }
    ));
    assert!(matches!(
      &summary.nodes[1],
      NodeSummary::BridgeExecute { child, .. } if child.nodes.len() == 1
    ));
  }
}
