//! Built-in operations available to trace scripts.

use std::rc::Rc;

use anyhow::{Result, bail};
use serde_json::{Value, json};
use weft_graph::{Arguments, FnTarget, OperationError, Target};

/// Looks up a built-in operation by name.
pub fn lookup(op: &str) -> Result<Rc<dyn Target>> {
  let target = match op {
    "add" => numeric("add", 0, 0.0, i64::checked_add, |a, b| a + b),
    "mul" => numeric("mul", 1, 1.0, i64::checked_mul, |a, b| a * b),
    "neg" => FnTarget::new("neg", |args: &Arguments| {
      match single(args, "neg")? {
        Value::Number(n) => match n.as_i64().and_then(i64::checked_neg) {
          Some(i) => Ok(json!(i)),
          None => Ok(json!(-n.as_f64().unwrap_or_default())),
        },
        other => Err(expected_number("neg", other)),
      }
    })
    .with_scan(|args: &Arguments| {
      check_numbers("neg", args)?;
      single(args, "neg").map(|_| json!(0))
    }),
    "concat" => FnTarget::new("concat", |args: &Arguments| {
      Ok(Value::String(
        args
          .args
          .iter()
          .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
          })
          .collect(),
      ))
    })
    .with_scan(|_| Ok(json!(""))),
    "fail" => FnTarget::new("fail", |args: &Arguments| {
      let message = args
        .get(0)
        .and_then(Value::as_str)
        .unwrap_or("operation failed");
      Err(OperationError::failed(message))
    }),
    other => bail!("unknown operation '{}'", other),
  };

  Ok(Rc::new(target))
}

fn numeric(
  name: &'static str,
  int_init: i64,
  float_init: f64,
  int_op: fn(i64, i64) -> Option<i64>,
  float_op: fn(f64, f64) -> f64,
) -> FnTarget {
  FnTarget::new(name, move |args: &Arguments| {
    let mut int = Some(int_init);
    let mut float = float_init;
    for value in &args.args {
      if let Some(i) = value.as_i64() {
        int = int.and_then(|acc| int_op(acc, i));
        float = float_op(float, i as f64);
      } else if let Some(f) = value.as_f64() {
        int = None;
        float = float_op(float, f);
      } else {
        return Err(expected_number(name, value));
      }
    }
    match int {
      Some(int) => Ok(Value::from(int)),
      None if float.is_finite() => Ok(json!(float)),
      None => Err(OperationError::failed(format!(
        "'{}' overflowed to {}",
        name, float
      ))),
    }
  })
  .with_scan(move |args: &Arguments| {
    check_numbers(name, args)?;
    Ok(json!(int_init))
  })
}

fn single<'a>(args: &'a Arguments, name: &str) -> Result<&'a Value, OperationError> {
  match args.args.as_slice() {
    [value] => Ok(value),
    _ => Err(OperationError::invalid(format!(
      "'{}' takes exactly one argument, got {}",
      name,
      args.len()
    ))),
  }
}

/// Scan-mode check: unknown operands arrive as `null` and are accepted.
fn check_numbers(name: &str, args: &Arguments) -> Result<(), OperationError> {
  match args.args.iter().find(|v| !(v.is_number() || v.is_null())) {
    Some(value) => Err(expected_number(name, value)),
    None => Ok(()),
  }
}

fn expected_number(name: &str, value: &Value) -> OperationError {
  OperationError::invalid(format!("'{}' expects numbers, got {}", name, value))
}
