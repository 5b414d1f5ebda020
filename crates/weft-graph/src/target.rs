//! The invocation interface stored in operation nodes.

use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::error::OperationError;

/// Materialized operands handed to a [`Target`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
  pub args: Vec<Value>,
  pub kwargs: Map<String, Value>,
}

impl Arguments {
  pub fn new(args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
    Self { args, kwargs }
  }

  pub fn get(&self, index: usize) -> Option<&Value> {
    self.args.get(index)
  }

  pub fn kwarg(&self, name: &str) -> Option<&Value> {
    self.kwargs.get(name)
  }

  pub fn len(&self) -> usize {
    self.args.len()
  }

  pub fn is_empty(&self) -> bool {
    self.args.is_empty() && self.kwargs.is_empty()
  }
}

/// Something an operation node can call.
pub trait Target {
  fn name(&self) -> &str;

  /// Performs the operation on fully materialized operands.
  fn call(&self, args: &Arguments) -> Result<Value, OperationError>;

  /// Checks the operands without side effects, returning a placeholder
  /// result for downstream scans. Operands whose values are not known yet
  /// arrive as `null`.
  fn scan(&self, args: &Arguments) -> Result<Value, OperationError> {
    let _ = args;
    Ok(Value::Null)
  }
}

type Callback = Box<dyn Fn(&Arguments) -> Result<Value, OperationError>>;

/// A [`Target`] backed by closures.
pub struct FnTarget {
  name: String,
  call: Callback,
  scan: Option<Callback>,
}

impl FnTarget {
  pub fn new(
    name: impl Into<String>,
    call: impl Fn(&Arguments) -> Result<Value, OperationError> + 'static,
  ) -> Self {
    Self {
      name: name.into(),
      call: Box::new(call),
      scan: None,
    }
  }

  pub fn with_scan(
    mut self,
    scan: impl Fn(&Arguments) -> Result<Value, OperationError> + 'static,
  ) -> Self {
    self.scan = Some(Box::new(scan));
    self
  }
}

impl Target for FnTarget {
  fn name(&self) -> &str {
    &self.name
  }

  fn call(&self, args: &Arguments) -> Result<Value, OperationError> {
    (self.call)(args)
  }

  fn scan(&self, args: &Arguments) -> Result<Value, OperationError> {
    match &self.scan {
      Some(scan) => scan(args),
      None => Ok(Value::Null),
    }
  }
}

impl fmt::Debug for FnTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FnTarget").field("name", &self.name).finish()
  }
}

/// Print-like sink: renders its positional operands separated by spaces.
#[derive(Clone)]
pub struct Print {
  sink: Rc<dyn Fn(&str)>,
}

impl Print {
  pub fn stdout() -> Self {
    Self::to(|line| println!("{}", line))
  }

  pub fn to(sink: impl Fn(&str) + 'static) -> Self {
    Self {
      sink: Rc::new(sink),
    }
  }

  pub fn render(args: &Arguments) -> String {
    args
      .args
      .iter()
      .map(|value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      })
      .collect::<Vec<_>>()
      .join(" ")
  }
}

impl Target for Print {
  fn name(&self) -> &str {
    "print"
  }

  fn call(&self, args: &Arguments) -> Result<Value, OperationError> {
    (self.sink)(&Self::render(args));
    Ok(Value::Null)
  }
}

impl fmt::Debug for Print {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Print")
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use serde_json::json;

  use super::*;

  #[test]
  fn test_print_renders_strings_unquoted() {
    let args = Arguments::new(vec![json!("total"), json!(3), json!({ "a": 1 })], Map::new());
    assert_eq!(Print::render(&args), r#"total 3 {"a":1}"#);
  }

  #[test]
  fn test_print_scan_has_no_output() {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = lines.clone();
    let print = Print::to(move |line| sink.borrow_mut().push(line.to_string()));

    let args = Arguments::new(vec![json!("hello")], Map::new());
    print.scan(&args).unwrap();
    assert!(lines.borrow().is_empty());

    assert_eq!(print.call(&args).unwrap(), Value::Null);
    assert_eq!(*lines.borrow(), vec!["hello".to_string()]);
  }

  #[test]
  fn test_fn_target_default_scan() {
    let target = FnTarget::new("one", |_| Ok(json!(1)));
    assert_eq!(target.scan(&Arguments::default()).unwrap(), Value::Null);
    assert_eq!(target.call(&Arguments::default()).unwrap(), json!(1));

    let target = target.with_scan(|_| Err(OperationError::invalid("nope")));
    assert_eq!(
      target.scan(&Arguments::default()).unwrap_err(),
      OperationError::invalid("nope")
    );
  }
}
