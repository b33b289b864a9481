use crate::error::{LoxError, Result};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One lexical scope of variable bindings.
///
/// Scopes are shared: a block's scope is referenced by the interpreter while
/// the block runs and by every closure created inside it, so each lives
/// behind `Rc<RefCell<_>>` and is dropped once the last reference goes.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Shorthand for a shared child scope of `enclosing`.
    pub fn child(enclosing: &Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            enclosing,
        ))))
    }

    /// (Re)bind `name` in this scope, shadowing any outer binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup through the whole chain.  Used for globals.
    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'", name),
            ))
        }
    }

    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'", name),
            ))
        }
    }

    /// Read `name` exactly `distance` scopes out.  Failing here means the
    /// resolver and interpreter disagree on scope shape.
    pub fn get_at(&self, distance: usize, name: &str, line: usize) -> Result<Value> {
        if distance == 0 {
            return self
                .values
                .get(name)
                .cloned()
                .ok_or_else(|| desync(name, line));
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get_at(distance - 1, name, line),
            None => Err(desync(name, line)),
        }
    }

    pub fn assign_at(&mut self, distance: usize, name: &str, value: Value, line: usize) -> Result<()> {
        if distance == 0 {
            return match self.values.get_mut(name) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(desync(name, line)),
            };
        }

        match &self.enclosing {
            Some(enclosing) => enclosing
                .borrow_mut()
                .assign_at(distance - 1, name, value, line),
            None => Err(desync(name, line)),
        }
    }
}

fn desync(name: &str, line: usize) -> LoxError {
    LoxError::runtime(
        line,
        format!("Internal error: '{}' is not at its resolved scope depth", name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn define_shadows_outer_binding() {
        let outer = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().define("a", num(1.0));

        let inner = Environment::child(&outer);
        inner.borrow_mut().define("a", num(2.0));

        assert_eq!(inner.borrow().get("a", 1).unwrap(), num(2.0));
        assert_eq!(outer.borrow().get("a", 1).unwrap(), num(1.0));
    }

    #[test]
    fn assign_mutates_nearest_binding() {
        let outer = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().define("a", num(1.0));

        let inner = Environment::child(&outer);
        inner.borrow_mut().assign("a", num(5.0), 1).unwrap();

        assert_eq!(outer.borrow().get("a", 1).unwrap(), num(5.0));
    }

    #[test]
    fn undefined_names_are_runtime_errors() {
        let env = Environment::new();

        let err = env.get("missing", 3).unwrap_err();
        assert_eq!(err.to_string(), "[Line 3] Undefined variable 'missing'");

        let mut env = env;
        assert!(env.assign("missing", Value::Nil, 3).is_err());
    }

    #[test]
    fn get_at_walks_exact_distance() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("x", num(0.0));
        let middle = Environment::child(&global);
        middle.borrow_mut().define("x", num(1.0));
        let inner = Environment::child(&middle);

        assert_eq!(inner.borrow().get_at(1, "x", 1).unwrap(), num(1.0));
        assert_eq!(inner.borrow().get_at(2, "x", 1).unwrap(), num(0.0));
        assert!(inner.borrow().get_at(0, "x", 1).is_err());
        assert!(inner.borrow().get_at(3, "x", 1).is_err());

        inner.borrow_mut().assign_at(2, "x", num(9.0), 1).unwrap();
        assert_eq!(global.borrow().get("x", 1).unwrap(), num(9.0));
    }
}
