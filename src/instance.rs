use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::Ident;
use crate::callable::Callable;
use crate::class::Class;
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use crate::value::Value;

/// An object created by calling a class.
pub struct Instance {
    class: Rc<Class>,
    fields: RefCell<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    /// Property read.  Fields win over getters, getters over methods.
    /// A getter runs immediately; a method comes back bound to `this`.
    pub fn get(this: &Rc<Instance>, name: &Ident, interpreter: &mut Interpreter) -> Result<Value> {
        if let Some(value) = this.fields.borrow().get(&name.name) {
            return Ok(value.clone());
        }

        if let Some(getter) = this.class.find_getter(&name.name) {
            let bound = getter.bind(Rc::clone(this));
            return interpreter.call_value(&Callable::Function(bound), Vec::new(), name.line);
        }

        if let Some(method) = this.class.find_method(&name.name) {
            return Ok(Value::Callable(Callable::Function(
                method.bind(Rc::clone(this)),
            )));
        }

        Err(LoxError::runtime(
            name.line,
            format!("Undefined property '{}'", name.name),
        ))
    }

    /// Property write.  Always a field; there are no setters.
    pub fn set(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name())
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
