//! Host-provided globals: `clock`, `input` and `Array`.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::Ident;
use crate::callable::NativeFunction;
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::value::Value;

/// Bind every native callable into `globals`.
pub fn install(globals: &mut Environment) {
    info!("Installing native functions");

    globals.define("clock", clock().into_value());
    globals.define("input", input().into_value());
    globals.define("Array", array_constructor().into_value());
}

/// `clock()` - seconds since the Unix epoch.
fn clock() -> NativeFunction {
    NativeFunction::new("clock", 0, |_, _, _| {
        let millis = chrono::Utc::now().timestamp_millis();
        Ok(Value::Number(millis as f64 / 1000.0))
    })
}

/// `input()` - one line from the interpreter's input, `nil` at end of input.
fn input() -> NativeFunction {
    NativeFunction::new("input", 0, |interpreter, _, line| {
        match interpreter.read_line() {
            Ok(Some(text)) => Ok(Value::from(text)),
            Ok(None) => Ok(Value::Nil),
            Err(e) => Err(LoxError::runtime(line, format!("Failed to read input: {}", e))),
        }
    })
}

/// `Array(length)` - a fixed-size array filled with `nil`.
fn array_constructor() -> NativeFunction {
    NativeFunction::new("Array", 1, |_, args, line| {
        let length = match args[0] {
            Value::Number(n) if n >= 0.0 && n.fract() == 0.0 => n as usize,
            _ => {
                return Err(LoxError::runtime(
                    line,
                    "Array length must be a non-negative integer",
                ))
            }
        };

        debug!("Allocating array of length {}", length);

        Ok(Value::Array(Rc::new(Array::new(length, line)?)))
    })
}

/// Fixed-size, bounds-checked array object.
#[derive(Debug)]
pub struct Array {
    elements: RefCell<Vec<Value>>,
}

impl Array {
    /// A `nil`-filled array, or a runtime error if `length` elements
    /// cannot be allocated.
    pub fn new(length: usize, line: usize) -> Result<Self> {
        let mut elements = Vec::new();

        if let Err(e) = elements.try_reserve_exact(length) {
            debug!("Array allocation of {} failed: {}", length, e);
            return Err(LoxError::runtime(line, "Array length is too large"));
        }
        elements.resize(length, Value::Nil);

        Ok(Self {
            elements: RefCell::new(elements),
        })
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: &Value, line: usize) -> Result<Value> {
        let i = self.index(index, line)?;
        Ok(self.elements.borrow()[i].clone())
    }

    pub fn set(&self, index: &Value, value: Value, line: usize) -> Result<()> {
        let i = self.index(index, line)?;
        self.elements.borrow_mut()[i] = value;
        Ok(())
    }

    /// Copy every element into the front of `other`.
    pub fn copy_to(self: &Rc<Self>, other: &Rc<Array>, line: usize) -> Result<()> {
        if Rc::ptr_eq(self, other) {
            return Ok(());
        }

        let source = self.elements.borrow();
        let mut target = other.elements.borrow_mut();

        if target.len() < source.len() {
            return Err(LoxError::runtime(
                line,
                "Destination array is not long enough",
            ));
        }

        target[..source.len()].clone_from_slice(&source);
        Ok(())
    }

    /// Property access: `length`, or one of the bound methods.
    pub fn property(this: &Rc<Array>, name: &Ident) -> Result<Value> {
        let array = Rc::clone(this);

        let method = match name.name.as_str() {
            "length" => return Ok(Value::Number(this.len() as f64)),

            "get" => NativeFunction::new("get", 1, move |_, args, line| {
                array.get(&args[0], line)
            }),

            "set" => NativeFunction::new("set", 2, move |_, args, line| {
                array.set(&args[0], args[1].clone(), line)?;
                Ok(Value::Nil)
            }),

            "copyto" => NativeFunction::new("copyto", 1, move |_, args, line| match &args[0] {
                Value::Array(other) => {
                    array.copy_to(other, line)?;
                    Ok(Value::Nil)
                }
                _ => Err(LoxError::runtime(
                    line,
                    "copyto must take another array as argument",
                )),
            }),

            _ => {
                return Err(LoxError::runtime(
                    name.line,
                    format!("Array does not support '{}'", name.name),
                ))
            }
        };

        Ok(method.into_value())
    }

    fn index(&self, index: &Value, line: usize) -> Result<usize> {
        match index {
            Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 && (*n as usize) < self.len() => {
                Ok(*n as usize)
            }
            Value::Number(_) => Err(LoxError::runtime(line, "Index was outside of bounds")),
            _ => Err(LoxError::runtime(line, "Index must be a number")),
        }
    }
}
