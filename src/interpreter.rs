use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::mem;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{
    BinaryOp, ClassDecl, Expr, ExprId, Ident, LiteralValue, LogicalOp, Stmt, UnaryOp,
};
use crate::callable::{Callable, Function};
use crate::class::{getter_key, Class};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::instance::Instance;
use crate::native::{self, Array};
use crate::value::Value;

/// Call depth allowed before a run is aborted with `Stack overflow`.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Headroom kept free below the current stack frame.
const RED_ZONE: usize = 256 * 1024;

/// Size of each new stack segment once the headroom runs out.
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

/// Run `f`, first moving onto a fresh stack segment if the current one is
/// nearly exhausted, so `max_depth` holds on any host thread.
#[inline]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// How a statement finished.  Anything but `Normal` unwinds enclosing
/// blocks until a loop (`Break`, `Continue`) or a call (`Return`) takes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,

    /// Scope distance of every resolved local, keyed by node identity.
    /// Names missing from here are globals.
    locals: HashMap<ExprId, usize>,

    output: Box<dyn Write>,
    input: Box<dyn BufRead>,

    depth: usize,
    max_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter printing to stdout and reading `input()` from stdin.
    pub fn new() -> Self {
        Self::with_io(io::stdout(), io::BufReader::new(io::stdin()))
    }

    /// An interpreter with its own output sink and input source.
    pub fn with_io<W, R>(output: W, input: R) -> Self
    where
        W: Write + 'static,
        R: BufRead + 'static,
    {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));
        native::install(&mut globals.borrow_mut());

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output: Box::new(output),
            input: Box::new(input),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Record that the variable at node `id` lives `depth` scopes out.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Resolved {:?} at depth {}", id, depth);
        self.locals.insert(id, depth);
    }

    /// Next line of input without its terminator, `None` at end of input.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();

        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }

        Ok(Some(line))
    }

    /// Interprets a list of statements (a "program").  The first runtime
    /// error aborts the rest of the run.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        let result = self.run_statements(statements);

        // A failed run may leave us anywhere in the scope chain.
        self.environment = Rc::clone(&self.globals);
        self.depth = 0;
        self.output.flush()?;

        match result? {
            Flow::Normal => {
                info!("Interpretation completed successfully");
                Ok(())
            }
            // The resolver rejects these outside functions and loops.
            flow => {
                debug!("Top level finished with stray {:?}", flow);
                Ok(())
            }
        }
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.output, "{}", value)?;
                debug!("Printed value: {}", value);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {}", name.name, value);
                self.environment.borrow_mut().define(&name.name, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let scope = Environment::child(&self.environment);
                self.execute_block(statements, scope)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While {
                condition,
                body,
                increment,
            } => {
                debug!("Entering while loop");
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(increment) = increment {
                        self.evaluate(increment)?;
                    }
                }
                debug!("Exited while loop");
                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name());
                let function = Function::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );
                self.environment.borrow_mut().define(
                    declaration.name(),
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
                Ok(Flow::Normal)
            }

            Stmt::Class(declaration) => {
                self.declare_class(declaration)?;
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Break { .. } => Ok(Flow::Break),

            Stmt::Continue { .. } => Ok(Flow::Continue),
        }
    }

    /// Run `statements` with `environment` as the innermost scope.  The
    /// previous scope is restored however the block exits.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Flow> {
        let previous = mem::replace(&mut self.environment, environment);
        let result = self.run_statements(statements);
        self.environment = previous;
        result
    }

    fn run_statements(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn declare_class(&mut self, declaration: &ClassDecl) -> Result<()> {
        let name = &declaration.name;
        debug!("Defining class '{}'", name.name);

        let superclass = match &declaration.superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Callable(Callable::Class(class)) => Some(class),
                _ => {
                    return Err(LoxError::runtime(
                        expr_line(expr).unwrap_or(name.line),
                        "Superclass must be a class",
                    ))
                }
            },
            None => None,
        };

        self.environment.borrow_mut().define(&name.name, Value::Nil);

        // Methods of a subclass close over an extra scope holding `super`.
        let closure = match &superclass {
            Some(superclass) => {
                let scope = Environment::child(&self.environment);
                scope.borrow_mut().define(
                    "super",
                    Value::Callable(Callable::Class(Rc::clone(superclass))),
                );
                scope
            }
            None => Rc::clone(&self.environment),
        };

        let mut methods = HashMap::new();
        for method in &declaration.methods {
            let is_initializer = method.name() == "init";
            let function = Function::new(Rc::clone(method), Rc::clone(&closure), is_initializer);
            methods.insert(method.name().to_string(), Rc::new(function));
        }
        for getter in &declaration.getters {
            let function = Function::new(Rc::clone(getter), Rc::clone(&closure), false);
            methods.insert(getter_key(getter.name()), Rc::new(function));
        }

        let class = Class::new(name.name.clone(), superclass, methods);
        self.environment.borrow_mut().assign(
            &name.name,
            Value::Callable(Callable::Class(Rc::new(class))),
            name.line,
        )?;

        info!("Class '{}' defined", name.name);
        Ok(())
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::from(s.as_str()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary {
                operator,
                line,
                right,
            } => {
                let right = self.evaluate(right)?;
                match operator {
                    UnaryOp::Not => Ok(Value::Bool(!right.is_truthy())),
                    UnaryOp::Negate => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(*line, "Operand must be a number")),
                    },
                }
            }

            Expr::Binary {
                left,
                operator,
                line,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(*operator, left, right, *line)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let short_circuits = match operator {
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::And => !left.is_truthy(),
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Comma { left, right } => {
                self.evaluate(left)?;
                self.evaluate(right)
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(&distance) => self.environment.borrow_mut().assign_at(
                        distance,
                        &name.name,
                        value.clone(),
                        name.line,
                    )?,
                    None => {
                        self.globals
                            .borrow_mut()
                            .assign(&name.name, value.clone(), name.line)?
                    }
                }
                Ok(value)
            }

            Expr::Call {
                callee,
                line,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                let callable = match callee {
                    Value::Callable(callable) => callable,
                    _ => {
                        return Err(LoxError::runtime(
                            *line,
                            "Can only call functions and classes",
                        ))
                    }
                };

                if values.len() != callable.arity() {
                    return Err(LoxError::runtime(
                        *line,
                        format!(
                            "Expected {} arguments, but got {}",
                            callable.arity(),
                            values.len()
                        ),
                    ));
                }

                self.call_value(&callable, values, *line)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, name, self),
                Value::Array(array) => Array::property(&array, name),
                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let instance = match self.evaluate(object)? {
                    Value::Instance(instance) => instance,
                    _ => return Err(LoxError::runtime(name.line, "Only instances have fields")),
                };
                let value = self.evaluate(value)?;
                instance.set(&name.name, value.clone());
                Ok(value)
            }

            Expr::This { id, line } => self.look_up_variable(*id, &Ident::new("this", *line)),

            Expr::Super { id, line, method } => self.evaluate_super(*id, *line, method),

            Expr::Function(declaration) => {
                let function = Function::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );
                Ok(Value::Callable(Callable::Function(Rc::new(function))))
            }
        }
    }

    /// Invoke `callable` with evaluated, arity-checked arguments, enforcing
    /// the call depth limit.
    pub fn call_value(
        &mut self,
        callable: &Callable,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value> {
        if self.depth >= self.max_depth {
            debug!("Call depth limit {} reached", self.max_depth);
            return Err(LoxError::StackOverflow { line });
        }

        self.depth += 1;
        let result = ensure_sufficient_stack(|| callable.call(self, arguments, line));
        self.depth -= 1;

        result
    }

    fn look_up_variable(&self, id: ExprId, name: &Ident) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => self
                .environment
                .borrow()
                .get_at(distance, &name.name, name.line),
            None => self.globals.borrow().get(&name.name, name.line),
        }
    }

    fn evaluate_super(&mut self, id: ExprId, line: usize, method: &Ident) -> Result<Value> {
        let distance = match self.locals.get(&id) {
            Some(&distance) if distance > 0 => distance,
            _ => {
                return Err(LoxError::runtime(
                    line,
                    "Internal error: 'super' was not resolved",
                ))
            }
        };

        let superclass = match self.environment.borrow().get_at(distance, "super", line)? {
            Value::Callable(Callable::Class(class)) => class,
            _ => return Err(LoxError::runtime(line, "Superclass must be a class")),
        };

        // `this` lives in the scope just inside the one holding `super`.
        let instance = match self.environment.borrow().get_at(distance - 1, "this", line)? {
            Value::Instance(instance) => instance,
            _ => return Err(LoxError::runtime(line, "Internal error: 'this' is not an instance")),
        };

        if let Some(found) = superclass.find_method(&method.name) {
            return Ok(Value::Callable(Callable::Function(found.bind(instance))));
        }

        if let Some(getter) = superclass.find_getter(&method.name) {
            let bound = Callable::Function(getter.bind(instance));
            return self.call_value(&bound, Vec::new(), method.line);
        }

        Err(LoxError::runtime(
            method.line,
            format!("Undefined property '{}'", method.name),
        ))
    }
}

fn binary(operator: BinaryOp, left: Value, right: Value, line: usize) -> Result<Value> {
    use Value::{Bool, Number};

    let numbers = || LoxError::runtime(line, "Operands must be numbers");

    match operator {
        BinaryOp::Add => match (left, right) {
            (Number(a), Number(b)) => Ok(Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::from(format!("{}{}", a, b))),
            (Value::String(a), b @ Number(_)) => Ok(Value::from(format!("{}{}", a, b))),
            (a @ Number(_), Value::String(b)) => Ok(Value::from(format!("{}{}", a, b))),
            _ => Err(LoxError::runtime(
                line,
                "Operands must be two numbers or two strings",
            )),
        },

        BinaryOp::Subtract => match (left, right) {
            (Number(a), Number(b)) => Ok(Number(a - b)),
            _ => Err(numbers()),
        },

        BinaryOp::Multiply => match (left, right) {
            (Number(a), Number(b)) => Ok(Number(a * b)),
            _ => Err(numbers()),
        },

        BinaryOp::Divide => match (left, right) {
            (Number(_), Number(b)) if b == 0.0 => Err(LoxError::runtime(line, "Division by zero")),
            (Number(a), Number(b)) => Ok(Number(a / b)),
            _ => Err(numbers()),
        },

        BinaryOp::Equal => Ok(Bool(left == right)),
        BinaryOp::NotEqual => Ok(Bool(left != right)),

        BinaryOp::Less => match (left, right) {
            (Number(a), Number(b)) => Ok(Bool(a < b)),
            _ => Err(numbers()),
        },

        BinaryOp::LessEqual => match (left, right) {
            (Number(a), Number(b)) => Ok(Bool(a <= b)),
            _ => Err(numbers()),
        },

        BinaryOp::Greater => match (left, right) {
            (Number(a), Number(b)) => Ok(Bool(a > b)),
            _ => Err(numbers()),
        },

        BinaryOp::GreaterEqual => match (left, right) {
            (Number(a), Number(b)) => Ok(Bool(a >= b)),
            _ => Err(numbers()),
        },
    }
}

fn expr_line(expr: &Expr) -> Option<usize> {
    match expr {
        Expr::Variable { name, .. } => Some(name.line),
        _ => None,
    }
}
