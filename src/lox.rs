//! One interpreter session: scan → parse → resolve → interpret.
//!
//! The session owns its [`Interpreter`], so globals and resolved bindings
//! carry over from one [`Lox::run`] to the next.  That is what lets the REPL
//! call a function declared on an earlier line.

use log::info;

use crate::ast::Stmt;
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

/// Scan and parse `source`.  Lexical and syntax errors are reported
/// together; a program with any of them is never returned.
pub fn parse_source(source: &str) -> Result<Vec<Stmt>, Vec<LoxError>> {
    let (tokens, mut errors) = Scanner::new(source).scan_tokens();

    match Parser::new(&tokens).parse() {
        Ok(statements) if errors.is_empty() => Ok(statements),
        Ok(_) => Err(errors),
        Err(parse_errors) => {
            errors.extend(parse_errors);
            Err(errors)
        }
    }
}

pub struct Lox {
    interpreter: Interpreter,
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

impl Lox {
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }

    pub fn with_interpreter(interpreter: Interpreter) -> Self {
        Self { interpreter }
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Run a whole program.  Static errors are all returned and nothing
    /// executes; a runtime error stops the run and is returned alone.
    pub fn run(&mut self, source: &str) -> Result<(), Vec<LoxError>> {
        let statements = parse_source(source)?;
        self.execute(&statements)
    }

    /// Run one REPL line.  A line holding a single expression statement
    /// prints its value.
    pub fn run_line(&mut self, source: &str) -> Result<(), Vec<LoxError>> {
        let mut statements = parse_source(source)?;

        if let [Stmt::Expression(_)] = statements.as_slice() {
            if let Some(Stmt::Expression(expr)) = statements.pop() {
                statements.push(Stmt::Print(expr));
            }
        }

        self.execute(&statements)
    }

    fn execute(&mut self, statements: &[Stmt]) -> Result<(), Vec<LoxError>> {
        Resolver::new(&mut self.interpreter).resolve(statements)?;

        info!("Static checks passed; executing");

        self.interpreter
            .interpret(statements)
            .map_err(|error| vec![error])
    }
}
