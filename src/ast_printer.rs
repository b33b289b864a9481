use crate::ast::{ClassDecl, Expr, FunctionDecl, LiteralValue, Stmt, UnaryOp};

/// Renders syntax trees in parenthesized prefix form, e.g.
/// `(+ 1.0 (group (* 2.0 3.0)))`.  Used by the `parse` subcommand.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(value) => match value {
                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }

                LiteralValue::Str(s) => s.to_string(),

                LiteralValue::True => "true".to_string(),

                LiteralValue::False => "false".to_string(),

                LiteralValue::Nil => "nil".to_string(),
            },

            Expr::Grouping(inner) => format!("(group {})", self.print(inner)),

            Expr::Unary {
                operator, right, ..
            } => format!("({} {})", operator, self.print(right)),

            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => format!("({} {} {})", operator, self.print(left), self.print(right)),

            Expr::Logical {
                left,
                operator,
                right,
            } => format!("({} {} {})", operator, self.print(left), self.print(right)),

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => format!(
                "(?: {} {} {})",
                self.print(condition),
                self.print(then_branch),
                self.print(else_branch)
            ),

            Expr::Comma { left, right } => {
                format!("(, {} {})", self.print(left), self.print(right))
            }

            Expr::Variable { name, .. } => name.name.clone(),

            Expr::Assign { name, value, .. } => format!("(= {} {})", name.name, self.print(value)),

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut out = format!("(call {}", self.print(callee));
                for arg in arguments {
                    out.push(' ');
                    out.push_str(&self.print(arg));
                }
                out.push(')');
                out
            }

            Expr::Get { object, name } => format!("(. {} {})", self.print(object), name.name),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                self.print(object),
                name.name,
                self.print(value)
            ),

            Expr::This { .. } => "this".to_string(),

            Expr::Super { method, .. } => format!("(super {})", method.name),

            Expr::Function(decl) => self.function("lambda", decl),
        }
    }

    pub fn print_stmt(&self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("(; {})", self.print(expr)),

            Stmt::Print(expr) => format!("(print {})", self.print(expr)),

            Stmt::Var { name, initializer } => match initializer {
                Some(init) => format!("(var {} {})", name.name, self.print(init)),
                None => format!("(var {})", name.name),
            },

            Stmt::Block(statements) => self.block(statements),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    self.print(condition),
                    self.print_stmt(then_branch),
                    self.print_stmt(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    self.print(condition),
                    self.print_stmt(then_branch)
                ),
            },

            Stmt::While {
                condition,
                body,
                increment,
            } => match increment {
                Some(increment) => format!(
                    "(while {} {} {})",
                    self.print(condition),
                    self.print_stmt(body),
                    self.print(increment)
                ),
                None => format!("(while {} {})", self.print(condition), self.print_stmt(body)),
            },

            Stmt::Function(decl) => self.function("fun", decl),

            Stmt::Class(class) => self.class(class),

            Stmt::Return { value, .. } => match value {
                Some(value) => format!("(return {})", self.print(value)),
                None => "(return)".to_string(),
            },

            Stmt::Break { .. } => "(break)".to_string(),

            Stmt::Continue { .. } => "(continue)".to_string(),
        }
    }

    fn block(&self, statements: &[Stmt]) -> String {
        let mut out = String::from("(block");
        for stmt in statements {
            out.push(' ');
            out.push_str(&self.print_stmt(stmt));
        }
        out.push(')');
        out
    }

    fn function(&self, keyword: &str, decl: &FunctionDecl) -> String {
        let params: Vec<&str> = decl.params.iter().map(|p| p.name.as_str()).collect();

        let head = match &decl.name {
            Some(name) => format!("({} {} ({})", keyword, name.name, params.join(" ")),
            None => format!("({} ({})", keyword, params.join(" ")),
        };

        format!("{} {})", head, self.block(&decl.body))
    }

    fn class(&self, class: &ClassDecl) -> String {
        let mut out = format!("(class {}", class.name.name);

        if let Some(superclass) = &class.superclass {
            out.push_str(&format!(" (< {})", self.print(superclass)));
        }

        for method in &class.methods {
            out.push(' ');
            out.push_str(&self.function("method", method));
        }

        for getter in &class.getters {
            out.push(' ');
            out.push_str(&self.function("get", getter));
        }

        out.push(')');
        out
    }
}

/// Renders arithmetic in reverse Polish notation, e.g. `1 2 3 * +` for
/// `1 + 2 * 3`.  Groupings vanish; unary minus prints as `neg`.  Nodes
/// outside operators, literals and names keep their prefix form.
pub struct RpnPrinter;

impl RpnPrinter {
    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(LiteralValue::Number(n)) => n.to_string(),

            Expr::Literal(LiteralValue::Str(s)) => format!("\"{}\"", s),

            Expr::Grouping(inner) => self.print(inner),

            Expr::Unary {
                operator, right, ..
            } => match operator {
                UnaryOp::Negate => format!("{} neg", self.print(right)),
                UnaryOp::Not => format!("{} !", self.print(right)),
            },

            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => format!("{} {} {}", self.print(left), self.print(right), operator),

            Expr::Logical {
                left,
                operator,
                right,
            } => format!("{} {} {}", self.print(left), self.print(right), operator),

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => format!(
                "{} {} {} ?:",
                self.print(condition),
                self.print(then_branch),
                self.print(else_branch)
            ),

            Expr::Comma { left, right } => {
                format!("{} {} ,", self.print(left), self.print(right))
            }

            Expr::Assign { name, value, .. } => format!("{} {} =", self.print(value), name.name),

            other => AstPrinter.print(other),
        }
    }

    /// Expression and `print` statements in postfix, everything else in
    /// prefix form.
    pub fn print_stmt(&self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("{} ;", self.print(expr)),
            Stmt::Print(expr) => format!("{} print", self.print(expr)),
            other => AstPrinter.print_stmt(other),
        }
    }
}
