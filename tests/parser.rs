#[cfg(test)]
mod parser_tests {
    use rox::ast::Stmt;
    use rox::ast_printer::{AstPrinter, RpnPrinter};
    use rox::error::LoxError;
    use rox::lox::parse_source;

    fn print_program(source: &str) -> Vec<String> {
        let statements = parse_source(source)
            .unwrap_or_else(|errors| panic!("unexpected parse errors: {:?}", errors));

        statements
            .iter()
            .map(|stmt| AstPrinter.print_stmt(stmt))
            .collect()
    }

    fn assert_prints(source: &str, expected: &str) {
        assert_eq!(print_program(source), vec![expected.to_string()]);
    }

    fn parse_errors(source: &str) -> Vec<String> {
        match parse_source(source) {
            Ok(statements) => panic!("expected errors, parsed {:?}", statements),
            Err(errors) => errors.iter().map(LoxError::to_string).collect(),
        }
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_prints("1 + 2 * 3;", "(; (+ 1.0 (* 2.0 3.0)))");
        assert_prints("1 - 2 - 3;", "(; (- (- 1.0 2.0) 3.0))");
        assert_prints("-(1 - 2) == !true;", "(; (== (- (group (- 1.0 2.0))) (! true)))");
        assert_prints("a or b and c;", "(; (or a (and b c)))");
        assert_prints("1 < 2 == 3 >= 4;", "(; (== (< 1.0 2.0) (>= 3.0 4.0)))");
    }

    #[test]
    fn test_comma_and_ternary() {
        assert_prints("a, b ? c : d ? e : f;", "(; (, a (?: b c (?: d e f))))");
        assert_prints("x ? 1, 2 : 3;", "(; (?: x (, 1.0 2.0) 3.0))");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_prints("a = b = 3;", "(; (= a (= b 3.0)))");
        assert_prints("a.b = 1;", "(; (= (. a b) 1.0))");
    }

    #[test]
    fn test_call_and_property_chain() {
        assert_prints(
            "a.b.c(1)(2);",
            "(; (call (call (. (. a b) c) 1.0) 2.0))",
        );
        // Arguments are separated by commas, not comma expressions.
        assert_prints("f(1, 2);", "(; (call f 1.0 2.0))");
    }

    #[test]
    fn test_for_desugars_to_while() {
        assert_prints(
            "for (var i = 0; i < 3; i = i + 1) print i;",
            "(block (var i 0.0) (while (< i 3.0) (print i) (= i (+ i 1.0))))",
        );
        assert_prints("for (;;) break;", "(while true (break))");
    }

    #[test]
    fn test_class_with_superclass_method_and_getter() {
        assert_prints(
            "class B < A { init(x) { this.x = x; } area { return 1; } }",
            "(class B (< A) (method init (x) (block (; (= (. this x) x)))) \
             (get area () (block (return 1.0))))",
        );
    }

    #[test]
    fn test_functions_named_and_anonymous() {
        assert_prints(
            "fun add(a, b) { return a + b; }",
            "(fun add (a b) (block (return (+ a b))))",
        );
        assert_prints(
            "var f = fun (a) { return a; };",
            "(var f (lambda (a) (block (return a))))",
        );
        // An anonymous function may also start an expression statement.
        assert_prints("fun () {}();", "(; (call (lambda () (block))))");
    }

    #[test]
    fn test_super_this_and_control_statements() {
        assert_prints(
            "if (x) { super.go(); } else print this;",
            "(if x (block (; (call (super go)))) (print this))",
        );
        assert_prints(
            "while (true) { continue; }",
            "(while true (block (continue)))",
        );
        assert_prints("var x;", "(var x)");
    }

    #[test]
    fn test_reverse_polish_printing() {
        let rpn = |source: &str| -> Vec<String> {
            parse_source(source)
                .unwrap()
                .iter()
                .map(|stmt| RpnPrinter.print_stmt(stmt))
                .collect()
        };

        assert_eq!(rpn("(1 + 2) * 3;"), vec!["1 2 + 3 * ;"]);
        assert_eq!(rpn("print 1 + 2 * 3;"), vec!["1 2 3 * + print"]);
        assert_eq!(rpn("-(4 - 2.5) / !true;"), vec!["4 2.5 - neg true ! / ;"]);
        assert_eq!(rpn("a = (b ? 1 : 2);"), vec!["b 1 2 ?: a = ;"]);
        // Statements without a postfix form print as usual.
        assert_eq!(rpn("var x = 1;"), vec!["(var x 1.0)"]);
    }

    #[test]
    fn test_recovery_reports_every_error() {
        let errors = parse_errors("var = 1;\nprint 2\nvar ok = 3;\n1 +;");

        assert_eq!(
            errors,
            vec![
                "[Line 1] Error at '=': Expect variable name",
                "[Line 3] Error at 'var': Expect ';' after value",
                "[Line 4] Error at ';': Expect expression",
            ]
        );
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert_eq!(
            parse_errors("1 = 2;"),
            vec!["[Line 1] Error at '=': Invalid assignment target"]
        );
        assert_eq!(
            parse_errors("a + b = c;"),
            vec!["[Line 1] Error at '=': Invalid assignment target"]
        );
    }

    #[test]
    fn test_error_at_end() {
        assert_eq!(
            parse_errors("print 1"),
            vec!["[Line 1] Error at end: Expect ';' after value"]
        );
    }

    #[test]
    fn test_argument_and_parameter_limits() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        assert_eq!(
            parse_errors(&source),
            vec!["[Line 1] Error at '255': Can't have more than 255 arguments"]
        );

        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));

        assert_eq!(
            parse_errors(&source),
            vec!["[Line 1] Error at 'p255': Can't have more than 255 parameters"]
        );
    }

    #[test]
    fn test_lex_and_parse_errors_are_reported_together() {
        assert_eq!(
            parse_errors("@ print 1"),
            vec![
                "[Line 1] Error: Unexpected character '@'",
                "[Line 1] Error at end: Expect ';' after value",
            ]
        );
    }

    #[test]
    fn test_ast_serializes_to_json() {
        let statements: Vec<Stmt> = parse_source("print 1;").unwrap();
        let json = serde_json::to_value(&statements).unwrap();

        assert_eq!(
            json,
            serde_json::json!([{ "Print": { "Literal": { "Number": 1.0 } } }])
        );
    }
}
