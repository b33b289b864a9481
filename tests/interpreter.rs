#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Cursor, Write};
    use std::rc::Rc;
    use std::thread;

    use rox::interpreter::Interpreter;
    use rox::lox::Lox;

    /// Output sink the test can read back after the interpreter is done.
    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl SharedBuffer {
        fn take(&self) -> String {
            let bytes = std::mem::take(&mut *self.0.borrow_mut());
            String::from_utf8(bytes).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn session() -> (Lox, SharedBuffer) {
        let output = SharedBuffer::default();
        let lox = Lox::with_interpreter(Interpreter::with_io(output.clone(), io::empty()));
        (lox, output)
    }

    fn run(source: &str) -> (String, Vec<String>) {
        let (mut lox, output) = session();

        let errors = match lox.run(source) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.iter().map(ToString::to_string).collect(),
        };

        (output.take(), errors)
    }

    fn assert_output(source: &str, expected: &str) {
        let (output, errors) = run(source);

        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        assert_eq!(output, expected);
    }

    fn assert_runtime_error(source: &str, expected_output: &str, expected_error: &str) {
        let (output, errors) = run(source);

        assert_eq!(errors, vec![expected_error.to_string()]);
        assert_eq!(output, expected_output);
    }

    // ───────────────────────────── language basics ─────────────────────────

    #[test]
    fn test_block_scoping_and_shadowing() {
        assert_output("var a = 1; { var a = 2; print a; } print a;", "2\n1\n");
        assert_output("var a = 1; { a = 2; } print a;", "2\n");
        assert_output("var a; print a;", "nil\n");
    }

    #[test]
    fn test_value_text_forms() {
        let source = r#"
            print true;
            print nil;
            print 3;
            print 2.5;
            fun f() {}
            print f;
            print clock;
            class C {}
            print C;
            print C();
            print Array(1);
            print fun () {};
        "#;

        assert_output(
            source,
            "true\nnil\n3\n2.5\n<fn f>\n<native fn clock>\nC\nC instance\n<array>\n<fn anonymous>\n",
        );
    }

    #[test]
    fn test_arithmetic_and_equality() {
        let source = r#"
            print 7 - 2 * 3;
            print (1 + 2) / 2;
            print "ab" + "cd";
            print "1" + 2;
            print 2 + "x";
            print -(3);
            print !nil;
            print 1 == 1;
            print "a" == "a";
            print nil == false;
            print 1 == "1";
            print 3 >= 3;
        "#;

        assert_output(
            source,
            "1\n1.5\nabcd\n12\n2x\n-3\ntrue\ntrue\ntrue\nfalse\nfalse\ntrue\n",
        );
    }

    #[test]
    fn test_truthiness_logic_ternary_and_comma() {
        let source = r#"
            if (0) print "zero is truthy";
            if ("") print "empty is truthy";
            print nil or "yes";
            print false and undefinedFunction();
            print true ? 1 : 2;
            print nil ? 1 : false ? 2 : 3;
            var x = (1, 2);
            print x;
        "#;

        assert_output(
            source,
            "zero is truthy\nempty is truthy\nyes\nfalse\n1\n3\n2\n",
        );
    }

    // ───────────────────────────── runtime errors ──────────────────────────

    #[test]
    fn test_type_errors() {
        assert_runtime_error("print -\"a\";", "", "[Line 1] Operand must be a number");
        assert_runtime_error("print 1 < \"2\";", "", "[Line 1] Operands must be numbers");
        assert_runtime_error(
            "print true + 1;",
            "",
            "[Line 1] Operands must be two numbers or two strings",
        );
        assert_runtime_error("print 1 / 0;", "", "[Line 1] Division by zero");
    }

    #[test]
    fn test_call_errors() {
        assert_runtime_error(
            "fun f(a, b) { return a + b; } print f(1);",
            "",
            "[Line 1] Expected 2 arguments, but got 1",
        );
        assert_runtime_error(
            "\"x\"();",
            "",
            "[Line 1] Can only call functions and classes",
        );
    }

    #[test]
    fn test_undefined_variables() {
        assert_runtime_error("print y;", "", "[Line 1] Undefined variable 'y'");
        assert_runtime_error("y = 1;", "", "[Line 1] Undefined variable 'y'");
    }

    #[test]
    fn test_first_runtime_error_aborts_the_run() {
        assert_runtime_error(
            "print 1;\nprint nope;\nprint 2;",
            "1\n",
            "[Line 2] Undefined variable 'nope'",
        );
    }

    #[test]
    fn test_static_errors_prevent_any_output() {
        let (output, errors) = run("print 1;\nprint (;");

        assert_eq!(output, "");
        assert_eq!(errors, vec!["[Line 2] Error at ';': Expect expression"]);
    }

    // ───────────────────────────── loops ───────────────────────────────────

    #[test]
    fn test_while_and_break() {
        assert_output(
            "var i = 0; while (true) { if (i == 3) break; print i; i = i + 1; }",
            "0\n1\n2\n",
        );
    }

    #[test]
    fn test_continue_still_runs_for_increment() {
        let source = r#"
            for (var i = 0; i < 5; i = i + 1) {
                if (i == 2) continue;
                if (i == 4) break;
                print i;
            }
        "#;

        assert_output(source, "0\n1\n3\n");
    }

    #[test]
    fn test_break_leaves_only_the_inner_loop() {
        let source = r#"
            for (var i = 0; i < 2; i = i + 1) {
                for (var j = 0; j < 10; j = j + 1) {
                    if (j == 1) break;
                    print i + j;
                }
            }
        "#;

        assert_output(source, "0\n1\n");
    }

    #[test]
    fn test_return_from_inside_loop() {
        let source = r#"
            fun find() {
                for (var i = 0; ; i = i + 1) {
                    if (i * i > 10) return i;
                }
            }
            print find();
        "#;

        assert_output(source, "4\n");
    }

    // ───────────────────────────── functions ───────────────────────────────

    #[test]
    fn test_closure_counter() {
        assert_output(
            "fun mk(){ var i = 0; fun inc(){ i = i + 1; print i; } return inc;} var f = mk(); f(); f();",
            "1\n2\n",
        );
    }

    #[test]
    fn test_closures_capture_by_reference() {
        let source = r#"
            var x = 1;
            fun get() { return x; }
            x = 2;
            print get();

            fun pair() {
                var n = 0;
                fun inc() { n = n + 1; }
                fun read() { return n; }
                inc(); inc();
                return read;
            }
            print pair()();
        "#;

        assert_output(source, "2\n2\n");
    }

    #[test]
    fn test_anonymous_functions_close_over_their_scope() {
        let source = r#"
            fun adder(n) { return fun (x) { return x + n; }; }
            var add2 = adder(2);
            print add2(40);
            print fun (a, b) { return a * b; }(6, 7);
        "#;

        assert_output(source, "42\n42\n");
    }

    #[test]
    fn test_recursion() {
        let source = r#"
            fun fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }
            print fib(15);
        "#;

        assert_output(source, "610\n");
    }

    // ───────────────────────────── classes ─────────────────────────────────

    #[test]
    fn test_fields_methods_and_initializer() {
        let source = r#"
            class Point {
                init(x) { this.x = x; }
                double() { return this.x * 2; }
            }
            var p = Point(21);
            print p.double();
            var m = p.double;
            print m();
            print p.init(5) == p;
            print p.x;
        "#;

        assert_output(source, "42\n42\ntrue\n5\n");
    }

    #[test]
    fn test_getters() {
        let source = r#"
            class Circle {
                init(r) { this.r = r; }
                area { return 3 * this.r * this.r; }
            }
            var c = Circle(2);
            print c.area;
            c.area = 5;
            print c.area;
        "#;

        assert_output(source, "12\n5\n");
    }

    #[test]
    fn test_super_calls_run_with_subclass_this() {
        assert_output(
            r#"class A { hi(){ print "A"; } } class B < A { hi(){ super.hi(); print "B"; } } B().hi();"#,
            "A\nB\n",
        );

        let source = r#"
            class A {
                init(n) { this.n = n; }
                name() { return "A"; }
                greet() { print "hi " + this.name() + " " + this.n; }
            }
            class B < A {
                name() { return "B"; }
                greet() { super.greet(); }
            }
            B(7).greet();
        "#;

        assert_output(source, "hi B 7\n");

        // `super.name` falls back to a superclass getter, run with this
        // instance's fields.
        let source = r#"
            class A { size { return this.n * 2; } }
            class B < A {
                init(n) { this.n = n; }
                size { return super.size + 1; }
            }
            print B(5).size;
        "#;

        assert_output(source, "11\n");
    }

    #[test]
    fn test_class_errors() {
        assert_runtime_error(
            "var NotClass = 1; class B < NotClass {}",
            "",
            "[Line 1] Superclass must be a class",
        );
        assert_runtime_error(
            "var n = 1; print n.x;",
            "",
            "[Line 1] Only instances have properties",
        );
        assert_runtime_error(
            "var n = 1; n.x = 2;",
            "",
            "[Line 1] Only instances have fields",
        );
        assert_runtime_error(
            "class A {} print A().nope;",
            "",
            "[Line 1] Undefined property 'nope'",
        );
    }

    // ───────────────────────────── natives ─────────────────────────────────

    #[test]
    fn test_arrays() {
        let source = r#"
            var a = Array(3);
            a.set(0, "x");
            print a.get(0);
            print a.get(1);
            print a.length;
            var b = Array(5);
            a.copyto(b);
            print b.get(0);
            print a == a;
            print a == Array(3);
            a.get(3);
        "#;

        assert_runtime_error(
            source,
            "x\nnil\n3\nx\ntrue\nfalse\n",
            "[Line 12] Index was outside of bounds",
        );
    }

    #[test]
    fn test_array_errors() {
        assert_runtime_error(
            "Array(3).copyto(Array(2));",
            "",
            "[Line 1] Destination array is not long enough",
        );
        assert_runtime_error(
            "Array(1).push;",
            "",
            "[Line 1] Array does not support 'push'",
        );
        assert_runtime_error(
            "Array(-1);",
            "",
            "[Line 1] Array length must be a non-negative integer",
        );
        assert_runtime_error(
            "Array(1000000000000000000);",
            "",
            "[Line 1] Array length is too large",
        );
        assert_runtime_error(
            "Array(2).set(1.5, nil);",
            "",
            "[Line 1] Index was outside of bounds",
        );
    }

    #[test]
    fn test_input_reads_lines_until_end() {
        let output = SharedBuffer::default();
        let input = Cursor::new("alice\r\nbob\n");
        let mut lox = Lox::with_interpreter(Interpreter::with_io(output.clone(), input));

        lox.run("print input(); print input(); print input();")
            .unwrap();

        assert_eq!(output.take(), "alice\nbob\nnil\n");
    }

    #[test]
    fn test_clock_is_positive() {
        assert_output("print clock() > 0;", "true\n");
    }

    // ───────────────────────────── sessions ────────────────────────────────

    #[test]
    fn test_repl_lines_share_globals() {
        let (mut lox, output) = session();

        lox.run_line("var a = 1;").unwrap();
        lox.run_line("a + 1;").unwrap();
        lox.run_line("fun f() { return a; }").unwrap();
        lox.run_line("f();").unwrap();
        assert_eq!(output.take(), "2\n1\n");

        // A failing line does not end the session.
        assert!(lox.run_line("print nope;").is_err());
        lox.run_line("print a;").unwrap();
        assert_eq!(output.take(), "1\n");
    }

    #[test]
    fn test_stack_overflow_is_reported() {
        // An ordinary 8 MiB thread with the default depth limit.
        let worker = thread::Builder::new()
            .stack_size(8 * 1024 * 1024)
            .spawn(|| {
                let (mut lox, output) = session();

                let overflow = lox
                    .run("fun f(n) { return f(n + 1); }\nf(0);")
                    .unwrap_err()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>();

                // The session is still usable afterwards.
                lox.run("print f;").unwrap();

                (overflow, output.take())
            })
            .unwrap();

        let (errors, output) = worker.join().unwrap();

        assert_eq!(errors, vec!["[Line 1] Stack overflow"]);
        assert_eq!(output, "<fn f>\n");
    }

    #[test]
    fn test_max_depth_is_configurable() {
        let output = SharedBuffer::default();
        let interpreter = Interpreter::with_io(output.clone(), io::empty()).with_max_depth(10);
        let mut lox = Lox::with_interpreter(interpreter);

        let source = r#"
            var deepest = 0;
            fun f(n) { deepest = n; f(n + 1); }
            f(1);
        "#;
        let errors: Vec<String> = lox
            .run(source)
            .unwrap_err()
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(errors, vec!["[Line 3] Stack overflow"]);

        lox.run("print deepest;").unwrap();
        assert_eq!(output.take(), "10\n");
    }
}
