use pretty_assertions::assert_eq;

use treelox::{Lox, RunError, RuntimeError, StaticError};

// Runs code in a fresh session and returns everything it printed.
fn run(code: &str) -> Result<String, RunError> {
    let mut lox = Lox::new(Vec::new());
    lox.run(code)?;
    Ok(String::from_utf8(lox.into_output()).expect("output should be utf-8"))
}

// Runs code that must fail at runtime; returns the output printed before the failure.
fn run_failing(code: &str) -> (String, RuntimeError) {
    let mut lox = Lox::new(Vec::new());
    let err = lox.run(code).expect_err("code should fail");
    let output = String::from_utf8(lox.into_output()).expect("output should be utf-8");
    match err {
        RunError::Runtime(e) => (output, e),
        RunError::Static(errors) => panic!("expected a runtime error, got {errors:?}"),
    }
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(run("print 1 + 2 * 3;").unwrap(), "7\n");
    assert_eq!(run("print (1 + 2) * 3;").unwrap(), "9\n");
    assert_eq!(run("print 10 / 4;").unwrap(), "2.5\n");
    assert_eq!(run("print -(3 - 5);").unwrap(), "2\n");
}

#[test]
fn string_concatenation() {
    assert_eq!(run("print \"a\" + \"b\";").unwrap(), "ab\n");
}

#[test]
fn mixed_plus_is_type_error() {
    let (_, err) = run_failing("print 1 + \"b\";");
    assert_eq!(
        err.to_string(),
        "Operands must be two numbers or two strings.\n[line 1]"
    );
}

#[test]
fn comparison_and_equality() {
    let code = "\
        print 1 < 2;\n\
        print 2 <= 1;\n\
        print nil == nil;\n\
        print nil == false;\n\
        print \"a\" == \"a\";\n\
        print 1 == \"1\";\n\
        print !nil;\n\
        print !0;";
    assert_eq!(
        run(code).unwrap(),
        "true\nfalse\ntrue\nfalse\ntrue\nfalse\ntrue\nfalse\n"
    );
}

#[test]
fn number_equality_edge_cases() {
    assert_eq!(run("var n = 0 / 0; print n == n; print n != n;").unwrap(), "true\nfalse\n");
    assert_eq!(run("print 0 == -0; print -0 == -0;").unwrap(), "false\ntrue\n");
}

#[test]
fn division_by_zero_prints_infinity() {
    assert_eq!(
        run("print 1 / 0; print -1 / 0; print 0 / 0;").unwrap(),
        "Infinity\n-Infinity\nNaN\n"
    );
}

#[test]
fn comparison_needs_numbers() {
    let (_, err) = run_failing("print \"a\" < 1;");
    assert_eq!(err.to_string(), "Operands must be numbers.\n[line 1]");
}

#[test]
fn logical_operators_return_operands() {
    let code = "\
        print nil or \"default\";\n\
        print \"first\" or undefined;\n\
        print false and undefined;\n\
        print 1 and 2;";
    assert_eq!(run(code).unwrap(), "default\nfirst\nfalse\n2\n");
}

#[test]
fn variable_scoping() {
    let code = "\
        var a = \"global a\";\n\
        var b = \"global b\";\n\
        {\n\
            var a = \"inner a\";\n\
            b = \"assigned b\";\n\
            print a;\n\
            print b;\n\
        }\n\
        print a;\n\
        print b;";
    assert_eq!(
        run(code).unwrap(),
        "inner a\nassigned b\nglobal a\nassigned b\n"
    );
}

#[test]
fn var_without_initializer_is_nil() {
    assert_eq!(run("var a; print a;").unwrap(), "nil\n");
}

#[test]
fn redeclaring_global_rebinds() {
    assert_eq!(run("var a = 1; var a = 2; print a;").unwrap(), "2\n");
}

#[test]
fn undefined_variable() {
    let (_, err) = run_failing("print missing;");
    assert_eq!(err.to_string(), "Undefined variable 'missing'.\n[line 1]");
}

#[test]
fn assignment_never_creates_global() {
    let (_, err) = run_failing("\n\nfresh = 1;");
    assert_eq!(err.to_string(), "Undefined variable 'fresh'.\n[line 3]");
}

#[test]
fn if_else() {
    let code = "\
        if (1 > 2) print \"then\"; else print \"else\";\n\
        if (true) print \"only then\";\n\
        if (nil) print \"skipped\";";
    assert_eq!(run(code).unwrap(), "else\nonly then\n");
}

#[test]
fn while_loop() {
    let code = "\
        var i = 0;\n\
        while (i < 3) {\n\
            print i;\n\
            i = i + 1;\n\
        }";
    assert_eq!(run(code).unwrap(), "0\n1\n2\n");
}

#[test]
fn for_loop_scopes_its_initializer() {
    assert_eq!(
        run("for (var i = 0; i < 3; i = i + 1) print i;").unwrap(),
        "0\n1\n2\n"
    );

    let (output, err) = run_failing("for (var i = 0; i < 1; i = i + 1) print i;\nprint i;");
    assert_eq!(output, "0\n");
    assert_eq!(err.to_string(), "Undefined variable 'i'.\n[line 2]");
}

#[test]
fn for_loop_with_outer_variable() {
    let code = "\
        var i;\n\
        for (i = 10; i > 7;) i = i - 1;\n\
        print i;";
    assert_eq!(run(code).unwrap(), "7\n");
}

#[test]
fn functions_and_return() {
    let code = "\
        fun add(a, b) { return a + b; }\n\
        print add(1, 2);\n\
        fun nothing() {}\n\
        print nothing();\n\
        fun early() { return; print \"unreachable\"; }\n\
        print early();\n\
        print add;";
    assert_eq!(run(code).unwrap(), "3\nnil\nnil\n<fn add>\n");
}

#[test]
fn return_unwinds_nested_blocks_and_loops() {
    let code = "\
        fun find() {\n\
            var i = 0;\n\
            while (true) {\n\
                {\n\
                    if (i == 3) return i;\n\
                }\n\
                i = i + 1;\n\
            }\n\
        }\n\
        print find();\n\
        print \"after\";";
    assert_eq!(run(code).unwrap(), "3\nafter\n");
}

#[test]
fn recursion() {
    let code = "\
        fun fib(n) {\n\
            if (n < 2) return n;\n\
            return fib(n - 2) + fib(n - 1);\n\
        }\n\
        print fib(15);";
    assert_eq!(run(code).unwrap(), "610\n");
}

#[test]
fn closures_capture_by_reference() {
    let code = "\
        fun makeCounter() {\n\
            var i = 0;\n\
            fun count() { i = i + 1; return i; }\n\
            return count;\n\
        }\n\
        var c = makeCounter();\n\
        print c();\n\
        print c();\n\
        var d = makeCounter();\n\
        print d();";
    assert_eq!(run(code).unwrap(), "1\n2\n1\n");
}

#[test]
fn closure_sees_later_assignment_in_defining_scope() {
    let code = "\
        var x = \"before\";\n\
        fun show() { print x; }\n\
        x = \"after\";\n\
        show();";
    assert_eq!(run(code).unwrap(), "after\n");
}

#[test]
fn function_scope_does_not_leak() {
    let (_, err) = run_failing("fun f(p) { var local = p; } f(1); print local;");
    assert_eq!(err.to_string(), "Undefined variable 'local'.\n[line 1]");
}

#[test]
fn arity_mismatch() {
    let (_, err) = run_failing("fun f() {}\nf(1);");
    assert!(matches!(
        err,
        RuntimeError::ArityMismatch {
            expected: 0,
            found: 1,
            ..
        }
    ));
    assert_eq!(err.to_string(), "Expected 0 arguments but got 1.\n[line 2]");
}

#[test]
fn calling_non_callable() {
    let (_, err) = run_failing("var s = \"str\"; s();");
    assert_eq!(err.to_string(), "Can only call functions.\n[line 1]");
}

#[test]
fn clock_is_native() {
    assert_eq!(run("print clock;").unwrap(), "<native fn>\n");
    assert_eq!(run("var t = clock(); print t > 0;").unwrap(), "true\n");
    let (_, err) = run_failing("clock(1);");
    assert_eq!(err.to_string(), "Expected 0 arguments but got 1.\n[line 1]");
}

#[test]
fn runtime_error_stops_the_run() {
    let (output, _) = run_failing("print 1;\nprint -\"x\";\nprint 3;");
    assert_eq!(output, "1\n");
}

#[test]
fn static_errors_suppress_execution() {
    let mut lox = Lox::new(Vec::new());
    let err = lox.run("print 1;\nprint ;\nvar = 2;").unwrap_err();
    let RunError::Static(errors) = &err else {
        panic!("expected static errors");
    };
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].line(), 2);
    assert_eq!(errors[1].line(), 3);
    assert_eq!(err.exit_code(), 65);
    assert!(lox.into_output().is_empty());
}

#[test]
fn scan_and_parse_errors_are_both_reported() {
    let err = run("var a = @;\nprint \"open").unwrap_err();
    let RunError::Static(errors) = err else {
        panic!("expected static errors");
    };
    assert!(matches!(errors[0], StaticError::Scan(_)));
    assert!(matches!(errors[1], StaticError::Scan(_)));
    assert!(errors[2..].iter().all(|e| matches!(e, StaticError::Parse(_))));
    assert!(errors.len() >= 3);
}

#[test]
fn session_survives_errors() {
    let mut lox = Lox::new(Vec::new());
    lox.run("var a = 1;").unwrap();
    assert!(lox.run("print a + nil;").is_err());
    assert!(lox.run("print ;").is_err());
    lox.run("a = a + 1; print a;").unwrap();
    assert_eq!(lox.into_output(), b"2\n");
}

#[test]
fn runtime_error_exit_code() {
    let err = run("nil();").unwrap_err();
    assert_eq!(err.exit_code(), 70);
}
