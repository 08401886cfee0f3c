use pyrpn::{CompileOptions, ErrorKind, Phase, RpnError, transpile};

/// Helper to extract the error from a transpilation that must fail.
fn transpile_err(code: &str) -> RpnError {
    transpile(code, &CompileOptions::new()).expect_err("expected transpile error")
}

fn kind_of(code: &str) -> ErrorKind {
    transpile_err(code).kind()
}

#[test]
fn syntax_errors_come_from_the_parse_phase() {
    let err = transpile_err("def f(:\n    pass\n");
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(err.phase(), Phase::Parse);
}

#[test]
fn unbound_identifier_reports_line() {
    let err = transpile_err("def f():\n    x = 1\n    return y\n");
    assert_eq!(err.kind(), ErrorKind::UnboundIdentifier);
    assert_eq!(err.phase(), Phase::Compile);
    assert_eq!(err.lineno(), Some(3));
    assert_eq!(
        err.to_string(),
        "name 'y' is not defined (compile), line: 3\n    return y"
    );
}

#[test]
fn unknown_function_is_unbound() {
    assert_eq!(kind_of("def f():\n    return g(1)\n"), ErrorKind::UnboundIdentifier);
}

#[test]
fn duplicate_function_is_a_lookahead_error() {
    let err = transpile_err("def f():\n    pass\ndef f():\n    pass\n");
    assert_eq!(err.kind(), ErrorKind::DuplicateFunction);
    assert_eq!(err.phase(), Phase::Lookahead);
    assert_eq!(err.lineno(), Some(3));
}

#[test]
fn global_label_collisions_are_duplicates() {
    let err = transpile_err("def calculate_total():\n    pass\ndef calculate_sum():  # rpn: export\n    pass\n");
    assert_eq!(err.kind(), ErrorKind::DuplicateFunction);
    assert_eq!(err.phase(), Phase::Lookahead);
    assert_eq!(err.lineno(), Some(3));
    assert!(err.message().contains("\"CALCULA\""), "{err}");
    assert!(err.message().contains("'calculate_total'"), "{err}");

    assert_eq!(
        kind_of("LBL(\"main\")\ndef main():  # rpn: export\n    pass\n"),
        ErrorKind::DuplicateFunction
    );
}

#[test]
fn strings_are_rejected_in_tuple_assignment() {
    let err = transpile_err("def f():\n    a, b = \"x\", 1\n");
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert_eq!(err.lineno(), Some(2));
    assert!(err.message().contains("tuple assignment"), "{err}");
}

#[test]
fn indexing_a_loop_element_names_its_list() {
    let err = transpile_err("def f():\n    L = [1]\n    for e in L:\n        x = e[0]\n");
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert_eq!(err.lineno(), Some(4));
    assert!(err.message().contains("one element of 'L'"), "{err}");
}

#[test]
fn misplaced_entry_label() {
    assert_eq!(kind_of("def f():\n    pass\nLBL(\"main\")\n"), ErrorKind::BadLabel);
    assert_eq!(kind_of("def f():\n    LBL(\"x\")\n"), ErrorKind::BadLabel);
}

#[test]
fn unsupported_constructs() {
    for code in [
        "class A:\n    pass\n",
        "def f():\n    try:\n        pass\n    except Exception:\n        pass\n",
        "def f():\n    return [x for x in range(3)]\n",
        "def f():\n    return lambda: 1\n",
        "def f(a=1):\n    pass\n",
        "def f():\n    return 1 << 2\n",
        "def f(a, b):\n    return a is b\n",
        "def f():\n    for i in range(3):\n        pass\n    else:\n        pass\n",
        "x = 1\n",
    ] {
        let err = transpile_err(code);
        assert_eq!(err.kind(), ErrorKind::Unsupported, "code: {code:?}, got: {err}");
    }
}

#[test]
fn break_outside_loop() {
    assert_eq!(kind_of("def f():\n    break\n"), ErrorKind::Unsupported);
}

#[test]
fn primitive_argument_mismatch() {
    assert_eq!(kind_of("def f():\n    return NEWMAT(1)\n"), ErrorKind::PrimitiveMismatch);
    assert_eq!(kind_of("def f(n):\n    FIX(n)\n"), ErrorKind::PrimitiveMismatch);
    assert_eq!(kind_of("def f():\n    for i in range(1, 2, 3, 4):\n        pass\n"), ErrorKind::PrimitiveMismatch);
}

#[test]
fn range_stop_above_limit() {
    assert_eq!(kind_of("def f():\n    for i in range(1000):\n        pass\n"), ErrorKind::RangeOutOfBounds);
    assert_eq!(kind_of("def f():\n    for i in range(0, 5, 0):\n        pass\n"), ErrorKind::RangeOutOfBounds);
}

#[test]
fn range_stop_at_limit_is_accepted() {
    assert!(transpile("def f():\n    for i in range(999):\n        pass\n", &CompileOptions::new()).is_ok());
}

#[test]
fn too_many_local_functions() {
    let mut code = String::from("def main():\n    pass\n");
    for index in 0..15 {
        code.push_str(&format!("def f{index}():\n    pass\n"));
    }
    assert_eq!(kind_of(&code), ErrorKind::LabelBankExhausted);
}

#[test]
fn registers_run_out() {
    let options = CompileOptions::new().max_registers(2);
    let err = transpile("def f():\n    a = 1\n    b = 2\n    c = 3\n", &options).expect_err("expected error");
    assert_eq!(err.kind(), ErrorKind::RegistersExhausted);
    assert_eq!(err.lineno(), Some(4));
}

#[test]
fn back_jump_labels_run_out() {
    let mut code = String::from("def f():\n");
    for _ in 0..31 {
        code.push_str("    while 0:\n        pass\n");
    }
    assert_eq!(kind_of(&code), ErrorKind::JumpLabelsExhausted);
}

#[test]
fn library_routine_names_are_reserved() {
    assert_eq!(kind_of("def clist():\n    pass\n"), ErrorKind::BadLabel);
}
