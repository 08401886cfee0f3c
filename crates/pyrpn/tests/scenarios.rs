use pyrpn::{CompileOptions, LineKind, Program, transpile, transpile_to_string};
use serde_json::json;

/// Transpiles without the support library so only the user code is compared.
fn user_code(code: &str) -> Vec<String> {
    let options = CompileOptions::new().emit_support_library(false);
    let program = transpile(code, &options).expect("transpile failed");
    program.texts().map(str::to_owned).collect()
}

fn full_program(code: &str) -> Program {
    transpile(code, &CompileOptions::new()).expect("transpile failed")
}

#[test]
fn empty_function() {
    assert_eq!(user_code("def simple():\n    pass\n"), ["LBL \"SIMPLE\"", "RTN"]);
}

#[test]
fn constant_assignment_takes_first_register() {
    assert_eq!(
        user_code("def simple():\n    x = 100\n"),
        ["LBL \"SIMPLE\"", "100", "STO 00", "RTN"]
    );
}

#[test]
fn range_loop_with_parameter() {
    let code = "def looper(n):\n    total = 100\n    for i in range(1, n):\n        total += n\n    return total\n";
    assert_eq!(
        user_code(code),
        [
            "LBL \"LOOPER\"",
            "STO 00",
            "RDN",
            "100",
            "STO 01",
            "1",
            "RCL 00",
            "1",
            "XEQ \"pISG\"",
            "STO 02",
            "LBL 00",
            "RCL 00",
            "STO+ 01",
            "ISG 02",
            "GTO 00",
            "RCL 01",
            "RTN",
        ]
    );
}

#[test]
fn comparison_joined_with_and() {
    assert_eq!(
        user_code("def g():\n    return 2 > 1 and 3 != 3\n"),
        [
            "LBL \"G\"",
            "2",
            "1",
            "XEQ \"pGT\"",
            "3",
            "3",
            "XEQ \"pNEQ\"",
            "XEQ \"p2Bool\"",
            "AND",
            "RTN",
        ]
    );
}

#[test]
fn list_append_binds_zlist() {
    assert_eq!(
        user_code("def h():\n    L = []\n    L.append(4)\n"),
        [
            "LBL \"H\"",
            "CLV \"L\"",
            "\"L\"",
            "ASTO \"ZLIST\"",
            "CF 02",
            "4",
            "XEQ \"LIST+\"",
            "RTN",
        ]
    );
}

#[test]
fn export_annotation_selects_global_label() {
    let code = "def a():\n    pass\ndef b():  # rpn: export\n    pass\ndef c():\n    pass\n";
    let lines = user_code(code);
    let labels: Vec<&str> = lines.iter().filter(|l| l.starts_with("LBL")).map(String::as_str).collect();
    assert_eq!(labels, ["LBL \"A\"", "LBL \"B\"", "LBL A"]);
}

#[test]
fn long_global_names_are_truncated() {
    let lines = user_code("def calculate_total():\n    pass\n");
    assert_eq!(lines[0], "LBL \"CALCULA\"");
}

#[test]
fn nested_function_follows_parent_and_sees_its_variables() {
    let code = "def outer():\n    x = 1\n    def inner():\n        return x\n    return inner()\n";
    assert_eq!(
        user_code(code),
        [
            "LBL \"OUTER\"",
            "1",
            "STO 00",
            "XEQ A",
            "RTN",
            "LBL A",
            "RCL 00",
            "RTN",
        ]
    );
}

#[test]
fn assignment_in_inner_scope_writes_through() {
    let code = "LBL(\"main\")\ncount = 0\ndef bump():\n    count = count + 1\n";
    let lines = user_code(code);
    // the function body reuses register 00 rather than allocating a new one
    assert_eq!(
        lines,
        [
            "LBL \"MAIN\"",
            "0",
            "STO 00",
            "RTN",
            "LBL A",
            "RCL 00",
            "1",
            "+",
            "STO 00",
            "RTN",
        ]
    );
}

#[test]
fn uppercase_names_use_named_variables() {
    assert_eq!(
        user_code("def f():\n    TOTAL = 3\n    return TOTAL\n"),
        ["LBL \"F\"", "3", "STO \"TOTAL\"", "RCL \"TOTAL\"", "RTN"]
    );
}

#[test]
fn primitives_take_stack_and_operand_arguments() {
    assert_eq!(
        user_code("def f():\n    CLLCD()\n    FIX(4)\n    return SQRT(16)\n"),
        ["LBL \"F\"", "CLLCD", "FIX 04", "16", "SQRT", "RTN"]
    );
}

#[test]
fn pixel_arguments_are_reversed() {
    assert_eq!(
        user_code("def f():\n    PIXEL(3, 7)\n"),
        ["LBL \"F\"", "7", "3", "PIXEL", "RTN"]
    );
}

#[test]
fn operators_map_to_calculator_functions() {
    assert_eq!(
        user_code("def f(a, b):\n    return -(a // b) ** 2 % 3\n"),
        [
            "LBL \"F\"",
            "STO 01",
            "RDN",
            "STO 00",
            "RDN",
            "RCL 00",
            "RCL 01",
            "÷",
            "IP",
            "2",
            "Y↑X",
            "+/-",
            "3",
            "MOD",
            "RTN",
        ]
    );
}

#[test]
fn not_normalises_before_inverting() {
    assert_eq!(
        user_code("def f(a):\n    return not a\n"),
        ["LBL \"F\"", "STO 00", "RDN", "RCL 00", "XEQ \"pBool\"", "XEQ \"pNot\"", "RTN"]
    );
}

#[test]
fn flag_tests_and_assert() {
    assert_eq!(
        user_code("def f():\n    assert FS(5)\n"),
        ["LBL \"F\"", "5", "XEQ \"pFS\"", "XEQ \"pAssert\"", "RTN"]
    );
}

#[test]
fn matrix_slice_uses_getm() {
    let code = "def f():\n    M = NEWMAT(3, 3)\n    S = M[0:2, 1:3]\n";
    assert_eq!(
        user_code(code),
        [
            "LBL \"F\"",
            "3",
            "3",
            "NEWMAT",
            "STO \"M\"",
            "INDEX \"M\"",
            "0",
            "1",
            "XEQ \"pMxIJ\"",
            "0",
            "2",
            "1",
            "3",
            "XEQ \"pMxSz\"",
            "GETM",
            "STO \"S\"",
            "RTN",
        ]
    );
}

#[test]
fn list_alias_shares_storage() {
    let code = "def f():\n    L = [1]\n    K = L\n    K.pop()\n";
    assert_eq!(
        user_code(code),
        [
            "LBL \"F\"",
            "CLV \"L\"",
            "\"L\"",
            "ASTO \"ZLIST\"",
            "CF 02",
            "1",
            "XEQ \"LIST+\"",
            "\"L\"",
            "ASTO \"ZLIST\"",
            "XEQ \"LIST-\"",
            "RTN",
        ]
    );
}

#[test]
fn len_of_list_and_matrix() {
    let code = "def f():\n    L = []\n    M = NEWMAT(1, 2)\n    return len(L) + len(M)\n";
    assert_eq!(
        user_code(code),
        [
            "LBL \"F\"",
            "CLV \"L\"",
            "1",
            "2",
            "NEWMAT",
            "STO \"M\"",
            "\"L\"",
            "ASTO \"ZLIST\"",
            "XEQ \"pLen\"",
            "RCL \"M\"",
            "DIM?",
            "RDN",
            "+",
            "RTN",
        ]
    );
}

#[test]
fn string_lines_are_tagged() {
    let program = full_program("def f():\n    s = \"hi\"\n");
    let kinds: Vec<LineKind> = program.lines().iter().take(3).map(|line| line.kind()).collect();
    assert_eq!(kinds, [LineKind::Plain, LineKind::String, LineKind::Plain]);
    assert_eq!(program.lines()[2].text(), "ASTO 00");
}

#[test]
fn comments_and_line_numbers_render() {
    let options = CompileOptions::new()
        .emit_support_library(false)
        .emit_comments(true)
        .emit_linenos(true);
    let rendered = transpile_to_string("def f(n):\n    return n\n", &options).unwrap();
    assert_eq!(
        rendered,
        "00 LBL \"F\"             // def f(n):\n01 STO 00              // n\n02 RDN\n03 RCL 00\n04 RTN"
    );
}

#[test]
fn lines_serialize_for_json_output() {
    let options = CompileOptions::new().emit_support_library(false);
    let program = transpile("def f(n):\n    return n\n", &options).unwrap();
    assert_eq!(
        serde_json::to_value(&program.lines()[0]).unwrap(),
        json!({"text": "LBL \"F\"", "lineno": 0, "comment": "def f(n):", "kind": "plain"})
    );
    // lines without a comment leave the key out
    assert_eq!(
        serde_json::to_value(&program.lines()[2]).unwrap(),
        json!({"text": "RDN", "lineno": 2, "kind": "plain"})
    );

    let program = transpile("def f():\n    s = \"hi\"\n", &options).unwrap();
    assert_eq!(serde_json::to_value(&program.lines()[1]).unwrap()["kind"], "string");
}

#[test]
fn scalar_store_rebinds_a_list_alias() {
    let code = "def f():\n    a = [1]\n    b = a\n    b = 5\n    return b\n";
    assert_eq!(
        user_code(code),
        [
            "LBL \"F\"",
            "CLV \"a\"",
            "\"a\"",
            "ASTO \"ZLIST\"",
            "CF 02",
            "1",
            "XEQ \"LIST+\"",
            "5",
            "STO 00",
            "RCL 00",
            "RTN",
        ]
    );
}

#[test]
fn input_target_becomes_a_named_variable() {
    assert_eq!(
        user_code("def f():\n    INPUT(x)\n    return x\n"),
        ["LBL \"F\"", "INPUT \"x\"", "RCL \"x\"", "RTN"]
    );
}
