use pyrpn::{CompileOptions, LIBRARY_HEADER_LABEL, Program, library_entries, transpile};

fn program_for(code: &str, options: &CompileOptions) -> Program {
    transpile(code, options).expect("transpile failed")
}

/// Names of the library routines in a program, read from their global labels.
fn routine_labels(program: &Program) -> Vec<String> {
    program
        .texts()
        .skip_while(|text| *text != format!("LBL \"{LIBRARY_HEADER_LABEL}\""))
        .filter_map(|text| text.strip_prefix("LBL \"")?.strip_suffix('"').map(str::to_owned))
        .filter(|name| name != LIBRARY_HEADER_LABEL)
        .collect()
}

#[test]
fn no_library_without_references() {
    let program = program_for("def f():\n    x = 1\n", &CompileOptions::new());
    assert_eq!(program.texts().collect::<Vec<_>>(), ["LBL \"F\"", "1", "STO 00", "RTN"]);
    assert_eq!(program.needed_library().count(), 0);
}

#[test]
fn referenced_routines_come_with_prerequisites() {
    let options = CompileOptions::new().rewrite_support_library_to_local_labels(false);
    let program = program_for("def f(a, b):\n    return a > b\n", &options);
    // pGT normalises through p0Bool
    assert_eq!(routine_labels(&program), ["pGT", "p0Bool"]);
}

#[test]
fn dict_lookup_pulls_in_the_whole_chain() {
    let options = CompileOptions::new().rewrite_support_library_to_local_labels(false);
    let program = program_for("def f():\n    d = {}\n    return d[1]\n", &options);
    assert_eq!(
        routine_labels(&program),
        ["pISG", "pErOutR", "pStoStk", "pRclStk", "LIST+", "p2MxIJ", "PErNkey"]
    );
}

#[test]
fn every_routine_is_emitted_once() {
    let options = CompileOptions::new().rewrite_support_library_to_local_labels(false);
    let code = "def f(a, b):\n    x = a < b\n    y = a <= b\n    return x == y\n";
    let labels = routine_labels(&program_for(code, &options));
    let mut deduped = labels.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(labels.len(), deduped.len(), "{labels:?}");
    assert!(labels.contains(&"pEQ".to_owned()) && labels.contains(&"p0Bool".to_owned()));
}

#[test]
fn rewriting_uses_numeric_labels() {
    let program = program_for("def f(a, b):\n    return a > b\n", &CompileOptions::new());
    let texts: Vec<&str> = program.texts().collect();
    assert!(texts.contains(&"LBL 50"), "library entry label missing: {texts:?}");
    assert!(
        !texts.iter().any(|text| text.starts_with("XEQ \"p")),
        "library calls should be rewritten: {texts:?}"
    );
    // user labels stay global
    assert_eq!(texts[0], "LBL \"F\"");
}

#[test]
fn catalogue_bodies_are_well_formed() {
    for entry in library_entries() {
        assert_eq!(
            entry.body().lines().next(),
            Some(format!("LBL \"{}\"", entry.name()).as_str()),
            "{} should start with its label",
            entry.name()
        );
        assert!(entry.body().trim_end().ends_with("RTN"), "{} should end with RTN", entry.name());
        for label in entry.internal_labels() {
            assert!((90..=99).contains(label), "{} uses label {label}", entry.name());
        }
    }
}
