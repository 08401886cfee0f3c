//! First pass over the AST: decide every function's label before any code is
//! emitted, so calls to functions defined further down resolve.

use tracing::debug;

use crate::{
    error::{CompileError, CompileResult, ErrorKind},
    expressions::{Expr, ExprLoc, FunctionDef, Literal, Node, NodeLoc},
    labels::{FunctionLabels, Label, LabelError},
    library,
    parse::CodeRange,
};

/// Assigns labels to all functions in the module.
///
/// The first function gets a global label unless `LBL("name")` already declared
/// the entry point. After that only functions annotated `# rpn: export` on their
/// `def` line get global labels; the rest share the local-label bank.
pub(crate) fn assign_labels(nodes: &[NodeLoc]) -> CompileResult<FunctionLabels> {
    let mut labels = FunctionLabels::new();
    let mut seen_def = false;
    for node in nodes {
        if let Some(call) = node.entry_declaration() {
            if seen_def {
                return Err(CompileError::new(
                    ErrorKind::BadLabel,
                    "LBL() must come before any function definition",
                    call.position,
                ));
            }
            if labels.entry().is_some() {
                return Err(CompileError::new(
                    ErrorKind::BadLabel,
                    "LBL() may only be declared once",
                    call.position,
                ));
            }
            let entry = labels.set_entry(entry_name(call)?);
            check_library_clash(&entry, call.position)?;
        } else if let Node::FunctionDef(def) = &node.node {
            seen_def = true;
            assign_function(def, &mut labels)?;
        }
    }
    debug!(functions = labels.len(), entry = ?labels.entry(), "lookahead finished");
    Ok(labels)
}

/// Labels `def` and then, in source order, the functions nested in it.
fn assign_function(def: &FunctionDef, labels: &mut FunctionLabels) -> CompileResult<()> {
    let name = &def.name.name;
    let result = if !labels.has_global() || def.is_exported() {
        labels.make_global(name)
    } else {
        labels.make_local(name)
    };
    result.map_err(|err| {
        let kind = match err {
            LabelError::Duplicate(_) | LabelError::GlobalClash { .. } => ErrorKind::DuplicateFunction,
            LabelError::BankExhausted(_) => ErrorKind::LabelBankExhausted,
        };
        CompileError::new(kind, err.to_string(), def.name.position)
    })?;
    if let Some(label) = labels.get(name) {
        check_library_clash(label, def.name.position)?;
    }

    for child in &def.body {
        if let Node::FunctionDef(inner) = &child.node {
            assign_function(inner, labels)?;
        }
    }
    Ok(())
}

/// Global labels share the calculator's namespace with the support library.
fn check_library_clash(label: &Label, position: CodeRange) -> CompileResult<()> {
    match label {
        Label::Global(name) if library::lookup(name).is_some() => Err(CompileError::new(
            ErrorKind::BadLabel,
            format!("label \"{name}\" is reserved for the support library"),
            position,
        )),
        _ => Ok(()),
    }
}

/// The string argument of `LBL("name")`.
fn entry_name(call: &ExprLoc) -> CompileResult<&str> {
    let bad_label = || {
        CompileError::new(
            ErrorKind::BadLabel,
            "LBL() takes a single non-empty string literal",
            call.position,
        )
    };
    let Expr::Call { args, .. } = &call.expr else {
        return Err(bad_label());
    };
    match args.as_slice() {
        [ExprLoc {
            expr: Expr::Literal(Literal::Str(name)),
            ..
        }] if !name.is_empty() => Ok(name.as_str()),
        _ => Err(bad_label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{SourceLines, parse};

    fn labels_for(code: &str) -> CompileResult<FunctionLabels> {
        let source = SourceLines::new(code);
        assign_labels(&parse(&source).unwrap())
    }

    #[test]
    fn first_function_is_global_then_locals() {
        let labels = labels_for("def a():\n    pass\ndef b():  # rpn: export\n    pass\ndef c():\n    pass\n").unwrap();
        assert_eq!(labels.get("a"), Some(&Label::Global("A".to_owned())));
        assert_eq!(labels.get("b"), Some(&Label::Global("B".to_owned())));
        assert_eq!(labels.get("c"), Some(&Label::Local('A')));
    }

    #[test]
    fn declared_entry_makes_first_function_local() {
        let labels = labels_for("LBL(\"main\")\ndef helper():\n    pass\n").unwrap();
        assert_eq!(labels.entry(), Some(&Label::Global("MAIN".to_owned())));
        assert_eq!(labels.get("helper"), Some(&Label::Local('A')));
    }

    #[test]
    fn nested_functions_are_labelled() {
        let labels = labels_for("def outer():\n    def inner():\n        pass\n    inner()\n").unwrap();
        assert_eq!(labels.get("inner"), Some(&Label::Local('A')));
    }

    #[test]
    fn duplicate_across_nesting_is_an_error() {
        let err = labels_for("def f():\n    def f():\n        pass\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateFunction);
    }

    #[test]
    fn late_or_malformed_entry_is_bad_label() {
        let err = labels_for("def f():\n    pass\nLBL(\"main\")\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadLabel);
        let err = labels_for("LBL(3)\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadLabel);
        let err = labels_for("LBL(\"a\", \"b\")\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadLabel);
    }

    #[test]
    fn distinct_names_cannot_share_a_global_label() {
        for code in [
            "def calculate_total():\n    pass\ndef calculate_sum():  # rpn: export\n    pass\n",
            "def foo():\n    pass\ndef FOO():  # rpn: export\n    pass\n",
            "LBL(\"main\")\ndef main():  # rpn: export\n    pass\n",
        ] {
            let err = labels_for(code).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DuplicateFunction, "{code:?}");
        }
    }

    #[test]
    fn entry_name_is_free_for_a_local_function() {
        let labels = labels_for("LBL(\"main\")\ndef main():\n    pass\n").unwrap();
        assert_eq!(labels.get("main"), Some(&Label::Local('A')));
    }

    #[test]
    fn library_names_are_reserved() {
        let err = labels_for("def clist():\n    pass\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadLabel);
    }
}
