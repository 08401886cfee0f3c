#![doc = include_str!("../../../README.md")]

mod codegen;
mod error;
mod expressions;
mod labels;
mod library;
mod lookahead;
mod operators;
mod options;
mod parse;
mod primitives;
mod program;
mod reserved;
mod scope;

use tracing::debug;

pub use crate::{
    error::{ErrorKind, Phase, RpnError, SourceLocation},
    labels::LOCAL_LABEL_BANK,
    library::{LibraryEntry, library_entries},
    options::{CompileOptions, DEFAULT_MAX_REGISTERS},
    program::{LIBRARY_HEADER_LABEL, Line, LineKind, Program},
    reserved::named_registers,
    scope::{MAX_NAME_LEN, Register},
};
use crate::{codegen::Compiler, parse::SourceLines};

/// Transpiles Python source into an HP-42S program.
///
/// Runs the three passes in order: parse, label lookahead, then code emission.
/// When [`CompileOptions::emit_support_library`] is set the library routines the
/// program calls are appended after the user code.
///
/// # Errors
/// Returns the first [`RpnError`] raised by any pass; no partial program is
/// produced.
pub fn transpile(code: &str, options: &CompileOptions) -> Result<Program, RpnError> {
    let source = SourceLines::new(code);
    let nodes = parse::parse(&source).map_err(|err| err.into_rpn_error(Phase::Parse, &source))?;
    let labels = lookahead::assign_labels(&nodes).map_err(|err| err.into_rpn_error(Phase::Lookahead, &source))?;
    let mut program =
        Compiler::compile_module(&nodes, labels, options).map_err(|err| err.into_rpn_error(Phase::Compile, &source))?;
    if options.emit_support_library {
        program.emit_needed_library(options.rewrite_support_library_to_local_labels);
    }
    debug!(lines = program.len(), "transpiled");
    Ok(program)
}

/// [`transpile`], rendered as text with the comment and line-number settings
/// from `options`.
///
/// # Errors
/// See [`transpile`].
pub fn transpile_to_string(code: &str, options: &CompileOptions) -> Result<String, RpnError> {
    transpile(code, options).map(|program| program.render(options.emit_comments, options.emit_linenos))
}
