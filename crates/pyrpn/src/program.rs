//! The line buffer every compilation appends to.
//!
//! A [`Program`] is an ordered list of [`Line`]s numbered as they are appended.
//! After the user code has been emitted, [`Program::emit_needed_library`] appends
//! the support routines the code referenced and rewrites their quoted labels to
//! numeric locals.

use std::fmt::Write;

use ahash::AHashSet;
use tracing::debug;

use crate::{library, reserved, scope::Register};

/// Column at which rendered `// comments` start.
const COMMENT_COLUMN: usize = 20;

/// Name and title of the library header routine.
pub const LIBRARY_HEADER_LABEL: &str = "PyLIB";
const LIBRARY_TITLE: &str = "PyRPN Lib";

/// What kind of value an emitted line leaves behind.
///
/// Only strings matter: a store that directly follows a string literal must be
/// an `ASTO`, since the literal went to the alpha register, not the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    #[default]
    Plain,
    String,
}

/// A single RPN instruction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Line {
    text: String,
    lineno: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    kind: LineKind,
}

impl Line {
    /// Mnemonic plus optional operand, e.g. `STO 07`.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 0-based position in the program.
    pub fn lineno(&self) -> usize {
        self.lineno
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn kind(&self) -> LineKind {
        self.kind
    }
}

/// The emitted program plus the set of library routines it calls.
#[derive(Debug, Default, Clone)]
pub struct Program {
    lines: Vec<Line>,
    needed: AHashSet<&'static str>,
}

impl Program {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Iterates over the text of each line.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(Line::text)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Library routines referenced by `XEQ` so far, before closing over prerequisites.
    pub fn needed_library(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.needed.iter().copied()
    }

    pub(crate) fn append(&mut self, text: impl Into<String>, comment: Option<String>, kind: LineKind) {
        let lineno = self.lines.len();
        self.lines.push(Line {
            text: text.into(),
            lineno,
            comment,
            kind,
        });
    }

    /// Appends a plain line without a comment.
    pub(crate) fn emit(&mut self, text: impl Into<String>) {
        self.append(text, None, LineKind::Plain);
    }

    pub(crate) fn emit_commented(&mut self, text: impl Into<String>, comment: impl Into<String>) {
        self.append(text, Some(comment.into()), LineKind::Plain);
    }

    pub(crate) fn emit_string_line(&mut self, text: impl Into<String>) {
        self.append(text, None, LineKind::String);
    }

    /// Appends a block of RPN source, one instruction per line.
    ///
    /// Blank lines and lines that are only a comment are dropped; a trailing
    /// `// comment` is kept as the line's comment. Lines that push to the alpha
    /// register are tagged as strings.
    pub(crate) fn splice_raw(&mut self, block: &str) {
        for raw in block.lines() {
            let (text, comment) = match raw.find("//") {
                Some(idx) => (raw[..idx].trim(), Some(raw[idx + 2..].trim())),
                None => (raw.trim(), None),
            };
            if text.is_empty() {
                continue;
            }
            let kind = if text.starts_with('"') || text.starts_with("├\"") {
                LineKind::String
            } else {
                LineKind::Plain
            };
            let comment = comment.filter(|c| !c.is_empty()).map(str::to_owned);
            self.append(text, comment, kind);
        }
    }

    /// Appends `XEQ "name"`, recording `name` when it is a library routine.
    pub(crate) fn emit_xeq(&mut self, name: &str, comment: Option<String>) {
        if let Some(entry) = library::lookup(name) {
            self.needed.insert(entry.name);
        }
        self.append(format!("XEQ \"{name}\""), comment, LineKind::Plain);
    }

    /// Appends `STO reg`, or `ASTO reg` when the previous line produced a string.
    pub(crate) fn emit_sto(&mut self, register: &Register, comment: Option<String>) {
        let alpha = self.last_is_string();
        self.emit_store(register, comment, alpha);
    }

    /// Appends `ASTO reg` for alpha values, `STO reg` otherwise.
    pub(crate) fn emit_store(&mut self, register: &Register, comment: Option<String>, alpha: bool) {
        let mnemonic = if alpha { "ASTO" } else { "STO" };
        self.append(format!("{mnemonic} {register}"), comment, LineKind::Plain);
    }

    pub(crate) fn last_is_string(&self) -> bool {
        self.last_kind() == Some(LineKind::String)
    }

    pub(crate) fn last_text(&self) -> Option<&str> {
        self.lines.last().map(Line::text)
    }

    fn last_kind(&self) -> Option<LineKind> {
        self.lines.last().map(Line::kind)
    }

    /// Appends every library routine the program needs, prerequisites included.
    ///
    /// Nothing is appended when the program calls no library routine.
    pub(crate) fn emit_needed_library(&mut self, as_local_labels: bool) {
        if self.needed.is_empty() {
            return;
        }
        let entries = library::closure(self.needed.iter().copied());
        debug!(
            routines = entries.len(),
            referenced = self.needed.len(),
            "appending support library"
        );
        self.emit(format!("LBL \"{LIBRARY_HEADER_LABEL}\""));
        self.emit_string_line(format!("\"{LIBRARY_TITLE}\""));
        self.emit("RTN");
        for entry in entries {
            self.splice_raw(entry.body());
        }
        if as_local_labels {
            self.rewrite_labels();
        }
    }

    /// Rewrites `XEQ "name"` / `LBL "name"` for library routines to numeric labels.
    ///
    /// Only exact library names are touched, so running this twice is a no-op.
    pub(crate) fn rewrite_labels(&mut self) {
        let mut rewritten = 0usize;
        for line in &mut self.lines {
            if let Some(replacement) = rewrite_line(&line.text) {
                line.text = replacement;
                rewritten += 1;
            }
        }
        debug!(rewritten, "rewrote library labels to local labels");
    }

    /// Renders the program as newline separated text.
    pub fn render(&self, comments: bool, linenos: bool) -> String {
        let mut out = String::new();
        for (index, line) in self.lines.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            if linenos {
                // writing to a String cannot fail
                let _ = write!(out, "{:02} ", line.lineno);
            }
            match (&line.comment, comments) {
                (Some(comment), true) => {
                    if line.text.chars().count() < COMMENT_COLUMN {
                        let _ = write!(out, "{:<COMMENT_COLUMN$}// {comment}", line.text);
                    } else {
                        let _ = write!(out, "{} // {comment}", line.text);
                    }
                }
                _ => out.push_str(&line.text),
            }
        }
        out
    }
}

fn rewrite_line(text: &str) -> Option<String> {
    let (mnemonic, operand) = text.split_once(' ')?;
    if mnemonic != "XEQ" && mnemonic != "LBL" {
        return None;
    }
    let name = operand.strip_prefix('"')?.strip_suffix('"')?;
    let label = if name == LIBRARY_HEADER_LABEL {
        reserved::LIBRARY_ENTRY_LABEL
    } else {
        library::local_label(name)?
    };
    Some(format!("{mnemonic} {label:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_numbers_follow_insertion_order() {
        let mut program = Program::new();
        program.emit("1");
        program.emit_commented("STO 00", "x");
        program.splice_raw("RDN\n\n// nothing\nRTN // done\n");
        let numbers: Vec<usize> = program.lines().iter().map(Line::lineno).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3]);
        assert_eq!(program.lines()[3].comment(), Some("done"));
        assert_eq!(program.lines()[3].text(), "RTN");
    }

    #[test]
    fn store_after_string_is_asto() {
        let mut program = Program::new();
        program.emit_string_line("\"hi\"");
        program.emit_sto(&Register::Named("S".to_owned()), None);
        program.emit("5");
        program.emit_sto(&Register::Numbered(3), None);
        assert_eq!(program.texts().collect::<Vec<_>>(), ["\"hi\"", "ASTO \"S\"", "5", "STO 03"]);
    }

    #[test]
    fn splice_tags_alpha_lines() {
        let mut program = Program::new();
        program.splice_raw("\"range() limited\"\n├\" to 999\"\nAVIEW");
        let kinds: Vec<LineKind> = program.lines().iter().map(Line::kind).collect();
        assert_eq!(kinds, [LineKind::String, LineKind::String, LineKind::Plain]);
    }

    #[test]
    fn xeq_marks_only_library_routines() {
        let mut program = Program::new();
        program.emit_xeq("pGT", None);
        program.emit_xeq("USER", None);
        assert_eq!(program.needed_library().collect::<Vec<_>>(), ["pGT"]);
    }

    #[test]
    fn rewrite_is_idempotent_and_targeted() {
        let mut program = Program::new();
        program.emit("LBL \"MAIN\"");
        program.emit_xeq("pGT", None);
        program.emit("XEQ \"MAIN\"");
        program.emit("LBL \"PyLIB\"");
        program.emit_string_line("\"pGT\"");
        program.rewrite_labels();
        let once: Vec<String> = program.texts().map(str::to_owned).collect();
        program.rewrite_labels();
        let twice: Vec<String> = program.texts().map(str::to_owned).collect();
        assert_eq!(once, twice);

        let pgt = library::local_label("pGT").unwrap();
        assert_eq!(once[0], "LBL \"MAIN\"");
        assert_eq!(once[1], format!("XEQ {pgt:02}"));
        assert_eq!(once[2], "XEQ \"MAIN\"");
        assert_eq!(once[3], "LBL 50");
        assert_eq!(once[4], "\"pGT\"");
    }

    #[test]
    fn render_plain_matches_texts() {
        let mut program = Program::new();
        program.emit_commented("LBL \"F\"", "def f():");
        program.emit("RTN");
        assert_eq!(program.render(false, false), "LBL \"F\"\nRTN");
        assert_eq!(program.render(false, false), program.render(false, false));
    }

    #[test]
    fn render_with_numbers_and_comments() {
        let mut program = Program::new();
        program.emit_commented("STO 00", "n");
        program.emit("RDN");
        let rendered = program.render(true, true);
        assert_eq!(rendered, "00 STO 00              // n\n01 RDN");
    }

    #[test]
    fn library_is_appended_with_prerequisites() {
        let mut program = Program::new();
        program.emit_xeq("p2Bool", None);
        program.emit_needed_library(false);
        let texts: Vec<&str> = program.texts().collect();
        assert!(texts.contains(&"LBL \"PyLIB\""));
        assert!(texts.contains(&"LBL \"p2Bool\""));
        assert!(texts.contains(&"LBL \"pBool\""));
        assert!(!texts.contains(&"LBL \"pGT\""));
    }

    #[test]
    fn no_library_without_references() {
        let mut program = Program::new();
        program.emit("RTN");
        program.emit_needed_library(true);
        assert_eq!(program.len(), 1);
    }
}
