use std::{borrow::Cow, fmt};

use strum::{Display, IntoStaticStr};

use crate::parse::{CodeRange, SourceLines};

/// Category of a transpilation failure.
///
/// All of these are fatal: the first one aborts the compilation and no partial
/// program is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ErrorKind {
    /// The source text is not valid Python.
    #[strum(serialize = "syntax error")]
    Parse,
    /// A name was read before any visible binding.
    #[strum(serialize = "unbound identifier")]
    UnboundIdentifier,
    /// Two `def`s share a name anywhere in the unit.
    #[strum(serialize = "duplicate function")]
    DuplicateFunction,
    /// Malformed or misplaced `LBL("...")` entry declaration.
    #[strum(serialize = "bad label")]
    BadLabel,
    /// Python that falls outside the accepted subset.
    #[strum(serialize = "unsupported construct")]
    Unsupported,
    /// Wrong number or kind of arguments to a calculator primitive or method.
    #[strum(serialize = "primitive mismatch")]
    PrimitiveMismatch,
    /// `range()` bound the calculator's ISG counter cannot represent.
    #[strum(serialize = "range out of bounds")]
    RangeOutOfBounds,
    /// More functions need local labels than the bank holds.
    #[strum(serialize = "label bank exhausted")]
    LabelBankExhausted,
    /// Every numbered register has been issued.
    #[strum(serialize = "registers exhausted")]
    RegistersExhausted,
    /// The reserved back-jump or skip label pool ran dry.
    #[strum(serialize = "jump labels exhausted")]
    JumpLabelsExhausted,
}

/// Stage of the pipeline that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Parse,
    Lookahead,
    Compile,
}

/// Where in the Python source an error points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// 1-based line number.
    pub lineno: u32,
    /// Text of that line without its trailing newline.
    pub line_text: String,
}

/// Public error returned by [`crate::transpile`].
///
/// Display renders `"<message> (<phase>), line: <n>\n<line text>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpnError {
    kind: ErrorKind,
    message: String,
    phase: Phase,
    location: Option<SourceLocation>,
}

impl RpnError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>, phase: Phase, location: Option<SourceLocation>) -> Self {
        Self {
            kind,
            message: message.into(),
            phase,
            location,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    /// Shorthand for the reported line number, if any.
    pub fn lineno(&self) -> Option<u32> {
        self.location.as_ref().map(|loc| loc.lineno)
    }
}

impl fmt::Display for RpnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.phase)?;
        if let Some(location) = &self.location {
            write!(f, ", line: {}\n{}", location.lineno, location.line_text)?;
        }
        Ok(())
    }
}

impl std::error::Error for RpnError {}

/// Error raised while walking the AST, before it is tied to the source text.
///
/// Both the lookahead pass and the emitter return this; the driver attaches the
/// phase and the offending line when converting it into an [`RpnError`].
#[derive(Debug, Clone)]
pub(crate) struct CompileError {
    kind: ErrorKind,
    message: Cow<'static, str>,
    position: CodeRange,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self {
            kind,
            message: message.into(),
            position,
        }
    }

    pub fn unsupported(message: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::new(ErrorKind::Unsupported, message, position)
    }

    #[cfg(test)]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Attaches the phase and the source line the error points at.
    pub fn into_rpn_error(self, phase: Phase, source: &SourceLines<'_>) -> RpnError {
        let location = SourceLocation {
            lineno: self.position.line,
            line_text: source.line_text(self.position.line).to_owned(),
        };
        RpnError::new(self.kind, self.message.into_owned(), phase, Some(location))
    }
}

pub(crate) type CompileResult<T> = Result<T, CompileError>;
