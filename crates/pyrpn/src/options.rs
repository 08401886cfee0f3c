/// Recommended register count: registers `00` to `99`.
pub const DEFAULT_MAX_REGISTERS: u16 = 100;

/// Switches that control what a compilation emits and how it renders.
///
/// Use `CompileOptions::default()` for a program that includes the support
/// library with its labels rewritten to numeric locals, or tweak individual
/// settings with the builder methods.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Append `// ...` comments (source line for `LBL`, variable name for stores).
    pub emit_comments: bool,
    /// Prefix every rendered line with its zero-padded line number.
    pub emit_linenos: bool,
    /// Append the support-library routines the program references.
    pub emit_support_library: bool,
    /// Rewrite `XEQ "pGT"` style library calls to numeric local labels.
    pub rewrite_support_library_to_local_labels: bool,
    /// Number of numbered registers available on the calculator.
    pub max_registers: u16,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            emit_comments: false,
            emit_linenos: false,
            emit_support_library: true,
            rewrite_support_library_to_local_labels: true,
            max_registers: DEFAULT_MAX_REGISTERS,
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn emit_comments(mut self, enabled: bool) -> Self {
        self.emit_comments = enabled;
        self
    }

    #[must_use]
    pub fn emit_linenos(mut self, enabled: bool) -> Self {
        self.emit_linenos = enabled;
        self
    }

    /// Disabling the library is mostly useful for reading the generated user code.
    #[must_use]
    pub fn emit_support_library(mut self, enabled: bool) -> Self {
        self.emit_support_library = enabled;
        self
    }

    #[must_use]
    pub fn rewrite_support_library_to_local_labels(mut self, enabled: bool) -> Self {
        self.rewrite_support_library_to_local_labels = enabled;
        self
    }

    #[must_use]
    pub fn max_registers(mut self, count: u16) -> Self {
        self.max_registers = count;
        self
    }
}
