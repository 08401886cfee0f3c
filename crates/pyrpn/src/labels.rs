//! Labels: one per user function, plus the numeric jump labels used by control flow.

use std::fmt;

use ahash::AHashMap;
use tracing::debug;

use crate::{reserved, scope::MAX_NAME_LEN};

/// Single-character local labels available to user functions, in issue order.
pub const LOCAL_LABEL_BANK: &str = "ABCDEFGHIJabcd";

/// Label a function is called through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    /// Alpha label reachable from the keyboard, rendered quoted.
    Global(String),
    /// One of the single-letter local labels.
    Local(char),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global(name) => write!(f, "\"{name}\""),
            Self::Local(letter) => write!(f, "{letter}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LabelError {
    Duplicate(String),
    BankExhausted(String),
    /// Two names truncate or case-fold to the same global label.
    GlobalClash { name: String, label: Label, holder: String },
}

impl fmt::Display for LabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(name) => write!(f, "function '{name}' is defined more than once"),
            Self::BankExhausted(name) => write!(
                f,
                "no local label left for function '{name}': only {} non-exported functions are supported",
                LOCAL_LABEL_BANK.chars().count()
            ),
            Self::GlobalClash { name, label, holder } => {
                write!(f, "function '{name}' would get label {label}, already taken by {holder}")
            }
        }
    }
}

/// Source function name → label, fixed by the lookahead pass.
#[derive(Debug, Default)]
pub(crate) struct FunctionLabels {
    labels: AHashMap<String, Label>,
    /// Global label text → who holds it, for clash detection.
    globals: AHashMap<String, String>,
    next_local: usize,
    entry: Option<Label>,
}

impl FunctionLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Global label `"NAME"`: upper-cased and cut to seven characters.
    pub fn make_global(&mut self, name: &str) -> Result<Label, LabelError> {
        self.ensure_new(name)?;
        let label = global_label(name);
        if let Label::Global(text) = &label {
            if let Some(holder) = self.globals.get(text) {
                return Err(LabelError::GlobalClash {
                    name: name.to_owned(),
                    label,
                    holder: holder.clone(),
                });
            }
            self.globals.insert(text.clone(), format!("'{name}'"));
        }
        debug!(name, %label, "assigned global label");
        self.labels.insert(name.to_owned(), label.clone());
        Ok(label)
    }

    /// Next character from [`LOCAL_LABEL_BANK`].
    pub fn make_local(&mut self, name: &str) -> Result<Label, LabelError> {
        self.ensure_new(name)?;
        let letter = LOCAL_LABEL_BANK
            .chars()
            .nth(self.next_local)
            .ok_or_else(|| LabelError::BankExhausted(name.to_owned()))?;
        self.next_local += 1;
        let label = Label::Local(letter);
        debug!(name, %label, "assigned local label");
        self.labels.insert(name.to_owned(), label.clone());
        Ok(label)
    }

    /// Records the label declared with `LBL("name")` for top-level code.
    pub fn set_entry(&mut self, name: &str) -> Label {
        let label = global_label(name);
        if let Label::Global(text) = &label {
            self.globals.insert(text.clone(), format!("LBL(\"{name}\")"));
        }
        debug!(name, %label, "declared program entry");
        self.entry = Some(label.clone());
        label
    }

    pub fn entry(&self) -> Option<&Label> {
        self.entry.as_ref()
    }

    /// Whether any global label, the declared entry included, has been handed out.
    pub fn has_global(&self) -> bool {
        self.entry.is_some() || self.labels.values().any(|label| matches!(label, Label::Global(_)))
    }

    pub fn has(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Label> {
        self.labels.get(name)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    fn ensure_new(&self, name: &str) -> Result<(), LabelError> {
        if self.has(name) {
            Err(LabelError::Duplicate(name.to_owned()))
        } else {
            Ok(())
        }
    }
}

fn global_label(name: &str) -> Label {
    let upper = name.to_uppercase();
    // labels keep their head, unlike variables which keep their tail
    Label::Global(upper.chars().take(MAX_NAME_LEN).collect())
}

/// Which reserved pool ran dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JumpPool {
    BackJump,
    Skip,
}

impl fmt::Display for JumpPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackJump => write!(
                f,
                "too many loops: only {} loop labels are available",
                reserved::BACK_JUMP_LABELS.len()
            ),
            Self::Skip => write!(
                f,
                "control flow nested too deeply: only {} forward labels are available",
                reserved::SKIP_LABELS.len()
            ),
        }
    }
}

/// Numeric labels for jumps inside function bodies.
///
/// The calculator resolves `GTO nn` by searching forward from the jump and
/// wrapping around, taking the first `LBL nn` it meets. A forward skip label can
/// therefore be reused once its `LBL` has been emitted, since any later jump
/// meets the newer `LBL` first. A label jumped to from below can only be found
/// by wrapping, so back-jump labels must be unique in the whole program.
#[derive(Debug)]
pub(crate) struct JumpLabels {
    next_back: u8,
    free_skips: Vec<u8>,
}

impl Default for JumpLabels {
    fn default() -> Self {
        Self {
            next_back: *reserved::BACK_JUMP_LABELS.start(),
            // popped from the end, so lowest first
            free_skips: reserved::SKIP_LABELS.rev().collect(),
        }
    }
}

impl JumpLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// A label never handed out before, for the top of a loop.
    pub fn back_jump(&mut self) -> Result<u8, JumpPool> {
        if !reserved::BACK_JUMP_LABELS.contains(&self.next_back) {
            return Err(JumpPool::BackJump);
        }
        let label = self.next_back;
        self.next_back += 1;
        Ok(label)
    }

    /// A forward label; hand it back with [`Self::release`] after its `LBL` is emitted.
    pub fn skip(&mut self) -> Result<u8, JumpPool> {
        self.free_skips.pop().ok_or(JumpPool::Skip)
    }

    pub fn release(&mut self, label: u8) {
        debug_assert!(reserved::SKIP_LABELS.contains(&label));
        if !self.free_skips.contains(&label) {
            // keep descending so `pop` hands out the lowest free label
            let at = self.free_skips.partition_point(|&free| free > label);
            self.free_skips.insert(at, label);
        }
    }
}
