//! Names that compile to calculator instructions rather than `XEQ` calls.

use strum::{EnumString, IntoStaticStr};

/// Python-level builtins the emitter handles itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
pub(crate) enum Builtin {
    #[strum(serialize = "len")]
    Len,
    #[strum(serialize = "print")]
    Print,
    #[strum(serialize = "int")]
    Int,
    #[strum(serialize = "abs")]
    Abs,
    #[strum(serialize = "range")]
    Range,
    /// `FS(n)`: 1 when flag `n` is set.
    #[strum(serialize = "FS")]
    FlagSet,
    /// `FC(n)`: 1 when flag `n` is clear.
    #[strum(serialize = "FC")]
    FlagClear,
    /// `LBL("name")`, only meaningful at module level.
    #[strum(serialize = "LBL")]
    EntryLabel,
}

/// How a primitive takes its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signature {
    /// Arguments are pushed onto the stack, then the mnemonic is emitted.
    /// `reversed` primitives expect their arguments in the opposite order.
    Stack { arity: usize, reversed: bool },
    /// One integer literal rendered as a two-digit operand, as in `FIX 04`.
    Digits,
    /// One variable name rendered as the operand, as in `INDEX "M"`.
    Variable,
}

/// Calculator instruction callable by name, e.g. `CLLCD()` or `FIX(4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub(crate) enum Primitive {
    Cllcd,
    Beep,
    Aview,
    Prompt,
    Stop,
    Clst,
    Cla,
    Ran,
    Rclij,
    Rclel,
    Insr,
    Delr,
    Invrt,
    Det,
    Trans,
    Abs,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Ln,
    Log,
    Exp,
    Ip,
    Fp,
    Rnd,
    Sign,
    Stoel,
    Putm,
    Pixel,
    Newmat,
    Complex,
    Mod,
    Stoij,
    Getm,
    Fix,
    Sci,
    Eng,
    Sf,
    Cf,
    Tone,
    Index,
    View,
    Input,
    Clv,
    Arcl,
}

impl Primitive {
    pub fn signature(self) -> Signature {
        match self {
            Self::Cllcd
            | Self::Beep
            | Self::Aview
            | Self::Prompt
            | Self::Stop
            | Self::Clst
            | Self::Cla
            | Self::Ran
            | Self::Rclij
            | Self::Rclel
            | Self::Insr
            | Self::Delr => stack(0),
            Self::Invrt
            | Self::Det
            | Self::Trans
            | Self::Abs
            | Self::Sqrt
            | Self::Sin
            | Self::Cos
            | Self::Tan
            | Self::Asin
            | Self::Acos
            | Self::Atan
            | Self::Ln
            | Self::Log
            | Self::Exp
            | Self::Ip
            | Self::Fp
            | Self::Rnd
            | Self::Sign
            | Self::Stoel
            | Self::Putm => stack(1),
            Self::Newmat | Self::Complex | Self::Mod | Self::Stoij | Self::Getm => stack(2),
            // PIXEL(x, y) wants y in Y and x in X
            Self::Pixel => Signature::Stack {
                arity: 2,
                reversed: true,
            },
            Self::Fix | Self::Sci | Self::Eng | Self::Sf | Self::Cf | Self::Tone => Signature::Digits,
            Self::Index | Self::View | Self::Input | Self::Clv | Self::Arcl => Signature::Variable,
        }
    }

    /// Instruction text without operand.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Exp => "E↑X",
            other => other.into(),
        }
    }

    /// Whether the result left in X is a matrix, which must live in a named variable.
    pub fn returns_matrix(self) -> bool {
        matches!(self, Self::Newmat | Self::Invrt | Self::Trans | Self::Getm)
    }

    /// `INPUT` creates the variable it names, the others require it to exist.
    pub fn binds_variable(self) -> bool {
        matches!(self, Self::Input)
    }
}

fn stack(arity: usize) -> Signature {
    Signature::Stack { arity, reversed: false }
}
