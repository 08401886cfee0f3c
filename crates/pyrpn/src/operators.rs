use std::fmt;

/// Binary arithmetic and bitwise operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Operator {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
    FloorDiv,
}

impl Operator {
    /// Instructions that apply the operator to Y and X, or `None` when the
    /// calculator has no equivalent.
    ///
    /// Matrix multiplication is plain `×`, which the calculator applies to
    /// matrices in X and Y.
    pub fn mnemonics(self) -> Option<&'static [&'static str]> {
        match self {
            Self::Add => Some(&["+"]),
            Self::Sub => Some(&["-"]),
            Self::Mult | Self::MatMult => Some(&["×"]),
            Self::Div => Some(&["÷"]),
            Self::Mod => Some(&["MOD"]),
            Self::Pow => Some(&["Y↑X"]),
            Self::FloorDiv => Some(&["÷", "IP"]),
            Self::BitAnd => Some(&["AND"]),
            Self::BitOr => Some(&["OR"]),
            Self::BitXor => Some(&["XOR"]),
            Self::LShift | Self::RShift => None,
        }
    }

    /// Suffix for the `STO+`-style register arithmetic, when one exists.
    pub fn store_suffix(self) -> Option<&'static str> {
        match self {
            Self::Add => Some("+"),
            Self::Sub => Some("-"),
            Self::Mult => Some("×"),
            Self::Div => Some("÷"),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::MatMult => "@",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::FloorDiv => "//",
        })
    }
}

/// `and` / `or`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BoolOperator {
    And,
    Or,
}

impl BoolOperator {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOperator {
    /// Library routine that compares Y against X.
    pub fn routine(self) -> Option<&'static str> {
        match self {
            Self::Eq => Some("pEQ"),
            Self::NotEq => Some("pNEQ"),
            Self::Lt => Some("pLT"),
            Self::LtE => Some("pLTE"),
            Self::Gt => Some("pGT"),
            Self::GtE => Some("pGTE"),
            Self::Is | Self::IsNot | Self::In | Self::NotIn => None,
        }
    }
}

impl fmt::Display for CmpOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        })
    }
}
