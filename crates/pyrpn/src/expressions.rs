use crate::{
    operators::{BoolOperator, CmpOperator, Operator},
    parse::CodeRange,
};

#[derive(Debug, Clone)]
pub(crate) struct Identifier {
    pub position: CodeRange,
    pub name: String,
}

impl Identifier {
    pub fn new(name: impl Into<String>, position: CodeRange) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Int(i64),
    /// Float in its source spelling, so `1e3` stays `1E3` rather than `1000`.
    Float(String),
    Str(String),
    Bool(bool),
    None,
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Literal(Literal),
    Name(Identifier),
    BinOp {
        left: Box<ExprLoc>,
        op: Operator,
        right: Box<ExprLoc>,
    },
    BoolOp {
        op: BoolOperator,
        values: Vec<ExprLoc>,
    },
    Not(Box<ExprLoc>),
    UnaryMinus(Box<ExprLoc>),
    Invert(Box<ExprLoc>),
    Compare {
        left: Box<ExprLoc>,
        ops: Vec<CmpOperator>,
        comparators: Vec<ExprLoc>,
    },
    Call {
        func: Identifier,
        args: Vec<ExprLoc>,
    },
    /// `object.attr(args)`; only names are accepted as the object.
    AttrCall {
        object: Identifier,
        attr: Identifier,
        args: Vec<ExprLoc>,
    },
    Subscript {
        object: Identifier,
        index: Box<ExprLoc>,
    },
    Slice {
        lower: Option<Box<ExprLoc>>,
        upper: Option<Box<ExprLoc>>,
    },
    Tuple(Vec<ExprLoc>),
    List(Vec<ExprLoc>),
    Dict(Vec<(ExprLoc, ExprLoc)>),
}

#[derive(Debug, Clone)]
pub(crate) struct ExprLoc {
    pub position: CodeRange,
    pub expr: Expr,
}

impl ExprLoc {
    pub fn new(position: CodeRange, expr: Expr) -> Self {
        Self { position, expr }
    }

    /// Name of the called function for `name(...)` calls.
    pub fn call_name(&self) -> Option<&str> {
        match &self.expr {
            Expr::Call { func, .. } => Some(&func.name),
            _ => None,
        }
    }

    /// `while True:` style conditions.
    pub fn is_constant_true(&self) -> bool {
        match &self.expr {
            Expr::Literal(Literal::Bool(value)) => *value,
            Expr::Literal(Literal::Int(value)) => *value != 0,
            _ => false,
        }
    }

    /// Integer value of a literal, looking through a leading minus sign.
    pub fn int_literal(&self) -> Option<i64> {
        match &self.expr {
            Expr::Literal(Literal::Int(value)) => Some(*value),
            Expr::Literal(Literal::Bool(value)) => Some(i64::from(*value)),
            Expr::UnaryMinus(operand) => operand.int_literal().map(|value| -value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FunctionDef {
    pub name: Identifier,
    pub params: Vec<Identifier>,
    pub body: Vec<NodeLoc>,
    /// Source text of the `def` line, used as the label comment.
    pub signature: String,
    /// Comment found on the `def` line, without the leading `#`.
    pub line_comment: Option<String>,
}

impl FunctionDef {
    /// `# rpn: export` on the `def` line requests a global label.
    pub fn is_exported(&self) -> bool {
        self.line_comment
            .as_deref()
            .is_some_and(|comment| comment.contains("rpn:") && comment.contains("export"))
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Pass,
    Expr(ExprLoc),
    Return(Option<ExprLoc>),
    /// `a = b = value`, `a, b = x, y`, `m[i] = value`.
    Assign {
        targets: Vec<ExprLoc>,
        object: ExprLoc,
    },
    AugAssign {
        target: ExprLoc,
        op: Operator,
        object: ExprLoc,
    },
    If {
        test: ExprLoc,
        body: Vec<NodeLoc>,
        or_else: Vec<NodeLoc>,
    },
    While {
        test: ExprLoc,
        body: Vec<NodeLoc>,
    },
    For {
        target: Identifier,
        iter: ExprLoc,
        body: Vec<NodeLoc>,
    },
    Break,
    Continue,
    Assert {
        test: ExprLoc,
    },
    FunctionDef(FunctionDef),
}

#[derive(Debug, Clone)]
pub(crate) struct NodeLoc {
    pub position: CodeRange,
    pub node: Node,
}

impl NodeLoc {
    pub fn new(position: CodeRange, node: Node) -> Self {
        Self { position, node }
    }

    /// `LBL("name")` at statement level.
    pub fn entry_declaration(&self) -> Option<&ExprLoc> {
        match &self.node {
            Node::Expr(expr) if expr.call_name() == Some("LBL") => Some(expr),
            _ => None,
        }
    }
}
