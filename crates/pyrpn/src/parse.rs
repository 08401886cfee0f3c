//! Conversion from ruff's Python AST into the transpiler's own AST.
//!
//! Everything outside the accepted subset is rejected here, so later passes can
//! match exhaustively on the much smaller [`Node`] and [`Expr`] types.

use std::fmt;

use ruff_python_ast::{
    self as ast, BoolOp, CmpOp, ElifElseClause, Expr as AstExpr, Number, Operator as AstOperator, Stmt, UnaryOp,
};
use ruff_python_parser::parse_module;
use ruff_text_size::{Ranged, TextRange};

use crate::{
    error::{CompileError, CompileResult, ErrorKind},
    expressions::{Expr, ExprLoc, FunctionDef, Identifier, Literal, Node, NodeLoc},
    operators::{BoolOperator, CmpOperator, Operator},
};

/// Parses `code` into statements.
///
/// Imports and bare string statements (docstrings) are dropped.
pub(crate) fn parse(source: &SourceLines<'_>) -> CompileResult<Vec<NodeLoc>> {
    match parse_module(source.code) {
        Ok(parsed) => {
            let module = parsed.into_syntax();
            Parser { source }.parse_statements(module.body.into())
        }
        Err(e) => Err(CompileError::new(
            ErrorKind::Parse,
            e.error.to_string(),
            source.position(e.location.start().into()),
        )),
    }
}

struct Parser<'s, 'c> {
    source: &'s SourceLines<'c>,
}

impl Parser<'_, '_> {
    fn parse_statements(&self, statements: Vec<Stmt>) -> CompileResult<Vec<NodeLoc>> {
        let mut nodes = Vec::with_capacity(statements.len());
        for statement in statements {
            if let Some(node) = self.parse_statement(statement)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// `elif` chains become nested `If` nodes in the `else` branch.
    fn parse_elif_else_clauses(&self, clauses: Vec<ElifElseClause>) -> CompileResult<Vec<NodeLoc>> {
        let mut tail: Vec<NodeLoc> = Vec::new();
        for clause in clauses.into_iter().rev() {
            match clause.test {
                Some(test) => {
                    let test = self.parse_expression(test)?;
                    let body = self.parse_statements(clause.body.into())?;
                    let nested = Node::If {
                        test,
                        body,
                        or_else: tail,
                    };
                    tail = vec![NodeLoc::new(self.convert_range(clause.range), nested)];
                }
                None => tail = self.parse_statements(clause.body.into())?,
            }
        }
        Ok(tail)
    }

    fn parse_statement(&self, statement: Stmt) -> CompileResult<Option<NodeLoc>> {
        let position = self.convert_range(statement.range());
        let node = match statement {
            Stmt::FunctionDef(function) => Node::FunctionDef(self.parse_function_def(function)?),
            Stmt::Return(ast::StmtReturn { value, .. }) => match value {
                Some(value) => Node::Return(Some(self.parse_expression(*value)?)),
                None => Node::Return(None),
            },
            Stmt::Assign(ast::StmtAssign { targets, value, .. }) => Node::Assign {
                targets: targets
                    .into_iter()
                    .map(|target| self.parse_expression(target))
                    .collect::<CompileResult<_>>()?,
                object: self.parse_expression(*value)?,
            },
            Stmt::AnnAssign(ast::StmtAnnAssign { target, value, .. }) => match value {
                Some(value) => Node::Assign {
                    targets: vec![self.parse_expression(*target)?],
                    object: self.parse_expression(*value)?,
                },
                None => Node::Pass,
            },
            Stmt::AugAssign(ast::StmtAugAssign { target, op, value, .. }) => Node::AugAssign {
                target: self.parse_expression(*target)?,
                op: convert_op(op),
                object: self.parse_expression(*value)?,
            },
            Stmt::For(ast::StmtFor {
                is_async,
                target,
                iter,
                body,
                orelse,
                ..
            }) => {
                if is_async {
                    return Err(CompileError::unsupported("async for not supported", position));
                }
                if !orelse.is_empty() {
                    return Err(CompileError::unsupported("else clause on a for loop not supported", position));
                }
                Node::For {
                    target: self.parse_identifier(*target)?,
                    iter: self.parse_expression(*iter)?,
                    body: self.parse_statements(body.into())?,
                }
            }
            Stmt::While(ast::StmtWhile { test, body, orelse, .. }) => {
                if !orelse.is_empty() {
                    return Err(CompileError::unsupported(
                        "else clause on a while loop not supported",
                        position,
                    ));
                }
                Node::While {
                    test: self.parse_expression(*test)?,
                    body: self.parse_statements(body.into())?,
                }
            }
            Stmt::If(ast::StmtIf {
                test,
                body,
                elif_else_clauses,
                ..
            }) => Node::If {
                test: self.parse_expression(*test)?,
                body: self.parse_statements(body.into())?,
                or_else: self.parse_elif_else_clauses(elif_else_clauses)?,
            },
            // the message has no equivalent on the calculator
            Stmt::Assert(ast::StmtAssert { test, .. }) => Node::Assert {
                test: self.parse_expression(*test)?,
            },
            Stmt::Expr(ast::StmtExpr { value, .. }) => {
                if matches!(*value, AstExpr::StringLiteral(_)) {
                    return Ok(None);
                }
                Node::Expr(self.parse_expression(*value)?)
            }
            Stmt::Import(_) | Stmt::ImportFrom(_) => return Ok(None),
            Stmt::Pass(_) => Node::Pass,
            Stmt::Break(_) => Node::Break,
            Stmt::Continue(_) => Node::Continue,
            other => {
                return Err(CompileError::unsupported(
                    format!("{} not supported", describe_statement(&other)),
                    position,
                ));
            }
        };
        Ok(Some(NodeLoc::new(position, node)))
    }

    fn parse_function_def(&self, function: ast::StmtFunctionDef) -> CompileResult<FunctionDef> {
        let position = self.convert_range(function.range);
        if function.is_async {
            return Err(CompileError::unsupported("async functions not supported", position));
        }
        if !function.decorator_list.is_empty() {
            return Err(CompileError::unsupported("decorators not supported", position));
        }
        let parameters = &function.parameters;
        if parameters.vararg.is_some() || parameters.kwarg.is_some() {
            return Err(CompileError::unsupported("*args and **kwargs not supported", position));
        }
        if !parameters.kwonlyargs.is_empty() || !parameters.posonlyargs.is_empty() {
            return Err(CompileError::unsupported(
                "keyword-only and positional-only parameters not supported",
                position,
            ));
        }

        let mut params = Vec::with_capacity(parameters.args.len());
        for param in &parameters.args {
            let name = self.identifier_from_range(param.parameter.name.range);
            if param.default.is_some() {
                return Err(CompileError::unsupported(
                    format!("default value for parameter '{}' not supported", name.name),
                    name.position,
                ));
            }
            params.push(name);
        }

        let name = self.identifier_from_range(function.name.range);
        let signature = self.source.line_text(position.line).trim().to_owned();
        let line_comment = find_line_comment(self.source.line_text(position.line)).map(str::to_owned);
        let body = self.parse_statements(function.body.into())?;
        Ok(FunctionDef {
            name,
            params,
            body,
            signature,
            line_comment,
        })
    }

    fn parse_expression(&self, expression: AstExpr) -> CompileResult<ExprLoc> {
        let position = self.convert_range(expression.range());
        let expr = match expression {
            AstExpr::BoolOp(ast::ExprBoolOp { op, values, .. }) => Expr::BoolOp {
                op: convert_bool_op(op),
                values: self.parse_expressions(values)?,
            },
            AstExpr::BinOp(ast::ExprBinOp { left, op, right, .. }) => Expr::BinOp {
                left: Box::new(self.parse_expression(*left)?),
                op: convert_op(op),
                right: Box::new(self.parse_expression(*right)?),
            },
            AstExpr::UnaryOp(ast::ExprUnaryOp { op, operand, .. }) => {
                let operand = self.parse_expression(*operand)?;
                match op {
                    UnaryOp::Not => Expr::Not(Box::new(operand)),
                    UnaryOp::USub => Expr::UnaryMinus(Box::new(operand)),
                    UnaryOp::Invert => Expr::Invert(Box::new(operand)),
                    UnaryOp::UAdd => return Ok(operand),
                }
            }
            AstExpr::Compare(ast::ExprCompare {
                left, ops, comparators, ..
            }) => Expr::Compare {
                left: Box::new(self.parse_expression(*left)?),
                ops: ops.iter().copied().map(convert_compare_op).collect(),
                comparators: self.parse_expressions(comparators.into_vec())?,
            },
            AstExpr::Call(ast::ExprCall { func, arguments, .. }) => {
                let ast::Arguments { args, keywords, .. } = arguments;
                if !keywords.is_empty() {
                    return Err(CompileError::unsupported("keyword arguments not supported", position));
                }
                let args = self.parse_expressions(args.into_vec())?;
                match *func {
                    AstExpr::Name(ast::ExprName { range, .. }) => Expr::Call {
                        func: self.identifier_from_range(range),
                        args,
                    },
                    AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Expr::AttrCall {
                        object: self.parse_identifier(*value)?,
                        attr: self.identifier_from_range(attr.range),
                        args,
                    },
                    _ => {
                        return Err(CompileError::unsupported(
                            "only named functions and methods can be called",
                            position,
                        ));
                    }
                }
            }
            AstExpr::StringLiteral(ast::ExprStringLiteral { value, .. }) => {
                Expr::Literal(Literal::Str(value.to_str().to_owned()))
            }
            AstExpr::NumberLiteral(ast::ExprNumberLiteral { value, range, .. }) => match value {
                Number::Int(i) => match i.as_i64() {
                    Some(i) => Expr::Literal(Literal::Int(i)),
                    None => {
                        return Err(CompileError::unsupported("integer literal too large", position));
                    }
                },
                Number::Float(_) => Expr::Literal(Literal::Float(float_spelling(&self.source.code[range]))),
                Number::Complex { .. } => {
                    return Err(CompileError::unsupported("complex literals not supported", position));
                }
            },
            AstExpr::BooleanLiteral(ast::ExprBooleanLiteral { value, .. }) => Expr::Literal(Literal::Bool(value)),
            AstExpr::NoneLiteral(_) => Expr::Literal(Literal::None),
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => Expr::Subscript {
                object: self.parse_identifier(*value)?,
                index: Box::new(self.parse_expression(*slice)?),
            },
            AstExpr::Slice(ast::ExprSlice { lower, upper, step, .. }) => {
                if step.is_some() {
                    return Err(CompileError::unsupported("slice steps not supported", position));
                }
                Expr::Slice {
                    lower: self.parse_optional(lower)?,
                    upper: self.parse_optional(upper)?,
                }
            }
            AstExpr::Name(ast::ExprName { range, .. }) => Expr::Name(self.identifier_from_range(range)),
            AstExpr::List(ast::ExprList { elts, .. }) => Expr::List(self.parse_expressions(elts)?),
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) => Expr::Tuple(self.parse_expressions(elts)?),
            AstExpr::Dict(ast::ExprDict { items, .. }) => {
                let mut pairs = Vec::with_capacity(items.len());
                for ast::DictItem { key, value } in items {
                    let Some(key) = key else {
                        return Err(CompileError::unsupported("dict unpacking not supported", position));
                    };
                    pairs.push((self.parse_expression(key)?, self.parse_expression(value)?));
                }
                Expr::Dict(pairs)
            }
            other => {
                return Err(CompileError::unsupported(
                    format!("{} not supported", describe_expression(&other)),
                    position,
                ));
            }
        };
        Ok(ExprLoc::new(position, expr))
    }

    fn parse_expressions(&self, expressions: Vec<AstExpr>) -> CompileResult<Vec<ExprLoc>> {
        expressions.into_iter().map(|e| self.parse_expression(e)).collect()
    }

    fn parse_optional(&self, expression: Option<Box<AstExpr>>) -> CompileResult<Option<Box<ExprLoc>>> {
        match expression {
            Some(e) => Ok(Some(Box::new(self.parse_expression(*e)?))),
            None => Ok(None),
        }
    }

    fn parse_identifier(&self, ast: AstExpr) -> CompileResult<Identifier> {
        match ast {
            AstExpr::Name(ast::ExprName { range, .. }) => Ok(self.identifier_from_range(range)),
            other => Err(CompileError::unsupported(
                "expected a plain variable name",
                self.convert_range(other.range()),
            )),
        }
    }

    fn identifier_from_range(&self, range: TextRange) -> Identifier {
        Identifier::new(&self.source.code[range], self.convert_range(range))
    }

    fn convert_range(&self, range: TextRange) -> CodeRange {
        self.source.position(range.start().into())
    }
}

fn describe_statement(statement: &Stmt) -> &'static str {
    match statement {
        Stmt::ClassDef(_) => "class definitions",
        Stmt::Try(_) => "try statements",
        Stmt::With(_) => "with statements",
        Stmt::Match(_) => "match statements",
        Stmt::Raise(_) => "raise",
        Stmt::Delete(_) => "del",
        Stmt::Global(_) => "global declarations",
        Stmt::Nonlocal(_) => "nonlocal declarations",
        Stmt::TypeAlias(_) => "type aliases",
        _ => "this statement",
    }
}

fn describe_expression(expression: &AstExpr) -> &'static str {
    match expression {
        AstExpr::Lambda(_) => "lambda",
        AstExpr::ListComp(_) | AstExpr::SetComp(_) | AstExpr::DictComp(_) => "comprehensions",
        AstExpr::Generator(_) | AstExpr::Yield(_) | AstExpr::YieldFrom(_) => "generators",
        AstExpr::Await(_) => "await",
        AstExpr::FString(_) => "f-strings",
        AstExpr::Set(_) => "sets",
        AstExpr::Named(_) => "assignment expressions",
        AstExpr::If(_) => "conditional expressions",
        AstExpr::Starred(_) => "starred expressions",
        AstExpr::BytesLiteral(_) => "bytes literals",
        AstExpr::Attribute(_) => "attribute access outside method calls",
        _ => "this expression",
    }
}

/// Calculator spelling of a float literal: no digit separators, upper-case exponent.
fn float_spelling(source: &str) -> String {
    let spelled: String = source
        .chars()
        .filter(|c| *c != '_')
        .map(|c| if c == 'e' { 'E' } else { c })
        .collect();
    if spelled.starts_with('.') {
        format!("0{spelled}")
    } else {
        spelled
    }
}

/// Text after a `#` that is not inside a string literal.
fn find_line_comment(line: &str) -> Option<&str> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(open), c) if c == open => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, '#') => return Some(line[index + 1..].trim()),
            _ => {}
        }
    }
    None
}

fn convert_op(op: AstOperator) -> Operator {
    match op {
        AstOperator::Add => Operator::Add,
        AstOperator::Sub => Operator::Sub,
        AstOperator::Mult => Operator::Mult,
        AstOperator::MatMult => Operator::MatMult,
        AstOperator::Div => Operator::Div,
        AstOperator::Mod => Operator::Mod,
        AstOperator::Pow => Operator::Pow,
        AstOperator::LShift => Operator::LShift,
        AstOperator::RShift => Operator::RShift,
        AstOperator::BitOr => Operator::BitOr,
        AstOperator::BitXor => Operator::BitXor,
        AstOperator::BitAnd => Operator::BitAnd,
        AstOperator::FloorDiv => Operator::FloorDiv,
    }
}

fn convert_bool_op(op: BoolOp) -> BoolOperator {
    match op {
        BoolOp::And => BoolOperator::And,
        BoolOp::Or => BoolOperator::Or,
    }
}

fn convert_compare_op(op: CmpOp) -> CmpOperator {
    match op {
        CmpOp::Eq => CmpOperator::Eq,
        CmpOp::NotEq => CmpOperator::NotEq,
        CmpOp::Lt => CmpOperator::Lt,
        CmpOp::LtE => CmpOperator::LtE,
        CmpOp::Gt => CmpOperator::Gt,
        CmpOp::GtE => CmpOperator::GtE,
        CmpOp::Is => CmpOperator::Is,
        CmpOp::IsNot => CmpOperator::IsNot,
        CmpOp::In => CmpOperator::In,
        CmpOp::NotIn => CmpOperator::NotIn,
    }
}

/// Start of a node in the source, 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CodeRange {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for CodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Line index over the source text.
#[derive(Debug)]
pub(crate) struct SourceLines<'c> {
    code: &'c str,
    /// Byte offset at which each line starts.
    line_starts: Vec<usize>,
}

impl<'c> SourceLines<'c> {
    pub fn new(code: &'c str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(code.match_indices('\n').map(|(index, _)| index + 1));
        Self { code, line_starts }
    }

    /// Line and column of a byte offset.
    pub fn position(&self, offset: usize) -> CodeRange {
        let line_index = self.line_starts.partition_point(|start| *start <= offset).max(1) - 1;
        CodeRange {
            line: (line_index + 1) as u32,
            column: (offset - self.line_starts[line_index] + 1) as u32,
        }
    }

    /// Text of a 1-based line without its line ending; empty when out of range.
    pub fn line_text(&self, line: u32) -> &'c str {
        let Some(index) = (line as usize).checked_sub(1) else {
            return "";
        };
        let Some(&start) = self.line_starts.get(index) else {
            return "";
        };
        let end = self.line_starts.get(index + 1).map_or(self.code.len(), |next| next - 1);
        self.code[start..end].trim_end_matches('\r')
    }
}
