use super::Compiler;
use crate::{
    error::{CompileError, CompileResult, ErrorKind},
    expressions::{Expr, ExprLoc, Identifier, Literal},
    operators::CmpOperator,
    parse::CodeRange,
    primitives::{Builtin, Primitive, Signature},
    scope::{Container, VarOptions},
};

/// Characters one alpha-entry line can carry; longer strings continue on
/// `├"..."` append lines.
const ALPHA_CHUNK: usize = 15;

impl Compiler {
    /// Compiles `expr`, leaving its value in X (or in the alpha register for strings).
    pub(super) fn compile_expr(&mut self, expr: &ExprLoc) -> CompileResult<()> {
        match &expr.expr {
            Expr::Literal(literal) => self.compile_literal(literal),
            Expr::Name(id) => self.compile_name(id)?,
            Expr::BinOp { left, op, right } => {
                let mnemonics = op.mnemonics().ok_or_else(|| {
                    CompileError::unsupported(format!("operator '{op}' is not supported"), expr.position)
                })?;
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                for mnemonic in mnemonics {
                    self.program.emit(*mnemonic);
                }
            }
            Expr::BoolOp { op, values } => {
                let mut values = values.iter();
                if let Some(first) = values.next() {
                    self.compile_expr(first)?;
                }
                for value in values {
                    self.compile_expr(value)?;
                    self.program.emit_xeq("p2Bool", None);
                    self.program.emit(op.mnemonic());
                }
            }
            Expr::Not(operand) => {
                self.compile_expr(operand)?;
                self.program.emit_xeq("pBool", None);
                self.program.emit_xeq("pNot", None);
            }
            Expr::UnaryMinus(operand) => {
                self.compile_expr(operand)?;
                self.program.emit("+/-");
            }
            Expr::Invert(operand) => {
                self.compile_expr(operand)?;
                self.program.emit("NOT");
            }
            Expr::Compare {
                left,
                ops,
                comparators,
            } => self.compile_compare(left, ops, comparators)?,
            Expr::Call { func, args } => self.compile_call(func, args, expr.position)?,
            Expr::AttrCall { object, attr, args } => self.compile_method_call(object, attr, args)?,
            Expr::Subscript { object, index } => self.compile_subscript_load(object, index)?,
            Expr::Slice { .. } => {
                return Err(CompileError::unsupported(
                    "slices can only be used as subscripts",
                    expr.position,
                ));
            }
            Expr::Tuple(_) => {
                return Err(CompileError::unsupported(
                    "tuples can only be used in assignments",
                    expr.position,
                ));
            }
            Expr::List(_) | Expr::Dict(_) => {
                return Err(CompileError::unsupported(
                    "list and dict literals can only be assigned to a variable",
                    expr.position,
                ));
            }
        }
        Ok(())
    }

    fn compile_literal(&mut self, literal: &Literal) {
        match literal {
            Literal::Int(value) if *value < 0 => {
                self.program.emit(value.unsigned_abs().to_string());
                self.program.emit("+/-");
            }
            Literal::Int(value) => self.program.emit(value.to_string()),
            Literal::Float(spelling) => self.program.emit(spelling.as_str()),
            Literal::Str(text) => self.emit_alpha(text),
            Literal::Bool(true) => self.program.emit("1"),
            Literal::Bool(false) | Literal::None => self.program.emit("0"),
        }
    }

    /// Puts `text` in the alpha register.
    pub(super) fn emit_alpha(&mut self, text: &str) {
        let chars: Vec<char> = text.chars().collect();
        let mut chunks = chars.chunks(ALPHA_CHUNK);
        let first: String = chunks.next().unwrap_or_default().iter().collect();
        self.program.emit_string_line(format!("\"{first}\""));
        for chunk in chunks {
            let chunk: String = chunk.iter().collect();
            self.program.emit_string_line(format!("├\"{chunk}\""));
        }
    }

    fn compile_name(&mut self, id: &Identifier) -> CompileResult<()> {
        if self.labels.has(&id.name) {
            return Err(CompileError::unsupported(
                format!("function '{}' can only be called, not used as a value", id.name),
                id.position,
            ));
        }
        let register = self.register_of(&id.name, id.position)?;
        self.program.emit(format!("RCL {register}"));
        if self.scopes.is_range_var(&id.name) {
            // the ISG counter is ccccccc.fffii; the loop value is its integer part
            self.program.emit("IP");
        }
        Ok(())
    }

    /// `a < b < c` compares each adjacent pair and ANDs the results.
    fn compile_compare(
        &mut self,
        left: &ExprLoc,
        ops: &[CmpOperator],
        comparators: &[ExprLoc],
    ) -> CompileResult<()> {
        let mut previous = left;
        for (index, (op, right)) in ops.iter().zip(comparators).enumerate() {
            let routine = op.routine().ok_or_else(|| {
                CompileError::unsupported(format!("'{op}' comparisons are not supported"), right.position)
            })?;
            self.compile_expr(previous)?;
            self.compile_expr(right)?;
            self.program.emit_xeq(routine, None);
            if index > 0 {
                self.program.emit_xeq("p2Bool", None);
                self.program.emit("AND");
            }
            previous = right;
        }
        Ok(())
    }

    /// User functions shadow builtins, which shadow calculator primitives.
    fn compile_call(&mut self, func: &Identifier, args: &[ExprLoc], position: CodeRange) -> CompileResult<()> {
        if let Some(label) = self.labels.get(&func.name).cloned() {
            for arg in args {
                self.compile_expr(arg)?;
            }
            self.program.emit(format!("XEQ {label}"));
            return Ok(());
        }
        if let Ok(builtin) = func.name.parse::<Builtin>() {
            return self.compile_builtin(builtin, args, position);
        }
        if let Ok(primitive) = func.name.parse::<Primitive>() {
            return self.compile_primitive(primitive, args, position);
        }
        Err(CompileError::new(
            ErrorKind::UnboundIdentifier,
            format!("function '{}' is not defined", func.name),
            func.position,
        ))
    }

    fn compile_builtin(&mut self, builtin: Builtin, args: &[ExprLoc], position: CodeRange) -> CompileResult<()> {
        match (builtin, args) {
            (Builtin::Len, [arg]) => {
                let Expr::Name(id) = &arg.expr else {
                    return Err(mismatch("len() needs a list, dict or matrix variable", arg.position));
                };
                let (register, kind) = self.container_register(id)?;
                match kind {
                    Container::List | Container::Dict => {
                        self.bind_zlist(register.name().unwrap_or_default());
                        self.program.emit_xeq("pLen", None);
                    }
                    Container::Matrix => {
                        self.program.emit(format!("RCL {register}"));
                        self.program.emit("DIM?");
                        self.program.emit("RDN");
                    }
                }
            }
            (
                Builtin::Print,
                [ExprLoc {
                    expr: Expr::Literal(Literal::Str(text)),
                    ..
                }],
            ) => {
                self.emit_alpha(text);
                self.program.emit("AVIEW");
            }
            (Builtin::Print, [arg]) => {
                self.compile_expr(arg)?;
                self.program.emit("VIEW ST X");
            }
            (Builtin::Int, [arg]) => {
                self.compile_expr(arg)?;
                self.program.emit("IP");
            }
            (Builtin::Abs, [arg]) => {
                self.compile_expr(arg)?;
                self.program.emit("ABS");
            }
            (Builtin::FlagSet, [arg]) => {
                self.compile_expr(arg)?;
                self.program.emit_xeq("pFS", None);
            }
            (Builtin::FlagClear, [arg]) => {
                self.compile_expr(arg)?;
                self.program.emit_xeq("pFC", None);
            }
            (Builtin::Range, _) => {
                return Err(CompileError::unsupported(
                    "range() can only be used as the iterable of a for loop",
                    position,
                ));
            }
            (Builtin::EntryLabel, _) => {
                return Err(CompileError::new(
                    ErrorKind::BadLabel,
                    "LBL() is only allowed at module level, before any function definition",
                    position,
                ));
            }
            (_, _) => {
                let name: &'static str = builtin.into();
                return Err(mismatch(format!("{name}() takes exactly one argument"), position));
            }
        }
        Ok(())
    }

    fn compile_primitive(&mut self, primitive: Primitive, args: &[ExprLoc], position: CodeRange) -> CompileResult<()> {
        let mnemonic = primitive.mnemonic();
        match primitive.signature() {
            Signature::Stack { arity, reversed } => {
                if args.len() != arity {
                    return Err(mismatch(
                        format!("{mnemonic} takes {arity} argument(s), got {}", args.len()),
                        position,
                    ));
                }
                if reversed {
                    for arg in args.iter().rev() {
                        self.compile_expr(arg)?;
                    }
                } else {
                    for arg in args {
                        self.compile_expr(arg)?;
                    }
                }
                self.program.emit(mnemonic);
            }
            Signature::Digits => match args {
                [arg] if arg.int_literal().is_some_and(|value| (0..=99).contains(&value)) => {
                    let value = arg.int_literal().unwrap_or_default();
                    self.program.emit(format!("{mnemonic} {value:02}"));
                }
                _ => return Err(mismatch(format!("{mnemonic} takes one integer literal from 0 to 99"), position)),
            },
            Signature::Variable => {
                let operand = match args {
                    [ExprLoc {
                        expr: Expr::Literal(Literal::Str(name)),
                        ..
                    }] if !name.is_empty() => format!("\"{name}\""),
                    [ExprLoc {
                        expr: Expr::Name(id), ..
                    }] => {
                        let register = if primitive.binds_variable() {
                            // INPUT prompts with the variable name, so new bindings are named
                            self.store_register(&id.name, &VarOptions::forced(&id.name), id.position)?
                        } else {
                            self.register_of(&id.name, id.position)?
                        };
                        if matches!(primitive, Primitive::Index | Primitive::Clv) && !register.is_named() {
                            return Err(mismatch(
                                format!("{mnemonic} needs a named variable, '{}' is a numbered register", id.name),
                                id.position,
                            ));
                        }
                        register.to_string()
                    }
                    _ => return Err(mismatch(format!("{mnemonic} takes one variable"), position)),
                };
                self.program.emit(format!("{mnemonic} {operand}"));
            }
        }
        Ok(())
    }

    /// Whether `expr` leaves a matrix in X, so its target must be a named variable.
    pub(super) fn produces_matrix(&self, expr: &ExprLoc) -> bool {
        match &expr.expr {
            Expr::Call { func, .. } => {
                !self.labels.has(&func.name) && func.name.parse::<Primitive>().is_ok_and(Primitive::returns_matrix)
            }
            Expr::Subscript { index, .. } => is_slice(index),
            Expr::Name(id) => self.scopes.container(&id.name) == Some(Container::Matrix),
            Expr::BinOp { left, right, .. } => self.produces_matrix(left) || self.produces_matrix(right),
            Expr::UnaryMinus(operand) => self.produces_matrix(operand),
            _ => false,
        }
    }
}

pub(super) fn mismatch(message: impl Into<String>, position: CodeRange) -> CompileError {
    CompileError::new(ErrorKind::PrimitiveMismatch, message.into(), position)
}

/// `a:b` or `a:b, c:d` used as a subscript.
pub(super) fn is_slice(index: &ExprLoc) -> bool {
    match &index.expr {
        Expr::Slice { .. } => true,
        Expr::Tuple(items) => items.iter().any(|item| matches!(item.expr, Expr::Slice { .. })),
        _ => false,
    }
}
