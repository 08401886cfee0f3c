use tracing::trace;

use super::{Compiler, LoopInfo, jump_error, scope_error};
use crate::{
    error::{CompileError, CompileResult, ErrorKind},
    expressions::{Expr, ExprLoc, Identifier, Node, NodeLoc},
    operators::Operator,
    parse::CodeRange,
    scope::{Container, Register, VarOptions},
};

/// Values the calculator stack can hold at once, and so the widest tuple
/// assignment.
const STACK_DEPTH: usize = 4;

/// Largest literal `range()` stop the `ISG` counter format can express.
const MAX_RANGE_STOP: i64 = 999;

impl Compiler {
    pub(super) fn compile_stmt(&mut self, node: &NodeLoc) -> CompileResult<()> {
        trace!(line = node.position.line, "statement");
        match &node.node {
            Node::Pass => {}
            Node::Expr(expr) => self.compile_expr(expr)?,
            Node::Return(value) => {
                if let Some(value) = value {
                    self.compile_expr(value)?;
                }
                self.program.emit("RTN");
            }
            Node::Assign { targets, object } => self.compile_assign(targets, object)?,
            Node::AugAssign { target, op, object } => self.compile_aug_assign(target, *op, object)?,
            Node::If { test, body, or_else } => self.compile_if(test, body, or_else)?,
            Node::While { test, body } => self.compile_while(test, body, node.position)?,
            Node::For { target, iter, body } => self.compile_for(target, iter, body, node.position)?,
            Node::Break => self.compile_break(node.position)?,
            Node::Continue => self.compile_continue(node.position)?,
            Node::Assert { test } => {
                self.compile_expr(test)?;
                self.program.emit_xeq("pAssert", None);
            }
            Node::FunctionDef(def) => {
                return Err(CompileError::unsupported(
                    "functions cannot be defined inside if, while or for blocks",
                    def.name.position,
                ));
            }
        }
        Ok(())
    }

    fn compile_assign(&mut self, targets: &[ExprLoc], object: &ExprLoc) -> CompileResult<()> {
        match &object.expr {
            Expr::List(items) => {
                let target = single_name(targets, "list literals")?;
                return self.compile_list_literal(target, items);
            }
            Expr::Dict(pairs) => {
                let target = single_name(targets, "dict literals")?;
                return self.compile_dict_literal(target, pairs);
            }
            Expr::Name(source)
                if matches!(self.scopes.container(&source.name), Some(Container::List | Container::Dict)) =>
            {
                // lists and dicts are shared, not copied
                let target = single_name(targets, "list and dict aliases")?;
                return self
                    .scopes
                    .bind_alias(&target.name, &source.name)
                    .map_err(|err| scope_error(err, source.position));
            }
            _ => {}
        }

        if let [ExprLoc {
            expr: Expr::Tuple(names),
            position,
        }] = targets
        {
            return self.compile_unpack(names, object, *position);
        }

        let opts = if self.produces_matrix(object) {
            VarOptions::matrix()
        } else {
            VarOptions::default()
        };
        self.compile_expr(object)?;
        let alpha = self.program.last_is_string();
        for target in targets {
            match &target.expr {
                Expr::Name(id) => {
                    let register = self.store_register(&id.name, &opts, id.position)?;
                    self.program.emit_store(&register, Some(id.name.clone()), alpha);
                }
                Expr::Subscript { object, index } => self.compile_subscript_store(object, index)?,
                _ => {
                    return Err(CompileError::unsupported(
                        "can only assign to names and subscripts",
                        target.position,
                    ));
                }
            }
        }
        Ok(())
    }

    /// `a, b = x, y`: push every value, then store from the top of the stack down.
    fn compile_unpack(&mut self, names: &[ExprLoc], object: &ExprLoc, position: CodeRange) -> CompileResult<()> {
        let Expr::Tuple(values) = &object.expr else {
            return Err(CompileError::unsupported(
                "tuple assignment needs a tuple of values on the right",
                object.position,
            ));
        };
        if values.len() != names.len() {
            return Err(CompileError::unsupported(
                format!("cannot assign {} values to {} names", values.len(), names.len()),
                position,
            ));
        }
        if values.len() > STACK_DEPTH {
            return Err(CompileError::unsupported(
                format!("tuple assignment is limited to {STACK_DEPTH} values"),
                position,
            ));
        }

        for value in values {
            self.compile_expr(value)?;
            // strings go to the alpha register, which has a single slot
            if self.program.last_is_string() {
                return Err(CompileError::unsupported(
                    "strings cannot be used in tuple assignment",
                    value.position,
                ));
            }
        }
        let mut registers = Vec::with_capacity(names.len());
        for name in names {
            let Expr::Name(id) = &name.expr else {
                return Err(CompileError::unsupported(
                    "tuple assignment targets must be plain names",
                    name.position,
                ));
            };
            registers.push((id, self.store_register(&id.name, &VarOptions::default(), id.position)?));
        }
        for (id, register) in registers.iter().rev() {
            self.program.emit_store(register, Some(id.name.clone()), false);
            self.program.emit("RDN");
        }
        Ok(())
    }

    fn compile_aug_assign(&mut self, target: &ExprLoc, op: Operator, object: &ExprLoc) -> CompileResult<()> {
        let Expr::Name(id) = &target.expr else {
            return Err(CompileError::unsupported(
                "augmented assignment to list, dict or matrix elements is not supported",
                target.position,
            ));
        };
        let register = self.register_of(&id.name, id.position)?;

        if let Some(suffix) = op.store_suffix() {
            self.compile_expr(object)?;
            self.program
                .emit_commented(format!("STO{suffix} {register}"), format!("{} {op}=", id.name));
            return Ok(());
        }

        let mnemonics = op
            .mnemonics()
            .ok_or_else(|| CompileError::unsupported(format!("operator '{op}' is not supported"), target.position))?;
        self.program.emit(format!("RCL {register}"));
        self.compile_expr(object)?;
        for mnemonic in mnemonics {
            self.program.emit(*mnemonic);
        }
        self.program.emit_store(&register, Some(id.name.clone()), false);
        Ok(())
    }

    fn compile_if(&mut self, test: &ExprLoc, body: &[NodeLoc], or_else: &[NodeLoc]) -> CompileResult<()> {
        self.compile_expr(test)?;
        let then_label = self.skip_label(test.position)?;
        let else_label = self.skip_label(test.position)?;
        self.program.emit("X≠0?");
        self.emit_gto(then_label);
        self.emit_gto(else_label);
        self.place_skip(then_label);
        self.compile_block(body)?;

        if or_else.is_empty() {
            self.place_skip(else_label);
        } else {
            let end_label = self.skip_label(test.position)?;
            self.emit_gto(end_label);
            self.place_skip(else_label);
            self.compile_block(or_else)?;
            self.place_skip(end_label);
        }
        Ok(())
    }

    fn compile_while(&mut self, test: &ExprLoc, body: &[NodeLoc], position: CodeRange) -> CompileResult<()> {
        let entry = self.back_label(position)?;
        self.emit_label(entry);

        let exit_label = if test.is_constant_true() {
            None
        } else {
            self.compile_expr(test)?;
            let exit = self.skip_label(test.position)?;
            self.program.emit("X=0?");
            self.emit_gto(exit);
            Some(exit)
        };

        let info = self.compile_loop_body(
            LoopInfo {
                entry,
                continue_to_entry: true,
                continue_label: None,
                exit_label,
            },
            body,
        )?;
        self.emit_gto(entry);
        if let Some(exit) = info.exit_label {
            self.place_skip(exit);
        }
        Ok(())
    }

    fn compile_for(
        &mut self,
        target: &Identifier,
        iter: &ExprLoc,
        body: &[NodeLoc],
        position: CodeRange,
    ) -> CompileResult<()> {
        match &iter.expr {
            Expr::Call { func, args } if func.name == "range" && !self.labels.has("range") => {
                self.compile_for_range(target, args, body, iter.position)
            }
            Expr::Name(container) => self.compile_for_elements(target, container, body, position),
            _ => Err(CompileError::unsupported(
                "for loops can only iterate over range() or a list or dict variable",
                iter.position,
            )),
        }
    }

    /// `for i in range(...)`: an `ISG` counter built by `pISG` drives the loop,
    /// and reads of `i` take its integer part.
    fn compile_for_range(
        &mut self,
        target: &Identifier,
        args: &[ExprLoc],
        body: &[NodeLoc],
        position: CodeRange,
    ) -> CompileResult<()> {
        let (start, stop, step) = match args {
            [stop] => (None, stop, None),
            [start, stop] => (Some(start), stop, None),
            [start, stop, step] => (Some(start), stop, Some(step)),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::PrimitiveMismatch,
                    format!("range() takes 1 to 3 arguments, got {}", args.len()),
                    position,
                ));
            }
        };
        if let Some(value) = stop.int_literal()
            && value > MAX_RANGE_STOP
        {
            return Err(CompileError::new(
                ErrorKind::RangeOutOfBounds,
                format!("range() stop {value} exceeds {MAX_RANGE_STOP}"),
                stop.position,
            ));
        }
        if let Some(value) = step.and_then(ExprLoc::int_literal)
            && value <= 0
        {
            return Err(CompileError::new(
                ErrorKind::RangeOutOfBounds,
                "range() step must be positive",
                position,
            ));
        }

        match start {
            Some(start) => self.compile_expr(start)?,
            None => self.program.emit("0"),
        }
        self.compile_expr(stop)?;
        match step {
            Some(step) => self.compile_expr(step)?,
            None => self.program.emit("1"),
        }
        self.program.emit_xeq("pISG", None);
        let counter = self.store_register(&target.name, &VarOptions::range_index(), target.position)?;
        self.program.emit_store(&counter, Some(target.name.clone()), false);

        let entry = self.back_label(position)?;
        self.emit_label(entry);
        let info = self.compile_loop_body(
            LoopInfo {
                entry,
                continue_to_entry: false,
                continue_label: None,
                exit_label: None,
            },
            body,
        )?;
        self.close_counted_loop(&counter, info);
        Ok(())
    }

    /// `for x in items`: a hidden counter walks the rows of the list or dict,
    /// loading column 1 of each row into `x`.
    fn compile_for_elements(
        &mut self,
        target: &Identifier,
        container: &Identifier,
        body: &[NodeLoc],
        position: CodeRange,
    ) -> CompileResult<()> {
        if !matches!(
            self.scopes.container(&container.name),
            Some(Container::List | Container::Dict)
        ) {
            return Err(CompileError::unsupported(
                format!("'{}' is not a list or dict", container.name),
                container.position,
            ));
        }
        let source = self.register_of(&container.name, container.position)?;
        let name = source.name().unwrap_or_default().to_owned();
        let counter = self
            .scopes
            .anonymous()
            .map_err(|err| scope_error(err, position))?;
        let exit = self.skip_label(position)?;

        self.program.emit("0");
        self.bind_zlist(&name);
        self.program.emit_xeq("pLen", None);
        self.program.emit("X=0?");
        self.emit_gto(exit);
        self.program.emit("1");
        self.program.emit_xeq("pISG", None);
        self.program.emit_store(
            &counter,
            Some(format!("for {} in {}", target.name, container.name)),
            false,
        );

        let entry = self.back_label(position)?;
        self.emit_label(entry);
        self.program.emit(format!("INDEX {source}"));
        self.program.emit(format!("RCL {counter}"));
        self.program.emit("IP");
        self.program.emit("0");
        self.program.emit_xeq("pMxIJ", None);
        self.program.emit("RCLEL");
        let element = self.store_register(&target.name, &VarOptions::element_of(&container.name), target.position)?;
        self.program.emit_store(&element, Some(target.name.clone()), false);

        let info = self.compile_loop_body(
            LoopInfo {
                entry,
                continue_to_entry: false,
                continue_label: None,
                exit_label: Some(exit),
            },
            body,
        )?;
        self.close_counted_loop(&counter, info);
        Ok(())
    }

    fn compile_loop_body(&mut self, info: LoopInfo, body: &[NodeLoc]) -> CompileResult<LoopInfo> {
        self.loop_stack.push(info);
        self.compile_block(body)?;
        Ok(self.loop_stack.pop().unwrap_or(info))
    }

    /// Tail shared by `range` and element loops: continue target, `ISG`, exit.
    fn close_counted_loop(&mut self, counter: &Register, info: LoopInfo) {
        if let Some(label) = info.continue_label {
            self.place_skip(label);
        }
        self.program.emit(format!("ISG {counter}"));
        self.emit_gto(info.entry);
        if let Some(exit) = info.exit_label {
            self.place_skip(exit);
        }
    }

    fn compile_break(&mut self, position: CodeRange) -> CompileResult<()> {
        let Some(info) = self.loop_stack.last_mut() else {
            return Err(CompileError::unsupported("'break' outside loop", position));
        };
        let exit = match info.exit_label {
            Some(label) => label,
            None => {
                let label = self.jumps.skip().map_err(|pool| jump_error(pool, position))?;
                info.exit_label = Some(label);
                label
            }
        };
        self.emit_gto(exit);
        Ok(())
    }

    fn compile_continue(&mut self, position: CodeRange) -> CompileResult<()> {
        let Some(info) = self.loop_stack.last_mut() else {
            return Err(CompileError::unsupported("'continue' not properly in loop", position));
        };
        let target = if info.continue_to_entry {
            info.entry
        } else if let Some(label) = info.continue_label {
            label
        } else {
            let label = self.jumps.skip().map_err(|pool| jump_error(pool, position))?;
            info.continue_label = Some(label);
            label
        };
        self.emit_gto(target);
        Ok(())
    }
}

fn single_name<'a>(targets: &'a [ExprLoc], what: &str) -> CompileResult<&'a Identifier> {
    match targets {
        [ExprLoc {
            expr: Expr::Name(id), ..
        }] => Ok(id),
        [first, ..] => Err(CompileError::unsupported(
            format!("{what} can only be assigned to a single name"),
            first.position,
        )),
        [] => Err(CompileError::unsupported(
            format!("{what} need a target"),
            CodeRange::default(),
        )),
    }
}
