//! RPN emitter: walks the AST and appends instructions to a [`Program`].
//!
//! Values travel on the calculator's four-level stack. Every expression leaves
//! its result in X, so a binary operation is its left operand, its right
//! operand, then the operator. Function arguments are pushed in source order
//! and picked up by the callee with `STO; RDN` in reverse.
//!
//! Control flow uses numeric labels from [`JumpLabels`]; see there for why loop
//! heads and forward skips come from separate pools.

mod containers;
mod expr;
mod stmt;

use tracing::debug;

use crate::{
    error::{CompileError, CompileResult, ErrorKind},
    expressions::{FunctionDef, Node, NodeLoc},
    labels::{FunctionLabels, JumpLabels, JumpPool},
    options::CompileOptions,
    parse::CodeRange,
    program::Program,
    scope::{Register, ScopeError, Scopes, VarOptions},
};

/// Emitter state for one compilation.
pub(crate) struct Compiler {
    program: Program,
    scopes: Scopes,
    labels: FunctionLabels,
    jumps: JumpLabels,
    /// Enclosing loops of the function being compiled, innermost last.
    loop_stack: Vec<LoopInfo>,
}

/// Labels a `break` or `continue` inside a loop jumps to.
#[derive(Debug, Clone, Copy)]
struct LoopInfo {
    /// Back-jump label at the top of the loop.
    entry: u8,
    /// `continue` in a `while` loop re-tests the condition at `entry`; counted
    /// loops must reach their `ISG` first, through `continue_label`.
    continue_to_entry: bool,
    continue_label: Option<u8>,
    /// Forward label after the loop, allocated on first `break`.
    exit_label: Option<u8>,
}

impl Compiler {
    fn new(labels: FunctionLabels, options: &CompileOptions) -> Self {
        Self {
            program: Program::new(),
            scopes: Scopes::new(options.max_registers),
            labels,
            jumps: JumpLabels::new(),
            loop_stack: Vec::new(),
        }
    }

    /// Compiles a module whose functions were labelled by the lookahead pass.
    ///
    /// Code outside functions is only allowed after an `LBL("name")` declaration;
    /// it is emitted first, under that label, followed by every function.
    pub fn compile_module(
        nodes: &[NodeLoc],
        labels: FunctionLabels,
        options: &CompileOptions,
    ) -> CompileResult<Program> {
        let mut compiler = Self::new(labels, options);

        let mut functions = Vec::new();
        let mut entry_code = Vec::new();
        for node in nodes {
            match &node.node {
                Node::FunctionDef(def) => functions.push(def),
                Node::Pass => {}
                _ if node.entry_declaration().is_some() => {}
                _ => entry_code.push(node),
            }
        }

        if let Some(entry) = compiler.labels.entry().cloned() {
            compiler.program.emit_commented(format!("LBL {entry}"), "program entry");
            for node in entry_code {
                compiler.compile_stmt(node)?;
            }
            compiler.finish_body();
        } else if let Some(first) = entry_code.first() {
            return Err(CompileError::unsupported(
                "code outside functions needs an LBL(\"name\") declaration first",
                first.position,
            ));
        }

        for def in functions {
            compiler.compile_function_def(def)?;
        }
        Ok(compiler.program)
    }

    /// Emits a function and then the functions nested directly inside it.
    ///
    /// Nested functions follow the enclosing function's `RTN` and are compiled
    /// while its scope is still pushed, so they can see its variables.
    fn compile_function_def(&mut self, def: &FunctionDef) -> CompileResult<()> {
        let label = self.labels.get(&def.name.name).cloned().ok_or_else(|| {
            CompileError::unsupported(
                format!("function '{}' must be defined at module level or directly inside a function", def.name.name),
                def.name.position,
            )
        })?;
        debug!(function = %def.name.name, %label, "compiling function");

        // a loop in the caller's body is not a loop inside this function
        let outer_loops = std::mem::take(&mut self.loop_stack);
        self.scopes.push();

        self.program.emit_commented(format!("LBL {label}"), def.signature.clone());

        let mut registers = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let register = self
                .scopes
                .var_to_reg(&param.name, &VarOptions::default())
                .map_err(|err| scope_error(err, param.position))?;
            registers.push(register);
        }
        for (param, register) in def.params.iter().zip(&registers).rev() {
            self.program.emit_sto(register, Some(param.name.clone()));
            self.program.emit("RDN");
        }

        let mut nested = Vec::new();
        for node in &def.body {
            match &node.node {
                Node::FunctionDef(inner) => nested.push(inner),
                _ => self.compile_stmt(node)?,
            }
        }
        self.finish_body();

        for inner in nested {
            self.compile_function_def(inner)?;
        }

        self.scopes.pop();
        self.loop_stack = outer_loops;
        Ok(())
    }

    fn compile_block(&mut self, nodes: &[NodeLoc]) -> CompileResult<()> {
        for node in nodes {
            self.compile_stmt(node)?;
        }
        Ok(())
    }

    /// Closes a body with `RTN` unless it already ends with one.
    fn finish_body(&mut self) {
        if self.program.last_text() != Some("RTN") {
            self.program.emit("RTN");
        }
    }

    fn back_label(&mut self, position: CodeRange) -> CompileResult<u8> {
        self.jumps.back_jump().map_err(|pool| jump_error(pool, position))
    }

    fn skip_label(&mut self, position: CodeRange) -> CompileResult<u8> {
        self.jumps.skip().map_err(|pool| jump_error(pool, position))
    }

    fn emit_label(&mut self, label: u8) {
        self.program.emit(format!("LBL {label:02}"));
    }

    fn emit_gto(&mut self, label: u8) {
        self.program.emit(format!("GTO {label:02}"));
    }

    /// Emits the `LBL` of a forward skip and returns the label to the pool.
    fn place_skip(&mut self, label: u8) {
        self.emit_label(label);
        self.jumps.release(label);
    }

    fn register_of(&self, name: &str, position: CodeRange) -> CompileResult<Register> {
        self.scopes.get_register(name).map_err(|err| scope_error(err, position))
    }

    /// Register an assignment to `name` writes to: the visible binding, or a
    /// fresh one in the innermost scope. Matrices always get a named binding.
    ///
    /// Storing to a list or dict alias rebinds the name instead of writing over
    /// the aliased container.
    fn store_register(&mut self, name: &str, opts: &VarOptions, position: CodeRange) -> CompileResult<Register> {
        self.scopes.drop_alias(name);
        if opts.is_matrix {
            return self.scopes.var_to_reg(name, opts).map_err(|err| scope_error(err, position));
        }
        match self.scopes.get_register(name) {
            Ok(register) => {
                self.scopes.restamp(name, opts);
                Ok(register)
            }
            Err(ScopeError::Unbound(_)) => self
                .scopes
                .var_to_reg(name, opts)
                .map_err(|err| scope_error(err, position)),
            Err(err) => Err(scope_error(err, position)),
        }
    }
}

fn scope_error(err: ScopeError, position: CodeRange) -> CompileError {
    let kind = match err {
        ScopeError::Unbound(_) => ErrorKind::UnboundIdentifier,
        ScopeError::RegistersExhausted { .. } => ErrorKind::RegistersExhausted,
        ScopeError::AliasCycle(_) => ErrorKind::Unsupported,
    };
    CompileError::new(kind, err.to_string(), position)
}

fn jump_error(pool: JumpPool, position: CodeRange) -> CompileError {
    CompileError::new(ErrorKind::JumpLabelsExhausted, pool.to_string(), position)
}
