//! Variable to register allocation.
//!
//! Scopes form a stack that is walked from the innermost scope outward for both
//! reads and writes, so an assignment inside a function updates an outer binding
//! of the same name instead of shadowing it. Only an explicit [`Scopes::var_to_reg`]
//! creates a binding in the innermost scope.
//!
//! Numbered registers come from a single counter that never goes backwards, so
//! two bindings that are alive at the same time can never share a register.

use std::fmt;

use ahash::{AHashMap, AHashSet};
use tracing::{debug, trace};

/// Longest name the calculator accepts for a variable or label.
pub const MAX_NAME_LEN: usize = 7;

/// How deep a chain of list aliases may go before it is treated as a cycle.
const MAX_ALIAS_DEPTH: usize = 16;

/// Operand of `STO` / `RCL`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Register {
    /// Numbered storage register, rendered as two digits.
    Numbered(u16),
    /// Named variable, rendered quoted.
    Named(String),
}

impl Register {
    /// The variable name for named registers.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Numbered(_) => None,
            Self::Named(name) => Some(name),
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Self::Named(_))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numbered(number) => write!(f, "{number:02}"),
            Self::Named(name) => write!(f, "\"{name}\""),
        }
    }
}

/// What is known about a variable when it is bound.
#[derive(Debug, Clone, Default)]
pub(crate) struct VarOptions {
    /// Bind to this named variable whatever the identifier looks like.
    pub force_name: Option<String>,
    pub is_list: bool,
    pub is_dict: bool,
    pub is_matrix: bool,
    pub is_range_index: bool,
    /// The list or dict a `for el in container` variable walks.
    pub element_of: Option<String>,
}

impl VarOptions {
    pub fn list() -> Self {
        Self {
            is_list: true,
            ..Self::default()
        }
    }

    pub fn dict() -> Self {
        Self {
            is_dict: true,
            ..Self::default()
        }
    }

    pub fn matrix() -> Self {
        Self {
            is_matrix: true,
            ..Self::default()
        }
    }

    pub fn range_index() -> Self {
        Self {
            is_range_index: true,
            ..Self::default()
        }
    }

    pub fn forced(token: &str) -> Self {
        Self {
            force_name: Some(token.to_owned()),
            ..Self::default()
        }
    }

    pub fn element_of(container: &str) -> Self {
        Self {
            element_of: Some(container.to_owned()),
            ..Self::default()
        }
    }

    fn wants_named(&self) -> bool {
        self.is_list || self.is_dict || self.is_matrix
    }
}

/// Failures the allocator can report; the caller attaches the source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScopeError {
    Unbound(String),
    RegistersExhausted { limit: u16 },
    AliasCycle(String),
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound(name) => write!(f, "name '{name}' is not defined"),
            Self::RegistersExhausted { limit } => {
                write!(f, "all {limit} numbered registers are in use")
            }
            Self::AliasCycle(name) => write!(f, "list alias '{name}' refers to itself"),
        }
    }
}

/// Kind of container a variable was declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Container {
    List,
    Dict,
    Matrix,
}

#[derive(Debug, Default)]
struct Scope {
    bindings: AHashMap<String, Register>,
    range_vars: AHashSet<String>,
    /// Loop variables of `for el in container`, with the container.
    el_vars: AHashMap<String, String>,
    /// List variables, with the list they alias if any.
    list_vars: AHashMap<String, Option<String>>,
    dict_vars: AHashMap<String, Option<String>>,
    matrix_vars: AHashSet<String>,
}

impl Scope {
    fn stamp(&mut self, name: &str, opts: &VarOptions) {
        if opts.is_range_index {
            self.range_vars.insert(name.to_owned());
        } else {
            self.range_vars.remove(name);
        }
        match &opts.element_of {
            Some(container) => {
                self.el_vars.insert(name.to_owned(), container.clone());
            }
            None => {
                self.el_vars.remove(name);
            }
        }
    }
}

/// Stack of scopes plus the register counter.
#[derive(Debug)]
pub(crate) struct Scopes {
    stack: Vec<Scope>,
    next_reg: u16,
    max_registers: u16,
}

impl Scopes {
    pub fn new(max_registers: u16) -> Self {
        Self {
            stack: vec![Scope::default()],
            next_reg: 0,
            max_registers,
        }
    }

    pub fn push(&mut self) {
        self.stack.push(Scope::default());
    }

    /// Pops the innermost scope. The root scope is never popped.
    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Binds `name` in the innermost scope and returns its register.
    pub fn var_to_reg(&mut self, name: &str, opts: &VarOptions) -> Result<Register, ScopeError> {
        let register = if let Some(token) = &opts.force_name {
            Register::Named(truncate_name(token))
        } else if is_all_uppercase(name) || opts.wants_named() {
            Register::Named(truncate_name(name))
        } else {
            self.allocate()?
        };

        // an existing numeric binding is replaced wherever it lives
        let home = if register.is_named() {
            self.upgrade_numeric(name)
        } else {
            None
        };
        let scope = match home {
            Some(index) => &mut self.stack[index],
            None => self.innermost_mut(),
        };
        scope.bindings.insert(name.to_owned(), register.clone());
        scope.stamp(name, opts);
        if opts.is_list {
            scope.list_vars.insert(name.to_owned(), None);
        }
        if opts.is_dict {
            scope.dict_vars.insert(name.to_owned(), None);
        }
        if opts.is_matrix {
            scope.matrix_vars.insert(name.to_owned());
        }
        trace!(name, %register, depth = self.stack.len(), "bound variable");
        Ok(register)
    }

    /// Binds `name` as an alias of the list or dict `target`; no register is issued.
    pub fn bind_alias(&mut self, name: &str, target: &str) -> Result<(), ScopeError> {
        let kind = self
            .container(target)
            .ok_or_else(|| ScopeError::Unbound(target.to_owned()))?;
        let scope = self.innermost_mut();
        match kind {
            Container::Dict => scope.dict_vars.insert(name.to_owned(), Some(target.to_owned())),
            _ => scope.list_vars.insert(name.to_owned(), Some(target.to_owned())),
        };
        debug!(name, target, "bound container alias");
        Ok(())
    }

    /// Register for a value that has no source name, such as a hidden loop counter.
    pub fn anonymous(&mut self) -> Result<Register, ScopeError> {
        self.allocate()
    }

    /// Records what the latest store to an existing binding left in it.
    ///
    /// A store that is not a range index clears an earlier range mark, and one
    /// that is not an element of a loop clears the element mark.
    pub fn restamp(&mut self, name: &str, opts: &VarOptions) {
        let index = self.home_of(name).unwrap_or(self.stack.len() - 1);
        self.stack[index].stamp(name, opts);
    }

    /// Removes `name` as a list or dict alias, so a store gives it its own register.
    ///
    /// Returns `false` when `name` is not an alias in the nearest scope that knows it.
    pub fn drop_alias(&mut self, name: &str) -> bool {
        for scope in self.stack.iter_mut().rev() {
            let is_alias = matches!(scope.list_vars.get(name), Some(Some(_)))
                || matches!(scope.dict_vars.get(name), Some(Some(_)));
            if is_alias {
                scope.list_vars.remove(name);
                scope.dict_vars.remove(name);
                debug!(name, "dropped container alias");
                return true;
            }
            if scope.bindings.contains_key(name)
                || scope.list_vars.contains_key(name)
                || scope.dict_vars.contains_key(name)
            {
                return false;
            }
        }
        false
    }

    /// Register currently bound to `name`, following list aliases.
    pub fn get_register(&self, name: &str) -> Result<Register, ScopeError> {
        let resolved = self.resolve_alias(name)?;
        self.lookup(&resolved).ok_or(ScopeError::Unbound(resolved))
    }

    /// Raw lookup without alias resolution or errors.
    pub fn lookup(&self, name: &str) -> Option<Register> {
        self.stack
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
            .cloned()
    }

    pub fn is_range_var(&self, name: &str) -> bool {
        self.home_of(name)
            .is_some_and(|index| self.stack[index].range_vars.contains(name))
    }

    /// The container `name` is walking as a `for` loop element, if any.
    pub fn element_source(&self, name: &str) -> Option<&str> {
        let index = self.home_of(name)?;
        self.stack[index].el_vars.get(name).map(String::as_str)
    }

    /// Declared container kind of `name`, following aliases.
    pub fn container(&self, name: &str) -> Option<Container> {
        let resolved = self.resolve_alias(name).ok()?;
        for scope in self.stack.iter().rev() {
            if scope.list_vars.contains_key(&resolved) {
                return Some(Container::List);
            }
            if scope.dict_vars.contains_key(&resolved) {
                return Some(Container::Dict);
            }
            if scope.matrix_vars.contains(&resolved) {
                return Some(Container::Matrix);
            }
            if scope.bindings.contains_key(&resolved) {
                return None;
            }
        }
        None
    }

    /// Follows alias links until a name that is not an alias.
    fn resolve_alias(&self, name: &str) -> Result<String, ScopeError> {
        let mut current = name.to_owned();
        for _ in 0..MAX_ALIAS_DEPTH {
            match self.alias_target(&current) {
                Some(target) => current = target.to_owned(),
                None => return Ok(current),
            }
        }
        Err(ScopeError::AliasCycle(name.to_owned()))
    }

    /// Alias target of `name`; a nearer plain binding of the same name hides outer aliases.
    fn alias_target(&self, name: &str) -> Option<&str> {
        self.stack.iter().rev().find_map(|scope| {
            match scope.list_vars.get(name).or_else(|| scope.dict_vars.get(name)) {
                Some(target) => Some(target.as_deref()),
                None => scope.bindings.contains_key(name).then_some(None),
            }
        })?
    }

    fn home_of(&self, name: &str) -> Option<usize> {
        self.stack.iter().rposition(|scope| scope.bindings.contains_key(name))
    }

    /// Drops a numeric binding of `name`, returning the scope it lived in.
    fn upgrade_numeric(&mut self, name: &str) -> Option<usize> {
        let index = self.home_of(name)?;
        if let Some(Register::Numbered(old)) = self.stack[index].bindings.get(name) {
            debug!(name, old, "upgrading numbered register to named variable");
            self.stack[index].bindings.remove(name);
        }
        Some(index)
    }

    fn allocate(&mut self) -> Result<Register, ScopeError> {
        if self.next_reg >= self.max_registers {
            return Err(ScopeError::RegistersExhausted {
                limit: self.max_registers,
            });
        }
        let register = Register::Numbered(self.next_reg);
        self.next_reg += 1;
        Ok(register)
    }

    fn innermost_mut(&mut self) -> &mut Scope {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }
}

/// `true` for identifiers like `X` or `TOTAL2` that contain letters, none lowercase.
pub(crate) fn is_all_uppercase(name: &str) -> bool {
    name.chars().any(char::is_alphabetic) && !name.chars().any(char::is_lowercase)
}

/// Keeps the last seven characters, which is what the calculator will display.
pub(crate) fn truncate_name(name: &str) -> String {
    let count = name.chars().count();
    name.chars().skip(count.saturating_sub(MAX_NAME_LEN)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes() -> Scopes {
        Scopes::new(100)
    }

    #[test]
    fn numbered_registers_are_monotonic_across_pops() {
        let mut scopes = scopes();
        let a = scopes.var_to_reg("a", &VarOptions::default()).unwrap();
        scopes.push();
        let b = scopes.var_to_reg("b", &VarOptions::default()).unwrap();
        scopes.pop();
        scopes.push();
        let c = scopes.var_to_reg("c", &VarOptions::default()).unwrap();
        assert_eq!(
            [a, b, c],
            [Register::Numbered(0), Register::Numbered(1), Register::Numbered(2)]
        );
    }

    #[test]
    fn uppercase_names_are_named_and_truncated() {
        let mut scopes = scopes();
        let reg = scopes.var_to_reg("X", &VarOptions::default()).unwrap();
        assert_eq!(reg.to_string(), "\"X\"");
        let reg = scopes.var_to_reg("VERYLONGNAME", &VarOptions::default()).unwrap();
        assert_eq!(reg, Register::Named("ONGNAME".to_owned()));
        assert!(!is_all_uppercase("_"));
        assert!(is_all_uppercase("N_2"));
    }

    #[test]
    fn list_binding_upgrades_numeric() {
        let mut scopes = scopes();
        assert_eq!(
            scopes.var_to_reg("items", &VarOptions::default()).unwrap(),
            Register::Numbered(0)
        );
        let reg = scopes.var_to_reg("items", &VarOptions::list()).unwrap();
        assert_eq!(reg, Register::Named("items".to_owned()));
        assert_eq!(scopes.get_register("items").unwrap(), reg);
        assert_eq!(scopes.container("items"), Some(Container::List));
        // the freed number is not handed out again
        assert_eq!(scopes.anonymous().unwrap(), Register::Numbered(1));
    }

    #[test]
    fn inner_binding_shadows_until_pop() {
        let mut scopes = scopes();
        let outer = scopes.var_to_reg("a", &VarOptions::default()).unwrap();
        scopes.push();
        let inner = scopes.var_to_reg("a", &VarOptions::default()).unwrap();
        assert_ne!(outer, inner);
        assert_eq!(scopes.get_register("a").unwrap(), inner);
        scopes.pop();
        assert_eq!(scopes.get_register("a").unwrap(), outer);
    }

    #[test]
    fn lookup_walks_outward() {
        let mut scopes = scopes();
        let outer = scopes.var_to_reg("total", &VarOptions::default()).unwrap();
        scopes.push();
        assert_eq!(scopes.lookup("total"), Some(outer));
        assert!(matches!(scopes.get_register("missing"), Err(ScopeError::Unbound(_))));
    }

    #[test]
    fn root_scope_is_never_popped() {
        let mut scopes = scopes();
        scopes.var_to_reg("kept", &VarOptions::default()).unwrap();
        scopes.pop();
        scopes.pop();
        assert!(scopes.lookup("kept").is_some());
    }

    #[test]
    fn alias_resolves_at_lookup_time() {
        let mut scopes = scopes();
        scopes.var_to_reg("a", &VarOptions::list()).unwrap();
        scopes.bind_alias("b", "a").unwrap();
        assert_eq!(scopes.get_register("b").unwrap(), Register::Named("a".to_owned()));
        scopes.var_to_reg("c", &VarOptions::list()).unwrap();
        scopes.bind_alias("a", "c").unwrap();
        assert_eq!(scopes.get_register("b").unwrap(), Register::Named("c".to_owned()));
    }

    #[test]
    fn exhausting_registers_fails() {
        let mut scopes = Scopes::new(2);
        scopes.anonymous().unwrap();
        scopes.anonymous().unwrap();
        assert_eq!(
            scopes.var_to_reg("x", &VarOptions::default()),
            Err(ScopeError::RegistersExhausted { limit: 2 })
        );
    }

    #[test]
    fn range_tracking() {
        let mut scopes = scopes();
        scopes.var_to_reg("i", &VarOptions::range_index()).unwrap();
        scopes.var_to_reg("n", &VarOptions::default()).unwrap();
        assert!(scopes.is_range_var("i"));
        assert!(!scopes.is_range_var("n"));
        scopes.restamp("n", &VarOptions::range_index());
        assert!(scopes.is_range_var("n"));
    }

    #[test]
    fn plain_store_clears_range_mark() {
        let mut scopes = scopes();
        scopes.var_to_reg("i", &VarOptions::range_index()).unwrap();
        scopes.push();
        scopes.restamp("i", &VarOptions::default());
        assert!(!scopes.is_range_var("i"));
        scopes.pop();
        assert!(!scopes.is_range_var("i"));
    }

    #[test]
    fn forced_name_wins_over_allocation() {
        let mut scopes = scopes();
        let reg = scopes.var_to_reg("reply", &VarOptions::forced("answer_text")).unwrap();
        assert_eq!(reg, Register::Named("er_text".to_owned()));
        assert_eq!(scopes.get_register("reply").unwrap(), reg);
        // no numbered register was used
        assert_eq!(scopes.anonymous().unwrap(), Register::Numbered(0));
    }

    #[test]
    fn element_variables_remember_their_container() {
        let mut scopes = scopes();
        scopes.var_to_reg("items", &VarOptions::list()).unwrap();
        scopes.var_to_reg("el", &VarOptions::element_of("items")).unwrap();
        assert_eq!(scopes.element_source("el"), Some("items"));
        assert_eq!(scopes.element_source("items"), None);
        scopes.restamp("el", &VarOptions::default());
        assert_eq!(scopes.element_source("el"), None);
    }

    #[test]
    fn dropping_an_alias_unbinds_the_name() {
        let mut scopes = scopes();
        scopes.var_to_reg("a", &VarOptions::list()).unwrap();
        scopes.bind_alias("b", "a").unwrap();
        assert!(!scopes.drop_alias("a"));
        assert!(scopes.drop_alias("b"));
        assert!(matches!(scopes.get_register("b"), Err(ScopeError::Unbound(_))));
        assert_eq!(scopes.container("a"), Some(Container::List));
    }

    #[test]
    fn inner_binding_hides_outer_alias() {
        let mut scopes = scopes();
        scopes.var_to_reg("a", &VarOptions::list()).unwrap();
        scopes.bind_alias("b", "a").unwrap();
        scopes.push();
        let inner = scopes.var_to_reg("b", &VarOptions::default()).unwrap();
        assert_eq!(inner, Register::Numbered(0));
        assert_eq!(scopes.get_register("b").unwrap(), inner);
        assert_eq!(scopes.container("b"), None);
        scopes.pop();
        assert_eq!(scopes.get_register("b").unwrap(), Register::Named("a".to_owned()));
    }
}
