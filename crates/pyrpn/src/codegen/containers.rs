//! Lists, dicts and matrices.
//!
//! All three live in named matrix variables. A list is a one-column matrix, a
//! dict a two-column matrix of (key, value) rows. The list routines find the
//! variable to work on through the name stored in `ZLIST`.

use super::{
    Compiler,
    expr::{is_slice, mismatch},
    scope_error,
};
use crate::{
    error::{CompileError, CompileResult},
    expressions::{Expr, ExprLoc, Identifier},
    reserved::{FLAG_AUTO_CREATE_KEY, FLAG_LIST_2D, REG_ZLIST},
    scope::{Container, Register, VarOptions},
};

/// One end of a slice.
#[derive(Debug, Clone, Copy)]
enum Bound<'e> {
    Expr(&'e ExprLoc),
    Const(i64),
}

/// Rows `a:b` and columns `c:d` of a matrix slice.
#[derive(Debug, Clone, Copy)]
struct SliceBounds<'e> {
    rows: (Bound<'e>, Bound<'e>),
    columns: (Bound<'e>, Bound<'e>),
}

impl Compiler {
    /// Points `ZLIST` at the variable `name`.
    pub(super) fn bind_zlist(&mut self, name: &str) {
        self.program.emit_string_line(format!("\"{name}\""));
        self.program
            .emit_store(&Register::Named(REG_ZLIST.to_owned()), None, true);
    }

    /// The named register behind a list, dict or matrix variable.
    ///
    /// Uppercase names bound to something other than a declared list or dict
    /// are taken to be matrices.
    pub(super) fn container_register(&self, id: &Identifier) -> CompileResult<(Register, Container)> {
        let register = self.register_of(&id.name, id.position)?;
        let kind = match self.scopes.container(&id.name) {
            Some(kind) => kind,
            None if register.is_named() => Container::Matrix,
            None => {
                let hint = self
                    .scopes
                    .element_source(&id.name)
                    .map(|source| format!(" (it holds one element of '{source}')"))
                    .unwrap_or_default();
                return Err(CompileError::unsupported(
                    format!("'{}' is not a list, dict or matrix{hint}", id.name),
                    id.position,
                ));
            }
        };
        Ok((register, kind))
    }

    pub(super) fn compile_list_literal(&mut self, target: &Identifier, items: &[ExprLoc]) -> CompileResult<()> {
        let register = self
            .scopes
            .var_to_reg(&target.name, &VarOptions::list())
            .map_err(|err| scope_error(err, target.position))?;
        self.program
            .emit_commented(format!("CLV {register}"), format!("{} = [...]", target.name));
        if items.is_empty() {
            return Ok(());
        }
        self.bind_zlist(register.name().unwrap_or_default());
        self.program.emit(format!("CF {FLAG_LIST_2D:02}"));
        for item in items {
            self.compile_expr(item)?;
            self.program.emit_xeq("LIST+", None);
        }
        Ok(())
    }

    pub(super) fn compile_dict_literal(
        &mut self,
        target: &Identifier,
        pairs: &[(ExprLoc, ExprLoc)],
    ) -> CompileResult<()> {
        let register = self
            .scopes
            .var_to_reg(&target.name, &VarOptions::dict())
            .map_err(|err| scope_error(err, target.position))?;
        self.program
            .emit_commented(format!("CLV {register}"), format!("{} = {{...}}", target.name));
        if pairs.is_empty() {
            return Ok(());
        }
        self.bind_zlist(register.name().unwrap_or_default());
        self.program.emit(format!("SF {FLAG_LIST_2D:02}"));
        for (key, value) in pairs {
            self.compile_expr(key)?;
            self.compile_expr(value)?;
            self.program.emit_xeq("LIST+", None);
        }
        self.program.emit(format!("CF {FLAG_LIST_2D:02}"));
        Ok(())
    }

    pub(super) fn compile_subscript_load(&mut self, object: &Identifier, index: &ExprLoc) -> CompileResult<()> {
        let (register, kind) = self.container_register(object)?;
        match kind {
            Container::Dict => {
                self.bind_zlist(register.name().unwrap_or_default());
                self.compile_expr(index)?;
                self.program.emit_xeq("p2MxIJ", None);
            }
            Container::List | Container::Matrix => {
                if let Some(bounds) = slice_bounds(index)? {
                    return self.compile_getm(&register, bounds);
                }
                self.program.emit(format!("INDEX {register}"));
                self.compile_element_index(index)?;
                self.program.emit_xeq("pMxIJ", None);
            }
        }
        self.program.emit("RCLEL");
        Ok(())
    }

    /// Stores X into `object[index]`.
    pub(super) fn compile_subscript_store(&mut self, object: &Identifier, index: &ExprLoc) -> CompileResult<()> {
        let (register, kind) = self.container_register(object)?;
        match kind {
            Container::Dict => {
                self.bind_zlist(register.name().unwrap_or_default());
                self.program.emit(format!("SF {FLAG_AUTO_CREATE_KEY:02}"));
                self.compile_expr(index)?;
                self.program.emit_xeq("p2MxIJ", None);
                self.program.emit(format!("CF {FLAG_AUTO_CREATE_KEY:02}"));
                self.program.emit("STOEL");
            }
            Container::List | Container::Matrix => {
                self.program.emit(format!("INDEX {register}"));
                if let Some(bounds) = slice_bounds(index)? {
                    self.emit_bound(bounds.rows.0)?;
                    self.emit_bound(bounds.columns.0)?;
                    self.program.emit_xeq("pMxIJ", None);
                    self.program.emit("PUTM");
                } else {
                    self.compile_element_index(index)?;
                    self.program.emit_xeq("pMxIJ", None);
                    self.program.emit("STOEL");
                }
            }
        }
        Ok(())
    }

    /// Pushes a zero-based (row, column) pair; a single index addresses column 0.
    fn compile_element_index(&mut self, index: &ExprLoc) -> CompileResult<()> {
        match &index.expr {
            Expr::Tuple(items) => match items.as_slice() {
                [row, column] => {
                    self.compile_expr(row)?;
                    self.compile_expr(column)
                }
                _ => Err(mismatch("matrix subscripts take one or two indices", index.position)),
            },
            _ => {
                self.compile_expr(index)?;
                self.program.emit("0");
                Ok(())
            }
        }
    }

    /// `m[a:b, c:d]` copies the submatrix with `GETM`.
    fn compile_getm(&mut self, register: &Register, bounds: SliceBounds<'_>) -> CompileResult<()> {
        self.program.emit(format!("INDEX {register}"));
        self.emit_bound(bounds.rows.0)?;
        self.emit_bound(bounds.columns.0)?;
        self.program.emit_xeq("pMxIJ", None);
        self.emit_bound(bounds.rows.0)?;
        self.emit_bound(bounds.rows.1)?;
        self.emit_bound(bounds.columns.0)?;
        self.emit_bound(bounds.columns.1)?;
        self.program.emit_xeq("pMxSz", None);
        self.program.emit("GETM");
        Ok(())
    }

    fn emit_bound(&mut self, bound: Bound<'_>) -> CompileResult<()> {
        match bound {
            Bound::Expr(expr) => self.compile_expr(expr),
            Bound::Const(value) => {
                self.program.emit(value.to_string());
                Ok(())
            }
        }
    }

    /// `items.append(x)`, `items.pop()`, `items.clear()`, `m.insr(r)`,
    /// `m.delr(r)` and `m.dim(rows, cols)`.
    pub(super) fn compile_method_call(
        &mut self,
        object: &Identifier,
        attr: &Identifier,
        args: &[ExprLoc],
    ) -> CompileResult<()> {
        if attr.name == "dim" {
            let [rows, columns] = args else {
                return Err(mismatch("dim() takes rows and columns", attr.position));
            };
            let register = self.store_register(&object.name, &VarOptions::matrix(), object.position)?;
            self.compile_expr(rows)?;
            self.compile_expr(columns)?;
            self.program.emit(format!("DIM {register}"));
            return Ok(());
        }

        let (register, kind) = self.container_register(object)?;
        let name = register.name().unwrap_or_default().to_owned();
        match (attr.name.as_str(), kind, args) {
            ("append", Container::List, [value]) => {
                self.bind_zlist(&name);
                self.program.emit(format!("CF {FLAG_LIST_2D:02}"));
                self.compile_expr(value)?;
                self.program.emit_xeq("LIST+", None);
            }
            ("pop", Container::List, []) => {
                self.bind_zlist(&name);
                self.program.emit_xeq("LIST-", None);
            }
            ("clear", Container::List | Container::Dict, []) => {
                self.bind_zlist(&name);
                self.program.emit_xeq("CLIST", None);
            }
            (method @ ("insr" | "delr"), Container::List | Container::Matrix, [row]) => {
                self.program.emit(format!("INDEX {register}"));
                self.compile_expr(row)?;
                self.program.emit("0");
                self.program.emit_xeq("pMxIJ", None);
                self.program.emit(method.to_uppercase());
            }
            ("append" | "pop" | "clear" | "insr" | "delr", _, _) => {
                return Err(mismatch(
                    format!("{}.{}() does not take these arguments here", object.name, attr.name),
                    attr.position,
                ));
            }
            (method, _, _) => {
                return Err(CompileError::unsupported(
                    format!("method '{method}' is not supported"),
                    attr.position,
                ));
            }
        }
        Ok(())
    }
}

/// Bounds of a slice subscript, or `None` for a plain index.
///
/// A one-dimensional `a:b` selects column 0 only. Omitted lower bounds are 0;
/// upper bounds are required since the calculator has no "to the end" form.
fn slice_bounds(index: &ExprLoc) -> CompileResult<Option<SliceBounds<'_>>> {
    if !is_slice(index) {
        return Ok(None);
    }
    let bounds = match &index.expr {
        Expr::Slice { lower, upper } => SliceBounds {
            rows: slice_pair(index, lower.as_deref(), upper.as_deref())?,
            columns: (Bound::Const(0), Bound::Const(1)),
        },
        Expr::Tuple(items) => match items.as_slice() {
            [
                ExprLoc {
                    expr: Expr::Slice { lower: r0, upper: r1 },
                    ..
                },
                ExprLoc {
                    expr: Expr::Slice { lower: c0, upper: c1 },
                    ..
                },
            ] => SliceBounds {
                rows: slice_pair(index, r0.as_deref(), r1.as_deref())?,
                columns: slice_pair(index, c0.as_deref(), c1.as_deref())?,
            },
            _ => return Err(mismatch("two-dimensional slices need a slice on both axes", index.position)),
        },
        _ => return Ok(None),
    };
    Ok(Some(bounds))
}

fn slice_pair<'e>(
    index: &ExprLoc,
    lower: Option<&'e ExprLoc>,
    upper: Option<&'e ExprLoc>,
) -> CompileResult<(Bound<'e>, Bound<'e>)> {
    let upper = upper.ok_or_else(|| mismatch("slices need an explicit upper bound", index.position))?;
    Ok((lower.map_or(Bound::Const(0), Bound::Expr), Bound::Expr(upper)))
}
