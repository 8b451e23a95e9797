// src/extract/code.rs

//! Read/write sets for code cells.
//!
//! Module-level bindings (assignment, augmented assignment, `for` targets,
//! `with ... as` targets) are writes. Any other name reference is a read.
//! Function bodies are local scope: parameters and names assigned inside
//! them are neither reads nor writes, but free names they reference are
//! reads of the cell. In-place mutation such as `xs.append(1)` is not
//! tracked as a write.

use std::collections::{BTreeSet, HashSet};

use crate::script::ast::{Expr, FunctionDef, Stmt, StmtKind};
use crate::script::{builtins, parse};

use super::Dependencies;

pub fn extract_code(source: &str) -> Dependencies {
    let Ok(program) = parse(source) else {
        return Dependencies::default();
    };

    let mut walker = Walker::default();
    walker.block(&program.body, None);

    let Walker {
        mut reads,
        writes,
        defined,
    } = walker;
    reads.retain(|name| !defined.contains(name) && !builtins::is_builtin(name));

    Dependencies { reads, writes }
}

#[derive(Default)]
struct Walker {
    reads: BTreeSet<String>,
    writes: BTreeSet<String>,
    /// Names bound by a module-level `def`.
    defined: HashSet<String>,
}

type Locals = HashSet<String>;

impl Walker {
    fn block(&mut self, body: &[Stmt], locals: Option<&Locals>) {
        for stmt in body {
            self.stmt(stmt, locals);
        }
    }

    fn bind(&mut self, name: &str, locals: Option<&Locals>) {
        if locals.is_none() {
            self.writes.insert(name.to_string());
        }
    }

    fn read(&mut self, name: &str, locals: Option<&Locals>) {
        if locals.is_some_and(|l| l.contains(name)) {
            return;
        }
        self.reads.insert(name.to_string());
    }

    fn stmt(&mut self, stmt: &Stmt, locals: Option<&Locals>) {
        match &stmt.kind {
            StmtKind::Expr(e) => self.expr(e, locals),
            StmtKind::Assign { target, value } => {
                self.expr(value, locals);
                for name in target.names() {
                    self.bind(name, locals);
                }
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.read(target, locals);
                self.expr(value, locals);
                self.bind(target, locals);
            }
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    self.expr(cond, locals);
                    self.block(body, locals);
                }
                self.block(orelse, locals);
            }
            StmtKind::For { target, iter, body } => {
                self.expr(iter, locals);
                for name in target.names() {
                    self.bind(name, locals);
                }
                self.block(body, locals);
            }
            StmtKind::With {
                context,
                binding,
                body,
            } => {
                self.expr(context, locals);
                if let Some(name) = binding {
                    self.bind(name, locals);
                }
                self.block(body, locals);
            }
            StmtKind::FunctionDef(def) => {
                if locals.is_none() {
                    self.defined.insert(def.name.clone());
                }
                self.function(def, locals);
            }
            StmtKind::Return(Some(e)) => self.expr(e, locals),
            StmtKind::Return(None) | StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
        }
    }

    fn function(&mut self, def: &FunctionDef, enclosing: Option<&Locals>) {
        let mut locals: Locals = enclosing.cloned().unwrap_or_default();
        locals.extend(def.params.iter().cloned());
        collect_bound(&def.body, &mut locals);
        self.block(&def.body, Some(&locals));
    }

    fn expr(&mut self, expr: &Expr, locals: Option<&Locals>) {
        match expr {
            Expr::None | Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => {}
            Expr::Name(name) => self.read(name, locals),
            Expr::List(items) | Expr::Tuple(items) => {
                for e in items {
                    self.expr(e, locals);
                }
            }
            Expr::Dict(entries) => {
                for (k, v) in entries {
                    self.expr(k, locals);
                    self.expr(v, locals);
                }
            }
            Expr::Unary { operand, .. } => self.expr(operand, locals),
            Expr::Binary { left, right, .. }
            | Expr::Compare { left, right, .. }
            | Expr::Logical { left, right, .. } => {
                self.expr(left, locals);
                self.expr(right, locals);
            }
            Expr::Call { func, args } => {
                self.expr(func, locals);
                for a in args {
                    self.expr(a, locals);
                }
            }
            Expr::Method { receiver, args, .. } => {
                self.expr(receiver, locals);
                for a in args {
                    self.expr(a, locals);
                }
            }
            Expr::Index { value, index } => {
                self.expr(value, locals);
                self.expr(index, locals);
            }
        }
    }
}

/// Every name bound anywhere in a function body, nested blocks included.
/// Nested function bodies are their own scope and are not descended into.
fn collect_bound(body: &[Stmt], out: &mut Locals) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Assign { target, .. } => {
                out.extend(target.names().into_iter().map(str::to_string));
            }
            StmtKind::AugAssign { target, .. } => {
                out.insert(target.clone());
            }
            StmtKind::For { target, body, .. } => {
                out.extend(target.names().into_iter().map(str::to_string));
                collect_bound(body, out);
            }
            StmtKind::With { binding, body, .. } => {
                out.extend(binding.iter().cloned());
                collect_bound(body, out);
            }
            StmtKind::If { branches, orelse } => {
                for (_, b) in branches {
                    collect_bound(b, out);
                }
                collect_bound(orelse, out);
            }
            StmtKind::FunctionDef(def) => {
                out.insert(def.name.clone());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn assignment_reads_and_writes() {
        let deps = extract_code("y = x + 5");
        assert_eq!(deps.reads, set(&["x"]));
        assert_eq!(deps.writes, set(&["y"]));
    }

    #[test]
    fn augmented_assignment_reads_its_target() {
        let deps = extract_code("total += step");
        assert_eq!(deps.reads, set(&["step", "total"]));
        assert_eq!(deps.writes, set(&["total"]));
    }

    #[test]
    fn for_and_with_targets_are_writes() {
        let deps = extract_code("for k, v in pairs:\n    acc = v\nwith conn as c:\n    pass");
        assert_eq!(deps.reads, set(&["conn", "pairs"]));
        assert_eq!(deps.writes, set(&["acc", "c", "k", "v"]));
    }

    #[test]
    fn function_locals_are_hidden_but_free_names_are_reads() {
        let src = "\
def scale(v):
    factor = 2
    return v * factor * base
result = scale(data)
";
        let deps = extract_code(src);
        assert_eq!(deps.reads, set(&["base", "data"]));
        assert_eq!(deps.writes, set(&["result"]));
    }

    #[test]
    fn builtins_are_not_reads() {
        let deps = extract_code("print(len(xs))");
        assert_eq!(deps.reads, set(&["xs"]));
    }

    #[test]
    fn mutation_is_not_a_write() {
        let deps = extract_code("xs.append(1)");
        assert_eq!(deps.reads, set(&["xs"]));
        assert!(deps.writes.is_empty());
    }

    #[test]
    fn unparsable_source_gives_empty_sets() {
        assert!(extract_code("x = = 1").is_empty());
    }

    #[test]
    fn deeply_nested_source_gives_empty_sets() {
        let src = format!("x = {}y{}", "(".repeat(3_000), ")".repeat(3_000));
        assert!(extract_code(&src).is_empty());
    }
}
