//! Per-operation specialization of a parsed trigger.
//!
//! [`specialize`] resolves every guard that tests `INSERTING`, `UPDATING` or
//! `DELETING` for one operation and prunes the tree accordingly. Predicates
//! left inside expressions and SQL text are replaced by `TRUE`/`FALSE`.
//! Subtrees without operation predicates are shared with the input tree, not
//! copied.

pub mod condition;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::ast::*;
use crate::diagnostics::{Component, Diagnostics};
use crate::parser::is_builtin_exception;
use condition::Resolution;

/// Specialize `trigger` for `op`, discarding diagnostics.
pub fn specialize(trigger: &Trigger, op: Operation) -> Trigger {
    let mut diags = Diagnostics::new();
    specialize_with(trigger, op, &mut diags)
}

/// Specialize `trigger` for `op`. Conditions that cannot be classified are
/// kept verbatim and reported to `diags`.
pub fn specialize_with(trigger: &Trigger, op: Operation, diags: &mut Diagnostics) -> Trigger {
    let mut specializer = Specializer {
        op,
        diags,
        pruned: 0,
        bound: bound_exceptions(&trigger.declarations).collect(),
    };
    let declarations = match specializer.declarations(&trigger.declarations) {
        Some(declarations) => Arc::new(declarations),
        None => Arc::clone(&trigger.declarations),
    };
    let main = match specializer.statement(&trigger.main) {
        Outcome::Keep => Arc::clone(&trigger.main),
        Outcome::Replace(mut stmts) if stmts.len() == 1 => stmts.remove(0),
        // The main block is never spliced away, only emptied.
        _ => Arc::new(Statement::BeginEnd {
            declarations: Declarations::default(),
            body: Vec::new(),
            handlers: Vec::new(),
        }),
    };
    tracing::debug!(operation = %op, pruned = specializer.pruned, "specialized trigger");

    Trigger {
        header: trigger.header.clone(),
        declarations,
        main,
    }
}

/// Result of specializing one statement.
enum Outcome {
    /// Unchanged; the caller shares the original node.
    Keep,
    /// Replaced by zero or more statements spliced in its place.
    Replace(Block),
}

impl Outcome {
    fn single(stmt: Statement) -> Self {
        Outcome::Replace(vec![Arc::new(stmt)])
    }

    fn omit() -> Self {
        Outcome::Replace(Vec::new())
    }
}

/// What a handler catches, for reachability checks.
enum Catch<'a> {
    /// `OTHERS`, built-ins any statement may raise, and user exceptions
    /// bound to an error code by `PRAGMA EXCEPTION_INIT`.
    Any,
    /// `NO_DATA_FOUND`/`TOO_MANY_ROWS`: queries, function calls and explicit
    /// raises.
    Query(&'a str),
    /// Unbound user exceptions: explicit raises only.
    Named(&'a str),
}

impl<'a> Catch<'a> {
    fn of(name: &'a str, bound: bool) -> Self {
        if bound {
            Catch::Any
        } else if name.eq_ignore_ascii_case("NO_DATA_FOUND")
            || name.eq_ignore_ascii_case("TOO_MANY_ROWS")
        {
            Catch::Query(name)
        } else if is_builtin_exception(name) {
            Catch::Any
        } else {
            Catch::Named(name)
        }
    }
}

/// Whether `stmt` may raise what `catch` handles. Calls and unmodelled
/// statements are assumed to raise anything.
fn may_raise(stmt: &Statement, catch: &Catch) -> bool {
    match stmt {
        Statement::Label { .. } | Statement::Exit { condition: None } => false,
        _ if stmt.is_noop() => false,
        Statement::Raise {
            exception_name: None,
        }
        | Statement::FunctionCall { .. }
        | Statement::Unknown { .. } => true,
        Statement::Raise {
            exception_name: Some(raised),
        } => match catch {
            Catch::Any => true,
            Catch::Query(name) | Catch::Named(name) => raised.eq_ignore_ascii_case(name),
        },
        Statement::Sql { kind, raw } => match catch {
            Catch::Any => true,
            Catch::Query(_) => *kind == SqlKind::Select || condition::has_call(raw),
            Catch::Named(_) => false,
        },
        _ => {
            matches!(catch, Catch::Any)
                || (matches!(catch, Catch::Query(_))
                    && stmt.expressions().into_iter().any(condition::has_call))
                || stmt
                    .blocks()
                    .into_iter()
                    .flatten()
                    .any(|s| may_raise(s, catch))
        }
    }
}

/// Exceptions of `decls` bound to an error code.
fn bound_exceptions(decls: &Declarations) -> impl Iterator<Item = String> + '_ {
    decls
        .exceptions
        .iter()
        .filter(|e| e.error_code.is_some())
        .map(|e| e.name.clone())
}

struct Specializer<'d> {
    op: Operation,
    diags: &'d mut Diagnostics,
    pruned: usize,
    /// Bound exceptions visible in the current block.
    bound: Vec<String>,
}

impl Specializer<'_> {
    /// `text` with operation predicates replaced, if it has any.
    fn text(&self, text: &str) -> Option<String> {
        condition::substitute(text, self.op)
    }

    fn texts(&self, texts: &[String]) -> Option<Vec<String>> {
        let replaced: Vec<Option<String>> = texts.iter().map(|t| self.text(t)).collect();
        if replaced.iter().all(Option::is_none) {
            return None;
        }
        Some(
            replaced
                .into_iter()
                .zip(texts)
                .map(|(new, old)| new.unwrap_or_else(|| old.clone()))
                .collect(),
        )
    }

    /// Declarations with predicates replaced in defaults, constant values and
    /// cursor queries. `None` when nothing changed.
    fn declarations(&self, decls: &Declarations) -> Option<Declarations> {
        let mut out = decls.clone();
        let mut changed = false;
        for var in &mut out.variables {
            if let Some(default) = var.default_expr.as_deref().and_then(|d| self.text(d)) {
                var.default_expr = Some(default);
                changed = true;
            }
        }
        for constant in &mut out.constants {
            if let Some(value) = self.text(&constant.value_expr) {
                constant.value_expr = value;
                changed = true;
            }
        }
        for cursor in &mut out.cursors {
            if let Some(query) = self.text(&cursor.query) {
                cursor.query = query;
                changed = true;
            }
        }
        changed.then_some(out)
    }

    fn is_bound(&self, name: &str) -> bool {
        self.bound.iter().any(|b| b.eq_ignore_ascii_case(name))
    }

    /// Specialize a statement list. Returns `None` when nothing changed.
    fn block(&mut self, block: &Block) -> Option<Block> {
        let mut out: Option<Block> = None;
        for (i, stmt) in block.iter().enumerate() {
            match self.statement(stmt) {
                Outcome::Keep => {
                    if let Some(out) = out.as_mut() {
                        out.push(Arc::clone(stmt));
                    }
                }
                Outcome::Replace(stmts) => {
                    out.get_or_insert_with(|| block[..i].to_vec())
                        .extend(stmts);
                }
            }
        }
        out
    }

    /// The specialized list, shared with the input when unchanged.
    fn block_or_same(&mut self, block: &Block) -> (Block, bool) {
        match self.block(block) {
            Some(changed) => (changed, true),
            None => (block.clone(), false),
        }
    }

    fn resolve(&mut self, condition: &str) -> Resolution {
        match condition::resolve(condition, self.op) {
            Ok(resolution) => resolution,
            Err(condition::Unclassifiable(reason)) => {
                self.diags.warn(
                    Component::Specializer,
                    format!(
                        "cannot resolve condition '{}' for {}: {}; kept unpruned",
                        condition, self.op, reason
                    ),
                );
                Resolution::Depends(
                    self.text(condition)
                        .unwrap_or_else(|| condition.to_string()),
                )
            }
        }
    }

    fn statement(&mut self, stmt: &Statement) -> Outcome {
        match stmt {
            Statement::IfElse {
                branches,
                else_body,
            } => self.if_else(branches, else_body),
            Statement::CaseWhen {
                selector: None,
                branches,
                else_body,
            } => self.searched_case(branches, else_body),
            Statement::CaseWhen {
                selector: Some(selector),
                branches,
                else_body,
            } => {
                let new_selector = self.text(selector);
                let mut changed = new_selector.is_some();
                let branches = branches
                    .iter()
                    .map(|b| {
                        let condition = self.text(&b.condition);
                        let (body, c) = self.block_or_same(&b.body);
                        changed |= c || condition.is_some();
                        Branch {
                            condition: condition.unwrap_or_else(|| b.condition.clone()),
                            body: non_empty(body),
                        }
                    })
                    .collect::<Vec<_>>();
                let (else_body, c) = self.block_or_same(else_body);
                if !changed && !c {
                    return Outcome::Keep;
                }
                Outcome::single(Statement::CaseWhen {
                    selector: Some(new_selector.unwrap_or_else(|| selector.clone())),
                    branches,
                    else_body,
                })
            }
            Statement::WhileLoop { condition, body } => {
                let condition = match self.resolve(condition) {
                    Resolution::Never => {
                        self.pruned += 1;
                        return Outcome::omit();
                    }
                    Resolution::Always => "TRUE".to_string(),
                    Resolution::Depends(text) => text,
                };
                let (new_body, changed) = self.block_or_same(body);
                if new_body.is_empty() {
                    self.pruned += 1;
                    return Outcome::omit();
                }
                if !changed && stmt.conditions() == [condition.as_str()] {
                    return Outcome::Keep;
                }
                Outcome::single(Statement::WhileLoop {
                    condition,
                    body: new_body,
                })
            }
            Statement::Exit {
                condition: Some(condition),
            } => match self.resolve(condition) {
                Resolution::Never => {
                    self.pruned += 1;
                    Outcome::omit()
                }
                Resolution::Always => Outcome::single(Statement::Exit { condition: None }),
                Resolution::Depends(text) if text == *condition => Outcome::Keep,
                Resolution::Depends(text) => Outcome::single(Statement::Exit {
                    condition: Some(text),
                }),
            },
            Statement::ForLoop {
                loop_var,
                reverse,
                query,
                body,
            } => {
                let new_query = self.text(query);
                let (body, changed) = self.block_or_same(body);
                if body.is_empty() {
                    self.pruned += 1;
                    return Outcome::omit();
                }
                if !changed && new_query.is_none() {
                    return Outcome::Keep;
                }
                Outcome::single(Statement::ForLoop {
                    loop_var: loop_var.clone(),
                    reverse: *reverse,
                    query: new_query.unwrap_or_else(|| query.clone()),
                    body,
                })
            }
            Statement::Loop { body } => match self.block(body) {
                None => Outcome::Keep,
                Some(body) if body.is_empty() => {
                    self.pruned += 1;
                    Outcome::omit()
                }
                Some(body) => Outcome::single(Statement::Loop { body }),
            },
            Statement::BeginEnd {
                declarations,
                body,
                handlers,
            } => self.begin_end(declarations, body, handlers),
            Statement::Sql { kind, raw } => match self.text(raw) {
                Some(raw) => Outcome::single(Statement::Sql { kind: *kind, raw }),
                None => Outcome::Keep,
            },
            Statement::Unknown { raw } => match self.text(raw) {
                Some(raw) => Outcome::single(Statement::Unknown { raw }),
                None => Outcome::Keep,
            },
            Statement::FunctionCall { target, args } => match self.texts(args) {
                Some(args) => Outcome::single(Statement::FunctionCall {
                    target: target.clone(),
                    args,
                }),
                None => Outcome::Keep,
            },
            _ => Outcome::Keep,
        }
    }

    fn if_else(&mut self, branches: &[Branch], else_body: &Block) -> Outcome {
        let Some(mut arms) = self.arms(branches, else_body) else {
            return Outcome::Keep;
        };
        // Trailing arms that do nothing can go when there is no ELSE.
        if arms.else_body.is_empty() {
            while arms.branches.last().is_some_and(|b| b.body.is_empty()) {
                arms.branches.pop();
            }
        }
        if arms.branches.is_empty() {
            return Outcome::Replace(arms.else_body);
        }
        for branch in &mut arms.branches {
            branch.body = non_empty(std::mem::take(&mut branch.body));
        }
        Outcome::single(Statement::IfElse {
            branches: arms.branches,
            else_body: arms.else_body,
        })
    }

    fn searched_case(&mut self, branches: &[Branch], else_body: &Block) -> Outcome {
        let Some(mut arms) = self.arms(branches, else_body) else {
            return Outcome::Keep;
        };
        if arms.branches.is_empty() {
            return Outcome::Replace(arms.else_body);
        }
        for branch in &mut arms.branches {
            branch.body = non_empty(std::mem::take(&mut branch.body));
        }
        Outcome::single(Statement::CaseWhen {
            selector: None,
            branches: arms.branches,
            else_body: arms.else_body,
        })
    }

    /// Resolve a guarded chain. `None` means nothing changed. A first arm
    /// that always holds is returned as `else_body` with no branches, which
    /// splices it into the parent.
    fn arms(&mut self, branches: &[Branch], else_body: &Block) -> Option<Arms> {
        let mut kept = Vec::new();
        let mut changed = false;
        let mut matched = None;

        for branch in branches {
            match self.resolve(&branch.condition) {
                Resolution::Never => {
                    self.pruned += 1;
                    changed = true;
                }
                Resolution::Always => {
                    let (body, _) = self.block_or_same(&branch.body);
                    matched = Some(body);
                    changed = true;
                    break;
                }
                Resolution::Depends(condition) => {
                    let (body, c) = self.block_or_same(&branch.body);
                    changed |= c || condition != branch.condition || body.is_empty();
                    kept.push(Branch { condition, body });
                }
            }
        }

        let else_body = match matched {
            Some(body) => body,
            None => {
                let (body, c) = self.block_or_same(else_body);
                changed |= c;
                body
            }
        };
        changed.then_some(Arms {
            branches: kept,
            else_body,
        })
    }

    fn begin_end(
        &mut self,
        declarations: &Declarations,
        body: &Block,
        handlers: &[ExceptionHandler],
    ) -> Outcome {
        let scope = self.bound.len();
        self.bound.extend(bound_exceptions(declarations));
        let outcome = self.begin_end_in_scope(declarations, body, handlers);
        self.bound.truncate(scope);
        outcome
    }

    fn begin_end_in_scope(
        &mut self,
        declarations: &Declarations,
        body: &Block,
        handlers: &[ExceptionHandler],
    ) -> Outcome {
        let new_declarations = self.declarations(declarations);
        let (new_body, mut changed) = self.block_or_same(body);
        changed |= new_declarations.is_some();
        if new_body.is_empty() {
            if !body.is_empty() {
                self.pruned += 1;
            }
            return if handlers.is_empty() && declarations.is_empty() && body.is_empty() {
                Outcome::Keep
            } else {
                Outcome::omit()
            };
        }

        let mut new_handlers = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let (handler_body, c) = self.block_or_same(&handler.body);
            changed |= c;
            if !handler_body.is_empty() {
                new_handlers.push(ExceptionHandler {
                    exception_name: handler.exception_name.clone(),
                    body: handler_body,
                });
                continue;
            }
            let catch = Catch::of(
                &handler.exception_name,
                self.is_bound(&handler.exception_name),
            );
            if new_body.iter().any(|s| may_raise(s, &catch)) {
                new_handlers.push(ExceptionHandler {
                    exception_name: handler.exception_name.clone(),
                    body: vec![Arc::new(Statement::noop())],
                });
            } else {
                self.pruned += 1;
                tracing::trace!(exception = %handler.exception_name, "dropped unreachable handler");
            }
        }

        if !changed {
            return Outcome::Keep;
        }
        Outcome::single(Statement::BeginEnd {
            declarations: new_declarations.unwrap_or_else(|| declarations.clone()),
            body: new_body,
            handlers: new_handlers,
        })
    }
}

struct Arms {
    branches: Vec<Branch>,
    else_body: Block,
}

/// A kept arm never has an empty body.
fn non_empty(body: Block) -> Block {
    if body.is_empty() {
        vec![Arc::new(Statement::noop())]
    } else {
        body
    }
}
