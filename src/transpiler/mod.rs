//! Code generation from the trigger IR.
//!
//! Both dialects share one tree walk, [`BlockGenerator`]. A dialect only
//! supplies expression rewriting, declarations, handler conditions and the
//! leaf statements.

pub mod oracle;
pub mod postgres;
pub mod rewrite;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fmt::{Result, Write};
use std::str::FromStr;
use std::sync::Arc;

use crate::ast::*;
use crate::diagnostics::Diagnostics;
use crate::mapping::MappingTables;

pub use oracle::to_oracle;
pub use postgres::to_postgres;

/// Target of the tree walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Postgres,
    Oracle,
}

impl Dialect {
    /// Render `trigger` in this dialect. Oracle output ignores the mapping
    /// tables and options.
    pub fn render(
        self,
        trigger: &Trigger,
        tables: &MappingTables,
        options: &GenerateOptions,
        diags: &mut Diagnostics,
    ) -> String {
        match self {
            Dialect::Postgres => to_postgres(trigger, tables, options, diags),
            Dialect::Oracle => to_oracle(trigger),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "oracle" | "plsql" => Ok(Dialect::Oracle),
            other => Err(format!("unknown dialect '{}'", other)),
        }
    }
}

/// Generator policy, read from the `[generate]` table of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Replacement for `SYSDATE`/`SYSTIMESTAMP`; the mapping table decides
    /// when unset.
    pub current_timestamp: Option<String>,
    /// Replacement for `TRUNC(SYSDATE)`.
    pub current_date: Option<String>,
    /// Keep `RAISE_APPLICATION_ERROR` codes as trailing comments.
    pub retain_error_code: bool,
    /// Spaces per nesting level.
    pub indent: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            current_timestamp: None,
            current_date: None,
            retain_error_code: false,
            indent: 4,
        }
    }
}

/// Indented line buffer.
pub struct Writer {
    indent_level: usize,
    indent_width: usize,
    buffer: String,
}

impl Writer {
    pub fn new(indent_width: usize) -> Self {
        Self {
            indent_level: 0,
            indent_width,
            buffer: String::new(),
        }
    }

    pub fn line(&mut self, text: &str) -> Result {
        let width = self.indent_level * self.indent_width;
        writeln!(self.buffer, "{:width$}{}", "", text, width = width)
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}

/// The shared statement walk. Block keywords are spelled the same in both
/// dialects; everything else goes through the dialect hooks.
pub trait BlockGenerator {
    fn writer(&mut self) -> &mut Writer;

    /// Condition or expression in the target dialect.
    fn expression(&mut self, text: &str) -> String;

    /// Everything between `FOR` and `LOOP`.
    fn for_range(&mut self, loop_var: &str, reverse: bool, query: &str) -> String;

    /// Items of a `DECLARE` section, one per line.
    fn declarations(&mut self, decls: &Declarations) -> Result;

    /// Condition name after `WHEN` in an exception handler.
    fn handler_condition(&mut self, name: &str) -> String;

    /// A handler whose condition an earlier handler of the same block
    /// already catches.
    fn shadowed_handler(&mut self, _name: &str, _condition: &str) {}

    /// `Sql`, `Raise`, `FunctionCall`, `Goto` and `Unknown`.
    fn leaf(&mut self, stmt: &Statement) -> Result;

    /// Whether `decls` renders anything, so `DECLARE` is worth writing.
    fn has_declarations(&self, decls: &Declarations) -> bool {
        !decls.is_empty()
    }

    fn block(&mut self, body: &[Arc<Statement>]) -> Result {
        for stmt in body {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn indented_block(&mut self, body: &[Arc<Statement>]) -> Result {
        self.writer().indent();
        self.block(body)?;
        self.writer().dedent();
        Ok(())
    }

    /// Body plus optional `EXCEPTION` section, without `BEGIN`/`END`.
    fn body_and_handlers(&mut self, body: &[Arc<Statement>], handlers: &[ExceptionHandler]) -> Result {
        self.indented_block(body)?;
        if handlers.is_empty() {
            return Ok(());
        }
        self.writer().line("EXCEPTION")?;
        self.writer().indent();
        let mut seen: Vec<String> = Vec::new();
        for handler in handlers {
            let condition = self.handler_condition(&handler.exception_name);
            if seen.iter().any(|c| *c == condition || c == "OTHERS") {
                self.shadowed_handler(&handler.exception_name, &condition);
            } else {
                seen.push(condition.clone());
            }
            self.writer().line(&format!("WHEN {} THEN", condition))?;
            self.indented_block(&handler.body)?;
        }
        self.writer().dedent();
        Ok(())
    }

    fn guarded_arms(&mut self, first: &str, branches: &[Branch]) -> Result {
        for (i, branch) in branches.iter().enumerate() {
            let condition = self.expression(&branch.condition);
            let keyword = if i == 0 { first } else { "ELSIF" };
            self.writer().line(&format!("{} {} THEN", keyword, condition))?;
            self.indented_block(&branch.body)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Statement) -> Result {
        match stmt {
            Statement::BeginEnd {
                declarations,
                body,
                handlers,
            } => {
                if self.has_declarations(declarations) {
                    self.writer().line("DECLARE")?;
                    self.writer().indent();
                    self.declarations(declarations)?;
                    self.writer().dedent();
                }
                self.writer().line("BEGIN")?;
                self.body_and_handlers(body, handlers)?;
                self.writer().line("END;")
            }
            Statement::IfElse {
                branches,
                else_body,
            } => {
                self.guarded_arms("IF", branches)?;
                if !else_body.is_empty() {
                    self.writer().line("ELSE")?;
                    self.indented_block(else_body)?;
                }
                self.writer().line("END IF;")
            }
            Statement::CaseWhen {
                selector,
                branches,
                else_body,
            } => {
                match selector {
                    Some(selector) => {
                        let selector = self.expression(selector);
                        self.writer().line(&format!("CASE {}", selector))?;
                    }
                    None => self.writer().line("CASE")?,
                }
                self.writer().indent();
                for branch in branches {
                    let condition = self.expression(&branch.condition);
                    self.writer().line(&format!("WHEN {} THEN", condition))?;
                    self.indented_block(&branch.body)?;
                }
                if !else_body.is_empty() {
                    self.writer().line("ELSE")?;
                    self.indented_block(else_body)?;
                }
                self.writer().dedent();
                self.writer().line("END CASE;")
            }
            Statement::ForLoop {
                loop_var,
                reverse,
                query,
                body,
            } => {
                let range = self.for_range(loop_var, *reverse, query);
                self.writer().line(&format!("FOR {} LOOP", range))?;
                self.indented_block(body)?;
                self.writer().line("END LOOP;")
            }
            Statement::WhileLoop { condition, body } => {
                let condition = self.expression(condition);
                self.writer().line(&format!("WHILE {} LOOP", condition))?;
                self.indented_block(body)?;
                self.writer().line("END LOOP;")
            }
            Statement::Loop { body } => {
                self.writer().line("LOOP")?;
                self.indented_block(body)?;
                self.writer().line("END LOOP;")
            }
            Statement::Exit { condition: None } => self.writer().line("EXIT;"),
            Statement::Exit {
                condition: Some(condition),
            } => {
                let condition = self.expression(condition);
                self.writer().line(&format!("EXIT WHEN {};", condition))
            }
            Statement::Label { name } => self.writer().line(&format!("<<{}>>", name)),
            _ => self.leaf(stmt),
        }
    }
}

/// `FOR` loop over a numeric range (`1..10`) rather than a query or cursor.
pub fn is_numeric_range(query: &str) -> bool {
    crate::parser::lexer::tokenize(query)
        .map(|tokens| {
            let mut depth = 0usize;
            tokens.iter().any(|t| {
                if t.is_symbol("(") {
                    depth += 1;
                } else if t.is_symbol(")") {
                    depth = depth.saturating_sub(1);
                }
                depth == 0 && t.is_symbol("..")
            })
        })
        .unwrap_or(false)
}
