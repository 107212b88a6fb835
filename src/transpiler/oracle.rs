//! Canonical Oracle rendering of the IR, used for round-trip checks.

use std::fmt::Result;

use super::{BlockGenerator, Writer};
use crate::ast::*;

pub struct OracleGenerator {
    writer: Writer,
}

impl OracleGenerator {
    pub fn new(indent: usize) -> Self {
        Self {
            writer: Writer::new(indent),
        }
    }

    fn trigger(&mut self, trigger: &Trigger) -> Result {
        if let Some(header) = &trigger.header {
            self.writer.line(&header.raw)?;
        }
        if !trigger.declarations.is_empty() {
            self.writer.line("DECLARE")?;
            self.writer.indent();
            self.declarations(&trigger.declarations)?;
            self.writer.dedent();
        }
        self.writer.line("BEGIN")?;
        self.body_and_handlers(trigger.body(), trigger.handlers())?;
        self.writer.line("END;")
    }
}

/// Render `trigger` as Oracle PL/SQL. Parsing the result yields the same IR.
pub fn to_oracle(trigger: &Trigger) -> String {
    let mut generator = OracleGenerator::new(4);
    // Writing into a String cannot fail.
    let _ = generator.trigger(trigger);
    generator.writer.finish()
}

impl BlockGenerator for OracleGenerator {
    fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    fn expression(&mut self, text: &str) -> String {
        text.to_string()
    }

    fn for_range(&mut self, loop_var: &str, reverse: bool, query: &str) -> String {
        if reverse {
            format!("{} IN REVERSE {}", loop_var, query)
        } else {
            format!("{} IN {}", loop_var, query)
        }
    }

    fn declarations(&mut self, decls: &Declarations) -> Result {
        for var in &decls.variables {
            let mut line = format!("{} {}", var.name, var.oracle_type);
            if var.not_null {
                line.push_str(" NOT NULL");
            }
            if let Some(default) = &var.default_expr {
                line.push_str(" := ");
                line.push_str(default);
            }
            line.push(';');
            self.writer.line(&line)?;
        }
        for constant in &decls.constants {
            self.writer.line(&format!(
                "{} CONSTANT {} := {};",
                constant.name, constant.oracle_type, constant.value_expr
            ))?;
        }
        for exc in &decls.exceptions {
            self.writer.line(&format!("{} EXCEPTION;", exc.name))?;
        }
        for exc in &decls.exceptions {
            if let Some(code) = exc.error_code {
                self.writer
                    .line(&format!("PRAGMA EXCEPTION_INIT({}, {});", exc.name, code))?;
            }
        }
        for cursor in &decls.cursors {
            self.writer
                .line(&format!("CURSOR {} IS {};", cursor.name, cursor.query))?;
        }
        for raw in &decls.other {
            self.writer.line(&format!("{};", raw))?;
        }
        Ok(())
    }

    fn handler_condition(&mut self, name: &str) -> String {
        name.to_string()
    }

    fn leaf(&mut self, stmt: &Statement) -> Result {
        let line = match stmt {
            Statement::Sql { raw, .. } | Statement::Unknown { raw } => format!("{};", raw),
            Statement::Raise {
                exception_name: Some(name),
            } => format!("RAISE {};", name),
            Statement::Raise {
                exception_name: None,
            } => "RAISE;".to_string(),
            Statement::FunctionCall { target, args } if args.is_empty() => format!("{};", target),
            Statement::FunctionCall { target, args } => {
                format!("{}({});", target, args.join(", "))
            }
            Statement::Goto { label } => format!("GOTO {};", label),
            other => {
                return self.statement(other);
            }
        };
        self.writer.line(&line)
    }
}
