//! PostgreSQL `DO $$ … $$;` generation from a specialized trigger.

use std::fmt::Result;
use std::sync::Arc;

use super::rewrite;
use super::{BlockGenerator, GenerateOptions, Writer, is_numeric_range};
use crate::ast::*;
use crate::diagnostics::{Component, Diagnostics};
use crate::mapping::MappingTables;
use crate::parser::{is_builtin_exception, lexer};

/// SQLSTATE class raised by `RAISE EXCEPTION` without `USING ERRCODE`.
const USER_CONDITION: &str = "raise_exception";

/// Error code a declared exception is raised and caught with.
#[derive(Debug, Clone, PartialEq)]
enum ErrCode {
    /// PostgreSQL condition name for a bound Oracle error code.
    Condition(&'static str),
    /// Five-character SQLSTATE: `UAnnn` for application codes `-20nnn`,
    /// `UEnnn` for the n-th unbound exception.
    State(String),
}

impl ErrCode {
    fn using(&self) -> String {
        match self {
            ErrCode::Condition(name) => format!("USING ERRCODE = '{}'", name),
            ErrCode::State(state) => format!("USING ERRCODE = '{}'", state),
        }
    }

    fn handler(&self) -> String {
        match self {
            ErrCode::Condition(name) => name.to_string(),
            ErrCode::State(state) => format!("SQLSTATE '{}'", state),
        }
    }
}

struct UserException {
    name: String,
    error_code: Option<i64>,
    errcode: ErrCode,
}

pub struct PostgresGenerator<'a> {
    tables: &'a MappingTables,
    options: &'a GenerateOptions,
    diags: &'a mut Diagnostics,
    writer: Writer,
    /// Exceptions declared anywhere in the trigger, first declaration wins.
    exceptions: Vec<UserException>,
}

/// Render one specialized trigger as a PostgreSQL `DO` block.
pub fn to_postgres(
    trigger: &Trigger,
    tables: &MappingTables,
    options: &GenerateOptions,
    diags: &mut Diagnostics,
) -> String {
    let mut generator = PostgresGenerator::new(trigger, tables, options, diags);
    if generator.trigger(trigger).is_err() {
        generator
            .diags
            .error(Component::Generator, "failed to write generated text");
    }
    generator.writer.finish()
}

/// Variables of query `FOR` loops; PL/pgSQL needs them declared.
fn loop_records(body: &[Arc<Statement>], out: &mut Vec<String>) {
    for stmt in body {
        if let Statement::ForLoop {
            loop_var, query, ..
        } = stmt.as_ref()
        {
            let known = out.iter().any(|v| v.eq_ignore_ascii_case(loop_var));
            if !known && !is_numeric_range(query) {
                out.push(loop_var.clone());
            }
        }
        for block in stmt.blocks() {
            loop_records(block, out);
        }
    }
}

/// Exception declarations of the trigger and of every nested block.
fn declared_exceptions<'t>(trigger: &'t Trigger, out: &mut Vec<&'t ExceptionDecl>) {
    fn walk<'t>(block: &'t [Arc<Statement>], out: &mut Vec<&'t ExceptionDecl>) {
        for stmt in block {
            if let Statement::BeginEnd { declarations, .. } = stmt.as_ref() {
                out.extend(declarations.exceptions.iter());
            }
            for nested in stmt.blocks() {
                walk(nested, out);
            }
        }
    }
    out.extend(trigger.declarations.exceptions.iter());
    walk(trigger.body(), out);
    for handler in trigger.handlers() {
        walk(&handler.body, out);
    }
}

fn assign_errcodes(trigger: &Trigger, tables: &MappingTables) -> Vec<UserException> {
    let mut decls = Vec::new();
    declared_exceptions(trigger, &mut decls);

    let mut out: Vec<UserException> = Vec::new();
    let mut unbound = 0;
    for decl in decls {
        if out.iter().any(|e| e.name.eq_ignore_ascii_case(&decl.name)) {
            continue;
        }
        let errcode = match decl.error_code {
            Some(code) if (-20999..=-20000).contains(&code) => {
                ErrCode::State(format!("UA{:03}", -code - 20000))
            }
            Some(code) => match tables.condition_for_code(code) {
                Some(condition) => ErrCode::Condition(condition),
                None => {
                    unbound += 1;
                    ErrCode::State(format!("UE{:03}", unbound))
                }
            },
            None => {
                unbound += 1;
                ErrCode::State(format!("UE{:03}", unbound))
            }
        };
        out.push(UserException {
            name: decl.name.clone(),
            error_code: decl.error_code,
            errcode,
        });
    }
    out
}

/// `'text'` literal usable as a `RAISE` format string.
fn format_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''").replace('%', "%%"))
}

/// A single Oracle string literal, unquoted.
fn literal_text(expr: &str) -> Option<String> {
    let tokens = lexer::tokenize(expr).ok()?;
    match tokens.as_slice() {
        [tok] if tok.kind == lexer::TokenKind::Str => lexer::string_value(&tok.text),
        _ => None,
    }
}

/// `(SELECT …)` → `SELECT …` for `FOR … IN` queries.
fn strip_query_parens(query: &str) -> &str {
    let trimmed = query.trim();
    let Some(inner) = trimmed
        .strip_prefix('(')
        .and_then(|q| q.strip_suffix(')'))
    else {
        return trimmed;
    };
    let upper = inner.trim_start().to_ascii_uppercase();
    let is_query = upper.starts_with("SELECT") || upper.starts_with("WITH");
    // The outer pair must enclose the whole text.
    let mut depth = 0i32;
    let balanced = inner.chars().all(|c| {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        depth >= 0
    });
    if is_query && balanced {
        inner.trim()
    } else {
        trimmed
    }
}

impl<'a> PostgresGenerator<'a> {
    pub fn new(
        trigger: &Trigger,
        tables: &'a MappingTables,
        options: &'a GenerateOptions,
        diags: &'a mut Diagnostics,
    ) -> Self {
        Self {
            tables,
            options,
            diags,
            writer: Writer::new(options.indent),
            exceptions: assign_errcodes(trigger, tables),
        }
    }

    fn trigger(&mut self, trigger: &Trigger) -> Result {
        let mut records = Vec::new();
        loop_records(trigger.body(), &mut records);
        for handler in trigger.handlers() {
            loop_records(&handler.body, &mut records);
        }
        records.retain(|name| !trigger.declarations.contains(name));

        self.writer.line("DO $$")?;
        if self.has_declarations(&trigger.declarations) || !records.is_empty() {
            self.writer.line("DECLARE")?;
            self.writer.indent();
            self.declarations(&trigger.declarations)?;
            for name in &records {
                self.writer.line(&format!("{} RECORD;", name))?;
            }
            self.writer.dedent();
        }
        self.writer.line("BEGIN")?;
        self.body_and_handlers(trigger.body(), trigger.handlers())?;
        self.writer.line("END $$;")
    }

    fn rewrite(&mut self, text: &str) -> String {
        rewrite::rewrite(text, self.tables, self.diags)
    }

    fn placeholder(&mut self, what: &str, text: &str) -> Result {
        self.diags.error(
            Component::Generator,
            format!("{} is not supported in PL/pgSQL: '{}'", what, text),
        );
        self.writer.line(&format!("-- UNSUPPORTED {}: {}", what, text))
    }

    fn user_exception(&self, name: &str) -> Option<&UserException> {
        self.exceptions
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// `RAISE name`: a declared exception carries its own error code, a
    /// predefined one the code of its PostgreSQL condition.
    fn raise(&mut self, name: &str) -> Result {
        let message = self
            .tables
            .exception_message(name)
            .unwrap_or(name)
            .to_string();
        let mut line = format!("RAISE EXCEPTION {}", format_literal(&message));
        let mut code = None;
        match self.user_exception(name) {
            Some(exc) => {
                line.push(' ');
                line.push_str(&exc.errcode.using());
                code = exc.error_code;
            }
            None => {
                let condition = self
                    .tables
                    .condition_name(name)
                    .filter(|c| !c.eq_ignore_ascii_case("OTHERS"));
                if let Some(condition) = condition {
                    line.push(' ');
                    line.push_str(&ErrCode::Condition(condition).using());
                }
            }
        }
        line.push(';');
        if self.options.retain_error_code {
            if let Some(code) = code {
                line.push_str(&format!(" -- error code {}", code));
            }
        }
        self.writer.line(&line)
    }

    fn raise_application_error(&mut self, args: &[String]) -> Result {
        let Some(message) = args.get(1) else {
            return self.placeholder("RAISE_APPLICATION_ERROR without message", &args.join(", "));
        };
        let mut line = match literal_text(message) {
            Some(text) => format!("RAISE EXCEPTION {}", format_literal(&text)),
            None => {
                let expr = self.rewrite(message);
                format!("RAISE EXCEPTION '%', {}", expr)
            }
        };
        // A declared exception bound to this code must be able to catch it.
        let code = args
            .first()
            .and_then(|c| c.replace(' ', "").parse::<i64>().ok());
        let bound = self
            .exceptions
            .iter()
            .find(|e| e.error_code.is_some() && e.error_code == code);
        if let Some(exc) = bound {
            line.push(' ');
            line.push_str(&exc.errcode.using());
        }
        line.push(';');
        if self.options.retain_error_code {
            if let Some(code) = args.first() {
                line.push_str(&format!(" -- error code {}", code));
            }
        }
        self.writer.line(&line)
    }

    fn call(&mut self, target: &str, args: &[String]) -> Result {
        if target.eq_ignore_ascii_case("RAISE_APPLICATION_ERROR") {
            return self.raise_application_error(args);
        }
        if target.eq_ignore_ascii_case("DBMS_OUTPUT.PUT_LINE") {
            let value = args.first().map(String::as_str).unwrap_or("''");
            let value = self.rewrite(value);
            return self.writer.line(&format!("RAISE NOTICE '%', {};", value));
        }
        let call = self.rewrite(&format!("{}({})", target, args.join(", ")));
        self.writer.line(&format!("PERFORM {};", call))
    }
}

impl BlockGenerator for PostgresGenerator<'_> {
    fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    fn expression(&mut self, text: &str) -> String {
        self.rewrite(text)
    }

    fn for_range(&mut self, loop_var: &str, reverse: bool, query: &str) -> String {
        let source = if is_numeric_range(query) {
            self.rewrite(query)
        } else {
            let query = strip_query_parens(query).to_string();
            self.rewrite(&query)
        };
        if reverse {
            format!("{} IN REVERSE {}", loop_var, source)
        } else {
            format!("{} IN {}", loop_var, source)
        }
    }

    fn has_declarations(&self, decls: &Declarations) -> bool {
        // Exceptions have no PL/pgSQL declaration.
        !(decls.other.is_empty()
            && decls.constants.is_empty()
            && decls.variables.is_empty()
            && decls.cursors.is_empty())
    }

    fn declarations(&mut self, decls: &Declarations) -> Result {
        for raw in &decls.other {
            self.placeholder("declaration", raw)?;
        }
        for constant in &decls.constants {
            let pg_type = self.tables.map_type(&constant.oracle_type, self.diags);
            let value = self.rewrite(&constant.value_expr);
            self.writer.line(&format!(
                "{} CONSTANT {} := {};",
                constant.name, pg_type, value
            ))?;
        }
        for var in &decls.variables {
            let pg_type = self.tables.map_type(&var.oracle_type, self.diags);
            let mut line = format!("{} {}", var.name, pg_type);
            if var.not_null {
                line.push_str(" NOT NULL");
            }
            if let Some(default) = &var.default_expr {
                let value = self.rewrite(default);
                line.push_str(" := ");
                line.push_str(&value);
            }
            line.push(';');
            self.writer.line(&line)?;
        }
        for cursor in &decls.cursors {
            let query = self.rewrite(&cursor.query);
            self.writer
                .line(&format!("{} CURSOR FOR {};", cursor.name, query))?;
        }
        Ok(())
    }

    fn handler_condition(&mut self, name: &str) -> String {
        if let Some(condition) = self.tables.condition_name(name) {
            return condition.to_string();
        }
        if let Some(exc) = self.user_exception(name) {
            return exc.errcode.handler();
        }
        if !is_builtin_exception(name) {
            return USER_CONDITION.to_string();
        }
        self.diags.warn(
            Component::Generator,
            format!(
                "no PostgreSQL condition for '{}'; handler widened to OTHERS",
                name
            ),
        );
        "OTHERS".to_string()
    }

    fn shadowed_handler(&mut self, name: &str, condition: &str) {
        self.diags.error(
            Component::Generator,
            format!(
                "handler for '{}' is unreachable: an earlier handler already catches {}",
                name, condition
            ),
        );
    }

    fn leaf(&mut self, stmt: &Statement) -> Result {
        match stmt {
            Statement::Sql { raw, .. } => {
                let sql = self.rewrite(raw);
                self.writer.line(&format!("{};", sql))
            }
            Statement::Raise {
                exception_name: Some(name),
            } => self.raise(name),
            Statement::Raise {
                exception_name: None,
            } => self.writer.line("RAISE;"),
            Statement::FunctionCall { target, args } => self.call(target, args),
            Statement::Goto { label } => self.placeholder("GOTO", label),
            Statement::Unknown { raw } if raw.eq_ignore_ascii_case("NULL") => {
                self.writer.line("NULL;")
            }
            Statement::Unknown { raw } => {
                let text = self.rewrite(raw);
                self.writer.line(&format!("{};", text))
            }
            other => self.statement(other),
        }
    }
}
