//! `CREATE TRIGGER` header and `DECLARE` section.

use super::Parser;
use super::lexer::{self, Token, TokenKind};
use crate::ast::*;
use crate::diagnostics::Component;
use crate::error::{TriggerError, TriggerResult};

impl Parser<'_> {
    /// Consume everything from `CREATE` up to `DECLARE`/`BEGIN`.
    pub(super) fn parse_header(&mut self) -> TriggerResult<TriggerHeader> {
        let opened_at = self.line();
        let tokens = self.scan_until(
            |t| t.is_word("DECLARE") || t.is_word("BEGIN"),
            "trigger header: missing DECLARE or BEGIN",
            opened_at,
        )?;

        let position = |kw: &str| tokens.iter().position(|t| t.is_word(kw));
        let Some(trigger_at) = position("TRIGGER") else {
            return Err(TriggerError::parse(
                opened_at,
                "expected CREATE [OR REPLACE] TRIGGER",
            ));
        };
        if position("COMPOUND").is_some() {
            return Err(TriggerError::parse(
                opened_at,
                "compound triggers are not supported",
            ));
        }

        let name = tokens
            .get(trigger_at + 1)
            .map(|t| t.text.clone())
            .ok_or_else(|| TriggerError::parse(opened_at, "missing trigger name"))?;

        let timing = if position("INSTEAD").is_some() {
            "INSTEAD OF".to_string()
        } else if position("AFTER").is_some() {
            "AFTER".to_string()
        } else {
            "BEFORE".to_string()
        };

        let on_at = position("ON");
        let event_tokens = tokens
            .get(trigger_at + 2..on_at.unwrap_or(tokens.len()))
            .unwrap_or(&[]);
        let mut events = Vec::new();
        for tok in event_tokens {
            if let Some(op) = Operation::from_keyword(&tok.text) {
                if tok.kind == TokenKind::Word && !events.contains(&op) {
                    events.push(op);
                }
            }
        }

        let table = on_at
            .and_then(|i| tokens.get(i + 1))
            .map(|t| t.text.clone())
            .unwrap_or_default();

        let for_each_row = tokens
            .windows(3)
            .any(|w| w[0].is_word("FOR") && w[1].is_word("EACH") && w[2].is_word("ROW"));

        Ok(TriggerHeader {
            name,
            timing,
            events,
            table,
            for_each_row,
            raw: lexer::render(&tokens),
        })
    }

    /// Parse declaration items up to, not including, `BEGIN`.
    pub(super) fn parse_declarations(&mut self) -> TriggerResult<Declarations> {
        let opened_at = self.line();
        let mut decls = Declarations::default();

        loop {
            let Some(tok) = self.peek() else {
                return Err(TriggerError::parse(
                    opened_at,
                    "unterminated DECLARE section: missing BEGIN",
                ));
            };
            if tok.is_word("BEGIN") {
                break;
            }
            if tok.is_word("FUNCTION") || tok.is_word("PROCEDURE") {
                let raw = self.parse_subprogram()?;
                decls.other.push(raw);
                continue;
            }

            let line = tok.line;
            let item = self.until_semicolon("declaration: missing ';'")?;
            self.declaration_item(&mut decls, &item, line);
        }

        Ok(decls)
    }

    fn declaration_item(&mut self, decls: &mut Declarations, item: &[Token], line: usize) {
        let Some(first) = item.first() else {
            return;
        };
        let raw = lexer::render(item);

        if first.is_word("PRAGMA") {
            self.pragma(decls, item, raw, line);
            return;
        }
        if first.is_word("TYPE") || first.is_word("SUBTYPE") {
            decls.other.push(raw);
            return;
        }
        if first.is_word("CURSOR") {
            let is_at = item.iter().position(|t| t.is_word("IS"));
            match (item.get(1), is_at) {
                (Some(name), Some(2)) => {
                    let cursor = Cursor {
                        name: name.text.clone(),
                        query: lexer::render(&item[3..]),
                    };
                    self.insert_checked(decls.insert_cursor(cursor), &name.text, line);
                }
                _ => {
                    self.diags.warn_at(
                        Component::Parser,
                        line,
                        format!("parameterised cursor kept as raw text: '{}'", raw),
                    );
                    decls.other.push(raw);
                }
            }
            return;
        }

        if !matches!(first.kind, TokenKind::Word | TokenKind::Quoted) || item.len() < 2 {
            self.diags.warn_at(
                Component::Parser,
                line,
                format!("unrecognised declaration kept as raw text: '{}'", raw),
            );
            decls.other.push(raw);
            return;
        }

        let name = first.text.clone();
        if item.len() == 2 && item[1].is_word("EXCEPTION") {
            let exc = ExceptionDecl {
                name: name.clone(),
                error_code: None,
            };
            self.insert_checked(decls.insert_exception(exc), &name, line);
            return;
        }

        let is_constant = item[1].is_word("CONSTANT");
        let rest = if is_constant { &item[2..] } else { &item[1..] };
        let init_at = rest
            .iter()
            .position(|t| t.is_symbol(":=") || t.is_word("DEFAULT"));
        let (type_part, init) = match init_at {
            Some(i) => (&rest[..i], Some(lexer::render(&rest[i + 1..]))),
            None => (rest, None),
        };
        let not_null = type_part.len() >= 2
            && type_part[type_part.len() - 2].is_word("NOT")
            && type_part[type_part.len() - 1].is_word("NULL");
        let type_part = if not_null {
            &type_part[..type_part.len() - 2]
        } else {
            type_part
        };
        let oracle_type = lexer::render(type_part);

        if is_constant {
            match init {
                Some(value_expr) => {
                    let constant = Constant {
                        name: name.clone(),
                        oracle_type,
                        value_expr,
                    };
                    self.insert_checked(decls.insert_constant(constant), &name, line);
                }
                None => {
                    self.diags.warn_at(
                        Component::Parser,
                        line,
                        format!("constant '{}' has no value; kept as raw text", name),
                    );
                    decls.other.push(raw);
                }
            }
        } else {
            let var = Variable {
                name: name.clone(),
                oracle_type,
                not_null,
                default_expr: init,
            };
            self.insert_checked(decls.insert_variable(var), &name, line);
        }
    }

    fn pragma(&mut self, decls: &mut Declarations, item: &[Token], raw: String, line: usize) {
        // PRAGMA EXCEPTION_INIT ( name , [-] code )
        let is_init = item.get(1).is_some_and(|t| t.is_word("EXCEPTION_INIT"));
        if is_init && item.len() >= 7 {
            let name = &item[3].text;
            let code_text = lexer::render(&item[5..item.len() - 1]).replace(' ', "");
            if let (Ok(code), Some(exc)) = (code_text.parse::<i64>(), decls.exception_mut(name)) {
                exc.error_code = Some(code);
                return;
            }
            self.diags.warn_at(
                Component::Parser,
                line,
                format!("EXCEPTION_INIT for undeclared exception '{}'", name),
            );
        }
        decls.other.push(raw);
    }

    fn insert_checked(&mut self, inserted: bool, name: &str, line: usize) {
        if !inserted {
            self.diags.warn_at(
                Component::Parser,
                line,
                format!(
                    "duplicate declaration of '{}' ignored; the first declaration wins",
                    name
                ),
            );
        }
    }

    /// Nested `FUNCTION`/`PROCEDURE`: parsed for structure, kept as raw text.
    fn parse_subprogram(&mut self) -> TriggerResult<String> {
        let start = self.pos;
        let line = self.line();
        let name = self
            .peek_at(1)
            .map(|t| t.text.clone())
            .unwrap_or_default();

        let head = self.scan_until(
            |t| t.is_word("IS") || t.is_word("AS") || t.is_symbol(";"),
            "subprogram declaration",
            line,
        )?;
        if self.at_symbol(";") {
            self.bump();
            return Ok(lexer::render(&head));
        }
        self.bump();
        let _locals = self.parse_declarations()?;
        let _block = self.parse_block(Declarations::default())?;

        self.diags.warn_at(
            Component::Parser,
            line,
            format!("nested subprogram '{}' kept as raw text", name),
        );
        let mut tokens = &self.tokens[start..self.pos];
        if tokens.last().is_some_and(|t| t.is_symbol(";")) {
            tokens = &tokens[..tokens.len() - 1];
        }
        Ok(lexer::render(tokens))
    }
}
