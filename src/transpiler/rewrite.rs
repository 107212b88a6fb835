//! Token-level rewriting of Oracle expressions and SQL bodies into
//! PostgreSQL spelling.
//!
//! Rules, applied in one left-to-right pass:
//!
//! - `:NEW.col` / `:OLD.col` → `:new_col` / `:old_col`
//! - calls go through the function table (exact-call override, then
//!   `NAME/arity`, then `NAME`); unmapped calls are kept with a warning
//! - bare pseudo columns (`SYSDATE`, `USER`, …) go through the function table
//! - `seq.NEXTVAL` / `seq.CURRVAL` → `nextval('seq')` / `currval('seq')`
//! - `FROM DUAL` is dropped
//! - `q'[…]'` literals → standard quoting
//! - leftover `INSERTING`/`UPDATING`/`DELETING` test `TG_OP`, with a
//!   warning; specialized trees have none left
//! - `ROWNUM` is kept and the text is marked for manual rewrite

use crate::ast::Operation;
use crate::diagnostics::{Component, Diagnostics};
use crate::mapping::{MappingTables, apply_template};
use crate::parser::lexer::{self, Token, TokenKind};

pub const ROWNUM_MARKER: &str = "/* MANUAL REWRITE REQUIRED: ROWNUM */";

/// Rewrite one expression or SQL body.
pub fn rewrite(text: &str, tables: &MappingTables, diags: &mut Diagnostics) -> String {
    let tokens = match lexer::tokenize(text) {
        Ok(tokens) => tokens,
        Err(e) => {
            diags.error(
                Component::Generator,
                format!("cannot rewrite '{}': {}; kept verbatim", text, e),
            );
            return text.to_string();
        }
    };

    let mut rewriter = Rewriter { tables, diags };
    let out = lexer::render(&rewriter.tokens(&tokens));
    if tokens.iter().any(|t| t.is_word("ROWNUM")) {
        rewriter.diags.warn(
            Component::Generator,
            format!("ROWNUM has no PostgreSQL equivalent: '{}'", text),
        );
        return format!("{} {}", ROWNUM_MARKER, out);
    }
    out
}

/// `:NEW.col` → `:new_col`. Other host references are unchanged.
pub fn bind_name(text: &str) -> Option<String> {
    let (record, column) = text.strip_prefix(':')?.split_once('.')?;
    let record = record.to_ascii_lowercase();
    if record != "new" && record != "old" {
        return None;
    }
    Some(format!(":{}_{}", record, column.trim_matches('"').to_ascii_lowercase()))
}

fn word(text: impl Into<String>) -> Token {
    Token {
        kind: TokenKind::Word,
        text: text.into(),
        line: 1,
    }
}

fn symbol(text: &str) -> Token {
    Token {
        kind: TokenKind::Symbol,
        text: text.to_string(),
        line: 1,
    }
}

/// Tokens of generated text; falls back to one opaque word.
fn retokenize(text: &str) -> Vec<Token> {
    lexer::tokenize(text).unwrap_or_else(|_| vec![word(text)])
}

fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        if tok.is_symbol("(") {
            depth += 1;
        } else if tok.is_symbol(")") {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn split_args(tokens: &[Token]) -> Vec<&[Token]> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_symbol("(") {
            depth += 1;
        } else if tok.is_symbol(")") {
            depth = depth.saturating_sub(1);
        } else if tok.is_symbol(",") && depth == 0 {
            args.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    if start < tokens.len() {
        args.push(&tokens[start..]);
    }
    args
}

fn sequence_call(text: &str) -> Option<String> {
    let (seq, pseudo) = text.rsplit_once('.')?;
    let function = if pseudo.eq_ignore_ascii_case("NEXTVAL") {
        "nextval"
    } else if pseudo.eq_ignore_ascii_case("CURRVAL") {
        "currval"
    } else {
        return None;
    };
    Some(format!("{}('{}')", function, seq))
}

fn tg_op(op: Operation) -> Vec<Token> {
    vec![
        word("TG_OP"),
        symbol("="),
        Token {
            kind: TokenKind::Str,
            text: format!("'{}'", op.keyword()),
            line: 1,
        },
    ]
}

/// `q'[it's]'` → `'it''s'`. Other literal forms are valid as written.
fn postgres_literal(tok: &Token) -> Token {
    let alternative = tok.text.trim_start_matches(['n', 'N']).starts_with(['q', 'Q']);
    match lexer::string_value(&tok.text).filter(|_| alternative) {
        Some(value) => Token {
            kind: TokenKind::Str,
            text: format!("'{}'", value.replace('\'', "''")),
            line: tok.line,
        },
        None => tok.clone(),
    }
}

struct Rewriter<'a> {
    tables: &'a MappingTables,
    diags: &'a mut Diagnostics,
}

impl Rewriter<'_> {
    fn tokens(&mut self, tokens: &[Token]) -> Vec<Token> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let tok = &tokens[i];
            let prev = i.checked_sub(1).map(|j| &tokens[j]);

            if tok.kind == TokenKind::Bind {
                out.push(match bind_name(&tok.text) {
                    Some(name) => Token {
                        kind: TokenKind::Bind,
                        text: name,
                        line: tok.line,
                    },
                    None => tok.clone(),
                });
                i += 1;
                continue;
            }

            if tok.kind == TokenKind::Str {
                out.push(postgres_literal(tok));
                i += 1;
                continue;
            }

            if tok.kind != TokenKind::Word {
                out.push(tok.clone());
                i += 1;
                continue;
            }

            if tok.is_word("FROM") && tokens.get(i + 1).is_some_and(|t| t.is_word("DUAL")) {
                i += 2;
                continue;
            }

            let is_call = tokens.get(i + 1).is_some_and(|t| t.is_symbol("("))
                && !tok.is_keyword()
                && !prev.is_some_and(|p| p.is_word("INTO") || p.is_word("AS"));
            if is_call {
                if let Some(close) = matching_paren(tokens, i + 1) {
                    out.extend(self.call(&tokens[i..=close]));
                    i = close + 1;
                    continue;
                }
            }

            out.extend(self.word(tok));
            i += 1;
        }
        out
    }

    fn word(&mut self, tok: &Token) -> Vec<Token> {
        if let Some(op) = Operation::from_predicate(&tok.text) {
            self.diags.warn(
                Component::Generator,
                format!(
                    "unresolved {} predicate; TG_OP only exists inside trigger functions",
                    tok.text
                ),
            );
            return tg_op(op);
        }
        if let Some(call) = sequence_call(&tok.text) {
            return retokenize(&call);
        }
        match self.tables.pseudo_column(&tok.text) {
            Some(replacement) => retokenize(replacement),
            None => vec![tok.clone()],
        }
    }

    /// `tokens` spans `name ( … )`.
    fn call(&mut self, tokens: &[Token]) -> Vec<Token> {
        let name = &tokens[0].text;
        let inner = &tokens[2..tokens.len() - 1];

        if tokens[0].is_word("UPDATING") && inner.len() == 1 && inner[0].kind == TokenKind::Str {
            let column = inner[0].text.trim_matches('\'').to_ascii_lowercase();
            return retokenize(&format!(
                "(:new_{0} IS DISTINCT FROM :old_{0})",
                column
            ));
        }

        let original = lexer::render(tokens);
        if let Some(replacement) = self.tables.call_override(&original) {
            return retokenize(replacement);
        }

        let args: Vec<String> = split_args(inner)
            .into_iter()
            .map(|arg| lexer::render(&self.tokens(arg)))
            .collect();

        match self.tables.function(name, args.len()) {
            Some(template) => match apply_template(name, template, &args) {
                Some(text) => retokenize(&text),
                None => {
                    self.diags.warn(
                        Component::Mapping,
                        format!(
                            "mapping for '{}' does not fit {} argument(s); call kept",
                            name,
                            args.len()
                        ),
                    );
                    self.verbatim(name, &args)
                }
            },
            None => {
                self.diags.warn(
                    Component::Mapping,
                    format!("unmapped function '{}' passed through", name),
                );
                self.verbatim(name, &args)
            }
        }
    }

    fn verbatim(&self, name: &str, args: &[String]) -> Vec<Token> {
        retokenize(&format!("{}({})", name, args.join(", ")))
    }
}
