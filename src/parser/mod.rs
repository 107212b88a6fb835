//! Recursive-descent parser for Oracle trigger bodies.
//!
//! # Accepted shape
//!
//! ```text
//! [CREATE [OR REPLACE] TRIGGER name BEFORE|AFTER ev [OR ev] ON table [FOR EACH ROW]]
//! [DECLARE
//!     declarations]
//! BEGIN
//!     statements
//! [EXCEPTION
//!     WHEN name [OR name] THEN statements ...]
//! END [label];
//! [/]
//! ```
//!
//! Keywords are matched case-insensitively. Statements the grammar does not
//! model are kept verbatim as [`Statement::Unknown`]. Only structural
//! failures (an unterminated block, a misplaced block keyword) are fatal.

mod declarations;
pub mod lexer;
mod statements;


use std::sync::Arc;

use crate::ast::*;
use crate::diagnostics::{Component, Diagnostics};
use crate::error::{TriggerError, TriggerResult};
use lexer::{Token, TokenKind};

/// Exceptions Oracle predefines in package STANDARD.
pub const BUILTIN_EXCEPTIONS: &[&str] = &[
    "OTHERS",
    "ACCESS_INTO_NULL",
    "CASE_NOT_FOUND",
    "COLLECTION_IS_NULL",
    "CURSOR_ALREADY_OPEN",
    "DUP_VAL_ON_INDEX",
    "INVALID_CURSOR",
    "INVALID_NUMBER",
    "LOGIN_DENIED",
    "NO_DATA_FOUND",
    "NOT_LOGGED_ON",
    "PROGRAM_ERROR",
    "ROWTYPE_MISMATCH",
    "STORAGE_ERROR",
    "SUBSCRIPT_BEYOND_COUNT",
    "SUBSCRIPT_OUTSIDE_LIMIT",
    "SYS_INVALID_ROWID",
    "TIMEOUT_ON_RESOURCE",
    "TOO_MANY_ROWS",
    "VALUE_ERROR",
    "ZERO_DIVIDE",
];

pub fn is_builtin_exception(name: &str) -> bool {
    BUILTIN_EXCEPTIONS
        .iter()
        .any(|b| b.eq_ignore_ascii_case(name))
}

/// Parse one trigger, discarding diagnostics.
pub fn parse(source: &str) -> TriggerResult<Trigger> {
    let mut diags = Diagnostics::new();
    parse_with(source, &mut diags)
}

/// Parse one trigger, reporting recoverable problems to `diags`.
pub fn parse_with(source: &str, diags: &mut Diagnostics) -> TriggerResult<Trigger> {
    let tokens = lexer::tokenize(source)?;
    if tokens.is_empty() {
        return Err(TriggerError::parse(1, "empty trigger text"));
    }
    let mut parser = Parser::new(tokens, diags);
    let trigger = parser.parse_trigger()?;
    tracing::debug!(
        statements = trigger.body().len(),
        max_depth = parser.max_depth,
        "parsed trigger"
    );
    Ok(trigger)
}

pub(crate) struct Parser<'d> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
    /// Exception names declared by each enclosing block.
    scopes: Vec<Vec<String>>,
    diags: &'d mut Diagnostics,
}

impl<'d> Parser<'d> {
    fn new(tokens: Vec<Token>, diags: &'d mut Diagnostics) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            max_depth: 0,
            scopes: Vec::new(),
            diags,
        }
    }

    fn parse_trigger(&mut self) -> TriggerResult<Trigger> {
        let header = if self.at_word("CREATE") {
            Some(self.parse_header()?)
        } else {
            None
        };

        let declarations = if self.at_word("DECLARE") {
            self.bump();
            self.parse_declarations()?
        } else {
            Declarations::default()
        };

        if !self.at_word("BEGIN") {
            return Err(self.unexpected("BEGIN"));
        }
        let block = self.parse_block(declarations)?;
        let main = Statement::BeginEnd {
            declarations: Declarations::default(),
            body: block.body,
            handlers: block.handlers,
        };

        while self.at_symbol("/") {
            self.bump();
        }
        if let Some(tok) = self.peek() {
            let line = tok.line;
            let rest = lexer::render(&self.tokens[self.pos..]);
            self.diags.warn_at(
                Component::Parser,
                line,
                format!("ignoring text after the main block: '{}'", rest),
            );
        }

        Ok(Trigger {
            header,
            declarations: Arc::new(block.declarations),
            main: Arc::new(main),
        })
    }

    // ---- cursor ---------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn at_word(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word(keyword))
    }

    fn at_symbol(&self, symbol: &str) -> bool {
        self.peek().is_some_and(|t| t.is_symbol(symbol))
    }

    /// Line of the current token, or of the last token at end of input.
    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn unexpected(&self, expected: &str) -> TriggerError {
        match self.peek() {
            Some(tok) => TriggerError::parse(
                tok.line,
                format!("expected {}, found '{}'", expected, tok.text),
            ),
            None => TriggerError::parse(
                self.line(),
                format!("unexpected end of input, expected {}", expected),
            ),
        }
    }

    fn expect_word(&mut self, keyword: &str) -> TriggerResult<Token> {
        if !self.at_word(keyword) {
            return Err(self.unexpected(keyword));
        }
        self.bump().ok_or_else(|| self.unexpected(keyword))
    }

    fn expect_symbol(&mut self, symbol: &str) -> TriggerResult<Token> {
        let expected = format!("'{}'", symbol);
        if !self.at_symbol(symbol) {
            return Err(self.unexpected(&expected));
        }
        self.bump().ok_or_else(|| self.unexpected(&expected))
    }

    fn expect_name(&mut self, what: &str) -> TriggerResult<Token> {
        let is_name = self
            .peek()
            .is_some_and(|t| matches!(t.kind, TokenKind::Word | TokenKind::Quoted));
        if !is_name {
            return Err(self.unexpected(what));
        }
        self.bump().ok_or_else(|| self.unexpected(what))
    }

    /// Collect tokens up to (not including) the first token at nesting
    /// depth zero for which `stop` holds. Parentheses and `CASE … END`
    /// expressions are skipped over.
    fn scan_until(
        &mut self,
        stop: impl Fn(&Token) -> bool,
        context: &str,
        opened_at: usize,
    ) -> TriggerResult<Vec<Token>> {
        let start = self.pos;
        let mut parens = 0usize;
        let mut cases = 0usize;
        loop {
            let Some(tok) = self.peek() else {
                return Err(TriggerError::parse(
                    opened_at,
                    format!("unterminated {}", context),
                ));
            };
            if parens == 0 && cases == 0 && stop(tok) {
                break;
            }
            if tok.is_symbol("(") {
                parens += 1;
            } else if tok.is_symbol(")") {
                parens = parens.saturating_sub(1);
            } else if tok.is_word("CASE") {
                cases += 1;
            } else if tok.is_word("END") && cases > 0 {
                cases -= 1;
            }
            self.pos += 1;
        }
        Ok(self.tokens[start..self.pos].to_vec())
    }

    /// Tokens of one `;`-terminated item; the `;` is consumed.
    fn until_semicolon(&mut self, context: &str) -> TriggerResult<Vec<Token>> {
        let opened_at = self.line();
        let tokens = self.scan_until(|t| t.is_symbol(";"), context, opened_at)?;
        self.bump();
        Ok(tokens)
    }

    fn enter(&mut self) {
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn exception_in_scope(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .flatten()
            .any(|n| n.eq_ignore_ascii_case(name))
    }
}
