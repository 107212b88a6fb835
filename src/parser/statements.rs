//! Statement-level grammar: blocks, conditionals, loops and simple
//! statements.

use std::sync::Arc;

use super::lexer::{self, Token, TokenKind};
use super::{Parser, is_builtin_exception};
use crate::ast::*;
use crate::diagnostics::Component;
use crate::error::{TriggerError, TriggerResult};

/// Leading words of statements kept verbatim as `Unknown`.
const PASSTHROUGH_WORDS: &[&str] = &[
    "NULL", "RETURN", "COMMIT", "ROLLBACK", "SAVEPOINT", "OPEN", "FETCH", "CLOSE", "EXECUTE",
    "LOCK", "MERGE", "PIPE", "CONTINUE", "SET",
];

pub(super) struct ParsedBlock {
    pub declarations: Declarations,
    pub body: Block,
    pub handlers: Vec<ExceptionHandler>,
}

fn is_terminator(tok: &Token) -> bool {
    ["END", "ELSIF", "ELSE", "EXCEPTION", "WHEN"]
        .iter()
        .any(|kw| tok.is_word(kw))
}

/// Split the tokens between a call's parentheses at top-level commas.
fn split_args(tokens: &[Token]) -> Vec<String> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_symbol("(") {
            depth += 1;
        } else if tok.is_symbol(")") {
            depth = depth.saturating_sub(1);
        } else if tok.is_symbol(",") && depth == 0 {
            args.push(lexer::render(&tokens[start..i]));
            start = i + 1;
        }
    }
    if start < tokens.len() {
        args.push(lexer::render(&tokens[start..]));
    }
    args
}

/// Index of the `)` matching the `(` at `open`.
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

fn has_top_level_assignment(tokens: &[Token]) -> bool {
    let mut depth = 0usize;
    for tok in tokens {
        if tok.is_symbol("(") {
            depth += 1;
        } else if tok.is_symbol(")") {
            depth = depth.saturating_sub(1);
        } else if tok.is_symbol(":=") && depth == 0 {
            return true;
        }
    }
    false
}

impl Parser<'_> {
    /// Parse statements until a block keyword (`END`, `ELSIF`, `ELSE`,
    /// `EXCEPTION`, `WHEN`) is reached. The keyword is not consumed.
    pub(super) fn parse_statements(
        &mut self,
        context: &str,
        opened_at: usize,
    ) -> TriggerResult<Block> {
        let mut body = Vec::new();
        loop {
            let Some(tok) = self.peek() else {
                return Err(TriggerError::parse(
                    opened_at,
                    format!(
                        "unterminated {} (nesting depth {}): missing END",
                        context, self.depth
                    ),
                ));
            };
            if is_terminator(tok) {
                break;
            }
            if tok.is_symbol(";") {
                self.bump();
                continue;
            }
            let stmt = self.parse_statement()?;
            body.push(Arc::new(stmt));
        }
        Ok(body)
    }

    fn parse_statement(&mut self) -> TriggerResult<Statement> {
        let Some(tok) = self.peek() else {
            return Err(self.unexpected("statement"));
        };
        if tok.is_symbol("<<") {
            return self.parse_label();
        }
        if tok.kind != TokenKind::Word {
            return self.parse_simple();
        }

        let word = tok.upper();
        match word.as_str() {
            "BEGIN" => {
                let block = self.parse_block(Declarations::default())?;
                Ok(block.into_statement())
            }
            "DECLARE" => {
                self.bump();
                let declarations = self.parse_declarations()?;
                let block = self.parse_block(declarations)?;
                Ok(block.into_statement())
            }
            "IF" => self.parse_if(),
            "CASE" => self.parse_case(),
            "FOR" => self.parse_for(),
            "WHILE" => self.parse_while(),
            "LOOP" => self.parse_loop(),
            "EXIT" => self.parse_exit(),
            "GOTO" => {
                self.bump();
                let label = self.expect_name("label")?.text;
                self.expect_symbol(";")?;
                Ok(Statement::Goto { label })
            }
            "RAISE" => {
                self.bump();
                let tokens = self.until_semicolon("RAISE: missing ';'")?;
                let exception_name = if tokens.is_empty() {
                    None
                } else {
                    Some(lexer::render(&tokens))
                };
                Ok(Statement::Raise { exception_name })
            }
            "SELECT" | "WITH" => self.parse_sql(SqlKind::Select),
            "INSERT" => self.parse_sql(SqlKind::Insert),
            "UPDATE" => self.parse_sql(SqlKind::Update),
            "DELETE" => self.parse_sql(SqlKind::Delete),
            "THEN" | "CONSTANT" | "DEFAULT" => Err(self.unexpected("statement")),
            _ => self.parse_simple(),
        }
    }

    pub(super) fn parse_block(&mut self, declarations: Declarations) -> TriggerResult<ParsedBlock> {
        let opened_at = self.line();
        self.expect_word("BEGIN")?;
        self.enter();
        self.scopes.push(
            declarations
                .exceptions
                .iter()
                .map(|e| e.name.clone())
                .collect(),
        );

        let body = self.parse_statements("BEGIN block", opened_at)?;
        let handlers = if self.at_word("EXCEPTION") {
            self.bump();
            self.parse_handlers(opened_at)?
        } else {
            Vec::new()
        };
        self.expect_end(None, "BEGIN block", opened_at)?;

        self.scopes.pop();
        self.leave();
        Ok(ParsedBlock {
            declarations,
            body,
            handlers,
        })
    }

    fn parse_handlers(&mut self, opened_at: usize) -> TriggerResult<Vec<ExceptionHandler>> {
        let mut handlers = Vec::new();
        while self.at_word("WHEN") {
            let line = self.line();
            self.bump();
            let mut names = vec![self.expect_name("exception name")?.text];
            while self.at_word("OR") {
                self.bump();
                names.push(self.expect_name("exception name")?.text);
            }
            self.expect_word("THEN")?;
            let body = self.parse_statements("exception handler", line)?;

            for name in names {
                if !is_builtin_exception(&name) && !self.exception_in_scope(&name) {
                    self.diags.warn_at(
                        Component::Parser,
                        line,
                        format!("handler for undeclared exception '{}'", name),
                    );
                }
                handlers.push(ExceptionHandler {
                    exception_name: name,
                    body: body.clone(),
                });
            }
        }
        if handlers.is_empty() {
            return Err(TriggerError::parse(
                opened_at,
                "EXCEPTION section without WHEN handlers",
            ));
        }
        Ok(handlers)
    }

    /// `END [closing] [label] ;`. A missing `;` is accepted at end of input
    /// or before a `/` terminator.
    fn expect_end(
        &mut self,
        closing: Option<&str>,
        context: &str,
        opened_at: usize,
    ) -> TriggerResult<()> {
        if self.peek().is_none() {
            return Err(TriggerError::parse(
                opened_at,
                format!("unterminated {}: missing END", context),
            ));
        }
        self.expect_word("END")?;
        if let Some(keyword) = closing {
            self.expect_word(keyword)?;
        }
        let labelled = self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Word && !t.is_keyword());
        if labelled {
            self.bump();
        }
        // `END` may close the script with `/` instead of `;`.
        if self.peek().is_some() && !self.at_symbol("/") {
            self.expect_symbol(";")?;
        }
        Ok(())
    }

    /// Tokens up to `stop`, consuming `stop` itself.
    fn condition(&mut self, stop: &str, context: &str, opened_at: usize) -> TriggerResult<String> {
        let tokens = self.scan_until(|t| t.is_word(stop), context, opened_at)?;
        if tokens.is_empty() {
            return Err(TriggerError::parse(
                self.line(),
                format!("empty condition before {}", stop),
            ));
        }
        self.expect_word(stop)?;
        Ok(lexer::render(&tokens))
    }

    fn parse_if(&mut self) -> TriggerResult<Statement> {
        let opened_at = self.line();
        self.expect_word("IF")?;
        self.enter();

        let mut branches = Vec::new();
        let condition = self.condition("THEN", "IF condition: missing THEN", opened_at)?;
        let body = self.parse_statements("IF", opened_at)?;
        branches.push(Branch { condition, body });

        let mut else_body = Vec::new();
        loop {
            if self.at_word("ELSIF") {
                let line = self.line();
                self.bump();
                let condition = self.condition("THEN", "ELSIF condition: missing THEN", line)?;
                let body = self.parse_statements("ELSIF", opened_at)?;
                branches.push(Branch { condition, body });
            } else if self.at_word("ELSE") {
                self.bump();
                else_body = self.parse_statements("ELSE", opened_at)?;
                break;
            } else {
                break;
            }
        }

        self.expect_end(Some("IF"), "IF", opened_at)?;
        self.leave();
        Ok(Statement::IfElse {
            branches,
            else_body,
        })
    }

    fn parse_case(&mut self) -> TriggerResult<Statement> {
        let opened_at = self.line();
        self.expect_word("CASE")?;
        self.enter();

        let selector = self.scan_until(|t| t.is_word("WHEN"), "CASE: missing WHEN", opened_at)?;
        let selector = if selector.is_empty() {
            None
        } else {
            Some(lexer::render(&selector))
        };

        let mut branches = Vec::new();
        while self.at_word("WHEN") {
            let line = self.line();
            self.bump();
            let condition = self.condition("THEN", "WHEN: missing THEN", line)?;
            let body = self.parse_statements("CASE", opened_at)?;
            branches.push(Branch { condition, body });
        }
        if branches.is_empty() {
            return Err(TriggerError::parse(opened_at, "CASE without WHEN branches"));
        }

        let else_body = if self.at_word("ELSE") {
            self.bump();
            self.parse_statements("CASE ELSE", opened_at)?
        } else {
            Vec::new()
        };

        self.expect_end(Some("CASE"), "CASE", opened_at)?;
        self.leave();
        Ok(Statement::CaseWhen {
            selector,
            branches,
            else_body,
        })
    }

    fn parse_for(&mut self) -> TriggerResult<Statement> {
        let opened_at = self.line();
        self.expect_word("FOR")?;
        self.enter();

        let loop_var = self.expect_name("loop variable")?.text;
        self.expect_word("IN")?;
        let reverse = self.at_word("REVERSE");
        if reverse {
            self.bump();
        }
        let query = self.condition("LOOP", "FOR loop: missing LOOP", opened_at)?;
        let body = self.parse_statements("FOR loop", opened_at)?;
        self.expect_end(Some("LOOP"), "FOR loop", opened_at)?;

        self.leave();
        Ok(Statement::ForLoop {
            loop_var,
            reverse,
            query,
            body,
        })
    }

    fn parse_while(&mut self) -> TriggerResult<Statement> {
        let opened_at = self.line();
        self.expect_word("WHILE")?;
        self.enter();

        let condition = self.condition("LOOP", "WHILE loop: missing LOOP", opened_at)?;
        let body = self.parse_statements("WHILE loop", opened_at)?;
        self.expect_end(Some("LOOP"), "WHILE loop", opened_at)?;

        self.leave();
        Ok(Statement::WhileLoop { condition, body })
    }

    fn parse_loop(&mut self) -> TriggerResult<Statement> {
        let opened_at = self.line();
        self.expect_word("LOOP")?;
        self.enter();

        let body = self.parse_statements("LOOP", opened_at)?;
        self.expect_end(Some("LOOP"), "LOOP", opened_at)?;

        self.leave();
        Ok(Statement::Loop { body })
    }

    fn parse_exit(&mut self) -> TriggerResult<Statement> {
        let start = self.pos;
        self.expect_word("EXIT")?;
        let tokens = self.until_semicolon("EXIT: missing ';'")?;
        match tokens.first() {
            None => Ok(Statement::Exit { condition: None }),
            Some(first) if first.is_word("WHEN") && tokens.len() > 1 => Ok(Statement::Exit {
                condition: Some(lexer::render(&tokens[1..])),
            }),
            Some(_) => Ok(Statement::Unknown {
                raw: lexer::render(&self.tokens[start..self.pos - 1]),
            }),
        }
    }

    fn parse_label(&mut self) -> TriggerResult<Statement> {
        self.expect_symbol("<<")?;
        let name = self.expect_name("label name")?.text;
        self.expect_symbol(">>")?;
        Ok(Statement::Label { name })
    }

    fn parse_sql(&mut self, kind: SqlKind) -> TriggerResult<Statement> {
        let tokens = self.until_semicolon("SQL statement: missing ';'")?;
        Ok(Statement::Sql {
            kind,
            raw: lexer::render(&tokens),
        })
    }

    /// Assignment, procedure call, or anything else kept verbatim.
    fn parse_simple(&mut self) -> TriggerResult<Statement> {
        let line = self.line();
        let tokens = self.until_semicolon("statement: missing ';'")?;
        let raw = lexer::render(&tokens);
        let Some(first) = tokens.first() else {
            return Ok(Statement::noop());
        };

        let passthrough = first.kind == TokenKind::Word
            && PASSTHROUGH_WORDS.iter().any(|w| first.is_word(w));
        if passthrough {
            return Ok(Statement::Unknown { raw });
        }

        if has_top_level_assignment(&tokens) {
            return Ok(Statement::Sql {
                kind: SqlKind::Assignment,
                raw,
            });
        }

        let callable = matches!(first.kind, TokenKind::Word | TokenKind::Quoted) && !first.is_keyword();
        if callable {
            if tokens.len() == 1 {
                return Ok(Statement::FunctionCall {
                    target: first.text.clone(),
                    args: Vec::new(),
                });
            }
            if tokens[1].is_symbol("(") && matching_paren(&tokens, 1) == Some(tokens.len() - 1) {
                return Ok(Statement::FunctionCall {
                    target: first.text.clone(),
                    args: split_args(&tokens[2..tokens.len() - 1]),
                });
            }
        }

        self.diags.warn_at(
            Component::Parser,
            line,
            format!("unrecognised statement kept verbatim: '{}'", raw),
        );
        Ok(Statement::Unknown { raw })
    }
}

impl ParsedBlock {
    fn into_statement(self) -> Statement {
        Statement::BeginEnd {
            declarations: self.declarations,
            body: self.body,
            handlers: self.handlers,
        }
    }
}
