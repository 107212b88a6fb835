//! Boolean structure of guard conditions.
//!
//! Only the `AND`/`OR`/`NOT`/parenthesis skeleton is parsed. Everything
//! between connectives is an opaque data term, except the operation
//! predicates `INSERTING`, `UPDATING`, `DELETING` and `UPDATING('col')`.

use crate::ast::Operation;
use crate::parser::lexer::{self, Token, TokenKind};

/// Static value of a guard for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Always,
    Never,
    /// Data-dependent; holds the condition with operation terms elided.
    Depends(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Vec<Expr>, Token),
    And(Vec<Expr>, Token),
    Not(Box<Expr>, Token),
    Group(Box<Expr>),
    /// `INSERTING`, `UPDATING` or `DELETING`.
    Op(Operation, Token),
    /// `UPDATING('col')`.
    Column(Vec<Token>),
    Data(Vec<Token>),
}

/// A condition the classifier cannot split into operation and data terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unclassifiable(pub String);

fn is_predicate(tok: &Token) -> bool {
    tok.kind == TokenKind::Word && Operation::from_predicate(&tok.text).is_some()
}

/// Whether `condition` mentions any operation predicate.
pub fn mentions_operation(condition: &str) -> bool {
    lexer::tokenize(condition)
        .map(|tokens| tokens.iter().any(is_predicate))
        .unwrap_or(false)
}

/// Replace every operation predicate in `text` by its value for `op`:
/// `TRUE`, `FALSE`, or `UPDATING('col')` kept as is for update. Works on any
/// expression or SQL text. `None` when `text` has no predicate.
pub fn substitute(text: &str, op: Operation) -> Option<String> {
    let tokens = lexer::tokenize(text).ok()?;
    if !tokens.iter().any(is_predicate) {
        return None;
    }

    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];
        let Some(pred) = Operation::from_predicate(&tok.text).filter(|_| tok.kind == TokenKind::Word)
        else {
            out.push(tok.clone());
            i += 1;
            continue;
        };
        let column_form = pred == Operation::Update
            && tokens.get(i + 1).is_some_and(|t| t.is_symbol("("))
            && tokens.get(i + 2).is_some_and(|t| t.kind == TokenKind::Str)
            && tokens.get(i + 3).is_some_and(|t| t.is_symbol(")"));
        if column_form {
            if op == Operation::Update {
                out.extend_from_slice(&tokens[i..i + 4]);
            } else {
                out.push(keyword("FALSE"));
            }
            i += 4;
        } else {
            out.push(keyword(if pred == op { "TRUE" } else { "FALSE" }));
            i += 1;
        }
    }
    Some(lexer::render(&out))
}

/// Whether `text` calls a function or procedure.
pub fn has_call(text: &str) -> bool {
    let Ok(tokens) = lexer::tokenize(text) else {
        return true;
    };
    tokens.windows(2).enumerate().any(|(i, pair)| {
        let after_into = i > 0 && (tokens[i - 1].is_word("INTO") || tokens[i - 1].is_word("AS"));
        matches!(pair[0].kind, TokenKind::Word | TokenKind::Quoted)
            && pair[1].is_symbol("(")
            && !pair[0].is_keyword()
            && !is_predicate(&pair[0])
            && !after_into
    })
}

/// Classify `condition` for `op`.
pub fn resolve(condition: &str, op: Operation) -> Result<Resolution, Unclassifiable> {
    let tokens = lexer::tokenize(condition)
        .map_err(|e| Unclassifiable(format!("cannot tokenize condition: {}", e)))?;
    if !tokens.iter().any(is_predicate) {
        return Ok(Resolution::Depends(condition.to_string()));
    }

    let mut reader = Reader { tokens: &tokens, pos: 0 };
    let expr = reader.or_expr()?;
    if reader.pos != tokens.len() {
        return Err(Unclassifiable(format!(
            "unbalanced condition near '{}'",
            lexer::render(&tokens[reader.pos..])
        )));
    }

    Ok(match fold(expr, op) {
        Folded::Always => Resolution::Always,
        Folded::Never => Resolution::Never,
        Folded::Kept(expr) => Resolution::Depends(render(&expr)),
    })
}

struct Reader<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Reader<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn at_word(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word(word))
    }

    /// End of the current boolean operand: end of input, a connective or a
    /// closing parenthesis.
    fn at_boundary(&self, at: usize) -> bool {
        match self.tokens.get(at) {
            None => true,
            Some(t) => t.is_word("AND") || t.is_word("OR") || t.is_symbol(")"),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, Unclassifiable> {
        let mut terms = vec![self.and_expr()?];
        let mut joiner = None;
        while self.at_word("OR") {
            joiner.get_or_insert_with(|| self.tokens[self.pos].clone());
            self.pos += 1;
            terms.push(self.and_expr()?);
        }
        Ok(match joiner {
            Some(tok) => Expr::Or(terms, tok),
            None => terms.remove(0),
        })
    }

    fn and_expr(&mut self) -> Result<Expr, Unclassifiable> {
        let mut terms = vec![self.not_expr()?];
        let mut joiner = None;
        while self.at_word("AND") {
            joiner.get_or_insert_with(|| self.tokens[self.pos].clone());
            self.pos += 1;
            terms.push(self.not_expr()?);
        }
        Ok(match joiner {
            Some(tok) => Expr::And(terms, tok),
            None => terms.remove(0),
        })
    }

    fn not_expr(&mut self) -> Result<Expr, Unclassifiable> {
        if self.at_word("NOT") && !self.at_boundary(self.pos + 1) {
            let tok = self.tokens[self.pos].clone();
            self.pos += 1;
            let inner = self.not_expr()?;
            return Ok(Expr::Not(Box::new(inner), tok));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, Unclassifiable> {
        let Some(tok) = self.peek() else {
            return Err(Unclassifiable("missing operand".to_string()));
        };

        if tok.is_symbol("(") {
            if let Some(close) = self.matching(self.pos) {
                if self.at_boundary(close + 1) {
                    self.pos += 1;
                    let inner = self.or_expr()?;
                    if !self.peek().is_some_and(|t| t.is_symbol(")")) {
                        return Err(Unclassifiable("unbalanced parentheses".to_string()));
                    }
                    self.pos += 1;
                    return Ok(Expr::Group(Box::new(inner)));
                }
            }
        }

        if let Some(op) = Operation::from_predicate(&tok.text).filter(|_| tok.kind == TokenKind::Word) {
            if self.at_boundary(self.pos + 1) {
                let tok = tok.clone();
                self.pos += 1;
                return Ok(Expr::Op(op, tok));
            }
            let column_form = op == Operation::Update
                && self.tokens.get(self.pos + 1).is_some_and(|t| t.is_symbol("("))
                && self.tokens.get(self.pos + 2).is_some_and(|t| t.kind == TokenKind::Str)
                && self.tokens.get(self.pos + 3).is_some_and(|t| t.is_symbol(")"))
                && self.at_boundary(self.pos + 4);
            if column_form {
                let tokens = self.tokens[self.pos..self.pos + 4].to_vec();
                self.pos += 4;
                return Ok(Expr::Column(tokens));
            }
        }

        self.data_term()
    }

    /// Opaque term up to the next connective at nesting depth zero. The
    /// `AND` of a `BETWEEN … AND …` belongs to the term.
    fn data_term(&mut self) -> Result<Expr, Unclassifiable> {
        let start = self.pos;
        let mut parens = 0usize;
        let mut cases = 0usize;
        let mut between = false;
        while let Some(tok) = self.peek() {
            if parens == 0 && cases == 0 {
                if tok.is_symbol(")") || tok.is_word("OR") {
                    break;
                }
                if tok.is_word("AND") {
                    if !between {
                        break;
                    }
                    between = false;
                }
                if tok.is_word("BETWEEN") {
                    between = true;
                }
            }
            if tok.is_symbol("(") {
                parens += 1;
            } else if tok.is_symbol(")") {
                parens -= 1;
            } else if tok.is_word("CASE") {
                cases += 1;
            } else if tok.is_word("END") && cases > 0 {
                cases -= 1;
            }
            self.pos += 1;
        }

        let tokens = &self.tokens[start..self.pos];
        if tokens.is_empty() {
            return Err(Unclassifiable("missing operand".to_string()));
        }
        if tokens.iter().any(is_predicate) {
            return Err(Unclassifiable(format!(
                "operation predicate inside expression '{}'",
                lexer::render(tokens)
            )));
        }
        Ok(Expr::Data(tokens.to_vec()))
    }

    fn matching(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, tok) in self.tokens.iter().enumerate().skip(open) {
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
}

enum Folded {
    Always,
    Never,
    Kept(Expr),
}

/// Shallow constant folding: an annihilating term decides the connective,
/// identity terms are dropped. Data terms are never rearranged.
fn fold(expr: Expr, op: Operation) -> Folded {
    match expr {
        Expr::Op(pred, _) => {
            if pred == op {
                Folded::Always
            } else {
                Folded::Never
            }
        }
        Expr::Column(tokens) => {
            if op == Operation::Update {
                Folded::Kept(Expr::Column(tokens))
            } else {
                Folded::Never
            }
        }
        Expr::Data(tokens) => Folded::Kept(Expr::Data(tokens)),
        Expr::Group(inner) => match fold(*inner, op) {
            Folded::Kept(inner) => Folded::Kept(Expr::Group(Box::new(inner))),
            decided => decided,
        },
        Expr::Not(inner, tok) => match fold(*inner, op) {
            Folded::Always => Folded::Never,
            Folded::Never => Folded::Always,
            Folded::Kept(inner) => Folded::Kept(Expr::Not(Box::new(inner), tok)),
        },
        Expr::And(terms, tok) => {
            let mut kept = Vec::new();
            for term in terms {
                match fold(term, op) {
                    Folded::Never => return Folded::Never,
                    Folded::Always => {}
                    Folded::Kept(e) => kept.push(e),
                }
            }
            join(kept, |terms| Expr::And(terms, tok), Folded::Always)
        }
        Expr::Or(terms, tok) => {
            let mut kept = Vec::new();
            for term in terms {
                match fold(term, op) {
                    Folded::Always => return Folded::Always,
                    Folded::Never => {}
                    Folded::Kept(e) => kept.push(e),
                }
            }
            join(kept, |terms| Expr::Or(terms, tok), Folded::Never)
        }
    }
}

fn join(mut kept: Vec<Expr>, build: impl FnOnce(Vec<Expr>) -> Expr, empty: Folded) -> Folded {
    match kept.len() {
        0 => empty,
        1 => Folded::Kept(kept.remove(0)),
        _ => Folded::Kept(build(kept)),
    }
}

fn flatten(expr: &Expr, out: &mut Vec<Token>) {
    match expr {
        Expr::Or(terms, tok) | Expr::And(terms, tok) => {
            for (i, term) in terms.iter().enumerate() {
                if i > 0 {
                    out.push(tok.clone());
                }
                flatten(term, out);
            }
        }
        Expr::Not(inner, tok) => {
            out.push(tok.clone());
            flatten(inner, out);
        }
        Expr::Group(inner) => {
            out.push(symbol("("));
            flatten(inner, out);
            out.push(symbol(")"));
        }
        Expr::Op(_, tok) => out.push(tok.clone()),
        Expr::Column(tokens) | Expr::Data(tokens) => out.extend(tokens.iter().cloned()),
    }
}

fn keyword(text: &str) -> Token {
    Token {
        kind: TokenKind::Word,
        text: text.to_string(),
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

fn render(expr: &Expr) -> String {
    let mut tokens = Vec::new();
    flatten(expr, &mut tokens);
    lexer::render(&tokens)
}
