//! Tokenizer for PL/SQL trigger text, built from nom combinators.
//!
//! Every raw text stored in the IR is a [`render`]ing of a token slice, so
//! whitespace and comments never influence IR equality.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while},
    character::complete::{char, digit1, multispace1, not_line_ending, one_of, satisfy},
    combinator::{map, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
};

use crate::error::{TriggerError, TriggerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword, possibly dotted (`pkg.proc`, `seq.NEXTVAL`).
    Word,
    /// `"Mixed Case"` identifier.
    Quoted,
    /// `:NEW.col`, `:OLD.col` or any other `:name` host reference.
    Bind,
    Number,
    /// Single-quoted literal, quotes included.
    Str,
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn is_word(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == symbol
    }

    /// Upper-cased text, for keyword dispatch.
    pub fn upper(&self) -> String {
        self.text.to_ascii_uppercase()
    }

    pub fn is_keyword(&self) -> bool {
        self.kind == TokenKind::Word && is_keyword(&self.text)
    }
}

const KEYWORDS: &[&str] = &[
    "ALL", "AND", "ANY", "AS", "BEGIN", "BETWEEN", "BY", "CASE", "CONSTANT", "CROSS", "CURSOR",
    "DECLARE", "DEFAULT", "DELETE", "DISTINCT", "ELSE", "ELSIF", "END", "EXCEPTION", "EXISTS",
    "EXIT", "FALSE", "FOR", "FROM", "FULL", "GOTO", "GROUP", "HAVING", "IF", "IN", "INNER",
    "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "LEFT", "LIKE", "LOOP", "MINUS", "NOT", "NULL",
    "ON", "OR", "ORDER", "OTHERS", "OUTER", "PRIOR", "RAISE", "RETURN", "REVERSE", "RIGHT",
    "SELECT", "SET", "SOME", "THEN", "TRUE", "UNION", "UPDATE", "USING", "VALUES", "WHEN",
    "WHERE", "WHILE", "WITH",
];

/// Reserved words that are never function names.
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn skip(input: &str) -> IResult<&str, &str> {
    alt((
        multispace1,
        recognize(pair(tag("--"), not_line_ending)),
        recognize(delimited(tag("/*"), take_until("*/"), tag("*/"))),
    ))(input)
}

fn ident_part(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$' || c == '#'),
    ))(input)
}

fn quoted_ident(input: &str) -> IResult<&str, &str> {
    recognize(delimited(char('"'), is_not("\""), char('"')))(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        ident_part,
        many0(preceded(char('.'), alt((ident_part, quoted_ident)))),
    ))(input)
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        char('\''),
        many0(alt((tag("''"), is_not("'")))),
        char('\''),
    )))(input)
}

/// `N'…'` national literal or plain `'…'`.
fn plain_literal(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(one_of("nN")), string_literal))(input)
}

/// Alternative quoting, `q'[it's]'`: the text runs to the closing
/// delimiter followed by a quote. Bracket delimiters close with their pair.
fn q_literal(input: &str) -> IResult<&str, &str> {
    let (body, _) = tuple((opt(one_of("nN")), one_of("qQ"), char('\'')))(input)?;
    let (text, open) = satisfy(|c| !c.is_whitespace() && c != '\'')(body)?;
    let close = match open {
        '[' => ']',
        '{' => '}',
        '(' => ')',
        '<' => '>',
        other => other,
    };
    let mut terminator = String::from(close);
    terminator.push('\'');
    match text.find(&terminator) {
        Some(at) => {
            let end = input.len() - text.len() + at + terminator.len();
            Ok((&input[end..], &input[..end]))
        }
        None => Err(nom::Err::Error(nom::error::Error::new(
            text,
            nom::error::ErrorKind::TakeUntil,
        ))),
    }
}

/// Content of a string literal in any quoting form, unescaped.
pub fn string_value(literal: &str) -> Option<String> {
    let rest = literal
        .strip_prefix(['n', 'N'])
        .filter(|r| r.starts_with(['\'', 'q', 'Q']))
        .unwrap_or(literal);
    if let Some(quoted) = rest.strip_prefix(['q', 'Q']) {
        let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
        let mut chars = inner.chars();
        chars.next()?;
        chars.next_back()?;
        return Some(chars.as_str().to_string());
    }
    let inner = rest.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

/// Integer, decimal or scientific notation (`1.5E3`, `2e-1`).
fn number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)
}

fn bind(input: &str) -> IResult<&str, &str> {
    recognize(pair(char(':'), word))(input)
}

fn symbol(input: &str) -> IResult<&str, &str> {
    alt((
        alt((
            tag(":="),
            tag("=>"),
            tag(".."),
            tag("||"),
            tag("<="),
            tag(">="),
            tag("<>"),
            tag("!="),
            tag("^="),
            tag("~="),
            tag("<<"),
            tag(">>"),
            tag("**"),
        )),
        recognize(one_of("(),;+-*/=<>%.@:[]!&|^~?")),
    ))(input)
}

fn token(input: &str) -> IResult<&str, (TokenKind, &str)> {
    alt((
        map(plain_literal, |s| (TokenKind::Str, s)),
        map(q_literal, |s| (TokenKind::Str, s)),
        map(quoted_ident, |s| (TokenKind::Quoted, s)),
        map(bind, |s| (TokenKind::Bind, s)),
        map(number, |s| (TokenKind::Number, s)),
        map(word, |s| (TokenKind::Word, s)),
        map(symbol, |s| (TokenKind::Symbol, s)),
    ))(input)
}

/// Split `source` into tokens, dropping whitespace and comments.
pub fn tokenize(source: &str) -> TriggerResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut line = 1;

    while !rest.is_empty() {
        if let Ok((next, skipped)) = skip(rest) {
            line += skipped.matches('\n').count();
            rest = next;
            continue;
        }
        match token(rest) {
            Ok((next, (kind, text))) => {
                tokens.push(Token {
                    kind,
                    text: text.to_string(),
                    line,
                });
                line += text.matches('\n').count();
                rest = next;
            }
            Err(_) => {
                let snippet: String = rest.chars().take(20).collect();
                let message = if rest.starts_with('\'') || q_literal_start(rest) {
                    "unterminated string literal".to_string()
                } else if rest.starts_with("/*") {
                    "unterminated comment".to_string()
                } else {
                    format!("unexpected input '{}'", snippet)
                };
                return Err(TriggerError::parse(line, message));
            }
        }
    }

    Ok(tokens)
}

fn q_literal_start(rest: &str) -> bool {
    let rest = rest.strip_prefix(['n', 'N']).unwrap_or(rest);
    rest.strip_prefix(['q', 'Q'])
        .is_some_and(|r| r.starts_with('\''))
}

fn is_operator(token: &Token) -> bool {
    token.kind == TokenKind::Symbol && !matches!(token.text.as_str(), ")" | "]")
}

/// Render tokens as canonical text: single spaces, no space inside
/// parentheses or before separators, calls written as `name(args)`.
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, tok) in tokens.iter().enumerate() {
        if i > 0 && needs_space(tokens, i) {
            out.push(' ');
        }
        out.push_str(&tok.text);
    }
    out
}

fn needs_space(tokens: &[Token], i: usize) -> bool {
    let tok = &tokens[i];
    let prev = &tokens[i - 1];

    if tok.kind == TokenKind::Symbol && matches!(tok.text.as_str(), "," | ")" | ";" | "%" | "." | "..")
    {
        return false;
    }
    if prev.kind == TokenKind::Symbol && matches!(prev.text.as_str(), "(" | "%" | "." | "..") {
        return false;
    }
    if tok.is_symbol("(")
        && matches!(prev.kind, TokenKind::Word | TokenKind::Quoted)
        && !prev.is_keyword()
    {
        return false;
    }
    // Unary sign directly after an operator, keyword, or at the start.
    if prev.is_symbol("-") || prev.is_symbol("+") {
        let unary = match i.checked_sub(2).map(|j| &tokens[j]) {
            None => true,
            Some(before) => is_operator(before) || before.is_keyword(),
        };
        if unary {
            return false;
        }
    }
    true
}

/// Tokenize and re-render, collapsing formatting differences.
pub fn normalize(text: &str) -> TriggerResult<String> {
    Ok(render(&tokenize(text)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, String)> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_tokenize_assignment_with_bind() {
        let toks = kinds(":NEW.theme_no := NVL(v_x, 'it''s');");
        assert_eq!(
            toks,
            vec![
                (TokenKind::Bind, ":NEW.theme_no".to_string()),
                (TokenKind::Symbol, ":=".to_string()),
                (TokenKind::Word, "NVL".to_string()),
                (TokenKind::Symbol, "(".to_string()),
                (TokenKind::Word, "v_x".to_string()),
                (TokenKind::Symbol, ",".to_string()),
                (TokenKind::Str, "'it''s'".to_string()),
                (TokenKind::Symbol, ")".to_string()),
                (TokenKind::Symbol, ";".to_string()),
            ]
        );
    }

    #[test]
    fn test_range_is_not_a_decimal() {
        let toks = kinds("1..10");
        assert_eq!(toks[0], (TokenKind::Number, "1".to_string()));
        assert_eq!(toks[1], (TokenKind::Symbol, "..".to_string()));
        assert_eq!(toks[2], (TokenKind::Number, "10".to_string()));
    }

    #[test]
    fn test_scientific_notation() {
        let toks = kinds("v := 1.5E3 + 2e-1");
        assert_eq!(toks[2], (TokenKind::Number, "1.5E3".to_string()));
        assert_eq!(toks[4], (TokenKind::Number, "2e-1".to_string()));
        assert_eq!(toks.len(), 5);
        assert_eq!(normalize("v := 1.5E3 + 2e-1").unwrap(), "v := 1.5E3 + 2e-1");
    }

    #[test]
    fn test_alternative_quoting() {
        let toks = kinds("v := q'[it's]' || Q'{a}b}' || nq'!x!' || N'y';");
        assert_eq!(toks[2], (TokenKind::Str, "q'[it's]'".to_string()));
        assert_eq!(toks[4], (TokenKind::Str, "Q'{a}b}'".to_string()));
        assert_eq!(toks[6], (TokenKind::Str, "nq'!x!'".to_string()));
        assert_eq!(toks[8], (TokenKind::Str, "N'y'".to_string()));

        assert_eq!(string_value("q'[it's]'").as_deref(), Some("it's"));
        assert_eq!(string_value("Q'{a}b}'").as_deref(), Some("a}b"));
        assert_eq!(string_value("N'it''s'").as_deref(), Some("it's"));
        assert_eq!(string_value("'plain'").as_deref(), Some("plain"));
        assert_eq!(string_value("name"), None);
    }

    #[test]
    fn test_unterminated_alternative_quote() {
        let err = tokenize("v := q'[open").unwrap_err();
        assert!(err.to_string().contains("unterminated string literal"));
        // A word starting with q is still a word.
        assert_eq!(kinds("quantity")[0], (TokenKind::Word, "quantity".to_string()));
    }

    #[test]
    fn test_comments_and_lines() {
        let toks = tokenize("-- header\nBEGIN /* multi\nline */ NULL;\nEND;").unwrap();
        assert_eq!(toks[0].text, "BEGIN");
        assert_eq!(toks[0].line, 2);
        assert_eq!(toks[1].line, 3);
        assert_eq!(toks.last().unwrap().line, 4);
    }

    #[test]
    fn test_unterminated_string_reports_line() {
        let err = tokenize("BEGIN\n  v := 'abc;\nEND;").unwrap_err();
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_render_canonical_spacing() {
        assert_eq!(
            normalize("raise_application_error (  -20101 ,'bad'  )").unwrap(),
            "raise_application_error(-20101, 'bad')"
        );
        assert_eq!(normalize("a   -  b").unwrap(), "a - b");
        assert_eq!(
            normalize("x IN ( 1,2 ) AND v%ROWCOUNT>0").unwrap(),
            "x IN (1, 2) AND v%ROWCOUNT > 0"
        );
        assert_eq!(normalize("emp.sal %TYPE").unwrap(), "emp.sal%TYPE");
    }

    #[test]
    fn test_render_is_idempotent() {
        let once = normalize("SELECT  count(*) INTO v FROM t WHERE a=-1 AND b  <> :OLD.B").unwrap();
        assert_eq!(normalize(&once).unwrap(), once);
    }
}
