use super::Declarations;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An ordered statement list. Entries are shared between the parsed tree
/// and every tree derived from it.
pub type Block = Vec<Arc<Statement>>;

/// Kind of an embedded SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlKind {
    Select,
    Insert,
    Update,
    Delete,
    Assignment,
}

/// One guarded arm of an `IF`/`ELSIF` chain or a `CASE WHEN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: String,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    /// Declared exception, a built-in name, or `OTHERS`.
    pub exception_name: String,
    pub body: Block,
}

impl ExceptionHandler {
    pub fn is_others(&self) -> bool {
        self.exception_name.eq_ignore_ascii_case("OTHERS")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    BeginEnd {
        #[serde(default, skip_serializing_if = "Declarations::is_empty")]
        declarations: Declarations,
        body: Block,
        #[serde(default)]
        handlers: Vec<ExceptionHandler>,
    },
    IfElse {
        branches: Vec<Branch>,
        #[serde(default)]
        else_body: Block,
    },
    CaseWhen {
        #[serde(
            rename = "selector_expr",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        selector: Option<String>,
        branches: Vec<Branch>,
        #[serde(default)]
        else_body: Block,
    },
    ForLoop {
        loop_var: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        reverse: bool,
        query: String,
        body: Block,
    },
    WhileLoop {
        condition: String,
        body: Block,
    },
    Loop {
        body: Block,
    },
    Exit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<String>,
    },
    Sql {
        kind: SqlKind,
        raw: String,
    },
    /// `RAISE name;`, or a bare re-raise when the name is absent.
    Raise {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exception_name: Option<String>,
    },
    FunctionCall {
        target: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Label {
        name: String,
    },
    Goto {
        label: String,
    },
    Unknown {
        raw: String,
    },
}

impl Statement {
    /// The `NULL;` statement standing in for an emptied body.
    pub fn noop() -> Self {
        Statement::Unknown {
            raw: "NULL".to_string(),
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Statement::Unknown { raw } if raw.eq_ignore_ascii_case("NULL"))
    }

    /// Variant name as it appears in the serialized IR.
    pub fn type_name(&self) -> &'static str {
        match self {
            Statement::BeginEnd { .. } => "begin_end",
            Statement::IfElse { .. } => "if_else",
            Statement::CaseWhen { .. } => "case_when",
            Statement::ForLoop { .. } => "for_loop",
            Statement::WhileLoop { .. } => "while_loop",
            Statement::Loop { .. } => "loop",
            Statement::Exit { .. } => "exit",
            Statement::Sql { .. } => "sql",
            Statement::Raise { .. } => "raise",
            Statement::FunctionCall { .. } => "function_call",
            Statement::Label { .. } => "label",
            Statement::Goto { .. } => "goto",
            Statement::Unknown { .. } => "unknown",
        }
    }

    /// Nested statement lists, in source order. Handler bodies come last.
    pub fn blocks(&self) -> Vec<&Block> {
        match self {
            Statement::BeginEnd { body, handlers, .. } => {
                let mut blocks = vec![body];
                blocks.extend(handlers.iter().map(|h| &h.body));
                blocks
            }
            Statement::IfElse {
                branches,
                else_body,
            }
            | Statement::CaseWhen {
                branches,
                else_body,
                ..
            } => {
                let mut blocks: Vec<&Block> = branches.iter().map(|b| &b.body).collect();
                blocks.push(else_body);
                blocks
            }
            Statement::ForLoop { body, .. }
            | Statement::WhileLoop { body, .. }
            | Statement::Loop { body } => vec![body],
            _ => Vec::new(),
        }
    }

    /// Boolean guard texts held directly by this node.
    pub fn conditions(&self) -> Vec<&str> {
        match self {
            Statement::IfElse { branches, .. } => {
                branches.iter().map(|b| b.condition.as_str()).collect()
            }
            Statement::CaseWhen {
                selector: None,
                branches,
                ..
            } => branches.iter().map(|b| b.condition.as_str()).collect(),
            Statement::WhileLoop { condition, .. } => vec![condition.as_str()],
            Statement::Exit {
                condition: Some(condition),
            } => vec![condition.as_str()],
            _ => Vec::new(),
        }
    }

    /// Expression texts this node evaluates itself, excluding nested
    /// statements: guards, the `CASE` selector, the `FOR` range and SQL text.
    pub fn expressions(&self) -> Vec<&str> {
        let mut out = self.conditions();
        match self {
            Statement::CaseWhen {
                selector: Some(selector),
                ..
            } => out.push(selector.as_str()),
            Statement::ForLoop { query, .. } => out.push(query.as_str()),
            Statement::Sql { raw, .. } | Statement::Unknown { raw } => out.push(raw.as_str()),
            Statement::FunctionCall { args, .. } => out.extend(args.iter().map(String::as_str)),
            _ => {}
        }
        out
    }

    pub fn depth(&self) -> usize {
        1 + self
            .blocks()
            .into_iter()
            .flat_map(|b| b.iter())
            .map(|s| s.depth())
            .max()
            .unwrap_or(0)
    }
}
