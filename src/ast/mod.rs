//! Intermediate representation of a parsed trigger.
//!
//! The tree is immutable once built. Statement lists hold
//! `Arc<Statement>` so that specialized trees can share every subtree the
//! specializer left untouched.

pub mod declarations;
pub mod operation;
pub mod statement;

pub use declarations::*;
pub use operation::*;
pub use statement::*;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `CREATE [OR REPLACE] TRIGGER` header preceding the trigger body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerHeader {
    pub name: String,
    /// `BEFORE`, `AFTER` or `INSTEAD OF`.
    pub timing: String,
    pub events: Vec<Operation>,
    pub table: String,
    pub for_each_row: bool,
    /// Canonical text of the whole header, used for Oracle rendering.
    pub raw: String,
}

/// One parsed trigger: declarations plus the main `BEGIN … END` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<TriggerHeader>,
    pub declarations: Arc<Declarations>,
    /// Always a [`Statement::BeginEnd`].
    pub main: Arc<Statement>,
}

impl Trigger {
    pub fn new(declarations: Declarations, main: Statement) -> Self {
        Self {
            header: None,
            declarations: Arc::new(declarations),
            main: Arc::new(main),
        }
    }

    /// Statements of the main block.
    pub fn body(&self) -> &[Arc<Statement>] {
        match self.main.as_ref() {
            Statement::BeginEnd { body, .. } => body,
            _ => &[],
        }
    }

    pub fn handlers(&self) -> &[ExceptionHandler] {
        match self.main.as_ref() {
            Statement::BeginEnd { handlers, .. } => handlers,
            _ => &[],
        }
    }

    /// Whether the trigger fires for `op`. Without a header every operation
    /// is assumed.
    pub fn fires_on(&self, op: Operation) -> bool {
        self.header
            .as_ref()
            .is_none_or(|h| h.events.is_empty() || h.events.contains(&op))
    }

    /// Maximum nesting depth of the statement tree.
    pub fn depth(&self) -> usize {
        self.main.depth()
    }
}
