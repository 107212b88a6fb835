use serde::{Deserialize, Serialize};

/// The DML operation that fired a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Insert, Operation::Update, Operation::Delete];

    /// Oracle trigger predicate testing for this operation.
    pub fn predicate(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERTING",
            Operation::Update => "UPDATING",
            Operation::Delete => "DELETING",
        }
    }

    /// Operation named by an Oracle trigger predicate, case-insensitively.
    pub fn from_predicate(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| word.eq_ignore_ascii_case(op.predicate()))
    }

    /// DML keyword, also the value of PostgreSQL's `TG_OP`.
    pub fn keyword(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| word.eq_ignore_ascii_case(op.keyword()))
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Insert => write!(f, "insert"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_lookup() {
        assert_eq!(Operation::from_predicate("inserting"), Some(Operation::Insert));
        assert_eq!(Operation::from_predicate("Updating"), Some(Operation::Update));
        assert_eq!(Operation::from_predicate("DELETING"), Some(Operation::Delete));
        assert_eq!(Operation::from_predicate("DELETE"), None);
        assert_eq!(Operation::from_keyword("delete"), Some(Operation::Delete));
    }
}
