use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    /// Opaque Oracle type text, e.g. `NUMBER(10,2)` or `emp.sal%TYPE`.
    pub oracle_type: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_expr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub oracle_type: String,
    pub value_expr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionDecl {
    pub name: String,
    /// Code bound by `PRAGMA EXCEPTION_INIT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub name: String,
    pub query: String,
}

/// The `DECLARE` section of a trigger or nested block.
///
/// Names are unique across all kinds, compared case-insensitively. The
/// `insert_*` methods keep the first declaration and return `false` for a
/// duplicate so the caller can report it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Declarations {
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(default)]
    pub exceptions: Vec<ExceptionDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cursors: Vec<Cursor>,
    /// Declaration items kept as raw text (`TYPE`, `SUBTYPE`, subprograms).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other: Vec<String>,
}

impl Declarations {
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.constants.is_empty()
            && self.exceptions.is_empty()
            && self.cursors.is_empty()
            && self.other.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().any(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables
            .iter()
            .map(|v| v.name.as_str())
            .chain(self.constants.iter().map(|c| c.name.as_str()))
            .chain(self.exceptions.iter().map(|e| e.name.as_str()))
            .chain(self.cursors.iter().map(|c| c.name.as_str()))
    }

    pub fn exception(&self, name: &str) -> Option<&ExceptionDecl> {
        self.exceptions
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn exception_mut(&mut self, name: &str) -> Option<&mut ExceptionDecl> {
        self.exceptions
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn insert_variable(&mut self, var: Variable) -> bool {
        if self.contains(&var.name) {
            return false;
        }
        self.variables.push(var);
        true
    }

    pub fn insert_constant(&mut self, constant: Constant) -> bool {
        if self.contains(&constant.name) {
            return false;
        }
        self.constants.push(constant);
        true
    }

    pub fn insert_exception(&mut self, exc: ExceptionDecl) -> bool {
        if self.contains(&exc.name) {
            return false;
        }
        self.exceptions.push(exc);
        true
    }

    pub fn insert_cursor(&mut self, cursor: Cursor) -> bool {
        if self.contains(&cursor.name) {
            return false;
        }
        self.cursors.push(cursor);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_declaration_wins() {
        let mut decls = Declarations::default();
        assert!(decls.insert_variable(Variable {
            name: "v_count".to_string(),
            oracle_type: "NUMBER".to_string(),
            not_null: false,
            default_expr: None,
        }));
        assert!(!decls.insert_constant(Constant {
            name: "V_COUNT".to_string(),
            oracle_type: "NUMBER".to_string(),
            value_expr: "1".to_string(),
        }));
        assert_eq!(decls.variables.len(), 1);
        assert!(decls.constants.is_empty());
        assert!(decls.contains("V_Count"));
    }
}
