//! Read-only Oracle → PostgreSQL mapping tables.
//!
//! A [`MappingTables`] value is built once per process and shared by
//! reference with every generator call. Keys are stored upper-cased.

mod defaults;
mod types;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::diagnostics::{Component, Diagnostics};
use crate::error::{TriggerError, TriggerResult};
use crate::parser::lexer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTables {
    /// Oracle type name → PostgreSQL type name.
    pub types: BTreeMap<String, String>,
    /// Oracle function → rename or argument template.
    pub functions: BTreeMap<String, String>,
    /// Exception name → message used by `RAISE EXCEPTION`.
    pub exceptions: BTreeMap<String, String>,
    /// `TABLE.COLUMN` → Oracle type, for `%TYPE` resolution.
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
}

/// On-disk shape: every table optional, merged over the built-ins.
#[derive(Debug, Default, Deserialize)]
struct MappingFile {
    #[serde(default)]
    types: BTreeMap<String, String>,
    #[serde(default)]
    functions: BTreeMap<String, String>,
    #[serde(default)]
    exceptions: BTreeMap<String, String>,
    #[serde(default)]
    columns: BTreeMap<String, String>,
}

fn table(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Canonical key: upper-case, and whole-call keys such as `trunc( sysdate )`
/// re-rendered as `TRUNC(SYSDATE)`.
fn function_key(key: &str) -> String {
    let upper = key.trim().to_ascii_uppercase();
    if upper.contains('(') {
        lexer::normalize(&upper).unwrap_or(upper)
    } else {
        upper
    }
}

impl Default for MappingTables {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MappingTables {
    /// The built-in tables. Never empty.
    pub fn builtin() -> Self {
        Self {
            types: table(defaults::TYPES),
            functions: table(defaults::FUNCTIONS),
            exceptions: table(defaults::EXCEPTIONS),
            columns: BTreeMap::new(),
        }
    }

    /// Load a TOML (or `.json`) mapping file and merge it over the
    /// built-in tables.
    pub fn from_file(path: &Path) -> TriggerResult<Self> {
        let source = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| TriggerError::mapping(&source, e.to_string()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let file: MappingFile = if is_json {
            serde_json::from_str(&content).map_err(|e| TriggerError::mapping(&source, e.to_string()))?
        } else {
            toml::from_str(&content).map_err(|e| TriggerError::mapping(&source, e.to_string()))?
        };

        let mut tables = Self::builtin();
        tables.merge(file);
        tracing::info!(
            path = %source,
            types = tables.types.len(),
            functions = tables.functions.len(),
            exceptions = tables.exceptions.len(),
            "loaded mapping tables"
        );
        Ok(tables)
    }

    /// Load `path` if given; on any failure report it and fall back to the
    /// built-in tables.
    pub fn load_or_default(path: Option<&Path>, diags: &mut Diagnostics) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match Self::from_file(path) {
            Ok(tables) => tables,
            Err(e) => {
                diags.error(
                    Component::Mapping,
                    format!("{}; using built-in mapping tables", e),
                );
                Self::builtin()
            }
        }
    }

    fn merge(&mut self, file: MappingFile) {
        for (k, v) in file.types {
            self.types.insert(k.trim().to_ascii_uppercase(), v);
        }
        for (k, v) in file.functions {
            self.functions.insert(function_key(&k), v);
        }
        for (k, v) in file.exceptions {
            self.exceptions.insert(k.trim().to_ascii_uppercase(), v);
        }
        for (k, v) in file.columns {
            self.columns.insert(k.trim().to_ascii_uppercase(), v);
        }
    }

    /// Point `SYSDATE`-style pseudo functions at the configured expressions.
    pub fn with_current_time(mut self, timestamp: &str, date: &str) -> Self {
        for key in ["SYSDATE", "SYSTIMESTAMP"] {
            self.functions.insert(key.to_string(), timestamp.to_string());
        }
        self.functions
            .insert("TRUNC(SYSDATE)".to_string(), date.to_string());
        self
    }

    /// Template for a call of `name` with `arity` arguments.
    pub fn function(&self, name: &str, arity: usize) -> Option<&str> {
        let upper = name.to_ascii_uppercase();
        self.functions
            .get(&format!("{}/{}", upper, arity))
            .or_else(|| self.functions.get(&upper))
            .map(String::as_str)
    }

    /// Replacement for one exact canonical call text, e.g. `TRUNC(SYSDATE)`.
    pub fn call_override(&self, call: &str) -> Option<&str> {
        self.functions
            .get(&call.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Replacement for a bare identifier such as `SYSDATE` or `USER`.
    pub fn pseudo_column(&self, name: &str) -> Option<&str> {
        let upper = name.to_ascii_uppercase();
        self.functions
            .get(&upper)
            .filter(|v| !v.contains('{') && !v.eq_ignore_ascii_case(&upper))
            .map(String::as_str)
    }

    pub fn exception_message(&self, name: &str) -> Option<&str> {
        self.exceptions
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// PostgreSQL condition name catching an Oracle predefined exception.
    pub fn condition_name(&self, exception: &str) -> Option<&'static str> {
        defaults::CONDITIONS
            .iter()
            .find(|(ora, _)| ora.eq_ignore_ascii_case(exception))
            .map(|(_, pg)| *pg)
    }

    /// PostgreSQL condition for an Oracle error code, e.g. `-2291` →
    /// `foreign_key_violation`.
    pub fn condition_for_code(&self, code: i64) -> Option<&'static str> {
        defaults::ERROR_CODES
            .iter()
            .find(|(ora, _)| *ora == code)
            .map(|(_, pg)| *pg)
    }

    pub fn column_type(&self, reference: &str) -> Option<&str> {
        self.columns
            .get(&reference.to_ascii_uppercase())
            .map(String::as_str)
    }
}

/// Expand a function template with already-rewritten arguments.
///
/// Returns `None` when the template refers to an argument the call does not
/// have.
pub fn apply_template(name: &str, template: &str, args: &[String]) -> Option<String> {
    if !template.contains('{') {
        return Some(format!("{}({})", template, args.join(", ")));
    }

    let mut out = String::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}')?;
        let slot = &after[..close];
        if slot == "*" {
            out.push_str(&args.join(", "));
        } else {
            let index: usize = slot.parse().ok()?;
            out.push_str(args.get(index.checked_sub(1)?)?);
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    tracing::trace!(function = name, "applied template");
    Some(out)
}
