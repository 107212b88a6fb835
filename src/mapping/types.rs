//! Oracle → PostgreSQL type translation.

use super::MappingTables;
use super::defaults::SIZED_TYPES;
use crate::diagnostics::{Component, Diagnostics};

/// `NUMBER(10, 2) WITH …` split into base name, size text and suffix.
struct TypeParts<'a> {
    base: String,
    size: Option<&'a str>,
    suffix: String,
}

fn split_type(text: &str) -> TypeParts<'_> {
    match (text.find('('), text.rfind(')')) {
        (Some(open), Some(close)) if close > open => TypeParts {
            base: text[..open].trim().to_ascii_uppercase(),
            size: Some(text[open + 1..close].trim()),
            suffix: text[close + 1..].trim().to_ascii_uppercase(),
        },
        _ => TypeParts {
            base: text.trim().to_ascii_uppercase(),
            size: None,
            suffix: String::new(),
        },
    }
}

/// Drop Oracle length semantics: `20 BYTE` → `20`, `10 CHAR` → `10`.
/// Everything else in the size text is kept as written.
fn strip_length_semantics(size: &str) -> String {
    size.split(',')
        .map(|part| {
            let kept = part.trim_end();
            let upper = kept.to_ascii_uppercase();
            if upper.ends_with(" BYTE") || upper.ends_with(" CHAR") {
                kept[..kept.len() - 5].trim_end()
            } else {
                part
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn accepts_size(pg_type: &str) -> bool {
    SIZED_TYPES.iter().any(|t| t.eq_ignore_ascii_case(pg_type))
}

impl MappingTables {
    /// Map one declared type. Unknown types and unresolved `%TYPE`
    /// references pass through unchanged with one warning.
    pub fn map_type(&self, oracle_type: &str, diags: &mut Diagnostics) -> String {
        let upper = oracle_type.trim().to_ascii_uppercase();

        if upper.ends_with("%ROWTYPE") {
            return oracle_type.to_string();
        }
        if let Some(reference) = upper.strip_suffix("%TYPE") {
            return match self.column_type(reference) {
                Some(column) => self.translate(column).unwrap_or_else(|| {
                    diags.warn(
                        Component::Mapping,
                        format!(
                            "column type '{}' of '{}' has no mapping; passed through",
                            column, reference
                        ),
                    );
                    column.to_string()
                }),
                None => {
                    diags.warn(
                        Component::Mapping,
                        format!("unresolved %TYPE reference '{}' passed through", oracle_type),
                    );
                    oracle_type.to_string()
                }
            };
        }

        self.translate(oracle_type).unwrap_or_else(|| {
            diags.warn(
                Component::Mapping,
                format!("unmapped type '{}' passed through", oracle_type),
            );
            oracle_type.to_string()
        })
    }

    fn translate(&self, oracle_type: &str) -> Option<String> {
        let parts = split_type(oracle_type);

        let (target, suffix) = if parts.suffix.is_empty() {
            (self.types.get(&parts.base)?, String::new())
        } else {
            let full = format!("{} {}", parts.base, parts.suffix);
            match self.types.get(&full) {
                Some(target) => (target, String::new()),
                None => (self.types.get(&parts.base)?, parts.suffix.clone()),
            }
        };

        let mut out = match parts.size {
            Some(size) if !target.contains('(') && accepts_size(target) => {
                format!("{}({})", target, strip_length_semantics(size))
            }
            _ => target.clone(),
        };
        if !suffix.is_empty() {
            out.push(' ');
            out.push_str(&suffix);
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(text: &str) -> (String, usize) {
        let tables = MappingTables::builtin();
        let mut diags = Diagnostics::new();
        let out = tables.map_type(text, &mut diags);
        (out, diags.len())
    }

    #[test]
    fn test_map_sized_types() {
        assert_eq!(map("NUMBER(10, 2)"), ("NUMERIC(10, 2)".to_string(), 0));
        assert_eq!(map("varchar2(20 BYTE)"), ("VARCHAR(20)".to_string(), 0));
        assert_eq!(map("NUMBER(10,2)"), ("NUMERIC(10,2)".to_string(), 0));
        assert_eq!(map("NUMBER"), ("NUMERIC".to_string(), 0));
    }

    #[test]
    fn test_map_drops_unsupported_size() {
        assert_eq!(map("RAW(16)"), ("BYTEA".to_string(), 0));
        assert_eq!(map("FLOAT(126)"), ("DOUBLE PRECISION".to_string(), 0));
        assert_eq!(map("DATE"), ("TIMESTAMP(0)".to_string(), 0));
    }

    #[test]
    fn test_map_timestamp_with_time_zone() {
        assert_eq!(
            map("TIMESTAMP(6) WITH TIME ZONE"),
            ("TIMESTAMPTZ(6)".to_string(), 0)
        );
    }

    #[test]
    fn test_unmapped_type_warns_once() {
        assert_eq!(map("SDO_GEOMETRY"), ("SDO_GEOMETRY".to_string(), 1));
    }

    #[test]
    fn test_type_reference() {
        assert_eq!(map("emp.sal%TYPE"), ("emp.sal%TYPE".to_string(), 1));
        assert_eq!(map("emp%ROWTYPE"), ("emp%ROWTYPE".to_string(), 0));

        let mut tables = MappingTables::builtin();
        tables
            .columns
            .insert("EMP.SAL".to_string(), "NUMBER(8,2)".to_string());
        let mut diags = Diagnostics::new();
        assert_eq!(tables.map_type("emp.sal%TYPE", &mut diags), "NUMERIC(8,2)");
        assert!(diags.is_empty());
    }
}
