//! # trigport
//!
//! Converts Oracle PL/SQL trigger bodies into PostgreSQL `DO` blocks, one
//! per DML operation.
//!
//! A trigger is parsed once into an immutable tree. The tree is then
//! specialized for `INSERT`, `UPDATE` and `DELETE`: every guard testing
//! `INSERTING`, `UPDATING` or `DELETING` is resolved and dead branches are
//! pruned. Each surviving tree is rendered as PL/pgSQL through the mapping
//! tables.
//!
//! ## Quick Example
//!
//! ```
//! use trigport::prelude::*;
//!
//! let output = trigport::convert(
//!     "BEGIN
//!        IF INSERTING THEN
//!          :NEW.code := SUBSTR(:NEW.name, 1, 2);
//!        END IF;
//!      END;",
//! )
//! .unwrap();
//!
//! assert!(output.on_insert[0].sql().contains("SUBSTRING(:new_name FROM 1 FOR 2)"));
//! assert!(output.on_update.is_empty());
//! ```
//!
//! ## Pipeline
//!
//! | Stage         | Module          | Output                      |
//! |---------------|-----------------|-----------------------------|
//! | Parse         | [`parser`]      | [`Trigger`](ast::Trigger)   |
//! | Specialize    | [`specializer`] | one `Trigger` per operation |
//! | Generate      | [`transpiler`]  | `DO $$ … $$;` text          |
//! | Drive         | [`engine`]      | [`TriggerOutput`]           |

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod parser;
pub mod specializer;
pub mod transpiler;

pub use engine::{Engine, TriggerOutput};

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::Config;
    pub use crate::diagnostics::{Component, Diagnostic, Diagnostics, Severity};
    pub use crate::engine::{Conversion, Engine, OutputStatement, TriggerOutput, roundtrip, transpile};
    pub use crate::error::*;
    pub use crate::mapping::MappingTables;
    pub use crate::parser::parse;
    pub use crate::specializer::specialize;
    pub use crate::transpiler::{Dialect, GenerateOptions, to_oracle, to_postgres};
}

/// Convert one trigger with the built-in mapping tables and default
/// options.
///
/// # Example
///
/// ```
/// let output = trigport::convert("BEGIN NULL; END;").unwrap();
/// assert_eq!(output.on_delete.len(), 1);
/// ```
pub fn convert(source: &str) -> error::TriggerResult<TriggerOutput> {
    Ok(Engine::default().convert(source)?.output)
}
