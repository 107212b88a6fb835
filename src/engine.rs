//! Conversion driver.
//!
//! Glues the stages together: parse once, specialize per operation,
//! generate one PostgreSQL `DO` block per non-empty specialization. Also
//! hosts the round-trip self check and the multi-file batch runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::{fs, thread};

use crate::ast::{Operation, Trigger};
use crate::config::Config;
use crate::diagnostics::{Component, Diagnostics, Severity};
use crate::error::{TriggerError, TriggerResult};
use crate::mapping::MappingTables;
use crate::parser;
use crate::specializer;
use crate::transpiler::{GenerateOptions, to_oracle, to_postgres};

/// One generated statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputStatement {
    Sql { sql: String },
}

impl OutputStatement {
    pub fn sql(&self) -> &str {
        match self {
            OutputStatement::Sql { sql } => sql,
        }
    }
}

/// The three-key result consumed by migration tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerOutput {
    pub on_insert: Vec<OutputStatement>,
    pub on_update: Vec<OutputStatement>,
    pub on_delete: Vec<OutputStatement>,
}

impl TriggerOutput {
    pub fn get(&self, op: Operation) -> &[OutputStatement] {
        match op {
            Operation::Insert => &self.on_insert,
            Operation::Update => &self.on_update,
            Operation::Delete => &self.on_delete,
        }
    }

    fn slot(&mut self, op: Operation) -> &mut Vec<OutputStatement> {
        match op {
            Operation::Insert => &mut self.on_insert,
            Operation::Update => &mut self.on_update,
            Operation::Delete => &mut self.on_delete,
        }
    }

    pub fn to_json(&self) -> TriggerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Everything produced for one trigger.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub trigger: Trigger,
    pub output: TriggerOutput,
    pub diagnostics: Diagnostics,
}

/// Stateless converter holding the shared, read-only inputs of every stage.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    tables: MappingTables,
    options: GenerateOptions,
}

impl Engine {
    pub fn new(tables: MappingTables, options: GenerateOptions) -> Self {
        Self { tables, options }
    }

    /// Engine for `config`. Mapping load failures land in `diags`.
    pub fn from_config(config: &Config, diags: &mut Diagnostics) -> Self {
        Self::new(config.mapping_tables(diags), config.generate.clone())
    }

    pub fn tables(&self) -> &MappingTables {
        &self.tables
    }

    /// Convert one trigger text. Only a parse failure is an error.
    pub fn convert(&self, source: &str) -> TriggerResult<Conversion> {
        let mut diags = Diagnostics::new();
        let trigger = parser::parse_with(source, &mut diags)?;

        let mut output = TriggerOutput::default();
        for op in Operation::ALL {
            *output.slot(op) = self.convert_operation(&trigger, op, &mut diags);
        }

        Ok(Conversion {
            trigger,
            output,
            diagnostics: diags,
        })
    }

    fn convert_operation(
        &self,
        trigger: &Trigger,
        op: Operation,
        diags: &mut Diagnostics,
    ) -> Vec<OutputStatement> {
        if !trigger.fires_on(op) {
            diags.info(
                Component::Engine,
                format!("trigger does not fire on {}; no output", op),
            );
            return Vec::new();
        }
        let specialized = specializer::specialize_with(trigger, op, diags);
        if specialized.body().is_empty() {
            diags.info(
                Component::Engine,
                format!("nothing left to run on {}; no output", op),
            );
            return Vec::new();
        }
        let sql = to_postgres(&specialized, &self.tables, &self.options, diags);
        vec![OutputStatement::Sql { sql }]
    }

    /// Convert several files on `jobs` worker threads (0 = one per core).
    /// Reports come back in input order, one per path; a failing or
    /// panicking file never stops the others.
    pub fn batch(&self, paths: &[PathBuf], jobs: usize) -> Vec<FileReport> {
        run_batch(paths, jobs, |path| self.convert_file(path))
    }

    pub fn convert_file(&self, path: &Path) -> FileReport {
        let result = fs::read_to_string(path)
            .map_err(TriggerError::from)
            .and_then(|source| self.convert(&source));
        match &result {
            Ok(conversion) => tracing::debug!(
                path = %path.display(),
                diagnostics = conversion.diagnostics.len(),
                "converted"
            ),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "skipped"),
        }
        FileReport {
            path: path.to_path_buf(),
            result,
        }
    }
}

fn run_batch<F>(paths: &[PathBuf], jobs: usize, convert: F) -> Vec<FileReport>
where
    F: Fn(&Path) -> FileReport + Sync,
{
    let workers = worker_count(jobs, paths.len());
    let next = AtomicUsize::new(0);
    tracing::info!(files = paths.len(), workers, "starting batch");

    let mut indexed: Vec<(usize, FileReport)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut done = Vec::new();
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some(path) = paths.get(i) else {
                            break;
                        };
                        let report = panic::catch_unwind(AssertUnwindSafe(|| convert(path)))
                            .unwrap_or_else(|payload| {
                                let message = panic_message(payload.as_ref());
                                tracing::error!(path = %path.display(), %message, "conversion panicked");
                                FileReport {
                                    path: path.clone(),
                                    result: Err(TriggerError::Internal(message)),
                                }
                            });
                        done.push((i, report));
                    }
                    done
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
            .collect()
    });

    indexed.sort_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, report)| report).collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn worker_count(jobs: usize, files: usize) -> usize {
    let jobs = if jobs == 0 {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    } else {
        jobs
    };
    jobs.min(files).max(1)
}

/// Convert with explicit tables and options.
pub fn transpile(
    source: &str,
    tables: &MappingTables,
    options: &GenerateOptions,
) -> TriggerResult<TriggerOutput> {
    let engine = Engine::new(tables.clone(), options.clone());
    Ok(engine.convert(source)?.output)
}

/// Parse, render back to Oracle, parse again and compare.
///
/// Returns the canonical Oracle text on success.
pub fn roundtrip(source: &str) -> TriggerResult<String> {
    let trigger = parser::parse(source)?;
    let rendered = to_oracle(&trigger);
    let reparsed = parser::parse(&rendered)?;
    if reparsed == trigger {
        return Ok(rendered);
    }

    let detail = if reparsed.header != trigger.header {
        "trigger header differs".to_string()
    } else if reparsed.declarations != trigger.declarations {
        "declarations differ".to_string()
    } else {
        let position = trigger
            .body()
            .iter()
            .zip(reparsed.body())
            .position(|(a, b)| a != b);
        match position {
            Some(i) => format!(
                "statement {} ({}) differs",
                i + 1,
                trigger.body()[i].type_name()
            ),
            None => "statement lists or handlers differ".to_string(),
        }
    };
    Err(TriggerError::RoundTrip(detail))
}

/// Outcome for one input file of a batch.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub result: TriggerResult<Conversion>,
}

/// Summary of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: usize,
    pub converted: usize,
    pub failed: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>, reports: &[FileReport]) -> Self {
        let mut report = Self {
            started_at,
            finished_at: Utc::now(),
            files: reports.len(),
            converted: 0,
            failed: 0,
            warnings: 0,
            errors: 0,
        };
        for file in reports {
            match &file.result {
                Ok(conversion) => {
                    report.converted += 1;
                    report.warnings += conversion.diagnostics.count(Severity::Warning);
                    report.errors += conversion.diagnostics.count(Severity::Error);
                }
                Err(_) => report.failed += 1,
            }
        }
        report
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
