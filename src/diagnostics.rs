//! Structured diagnostics emitted by the pipeline stages.
//!
//! Stages never format or route log output themselves. They push
//! [`Diagnostic`] values into a [`Diagnostics`] collector, which also
//! forwards each one as a `tracing` event. The installed subscriber decides
//! format and destination.

use serde::Serialize;
use std::fmt;

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Parser,
    Specializer,
    Generator,
    Mapping,
    Engine,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::Parser => "parser",
            Component::Specializer => "specializer",
            Component::Generator => "generator",
            Component::Mapping => "mapping",
            Component::Engine => "engine",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// A single structured event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub component: Component,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "[{}] {} (line {}): {}",
                self.component, self.severity, line, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.component, self.severity, self.message),
        }
    }
}

/// Ordered collection of diagnostics for one trigger.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and forward it to the `tracing` subscriber.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        let Diagnostic {
            component,
            severity,
            message,
            line,
        } = &diagnostic;
        let component = component.to_string();
        match severity {
            Severity::Info => {
                tracing::debug!(component = %component, line = ?line, "{}", message)
            }
            Severity::Warning => {
                tracing::warn!(component = %component, line = ?line, "{}", message)
            }
            Severity::Error => {
                tracing::error!(component = %component, line = ?line, "{}", message)
            }
        }
        self.items.push(diagnostic);
    }

    pub fn info(&mut self, component: Component, message: impl Into<String>) {
        self.record(component, Severity::Info, message.into(), None);
    }

    pub fn warn(&mut self, component: Component, message: impl Into<String>) {
        self.record(component, Severity::Warning, message.into(), None);
    }

    pub fn warn_at(&mut self, component: Component, line: usize, message: impl Into<String>) {
        self.record(component, Severity::Warning, message.into(), Some(line));
    }

    pub fn error(&mut self, component: Component, message: impl Into<String>) {
        self.record(component, Severity::Error, message.into(), None);
    }

    fn record(
        &mut self,
        component: Component,
        severity: Severity,
        message: String,
        line: Option<usize>,
    ) {
        self.push(Diagnostic {
            component,
            severity,
            message,
            line,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Count of diagnostics at the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.items.iter().filter(|d| d.severity == severity).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
