//! # Diagnostics
//!
//! Collector for recoverable decode problems. Processors and the frame
//! builder receive it explicitly; each entry is also emitted through
//! `tracing` at warn level.

use std::fmt;

use crate::frame::{Notice, Severity};

/// A single recoverable issue, scoped to a field and optionally a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub field: String,
    pub row: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "{} (row {}): {}", self.field, row, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, field: &str, row: Option<usize>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(field, row = ?row, %message, "recoverable decode issue");
        self.entries.push(Diagnostic {
            field: field.to_string(),
            row,
            message,
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert into warning notices for the host.
    pub fn into_notices(self) -> Vec<Notice> {
        self.entries
            .into_iter()
            .map(|entry| Notice {
                severity: Severity::Warning,
                text: entry.to_string(),
            })
            .collect()
    }
}
