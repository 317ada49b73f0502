//! # Output Frames
//!
//! Column-major visualization frames handed to the host. Every field in a
//! frame holds a strongly-typed, nullable value sequence; after the builder
//! runs, all fields in a frame have the same length.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Physical value type of an [`OutputField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Time,
    Float64,
    Bool,
    String,
    FloatArray,
    StringArray,
}

/// Nullable value sequence of one output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FieldValues {
    Time(Vec<Option<DateTime<Utc>>>),
    Float64(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    String(Vec<Option<String>>),
    FloatArray(Vec<Option<Vec<f64>>>),
    StringArray(Vec<Option<Vec<Option<String>>>>),
}

impl FieldValues {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Time(_) => FieldKind::Time,
            Self::Float64(_) => FieldKind::Float64,
            Self::Bool(_) => FieldKind::Bool,
            Self::String(_) => FieldKind::String,
            Self::FloatArray(_) => FieldKind::FloatArray,
            Self::StringArray(_) => FieldKind::StringArray,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Time(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::String(v) => v.len(),
            Self::FloatArray(v) => v.len(),
            Self::StringArray(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_null(&mut self) {
        match self {
            Self::Time(v) => v.push(None),
            Self::Float64(v) => v.push(None),
            Self::Bool(v) => v.push(None),
            Self::String(v) => v.push(None),
            Self::FloatArray(v) => v.push(None),
            Self::StringArray(v) => v.push(None),
        }
    }

    /// Append nulls until the sequence holds `len` entries.
    pub fn pad_to(&mut self, len: usize) {
        while self.len() < len {
            self.push_null();
        }
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            Self::Time(v) => v.get(row).map_or(true, Option::is_none),
            Self::Float64(v) => v.get(row).map_or(true, Option::is_none),
            Self::Bool(v) => v.get(row).map_or(true, Option::is_none),
            Self::String(v) => v.get(row).map_or(true, Option::is_none),
            Self::FloatArray(v) => v.get(row).map_or(true, Option::is_none),
            Self::StringArray(v) => v.get(row).map_or(true, Option::is_none),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputField {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub values: FieldValues,
}

impl OutputField {
    pub fn new(name: impl Into<String>, values: FieldValues) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            values,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `name {k="v", ...}`, or whichever half is non-empty.
    pub fn display_name(&self) -> String {
        if self.labels.is_empty() {
            return self.name.clone();
        }
        let labels = self
            .labels
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        if self.name.is_empty() {
            format!("{{{}}}", labels)
        } else {
            format!("{} {{{}}}", self.name, labels)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub severity: Severity,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameMeta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub name: String,
    pub fields: Vec<OutputField>,
    #[serde(default)]
    pub meta: FrameMeta,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            meta: FrameMeta::default(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<OutputField>) -> Self {
        self.fields = fields;
        self
    }

    /// Length of the longest field.
    pub fn row_count(&self) -> usize {
        self.fields.iter().map(OutputField::len).max().unwrap_or(0)
    }

    pub fn is_uniform(&self) -> bool {
        let rows = self.row_count();
        self.fields.iter().all(|f| f.len() == rows)
    }

    /// Pad every field with nulls up to the longest field.
    pub fn pad_to_uniform(&mut self) {
        let rows = self.row_count();
        for field in &mut self.fields {
            field.values.pad_to(rows);
        }
    }

    pub fn field(&self, name: &str) -> Option<&OutputField> {
        self.fields.iter().find(|f| f.name == name)
    }
}
