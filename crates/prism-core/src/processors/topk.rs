//! Top-k columns: each cell is a ranked array of `{key, count, error?}`.
//!
//! Every entry becomes its own output row, so this processor changes the
//! row cardinality of the table. Null or malformed cells still occupy one
//! row (a null triplet) to keep the remaining rows aligned.

use super::{FieldError, FieldProcessor};
use crate::diagnostics::Diagnostics;
use crate::frame::{FieldValues, OutputField};
use crate::model::{Cell, FieldDescriptor};

pub struct TopkProcessor<'a> {
    field: &'a FieldDescriptor,
}

#[derive(Default)]
struct Columns {
    key: Vec<Option<String>>,
    count: Vec<Option<f64>>,
    error: Vec<Option<f64>>,
}

impl Columns {
    fn push_null(&mut self) {
        self.key.push(None);
        self.count.push(None);
        self.error.push(None);
    }

    fn push_entry(&mut self, entry: &Cell) {
        let key = match entry.get("key") {
            None | Some(Cell::Null) => None,
            Some(Cell::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };
        self.key.push(key);
        self.count.push(entry.get("count").and_then(Cell::as_f64));
        self.error.push(entry.get("error").and_then(Cell::as_f64));
    }
}

impl<'a> TopkProcessor<'a> {
    pub fn new(field: &'a FieldDescriptor) -> Self {
        Self { field }
    }
}

impl FieldProcessor for TopkProcessor<'_> {
    fn process_column(
        &self,
        column: &[Cell],
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<OutputField>, FieldError> {
        let mut out = Columns::default();

        for (row, cell) in column.iter().enumerate() {
            let entries = match cell {
                Cell::Null => {
                    out.push_null();
                    continue;
                }
                Cell::Array(entries) => entries,
                other => {
                    diagnostics.record(
                        &self.field.name,
                        Some(row),
                        format!("expected top-k entry array, found {}", other.kind()),
                    );
                    out.push_null();
                    continue;
                }
            };

            for entry in entries {
                if matches!(entry, Cell::Map(_)) {
                    out.push_entry(entry);
                } else {
                    diagnostics.record(
                        &self.field.name,
                        Some(row),
                        format!("expected top-k entry map, found {}", entry.kind()),
                    );
                    out.push_null();
                }
            }
        }

        Ok(vec![
            OutputField::new("key", FieldValues::String(out.key)),
            OutputField::new("count", FieldValues::Float64(out.count)),
            OutputField::new("error", FieldValues::Float64(out.error)),
        ])
    }
}
