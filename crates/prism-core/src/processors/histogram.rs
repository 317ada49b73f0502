//! Histogram columns: each cell is an array of `{from, to, count}` buckets.
//!
//! Boundaries are not uniform across rows, so the processor first collects
//! the union of every `to` value in the column, then emits one
//! `le`-labelled field per boundary with a null wherever a row lacks that
//! bucket.

use std::collections::HashMap;

use super::{FieldError, FieldProcessor};
use crate::diagnostics::Diagnostics;
use crate::frame::{FieldValues, OutputField};
use crate::model::{Cell, FieldDescriptor};

pub struct HistogramProcessor<'a> {
    field: &'a FieldDescriptor,
}

/// `(to, count)` pairs of one row.
type RowBuckets = Vec<(f64, Option<f64>)>;

impl<'a> HistogramProcessor<'a> {
    pub fn new(field: &'a FieldDescriptor) -> Self {
        Self { field }
    }

    fn parse_row(&self, row: usize, cell: &Cell, diagnostics: &mut Diagnostics) -> RowBuckets {
        let buckets = match cell {
            Cell::Null => return Vec::new(),
            Cell::Array(buckets) => buckets,
            other => {
                diagnostics.record(
                    &self.field.name,
                    Some(row),
                    format!("expected histogram bucket array, found {}", other.kind()),
                );
                return Vec::new();
            }
        };

        let mut parsed = Vec::with_capacity(buckets.len());
        for bucket in buckets {
            match bucket.get("to").and_then(Cell::as_f64) {
                Some(to) => parsed.push((
                    normalize_boundary(to),
                    bucket.get("count").and_then(Cell::as_f64),
                )),
                None => diagnostics.record(
                    &self.field.name,
                    Some(row),
                    "histogram bucket without numeric `to` boundary",
                ),
            }
        }
        parsed
    }
}

/// `-0.0` and `0.0` are the same bucket.
fn normalize_boundary(to: f64) -> f64 {
    if to == 0.0 {
        0.0
    } else {
        to
    }
}

/// Shortest decimal string that round-trips to the same `f64`.
fn format_boundary(boundary: f64) -> String {
    format!("{}", boundary)
}

impl FieldProcessor for HistogramProcessor<'_> {
    fn process_column(
        &self,
        column: &[Cell],
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<OutputField>, FieldError> {
        let rows: Vec<RowBuckets> = column
            .iter()
            .enumerate()
            .map(|(row, cell)| self.parse_row(row, cell, diagnostics))
            .collect();

        let mut boundaries: Vec<f64> = rows
            .iter()
            .flat_map(|buckets| buckets.iter().map(|(to, _)| *to))
            .collect();
        boundaries.sort_by(f64::total_cmp);
        boundaries.dedup_by(|a, b| a.to_bits() == b.to_bits());

        let mut series: Vec<Vec<Option<f64>>> = boundaries
            .iter()
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();

        for buckets in &rows {
            let counts: HashMap<u64, Option<f64>> = buckets
                .iter()
                .map(|(to, count)| (to.to_bits(), *count))
                .collect();
            for (boundary, values) in boundaries.iter().zip(series.iter_mut()) {
                values.push(counts.get(&boundary.to_bits()).copied().flatten());
            }
        }

        Ok(boundaries
            .into_iter()
            .zip(series)
            .map(|(boundary, values)| {
                OutputField::new("", FieldValues::Float64(values))
                    .with_label("le", format_boundary(boundary))
            })
            .collect())
    }
}
