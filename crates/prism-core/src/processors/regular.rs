//! Plain scalar and array columns: one output field per source field.

use chrono::{DateTime, Utc};

use super::{FieldError, FieldProcessor};
use crate::diagnostics::Diagnostics;
use crate::frame::{FieldValues, OutputField};
use crate::model::{Cell, FieldDescriptor, FieldType};

pub struct RegularProcessor<'a> {
    field: &'a FieldDescriptor,
}

impl<'a> RegularProcessor<'a> {
    pub fn new(field: &'a FieldDescriptor) -> Self {
        Self { field }
    }

    /// Convert every non-null cell with `convert`. The closure returns
    /// `None` on a type mismatch and `Some(None)` for a recoverable null.
    fn collect<T>(
        &self,
        column: &[Cell],
        expected: &'static str,
        mut convert: impl FnMut(usize, &Cell) -> Option<Option<T>>,
    ) -> Result<Vec<Option<T>>, FieldError> {
        let mut out = Vec::with_capacity(column.len());
        for (row, cell) in column.iter().enumerate() {
            if cell.is_null() {
                out.push(None);
                continue;
            }
            match convert(row, cell) {
                Some(value) => out.push(value),
                None => {
                    return Err(FieldError::TypeMismatch {
                        field: self.field.name.clone(),
                        row,
                        expected,
                        found: cell.kind(),
                    })
                }
            }
        }
        Ok(out)
    }

    fn array_values(&self, column: &[Cell]) -> Result<FieldValues, FieldError> {
        let numeric = column
            .iter()
            .find(|cell| !cell.is_null())
            .and_then(Cell::as_array)
            .map_or(false, |items| {
                !items.is_empty() && items.iter().all(|item| item.as_f64().is_some())
            });

        if numeric {
            let values = self.collect(column, "array of numbers", |_, cell| {
                let items = cell.as_array()?;
                items
                    .iter()
                    .map(Cell::as_f64)
                    .collect::<Option<Vec<f64>>>()
                    .map(Some)
            })?;
            Ok(FieldValues::FloatArray(values))
        } else {
            let values = self.collect(column, "array", |_, cell| {
                let items = cell.as_array()?;
                Some(Some(
                    items
                        .iter()
                        .map(|item| (!item.is_null()).then(|| item.to_string()))
                        .collect(),
                ))
            })?;
            Ok(FieldValues::StringArray(values))
        }
    }
}

impl FieldProcessor for RegularProcessor<'_> {
    fn process_column(
        &self,
        column: &[Cell],
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<OutputField>, FieldError> {
        let name = self.field.name.as_str();
        let values = match &self.field.field_type {
            FieldType::Datetime => {
                FieldValues::Time(self.collect(column, "RFC 3339 string", |row, cell| {
                    let raw = cell.as_str()?;
                    match DateTime::parse_from_rfc3339(raw) {
                        Ok(ts) => Some(Some(ts.with_timezone(&Utc))),
                        Err(err) => {
                            diagnostics.record(
                                name,
                                Some(row),
                                format!("failed to parse datetime {:?}: {}", raw, err),
                            );
                            Some(None)
                        }
                    }
                })?)
            }
            FieldType::Integer | FieldType::Float => {
                FieldValues::Float64(self.collect(column, "number", |_, cell| {
                    cell.as_f64().map(Some)
                })?)
            }
            FieldType::Bool => FieldValues::Bool(self.collect(column, "bool", |_, cell| {
                match cell {
                    Cell::Bool(b) => Some(Some(*b)),
                    _ => None,
                }
            })?),
            FieldType::String => FieldValues::String(self.collect(column, "string", |_, cell| {
                cell.as_str().map(|s| Some(s.to_string()))
            })?),
            FieldType::Timespan => {
                FieldValues::String(self.collect(column, "timespan", |_, cell| match cell {
                    Cell::String(s) => Some(Some(s.clone())),
                    Cell::Number(n) => Some(Some(n.to_string())),
                    _ => None,
                })?)
            }
            FieldType::Array => self.array_values(column)?,
            FieldType::Unknown | FieldType::Other(_) => {
                FieldValues::String(self.collect(column, "any", |_, cell| {
                    Some(Some(cell.to_string()))
                })?)
            }
        };

        Ok(vec![OutputField::new(name, values)])
    }
}
