//! # Long → Wide
//!
//! A long frame has one row per (time, group) combination:
//!
//! ```text
//! _time  host  count        _time  count {host="a"}  count {host="b"}
//! t0     a     1       →    t0     1                 2
//! t0     b     2            t1     3                 null
//! t1     a     3
//! ```
//!
//! The wide frame has one row per distinct time and one column per
//! (group values × value field) combination. Only the fields the engine
//! grouped by are keys, float fields are values; group values become
//! labels on the value columns.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::frame::{FieldValues, Frame, OutputField};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReshapeError {
    #[error("frame has no time field")]
    NoTimeField,
    #[error("frame has no group-by fields")]
    NoGroupFields,
    #[error("frame has no numeric value fields")]
    NoValueFields,
    #[error("row {row} has a null time")]
    NullTime { row: usize },
    #[error("field `{field}` cannot be reshaped")]
    UnsupportedField { field: String },
    #[error("more than one row for time {time} and the same group")]
    DuplicateCell { time: DateTime<Utc> },
}

/// Group key value of one row; `None` for a null key.
type GroupKey = Vec<Option<String>>;

fn group_value(values: &FieldValues, row: usize) -> Option<String> {
    match values {
        FieldValues::String(v) => v.get(row).cloned().flatten(),
        FieldValues::Bool(v) => v.get(row).copied().flatten().map(|b| b.to_string()),
        FieldValues::Float64(v) => v.get(row).copied().flatten().map(|n| n.to_string()),
        _ => None,
    }
}

/// Reshape a long frame into a wide one, keyed by the `group_by` fields.
///
/// Fields outside `group_by` must be the time field or numeric values.
/// The input is left untouched; callers fall back to it on error.
pub fn long_to_wide(long: &Frame, group_by: &[&str]) -> Result<Frame, ReshapeError> {
    let mut time_field = None;
    let mut group_fields = Vec::new();
    let mut value_fields = Vec::new();

    for field in &long.fields {
        match &field.values {
            FieldValues::Time(times) if time_field.is_none() => time_field = Some((field, times)),
            FieldValues::String(_) | FieldValues::Bool(_) | FieldValues::Float64(_)
                if group_by.contains(&field.name.as_str()) =>
            {
                group_fields.push(field)
            }
            FieldValues::Float64(values) => value_fields.push((field, values)),
            _ => {
                return Err(ReshapeError::UnsupportedField {
                    field: field.display_name(),
                })
            }
        }
    }

    let (time_field, times) = time_field.ok_or(ReshapeError::NoTimeField)?;
    if group_fields.is_empty() {
        return Err(ReshapeError::NoGroupFields);
    }
    if value_fields.is_empty() {
        return Err(ReshapeError::NoValueFields);
    }

    let rows = long.row_count();
    let mut row_times = Vec::with_capacity(rows);
    for row in 0..rows {
        match times.get(row).copied().flatten() {
            Some(ts) => row_times.push(ts),
            None => return Err(ReshapeError::NullTime { row }),
        }
    }

    let distinct: BTreeSet<DateTime<Utc>> = row_times.iter().copied().collect();
    let time_index: HashMap<DateTime<Utc>, usize> = distinct
        .iter()
        .enumerate()
        .map(|(index, ts)| (*ts, index))
        .collect();

    // groups in order of first appearance
    let mut groups: Vec<GroupKey> = Vec::new();
    let mut group_index: HashMap<GroupKey, usize> = HashMap::new();
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    let mut cells: HashMap<(usize, usize), Vec<Option<f64>>> = HashMap::new();

    for (row, ts) in row_times.iter().enumerate() {
        let key: GroupKey = group_fields
            .iter()
            .map(|field| group_value(&field.values, row))
            .collect();
        let group = *group_index.entry(key.clone()).or_insert_with(|| {
            groups.push(key);
            groups.len() - 1
        });

        let slot = time_index[ts];
        if !seen.insert((slot, group)) {
            return Err(ReshapeError::DuplicateCell { time: *ts });
        }

        for (value_pos, (_, values)) in value_fields.iter().enumerate() {
            let column = cells
                .entry((value_pos, group))
                .or_insert_with(|| vec![None; distinct.len()]);
            column[slot] = values.get(row).copied().flatten();
        }
    }

    let mut fields = Vec::with_capacity(1 + value_fields.len() * groups.len());
    fields.push(OutputField::new(
        time_field.name.clone(),
        FieldValues::Time(distinct.iter().copied().map(Some).collect()),
    ));

    for (value_pos, (value_field, _)) in value_fields.iter().enumerate() {
        for (group, key) in groups.iter().enumerate() {
            let mut labels: BTreeMap<String, String> = value_field.labels.clone();
            for (field, value) in group_fields.iter().zip(key) {
                if labels.contains_key(&field.name) {
                    return Err(ReshapeError::UnsupportedField {
                        field: field.name.clone(),
                    });
                }
                labels.insert(field.name.clone(), value.clone().unwrap_or_default());
            }
            let values = cells
                .remove(&(value_pos, group))
                .unwrap_or_else(|| vec![None; distinct.len()]);
            fields.push(
                OutputField::new(value_field.name.clone(), FieldValues::Float64(values))
                    .with_labels(labels),
            );
        }
    }

    let mut wide = Frame::new(long.name.clone()).with_fields(fields);
    wide.meta = long.meta.clone();
    Ok(wide)
}
