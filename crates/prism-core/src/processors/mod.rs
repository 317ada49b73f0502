//! # Field Processors
//!
//! One strategy per aggregation shape. Each converts a single source column
//! into one or more [`OutputField`]s:
//!
//! | Aggregation | Processor             | Output                                  |
//! |-------------|-----------------------|-----------------------------------------|
//! | `histogram` | [`HistogramProcessor`] | one field per distinct `to` boundary   |
//! | `topk`      | [`TopkProcessor`]      | `key`, `count`, `error` (rows expand)  |
//! | anything    | [`RegularProcessor`]   | one field, same row count as the input |
//!
//! Selection looks only at the descriptor's aggregation metadata, never at
//! the field name.

mod histogram;
mod regular;
mod topk;

pub use histogram::HistogramProcessor;
pub use regular::RegularProcessor;
pub use topk::TopkProcessor;

use crate::diagnostics::Diagnostics;
use crate::frame::OutputField;
use crate::model::{AggregationOp, Cell, FieldDescriptor};

/// A column could not be converted at all. The builder skips the column.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("field `{field}` row {row}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        row: usize,
        expected: &'static str,
        found: &'static str,
    },
}

pub trait FieldProcessor {
    /// Convert one column. Cell-level problems that can be null-filled are
    /// recorded in `diagnostics`; only unrecoverable column problems error.
    fn process_column(
        &self,
        column: &[Cell],
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<OutputField>, FieldError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    Regular,
    Histogram,
    Topk,
}

impl ProcessorKind {
    pub fn for_field(field: &FieldDescriptor) -> Self {
        match field.aggregation.as_ref().map(|agg| &agg.op) {
            Some(AggregationOp::Histogram) => Self::Histogram,
            Some(AggregationOp::Topk) => Self::Topk,
            _ => Self::Regular,
        }
    }
}

/// Pick the processor for a column.
pub fn processor_for(field: &FieldDescriptor) -> Box<dyn FieldProcessor + '_> {
    match ProcessorKind::for_field(field) {
        ProcessorKind::Histogram => Box::new(HistogramProcessor::new(field)),
        ProcessorKind::Topk => Box::new(TopkProcessor::new(field)),
        ProcessorKind::Regular => Box::new(RegularProcessor::new(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;

    #[test]
    fn test_histogram_selected_by_aggregation() {
        let field = FieldDescriptor::new("latency", FieldType::Unknown)
            .with_aggregation(AggregationOp::Histogram);
        assert_eq!(ProcessorKind::for_field(&field), ProcessorKind::Histogram);
    }

    #[test]
    fn test_histogram_name_without_aggregation_is_regular() {
        let field = FieldDescriptor::new("histogram_foo", FieldType::Unknown);
        assert_eq!(ProcessorKind::for_field(&field), ProcessorKind::Regular);
    }

    #[test]
    fn test_topk_selected_by_aggregation() {
        let field =
            FieldDescriptor::new("x", FieldType::Array).with_aggregation(AggregationOp::Topk);
        assert_eq!(ProcessorKind::for_field(&field), ProcessorKind::Topk);

        let topk_named = FieldDescriptor::new("topk_x", FieldType::String);
        assert_eq!(ProcessorKind::for_field(&topk_named), ProcessorKind::Regular);
    }

    #[test]
    fn test_plain_aggregations_are_regular() {
        for op in [AggregationOp::Count, AggregationOp::Sum, AggregationOp::Avg] {
            let field = FieldDescriptor::new("v", FieldType::Float).with_aggregation(op);
            assert_eq!(ProcessorKind::for_field(&field), ProcessorKind::Regular);
        }
    }

    #[test]
    fn test_processor_for_dispatches_histogram() {
        let field = FieldDescriptor::new("histogram_foo", FieldType::Unknown)
            .with_aggregation(AggregationOp::Histogram);
        let column: Vec<Cell> =
            serde_json::from_str(r#"[[{"from": 0, "to": 1, "count": 4}]]"#).unwrap();
        let mut diagnostics = Diagnostics::new();
        let fields = processor_for(&field)
            .process_column(&column, &mut diagnostics)
            .unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].labels["le"], "1");
    }
}
