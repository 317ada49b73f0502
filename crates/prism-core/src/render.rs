//! # Render Policy
//!
//! Decides which table of a result becomes the returned frame and whether
//! the long→wide reshape is attempted.

use serde::{Deserialize, Serialize};

use crate::builder::{build_frame, DEFAULT_FRAME_NAME};
use crate::diagnostics::Diagnostics;
use crate::frame::Frame;
use crate::model::{QueryResult, Table};
use crate::reshape::long_to_wide;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Render the `_totals` summary table instead of the primary table.
    #[serde(default)]
    pub totals: bool,
}

/// Pick the single table to render.
pub fn select_table(result: &QueryResult, options: RenderOptions) -> Option<&Table> {
    let primary = result
        .tables
        .iter()
        .find(|t| !t.is_totals())
        .or_else(|| result.tables.first());

    if !options.totals {
        return primary;
    }

    let totals = result
        .tables
        .iter()
        .find(|t| t.is_totals())
        .or_else(|| result.tables.get(1));
    if totals.is_none() {
        tracing::warn!("totals requested but result has no totals table, rendering primary");
    }
    totals.or(primary)
}

/// Render a query result into one frame.
///
/// Without `totals`, the primary table is reshaped long→wide by its
/// declared groups; when the reshape cannot proceed the long frame is
/// returned unchanged.
pub fn render(result: &QueryResult, options: RenderOptions, diagnostics: &mut Diagnostics) -> Frame {
    let Some(table) = select_table(result, options) else {
        return Frame::new(DEFAULT_FRAME_NAME);
    };

    let frame = build_frame(table, diagnostics);
    if options.totals {
        return frame;
    }

    let group_by: Vec<&str> = table.groups.iter().map(|g| g.name.as_str()).collect();
    match long_to_wide(&frame, &group_by) {
        Ok(wide) => wide,
        Err(err) => {
            tracing::warn!(error = %err, frame = %frame.name, "long to wide reshape failed, keeping long frame");
            frame
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FieldValues;

    fn result(json: &str) -> QueryResult {
        serde_json::from_str(json).unwrap()
    }

    const GROUPED: &str = r#"{
        "tables": [
            {
                "name": "0",
                "fields": [
                    {"name": "_time", "type": "datetime"},
                    {"name": "method", "type": "string"},
                    {"name": "count_", "type": "integer", "agg": {"name": "count"}}
                ],
                "columns": [
                    ["2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z"],
                    ["GET", "POST", "GET"],
                    [10, 2, 12]
                ],
                "groups": [{"name": "method"}]
            },
            {
                "name": "_totals",
                "fields": [
                    {"name": "method", "type": "string"},
                    {"name": "count_", "type": "integer", "agg": {"name": "count"}}
                ],
                "columns": [["GET", "POST"], [22, 2]],
                "groups": [{"name": "method"}]
            }
        ]
    }"#;

    #[test]
    fn test_primary_table_is_reshaped() {
        let mut diagnostics = Diagnostics::new();
        let frame = render(&result(GROUPED), RenderOptions::default(), &mut diagnostics);
        assert_eq!(frame.name, "0");
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.fields.len(), 3);
        assert_eq!(frame.fields[1].display_name(), "count_ {method=\"GET\"}");
        assert_eq!(
            frame.fields[1].values,
            FieldValues::Float64(vec![Some(10.0), Some(12.0)])
        );
    }

    #[test]
    fn test_totals_table_is_rendered_as_is() {
        let mut diagnostics = Diagnostics::new();
        let frame = render(&result(GROUPED), RenderOptions { totals: true }, &mut diagnostics);
        assert_eq!(frame.name, "_totals");
        assert_eq!(frame.fields.len(), 2);
        assert_eq!(
            frame.field("count_").unwrap().values,
            FieldValues::Float64(vec![Some(22.0), Some(2.0)])
        );
    }

    #[test]
    fn test_reshape_failure_returns_long_frame_unchanged() {
        let plain = result(
            r#"{"tables": [{
                "name": "0",
                "fields": [{"name": "_time", "type": "datetime"}, {"name": "count_", "type": "integer"}],
                "columns": [["2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z"], [1, 2]]
            }]}"#,
        );
        let mut diagnostics = Diagnostics::new();
        let rendered = render(&plain, RenderOptions::default(), &mut diagnostics);

        let mut expected_diagnostics = Diagnostics::new();
        let long = build_frame(&plain.tables[0], &mut expected_diagnostics);
        assert_eq!(rendered, long);
    }

    #[test]
    fn test_ungrouped_rows_are_not_pivoted() {
        let rows = result(
            r#"{"tables": [{
                "name": "0",
                "fields": [
                    {"name": "_time", "type": "datetime"},
                    {"name": "message", "type": "string"},
                    {"name": "status", "type": "float"}
                ],
                "columns": [
                    ["2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z"],
                    ["GET /a", "POST /b"],
                    [200, 201]
                ],
                "groups": []
            }]}"#,
        );
        let mut diagnostics = Diagnostics::new();
        let rendered = render(&rows, RenderOptions::default(), &mut diagnostics);

        let names: Vec<String> = rendered.fields.iter().map(|f| f.display_name()).collect();
        assert_eq!(names, vec!["_time", "message", "status"]);
        assert_eq!(rendered.row_count(), 2);
    }

    #[test]
    fn test_totals_missing_falls_back_to_primary() {
        let single = result(
            r#"{"tables": [{"name": "0", "fields": [{"name": "n", "type": "float"}], "columns": [[1]]}]}"#,
        );
        let mut diagnostics = Diagnostics::new();
        let frame = render(&single, RenderOptions { totals: true }, &mut diagnostics);
        assert_eq!(frame.name, "0");
    }

    #[test]
    fn test_no_tables_renders_empty_frame() {
        let mut diagnostics = Diagnostics::new();
        let frame = render(&QueryResult::default(), RenderOptions::default(), &mut diagnostics);
        assert_eq!(frame.name, DEFAULT_FRAME_NAME);
        assert!(frame.fields.is_empty());
    }
}
