//! # Result Model
//!
//! Typed view of the engine's tabular response envelope. Every cell is
//! decoded into a [`Cell`] sum type so that processors can match on it
//! exhaustively instead of asserting on untyped values.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::diagnostics::Diagnostics;

/// Name the engine gives the summary table of an aggregation query.
pub const TOTALS_TABLE: &str = "_totals";

// =============================================================================
// Cells
// =============================================================================

/// One row-cell of a column.
///
/// Numbers are always `f64`; the engine does not distinguish integers from
/// reals on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum Cell {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Cell>),
    Map(BTreeMap<String, Cell>),
}

impl Cell {
    /// Short name of the runtime variant, used in mismatch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Cell]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key when the cell is a map.
    pub fn get(&self, key: &str) -> Option<&Cell> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Cell {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Cell::from).collect()),
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Cell::from(v))).collect())
            }
        }
    }
}

impl From<&Cell> for serde_json::Value {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Null => Self::Null,
            Cell::Bool(b) => Self::Bool(*b),
            Cell::Number(n) => serde_json::Number::from_f64(*n).map_or(Self::Null, Self::Number),
            Cell::String(s) => Self::String(s.clone()),
            Cell::Array(items) => Self::Array(items.iter().map(Self::from).collect()),
            Cell::Map(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Generic formatting: strings verbatim, numbers in shortest form,
/// nested structures as compact JSON.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
            Self::Array(_) | Self::Map(_) => write!(f, "{}", serde_json::Value::from(self)),
        }
    }
}

// =============================================================================
// Field descriptors
// =============================================================================

/// Declared type of a result field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum FieldType {
    Datetime,
    String,
    Integer,
    Float,
    Bool,
    Timespan,
    Array,
    #[default]
    Unknown,
    /// Anything the adapter does not recognise; rendered by generic formatting.
    Other(String),
}

impl From<&str> for FieldType {
    fn from(raw: &str) -> Self {
        match raw {
            "datetime" | "timestamp" => Self::Datetime,
            "string" => Self::String,
            "integer" | "int" | "long" => Self::Integer,
            "float" | "real" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            "timespan" => Self::Timespan,
            "array" => Self::Array,
            "unknown" => Self::Unknown,
            // union types such as "integer|float"
            union if union.contains('|') => {
                let numeric = union
                    .split('|')
                    .all(|part| matches!(Self::from(part), Self::Integer | Self::Float));
                if numeric {
                    Self::Float
                } else {
                    Self::Other(union.to_string())
                }
            }
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for FieldType {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Datetime => write!(f, "datetime"),
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
            Self::Timespan => write!(f, "timespan"),
            Self::Array => write!(f, "array"),
            Self::Unknown => write!(f, "unknown"),
            Self::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Aggregation operator that produced a field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AggregationOp {
    Histogram,
    Topk,
    Count,
    Distinct,
    Sum,
    Avg,
    Min,
    Max,
    Percentiles,
    Other(String),
}

impl From<&str> for AggregationOp {
    fn from(raw: &str) -> Self {
        match raw {
            "histogram" => Self::Histogram,
            "topk" => Self::Topk,
            "count" => Self::Count,
            "distinct" => Self::Distinct,
            "sum" => Self::Sum,
            "avg" => Self::Avg,
            "min" => Self::Min,
            "max" => Self::Max,
            "percentiles" => Self::Percentiles,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for AggregationOp {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Aggregation {
    #[serde(rename = "name", alias = "op")]
    pub op: AggregationOp,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub args: Vec<serde_json::Value>,
}

/// Metadata describing one result column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(rename = "agg", alias = "aggregation", default)]
    pub aggregation: Option<Aggregation>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            aggregation: None,
        }
    }

    pub fn with_aggregation(mut self, op: AggregationOp) -> Self {
        self.aggregation = Some(Aggregation {
            op,
            fields: Vec::new(),
            args: Vec::new(),
        });
        self
    }

    /// Histogram and top-k cells expand into several output fields or rows,
    /// so their columns are exempt from the row-count check.
    pub fn is_expanding(&self) -> bool {
        matches!(
            self.aggregation.as_ref().map(|a| &a.op),
            Some(AggregationOp::Histogram | AggregationOp::Topk)
        )
    }
}

// =============================================================================
// Tables & envelope
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Group {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Buckets {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub size: Option<serde_json::Value>,
}

/// `null` decodes as the empty value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Auxiliary metadata whose shape varies between engine versions; anything
/// unexpected decodes as the empty value.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

/// One named result set, stored column-major.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Table {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub columns: Vec<Vec<Cell>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub buckets: Option<Buckets>,
}

impl Table {
    pub fn is_totals(&self) -> bool {
        self.name == TOTALS_TABLE
    }

    /// Row count of the first non-expanding column, if any.
    pub fn row_count(&self) -> Option<usize> {
        self.fields
            .iter()
            .zip(&self.columns)
            .find(|(field, _)| !field.is_expanding())
            .map(|(_, column)| column.len())
    }

    /// Record shape inconsistencies. Nothing here is fatal; the frame
    /// builder pads short fields afterwards.
    pub fn validate(&self, diagnostics: &mut Diagnostics) {
        if self.columns.len() != self.fields.len() {
            diagnostics.record(
                &self.name,
                None,
                format!(
                    "table declares {} fields but carries {} columns",
                    self.fields.len(),
                    self.columns.len()
                ),
            );
        }

        let Some(expected) = self.row_count() else {
            return;
        };
        for (field, column) in self.fields.iter().zip(&self.columns) {
            if !field.is_expanding() && column.len() != expected {
                diagnostics.record(
                    &field.name,
                    None,
                    format!("column has {} rows, expected {}", column.len(), expected),
                );
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStatus {
    #[serde(default)]
    pub elapsed_time: u64,
    #[serde(default)]
    pub rows_examined: u64,
    #[serde(default)]
    pub rows_matched: u64,
    #[serde(default)]
    pub is_partial: bool,
    #[serde(default)]
    pub min_cursor: Option<String>,
    #[serde(default)]
    pub max_cursor: Option<String>,
}

/// Decoded response envelope of one query round-trip.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub format: String,
    #[serde(default, deserialize_with = "lenient")]
    pub status: QueryStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tables: Vec<Table>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dataset_names: Vec<String>,
    #[serde(default, rename = "fieldsMetaMap", deserialize_with = "lenient")]
    pub fields_meta: HashMap<String, Vec<DatasetField>>,
}

impl QueryResult {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

// =============================================================================
// Dataset schema
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetFields {
    pub dataset_name: String,
    #[serde(default)]
    pub fields: Vec<DatasetField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_decodes_every_json_shape() {
        let cells: Vec<Cell> =
            serde_json::from_str(r#"[null, true, 3, 2.5, "x", [1, "a"], {"k": null}]"#).unwrap();
        assert_eq!(cells[0], Cell::Null);
        assert_eq!(cells[1], Cell::Bool(true));
        assert_eq!(cells[2], Cell::Number(3.0));
        assert_eq!(cells[3], Cell::Number(2.5));
        assert_eq!(cells[4], Cell::String("x".into()));
        assert_eq!(
            cells[5],
            Cell::Array(vec![Cell::Number(1.0), Cell::String("a".into())])
        );
        assert_eq!(cells[6].get("k"), Some(&Cell::Null));
    }

    #[test]
    fn test_cell_generic_formatting() {
        assert_eq!(Cell::Number(10.0).to_string(), "10");
        assert_eq!(Cell::Number(0.25).to_string(), "0.25");
        assert_eq!(Cell::String("abc".into()).to_string(), "abc");
        let nested: Cell = serde_json::from_str(r#"{"a": [1, 2]}"#).unwrap();
        assert_eq!(nested.to_string(), r#"{"a":[1.0,2.0]}"#);
    }

    #[test]
    fn test_field_type_aliases() {
        assert_eq!(FieldType::from("long"), FieldType::Integer);
        assert_eq!(FieldType::from("real"), FieldType::Float);
        assert_eq!(FieldType::from("boolean"), FieldType::Bool);
        assert_eq!(FieldType::from("integer|float"), FieldType::Float);
        assert_eq!(
            FieldType::from("string|integer"),
            FieldType::Other("string|integer".into())
        );
        assert_eq!(FieldType::from("map"), FieldType::Other("map".into()));
    }

    #[test]
    fn test_descriptor_reads_agg_name() {
        let field: FieldDescriptor = serde_json::from_str(
            r#"{"name": "histogram_duration", "type": "unknown", "agg": {"name": "histogram", "args": [100]}}"#,
        )
        .unwrap();
        assert_eq!(field.aggregation.unwrap().op, AggregationOp::Histogram);

        let legacy: FieldDescriptor =
            serde_json::from_str(r#"{"name": "n", "type": "integer", "aggregation": {"op": "count"}}"#)
                .unwrap();
        assert_eq!(legacy.aggregation.unwrap().op, AggregationOp::Count);
    }

    #[test]
    fn test_decode_envelope() {
        let body = br#"{
            "format": "tabular",
            "status": {"elapsedTime": 1200, "rowsMatched": 3, "isPartial": false},
            "tables": [
                {
                    "name": "0",
                    "fields": [{"name": "_time", "type": "datetime"}, {"name": "count_", "type": "integer", "agg": {"name": "count"}}],
                    "columns": [["2024-01-01T00:00:00Z"], [3]],
                    "groups": []
                },
                {"name": "_totals", "fields": [], "columns": []}
            ],
            "datasetNames": ["logs"],
            "fieldsMetaMap": {"logs": [{"name": "status", "type": "integer", "unit": "", "hidden": false, "description": ""}]},
            "request": {"groupBy": []}
        }"#;
        let result = QueryResult::from_slice(body).unwrap();
        assert_eq!(result.tables.len(), 2);
        assert!(result.tables[1].is_totals());
        assert_eq!(result.status.elapsed_time, 1200);
        assert_eq!(result.dataset_names, vec!["logs"]);
        assert_eq!(result.fields_meta["logs"][0].name, "status");
        assert_eq!(result.tables[0].row_count(), Some(1));
    }

    #[test]
    fn test_nulls_and_odd_metadata_decode_as_empty() {
        let result = QueryResult::from_slice(
            br#"{
                "status": "done",
                "tables": [{"name": "0", "fields": null, "columns": null, "groups": null}],
                "datasetNames": null,
                "fieldsMetaMap": {"logs": {"status": "integer"}}
            }"#,
        )
        .unwrap();
        assert_eq!(result.status, QueryStatus::default());
        assert!(result.tables[0].fields.is_empty());
        assert!(result.dataset_names.is_empty());
        assert!(result.fields_meta.is_empty());
    }

    #[test]
    fn test_null_aggregation_fields_and_args() {
        let result = QueryResult::from_slice(
            br#"{"tables": [{
                "name": "0",
                "fields": [{"name": "count_", "type": "integer", "agg": {"name": "count", "fields": null, "args": null}}],
                "columns": [[1]]
            }]}"#,
        )
        .unwrap();
        let agg = result.tables[0].fields[0].aggregation.as_ref().unwrap();
        assert_eq!(agg.op, AggregationOp::Count);
        assert!(agg.fields.is_empty());
        assert!(agg.args.is_empty());
    }

    #[test]
    fn test_validate_reports_ragged_columns() {
        let table = Table {
            name: "0".into(),
            fields: vec![
                FieldDescriptor::new("a", FieldType::Integer),
                FieldDescriptor::new("b", FieldType::Integer),
                FieldDescriptor::new("h", FieldType::Unknown).with_aggregation(AggregationOp::Topk),
            ],
            columns: vec![
                vec![Cell::Number(1.0), Cell::Number(2.0)],
                vec![Cell::Number(1.0)],
                vec![Cell::Null],
            ],
            ..Default::default()
        };
        let mut diagnostics = Diagnostics::new();
        table.validate(&mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.entries()[0].field, "b");
    }
}
