//! # prism-cli: The "Eyepiece" of PRISM
//!
//! Command-line client for a running `prism-hub`.
//!
//! - `prism query <apl>` - Run one APL query and print the frame.
//! - `prism health` - Run the data-source health check.
//! - `prism schema` - List dataset fields.

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

use prism_core::{
    CheckHealthResult, DataQuery, DatasetFields, FieldValues, Frame, HealthStatus,
    QueryDataRequest, QueryDataResponse, TimeRange,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// PRISM: typed frames from the analytics engine.
#[derive(Parser)]
#[command(name = "prism", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an APL query through the hub.
    Query {
        apl: String,

        /// Relative window ending now (e.g. 30m, 1h, 7d).
        #[arg(long, conflicts_with = "from")]
        since: Option<String>,

        /// Absolute start (RFC 3339 or relative like 2h).
        #[arg(long)]
        from: Option<String>,

        /// Absolute end (RFC 3339 or relative); defaults to now.
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Render the totals table instead of the series.
        #[arg(long)]
        totals: bool,

        /// Print the raw hub response.
        #[arg(long)]
        json: bool,
    },

    /// Check connectivity and credentials.
    Health,

    /// List dataset fields.
    Schema {
        #[arg(long)]
        dataset: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    if let Err(e) = rt.block_on(async_main(cli.command)) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn async_main(cmd: Commands) -> CliResult<()> {
    let client = reqwest::Client::new();
    let base_url =
        std::env::var("PRISM_HUB_URL").unwrap_or_else(|_| "http://127.0.0.1:3100".to_string());
    let base_url = base_url.trim_end_matches('/');

    match cmd {
        Commands::Query {
            apl,
            since,
            from,
            to,
            totals,
            json,
        } => {
            let time_range =
                resolve_range(since.as_deref(), from.as_deref(), to.as_deref(), Utc::now())?;
            let request = QueryDataRequest {
                queries: vec![DataQuery {
                    ref_id: uuid::Uuid::new_v4().as_simple().to_string(),
                    time_range,
                    json: serde_json::json!({ "apl": apl, "totals": totals }),
                }],
            };

            let url = format!("{}/api/query", base_url);
            let resp = client.post(&url).json(&request).send().await?;
            if json {
                let raw: serde_json::Value = read_json(resp).await?;
                println!("{}", serde_json::to_string_pretty(&raw)?);
                return Ok(());
            }

            let response: QueryDataResponse = read_json(resp).await?;
            let mut failed = false;
            for (ref_id, data) in &response.responses {
                if let Some(error) = &data.error {
                    failed = true;
                    match data.status {
                        Some(status) => eprintln!("[{}] {:?}: {}", ref_id, status, error),
                        None => eprintln!("[{}] {}", ref_id, error),
                    }
                }
                if data.frames.is_empty() && data.error.is_none() {
                    println!("(no data)");
                }
                for frame in &data.frames {
                    print_frame(frame);
                }
            }
            if failed {
                return Err("query failed".into());
            }
        }

        Commands::Health => {
            let url = format!("{}/api/health", base_url);
            let result: CheckHealthResult = read_json(client.get(&url).send().await?).await?;
            match result.status {
                HealthStatus::Ok => println!("OK: {}", result.message),
                HealthStatus::Error => return Err(result.message.into()),
            }
        }

        Commands::Schema { dataset } => {
            let url = format!("{}/api/resources/schema-lookup", base_url);
            let datasets: Vec<DatasetFields> = read_json(client.get(&url).send().await?).await?;
            let rows = schema_rows(&datasets, dataset.as_deref());
            if rows.is_empty() {
                println!("(no fields)");
            } else {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }
    }

    Ok(())
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> CliResult<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(format!("hub returned {}: {}", status, body.trim()).into());
    }
    Ok(resp.json::<T>().await?)
}

// =============================================================================
// Time ranges
// =============================================================================

/// RFC 3339, or a relative offset back from `now` (`30s`, `5m`, `1h`, `7d`).
fn parse_time_expr(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let (split, unit) = value.char_indices().last()?;
    let amount: i64 = value[..split].parse().ok()?;
    let duration = match unit {
        's' => Duration::try_seconds(amount),
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    }?;
    now.checked_sub_signed(duration)
}

fn resolve_range(
    since: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<Utc>,
) -> CliResult<TimeRange> {
    let parse = |raw: &str| {
        parse_time_expr(raw, now).ok_or_else(|| format!("invalid time expression: {}", raw))
    };

    let range = match from {
        Some(from) => TimeRange {
            from: parse(from)?,
            to: match to {
                Some(to) => parse(to)?,
                None => now,
            },
        },
        None => TimeRange {
            from: parse(since.unwrap_or("1h"))?,
            to: now,
        },
    };

    if range.from > range.to {
        return Err(format!("empty time range: {} is after {}", range.from, range.to).into());
    }
    Ok(range)
}

// =============================================================================
// Rendering
// =============================================================================

fn print_frame(frame: &Frame) {
    println!("── {} ({} rows)", frame.name, frame.row_count());
    if !frame.fields.is_empty() {
        println!("{}", frame_table(frame));
    }
    for notice in &frame.meta.notices {
        eprintln!("{:?}: {}", notice.severity, notice.text);
    }
}

fn frame_table(frame: &Frame) -> String {
    let mut builder = Builder::default();
    builder.push_record(frame.fields.iter().map(|f| f.display_name()));
    for row in 0..frame.row_count() {
        builder.push_record(frame.fields.iter().map(|f| cell_text(&f.values, row)));
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

fn cell_text(values: &FieldValues, row: usize) -> String {
    fn or_null<T>(cell: Option<&Option<T>>, show: impl Fn(&T) -> String) -> String {
        match cell {
            Some(Some(value)) => show(value),
            _ => "null".to_string(),
        }
    }

    match values {
        FieldValues::Time(v) => or_null(v.get(row), |ts| ts.to_rfc3339()),
        FieldValues::Float64(v) => or_null(v.get(row), |n| n.to_string()),
        FieldValues::Bool(v) => or_null(v.get(row), |b| b.to_string()),
        FieldValues::String(v) => or_null(v.get(row), |s| s.clone()),
        FieldValues::FloatArray(v) => or_null(v.get(row), |items| {
            let items: Vec<String> = items.iter().map(f64::to_string).collect();
            format!("[{}]", items.join(", "))
        }),
        FieldValues::StringArray(v) => or_null(v.get(row), |items| {
            let items: Vec<&str> = items.iter().map(|s| s.as_deref().unwrap_or("null")).collect();
            format!("[{}]", items.join(", "))
        }),
    }
}

#[derive(Tabled)]
struct SchemaRow {
    dataset: String,
    field: String,
    #[tabled(rename = "type")]
    field_type: String,
    unit: String,
    description: String,
}

fn schema_rows(datasets: &[DatasetFields], only: Option<&str>) -> Vec<SchemaRow> {
    datasets
        .iter()
        .filter(|d| only.map_or(true, |name| d.dataset_name == name))
        .flat_map(|d| {
            d.fields.iter().filter(|f| !f.hidden).map(|f| SchemaRow {
                dataset: d.dataset_name.clone(),
                field: f.name.clone(),
                field_type: f.field_type.clone(),
                unit: f.unit.clone(),
                description: f.description.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use prism_core::OutputField;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_time_expr() {
        assert_eq!(
            parse_time_expr("90m", now()),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap())
        );
        assert_eq!(
            parse_time_expr("2024-06-01T00:00:00Z", now()),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_time_expr("soon", now()), None);
        assert_eq!(parse_time_expr("", now()), None);
    }

    #[test]
    fn test_parse_time_expr_rejects_odd_input() {
        assert_eq!(parse_time_expr("5é", now()), None);
        assert_eq!(parse_time_expr("é", now()), None);
        assert_eq!(parse_time_expr("d", now()), None);
        assert_eq!(parse_time_expr(&format!("{}d", i64::MAX), now()), None);
        assert_eq!(parse_time_expr("100000000d", now()), None);
    }

    #[test]
    fn test_default_range_is_last_hour() {
        let range = resolve_range(None, None, None, now()).unwrap();
        assert_eq!(range.to, now());
        assert_eq!(range.to - range.from, Duration::hours(1));
    }

    #[test]
    fn test_absolute_range() {
        let range = resolve_range(
            None,
            Some("2024-06-01T08:00:00Z"),
            Some("2024-06-01T09:00:00Z"),
            now(),
        )
        .unwrap();
        assert_eq!(range.from, Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        assert_eq!(range.to, Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        assert!(resolve_range(None, Some("1h"), Some("2h"), now()).is_err());
        assert!(resolve_range(Some("lots"), None, None, now()).is_err());
    }

    #[test]
    fn test_frame_table_renders_labels_and_nulls() {
        let frame = Frame::new("0").with_fields(vec![
            OutputField::new("host", FieldValues::String(vec![Some("a".into()), None])),
            OutputField::new("", FieldValues::Float64(vec![Some(1.5), Some(2.0)]))
                .with_label("le", "10"),
            OutputField::new(
                "tags",
                FieldValues::StringArray(vec![Some(vec![Some("x".into()), None]), None]),
            ),
        ]);
        let rendered = frame_table(&frame);
        assert!(rendered.contains("{le=\"10\"}"));
        assert!(rendered.contains("1.5"));
        assert!(rendered.contains("[x, null]"));
        assert!(rendered.contains("null"));
    }

    #[test]
    fn test_schema_rows_filter_hidden_and_dataset() {
        let datasets: Vec<DatasetFields> = serde_json::from_str(
            r#"[
                {"datasetName": "logs", "fields": [
                    {"name": "status", "type": "integer"},
                    {"name": "_sysTime", "type": "datetime", "hidden": true}
                ]},
                {"datasetName": "traces", "fields": [{"name": "duration", "type": "timespan"}]}
            ]"#,
        )
        .unwrap();

        let all = schema_rows(&datasets, None);
        assert_eq!(all.len(), 2);

        let logs = schema_rows(&datasets, Some("logs"));
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].field, "status");
        assert_eq!(logs[0].field_type, "integer");
    }
}
