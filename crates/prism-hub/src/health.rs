//! # Health Check
//!
//! Two probes: the credentials must be accepted, then an empty query must
//! be rejected by the engine's parser. A 400 on the empty query proves the
//! request was authenticated and reached the query layer.

use prism_core::CheckHealthResult;

use crate::engine::{EngineQuery, QueryEngine};

pub const HEALTHY: &str = "Data source is working";

pub async fn check_health(engine: &dyn QueryEngine) -> CheckHealthResult {
    if let Err(err) = engine.validate_credentials().await {
        tracing::error!(error = %err, "credential validation failed");
        return CheckHealthResult::error("error with datasource");
    }

    match engine.query(&EngineQuery::new("")).await {
        Err(err) if err.http_status() == Some(400) => CheckHealthResult::ok(HEALTHY),
        Err(err) => {
            tracing::error!(error = %err, "health probe query failed");
            CheckHealthResult::error("Failed to query engine")
        }
        Ok(_) => {
            tracing::warn!("engine accepted an empty query");
            CheckHealthResult::error("Did not receive expected error")
        }
    }
}
