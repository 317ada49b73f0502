//! # Engine Client
//!
//! Everything the hub needs from the analytics engine sits behind
//! [`QueryEngine`], so the dispatcher, health check and handlers can run
//! against an in-process fake in tests.

pub mod http;
#[cfg(test)]
pub(crate) mod mock;

use chrono::{DateTime, Utc};
use prism_core::{DatasetFields, ErrorStatus, QueryResult};
use serde::Serialize;

pub use http::HttpEngine;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("request to engine failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("engine returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("could not decode engine response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl EngineError {
    /// HTTP status returned by the engine, if it answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// How the host should classify this failure.
    pub fn error_status(&self) -> ErrorStatus {
        match self.http_status() {
            Some(status) if is_caller_fault(status) => ErrorStatus::BadRequest,
            _ => ErrorStatus::Internal,
        }
    }
}

/// 4xx responses blame the query, except those that blame the deployment.
fn is_caller_fault(status: u16) -> bool {
    (400..500).contains(&status) && !matches!(status, 401 | 403 | 404 | 429)
}

// =============================================================================
// Requests
// =============================================================================

/// Body of an APL query request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineQuery {
    pub apl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl EngineQuery {
    pub fn new(apl: impl Into<String>) -> Self {
        Self {
            apl: apl.into(),
            ..Default::default()
        }
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }
}

#[async_trait::async_trait]
pub trait QueryEngine: Send + Sync {
    /// Run one APL query and decode the tabular result.
    async fn query(&self, query: &EngineQuery) -> Result<QueryResult, EngineError>;

    /// Field schema of every dataset visible to the caller.
    async fn dataset_fields(&self) -> Result<Vec<DatasetFields>, EngineError>;

    /// Succeeds when the configured credentials are accepted.
    async fn validate_credentials(&self) -> Result<(), EngineError>;
}
