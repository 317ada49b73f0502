//! In-process [`QueryEngine`] for tests.

use prism_core::{DatasetFields, QueryResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{EngineError, EngineQuery, QueryEngine};

type Responder = Box<dyn Fn(&EngineQuery) -> Result<QueryResult, EngineError> + Send + Sync>;

pub(crate) struct MockEngine {
    responder: Responder,
    delays: HashMap<String, Duration>,
    default_delay: Option<Duration>,
    credentials_status: Option<u16>,
    fields: Result<Vec<DatasetFields>, u16>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

/// Decrements the in-flight gauge even when the query future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) fn http_error(status: u16, message: &str) -> EngineError {
    EngineError::Http {
        status,
        message: message.into(),
    }
}

impl MockEngine {
    pub fn new(
        responder: impl Fn(&EngineQuery) -> Result<QueryResult, EngineError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            delays: HashMap::new(),
            default_delay: None,
            credentials_status: None,
            fields: Ok(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every query returns `result`.
    pub fn returning(result: QueryResult) -> Self {
        Self::new(move |_| Ok(result.clone()))
    }

    pub fn with_delay(mut self, apl: &str, delay: Duration) -> Self {
        self.delays.insert(apl.to_string(), delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    pub fn rejecting_credentials(mut self, status: u16) -> Self {
        self.credentials_status = Some(status);
        self
    }

    pub fn with_fields(mut self, fields: Vec<DatasetFields>) -> Self {
        self.fields = Ok(fields);
        self
    }

    pub fn failing_fields(mut self, status: u16) -> Self {
        self.fields = Err(status);
        self
    }

    /// Highest number of concurrent `query` calls observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl QueryEngine for MockEngine {
    async fn query(&self, query: &EngineQuery) -> Result<QueryResult, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&query.apl).copied().or(self.default_delay) {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(query)
    }

    async fn dataset_fields(&self) -> Result<Vec<DatasetFields>, EngineError> {
        match &self.fields {
            Ok(fields) => Ok(fields.clone()),
            Err(status) => Err(http_error(*status, "schema unavailable")),
        }
    }

    async fn validate_credentials(&self) -> Result<(), EngineError> {
        match self.credentials_status {
            Some(status) => Err(http_error(status, "invalid token")),
            None => Ok(()),
        }
    }
}
