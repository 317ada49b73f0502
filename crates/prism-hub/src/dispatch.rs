//! # Query Dispatcher
//!
//! Fans a batch of panel queries out to a fixed pool of workers and
//! collects exactly one [`DataResponse`] per `refId`.
//!
//! ```text
//!             ┌─► worker 0 ─┐
//! queries ─► queue ─► worker 1 ─┼─► results ─► {refId: DataResponse}
//!             └─► worker N ─┘
//! ```
//!
//! Each query additionally runs on its own task, so a panic while
//! processing one query surfaces as an error for that `refId` and the
//! worker moves on to the next job.

use futures_util::future::join_all;
use prism_core::{
    render, DataQuery, DataResponse, Diagnostics, ErrorStatus, QueryDataRequest,
    QueryDataResponse, QueryModel, RenderOptions,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::engine::{EngineQuery, QueryEngine};

pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<dyn QueryEngine>,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn QueryEngine>, concurrency: usize) -> Self {
        Self {
            engine,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every query in `request`; never fails as a whole.
    ///
    /// When `cancel` fires, queries still in flight are reported as
    /// cancelled and those already finished keep their results.
    pub async fn query_data(
        &self,
        request: QueryDataRequest,
        cancel: CancellationToken,
    ) -> QueryDataResponse {
        let total = request.queries.len();
        if total == 0 {
            return QueryDataResponse::default();
        }
        let workers = self.concurrency.min(total);
        tracing::info!(queries = total, workers, "dispatching query batch");

        let (job_tx, job_rx) = mpsc::channel::<DataQuery>(total);
        for query in request.queries {
            // capacity equals the batch size
            let _ = job_tx.send(query).await;
        }
        drop(job_tx);
        let jobs = Arc::new(Mutex::new(job_rx));

        let (result_tx, mut result_rx) = mpsc::channel::<(String, DataResponse)>(total);
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let jobs = Arc::clone(&jobs);
            let results = result_tx.clone();
            let engine = Arc::clone(&self.engine);
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let next = jobs.lock().await.recv().await;
                    let Some(query) = next else { break };

                    let ref_id = query.ref_id.clone();
                    let response = run_isolated(Arc::clone(&engine), query, cancel.clone()).await;
                    if results.send((ref_id, response)).await.is_err() {
                        break;
                    }
                }
                tracing::debug!(worker, "dispatch worker drained");
            }));
        }
        drop(result_tx);

        let mut responses = BTreeMap::new();
        while let Some((ref_id, response)) = result_rx.recv().await {
            if responses.insert(ref_id.clone(), response).is_some() {
                tracing::warn!(%ref_id, "duplicate refId in batch, keeping the last response");
            }
        }

        for joined in join_all(handles).await {
            if let Err(err) = joined {
                tracing::error!(error = %err, "dispatch worker failed");
            }
        }

        QueryDataResponse { responses }
    }
}

/// Run one query on its own task so that a panic stays contained.
async fn run_isolated(
    engine: Arc<dyn QueryEngine>,
    query: DataQuery,
    cancel: CancellationToken,
) -> DataResponse {
    let ref_id = query.ref_id.clone();
    match tokio::spawn(execute(engine, query, cancel)).await {
        Ok(response) => response,
        Err(err) if err.is_panic() => {
            tracing::error!(%ref_id, "query processing panicked");
            DataResponse::error(ErrorStatus::Internal, "internal error while processing query")
        }
        Err(err) => {
            tracing::error!(%ref_id, error = %err, "query task aborted");
            DataResponse::error(ErrorStatus::Internal, format!("query task aborted: {}", err))
        }
    }
}

/// Parse, query, render.
pub(crate) async fn execute(
    engine: Arc<dyn QueryEngine>,
    query: DataQuery,
    cancel: CancellationToken,
) -> DataResponse {
    let model: QueryModel = match serde_json::from_value(query.json) {
        Ok(model) => model,
        Err(err) => {
            tracing::warn!(ref_id = %query.ref_id, error = %err, "could not parse query");
            return DataResponse::error(ErrorStatus::BadRequest, "could not parse query");
        }
    };

    if model.apl.trim().is_empty() {
        return DataResponse::default();
    }

    let request =
        EngineQuery::new(model.apl).between(query.time_range.from, query.time_range.to);
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        outcome = engine.query(&request) => Some(outcome),
    };

    let result = match outcome {
        None => {
            tracing::warn!(ref_id = %query.ref_id, "query cancelled");
            return DataResponse::error(ErrorStatus::Internal, "query cancelled");
        }
        Some(Err(err)) => {
            tracing::error!(ref_id = %query.ref_id, error = %err, "engine query failed");
            return DataResponse::error(err.error_status(), err.to_string());
        }
        Some(Ok(result)) => result,
    };

    let mut diagnostics = Diagnostics::new();
    let options = RenderOptions {
        totals: model.totals,
    };
    let mut frame = render(&result, options, &mut diagnostics);
    frame.meta.notices.extend(diagnostics.into_notices());

    DataResponse::frames(vec![frame])
}
