//! reqwest-backed [`QueryEngine`].

use prism_core::{DatasetFields, QueryResult};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{EngineError, EngineQuery, QueryEngine};
use crate::config::{EngineConfig, QueryEndpoint};

const ORG_ID_HEADER: &str = "X-Org-Id";

pub struct HttpEngine {
    client: Client,
    config: EngineConfig,
}

impl HttpEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    /// Full APL endpoint, always in the legacy tabular format.
    pub fn query_url(&self) -> String {
        let path = match self.config.query_endpoint() {
            QueryEndpoint::Edge(base) => join(base, "v1/query/_apl"),
            QueryEndpoint::Legacy(base) => join(base, "v1/datasets/_apl"),
        };
        format!("{}?format=legacy", path)
    }

    pub fn fields_url(&self) -> String {
        join(&self.config.api_host, "v1/datasets/_fields")
    }

    pub fn user_url(&self) -> String {
        join(&self.config.api_host, "v1/user")
    }

    fn authorize(&self, mut req: RequestBuilder) -> RequestBuilder {
        if let Some(token) = self.config.access_token() {
            req = req.bearer_auth(token);
        }
        if let Some(org) = self.config.org_id() {
            req = req.header(ORG_ID_HEADER, org);
        }
        req
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, EngineError> {
        let response = self.authorize(req).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(EngineError::Http {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// The engine reports failures as `{"message": ...}`; anything else is
/// passed through verbatim.
fn error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(err) => err.message,
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}

#[async_trait::async_trait]
impl QueryEngine for HttpEngine {
    async fn query(&self, query: &EngineQuery) -> Result<QueryResult, EngineError> {
        let url = self.query_url();
        tracing::debug!(%url, apl = %query.apl, "querying engine");
        self.send(self.client.post(url).json(query)).await
    }

    async fn dataset_fields(&self) -> Result<Vec<DatasetFields>, EngineError> {
        self.send(self.client.get(self.fields_url())).await
    }

    async fn validate_credentials(&self) -> Result<(), EngineError> {
        self.send::<serde_json::Value>(self.client.get(self.user_url()))
            .await
            .map(|_| ())
    }
}
