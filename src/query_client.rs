use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::models::{AskRequest, AskResponse, QueryResult};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid car bot URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to reach car bot service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("car bot service responded with {status}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode car bot response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("car bot service reported an error: {0}")]
    Service(String),
}

/// Anything that can answer a question about cars.
///
/// `ask` always resolves: implementations turn their own failures into
/// [`QueryResult::fallback`].
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn ask(&self, question: &str) -> QueryResult;
}

/// HTTP client for the car bot's `POST /ask` endpoint.
#[derive(Debug, Clone)]
pub struct QueryClient {
    client: Client,
    ask_url: Url,
}

impl QueryClient {
    pub fn new(base_url: &str) -> Result<Self, QueryError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, QueryError> {
        let raw = format!("{}/ask", base_url.trim().trim_end_matches('/'));
        let ask_url = Url::parse(&raw).map_err(|e| QueryError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(ask_url.scheme(), "http" | "https") {
            return Err(QueryError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme {}", ask_url.scheme()),
            });
        }
        Ok(Self { client, ask_url })
    }

    pub fn ask_url(&self) -> &Url {
        &self.ask_url
    }

    /// Performs the exchange and reports what went wrong, if anything.
    #[instrument(skip(self), fields(url = %self.ask_url))]
    pub async fn try_ask(&self, question: &str) -> Result<QueryResult, QueryError> {
        let response = self
            .client
            .post(self.ask_url.clone())
            .json(&AskRequest { question })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, %body, "car bot returned an error status");
            return Err(QueryError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        let mut parsed: AskResponse = serde_json::from_slice(&bytes)?;
        if let Some(error) = parsed.error.take() {
            if parsed.message.is_empty() {
                return Err(QueryError::Service(error));
            }
            debug!(%error, "car bot reported an error alongside an answer");
        }

        let result = QueryResult::from(parsed);
        debug!(cars = result.cars.len(), "received car bot answer");
        Ok(result)
    }
}

#[async_trait]
impl QueryBackend for QueryClient {
    async fn ask(&self, question: &str) -> QueryResult {
        match self.try_ask(question).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "error contacting car bot API");
                QueryResult::fallback()
            }
        }
    }
}
