use std::time::Duration;

use runtime::{ApiResponse, StoreApi, TransportError};
use traffic_core::{SimulatedErrorKind, SyntheticOrder};

/// `StoreApi` over HTTP. Every call is bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct HttpStoreClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStoreClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ApiResponse, TransportError> {
        let response = request.send().await.map_err(transport_error)?;
        Ok(ApiResponse::new(response.status().as_u16()))
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[async_trait::async_trait]
impl StoreApi for HttpStoreClient {
    async fn create_order(&self, order: &SyntheticOrder) -> Result<ApiResponse, TransportError> {
        self.send(self.client.post(self.url("/orders")).json(order))
            .await
    }

    async fn simulate_error(
        &self,
        kind: SimulatedErrorKind,
    ) -> Result<ApiResponse, TransportError> {
        self.send(
            self.client
                .get(self.url("/simulate-error"))
                .query(&[("error_type", kind.query_value())]),
        )
        .await
    }

    async fn health(&self) -> Result<ApiResponse, TransportError> {
        self.send(self.client.get(self.url("/health"))).await
    }
}
