use std::fmt;

use traffic_core::{SimulatedErrorKind, SyntheticOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
}

impl ApiResponse {
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// The request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    Connect(String),
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "request timed out"),
            Self::Connect(reason) => write!(f, "connection failed: {reason}"),
            Self::Other(reason) => write!(f, "request failed: {reason}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Storefront endpoints exercised by the simulator.
#[async_trait::async_trait]
pub trait StoreApi: Send + Sync {
    /// `POST /orders`
    async fn create_order(&self, order: &SyntheticOrder) -> Result<ApiResponse, TransportError>;

    /// `GET /simulate-error?error_type=<kind>`
    async fn simulate_error(
        &self,
        kind: SimulatedErrorKind,
    ) -> Result<ApiResponse, TransportError>;

    /// `GET /health`
    async fn health(&self) -> Result<ApiResponse, TransportError>;
}
