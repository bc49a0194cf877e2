use std::{sync::Mutex, time::Duration};

use traffic_core::{SimulatedErrorKind, SyntheticOrder};

use crate::{
    client::{ApiResponse, StoreApi, TransportError},
    lock,
};

/// In-memory storefront answering every call with a fixed result.
pub(crate) struct ScriptedStore {
    order_result: Result<ApiResponse, TransportError>,
    error_result: Result<ApiResponse, TransportError>,
    health_result: Result<ApiResponse, TransportError>,
    latency: Duration,
    orders: Mutex<Vec<SyntheticOrder>>,
    simulated_errors: Mutex<Vec<SimulatedErrorKind>>,
}

impl ScriptedStore {
    pub(crate) fn healthy() -> Self {
        Self {
            order_result: Ok(ApiResponse::new(201)),
            error_result: Ok(ApiResponse::new(500)),
            health_result: Ok(ApiResponse::new(200)),
            latency: Duration::ZERO,
            orders: Mutex::new(Vec::new()),
            simulated_errors: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_order_result(mut self, result: Result<ApiResponse, TransportError>) -> Self {
        self.order_result = result;
        self
    }

    pub(crate) fn with_health_result(
        mut self,
        result: Result<ApiResponse, TransportError>,
    ) -> Self {
        self.health_result = result;
        self
    }

    /// Every call sleeps this long on the tokio clock before answering.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn respond(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    pub(crate) fn orders(&self) -> Vec<SyntheticOrder> {
        lock(&self.orders).clone()
    }

    pub(crate) fn simulated_errors(&self) -> Vec<SimulatedErrorKind> {
        lock(&self.simulated_errors).clone()
    }
}

#[async_trait::async_trait]
impl StoreApi for ScriptedStore {
    async fn create_order(&self, order: &SyntheticOrder) -> Result<ApiResponse, TransportError> {
        lock(&self.orders).push(order.clone());
        self.respond().await;
        self.order_result.clone()
    }

    async fn simulate_error(
        &self,
        kind: SimulatedErrorKind,
    ) -> Result<ApiResponse, TransportError> {
        lock(&self.simulated_errors).push(kind);
        self.respond().await;
        self.error_result.clone()
    }

    async fn health(&self) -> Result<ApiResponse, TransportError> {
        self.respond().await;
        self.health_result.clone()
    }
}
