use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use tokio::{runtime::Handle, sync::mpsc, time::Instant};
use traffic_core::{DispatchPlan, SessionStats};

use crate::{
    client::{ApiResponse, StoreApi, TransportError},
    lock,
    logging::{Severity, SimLogEvent, SimLogEventKind, SimLogWriter},
};

/// Latency recorded for a request that never got a response.
pub const TRANSPORT_FAILURE_LATENCY_MS: f64 = 5_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRequest {
    pub plan: DispatchPlan,
    pub result: Result<ApiResponse, TransportError>,
    pub latency_ms: f64,
}

impl CompletedRequest {
    /// Orders succeed on 2xx. Error simulations fail on status >= 400 and
    /// count as success otherwise. Transport failures always fail.
    pub fn is_success(&self) -> bool {
        match (&self.plan, &self.result) {
            (_, Err(_)) => false,
            (DispatchPlan::CreateOrder(_), Ok(response)) => response.is_success(),
            (DispatchPlan::SimulateError(_), Ok(response)) => !response.is_error(),
        }
    }

    pub fn recorded_latency_ms(&self) -> f64 {
        match self.result {
            Ok(_) => self.latency_ms,
            Err(_) => TRANSPORT_FAILURE_LATENCY_MS,
        }
    }

    pub fn log_event(&self) -> SimLogEvent {
        let (severity, message) = match (&self.plan, &self.result) {
            (DispatchPlan::CreateOrder(order), Ok(response)) if response.is_success() => (
                Severity::Success,
                format!(
                    "Created order: {} x{} (${:.2})",
                    order.product, order.quantity, order.price
                ),
            ),
            (DispatchPlan::CreateOrder(_), Ok(response)) => (
                Severity::Error,
                format!("Failed to create order ({})", response.status),
            ),
            (DispatchPlan::CreateOrder(_), Err(err)) => {
                (Severity::Error, format!("Order request error: {err}"))
            }
            (DispatchPlan::SimulateError(kind), Ok(response)) if response.is_error() => (
                Severity::Warning,
                format!("Simulated {kind} error ({})", response.status),
            ),
            (DispatchPlan::SimulateError(kind), Ok(response)) => (
                Severity::Info,
                format!("Simulated {kind} request completed ({})", response.status),
            ),
            (DispatchPlan::SimulateError(_), Err(TransportError::Timeout)) => {
                (Severity::Warning, "Timeout error".to_string())
            }
            (DispatchPlan::SimulateError(kind), Err(err)) => (
                Severity::Warning,
                format!("Simulated {kind} request error: {err}"),
            ),
        };

        SimLogEvent::new(SimLogEventKind::RequestCompleted, severity, message)
    }
}

/// Spawns fire-and-forget requests and posts each completion to the
/// aggregator channel.
#[derive(Clone)]
pub struct RequestDispatcher {
    api: Arc<dyn StoreApi>,
    handle: Handle,
    completions: mpsc::UnboundedSender<CompletedRequest>,
    in_flight: Arc<AtomicU64>,
}

impl RequestDispatcher {
    pub fn new(
        api: Arc<dyn StoreApi>,
        handle: Handle,
        completions: mpsc::UnboundedSender<CompletedRequest>,
    ) -> Self {
        Self {
            api,
            handle,
            completions,
            in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn api(&self) -> &Arc<dyn StoreApi> {
        &self.api
    }

    /// Requests dispatched but not yet recorded by the aggregator.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Shared with [`run_aggregator`], which lowers it once an outcome is
    /// recorded.
    pub fn in_flight_gauge(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.in_flight)
    }

    pub fn dispatch(&self, plan: DispatchPlan) {
        let api = Arc::clone(&self.api);
        let completions = self.completions.clone();
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        self.handle.spawn(async move {
            let started = Instant::now();
            let result = match &plan {
                DispatchPlan::CreateOrder(order) => api.create_order(order).await,
                DispatchPlan::SimulateError(kind) => api.simulate_error(*kind).await,
            };
            let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;

            // A closed channel means the controller is gone; nothing to record.
            let _ = completions.send(CompletedRequest {
                plan,
                result,
                latency_ms,
            });
        });
    }
}

/// Applies completions to `stats` in arrival order, one log event each, and
/// lowers `in_flight` under the same lock. Returns once every sender has been
/// dropped.
pub async fn run_aggregator(
    mut completions: mpsc::UnboundedReceiver<CompletedRequest>,
    stats: Arc<Mutex<SessionStats>>,
    in_flight: Arc<AtomicU64>,
    log: Arc<dyn SimLogWriter>,
) {
    while let Some(completed) = completions.recv().await {
        {
            let mut stats = lock(&stats);
            stats.record_outcome(completed.is_success(), completed.recorded_latency_ms());
            in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        log.write(completed.log_event());
    }
}
