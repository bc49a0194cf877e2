use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod client;
pub mod controller;
pub mod dispatch;
pub mod journal;
pub mod logging;
pub mod metrics;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use client::{ApiResponse, StoreApi, TransportError};
pub use controller::{
    SimulationController, SimulationStatus, StatsSnapshot, DEFAULT_BULK_ORDER_COUNT,
    DEFAULT_BURST_COUNT, DEFAULT_BURST_SPACING,
};
pub use dispatch::{CompletedRequest, RequestDispatcher, TRANSPORT_FAILURE_LATENCY_MS};
pub use journal::{ActivityCsvWriter, CsvJournalLogWriter, ACTIVITY_CSV_HEADER};
pub use logging::{
    FanOutLogWriter, InMemorySimLogWriter, Severity, SimLogEvent, SimLogEventKind, SimLogWriter,
};
pub use metrics::LatencyPercentiles;
pub use scheduler::{CancelToken, ManualScheduler, Scheduler, TokioScheduler};

/// Shared state stays usable after a panicking holder; every critical
/// section leaves it consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
