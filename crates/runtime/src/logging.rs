use std::sync::{Arc, Mutex};

use serde::Serialize;
use time::OffsetDateTime;

use crate::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimLogEventKind {
    SimulationStarted,
    SimulationStopped,
    RequestCompleted,
    BulkOrdersDispatched,
    LoadBurstScheduled,
    HealthChecked,
}

impl SimLogEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SimulationStarted => "simulation_started",
            Self::SimulationStopped => "simulation_stopped",
            Self::RequestCompleted => "request_completed",
            Self::BulkOrdersDispatched => "bulk_orders_dispatched",
            Self::LoadBurstScheduled => "load_burst_scheduled",
            Self::HealthChecked => "health_checked",
        }
    }
}

/// One entry of the activity stream consumed by the display layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimLogEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub kind: SimLogEventKind,
    pub severity: Severity,
    pub message: String,
}

impl SimLogEvent {
    pub fn new(kind: SimLogEventKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            kind,
            severity,
            message: message.into(),
        }
    }
}

pub trait SimLogWriter: Send + Sync {
    fn write(&self, event: SimLogEvent);
}

#[derive(Debug, Default)]
pub struct InMemorySimLogWriter {
    events: Mutex<Vec<SimLogEvent>>,
}

impl InMemorySimLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SimLogEvent> {
        lock(&self.events).clone()
    }

    pub fn count(&self, kind: SimLogEventKind) -> usize {
        lock(&self.events)
            .iter()
            .filter(|event| event.kind == kind)
            .count()
    }
}

impl SimLogWriter for InMemorySimLogWriter {
    fn write(&self, event: SimLogEvent) {
        lock(&self.events).push(event);
    }
}

/// Hands every event to each inner writer in order.
#[derive(Default)]
pub struct FanOutLogWriter {
    writers: Vec<Arc<dyn SimLogWriter>>,
}

impl FanOutLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_writer(mut self, writer: Arc<dyn SimLogWriter>) -> Self {
        self.writers.push(writer);
        self
    }
}

impl SimLogWriter for FanOutLogWriter {
    fn write(&self, event: SimLogEvent) {
        if let Some((last, rest)) = self.writers.split_last() {
            for writer in rest {
                writer.write(event.clone());
            }
            last.write(event);
        }
    }
}
