use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use runtime::{Severity, SimLogEvent, SimLogWriter, SimulationController, SimulationStatus};
use tokio::sync::broadcast;
use traffic_core::ModeParsePolicy;

/// Log events kept for polling clients.
pub const RECENT_EVENT_CAPACITY: usize = 100;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Frames pushed to WebSocket subscribers.
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum StreamEvent {
    Connected {
        status: SimulationStatus,
    },
    Activity {
        #[serde(flatten)]
        event: SimLogEvent,
    },
}

/// Log writer that fans domain events out to live subscribers, keeps a short
/// history and mirrors everything into `tracing`.
#[derive(Debug)]
pub struct EventHub {
    events_tx: broadcast::Sender<SimLogEvent>,
    recent: Mutex<VecDeque<SimLogEvent>>,
}

impl Default for EventHub {
    fn default() -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            events_tx,
            recent: Mutex::new(VecDeque::with_capacity(RECENT_EVENT_CAPACITY)),
        }
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimLogEvent> {
        self.events_tx.subscribe()
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<SimLogEvent> {
        self.recent_guard().iter().cloned().collect()
    }

    fn recent_guard(&self) -> MutexGuard<'_, VecDeque<SimLogEvent>> {
        self.recent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SimLogWriter for EventHub {
    fn write(&self, event: SimLogEvent) {
        let kind = event.kind.as_str();
        match event.severity {
            Severity::Info | Severity::Success => {
                tracing::info!(kind, "{}", event.message)
            }
            Severity::Warning => {
                tracing::warn!(kind, "{}", event.message)
            }
            Severity::Error => {
                tracing::error!(kind, "{}", event.message)
            }
        }

        {
            let mut recent = self.recent_guard();
            if recent.len() == RECENT_EVENT_CAPACITY {
                recent.pop_front();
            }
            recent.push_back(event.clone());
        }

        // No subscribers is fine; the history above still has the event.
        let _ = self.events_tx.send(event);
    }
}

#[derive(Clone)]
pub struct AppState {
    controller: SimulationController,
    events: Arc<EventHub>,
    mode_policy: ModeParsePolicy,
}

impl AppState {
    /// `events` should be (or be fanned out from) the log writer the
    /// controller was built with.
    pub fn new(
        controller: SimulationController,
        events: Arc<EventHub>,
        mode_policy: ModeParsePolicy,
    ) -> Self {
        Self {
            controller,
            events,
            mode_policy,
        }
    }

    pub fn controller(&self) -> &SimulationController {
        &self.controller
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn mode_policy(&self) -> ModeParsePolicy {
        self.mode_policy
    }
}
