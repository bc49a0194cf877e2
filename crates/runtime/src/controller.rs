use std::{
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use serde::Serialize;
use tokio::{runtime::Handle, sync::mpsc, time::Instant};
use traffic_core::{
    DispatchPlan, RandomSource, RequestGenerator, SessionStats, SimulationConfig, TrafficMode,
};

use crate::{
    client::StoreApi,
    dispatch::{run_aggregator, RequestDispatcher},
    lock,
    logging::{Severity, SimLogEvent, SimLogEventKind, SimLogWriter},
    metrics::LatencyPercentiles,
    scheduler::{CancelToken, Scheduler},
};

pub const DEFAULT_BULK_ORDER_COUNT: usize = 10;
pub const DEFAULT_BURST_COUNT: usize = 20;
pub const DEFAULT_BURST_SPACING: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Requested,
    DurationElapsed,
}

struct ActiveRun {
    config: SimulationConfig,
    tick: CancelToken,
    duration: CancelToken,
}

#[derive(Default)]
struct SimulationState {
    run: Option<ActiveRun>,
    started_at: Option<Instant>,
}

/// Read model for the display layer. Rebuilt from raw counters on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub status: SimulationStatus,
    pub mode: Option<TrafficMode>,
    pub requests_issued: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub in_flight: u64,
    pub requests_per_minute: f64,
    pub error_rate_pct: f64,
    pub average_latency_ms: f64,
    pub latency_percentiles: Option<LatencyPercentiles>,
}

struct ControllerInner {
    scheduler: Arc<dyn Scheduler>,
    dispatcher: RequestDispatcher,
    generator: Mutex<RequestGenerator>,
    stats: Arc<Mutex<SessionStats>>,
    state: Mutex<SimulationState>,
    log: Arc<dyn SimLogWriter>,
}

impl ControllerInner {
    fn tick(&self) {
        let Some(config) = lock(&self.state).run.as_ref().map(|run| run.config) else {
            return;
        };
        let plan = lock(&self.generator).next_plan(&config);
        self.dispatcher.dispatch(plan);
    }

    fn dispatch_order(&self) {
        let order = lock(&self.generator).next_order();
        self.dispatcher.dispatch(DispatchPlan::CreateOrder(order));
    }

    fn stop(&self, reason: StopReason) -> bool {
        let Some(run) = lock(&self.state).run.take() else {
            return false;
        };
        run.tick.cancel();
        run.duration.cancel();

        let message = match reason {
            StopReason::Requested => "Simulation stopped".to_string(),
            StopReason::DurationElapsed => format!(
                "Simulation finished after {}s",
                run.config.duration_seconds()
            ),
        };
        self.log.write(SimLogEvent::new(
            SimLogEventKind::SimulationStopped,
            Severity::Warning,
            message,
        ));
        true
    }
}

/// Owns one simulation lifecycle and its session stats. Clones share state.
#[derive(Clone)]
pub struct SimulationController {
    inner: Arc<ControllerInner>,
}

impl SimulationController {
    /// Spawns the stats aggregator on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(
        api: Arc<dyn StoreApi>,
        scheduler: Arc<dyn Scheduler>,
        rng: Box<dyn RandomSource>,
        log: Arc<dyn SimLogWriter>,
    ) -> Self {
        let handle = Handle::current();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(Mutex::new(SessionStats::new()));
        let dispatcher = RequestDispatcher::new(api, handle.clone(), completions_tx);
        handle.spawn(run_aggregator(
            completions_rx,
            Arc::clone(&stats),
            dispatcher.in_flight_gauge(),
            Arc::clone(&log),
        ));

        Self {
            inner: Arc::new(ControllerInner {
                scheduler,
                dispatcher,
                generator: Mutex::new(RequestGenerator::new(rng)),
                stats,
                state: Mutex::new(SimulationState::default()),
                log,
            }),
        }
    }

    /// Starts a run. Returns `false` without side effects when one is already
    /// running.
    pub fn start(&self, config: SimulationConfig) -> bool {
        let mut state = lock(&self.inner.state);
        if state.run.is_some() {
            return false;
        }

        let stop_target = Arc::downgrade(&self.inner);
        let duration = self.inner.scheduler.schedule_once(
            config.duration(),
            Box::new(move || {
                if let Some(inner) = Weak::upgrade(&stop_target) {
                    inner.stop(StopReason::DurationElapsed);
                }
            }),
        );

        let tick_target = Arc::downgrade(&self.inner);
        let tick = self.inner.scheduler.schedule_repeating(
            config.tick_interval(),
            Box::new(move || {
                if let Some(inner) = Weak::upgrade(&tick_target) {
                    inner.tick();
                }
            }),
        );

        state.started_at = Some(Instant::now());
        state.run = Some(ActiveRun {
            config,
            tick,
            duration,
        });
        drop(state);

        self.inner.log.write(SimLogEvent::new(
            SimLogEventKind::SimulationStarted,
            Severity::Success,
            format!(
                "Starting {} traffic simulation for {}s ({} req/min)",
                config.mode(),
                config.duration_seconds(),
                config.mode().requests_per_minute()
            ),
        ));
        true
    }

    /// Cancels both timers. Requests already in flight still complete and are
    /// still counted. Returns `false` when nothing was running.
    pub fn stop(&self) -> bool {
        self.inner.stop(StopReason::Requested)
    }

    pub fn status(&self) -> SimulationStatus {
        if lock(&self.inner.state).run.is_some() {
            SimulationStatus::Running
        } else {
            SimulationStatus::Idle
        }
    }

    pub fn active_config(&self) -> Option<SimulationConfig> {
        lock(&self.inner.state).run.as_ref().map(|run| run.config)
    }

    pub fn stats(&self) -> SessionStats {
        lock(&self.inner.stats).clone()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let (status, mode, elapsed) = {
            let state = lock(&self.inner.state);
            let status = if state.run.is_some() {
                SimulationStatus::Running
            } else {
                SimulationStatus::Idle
            };
            let mode = state.run.as_ref().map(|run| run.config.mode());
            (status, mode, state.started_at.map(|at| at.elapsed()))
        };
        // The aggregator settles the gauge under the stats lock.
        let (stats, in_flight) = {
            let stats = lock(&self.inner.stats);
            (stats.clone(), self.inner.dispatcher.in_flight())
        };

        StatsSnapshot {
            status,
            mode,
            requests_issued: stats.requests_issued(),
            success_count: stats.success_count(),
            error_count: stats.error_count(),
            in_flight,
            requests_per_minute: stats.requests_per_minute(elapsed),
            error_rate_pct: stats.error_rate_pct(),
            average_latency_ms: stats.average_latency_ms(),
            latency_percentiles: LatencyPercentiles::from_samples(
                stats.latency_samples().iter().copied(),
            ),
        }
    }

    /// Sends `count` order creations at once, independent of any run.
    pub fn dispatch_bulk_orders(&self, count: usize) -> usize {
        self.inner.log.write(SimLogEvent::new(
            SimLogEventKind::BulkOrdersDispatched,
            Severity::Success,
            format!("Creating {count} orders"),
        ));
        for _ in 0..count {
            self.inner.dispatch_order();
        }
        count
    }

    /// Schedules `count` order creations `spacing` apart, the first one
    /// immediately. Not cancelled by [`SimulationController::stop`].
    pub fn schedule_load_burst(&self, count: usize, spacing: Duration) -> usize {
        self.inner.log.write(SimLogEvent::new(
            SimLogEventKind::LoadBurstScheduled,
            Severity::Warning,
            format!(
                "Generating load: {count} requests every {}ms",
                spacing.as_millis()
            ),
        ));
        for index in 0..count {
            let target = Arc::downgrade(&self.inner);
            let delay = spacing.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
            let _timer = self.inner.scheduler.schedule_once(
                delay,
                Box::new(move || {
                    if let Some(inner) = Weak::upgrade(&target) {
                        inner.dispatch_order();
                    }
                }),
            );
        }
        count
    }

    /// Calls `GET /health` on the storefront and logs the verdict.
    pub async fn probe_health(&self) -> bool {
        let result = self.inner.dispatcher.api().health().await;
        let (healthy, severity, message) = match result {
            Ok(response) if response.is_success() => {
                (true, Severity::Success, "Health check: OK".to_string())
            }
            Ok(response) => (
                false,
                Severity::Error,
                format!("Health check: FAILED ({})", response.status),
            ),
            Err(err) => (
                false,
                Severity::Error,
                format!("Health check: ERROR ({err})"),
            ),
        };

        self.inner.log.write(SimLogEvent::new(
            SimLogEventKind::HealthChecked,
            severity,
            message,
        ));
        healthy
    }
}
