use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tokio::{
    runtime::Handle,
    task::AbortHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::lock;

/// Stand-in deadline for delays that overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;
pub type OnceTask = Box<dyn FnOnce() + Send + 'static>;

/// Timer source used by the controller. Dropping a returned [`CancelToken`]
/// leaves the timer running; only [`CancelToken::cancel`] stops it.
pub trait Scheduler: Send + Sync {
    /// Runs `task` every `interval`, first after one full interval.
    fn schedule_repeating(&self, interval: Duration, task: RepeatingTask) -> CancelToken;

    fn schedule_once(&self, delay: Duration, task: OnceTask) -> CancelToken;
}

pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    task: Option<AbortHandle>,
}

impl CancelToken {
    fn new(cancelled: Arc<AtomicBool>, task: Option<AbortHandle>) -> Self {
        Self { cancelled, task }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Timers backed by tasks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, interval: Duration, mut task: RepeatingTask) -> CancelToken {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let first_tick = deadline_after(interval);

        let join = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(first_tick, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::SeqCst) {
                    return;
                }
                task();
            }
        });

        CancelToken::new(cancelled, Some(join.abort_handle()))
    }

    fn schedule_once(&self, delay: Duration, task: OnceTask) -> CancelToken {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let deadline = deadline_after(delay);

        let join = self.handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Repeating timers due at the same instant run first.
            tokio::task::yield_now().await;
            if !flag.load(Ordering::SeqCst) {
                task();
            }
        });

        CancelToken::new(cancelled, Some(join.abort_handle()))
    }
}

struct ManualRepeating {
    interval: Duration,
    cancelled: Arc<AtomicBool>,
    task: Arc<Mutex<RepeatingTask>>,
}

struct ManualOnce {
    delay: Duration,
    cancelled: Arc<AtomicBool>,
    task: OnceTask,
}

#[derive(Default)]
struct ManualTimers {
    repeating: Vec<ManualRepeating>,
    once: Vec<ManualOnce>,
}

/// Scheduler whose timers only fire when the caller says so. Used to drive the
/// controller deterministically.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    timers: Arc<Mutex<ManualTimers>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_repeating(&self) -> usize {
        lock(&self.timers)
            .repeating
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .count()
    }

    pub fn active_once(&self) -> usize {
        lock(&self.timers)
            .once
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .count()
    }

    pub fn repeating_intervals(&self) -> Vec<Duration> {
        lock(&self.timers)
            .repeating
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .map(|timer| timer.interval)
            .collect()
    }

    /// Delays of pending one-shot timers in scheduling order.
    pub fn once_delays(&self) -> Vec<Duration> {
        lock(&self.timers)
            .once
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .map(|timer| timer.delay)
            .collect()
    }

    /// Runs every active repeating task once; returns how many ran.
    pub fn fire_repeating(&self) -> usize {
        let tasks: Vec<Arc<Mutex<RepeatingTask>>> = {
            let mut timers = lock(&self.timers);
            timers
                .repeating
                .retain(|timer| !timer.cancelled.load(Ordering::SeqCst));
            timers
                .repeating
                .iter()
                .map(|timer| Arc::clone(&timer.task))
                .collect()
        };

        for task in &tasks {
            let mut guard = lock(task);
            let run: &mut RepeatingTask = &mut guard;
            run();
        }
        tasks.len()
    }

    /// Runs and removes every pending one-shot task; returns how many ran.
    pub fn fire_once(&self) -> usize {
        let pending = std::mem::take(&mut lock(&self.timers).once);

        let mut fired = 0;
        for timer in pending {
            if timer.cancelled.load(Ordering::SeqCst) {
                continue;
            }
            (timer.task)();
            fired += 1;
        }
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, interval: Duration, task: RepeatingTask) -> CancelToken {
        let cancelled = Arc::new(AtomicBool::new(false));
        lock(&self.timers).repeating.push(ManualRepeating {
            interval,
            cancelled: Arc::clone(&cancelled),
            task: Arc::new(Mutex::new(task)),
        });
        CancelToken::new(cancelled, None)
    }

    fn schedule_once(&self, delay: Duration, task: OnceTask) -> CancelToken {
        let cancelled = Arc::new(AtomicBool::new(false));
        lock(&self.timers).once.push(ManualOnce {
            delay,
            cancelled: Arc::clone(&cancelled),
            task,
        });
        CancelToken::new(cancelled, None)
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("active_repeating", &self.active_repeating())
            .field("active_once", &self.active_once())
            .finish()
    }
}
