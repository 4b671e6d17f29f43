//! Cancellable timers.
//!
//! The deposit flow never calls `tokio::time` directly; it asks a
//! `Scheduler` for timers and keeps the returned `TimerHandle`s. Dropping
//! a handle cancels its timer, so whoever owns the handle owns the timer.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::{Instant, MissedTickBehavior};

pub type Task = BoxFuture<'static, ()>;

/// Produces one future per tick.
pub type RepeatingTask = Box<dyn FnMut() -> BoxFuture<'static, ()> + Send>;

/// Owner of a scheduled timer. `cancel` is idempotent and runs on drop.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub trait Scheduler: Send + Sync + 'static {
    /// Run `task` once after `delay`.
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;

    /// Run a fresh future from `task` every `period`, first one period from
    /// now. Ticks that fall behind are delayed, not bunched.
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TimerHandle;
}

/// One scheduled timer's share of the live count. Released exactly once,
/// whether the timer finishes or is cancelled.
struct Slot {
    live: Arc<AtomicUsize>,
    released: AtomicBool,
}

impl Slot {
    fn acquire(live: &Arc<AtomicUsize>) -> Arc<Self> {
        live.fetch_add(1, Ordering::SeqCst);
        Arc::new(Self {
            live: Arc::clone(live),
            released: AtomicBool::new(false),
        })
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Timers backed by spawned tokio tasks. Cancelling aborts the task.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    live: Arc<AtomicUsize>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers that have neither fired (one-shot) nor been cancelled.
    pub fn pending(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn spawn(&self, timer: impl Future<Output = ()> + Send + 'static) -> TimerHandle {
        let slot = Slot::acquire(&self.live);
        let finished = Arc::clone(&slot);
        let task = tokio::spawn(async move {
            timer.await;
            finished.release();
        });
        let abort = task.abort_handle();
        TimerHandle::new(move || {
            abort.abort();
            slot.release();
        })
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        })
    }

    fn schedule_repeating(&self, period: Duration, mut task: RepeatingTask) -> TimerHandle {
        self.spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                task().await;
            }
        })
    }
}
