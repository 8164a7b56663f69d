//! Awaitable delays between animation steps.
//!
//! A move is only finished once its animation has played out. By default the
//! engine waits on a tokio timer; when the host runs a companion animation
//! sequencer, waiting is delegated to it so both stay in step. The choice is
//! made on every wait, so a scheduler that activates or deactivates
//! mid-session is picked up immediately.

#[cfg(test)]
#[path = "wait_test.rs"]
mod wait_test;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Something that can suspend the caller for a number of milliseconds.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, ms: u64);
}

/// An external animation sequencer offered by the host.
#[async_trait]
pub trait ExternalScheduler: Send + Sync {
    /// Whether the sequencer is currently loaded and usable.
    fn is_active(&self) -> bool;
    async fn wait(&self, ms: u64);
}

/// Plain tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerDelay;

#[async_trait]
impl Delay for TimerDelay {
    async fn wait(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Delegates to an [`ExternalScheduler`].
#[derive(Clone)]
pub struct ScheduledDelay(Arc<dyn ExternalScheduler>);

#[async_trait]
impl Delay for ScheduledDelay {
    async fn wait(&self, ms: u64) {
        self.0.wait(ms).await;
    }
}

/// Picks the right [`Delay`] at call time.
#[derive(Clone, Default)]
pub struct Waiter {
    timer: TimerDelay,
    scheduled: Option<ScheduledDelay>,
}

impl Waiter {
    #[must_use]
    pub fn new(scheduler: Option<Arc<dyn ExternalScheduler>>) -> Self {
        Self { timer: TimerDelay, scheduled: scheduler.map(ScheduledDelay) }
    }

    /// The delay that will serve the next wait.
    #[must_use]
    pub fn select(&self) -> &dyn Delay {
        match &self.scheduled {
            Some(scheduled) if scheduled.0.is_active() => scheduled,
            _ => &self.timer,
        }
    }

    pub async fn wait(&self, ms: u64) {
        self.select().wait(ms).await;
    }
}
