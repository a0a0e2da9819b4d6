//! Single pending refresh timer.
//!
//! `arm` cancels whatever was pending before arming, so at most one timer is
//! ever outstanding no matter which trigger path asked for it. Each timer
//! carries a generation; a fire that no longer matches the pending generation
//! is stale and ignored.

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;

use std::time::Duration;

use super::runtime::Runtime;

/// What a pending timer does when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FireAction {
    Refresh,
    Reevaluate,
    /// Retry the first session fetch.
    Recheck,
}

struct PendingTimer<T> {
    timer: T,
    action: FireAction,
    generation: u64,
    delay: Duration,
}

pub struct SchedulerHandle<T> {
    pending: Option<PendingTimer<T>>,
    generation: u64,
}

impl<T> Default for SchedulerHandle<T> {
    fn default() -> Self {
        Self { pending: None, generation: 0 }
    }
}

impl<T: 'static> SchedulerHandle<T> {
    /// Cancel any pending timer, then arm a new one. `on_fire` receives the
    /// generation to hand back to [`SchedulerHandle::take_fired`].
    pub fn arm<R, F>(&mut self, runtime: &R, delay: Duration, action: FireAction, on_fire: F) -> u64
    where
        R: Runtime<Timer = T>,
        F: FnOnce(u64) + 'static,
    {
        self.cancel(runtime);
        self.generation += 1;
        let generation = self.generation;
        let timer = runtime.arm_timer(delay, Box::new(move || on_fire(generation)));
        self.pending = Some(PendingTimer { timer, action, generation, delay });
        generation
    }

    pub fn cancel<R: Runtime<Timer = T>>(&mut self, runtime: &R) {
        if let Some(pending) = self.pending.take() {
            runtime.cancel_timer(pending.timer);
        }
    }

    /// Claim a fired timer. `None` when `generation` is stale.
    pub fn take_fired(&mut self, generation: u64) -> Option<FireAction> {
        if self.pending.as_ref().is_some_and(|p| p.generation == generation) {
            return self.pending.take().map(|p| p.action);
        }
        None
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Delay and action of the pending timer, if any.
    pub fn pending(&self) -> Option<(Duration, FireAction)> {
        self.pending.as_ref().map(|p| (p.delay, p.action))
    }
}
