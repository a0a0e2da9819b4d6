//! Session lifecycle management.
//!
//! SYSTEM CONTEXT
//! ==============
//! `manager` owns the one mutable `SessionState` and is the only caller of the
//! identity gateway. Scheduling decisions are pure functions in `schedule`;
//! the timer, lock and host seams live in `scheduler`, `single_flight` and
//! `runtime`. `browser` wires DOM lifecycle events in the hydrate build.

#[cfg(feature = "hydrate")]
pub mod browser;
pub mod manager;
pub mod runtime;
pub mod schedule;
pub mod scheduler;
pub mod seed;
pub mod single_flight;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use manager::{LifecycleEvent, RefreshOutcome, SessionManager, Subscription};
pub use runtime::{BrowserRuntime, Runtime};
pub use state::{SessionPhase, SessionState};
