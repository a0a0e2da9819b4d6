//! The single authoritative session state and its transitions.
//!
//! DESIGN
//! ======
//! All mutation goes through the methods here; the manager owns the only
//! instance and publishes read-only `AuthState` copies. Transitions are pure
//! (time is passed in) so they are tested without timers or a network.

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use crate::config::SessionConfig;
use crate::net::gateway::GatewayError;
use crate::net::types::{SessionResponse, User};

/// Externally meaningful lifecycle phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// No answer from the gateway yet.
    #[default]
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// Result of counting a failed refresh attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Keep the session and try again after backoff.
    Retry,
    /// Too many failures in a row; local state was torn down.
    Exhausted,
    /// The credential ran out while refreshes kept failing; local state was
    /// torn down.
    Expired,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Present iff `phase` is `Authenticated`.
    pub user: Option<User>,
    pub csrf_token: Option<String>,
    /// Credential expiry, epoch seconds.
    pub expires_at: Option<i64>,
    pub last_error: Option<GatewayError>,
    /// Failed refresh attempts classified as gateway failures.
    pub consecutive_failure_count: u32,
    /// Rate-limited or network-failed attempts, including failed first
    /// session fetches.
    pub transient_failure_count: u32,
    /// Epoch seconds of the last completed session fetch.
    pub last_checked_at: Option<f64>,
    /// Epoch seconds of the last successful refresh.
    pub last_refreshed_at: Option<f64>,
}

impl SessionState {
    /// State seeded from a session the hosting shell already fetched.
    pub fn seeded(response: SessionResponse, now: f64) -> Self {
        let mut state = Self::default();
        state.apply_snapshot(response, now);
        state
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    /// Exponent used for the backoff floor.
    pub fn backoff_exponent(&self) -> u32 {
        self.consecutive_failure_count
            .saturating_add(self.transient_failure_count)
    }

    /// Apply the latest session answer from the gateway.
    ///
    /// Idempotent: applying the same snapshot twice yields the same state.
    /// Any answer is good news for the failure counters; an authenticated
    /// answer without a user record is treated as unauthenticated.
    pub fn apply_snapshot(&mut self, response: SessionResponse, now: f64) {
        let SessionResponse { authenticated, user, expires_at, csrf_token, error } = response;
        self.consecutive_failure_count = 0;
        self.transient_failure_count = 0;
        self.last_checked_at = Some(now);

        match (authenticated, user) {
            (true, Some(user)) => {
                self.phase = SessionPhase::Authenticated;
                self.user = Some(user);
                self.expires_at = expires_at;
                self.csrf_token = csrf_token;
                self.last_error = None;
            }
            _ => {
                self.clear_identity();
                self.last_error = error.map(|message| GatewayError::GatewayFailure { status: None, message });
            }
        }
    }

    /// Record the outcome of a successful refresh followed by a re-fetch.
    pub fn apply_refreshed(&mut self, response: SessionResponse, now: f64) {
        self.apply_snapshot(response, now);
        if self.is_authenticated() {
            self.last_refreshed_at = Some(now);
        }
    }

    /// A fetch failed before we ever knew the session state.
    pub fn fail_bootstrap(&mut self, error: GatewayError, now: f64) {
        self.clear_identity();
        self.last_error = Some(error);
        self.last_checked_at = Some(now);
    }

    /// A first session fetch failed transiently. The phase stays `Unknown`
    /// until a retry answers or `max_transient_failures` is reached.
    pub fn defer_bootstrap(&mut self, error: GatewayError, now: f64, max_transient_failures: u32) -> FailureOutcome {
        self.transient_failure_count = self.transient_failure_count.saturating_add(1);
        if self.transient_failure_count >= max_transient_failures {
            self.fail_bootstrap(error, now);
            return FailureOutcome::Exhausted;
        }
        self.last_error = Some(error);
        self.last_checked_at = Some(now);
        FailureOutcome::Retry
    }

    /// Count a failed refresh attempt.
    ///
    /// Gateway failures count toward `max_consecutive_failures` and transient
    /// ones toward the higher `max_transient_failures`. A failure at or past
    /// `expires_at` ends the session regardless of the counters. Either way
    /// local state is torn down but `last_error` is kept so the screen can
    /// explain why.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_refresh_failure(&mut self, error: GatewayError, now: f64, config: &SessionConfig) -> FailureOutcome {
        if error.is_transient() {
            self.transient_failure_count = self.transient_failure_count.saturating_add(1);
        } else {
            self.consecutive_failure_count = self.consecutive_failure_count.saturating_add(1);
        }
        self.last_error = Some(error);

        let outcome = if self.expires_at.is_some_and(|expires_at| now >= expires_at as f64) {
            FailureOutcome::Expired
        } else if self.consecutive_failure_count >= config.max_consecutive_failures
            || self.transient_failure_count >= config.max_transient_failures
        {
            FailureOutcome::Exhausted
        } else {
            return FailureOutcome::Retry;
        };
        self.clear_identity();
        outcome
    }

    /// Drop everything, including the last error. Used by explicit logout.
    pub fn reset_unauthenticated(&mut self) {
        *self = Self { phase: SessionPhase::Unauthenticated, ..Self::default() };
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn clear_identity(&mut self) {
        self.phase = SessionPhase::Unauthenticated;
        self.user = None;
        self.csrf_token = None;
        self.expires_at = None;
        self.last_refreshed_at = None;
    }
}
