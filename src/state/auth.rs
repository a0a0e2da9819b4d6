//! Auth-session state for the current browser user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Used by route guards and user-aware components to coordinate login redirects
//! and identity-dependent rendering. This is the read-only copy the session
//! manager publishes; screens never mutate it.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use crate::net::gateway::GatewayError;
use crate::net::types::User;
use crate::session::state::{SessionPhase, SessionState};

/// Authentication state tracking the current user and loading status.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub authenticated: bool,
    /// The first session check is in flight.
    pub loading: bool,
    pub csrf_token: Option<String>,
    /// Credential expiry, epoch seconds.
    pub expires_at: Option<i64>,
    pub last_error: Option<GatewayError>,
}

impl AuthState {
    /// Snapshot of the manager's state. `Unknown` counts as loading so guards
    /// wait for the first answer.
    pub fn from_session(state: &SessionState, loading: bool) -> Self {
        Self {
            user: state.user.clone(),
            authenticated: state.is_authenticated(),
            loading: loading || state.phase == SessionPhase::Unknown,
            csrf_token: state.csrf_token.clone(),
            expires_at: state.expires_at,
            last_error: state.last_error.clone(),
        }
    }

    /// Display name of the signed-in user, if any.
    pub fn display_name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.display_name.as_str())
    }
}
