//! Shared auth UI helpers.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route components should apply identical unauthenticated redirect behavior.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use leptos::prelude::*;
use leptos_router::NavigateOptions;

use crate::context::SessionContext;
use crate::state::auth::AuthState;

/// Route the console shows when a screen requires a session.
pub const SIGNED_OUT_ROUTE: &str = "/signed-out";

/// True once the session has loaded and no user is present.
pub fn should_redirect_unauth(state: &AuthState) -> bool {
    !state.loading && state.user.is_none()
}

/// Redirect to [`SIGNED_OUT_ROUTE`] whenever the session has loaded and no
/// user is present.
pub fn install_unauth_redirect<F>(session: SessionContext, navigate: F)
where
    F: Fn(&str, NavigateOptions) + Clone + 'static,
{
    Effect::new(move || {
        if session.state().with(should_redirect_unauth) {
            navigate(SIGNED_OUT_ROUTE, NavigateOptions { replace: true, ..NavigateOptions::default() });
        }
    });
}

/// True when the signed-in user holds `role`.
pub fn has_role(state: &AuthState, role: &str) -> bool {
    state.user.as_ref().is_some_and(|u| u.has_role(role))
}
