//! Development bypass gateway.
//!
//! Substitutes a static mock session for the identity gateway so the console
//! can be run locally without one. Config refuses to select it for production
//! builds.

#[cfg(test)]
#[path = "dev_gateway_test.rs"]
mod dev_gateway_test;

use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;

use super::gateway::{GatewayEndpoints, GatewayError, IdentityGateway};
use super::types::{SessionResponse, User};

const DEV_SESSION_TTL: Duration = Duration::from_secs(3600);

pub struct DevBypassGateway {
    endpoints: GatewayEndpoints,
    user: User,
    ttl: Duration,
    clock: Rc<dyn Fn() -> f64>,
}

impl DevBypassGateway {
    /// `clock` returns the current time in epoch seconds.
    pub fn new(endpoints: GatewayEndpoints, clock: Rc<dyn Fn() -> f64>) -> Self {
        Self { endpoints, user: dev_user(), ttl: DEV_SESSION_TTL, clock }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn expires_at(&self) -> i64 {
        ((self.clock)() + self.ttl.as_secs_f64()).floor() as i64
    }
}

/// The static operator every bypassed session belongs to.
pub fn dev_user() -> User {
    User {
        id: "dev-operator".to_owned(),
        email: "operator@localhost".to_owned(),
        display_name: "Local Operator".to_owned(),
        roles: vec!["admin".to_owned()],
    }
}

#[async_trait(?Send)]
impl IdentityGateway for DevBypassGateway {
    async fn fetch_session(&self) -> Result<SessionResponse, GatewayError> {
        Ok(SessionResponse {
            authenticated: true,
            user: Some(self.user.clone()),
            expires_at: Some(self.expires_at()),
            csrf_token: Some("dev-csrf-token".to_owned()),
            error: None,
        })
    }

    async fn fetch_csrf_token(&self) -> Option<String> {
        Some("dev-csrf-token".to_owned())
    }

    async fn request_refresh(&self) -> Result<(), GatewayError> {
        log::debug!("dev bypass: refresh accepted");
        Ok(())
    }

    async fn request_logout(&self, return_to: Option<&str>) -> Result<Option<String>, GatewayError> {
        Ok(return_to.map(str::to_owned))
    }

    fn endpoints(&self) -> &GatewayEndpoints {
        &self.endpoints
    }
}
