//! Identity gateway client.
//!
//! SYSTEM CONTEXT
//! ==============
//! Thin boundary to the remote identity gateway. Only the session manager
//! calls it; screens never do. There is no retry or scheduling here: every
//! call reports success, the unauthenticated answer, or a classified
//! [`GatewayError`] verbatim and the manager decides what to do with it.
//!
//! Client-side (hydrate): real HTTP calls via `gloo-net` with credentials.
//! Server-side / native: `HttpGateway` is not compiled; tests substitute a
//! scripted gateway through the [`IdentityGateway`] trait.

#[cfg(test)]
#[path = "gateway_test.rs"]
mod gateway_test;

use std::rc::Rc;

use async_trait::async_trait;

use super::types::{LoginOptions, SessionResponse};

/// Header carrying the anti-forgery token on mutating gateway calls.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Classified failure of a gateway call.
///
/// "No valid session" is not an error; it is an `Ok` response with
/// `authenticated: false`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The gateway is throttling us (HTTP 429).
    #[error("identity gateway is rate limiting requests")]
    RateLimited,

    /// Transport-level failure: offline, DNS, timeout, aborted connection.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Any other non-2xx answer, or a body we could not decode.
    #[error("identity gateway failure{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    GatewayFailure { status: Option<u16>, message: String },
}

impl GatewayError {
    /// Build the error for a non-2xx, non-401, non-429 status.
    pub fn from_status(status: u16, body: Option<&str>) -> Self {
        let message = body
            .and_then(gateway_error_message)
            .unwrap_or_else(|| format!("request failed: {status}"));
        Self::GatewayFailure { status: Some(status), message }
    }

    /// Transient failures back off and escalate at a higher limit than hard
    /// gateway failures.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::NetworkFailure(_))
    }
}

/// How a gateway HTTP status should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Unauthenticated,
    RateLimited,
    Failure(u16),
}

pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        401 => StatusClass::Unauthenticated,
        429 => StatusClass::RateLimited,
        other => StatusClass::Failure(other),
    }
}

/// Pull a human-readable message out of a JSON error body.
///
/// Prefers `message`, then `error`, then `error_description`.
pub fn gateway_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error", "error_description"]
        .iter()
        .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        .filter(|msg| !msg.trim().is_empty())
        .map(str::to_owned)
}

// =============================================================================
// ENDPOINTS
// =============================================================================

/// URL builder for the gateway's HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoints {
    base: String,
}

impl GatewayEndpoints {
    pub fn new(base: &str) -> Self {
        Self { base: base.trim_end_matches('/').to_owned() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn session_url(&self) -> String {
        format!("{}/session", self.base)
    }

    pub fn csrf_url(&self) -> String {
        format!("{}/csrf", self.base)
    }

    pub fn refresh_url(&self) -> String {
        format!("{}/refresh", self.base)
    }

    /// Interactive login entry point.
    pub fn login_url(&self, options: &LoginOptions) -> String {
        let mut params = Vec::new();
        if let Some(return_to) = options.return_to.as_deref() {
            params.push(("returnTo", return_to));
        }
        if let Some(prompt) = options.prompt.as_deref() {
            params.push(("prompt", prompt));
        }
        with_query(format!("{}/login", self.base), &params)
    }

    /// Logout endpoint, used both for navigation and the programmatic call.
    pub fn logout_url(&self, return_to: Option<&str>) -> String {
        let params: Vec<(&str, &str)> = return_to.map(|r| ("returnTo", r)).into_iter().collect();
        with_query(format!("{}/logout", self.base), &params)
    }
}

fn with_query(mut url: String, params: &[(&str, &str)]) -> String {
    for (i, (key, value)) in params.iter().enumerate() {
        url.push(if i == 0 { '?' } else { '&' });
        url.push_str(key);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
    url
}

// =============================================================================
// GATEWAY TRAIT
// =============================================================================

/// Async boundary to the identity gateway. Enables scripted gateways in tests
/// and the development bypass.
#[async_trait(?Send)]
pub trait IdentityGateway {
    /// Fetch the current session. 401 is `Ok` with `authenticated: false`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::RateLimited`] on 429, [`GatewayError::NetworkFailure`]
    /// on transport errors, [`GatewayError::GatewayFailure`] otherwise.
    async fn fetch_session(&self) -> Result<SessionResponse, GatewayError>;

    /// Fetch a fresh anti-forgery token. `None` when unavailable.
    async fn fetch_csrf_token(&self) -> Option<String>;

    /// Ask the gateway to renew the session credential.
    ///
    /// # Errors
    ///
    /// Any non-2xx answer (including 401) or transport failure.
    async fn request_refresh(&self) -> Result<(), GatewayError>;

    /// Programmatic logout. Returns where the gateway wants the browser to go.
    ///
    /// # Errors
    ///
    /// Any non-2xx answer or transport failure.
    async fn request_logout(&self, return_to: Option<&str>) -> Result<Option<String>, GatewayError>;

    fn endpoints(&self) -> &GatewayEndpoints;
}

#[async_trait(?Send)]
impl<G: IdentityGateway + ?Sized> IdentityGateway for Rc<G> {
    async fn fetch_session(&self) -> Result<SessionResponse, GatewayError> {
        (**self).fetch_session().await
    }

    async fn fetch_csrf_token(&self) -> Option<String> {
        (**self).fetch_csrf_token().await
    }

    async fn request_refresh(&self) -> Result<(), GatewayError> {
        (**self).request_refresh().await
    }

    async fn request_logout(&self, return_to: Option<&str>) -> Result<Option<String>, GatewayError> {
        (**self).request_logout(return_to).await
    }

    fn endpoints(&self) -> &GatewayEndpoints {
        (**self).endpoints()
    }
}

// =============================================================================
// HTTP GATEWAY (hydrate)
// =============================================================================

/// `gloo-net` implementation talking to the real gateway.
#[cfg(feature = "hydrate")]
#[derive(Debug, Clone)]
pub struct HttpGateway {
    endpoints: GatewayEndpoints,
}

#[cfg(feature = "hydrate")]
impl HttpGateway {
    pub fn new(endpoints: GatewayEndpoints) -> Self {
        Self { endpoints }
    }
}

#[cfg(feature = "hydrate")]
fn network_error(err: gloo_net::Error) -> GatewayError {
    GatewayError::NetworkFailure(err.to_string())
}

#[cfg(feature = "hydrate")]
async fn failure_from_response(resp: gloo_net::http::Response) -> GatewayError {
    let status = resp.status();
    let body = resp.text().await.ok();
    GatewayError::from_status(status, body.as_deref())
}

#[cfg(feature = "hydrate")]
fn credentialed(builder: gloo_net::http::RequestBuilder) -> gloo_net::http::RequestBuilder {
    builder.credentials(web_sys::RequestCredentials::Include)
}

#[cfg(feature = "hydrate")]
#[async_trait(?Send)]
impl IdentityGateway for HttpGateway {
    async fn fetch_session(&self) -> Result<SessionResponse, GatewayError> {
        let resp = credentialed(gloo_net::http::Request::get(&self.endpoints.session_url()))
            .send()
            .await
            .map_err(network_error)?;
        match classify_status(resp.status()) {
            StatusClass::Success => resp
                .json::<SessionResponse>()
                .await
                .map_err(|e| GatewayError::GatewayFailure { status: Some(resp.status()), message: e.to_string() }),
            StatusClass::Unauthenticated => Ok(SessionResponse::unauthenticated()),
            StatusClass::RateLimited => Err(GatewayError::RateLimited),
            StatusClass::Failure(_) => Err(failure_from_response(resp).await),
        }
    }

    async fn fetch_csrf_token(&self) -> Option<String> {
        let resp = credentialed(gloo_net::http::Request::get(&self.endpoints.csrf_url()))
            .send()
            .await
            .ok()?;
        if !resp.ok() {
            log::debug!("csrf token request failed: {}", resp.status());
            return None;
        }
        resp.json::<super::types::CsrfResponse>().await.ok()?.csrf_token
    }

    async fn request_refresh(&self) -> Result<(), GatewayError> {
        let mut builder = credentialed(gloo_net::http::Request::post(&self.endpoints.refresh_url()));
        if let Some(token) = self.fetch_csrf_token().await {
            builder = builder.header(CSRF_HEADER, &token);
        }
        let resp = builder.send().await.map_err(network_error)?;
        match classify_status(resp.status()) {
            StatusClass::Success => Ok(()),
            StatusClass::RateLimited => Err(GatewayError::RateLimited),
            StatusClass::Unauthenticated | StatusClass::Failure(_) => Err(failure_from_response(resp).await),
        }
    }

    async fn request_logout(&self, return_to: Option<&str>) -> Result<Option<String>, GatewayError> {
        let mut builder = credentialed(gloo_net::http::Request::post(&self.endpoints.logout_url(return_to)));
        if let Some(token) = self.fetch_csrf_token().await {
            builder = builder.header(CSRF_HEADER, &token);
        }
        let resp = builder.send().await.map_err(network_error)?;
        match classify_status(resp.status()) {
            StatusClass::Success => {
                if resp.redirected() {
                    return Ok(Some(resp.url()));
                }
                let body = resp.text().await.unwrap_or_default();
                Ok(serde_json::from_str::<super::types::LogoutResponse>(&body)
                    .ok()
                    .and_then(|b| b.redirect_to))
            }
            StatusClass::RateLimited => Err(GatewayError::RateLimited),
            StatusClass::Unauthenticated | StatusClass::Failure(_) => Err(failure_from_response(resp).await),
        }
    }

    fn endpoints(&self) -> &GatewayEndpoints {
        &self.endpoints
    }
}
