//! Generic request layer for console screens.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every CRUD screen reads and writes domain APIs through here. Requests are
//! credentialed. Nothing here talks to the identity gateway: a 401 from a
//! domain API is answered with a hard navigation to the login entry point,
//! and the session manager re-establishes state on the next page load.
//!
//! DESIGN
//! ======
//! A [`CallSite`] tracks the one outstanding request of a logical call site.
//! Starting a new request aborts the previous one, and a result that arrives
//! for a superseded ticket resolves to [`RequestOutcome::Cancelled`], so
//! last-request-wins holds even when the abort loses the race.
//!
//! ERROR HANDLING
//! ==============
//! Screens get `String` errors they can render directly. Cancellation is the
//! only outcome that is not surfaced as an error.

#![allow(clippy::unused_async)]

#[cfg(test)]
#[path = "request_test.rs"]
mod request_test;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::gateway::{GatewayEndpoints, StatusClass, classify_status};
use super::types::LoginOptions;

/// How a request settled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOutcome<T> {
    Data(T),
    /// Non-2xx, transport or decode failure; renderable message.
    Failed(String),
    /// 401; a login redirect has been started.
    Unauthenticated,
    /// Superseded by a newer request from the same call site.
    Cancelled,
}

// =============================================================================
// CALL SITES
// =============================================================================

/// Abort hook for an in-flight request.
pub type AbortHook = Box<dyn FnOnce()>;

/// Identifies one request started on a [`CallSite`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Default)]
struct CallSiteInner {
    current: Cell<u64>,
    abort: RefCell<Option<AbortHook>>,
}

/// One outstanding request per logical call site. Clones share the site.
#[derive(Clone, Default)]
pub struct CallSite {
    inner: Rc<CallSiteInner>,
}

impl CallSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, aborting whatever this site had in flight.
    pub fn begin(&self, abort: Option<AbortHook>) -> Ticket {
        let ticket = self.inner.current.get().wrapping_add(1);
        self.inner.current.set(ticket);
        let previous = self.inner.abort.replace(abort);
        if let Some(previous) = previous {
            previous();
        }
        Ticket(ticket)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.inner.current.get() == ticket.0
    }

    /// Resolve a finished request. Superseded tickets become `Cancelled`.
    pub fn settle<T>(&self, ticket: Ticket, outcome: RequestOutcome<T>) -> RequestOutcome<T> {
        if !self.is_current(ticket) {
            return RequestOutcome::Cancelled;
        }
        self.inner.abort.replace(None);
        outcome
    }

    /// Abort the outstanding request without starting another.
    pub fn cancel(&self) {
        self.begin(None);
    }
}

// =============================================================================
// RESPONSE INTERPRETATION
// =============================================================================

/// Error message for a failed domain response: body `message`, then `error`,
/// then a generic status line.
pub fn request_failed_message(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str).map(str::to_owned))
        })
        .filter(|msg| !msg.trim().is_empty())
        .unwrap_or_else(|| format!("request failed: {status}"))
}

/// Decode a success body. An empty body decodes as JSON `null`.
pub fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, String> {
    if body.trim().is_empty() {
        return serde_json::from_value(serde_json::Value::Null).map_err(|e| e.to_string());
    }
    serde_json::from_str(body).map_err(|e| e.to_string())
}

/// Map a status and body to an outcome. Never yields `Cancelled`.
pub fn interpret_response<T: DeserializeOwned>(status: u16, body: &str) -> RequestOutcome<T> {
    match classify_status(status) {
        StatusClass::Success => match decode_body(body) {
            Ok(value) => RequestOutcome::Data(value),
            Err(message) => RequestOutcome::Failed(message),
        },
        StatusClass::Unauthenticated => RequestOutcome::Unauthenticated,
        StatusClass::RateLimited | StatusClass::Failure(_) => RequestOutcome::Failed(request_failed_message(status, body)),
    }
}

// =============================================================================
// REQUEST LAYER
// =============================================================================

/// HTTP verb of a mutating call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationMethod {
    Post,
    Put,
    Patch,
    Delete,
}

#[derive(Clone, Debug)]
pub struct RequestLayer {
    endpoints: GatewayEndpoints,
}

impl RequestLayer {
    pub fn new(endpoints: GatewayEndpoints) -> Self {
        Self { endpoints }
    }

    /// Login entry point that returns to `current_path` afterwards.
    pub fn login_redirect_url(&self, current_path: &str) -> String {
        self.endpoints.login_url(&LoginOptions {
            return_to: Some(current_path.to_owned()),
            prompt: None,
        })
    }

    #[cfg(feature = "hydrate")]
    fn redirect_to_login(&self) {
        use crate::session::runtime::{BrowserRuntime, Runtime};

        let runtime = BrowserRuntime;
        let url = self.login_redirect_url(&runtime.current_path());
        log::info!("domain API answered 401; redirecting to login");
        runtime.navigate(&url);
    }

    /// Credentialed GET of `path`, decoded as JSON. Starting it supersedes
    /// the previous request on `site`.
    pub async fn fetch_json<T: DeserializeOwned>(&self, site: &CallSite, path: &str) -> RequestOutcome<T> {
        #[cfg(feature = "hydrate")]
        {
            let (ticket, signal) = begin_abortable(site);
            let sent = gloo_net::http::Request::get(path)
                .credentials(web_sys::RequestCredentials::Include)
                .abort_signal(signal.as_ref())
                .send()
                .await;
            self.finish(site, ticket, read_outcome(sent).await)
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = path;
            let ticket = site.begin(None);
            site.settle(ticket, RequestOutcome::Failed("not available on server".to_owned()))
        }
    }

    /// Credentialed write to `path` with an optional JSON body. With a
    /// `site`, starting it supersedes the previous request on that site.
    pub async fn mutate<T, B>(
        &self,
        site: Option<&CallSite>,
        method: MutationMethod,
        path: &str,
        body: Option<&B>,
    ) -> RequestOutcome<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let own_site;
        let site = match site {
            Some(site) => site,
            None => {
                own_site = CallSite::new();
                &own_site
            }
        };

        #[cfg(feature = "hydrate")]
        {
            use gloo_net::http::Request;

            let (ticket, signal) = begin_abortable(site);
            let builder = match method {
                MutationMethod::Post => Request::post(path),
                MutationMethod::Put => Request::put(path),
                MutationMethod::Patch => Request::patch(path),
                MutationMethod::Delete => Request::delete(path),
            }
            .credentials(web_sys::RequestCredentials::Include)
            .abort_signal(signal.as_ref());

            let request = match body {
                Some(body) => builder.json(body),
                None => builder.build(),
            };
            let outcome = match request {
                Ok(request) => read_outcome(request.send().await).await,
                Err(e) => RequestOutcome::Failed(e.to_string()),
            };
            self.finish(site, ticket, outcome)
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = (method, path, body);
            let ticket = site.begin(None);
            site.settle(ticket, RequestOutcome::Failed("not available on server".to_owned()))
        }
    }

    /// Settle on `site`; a 401 that still owns its site starts the login
    /// redirect.
    #[cfg(feature = "hydrate")]
    fn finish<T>(&self, site: &CallSite, ticket: Ticket, outcome: RequestOutcome<T>) -> RequestOutcome<T> {
        let outcome = site.settle(ticket, outcome);
        if matches!(outcome, RequestOutcome::Unauthenticated) {
            self.redirect_to_login();
        }
        outcome
    }
}

#[cfg(feature = "hydrate")]
fn begin_abortable(site: &CallSite) -> (Ticket, Option<web_sys::AbortSignal>) {
    let controller = web_sys::AbortController::new().ok();
    let signal = controller.as_ref().map(web_sys::AbortController::signal);
    let abort = controller.map(|c| Box::new(move || c.abort()) as AbortHook);
    (site.begin(abort), signal)
}

#[cfg(feature = "hydrate")]
async fn read_outcome<T: DeserializeOwned>(
    sent: Result<gloo_net::http::Response, gloo_net::Error>,
) -> RequestOutcome<T> {
    match sent {
        Ok(resp) => {
            let status = resp.status();
            match resp.text().await {
                Ok(body) => interpret_response(status, &body),
                Err(e) => RequestOutcome::Failed(e.to_string()),
            }
        }
        Err(e) => RequestOutcome::Failed(e.to_string()),
    }
}

// =============================================================================
// REACTIVE READ HANDLE
// =============================================================================

/// Reactive state of a read started with [`use_fetch`].
pub struct FetchHandle<T: Send + Sync + 'static> {
    pub data: RwSignal<Option<T>>,
    pub error: RwSignal<Option<String>>,
    pub is_loading: RwSignal<bool>,
    run: StoredValue<Rc<dyn Fn()>, LocalStorage>,
}

impl<T: Send + Sync + 'static> Clone for FetchHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Send + Sync + 'static> Copy for FetchHandle<T> {}

impl<T: Send + Sync + 'static> FetchHandle<T> {
    /// Re-issue the read; an outstanding one is cancelled.
    pub fn refetch(&self) {
        if let Some(run) = self.run.try_get_value() {
            run();
        }
    }
}

/// Start a read of `path` and expose it as signals.
pub fn use_fetch<T>(layer: RequestLayer, path: impl Into<String>) -> FetchHandle<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    let data = RwSignal::new(None);
    let error = RwSignal::new(None);
    let is_loading = RwSignal::new(false);
    let site = CallSite::new();
    let path: String = path.into();

    let run: Rc<dyn Fn()> = Rc::new(move || {
        is_loading.set(true);
        let layer = layer.clone();
        let site = site.clone();
        let path = path.clone();
        leptos::task::spawn_local(async move {
            match layer.fetch_json::<T>(&site, &path).await {
                RequestOutcome::Data(value) => {
                    data.set(Some(value));
                    error.set(None);
                    is_loading.set(false);
                }
                RequestOutcome::Failed(message) => {
                    error.set(Some(message));
                    is_loading.set(false);
                }
                RequestOutcome::Unauthenticated => is_loading.set(false),
                // The newer request owns the signals.
                RequestOutcome::Cancelled => {}
            }
        });
    });
    run();

    FetchHandle { data, error, is_loading, run: StoredValue::new_local(run) }
}
