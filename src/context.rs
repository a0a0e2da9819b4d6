//! Session read/action surface for screens.
//!
//! SYSTEM CONTEXT
//! ==============
//! Screens never see the session manager or the identity gateway. They pull
//! a [`SessionContext`] out of Leptos context and get reactive reads of the
//! published [`AuthState`] plus the login, logout and manual refresh actions.
//!
//! DESIGN
//! ======
//! The context is `Copy`: a signal mirroring the manager's snapshots and a
//! locally stored handle to the actions. The manager subscription that feeds
//! the signal, and any guard handed to [`SessionContext::hold`], live as long
//! as the reactive owner that provided it.

#[cfg(test)]
#[path = "context_test.rs"]
mod context_test;

use std::any::Any;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use leptos::prelude::*;

use crate::net::gateway::{GatewayError, IdentityGateway};
use crate::net::types::{LoginOptions, LogoutOptions, User};
use crate::session::manager::{SessionManager, Subscription};
use crate::session::runtime::Runtime;
use crate::state::auth::AuthState;

/// Object-safe view of the session manager used by the context.
pub trait SessionActions {
    fn snapshot(&self) -> AuthState;
    fn subscribe(&self, listener: Box<dyn Fn(&AuthState)>) -> Subscription;
    fn login(&self, options: LoginOptions);
    fn logout(&self, options: LogoutOptions);
    fn logout_async(&self, options: LogoutOptions) -> LocalBoxFuture<'static, Result<(), GatewayError>>;
    fn refresh_session(&self) -> LocalBoxFuture<'static, bool>;
    fn clear_error(&self);
}

impl<G: IdentityGateway + 'static, R: Runtime> SessionActions for SessionManager<G, R> {
    fn snapshot(&self) -> AuthState {
        SessionManager::snapshot(self)
    }

    fn subscribe(&self, listener: Box<dyn Fn(&AuthState)>) -> Subscription {
        SessionManager::subscribe(self, listener)
    }

    fn login(&self, options: LoginOptions) {
        SessionManager::login(self, options);
    }

    fn logout(&self, options: LogoutOptions) {
        SessionManager::logout(self, options);
    }

    fn logout_async(&self, options: LogoutOptions) -> LocalBoxFuture<'static, Result<(), GatewayError>> {
        let manager = self.clone();
        Box::pin(async move { manager.logout_async(options).await })
    }

    fn refresh_session(&self) -> LocalBoxFuture<'static, bool> {
        let manager = self.clone();
        Box::pin(async move { manager.refresh_session().await })
    }

    fn clear_error(&self) {
        SessionManager::clear_error(self);
    }
}

#[derive(Clone, Copy)]
pub struct SessionContext {
    state: RwSignal<AuthState>,
    actions: StoredValue<Rc<dyn SessionActions>, LocalStorage>,
    _subscription: StoredValue<Subscription, LocalStorage>,
    guards: StoredValue<Vec<Box<dyn Any>>, LocalStorage>,
}

impl SessionContext {
    /// Mirror `actions`' published state into a signal owned by the current
    /// reactive owner.
    pub fn new(actions: Rc<dyn SessionActions>) -> Self {
        let state = RwSignal::new(actions.snapshot());
        let subscription = actions.subscribe(Box::new(move |snapshot: &AuthState| {
            let _ = state.try_set(snapshot.clone());
        }));
        Self {
            state,
            actions: StoredValue::new_local(actions),
            _subscription: StoredValue::new_local(subscription),
            guards: StoredValue::new_local(Vec::new()),
        }
    }

    /// Keep `guard` alive for the lifetime of this context.
    pub fn hold(&self, guard: impl Any) {
        self.guards.update_value(|guards| guards.push(Box::new(guard)));
    }

    /// Number of guards kept alive by [`SessionContext::hold`].
    pub fn held(&self) -> usize {
        self.guards.with_value(Vec::len)
    }

    /// Raw read-only signal of the published state.
    pub fn state(&self) -> ReadSignal<AuthState> {
        self.state.read_only()
    }

    pub fn user(&self) -> Option<User> {
        self.state.with(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.with(|s| s.authenticated)
    }

    pub fn is_loading(&self) -> bool {
        self.state.with(|s| s.loading)
    }

    pub fn last_error(&self) -> Option<GatewayError> {
        self.state.with(|s| s.last_error.clone())
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.state.with(|s| s.csrf_token.clone())
    }

    fn actions(&self) -> Option<Rc<dyn SessionActions>> {
        self.actions.try_get_value()
    }

    pub fn login(&self, options: LoginOptions) {
        if let Some(actions) = self.actions() {
            actions.login(options);
        }
    }

    pub fn logout(&self, options: LogoutOptions) {
        if let Some(actions) = self.actions() {
            actions.logout(options);
        }
    }

    /// Programmatic logout that follows the gateway's redirect.
    ///
    /// # Errors
    ///
    /// The gateway error when the logout call fails.
    pub async fn logout_async(&self, options: LogoutOptions) -> Result<(), GatewayError> {
        match self.actions() {
            Some(actions) => actions.logout_async(options).await,
            None => Ok(()),
        }
    }

    /// Manual refresh. `true` only when the session was renewed.
    pub async fn refresh_session(&self) -> bool {
        match self.actions() {
            Some(actions) => actions.refresh_session().await,
            None => false,
        }
    }

    pub fn clear_error(&self) {
        if let Some(actions) = self.actions() {
            actions.clear_error();
        }
    }
}

/// Build a [`SessionContext`] for `actions` and provide it to descendants.
pub fn provide_session(actions: Rc<dyn SessionActions>) -> SessionContext {
    let context = SessionContext::new(actions);
    provide_context(context);
    context
}

/// The session context provided by an ancestor.
pub fn use_session() -> SessionContext {
    expect_context::<SessionContext>()
}

/// Wire the session for the browser: logging, gateway selection, lifecycle
/// listeners, context, and bootstrap from the embedded seed.
#[cfg(feature = "hydrate")]
pub fn start_session(config: crate::config::SessionConfig) -> SessionContext {
    use crate::net::dev_gateway::DevBypassGateway;
    use crate::net::gateway::HttpGateway;
    use crate::session::browser::watch_lifecycle;
    use crate::session::runtime::BrowserRuntime;
    use crate::session::seed::read_embedded_session;

    crate::logging::init(config.log_level);

    let runtime = BrowserRuntime;
    let endpoints = config.endpoints();
    let gateway: Rc<dyn IdentityGateway> = if config.dev_bypass {
        log::warn!("development session bypass enabled; identity gateway will not be contacted");
        Rc::new(DevBypassGateway::new(endpoints, Rc::new(move || runtime.now())))
    } else {
        Rc::new(HttpGateway::new(endpoints))
    };

    let manager = SessionManager::new(gateway, runtime, config);
    let context = provide_session(Rc::new(manager.clone()));
    context.hold(watch_lifecycle(&manager));
    manager.spawn_bootstrap(read_embedded_session());
    context
}
