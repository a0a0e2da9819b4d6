//! Session lifecycle manager.
//!
//! The manager bootstraps the session, keeps it fresh ahead of expiry, reacts
//! to tab visibility and connectivity, and tears it down on logout. It is the
//! sole writer of `SessionState` and the only caller of the identity gateway;
//! everyone else reads published `AuthState` snapshots.
//!
//! ARCHITECTURE
//! ============
//! Single-threaded: state sits in `RefCell`/`Cell` behind an `Rc`. No borrow
//! is held across an await. Timer callbacks hold a `Weak` so a dropped
//! manager simply stops. Every trigger path (bootstrap, fetch, refresh
//! outcome, timer fire, network reconciliation) ends in `evaluate_schedule`,
//! the only caller of the pure planner.
//!
//! CONCURRENCY GUARDS
//! ==================
//! - one pending timer: `SchedulerHandle::arm` cancels before arming
//! - one refresh in flight: `refresh_flight`
//! - one session fetch in flight: `fetch_flight`; duplicates short-circuit
//! - a session cannot outlive `expires_at` while refreshes keep failing
//! - outcomes of calls that raced a logout are dropped via `epoch`

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use super::runtime::Runtime;
use super::schedule::{self, SchedulePlan};
use super::scheduler::{FireAction, SchedulerHandle};
use super::single_flight::SingleFlight;
use super::state::{FailureOutcome, SessionPhase, SessionState};
use crate::config::SessionConfig;
use crate::net::gateway::{GatewayError, IdentityGateway};
use crate::net::types::{LoginOptions, LogoutOptions, SessionResponse};
use crate::state::auth::AuthState;

/// Browser lifecycle signals the manager reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Visible,
    Hidden,
    Online,
    Offline,
}

/// Result of a single refresh attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Gateway renewed the credential and the re-fetch confirmed it.
    Refreshed,
    /// The gateway reports no valid session after the attempt.
    Unauthenticated,
    /// Skipped: the browser is offline.
    Offline,
    /// Skipped: another refresh is already in flight.
    InFlight,
    /// A logout happened while the call was outstanding.
    Discarded,
    Failed(GatewayError),
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

type Listener = Rc<dyn Fn(&AuthState)>;

#[derive(Default)]
struct Listeners {
    entries: RefCell<Vec<(u64, Listener)>>,
    next_id: Cell<u64>,
}

/// Live state subscription. Dropping it unsubscribes.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    listeners: Weak<Listeners>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.entries.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

// =============================================================================
// MANAGER
// =============================================================================

struct Inner<G, R: Runtime> {
    gateway: G,
    runtime: R,
    config: SessionConfig,
    state: RefCell<SessionState>,
    loading: Cell<bool>,
    online: Cell<bool>,
    epoch: Cell<u64>,
    scheduler: RefCell<SchedulerHandle<R::Timer>>,
    refresh_flight: SingleFlight,
    fetch_flight: SingleFlight,
    listeners: Rc<Listeners>,
}

pub struct SessionManager<G, R: Runtime> {
    inner: Rc<Inner<G, R>>,
}

impl<G, R: Runtime> Clone for SessionManager<G, R> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

/// Non-owning handle for callbacks that must not keep the manager alive.
pub struct WeakSessionManager<G, R: Runtime> {
    inner: Weak<Inner<G, R>>,
}

impl<G, R: Runtime> WeakSessionManager<G, R> {
    pub fn upgrade(&self) -> Option<SessionManager<G, R>> {
        self.inner.upgrade().map(|inner| SessionManager { inner })
    }
}

impl<G: IdentityGateway + 'static, R: Runtime> SessionManager<G, R> {
    pub fn new(gateway: G, runtime: R, config: SessionConfig) -> Self {
        let online = runtime.is_online();
        Self {
            inner: Rc::new(Inner {
                gateway,
                runtime,
                config,
                state: RefCell::new(SessionState::default()),
                loading: Cell::new(false),
                online: Cell::new(online),
                epoch: Cell::new(0),
                scheduler: RefCell::new(SchedulerHandle::default()),
                refresh_flight: SingleFlight::default(),
                fetch_flight: SingleFlight::default(),
                listeners: Rc::new(Listeners::default()),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakSessionManager<G, R> {
        WeakSessionManager { inner: Rc::downgrade(&self.inner) }
    }

    // -------------------------------------------------------------------------
    // Read surface
    // -------------------------------------------------------------------------

    /// Read-only copy of the current state, as published to consumers.
    pub fn snapshot(&self) -> AuthState {
        AuthState::from_session(&self.inner.state.borrow(), self.inner.loading.get())
    }

    pub fn session(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.get()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh_flight.is_held()
    }

    /// Delay and action of the pending timer, if one is armed.
    pub fn pending_timer(&self) -> Option<(Duration, FireAction)> {
        self.inner.scheduler.borrow().pending()
    }

    /// Register a listener called with every published state.
    pub fn subscribe(&self, listener: impl Fn(&AuthState) + 'static) -> Subscription {
        let listeners = &self.inner.listeners;
        let id = listeners.next_id.get().wrapping_add(1);
        listeners.next_id.set(id);
        listeners.entries.borrow_mut().push((id, Rc::new(listener)));
        Subscription { listeners: Rc::downgrade(listeners), id }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .entries
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    // -------------------------------------------------------------------------
    // Bootstrap and session fetch
    // -------------------------------------------------------------------------

    /// Establish the initial state. A seed from the hosting shell is applied
    /// as-is with no network fetch.
    pub async fn bootstrap(&self, seed: Option<SessionResponse>) {
        if let Some(seed) = seed {
            log::debug!("session seeded by host shell");
            self.apply_session(seed, false);
            return;
        }
        if let Err(err) = self.check_session().await {
            log::warn!("initial session check failed: {err}");
        }
    }

    /// Run [`SessionManager::bootstrap`] on the event loop.
    pub fn spawn_bootstrap(&self, seed: Option<SessionResponse>) {
        let manager = self.clone();
        self.inner.runtime.spawn(Box::pin(async move {
            manager.bootstrap(seed).await;
        }));
    }

    /// Fetch the session and apply it. Returns whether the session is
    /// authenticated afterwards. A call made while another fetch is in flight
    /// returns the current flag without touching the gateway.
    ///
    /// # Errors
    ///
    /// The classified gateway error. Before the first answer a hard failure
    /// moves the state to `Unauthenticated` and a transient one schedules a
    /// retry; afterwards the state is left alone.
    pub async fn check_session(&self) -> Result<bool, GatewayError> {
        let Some(_flight) = self.inner.fetch_flight.try_acquire() else {
            log::debug!("session fetch already in flight");
            return Ok(self.inner.state.borrow().is_authenticated());
        };

        let first_check = self.inner.state.borrow().phase == SessionPhase::Unknown;
        if first_check {
            self.inner.loading.set(true);
            self.publish();
        }

        let epoch = self.inner.epoch.get();
        let result = self.inner.gateway.fetch_session().await;
        self.inner.loading.set(false);

        if self.inner.epoch.get() != epoch {
            log::debug!("dropping session fetch that raced a logout");
            self.publish();
            return Ok(false);
        }

        match result {
            Ok(response) => {
                self.apply_session(response, false);
                Ok(self.inner.state.borrow().is_authenticated())
            }
            Err(err) => {
                if first_check {
                    self.handle_bootstrap_failure(&err);
                } else {
                    log::warn!("background session check failed: {err}");
                    self.publish();
                }
                Err(err)
            }
        }
    }

    /// Rate limiting and network trouble leave the phase `Unknown` and retry;
    /// anything else settles on `Unauthenticated`.
    fn handle_bootstrap_failure(&self, err: &GatewayError) {
        let now = self.inner.runtime.now();
        if !err.is_transient() {
            self.inner.state.borrow_mut().fail_bootstrap(err.clone(), now);
            self.publish();
            return;
        }

        let max = self.inner.config.max_transient_failures;
        let outcome = self.inner.state.borrow_mut().defer_bootstrap(err.clone(), now, max);
        self.publish();
        match outcome {
            FailureOutcome::Retry => {
                if !self.wait_for_connectivity(err) {
                    self.evaluate_schedule();
                }
            }
            FailureOutcome::Exhausted | FailureOutcome::Expired => {
                log::warn!("initial session check failed {max} times; giving up");
            }
        }
    }

    /// A network failure while the runtime reports offline parks scheduling
    /// until the `online` event.
    fn wait_for_connectivity(&self, err: &GatewayError) -> bool {
        if matches!(err, GatewayError::NetworkFailure(_)) && !self.inner.runtime.is_online() {
            self.inner.online.set(false);
            self.inner.scheduler.borrow_mut().cancel(&self.inner.runtime);
            log::debug!("connectivity lost; waiting for online");
            return true;
        }
        false
    }

    /// Apply the latest snapshot, publish, and reschedule.
    fn apply_session(&self, response: SessionResponse, refreshed: bool) {
        let now = self.inner.runtime.now();
        {
            let mut state = self.inner.state.borrow_mut();
            if refreshed {
                state.apply_refreshed(response, now);
            } else {
                state.apply_snapshot(response, now);
            }
        }
        self.publish();
        self.evaluate_schedule();
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    /// Recompute the next refresh from current state and arm it.
    pub fn evaluate_schedule(&self) {
        let now = self.inner.runtime.now();
        let plan = schedule::plan_refresh(&self.inner.state.borrow(), now, &self.inner.config);
        match plan {
            SchedulePlan::Idle => self.inner.scheduler.borrow_mut().cancel(&self.inner.runtime),
            SchedulePlan::Immediate => {
                self.inner.scheduler.borrow_mut().cancel(&self.inner.runtime);
                if self.inner.online.get() {
                    self.spawn_refresh();
                } else {
                    log::debug!("refresh due while offline; waiting for connectivity");
                }
            }
            SchedulePlan::Refresh(delay) => self.arm(delay, FireAction::Refresh),
            SchedulePlan::Reevaluate(delay) => self.arm(delay, FireAction::Reevaluate),
            SchedulePlan::Recheck(delay) => self.arm(delay, FireAction::Recheck),
        }
    }

    fn arm(&self, delay: Duration, action: FireAction) {
        let weak = self.downgrade();
        self.inner
            .scheduler
            .borrow_mut()
            .arm(&self.inner.runtime, delay, action, move |generation| {
                // Run on the event loop, outside the timer callback that owns this closure.
                let Some(manager) = weak.upgrade() else {
                    return;
                };
                let task = manager.clone();
                manager.inner.runtime.spawn(Box::pin(async move {
                    task.on_timer_fired(generation).await;
                }));
            });
        log::debug!("session timer armed: {action:?} in {delay:?}");
    }

    async fn on_timer_fired(&self, generation: u64) {
        let fired = self.inner.scheduler.borrow_mut().take_fired(generation);
        match fired {
            None => log::debug!("ignoring stale session timer"),
            Some(FireAction::Reevaluate) => self.evaluate_schedule(),
            Some(FireAction::Refresh) => {
                if self.inner.online.get() {
                    self.run_background_refresh().await;
                } else {
                    log::debug!("refresh timer fired while offline; deferring until online");
                }
            }
            Some(FireAction::Recheck) => {
                if self.inner.online.get() {
                    if let Err(err) = self.check_session().await {
                        log::debug!("session recheck failed: {err}");
                    }
                } else {
                    log::debug!("session recheck due while offline; deferring until online");
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Refresh
    // -------------------------------------------------------------------------

    fn spawn_refresh(&self) {
        let manager = self.clone();
        self.inner.runtime.spawn(Box::pin(async move {
            manager.run_background_refresh().await;
        }));
    }

    async fn run_background_refresh(&self) {
        match self.refresh().await {
            RefreshOutcome::Failed(err) => log::warn!("background session refresh failed: {err}"),
            outcome => log::debug!("background session refresh: {outcome:?}"),
        }
    }

    /// Manual refresh for screens. `true` only when the session was renewed.
    pub async fn refresh_session(&self) -> bool {
        matches!(self.refresh().await, RefreshOutcome::Refreshed)
    }

    /// One guarded refresh attempt: renew, re-fetch, apply.
    pub async fn refresh(&self) -> RefreshOutcome {
        if !self.inner.online.get() {
            return RefreshOutcome::Offline;
        }
        let Some(_flight) = self.inner.refresh_flight.try_acquire() else {
            return RefreshOutcome::InFlight;
        };
        self.inner.scheduler.borrow_mut().cancel(&self.inner.runtime);

        let epoch = self.inner.epoch.get();
        let raced_logout = || self.inner.epoch.get() != epoch;
        let result = match self.inner.gateway.request_refresh().await {
            Ok(()) if raced_logout() => return RefreshOutcome::Discarded,
            Ok(()) => self.inner.gateway.fetch_session().await,
            Err(err) => Err(err),
        };
        if raced_logout() {
            log::debug!("dropping refresh outcome that raced a logout");
            return RefreshOutcome::Discarded;
        }

        match result {
            Ok(response) => {
                self.apply_session(response, true);
                if self.inner.state.borrow().is_authenticated() {
                    RefreshOutcome::Refreshed
                } else {
                    RefreshOutcome::Unauthenticated
                }
            }
            Err(err) => self.handle_refresh_failure(err),
        }
    }

    fn handle_refresh_failure(&self, err: GatewayError) -> RefreshOutcome {
        let now = self.inner.runtime.now();
        let outcome = self
            .inner
            .state
            .borrow_mut()
            .record_refresh_failure(err.clone(), now, &self.inner.config);
        self.publish();

        match outcome {
            FailureOutcome::Exhausted => {
                log::warn!("session refresh kept failing; signing out locally");
                self.inner.scheduler.borrow_mut().cancel(&self.inner.runtime);
            }
            FailureOutcome::Expired => {
                log::warn!("session expired while refreshes were failing; signing out locally");
                self.inner.scheduler.borrow_mut().cancel(&self.inner.runtime);
            }
            FailureOutcome::Retry => {
                if !self.wait_for_connectivity(&err) {
                    self.evaluate_schedule();
                }
            }
        }
        RefreshOutcome::Failed(err)
    }

    // -------------------------------------------------------------------------
    // Browser lifecycle
    // -------------------------------------------------------------------------

    pub fn handle_lifecycle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Visible => self.reconcile_visible(),
            LifecycleEvent::Hidden => log::debug!("tab hidden"),
            LifecycleEvent::Online => {
                if self.inner.online.replace(true) {
                    return;
                }
                let (phase, checked) = {
                    let state = self.inner.state.borrow();
                    (state.phase, state.last_checked_at.is_some())
                };
                match phase {
                    SessionPhase::Authenticated => {
                        log::debug!("back online; re-evaluating session schedule");
                        self.evaluate_schedule();
                    }
                    SessionPhase::Unknown if checked => {
                        log::debug!("back online; retrying initial session check");
                        self.spawn_check("session recheck");
                    }
                    SessionPhase::Unknown | SessionPhase::Unauthenticated => {}
                }
            }
            LifecycleEvent::Offline => self.inner.online.set(false),
        }
    }

    fn reconcile_visible(&self) {
        if !self.inner.online.get() {
            return;
        }
        let now = self.inner.runtime.now();
        let last_checked_at = self.inner.state.borrow().last_checked_at;
        if !schedule::should_reconcile_on_visible(last_checked_at, now, self.inner.config.visibility_check_interval) {
            return;
        }
        self.spawn_check("visibility session check");
    }

    fn spawn_check(&self, label: &'static str) {
        let manager = self.clone();
        self.inner.runtime.spawn(Box::pin(async move {
            if let Err(err) = manager.check_session().await {
                log::warn!("{label} failed: {err}");
            }
        }));
    }

    // -------------------------------------------------------------------------
    // Login / logout
    // -------------------------------------------------------------------------

    /// Navigate to the gateway's interactive login, returning to the current
    /// path unless told otherwise.
    pub fn login(&self, options: LoginOptions) {
        let options = LoginOptions {
            return_to: options
                .return_to
                .or_else(|| Some(self.inner.runtime.current_path())),
            ..options
        };
        let url = self.inner.gateway.endpoints().login_url(&options);
        self.inner.runtime.navigate(&url);
    }

    /// Tear down local state and navigate to the gateway's logout page.
    pub fn logout(&self, options: LogoutOptions) {
        self.teardown_local();
        let url = self.inner.gateway.endpoints().logout_url(options.return_to.as_deref());
        self.inner.runtime.navigate(&url);
    }

    /// Tear down local state, log out programmatically, then follow the
    /// gateway's redirect (or go to `/`).
    ///
    /// # Errors
    ///
    /// The gateway error when the logout call fails; local state is already
    /// torn down and no navigation happens.
    pub async fn logout_async(&self, options: LogoutOptions) -> Result<(), GatewayError> {
        self.teardown_local();
        let redirect = self.inner.gateway.request_logout(options.return_to.as_deref()).await?;
        self.inner.runtime.navigate(redirect.as_deref().unwrap_or("/"));
        Ok(())
    }

    pub fn clear_error(&self) {
        self.inner.state.borrow_mut().clear_error();
        self.publish();
    }

    /// Stop scheduling and drop in-flight outcomes without touching state.
    pub fn shutdown(&self) {
        self.inner.epoch.set(self.inner.epoch.get().wrapping_add(1));
        self.inner.scheduler.borrow_mut().cancel(&self.inner.runtime);
    }

    fn teardown_local(&self) {
        self.inner.epoch.set(self.inner.epoch.get().wrapping_add(1));
        self.inner.scheduler.borrow_mut().cancel(&self.inner.runtime);
        self.inner.refresh_flight.force_release();
        self.inner.state.borrow_mut().reset_unauthenticated();
        self.inner.loading.set(false);
        self.publish();
    }
}
