//! Deterministic doubles for the session manager: a manual-clock runtime on a
//! local executor and a gateway that replays scripted answers.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;

use super::runtime::Runtime;
use crate::net::gateway::{GatewayEndpoints, GatewayError, IdentityGateway};
use crate::net::types::{SessionResponse, User};

// =============================================================================
// FAKE RUNTIME
// =============================================================================

struct FakeTimer {
    id: u64,
    due_at: f64,
    on_fire: Box<dyn FnOnce()>,
}

struct FakeRuntimeInner {
    now: Cell<f64>,
    online: Cell<bool>,
    timers: RefCell<Vec<FakeTimer>>,
    next_timer: Cell<u64>,
    cancelled: Cell<u32>,
    navigations: RefCell<Vec<String>>,
    path: RefCell<String>,
    spawner: LocalSpawner,
}

#[derive(Clone)]
pub(crate) struct FakeRuntime {
    inner: Rc<FakeRuntimeInner>,
}

impl FakeRuntime {
    pub(crate) fn new(spawner: LocalSpawner, now: f64) -> Self {
        Self {
            inner: Rc::new(FakeRuntimeInner {
                now: Cell::new(now),
                online: Cell::new(true),
                timers: RefCell::new(Vec::new()),
                next_timer: Cell::new(0),
                cancelled: Cell::new(0),
                navigations: RefCell::new(Vec::new()),
                path: RefCell::new("/".to_owned()),
                spawner,
            }),
        }
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.inner.online.set(online);
    }

    pub(crate) fn set_path(&self, path: &str) {
        *self.inner.path.borrow_mut() = path.to_owned();
    }

    pub(crate) fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    pub(crate) fn cancelled(&self) -> u32 {
        self.inner.cancelled.get()
    }

    pub(crate) fn navigations(&self) -> Vec<String> {
        self.inner.navigations.borrow().clone()
    }

    /// Move the clock forward, firing due timers in order and draining the
    /// executor after each one.
    pub(crate) fn advance(&self, pool: &mut LocalPool, by: Duration) {
        let target = self.inner.now.get() + by.as_secs_f64();
        loop {
            let next = {
                let timers = self.inner.timers.borrow();
                timers
                    .iter()
                    .filter(|t| t.due_at <= target)
                    .min_by(|a, b| a.due_at.total_cmp(&b.due_at))
                    .map(|t| t.id)
            };
            let Some(id) = next else { break };
            let timer = {
                let mut timers = self.inner.timers.borrow_mut();
                let index = timers.iter().position(|t| t.id == id).unwrap();
                timers.remove(index)
            };
            self.inner.now.set(timer.due_at.max(self.inner.now.get()));
            (timer.on_fire)();
            pool.run_until_stalled();
        }
        self.inner.now.set(target);
        pool.run_until_stalled();
    }
}

impl Runtime for FakeRuntime {
    type Timer = u64;

    fn now(&self) -> f64 {
        self.inner.now.get()
    }

    fn is_online(&self) -> bool {
        self.inner.online.get()
    }

    fn arm_timer(&self, delay: Duration, on_fire: Box<dyn FnOnce()>) -> u64 {
        let id = self.inner.next_timer.get() + 1;
        self.inner.next_timer.set(id);
        self.inner.timers.borrow_mut().push(FakeTimer {
            id,
            due_at: self.inner.now.get() + delay.as_secs_f64(),
            on_fire,
        });
        id
    }

    fn cancel_timer(&self, timer: u64) {
        let mut timers = self.inner.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|t| t.id != timer);
        if timers.len() < before {
            self.inner.cancelled.set(self.inner.cancelled.get() + 1);
        }
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        self.inner.spawner.spawn_local(task).unwrap();
    }

    fn navigate(&self, url: &str) {
        self.inner.navigations.borrow_mut().push(url.to_owned());
    }

    fn current_path(&self) -> String {
        self.inner.path.borrow().clone()
    }
}

// =============================================================================
// SCRIPTED GATEWAY
// =============================================================================

/// Gateway answering from queues. An empty session queue answers
/// unauthenticated; an empty refresh or logout queue answers success.
pub(crate) struct ScriptedGateway {
    endpoints: GatewayEndpoints,
    sessions: RefCell<VecDeque<Result<SessionResponse, GatewayError>>>,
    refreshes: RefCell<VecDeque<Result<(), GatewayError>>>,
    logouts: RefCell<VecDeque<Result<Option<String>, GatewayError>>>,
    refresh_gate: RefCell<Option<oneshot::Receiver<()>>>,
    session_gate: RefCell<Option<oneshot::Receiver<()>>>,
    pub(crate) session_calls: Cell<u32>,
    pub(crate) refresh_calls: Cell<u32>,
    pub(crate) logout_calls: Cell<u32>,
    refreshes_in_flight: Cell<u32>,
    pub(crate) max_refreshes_in_flight: Cell<u32>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            endpoints: GatewayEndpoints::new("/auth"),
            sessions: RefCell::default(),
            refreshes: RefCell::default(),
            logouts: RefCell::default(),
            refresh_gate: RefCell::default(),
            session_gate: RefCell::default(),
            session_calls: Cell::new(0),
            refresh_calls: Cell::new(0),
            logout_calls: Cell::new(0),
            refreshes_in_flight: Cell::new(0),
            max_refreshes_in_flight: Cell::new(0),
        }
    }
}

impl ScriptedGateway {
    pub(crate) fn push_session(&self, result: Result<SessionResponse, GatewayError>) {
        self.sessions.borrow_mut().push_back(result);
    }

    pub(crate) fn push_refresh(&self, result: Result<(), GatewayError>) {
        self.refreshes.borrow_mut().push_back(result);
    }

    pub(crate) fn push_logout(&self, result: Result<Option<String>, GatewayError>) {
        self.logouts.borrow_mut().push_back(result);
    }

    /// Hold the next refresh call until the returned sender fires or drops.
    pub(crate) fn hold_next_refresh(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.refresh_gate.borrow_mut() = Some(rx);
        tx
    }

    /// Hold the next session fetch until the returned sender fires or drops.
    pub(crate) fn hold_next_session(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.session_gate.borrow_mut() = Some(rx);
        tx
    }
}

#[async_trait(?Send)]
impl IdentityGateway for ScriptedGateway {
    async fn fetch_session(&self) -> Result<SessionResponse, GatewayError> {
        self.session_calls.set(self.session_calls.get() + 1);
        let gate = self.session_gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.sessions
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(SessionResponse::unauthenticated()))
    }

    async fn fetch_csrf_token(&self) -> Option<String> {
        Some("csrf-test".to_owned())
    }

    async fn request_refresh(&self) -> Result<(), GatewayError> {
        self.refresh_calls.set(self.refresh_calls.get() + 1);
        let in_flight = self.refreshes_in_flight.get() + 1;
        self.refreshes_in_flight.set(in_flight);
        self.max_refreshes_in_flight
            .set(self.max_refreshes_in_flight.get().max(in_flight));

        let gate = self.refresh_gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        self.refreshes_in_flight.set(self.refreshes_in_flight.get() - 1);
        self.refreshes.borrow_mut().pop_front().unwrap_or(Ok(()))
    }

    async fn request_logout(&self, return_to: Option<&str>) -> Result<Option<String>, GatewayError> {
        self.logout_calls.set(self.logout_calls.get() + 1);
        self.logouts
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(return_to.map(str::to_owned)))
    }

    fn endpoints(&self) -> &GatewayEndpoints {
        &self.endpoints
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

pub(crate) fn operator() -> User {
    User {
        id: "u-1".to_owned(),
        email: "ops@example.com".to_owned(),
        display_name: "Ops".to_owned(),
        roles: vec!["admin".to_owned()],
    }
}

pub(crate) fn authenticated_until(expires_at: i64) -> SessionResponse {
    SessionResponse {
        authenticated: true,
        user: Some(operator()),
        expires_at: Some(expires_at),
        csrf_token: Some("csrf-1".to_owned()),
        error: None,
    }
}
