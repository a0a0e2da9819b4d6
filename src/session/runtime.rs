//! Host environment seam for the session manager.
//!
//! The manager never reaches for `window`, timers or the clock directly; it
//! goes through [`Runtime`]. In the browser that is [`BrowserRuntime`]; tests
//! drive a fake runtime with a manual clock and a local executor.

use std::time::Duration;

use futures::future::LocalBoxFuture;

pub trait Runtime: 'static {
    /// Handle for an armed timer; cancelling consumes it.
    type Timer: 'static;

    /// Current wall-clock time in epoch seconds.
    fn now(&self) -> f64;

    /// Browser connectivity as last reported by the host.
    fn is_online(&self) -> bool;

    /// Arm a one-shot timer.
    fn arm_timer(&self, delay: Duration, on_fire: Box<dyn FnOnce()>) -> Self::Timer;

    fn cancel_timer(&self, timer: Self::Timer);

    /// Run a task on the local event loop.
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);

    /// Hard navigation; control normally leaves the application.
    fn navigate(&self, url: &str);

    /// Current path plus query, used as a login return target.
    fn current_path(&self) -> String;
}

/// Browser runtime backed by `gloo-timers`, `js-sys` and `web-sys`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserRuntime;

#[cfg(feature = "hydrate")]
impl Runtime for BrowserRuntime {
    type Timer = gloo_timers::callback::Timeout;

    fn now(&self) -> f64 {
        js_sys::Date::now() / 1000.0
    }

    fn is_online(&self) -> bool {
        web_sys::window().is_none_or(|w| w.navigator().on_line())
    }

    fn arm_timer(&self, delay: Duration, on_fire: Box<dyn FnOnce()>) -> Self::Timer {
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        gloo_timers::callback::Timeout::new(millis, on_fire)
    }

    fn cancel_timer(&self, timer: Self::Timer) {
        drop(timer.cancel());
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }

    fn navigate(&self, url: &str) {
        if let Some(window) = web_sys::window() {
            if window.location().set_href(url).is_err() {
                log::warn!("navigation to {url} failed");
            }
        }
    }

    fn current_path(&self) -> String {
        web_sys::window()
            .map(|w| {
                let location = w.location();
                let path = location.pathname().unwrap_or_else(|_| "/".to_owned());
                let search = location.search().unwrap_or_default();
                format!("{path}{search}")
            })
            .unwrap_or_else(|| "/".to_owned())
    }
}
