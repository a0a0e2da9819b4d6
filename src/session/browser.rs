//! DOM lifecycle wiring for the session manager (hydrate only).
//!
//! Forwards `visibilitychange` on the document and `online`/`offline` on the
//! window as [`LifecycleEvent`]s. Listeners hold a weak manager handle and
//! are removed when the returned [`LifecycleListeners`] is dropped.

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

use super::manager::{LifecycleEvent, SessionManager};
use super::runtime::BrowserRuntime;
use crate::net::gateway::IdentityGateway;

struct Registration {
    target: web_sys::EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(web_sys::Event)>,
}

/// Registered DOM listeners. Dropping this detaches them.
#[must_use = "lifecycle listeners are removed when this is dropped"]
#[derive(Default)]
pub struct LifecycleListeners {
    registrations: Vec<Registration>,
}

impl LifecycleListeners {
    fn register<G, F>(
        &mut self,
        target: &web_sys::EventTarget,
        event: &'static str,
        manager: &SessionManager<G, BrowserRuntime>,
        classify: F,
    ) where
        G: IdentityGateway + 'static,
        F: Fn() -> LifecycleEvent + 'static,
    {
        let weak = manager.downgrade();
        let callback = Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
            if let Some(manager) = weak.upgrade() {
                manager.handle_lifecycle(classify());
            }
        });
        if target
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .is_err()
        {
            log::warn!("failed to listen for {event}");
            return;
        }
        self.registrations.push(Registration { target: target.clone(), event, callback });
    }
}

impl Drop for LifecycleListeners {
    fn drop(&mut self) {
        for reg in &self.registrations {
            let _ = reg
                .target
                .remove_event_listener_with_callback(reg.event, reg.callback.as_ref().unchecked_ref());
        }
    }
}

/// Attach visibility and connectivity listeners for `manager`.
pub fn watch_lifecycle<G>(manager: &SessionManager<G, BrowserRuntime>) -> LifecycleListeners
where
    G: IdentityGateway + 'static,
{
    let mut listeners = LifecycleListeners::default();
    let Some(window) = web_sys::window() else {
        return listeners;
    };

    let window_target: web_sys::EventTarget = window.clone().into();
    listeners.register(&window_target, "online", manager, || LifecycleEvent::Online);
    listeners.register(&window_target, "offline", manager, || LifecycleEvent::Offline);

    if let Some(document) = window.document() {
        let document_target: web_sys::EventTarget = document.clone().into();
        listeners.register(&document_target, "visibilitychange", manager, move || {
            if document.visibility_state() == web_sys::VisibilityState::Visible {
                LifecycleEvent::Visible
            } else {
                LifecycleEvent::Hidden
            }
        });
    }
    listeners
}
