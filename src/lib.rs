//! # console-session
//!
//! Session lifecycle core for the operations console frontend (Leptos + WASM).
//!
//! The crate keeps the signed-in user's session alive for the lifetime of a
//! browser tab: it bootstraps the session from the identity gateway, refreshes
//! credentials ahead of expiry with bounded backoff, reacts to tab visibility
//! and connectivity changes, and exposes a read/action surface to screens. It
//! also ships the request layer every CRUD screen uses for credentialed,
//! cancellable fetches.
//!
//! SYSTEM CONTEXT
//! ==============
//! `session` owns the only mutable session state and is the sole caller of the
//! identity gateway (`net::gateway`). Screens read published `AuthState`
//! snapshots through `context::SessionContext` and talk to domain APIs through
//! `net::request`. Browser glue is gated behind the `hydrate` feature; all the
//! decision logic compiles and is tested natively.

pub mod config;
pub mod context;
pub mod logging;
pub mod net;
pub mod session;
pub mod state;
pub mod util;
