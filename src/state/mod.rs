//! Published client-side state.
//!
//! DESIGN
//! ======
//! Screens depend on small read-only models; the mutable session state stays
//! inside `session::manager`.

pub mod auth;
