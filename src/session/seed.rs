//! Session seed embedded by the hosting shell.
//!
//! When the shell already fetched the session during server render it writes
//! the JSON into `<script type="application/json" id="console-session-seed">`.
//! Bootstrapping from it avoids a second round trip on page load.

#[cfg(test)]
#[path = "seed_test.rs"]
mod seed_test;

use crate::net::types::SessionResponse;

/// Element id of the embedded seed.
pub const SEED_ELEMENT_ID: &str = "console-session-seed";

/// Decode a seed payload. Blank or malformed payloads yield `None` so the
/// manager falls back to a network fetch.
pub fn parse_seed(raw: &str) -> Option<SessionResponse> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    serde_json::from_str(raw)
        .map_err(|e| log::warn!("ignoring malformed session seed: {e}"))
        .ok()
}

/// Read the seed from the document, if the shell provided one.
pub fn read_embedded_session() -> Option<SessionResponse> {
    #[cfg(feature = "hydrate")]
    {
        let document = web_sys::window()?.document()?;
        let element = document.get_element_by_id(SEED_ELEMENT_ID)?;
        parse_seed(&element.text_content()?)
    }
    #[cfg(not(feature = "hydrate"))]
    {
        None
    }
}
