//! Networking modules for the identity gateway and domain APIs.
//!
//! SYSTEM CONTEXT
//! ==============
//! `gateway` is the identity gateway boundary (with `dev_gateway` as the local
//! bypass), `request` is the request layer screens use for domain APIs, and
//! `types` defines the gateway wire schema.

pub mod dev_gateway;
pub mod gateway;
pub mod request;
pub mod types;
