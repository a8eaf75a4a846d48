//! API-facing models.
//!
//! The HTTP layer itself lives outside this crate; these are the typed
//! request parameters and response bodies it exchanges with the core.

pub mod models;
