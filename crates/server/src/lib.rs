//! HTTP server for the pawnshop transaction terminal.
//!
//! Exposed as a library so integration tests can build the router
//! in-process with mock back-office services injected.

pub mod api;
pub mod metrics;
pub mod state;
