//! HTTP API: identity extraction, routing and response mapping.

pub mod app;
pub mod context;
pub mod middleware;
