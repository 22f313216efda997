//! HTTP API: configuration, routing, session handling.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
