//! HTTP collector for metrics reported by metrik agents.
//!
//! Handlers validate incoming metrics, pass them through the signing gate
//! and store them in the configured backing.

pub mod api;
pub mod app;
pub mod config;
pub mod logging;
pub mod middleware;
pub mod state;
