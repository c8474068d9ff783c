//! Echo service behind an x402 payment gate.
//!
//! `POST /echo` returns the request body once a payment has been verified
//! and settled through the configured facilitator; `GET /health` is free.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration with environment variable expansion
//! - [`app`] - Gate construction and the Axum router
//! - [`handlers`] - Route handlers
//! - [`error`] - Startup error types

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;

pub use app::{build_gate, router};
pub use config::EchoConfig;
pub use error::StartupError;
