#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport for the gate402 payment gate.
//!
//! Wraps any tower/axum service so that it only runs after the client has
//! paid: the payment proof is read from a request header, verified and then
//! settled through a remote facilitator, and every outcome is rendered as a
//! deterministic HTTP response.
//!
//! # Modules
//!
//! - [`constants`] - Header names and default facilitator settings
//! - [`headers`] - Base64 encoding/decoding of x402 header values
//! - [`error`] - Proof decoding errors
//! - [`server`] - Facilitator client, gate state machine, renderer and tower layer
//!
//! # Example
//!
//! ```rust,ignore
//! let client = FacilitatorClient::try_from("https://x402.org/facilitator")?;
//! let gate = Gate::new(client, Arc::new(registry), &resource)?;
//! let app = Router::new().route("/echo", post(echo).layer(PaymentLayer::new(gate)));
//! ```
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing spans and events

pub mod constants;
pub mod error;
pub mod headers;
pub mod server;

pub use error::MalformedProof;
pub use server::{
    FacilitatorClient, FacilitatorClientConfig, FacilitatorClientError, Gate, Paid,
    PaymentContext, PaymentLayer, PaymentService, Rejection,
};
