//! Server side of the payment gate.
//!
//! - [`facilitator_client`] - HTTP client for the remote facilitator
//! - [`paygate`] - The per-request verify-then-settle state machine
//! - [`render`] - Outcome → HTTP response mapping, in both wire formats
//! - [`layer`] - Tower layer wrapping a protected route
//! - [`error`] - Terminal rejection states

pub mod error;
pub mod facilitator_client;
pub mod layer;
pub mod paygate;
pub mod render;

pub use error::Rejection;
pub use facilitator_client::{FacilitatorClient, FacilitatorClientConfig, FacilitatorClientError};
pub use layer::{PaymentLayer, PaymentService};
pub use paygate::{Gate, Paid, PaymentContext};
pub use render::{Challenge, Renderer};
