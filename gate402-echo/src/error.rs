//! Errors that stop the service from starting.

use gate402::requirements::RequirementsError;
use gate402_http::FacilitatorClientError;

use crate::config::ConfigError;

/// Errors raised while loading configuration and assembling the gate.
///
/// Every one of these is fatal: the service never accepts traffic with a
/// configuration it could not fully price.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A payment option could not be turned into a requirement.
    #[error("invalid payment option: {0}")]
    Requirements(#[from] RequirementsError),

    /// The facilitator client could not be built.
    #[error("facilitator client: {0}")]
    Facilitator(#[from] FacilitatorClientError),

    /// The listener could not be bound or the server failed.
    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}
