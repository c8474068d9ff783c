//! Gate construction and the Axum router.

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use gate402::facilitator::Facilitator;
use gate402::scheme::MechanismRegistry;
use gate402_evm::ExactEvm;
use gate402_http::constants::{
    PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, X_PAYMENT_RESPONSE_HEADER,
};
use gate402_http::{FacilitatorClient, FacilitatorClientConfig, Gate, PaymentLayer};
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::EchoConfig;
use crate::error::StartupError;
use crate::handlers;

/// Builds the payment gate described by `config`.
///
/// Registers every known EVM network, builds the facilitator client and
/// prices every payment option. Nothing here is retried at request time, so
/// any failure is a deployment error.
///
/// # Errors
///
/// Returns [`StartupError`] if the facilitator URL is invalid or a payment
/// option cannot be priced.
pub fn build_gate(config: &EchoConfig) -> Result<Gate<FacilitatorClient>, StartupError> {
    let mut registry = MechanismRegistry::new();
    ExactEvm::new().register_into(&mut registry);

    let client_config = FacilitatorClientConfig::try_from(config.facilitator_url.as_str())?
        .with_timeout(config.facilitator_timeout());
    let facilitator = FacilitatorClient::try_new(client_config)?;

    let resource = config.resource_config()?;
    let gate = Gate::new(facilitator, Arc::new(registry), &resource)?
        .with_wire_format(config.wire_format);
    Ok(gate)
}

/// Routes `GET /health` freely and `POST {path}` behind `gate`.
#[must_use]
pub fn router<F>(gate: Gate<F>, path: &str) -> Router
where
    F: Facilitator + Clone + 'static,
{
    Router::new()
        .route("/health", get(handlers::health))
        .route(path, post(handlers::echo).layer(PaymentLayer::new(gate)))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any)
                .expose_headers([
                    PAYMENT_REQUIRED_HEADER,
                    PAYMENT_RESPONSE_HEADER,
                    X_PAYMENT_RESPONSE_HEADER,
                ]),
        )
}
