//! Tower layer enforcing [x402](https://www.x402.org) payments on a route.
//!
//! Wrap a protected handler with [`PaymentLayer`]; everything else on the
//! router stays free. The layer holds one shared [`Gate`] and hands each
//! request to [`Gate::handle`].
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/health", get(health))
//!     .route("/echo", post(echo).layer(PaymentLayer::new(gate)));
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::response::Response;
use gate402::facilitator::Facilitator;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};

use super::paygate::Gate;

/// Layer that puts a [`Gate`] in front of a service.
#[derive(Debug)]
pub struct PaymentLayer<F> {
    gate: Arc<Gate<F>>,
}

impl<F> Clone for PaymentLayer<F> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<F> PaymentLayer<F> {
    /// Creates a layer owning `gate`.
    #[must_use]
    pub fn new(gate: Gate<F>) -> Self {
        Self {
            gate: Arc::new(gate),
        }
    }

    /// Creates a layer sharing an existing gate.
    #[must_use]
    pub const fn from_shared(gate: Arc<Gate<F>>) -> Self {
        Self { gate }
    }

    /// The gate applied by this layer.
    #[must_use]
    pub fn gate(&self) -> &Gate<F> {
        &self.gate
    }
}

impl<S, F> Layer<S> for PaymentLayer<F>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Service = PaymentService<F>;

    fn layer(&self, inner: S) -> Self::Service {
        PaymentService {
            gate: Arc::clone(&self.gate),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Service that runs the payment gate before the wrapped service.
#[allow(missing_debug_implementations)] // BoxCloneSyncService does not implement Debug
pub struct PaymentService<F> {
    gate: Arc<Gate<F>>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<F> Clone for PaymentService<F> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            inner: self.inner.clone(),
        }
    }
}

impl<F> Service<Request> for PaymentService<F>
where
    F: Facilitator + Clone + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    /// Delegates readiness polling to the wrapped inner service.
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let gate = Arc::clone(&self.gate);
        // Keep the instance that was polled ready; leave a fresh clone behind.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move { Ok(gate.handle(inner, req).await) })
    }
}
