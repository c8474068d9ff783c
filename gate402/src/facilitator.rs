//! The remote collaborator that verifies and settles payments.
//!
//! The gate never checks signatures or moves funds itself. It hands the
//! client's proof to a [`Facilitator`], first to [`verify`](Facilitator::verify)
//! it and, only if that succeeds, to [`settle`](Facilitator::settle) it.
//!
//! `Err` from either method means the call itself failed (transport, timeout,
//! undecodable reply). A facilitator that answered "invalid" or "failed"
//! returns `Ok` with the corresponding response variant.

use std::future::Future;
use std::sync::Arc;

use crate::proto::{SettleRequest, SettleResponse, VerifyRequest, VerifyResponse};

/// Verification and settlement of payment proofs.
pub trait Facilitator: Send + Sync {
    /// Transport-level failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Checks a proof against one requirement. Reversible and side-effect free.
    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send;

    /// Executes a verified payment. Irreversible once it reaches the chain.
    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;
}

impl<T: Facilitator> Facilitator for Arc<T> {
    type Error = T::Error;

    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send {
        (**self).verify(request)
    }

    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send {
        (**self).settle(request)
    }
}
