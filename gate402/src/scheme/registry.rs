//! Registry of payment mechanisms keyed by scheme and network.
//!
//! The registry is filled once at startup and then shared behind an
//! [`Arc`]; once shared it can no longer be mutated, so request handling
//! needs no locking.

use std::collections::HashMap;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use super::Mechanism;

/// Key of a registered mechanism.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct SchemeSlug {
    /// The scheme name (e.g., "exact").
    pub scheme: String,
    /// The network the mechanism serves (e.g., "base-sepolia").
    pub network: String,
}

impl SchemeSlug {
    /// Creates a new slug.
    #[must_use]
    pub fn new(scheme: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            network: network.into(),
        }
    }
}

impl Display for SchemeSlug {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.network, self.scheme)
    }
}

/// No mechanism is registered for a scheme/network pair.
///
/// This is a deployment fault, never a client error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no payment mechanism registered for scheme {scheme:?} on network {network:?}")]
pub struct UnsupportedMechanism {
    /// The requested scheme.
    pub scheme: String,
    /// The requested network.
    pub network: String,
}

/// Maps scheme/network pairs to mechanisms.
#[derive(Default, Clone)]
pub struct MechanismRegistry(HashMap<SchemeSlug, Arc<dyn Mechanism>>);

impl Debug for MechanismRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut slugs: Vec<String> = self.0.keys().map(ToString::to_string).collect();
        slugs.sort();
        f.debug_tuple("MechanismRegistry").field(&slugs).finish()
    }
}

impl MechanismRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Registers `mechanism` for `network` under the mechanism's own scheme.
    ///
    /// A later registration for the same pair replaces the earlier one.
    pub fn register(
        &mut self,
        network: impl Into<String>,
        mechanism: Arc<dyn Mechanism>,
    ) -> &mut Self {
        let slug = SchemeSlug::new(mechanism.scheme(), network);
        self.0.insert(slug, mechanism);
        self
    }

    /// Builder form of [`Self::register`].
    #[must_use]
    pub fn with(mut self, network: impl Into<String>, mechanism: Arc<dyn Mechanism>) -> Self {
        self.register(network, mechanism);
        self
    }

    /// Looks up the mechanism for a scheme/network pair.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedMechanism`] when nothing is registered for the pair.
    pub fn resolve(
        &self,
        scheme: &str,
        network: &str,
    ) -> Result<&dyn Mechanism, UnsupportedMechanism> {
        self.0
            .get(&SchemeSlug::new(scheme, network))
            .map(|m| &**m)
            .ok_or_else(|| UnsupportedMechanism {
                scheme: scheme.to_owned(),
                network: network.to_owned(),
            })
    }

    /// Iterates over the registered keys.
    pub fn slugs(&self) -> impl Iterator<Item = &SchemeSlug> {
        self.0.keys()
    }

    /// Number of registered mechanisms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
