#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for a server-side x402 payment gate.
//!
//! A resource server protected by x402 answers unpaid requests with
//! `402 Payment Required` and a list of acceptable payment requirements.
//! The client attaches a signed payment proof, the server has a remote
//! facilitator verify and then settle it, and only then serves the resource.
//!
//! This crate holds everything in that flow that does not touch HTTP:
//! the wire types, price arithmetic, the mechanism registry and the
//! requirement builder. Chain-specific mechanisms live in separate crates.
//!
//! # Modules
//!
//! - [`amount`] - Human-readable price parsing and conversion to atomic units
//! - [`config`] - Static per-resource payment configuration
//! - [`facilitator`] - Trait for the remote verify/settle collaborator
//! - [`proto`] - Wire format types for both protocol versions
//! - [`requirements`] - Builds the offered payment requirements from configuration
//! - [`scheme`] - Payment mechanisms and the registry that selects them
//! - [`timestamp`] - Unix timestamps used by authorization windows
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation

pub mod amount;
pub mod config;
pub mod facilitator;
pub mod proto;
pub mod requirements;
pub mod scheme;
pub mod timestamp;
