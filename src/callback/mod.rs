//! OAuth 2.0 authorization-code callback handling
//!
//! This module implements the receiving leg of the authorization-code grant:
//! the identity provider redirects the browser here with a `code` (or an
//! `error`), the code is exchanged for tokens, the identity is fetched, and
//! the browser is redirected back to the host application with the outcome.
//!
//! # Module Layout
//!
//! - [`context`]  -- request id and tracing span for one callback
//! - [`flow`]     -- the step-by-step flow driver
//! - [`metrics`]  -- outcome counters and optional Prometheus exporter
//! - [`outcome`]  -- failure taxonomy and the host redirect contract
//! - [`provider`] -- token exchange and identity fetch against the provider

pub mod context;
pub mod flow;
pub mod metrics;
pub mod outcome;
pub mod provider;

pub use context::RequestContext;
pub use flow::{handle_callback, resolve_identity, CallbackRequest, Redirected};
pub use outcome::{FailureKind, HostRedirect, Outcome};
pub use provider::{
    HttpIdentityProvider, IdentityInfo, IdentityProvider, ProviderError, TokenExchangeResult,
};
