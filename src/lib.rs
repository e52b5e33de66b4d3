//! oauth-callback - standalone OAuth authorization-code callback server
//!
//! This library provides the callback flow that receives an identity
//! provider's redirect, exchanges the authorization code for tokens, fetches
//! the authenticated identity, and redirects back to the host application
//! with the outcome.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `callback`: Flow driver, provider calls, outcomes, and the redirect contract
//! - `server`: axum router, health probe, and listener lifecycle
//! - `config`: Configuration management and validation
//! - `logging`: tracing subscriber setup
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use oauth_callback::{cli::Cli, server, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Cli::default())?;
//!     config.validate()?;
//!     server::serve(&config).await
//! }
//! ```

pub mod callback;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;

// Re-export commonly used types
pub use callback::{FailureKind, HostRedirect, IdentityInfo, IdentityProvider, Outcome};
pub use config::Config;
pub use error::{CallbackError, Result};
