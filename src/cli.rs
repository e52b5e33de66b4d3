//! Command-line interface definition for the OAuth callback server
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to run the callback listener and to inspect the
//! effective configuration.

use clap::{Parser, Subcommand};

/// OAuth callback server
///
/// Receives identity-provider redirects, exchanges the authorization code,
/// and hands the outcome back to the host application.
#[derive(Parser, Debug, Clone)]
#[command(name = "oauth-callback")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "OAUTH_CALLBACK_JSON_LOGS")]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the callback listener
    Serve {
        /// Override the bind address from config
        #[arg(long)]
        host: Option<String>,

        /// Override the listener port from config
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the effective configuration (secrets redacted) and exit
    ShowConfig,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            json_logs: false,
            command: Commands::Serve {
                host: None,
                port: None,
            },
        }
    }
}
