//! Configuration management for the OAuth callback server
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! The loaded [`Config`] is injected once at startup; nothing in the
//! request path reads the environment.

use crate::cli::{Cli, Commands};
use crate::error::{CallbackError, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity provider client registration and endpoints
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Host application the outcome redirect targets
    #[serde(default)]
    pub host: HostConfig,

    /// Metrics exporter settings
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_host")]
    pub host: String,

    /// Dedicated callback port, distinct from the main application's
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_port(),
        }
    }
}

/// A confidential client secret
///
/// `Debug` and `Serialize` never reveal the value, so the secret cannot
/// leak through log fields or `show-config` output.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ClientSecret(String);

impl ClientSecret {
    /// Wraps a raw secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw secret for use in the token exchange request body.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true when no secret has been configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("ClientSecret(<unset>)")
        } else {
            f.write_str("ClientSecret(<redacted>)")
        }
    }
}

impl Serialize for ClientSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.0.is_empty() {
            serializer.serialize_str("")
        } else {
            serializer.serialize_str("<redacted>")
        }
    }
}

/// Identity provider configuration
///
/// `client_id`, `client_secret` and `redirect_uri` must match the
/// provider's registered application record exactly, or every exchange
/// fails with `token_exchange_failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Public client id issued by the provider
    #[serde(default)]
    pub client_id: String,

    /// Confidential client secret
    #[serde(default)]
    pub client_secret: ClientSecret,

    /// File to read the client secret from when `client_secret` is empty
    #[serde(default)]
    pub client_secret_file: Option<String>,

    /// Pre-registered redirect URI, including scheme and port
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Token endpoint for the authorization-code exchange
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,

    /// Identity endpoint queried with the bearer token
    #[serde(default = "default_userinfo_endpoint")]
    pub userinfo_endpoint: String,

    /// Upper bound for each outbound provider call (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_redirect_uri() -> String {
    "http://localhost:3001/oauth-callback".to_string()
}

fn default_token_endpoint() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_userinfo_endpoint() -> String {
    "https://www.googleapis.com/oauth2/v2/userinfo".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: ClientSecret::default(),
            client_secret_file: None,
            redirect_uri: default_redirect_uri(),
            token_endpoint: default_token_endpoint(),
            userinfo_endpoint: default_userinfo_endpoint(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Host application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Base URL every outcome redirect is built on
    #[serde(default = "default_host_base_url")]
    pub base_url: String,

    /// Also forward the provider subject id as `sub=` on success
    #[serde(default)]
    pub include_subject: bool,
}

fn default_host_base_url() -> String {
    "http://localhost:5000/".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            base_url: default_host_base_url(),
            include_subject: false,
        }
    }
}

/// Metrics exporter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Port for the Prometheus scrape endpoint; requires the `prometheus` feature
    #[serde(default)]
    pub listen_port: Option<u16>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or if
    /// `client_secret_file` is set but unreadable
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);
        config.resolve_client_secret()?;

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            host: HostConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CallbackError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| CallbackError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(host) = std::env::var("OAUTH_CALLBACK_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("OAUTH_CALLBACK_PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid OAUTH_CALLBACK_PORT: {}", port);
            }
        }

        if let Some(client_id) = env_with_fallback("OAUTH_CALLBACK_CLIENT_ID", "GOOGLE_CLIENT_ID") {
            self.provider.client_id = client_id;
        }

        if let Some(secret) =
            env_with_fallback("OAUTH_CALLBACK_CLIENT_SECRET", "GOOGLE_CLIENT_SECRET")
        {
            self.provider.client_secret = ClientSecret::new(secret);
            tracing::debug!("Env override: client secret");
        }

        if let Ok(secret_file) = std::env::var("OAUTH_CALLBACK_CLIENT_SECRET_FILE") {
            self.provider.client_secret_file = Some(secret_file);
        }

        if let Ok(redirect_uri) = std::env::var("OAUTH_CALLBACK_REDIRECT_URI") {
            self.provider.redirect_uri = redirect_uri;
        }

        if let Ok(token_endpoint) = std::env::var("OAUTH_CALLBACK_TOKEN_ENDPOINT") {
            tracing::debug!(token_endpoint = %token_endpoint, "Env override: OAUTH_CALLBACK_TOKEN_ENDPOINT");
            self.provider.token_endpoint = token_endpoint;
        }

        if let Ok(userinfo_endpoint) = std::env::var("OAUTH_CALLBACK_USERINFO_ENDPOINT") {
            tracing::debug!(userinfo_endpoint = %userinfo_endpoint, "Env override: OAUTH_CALLBACK_USERINFO_ENDPOINT");
            self.provider.userinfo_endpoint = userinfo_endpoint;
        }

        if let Ok(timeout) = std::env::var("OAUTH_CALLBACK_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.provider.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid OAUTH_CALLBACK_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(base_url) = std::env::var("OAUTH_CALLBACK_HOST_URL") {
            self.host.base_url = base_url;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Commands::Serve { host, port } = &cli.command {
            if let Some(host) = host {
                self.server.host = host.clone();
            }
            if let Some(port) = port {
                self.server.port = *port;
            }
        }
    }

    /// Reads the client secret from `client_secret_file` when no inline
    /// secret is configured. Surrounding whitespace is trimmed.
    fn resolve_client_secret(&mut self) -> Result<()> {
        if !self.provider.client_secret.is_empty() {
            return Ok(());
        }

        if let Some(path) = &self.provider.client_secret_file {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                CallbackError::Config(format!("Failed to read client secret file {}: {}", path, e))
            })?;
            self.provider.client_secret = ClientSecret::new(contents.trim());
        }

        Ok(())
    }

    /// Validate the configuration
    ///
    /// Ensures the provider registration is complete and every URL the
    /// flow depends on is an absolute http(s) URL.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(CallbackError::Config("server.port must be greater than 0".to_string()).into());
        }

        if self.provider.client_id.trim().is_empty() {
            return Err(
                CallbackError::Config("provider.client_id must not be empty".to_string()).into(),
            );
        }

        if self.provider.client_secret.is_empty() {
            return Err(CallbackError::Config(
                "provider.client_secret or provider.client_secret_file must be set".to_string(),
            )
            .into());
        }

        validate_http_url("provider.redirect_uri", &self.provider.redirect_uri)?;
        validate_http_url("provider.token_endpoint", &self.provider.token_endpoint)?;
        validate_http_url("provider.userinfo_endpoint", &self.provider.userinfo_endpoint)?;
        validate_http_url("host.base_url", &self.host.base_url)?;

        if self.provider.timeout_seconds == 0 || self.provider.timeout_seconds > 120 {
            return Err(CallbackError::Config(
                "provider.timeout_seconds must be between 1 and 120".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

fn env_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .or_else(|_| std::env::var(fallback))
        .ok()
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| CallbackError::Config(format!("{} is not a valid URL: {}", field, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(CallbackError::Config(format!(
            "{} must use http or https, got {}",
            field, other
        ))
        .into()),
    }
}
