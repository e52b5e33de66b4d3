//! Identity provider calls: token exchange and identity lookup
//!
//! [`IdentityProvider`] is the seam between the callback flow and the
//! network. [`HttpIdentityProvider`] implements it against a provider's
//! token and identity endpoints (Google by default); tests substitute
//! doubles.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::config::{ClientSecret, ProviderConfig};
use crate::error::{CallbackError, Result};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single outbound provider call.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The call did not complete within the configured timeout
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established or was interrupted
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The provider answered 2xx but the body is not what we expect
    #[error("malformed response body: {0}")]
    MalformedBody(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() || err.is_body() {
            ProviderError::MalformedBody(err.to_string())
        } else {
            ProviderError::Transport(err)
        }
    }
}

const MAX_ERROR_BODY: usize = 512;

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}

// ---------------------------------------------------------------------------
// Token exchange result
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Tokens returned by a successful code exchange.
///
/// Lives for one request only. `Debug` output never shows token values.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenExchangeResult {
    /// Bearer credential for the identity endpoint
    pub access_token: String,
    /// Token type, `Bearer` when the provider omits it
    pub token_type: String,
    /// Absolute expiry computed from `expires_in`
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scope
    pub scope: Option<String>,
    /// OpenID Connect ID token, when requested
    pub id_token: Option<String>,
    /// Refresh token, when offline access was granted
    pub refresh_token: Option<String>,
}

impl TokenExchangeResult {
    /// Wraps a bare access token with default metadata.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            expires_at: None,
            scope: None,
            id_token: None,
            refresh_token: None,
        }
    }

    /// Parses a token endpoint JSON body.
    ///
    /// A body without a non-empty `access_token` is malformed.
    pub fn from_json(body: &str) -> std::result::Result<Self, ProviderError> {
        let raw: TokenResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::MalformedBody(format!("token response: {e}")))?;

        if raw.access_token.is_empty() {
            return Err(ProviderError::MalformedBody(
                "token response has an empty access_token".to_string(),
            ));
        }

        let expires_at = raw
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));

        Ok(Self {
            access_token: raw.access_token,
            token_type: raw.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at,
            scope: raw.scope,
            id_token: raw.id_token,
            refresh_token: raw.refresh_token,
        })
    }
}

impl fmt::Debug for TokenExchangeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchangeResult")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Accepts both OpenID Connect (`sub`, `email_verified`) and Google v2
/// userinfo (`id`, `verified_email`) field names.
#[derive(Deserialize)]
struct UserInfoResponse {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    verified_email: Option<bool>,
}

/// The authenticated identity resolved from the identity endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityInfo {
    /// Email address; always non-empty
    pub email: String,
    /// Provider subject identifier
    pub subject: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Avatar URL
    pub picture: Option<String>,
    /// Whether the provider verified the email address
    pub email_verified: Option<bool>,
}

impl IdentityInfo {
    /// Parses an identity endpoint JSON body.
    ///
    /// A body without a non-empty `email` is malformed.
    pub fn from_json(body: &str) -> std::result::Result<Self, ProviderError> {
        let raw: UserInfoResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::MalformedBody(format!("identity response: {e}")))?;

        let email = raw
            .email
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::MalformedBody("identity response has no email".to_string())
            })?;

        Ok(Self {
            email,
            subject: raw.sub.or(raw.id),
            name: raw.name,
            picture: raw.picture,
            email_verified: raw.email_verified.or(raw.verified_email),
        })
    }
}

// ---------------------------------------------------------------------------
// IdentityProvider
// ---------------------------------------------------------------------------

/// The two outbound calls of the authorization-code grant.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Trades a single-use authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
    ) -> std::result::Result<TokenExchangeResult, ProviderError>;

    /// Resolves the identity behind an access token.
    async fn fetch_identity(
        &self,
        access_token: &str,
    ) -> std::result::Result<IdentityInfo, ProviderError>;
}

/// [`IdentityProvider`] backed by the provider's HTTP endpoints.
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    client_id: String,
    client_secret: ClientSecret,
    redirect_uri: String,
    token_endpoint: String,
    userinfo_endpoint: String,
}

impl HttpIdentityProvider {
    /// Builds a provider client from configuration.
    ///
    /// Every outbound request is bounded by `timeout_seconds`.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("oauth-callback/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(CallbackError::from)?;

        Ok(Self::with_client(http, config))
    }

    /// Builds a provider around an existing HTTP client.
    pub fn with_client(http: reqwest::Client, config: &ProviderConfig) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            token_endpoint: config.token_endpoint.clone(),
            userinfo_endpoint: config.userinfo_endpoint.clone(),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn exchange_code(
        &self,
        code: &str,
    ) -> std::result::Result<TokenExchangeResult, ProviderError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let resp = self
            .http
            .post(&self.token_endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        TokenExchangeResult::from_json(&body)
    }

    async fn fetch_identity(
        &self,
        access_token: &str,
    ) -> std::result::Result<IdentityInfo, ProviderError> {
        let resp = self
            .http
            .get(&self.userinfo_endpoint)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        IdentityInfo::from_json(&body)
    }
}
