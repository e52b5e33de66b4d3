//! Callback outcomes and the host-application redirect contract
//!
//! The [`Outcome`] of a callback is the only thing that survives past the
//! request. [`HostRedirect`] encodes it into the URL the browser is sent to:
//!
//! - success: `<base>?auth=success&user=<url-encoded email>`
//! - failure: `<base>?error=<reason>`

use thiserror::Error;
use url::Url;

use crate::callback::provider::IdentityInfo;
use crate::error::{CallbackError, Result};

/// Terminal failure of one callback request.
///
/// Every variant maps to a distinct `error=` value so the host application
/// can render a specific message. None of them are retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The identity provider redirected back with an `error` parameter
    #[error("identity provider reported an error")]
    ProviderError,

    /// Neither `code` nor `error` was present
    #[error("authorization code missing from callback")]
    MissingCode,

    /// The code exchange failed, timed out, or returned no access token
    #[error("token exchange failed")]
    TokenExchangeFailed,

    /// The identity endpoint failed or returned a malformed body
    #[error("identity fetch failed")]
    IdentityFetchFailed,

    /// Anything unexpected
    #[error("internal callback error")]
    InternalError,
}

impl FailureKind {
    /// Every failure kind, in flow order.
    pub const ALL: [FailureKind; 5] = [
        FailureKind::ProviderError,
        FailureKind::MissingCode,
        FailureKind::TokenExchangeFailed,
        FailureKind::IdentityFetchFailed,
        FailureKind::InternalError,
    ];

    /// Stable name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ProviderError => "provider_error",
            FailureKind::MissingCode => "missing_code",
            FailureKind::TokenExchangeFailed => "token_exchange_failed",
            FailureKind::IdentityFetchFailed => "identity_fetch_failed",
            FailureKind::InternalError => "internal_error",
        }
    }

    /// Value of the `error=` query parameter the host application consumes.
    pub fn redirect_code(&self) -> &'static str {
        match self {
            FailureKind::ProviderError => "oauth_error",
            FailureKind::MissingCode => "no_code",
            FailureKind::TokenExchangeFailed => "token_exchange_failed",
            FailureKind::IdentityFetchFailed => "user_info_failed",
            FailureKind::InternalError => "callback_error",
        }
    }
}

/// Result of one callback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The identity was resolved
    Success(IdentityInfo),
    /// The flow terminated early
    Failure(FailureKind),
}

impl Outcome {
    /// Label used for the outcome metric and the completion log line.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Failure(kind) => kind.as_str(),
        }
    }

    /// Returns the failure kind, if any.
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(kind) => Some(*kind),
        }
    }
}

impl From<std::result::Result<IdentityInfo, FailureKind>> for Outcome {
    fn from(result: std::result::Result<IdentityInfo, FailureKind>) -> Self {
        match result {
            Ok(identity) => Outcome::Success(identity),
            Err(kind) => Outcome::Failure(kind),
        }
    }
}

/// Builds outcome redirects against the host application's base URL.
#[derive(Debug, Clone)]
pub struct HostRedirect {
    base: Url,
    include_subject: bool,
}

impl HostRedirect {
    /// Creates a redirect builder.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::Url`] if `base_url` does not parse, or
    /// [`CallbackError::Config`] if it cannot carry a query string.
    ///
    /// # Examples
    ///
    /// ```
    /// use oauth_callback::callback::outcome::{FailureKind, HostRedirect, Outcome};
    ///
    /// let redirect = HostRedirect::new("https://practice.example.com", false).unwrap();
    /// let url = redirect.url_for(&Outcome::Failure(FailureKind::MissingCode));
    /// assert_eq!(url.as_str(), "https://practice.example.com/?error=no_code");
    /// ```
    pub fn new(base_url: &str, include_subject: bool) -> Result<Self> {
        let base = Url::parse(base_url).map_err(CallbackError::from)?;
        if base.cannot_be_a_base() {
            return Err(CallbackError::Config(format!(
                "host base URL cannot carry query parameters: {}",
                base_url
            ))
            .into());
        }
        Ok(Self {
            base,
            include_subject,
        })
    }

    /// The configured base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Encodes `outcome` into the redirect target.
    pub fn url_for(&self, outcome: &Outcome) -> Url {
        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            match outcome {
                Outcome::Success(identity) => {
                    query.append_pair("auth", "success");
                    query.append_pair("user", &identity.email);
                    if self.include_subject {
                        if let Some(subject) = &identity.subject {
                            query.append_pair("sub", subject);
                        }
                    }
                }
                Outcome::Failure(kind) => {
                    query.append_pair("error", kind.redirect_code());
                }
            }
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: &str, subject: Option<&str>) -> IdentityInfo {
        IdentityInfo {
            email: email.to_string(),
            subject: subject.map(str::to_string),
            name: None,
            picture: None,
            email_verified: None,
        }
    }

    #[test]
    fn test_success_redirect_encodes_email() {
        let redirect = HostRedirect::new("https://practice.example.com/", false).unwrap();
        let url = redirect.url_for(&Outcome::Success(identity("a@b.com", Some("1234"))));
        assert_eq!(
            url.as_str(),
            "https://practice.example.com/?auth=success&user=a%40b.com"
        );
    }

    #[test]
    fn test_success_redirect_with_subject() {
        let redirect = HostRedirect::new("https://practice.example.com/", true).unwrap();
        let url = redirect.url_for(&Outcome::Success(identity("a+b@c.com", Some("sub 1"))));
        assert_eq!(
            url.as_str(),
            "https://practice.example.com/?auth=success&user=a%2Bb%40c.com&sub=sub+1"
        );
    }

    #[test]
    fn test_success_redirect_without_known_subject() {
        let redirect = HostRedirect::new("https://practice.example.com/", true).unwrap();
        let url = redirect.url_for(&Outcome::Success(identity("a@b.com", None)));
        assert_eq!(
            url.as_str(),
            "https://practice.example.com/?auth=success&user=a%40b.com"
        );
    }

    #[test]
    fn test_every_failure_has_distinct_redirect_code() {
        let redirect = HostRedirect::new("https://practice.example.com/", false).unwrap();
        let expected = [
            "oauth_error",
            "no_code",
            "token_exchange_failed",
            "user_info_failed",
            "callback_error",
        ];

        for (kind, code) in FailureKind::ALL.iter().zip(expected) {
            let url = redirect.url_for(&Outcome::Failure(*kind));
            assert_eq!(
                url.as_str(),
                format!("https://practice.example.com/?error={}", code)
            );
        }
    }

    #[test]
    fn test_base_with_path_and_query_is_preserved() {
        let redirect = HostRedirect::new("https://example.com/app/?lang=en", false).unwrap();
        let url = redirect.url_for(&Outcome::Failure(FailureKind::ProviderError));
        assert_eq!(url.as_str(), "https://example.com/app/?lang=en&error=oauth_error");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(HostRedirect::new("not a url", false).is_err());
        assert!(HostRedirect::new("mailto:someone@example.com", false).is_err());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Success(identity("a@b.com", None)).label(), "success");
        assert_eq!(
            Outcome::Failure(FailureKind::IdentityFetchFailed).label(),
            "identity_fetch_failed"
        );
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: Outcome = Ok(identity("a@b.com", None)).into();
        assert!(ok.failure().is_none());

        let err: Outcome = Err(FailureKind::MissingCode).into();
        assert_eq!(err.failure(), Some(FailureKind::MissingCode));
    }
}
