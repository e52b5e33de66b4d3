//! The authorization-code callback flow
//!
//! One inbound redirect from the identity provider is driven through:
//!
//! 1. Provider error check: a non-empty `error` ends the flow.
//! 2. Code presence check.
//! 3. Token exchange.
//! 4. Identity fetch, only once step 3 produced an access token.
//! 5. Success.
//!
//! Every branch ends in a redirect to the host application. There is no
//! retry: authorization codes are single-use, so a failed exchange ends the
//! flow and the user restarts the provider login.

use std::panic::AssertUnwindSafe;

use futures::FutureExt as _;
use tracing::Instrument as _;
use url::Url;

use crate::callback::context::RequestContext;
use crate::callback::metrics;
use crate::callback::outcome::{FailureKind, HostRedirect, Outcome};
use crate::callback::provider::{IdentityInfo, IdentityProvider, ProviderError};

/// Query parameters of the provider redirect.
///
/// Empty values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackRequest {
    /// Single-use authorization grant
    pub code: Option<String>,
    /// Provider-reported failure reason
    pub error: Option<String>,
    /// Optional human-readable detail accompanying `error`
    pub error_description: Option<String>,
}

impl CallbackRequest {
    /// Parses a raw query string.
    ///
    /// Never fails: unknown parameters are ignored and, for repeated
    /// parameters, the first non-empty occurrence wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use oauth_callback::callback::flow::CallbackRequest;
    ///
    /// let request = CallbackRequest::from_query(Some("code=4%2F0Ab&scope=email"));
    /// assert_eq!(request.code.as_deref(), Some("4/0Ab"));
    /// assert!(request.error.is_none());
    /// ```
    pub fn from_query(query: Option<&str>) -> Self {
        let mut request = Self::default();

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
            if value.is_empty() {
                continue;
            }
            let slot = match &*key {
                "code" => &mut request.code,
                "error" => &mut request.error,
                "error_description" => &mut request.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        request
    }
}

/// Terminal state of one callback: the outcome and where the browser goes.
#[derive(Debug, Clone)]
pub struct Redirected {
    /// Outcome of the flow
    pub outcome: Outcome,
    /// Redirect target in the host application
    pub location: Url,
}

/// Drives steps 1-5 and returns the resolved identity or the failure kind.
///
/// A transport-level failure (connection refused, reset) on either call is
/// an [`FailureKind::InternalError`]; every other provider failure maps to
/// the failure kind of the step it happened in.
pub async fn resolve_identity(
    provider: &dyn IdentityProvider,
    request: &CallbackRequest,
) -> Result<IdentityInfo, FailureKind> {
    if let Some(error) = &request.error {
        tracing::warn!(
            provider_error = %error,
            description = request.error_description.as_deref().unwrap_or(""),
            "Identity provider redirected with an error"
        );
        return Err(FailureKind::ProviderError);
    }

    let Some(code) = &request.code else {
        tracing::warn!("Callback carried neither code nor error");
        return Err(FailureKind::MissingCode);
    };

    tracing::debug!(code_len = code.len(), "Exchanging authorization code");
    let token = provider.exchange_code(code).await.map_err(|e| {
        let kind = step_failure(&e, FailureKind::TokenExchangeFailed);
        tracing::warn!(error = %e, failure = kind.as_str(), "Token exchange failed");
        kind
    })?;

    tracing::debug!(token_type = %token.token_type, "Fetching identity");
    let identity = provider
        .fetch_identity(&token.access_token)
        .await
        .map_err(|e| {
            let kind = step_failure(&e, FailureKind::IdentityFetchFailed);
            tracing::warn!(error = %e, failure = kind.as_str(), "Identity fetch failed");
            kind
        })?;

    Ok(identity)
}

fn step_failure(err: &ProviderError, step: FailureKind) -> FailureKind {
    match err {
        ProviderError::Transport(_) => FailureKind::InternalError,
        ProviderError::Timeout | ProviderError::Status { .. } | ProviderError::MalformedBody(_) => {
            step
        }
    }
}

/// Handles one callback end to end.
///
/// Runs [`resolve_identity`] inside the request span, converts a panic
/// anywhere in the flow into [`FailureKind::InternalError`], records the
/// outcome metric, and builds the host redirect. This function cannot fail:
/// every path ends in a redirect.
pub async fn handle_callback(
    ctx: &RequestContext,
    provider: &dyn IdentityProvider,
    redirect: &HostRedirect,
    request: CallbackRequest,
) -> Redirected {
    let span = ctx.span().clone();

    async move {
        let result = AssertUnwindSafe(resolve_identity(provider, &request))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                tracing::error!("Callback flow panicked");
                Err(FailureKind::InternalError)
            });

        let outcome = Outcome::from(result);
        let elapsed = ctx.elapsed();
        metrics::record_outcome(&outcome, elapsed);

        match &outcome {
            Outcome::Success(identity) => tracing::info!(
                has_subject = identity.subject.is_some(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Callback resolved identity"
            ),
            Outcome::Failure(kind) => tracing::info!(
                failure = kind.as_str(),
                redirect_error = kind.redirect_code(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Callback failed"
            ),
        }

        let location = redirect.url_for(&outcome);
        Redirected { outcome, location }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::provider::{MockIdentityProvider, TokenExchangeResult};
    use mockall::predicate::eq;

    fn identity(email: &str) -> IdentityInfo {
        IdentityInfo {
            email: email.to_string(),
            subject: Some("108".to_string()),
            name: None,
            picture: None,
            email_verified: Some(true),
        }
    }

    fn request(code: Option<&str>, error: Option<&str>) -> CallbackRequest {
        CallbackRequest {
            code: code.map(str::to_string),
            error: error.map(str::to_string),
            error_description: None,
        }
    }

    fn host() -> HostRedirect {
        HostRedirect::new("https://practice.example.com/", false).unwrap()
    }

    struct PanickingProvider;

    #[async_trait::async_trait]
    impl IdentityProvider for PanickingProvider {
        async fn exchange_code(&self, _code: &str) -> Result<TokenExchangeResult, ProviderError> {
            panic!("provider blew up");
        }

        async fn fetch_identity(&self, _access_token: &str) -> Result<IdentityInfo, ProviderError> {
            unreachable!("identity fetch after a panicking exchange");
        }
    }

    /// In-memory sink for formatted log output.
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Runs one callback with every log level captured into the returned buffer.
    async fn run_captured(provider: &MockIdentityProvider, code: &str) -> (Redirected, String) {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let ctx = RequestContext::new();
        let redirected = handle_callback(&ctx, provider, &host(), request(Some(code), None)).await;
        (redirected, logs.contents())
    }

    /// A provider that fails the test if either call is made.
    fn untouched_provider() -> MockIdentityProvider {
        let mut provider = MockIdentityProvider::new();
        provider.expect_exchange_code().never();
        provider.expect_fetch_identity().never();
        provider
    }

    #[test]
    fn test_from_query_parses_code_and_error() {
        let req = CallbackRequest::from_query(Some(
            "code=abc&error=access_denied&error_description=User+denied&state=xyz",
        ));
        assert_eq!(req.code.as_deref(), Some("abc"));
        assert_eq!(req.error.as_deref(), Some("access_denied"));
        assert_eq!(req.error_description.as_deref(), Some("User denied"));
    }

    #[test]
    fn test_from_query_treats_empty_as_absent() {
        let req = CallbackRequest::from_query(Some("code=&error="));
        assert_eq!(req, CallbackRequest::default());
        assert_eq!(CallbackRequest::from_query(None), CallbackRequest::default());
    }

    #[test]
    fn test_from_query_first_occurrence_wins() {
        let req = CallbackRequest::from_query(Some("code=&code=first&code=second"));
        assert_eq!(req.code.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_error_takes_precedence_over_code() {
        let provider = untouched_provider();
        let result = resolve_identity(&provider, &request(Some("abc"), Some("access_denied"))).await;
        assert_eq!(result, Err(FailureKind::ProviderError));
    }

    #[tokio::test]
    async fn test_missing_code() {
        let provider = untouched_provider();
        let result = resolve_identity(&provider, &request(None, None)).await;
        assert_eq!(result, Err(FailureKind::MissingCode));
    }

    #[tokio::test]
    async fn test_success_passes_access_token_to_identity_fetch() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_exchange_code()
            .with(eq("auth-code"))
            .times(1)
            .returning(|_| Ok(TokenExchangeResult::bearer("T")));
        provider
            .expect_fetch_identity()
            .with(eq("T"))
            .times(1)
            .returning(|_| Ok(identity("a@b.com")));

        let result = resolve_identity(&provider, &request(Some("auth-code"), None)).await;
        assert_eq!(result, Ok(identity("a@b.com")));
    }

    #[tokio::test]
    async fn test_exchange_failure_short_circuits_identity_fetch() {
        let mut provider = MockIdentityProvider::new();
        provider.expect_exchange_code().times(1).returning(|_| {
            Err(ProviderError::Status {
                status: 400,
                body: r#"{"error":"invalid_grant"}"#.to_string(),
            })
        });
        provider.expect_fetch_identity().never();

        let result = resolve_identity(&provider, &request(Some("used-code"), None)).await;
        assert_eq!(result, Err(FailureKind::TokenExchangeFailed));
    }

    #[tokio::test]
    async fn test_exchange_timeout_and_malformed_body_are_exchange_failures() {
        let cases: [fn() -> ProviderError; 2] = [
            || ProviderError::Timeout,
            || ProviderError::MalformedBody("no access_token".to_string()),
        ];
        for err in cases {
            let mut provider = MockIdentityProvider::new();
            provider
                .expect_exchange_code()
                .returning(move |_| Err(err()));
            provider.expect_fetch_identity().never();

            let result = resolve_identity(&provider, &request(Some("c"), None)).await;
            assert_eq!(result, Err(FailureKind::TokenExchangeFailed));
        }
    }

    #[tokio::test]
    async fn test_identity_failures() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_exchange_code()
            .returning(|_| Ok(TokenExchangeResult::bearer("T")));
        provider.expect_fetch_identity().returning(|_| {
            Err(ProviderError::Status {
                status: 401,
                body: String::new(),
            })
        });

        let result = resolve_identity(&provider, &request(Some("c"), None)).await;
        assert_eq!(result, Err(FailureKind::IdentityFetchFailed));
    }

    #[tokio::test]
    async fn test_handle_callback_success_redirect() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_exchange_code()
            .returning(|_| Ok(TokenExchangeResult::bearer("T")));
        provider
            .expect_fetch_identity()
            .returning(|_| Ok(identity("a@b.com")));

        let ctx = RequestContext::new();
        let redirected =
            handle_callback(&ctx, &provider, &host(), request(Some("c"), None)).await;

        assert_eq!(redirected.outcome, Outcome::Success(identity("a@b.com")));
        assert_eq!(
            redirected.location.as_str(),
            "https://practice.example.com/?auth=success&user=a%40b.com"
        );
    }

    #[tokio::test]
    async fn test_success_logs_never_contain_code_or_access_token() {
        const CODE: &str = "4/0AbCd-single-use-grant";
        const ACCESS_TOKEN: &str = "ya29.a0-live-access-token";

        let mut provider = MockIdentityProvider::new();
        provider
            .expect_exchange_code()
            .returning(|_| Ok(TokenExchangeResult::bearer(ACCESS_TOKEN)));
        provider
            .expect_fetch_identity()
            .with(eq(ACCESS_TOKEN))
            .returning(|_| Ok(identity("a@b.com")));

        let (redirected, logs) = run_captured(&provider, CODE).await;

        assert!(matches!(redirected.outcome, Outcome::Success(_)));
        assert!(logs.contains(&format!("code_len={}", CODE.len())), "logs: {logs}");
        assert!(logs.contains("Callback resolved identity"), "logs: {logs}");
        assert!(!logs.contains(CODE), "code leaked into logs: {logs}");
        assert!(!logs.contains(ACCESS_TOKEN), "access token leaked into logs: {logs}");
    }

    #[tokio::test]
    async fn test_failed_exchange_logs_never_contain_code() {
        const CODE: &str = "4/0AbCd-already-consumed";

        let mut provider = MockIdentityProvider::new();
        provider.expect_exchange_code().returning(|_| {
            Err(ProviderError::Status {
                status: 400,
                body: r#"{"error":"invalid_grant","error_description":"Bad Request"}"#.to_string(),
            })
        });
        provider.expect_fetch_identity().never();

        let (redirected, logs) = run_captured(&provider, CODE).await;

        assert_eq!(
            redirected.outcome,
            Outcome::Failure(FailureKind::TokenExchangeFailed)
        );
        assert!(logs.contains("Token exchange failed"), "logs: {logs}");
        assert!(logs.contains("invalid_grant"), "logs: {logs}");
        assert!(!logs.contains(CODE), "code leaked into logs: {logs}");
    }

    #[tokio::test]
    async fn test_handle_callback_maps_panic_to_internal_error() {
        let ctx = RequestContext::new();
        let redirected =
            handle_callback(&ctx, &PanickingProvider, &host(), request(Some("c"), None)).await;

        assert_eq!(
            redirected.outcome,
            Outcome::Failure(FailureKind::InternalError)
        );
        assert_eq!(
            redirected.location.as_str(),
            "https://practice.example.com/?error=callback_error"
        );
    }

    #[tokio::test]
    async fn test_handle_callback_failure_redirects() {
        let provider = untouched_provider();
        let ctx = RequestContext::new();

        let redirected =
            handle_callback(&ctx, &provider, &host(), request(None, Some("access_denied"))).await;
        assert_eq!(
            redirected.location.as_str(),
            "https://practice.example.com/?error=oauth_error"
        );

        let redirected = handle_callback(&ctx, &provider, &host(), request(None, None)).await;
        assert_eq!(
            redirected.location.as_str(),
            "https://practice.example.com/?error=no_code"
        );
    }
}
