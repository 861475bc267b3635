// =============================================================================
// AUTH MANAGER
// =============================================================================
//
// Obtains, caches and refreshes the bearer token used for every Docs request.
//
// **Flow:**
// 1. `get_auth_headers` returns cached headers while they are unexpired.
// 2. Otherwise it opens the provider's authorize page (implicit grant, token
//    in the URL fragment) and parks the caller on a pending slot.
// 3. The window layer reports navigation to the callback URL through
//    `on_auth_complete`, or the user closing the window through
//    `on_auth_cancel`. Either one settles every parked caller at once.
//
// Only one authorization window is ever open: a second caller arriving while
// one is pending joins the waiters instead of opening another window. The slot
// stays occupied until the token has been verified and stored.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use serde::Deserialize;
use tokio::sync::{oneshot, Mutex};
use url::{form_urlencoded, Url};

use super::auth_models::{
    AuthError, AuthHeaders, BrowserWindows, CredentialStore, Credentials, WindowEvent,
    WindowHandle, AUTH_STATE, DOCS_SCOPE, EXPIRY_MARGIN_SECS, REQUESTED_SCOPES,
};
use crate::core::config::OAuthConfig;
use crate::core::http::{HttpRequest, HttpTransport};

type AuthResult = Result<AuthHeaders, AuthError>;

#[derive(Default)]
struct AuthState {
    credentials: Credentials,
    /// `Some` from opening the authorization window until the outcome is known.
    pending: Option<PendingAuth>,
}

#[derive(Default)]
struct PendingAuth {
    waiters: Vec<oneshot::Sender<AuthResult>>,
    /// The callback arrived and the token is being checked. Closing the
    /// window no longer cancels.
    verifying: bool,
}

/// Response of the token verification endpoint.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    aud: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

pub struct AuthManager {
    config: OAuthConfig,
    transport: Arc<dyn HttpTransport>,
    windows: Arc<dyn BrowserWindows>,
    store: Arc<dyn CredentialStore>,
    state: Mutex<AuthState>,
}

impl AuthManager {
    /// Build the manager and restore credentials from the previous session.
    pub async fn new(
        config: OAuthConfig,
        transport: Arc<dyn HttpTransport>,
        windows: Arc<dyn BrowserWindows>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let credentials = match store.load().await {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::warn!("Failed to load Google Docs credentials: {}", e);
                Credentials::default()
            }
        };

        Self {
            config,
            transport,
            windows,
            store,
            state: Mutex::new(AuthState {
                credentials,
                pending: None,
            }),
        }
    }

    /// Returns headers for an authenticated request, authorizing interactively
    /// if there are none or they have expired.
    pub async fn get_auth_headers(&self) -> Result<AuthHeaders, AuthError> {
        let (sender, receiver) = oneshot::channel();

        let authorize_url = {
            let mut state = self.state.lock().await;

            if state.credentials.is_expired_at(Utc::now())
                && state.credentials.headers.take().is_some()
            {
                tracing::debug!("Google Docs credentials expired, discarding cached headers");
                self.persist(&state.credentials).await;
            }

            if let Some(headers) = &state.credentials.headers {
                return Ok(headers.clone());
            }

            match state.pending.as_mut() {
                Some(pending) => {
                    tracing::debug!("Google Docs authorization already pending, joining it");
                    pending.waiters.push(sender);
                    None
                }
                None => {
                    let url = self.authorize_url(state.credentials.last_email.as_deref())?;
                    state.pending = Some(PendingAuth {
                        waiters: vec![sender],
                        verifying: false,
                    });
                    Some(url)
                }
            }
        };

        if let Some(url) = authorize_url {
            tracing::info!("Opening Google Docs authorization window");
            if let Err(e) = self.windows.open_auth_window(&url).await {
                self.settle(Err(AuthError::Window(e.to_string()))).await;
            }
        }

        // A dropped sender means the pending slot was discarded without an answer.
        receiver.await.unwrap_or(Err(AuthError::Cancelled))
    }

    /// Called when the auth window reached the callback URL.
    pub async fn on_auth_complete(
        &self,
        callback_url: &str,
        handle: WindowHandle,
    ) -> Result<AuthHeaders, AuthError> {
        // Mark the slot before closing so the resulting close event does not
        // cancel it. Callers arriving meanwhile still join it.
        if let Some(pending) = self.state.lock().await.pending.as_mut() {
            pending.verifying = true;
        }
        self.windows.close(handle).await;

        let result = self.complete_authorization(callback_url).await;
        if let Err(e) = &result {
            tracing::warn!("Google Docs authorization failed: {}", e);
        }

        self.settle(result.clone()).await;
        result
    }

    /// Called when the user closed the auth window before finishing.
    pub async fn on_auth_cancel(&self) {
        let pending = {
            let mut state = self.state.lock().await;
            let cancellable = matches!(&state.pending, Some(p) if !p.verifying);
            if cancellable {
                state.pending.take()
            } else {
                None
            }
        };

        if let Some(pending) = pending {
            tracing::info!("Google Docs authorization window closed before completion");
            answer(pending, &Err(AuthError::Cancelled));
        }
    }

    /// Forget the token and the last signed-in account.
    pub async fn reset_auth(&self) {
        let mut state = self.state.lock().await;
        state.credentials.headers = None;
        state.credentials.last_email = None;
        self.persist(&state.credentials).await;
    }

    /// Drop only the token, keeping the account hint for the next sign-in.
    pub async fn invalidate_headers(&self) {
        let mut state = self.state.lock().await;
        if state.credentials.headers.take().is_some() {
            self.persist(&state.credentials).await;
        }
    }

    /// Routes window lifecycle events into the auth flow. Navigation anywhere
    /// other than the callback URL is ignored.
    pub async fn handle_window_event(&self, event: WindowEvent) {
        match event {
            WindowEvent::Navigated { handle, url } => {
                if self.is_callback_url(&url) {
                    let _ = self.on_auth_complete(&url, handle).await;
                }
            }
            WindowEvent::Closed { .. } => self.on_auth_cancel().await,
        }
    }

    pub fn is_callback_url(&self, url: &str) -> bool {
        url.starts_with(&self.config.callback_url)
    }

    pub async fn credentials(&self) -> Credentials {
        self.state.lock().await.credentials.clone()
    }

    #[cfg(test)]
    pub async fn is_pending(&self) -> bool {
        self.state.lock().await.pending.is_some()
    }

    #[cfg(test)]
    async fn waiter_count(&self) -> usize {
        self.state
            .lock()
            .await
            .pending
            .as_ref()
            .map(|p| p.waiters.len())
            .unwrap_or(0)
    }

    fn authorize_url(&self, login_hint: Option<&str>) -> Result<String, AuthError> {
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.callback_url.as_str()),
            ("response_type", "token"),
            ("scope", REQUESTED_SCOPES),
            ("state", AUTH_STATE),
        ];
        if let Some(email) = login_hint {
            params.push(("login_hint", email));
        }

        Url::parse_with_params(&self.config.authorize_url, &params)
            .map(|url| url.to_string())
            .map_err(|e| AuthError::Config(format!("{}: {}", self.config.authorize_url, e)))
    }

    async fn complete_authorization(&self, callback_url: &str) -> AuthResult {
        let params = parse_fragment(callback_url)?;

        if let Some(error) = params.get("error") {
            return Err(if error == "access_denied" {
                AuthError::Denied
            } else {
                AuthError::Provider(error.clone())
            });
        }

        let granted = params.get("scope").map(String::as_str).unwrap_or_default();
        if !granted.contains(DOCS_SCOPE) {
            return Err(AuthError::ScopeNotGranted);
        }

        let token = params
            .get("access_token")
            .ok_or_else(|| AuthError::MalformedCallback("missing access_token".to_string()))?;
        let expires_in: i64 = params
            .get("expires_in")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| AuthError::MalformedCallback("missing expires_in".to_string()))?;
        let expires_at = expires_in
            .checked_sub(EXPIRY_MARGIN_SECS)
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::MalformedCallback(format!("expires_in out of range: {}", expires_in))
            })?;

        let identity = self.verify_token(token).await?;

        let mut headers = AuthHeaders::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));

        let mut state = self.state.lock().await;
        state.credentials.last_email = identity.email;
        state.credentials.headers = Some(headers.clone());
        state.credentials.expires_at = Some(expires_at);
        self.persist(&state.credentials).await;

        tracing::info!("Google Docs authorization complete");
        Ok(headers)
    }

    /// Confirms the token was issued to our client and learns who it belongs to.
    async fn verify_token(&self, token: &str) -> Result<TokenInfo, AuthError> {
        let url = Url::parse_with_params(&self.config.access_url, &[("access_token", token)])
            .map_err(|e| AuthError::Config(format!("{}: {}", self.config.access_url, e)))?;

        let response = self
            .transport
            .send(HttpRequest::get(url.as_str()))
            .await
            .map_err(|e| AuthError::Verification(e.to_string()))?;

        if !response.is_success() {
            return Err(AuthError::Verification(format!(
                "{}: {}",
                response.status, response.body
            )));
        }

        let info: TokenInfo = serde_json::from_str(&response.body)
            .map_err(|e| AuthError::Verification(e.to_string()))?;
        if info.aud.as_deref() != Some(self.config.client_id.as_str()) {
            return Err(AuthError::TokenInvalid(response.body));
        }
        Ok(info)
    }

    /// Answer every waiter and free the slot.
    async fn settle(&self, result: AuthResult) {
        if let Some(pending) = self.state.lock().await.pending.take() {
            answer(pending, &result);
        }
    }

    async fn persist(&self, credentials: &Credentials) {
        if let Err(e) = self.store.save(credentials).await {
            tracing::warn!("Failed to persist Google Docs credentials: {}", e);
        }
    }
}

fn answer(pending: PendingAuth, result: &AuthResult) {
    for waiter in pending.waiters {
        let _ = waiter.send(result.clone());
    }
}

/// Splits the callback URL fragment (`#access_token=...&expires_in=...`) into
/// decoded key/value pairs.
fn parse_fragment(callback_url: &str) -> Result<HashMap<String, String>, AuthError> {
    let url =
        Url::parse(callback_url).map_err(|e| AuthError::MalformedCallback(e.to_string()))?;
    let fragment = url.fragment().unwrap_or_default();

    Ok(form_urlencoded::parse(fragment.as_bytes())
        .map(|(key, value)| (key.trim_start_matches('#').to_string(), value.into_owned()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http::{HttpResponse, TransportError};
    use crate::core::testing::{
        callback_url, test_config, token_info_ok, valid_credentials, RecordingWindows,
        ScriptedTransport, ACCESS_URL, CALLBACK_URL, CLIENT_ID,
    };
    use crate::infra::auth::InMemoryCredentialStore;
    use chrono::Duration;
    use tokio::sync::Notify;

    struct Harness {
        auth: Arc<AuthManager>,
        transport: Arc<ScriptedTransport>,
        windows: Arc<RecordingWindows>,
        store: Arc<InMemoryCredentialStore>,
        opened: tokio::sync::mpsc::UnboundedReceiver<(WindowHandle, String)>,
    }

    async fn harness(transport: ScriptedTransport, credentials: Credentials) -> Harness {
        let transport = Arc::new(transport);
        let (windows, opened) = RecordingWindows::with_notifier();
        let windows = Arc::new(windows);
        let store = Arc::new(InMemoryCredentialStore::with_credentials(credentials));
        let auth = Arc::new(
            AuthManager::new(
                test_config().oauth,
                transport.clone(),
                windows.clone(),
                store.clone(),
            )
            .await,
        );
        Harness {
            auth,
            transport,
            windows,
            store,
            opened,
        }
    }

    fn verifying_transport() -> ScriptedTransport {
        ScriptedTransport::new(|request| {
            if request.url.starts_with(ACCESS_URL) {
                token_info_ok()
            } else {
                Ok(HttpResponse::new(404, "unexpected"))
            }
        })
    }

    #[tokio::test]
    async fn cached_headers_are_returned_without_opening_a_window() {
        let h = harness(verifying_transport(), valid_credentials("cached")).await;

        let headers = h.auth.get_auth_headers().await.unwrap();

        assert_eq!(headers["Authorization"], "Bearer cached");
        assert!(h.windows.opened().is_empty());
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn expired_credentials_trigger_reauthorization() {
        let mut credentials = valid_credentials("stale");
        credentials.expires_at = Some(Utc::now() - Duration::seconds(5));
        let mut h = harness(verifying_transport(), credentials).await;

        let auth = h.auth.clone();
        let call = tokio::spawn(async move { auth.get_auth_headers().await });

        let (handle, _) = h.opened.recv().await.unwrap();
        assert_eq!(h.auth.credentials().await.headers, None);
        assert_eq!(h.store.snapshot().headers, None);

        h.auth
            .on_auth_complete(&callback_url("fresh", 3600), handle)
            .await
            .unwrap();

        let headers = call.await.unwrap().unwrap();
        assert_eq!(headers["Authorization"], "Bearer fresh");
    }

    #[tokio::test]
    async fn successful_authorization_stores_credentials_with_margin() {
        let mut h = harness(verifying_transport(), Credentials::default()).await;

        let auth = h.auth.clone();
        let call = tokio::spawn(async move { auth.get_auth_headers().await });
        let (handle, url) = h.opened.recv().await.unwrap();

        assert!(url.contains("response_type=token"));
        assert!(url.contains("state=google-docs-auth-callback"));
        assert!(!url.contains("login_hint"));

        let before = Utc::now();
        h.auth
            .on_auth_complete(&callback_url("tok-1", 3600), handle)
            .await
            .unwrap();
        let after = Utc::now();

        let headers = call.await.unwrap().unwrap();
        assert_eq!(headers["Authorization"], "Bearer tok-1");

        let stored = h.store.snapshot();
        let expires_at = stored.expires_at.unwrap();
        assert!(expires_at >= before + Duration::seconds(3600 - 60));
        assert!(expires_at <= after + Duration::seconds(3600 - 60));
        assert!(expires_at < after + Duration::seconds(3600));
        assert_eq!(stored.last_email.as_deref(), Some("writer@example.org"));
        assert_eq!(h.windows.closed(), vec![handle]);

        let verification = &h.transport.requests_to(ACCESS_URL)[0];
        assert!(verification.url.contains("access_token=tok-1"));
    }

    #[tokio::test]
    async fn access_denied_rejects_with_denied() {
        let mut h = harness(verifying_transport(), Credentials::default()).await;

        let auth = h.auth.clone();
        let call = tokio::spawn(async move { auth.get_auth_headers().await });
        let (handle, _) = h.opened.recv().await.unwrap();

        let result = h
            .auth
            .on_auth_complete(&format!("{}#error=access_denied", CALLBACK_URL), handle)
            .await;

        assert_eq!(result, Err(AuthError::Denied));
        assert_eq!(call.await.unwrap(), Err(AuthError::Denied));
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn other_provider_errors_are_generic() {
        let h = harness(verifying_transport(), Credentials::default()).await;

        let result = h
            .auth
            .on_auth_complete(
                &format!("{}#error=server_error", CALLBACK_URL),
                WindowHandle(9),
            )
            .await;

        assert_eq!(result, Err(AuthError::Provider("server_error".into())));
    }

    #[tokio::test]
    async fn missing_documents_scope_is_rejected() {
        let h = harness(verifying_transport(), Credentials::default()).await;

        let result = h
            .auth
            .on_auth_complete(
                &format!(
                    "{}#access_token=abc&expires_in=3600&scope=email",
                    CALLBACK_URL
                ),
                WindowHandle(1),
            )
            .await;

        assert_eq!(result, Err(AuthError::ScopeNotGranted));
        assert!(result.unwrap_err().is_permission_not_granted());
        assert_eq!(h.auth.credentials().await.headers, None);
    }

    #[tokio::test]
    async fn token_for_another_client_is_invalid() {
        let transport = ScriptedTransport::new(|_| {
            Ok(HttpResponse::new(
                200,
                r#"{"aud":"someone-else","email":"x@example.org"}"#,
            ))
        });
        let h = harness(transport, Credentials::default()).await;

        let result = h
            .auth
            .on_auth_complete(&callback_url("abc", 3600), WindowHandle(1))
            .await;

        assert!(matches!(result, Err(AuthError::TokenInvalid(body)) if body.contains("someone-else")));
        assert_eq!(h.auth.credentials().await.headers, None);
    }

    #[tokio::test]
    async fn verification_network_failure_is_reported() {
        let transport =
            ScriptedTransport::new(|_| Err(TransportError::Network("offline".into())));
        let h = harness(transport, Credentials::default()).await;

        let result = h
            .auth
            .on_auth_complete(&callback_url("abc", 3600), WindowHandle(1))
            .await;

        assert!(matches!(result, Err(AuthError::Verification(msg)) if msg.contains("offline")));
    }

    #[tokio::test]
    async fn closing_the_window_cancels_the_pending_request() {
        let mut h = harness(verifying_transport(), Credentials::default()).await;

        let auth = h.auth.clone();
        let call = tokio::spawn(async move { auth.get_auth_headers().await });
        let (handle, _) = h.opened.recv().await.unwrap();

        h.auth
            .handle_window_event(WindowEvent::Closed { handle })
            .await;

        let err = call.await.unwrap().unwrap_err();
        assert_eq!(err, AuthError::Cancelled);
        assert!(err.is_alert());
        assert!(!h.auth.is_pending().await);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_window() {
        let mut h = harness(verifying_transport(), Credentials::default()).await;

        let first = {
            let auth = h.auth.clone();
            tokio::spawn(async move { auth.get_auth_headers().await })
        };
        let (handle, _) = h.opened.recv().await.unwrap();

        let second = {
            let auth = h.auth.clone();
            tokio::spawn(async move { auth.get_auth_headers().await })
        };
        while h.auth.waiter_count().await < 2 {
            tokio::task::yield_now().await;
        }

        h.auth
            .handle_window_event(WindowEvent::Navigated {
                handle,
                url: callback_url("shared", 3600),
            })
            .await;

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(h.windows.opened().len(), 1);
    }

    /// Token-info endpoint that holds every request until released.
    #[derive(Default)]
    struct GatedVerification {
        entered: Notify,
        release: Notify,
    }

    #[async_trait::async_trait]
    impl HttpTransport for GatedVerification {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.entered.notify_one();
            self.release.notified().await;
            token_info_ok()
        }
    }

    #[tokio::test]
    async fn callers_arriving_during_verification_join_the_pending_request() {
        let transport = Arc::new(GatedVerification::default());
        let (windows, mut opened) = RecordingWindows::with_notifier();
        let windows = Arc::new(windows);
        let auth = Arc::new(
            AuthManager::new(
                test_config().oauth,
                transport.clone(),
                windows.clone(),
                Arc::new(InMemoryCredentialStore::new()),
            )
            .await,
        );

        let first = {
            let auth = auth.clone();
            tokio::spawn(async move { auth.get_auth_headers().await })
        };
        let (handle, _) = opened.recv().await.unwrap();

        let completion = {
            let auth = auth.clone();
            tokio::spawn(async move {
                auth.on_auth_complete(&callback_url("verified", 3600), handle)
                    .await
            })
        };
        transport.entered.notified().await;

        // Closing the window mid-verification cancels nothing.
        auth.handle_window_event(WindowEvent::Closed { handle })
            .await;
        assert!(auth.is_pending().await);

        let second = {
            let auth = auth.clone();
            tokio::spawn(async move { auth.get_auth_headers().await })
        };
        while auth.waiter_count().await < 2 {
            tokio::task::yield_now().await;
        }

        transport.release.notify_one();

        completion.await.unwrap().unwrap();
        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first["Authorization"], "Bearer verified");
        assert_eq!(first, second);
        assert_eq!(windows.opened().len(), 1);
        assert!(!auth.is_pending().await);
    }

    #[tokio::test]
    async fn out_of_range_lifetime_is_a_malformed_callback() {
        let h = harness(verifying_transport(), Credentials::default()).await;

        for expires_in in [i64::MAX, i64::MIN] {
            let result = h
                .auth
                .on_auth_complete(&callback_url("t", expires_in), WindowHandle(1))
                .await;
            assert!(matches!(result, Err(AuthError::MalformedCallback(_))));
        }

        assert_eq!(h.auth.credentials().await.headers, None);
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn navigation_elsewhere_is_ignored() {
        let mut h = harness(verifying_transport(), Credentials::default()).await;

        let auth = h.auth.clone();
        let _call = tokio::spawn(async move { auth.get_auth_headers().await });
        let (handle, _) = h.opened.recv().await.unwrap();

        h.auth
            .handle_window_event(WindowEvent::Navigated {
                handle,
                url: "https://accounts.google.com/signin/choose".to_string(),
            })
            .await;

        assert!(h.auth.is_pending().await);
        assert!(h.windows.closed().is_empty());
    }

    #[tokio::test]
    async fn last_email_is_sent_as_login_hint_until_reset() {
        let mut credentials = valid_credentials("t");
        credentials.headers = None;
        let mut h = harness(verifying_transport(), credentials).await;

        let auth = h.auth.clone();
        let _call = tokio::spawn(async move { auth.get_auth_headers().await });
        let (_, url) = h.opened.recv().await.unwrap();
        assert!(url.contains("login_hint=writer%40example.org"));
        assert!(url.contains(&format!("client_id={}", CLIENT_ID)));

        h.auth.on_auth_cancel().await;
        h.auth.reset_auth().await;

        let auth = h.auth.clone();
        let _call = tokio::spawn(async move { auth.get_auth_headers().await });
        let (_, url) = h.opened.recv().await.unwrap();
        assert!(!url.contains("login_hint"));
    }

    #[tokio::test]
    async fn reset_auth_clears_headers_and_email() {
        let h = harness(verifying_transport(), valid_credentials("t")).await;

        h.auth.reset_auth().await;

        let credentials = h.auth.credentials().await;
        assert_eq!(credentials.headers, None);
        assert_eq!(credentials.last_email, None);
        assert_eq!(h.store.snapshot(), credentials);
    }

    #[test]
    fn fragment_keys_are_decoded_and_unprefixed() {
        let params = parse_fragment(
            "https://callback.test/cb##error=access%20denied&scope=a+b",
        )
        .unwrap();

        assert_eq!(params["error"], "access denied");
        assert_eq!(params["scope"], "a b");
    }
}
