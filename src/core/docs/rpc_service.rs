// =============================================================================
// DOCS API
// =============================================================================
//
// Executes named methods against a document through the Apps Script bridge and
// turns every failure into a `DocsError`.
//
// **Recovery paths:**
// - 400-403 from the bridge, or a `docAccessError` result: the signed-in
//   account cannot see the document. Auth is reset and the user is told.
// - "Authorization is required" from the script: the token went stale under
//   us. Headers are dropped and the call is repeated, at most
//   `max_reauth_retries` times.
// - `lockError` result: another session holds the document. If the user
//   agrees, the document is unlocked and the call is sent once more.
//
// Anything the user has already been prompted about comes back with
// `already_reported` set.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use super::docs_error::{DocsError, DocsErrorKind};
use super::docs_models::{CallMethodBody, DocumentSpecifier, MethodCall, ScriptEnvelope};
use super::prompts::{self, ConfirmPrompt, UserPrompter, AUTHORIZATION_HELP_URL};
use super::tab_addressing::add_tab_data_to_args;
use crate::core::auth::{AuthHeaders, AuthManager, BrowserWindows};
use crate::core::config::DocsConfig;
use crate::core::http::{HttpRequest, HttpTransport};

const UNLOCK_METHOD: &str = "unlockTheDoc";

type DocsFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, DocsError>> + Send + 'a>>;

pub struct DocsApi {
    pub(super) config: Arc<DocsConfig>,
    pub(super) auth: Arc<AuthManager>,
    pub(super) transport: Arc<dyn HttpTransport>,
    prompter: Arc<dyn UserPrompter>,
    windows: Arc<dyn BrowserWindows>,
    /// Consecutive REST 500s per document, keyed by the hashed document id.
    pub(super) failures: DashMap<String, u64>,
}

impl DocsApi {
    pub fn new(
        config: Arc<DocsConfig>,
        auth: Arc<AuthManager>,
        transport: Arc<dyn HttpTransport>,
        prompter: Arc<dyn UserPrompter>,
        windows: Arc<dyn BrowserWindows>,
    ) -> Self {
        Self {
            config,
            auth,
            transport,
            prompter,
            windows,
            failures: DashMap::new(),
        }
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    /// Calls `method` on the document and returns the script's `response`
    /// payload.
    ///
    /// `args` must be a JSON array; anything else is sent as `[]`. With a tab
    /// context, request-shaped arguments are tagged with the tab first.
    pub async fn run(
        &self,
        specifier: &DocumentSpecifier,
        method: &str,
        args: Value,
        tab_id: Option<&str>,
    ) -> Result<Value, DocsError> {
        let mut args = match args {
            Value::Array(items) => items,
            other => {
                tracing::debug!("Discarding non-list arguments for {}: {}", method, other);
                Vec::new()
            }
        };
        if let Some(tab_id) = tab_id.filter(|t| !t.is_empty()) {
            add_tab_data_to_args(&mut args, tab_id);
        }

        let call = MethodCall::new(method, args);
        self.execute(specifier, &call, true).await
    }

    /// One method call including its automatic retries. `allow_unlock` is
    /// false for the unlock call itself and for the retransmission after it.
    fn execute<'a>(
        &'a self,
        specifier: &'a DocumentSpecifier,
        call: &'a MethodCall,
        allow_unlock: bool,
    ) -> DocsFuture<'a> {
        Box::pin(self.execute_once(specifier, call, allow_unlock))
    }

    async fn execute_once(
        &self,
        specifier: &DocumentSpecifier,
        call: &MethodCall,
        allow_unlock: bool,
    ) -> Result<Value, DocsError> {
        let body = serde_json::to_string(&CallMethodBody::new(
            specifier,
            call,
            self.config.api_version,
            self.config.dev_mode,
        ))?;
        let mut reauths_left = self.config.max_reauth_retries;
        let mut unlock_allowed = allow_unlock;

        loop {
            let headers = self.authorize().await?;
            let request = HttpRequest::post(&self.config.script_url, body.as_str())
                .with_headers(headers)
                .header("Content-Type", "application/json")
                .with_timeout(self.config.call_timeout);

            tracing::debug!("Calling Google Docs method {}", call.method);
            let response = self.transport.send(request).await?;

            if (400..=403).contains(&response.status) {
                return Err(self.wrong_account().await);
            }
            if !response.is_success() {
                return Err(DocsError::new(DocsErrorKind::Http {
                    status: response.status,
                    body: response.body,
                }));
            }

            let envelope: ScriptEnvelope = serde_json::from_str(&response.body)?;

            if let Some(error) = envelope.error {
                if error.is_auth_required() && reauths_left > 0 {
                    reauths_left -= 1;
                    tracing::warn!(
                        "Google Docs rejected the cached token, reauthorizing {}",
                        call.method
                    );
                    self.auth.invalidate_headers().await;
                    continue;
                }
                return Err(DocsError::new(DocsErrorKind::RemoteMethod {
                    message: error.detail_message().to_string(),
                    error_type: format!("Google Docs {}", error.message),
                    stack: error.stack(),
                }));
            }

            let result = envelope
                .response
                .and_then(|r| r.result)
                .ok_or_else(|| {
                    DocsErrorKind::MalformedResponse("missing response.result".to_string())
                })?;

            if let Some(lock) = result.lock_error() {
                tracing::info!("Google Docs document is locked: {}", lock);
                if !unlock_allowed {
                    return Err(DocsError::new(DocsErrorKind::LockedDocument));
                }
                if !self.confirm_unlock().await {
                    return Err(DocsError::reported(DocsErrorKind::LockedDocument));
                }

                let unlock = MethodCall::new(UNLOCK_METHOD, Vec::new());
                self.execute(specifier, &unlock, false).await?;
                unlock_allowed = false;
                continue;
            }

            if result.doc_access_error().is_some() {
                return Err(self.wrong_account().await);
            }

            if let Some(error) = result.error() {
                tracing::error!("Non-fatal Google Docs Error: {}", error);
            }

            let debug_lines = result.debug_lines();
            if !debug_lines.is_empty() {
                tracing::debug!("Google Docs debug:\n\n{}", debug_lines.join("\n\n"));
            }

            return Ok(result.response);
        }
    }

    /// Headers for the next request. A missing Docs scope is reported to the
    /// user here.
    async fn authorize(&self) -> Result<AuthHeaders, DocsError> {
        match self.auth.get_auth_headers().await {
            Ok(headers) => Ok(headers),
            Err(e) if e.is_permission_not_granted() => {
                self.prompt_with_help(prompts::auth_scope_error(&self.config.client_name))
                    .await;
                Err(DocsError::reported(DocsErrorKind::PermissionNotGranted))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resets auth and tells the user the account cannot reach the document.
    pub(super) async fn wrong_account(&self) -> DocsError {
        tracing::warn!("Google Docs denied access to the document for the signed-in account");
        self.auth.reset_auth().await;
        self.prompt_with_help(prompts::document_permission_error(
            &self.config.client_name,
        ))
        .await;
        DocsError::reported(DocsErrorKind::WrongAccount)
    }

    /// Two-stage lock prompt. Only "Need Help?" followed by "Yes" unlocks.
    async fn confirm_unlock(&self) -> bool {
        let name = &self.config.client_name;
        if self.prompter.confirm(prompts::document_locked(name)).await.button != 3 {
            return false;
        }
        self.prompter
            .confirm(prompts::document_locked_more_info(name))
            .await
            .button
            == 1
    }

    async fn prompt_with_help(&self, prompt: ConfirmPrompt) {
        if self.prompter.confirm(prompt).await.button == 3 {
            self.windows.open_tab(AUTHORIZATION_HELP_URL).await;
        }
    }
}
