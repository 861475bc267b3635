// Hand-written doubles for the core ports, shared by the auth and docs tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::core::auth::{
    AuthHeaders, AuthManager, BrowserWindows, Credentials, WindowError, WindowHandle,
};
use crate::core::config::{DocsConfig, OAuthConfig};
use crate::core::docs::{ConfirmPrompt, DocsApi, PromptResult, UserPrompter};
use crate::core::http::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::infra::auth::InMemoryCredentialStore;

pub const CLIENT_ID: &str = "client-123.apps.googleusercontent.com";
pub const CALLBACK_URL: &str = "https://callback.test/google-docs";
pub const ACCESS_URL: &str = "https://oauth.test/tokeninfo";
pub const SCRIPT_URL: &str = "https://script.test/exec";
pub const DOCS_API_URL: &str = "https://docs.test";
pub const REPOSITORY_URL: &str = "https://repo.test/repo/";

pub fn test_config() -> DocsConfig {
    DocsConfig {
        oauth: OAuthConfig {
            client_id: CLIENT_ID.to_string(),
            callback_url: CALLBACK_URL.to_string(),
            authorize_url: "https://oauth.test/authorize".to_string(),
            access_url: ACCESS_URL.to_string(),
        },
        script_url: SCRIPT_URL.to_string(),
        docs_api_url: DOCS_API_URL.to_string(),
        repository_url: REPOSITORY_URL.to_string(),
        client_name: "Zotero".to_string(),
        dev_mode: false,
        api_version: 6,
        max_reauth_retries: 1,
        call_timeout: None,
        fetch_timeout: Duration::from_secs(60),
        batch_update_timeout: Duration::from_secs(120),
        credentials_path: PathBuf::from("unused.json"),
    }
}

pub fn valid_credentials(token: &str) -> Credentials {
    let mut headers = AuthHeaders::new();
    headers.insert("Authorization".to_string(), format!("Bearer {}", token));
    Credentials {
        headers: Some(headers),
        last_email: Some("writer@example.org".to_string()),
        expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
    }
}

/// Redirect the provider would send after a successful consent.
pub fn callback_url(token: &str, expires_in: i64) -> String {
    format!(
        "{}#access_token={}&token_type=Bearer&expires_in={}&scope=email%20https://www.googleapis.com/auth/documents",
        CALLBACK_URL, token, expires_in
    )
}

pub fn token_info_ok() -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(
        200,
        format!(r#"{{"aud":"{}","email":"writer@example.org"}}"#, CLIENT_ID),
    ))
}

type Responder = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

/// Transport that records every request and answers through a closure.
pub struct ScriptedTransport {
    responder: Responder,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, prefix: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);
        response
    }
}

/// Windows double. Optionally announces every opened auth window on a channel
/// so a test can play the part of the user.
#[derive(Default)]
pub struct RecordingWindows {
    next_handle: AtomicU64,
    opened: Mutex<Vec<String>>,
    closed: Mutex<Vec<WindowHandle>>,
    tabs: Mutex<Vec<String>>,
    notify: Option<mpsc::UnboundedSender<(WindowHandle, String)>>,
}

impl RecordingWindows {
    pub fn with_notifier() -> (Self, mpsc::UnboundedReceiver<(WindowHandle, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let windows = Self {
            notify: Some(tx),
            ..Self::default()
        };
        (windows, rx)
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<WindowHandle> {
        self.closed.lock().unwrap().clone()
    }

    pub fn tabs(&self) -> Vec<String> {
        self.tabs.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserWindows for RecordingWindows {
    async fn open_auth_window(&self, url: &str) -> Result<WindowHandle, WindowError> {
        let handle = WindowHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.opened.lock().unwrap().push(url.to_string());
        if let Some(notify) = &self.notify {
            let _ = notify.send((handle, url.to_string()));
        }
        Ok(handle)
    }

    async fn close(&self, handle: WindowHandle) {
        self.closed.lock().unwrap().push(handle);
    }

    async fn open_tab(&self, url: &str) {
        self.tabs.lock().unwrap().push(url.to_string());
    }
}

/// Prompter that answers from a queue (button 1 once the queue runs dry).
pub struct RecordingPrompter {
    answers: Mutex<VecDeque<u8>>,
    shown: Mutex<Vec<ConfirmPrompt>>,
}

impl RecordingPrompter {
    pub fn answering(answers: &[u8]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<ConfirmPrompt> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserPrompter for RecordingPrompter {
    async fn confirm(&self, prompt: ConfirmPrompt) -> PromptResult {
        self.shown.lock().unwrap().push(prompt);
        let button = self.answers.lock().unwrap().pop_front().unwrap_or(1);
        PromptResult { button }
    }
}

/// Answers token verification with success and every other request from
/// `responses`, in order.
pub fn scripted(responses: Vec<(u16, String)>) -> ScriptedTransport {
    let queue = Mutex::new(VecDeque::from(responses));
    ScriptedTransport::new(move |request| {
        if request.url.starts_with(ACCESS_URL) {
            return token_info_ok();
        }
        match queue.lock().unwrap().pop_front() {
            Some((status, body)) => Ok(HttpResponse::new(status, body)),
            None => Err(TransportError::Network(format!(
                "no scripted response for {}",
                request.url
            ))),
        }
    })
}

/// Script bridge envelope around a method result object.
pub fn script_result(result: Value) -> String {
    json!({ "response": { "result": result } }).to_string()
}

pub struct DocsHarness {
    pub api: DocsApi,
    pub auth: Arc<AuthManager>,
    pub transport: Arc<ScriptedTransport>,
    pub windows: Arc<RecordingWindows>,
    pub prompter: Arc<RecordingPrompter>,
    opened: Option<mpsc::UnboundedReceiver<(WindowHandle, String)>>,
}

impl DocsHarness {
    /// Plays the user: every auth window that opens is answered with `callback`.
    pub fn auto_authorize(&mut self, callback: String) {
        let Some(mut opened) = self.opened.take() else {
            return;
        };
        let auth = self.auth.clone();
        tokio::spawn(async move {
            while let Some((handle, _)) = opened.recv().await {
                let _ = auth.on_auth_complete(&callback, handle).await;
            }
        });
    }
}

pub async fn docs_harness(
    transport: ScriptedTransport,
    credentials: Credentials,
    answers: &[u8],
) -> DocsHarness {
    let config = Arc::new(test_config());
    let transport = Arc::new(transport);
    let (windows, opened) = RecordingWindows::with_notifier();
    let windows = Arc::new(windows);
    let prompter = Arc::new(RecordingPrompter::answering(answers));
    let store = Arc::new(InMemoryCredentialStore::with_credentials(credentials));

    let auth = Arc::new(
        AuthManager::new(
            config.oauth.clone(),
            transport.clone(),
            windows.clone(),
            store,
        )
        .await,
    );
    let api = DocsApi::new(
        config,
        auth.clone(),
        transport.clone(),
        prompter.clone(),
        windows.clone(),
    );

    DocsHarness {
        api,
        auth,
        transport,
        windows,
        prompter,
        opened: Some(opened),
    }
}
