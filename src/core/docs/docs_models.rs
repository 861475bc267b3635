// Wire models for the Apps Script bridge and the Docs REST API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Script error text seen when a still-valid token is suddenly rejected.
pub(crate) const AUTH_REQUIRED_MESSAGE: &str = "Authorization is required to perform that action.";

/// Addresses a document (and optionally one of its tabs) for method calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSpecifier {
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,
}

impl DocumentSpecifier {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            tab_id: None,
        }
    }

    pub fn with_tab(mut self, tab_id: Option<String>) -> Self {
        self.tab_id = tab_id;
        self
    }
}

/// A named remote operation with positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

/// Body of `POST <script url>`.
#[derive(Debug, Serialize)]
pub(crate) struct CallMethodBody<'a> {
    function: &'static str,
    parameters: (&'a DocumentSpecifier, &'a str, &'a [Value], u32),
    #[serde(rename = "devMode")]
    dev_mode: bool,
}

impl<'a> CallMethodBody<'a> {
    pub(crate) fn new(
        specifier: &'a DocumentSpecifier,
        call: &'a MethodCall,
        api_version: u32,
        dev_mode: bool,
    ) -> Self {
        Self {
            function: "callMethod",
            parameters: (specifier, call.method.as_str(), call.args.as_slice(), api_version),
            dev_mode,
        }
    }
}

/// Body of `POST /v1/documents/{id}:batchUpdate`. Fields other than
/// `requests` (e.g. `writeControl`) pass through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchUpdateRequest {
    #[serde(default)]
    pub requests: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BatchUpdateRequest {
    pub fn new(requests: Vec<Value>) -> Self {
        Self {
            requests,
            extra: Map::new(),
        }
    }
}

// =============================================================================
// SCRIPT RESPONSE
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScriptEnvelope {
    #[serde(default)]
    pub error: Option<ScriptError>,
    #[serde(default)]
    pub response: Option<ScriptResponse>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScriptError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Vec<ScriptErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScriptErrorDetail {
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub script_stack_trace_elements: Option<Value>,
}

impl ScriptError {
    /// The script's own message, falling back to the envelope message.
    pub fn detail_message(&self) -> &str {
        self.details
            .first()
            .and_then(|d| d.error_message.as_deref())
            .unwrap_or(&self.message)
    }

    /// The script rejected the token. Only the first detail counts, never the
    /// envelope message.
    pub fn is_auth_required(&self) -> bool {
        self.details
            .first()
            .and_then(|d| d.error_message.as_deref())
            == Some(AUTH_REQUIRED_MESSAGE)
    }

    pub fn stack(&self) -> Option<Value> {
        self.details
            .first()
            .and_then(|d| d.script_stack_trace_elements.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScriptResponse {
    #[serde(default)]
    pub result: Option<MethodResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MethodResult {
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    lock_error: Option<Value>,
    #[serde(default)]
    doc_access_error: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    debug: Option<Vec<Value>>,
}

impl MethodResult {
    pub fn lock_error(&self) -> Option<&Value> {
        present(&self.lock_error)
    }

    pub fn doc_access_error(&self) -> Option<&Value> {
        present(&self.doc_access_error)
    }

    pub fn error(&self) -> Option<&Value> {
        present(&self.error)
    }

    pub fn debug_lines(&self) -> Vec<String> {
        self.debug
            .iter()
            .flatten()
            .map(|line| match line {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

/// Treats null, false, "" and 0 the way the script does: as absent.
fn present(value: &Option<Value>) -> Option<&Value> {
    value.as_ref().filter(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    })
}
