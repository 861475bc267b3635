// Direct access to the Docs REST API: reading the document tree and applying
// batched edits. Shares auth and the wrong-account handling with `DocsApi::run`.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use url::form_urlencoded;

use super::docs_error::{DocsError, DocsErrorKind};
use super::docs_models::BatchUpdateRequest;
use super::rpc_service::DocsApi;
use super::tab_addressing::add_tab_data;
use crate::core::http::HttpRequest;

/// One-way hash used wherever a document has to be identified off-device.
pub fn hash_document_id(document_id: &str) -> String {
    hex::encode(Sha256::digest(document_id.as_bytes()))
}

/// Short description of the running client for error reports.
pub fn system_info() -> String {
    format!(
        "{} {} ({} {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

impl DocsApi {
    /// Fetches the document with all tab contents and resolves one tab.
    ///
    /// Documents without a tab tree come back whole. Otherwise the selected
    /// tab's `documentTab` is returned (the first tab when `tab_id` is `None`),
    /// annotated with `documentId` and `tabId`. `Ok(None)` means no such tab.
    pub async fn get_document(
        &self,
        document_id: &str,
        tab_id: Option<&str>,
    ) -> Result<Option<Value>, DocsError> {
        let headers = self.auth.get_auth_headers().await?;
        let url = format!(
            "{}/v1/documents/{}?includeTabsContent=true",
            self.config.docs_api_url, document_id
        );
        let request = HttpRequest::get(url)
            .with_headers(headers)
            .header("Content-Type", "application/json")
            .with_timeout(Some(self.config.fetch_timeout));

        let response = self.transport.send(request).await?;

        match response.status {
            200..=299 => {}
            403 => return Err(self.wrong_account().await),
            500 => {
                self.report_server_fault(document_id).await;
                return Err(DocsError::new(DocsErrorKind::ServerFault {
                    status: response.status,
                    body: response.body,
                }));
            }
            status => {
                return Err(DocsError::new(DocsErrorKind::Http {
                    status,
                    body: response.body,
                }))
            }
        }

        self.failures.remove(&hash_document_id(document_id));

        let document: Value = serde_json::from_str(&response.body)?;
        Ok(resolve_document_tab(document, document_id, tab_id))
    }

    /// Applies edit requests to the document, tagging each with the tab first
    /// when one is given. Returns the API's reply.
    pub async fn batch_update_document(
        &self,
        document_id: &str,
        tab_id: Option<&str>,
        mut body: BatchUpdateRequest,
    ) -> Result<Value, DocsError> {
        let headers = self.auth.get_auth_headers().await?;

        if let Some(tab_id) = tab_id.filter(|t| !t.is_empty()) {
            for request in body.requests.iter_mut() {
                add_tab_data(request, tab_id);
            }
        }

        let url = format!(
            "{}/v1/documents/{}:batchUpdate",
            self.config.docs_api_url, document_id
        );
        let request = HttpRequest::post(url, serde_json::to_string(&body)?)
            .with_headers(headers)
            .header("Content-Type", "application/json")
            .with_timeout(Some(self.config.batch_update_timeout));

        let response = self.transport.send(request).await?;

        if response.status == 403 {
            return Err(self.wrong_account().await);
        }
        if !response.is_success() {
            return Err(DocsError::new(DocsErrorKind::Http {
                status: response.status,
                body: response.body,
            }));
        }

        Ok(serde_json::from_str(&response.body)?)
    }

    /// Consecutive server failures seen for this document since its last
    /// successful fetch.
    pub fn failure_count(&self, document_id: &str) -> u64 {
        self.failures
            .get(&hash_document_id(document_id))
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// Bumps the failure counter and sends it to the repository. Never fails.
    async fn report_server_fault(&self, document_id: &str) {
        let hash = hash_document_id(document_id);
        let count = {
            let mut entry = self.failures.entry(hash.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        tracing::debug!("Reporting Google Docs API error. Count: {}", count);

        let extra = json!({ "count": count, "docID": hash }).to_string();
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("error", "true")
            .append_pair("errorData", "googleDocsV2APIError")
            .append_pair("extraData", &extra)
            .append_pair("diagnostic", &system_info())
            .finish();
        let request = HttpRequest::post(format!("{}report", self.config.repository_url), body)
            .header("Content-Type", "application/x-www-form-urlencoded");

        match self.transport.send(request).await {
            Ok(response) if response.is_success() => {}
            Ok(response) => tracing::debug!(
                "Failed to report Google Docs API error: {}",
                response.status
            ),
            Err(e) => tracing::debug!("Failed to report Google Docs API error: {}", e),
        }
    }
}

/// Picks the requested tab out of a fetched document.
pub fn resolve_document_tab(
    document: Value,
    document_id: &str,
    tab_id: Option<&str>,
) -> Option<Value> {
    let Some(tabs) = document.get("tabs").and_then(Value::as_array) else {
        return Some(document);
    };

    let mut found = find_document_tab(tabs, tab_id)?.clone();
    if let Some(object) = found.as_object_mut() {
        object.insert("documentId".to_string(), json!(document_id));
        object.insert("tabId".to_string(), json!(tab_id));
    }
    Some(found)
}

/// Depth-first: a tab is checked before its children, children before the
/// next sibling.
fn find_document_tab<'a>(tabs: &'a [Value], tab_id: Option<&str>) -> Option<&'a Value> {
    for tab in tabs {
        let id = tab.pointer("/tabProperties/tabId").and_then(Value::as_str);
        if tab_id.is_none() || id == tab_id {
            return tab.get("documentTab");
        }
        if let Some(children) = tab.get("childTabs").and_then(Value::as_array) {
            if let Some(found) = find_document_tab(children, tab_id) {
                return Some(found);
            }
        }
    }
    None
}
