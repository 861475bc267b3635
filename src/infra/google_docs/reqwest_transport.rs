use async_trait::async_trait;
use reqwest::Client;

use crate::core::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

/// `HttpTransport` over a shared reqwest client.
///
/// Every response that carries a status is handed back as-is, including 4xx
/// and 5xx; only connection-level failures become errors.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    fn map_error(url: &str, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(url.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        tracing::debug!("{:?} {}", request.method, request.url);

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(&request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_error(&request.url, e))?;

        Ok(HttpResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn post_sends_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exec"))
            .and(header("Authorization", "Bearer tok"))
            .and(header("Content-Type", "application/json"))
            .and(body_string(r#"{"function":"callMethod"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"response":{}}"#))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let response = transport
            .send(
                HttpRequest::post(
                    format!("{}/exec", server.uri()),
                    r#"{"function":"callMethod"}"#,
                )
                .header("Authorization", "Bearer tok")
                .header("Content-Type", "application/json"),
            )
            .await
            .unwrap();

        assert_eq!(response, HttpResponse::new(200, r#"{"response":{}}"#));
    }

    #[tokio::test]
    async fn error_statuses_are_responses_not_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/documents/doc-1"))
            .and(query_param("includeTabsContent", "true"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let response = transport
            .send(HttpRequest::get(format!(
                "{}/v1/documents/doc-1?includeTabsContent=true",
                server.uri()
            )))
            .await
            .unwrap();

        assert_eq!(response.status, 403);
        assert_eq!(response.body, "forbidden");
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn slow_responses_time_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let err = transport
            .send(
                HttpRequest::get(format!("{}/slow", server.uri()))
                    .with_timeout(Some(Duration::from_millis(50))),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let transport = ReqwestTransport::new().unwrap();
        let err = transport
            .send(HttpRequest::get("http://127.0.0.1:1/unreachable"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Network(_)));
    }
}
