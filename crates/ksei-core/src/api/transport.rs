//! HTTP transport seam.
//!
//! Everything above this module sees HTTP as "send a request, get a status and
//! the full body". The default implementation is backed by reqwest; tests plug
//! in their own.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderName, CONTENT_TYPE, REFERER, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use tracing::debug;

use super::{ApiError, Error, Result};

/// Fixed Referer sent with every request; the portal rejects calls without it.
pub const REFERER_URL: &str = "https://akses.ksei.co.id";

/// Browser User-Agent strings, one picked at random per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.2478.51",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.6367.82 Mobile Safari/537.36",
];

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(HeaderName, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// A request pre-populated with the Referer and a fresh User-Agent.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: vec![
                (REFERER, REFERER_URL.to_string()),
                (USER_AGENT, random_user_agent().to_string()),
            ],
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        let mut request = Self::new(Method::POST, url).header(CONTENT_TYPE, "application/json");
        request.body = Some(body);
        request
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header(reqwest::header::AUTHORIZATION, format!("Bearer {}", token))
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// First value of a header, if set.
    pub fn header_value(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    /// Pass through 2xx responses, map everything else to an [`ApiError`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            let body = String::from_utf8_lossy(&self.body);
            Err(ApiError::from_status(self.status, &body).into())
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Default transport. Clone is cheap - reqwest::Client shares its pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::network("client builder", e))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;

        let mut builder = self.client.request(method.clone(), &url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::network(url.clone(), e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::network(url.clone(), e))?;

        debug!(method = %method, url = %url, status = status.as_u16(), bytes = body.len(), "HTTP exchange");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_carries_referer_and_user_agent() {
        let request = HttpRequest::get("http://example.test/x").bearer("abc");
        assert_eq!(request.header_value(&REFERER), Some(REFERER_URL));
        assert!(USER_AGENTS.contains(&request.header_value(&USER_AGENT).unwrap()));
        assert_eq!(
            request.header_value(&reqwest::header::AUTHORIZATION),
            Some("Bearer abc")
        );
    }

    #[test]
    fn test_error_for_status() {
        let ok = HttpResponse {
            status: StatusCode::OK,
            body: Bytes::from_static(b"{}"),
        };
        assert!(ok.error_for_status().is_ok());

        let denied = HttpResponse {
            status: StatusCode::FORBIDDEN,
            body: Bytes::from_static(b"nope"),
        };
        assert!(matches!(
            denied.error_for_status(),
            Err(Error::Api(ApiError::AccessDenied(body))) if body == "nope"
        ));
    }

    #[tokio::test]
    async fn test_reqwest_transport_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/login")
            .match_query(mockito::Matcher::UrlEncoded("lang".into(), "id".into()))
            .match_header("referer", REFERER_URL)
            .match_header("content-type", "application/json")
            .match_body(r#"{"a":1}"#)
            .with_status(200)
            .with_body(r#"{"validation":"t"}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let request = HttpRequest::post_json(
            format!("{}/login?lang=id", server.url()),
            br#"{"a":1}"#.to_vec(),
        )
        .timeout(Some(Duration::from_secs(5)));

        let response = transport.perform(request).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], br#"{"validation":"t"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reqwest_transport_network_error() {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let transport = ReqwestTransport::with_client(client);
        // Port 9 on localhost is not expected to accept connections
        let err = transport
            .perform(HttpRequest::get("http://127.0.0.1:9/unreachable"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network { .. }));
    }
}
