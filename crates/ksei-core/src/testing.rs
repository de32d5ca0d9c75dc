//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use reqwest::StatusCode;

use crate::api::transport::{HttpRequest, HttpResponse, Transport};
use crate::api::Result;

pub const FAKE_BASE_URL: &str = "http://ksei.test/service";

/// An unsigned JWT whose claims carry the given `exp`.
pub fn make_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"investor","exp":{}}}"#, exp));
    format!("{}.{}.c2lnbmF0dXJl", header, claims)
}

#[derive(Clone)]
struct Route {
    status: u16,
    body: String,
    delay: Duration,
}

/// In-memory transport routing on the path below [`FAKE_BASE_URL`] (query
/// string ignored). Unknown paths answer 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, status: u16, body: impl Into<String>) {
        self.respond_after(path, status, body, Duration::ZERO);
    }

    pub fn respond_after(&self, path: &str, status: u16, body: impl Into<String>, delay: Duration) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                status,
                body: body.into(),
                delay,
            },
        );
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| route_path(&r.url) == path)
            .cloned()
            .collect()
    }

    pub fn calls(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

fn route_path(url: &str) -> &str {
    let path = url.strip_prefix(FAKE_BASE_URL).unwrap_or(url);
    path.split('?').next().unwrap_or(path)
}

#[async_trait]
impl Transport for FakeTransport {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse> {
        let route = self
            .routes
            .lock()
            .unwrap()
            .get(route_path(&request.url))
            .cloned();
        self.requests.lock().unwrap().push(request);

        let Some(route) = route else {
            return Ok(HttpResponse {
                status: StatusCode::NOT_FOUND,
                body: Bytes::from_static(b"not found"),
            });
        };

        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }

        Ok(HttpResponse {
            status: StatusCode::from_u16(route.status).unwrap(),
            body: Bytes::from(route.body),
        })
    }
}
