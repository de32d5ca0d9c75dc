use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use super::{Credentials, Token};
use crate::api::transport::{HttpRequest, Transport};
use crate::api::{Error, Result};
use crate::cache::TokenStore;

/// Production service root.
pub const DEFAULT_BASE_URL: &str = "https://akses.ksei.co.id/service";

/// Per-request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Joins the password digest and the timestamp in the activation parameter.
const ACTIVATION_SEPARATOR: &str = "@@!!@@";

/// Everything a request needs to know about where and as whom to call.
///
/// The client keeps one behind a lock and hands out clones, so an operation
/// sees one consistent view even if settings change mid-flight.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    /// `None` disables the per-request deadline.
    pub timeout: Option<Duration>,
    pub credentials: Credentials,
}

impl ClientSettings {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            credentials,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    id: &'a str,
    app_type: &'a str,
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    validation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivationResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Vec<ActivationCandidate>,
}

#[derive(Debug, Deserialize)]
struct ActivationCandidate {
    pass: String,
}

/// Owns the login protocol and decides whether a cached token is usable.
///
/// This is the only writer of the token store.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    store: Option<Arc<dyn TokenStore>>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>, store: Option<Arc<dyn TokenStore>>) -> Self {
        Self { transport, store }
    }

    /// Return the cached token while it is still valid, logging in otherwise.
    ///
    /// A cached token that cannot be decoded is an error rather than a miss,
    /// so store corruption stays visible.
    pub async fn get_valid_token(&self, settings: &ClientSettings) -> Result<Token> {
        let Some(store) = &self.store else {
            return self.login(settings).await;
        };

        let username = &settings.credentials.username;
        let cached = match store.get(username).await? {
            Some(value) if !value.is_empty() => Token::new(value),
            _ => {
                debug!(username = %username, "No cached token");
                return self.login(settings).await;
            }
        };

        let expires_at = cached.expires_at().map_err(|source| Error::MalformedToken {
            username: username.clone(),
            source,
        })?;

        if expires_at <= Utc::now() {
            debug!(username = %username, expired_at = %expires_at, "Cached token expired");
            return self.login(settings).await;
        }

        debug!(username = %username, expires_at = %expires_at, "Using cached token");
        Ok(cached)
    }

    /// Authenticate against the login endpoint and persist the new token.
    ///
    /// A store write failure fails the whole login even though upstream
    /// issued a token.
    pub async fn login(&self, settings: &ClientSettings) -> Result<Token> {
        let credentials = &settings.credentials;
        if !credentials.is_complete() {
            return Err(Error::MissingCredentials);
        }

        let password = self.derive_password(settings).await?;

        let token = self
            .authenticate(settings, &password)
            .await
            .map_err(|e| Error::Login(Box::new(e)))?;

        if let Some(store) = &self.store {
            store.set(&credentials.username, token.as_str()).await?;
        }

        info!(username = %credentials.username, "Logged in");
        Ok(token)
    }

    async fn authenticate(&self, settings: &ClientSettings, password: &str) -> Result<Token> {
        let body = serde_json::to_vec(&LoginRequest {
            id: "1",
            app_type: "web",
            username: &settings.credentials.username,
            password,
        })
        .map_err(|e| Error::decode("login request", e))?;

        let request = HttpRequest::post_json(settings.url("/login?lang=id"), body)
            .timeout(settings.timeout);
        let response = self.transport.perform(request).await?.error_for_status()?;

        let login: LoginResponse = serde_json::from_slice(&response.body)
            .map_err(|e| Error::decode("login response", e))?;

        match login.validation {
            Some(validation) if !validation.is_empty() => Ok(Token::new(validation)),
            _ => Err(Error::EmptyValidation),
        }
    }

    /// Password as the login endpoint expects it.
    async fn derive_password(&self, settings: &ClientSettings) -> Result<String> {
        let credentials = &settings.credentials;
        if !credentials.plain_password {
            return Ok(credentials.password.clone());
        }

        let param = activation_param(&credentials.password, Utc::now().timestamp());
        let url = settings.url(&format!(
            "/activation/generated?param={}",
            urlencoding::encode(&param)
        ));

        let response = self
            .transport
            .perform(HttpRequest::get(url).timeout(settings.timeout))
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::Activation(Box::new(e)))?;

        let activation: ActivationResponse = serde_json::from_slice(&response.body)
            .map_err(|e| Error::Activation(Box::new(Error::decode("activation response", e))))?;

        match activation.data.into_iter().next() {
            Some(candidate) => Ok(candidate.pass),
            None => Err(Error::NoActivationCandidates {
                code: activation.code.unwrap_or_default(),
                status: activation.status.unwrap_or_default(),
            }),
        }
    }
}

/// `base64(hex(sha1(password)) + "@@!!@@" + unix_seconds)`, before URL-encoding.
fn activation_param(password: &str, timestamp: i64) -> String {
    let digest = hex::encode(Sha1::digest(password.as_bytes()));
    STANDARD.encode(format!("{}{}{}", digest, ACTIVATION_SEPARATOR, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ErrorKind;
    use crate::cache::{MemoryTokenStore, StoreError};
    use crate::testing::{make_token, FakeTransport, FAKE_BASE_URL};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use reqwest::Method;

    const LOGIN_PATH: &str = "/login";
    const ACTIVATION_PATH: &str = "/activation/generated";

    fn settings() -> ClientSettings {
        let mut settings = ClientSettings::new(Credentials::new("investor", "derived-pass"));
        settings.base_url = FAKE_BASE_URL.to_string();
        settings
    }

    fn fresh_token() -> String {
        make_token((Utc::now() + ChronoDuration::hours(1)).timestamp())
    }

    fn transport_with_login(token: &str) -> Arc<FakeTransport> {
        let transport = FakeTransport::new();
        transport.respond(LOGIN_PATH, 200, format!(r#"{{"validation":"{}"}}"#, token));
        Arc::new(transport)
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore;

    #[async_trait]
    impl TokenStore for ReadOnlyStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::EmptyKey)
        }
    }

    #[test]
    fn test_activation_param_format() {
        let param = activation_param("secret", 1_700_000_000);
        let decoded = String::from_utf8(STANDARD.decode(param).unwrap()).unwrap();
        assert_eq!(
            decoded,
            "e5e9fa1ba31ecd1ae84f75caaa474f3a663f05f4@@!!@@1700000000"
        );
    }

    #[tokio::test]
    async fn test_login_without_store_posts_credentials() {
        let token = fresh_token();
        let transport = transport_with_login(&token);
        let session = SessionManager::new(transport.clone(), None);

        let got = session.get_valid_token(&settings()).await.unwrap();
        assert_eq!(got.as_str(), token);

        let requests = transport.requests_to(LOGIN_PATH);
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, format!("{}/login?lang=id", FAKE_BASE_URL));
        let body: serde_json::Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "id": "1",
                "appType": "web",
                "username": "investor",
                "password": "derived-pass"
            })
        );
        assert_eq!(request.timeout, Some(DEFAULT_TIMEOUT));

        // Without a store every call logs in again
        session.get_valid_token(&settings()).await.unwrap();
        assert_eq!(transport.calls(LOGIN_PATH), 2);
    }

    #[tokio::test]
    async fn test_valid_cached_token_is_reused() {
        let cached = fresh_token();
        let store = MemoryTokenStore::new();
        store.set("investor", &cached).await.unwrap();

        let transport = transport_with_login("unused");
        let session = SessionManager::new(transport.clone(), Some(Arc::new(store)));

        let got = session.get_valid_token(&settings()).await.unwrap();
        assert_eq!(got.as_str(), cached);
        assert_eq!(transport.calls(LOGIN_PATH), 0);
    }

    #[tokio::test]
    async fn test_expired_cached_token_triggers_login_and_is_replaced() {
        let expired = make_token(Utc::now().timestamp() - 1);
        let store = MemoryTokenStore::new();
        store.set("investor", &expired).await.unwrap();

        let fresh = fresh_token();
        let transport = transport_with_login(&fresh);
        let session = SessionManager::new(transport.clone(), Some(Arc::new(store.clone())));

        let got = session.get_valid_token(&settings()).await.unwrap();
        assert_eq!(got.as_str(), fresh);
        assert_eq!(transport.calls(LOGIN_PATH), 1);
        assert_eq!(store.get("investor").await.unwrap().as_deref(), Some(fresh.as_str()));
    }

    #[tokio::test]
    async fn test_empty_cached_value_is_a_miss() {
        let store = MemoryTokenStore::new();
        store.set("investor", "").await.unwrap();

        let transport = transport_with_login(&fresh_token());
        let session = SessionManager::new(transport.clone(), Some(Arc::new(store)));

        session.get_valid_token(&settings()).await.unwrap();
        assert_eq!(transport.calls(LOGIN_PATH), 1);
    }

    #[tokio::test]
    async fn test_malformed_cached_token_fails_without_login() {
        for malformed in ["garbage", "a.b", "eyJhbGciOiJIUzI1NiJ9.bm90LWpzb24.sig"] {
            let store = MemoryTokenStore::new();
            store.set("investor", malformed).await.unwrap();

            let transport = transport_with_login(&fresh_token());
            let session = SessionManager::new(transport.clone(), Some(Arc::new(store)));

            let err = session.get_valid_token(&settings()).await.unwrap_err();
            assert!(matches!(err, Error::MalformedToken { .. }), "{malformed}: {err}");
            assert_eq!(err.kind(), ErrorKind::Auth);
            assert_eq!(transport.request_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let transport = transport_with_login(&fresh_token());
        let session = SessionManager::new(transport.clone(), None);

        let mut no_password = settings();
        no_password.credentials.password.clear();
        let err = session.login(&no_password).await.unwrap_err();
        assert!(matches!(err, Error::MissingCredentials));
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_plain_password_goes_through_activation() {
        let transport = transport_with_login(&fresh_token());
        transport.respond(
            ACTIVATION_PATH,
            200,
            r#"{"code":"200","status":"success","data":[{"pass":"first"},{"pass":"second"}]}"#,
        );
        let session = SessionManager::new(transport.clone(), None);

        let mut plain = settings();
        plain.credentials.plain_password = true;
        plain.credentials.password = "secret".to_string();
        session.login(&plain).await.unwrap();

        let activation = transport.requests_to(ACTIVATION_PATH);
        assert_eq!(activation.len(), 1);
        let encoded = activation[0].url.split("param=").nth(1).unwrap();
        let param = urlencoding::decode(encoded).unwrap();
        let decoded = String::from_utf8(STANDARD.decode(param.as_bytes()).unwrap()).unwrap();
        assert!(decoded.starts_with("e5e9fa1ba31ecd1ae84f75caaa474f3a663f05f4@@!!@@"));

        let login = &transport.requests_to(LOGIN_PATH)[0];
        let body: serde_json::Value = serde_json::from_slice(login.body.as_ref().unwrap()).unwrap();
        assert_eq!(body["password"], "first");
    }

    #[tokio::test]
    async fn test_empty_activation_candidates() {
        let transport = transport_with_login(&fresh_token());
        transport.respond(ACTIVATION_PATH, 200, r#"{"code":"200","status":"success","data":[]}"#);
        let session = SessionManager::new(transport.clone(), None);

        let mut plain = settings();
        plain.credentials.plain_password = true;
        let err = session.login(&plain).await.unwrap_err();

        assert!(matches!(err, Error::NoActivationCandidates { .. }));
        assert_eq!(err.kind(), ErrorKind::Activation);
        assert_eq!(transport.calls(LOGIN_PATH), 0);
    }

    #[tokio::test]
    async fn test_activation_transport_failure_is_wrapped() {
        let transport = transport_with_login(&fresh_token());
        transport.respond(ACTIVATION_PATH, 503, "maintenance");
        let session = SessionManager::new(transport.clone(), None);

        let mut plain = settings();
        plain.credentials.plain_password = true;
        let err = session.login(&plain).await.unwrap_err();
        assert!(matches!(err, Error::Activation(_)));
        assert_eq!(err.kind(), ErrorKind::Activation);
    }

    #[tokio::test]
    async fn test_login_decode_failure_and_empty_validation() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(LOGIN_PATH, 200, "<html>");
        let session = SessionManager::new(transport.clone(), None);
        let err = session.login(&settings()).await.unwrap_err();
        assert!(matches!(&err, Error::Login(inner) if matches!(**inner, Error::Decode { .. })));
        assert_eq!(err.kind(), ErrorKind::Auth);

        transport.respond(LOGIN_PATH, 200, r#"{"message":"wrong password"}"#);
        let err = session.login(&settings()).await.unwrap_err();
        assert!(matches!(&err, Error::Login(inner) if matches!(**inner, Error::EmptyValidation)));
    }

    #[tokio::test]
    async fn test_store_write_failure_fails_login() {
        let transport = transport_with_login(&fresh_token());
        let session = SessionManager::new(transport.clone(), Some(Arc::new(ReadOnlyStore)));

        let err = session.get_valid_token(&settings()).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert_eq!(transport.calls(LOGIN_PATH), 1);
    }

    #[tokio::test]
    async fn test_cache_is_scoped_per_username() {
        let store = MemoryTokenStore::new();
        store.set("investor", &fresh_token()).await.unwrap();

        let transport = transport_with_login(&fresh_token());
        let session = SessionManager::new(transport.clone(), Some(Arc::new(store)));

        let mut other = settings();
        other.credentials.username = "someone-else".to_string();
        session.get_valid_token(&other).await.unwrap();
        assert_eq!(transport.calls(LOGIN_PATH), 1);
    }
}
