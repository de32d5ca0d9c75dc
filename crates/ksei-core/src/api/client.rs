//! API client for the AKSes portal.
//!
//! `KseiClient` ties the session manager, the transport and the single-flight
//! group together. Every typed accessor goes through [`KseiClient::get`], so
//! concurrent identical reads for the same user share one round trip.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::debug;

use super::flight::FlightGroup;
use super::transport::{HttpRequest, ReqwestTransport, Transport};
use super::{Error, Result};
use crate::auth::session::DEFAULT_TIMEOUT;
use crate::auth::{ClientSettings, Credentials, SessionManager};
use crate::cache::TokenStore;
use crate::models::{
    CashBalances, GlobalIdentityResponse, PortfolioSummary, PortfolioType, ShareBalances,
};

const PORTFOLIO_SUMMARY_PATH: &str = "/myportofolio/summary";
const PORTFOLIO_DETAIL_PATH: &str = "/myportofolio/summary-detail/";
const GLOBAL_IDENTITY_PATH: &str = "/myaccount/global-identity/";

/// Construction options for [`KseiClient`].
#[derive(Clone, Default)]
pub struct ClientOptions {
    pub username: String,
    pub password: String,
    pub plain_password: bool,
    /// Per-request timeout; `None` means the 30 second default.
    pub timeout: Option<Duration>,
    /// Service root; `None` means production.
    pub base_url: Option<String>,
    /// Where tokens are cached between runs; `None` logs in on every request.
    pub token_store: Option<Arc<dyn TokenStore>>,
}

/// Raw body of a coalesced GET.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Bytes,
    /// `true` when this caller piggybacked on a request another caller started.
    pub joined: bool,
}

/// AKSes client. Clone is cheap and clones share the session, the settings
/// and the in-flight request map.
#[derive(Clone)]
pub struct KseiClient {
    session: Arc<SessionManager>,
    transport: Arc<dyn Transport>,
    settings: Arc<RwLock<ClientSettings>>,
    flights: FlightGroup<Bytes>,
}

impl KseiClient {
    /// Create a client backed by reqwest.
    pub fn new(options: ClientOptions) -> Result<Self> {
        Ok(Self::with_transport(options, Arc::new(ReqwestTransport::new()?)))
    }

    pub fn with_transport(options: ClientOptions, transport: Arc<dyn Transport>) -> Self {
        let credentials = Credentials::new(options.username, options.password)
            .with_plain_password(options.plain_password);

        let mut settings = ClientSettings::new(credentials);
        settings.timeout = Some(options.timeout.unwrap_or(DEFAULT_TIMEOUT));
        if let Some(base_url) = options.base_url {
            settings.base_url = base_url;
        }

        Self {
            session: Arc::new(SessionManager::new(Arc::clone(&transport), options.token_store)),
            transport,
            settings: Arc::new(RwLock::new(settings)),
            flights: FlightGroup::new(),
        }
    }

    // ===== Settings =====

    /// Replace the credentials used for subsequent requests.
    ///
    /// Tokens are cached per username, so switching users never reuses the
    /// previous user's token. A new password for the same username does not
    /// invalidate a token that is still cached.
    pub async fn set_auth(&self, username: impl Into<String>, password: impl Into<String>) {
        let mut settings = self.settings.write().await;
        settings.credentials.username = username.into();
        settings.credentials.password = password.into();
    }

    pub async fn set_base_url(&self, base_url: impl Into<String>) {
        self.settings.write().await.base_url = base_url.into();
    }

    /// When true the password is derived through the activation endpoint
    /// before login; when false it is sent as given.
    pub async fn set_plain_password(&self, plain_password: bool) {
        self.settings.write().await.credentials.plain_password = plain_password;
    }

    /// `None` disables the per-request timeout.
    pub async fn set_timeout(&self, timeout: Option<Duration>) {
        self.settings.write().await.timeout = timeout;
    }

    pub async fn settings(&self) -> ClientSettings {
        self.settings.read().await.clone()
    }

    // ===== Request coordination =====

    /// Authenticated GET of `path`, coalesced with identical in-flight calls.
    ///
    /// Calls are identical when both the username and the path match. The
    /// body is not kept once the request completes.
    pub async fn fetch(&self, path: &str) -> Result<Fetched> {
        let settings = self.settings().await;
        let key = flight_key(&settings.credentials.username, path);

        let session = Arc::clone(&self.session);
        let transport = Arc::clone(&self.transport);
        let path = path.to_string();

        let landed = self
            .flights
            .run(&key, async move {
                let token = session.get_valid_token(&settings).await?;
                let request = HttpRequest::get(settings.url(&path))
                    .bearer(token.as_str())
                    .timeout(settings.timeout);
                let response = transport.perform(request).await?.error_for_status()?;
                debug!(path = %path, bytes = response.body.len(), "Fetched resource");
                Ok::<_, Error>(response.body)
            })
            .await;

        Ok(Fetched {
            body: landed.result?,
            joined: landed.joined,
        })
    }

    /// [`fetch`](Self::fetch) and decode the JSON body. Decoding happens per
    /// caller, so a decode failure never affects the other callers.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let fetched = self.fetch(path).await?;
        serde_json::from_slice(&fetched.body).map_err(|e| Error::decode(path, e))
    }

    // ===== Data Fetching Methods =====

    /// Totals per asset class.
    pub async fn get_portfolio_summary(&self) -> Result<PortfolioSummary> {
        self.get(PORTFOLIO_SUMMARY_PATH).await
    }

    /// Cash across all accounts, currencies and custodian banks.
    pub async fn get_cash_balances(&self) -> Result<CashBalances> {
        self.get(&detail_path(PortfolioType::Cash)).await
    }

    /// Holdings for a non-cash asset class, dropping records that lack an
    /// account or security name. Cash is rejected before any request is made;
    /// use [`get_cash_balances`](Self::get_cash_balances) instead.
    pub async fn get_share_balances(&self, portfolio_type: PortfolioType) -> Result<ShareBalances> {
        if portfolio_type == PortfolioType::Cash {
            return Err(Error::CashPortfolioType);
        }

        let mut balances: ShareBalances = self.get(&detail_path(portfolio_type)).await?;
        balances.retain_valid();
        Ok(balances)
    }

    /// Account and investor identity details.
    pub async fn get_global_identity(&self) -> Result<GlobalIdentityResponse> {
        self.get(GLOBAL_IDENTITY_PATH).await
    }
}

fn flight_key(username: &str, path: &str) -> String {
    format!("{}:{}", username, path)
}

fn detail_path(portfolio_type: PortfolioType) -> String {
    format!("{}{}", PORTFOLIO_DETAIL_PATH, portfolio_type.path_segment())
}
