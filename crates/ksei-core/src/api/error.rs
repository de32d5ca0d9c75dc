use std::sync::Arc;

use thiserror::Error;

use crate::auth::TokenError;
use crate::cache::StoreError;

/// Upstream answered with a non-success status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("AKSes refused access: {0}")]
    AccessDenied(String),

    #[error("AKSes rejected the bearer token")]
    Unauthorized,

    #[error("AKSes endpoint not found: {0}")]
    NotFound(String),

    #[error("AKSes is throttling requests")]
    RateLimited,

    #[error("AKSes server error: {0}")]
    ServerError(String),

    #[error("unexpected AKSes response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("status {}: {}", status.as_u16(), truncated)),
        }
    }
}

/// Coarse classification of [`Error`], stable across variant changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Activation,
    Auth,
    Transport,
    Decode,
    Validation,
    Internal,
}

/// Every failure the client can surface.
///
/// `Clone` because a single in-flight result is handed to every caller that
/// joined it; underlying non-clonable errors are kept behind `Arc`.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("username and password are required")]
    MissingCredentials,

    #[error("error getting hashed password: {0}")]
    Activation(#[source] Box<Error>),

    #[error("no data found in activation response (code {code:?}, status {status:?})")]
    NoActivationCandidates { code: String, status: String },

    #[error("login failed: {0}")]
    Login(#[source] Box<Error>),

    #[error("login response did not carry a validation token")]
    EmptyValidation,

    #[error("cached token for {username} is malformed: {source}")]
    MalformedToken {
        username: String,
        #[source]
        source: TokenError,
    },

    #[error("token store error: {0}")]
    Store(#[from] StoreError),

    #[error("Network error calling {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("error decoding {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error("in-flight request did not complete: {0}")]
    Interrupted(String),

    #[error("share balances do not accept the cash portfolio type, use cash balances instead")]
    CashPortfolioType,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingCredentials => ErrorKind::Config,
            Error::Activation(_) | Error::NoActivationCandidates { .. } => ErrorKind::Activation,
            Error::Login(_) | Error::EmptyValidation | Error::MalformedToken { .. } | Error::Store(_) => {
                ErrorKind::Auth
            }
            Error::Network { .. } | Error::Api(_) => ErrorKind::Transport,
            Error::Decode { .. } => ErrorKind::Decode,
            Error::CashPortfolioType => ErrorKind::Validation,
            Error::Interrupted(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn network(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Network {
            url: url.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn decode(what: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Decode {
            what: what.into(),
            source: Arc::new(source),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
