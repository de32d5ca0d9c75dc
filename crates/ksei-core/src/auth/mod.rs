//! Authentication: credentials, bearer tokens and the login protocol.
//!
//! This module provides:
//! - `Credentials`: the username/password identity
//! - `Token` and `parse_expiry`: unverified JWT expiry decoding
//! - `SessionManager`: cached-token validation and the login exchange

pub mod credentials;
pub mod session;
pub mod token;

pub use credentials::Credentials;
pub use session::{ClientSettings, SessionManager};
pub use token::{parse_expiry, Token, TokenError};
