//! Core library for the KSEI AKSes client.
//!
//! Obtains, caches and refreshes the portal's bearer token and collapses
//! concurrent identical requests into one round trip.
//!
//! Modules:
//! - `api`: `KseiClient`, the transport seam, single-flight coalescing, errors
//! - `auth`: credentials, token expiry decoding, the login protocol
//! - `cache`: token store backends (file, memory, keychain)
//! - `models`: portfolio and identity response types
//! - `reference`: mutual fund and custodian bank lookup tables
//! - `config`: persisted application configuration

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod reference;

#[cfg(test)]
mod testing;

pub use api::{ClientOptions, Error, ErrorKind, KseiClient, Result};
pub use auth::{Credentials, Token};
pub use cache::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use models::PortfolioType;
pub use reference::ReferenceData;
