//! Token persistence backends.
//!
//! The session layer only ever talks to the [`TokenStore`] trait, so any
//! key-value backend can stand in. Provided implementations:
//! - `FileTokenStore`: one JSON file per username in a directory
//! - `MemoryTokenStore`: process-local map
//! - `KeyringTokenStore`: OS keychain

pub mod store;

pub use store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, StoreError, TokenStore};
