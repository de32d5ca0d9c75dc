//! Data models for AKSes responses.
//!
//! - `PortfolioSummary`: totals per asset class
//! - `CashBalances`, `ShareBalances`: per-account holdings
//! - `GlobalIdentityResponse`: account and investor identity
//! - `PortfolioType`: asset class selector for the detail endpoints

pub mod identity;
pub mod portfolio;

pub use identity::{GlobalIdentity, GlobalIdentityResponse};
pub use portfolio::{
    CashBalance, CashBalances, PortfolioSummary, PortfolioSummaryDetail, PortfolioType,
    ShareBalance, ShareBalances,
};

use serde::{Deserialize, Deserializer};

/// Decode `null` the same as a missing field.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
