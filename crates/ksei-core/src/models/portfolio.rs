//! Portfolio response shapes.
//!
//! Field names follow the upstream Indonesian JSON keys via serde renames.
//! Missing or null fields decode to their zero value, so a sparse record
//! still parses and can be filtered afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::null_default;

/// Asset class as used in the portfolio endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortfolioType {
    #[serde(rename = "EKUITAS")]
    Equity,
    #[serde(rename = "REKSADANA")]
    MutualFund,
    #[serde(rename = "KAS")]
    Cash,
    #[serde(rename = "OBLIGASI")]
    Bond,
    #[serde(rename = "LAINNYA")]
    Other,
}

impl PortfolioType {
    pub const ALL: [PortfolioType; 5] = [
        PortfolioType::Equity,
        PortfolioType::MutualFund,
        PortfolioType::Cash,
        PortfolioType::Bond,
        PortfolioType::Other,
    ];

    /// Upstream wire value, e.g. `EKUITAS`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PortfolioType::Equity => "EKUITAS",
            PortfolioType::MutualFund => "REKSADANA",
            PortfolioType::Cash => "KAS",
            PortfolioType::Bond => "OBLIGASI",
            PortfolioType::Other => "LAINNYA",
        }
    }

    /// Lowercase English name.
    pub fn name(&self) -> &'static str {
        match self {
            PortfolioType::Equity => "equity",
            PortfolioType::MutualFund => "mutual_fund",
            PortfolioType::Cash => "cash",
            PortfolioType::Bond => "bond",
            PortfolioType::Other => "other",
        }
    }

    /// Path segment of the summary-detail endpoint.
    pub fn path_segment(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for PortfolioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortfolioType {
    type Err = String;

    /// Accepts either the wire value or the English name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PortfolioType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted) || t.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown portfolio type: {}", s))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    #[serde(rename = "summaryValue", default, deserialize_with = "null_default")]
    pub total: f64,
    #[serde(rename = "summaryResponse", default, deserialize_with = "null_default")]
    pub details: Vec<PortfolioSummaryDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummaryDetail {
    #[serde(rename = "type", default, deserialize_with = "null_default")]
    pub kind: String,
    #[serde(rename = "summaryAmount", default, deserialize_with = "null_default")]
    pub amount: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub percent: f64,
}

/// Cash held in one account and currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashBalance {
    #[serde(default, deserialize_with = "null_default")]
    pub id: i64,
    #[serde(rename = "rekening", default, deserialize_with = "null_default")]
    pub account_number: String,
    #[serde(rename = "bank", default, deserialize_with = "null_default")]
    pub bank_id: String,
    #[serde(rename = "currCode", default, deserialize_with = "null_default")]
    pub currency: String,
    #[serde(rename = "saldo", default, deserialize_with = "null_default")]
    pub balance: f64,
    #[serde(rename = "saldoIdr", default, deserialize_with = "null_default")]
    pub balance_idr: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub status: i64,
}

impl CashBalance {
    /// The larger of the native and IDR balances.
    pub fn current_balance(&self) -> f64 {
        self.balance.max(self.balance_idr)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashBalances {
    #[serde(default, deserialize_with = "null_default")]
    pub data: Vec<CashBalance>,
}

/// Separator between ticker and name in [`ShareBalance::full_name`].
const NAME_SEPARATOR: &str = " - ";

/// Holding of one security in one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareBalance {
    /// Securities account, e.g. `XL001CANE000000`.
    #[serde(rename = "rekening", default, deserialize_with = "null_default")]
    pub account: String,
    /// e.g. `GOTO - GOTO GOJEK TOKOPEDIA Tbk`.
    #[serde(rename = "efek", default, deserialize_with = "null_default")]
    pub full_name: String,
    /// Broker or asset manager.
    #[serde(rename = "partisipan", default, deserialize_with = "null_default")]
    pub participant: String,
    #[serde(rename = "tipeSaldo", default, deserialize_with = "null_default")]
    pub balance_type: String,
    #[serde(rename = "curr", default, deserialize_with = "null_default")]
    pub currency: String,
    /// Units owned.
    #[serde(rename = "jumlah", default, deserialize_with = "null_default")]
    pub amount: f64,
    /// Last closing price.
    #[serde(rename = "harga", default, deserialize_with = "null_default")]
    pub closing_price: f64,
}

impl ShareBalance {
    /// Both the account and the security name are present.
    pub fn is_valid(&self) -> bool {
        !self.account.is_empty() && !self.full_name.is_empty()
    }

    pub fn current_value(&self) -> f64 {
        self.amount * self.closing_price
    }

    /// Ticker before the first `" - "`. `None` when the name has no separator.
    pub fn symbol(&self) -> Option<&str> {
        self.full_name.split_once(NAME_SEPARATOR).map(|(symbol, _)| symbol)
    }

    /// Security name after the first `" - "`. `None` when the name has no separator.
    pub fn name(&self) -> Option<&str> {
        self.full_name.split_once(NAME_SEPARATOR).map(|(_, name)| name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareBalances {
    #[serde(rename = "summaryValue", default, deserialize_with = "null_default")]
    pub total: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub data: Vec<ShareBalance>,
}

impl ShareBalances {
    /// Drop holdings missing an account or security name, keeping order.
    pub fn retain_valid(&mut self) {
        self.data.retain(ShareBalance::is_valid);
    }
}
