//! Static reference tables: mutual fund products and custodian banks.
//!
//! Tables are built once into an immutable [`ReferenceData`] value and passed
//! by reference; there is no global state.
//!
//! The embedded tables are only a seed: one mutual fund and no custodian
//! banks beyond the static `JAGO` entry. They are not the full KSEI product
//! and bank lists. Load those from a JSON file with the same layout
//! (`Config::reference_file` or the CLI's `--reference`); unknown codes
//! resolve to `None`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Seed tables compiled into the crate.
const EMBEDDED_REFERENCE: &str = include_str!("../../data/reference.json");

/// Banks that are always known even when a loaded table omits them.
const STATIC_CUSTODIAN_BANKS: &[(&str, &str)] = &[("JAGO", "PT Bank Jago Tbk")];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutualFund {
    pub code: String,
    pub product_name: String,
    pub fund_type: String,
    pub investment_manager: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodianBank {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Default)]
struct ReferenceFile {
    #[serde(default)]
    version: String,
    #[serde(default)]
    mutual_funds: Vec<MutualFund>,
    #[serde(default)]
    custodian_banks: Vec<CustodianBank>,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    mutual_funds: HashMap<String, MutualFund>,
    /// Keyed by bank code with any trailing digits removed.
    custodian_banks: HashMap<String, CustodianBank>,
}

impl ReferenceData {
    /// Tables embedded in the crate.
    pub fn embedded() -> Result<Self> {
        Self::from_json_str(EMBEDDED_REFERENCE).context("Failed to parse embedded reference data")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference data: {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("Failed to parse reference data: {}", path.display()))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ReferenceFile = serde_json::from_str(json)?;
        let data = Self::from_tables(file.mutual_funds, file.custodian_banks);
        debug!(
            version = %file.version,
            mutual_funds = data.mutual_funds.len(),
            custodian_banks = data.custodian_banks.len(),
            "Loaded reference data"
        );
        Ok(data)
    }

    pub fn from_tables(mutual_funds: Vec<MutualFund>, custodian_banks: Vec<CustodianBank>) -> Self {
        let mutual_funds = mutual_funds
            .into_iter()
            .map(|fund| (fund.code.clone(), fund))
            .collect();

        let mut banks = HashMap::new();
        for (code, name) in STATIC_CUSTODIAN_BANKS {
            banks.insert(
                code.to_string(),
                CustodianBank {
                    code: code.to_string(),
                    name: name.to_string(),
                },
            );
        }
        // Loaded rows win over the static entries
        for bank in custodian_banks {
            banks.insert(strip_number_suffix(&bank.code).to_string(), bank);
        }

        Self {
            mutual_funds,
            custodian_banks: banks,
        }
    }

    pub fn mutual_fund_by_code(&self, code: &str) -> Option<&MutualFund> {
        self.mutual_funds.get(code)
    }

    /// All mutual funds sorted by code.
    pub fn mutual_funds(&self) -> Vec<&MutualFund> {
        let mut funds: Vec<_> = self.mutual_funds.values().collect();
        funds.sort_by(|a, b| a.code.cmp(&b.code));
        funds
    }

    /// Bank for a code such as `BCA01`; trailing digits are ignored.
    pub fn custodian_bank_by_code(&self, code: &str) -> Option<&CustodianBank> {
        self.custodian_banks.get(strip_number_suffix(code))
    }

    pub fn custodian_bank_name_by_code(&self, code: &str) -> Option<&str> {
        self.custodian_bank_by_code(code).map(|bank| bank.name.as_str())
    }

    /// All custodian banks sorted by code.
    pub fn custodian_banks(&self) -> Vec<&CustodianBank> {
        let mut banks: Vec<_> = self.custodian_banks.values().collect();
        banks.sort_by(|a, b| a.code.cmp(&b.code));
        banks
    }
}

fn strip_number_suffix(code: &str) -> &str {
    code.trim_end_matches(|c: char| c.is_ascii_digit())
}
