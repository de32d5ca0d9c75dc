use serde::{Deserialize, Serialize};

use super::null_default;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalIdentityResponse {
    #[serde(default, deserialize_with = "null_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_default")]
    pub identities: Vec<GlobalIdentity>,
}

/// Account and investor details for one login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalIdentity {
    #[serde(rename = "idLogin", default, deserialize_with = "null_default")]
    pub login_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_default")]
    pub phone: String,
    #[serde(rename = "fullName", default, deserialize_with = "null_default")]
    pub full_name: String,

    /// Single Investor Identification (SID).
    #[serde(rename = "investorId", default, deserialize_with = "null_default")]
    pub investor_id: String,
    #[serde(rename = "sidName", default, deserialize_with = "null_default")]
    pub investor_name: String,
    /// National ID number (NIK).
    #[serde(rename = "nikId", default, deserialize_with = "null_default")]
    pub citizen_id: String,
    #[serde(rename = "passportId", default, deserialize_with = "null_default")]
    pub passport_id: String,
    /// Tax number (NPWP).
    #[serde(rename = "npwp", default, deserialize_with = "null_default")]
    pub tax_id: String,
    /// KSEI card ID.
    #[serde(rename = "cardId", default, deserialize_with = "null_default")]
    pub card_id: String,
}

impl GlobalIdentity {
    pub fn display_name(&self) -> &str {
        if self.investor_name.is_empty() {
            &self.full_name
        } else {
            &self.investor_name
        }
    }
}
