use namereg_core::error::RegistryError;
use namereg_core::{Principal, RegistrationMode};
use serde::{Deserialize, Serialize};

/// Founding configuration for a fresh registry database.
///
/// Usually read from a JSON file passed to the node on first start.
/// Principals are written in base-58.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InitParams {
    /// Initial administrator set. Must not be empty.
    pub admins: Vec<Principal>,
    /// Reserved on top of the built-in defaults.
    #[serde(default)]
    pub reserved_names: Vec<String>,
    #[serde(default)]
    pub renewal_fee_e8s: Option<u64>,
    #[serde(default)]
    pub short_name_mode: Option<RegistrationMode>,
    /// Base URL for default MCP endpoints.
    #[serde(default)]
    pub endpoint_base: Option<String>,
}

impl InitParams {
    pub fn from_json(text: &str) -> Result<Self, RegistryError> {
        serde_json::from_str(text).map_err(|e| RegistryError::InvalidInitParams(e.to_string()))
    }
}
