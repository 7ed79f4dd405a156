use serde::{Deserialize, Serialize};

use crate::constants::MAX_ENDPOINT_LEN;
use crate::error::RegistryError;
use crate::season::SeasonId;
use crate::types::{ExecutionUnitId, Principal, Timestamp};

/// A registered name. Never deleted; `owner`, `expiration_time` and
/// `custom_mcp_endpoint` are the only fields that change after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub domain_name: String,
    pub owner: Principal,
    pub administrator: Principal,
    pub operator: Principal,
    pub execution_unit: ExecutionUnitId,
    pub registration_time: Timestamp,
    pub expiration_time: Timestamp,
    /// Opaque payment reference supplied with the latest registration or renewal.
    pub last_payment_block: u64,
    pub custom_mcp_endpoint: Option<String>,
    pub was_gifted: bool,
    pub season_id: SeasonId,
    /// Allow-list entry that authorized an admin-created record.
    pub authorizing_address: Option<String>,
}

impl DomainRecord {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expiration_time
    }

    pub fn status(&self, now: Timestamp) -> DomainStatus {
        if self.is_expired(now) {
            DomainStatus::Expired
        } else {
            DomainStatus::Active
        }
    }

    /// Discovery endpoint: the custom override if set, else `{base}/{name}`.
    pub fn endpoint(&self, base: &str) -> String {
        match &self.custom_mcp_endpoint {
            Some(url) => url.clone(),
            None => format!("{}/{}", base.trim_end_matches('/'), self.domain_name),
        }
    }

    /// Whether `who` may manage this record (transfer, renew, set endpoint).
    pub fn is_managed_by(&self, who: &Principal) -> bool {
        self.owner == *who || self.administrator == *who
    }

    pub fn info(&self, now: Timestamp, endpoint_base: &str) -> DomainInfo {
        DomainInfo {
            domain_name: self.domain_name.clone(),
            owner: self.owner,
            administrator: self.administrator,
            operator: self.operator,
            execution_unit: self.execution_unit,
            registration_time: self.registration_time,
            expiration_time: self.expiration_time,
            mcp_endpoint: self.endpoint(endpoint_base),
            was_gifted: self.was_gifted,
            season_id: self.season_id,
            status: self.status(now),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainStatus {
    Active,
    Expired,
}

/// Read-side view of a record with derived status and endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    pub domain_name: String,
    pub owner: Principal,
    pub administrator: Principal,
    pub operator: Principal,
    pub execution_unit: ExecutionUnitId,
    pub registration_time: Timestamp,
    pub expiration_time: Timestamp,
    pub mcp_endpoint: String,
    pub was_gifted: bool,
    pub season_id: SeasonId,
    pub status: DomainStatus,
}

/// Hit returned by `discover_domains`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub domain_name: String,
    pub owner: Principal,
    pub mcp_endpoint: String,
    pub expiration_time: Timestamp,
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// Self-service registration; the caller becomes the owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub domain_name: String,
    pub administrator: Principal,
    pub operator: Principal,
    pub payment_block: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminGiftRequest {
    pub domain_name: String,
    pub recipient: Principal,
    pub administrator: Principal,
    pub operator: Principal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCreateDomainRequest {
    pub domain_name: String,
    pub recipient: Principal,
    pub administrator: Principal,
    pub operator: Principal,
    pub recipient_address: String,
}

/// Syntax check for a custom discovery endpoint: a parseable `https` URL of at
/// most [`MAX_ENDPOINT_LEN`] bytes. Reachability is not checked.
pub fn validate_endpoint(endpoint: &str) -> Result<(), RegistryError> {
    if endpoint.len() > MAX_ENDPOINT_LEN {
        return Err(RegistryError::InvalidEndpoint(format!(
            "longer than {MAX_ENDPOINT_LEN} bytes"
        )));
    }
    let url = url::Url::parse(endpoint)
        .map_err(|e| RegistryError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
    if url.scheme() != "https" {
        return Err(RegistryError::InvalidEndpoint(format!(
            "{endpoint}: scheme must be https"
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(RegistryError::InvalidEndpoint(format!("{endpoint}: missing host")));
    }
    Ok(())
}
