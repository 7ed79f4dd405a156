use serde::{Deserialize, Serialize};

use namereg_core::{DomainInfo, Receipt, SeasonId};

/// Outcome of a committed mutation.
///
/// `message` is the human-readable success text; the optional fields carry
/// whatever the operation produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcReceipt {
    pub message: String,
    pub season_id: Option<SeasonId>,
    pub domain: Option<String>,
    /// Hex execution unit reference for newly created domains.
    pub execution_unit: Option<String>,
    pub fee_e8s: Option<u64>,
    pub expiration_time: Option<u64>,
}

impl From<Receipt> for RpcReceipt {
    fn from(receipt: Receipt) -> Self {
        let mut out = RpcReceipt {
            message: receipt.to_string(),
            season_id: None,
            domain: None,
            execution_unit: None,
            fee_e8s: None,
            expiration_time: None,
        };
        match receipt {
            Receipt::SeasonCreated { season_id } => out.season_id = Some(season_id),
            Receipt::Registered { domain, execution_unit, fee_e8s } => {
                out.domain = Some(domain);
                out.execution_unit = Some(execution_unit.to_hex());
                out.fee_e8s = Some(fee_e8s);
            }
            Receipt::CreatedForAddress { domain, execution_unit, .. }
            | Receipt::Gifted { domain, execution_unit, .. } => {
                out.domain = Some(domain);
                out.execution_unit = Some(execution_unit.to_hex());
            }
            Receipt::Renewed { domain, expiration_time, fee_e8s } => {
                out.domain = Some(domain);
                out.expiration_time = Some(expiration_time);
                out.fee_e8s = Some(fee_e8s);
            }
            Receipt::Applied => {}
        }
        out
    }
}

/// One entry of the registration-time index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTimestampedDomain {
    pub domain_name: String,
    pub registration_time: u64,
    pub info: DomainInfo,
}

/// Node-level summary returned by `registry_getRegistryInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRegistryInfo {
    pub version: String,
    pub endpoint_base: String,
    pub domain_count: u64,
    pub current_season: Option<SeasonId>,
    /// Node clock, nanoseconds since the Unix epoch.
    pub now: u64,
}
