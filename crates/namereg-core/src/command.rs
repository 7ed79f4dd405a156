use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{AdminCreateDomainRequest, AdminGiftRequest, RegistrationRequest};
use crate::name::RegistrationMode;
use crate::season::{CreateSeasonRequest, SeasonId};
use crate::types::{E8s, ExecutionUnitId, Principal, Timestamp};

/// A state-changing registry operation. Every variant is applied atomically
/// by the engine: it either commits completely or leaves state unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    // ── Seasons (admin) ──────────────────────────────────────────────────────
    CreateSeason(CreateSeasonRequest),
    DeactivateSeason { season_id: SeasonId },
    AddAllowedAddress { season_id: SeasonId, address: String },

    // ── Domains ──────────────────────────────────────────────────────────────
    Register(RegistrationRequest),
    AdminCreateWithAddress(AdminCreateDomainRequest),
    AdminGift(AdminGiftRequest),
    Transfer { domain_name: String, new_owner: Principal },
    Renew { domain_name: String, payment_block: u64 },
    SetCustomEndpoint { domain_name: String, endpoint: Option<String> },

    // ── Registry policy (admin) ──────────────────────────────────────────────
    AddAdmin(Principal),
    RemoveAdmin(Principal),
    AddReservedName(String),
    ApproveShortNameUser(Principal),
    RevokeShortNameUser(Principal),
    SetShortNameMode(RegistrationMode),
    SetBaseFee(E8s),
}

impl Command {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Command::CreateSeason(_) => "create_season",
            Command::DeactivateSeason { .. } => "deactivate_season",
            Command::AddAllowedAddress { .. } => "add_allowed_address",
            Command::Register(_) => "register",
            Command::AdminCreateWithAddress(_) => "admin_create_with_address",
            Command::AdminGift(_) => "admin_gift",
            Command::Transfer { .. } => "transfer",
            Command::Renew { .. } => "renew",
            Command::SetCustomEndpoint { .. } => "set_custom_mcp_endpoint",
            Command::AddAdmin(_) => "add_admin",
            Command::RemoveAdmin(_) => "remove_admin",
            Command::AddReservedName(_) => "add_reserved_name",
            Command::ApproveShortNameUser(_) => "approve_short_name_user",
            Command::RevokeShortNameUser(_) => "revoke_short_name_user",
            Command::SetShortNameMode(_) => "set_short_name_mode",
            Command::SetBaseFee(_) => "set_base_fee",
        }
    }
}

/// Success signal of a committed [`Command`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Receipt {
    SeasonCreated { season_id: SeasonId },
    Registered {
        domain: String,
        execution_unit: ExecutionUnitId,
        fee_e8s: E8s,
    },
    CreatedForAddress {
        domain: String,
        address: String,
        execution_unit: ExecutionUnitId,
    },
    Gifted {
        domain: String,
        recipient: Principal,
        execution_unit: ExecutionUnitId,
    },
    Renewed {
        domain: String,
        expiration_time: Timestamp,
        fee_e8s: E8s,
    },
    Applied,
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Receipt::SeasonCreated { season_id } => write!(f, "Ok: season {season_id} created"),
            Receipt::Registered { domain, execution_unit, .. } => write!(
                f,
                "Domain '{domain}' registered successfully with execution unit {execution_unit}"
            ),
            Receipt::CreatedForAddress { domain, address, .. } => {
                write!(f, "Domain '{domain}' created for address '{address}'")
            }
            Receipt::Gifted { domain, recipient, .. } => {
                write!(f, "Domain '{domain}' gifted to {recipient}")
            }
            Receipt::Renewed { domain, expiration_time, .. } => {
                write!(f, "Domain '{domain}' renewed until {expiration_time}")
            }
            Receipt::Applied => f.write_str("Ok"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipts_carry_success_strings() {
        let unit = ExecutionUnitId([1u8; 32]);
        assert!(Receipt::SeasonCreated { season_id: 1 }.to_string().starts_with("Ok"));
        assert!(Receipt::Registered { domain: "abcde".into(), execution_unit: unit, fee_e8s: 0 }
            .to_string()
            .contains("successfully"));
        assert!(Receipt::CreatedForAddress {
            domain: "abcde".into(),
            address: "addr-1".into(),
            execution_unit: unit,
        }
        .to_string()
        .contains("created for address"));
        assert!(Receipt::Gifted {
            domain: "abcde".into(),
            recipient: Principal::anonymous(),
            execution_unit: unit,
        }
        .to_string()
        .contains("gifted"));
        assert_eq!(Receipt::Applied.to_string(), "Ok");
    }

    #[test]
    fn commands_cross_the_wire_as_json() {
        let cmd = Command::Transfer {
            domain_name: "user1domain".into(),
            new_owner: Principal::derive(b"u6"),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
        assert_eq!(back.label(), "transfer");
    }
}
