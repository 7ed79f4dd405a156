use thiserror::Error;

use crate::season::{SeasonId, SeasonStatus};
use crate::types::Principal;

/// Coarse classification of a [`RegistryError`]. Callers branch on the kind;
/// the message text is for humans and for compatibility checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    SeasonConflict,
    SeasonNotActive,
    SeasonFull,
    NoActiveSeason,
    AddressNotAuthorized,
    AlreadyOwnsDomain,
    NotFound,
    Unauthorized,
    InvalidName,
    InvalidRequest,
    Internal,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    // ── Season errors ────────────────────────────────────────────────────────
    #[error("Cannot create new season: there is already an active season (season {active})")]
    SeasonConflict { active: SeasonId },

    #[error("Cannot {action} {status} season {season_id}")]
    SeasonNotActive {
        season_id: SeasonId,
        status: SeasonStatus,
        action: &'static str,
    },

    #[error("Season not found: {0}")]
    SeasonNotFound(SeasonId),

    #[error("Registration season is full (season {season_id}: {total_allowed} names taken)")]
    SeasonFull { season_id: SeasonId, total_allowed: u64 },

    #[error("No available registration season")]
    NoActiveSeason,

    #[error("invalid season configuration: {0}")]
    InvalidSeasonConfig(String),

    #[error("Address '{0}' is not authorized for the current season")]
    AddressNotAuthorized(String),

    // ── Domain errors ────────────────────────────────────────────────────────
    #[error("Wallet {identity} already owns domain: {domain}")]
    AlreadyOwnsDomain { identity: Principal, domain: String },

    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    #[error("Invalid domain name format: {0}")]
    InvalidName(String),

    #[error("Domain name is reserved: {0}")]
    ReservedName(String),

    #[error("Domain name is not available: {0}")]
    NameTaken(String),

    #[error("Short domain names require approval: {0}")]
    ShortNameRestricted(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    // ── Identity errors ──────────────────────────────────────────────────────
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),

    #[error("Cannot remove the last admin")]
    LastAdmin,

    // ── Initialization ───────────────────────────────────────────────────────
    #[error("invalid init params: {0}")]
    InvalidInitParams(String),

    #[error("registry is already initialized")]
    AlreadyInitialized,

    // ── External collaborators ───────────────────────────────────────────────
    #[error("execution unit provisioning failed: {0}")]
    Provisioning(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        use RegistryError::*;
        match self {
            SeasonConflict { .. } => ErrorKind::SeasonConflict,
            SeasonNotActive { .. } => ErrorKind::SeasonNotActive,
            SeasonFull { .. } => ErrorKind::SeasonFull,
            NoActiveSeason => ErrorKind::NoActiveSeason,
            AddressNotAuthorized(_) => ErrorKind::AddressNotAuthorized,
            AlreadyOwnsDomain { .. } => ErrorKind::AlreadyOwnsDomain,
            SeasonNotFound(_) | DomainNotFound(_) => ErrorKind::NotFound,
            Unauthorized(_) | ShortNameRestricted(_) => ErrorKind::Unauthorized,
            InvalidName(_) | ReservedName(_) | NameTaken(_) => ErrorKind::InvalidName,
            InvalidSeasonConfig(_)
            | InvalidEndpoint(_)
            | InvalidPrincipal(_)
            | LastAdmin
            | InvalidInitParams(_)
            | AlreadyInitialized => ErrorKind::InvalidRequest,
            Provisioning(_) | Serialization(_) | Storage(_) | InvariantViolation(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// True for failures that say nothing about the request itself.
    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_compatibility_strings() {
        let conflict = RegistryError::SeasonConflict { active: 1 }.to_string();
        assert!(conflict.contains("already an active season"));

        let closed = RegistryError::SeasonNotActive {
            season_id: 2,
            status: SeasonStatus::Completed,
            action: "add address to",
        }
        .to_string();
        assert!(closed.contains("Cannot add address to completed season"), "{closed}");

        let full = RegistryError::SeasonFull { season_id: 1, total_allowed: 4 }.to_string();
        assert!(full.contains("season is full"), "{full}");

        let owns = RegistryError::AlreadyOwnsDomain {
            identity: Principal::anonymous(),
            domain: "user1domain".into(),
        }
        .to_string();
        assert!(owns.contains("already owns domain"));

        let addr = RegistryError::AddressNotAuthorized("addr-1".into()).to_string();
        assert!(addr.contains("not authorized for the current season"));

        assert!(RegistryError::NoActiveSeason
            .to_string()
            .contains("No available registration season"));
    }

    #[test]
    fn kinds_group_related_variants() {
        assert_eq!(RegistryError::NameTaken("x".into()).kind(), ErrorKind::InvalidName);
        assert_eq!(RegistryError::SeasonNotFound(9).kind(), ErrorKind::NotFound);
        assert_eq!(
            RegistryError::ShortNameRestricted("ab".into()).kind(),
            ErrorKind::Unauthorized
        );
        assert!(RegistryError::Storage("io".into()).is_internal());
        assert!(!RegistryError::NoActiveSeason.is_internal());
    }
}
