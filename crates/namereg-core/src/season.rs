use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{E8S_PER_ICP, SEASON_MAX_LETTERS};
use crate::error::RegistryError;
use crate::types::{Principal, Timestamp};

pub type SeasonId = u64;

/// Lifecycle state of a season. `Completed` and `Deactivated` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeasonStatus {
    Active,
    /// Every slot has been consumed.
    Completed,
    /// Closed early by an administrator.
    Deactivated,
}

impl fmt::Display for SeasonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SeasonStatus::Active => "active",
            SeasonStatus::Completed => "completed",
            SeasonStatus::Deactivated => "deactivated",
        };
        f.write_str(s)
    }
}

/// Admin-supplied configuration for a new season.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSeasonRequest {
    pub min_letters: u64,
    pub max_letters: Option<u64>,
    pub total_allowed: u64,
    pub price_icp: u64,
}

impl CreateSeasonRequest {
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.min_letters == 0 || self.min_letters > SEASON_MAX_LETTERS {
            return Err(RegistryError::InvalidSeasonConfig(format!(
                "min_letters must be between 1 and {SEASON_MAX_LETTERS}, got {}",
                self.min_letters
            )));
        }
        if let Some(max) = self.max_letters {
            if max < self.min_letters {
                return Err(RegistryError::InvalidSeasonConfig(format!(
                    "max_letters ({max}) must not be less than min_letters ({})",
                    self.min_letters
                )));
            }
            if max > SEASON_MAX_LETTERS {
                return Err(RegistryError::InvalidSeasonConfig(format!(
                    "max_letters must not exceed {SEASON_MAX_LETTERS}, got {max}"
                )));
            }
        }
        if self.total_allowed == 0 {
            return Err(RegistryError::InvalidSeasonConfig(
                "total_allowed must be greater than zero".into(),
            ));
        }
        if self.price_icp == 0 {
            return Err(RegistryError::InvalidSeasonConfig(
                "price_icp must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// A capacity-bounded enrollment window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub season_id: SeasonId,
    pub min_letters: u64,
    pub max_letters: Option<u64>,
    pub total_allowed: u64,
    pub names_taken: u64,
    pub price_icp: u64,
    pub created_by: Principal,
    pub created_at: Timestamp,
    pub status: SeasonStatus,
}

impl Season {
    pub fn new(
        season_id: SeasonId,
        req: &CreateSeasonRequest,
        created_by: Principal,
        created_at: Timestamp,
    ) -> Self {
        Self {
            season_id,
            min_letters: req.min_letters,
            max_letters: req.max_letters,
            total_allowed: req.total_allowed,
            names_taken: 0,
            price_icp: req.price_icp,
            created_by,
            created_at,
            status: SeasonStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SeasonStatus::Active
    }

    pub fn is_full(&self) -> bool {
        self.names_taken >= self.total_allowed
    }

    pub fn remaining(&self) -> u64 {
        self.total_allowed.saturating_sub(self.names_taken)
    }

    /// Whether a name with `letters` letters falls inside this season's bounds.
    pub fn admits_letters(&self, letters: u64) -> bool {
        letters >= self.min_letters && self.max_letters.map_or(true, |max| letters <= max)
    }

    pub fn registration_fee_e8s(&self) -> u64 {
        self.price_icp.saturating_mul(E8S_PER_ICP)
    }

    /// Consume one slot. Completes the season in the same step when the last
    /// slot is taken.
    pub fn reserve_slot(&mut self) -> Result<(), RegistryError> {
        if self.is_full() {
            return Err(RegistryError::SeasonFull {
                season_id: self.season_id,
                total_allowed: self.total_allowed,
            });
        }
        if !self.is_active() {
            return Err(RegistryError::SeasonNotActive {
                season_id: self.season_id,
                status: self.status,
                action: "register in",
            });
        }
        self.names_taken += 1;
        if self.names_taken == self.total_allowed {
            self.status = SeasonStatus::Completed;
        }
        Ok(())
    }

    pub fn stats(&self) -> SeasonStats {
        SeasonStats {
            season_number: self.season_id,
            names_available: self.total_allowed,
            names_taken: self.names_taken,
            price_icp: self.price_icp,
            status: self.status,
        }
    }

    /// Capacity invariants that must hold for every stored season.
    pub fn check_invariants(&self) -> Result<(), RegistryError> {
        if self.names_taken > self.total_allowed {
            return Err(RegistryError::InvariantViolation(format!(
                "season {} has {} names taken out of {}",
                self.season_id, self.names_taken, self.total_allowed
            )));
        }
        if self.is_full() && self.status != SeasonStatus::Completed {
            return Err(RegistryError::InvariantViolation(format!(
                "season {} is full but {}",
                self.season_id, self.status
            )));
        }
        Ok(())
    }
}

/// Capacity summary of one season. `names_available` is the season's total
/// capacity; subtract `names_taken` for what is left.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonStats {
    pub season_number: SeasonId,
    pub names_available: u64,
    pub names_taken: u64,
    pub price_icp: u64,
    pub status: SeasonStatus,
}
