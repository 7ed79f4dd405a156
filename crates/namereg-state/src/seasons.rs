use namereg_core::error::RegistryError;
use namereg_core::{
    letter_count, CreateSeasonRequest, Principal, Season, SeasonId, SeasonStatus, Timestamp,
};

use crate::db::{StagedMutations, StateDb, META_NEXT_SEASON_ID};

/// Owns the season sequence, capacity counters and allow-lists.
///
/// Reads go straight to the database; writes are staged into a
/// [`StagedMutations`] batch and only become visible when the engine commits.
pub struct SeasonManager<'a> {
    db: &'a StateDb,
}

impl<'a> SeasonManager<'a> {
    pub fn new(db: &'a StateDb) -> Self {
        Self { db }
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn current_active_season(&self) -> Result<Option<Season>, RegistryError> {
        Ok(self.db.iter_seasons()?.into_iter().rev().find(Season::is_active))
    }

    /// `0` means the most recently created season regardless of status.
    pub fn season_by_number(&self, n: u64) -> Result<Option<Season>, RegistryError> {
        if n == 0 {
            self.db.latest_season()
        } else {
            self.db.get_season(n)
        }
    }

    pub fn all_seasons(&self) -> Result<Vec<Season>, RegistryError> {
        self.db.iter_seasons()
    }

    pub fn active_seasons(&self) -> Result<Vec<Season>, RegistryError> {
        Ok(self.db.iter_seasons()?.into_iter().filter(Season::is_active).collect())
    }

    /// Active, non-full season whose length bounds admit `name`.
    pub fn applicable_season(&self, name: &str) -> Result<Option<Season>, RegistryError> {
        let letters = letter_count(name);
        Ok(self
            .active_seasons()?
            .into_iter()
            .filter(|s| !s.is_full() && s.admits_letters(letters))
            .min_by_key(|s| s.price_icp))
    }

    pub fn is_address_authorized(&self, address: &str) -> Result<bool, RegistryError> {
        match self.current_active_season()? {
            Some(season) => self.db.season_has_address(season.season_id, address),
            None => Ok(false),
        }
    }

    /// The season a new name would be allocated under.
    ///
    /// With no active season the error depends on why: if the latest season
    /// closed by filling up, callers see `SeasonFull`; otherwise
    /// `NoActiveSeason`.
    pub fn require_active(&self) -> Result<Season, RegistryError> {
        if let Some(season) = self.current_active_season()? {
            return Ok(season);
        }
        match self.db.latest_season()? {
            Some(latest) if latest.status == SeasonStatus::Completed => Err(RegistryError::SeasonFull {
                season_id: latest.season_id,
                total_allowed: latest.total_allowed,
            }),
            _ => Err(RegistryError::NoActiveSeason),
        }
    }

    // ── Staged writes ────────────────────────────────────────────────────────

    pub fn create(
        &self,
        req: &CreateSeasonRequest,
        created_by: Principal,
        now: Timestamp,
        staged: &mut StagedMutations,
    ) -> Result<SeasonId, RegistryError> {
        req.validate()?;
        if let Some(active) = self.current_active_season()? {
            return Err(RegistryError::SeasonConflict { active: active.season_id });
        }
        let season_id = self.db.next_season_id()?;
        staged.seasons.push(Season::new(season_id, req, created_by, now));
        staged.set_meta_u64(META_NEXT_SEASON_ID, season_id + 1);
        Ok(season_id)
    }

    pub fn deactivate(&self, season_id: SeasonId, staged: &mut StagedMutations) -> Result<(), RegistryError> {
        let mut season = self
            .db
            .get_season(season_id)?
            .ok_or(RegistryError::SeasonNotFound(season_id))?;
        if !season.is_active() {
            return Err(RegistryError::SeasonNotActive {
                season_id,
                status: season.status,
                action: "deactivate",
            });
        }
        season.status = SeasonStatus::Deactivated;
        staged.seasons.push(season);
        Ok(())
    }

    /// Idempotent: an address already on the list keeps its original position.
    pub fn add_allowed_address(
        &self,
        season_id: SeasonId,
        address: &str,
        staged: &mut StagedMutations,
    ) -> Result<(), RegistryError> {
        let season = self
            .db
            .get_season(season_id)?
            .ok_or(RegistryError::SeasonNotFound(season_id))?;
        if !season.is_active() {
            return Err(RegistryError::SeasonNotActive {
                season_id,
                status: season.status,
                action: "add address to",
            });
        }
        if self.db.season_has_address(season_id, address)? {
            return Ok(());
        }
        let ordinal = self.db.season_address_count(season_id);
        staged.season_addresses.push((season_id, address.to_string(), ordinal));
        Ok(())
    }

    /// The only capacity-consuming operation. Increments `names_taken` and
    /// completes the season in the same staged write when it fills up.
    pub fn reserve_slot(
        &self,
        season_id: SeasonId,
        staged: &mut StagedMutations,
    ) -> Result<Season, RegistryError> {
        if let Some(season) = staged.season_mut(season_id) {
            season.reserve_slot()?;
            season.check_invariants()?;
            return Ok(season.clone());
        }
        let mut season = self
            .db
            .get_season(season_id)?
            .ok_or(RegistryError::SeasonNotFound(season_id))?;
        season.reserve_slot()?;
        season.check_invariants()?;
        staged.seasons.push(season.clone());
        Ok(season)
    }
}
