use std::sync::Arc;

use namereg_core::constants::ONE_YEAR_NANOS;
use namereg_core::error::RegistryError;
use namereg_core::{
    letter_count, validate_domain_name, validate_endpoint, AdminCreateDomainRequest,
    AdminGiftRequest, Caller, Command, CreateSeasonRequest, DomainRecord, E8s, Principal,
    Receipt, RegistrationMode, RegistrationRequest, Role, Season, SeasonId, SeasonStatus,
    Timestamp,
};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::db::{
    encode_meta, StagedMutations, StateDb, META_BASE_FEE, META_LAST_STAMP, META_SHORT_NAME_MODE,
};
use crate::identity::IdentityAuthority;
use crate::ledger::DomainLedger;
use crate::provision::{DerivedProvisioner, ExecutionUnitProvisioner};
use crate::seasons::SeasonManager;

// ── New-domain plan ───────────────────────────────────────────────────────────

/// Inputs shared by the three creation paths.
struct NewDomain {
    name: String,
    owner: Principal,
    owner_role: Role,
    administrator: Principal,
    operator: Principal,
    payment_block: u64,
    was_gifted: bool,
    authorizing_address: Option<String>,
    /// Self-service registrations must fit the season's length bounds.
    enforce_length: bool,
}

// ── RegistryEngine ────────────────────────────────────────────────────────────

/// The registry façade: the only path through which state changes.
///
/// Mutating methods take `&mut self`; the node owns a single engine and feeds
/// it from one queue, so two mutations never run concurrently. Each call
/// stages its writes and commits them in one transaction, or returns an
/// error having written nothing.
pub struct RegistryEngine {
    db: Arc<StateDb>,
    clock: Arc<dyn Clock>,
    provisioner: Arc<dyn ExecutionUnitProvisioner>,
}

impl RegistryEngine {
    pub fn new(db: Arc<StateDb>) -> Self {
        Self {
            db,
            clock: Arc::new(SystemClock),
            provisioner: Arc::new(DerivedProvisioner),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_provisioner(mut self, provisioner: Arc<dyn ExecutionUnitProvisioner>) -> Self {
        self.provisioner = provisioner;
        self
    }

    pub fn db(&self) -> &Arc<StateDb> {
        &self.db
    }

    /// Dispatch a [`Command`] on behalf of `caller`.
    pub fn execute(&mut self, caller: Principal, command: Command) -> Result<Receipt, RegistryError> {
        match command {
            Command::CreateSeason(req) => self
                .create_season(caller, &req)
                .map(|season_id| Receipt::SeasonCreated { season_id }),
            Command::DeactivateSeason { season_id } => {
                self.deactivate_season(caller, season_id).map(|_| Receipt::Applied)
            }
            Command::AddAllowedAddress { season_id, address } => self
                .add_allowed_address(caller, season_id, &address)
                .map(|_| Receipt::Applied),
            Command::Register(req) => self.register(caller, req),
            Command::AdminCreateWithAddress(req) => self.admin_create_with_address(caller, req),
            Command::AdminGift(req) => self.admin_gift(caller, req),
            Command::Transfer { domain_name, new_owner } => self
                .transfer(caller, &domain_name, new_owner)
                .map(|_| Receipt::Applied),
            Command::Renew { domain_name, payment_block } => {
                self.renew(caller, &domain_name, payment_block)
            }
            Command::SetCustomEndpoint { domain_name, endpoint } => self
                .set_custom_mcp_endpoint(caller, &domain_name, endpoint)
                .map(|_| Receipt::Applied),
            Command::AddAdmin(p) => self.add_admin(caller, p).map(|_| Receipt::Applied),
            Command::RemoveAdmin(p) => self.remove_admin(caller, p).map(|_| Receipt::Applied),
            Command::AddReservedName(name) => {
                self.add_reserved_name(caller, &name).map(|_| Receipt::Applied)
            }
            Command::ApproveShortNameUser(p) => {
                self.approve_short_name_user(caller, p).map(|_| Receipt::Applied)
            }
            Command::RevokeShortNameUser(p) => {
                self.revoke_short_name_approval(caller, p).map(|_| Receipt::Applied)
            }
            Command::SetShortNameMode(mode) => {
                self.set_short_name_mode(caller, mode).map(|_| Receipt::Applied)
            }
            Command::SetBaseFee(fee) => self.set_base_fee(caller, fee).map(|_| Receipt::Applied),
        }
    }

    // ── Seasons ──────────────────────────────────────────────────────────────

    pub fn create_season(
        &mut self,
        caller: Principal,
        req: &CreateSeasonRequest,
    ) -> Result<SeasonId, RegistryError> {
        let caller = self.identity().require_admin(caller, "create registration seasons")?;
        let mut staged = StagedMutations::default();
        let season_id = self
            .seasons()
            .create(req, caller.principal, self.clock.now(), &mut staged)?;
        self.commit(&staged)?;
        info!(
            season_id,
            min_letters = req.min_letters,
            max_letters = ?req.max_letters,
            total_allowed = req.total_allowed,
            price_icp = req.price_icp,
            "season created"
        );
        Ok(season_id)
    }

    pub fn deactivate_season(&mut self, caller: Principal, season_id: SeasonId) -> Result<(), RegistryError> {
        self.identity().require_admin(caller, "deactivate seasons")?;
        let mut staged = StagedMutations::default();
        self.seasons().deactivate(season_id, &mut staged)?;
        self.commit(&staged)?;
        info!(season_id, "season deactivated");
        Ok(())
    }

    pub fn add_allowed_address(
        &mut self,
        caller: Principal,
        season_id: SeasonId,
        address: &str,
    ) -> Result<(), RegistryError> {
        self.identity().require_admin(caller, "add addresses to seasons")?;
        let mut staged = StagedMutations::default();
        self.seasons().add_allowed_address(season_id, address, &mut staged)?;
        if staged.is_empty() {
            debug!(season_id, address, "address already allow-listed");
            return Ok(());
        }
        self.commit(&staged)?;
        info!(season_id, address, "address allow-listed");
        Ok(())
    }

    // ── Domain creation ──────────────────────────────────────────────────────

    /// Self-service registration; the caller becomes the owner.
    /// Administrators register without a fee but still consume a slot.
    pub fn register(&mut self, caller: Principal, req: RegistrationRequest) -> Result<Receipt, RegistryError> {
        let caller = self.identity().resolve(caller)?;
        let (record, season) = self.create_domain(
            &caller,
            NewDomain {
                name: req.domain_name,
                owner: caller.principal,
                owner_role: caller.role,
                administrator: req.administrator,
                operator: req.operator,
                payment_block: req.payment_block,
                was_gifted: false,
                authorizing_address: None,
                enforce_length: true,
            },
        )?;
        let fee_e8s = if caller.is_admin() { 0 } else { season.registration_fee_e8s() };
        info!(
            domain = %record.domain_name,
            owner = %record.owner,
            season_id = season.season_id,
            names_taken = season.names_taken,
            fee_e8s,
            "domain registered"
        );
        Ok(Receipt::Registered {
            domain: record.domain_name,
            execution_unit: record.execution_unit,
            fee_e8s,
        })
    }

    /// Admin creation for a recipient pre-authorized by an allow-listed
    /// address of the active season.
    pub fn admin_create_with_address(
        &mut self,
        caller: Principal,
        req: AdminCreateDomainRequest,
    ) -> Result<Receipt, RegistryError> {
        let caller = self.identity().require_admin(caller, "create domains for addresses")?;
        let active = self.seasons().require_active()?;
        if !self.db.season_has_address(active.season_id, &req.recipient_address)? {
            return Err(RegistryError::AddressNotAuthorized(req.recipient_address));
        }
        let owner_role = self.identity().role_of(&req.recipient)?;
        let (record, season) = self.create_domain(
            &caller,
            NewDomain {
                name: req.domain_name,
                owner: req.recipient,
                owner_role,
                administrator: req.administrator,
                operator: req.operator,
                payment_block: 0,
                was_gifted: false,
                authorizing_address: Some(req.recipient_address.clone()),
                enforce_length: false,
            },
        )?;
        info!(
            domain = %record.domain_name,
            owner = %record.owner,
            address = %req.recipient_address,
            season_id = season.season_id,
            names_taken = season.names_taken,
            "domain created for address"
        );
        Ok(Receipt::CreatedForAddress {
            domain: record.domain_name,
            address: req.recipient_address,
            execution_unit: record.execution_unit,
        })
    }

    /// Admin gift: no address or payment checks, still one slot.
    pub fn admin_gift(&mut self, caller: Principal, req: AdminGiftRequest) -> Result<Receipt, RegistryError> {
        let caller = self.identity().require_admin(caller, "gift domains")?;
        let owner_role = self.identity().role_of(&req.recipient)?;
        let (record, season) = self.create_domain(
            &caller,
            NewDomain {
                name: req.domain_name,
                owner: req.recipient,
                owner_role,
                administrator: req.administrator,
                operator: req.operator,
                payment_block: 0,
                was_gifted: true,
                authorizing_address: None,
                enforce_length: false,
            },
        )?;
        info!(
            domain = %record.domain_name,
            recipient = %record.owner,
            season_id = season.season_id,
            names_taken = season.names_taken,
            "domain gifted"
        );
        Ok(Receipt::Gifted {
            domain: record.domain_name,
            recipient: record.owner,
            execution_unit: record.execution_unit,
        })
    }

    /// Shared creation path. Checks run in a fixed order and nothing is
    /// written until the final commit; the provisioner is called last.
    fn create_domain(
        &mut self,
        caller: &Caller,
        new: NewDomain,
    ) -> Result<(DomainRecord, Season), RegistryError> {
        let ledger = self.ledger();
        let seasons = self.seasons();

        ledger.check_available(&new.name)?;
        if !self.identity().may_take_short_name(&new.name, caller)? {
            return Err(RegistryError::ShortNameRestricted(new.name));
        }

        let active = seasons.require_active()?;
        let letters = letter_count(&new.name);
        if new.enforce_length && !active.admits_letters(letters) {
            return Err(RegistryError::InvalidName(format!(
                "{}: {} letters is outside season {} bounds ({}..={})",
                new.name,
                letters,
                active.season_id,
                active.min_letters,
                active.max_letters.map_or_else(|| "∞".to_string(), |m| m.to_string()),
            )));
        }
        ledger.ensure_can_own(&new.owner, new.owner_role)?;

        let mut staged = StagedMutations::default();
        let season = seasons.reserve_slot(active.season_id, &mut staged)?;
        let registration_time = self.next_stamp(&mut staged)?;
        let execution_unit = self.provisioner.provision(&new.name, &new.owner)?;

        let record = DomainRecord {
            domain_name: new.name,
            owner: new.owner,
            administrator: new.administrator,
            operator: new.operator,
            execution_unit,
            registration_time,
            expiration_time: registration_time.saturating_add(ONE_YEAR_NANOS),
            last_payment_block: new.payment_block,
            custom_mcp_endpoint: None,
            was_gifted: new.was_gifted,
            season_id: season.season_id,
            authorizing_address: new.authorizing_address,
        };
        ledger.stage_insert(record.clone(), &mut staged);
        self.commit(&staged)?;

        if season.status == SeasonStatus::Completed {
            info!(season_id = season.season_id, total_allowed = season.total_allowed, "season completed");
        }
        Ok((record, season))
    }

    // ── Domain maintenance ───────────────────────────────────────────────────

    /// Move ownership. Allowed for the current owner or the record's
    /// administrator; consumes no season capacity.
    pub fn transfer(&mut self, caller: Principal, name: &str, new_owner: Principal) -> Result<(), RegistryError> {
        let ledger = self.ledger();
        let record = ledger.require(name)?;
        if !record.is_managed_by(&caller) {
            return Err(RegistryError::Unauthorized(format!(
                "only the owner or administrator of {name} can transfer it"
            )));
        }
        let new_owner_role = self.identity().role_of(&new_owner)?;
        ledger.ensure_can_own(&new_owner, new_owner_role)?;

        let mut staged = StagedMutations::default();
        let stamp = self.next_stamp(&mut staged)?;
        let previous = record.owner;
        ledger.stage_transfer(record, new_owner, stamp, &mut staged);
        self.commit(&staged)?;
        info!(domain = %name, from = %previous, to = %new_owner, "domain transferred");
        Ok(())
    }

    /// Extend a domain by one year. Administrators renew for free.
    pub fn renew(&mut self, caller: Principal, name: &str, payment_block: u64) -> Result<Receipt, RegistryError> {
        let caller = self.identity().resolve(caller)?;
        let ledger = self.ledger();
        let mut record = ledger.require(name)?;
        if !record.is_managed_by(&caller.principal) {
            return Err(RegistryError::Unauthorized(format!(
                "only the owner or administrator of {name} can renew it"
            )));
        }
        let fee_e8s = if caller.is_admin() { 0 } else { self.db.base_fee()? };
        record.expiration_time = record.expiration_time.saturating_add(ONE_YEAR_NANOS);
        record.last_payment_block = payment_block;
        let expiration_time = record.expiration_time;

        let mut staged = StagedMutations::default();
        ledger.stage_update(record, &mut staged);
        self.commit(&staged)?;
        info!(domain = %name, expiration_time, fee_e8s, "domain renewed");
        Ok(Receipt::Renewed {
            domain: name.to_string(),
            expiration_time,
            fee_e8s,
        })
    }

    /// Set or clear (`None`) the discovery endpoint override.
    pub fn set_custom_mcp_endpoint(
        &mut self,
        caller: Principal,
        name: &str,
        endpoint: Option<String>,
    ) -> Result<(), RegistryError> {
        let ledger = self.ledger();
        let mut record = ledger.require(name)?;
        if !record.is_managed_by(&caller) {
            return Err(RegistryError::Unauthorized(format!(
                "only the owner or administrator of {name} can change its endpoint"
            )));
        }
        if let Some(url) = &endpoint {
            validate_endpoint(url)?;
        }
        record.custom_mcp_endpoint = endpoint;

        let mut staged = StagedMutations::default();
        ledger.stage_update(record, &mut staged);
        self.commit(&staged)?;
        info!(domain = %name, "custom endpoint updated");
        Ok(())
    }

    // ── Registry policy ──────────────────────────────────────────────────────

    pub fn add_admin(&mut self, caller: Principal, new_admin: Principal) -> Result<(), RegistryError> {
        self.identity().require_admin(caller, "add other admins")?;
        if self.db.is_admin(&new_admin)? {
            return Ok(());
        }
        let mut staged = StagedMutations::default();
        staged.admins_added.push(new_admin);
        self.commit(&staged)?;
        info!(admin = %new_admin, "admin added");
        Ok(())
    }

    /// Refuses to empty the admin set. Domains held by the removed admin are
    /// kept.
    pub fn remove_admin(&mut self, caller: Principal, target: Principal) -> Result<(), RegistryError> {
        self.identity().require_admin(caller, "remove other admins")?;
        if !self.db.is_admin(&target)? {
            return Ok(());
        }
        if self.db.admin_count() <= 1 {
            return Err(RegistryError::LastAdmin);
        }
        let mut staged = StagedMutations::default();
        staged.admins_removed.push(target);
        self.commit(&staged)?;
        info!(admin = %target, "admin removed");
        Ok(())
    }

    pub fn add_reserved_name(&mut self, caller: Principal, name: &str) -> Result<(), RegistryError> {
        self.identity().require_admin(caller, "add reserved names")?;
        validate_domain_name(name)?;
        let mut staged = StagedMutations::default();
        staged.reserved_added.push(name.to_string());
        self.commit(&staged)?;
        info!(name, "name reserved");
        Ok(())
    }

    pub fn approve_short_name_user(&mut self, caller: Principal, user: Principal) -> Result<(), RegistryError> {
        self.identity().require_admin(caller, "approve users for short names")?;
        let mut staged = StagedMutations::default();
        staged.short_users_added.push(user);
        self.commit(&staged)?;
        info!(user = %user, "short-name approval granted");
        Ok(())
    }

    pub fn revoke_short_name_approval(&mut self, caller: Principal, user: Principal) -> Result<(), RegistryError> {
        self.identity().require_admin(caller, "revoke short name approvals")?;
        let mut staged = StagedMutations::default();
        staged.short_users_removed.push(user);
        self.commit(&staged)?;
        info!(user = %user, "short-name approval revoked");
        Ok(())
    }

    pub fn set_short_name_mode(&mut self, caller: Principal, mode: RegistrationMode) -> Result<(), RegistryError> {
        self.identity().require_admin(caller, "change short name mode")?;
        let mut staged = StagedMutations::default();
        staged.meta.push((META_SHORT_NAME_MODE, encode_meta(&mode)?));
        self.commit(&staged)?;
        info!(?mode, "short-name mode set");
        Ok(())
    }

    pub fn set_base_fee(&mut self, caller: Principal, fee_e8s: E8s) -> Result<(), RegistryError> {
        self.identity().require_admin(caller, "set fees")?;
        let mut staged = StagedMutations::default();
        staged.set_meta_u64(META_BASE_FEE, fee_e8s);
        self.commit(&staged)?;
        info!(fee_e8s, "renewal base fee set");
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn identity(&self) -> IdentityAuthority<'_> {
        IdentityAuthority::new(&self.db)
    }

    fn seasons(&self) -> SeasonManager<'_> {
        SeasonManager::new(&self.db)
    }

    fn ledger(&self) -> DomainLedger<'_> {
        DomainLedger::new(&self.db)
    }

    /// Strictly increasing timestamp: `max(now, last + 1)`, persisted with
    /// the batch so registration order survives a restart or a clock step
    /// backwards.
    fn next_stamp(&self, staged: &mut StagedMutations) -> Result<Timestamp, RegistryError> {
        let last = self.db.last_stamp()?;
        let stamp = self.clock.now().max(last.saturating_add(1));
        staged.set_meta_u64(META_LAST_STAMP, stamp);
        Ok(stamp)
    }

    /// Re-check season invariants on the staged state, then commit.
    fn commit(&self, staged: &StagedMutations) -> Result<(), RegistryError> {
        let mut active = 0usize;
        for season in self.db.iter_seasons()? {
            let season = staged
                .seasons
                .iter()
                .find(|s| s.season_id == season.season_id)
                .unwrap_or(&season);
            if season.is_active() {
                active += 1;
            }
        }
        for season in &staged.seasons {
            season.check_invariants()?;
            if self.db.get_season(season.season_id)?.is_none() && season.is_active() {
                active += 1;
            }
        }
        if active > 1 {
            return Err(RegistryError::InvariantViolation(format!(
                "{active} seasons would be active"
            )));
        }
        self.db.commit(staged)
    }
}
