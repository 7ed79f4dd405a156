use std::sync::Arc;

use namereg_core::error::RegistryError;
use namereg_core::{
    DomainInfo, DomainRecord, Principal, RegistrationMode, SearchResult, Season, SeasonId,
    SeasonStats, Timestamp,
};

use crate::db::StateDb;
use crate::identity::IdentityAuthority;
use crate::ledger::DomainLedger;
use crate::seasons::SeasonManager;
use crate::temporal::TemporalIndex;

/// Read-only view of the registry, safe to share across request handlers.
///
/// Every method holds the database read guard for its whole duration, so a
/// query never observes half of a commit. Methods that report domain status
/// take `now` explicitly.
#[derive(Clone)]
pub struct RegistryQuery {
    db: Arc<StateDb>,
}

impl RegistryQuery {
    pub fn new(db: Arc<StateDb>) -> Self {
        Self { db }
    }

    // ── Domains ──────────────────────────────────────────────────────────────

    pub fn get_domain(&self, name: &str) -> Result<Option<DomainRecord>, RegistryError> {
        let _guard = self.db.read_guard();
        DomainLedger::new(&self.db).get(name)
    }

    pub fn get_domain_info(&self, name: &str, now: Timestamp) -> Result<Option<DomainInfo>, RegistryError> {
        let _guard = self.db.read_guard();
        let base = self.db.endpoint_base()?;
        Ok(DomainLedger::new(&self.db).get(name)?.map(|r| r.info(now, &base)))
    }

    pub fn get_mcp_endpoint(&self, name: &str) -> Result<Option<String>, RegistryError> {
        let _guard = self.db.read_guard();
        let base = self.db.endpoint_base()?;
        Ok(DomainLedger::new(&self.db).get(name)?.map(|r| r.endpoint(&base)))
    }

    /// All domains, or only those owned by `owner`, in name order.
    pub fn list_domains(&self, owner: Option<&Principal>, now: Timestamp) -> Result<Vec<DomainInfo>, RegistryError> {
        let _guard = self.db.read_guard();
        let base = self.db.endpoint_base()?;
        Ok(DomainLedger::new(&self.db)
            .list(owner)?
            .iter()
            .map(|r| r.info(now, &base))
            .collect())
    }

    /// Case-insensitive substring search over unexpired names. An empty query
    /// matches everything.
    pub fn discover_domains(&self, query: &str, now: Timestamp) -> Result<Vec<SearchResult>, RegistryError> {
        let _guard = self.db.read_guard();
        let base = self.db.endpoint_base()?;
        let needle = query.to_lowercase();
        Ok(DomainLedger::new(&self.db)
            .list(None)?
            .into_iter()
            .filter(|r| !r.is_expired(now) && r.domain_name.to_lowercase().contains(&needle))
            .map(|r| SearchResult {
                mcp_endpoint: r.endpoint(&base),
                domain_name: r.domain_name,
                owner: r.owner,
                expiration_time: r.expiration_time,
            })
            .collect())
    }

    /// `(name, registration_time, info)` for every record, in creation order.
    pub fn get_all_domains_with_timestamps(
        &self,
        now: Timestamp,
    ) -> Result<Vec<(String, Timestamp, DomainInfo)>, RegistryError> {
        let _guard = self.db.read_guard();
        let base = self.db.endpoint_base()?;
        Ok(TemporalIndex::new(&self.db)
            .all()?
            .into_iter()
            .map(|r| {
                let info = r.info(now, &base);
                (r.domain_name, r.registration_time, info)
            })
            .collect())
    }

    /// Records registered at or after `since`, ascending by registration time.
    pub fn get_domains_since_timestamp(
        &self,
        since: Timestamp,
        now: Timestamp,
    ) -> Result<Vec<(String, DomainInfo)>, RegistryError> {
        let _guard = self.db.read_guard();
        let base = self.db.endpoint_base()?;
        Ok(TemporalIndex::new(&self.db)
            .since(since)?
            .into_iter()
            .map(|r| {
                let info = r.info(now, &base);
                (r.domain_name, info)
            })
            .collect())
    }

    pub fn get_wallet_domain(&self, owner: &Principal) -> Result<Option<String>, RegistryError> {
        let _guard = self.db.read_guard();
        DomainLedger::new(&self.db).wallet_domain(owner)
    }

    pub fn get_wallet_domains(&self, owner: &Principal) -> Result<Vec<String>, RegistryError> {
        let _guard = self.db.read_guard();
        DomainLedger::new(&self.db).wallet_domains(owner)
    }

    // ── Fees and eligibility ─────────────────────────────────────────────────

    /// Fee in e8s for registering `name` now; 0 when it cannot be registered
    /// under any active season.
    pub fn get_registration_fee(&self, name: &str) -> Result<u64, RegistryError> {
        let _guard = self.db.read_guard();
        match DomainLedger::new(&self.db).check_available(name) {
            Ok(()) => {}
            Err(e) if e.is_internal() => return Err(e),
            Err(_) => return Ok(0),
        }
        Ok(SeasonManager::new(&self.db)
            .applicable_season(name)?
            .map_or(0, |s| s.registration_fee_e8s()))
    }

    pub fn get_renewal_fee(&self) -> Result<u64, RegistryError> {
        self.db.base_fee()
    }

    /// Name valid, not reserved, not taken, and the short-name rule admits
    /// `user`. Season capacity is not considered.
    pub fn can_register_domain(&self, name: &str, user: &Principal) -> Result<bool, RegistryError> {
        let _guard = self.db.read_guard();
        match DomainLedger::new(&self.db).check_available(name) {
            Ok(()) => {}
            Err(e) if e.is_internal() => return Err(e),
            Err(_) => return Ok(false),
        }
        let identity = IdentityAuthority::new(&self.db);
        let caller = identity.resolve(*user)?;
        identity.may_take_short_name(name, &caller)
    }

    // ── Seasons ──────────────────────────────────────────────────────────────

    pub fn get_registration_season(&self, id: SeasonId) -> Result<Option<Season>, RegistryError> {
        self.db.get_season(id)
    }

    pub fn get_current_season(&self) -> Result<Option<Season>, RegistryError> {
        let _guard = self.db.read_guard();
        SeasonManager::new(&self.db).current_active_season()
    }

    pub fn get_active_seasons(&self) -> Result<Vec<Season>, RegistryError> {
        let _guard = self.db.read_guard();
        SeasonManager::new(&self.db).active_seasons()
    }

    pub fn get_all_seasons(&self) -> Result<Vec<Season>, RegistryError> {
        let _guard = self.db.read_guard();
        SeasonManager::new(&self.db).all_seasons()
    }

    pub fn get_season_by_number(&self, n: u64) -> Result<Option<Season>, RegistryError> {
        SeasonManager::new(&self.db).season_by_number(n)
    }

    pub fn get_applicable_season_for_domain(&self, name: &str) -> Result<Option<Season>, RegistryError> {
        let _guard = self.db.read_guard();
        SeasonManager::new(&self.db).applicable_season(name)
    }

    pub fn get_season_stats(&self, id: SeasonId) -> Result<Option<SeasonStats>, RegistryError> {
        Ok(self.db.get_season(id)?.map(|s| s.stats()))
    }

    /// `0` means the latest season.
    pub fn get_season_stats_by_number(&self, n: u64) -> Result<Option<SeasonStats>, RegistryError> {
        Ok(self.get_season_by_number(n)?.map(|s| s.stats()))
    }

    pub fn get_all_season_stats(&self) -> Result<Vec<SeasonStats>, RegistryError> {
        Ok(self.get_all_seasons()?.iter().map(Season::stats).collect())
    }

    pub fn get_season_addresses(&self, id: SeasonId) -> Result<Vec<String>, RegistryError> {
        let _guard = self.db.read_guard();
        self.db.season_addresses(id)
    }

    pub fn is_address_authorized_for_current_season(&self, address: &str) -> Result<bool, RegistryError> {
        let _guard = self.db.read_guard();
        SeasonManager::new(&self.db).is_address_authorized(address)
    }

    // ── Registry policy ──────────────────────────────────────────────────────

    pub fn get_admins(&self) -> Result<Vec<Principal>, RegistryError> {
        IdentityAuthority::new(&self.db).admins()
    }

    pub fn is_user_admin(&self, user: &Principal) -> Result<bool, RegistryError> {
        self.db.is_admin(user)
    }

    pub fn get_approved_short_users(&self) -> Result<Vec<Principal>, RegistryError> {
        self.db.short_name_users()
    }

    pub fn get_short_name_mode(&self) -> Result<RegistrationMode, RegistryError> {
        self.db.short_name_mode()
    }

    pub fn get_reserved_names(&self) -> Result<Vec<String>, RegistryError> {
        self.db.reserved_names()
    }

    pub fn endpoint_base(&self) -> Result<String, RegistryError> {
        self.db.endpoint_base()
    }

    pub fn domain_count(&self) -> Result<usize, RegistryError> {
        let _guard = self.db.read_guard();
        Ok(self.db.registrations_since(0)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StagedMutations;
    use namereg_core::{
        CreateSeasonRequest, DomainStatus, ExecutionUnitId, DEFAULT_ENDPOINT_BASE, ONE_YEAR_NANOS,
    };

    fn temp_query(name: &str) -> RegistryQuery {
        let dir = std::env::temp_dir().join(format!("namereg_query_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        RegistryQuery::new(Arc::new(StateDb::open(&dir).expect("open temp db")))
    }

    fn record(name: &str, owner: Principal, ts: u64) -> DomainRecord {
        DomainRecord {
            domain_name: name.into(),
            owner,
            administrator: owner,
            operator: owner,
            execution_unit: ExecutionUnitId([7u8; 32]),
            registration_time: ts,
            expiration_time: ts + ONE_YEAR_NANOS,
            last_payment_block: 0,
            custom_mcp_endpoint: None,
            was_gifted: false,
            season_id: 1,
            authorizing_address: None,
        }
    }

    fn seed(q: &RegistryQuery, records: &[DomainRecord]) {
        let mut staged = StagedMutations::default();
        let ledger = DomainLedger::new(&q.db);
        for r in records {
            ledger.stage_insert(r.clone(), &mut staged);
        }
        staged.reserved_added.push("admin".into());
        q.db.commit(&staged).unwrap();
    }

    fn open_season(q: &RegistryQuery, price_icp: u64) {
        let mut staged = StagedMutations::default();
        let req = CreateSeasonRequest {
            min_letters: 4,
            max_letters: Some(10),
            total_allowed: 3,
            price_icp,
        };
        SeasonManager::new(&q.db)
            .create(&req, Principal::anonymous(), 1, &mut staged)
            .unwrap();
        q.db.commit(&staged).unwrap();
    }

    #[test]
    fn discovery_is_case_insensitive_and_skips_expired() {
        let q = temp_query("discover");
        let owner = Principal::derive(b"owner");
        seed(
            &q,
            &[
                record("WeatherBot", owner, 100),
                record("weathernow", owner, 200),
                record("newsfeed", owner, 300),
            ],
        );

        let hits = q.discover_domains("WEATHER", 150).unwrap();
        let names: Vec<_> = hits.iter().map(|h| h.domain_name.as_str()).collect();
        assert_eq!(names, vec!["WeatherBot", "weathernow"]);
        assert_eq!(hits[1].mcp_endpoint, format!("{DEFAULT_ENDPOINT_BASE}/weathernow"));

        // WeatherBot expired at 100 + one year; weathernow has not.
        let later = 150 + ONE_YEAR_NANOS;
        let hits = q.discover_domains("weather", later).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(q.discover_domains("", 150).unwrap().len(), 3);
    }

    #[test]
    fn timestamp_views_follow_creation_order() {
        let q = temp_query("timestamps");
        let owner = Principal::derive(b"owner");
        seed(&q, &[record("zzzlast", owner, 10), record("aaafirst", owner, 30)]);

        let all = q.get_all_domains_with_timestamps(40).unwrap();
        assert_eq!(all[0].0, "zzzlast");
        assert_eq!(all[0].1, 10);
        assert_eq!(all[1].2.status, DomainStatus::Active);

        let since = q.get_domains_since_timestamp(30, 40).unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].0, "aaafirst");
        assert_eq!(q.domain_count().unwrap(), 2);

        let listed = q.list_domains(Some(&owner), 40).unwrap();
        assert_eq!(listed[0].domain_name, "aaafirst");
        assert!(q.list_domains(Some(&Principal::derive(b"other")), 40).unwrap().is_empty());
    }

    #[test]
    fn registration_fee_needs_an_available_name_and_season() {
        let q = temp_query("fees");
        seed(&q, &[record("takenname", Principal::derive(b"owner"), 10)]);
        assert_eq!(q.get_registration_fee("freename").unwrap(), 0);

        open_season(&q, 3);
        assert_eq!(q.get_registration_fee("freename").unwrap(), 300_000_000);
        assert_eq!(q.get_registration_fee("takenname").unwrap(), 0);
        assert_eq!(q.get_registration_fee("admin").unwrap(), 0);
        assert_eq!(q.get_registration_fee("-bad-").unwrap(), 0);
        assert_eq!(q.get_registration_fee("waytoolongforseason").unwrap(), 0);
        assert_eq!(q.get_renewal_fee().unwrap(), 100_000_000);
    }

    #[test]
    fn can_register_applies_short_name_policy() {
        let q = temp_query("can_register");
        seed(&q, &[]);
        let user = Principal::derive(b"user");
        assert!(q.can_register_domain("longenough", &user).unwrap());
        assert!(!q.can_register_domain("abc", &user).unwrap());
        assert!(!q.can_register_domain("admin", &user).unwrap());

        let mut staged = StagedMutations::default();
        staged.short_users_added.push(user);
        q.db.commit(&staged).unwrap();
        assert!(q.can_register_domain("abc", &user).unwrap());
    }
}
