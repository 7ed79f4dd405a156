use namereg_core::error::RegistryError;
use namereg_core::{validate_domain_name, DomainRecord, Principal, Role};

use crate::db::{StagedMutations, StateDb};

/// Name → record mapping plus the reverse wallet index.
pub struct DomainLedger<'a> {
    db: &'a StateDb,
}

impl<'a> DomainLedger<'a> {
    pub fn new(db: &'a StateDb) -> Self {
        Self { db }
    }

    pub fn get(&self, name: &str) -> Result<Option<DomainRecord>, RegistryError> {
        self.db.get_domain(name)
    }

    pub fn require(&self, name: &str) -> Result<DomainRecord, RegistryError> {
        self.db
            .get_domain(name)?
            .ok_or_else(|| RegistryError::DomainNotFound(name.to_string()))
    }

    pub fn exists(&self, name: &str) -> Result<bool, RegistryError> {
        self.db.domain_exists(name)
    }

    /// Name policy for a new record: well-formed, not reserved, never taken.
    /// Names are not reclaimed, so an expired record still blocks its name.
    pub fn check_available(&self, name: &str) -> Result<(), RegistryError> {
        validate_domain_name(name)?;
        if self.db.is_reserved(name)? {
            return Err(RegistryError::ReservedName(name.to_string()));
        }
        if self.db.domain_exists(name)? {
            return Err(RegistryError::NameTaken(name.to_string()));
        }
        Ok(())
    }

    /// Every name held by `owner`, in acquisition order.
    pub fn wallet_domains(&self, owner: &Principal) -> Result<Vec<String>, RegistryError> {
        Ok(self
            .db
            .wallet_entries(owner)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// The name held by `owner`. Administrators may hold several; the most
    /// recently acquired one is returned.
    pub fn wallet_domain(&self, owner: &Principal) -> Result<Option<String>, RegistryError> {
        Ok(self.wallet_domains(owner)?.pop())
    }

    pub fn list(&self, owner: Option<&Principal>) -> Result<Vec<DomainRecord>, RegistryError> {
        let all = self.db.iter_domains()?;
        Ok(match owner {
            Some(o) => all.into_iter().filter(|r| r.owner == *o).collect(),
            None => all,
        })
    }

    /// Enforce the one-domain-per-identity rule for a prospective owner.
    ///
    /// A wallet entry whose record is missing or owned by someone else means
    /// the index and the ledger disagree; that aborts as an invariant
    /// violation instead of being reported as a rule failure. A former
    /// administrator may still hold several names.
    pub fn ensure_can_own(&self, owner: &Principal, role: Role) -> Result<(), RegistryError> {
        if role.exempt_from_domain_limit() {
            return Ok(());
        }
        let held = self.wallet_domains(owner)?;
        for name in &held {
            match self.db.get_domain(name)? {
                Some(record) if record.owner == *owner => {}
                Some(_) => {
                    return Err(RegistryError::InvariantViolation(format!(
                        "wallet index maps {owner} to {name}, which has another owner"
                    )))
                }
                None => {
                    return Err(RegistryError::InvariantViolation(format!(
                        "wallet index maps {owner} to missing domain {name}"
                    )))
                }
            }
        }
        match held.last() {
            Some(existing) => Err(RegistryError::AlreadyOwnsDomain {
                identity: *owner,
                domain: existing.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Stage a brand-new record with its wallet and temporal index entries.
    pub fn stage_insert(&self, record: DomainRecord, staged: &mut StagedMutations) {
        staged
            .wallet_inserts
            .push((record.owner, record.domain_name.clone(), record.registration_time));
        staged
            .registrations
            .push((record.registration_time, record.domain_name.clone()));
        staged.domains.push(record);
    }

    /// Stage an ownership move. Only `owner` changes on the record.
    pub fn stage_transfer(
        &self,
        mut record: DomainRecord,
        new_owner: Principal,
        stamp: u64,
        staged: &mut StagedMutations,
    ) {
        staged.wallet_removals.push((record.owner, record.domain_name.clone()));
        staged.wallet_inserts.push((new_owner, record.domain_name.clone(), stamp));
        record.owner = new_owner;
        staged.domains.push(record);
    }

    /// Stage an in-place update of non-key fields (expiration, endpoint).
    pub fn stage_update(&self, record: DomainRecord, staged: &mut StagedMutations) {
        staged.domains.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use namereg_core::{ExecutionUnitId, ONE_YEAR_NANOS};

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("namereg_ledger_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    fn record(name: &str, owner: Principal, ts: u64) -> DomainRecord {
        DomainRecord {
            domain_name: name.into(),
            owner,
            administrator: owner,
            operator: owner,
            execution_unit: ExecutionUnitId([1u8; 32]),
            registration_time: ts,
            expiration_time: ts + ONE_YEAR_NANOS,
            last_payment_block: 0,
            custom_mcp_endpoint: None,
            was_gifted: false,
            season_id: 1,
            authorizing_address: None,
        }
    }

    #[test]
    fn one_domain_rule_with_admin_exemption() {
        let db = temp_db("one_domain");
        let ledger = DomainLedger::new(&db);
        let u1 = Principal::derive(b"u1");

        ledger.ensure_can_own(&u1, Role::User).unwrap();
        let mut staged = StagedMutations::default();
        ledger.stage_insert(record("user1domain", u1, 10), &mut staged);
        db.commit(&staged).unwrap();

        let err = ledger.ensure_can_own(&u1, Role::User).unwrap_err();
        assert!(err.to_string().contains("already owns domain"));
        ledger.ensure_can_own(&u1, Role::Administrator).unwrap();
        assert_eq!(ledger.wallet_domain(&u1).unwrap().as_deref(), Some("user1domain"));
    }

    #[test]
    fn transfer_moves_index_and_owner_only() {
        let db = temp_db("transfer");
        let ledger = DomainLedger::new(&db);
        let (u1, u6) = (Principal::derive(b"u1"), Principal::derive(b"u6"));
        let original = record("user1domain", u1, 10);

        let mut staged = StagedMutations::default();
        ledger.stage_insert(original.clone(), &mut staged);
        db.commit(&staged).unwrap();

        let mut staged = StagedMutations::default();
        ledger.stage_transfer(original.clone(), u6, 11, &mut staged);
        db.commit(&staged).unwrap();

        assert_eq!(ledger.wallet_domain(&u1).unwrap(), None);
        assert_eq!(ledger.wallet_domain(&u6).unwrap().as_deref(), Some("user1domain"));
        let moved = ledger.require("user1domain").unwrap();
        assert_eq!(moved.owner, u6);
        assert_eq!(moved.administrator, original.administrator);
        assert_eq!(moved.registration_time, original.registration_time);
        assert_eq!(ledger.list(Some(&u6)).unwrap().len(), 1);
        assert!(ledger.list(Some(&u1)).unwrap().is_empty());
    }

    #[test]
    fn dangling_wallet_entry_is_an_invariant_violation() {
        let db = temp_db("dangling");
        let ledger = DomainLedger::new(&db);
        let u1 = Principal::derive(b"u1");
        let mut staged = StagedMutations::default();
        staged.wallet_inserts.push((u1, "ghostdomain".into(), 1));
        db.commit(&staged).unwrap();

        let err = ledger.ensure_can_own(&u1, Role::User).unwrap_err();
        assert!(matches!(err, RegistryError::InvariantViolation(_)));
    }

    #[test]
    fn missing_domain_is_not_found() {
        let db = temp_db("missing");
        let err = DomainLedger::new(&db).require("nothere").unwrap_err();
        assert!(matches!(err, RegistryError::DomainNotFound(_)));
    }
}
