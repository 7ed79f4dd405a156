use namereg_core::error::RegistryError;
use namereg_core::{DomainRecord, Timestamp};

use crate::db::StateDb;

/// Read-only projection of the ledger ordered by registration time.
///
/// Entries are written in the same commit as the record they point at, so
/// the projection never lags the ledger.
pub struct TemporalIndex<'a> {
    db: &'a StateDb,
}

impl<'a> TemporalIndex<'a> {
    pub fn new(db: &'a StateDb) -> Self {
        Self { db }
    }

    /// Records with `registration_time >= since`, ascending. `since(0)`
    /// yields every record in creation order.
    pub fn since(&self, since: Timestamp) -> Result<Vec<DomainRecord>, RegistryError> {
        let mut out = Vec::new();
        for (ts, name) in self.db.registrations_since(since)? {
            let record = self.db.get_domain(&name)?.ok_or_else(|| {
                RegistryError::InvariantViolation(format!(
                    "temporal index points at missing domain {name}"
                ))
            })?;
            if record.registration_time != ts {
                return Err(RegistryError::InvariantViolation(format!(
                    "temporal index has {name} at {ts}, record says {}",
                    record.registration_time
                )));
            }
            out.push(record);
        }
        Ok(out)
    }

    pub fn all(&self) -> Result<Vec<DomainRecord>, RegistryError> {
        self.since(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StagedMutations;
    use crate::ledger::DomainLedger;
    use namereg_core::{ExecutionUnitId, Principal};

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("namereg_temporal_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    fn record(name: &str, ts: u64) -> DomainRecord {
        let owner = Principal::derive(name.as_bytes());
        DomainRecord {
            domain_name: name.into(),
            owner,
            administrator: owner,
            operator: owner,
            execution_unit: ExecutionUnitId([0u8; 32]),
            registration_time: ts,
            expiration_time: ts + 1,
            last_payment_block: 0,
            custom_mcp_endpoint: None,
            was_gifted: false,
            season_id: 1,
            authorizing_address: None,
        }
    }

    #[test]
    fn since_is_inclusive_and_ordered() {
        let db = temp_db("inclusive");
        let mut staged = StagedMutations::default();
        let ledger = DomainLedger::new(&db);
        for (name, ts) in [("charlie", 30), ("alpha", 10), ("bravo", 20)] {
            ledger.stage_insert(record(name, ts), &mut staged);
        }
        db.commit(&staged).unwrap();

        let index = TemporalIndex::new(&db);
        let names = |v: Vec<DomainRecord>| v.into_iter().map(|r| r.domain_name).collect::<Vec<_>>();
        assert_eq!(names(index.all().unwrap()), vec!["alpha", "bravo", "charlie"]);
        assert_eq!(names(index.since(20).unwrap()), vec!["bravo", "charlie"]);
        assert!(index.since(31).unwrap().is_empty());
    }

    #[test]
    fn stale_entry_is_an_invariant_violation() {
        let db = temp_db("stale");
        let mut staged = StagedMutations::default();
        staged.domains.push(record("alpha", 10));
        staged.registrations.push((11, "alpha".into()));
        db.commit(&staged).unwrap();

        let err = TemporalIndex::new(&db).all().unwrap_err();
        assert!(matches!(err, RegistryError::InvariantViolation(_)));
    }
}
