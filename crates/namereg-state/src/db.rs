use namereg_core::error::RegistryError;
use namereg_core::{
    DomainRecord, Principal, RegistrationMode, Season, SeasonId, Timestamp,
    DEFAULT_ENDPOINT_BASE, DEFAULT_RENEWAL_FEE_E8S, FIRST_SEASON_ID,
};
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{
    ConflictableTransactionResult, TransactionError, TransactionResult, TransactionalTree,
    UnabortableTransactionError,
};
use sled::Transactional;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard};

// ── Meta keys ─────────────────────────────────────────────────────────────────

pub const META_INITIALIZED: &str = "initialized";
pub const META_NEXT_SEASON_ID: &str = "next_season_id";
pub const META_LAST_STAMP: &str = "last_stamp";
pub const META_BASE_FEE: &str = "base_fee_e8s";
pub const META_SHORT_NAME_MODE: &str = "short_name_mode";
pub const META_ENDPOINT_BASE: &str = "endpoint_base";

/// Persistent registry database backed by sled.
///
/// Named trees:
///   seasons            season_id BE                → bincode(Season)
///   season_addresses   season_id BE ++ address     → insertion ordinal BE
///   domains            name bytes                  → bincode(DomainRecord)
///   wallets            principal ++ name           → acquisition stamp BE
///   registrations      registration_time BE ++ name → [] (temporal index)
///   admins             principal                   → []
///   reserved           name bytes                  → []
///   short_users        principal                   → []
///   meta               utf8 key bytes              → raw bytes
///
/// All writes go through [`StateDb::commit`], which applies a whole
/// [`StagedMutations`] batch in one multi-tree transaction.
pub struct StateDb {
    db: sled::Db,
    seasons: sled::Tree,
    season_addresses: sled::Tree,
    domains: sled::Tree,
    wallets: sled::Tree,
    registrations: sled::Tree,
    admins: sled::Tree,
    reserved: sled::Tree,
    short_users: sled::Tree,
    meta: sled::Tree,
    commit_lock: RwLock<()>,
}

fn storage_err(e: sled::Error) -> RegistryError {
    RegistryError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, RegistryError> {
    bincode::serialize(value).map_err(|e| RegistryError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RegistryError> {
    bincode::deserialize(bytes).map_err(|e| RegistryError::Serialization(e.to_string()))
}

fn decode_u64(bytes: &[u8]) -> Result<u64, RegistryError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| RegistryError::Serialization(format!("expected 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

fn decode_principal(bytes: &[u8]) -> Result<Principal, RegistryError> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| RegistryError::Serialization(format!("expected 32 bytes, got {}", bytes.len())))?;
    Ok(Principal(arr))
}

fn decode_name(bytes: &[u8]) -> Result<String, RegistryError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| RegistryError::Serialization(e.to_string()))
}

fn prefixed_key(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + suffix.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(suffix);
    key
}

impl StateDb {
    /// Open or create the registry database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let db = sled::open(path).map_err(storage_err)?;
        let seasons          = db.open_tree("seasons").map_err(storage_err)?;
        let season_addresses = db.open_tree("season_addresses").map_err(storage_err)?;
        let domains          = db.open_tree("domains").map_err(storage_err)?;
        let wallets          = db.open_tree("wallets").map_err(storage_err)?;
        let registrations    = db.open_tree("registrations").map_err(storage_err)?;
        let admins           = db.open_tree("admins").map_err(storage_err)?;
        let reserved         = db.open_tree("reserved").map_err(storage_err)?;
        let short_users      = db.open_tree("short_users").map_err(storage_err)?;
        let meta             = db.open_tree("meta").map_err(storage_err)?;
        Ok(Self {
            db,
            seasons,
            season_addresses,
            domains,
            wallets,
            registrations,
            admins,
            reserved,
            short_users,
            meta,
            commit_lock: RwLock::new(()),
        })
    }

    /// Shared guard held by readers for the duration of a multi-read query,
    /// so no commit lands halfway through it.
    pub fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.commit_lock.read().unwrap_or_else(|e| e.into_inner())
    }

    // ── Seasons ──────────────────────────────────────────────────────────────

    pub fn get_season(&self, id: SeasonId) -> Result<Option<Season>, RegistryError> {
        match self.seasons.get(id.to_be_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every season in ascending id order.
    pub fn iter_seasons(&self) -> Result<Vec<Season>, RegistryError> {
        let mut out = Vec::new();
        for item in self.seasons.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    /// The most recently created season, whatever its status.
    pub fn latest_season(&self) -> Result<Option<Season>, RegistryError> {
        match self.seasons.last().map_err(storage_err)? {
            Some((_, bytes)) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // ── Season allow-lists ───────────────────────────────────────────────────

    pub fn season_has_address(&self, id: SeasonId, address: &str) -> Result<bool, RegistryError> {
        self.season_addresses
            .contains_key(prefixed_key(&id.to_be_bytes(), address.as_bytes()))
            .map_err(storage_err)
    }

    /// Allow-listed addresses of a season in first-insertion order.
    pub fn season_addresses(&self, id: SeasonId) -> Result<Vec<String>, RegistryError> {
        let mut entries = Vec::new();
        for item in self.season_addresses.scan_prefix(id.to_be_bytes()) {
            let (key, value) = item.map_err(storage_err)?;
            entries.push((decode_u64(&value)?, decode_name(&key[8..])?));
        }
        entries.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(entries.into_iter().map(|(_, address)| address).collect())
    }

    pub fn season_address_count(&self, id: SeasonId) -> u64 {
        self.season_addresses.scan_prefix(id.to_be_bytes()).count() as u64
    }

    // ── Domains ──────────────────────────────────────────────────────────────

    pub fn get_domain(&self, name: &str) -> Result<Option<DomainRecord>, RegistryError> {
        match self.domains.get(name.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn domain_exists(&self, name: &str) -> Result<bool, RegistryError> {
        self.domains.contains_key(name.as_bytes()).map_err(storage_err)
    }

    /// Every record in name order.
    pub fn iter_domains(&self) -> Result<Vec<DomainRecord>, RegistryError> {
        let mut out = Vec::new();
        for item in self.domains.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ── Wallet → domain index ────────────────────────────────────────────────

    /// Names held by `owner` with their acquisition stamps, oldest first.
    pub fn wallet_entries(&self, owner: &Principal) -> Result<Vec<(String, u64)>, RegistryError> {
        let mut out = Vec::new();
        for item in self.wallets.scan_prefix(owner.as_bytes()) {
            let (key, value) = item.map_err(storage_err)?;
            out.push((decode_name(&key[32..])?, decode_u64(&value)?));
        }
        out.sort_by_key(|(_, stamp)| *stamp);
        Ok(out)
    }

    // ── Temporal index ───────────────────────────────────────────────────────

    /// `(registration_time, name)` pairs with `registration_time >= since`,
    /// ascending.
    pub fn registrations_since(&self, since: Timestamp) -> Result<Vec<(Timestamp, String)>, RegistryError> {
        let mut out = Vec::new();
        for item in self.registrations.range(since.to_be_bytes()..) {
            let (key, _) = item.map_err(storage_err)?;
            if key.len() < 8 {
                return Err(RegistryError::Serialization("short registration key".into()));
            }
            out.push((decode_u64(&key[..8])?, decode_name(&key[8..])?));
        }
        Ok(out)
    }

    // ── Admins / reserved names / short-name approvals ───────────────────────

    pub fn is_admin(&self, who: &Principal) -> Result<bool, RegistryError> {
        self.admins.contains_key(who.as_bytes()).map_err(storage_err)
    }

    pub fn admins(&self) -> Result<Vec<Principal>, RegistryError> {
        self.principals_in(&self.admins)
    }

    pub fn admin_count(&self) -> usize {
        self.admins.len()
    }

    pub fn is_reserved(&self, name: &str) -> Result<bool, RegistryError> {
        self.reserved.contains_key(name.as_bytes()).map_err(storage_err)
    }

    pub fn reserved_names(&self) -> Result<Vec<String>, RegistryError> {
        let mut out = Vec::new();
        for item in self.reserved.iter() {
            let (key, _) = item.map_err(storage_err)?;
            out.push(decode_name(&key)?);
        }
        Ok(out)
    }

    pub fn is_short_name_user(&self, who: &Principal) -> Result<bool, RegistryError> {
        self.short_users.contains_key(who.as_bytes()).map_err(storage_err)
    }

    pub fn short_name_users(&self) -> Result<Vec<Principal>, RegistryError> {
        self.principals_in(&self.short_users)
    }

    fn principals_in(&self, tree: &sled::Tree) -> Result<Vec<Principal>, RegistryError> {
        let mut out = Vec::new();
        for item in tree.iter() {
            let (key, _) = item.map_err(storage_err)?;
            out.push(decode_principal(&key)?);
        }
        Ok(out)
    }

    // ── Meta ─────────────────────────────────────────────────────────────────

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, RegistryError> {
        self.meta
            .get(key.as_bytes())
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(storage_err)
    }

    pub fn get_meta_u64(&self, key: &str) -> Result<Option<u64>, RegistryError> {
        self.get_meta(key)?.map(|b| decode_u64(&b)).transpose()
    }

    pub fn is_initialized(&self) -> Result<bool, RegistryError> {
        Ok(self.get_meta(META_INITIALIZED)?.is_some())
    }

    pub fn next_season_id(&self) -> Result<SeasonId, RegistryError> {
        Ok(self.get_meta_u64(META_NEXT_SEASON_ID)?.unwrap_or(FIRST_SEASON_ID))
    }

    /// Last timestamp handed out for a registration or ownership change.
    pub fn last_stamp(&self) -> Result<Timestamp, RegistryError> {
        Ok(self.get_meta_u64(META_LAST_STAMP)?.unwrap_or(0))
    }

    pub fn base_fee(&self) -> Result<u64, RegistryError> {
        Ok(self.get_meta_u64(META_BASE_FEE)?.unwrap_or(DEFAULT_RENEWAL_FEE_E8S))
    }

    pub fn short_name_mode(&self) -> Result<RegistrationMode, RegistryError> {
        match self.get_meta(META_SHORT_NAME_MODE)? {
            Some(bytes) => decode(&bytes),
            None => Ok(RegistrationMode::default()),
        }
    }

    pub fn endpoint_base(&self) -> Result<String, RegistryError> {
        match self.get_meta(META_ENDPOINT_BASE)? {
            Some(bytes) => decode_name(&bytes),
            None => Ok(DEFAULT_ENDPOINT_BASE.to_string()),
        }
    }

    // ── Commit ───────────────────────────────────────────────────────────────

    /// Apply every staged write in one sled transaction, then flush.
    /// Either all trees change or none do.
    pub fn commit(&self, staged: &StagedMutations) -> Result<(), RegistryError> {
        let batch = EncodedBatch::encode(staged)?;
        let _guard = self.commit_lock.write().unwrap_or_else(|e| e.into_inner());

        let result: TransactionResult<(), ()> = (
            &self.seasons,
            &self.season_addresses,
            &self.domains,
            &self.wallets,
            &self.registrations,
            &self.admins,
            &self.reserved,
            &self.short_users,
            &self.meta,
        )
            .transaction(
                |(seasons, season_addresses, domains, wallets, registrations, admins, reserved, short_users, meta)|
                 -> ConflictableTransactionResult<(), ()> {
                    batch.seasons.apply(seasons)?;
                    batch.season_addresses.apply(season_addresses)?;
                    batch.domains.apply(domains)?;
                    batch.wallets.apply(wallets)?;
                    batch.registrations.apply(registrations)?;
                    batch.admins.apply(admins)?;
                    batch.reserved.apply(reserved)?;
                    batch.short_users.apply(short_users)?;
                    batch.meta.apply(meta)?;
                    Ok(())
                },
            );

        result.map_err(|e| match e {
            TransactionError::Abort(()) => RegistryError::Storage("commit aborted".into()),
            TransactionError::Storage(e) => storage_err(e),
        })?;
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), RegistryError> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }
}

// ── Staged mutations ──────────────────────────────────────────────────────────

/// All state changes produced by one registry operation, applied atomically
/// by [`StateDb::commit`].
#[derive(Default, Debug)]
pub struct StagedMutations {
    pub seasons: Vec<Season>,
    /// `(season_id, address, ordinal)`.
    pub season_addresses: Vec<(SeasonId, String, u64)>,
    pub domains: Vec<DomainRecord>,
    pub wallet_removals: Vec<(Principal, String)>,
    /// `(owner, name, acquisition stamp)`.
    pub wallet_inserts: Vec<(Principal, String, u64)>,
    pub registrations: Vec<(Timestamp, String)>,
    pub admins_added: Vec<Principal>,
    pub admins_removed: Vec<Principal>,
    pub reserved_added: Vec<String>,
    pub short_users_added: Vec<Principal>,
    pub short_users_removed: Vec<Principal>,
    pub meta: Vec<(&'static str, Vec<u8>)>,
}

impl StagedMutations {
    pub fn set_meta_u64(&mut self, key: &'static str, value: u64) {
        self.meta.push((key, value.to_be_bytes().to_vec()));
    }

    /// The staged copy of a season, if this batch already touches it.
    pub fn season_mut(&mut self, id: SeasonId) -> Option<&mut Season> {
        self.seasons.iter_mut().find(|s| s.season_id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.seasons.is_empty()
            && self.season_addresses.is_empty()
            && self.domains.is_empty()
            && self.wallet_removals.is_empty()
            && self.wallet_inserts.is_empty()
            && self.registrations.is_empty()
            && self.admins_added.is_empty()
            && self.admins_removed.is_empty()
            && self.reserved_added.is_empty()
            && self.short_users_added.is_empty()
            && self.short_users_removed.is_empty()
            && self.meta.is_empty()
    }
}

#[derive(Default)]
struct TreeOps {
    removes: Vec<Vec<u8>>,
    inserts: Vec<(Vec<u8>, Vec<u8>)>,
}

impl TreeOps {
    fn apply(&self, tree: &TransactionalTree) -> Result<(), UnabortableTransactionError> {
        for key in &self.removes {
            tree.remove(key.as_slice())?;
        }
        for (key, value) in &self.inserts {
            tree.insert(key.as_slice(), value.as_slice())?;
        }
        Ok(())
    }
}

/// Staged mutations lowered to raw key/value operations. Encoding happens
/// before the transaction so the closure itself cannot fail on a codec error.
#[derive(Default)]
struct EncodedBatch {
    seasons: TreeOps,
    season_addresses: TreeOps,
    domains: TreeOps,
    wallets: TreeOps,
    registrations: TreeOps,
    admins: TreeOps,
    reserved: TreeOps,
    short_users: TreeOps,
    meta: TreeOps,
}

impl EncodedBatch {
    fn encode(staged: &StagedMutations) -> Result<Self, RegistryError> {
        let mut b = EncodedBatch::default();
        for season in &staged.seasons {
            b.seasons.inserts.push((season.season_id.to_be_bytes().to_vec(), encode(season)?));
        }
        for (id, address, ordinal) in &staged.season_addresses {
            b.season_addresses.inserts.push((
                prefixed_key(&id.to_be_bytes(), address.as_bytes()),
                ordinal.to_be_bytes().to_vec(),
            ));
        }
        for record in &staged.domains {
            b.domains.inserts.push((record.domain_name.as_bytes().to_vec(), encode(record)?));
        }
        for (owner, name) in &staged.wallet_removals {
            b.wallets.removes.push(prefixed_key(owner.as_bytes(), name.as_bytes()));
        }
        for (owner, name, stamp) in &staged.wallet_inserts {
            b.wallets.inserts.push((
                prefixed_key(owner.as_bytes(), name.as_bytes()),
                stamp.to_be_bytes().to_vec(),
            ));
        }
        for (ts, name) in &staged.registrations {
            b.registrations.inserts.push((prefixed_key(&ts.to_be_bytes(), name.as_bytes()), Vec::new()));
        }
        for p in &staged.admins_removed {
            b.admins.removes.push(p.as_bytes().to_vec());
        }
        for p in &staged.admins_added {
            b.admins.inserts.push((p.as_bytes().to_vec(), Vec::new()));
        }
        for name in &staged.reserved_added {
            b.reserved.inserts.push((name.as_bytes().to_vec(), Vec::new()));
        }
        for p in &staged.short_users_removed {
            b.short_users.removes.push(p.as_bytes().to_vec());
        }
        for p in &staged.short_users_added {
            b.short_users.inserts.push((p.as_bytes().to_vec(), Vec::new()));
        }
        for (key, value) in &staged.meta {
            b.meta.inserts.push((key.as_bytes().to_vec(), value.clone()));
        }
        Ok(b)
    }
}

/// Encoding helper for meta values that are not plain integers.
pub fn encode_meta<T: Serialize>(value: &T) -> Result<Vec<u8>, RegistryError> {
    encode(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use namereg_core::{CreateSeasonRequest, ExecutionUnitId, ONE_YEAR_NANOS};

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("namereg_db_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    fn season(id: SeasonId) -> Season {
        let req = CreateSeasonRequest {
            min_letters: 4,
            max_letters: Some(10),
            total_allowed: 4,
            price_icp: 10,
        };
        Season::new(id, &req, Principal::anonymous(), 0)
    }

    fn record(name: &str, owner: Principal, ts: Timestamp) -> DomainRecord {
        DomainRecord {
            domain_name: name.into(),
            owner,
            administrator: owner,
            operator: owner,
            execution_unit: ExecutionUnitId([0u8; 32]),
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
    fn fresh_db_has_defaults() {
        let db = temp_db("defaults");
        assert!(!db.is_initialized().unwrap());
        assert_eq!(db.next_season_id().unwrap(), FIRST_SEASON_ID);
        assert_eq!(db.base_fee().unwrap(), DEFAULT_RENEWAL_FEE_E8S);
        assert_eq!(db.short_name_mode().unwrap(), RegistrationMode::WhitelistOnly);
        assert_eq!(db.endpoint_base().unwrap(), DEFAULT_ENDPOINT_BASE);
        assert!(db.latest_season().unwrap().is_none());
    }

    #[test]
    fn commit_writes_every_tree() {
        let db = temp_db("commit_all");
        let alice = Principal::derive(b"alice");
        let mut staged = StagedMutations::default();
        staged.seasons.push(season(1));
        staged.season_addresses.push((1, "addr-1".into(), 0));
        staged.domains.push(record("alicedomain", alice, 10));
        staged.wallet_inserts.push((alice, "alicedomain".into(), 10));
        staged.registrations.push((10, "alicedomain".into()));
        staged.admins_added.push(alice);
        staged.reserved_added.push("www".into());
        staged.short_users_added.push(alice);
        staged.set_meta_u64(META_NEXT_SEASON_ID, 2);
        assert!(!staged.is_empty());
        db.commit(&staged).unwrap();

        assert_eq!(db.get_season(1).unwrap().unwrap().season_id, 1);
        assert!(db.season_has_address(1, "addr-1").unwrap());
        assert_eq!(db.get_domain("alicedomain").unwrap().unwrap().owner, alice);
        assert_eq!(db.wallet_entries(&alice).unwrap(), vec![("alicedomain".to_string(), 10)]);
        assert_eq!(db.registrations_since(0).unwrap(), vec![(10, "alicedomain".to_string())]);
        assert!(db.is_admin(&alice).unwrap());
        assert!(db.is_reserved("www").unwrap());
        assert!(db.is_short_name_user(&alice).unwrap());
        assert_eq!(db.next_season_id().unwrap(), 2);
    }

    #[test]
    fn addresses_keep_insertion_order() {
        let db = temp_db("address_order");
        let mut staged = StagedMutations::default();
        staged.season_addresses.push((1, "zeta".into(), 0));
        staged.season_addresses.push((1, "alpha".into(), 1));
        staged.season_addresses.push((2, "other".into(), 0));
        db.commit(&staged).unwrap();
        assert_eq!(db.season_addresses(1).unwrap(), vec!["zeta", "alpha"]);
        assert_eq!(db.season_address_count(1), 2);
        assert_eq!(db.season_addresses(2).unwrap(), vec!["other"]);
    }

    #[test]
    fn registrations_range_is_inclusive_and_ordered() {
        let db = temp_db("registrations_range");
        let mut staged = StagedMutations::default();
        staged.registrations.push((300, "c".into()));
        staged.registrations.push((100, "a".into()));
        staged.registrations.push((200, "b".into()));
        db.commit(&staged).unwrap();

        let names: Vec<_> = db.registrations_since(200).unwrap().into_iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(db.registrations_since(301).unwrap().is_empty());
    }

    #[test]
    fn wallet_removal_and_insert_move_entry() {
        let db = temp_db("wallet_move");
        let (u1, u6) = (Principal::derive(b"u1"), Principal::derive(b"u6"));
        let mut staged = StagedMutations::default();
        staged.wallet_inserts.push((u1, "user1domain".into(), 1));
        db.commit(&staged).unwrap();

        let mut staged = StagedMutations::default();
        staged.wallet_removals.push((u1, "user1domain".into()));
        staged.wallet_inserts.push((u6, "user1domain".into(), 2));
        db.commit(&staged).unwrap();

        assert!(db.wallet_entries(&u1).unwrap().is_empty());
        assert_eq!(db.wallet_entries(&u6).unwrap().len(), 1);
    }
}
