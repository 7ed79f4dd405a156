//! namereg-genesis
//!
//! Seeds a fresh registry database: the administrator set, the reserved
//! name list and the policy values held in `meta`. Writes go straight into
//! the `StateDb` in one commit, bypassing the engine, since there is no
//! administrator yet to authorize them.
//!
//! A marker in `meta` records that initialization ran; a second attempt
//! fails with `AlreadyInitialized` and changes nothing.

pub mod params;

pub use params::InitParams;

use namereg_core::error::RegistryError;
use namereg_core::{validate_domain_name, validate_endpoint, DEFAULT_RESERVED_NAMES};
use namereg_state::db::{
    encode_meta, META_BASE_FEE, META_ENDPOINT_BASE, META_INITIALIZED, META_SHORT_NAME_MODE,
};
use namereg_state::{StagedMutations, StateDb};
use tracing::info;

/// Apply `params` to an uninitialized database.
pub fn apply_init(db: &StateDb, params: &InitParams) -> Result<(), RegistryError> {
    if db.is_initialized()? {
        return Err(RegistryError::AlreadyInitialized);
    }
    if params.admins.is_empty() {
        return Err(RegistryError::InvalidInitParams(
            "at least one administrator is required".into(),
        ));
    }
    if let Some(p) = params.admins.iter().find(|p| p.is_anonymous()) {
        return Err(RegistryError::InvalidInitParams(format!(
            "{p} is the anonymous identity and cannot administer the registry"
        )));
    }

    let mut staged = StagedMutations::default();
    let mut admins = params.admins.clone();
    admins.sort();
    admins.dedup();
    staged.admins_added = admins;

    let mut reserved: Vec<String> = DEFAULT_RESERVED_NAMES.iter().map(|n| n.to_string()).collect();
    for name in &params.reserved_names {
        validate_domain_name(name)?;
        if !reserved.contains(name) {
            reserved.push(name.clone());
        }
    }
    staged.reserved_added = reserved;

    if let Some(fee) = params.renewal_fee_e8s {
        staged.set_meta_u64(META_BASE_FEE, fee);
    }
    if let Some(mode) = params.short_name_mode {
        staged.meta.push((META_SHORT_NAME_MODE, encode_meta(&mode)?));
    }
    if let Some(base) = &params.endpoint_base {
        validate_endpoint(base)?;
        staged
            .meta
            .push((META_ENDPOINT_BASE, base.trim_end_matches('/').as_bytes().to_vec()));
    }
    staged.meta.push((META_INITIALIZED, vec![1]));

    db.commit(&staged)?;
    info!(
        admins = staged.admins_added.len(),
        reserved = staged.reserved_added.len(),
        "registry initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use namereg_core::{Principal, RegistrationMode, DEFAULT_ENDPOINT_BASE, DEFAULT_RENEWAL_FEE_E8S};

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("namereg_genesis_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    #[test]
    fn seeds_defaults_once() {
        let db = temp_db("defaults");
        let admin = Principal::derive(b"admin");
        let params = InitParams { admins: vec![admin], ..Default::default() };

        apply_init(&db, &params).unwrap();
        assert!(db.is_initialized().unwrap());
        assert_eq!(db.admins().unwrap(), vec![admin]);
        for name in DEFAULT_RESERVED_NAMES {
            assert!(db.is_reserved(name).unwrap(), "{name}");
        }
        assert_eq!(db.base_fee().unwrap(), DEFAULT_RENEWAL_FEE_E8S);
        assert_eq!(db.short_name_mode().unwrap(), RegistrationMode::WhitelistOnly);
        assert_eq!(db.endpoint_base().unwrap(), DEFAULT_ENDPOINT_BASE);

        let again = apply_init(&db, &params).unwrap_err();
        assert!(matches!(again, RegistryError::AlreadyInitialized));
    }

    #[test]
    fn applies_overrides_from_json() {
        let db = temp_db("overrides");
        let admin = Principal::derive(b"admin");
        let json = format!(
            r#"{{
                "admins": ["{admin}"],
                "reserved_names": ["premium"],
                "renewal_fee_e8s": 5,
                "short_name_mode": "Open",
                "endpoint_base": "https://agents.example.org/"
            }}"#
        );
        let params = InitParams::from_json(&json).unwrap();
        assert_eq!(params.admins, vec![admin]);

        apply_init(&db, &params).unwrap();
        assert!(db.is_reserved("premium").unwrap());
        assert!(db.is_reserved("www").unwrap());
        assert_eq!(db.base_fee().unwrap(), 5);
        assert_eq!(db.short_name_mode().unwrap(), RegistrationMode::Open);
        assert_eq!(db.endpoint_base().unwrap(), "https://agents.example.org");
    }

    #[test]
    fn rejects_bad_params_without_writing() {
        let db = temp_db("bad_params");
        let err = apply_init(&db, &InitParams::default()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInitParams(_)));

        let params = InitParams {
            admins: vec![Principal::derive(b"admin")],
            endpoint_base: Some("http://insecure.example".into()),
            ..Default::default()
        };
        assert!(matches!(apply_init(&db, &params), Err(RegistryError::InvalidEndpoint(_))));
        assert!(!db.is_initialized().unwrap());
        assert!(db.admins().unwrap().is_empty());

        assert!(InitParams::from_json("{\"admins\": [\"not-base58!\"]}").is_err());
    }
}
