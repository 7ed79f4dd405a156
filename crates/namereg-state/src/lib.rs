pub mod clock;
pub mod db;
pub mod engine;
pub mod identity;
pub mod ledger;
pub mod provision;
pub mod query;
pub mod seasons;
pub mod temporal;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::{StagedMutations, StateDb};
pub use engine::RegistryEngine;
pub use identity::IdentityAuthority;
pub use ledger::DomainLedger;
pub use provision::{DerivedProvisioner, ExecutionUnitProvisioner};
pub use query::RegistryQuery;
pub use seasons::SeasonManager;
pub use temporal::TemporalIndex;
