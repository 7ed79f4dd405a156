use namereg_core::error::RegistryError;
use namereg_core::{ExecutionUnitId, Principal};

/// Seam to the external service that creates the dedicated execution unit
/// for a newly registered name.
///
/// Called once per creation, after every validation has passed and before
/// the commit. An error aborts the whole operation with no state change.
pub trait ExecutionUnitProvisioner: Send + Sync {
    fn provision(&self, domain: &str, owner: &Principal) -> Result<ExecutionUnitId, RegistryError>;
}

/// Derives a deterministic reference as `BLAKE3("execution_unit" || name)`
/// without contacting anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct DerivedProvisioner;

impl ExecutionUnitProvisioner for DerivedProvisioner {
    fn provision(&self, domain: &str, _owner: &Principal) -> Result<ExecutionUnitId, RegistryError> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"execution_unit");
        hasher.update(domain.as_bytes());
        Ok(ExecutionUnitId(*hasher.finalize().as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_reference_is_stable_per_name() {
        let p = DerivedProvisioner;
        let owner = Principal::anonymous();
        let a = p.provision("user1domain", &owner).unwrap();
        assert_eq!(a, p.provision("user1domain", &owner).unwrap());
        assert_ne!(a, p.provision("user2domain", &owner).unwrap());
    }
}
