use namereg_core::error::RegistryError;
use namereg_core::{is_short_name, Caller, Principal, Role};

use crate::db::StateDb;

/// Resolves a caller's principal to a [`Caller`] against the admin set.
pub struct IdentityAuthority<'a> {
    db: &'a StateDb,
}

impl<'a> IdentityAuthority<'a> {
    pub fn new(db: &'a StateDb) -> Self {
        Self { db }
    }

    pub fn role_of(&self, principal: &Principal) -> Result<Role, RegistryError> {
        if self.db.is_admin(principal)? {
            Ok(Role::Administrator)
        } else {
            Ok(Role::User)
        }
    }

    pub fn resolve(&self, principal: Principal) -> Result<Caller, RegistryError> {
        Ok(Caller { principal, role: self.role_of(&principal)? })
    }

    /// Resolve and require the administrator role. `action` names the
    /// refused operation in the error.
    pub fn require_admin(&self, principal: Principal, action: &str) -> Result<Caller, RegistryError> {
        let caller = self.resolve(principal)?;
        if !caller.is_admin() {
            return Err(RegistryError::Unauthorized(format!(
                "only administrators can {action}"
            )));
        }
        Ok(caller)
    }

    pub fn admins(&self) -> Result<Vec<Principal>, RegistryError> {
        self.db.admins()
    }

    /// Short-name gate. Names of five or more characters always pass, as do
    /// administrators; everyone else is subject to the registration mode.
    pub fn may_take_short_name(&self, name: &str, caller: &Caller) -> Result<bool, RegistryError> {
        if !is_short_name(name) || caller.is_admin() {
            return Ok(true);
        }
        let approved = self.db.is_short_name_user(&caller.principal)?;
        Ok(self.db.short_name_mode()?.admits(approved))
    }
}
