use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::RegistryError;

/// Nanoseconds since the Unix epoch (UTC).
pub type Timestamp = u64;

/// Fee amount in e8s.
pub type E8s = u64;

// ── Principal ─────────────────────────────────────────────────────────────────

/// 32-byte network identity of a caller, owner, administrator or operator.
///
/// Serialized as base-58 text in human-readable formats (JSON) and as raw
/// bytes otherwise (bincode).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal(pub [u8; 32]);

impl Principal {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The all-zero identity used for unauthenticated callers.
    pub fn anonymous() -> Self {
        Self([0u8; 32])
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Derive a principal from arbitrary key material: BLAKE3(bytes).
    pub fn derive(material: &[u8]) -> Self {
        Self(*blake3::hash(material).as_bytes())
    }

    /// Base-58 encoded string representation.
    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_b58(s: &str) -> Result<Self, RegistryError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| RegistryError::InvalidPrincipal(format!("{s}: {e}")))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            RegistryError::InvalidPrincipal(format!("{s}: expected 32 bytes, got {}", b.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b58 = self.to_b58();
        write!(f, "Principal({})", &b58[..b58.len().min(8)])
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_b58())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Principal::from_b58(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Principal)
        }
    }
}

// ── ExecutionUnitId ───────────────────────────────────────────────────────────

/// Opaque reference to the execution unit provisioned for a domain.
/// Serialized as hex in human-readable formats.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionUnitId(pub [u8; 32]);

impl ExecutionUnitId {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut arr = [0u8; 32];
        hex::decode_to_slice(s, &mut arr)?;
        Ok(Self(arr))
    }
}

impl fmt::Display for ExecutionUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ExecutionUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutionUnitId({}…)", &self.to_hex()[..16])
    }
}

impl Serialize for ExecutionUnitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for ExecutionUnitId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            ExecutionUnitId::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(ExecutionUnitId)
        }
    }
}

// ── Roles ─────────────────────────────────────────────────────────────────────

/// Capability tag resolved once per call from the admin set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Administrator,
    User,
}

impl Role {
    /// Administrators may own any number of domains.
    pub fn exempt_from_domain_limit(&self) -> bool {
        matches!(self, Role::Administrator)
    }
}

/// A resolved caller: identity plus role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub principal: Principal,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }
}
