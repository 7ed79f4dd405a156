use serde::{Deserialize, Serialize};

use crate::constants::{MAX_DOMAIN_NAME_LEN, SHORT_NAME_THRESHOLD};
use crate::error::RegistryError;

/// Check a domain name against the charset and length rules.
///
/// Accepted: ASCII letters, digits and `-`, 1 to 63 characters, not starting
/// or ending with `-`. Names are stored exactly as given.
pub fn validate_domain_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::InvalidName("name is empty".into()));
    }
    if name.len() > MAX_DOMAIN_NAME_LEN {
        return Err(RegistryError::InvalidName(format!(
            "{name}: longer than {MAX_DOMAIN_NAME_LEN} characters"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
    {
        return Err(RegistryError::InvalidName(format!(
            "{name}: invalid character {bad:?}"
        )));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(RegistryError::InvalidName(format!(
            "{name}: must not start or end with a hyphen"
        )));
    }
    Ok(())
}

/// Number of ASCII letters in `name`. Season bounds (`min_letters`,
/// `max_letters`) are measured in letters, so digits and hyphens are free.
pub fn letter_count(name: &str) -> u64 {
    name.chars().filter(char::is_ascii_alphabetic).count() as u64
}

pub fn is_short_name(name: &str) -> bool {
    name.chars().count() < SHORT_NAME_THRESHOLD
}

/// Who may register short names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationMode {
    Open,
    #[default]
    WhitelistOnly,
    Closed,
}

impl RegistrationMode {
    /// Whether a non-admin caller may take a short name. `approved` is the
    /// caller's membership in the short-name approval set.
    pub fn admits(&self, approved: bool) -> bool {
        match self {
            RegistrationMode::Open => true,
            RegistrationMode::WhitelistOnly => approved,
            RegistrationMode::Closed => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        let longest = "x".repeat(63);
        for name in ["user1domain", "a", "my-name", "ABC123", longest.as_str()] {
            assert!(validate_domain_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_bad_names() {
        let too_long = "x".repeat(64);
        for name in ["", "-lead", "trail-", "dot.name", "space name", "ünïcode", too_long.as_str()] {
            let err = validate_domain_name(name).unwrap_err();
            assert!(matches!(err, RegistryError::InvalidName(_)), "{name}");
        }
    }

    #[test]
    fn short_name_threshold() {
        assert!(is_short_name("abcd"));
        assert!(!is_short_name("abcde"));
        assert_eq!(letter_count("user1domain"), 10);
        assert_eq!(letter_count("a-1-b"), 2);
    }

    #[test]
    fn mode_gates_short_names() {
        assert_eq!(RegistrationMode::default(), RegistrationMode::WhitelistOnly);
        assert!(RegistrationMode::Open.admits(false));
        assert!(RegistrationMode::WhitelistOnly.admits(true));
        assert!(!RegistrationMode::WhitelistOnly.admits(false));
        assert!(!RegistrationMode::Closed.admits(true));
    }
}
