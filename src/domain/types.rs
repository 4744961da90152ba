//! Core identifier types for domain entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an email account.
///
/// Generated once when the account is registered and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(format!("account-{}", uuid::Uuid::new_v4()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = AccountId::generate();
        let b = AccountId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("account-"));
    }

    #[test]
    fn account_id_serializes_as_plain_string() {
        let id = AccountId::from("account-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"account-1\"");
    }
}
