//! Tenant identity used to scope deletes and merges.

use serde::{Deserialize, Serialize};

/// Column holding the tenant key in every loaded table.
pub const DEFAULT_IDENTITY_FIELD: &str = "SoftwareClientLicenseGuid_";

/// The client a load runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Unique key of this client.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.0
    }

    /// `<field> = '<key>'`, with single quotes in the key doubled.
    #[must_use]
    pub fn scope_predicate(&self, field: &str) -> String {
        format!("{field} = '{}'", self.0.replace('\'', "''"))
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
