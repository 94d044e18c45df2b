//! Initial agent credentials.
//!
//! A fresh credential is generated for every deployment and stored against
//! the unit before the agent is started. State stores only ever keep the
//! digest returned by [`Credential::digest`].

use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};

/// Number of random bytes behind a credential (24 base64 characters).
pub const CREDENTIAL_BYTES: usize = 18;

/// A secret handed to a unit agent at deployment time.
///
/// `Debug` and `Display` redact the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Encode raw random bytes as a credential.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(general_purpose::STANDARD.encode(bytes))
    }

    /// Wrap an existing secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Hex-encoded SHA-256 digest of the secret.
    #[must_use]
    pub fn digest(&self) -> String {
        format!("{:x}", Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}
