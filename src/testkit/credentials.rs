//! Credential sources with predictable output.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::domain::Credential;
use crate::error::CredentialError;
use crate::port::CredentialSource;

/// Hands out `<prefix>-0`, `<prefix>-1`, ... in order.
#[derive(Debug)]
pub struct FixedCredentials {
    prefix: String,
    issued: AtomicU32,
}

impl FixedCredentials {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            issued: AtomicU32::new(0),
        }
    }

    /// How many credentials have been generated.
    pub fn issued(&self) -> u32 {
        self.issued.load(Ordering::SeqCst)
    }
}

impl CredentialSource for FixedCredentials {
    fn generate(&self) -> Result<Credential, CredentialError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(Credential::new(format!("{}-{n}", self.prefix)))
    }
}

/// Always fails, as an exhausted entropy source would.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingCredentials;

impl CredentialSource for FailingCredentials {
    fn generate(&self) -> Result<Credential, CredentialError> {
        Err(CredentialError("entropy source unavailable".to_string()))
    }
}
