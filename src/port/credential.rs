//! Credential source port.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::domain::credential::CREDENTIAL_BYTES;
use crate::domain::Credential;
use crate::error::CredentialError;

/// Generates fresh agent credentials.
pub trait CredentialSource: Send + Sync {
    fn generate(&self) -> Result<Credential, CredentialError>;
}

/// Credentials drawn from the operating system's random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCredentials;

impl CredentialSource for RandomCredentials {
    fn generate(&self) -> Result<Credential, CredentialError> {
        let mut bytes = [0u8; CREDENTIAL_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CredentialError(e.to_string()))?;
        Ok(Credential::from_bytes(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_credentials_differ() {
        let a = RandomCredentials.generate().unwrap();
        let b = RandomCredentials.generate().unwrap();
        assert_eq!(a.expose().len(), 24);
        assert_ne!(a, b);
    }
}
