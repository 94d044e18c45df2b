use std::sync::Arc;

use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::UnitName;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors reported by the state collaborator.
#[derive(Error, Debug, Clone)]
pub enum StateError {
    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("cannot {operation} {entity}: {reason}")]
    Rejected {
        operation: &'static str,
        entity: String,
        reason: String,
    },

    #[error("state unavailable: {0}")]
    Unavailable(String),

    #[error("failed to persist state: {0}")]
    Persist(String),
}

impl StateError {
    pub fn not_found(entity: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
        }
    }

    /// Whether the entity has already been erased upstream.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors reported by a deployment manager.
#[derive(Error, Debug, Clone)]
pub enum ManagerError {
    #[error("unit {unit} is already deployed")]
    AlreadyDeployed { unit: UnitName },

    #[error("unit {unit} is not deployed")]
    NotDeployed { unit: UnitName },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("command {command:?} failed: {reason}")]
    Command { command: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl ManagerError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }
}

/// Errors reported by a change feed when it closes.
#[derive(Error, Debug, Clone)]
pub enum FeedError {
    #[error("change feed closed without an error")]
    Closed,

    #[error("change feed failed: {0}")]
    Upstream(String),
}

/// Failure to generate a fresh credential.
#[derive(Error, Debug, Clone)]
#[error("cannot generate credential: {0}")]
pub struct CredentialError(pub String);

/// Internal deployer state corruption.
///
/// These are never retried: they mean the deployer's own bookkeeping is
/// wrong, not that a collaborator failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("must not re-deploy deployed unit {0}")]
    DoubleDeploy(UnitName),

    #[error("must not recall unit {0} that is not deployed")]
    RecallUndeployed(UnitName),

    #[error("must not remove deployed unit {0}")]
    RemoveDeployed(UnitName),

    #[error("must not remove alive unit {0}")]
    RemoveAlive(UnitName),
}

/// Terminal error of a deployer.
///
/// Cloneable so that every waiter observes the same outcome.
#[derive(Error, Debug, Clone)]
pub enum DeployerError {
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("deployer task aborted: {0}")]
    Aborted(String),
}

impl DeployerError {
    /// Whether this error indicates corrupted internal state.
    ///
    /// Fatal errors must not be handled by simply restarting the deployer.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_) | Self::Aborted(_))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Deployer(#[from] DeployerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invariant_and_abort_errors_are_fatal() {
        let unit = UnitName::parse("app/0").unwrap();
        assert!(DeployerError::from(InvariantViolation::DoubleDeploy(unit.clone())).is_fatal());
        assert!(DeployerError::Aborted("panicked".into()).is_fatal());

        assert!(!DeployerError::from(StateError::Unavailable("down".into())).is_fatal());
        assert!(!DeployerError::from(ManagerError::NotDeployed { unit }).is_fatal());
        assert!(!DeployerError::from(FeedError::Upstream("boom".into())).is_fatal());
    }

    #[test]
    fn not_found_is_distinguished_from_unavailable() {
        assert!(StateError::not_found("unit app/0").is_not_found());
        assert!(!StateError::Unavailable("timeout".into()).is_not_found());
    }
}
