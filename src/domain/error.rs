//! Domain validation errors for core domain types.
//!
//! These errors are returned by the parsing constructors of the identifier
//! types when their input does not follow the naming rules.
//!
//! # Examples
//!
//! ```
//! use berth::domain::error::DomainError;
//! use berth::domain::UnitName;
//!
//! let result = UnitName::parse("wordpress");
//! assert!(matches!(result, Err(DomainError::InvalidUnitName { .. })));
//! ```

use thiserror::Error;

/// Errors that occur when domain naming rules are violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Unit names must be `<service>/<index>`.
    #[error("invalid unit name {name:?}")]
    InvalidUnitName {
        /// The rejected input.
        name: String,
    },

    /// Service names must start with a lowercase letter and contain only
    /// lowercase letters, digits and dashes.
    #[error("invalid service name {name:?}")]
    InvalidServiceName {
        /// The rejected input.
        name: String,
    },

    /// Unit tags must be `unit-<service>-<index>`.
    #[error("invalid unit tag {tag:?}")]
    InvalidUnitTag {
        /// The rejected input.
        tag: String,
    },

    /// Life values must be one of `alive`, `dying`, `dead`.
    #[error("invalid life {value:?}")]
    InvalidLife {
        /// The rejected input.
        value: String,
    },
}
