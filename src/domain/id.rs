//! Domain identifier types with proper encapsulation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

const TAG_PREFIX: &str = "unit-";

/// Service name - the parent entity that owns a set of units.
///
/// The inner String is private to ensure all construction goes through
/// [`ServiceName::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceName(String);

impl ServiceName {
    /// Parse and validate a service name.
    pub fn parse(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if is_valid_service(&name) {
            Ok(Self(name))
        } else {
            Err(DomainError::InvalidServiceName { name })
        }
    }

    /// Get the service name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ServiceName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<ServiceName> for String {
    fn from(name: ServiceName) -> Self {
        name.0
    }
}

/// Unit name - `<service>/<index>`, unique within the cluster's unit namespace.
///
/// The inner String is private to ensure all construction goes through
/// [`UnitName::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitName(String);

impl UnitName {
    /// Parse and validate a unit name.
    pub fn parse(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        match name.split_once('/') {
            Some((service, index)) if is_valid_service(service) && is_valid_index(index) => {
                Ok(Self(name))
            }
            _ => Err(DomainError::InvalidUnitName { name }),
        }
    }

    /// Recover a unit name from its filesystem-safe tag (`unit-<service>-<index>`).
    pub fn from_tag(tag: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidUnitTag {
            tag: tag.to_string(),
        };
        let rest = tag.strip_prefix(TAG_PREFIX).ok_or_else(invalid)?;
        let (service, index) = rest.rsplit_once('-').ok_or_else(invalid)?;
        Self::parse(format!("{service}/{index}")).map_err(|_| invalid())
    }

    /// Get the unit name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The service this unit belongs to.
    #[must_use]
    pub fn service(&self) -> ServiceName {
        let (service, _) = self.0.split_once('/').unwrap_or((self.0.as_str(), ""));
        ServiceName(service.to_string())
    }

    /// The filesystem-safe tag for this unit, e.g. `unit-wordpress-0`.
    #[must_use]
    pub fn tag(&self) -> String {
        format!("{TAG_PREFIX}{}", self.0.replace('/', "-"))
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UnitName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UnitName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<UnitName> for String {
    fn from(name: UnitName) -> Self {
        name.0
    }
}

fn is_valid_service(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    !name.ends_with('-')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn is_valid_index(index: &str) -> bool {
    !index.is_empty()
        && index.chars().all(|c| c.is_ascii_digit())
        && (index == "0" || !index.starts_with('0'))
}
