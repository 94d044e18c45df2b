//! Collaborator-agnostic domain types.

pub mod credential;
pub mod error;
mod id;
mod life;
mod unit;

pub use credential::Credential;
pub use error::DomainError;
pub use id::{ServiceName, UnitName};
pub use life::Life;
pub use unit::Unit;
