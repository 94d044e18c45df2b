//! Infrastructure layer.
//!
//! Provides technical concerns that support the deployer without containing
//! reconciliation logic.
//!
//! # Submodules
//!
//! - [`config`] - Configuration loading and validation
//! - [`bootstrap`] - Composition root wiring collaborators into a deployer

pub mod bootstrap;
pub mod config;
