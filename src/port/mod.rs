//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports are the capabilities a deployer is wired with. Adapters implement
//! them against real collaborators; the testkit implements them in-process.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │        Deployer         │
//!                    │                         │
//!     ┌──────────────┤   Reconciler + Domain   ├──────────────┐
//!     │              │                         │              │
//!     │              └─────────────────────────┘              │
//!     │                         │                             │
//!     ▼                         ▼                             ▼
//! ┌─────────┐            ┌─────────────┐              ┌───────────┐
//! │  State  │            │   Manager   │              │   Change  │
//! │ Adapter │            │   Adapter   │              │    Feed   │
//! └─────────┘            └─────────────┘              └───────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`UnitState`] - Unit lookup and life-cycle mutation
//! - [`Manager`] - Starting and stopping unit agents
//! - [`ChangeFeed`] - Batches of changed unit names
//! - [`CredentialSource`] - Fresh agent credentials

mod credential;
mod feed;
mod manager;
mod state;

pub use credential::{CredentialSource, RandomCredentials};
pub use feed::ChangeFeed;
pub use manager::Manager;
pub use state::UnitState;
