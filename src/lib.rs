//! Berth - a node-local unit agent deployer.
//!
//! A deployer watches the units assigned to it in cluster state and makes the
//! set of unit agents running on this node match: Alive units it is
//! responsible for get deployed, units that die or move elsewhere get
//! recalled, and units that end their life here get removed from state.
//!
//! # Architecture
//!
//! - **`domain`** - Unit names, life, snapshots, and credentials
//! - **`port`** - Capability traits the deployer consumes
//!   - `UnitState` - Cluster state lookups and mutations
//!   - `Manager` - How unit agents are started and stopped
//!   - `ChangeFeed` - Batches of changed unit names
//!   - `CredentialSource` - Fresh agent credentials
//! - **`adapter`** - In-memory and file-backed state, the filesystem manager
//! - **`runtime`** - The reconciliation step and the supervised deployer loop
//! - **`infrastructure`** - Configuration, logging, and wiring
//! - **`cli`** - The `berth` command line
//!
//! # Features
//!
//! - `testkit` - Expose the in-process test doubles in [`testkit`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use berth::adapter::state::MemoryState;
//! use berth::runtime::Deployer;
//! # use berth::adapter::manager::SimpleManager;
//!
//! # async fn example(manager: SimpleManager) -> Result<(), berth::error::DeployerError> {
//! let state = MemoryState::new();
//! let feed = state.watch_units("machine-0");
//! let deployer = Deployer::new("machine-0", Arc::new(state), Arc::new(manager));
//! let handle = deployer.start(Box::new(feed));
//! handle.stop().await
//! # }
//! ```

pub mod adapter;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;
pub mod runtime;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
