//! State store adapters.
//!
//! - [`MemoryState`] - In-memory units with change notifications
//! - [`FileState`] - A `MemoryState` persisted to a TOML document
//! - [`UnitsWatcher`] - Change feed of the units assigned to a deployer

mod file;
mod memory;
mod watcher;

pub use file::FileState;
pub use memory::{MemoryState, UnitRecord};
pub use watcher::UnitsWatcher;
