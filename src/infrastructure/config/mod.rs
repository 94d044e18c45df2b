//! Infrastructure configuration modules.

pub mod logging;
pub mod manager;
pub mod settings;
pub mod state;
