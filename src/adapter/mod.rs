//! Implementations of ports (hexagonal adapters).

pub mod manager;
pub mod state;
