//! Deployment manager adapters.

mod simple;

pub use simple::SimpleManager;
