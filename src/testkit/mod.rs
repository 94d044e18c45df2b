//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`manager`]: [`RecordingManager`](manager::RecordingManager), an
//!   in-memory [`Manager`](crate::port::Manager) that logs every call.
//! - [`feed`]: [`ChannelFeed`](feed::ChannelFeed), a change feed driven
//!   from the test through a [`ChannelFeedHandle`](feed::ChannelFeedHandle).
//! - [`credentials`]: predictable and failing credential sources.

pub mod credentials;
pub mod feed;
pub mod manager;
