//! A [`ChangeFeed`] driven by the test through a control handle.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::UnitName;
use crate::error::FeedError;
use crate::port::ChangeFeed;

enum Message {
    Batch(Vec<UnitName>),
    Fail(FeedError),
}

/// A change feed fed by a [`ChannelFeedHandle`]. No real watch involved.
pub struct ChannelFeed {
    rx: mpsc::UnboundedReceiver<Message>,
    err: Option<FeedError>,
    stop_count: Arc<AtomicU32>,
    stop_result: Arc<Mutex<Option<FeedError>>>,
}

/// Control handle for a [`ChannelFeed`].
///
/// Dropping the handle closes the feed without an error.
#[derive(Clone)]
pub struct ChannelFeedHandle {
    tx: mpsc::UnboundedSender<Message>,
    stop_count: Arc<AtomicU32>,
    stop_result: Arc<Mutex<Option<FeedError>>>,
}

/// Create a [`ChannelFeed`] and its control [`ChannelFeedHandle`].
pub fn channel_feed() -> (ChannelFeed, ChannelFeedHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stop_count = Arc::new(AtomicU32::new(0));
    let stop_result = Arc::new(Mutex::new(None));
    (
        ChannelFeed {
            rx,
            err: None,
            stop_count: Arc::clone(&stop_count),
            stop_result: Arc::clone(&stop_result),
        },
        ChannelFeedHandle {
            tx,
            stop_count,
            stop_result,
        },
    )
}

impl ChannelFeedHandle {
    /// Deliver a batch of unit names. Returns false once the feed is gone.
    pub fn send<I, S>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let batch = names
            .into_iter()
            .filter_map(|name| UnitName::parse(name.as_ref()).ok())
            .collect();
        self.tx.send(Message::Batch(batch)).is_ok()
    }

    /// Deliver a batch of already-parsed names.
    pub fn send_units(&self, batch: Vec<UnitName>) -> bool {
        self.tx.send(Message::Batch(batch)).is_ok()
    }

    /// Close the feed with an upstream error, after any queued batches.
    pub fn fail(&self, err: FeedError) {
        let _ = self.tx.send(Message::Fail(err));
    }

    /// Make the feed's `stop` report `err`.
    pub fn fail_stop(&self, err: FeedError) {
        *self.stop_result.lock() = Some(err);
    }

    /// How many times the consumer stopped the feed.
    pub fn stop_count(&self) -> u32 {
        self.stop_count.load(Ordering::SeqCst)
    }

    /// Whether the consumer has dropped the feed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl ChangeFeed for ChannelFeed {
    async fn next_batch(&mut self) -> Option<Vec<UnitName>> {
        if self.err.is_some() {
            return None;
        }
        match self.rx.recv().await {
            Some(Message::Batch(batch)) => Some(batch),
            Some(Message::Fail(err)) => {
                self.err = Some(err);
                self.rx.close();
                None
            }
            None => None,
        }
    }

    fn err(&self) -> Option<FeedError> {
        self.err.clone()
    }

    async fn stop(&mut self) -> Result<(), FeedError> {
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        self.rx.close();
        match self.stop_result.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
