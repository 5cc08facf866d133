//! In-process broadcast transport for match change signals.
//!
//! One `tokio::sync::broadcast` sender per match fans the payload-free
//! [`MatchChanged`] signal out to every joined subscriber. This is the
//! default transport behind the [`MatchChannel`] trait; socket or
//! server-sent-event bridges subscribe here and forward signals outward.

use pavilion_core::channel::{ChannelError, MatchChannel, MatchChanged, MatchSubscription};
use pavilion_core::types::MatchId;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::{RwLock, broadcast};

/// Default signal buffer per match.
///
/// Signals carry no payload and collapse on lag, so a small buffer is
/// enough; raise it when many slow subscribers share one match.
pub const DEFAULT_CAPACITY: usize = 16;

/// `tokio::sync::broadcast`-backed implementation of [`MatchChannel`].
pub struct BroadcastMatchChannel {
    capacity: usize,
    senders: RwLock<HashMap<MatchId, broadcast::Sender<MatchChanged>>>,
}

impl BroadcastMatchChannel {
    /// Creates a channel with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a channel with a custom per-match signal buffer.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            senders: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live subscribers for a match.
    pub async fn subscriber_count(&self, match_id: MatchId) -> usize {
        self.senders
            .read()
            .await
            .get(&match_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for BroadcastMatchChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchChannel for BroadcastMatchChannel {
    fn notify_changed(
        &self,
        match_id: MatchId,
    ) -> Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + '_>> {
        Box::pin(async move {
            let senders = self.senders.read().await;
            if let Some(sender) = senders.get(&match_id) {
                // An error here only means nobody is listening right now;
                // the signal is best-effort by design.
                let _ = sender.send(MatchChanged { match_id });
            }
            Ok(())
        })
    }

    fn join(
        &self,
        match_id: MatchId,
    ) -> Pin<Box<dyn Future<Output = Result<MatchSubscription, ChannelError>> + Send + '_>> {
        Box::pin(async move {
            let mut senders = self.senders.write().await;
            let sender = senders
                .entry(match_id)
                .or_insert_with(|| broadcast::channel(self.capacity).0);
            Ok(MatchSubscription::new(match_id, sender.subscribe()))
        })
    }
}
