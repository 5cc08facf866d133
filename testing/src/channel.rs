//! Recording broadcast channel for tests.

use pavilion_core::channel::{ChannelError, MatchChannel, MatchChanged, MatchSubscription};
use pavilion_core::types::MatchId;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::{RwLock, broadcast};

const SUBSCRIPTION_CAPACITY: usize = 32;

/// A [`MatchChannel`] that records every notification and still delivers
/// signals to joined subscribers.
///
/// Tests assert on the recorded log (one entry per successful mutation,
/// none on a rejection) while integration flows can subscribe as a real
/// client would.
#[derive(Clone, Default)]
pub struct RecordingMatchChannel {
    notifications: Arc<Mutex<Vec<MatchId>>>,
    senders: Arc<RwLock<HashMap<MatchId, broadcast::Sender<MatchChanged>>>>,
}

impl RecordingMatchChannel {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification emitted so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the notification log mutex was poisoned by a panicking
    /// test thread.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn notifications(&self) -> Vec<MatchId> {
        self.notifications.lock().unwrap().clone()
    }

    /// Number of notifications emitted for one match.
    ///
    /// # Panics
    ///
    /// Panics if the notification log mutex was poisoned by a panicking
    /// test thread.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn notified(&self, match_id: MatchId) -> usize {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|id| **id == match_id)
            .count()
    }
}

impl MatchChannel for RecordingMatchChannel {
    fn notify_changed(
        &self,
        match_id: MatchId,
    ) -> Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + '_>> {
        Box::pin(async move {
            #[allow(clippy::unwrap_used)]
            self.notifications.lock().unwrap().push(match_id);

            let senders = self.senders.read().await;
            if let Some(sender) = senders.get(&match_id) {
                // A send with no live receivers is fine; the signal simply
                // reaches nobody.
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
                .or_insert_with(|| broadcast::channel(SUBSCRIPTION_CAPACITY).0);
            Ok(MatchSubscription::new(match_id, sender.subscribe()))
        })
    }
}
