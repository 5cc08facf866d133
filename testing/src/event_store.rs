//! In-memory ball-event store for fast, deterministic tests.

use pavilion_core::event::BallEvent;
use pavilion_core::store::{BallEventStore, EventStoreError, Sequence, StoredBallEvent};
use pavilion_core::types::{Innings, MatchId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    next_sequence: u64,
    logs: HashMap<MatchId, Vec<StoredBallEvent>>,
    failures_remaining: usize,
}

/// In-memory implementation of [`BallEventStore`].
///
/// Sequences are assigned from a single monotonic counter, and every
/// mutation runs under one lock, so the per-match ordering guarantee holds
/// trivially. [`InMemoryBallEventStore::fail_appends`] injects storage
/// failures to exercise the runtime's retry and reload paths.
#[derive(Clone, Default)]
pub struct InMemoryBallEventStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryBallEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` appends fail with a storage error.
    pub async fn fail_appends(&self, count: usize) {
        self.inner.write().await.failures_remaining = count;
    }

    /// Number of events currently stored for a match, across innings.
    pub async fn event_count(&self, match_id: MatchId) -> usize {
        self.inner
            .read()
            .await
            .logs
            .get(&match_id)
            .map_or(0, Vec::len)
    }

    /// All events stored for a match, in append order.
    pub async fn all_events(&self, match_id: MatchId) -> Vec<StoredBallEvent> {
        self.inner
            .read()
            .await
            .logs
            .get(&match_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl BallEventStore for InMemoryBallEventStore {
    fn append(
        &self,
        event: BallEvent,
        expected: Option<Sequence>,
    ) -> Pin<Box<dyn Future<Output = Result<StoredBallEvent, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;

            if inner.failures_remaining > 0 {
                inner.failures_remaining -= 1;
                return Err(EventStoreError::Storage(
                    "injected append failure".to_string(),
                ));
            }

            let log = inner.logs.entry(event.match_id).or_default();
            let latest = log
                .last()
                .map_or(Sequence::new(0), |stored| stored.sequence);
            if let Some(expected) = expected {
                if expected != latest {
                    return Err(EventStoreError::ConcurrencyConflict {
                        match_id: event.match_id,
                        expected,
                        actual: latest,
                    });
                }
            }

            inner.next_sequence += 1;
            let stored = StoredBallEvent {
                sequence: Sequence::new(inner.next_sequence),
                event,
            };
            let match_id = stored.event.match_id;
            inner
                .logs
                .entry(match_id)
                .or_default()
                .push(stored.clone());
            Ok(stored)
        })
    }

    fn list_for_innings(
        &self,
        match_id: MatchId,
        innings: Innings,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<StoredBallEvent>, EventStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner.logs.get(&match_id).map_or_else(Vec::new, |log| {
                log.iter()
                    .filter(|stored| stored.event.innings == innings)
                    .cloned()
                    .collect()
            }))
        })
    }

    fn remove_last(
        &self,
        match_id: MatchId,
    ) -> Pin<Box<dyn Future<Output = Result<StoredBallEvent, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            inner
                .logs
                .get_mut(&match_id)
                .and_then(Vec::pop)
                .ok_or(EventStoreError::EmptyLog(match_id))
        })
    }
}
