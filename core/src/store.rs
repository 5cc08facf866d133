//! The append-only ball-event store abstraction.
//!
//! The store is the single durable record of what happened, ball by ball.
//! Its contract is deliberately small:
//!
//! - `append` is the only way an event enters the log; nothing is ever
//!   edited in place.
//! - `list_for_innings` returns the ordered sequence the reconstructor
//!   replays.
//! - `remove_last` supports undo, removing exactly the most recent event
//!   for a match.
//!
//! Appending and removing do not notify the broadcast channel; the match
//! controller owns that side effect.
//!
//! # Implementations
//!
//! - `PostgresBallEventStore` (`pavilion-postgres`): durable production
//!   store.
//! - `InMemoryBallEventStore` (`pavilion-testing`): fast, deterministic
//!   tests.
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it can be held as `Arc<dyn BallEventStore>` by the runtime.

use crate::event::BallEvent;
use crate::types::{Innings, MatchId};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Append-order sequence number assigned by the store.
///
/// Sequences are per-store monotonic and define the total order of events
/// within a match; the store never reorders or merges appends.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sequence(u64);

impl Sequence {
    /// Creates a sequence number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw sequence value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Sequence {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A ball event together with the sequence number the store assigned it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredBallEvent {
    /// Append-order sequence number.
    pub sequence: Sequence,
    /// The recorded delivery.
    pub event: BallEvent,
}

/// Errors raised by ball-event store operations.
#[derive(Error, Debug)]
pub enum EventStoreError {
    /// `remove_last` was called for a match with no recorded events.
    #[error("No ball events recorded for match {0}")]
    EmptyLog(MatchId),

    /// Optimistic concurrency conflict: the log moved past the expected
    /// sequence. The caller should re-read state and retry the whole
    /// operation.
    #[error("Concurrency conflict on match {match_id}: expected sequence {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Match whose log was contended.
        match_id: MatchId,
        /// The sequence the writer expected the log to be at.
        expected: Sequence,
        /// The actual latest sequence.
        actual: Sequence,
    },

    /// Underlying storage failure (connection, query, I/O).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Event payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EventStoreError {
    /// Whether the caller may retry the whole operation.
    ///
    /// Conflicts and storage failures are transient; an empty log is not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::Storage(_)
        )
    }
}

/// Type alias for the boxed futures the store trait returns.
type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EventStoreError>> + Send + 'a>>;

/// Durable, append-only storage of ball events with per-match ordering.
///
/// # Ordering
///
/// Events within one match are totally ordered by append order. A second
/// writer racing an append must either serialize behind the first (the
/// runtime's per-match lock provides this) or be rejected with
/// [`EventStoreError::ConcurrencyConflict`] via the `expected` parameter,
/// never silently interleaved.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the runtime shares one store
/// across every match.
pub trait BallEventStore: Send + Sync {
    /// Append an event to the match log.
    ///
    /// `expected` enables optimistic concurrency control: when `Some`, the
    /// append fails with [`EventStoreError::ConcurrencyConflict`] unless the
    /// match log's latest sequence equals it (use `None` to rely on
    /// external serialization instead).
    ///
    /// Returns the stored event with its assigned sequence. The mutation is
    /// not committed until this future resolves `Ok`.
    ///
    /// # Errors
    ///
    /// - [`EventStoreError::ConcurrencyConflict`]: the log moved past
    ///   `expected`.
    /// - [`EventStoreError::Storage`]: the write did not reach storage.
    /// - [`EventStoreError::Serialization`]: the event could not be encoded.
    fn append(
        &self,
        event: BallEvent,
        expected: Option<Sequence>,
    ) -> StoreFuture<'_, StoredBallEvent>;

    /// Load the ordered event sequence for one innings of a match.
    ///
    /// Returns events ordered by sequence, oldest first. A match or innings
    /// with no events yields an empty vector, not an error.
    ///
    /// # Errors
    ///
    /// - [`EventStoreError::Storage`]: the read failed.
    /// - [`EventStoreError::Serialization`]: a stored payload failed to
    ///   decode.
    fn list_for_innings(
        &self,
        match_id: MatchId,
        innings: Innings,
    ) -> StoreFuture<'_, Vec<StoredBallEvent>>;

    /// Remove and return the most recent event for a match.
    ///
    /// This is the undo primitive: exactly one event (the last by append
    /// order) is removed. The log is otherwise immutable.
    ///
    /// # Errors
    ///
    /// - [`EventStoreError::EmptyLog`]: no events exist for the match.
    /// - [`EventStoreError::Storage`]: the delete failed.
    fn remove_last(&self, match_id: MatchId) -> StoreFuture<'_, StoredBallEvent>;
}
