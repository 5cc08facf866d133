//! The match broadcast channel abstraction.
//!
//! After any successful mutation (append, undo, pointer update, status or
//! settings change) the controller emits a single lightweight
//! [`MatchChanged`] signal scoped to the match id. The signal deliberately
//! carries no payload beyond the id: subscribers re-fetch authoritative
//! state instead of trusting a pushed delta, which keeps optimistic client
//! state from diverging from the event-sourced truth.
//!
//! The transport is an interchangeable adapter behind [`MatchChannel`]:
//! `pavilion-runtime` ships a `tokio::sync::broadcast` implementation,
//! `pavilion-testing` a recording one. Sockets, server-sent events or
//! polling bridges sit behind the same trait.

use crate::types::MatchId;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors raised by broadcast channel operations.
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    /// Notification could not be delivered to the transport.
    #[error("Notify failed for match {match_id}: {reason}")]
    NotifyFailed {
        /// Match whose signal failed.
        match_id: MatchId,
        /// The reason for failure.
        reason: String,
    },

    /// Subscription could not be established.
    #[error("Join failed for match {match_id}: {reason}")]
    JoinFailed {
        /// Match the caller tried to join.
        match_id: MatchId,
        /// The reason for failure.
        reason: String,
    },

    /// The channel closed underneath a subscriber.
    #[error("Channel closed for match {0}")]
    Closed(MatchId),
}

/// The payload-free "something changed" signal.
///
/// Carries nothing but the match id; receivers re-pull the scoreboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchChanged {
    /// The match whose state changed.
    pub match_id: MatchId,
}

/// A live subscription to one match's change signals.
///
/// Leaving is simply dropping the subscription (or calling the consuming
/// [`MatchSubscription::leave`]); neither affects in-flight writes: the
/// publisher never waits on subscribers.
pub struct MatchSubscription {
    match_id: MatchId,
    receiver: broadcast::Receiver<MatchChanged>,
}

impl MatchSubscription {
    /// Wraps a broadcast receiver for `match_id`.
    #[must_use]
    pub const fn new(match_id: MatchId, receiver: broadcast::Receiver<MatchChanged>) -> Self {
        Self { match_id, receiver }
    }

    /// The match this subscription follows.
    #[must_use]
    pub const fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Wait for the next change signal.
    ///
    /// A lagging subscriber skips the signals it missed and keeps
    /// receiving: since signals carry no payload and clients re-fetch
    /// state, any number of missed signals collapse into the next one.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] once the publisher side is gone.
    pub async fn changed(&mut self) -> Result<MatchChanged, ChannelError> {
        loop {
            match self.receiver.recv().await {
                Ok(signal) => return Ok(signal),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        match_id = %self.match_id,
                        skipped,
                        "Subscriber lagged; collapsing missed change signals"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(ChannelError::Closed(self.match_id));
                }
            }
        }
    }

    /// Leave the match channel.
    ///
    /// Equivalent to dropping the subscription; provided for call sites
    /// that want the intent spelled out.
    pub fn leave(self) {
        drop(self);
    }

    /// Convert into a stream of change signals, ending when the channel
    /// closes.
    pub fn into_stream(self) -> impl futures::Stream<Item = MatchChanged> {
        futures::stream::unfold(self, |mut sub| async move {
            sub.changed().await.ok().map(|signal| (signal, sub))
        })
    }
}

impl std::fmt::Debug for MatchSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchSubscription")
            .field("match_id", &self.match_id)
            .finish_non_exhaustive()
    }
}

/// Type alias for the boxed futures the channel trait returns.
type ChannelFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ChannelError>> + Send + 'a>>;

/// Fan-out of per-match change signals.
///
/// # Delivery Semantics
///
/// Best-effort, at-most-once per subscriber per signal: a subscriber that
/// lags may miss signals and re-synchronizes on the next one it receives,
/// because the authoritative state is always re-fetched. Publishing to a
/// match nobody joined succeeds and delivers nothing.
///
/// # Dyn Compatibility
///
/// Explicit `Pin<Box<dyn Future>>` returns keep the trait usable as
/// `Arc<dyn MatchChannel>` inside the runtime.
pub trait MatchChannel: Send + Sync {
    /// Emit one change signal for `match_id` to every current subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotifyFailed`] if the transport rejected the
    /// signal.
    fn notify_changed(&self, match_id: MatchId) -> ChannelFuture<'_, ()>;

    /// Subscribe to change signals for `match_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::JoinFailed`] if the subscription could not
    /// be established.
    fn join(&self, match_id: MatchId) -> ChannelFuture<'_, MatchSubscription>;
}
