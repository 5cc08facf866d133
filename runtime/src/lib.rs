//! # Pavilion Runtime
//!
//! The imperative shell of the scoring engine.
//!
//! A [`MatchStore`] owns one match: it runs every mutation (record, undo,
//! pointer update, status change) under a single per-match write lock, so
//! concurrent writers serialize and over/ball numbering can never
//! interleave. Within that critical section the flow is:
//!
//! 1. validate + reduce (pure, in `pavilion-core`)
//! 2. persist the ball event, retrying transient storage failures; the
//!    mutation is committed only once the store acknowledges
//! 3. recompute derived state from the log
//! 4. emit the payload-free change signal
//!
//! Different matches share nothing: the [`MatchRegistry`] hands out one
//! store per match id and they proceed in parallel.

use pavilion_core::channel::{MatchChannel, MatchSubscription};
use pavilion_core::controller::{MatchAction, MatchEnvironment, MatchReducer, MatchState};
use pavilion_core::effect::Effect;
use pavilion_core::environment::{PermissionGate, RosterError, RosterProvider};
use pavilion_core::event::BallEvent;
use pavilion_core::payload::{MatchUpdatePayload, ScoreboardView};
use pavilion_core::reducer::Reducer;
use pavilion_core::store::{BallEventStore, EventStoreError};
use pavilion_core::types::{MatchControl, MatchId, MatchSetup, OperatorId, PlayerId, TeamId};
use pavilion_core::validate::ScoringError;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// In-process broadcast transport for match change signals.
pub mod channel;

/// Retry logic with exponential backoff for transient persistence failures.
pub mod retry;

pub use channel::BroadcastMatchChannel;
pub use retry::{RetryPolicy, retry_with_backoff, retry_with_predicate};

/// Errors surfaced by the match runtime.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// The transition was rejected by the validator; nothing was
    /// persisted. The inner error names the violated rule verbatim.
    #[error("Transition rejected: {0}")]
    Rejected(#[from] ScoringError),

    /// The event store failed (or the log was empty on undo). Retryable
    /// store failures have already been retried per policy by the time
    /// this surfaces.
    #[error(transparent)]
    Store(#[from] EventStoreError),

    /// The broadcast transport failed to establish a subscription.
    #[error(transparent)]
    Channel(#[from] pavilion_core::channel::ChannelError),

    /// The roster collaborator could not answer.
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// The external permission gate denied the operator.
    #[error("Operator {operator} is not permitted to score match {match_id}")]
    PermissionDenied {
        /// The denied operator.
        operator: OperatorId,
        /// The match they tried to score.
        match_id: MatchId,
    },

    /// The registry has no open store for this match.
    #[error("Match {0} is not open")]
    MatchNotOpen(MatchId),
}

/// Configuration for match stores created by the registry.
///
/// The broadcast transport carries its own capacity configuration
/// ([`BroadcastMatchChannel::with_capacity`]); this config covers the
/// store-side knobs.
///
/// # Example
///
/// ```ignore
/// let config = MatchStoreConfig::default()
///     .with_retry_policy(RetryPolicy::builder().max_retries(5).build());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MatchStoreConfig {
    /// Retry policy for event-store appends and removals.
    pub retry_policy: RetryPolicy,
}

impl MatchStoreConfig {
    /// Set the persistence retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}

/// The runtime coordinator for one match.
///
/// All mutations run under the store's write lock, held across the append
/// acknowledgement, which gives the per-match serialization the event log
/// requires. Reads take the lock shared and never block each other.
pub struct MatchStore {
    match_id: MatchId,
    state: RwLock<MatchState>,
    reducer: MatchReducer,
    environment: MatchEnvironment,
    event_store: Arc<dyn BallEventStore>,
    channel: Arc<dyn MatchChannel>,
    permissions: Arc<dyn PermissionGate>,
    retry_policy: RetryPolicy,
}

impl MatchStore {
    /// Creates a store for a match with default configuration.
    #[must_use]
    pub fn new(
        state: MatchState,
        environment: MatchEnvironment,
        event_store: Arc<dyn BallEventStore>,
        channel: Arc<dyn MatchChannel>,
        permissions: Arc<dyn PermissionGate>,
    ) -> Self {
        Self::with_config(
            state,
            environment,
            event_store,
            channel,
            permissions,
            &MatchStoreConfig::default(),
        )
    }

    /// Creates a store with explicit configuration.
    #[must_use]
    pub fn with_config(
        state: MatchState,
        environment: MatchEnvironment,
        event_store: Arc<dyn BallEventStore>,
        channel: Arc<dyn MatchChannel>,
        permissions: Arc<dyn PermissionGate>,
        config: &MatchStoreConfig,
    ) -> Self {
        Self {
            match_id: state.control.id,
            state: RwLock::new(state),
            reducer: MatchReducer::new(),
            environment,
            event_store,
            channel,
            permissions,
            retry_policy: config.retry_policy.clone(),
        }
    }

    /// The match this store coordinates.
    #[must_use]
    pub const fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Dispatch an operator action through the controller.
    ///
    /// Resolves only after every side effect of an accepted action is done:
    /// a recorded delivery has been acknowledged by the event store and the
    /// change signal has been emitted.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::PermissionDenied`]: the external gate refused
    ///   the operator.
    /// - [`ControllerError::Rejected`]: the validator refused the
    ///   transition; no state change, nothing persisted.
    /// - [`ControllerError::Store`]: persistence failed after retries; the
    ///   in-memory state has been restored and re-synchronized from the
    ///   log, and the caller should retry the whole operation.
    #[tracing::instrument(skip(self, action), fields(match_id = %self.match_id), name = "match_send")]
    pub async fn send(
        &self,
        operator: OperatorId,
        action: MatchAction,
    ) -> Result<(), ControllerError> {
        self.authorize(operator).await?;
        self.apply(action).await
    }

    /// Remove the most recent delivery of the current innings and
    /// recompute state.
    ///
    /// Control pointers are not rewound in the general case; a pending
    /// selection opened by the removed ball is discarded (see the
    /// controller's undo application). Undo on an innings with no
    /// deliveries fails with [`EventStoreError::EmptyLog`] and changes
    /// nothing.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::PermissionDenied`]: the external gate refused
    ///   the operator.
    /// - [`ControllerError::Store`]: empty log, or the removal failed
    ///   after retries.
    #[tracing::instrument(skip(self), fields(match_id = %self.match_id), name = "match_undo")]
    pub async fn undo(&self, operator: OperatorId) -> Result<(), ControllerError> {
        self.authorize(operator).await?;

        let mut state = self.state.write().await;

        // Undo is scoped to the current innings: an empty innings reports
        // an empty log even if the previous innings has deliveries.
        if state.innings_events.is_empty() {
            return Err(ControllerError::Store(EventStoreError::EmptyLog(
                self.match_id,
            )));
        }

        let removed = retry_with_predicate(
            self.retry_policy.clone(),
            || self.event_store.remove_last(self.match_id),
            EventStoreError::is_retryable,
        )
        .await?;

        self.reducer
            .reduce(
                &mut state,
                MatchAction::BallUndone {
                    event: removed.event,
                },
                &self.environment,
            )
            .map_err(ControllerError::Rejected)?;

        metrics::counter!("scoring.undo.total").increment(1);
        self.notify().await;
        Ok(())
    }

    /// Read the authoritative derived state.
    pub async fn scoreboard(&self) -> ScoreboardView {
        let state = self.state.read().await;
        ScoreboardView::from_state(&state)
    }

    /// Snapshot of the control record for the persistence collaborator
    /// that owns the match row.
    pub async fn match_update(&self) -> MatchUpdatePayload {
        let state = self.state.read().await;
        MatchUpdatePayload::from_control(&state.control)
    }

    /// Read current state via a closure.
    ///
    /// Access state through a closure so the shared lock is released
    /// promptly:
    ///
    /// ```ignore
    /// let wickets = store.state(|s| s.board.wickets).await;
    /// ```
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&MatchState) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    /// Subscribe to this match's change signals.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Channel`] if the transport refused the
    /// subscription.
    pub async fn subscribe(&self) -> Result<MatchSubscription, ControllerError> {
        Ok(self.channel.join(self.match_id).await?)
    }

    async fn authorize(&self, operator: OperatorId) -> Result<(), ControllerError> {
        if self.permissions.may_score(operator, self.match_id).await {
            Ok(())
        } else {
            metrics::counter!("scoring.commands.denied").increment(1);
            Err(ControllerError::PermissionDenied {
                operator,
                match_id: self.match_id,
            })
        }
    }

    /// Runs one action through reduce-then-effects under the write lock.
    async fn apply(&self, action: MatchAction) -> Result<(), ControllerError> {
        let mut state = self.state.write().await;
        metrics::counter!("scoring.commands.total").increment(1);

        // Snapshot for rollback: if persistence fails after the reducer
        // has applied the transition, the pre-command state comes back.
        let snapshot = state.clone();

        let start = std::time::Instant::now();
        let result = self.reducer.reduce(&mut state, action, &self.environment);
        metrics::histogram!("scoring.reducer.duration_seconds").record(start.elapsed().as_secs_f64());

        let effects = match result {
            Ok(effects) => effects,
            Err(rejection) => {
                metrics::counter!("scoring.commands.rejected").increment(1);
                tracing::debug!(error = %rejection, "Transition rejected");
                return Err(ControllerError::Rejected(rejection));
            }
        };

        for effect in effects {
            match effect {
                Effect::None => {}
                Effect::Append(event) => {
                    if let Err(error) = self.persist(*event).await {
                        *state = snapshot;
                        self.resync(&mut state).await;
                        return Err(error);
                    }
                }
                Effect::Notify => self.notify().await,
            }
        }
        Ok(())
    }

    /// Appends one delivery, retrying transient failures per policy.
    async fn persist(&self, event: BallEvent) -> Result<(), ControllerError> {
        let stored = retry_with_predicate(
            self.retry_policy.clone(),
            || self.event_store.append(event.clone(), None),
            EventStoreError::is_retryable,
        )
        .await?;

        metrics::counter!("scoring.deliveries.persisted").increment(1);
        tracing::debug!(
            sequence = %stored.sequence,
            over = stored.event.over_number,
            ball = stored.event.ball_number,
            "Delivery persisted"
        );
        Ok(())
    }

    /// Re-reads the current innings from the store after a persistence
    /// failure, so the cache reflects exactly what was acknowledged, even
    /// a write whose acknowledgement was lost in transit.
    async fn resync(&self, state: &mut MatchState) {
        match self
            .event_store
            .list_for_innings(self.match_id, state.control.innings)
            .await
        {
            Ok(stored) => {
                state.reset_events(stored.into_iter().map(|s| s.event).collect());
            }
            Err(error) => {
                tracing::error!(error = %error, "Failed to resync event cache from store");
            }
        }
    }

    /// Emits the change signal. Best-effort: the mutation is already
    /// committed, so a transport failure is logged, not surfaced.
    async fn notify(&self) {
        match self.channel.notify_changed(self.match_id).await {
            Ok(()) => {
                metrics::counter!("scoring.notifications.total").increment(1);
            }
            Err(error) => {
                tracing::warn!(error = %error, "Change notification failed");
            }
        }
    }
}

impl std::fmt::Debug for MatchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchStore")
            .field("match_id", &self.match_id)
            .finish_non_exhaustive()
    }
}

/// One store per live match.
///
/// The registry is the composition point: it wires the event store, the
/// broadcast transport, the roster collaborator and the permission gate
/// into each match store it opens. Matches are fully independent; the
/// registry never serializes across match ids.
pub struct MatchRegistry {
    stores: RwLock<HashMap<MatchId, Arc<MatchStore>>>,
    environment: MatchEnvironment,
    event_store: Arc<dyn BallEventStore>,
    channel: Arc<dyn MatchChannel>,
    rosters: Arc<dyn RosterProvider>,
    permissions: Arc<dyn PermissionGate>,
    config: MatchStoreConfig,
}

impl MatchRegistry {
    /// Creates a registry with default store configuration.
    #[must_use]
    pub fn new(
        environment: MatchEnvironment,
        event_store: Arc<dyn BallEventStore>,
        channel: Arc<dyn MatchChannel>,
        rosters: Arc<dyn RosterProvider>,
        permissions: Arc<dyn PermissionGate>,
    ) -> Self {
        Self::with_config(
            environment,
            event_store,
            channel,
            rosters,
            permissions,
            MatchStoreConfig::default(),
        )
    }

    /// Creates a registry with explicit store configuration.
    #[must_use]
    pub fn with_config(
        environment: MatchEnvironment,
        event_store: Arc<dyn BallEventStore>,
        channel: Arc<dyn MatchChannel>,
        rosters: Arc<dyn RosterProvider>,
        permissions: Arc<dyn PermissionGate>,
        config: MatchStoreConfig,
    ) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            environment,
            event_store,
            channel,
            rosters,
            permissions,
            config,
        }
    }

    /// Opens a match: fetches both rosters, creates the scheduled control
    /// record, and registers the store. Opening an already-open match
    /// returns the existing store untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Roster`] if either roster cannot be
    /// fetched.
    pub async fn open(&self, setup: MatchSetup) -> Result<Arc<MatchStore>, ControllerError> {
        if let Some(existing) = self.get(setup.id).await {
            return Ok(existing);
        }

        let rosters = self.fetch_rosters(setup.home_team, setup.away_team).await?;
        let control = MatchControl::new(setup, self.environment.clock.now());
        let state = MatchState::new(control, rosters);

        let store = Arc::new(MatchStore::with_config(
            state,
            self.environment.clone(),
            Arc::clone(&self.event_store),
            Arc::clone(&self.channel),
            Arc::clone(&self.permissions),
            &self.config,
        ));

        let mut stores = self.stores.write().await;
        let entry = stores
            .entry(store.match_id())
            .or_insert_with(|| Arc::clone(&store));
        Ok(Arc::clone(entry))
    }

    /// The store for an open match.
    pub async fn get(&self, match_id: MatchId) -> Option<Arc<MatchStore>> {
        self.stores.read().await.get(&match_id).cloned()
    }

    /// The store for an open match, as an error-carrying lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::MatchNotOpen`] when the match was never
    /// opened or has been closed.
    pub async fn expect(&self, match_id: MatchId) -> Result<Arc<MatchStore>, ControllerError> {
        self.get(match_id)
            .await
            .ok_or(ControllerError::MatchNotOpen(match_id))
    }

    /// Closes a match, dropping its store. Existing subscriptions keep
    /// their receivers and simply stop seeing signals.
    pub async fn close(&self, match_id: MatchId) -> bool {
        self.stores.write().await.remove(&match_id).is_some()
    }

    /// Number of currently open matches.
    pub async fn open_count(&self) -> usize {
        self.stores.read().await.len()
    }

    async fn fetch_rosters(
        &self,
        home: TeamId,
        away: TeamId,
    ) -> Result<HashMap<TeamId, Vec<PlayerId>>, ControllerError> {
        let home_roster = self.rosters.roster(home).await?;
        let away_roster = self.rosters.roster(away).await?;
        Ok(HashMap::from([(home, home_roster), (away, away_roster)]))
    }
}

impl std::fmt::Debug for MatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchRegistry").finish_non_exhaustive()
    }
}
