//! # Pavilion Testing
//!
//! Deterministic test doubles and helpers for the Pavilion scoring engine.
//!
//! This crate provides:
//! - Mock implementations of the collaborator traits (clock, rosters,
//!   permission gate)
//! - An in-memory ball-event store and a recording broadcast channel
//! - The [`ReducerTest`] Given-When-Then builder for reducer cases
//! - Match fixtures for wiring realistic teams and rosters quickly
//!
//! ## Example
//!
//! ```ignore
//! use pavilion_testing::{ReducerTest, fixtures::MatchFixture, mocks::test_clock};
//!
//! let fixture = MatchFixture::new(11);
//!
//! ReducerTest::new(MatchReducer::new())
//!     .with_env(MatchEnvironment::new(Arc::new(test_clock())))
//!     .given_state(fixture.live_state())
//!     .when_action(MatchAction::RecordBall {
//!         runs_scored: 4,
//!         is_wicket: false,
//!         extras: None,
//!         extra_type: None,
//!     })
//!     .then_state(|state| assert_eq!(state.board.score, 4))
//!     .run();
//! ```

/// Recording broadcast channel.
pub mod channel;

/// In-memory ball-event store.
pub mod event_store;

/// Match fixtures: teams, rosters, scheduled and live states.
pub mod fixtures;


/// Mock implementations of the collaborator traits.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use pavilion_core::environment::{Clock, PermissionGate, RosterError, RosterProvider};
    use pavilion_core::types::{MatchId, OperatorId, PlayerId, TeamId};
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making recorded timestamps (and
    /// therefore serialized events) reproducible.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-06-01 14:00:00 UTC).
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which should
    /// never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-06-01T14:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Roster provider backed by a static map.
    #[derive(Debug, Clone, Default)]
    pub struct StaticRosters {
        teams: HashMap<TeamId, Vec<PlayerId>>,
    }

    impl StaticRosters {
        /// Creates an empty roster map.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Adds a team with its ordered player list.
        #[must_use]
        pub fn with_team(mut self, team: TeamId, players: Vec<PlayerId>) -> Self {
            self.teams.insert(team, players);
            self
        }
    }

    impl RosterProvider for StaticRosters {
        fn roster(
            &self,
            team: TeamId,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<PlayerId>, RosterError>> + Send + '_>>
        {
            let result = self
                .teams
                .get(&team)
                .cloned()
                .ok_or(RosterError::UnknownTeam(team));
            Box::pin(async move { result })
        }
    }

    /// Permission gate that lets everything through.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AllowAll;

    impl PermissionGate for AllowAll {
        fn may_score(
            &self,
            _operator: OperatorId,
            _match_id: MatchId,
        ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
            Box::pin(async { true })
        }
    }

    /// Permission gate that denies everything.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct DenyAll;

    impl PermissionGate for DenyAll {
        fn may_score(
            &self,
            _operator: OperatorId,
            _match_id: MatchId,
        ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
            Box::pin(async { false })
        }
    }
}

// Re-export commonly used items
pub use channel::RecordingMatchChannel;
pub use event_store::InMemoryBallEventStore;
pub use mocks::{AllowAll, DenyAll, FixedClock, StaticRosters, test_clock};
pub use reducer_test::ReducerTest;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pavilion_core::environment::{Clock, PermissionGate, RosterProvider};
    use pavilion_core::types::{MatchId, OperatorId, PlayerId, TeamId};

    #[test]
    fn fixed_clock_is_fixed() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[tokio::test]
    async fn static_rosters_answer_known_teams() {
        let team = TeamId::new();
        let players = vec![PlayerId::new(), PlayerId::new()];
        let rosters = StaticRosters::new().with_team(team, players.clone());

        assert_eq!(rosters.roster(team).await.unwrap(), players);
        assert!(rosters.roster(TeamId::new()).await.is_err());
    }

    #[tokio::test]
    async fn permission_gates() {
        let operator = OperatorId::new();
        let match_id = MatchId::new();
        assert!(AllowAll.may_score(operator, match_id).await);
        assert!(!DenyAll.may_score(operator, match_id).await);
    }
}
