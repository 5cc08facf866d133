//! Match fixtures: two teams with rosters and ready-made match states.

use crate::mocks::StaticRosters;
use pavilion_core::controller::MatchState;
use pavilion_core::environment::Clock;
use pavilion_core::types::{
    MatchControl, MatchId, MatchSetup, MatchSettings, MatchStatus, PlayerId, TeamId, TossDecision,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A two-team match fixture with generated rosters.
///
/// The home team bats first in [`MatchFixture::live_state`] (toss won by
/// the home side, electing to bat), with `home_players[0]` on strike,
/// `home_players[1]` at the non-striker's end, and `away_players[0]`
/// bowling.
#[derive(Clone, Debug)]
pub struct MatchFixture {
    /// Match identifier.
    pub match_id: MatchId,
    /// Home team.
    pub home_team: TeamId,
    /// Away team.
    pub away_team: TeamId,
    /// Home roster, in batting order.
    pub home_players: Vec<PlayerId>,
    /// Away roster, in batting order.
    pub away_players: Vec<PlayerId>,
    /// Overs limit per innings.
    pub overs_limit: Option<u32>,
    /// Scoring settings.
    pub settings: MatchSettings,
    /// Fixed creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl MatchFixture {
    /// Creates a fixture with `roster_size` players per team and no overs
    /// limit.
    #[must_use]
    pub fn new(roster_size: usize) -> Self {
        Self {
            match_id: MatchId::new(),
            home_team: TeamId::new(),
            away_team: TeamId::new(),
            home_players: (0..roster_size).map(|_| PlayerId::new()).collect(),
            away_players: (0..roster_size).map(|_| PlayerId::new()).collect(),
            overs_limit: None,
            settings: MatchSettings::default(),
            created_at: crate::mocks::test_clock().now(),
        }
    }

    /// Sets the overs limit.
    #[must_use]
    pub fn with_overs_limit(mut self, limit: u32) -> Self {
        self.overs_limit = Some(limit);
        self
    }

    /// Sets the scoring settings.
    #[must_use]
    pub fn with_settings(mut self, settings: MatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The match setup record.
    #[must_use]
    pub fn setup(&self) -> MatchSetup {
        MatchSetup {
            id: self.match_id,
            home_team: self.home_team,
            away_team: self.away_team,
            tournament: None,
            overs_limit: self.overs_limit,
            settings: self.settings,
        }
    }

    /// Rosters as the controller caches them.
    #[must_use]
    pub fn rosters(&self) -> HashMap<TeamId, Vec<PlayerId>> {
        HashMap::from([
            (self.home_team, self.home_players.clone()),
            (self.away_team, self.away_players.clone()),
        ])
    }

    /// A [`StaticRosters`] provider answering for both teams.
    #[must_use]
    pub fn static_rosters(&self) -> StaticRosters {
        StaticRosters::new()
            .with_team(self.home_team, self.home_players.clone())
            .with_team(self.away_team, self.away_players.clone())
    }

    /// State of the freshly scheduled match.
    #[must_use]
    pub fn scheduled_state(&self) -> MatchState {
        MatchState::new(
            MatchControl::new(self.setup(), self.created_at),
            self.rosters(),
        )
    }

    /// State of the match already live: home bats, its first two batters
    /// at the crease, the away opener bowling.
    #[must_use]
    pub fn live_state(&self) -> MatchState {
        let mut state = self.scheduled_state();
        state.control.status = MatchStatus::Live;
        state.control.toss_winner = Some(self.home_team);
        state.control.toss_decision = Some(TossDecision::Bat);
        state.control.batting_team = Some(self.home_team);
        state.control.striker = self.home_players.first().copied();
        state.control.non_striker = self.home_players.get(1).copied();
        state.control.bowler = self.away_players.first().copied();
        state.control.bump_version();
        // Re-derive the board so the live pointers show their figures.
        state.reset_events(Vec::new());
        state
    }

    /// The batter currently on strike in [`MatchFixture::live_state`].
    ///
    /// # Panics
    ///
    /// Panics if the fixture was built with an empty roster.
    #[must_use]
    #[allow(clippy::panic)]
    pub fn opening_striker(&self) -> PlayerId {
        match self.home_players.first() {
            Some(player) => *player,
            None => panic!("fixture roster is empty"),
        }
    }

    /// The non-striker in [`MatchFixture::live_state`].
    ///
    /// # Panics
    ///
    /// Panics if the fixture roster has fewer than two players.
    #[must_use]
    #[allow(clippy::panic)]
    pub fn opening_non_striker(&self) -> PlayerId {
        match self.home_players.get(1) {
            Some(player) => *player,
            None => panic!("fixture roster has fewer than two players"),
        }
    }

    /// The opening bowler in [`MatchFixture::live_state`].
    ///
    /// # Panics
    ///
    /// Panics if the fixture was built with an empty roster.
    #[must_use]
    #[allow(clippy::panic)]
    pub fn opening_bowler(&self) -> PlayerId {
        match self.away_players.first() {
            Some(player) => *player,
            None => panic!("fixture roster is empty"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn live_state_points_at_opening_players() {
        let fixture = MatchFixture::new(11);
        let state = fixture.live_state();

        assert!(state.control.status.is_live());
        assert_eq!(state.control.batting_team, Some(fixture.home_team));
        assert_eq!(state.control.striker, Some(fixture.opening_striker()));
        assert_eq!(
            state.control.non_striker,
            Some(fixture.opening_non_striker())
        );
        assert_eq!(state.control.bowler, Some(fixture.opening_bowler()));
        assert_eq!(state.batting_roster().len(), 11);
        assert_eq!(state.bowling_roster().len(), 11);
    }

    #[test]
    fn scheduled_state_has_no_pointers() {
        let fixture = MatchFixture::new(11).with_overs_limit(20);
        let state = fixture.scheduled_state();

        assert_eq!(state.control.status, MatchStatus::Scheduled);
        assert!(state.control.striker.is_none());
        assert_eq!(state.control.overs_limit, Some(20));
    }
}
