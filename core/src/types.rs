//! Domain identifiers and match-control types.
//!
//! This module defines the strong types shared across the scoring engine:
//! UUID-backed identifiers, the match lifecycle enums, overs arithmetic,
//! and [`MatchControl`], the versioned control record owning the current
//! striker/non-striker/bowler pointers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Defines a UUID-backed identifier newtype with the standard constructors.
macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_id! {
    /// Unique identifier for a match.
    MatchId
}

define_id! {
    /// Unique identifier for a team.
    TeamId
}

define_id! {
    /// Unique identifier for a player.
    PlayerId
}

define_id! {
    /// Unique identifier for a tournament.
    TournamentId
}

define_id! {
    /// Unique identifier for the operator driving the scoring console.
    OperatorId
}

/// Match lifecycle status.
///
/// Transitions are one-way: `Scheduled → Live → Completed`. Completed is
/// terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Match created, opening players not yet selected.
    Scheduled,
    /// Match in progress; deliveries may be recorded.
    Live,
    /// Result recorded; no further mutations accepted.
    Completed,
}

impl MatchStatus {
    /// Whether the match is currently live.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    /// Whether the match has finished.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Live => write!(f, "live"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// What the toss winner elected to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TossDecision {
    /// Toss winner bats first.
    Bat,
    /// Toss winner bowls first.
    Bowl,
}

/// Innings number, 1 or 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Innings {
    /// First innings.
    First,
    /// Second innings.
    Second,
}

impl Innings {
    /// The innings number as displayed (1-based).
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }

    /// The following innings.
    ///
    /// A two-innings match has no third innings; `Second.next()` stays
    /// `Second`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self::Second
    }
}

impl std::fmt::Display for Innings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Classification of extras conceded on a delivery.
///
/// A delivery with no extra carries `None` at the [`crate::event::BallEvent`]
/// level; this enum only covers the four extra kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtraType {
    /// Wide ball.
    Wide,
    /// No-ball.
    NoBall,
    /// Byes (runs off a missed legal delivery).
    Bye,
    /// Leg byes.
    LegBye,
}

impl ExtraType {
    /// Short scoreboard code for this extra kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Wide => "wd",
            Self::NoBall => "nb",
            Self::Bye => "b",
            Self::LegBye => "lb",
        }
    }

    /// Whether this extra kind is subject to the re-bowl rule.
    ///
    /// Only wides and no-balls may be re-bowled; byes and leg byes always
    /// count toward the over.
    #[must_use]
    pub const fn is_rebowlable(self) -> bool {
        matches!(self, Self::Wide | Self::NoBall)
    }
}

impl std::fmt::Display for ExtraType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Per-match scoring settings.
///
/// Settings affect how *future* deliveries are classified. Changing them
/// mid-match never rewrites events already recorded: validity is computed at
/// record time and stored on the event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSettings {
    /// When `true` (the default), wides and no-balls do not count toward
    /// the six-ball over and are bowled again.
    pub rebowl_wide_or_no_ball: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            rebowl_wide_or_no_ball: true,
        }
    }
}

/// Overs bowled, split into completed overs and balls into the current over.
///
/// Displays in the conventional `overs.balls` form: 12 valid balls render
/// as `"2.0"`, 13 as `"2.1"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overs {
    /// Completed six-ball overs.
    pub completed: u32,
    /// Valid balls bowled in the current over (0..=5).
    pub balls: u32,
}

impl Overs {
    /// Derives the overs figure from a count of valid balls.
    #[must_use]
    pub const fn from_valid_balls(valid_balls: u32) -> Self {
        Self {
            completed: valid_balls / 6,
            balls: valid_balls % 6,
        }
    }

    /// Whether the configured overs limit has been reached.
    #[must_use]
    pub const fn reached(self, limit: u32) -> bool {
        self.completed >= limit
    }
}

impl std::fmt::Display for Overs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.completed, self.balls)
    }
}

/// A player selection the controller is waiting on before accepting the
/// next delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingSelection {
    /// An over just completed; a new bowler must be chosen.
    Bowler,
    /// A wicket fell with batters still available; a replacement batsman
    /// must be chosen.
    Batsman,
}

/// Initial configuration for a match, provided when it is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSetup {
    /// Match identifier.
    pub id: MatchId,
    /// Team listed first on the card.
    pub home_team: TeamId,
    /// Team listed second on the card.
    pub away_team: TeamId,
    /// Tournament this match belongs to, if any.
    pub tournament: Option<TournamentId>,
    /// Overs limit per innings; `None` means unlimited.
    pub overs_limit: Option<u32>,
    /// Scoring settings.
    pub settings: MatchSettings,
}

/// The versioned match control record.
///
/// This is the only mutable shared state besides the event log itself. It is
/// owned by the match controller and mutated exclusively through validated
/// transitions under per-match serialization; every accepted transition
/// bumps [`MatchControl::version`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchControl {
    /// Match identifier.
    pub id: MatchId,
    /// Team listed first on the card.
    pub home_team: TeamId,
    /// Team listed second on the card.
    pub away_team: TeamId,
    /// Tournament association.
    pub tournament: Option<TournamentId>,
    /// Overs limit per innings; `None` means unlimited.
    pub overs_limit: Option<u32>,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Toss winner, set when the match starts.
    pub toss_winner: Option<TeamId>,
    /// Toss decision, set when the match starts.
    pub toss_decision: Option<TossDecision>,
    /// Current innings.
    pub innings: Innings,
    /// Team currently batting.
    pub batting_team: Option<TeamId>,
    /// Batter currently on strike.
    pub striker: Option<PlayerId>,
    /// Batter at the non-striker's end.
    pub non_striker: Option<PlayerId>,
    /// Current bowler.
    pub bowler: Option<PlayerId>,
    /// Selection the controller is waiting on, if any.
    pub pending: Option<PendingSelection>,
    /// Winning team once the result is recorded; `None` on a draw or tie.
    pub winning_team: Option<TeamId>,
    /// Man of the match, if awarded.
    pub man_of_the_match: Option<PlayerId>,
    /// Free-text result description.
    pub result_description: Option<String>,
    /// Scoring settings (may change mid-match).
    pub settings: MatchSettings,
    /// When the match record was created.
    pub created_at: DateTime<Utc>,
    /// Bumped on every accepted transition.
    pub version: u64,
}

impl MatchControl {
    /// Creates a scheduled match from its setup.
    #[must_use]
    pub const fn new(setup: MatchSetup, created_at: DateTime<Utc>) -> Self {
        Self {
            id: setup.id,
            home_team: setup.home_team,
            away_team: setup.away_team,
            tournament: setup.tournament,
            overs_limit: setup.overs_limit,
            status: MatchStatus::Scheduled,
            toss_winner: None,
            toss_decision: None,
            innings: Innings::First,
            batting_team: None,
            striker: None,
            non_striker: None,
            bowler: None,
            pending: None,
            winning_team: None,
            man_of_the_match: None,
            result_description: None,
            settings: setup.settings,
            created_at,
            version: 0,
        }
    }

    /// The opponent of `team` in this match.
    #[must_use]
    pub fn other_team(&self, team: TeamId) -> TeamId {
        if team == self.home_team {
            self.away_team
        } else {
            self.home_team
        }
    }

    /// The team currently bowling, once a batting team is assigned.
    #[must_use]
    pub fn bowling_team(&self) -> Option<TeamId> {
        self.batting_team.map(|batting| self.other_team(batting))
    }

    /// Marks one accepted transition on the control record.
    pub const fn bump_version(&mut self) {
        self.version += 1;
    }
}
