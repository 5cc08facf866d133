//! Wire payloads exchanged with the surrounding facility system.
//!
//! The scoring core does not own an HTTP surface; the facility's thin API
//! layer submits deliveries and match updates using these DTOs and
//! re-fetches the [`ScoreboardView`] whenever a change signal arrives.
//! JSON is the interchange format; absent optional fields are omitted, not
//! serialized as null.

use crate::controller::{MatchAction, MatchState};
use crate::event::BallEvent;
use crate::scoreboard::{BatterFigures, BowlerFigures};
use crate::types::{
    ExtraType, Innings, MatchControl, MatchId, MatchStatus, PlayerId, TeamId, TossDecision,
};
use serde::{Deserialize, Serialize};

/// A delivery as submitted over the wire.
///
/// Over/ball numbering and validity are derived server-side from the
/// authoritative state; they appear here so recorded deliveries can be
/// mirrored back out in the same shape they were submitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BallEventPayload {
    /// Match identifier.
    pub match_id: MatchId,
    /// Innings number, 1 or 2.
    pub innings: u8,
    /// Over number, 0-based.
    pub over_number: u32,
    /// Ball number within the over, 1-based.
    pub ball_number: u32,
    /// Bowler of the delivery.
    pub bowler_id: PlayerId,
    /// Batter on strike.
    pub striker_id: PlayerId,
    /// Batter at the non-striker's end.
    pub non_striker_id: PlayerId,
    /// Team batting.
    pub batting_team_id: TeamId,
    /// Runs scored off the bat.
    pub runs_scored: u32,
    /// Whether a wicket fell.
    pub is_wicket: bool,
    /// Extras conceded. May be omitted: with an extra type set it defaults
    /// to 1 on a scoreless delivery, else mirrors the run value.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub extras: Option<u32>,
    /// Kind of extra, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub extra_type: Option<ExtraType>,
    /// Whether this delivery counts toward the six-ball over.
    pub is_valid_ball: bool,
}

impl BallEventPayload {
    /// Mirrors a recorded event back into the wire shape.
    #[must_use]
    pub const fn from_event(event: &BallEvent) -> Self {
        Self {
            match_id: event.match_id,
            innings: event.innings.number(),
            over_number: event.over_number,
            ball_number: event.ball_number,
            bowler_id: event.bowler,
            striker_id: event.striker,
            non_striker_id: event.non_striker,
            batting_team_id: event.batting_team,
            runs_scored: event.runs_scored,
            is_wicket: event.is_wicket,
            extras: Some(event.extras),
            extra_type: event.extra_type,
            is_valid_ball: event.is_valid_ball,
        }
    }

    /// The extras amount after applying the wire defaulting convention.
    #[must_use]
    pub const fn effective_extras(&self) -> u32 {
        match (self.extras, self.extra_type) {
            (Some(extras), _) => extras,
            (None, Some(_)) if self.runs_scored == 0 => 1,
            (None, Some(_)) => self.runs_scored,
            (None, None) => 0,
        }
    }

    /// The innings this payload refers to, if the number is 1 or 2.
    #[must_use]
    pub const fn innings(&self) -> Option<Innings> {
        match self.innings {
            1 => Some(Innings::First),
            2 => Some(Innings::Second),
            _ => None,
        }
    }

    /// Converts the submission into the controller command carrying the
    /// operator-supplied scoring facts. Everything else (numbering,
    /// pointers, validity) is derived from authoritative state.
    #[must_use]
    pub const fn into_command(self) -> MatchAction {
        MatchAction::RecordBall {
            runs_scored: self.runs_scored,
            is_wicket: self.is_wicket,
            extras: self.extras,
            extra_type: self.extra_type,
        }
    }
}

/// A partial match update, as exchanged with the facility's match CRUD.
///
/// Every field is optional; absent fields are left untouched by the
/// consumer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchUpdatePayload {
    /// Lifecycle status.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<MatchStatus>,
    /// Toss winner.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub toss_winner_id: Option<TeamId>,
    /// Toss decision.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub toss_decision: Option<TossDecision>,
    /// Current innings number.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_innings: Option<u8>,
    /// Current batting team.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_batting_team_id: Option<TeamId>,
    /// Current striker.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_striker_id: Option<PlayerId>,
    /// Current non-striker.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_non_striker_id: Option<PlayerId>,
    /// Current bowler.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_bowler_id: Option<PlayerId>,
    /// Winning team.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub winning_team_id: Option<TeamId>,
    /// Man of the match.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub man_of_the_match_id: Option<PlayerId>,
    /// Free-text result description.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result_description: Option<String>,
    /// Whether the match is completed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_completed: Option<bool>,
}

impl MatchUpdatePayload {
    /// Full snapshot of the control record, for the persistence
    /// collaborator that owns the match row.
    #[must_use]
    pub fn from_control(control: &MatchControl) -> Self {
        Self {
            status: Some(control.status),
            toss_winner_id: control.toss_winner,
            toss_decision: control.toss_decision,
            current_innings: Some(control.innings.number()),
            current_batting_team_id: control.batting_team,
            current_striker_id: control.striker,
            current_non_striker_id: control.non_striker,
            current_bowler_id: control.bowler,
            winning_team_id: control.winning_team,
            man_of_the_match_id: control.man_of_the_match,
            result_description: control.result_description.clone(),
            is_completed: Some(control.status.is_completed()),
        }
    }
}

/// The authoritative derived state clients re-fetch on every change
/// signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreboardView {
    /// Match identifier.
    pub match_id: MatchId,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Current innings number.
    pub innings: u8,
    /// Team currently batting.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub batting_team_id: Option<TeamId>,
    /// Total runs.
    pub score: u32,
    /// Wickets fallen.
    pub wickets: u32,
    /// Overs figure, e.g. `"2.0"`.
    pub overs: String,
    /// Runs per over so far.
    pub run_rate: f64,
    /// Figures for the batter on strike.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub striker: Option<BatterFigures>,
    /// Figures for the batter at the non-striker's end.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub non_striker: Option<BatterFigures>,
    /// Figures for the current bowler.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bowler: Option<BowlerFigures>,
    /// Ball codes for the current over, oldest first.
    pub this_over: Vec<String>,
    /// Control record version at the time of the snapshot.
    pub version: u64,
}

impl ScoreboardView {
    /// Snapshots the derived state of a match.
    #[must_use]
    pub fn from_state(state: &MatchState) -> Self {
        Self {
            match_id: state.control.id,
            status: state.control.status,
            innings: state.control.innings.number(),
            batting_team_id: state.control.batting_team,
            score: state.board.score,
            wickets: state.board.wickets,
            overs: state.board.overs.to_string(),
            run_rate: state.board.run_rate,
            striker: state.board.striker.clone(),
            non_striker: state.board.non_striker.clone(),
            bowler: state.board.bowler.clone(),
            this_over: state.board.this_over.clone(),
            version: state.control.version,
        }
    }
}
