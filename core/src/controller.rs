//! The match controller: the scoring engine's state machine.
//!
//! [`MatchReducer`] is a pure reducer in the `(state, action, environment)`
//! shape: commands are validated against the current state, accepted
//! commands become events, events are applied to state, and the reducer
//! returns the side effects the runtime must perform (persist the ball
//! event, notify subscribers). A rejected command returns `Err` before any
//! state mutation, so the caller never observes a partial transition.
//!
//! Rotation policy lives here: odd-run striker swaps, the new-bowler
//! request at the end of an over, and the replacement-batsman request on a
//! wicket, or its absence once the side is all out.

use crate::effect::{Effect, Effects};
use crate::event::BallEvent;
use crate::reducer::Reducer;
use crate::scoreboard::Scoreboard;
use crate::types::{
    ExtraType, Innings, MatchControl, MatchStatus, PendingSelection, PlayerId, TeamId,
    TossDecision,
};
use crate::validate::{
    self, ScoringError, delivery_is_valid, ensure_distinct_batsman, ensure_eligible_bowler,
    ensure_live,
};
use crate::environment::Clock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use std::collections::HashMap;
use std::sync::Arc;

/// Environment dependencies for the match reducer.
#[derive(Clone)]
pub struct MatchEnvironment {
    /// Clock for stamping recorded deliveries.
    pub clock: Arc<dyn Clock>,
}

impl MatchEnvironment {
    /// Creates a new `MatchEnvironment`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

/// The full in-memory state of one match.
///
/// The control record is authoritative; the event list is a cache of the
/// current innings' log slice and the scoreboard is re-derived from it on
/// every accepted mutation (never incrementally trusted).
#[derive(Clone, Debug)]
pub struct MatchState {
    /// The versioned control record.
    pub control: MatchControl,
    /// Cached rosters, fetched from the roster collaborator when the match
    /// was opened.
    pub rosters: HashMap<TeamId, Vec<PlayerId>>,
    /// The current innings' events, in append order.
    pub innings_events: Vec<BallEvent>,
    /// Derived state, rebuilt from `innings_events` + pointers.
    pub board: Scoreboard,
}

impl MatchState {
    /// Creates the state for a freshly scheduled match.
    #[must_use]
    pub fn new(control: MatchControl, rosters: HashMap<TeamId, Vec<PlayerId>>) -> Self {
        Self {
            control,
            rosters,
            innings_events: Vec::new(),
            board: Scoreboard::empty(),
        }
    }

    /// The batting team's roster, empty when no batting team is assigned.
    #[must_use]
    pub fn batting_roster(&self) -> &[PlayerId] {
        self.control
            .batting_team
            .and_then(|team| self.rosters.get(&team))
            .map_or(&[], Vec::as_slice)
    }

    /// The bowling team's roster, empty when no batting team is assigned.
    #[must_use]
    pub fn bowling_roster(&self) -> &[PlayerId] {
        self.control
            .bowling_team()
            .and_then(|team| self.rosters.get(&team))
            .map_or(&[], Vec::as_slice)
    }

    /// Replaces the current innings' event cache (e.g. after reloading
    /// from the store) and rebuilds the board.
    pub fn reset_events(&mut self, events: Vec<BallEvent>) {
        self.innings_events = events;
        self.rebuild_board();
    }

    fn rebuild_board(&mut self) {
        self.board = Scoreboard::rebuild(&self.innings_events, &self.control);
    }
}

/// Actions for the match controller: operator commands and the events they
/// become.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MatchAction {
    // ========== Commands ==========
    /// Command: start a scheduled match with the toss outcome and opening
    /// players.
    StartMatch {
        /// Team that won the toss.
        toss_winner: TeamId,
        /// What the toss winner elected.
        toss_decision: TossDecision,
        /// Opening striker.
        striker: PlayerId,
        /// Opening non-striker.
        non_striker: PlayerId,
        /// Opening bowler.
        bowler: PlayerId,
    },

    /// Command: record one delivery against the current pointers.
    RecordBall {
        /// Runs scored off the bat.
        runs_scored: u32,
        /// Whether a wicket fell.
        is_wicket: bool,
        /// Extras conceded; when absent and `extra_type` is set, defaults
        /// to 1 for a scoreless delivery, else mirrors the run value.
        extras: Option<u32>,
        /// Kind of extra, if any.
        extra_type: Option<ExtraType>,
    },

    /// Command: select (or replace) the bowler.
    SelectBowler {
        /// The proposed bowler.
        bowler: PlayerId,
    },

    /// Command: send in a replacement batsman after a wicket.
    SelectBatsman {
        /// The incoming batsman.
        batsman: PlayerId,
    },

    /// Command: begin the second innings with fresh opening players; the
    /// batting assignment swaps.
    StartInnings {
        /// Opening striker of the new innings.
        striker: PlayerId,
        /// Opening non-striker of the new innings.
        non_striker: PlayerId,
        /// Opening bowler of the new innings.
        bowler: PlayerId,
    },

    /// Command: change the re-bowl setting mid-match.
    UpdateSettings {
        /// New value for the wide/no-ball re-bowl rule.
        rebowl_wide_or_no_ball: bool,
    },

    /// Command: record the result. Never inferred from ball events; this
    /// is an explicit operator action. `winning_team: None` records a draw
    /// or tie.
    CompleteMatch {
        /// The winning team, if any.
        winning_team: Option<TeamId>,
        /// Man of the match, if awarded.
        man_of_the_match: Option<PlayerId>,
        /// Free-text result description.
        result_description: Option<String>,
    },

    // ========== Events ==========
    /// Event: the match went live.
    MatchStarted {
        /// Toss winner.
        toss_winner: TeamId,
        /// Toss decision.
        toss_decision: TossDecision,
        /// Derived initial batting team.
        batting_team: TeamId,
        /// Opening striker.
        striker: PlayerId,
        /// Opening non-striker.
        non_striker: PlayerId,
        /// Opening bowler.
        bowler: PlayerId,
        /// When the match started.
        started_at: DateTime<Utc>,
    },

    /// Event: a delivery was recorded.
    BallRecorded {
        /// The recorded delivery.
        event: BallEvent,
    },

    /// Event: a bowler was selected.
    BowlerSelected {
        /// The selected bowler.
        bowler: PlayerId,
    },

    /// Event: a replacement batsman came in at the vacant end.
    BatsmanSelected {
        /// The incoming batsman.
        batsman: PlayerId,
    },

    /// Event: the second innings began.
    InningsStarted {
        /// The new batting team.
        batting_team: TeamId,
        /// Opening striker.
        striker: PlayerId,
        /// Opening non-striker.
        non_striker: PlayerId,
        /// Opening bowler.
        bowler: PlayerId,
        /// When the innings started.
        started_at: DateTime<Utc>,
    },

    /// Event: the re-bowl setting changed.
    SettingsUpdated {
        /// New value for the wide/no-ball re-bowl rule.
        rebowl_wide_or_no_ball: bool,
    },

    /// Event: the result was recorded.
    MatchCompleted {
        /// The winning team, if any.
        winning_team: Option<TeamId>,
        /// Man of the match, if awarded.
        man_of_the_match: Option<PlayerId>,
        /// Free-text result description.
        result_description: Option<String>,
        /// When the result was recorded.
        completed_at: DateTime<Utc>,
    },

    /// Event: the most recent delivery was removed by undo.
    BallUndone {
        /// The removed delivery.
        event: BallEvent,
    },
}

impl MatchAction {
    /// Whether this action is an operator command.
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(
            self,
            Self::StartMatch { .. }
                | Self::RecordBall { .. }
                | Self::SelectBowler { .. }
                | Self::SelectBatsman { .. }
                | Self::StartInnings { .. }
                | Self::UpdateSettings { .. }
                | Self::CompleteMatch { .. }
        )
    }

    /// Whether this action is an event (a fact applied to state).
    #[must_use]
    pub const fn is_event(&self) -> bool {
        !self.is_command()
    }
}

/// Reducer for the match state machine.
#[derive(Clone, Debug, Default)]
pub struct MatchReducer;

impl MatchReducer {
    /// Creates a new `MatchReducer`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_start(
        state: &MatchState,
        striker: PlayerId,
        non_striker: PlayerId,
        bowler: PlayerId,
        batting_team: TeamId,
    ) -> Result<(), ScoringError> {
        match state.control.status {
            MatchStatus::Scheduled => {}
            MatchStatus::Live => {
                return Err(ScoringError::MatchAlreadyStarted {
                    match_id: state.control.id,
                });
            }
            MatchStatus::Completed => {
                return Err(ScoringError::MatchAlreadyCompleted {
                    match_id: state.control.id,
                });
            }
        }
        ensure_distinct_batsman(striker, Some(non_striker))?;

        let bowling_team = state.control.other_team(batting_team);
        let batting_roster = state.rosters.get(&batting_team).map_or(&[][..], Vec::as_slice);
        let bowling_roster = state.rosters.get(&bowling_team).map_or(&[][..], Vec::as_slice);
        ensure_eligible_bowler(bowler, batting_roster, bowling_roster)
    }

    /// Builds the delivery event for a `RecordBall` command from the
    /// current pointers and scoreboard position.
    fn build_delivery(
        state: &MatchState,
        runs_scored: u32,
        is_wicket: bool,
        extras: Option<u32>,
        extra_type: Option<ExtraType>,
        recorded_at: DateTime<Utc>,
    ) -> Result<BallEvent, ScoringError> {
        let (Some(striker), Some(non_striker), Some(bowler), Some(batting_team)) = (
            state.control.striker,
            state.control.non_striker,
            state.control.bowler,
            state.control.batting_team,
        ) else {
            return Err(ScoringError::PlayersNotSelected);
        };

        // The wire convention: an omitted extras amount defaults to 1 on a
        // scoreless extra, otherwise mirrors the run value.
        let extras = extras.unwrap_or(match extra_type {
            Some(_) if runs_scored == 0 => 1,
            Some(_) => runs_scored,
            None => 0,
        });

        Ok(BallEvent {
            match_id: state.control.id,
            innings: state.control.innings,
            over_number: state.board.valid_balls / 6,
            ball_number: state.board.valid_balls % 6 + 1,
            striker,
            non_striker,
            bowler,
            batting_team,
            runs_scored,
            is_wicket,
            extras,
            extra_type,
            is_valid_ball: delivery_is_valid(extra_type, &state.control.settings),
            recorded_at,
        })
    }

    /// Applies an event to state and bumps the control version.
    fn apply_event(state: &mut MatchState, action: &MatchAction) {
        match action {
            MatchAction::MatchStarted {
                toss_winner,
                toss_decision,
                batting_team,
                striker,
                non_striker,
                bowler,
                ..
            } => {
                state.control.status = MatchStatus::Live;
                state.control.toss_winner = Some(*toss_winner);
                state.control.toss_decision = Some(*toss_decision);
                state.control.batting_team = Some(*batting_team);
                state.control.striker = Some(*striker);
                state.control.non_striker = Some(*non_striker);
                state.control.bowler = Some(*bowler);
                state.control.pending = None;
            }
            MatchAction::BallRecorded { event } => {
                state.innings_events.push(event.clone());
                Self::apply_rotation(state, event);
            }
            MatchAction::BowlerSelected { bowler } => {
                state.control.bowler = Some(*bowler);
                if state.control.pending == Some(PendingSelection::Bowler) {
                    state.control.pending = None;
                }
            }
            MatchAction::BatsmanSelected { batsman } => {
                state.control.striker = Some(*batsman);
                if state.control.pending == Some(PendingSelection::Batsman) {
                    state.control.pending = None;
                }
            }
            MatchAction::InningsStarted {
                batting_team,
                striker,
                non_striker,
                bowler,
                ..
            } => {
                state.control.innings = state.control.innings.next();
                state.control.batting_team = Some(*batting_team);
                state.control.striker = Some(*striker);
                state.control.non_striker = Some(*non_striker);
                state.control.bowler = Some(*bowler);
                state.control.pending = None;
                state.innings_events.clear();
            }
            MatchAction::SettingsUpdated {
                rebowl_wide_or_no_ball,
            } => {
                state.control.settings.rebowl_wide_or_no_ball = *rebowl_wide_or_no_ball;
            }
            MatchAction::MatchCompleted {
                winning_team,
                man_of_the_match,
                result_description,
                ..
            } => {
                state.control.status = MatchStatus::Completed;
                state.control.winning_team = *winning_team;
                state.control.man_of_the_match = *man_of_the_match;
                state.control.result_description = result_description.clone();
                state.control.pending = None;
            }
            MatchAction::BallUndone { event } => {
                Self::apply_undo(state, event);
            }
            // Commands are not applied to state.
            MatchAction::StartMatch { .. }
            | MatchAction::RecordBall { .. }
            | MatchAction::SelectBowler { .. }
            | MatchAction::SelectBatsman { .. }
            | MatchAction::StartInnings { .. }
            | MatchAction::UpdateSettings { .. }
            | MatchAction::CompleteMatch { .. } => return,
        }
        state.control.bump_version();
        state.rebuild_board();
    }

    /// Rotation side effects of an accepted delivery, in order: odd-run
    /// striker swap, then fall-of-wicket handling, then over completion.
    fn apply_rotation(state: &mut MatchState, event: &BallEvent) {
        if event.runs_scored % 2 == 1 {
            std::mem::swap(&mut state.control.striker, &mut state.control.non_striker);
        }

        if event.is_wicket {
            let wickets_now =
                u32::try_from(state.innings_events.iter().filter(|e| e.is_wicket).count())
                    .unwrap_or(u32::MAX);
            let roster_size = state.batting_roster().len();
            let all_out = roster_size >= 2
                && wickets_now >= u32::try_from(roster_size - 1).unwrap_or(u32::MAX);
            if all_out {
                // No replacement batter left; the innings is over and no
                // selection is requested.
                state.control.pending = None;
            } else {
                state.control.striker = None;
                state.control.pending = Some(PendingSelection::Batsman);
            }
        }

        if event.is_valid_ball {
            let valid_now = u32::try_from(
                state
                    .innings_events
                    .iter()
                    .filter(|e| e.is_valid_ball)
                    .count(),
            )
            .unwrap_or(u32::MAX);
            if valid_now % 6 == 0 {
                let next_over_fits = state
                    .control
                    .overs_limit
                    .is_none_or(|limit| valid_now / 6 < limit);
                if next_over_fits {
                    state.control.bowler = None;
                    // A simultaneous wicket takes precedence in the pending
                    // slot; the empty bowler pointer still blocks deliveries
                    // until a new bowler is chosen.
                    if state.control.pending.is_none() {
                        state.control.pending = Some(PendingSelection::Bowler);
                    }
                }
                // Otherwise the innings is implicitly over: no new bowler
                // is requested and the overs-limit check rejects further
                // deliveries.
            }
        }
    }

    /// Applies an undo: the event is already removed from the durable log;
    /// drop it from the cache and discard any selection it had opened.
    ///
    /// Pointers are not rewound in the general case: an odd-run striker
    /// swap stays swapped. Only a pending selection the operator never
    /// completed is discarded, restoring the vacated pointer from the
    /// removed event itself.
    fn apply_undo(state: &mut MatchState, event: &BallEvent) {
        if let Some(last) = state.innings_events.last() {
            debug_assert_eq!(last, event, "undo cache out of sync with store");
        }
        state.innings_events.pop();

        match state.control.pending.take() {
            Some(PendingSelection::Bowler) => {
                state.control.bowler = Some(event.bowler);
            }
            Some(PendingSelection::Batsman) => {
                state.control.striker = Some(event.striker);
            }
            None => {}
        }
    }
}

impl Reducer for MatchReducer {
    type State = MatchState;
    type Action = MatchAction;
    type Error = ScoringError;
    type Environment = MatchEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<Effects, Self::Error> {
        match action {
            // ========== Commands ==========
            MatchAction::StartMatch {
                toss_winner,
                toss_decision,
                striker,
                non_striker,
                bowler,
            } => {
                let batting_team = match toss_decision {
                    TossDecision::Bat => toss_winner,
                    TossDecision::Bowl => state.control.other_team(toss_winner),
                };
                Self::validate_start(state, striker, non_striker, bowler, batting_team)?;

                let event = MatchAction::MatchStarted {
                    toss_winner,
                    toss_decision,
                    batting_team,
                    striker,
                    non_striker,
                    bowler,
                    started_at: env.clock.now(),
                };
                Self::apply_event(state, &event);
                Ok(smallvec![Effect::Notify])
            }

            MatchAction::RecordBall {
                runs_scored,
                is_wicket,
                extras,
                extra_type,
            } => {
                validate::validate_delivery(
                    &state.control,
                    &state.board,
                    state.batting_roster().len(),
                )?;
                let delivery = Self::build_delivery(
                    state,
                    runs_scored,
                    is_wicket,
                    extras,
                    extra_type,
                    env.clock.now(),
                )?;

                let event = MatchAction::BallRecorded {
                    event: delivery.clone(),
                };
                Self::apply_event(state, &event);
                Ok(smallvec![Effect::append(delivery), Effect::Notify])
            }

            MatchAction::SelectBowler { bowler } => {
                ensure_live(&state.control)?;
                ensure_eligible_bowler(bowler, state.batting_roster(), state.bowling_roster())?;

                let event = MatchAction::BowlerSelected { bowler };
                Self::apply_event(state, &event);
                Ok(smallvec![Effect::Notify])
            }

            MatchAction::SelectBatsman { batsman } => {
                ensure_live(&state.control)?;
                if state.control.striker.is_some()
                    && state.control.pending != Some(PendingSelection::Batsman)
                {
                    return Err(ScoringError::NoPendingSelection {
                        match_id: state.control.id,
                    });
                }
                ensure_distinct_batsman(batsman, state.control.non_striker)?;

                let event = MatchAction::BatsmanSelected { batsman };
                Self::apply_event(state, &event);
                Ok(smallvec![Effect::Notify])
            }

            MatchAction::StartInnings {
                striker,
                non_striker,
                bowler,
            } => {
                ensure_live(&state.control)?;
                if state.control.innings == Innings::Second {
                    return Err(ScoringError::InningsAlreadyStarted {
                        match_id: state.control.id,
                    });
                }
                ensure_distinct_batsman(striker, Some(non_striker))?;

                let Some(previous_batting) = state.control.batting_team else {
                    return Err(ScoringError::PlayersNotSelected);
                };
                let batting_team = state.control.other_team(previous_batting);
                let batting_roster =
                    state.rosters.get(&batting_team).map_or(&[][..], Vec::as_slice);
                let bowling_roster =
                    state.rosters.get(&previous_batting).map_or(&[][..], Vec::as_slice);
                ensure_eligible_bowler(bowler, batting_roster, bowling_roster)?;

                let event = MatchAction::InningsStarted {
                    batting_team,
                    striker,
                    non_striker,
                    bowler,
                    started_at: env.clock.now(),
                };
                Self::apply_event(state, &event);
                Ok(smallvec![Effect::Notify])
            }

            MatchAction::UpdateSettings {
                rebowl_wide_or_no_ball,
            } => {
                if state.control.status.is_completed() {
                    return Err(ScoringError::MatchAlreadyCompleted {
                        match_id: state.control.id,
                    });
                }

                let event = MatchAction::SettingsUpdated {
                    rebowl_wide_or_no_ball,
                };
                Self::apply_event(state, &event);
                Ok(smallvec![Effect::Notify])
            }

            MatchAction::CompleteMatch {
                winning_team,
                man_of_the_match,
                result_description,
            } => {
                if state.control.status.is_completed() {
                    return Err(ScoringError::MatchAlreadyCompleted {
                        match_id: state.control.id,
                    });
                }
                ensure_live(&state.control)?;

                let event = MatchAction::MatchCompleted {
                    winning_team,
                    man_of_the_match,
                    result_description,
                    completed_at: env.clock.now(),
                };
                Self::apply_event(state, &event);
                Ok(smallvec![Effect::Notify])
            }

            // ========== Events ==========
            // Applied directly: replay from the log or runtime-driven
            // undo application.
            event @ (MatchAction::MatchStarted { .. }
            | MatchAction::BallRecorded { .. }
            | MatchAction::BowlerSelected { .. }
            | MatchAction::BatsmanSelected { .. }
            | MatchAction::InningsStarted { .. }
            | MatchAction::SettingsUpdated { .. }
            | MatchAction::MatchCompleted { .. }
            | MatchAction::BallUndone { .. }) => {
                Self::apply_event(state, &event);
                Ok(Effects::new())
            }
        }
    }
}
