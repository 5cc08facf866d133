//! Transition validation for the match controller.
//!
//! Every proposed mutation is checked here before anything is persisted.
//! Checks run in a fixed order and fail fast with a named
//! [`ScoringError`] variant, so the caller always gets a specific,
//! actionable rejection and never observes a partial state change.

use crate::scoreboard::Scoreboard;
use crate::types::{ExtraType, MatchControl, MatchId, MatchSettings, MatchStatus, PlayerId};
use thiserror::Error;

/// Validation errors for match transitions.
///
/// Each variant corresponds to one rejected precondition; nothing is
/// persisted when any of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    /// The match is not live, so no deliveries or rotations are accepted.
    #[error("Match {match_id} is {status}, not live")]
    MatchNotLive {
        /// The match being scored.
        match_id: MatchId,
        /// Its actual status.
        status: MatchStatus,
    },

    /// Striker or bowler pointer is unset (including a pending selection
    /// the operator has not completed).
    #[error("Striker and bowler must be selected before the next delivery")]
    PlayersNotSelected,

    /// The configured overs limit has been reached; no further deliveries
    /// in this innings.
    #[error("Overs limit of {limit} reached; no further deliveries this innings")]
    OversLimitReached {
        /// The configured limit.
        limit: u32,
    },

    /// The batting side is all out; no further deliveries until the
    /// innings transition.
    #[error("Side is all out with {wickets} wickets; innings is over")]
    AllOut {
        /// Wickets fallen.
        wickets: u32,
    },

    /// The proposed bowler is not eligible to bowl.
    #[error("Bowler {bowler} cannot bowl: {reason}")]
    InvalidBowler {
        /// The proposed bowler.
        bowler: PlayerId,
        /// Why the selection was rejected.
        reason: String,
    },

    /// The proposed batsman is already at the crease.
    #[error("Batsman {batsman} is already at the crease")]
    DuplicateBatsman {
        /// The proposed batsman.
        batsman: PlayerId,
    },

    /// Start requested on a match that already left the scheduled state.
    #[error("Match {match_id} has already started")]
    MatchAlreadyStarted {
        /// The match in question.
        match_id: MatchId,
    },

    /// Mutation requested on a completed match.
    #[error("Match {match_id} is completed; no further changes accepted")]
    MatchAlreadyCompleted {
        /// The match in question.
        match_id: MatchId,
    },

    /// Innings transition requested when the second innings is already
    /// under way.
    #[error("Match {match_id} is already in its second innings")]
    InningsAlreadyStarted {
        /// The match in question.
        match_id: MatchId,
    },

    /// Batsman selection with no vacant slot to fill.
    #[error("No batsman selection is pending for match {match_id}")]
    NoPendingSelection {
        /// The match in question.
        match_id: MatchId,
    },
}

/// Computes whether a delivery counts toward the six-ball over.
///
/// Validity is decided by the settings in force *at record time* and stored
/// on the event; flipping the re-bowl setting later never reclassifies
/// history.
#[must_use]
pub fn delivery_is_valid(extra_type: Option<ExtraType>, settings: &MatchSettings) -> bool {
    match extra_type {
        Some(extra) if extra.is_rebowlable() => !settings.rebowl_wide_or_no_ball,
        _ => true,
    }
}

/// Check 1: the match must be live.
///
/// # Errors
///
/// [`ScoringError::MatchNotLive`] otherwise.
pub fn ensure_live(control: &MatchControl) -> Result<(), ScoringError> {
    if control.status.is_live() {
        Ok(())
    } else {
        Err(ScoringError::MatchNotLive {
            match_id: control.id,
            status: control.status,
        })
    }
}

/// Check 2: striker and bowler pointers must both be set.
///
/// A pending selection leaves one of them empty, so an over-boundary or
/// fall-of-wicket pause naturally rejects deliveries until the operator
/// completes the selection.
///
/// # Errors
///
/// [`ScoringError::PlayersNotSelected`] otherwise.
pub fn ensure_players_selected(control: &MatchControl) -> Result<(), ScoringError> {
    if control.striker.is_some() && control.bowler.is_some() {
        Ok(())
    } else {
        Err(ScoringError::PlayersNotSelected)
    }
}

/// Check 3: the configured overs limit must not already be reached.
///
/// # Errors
///
/// [`ScoringError::OversLimitReached`] once `valid_balls` amounts to the
/// limit.
pub fn ensure_overs_remaining(
    control: &MatchControl,
    valid_balls: u32,
) -> Result<(), ScoringError> {
    match control.overs_limit {
        Some(limit) if crate::types::Overs::from_valid_balls(valid_balls).reached(limit) => {
            Err(ScoringError::OversLimitReached { limit })
        }
        _ => Ok(()),
    }
}

/// Check 4: the batting side must not already be all out.
///
/// All out means wickets == roster size − 1 (no replacement batter
/// available). Enforced here rather than at the UI boundary, so a stray
/// delivery submitted after the last wicket is rejected instead of
/// silently corrupting the innings.
///
/// # Errors
///
/// [`ScoringError::AllOut`] otherwise.
pub fn ensure_not_all_out(wickets: u32, roster_size: usize) -> Result<(), ScoringError> {
    let threshold = u32::try_from(roster_size.saturating_sub(1)).unwrap_or(u32::MAX);
    if roster_size >= 2 && wickets >= threshold {
        Err(ScoringError::AllOut { wickets })
    } else {
        Ok(())
    }
}

/// Runs the full pre-delivery check chain, in order, failing on the first
/// violation.
///
/// # Errors
///
/// The first failing check's error: [`ScoringError::MatchNotLive`],
/// [`ScoringError::PlayersNotSelected`], [`ScoringError::OversLimitReached`]
/// or [`ScoringError::AllOut`].
pub fn validate_delivery(
    control: &MatchControl,
    board: &Scoreboard,
    batting_roster_size: usize,
) -> Result<(), ScoringError> {
    ensure_live(control)?;
    ensure_players_selected(control)?;
    ensure_overs_remaining(control, board.valid_balls)?;
    ensure_not_all_out(board.wickets, batting_roster_size)?;
    Ok(())
}

/// Validates a bowler (re)selection: the bowler must belong to the bowling
/// team and never to the batting team.
///
/// # Errors
///
/// [`ScoringError::InvalidBowler`] with the specific reason.
pub fn ensure_eligible_bowler(
    bowler: PlayerId,
    batting_roster: &[PlayerId],
    bowling_roster: &[PlayerId],
) -> Result<(), ScoringError> {
    if batting_roster.contains(&bowler) {
        return Err(ScoringError::InvalidBowler {
            bowler,
            reason: "bowler cannot be from the batting team".to_string(),
        });
    }
    if !bowling_roster.contains(&bowler) {
        return Err(ScoringError::InvalidBowler {
            bowler,
            reason: "bowler is not on the bowling team's roster".to_string(),
        });
    }
    Ok(())
}

/// Validates a batsman selection: the newcomer must differ from the batter
/// already at the crease.
///
/// # Errors
///
/// [`ScoringError::DuplicateBatsman`] otherwise.
pub fn ensure_distinct_batsman(
    batsman: PlayerId,
    at_crease: Option<PlayerId>,
) -> Result<(), ScoringError> {
    if at_crease == Some(batsman) {
        Err(ScoringError::DuplicateBatsman { batsman })
    } else {
        Ok(())
    }
}
