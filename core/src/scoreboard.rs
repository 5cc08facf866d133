//! Derived match state: the scoreboard.
//!
//! [`Scoreboard::rebuild`] is a pure function from the current innings'
//! ordered event sequence plus the control pointers to the live figures.
//! It reads no clock and no other hidden input, so recomputing from the
//! same sequence always yields the same board. Clients receiving a change
//! signal can re-derive locally instead of trusting a delta payload, and
//! the runtime recomputes after every append and undo rather than keeping
//! an authoritative incremental cache.

use crate::event::BallEvent;
use crate::types::{MatchControl, Overs, PlayerId};
use serde::{Deserialize, Serialize};

/// Live batting figures for one batter at the crease.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatterFigures {
    /// The batter.
    pub player: PlayerId,
    /// Runs scored off the bat this innings.
    pub runs: u32,
    /// Valid deliveries faced this innings.
    pub balls: u32,
}

/// Live bowling figures for the current bowler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BowlerFigures {
    /// The bowler.
    pub player: PlayerId,
    /// Wickets taken this innings.
    pub wickets: u32,
    /// Valid deliveries bowled this innings.
    pub balls: u32,
}

/// The derived state of one innings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scoreboard {
    /// Total runs: Σ(runs scored + extras) over the innings.
    pub score: u32,
    /// Wickets fallen.
    pub wickets: u32,
    /// Valid deliveries bowled.
    pub valid_balls: u32,
    /// Overs figure derived from the valid-ball count.
    pub overs: Overs,
    /// Runs per over so far; `0.0` before the first valid ball.
    pub run_rate: f64,
    /// Figures for the batter on strike, when one is selected.
    pub striker: Option<BatterFigures>,
    /// Figures for the batter at the non-striker's end, when one is
    /// selected.
    pub non_striker: Option<BatterFigures>,
    /// Figures for the current bowler, when one is selected.
    pub bowler: Option<BowlerFigures>,
    /// Ball codes for the current over, oldest first.
    pub this_over: Vec<String>,
}

impl Scoreboard {
    /// The board before any delivery has been bowled.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            score: 0,
            wickets: 0,
            valid_balls: 0,
            overs: Overs {
                completed: 0,
                balls: 0,
            },
            run_rate: 0.0,
            striker: None,
            non_striker: None,
            bowler: None,
            this_over: Vec::new(),
        }
    }

    /// Rebuilds the board from the current innings' ordered event sequence
    /// and the control record's player pointers.
    ///
    /// `events` must be the current innings only, in append order; the
    /// caller (the match controller) maintains that scope. Per-player
    /// figures are computed for whoever the control record currently
    /// points at, so a pointer change alone changes the board.
    #[must_use]
    pub fn rebuild(events: &[BallEvent], control: &MatchControl) -> Self {
        let score = events.iter().map(BallEvent::total_runs).sum();
        let wickets = u32::try_from(events.iter().filter(|e| e.is_wicket).count())
            .unwrap_or(u32::MAX);
        let valid_balls = u32::try_from(events.iter().filter(|e| e.is_valid_ball).count())
            .unwrap_or(u32::MAX);
        let overs = Overs::from_valid_balls(valid_balls);

        let run_rate = if valid_balls == 0 {
            0.0
        } else {
            f64::from(score) / f64::from(valid_balls) * 6.0
        };

        let this_over = events
            .iter()
            .filter(|e| e.over_number == overs.completed)
            .map(BallEvent::ball_code)
            .collect();

        Self {
            score,
            wickets,
            valid_balls,
            overs,
            run_rate,
            striker: control.striker.map(|p| Self::batter_figures(events, p)),
            non_striker: control.non_striker.map(|p| Self::batter_figures(events, p)),
            bowler: control.bowler.map(|p| Self::bowler_figures(events, p)),
            this_over,
        }
    }

    fn batter_figures(events: &[BallEvent], player: PlayerId) -> BatterFigures {
        let mut runs = 0;
        let mut balls = 0;
        for event in events.iter().filter(|e| e.striker == player) {
            runs += event.runs_scored;
            if event.is_valid_ball {
                balls += 1;
            }
        }
        BatterFigures {
            player,
            runs,
            balls,
        }
    }

    fn bowler_figures(events: &[BallEvent], player: PlayerId) -> BowlerFigures {
        let mut wickets = 0;
        let mut balls = 0;
        for event in events.iter().filter(|e| e.bowler == player) {
            if event.is_wicket {
                wickets += 1;
            }
            if event.is_valid_ball {
                balls += 1;
            }
        }
        BowlerFigures {
            player,
            wickets,
            balls,
        }
    }
}

impl Default for Scoreboard {
    fn default() -> Self {
        Self::empty()
    }
}
