//! Ball events and their storage encoding.
//!
//! A [`BallEvent`] is the atomic fact of the scoring engine: one delivery,
//! recorded append-only and immutable once stored (the undo operation may
//! remove the most recent one, never edit it). All match figures are derived
//! from the ordered event sequence; nothing in an event is ever recomputed
//! retroactively.
//!
//! Events are encoded with `bincode` for storage. The [`LogEvent`] trait
//! carries a stable, versioned type tag (`"BallRecorded.v1"`) so the stored
//! representation can evolve without rewriting history.

use crate::types::{ExtraType, Innings, MatchId, PlayerId, TeamId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Errors raised while encoding or decoding events.
#[derive(Error, Debug)]
pub enum EventCodecError {
    /// Failed to serialize an event to bytes.
    #[error("Failed to serialize event: {0}")]
    Serialize(String),

    /// Failed to deserialize an event from bytes.
    #[error("Failed to deserialize event: {0}")]
    Deserialize(String),

    /// The stored event type tag is not one this build understands.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// An event that can be written to the append-only log and replayed.
///
/// The `event_type()` tag is stored next to the payload and includes a
/// version suffix (`"BallRecorded.v1"`) so schema evolution never requires
/// rewriting stored rows.
pub trait LogEvent: Send + Sync + 'static {
    /// Stable type tag for this event, including a version suffix.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventCodecError::Serialize`] if the event cannot be
    /// serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, EventCodecError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| EventCodecError::Serialize(e.to_string()))
    }

    /// Deserialize an event from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventCodecError::Deserialize`] if the bytes do not decode
    /// into this event type.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventCodecError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| EventCodecError::Deserialize(e.to_string()))
    }
}

/// One delivery, as recorded.
///
/// Over numbers are 0-based; ball numbers are 1-based within the over and
/// advance only on valid deliveries, so a re-bowled wide reuses its ball
/// number. `is_valid_ball` is computed against the settings in force at
/// record time and stored; flipping the re-bowl setting later does not
/// change events already in the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BallEvent {
    /// Match this delivery belongs to.
    pub match_id: MatchId,
    /// Innings this delivery belongs to.
    pub innings: Innings,
    /// Over number, 0-based.
    pub over_number: u32,
    /// Ball number within the over, 1-based.
    pub ball_number: u32,
    /// Batter on strike when the ball was bowled.
    pub striker: PlayerId,
    /// Batter at the non-striker's end.
    pub non_striker: PlayerId,
    /// Bowler of the delivery.
    pub bowler: PlayerId,
    /// Team batting when the ball was bowled.
    pub batting_team: TeamId,
    /// Runs scored off the bat.
    pub runs_scored: u32,
    /// Whether a wicket fell on this delivery.
    pub is_wicket: bool,
    /// Extras conceded on this delivery.
    pub extras: u32,
    /// Kind of extra, if any.
    pub extra_type: Option<ExtraType>,
    /// Whether this delivery counts toward the six-ball over.
    pub is_valid_ball: bool,
    /// When the delivery was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl BallEvent {
    /// Total runs this delivery added to the batting side's score.
    #[must_use]
    pub const fn total_runs(&self) -> u32 {
        self.runs_scored + self.extras
    }

    /// The scoreboard code for this delivery: the run value, `"W"` for a
    /// wicket, or the extra-type code.
    #[must_use]
    pub fn ball_code(&self) -> String {
        if self.is_wicket {
            "W".to_string()
        } else if let Some(extra) = self.extra_type {
            extra.code().to_string()
        } else {
            self.runs_scored.to_string()
        }
    }
}

impl LogEvent for BallEvent {
    fn event_type(&self) -> &'static str {
        "BallRecorded.v1"
    }
}

impl std::fmt::Display for BallEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} {} ({} runs, {} extras)",
            self.over_number,
            self.ball_number,
            self.ball_code(),
            self.runs_scored,
            self.extras
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::MatchId;

    fn delivery(runs: u32, wicket: bool, extra: Option<ExtraType>) -> BallEvent {
        BallEvent {
            match_id: MatchId::new(),
            innings: Innings::First,
            over_number: 0,
            ball_number: 1,
            striker: PlayerId::new(),
            non_striker: PlayerId::new(),
            bowler: PlayerId::new(),
            batting_team: TeamId::new(),
            runs_scored: runs,
            is_wicket: wicket,
            extras: if extra.is_some() { 1 } else { 0 },
            extra_type: extra,
            is_valid_ball: extra.is_none(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn event_type_is_versioned() {
        assert_eq!(delivery(0, false, None).event_type(), "BallRecorded.v1");
    }

    #[test]
    fn serialization_roundtrip() {
        let event = delivery(4, false, None);
        let bytes = event.to_bytes().unwrap();
        let decoded = BallEvent::from_bytes(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn total_runs_sums_bat_and_extras() {
        let mut event = delivery(2, false, Some(ExtraType::NoBall));
        event.extras = 1;
        assert_eq!(event.total_runs(), 3);
    }

    #[test]
    fn ball_codes() {
        assert_eq!(delivery(4, false, None).ball_code(), "4");
        assert_eq!(delivery(0, true, None).ball_code(), "W");
        assert_eq!(delivery(0, false, Some(ExtraType::Wide)).ball_code(), "wd");
        assert_eq!(
            delivery(0, false, Some(ExtraType::LegBye)).ball_code(),
            "lb"
        );
    }
}
