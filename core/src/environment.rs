//! Collaborator traits injected into the scoring engine.
//!
//! The facility system around the scoring core (membership, team
//! administration, authentication) is reached only through these traits.
//! Production wires the real collaborators; tests wire deterministic
//! implementations from `pavilion-testing`.

use crate::types::{MatchId, OperatorId, PlayerId, TeamId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Clock trait - abstracts time so reconstruction stays deterministic.
///
/// Only event *recording* reads the clock (to stamp `recorded_at`); the
/// state reconstructor never does.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Errors raised by the roster collaborator.
#[derive(Error, Debug, Clone)]
pub enum RosterError {
    /// The team is not known to the roster collaborator.
    #[error("Unknown team: {0}")]
    UnknownTeam(TeamId),

    /// The collaborator could not be reached.
    #[error("Roster lookup failed: {0}")]
    Unavailable(String),
}

/// Roster listing collaborator.
///
/// Team composition is owned by the facility's team administration; the
/// scoring core consumes the ordered player list to validate team
/// membership of bowlers and to compute the all-out threshold
/// (roster size − 1).
pub trait RosterProvider: Send + Sync {
    /// The ordered player list for a team.
    ///
    /// # Errors
    ///
    /// - [`RosterError::UnknownTeam`]: no such team.
    /// - [`RosterError::Unavailable`]: the collaborator could not answer.
    fn roster(
        &self,
        team: TeamId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PlayerId>, RosterError>> + Send + '_>>;
}

/// Permission gate collaborator.
///
/// Authorization policy lives in the facility's auth system, not in the
/// scoring core; the runtime merely consults this boolean gate before
/// dispatching an append or undo.
pub trait PermissionGate: Send + Sync {
    /// Whether `operator` may record or undo deliveries for `match_id`.
    fn may_score(
        &self,
        operator: OperatorId,
        match_id: MatchId,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn roster_error_names_team() {
        let team = TeamId::new();
        let error = RosterError::UnknownTeam(team);
        assert!(format!("{error}").contains(&team.to_string()));
    }
}
