//! Side-effect descriptions returned by the match reducer.
//!
//! Effects are values, not execution: the reducer stays pure and the
//! runtime interprets the descriptions: appending to the durable event
//! store, then emitting the change signal. Execution order follows the
//! returned order, and the append must be acknowledged before anything
//! downstream of it runs.

use crate::event::BallEvent;
use smallvec::SmallVec;

/// A side effect the runtime must perform after an accepted transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// No-op effect.
    None,

    /// Persist a ball event to the append-only store. The transition is
    /// not committed until the store acknowledges.
    Append(Box<BallEvent>),

    /// Emit the payload-free "match changed" signal to subscribers.
    Notify,
}

impl Effect {
    /// Convenience constructor for an append effect.
    #[must_use]
    pub fn append(event: BallEvent) -> Self {
        Self::Append(Box::new(event))
    }
}

/// Effect list returned by a reducer.
///
/// Inline capacity of four covers every transition the controller produces
/// without allocating.
pub type Effects = SmallVec<[Effect; 4]>;
