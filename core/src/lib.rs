//! # Pavilion Core
//!
//! Domain core of the Pavilion live cricket-scoring engine.
//!
//! The engine is event-sourced: an append-only log of [`event::BallEvent`]s
//! is the source of truth, and every match figure (score, wickets, overs,
//! run rate, live player stats) is derived from it by the pure
//! [`scoreboard::Scoreboard`] reconstructor. Mutations flow through the
//! [`controller::MatchReducer`] state machine, which validates transitions
//! ([`validate`]), applies accepted events, and describes side effects
//! ([`effect`]) for the runtime to execute.
//!
//! ## Core Concepts
//!
//! - **State**: [`controller::MatchState`], the versioned control record with
//!   cached rosters, the current innings' event slice, and the derived
//!   scoreboard.
//! - **Action**: [`controller::MatchAction`], operator commands and the
//!   events they become.
//! - **Reducer**: pure function `(State, Action, Environment) → Result<Effects, Error>`
//! - **Effect**: side-effect descriptions (persist, notify), not execution
//! - **Environment**: injected collaborators via traits ([`environment`])
//!
//! ## Architecture Principles
//!
//! - Functional core, imperative shell: this crate performs no I/O
//! - Rejections are typed and happen before any state mutation
//! - Derived state is recomputed from the log, never incrementally trusted
//! - External collaborators (rosters, permissions, persistence, transport)
//!   sit behind traits

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::SmallVec;

/// Broadcast channel abstraction: the payload-free "match changed" signal.
pub mod channel;

/// The match controller state machine: state, actions, reducer.
pub mod controller;

/// Side-effect descriptions returned by the reducer.
pub mod effect;

/// Collaborator traits: clock, rosters, permission gate.
pub mod environment;

/// Ball events and their storage encoding.
pub mod event;

/// Wire payloads exchanged with the surrounding facility system.
pub mod payload;

/// The derived scoreboard and its pure reconstructor.
pub mod scoreboard;

/// The append-only ball-event store abstraction.
pub mod store;

/// Domain identifiers and match-control types.
pub mod types;

/// Transition validation and the scoring error taxonomy.
pub mod validate;

/// Reducer module - the core trait for the match state machine.
///
/// Reducers are pure: `(State, Action, Environment) → Result<Effects, Error>`.
/// A rejected action returns `Err` before any state mutation, so callers
/// never observe a partial transition, which is the error contract the scoring
/// engine's validator demands.
pub mod reducer {
    use crate::effect::Effects;

    /// The Reducer trait - core abstraction for the match state machine.
    ///
    /// # Type Parameters
    ///
    /// - `State`: the domain state this reducer operates on
    /// - `Action`: the action type this reducer processes
    /// - `Error`: the typed rejection surfaced to the caller
    /// - `Environment`: the injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on.
        type State;

        /// The action type this reducer processes.
        type Action;

        /// The typed rejection for invalid transitions.
        type Error;

        /// The environment type with injected dependencies.
        type Environment;

        /// Reduce an action into state changes and effects.
        ///
        /// Accepted actions mutate state in place and return the effects
        /// the runtime must execute. Rejected actions return `Err` with no
        /// state change.
        ///
        /// # Errors
        ///
        /// The reducer's `Error` type, naming the violated precondition.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<Effects, Self::Error>;
    }
}
