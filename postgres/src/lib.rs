//! # Pavilion Postgres
//!
//! Durable `PostgreSQL` persistence for the Pavilion scoring engine: the
//! production implementation of the append-only
//! [`pavilion_core::store::BallEventStore`].
//!
//! Queries are plain runtime `sqlx::query` strings, so building this crate
//! requires no live database; schema creation is handled by
//! [`PostgresBallEventStore::ensure_schema`].

/// PostgreSQL-backed append-only ball-event store.
pub mod event_store;

pub use event_store::PostgresBallEventStore;
