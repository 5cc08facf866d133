//! PostgreSQL-backed append-only ball-event store.
//!
//! One row per delivery. The `sequence` column (BIGSERIAL) is the append
//! order and the only ordering key; match/innings/over/ball columns exist
//! for querying, while the authoritative event payload is the bincode
//! `event_data` column. Rows are never updated: they enter through
//! `append` and leave only through `remove_last`.

use pavilion_core::event::{BallEvent, LogEvent};
use pavilion_core::store::{BallEventStore, EventStoreError, Sequence, StoredBallEvent};
use pavilion_core::types::{Innings, MatchId};
use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;

/// Maps one fetched row into a stored event.
fn row_to_stored(sequence: i64, event_data: &[u8]) -> Result<StoredBallEvent, EventStoreError> {
    let sequence = u64::try_from(sequence)
        .map(Sequence::new)
        .map_err(|_| EventStoreError::Storage(format!("negative sequence {sequence}")))?;
    let event = BallEvent::from_bytes(event_data)
        .map_err(|e| EventStoreError::Serialization(e.to_string()))?;
    Ok(StoredBallEvent { sequence, event })
}

/// `PostgreSQL` implementation of [`BallEventStore`].
///
/// # Example
///
/// ```no_run
/// use pavilion_postgres::PostgresBallEventStore;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresBallEventStore::new(pool);
/// store.ensure_schema().await?;
/// # Ok(())
/// # }
/// ```
pub struct PostgresBallEventStore {
    pool: PgPool,
}

impl PostgresBallEventStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `ball_events` table and its index if missing.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Storage`] if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), EventStoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS ball_events (
                sequence    BIGSERIAL PRIMARY KEY,
                match_id    UUID NOT NULL,
                innings     SMALLINT NOT NULL,
                over_number INTEGER NOT NULL,
                ball_number INTEGER NOT NULL,
                event_type  TEXT NOT NULL,
                event_data  BYTEA NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_ball_events_match_innings
            ON ball_events (match_id, innings, sequence)
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        tracing::info!("ball_events schema ensured");
        Ok(())
    }
}

impl BallEventStore for PostgresBallEventStore {
    fn append(
        &self,
        event: BallEvent,
        expected: Option<Sequence>,
    ) -> Pin<Box<dyn Future<Output = Result<StoredBallEvent, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let event_data = event
                .to_bytes()
                .map_err(|e| EventStoreError::Serialization(e.to_string()))?;

            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| EventStoreError::Storage(e.to_string()))?;

            if let Some(expected) = expected {
                // Lock the newest row for this match so racing writers
                // serialize on the conflict check.
                let latest: Option<(i64,)> = sqlx::query_as(
                    r"
                    SELECT sequence FROM ball_events
                    WHERE match_id = $1
                    ORDER BY sequence DESC
                    LIMIT 1
                    FOR UPDATE
                    ",
                )
                .bind(event.match_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| EventStoreError::Storage(e.to_string()))?;

                let actual = latest
                    .map_or(Ok(Sequence::new(0)), |(seq,)| {
                        u64::try_from(seq).map(Sequence::new).map_err(|_| {
                            EventStoreError::Storage(format!("negative sequence {seq}"))
                        })
                    })?;
                if actual != expected {
                    return Err(EventStoreError::ConcurrencyConflict {
                        match_id: event.match_id,
                        expected,
                        actual,
                    });
                }
            }

            let (sequence,): (i64,) = sqlx::query_as(
                r"
                INSERT INTO ball_events (
                    match_id, innings, over_number, ball_number,
                    event_type, event_data, recorded_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING sequence
                ",
            )
            .bind(event.match_id.as_uuid())
            .bind(i16::from(event.innings.number()))
            .bind(i64::from(event.over_number))
            .bind(i64::from(event.ball_number))
            .bind(event.event_type())
            .bind(&event_data)
            .bind(event.recorded_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| EventStoreError::Storage(e.to_string()))?;

            tx.commit()
                .await
                .map_err(|e| EventStoreError::Storage(e.to_string()))?;

            metrics::counter!("event_store.appended").increment(1);
            tracing::debug!(
                match_id = %event.match_id,
                sequence,
                over = event.over_number,
                ball = event.ball_number,
                "Ball event appended"
            );

            let sequence = u64::try_from(sequence)
                .map(Sequence::new)
                .map_err(|_| EventStoreError::Storage(format!("negative sequence {sequence}")))?;
            Ok(StoredBallEvent { sequence, event })
        })
    }

    fn list_for_innings(
        &self,
        match_id: MatchId,
        innings: Innings,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<StoredBallEvent>, EventStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let rows: Vec<(i64, Vec<u8>)> = sqlx::query_as(
                r"
                SELECT sequence, event_data FROM ball_events
                WHERE match_id = $1 AND innings = $2
                ORDER BY sequence ASC
                ",
            )
            .bind(match_id.as_uuid())
            .bind(i16::from(innings.number()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EventStoreError::Storage(e.to_string()))?;

            rows.iter()
                .map(|(sequence, data)| row_to_stored(*sequence, data))
                .collect()
        })
    }

    fn remove_last(
        &self,
        match_id: MatchId,
    ) -> Pin<Box<dyn Future<Output = Result<StoredBallEvent, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let removed: Option<(i64, Vec<u8>)> = sqlx::query_as(
                r"
                DELETE FROM ball_events
                WHERE sequence = (
                    SELECT sequence FROM ball_events
                    WHERE match_id = $1
                    ORDER BY sequence DESC
                    LIMIT 1
                )
                RETURNING sequence, event_data
                ",
            )
            .bind(match_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EventStoreError::Storage(e.to_string()))?;

            let Some((sequence, data)) = removed else {
                return Err(EventStoreError::EmptyLog(match_id));
            };

            metrics::counter!("event_store.removed").increment(1);
            tracing::debug!(match_id = %match_id, sequence, "Ball event removed by undo");

            row_to_stored(sequence, &data)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pavilion_core::types::{PlayerId, TeamId};

    fn delivery() -> BallEvent {
        BallEvent {
            match_id: MatchId::new(),
            innings: Innings::First,
            over_number: 3,
            ball_number: 4,
            striker: PlayerId::new(),
            non_striker: PlayerId::new(),
            bowler: PlayerId::new(),
            batting_team: TeamId::new(),
            runs_scored: 2,
            is_wicket: false,
            extras: 0,
            extra_type: None,
            is_valid_ball: true,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn row_mapping_roundtrips_the_event() {
        let event = delivery();
        let bytes = event.to_bytes().unwrap();

        let stored = row_to_stored(42, &bytes).unwrap();
        assert_eq!(stored.sequence, Sequence::new(42));
        assert_eq!(stored.event, event);
    }

    #[test]
    fn corrupt_payloads_surface_as_serialization_errors() {
        let result = row_to_stored(1, &[0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(result, Err(EventStoreError::Serialization(_))));
    }

    #[test]
    fn negative_sequences_are_storage_errors() {
        let event = delivery();
        let bytes = event.to_bytes().unwrap();
        let result = row_to_stored(-5, &bytes);
        assert!(matches!(result, Err(EventStoreError::Storage(_))));
    }
}
