//! End-to-end match flows over the in-memory store and channel.
//!
//! Run with: `cargo test --test match_flow`

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use pavilion_core::controller::{MatchAction, MatchEnvironment};
use pavilion_core::store::EventStoreError;
use pavilion_core::types::{ExtraType, MatchSettings, OperatorId, PlayerId, TossDecision};
use pavilion_core::validate::ScoringError;
use pavilion_runtime::{
    ControllerError, MatchRegistry, MatchStore, MatchStoreConfig, RetryPolicy,
};
use pavilion_testing::fixtures::MatchFixture;
use pavilion_testing::{AllowAll, DenyAll, InMemoryBallEventStore, RecordingMatchChannel, test_clock};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    fixture: MatchFixture,
    store: Arc<MatchStore>,
    events: Arc<InMemoryBallEventStore>,
    channel: Arc<RecordingMatchChannel>,
    operator: OperatorId,
}

async fn harness(fixture: MatchFixture) -> Harness {
    harness_with(fixture, MatchStoreConfig::default(), true).await
}

async fn harness_with(fixture: MatchFixture, config: MatchStoreConfig, allow: bool) -> Harness {
    let events = Arc::new(InMemoryBallEventStore::new());
    let channel = Arc::new(RecordingMatchChannel::new());
    let permissions: Arc<dyn pavilion_core::environment::PermissionGate> = if allow {
        Arc::new(AllowAll)
    } else {
        Arc::new(DenyAll)
    };

    let registry = MatchRegistry::with_config(
        MatchEnvironment::new(Arc::new(test_clock())),
        Arc::clone(&events) as Arc<dyn pavilion_core::store::BallEventStore>,
        Arc::clone(&channel) as Arc<dyn pavilion_core::channel::MatchChannel>,
        Arc::new(fixture.static_rosters()),
        permissions,
        config,
    );

    let store = registry.open(fixture.setup()).await.unwrap();
    Harness {
        fixture,
        store,
        events,
        channel,
        operator: OperatorId::new(),
    }
}

impl Harness {
    async fn start_match(&self) {
        self.store
            .send(
                self.operator,
                MatchAction::StartMatch {
                    toss_winner: self.fixture.home_team,
                    toss_decision: TossDecision::Bat,
                    striker: self.fixture.home_players[0],
                    non_striker: self.fixture.home_players[1],
                    bowler: self.fixture.away_players[0],
                },
            )
            .await
            .expect("match should start");
    }

    async fn record(&self, runs: u32, wicket: bool, extra: Option<ExtraType>) -> Result<(), ControllerError> {
        self.store
            .send(
                self.operator,
                MatchAction::RecordBall {
                    runs_scored: runs,
                    is_wicket: wicket,
                    extras: None,
                    extra_type: extra,
                },
            )
            .await
    }

    async fn select_bowler(&self, bowler: PlayerId) {
        self.store
            .send(self.operator, MatchAction::SelectBowler { bowler })
            .await
            .expect("bowler selection should be accepted");
    }

    async fn select_batsman(&self, batsman: PlayerId) {
        self.store
            .send(self.operator, MatchAction::SelectBatsman { batsman })
            .await
            .expect("batsman selection should be accepted");
    }
}

// ========== Scenario A: overs limit ==========

#[tokio::test]
async fn scenario_a_overs_limit_ends_the_innings() {
    let h = harness(MatchFixture::new(11).with_overs_limit(2)).await;
    h.start_match().await;

    // Two full overs of singles, with the mandatory bowler change between
    // them.
    for ball in 0..12 {
        if ball == 6 {
            h.select_bowler(h.fixture.away_players[1]).await;
        }
        h.record(1, false, None).await.expect("delivery in the limit");
    }

    let board = h.store.scoreboard().await;
    assert_eq!(board.score, 12);
    assert_eq!(board.wickets, 0);
    assert_eq!(board.overs, "2.0");

    // No new bowler was requested at the limit; the innings is over.
    let pending = h.store.state(|s| s.control.pending).await;
    assert_eq!(pending, None);

    // One more delivery attempt is rejected with the named error.
    let rejected = h.record(1, false, None).await;
    assert!(matches!(
        rejected,
        Err(ControllerError::Rejected(ScoringError::OversLimitReached { limit: 2 }))
    ));

    // Nothing extra was persisted.
    assert_eq!(h.events.event_count(h.fixture.match_id).await, 12);
}

// ========== Scenario B: all out ==========

#[tokio::test]
async fn scenario_b_ten_wickets_are_all_out() {
    let h = harness(MatchFixture::new(11)).await;
    h.start_match().await;

    let mut next_batsman = 2;
    let mut valid_balls = 0_u32;
    for wicket in 1..=10 {
        h.record(0, true, None).await.expect("wicket delivery");
        valid_balls += 1;

        if wicket < 10 {
            // A replacement is requested for every wicket but the last.
            let pending = h.store.state(|s| s.control.pending).await;
            assert_eq!(pending, Some(pavilion_core::types::PendingSelection::Batsman));
            h.select_batsman(h.fixture.home_players[next_batsman]).await;
            next_batsman += 1;
        }

        // The over change between wickets 6 and 7.
        if valid_balls % 6 == 0 {
            h.select_bowler(h.fixture.away_players[usize::try_from(valid_balls / 6).unwrap()])
                .await;
        }
    }

    // After the tenth wicket: all out, no replacement requested.
    let (pending, striker) = h
        .store
        .state(|s| (s.control.pending, s.control.striker))
        .await;
    assert_eq!(pending, None);
    assert!(striker.is_some());

    let board = h.store.scoreboard().await;
    assert_eq!(board.wickets, 10);

    // Any further delivery is rejected outright.
    let rejected = h.record(0, false, None).await;
    assert!(matches!(
        rejected,
        Err(ControllerError::Rejected(ScoringError::AllOut { wickets: 10 }))
    ));
}

// ========== Scenarios C/D: the re-bowl rule ==========

#[tokio::test]
async fn scenario_c_wide_with_rebowl_does_not_count() {
    let h = harness(MatchFixture::new(11)).await;
    h.start_match().await;

    h.record(0, false, Some(ExtraType::Wide)).await.unwrap();

    let board = h.store.scoreboard().await;
    assert_eq!(board.score, 1);
    assert_eq!(board.overs, "0.0");

    let stored = h.events.all_events(h.fixture.match_id).await;
    assert!(!stored[0].event.is_valid_ball);
}

#[tokio::test]
async fn scenario_d_wide_without_rebowl_counts() {
    let h = harness(MatchFixture::new(11).with_settings(MatchSettings {
        rebowl_wide_or_no_ball: false,
    }))
    .await;
    h.start_match().await;

    h.record(0, false, Some(ExtraType::Wide)).await.unwrap();

    let board = h.store.scoreboard().await;
    assert_eq!(board.score, 1);
    assert_eq!(board.overs, "0.1");

    let stored = h.events.all_events(h.fixture.match_id).await;
    assert!(stored[0].event.is_valid_ball);
}

// ========== Scenario E: invalid bowler ==========

#[tokio::test]
async fn scenario_e_batting_team_bowler_is_rejected() {
    let h = harness(MatchFixture::new(11)).await;
    h.start_match().await;
    h.record(2, false, None).await.unwrap();
    let before = h.store.scoreboard().await;

    let rejected = h
        .store
        .send(
            h.operator,
            MatchAction::SelectBowler {
                bowler: h.fixture.home_players[4],
            },
        )
        .await;
    assert!(matches!(
        rejected,
        Err(ControllerError::Rejected(ScoringError::InvalidBowler { .. }))
    ));

    // Derived state is unchanged by the rejection.
    assert_eq!(h.store.scoreboard().await, before);
}

// ========== Undo ==========

#[tokio::test]
async fn undo_restores_the_previous_figures() {
    let h = harness(MatchFixture::new(11)).await;
    h.start_match().await;

    h.record(1, false, None).await.unwrap();
    let before = h.store.scoreboard().await;

    h.record(4, false, None).await.unwrap();
    assert_eq!(h.store.scoreboard().await.score, 5);

    h.store.undo(h.operator).await.unwrap();

    let after = h.store.scoreboard().await;
    assert_eq!(after.score, before.score);
    assert_eq!(after.wickets, before.wickets);
    assert_eq!(after.overs, before.overs);
    assert_eq!(h.events.event_count(h.fixture.match_id).await, 1);
}

#[tokio::test]
async fn undo_on_an_empty_log_is_a_typed_no_op() {
    let h = harness(MatchFixture::new(11)).await;
    h.start_match().await;

    for _ in 0..2 {
        let result = h.store.undo(h.operator).await;
        assert!(matches!(
            result,
            Err(ControllerError::Store(EventStoreError::EmptyLog(id))) if id == h.fixture.match_id
        ));
    }

    // State untouched.
    assert_eq!(h.store.scoreboard().await.score, 0);
}

#[tokio::test]
async fn undo_is_scoped_to_the_current_innings() {
    let h = harness(MatchFixture::new(11)).await;
    h.start_match().await;
    h.record(4, false, None).await.unwrap();

    // Move to the second innings; its log is empty even though the match
    // has a first-innings delivery.
    h.store
        .send(
            h.operator,
            MatchAction::StartInnings {
                striker: h.fixture.away_players[0],
                non_striker: h.fixture.away_players[1],
                bowler: h.fixture.home_players[0],
            },
        )
        .await
        .unwrap();

    let result = h.store.undo(h.operator).await;
    assert!(matches!(
        result,
        Err(ControllerError::Store(EventStoreError::EmptyLog(_)))
    ));
    // The first-innings delivery is still in the durable log.
    assert_eq!(h.events.event_count(h.fixture.match_id).await, 1);
}

// ========== Broadcast ==========

#[tokio::test]
async fn every_successful_mutation_emits_one_signal() {
    let h = harness(MatchFixture::new(11)).await;

    h.start_match().await;
    h.record(1, false, None).await.unwrap();
    h.record(0, true, None).await.unwrap();
    h.select_batsman(h.fixture.home_players[2]).await;
    h.store.undo(h.operator).await.unwrap();

    // start + ball + wicket + selection + undo
    assert_eq!(h.channel.notified(h.fixture.match_id), 5);
}

#[tokio::test]
async fn rejected_mutations_emit_no_signal() {
    let h = harness(MatchFixture::new(11)).await;
    h.start_match().await;
    let baseline = h.channel.notified(h.fixture.match_id);

    let rejected = h
        .store
        .send(
            h.operator,
            MatchAction::SelectBowler {
                bowler: h.fixture.home_players[0],
            },
        )
        .await;
    assert!(rejected.is_err());
    assert_eq!(h.channel.notified(h.fixture.match_id), baseline);
}

#[tokio::test]
async fn subscribers_re_fetch_on_the_signal() {
    let h = harness(MatchFixture::new(11)).await;
    h.start_match().await;

    let mut subscription = h.store.subscribe().await.unwrap();
    h.record(6, false, None).await.unwrap();

    let signal = subscription.changed().await.unwrap();
    assert_eq!(signal.match_id, h.fixture.match_id);

    // The signal carries no figures; the client re-pulls the board.
    let board = h.store.scoreboard().await;
    assert_eq!(board.score, 6);
}

// ========== Concurrency ==========

#[tokio::test]
async fn concurrent_deliveries_serialize_without_gaps() {
    let h = harness(MatchFixture::new(11)).await;
    h.start_match().await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let store = Arc::clone(&h.store);
        let operator = h.operator;
        handles.push(tokio::spawn(async move {
            store
                .send(
                    operator,
                    MatchAction::RecordBall {
                        runs_scored: 1,
                        is_wicket: false,
                        extras: None,
                        extra_type: None,
                    },
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let board = h.store.scoreboard().await;
    assert_eq!(board.score, 5);
    assert_eq!(board.overs, "0.5");

    // Ball numbering is gap-free and duplicate-free.
    let mut numbers: Vec<u32> = h
        .events
        .all_events(h.fixture.match_id)
        .await
        .iter()
        .map(|stored| stored.event.ball_number)
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn matches_are_independent() {
    let first = MatchFixture::new(11);
    let second = MatchFixture::new(11);

    let events = Arc::new(InMemoryBallEventStore::new());
    let channel = Arc::new(RecordingMatchChannel::new());
    let rosters = pavilion_testing::StaticRosters::new()
        .with_team(first.home_team, first.home_players.clone())
        .with_team(first.away_team, first.away_players.clone())
        .with_team(second.home_team, second.home_players.clone())
        .with_team(second.away_team, second.away_players.clone());

    let registry = MatchRegistry::new(
        MatchEnvironment::new(Arc::new(test_clock())),
        events,
        channel.clone(),
        Arc::new(rosters),
        Arc::new(AllowAll),
    );

    let store_one = registry.open(first.setup()).await.unwrap();
    let store_two = registry.open(second.setup()).await.unwrap();
    assert_eq!(registry.open_count().await, 2);

    let operator = OperatorId::new();
    store_one
        .send(
            operator,
            MatchAction::StartMatch {
                toss_winner: first.home_team,
                toss_decision: TossDecision::Bat,
                striker: first.home_players[0],
                non_striker: first.home_players[1],
                bowler: first.away_players[0],
            },
        )
        .await
        .unwrap();
    store_one
        .send(
            operator,
            MatchAction::RecordBall {
                runs_scored: 4,
                is_wicket: false,
                extras: None,
                extra_type: None,
            },
        )
        .await
        .unwrap();

    // The second match saw nothing.
    assert_eq!(store_two.scoreboard().await.score, 0);
    assert_eq!(channel.notified(second.match_id), 0);

    assert!(registry.close(first.match_id).await);
    assert!(registry.get(first.match_id).await.is_none());
    assert!(matches!(
        registry.expect(first.match_id).await,
        Err(ControllerError::MatchNotOpen(_))
    ));
}

// ========== Permissions ==========

#[tokio::test]
async fn denied_operators_change_nothing() {
    let h = harness_with(MatchFixture::new(11), MatchStoreConfig::default(), false).await;

    let result = h
        .store
        .send(
            h.operator,
            MatchAction::StartMatch {
                toss_winner: h.fixture.home_team,
                toss_decision: TossDecision::Bat,
                striker: h.fixture.home_players[0],
                non_striker: h.fixture.home_players[1],
                bowler: h.fixture.away_players[0],
            },
        )
        .await;

    assert!(matches!(result, Err(ControllerError::PermissionDenied { .. })));
    assert_eq!(h.channel.notified(h.fixture.match_id), 0);
    let status = h.store.state(|s| s.control.status).await;
    assert!(!status.is_live());

    let undo = h.store.undo(h.operator).await;
    assert!(matches!(undo, Err(ControllerError::PermissionDenied { .. })));
}

// ========== Persistence failures ==========

#[tokio::test]
async fn failed_append_rolls_the_state_back() {
    let config = MatchStoreConfig::default().with_retry_policy(RetryPolicy::no_retries());
    let h = harness_with(MatchFixture::new(11), config, true).await;
    h.start_match().await;
    let baseline = h.channel.notified(h.fixture.match_id);

    h.events.fail_appends(1).await;
    let result = h.record(1, false, None).await;
    assert!(matches!(result, Err(ControllerError::Store(_))));

    // Nothing committed: no score, no swap, no signal, empty log.
    let board = h.store.scoreboard().await;
    assert_eq!(board.score, 0);
    let striker = h.store.state(|s| s.control.striker).await;
    assert_eq!(striker, Some(h.fixture.home_players[0]));
    assert_eq!(h.channel.notified(h.fixture.match_id), baseline);
    assert_eq!(h.events.event_count(h.fixture.match_id).await, 0);

    // The caller retries the whole operation and it commits.
    h.record(1, false, None).await.unwrap();
    assert_eq!(h.store.scoreboard().await.score, 1);
}

#[tokio::test]
async fn transient_append_failures_are_retried() {
    let config = MatchStoreConfig::default().with_retry_policy(
        RetryPolicy::builder()
            .max_retries(3)
            .initial_delay(Duration::from_millis(1))
            .build(),
    );
    let h = harness_with(MatchFixture::new(11), config, true).await;
    h.start_match().await;

    h.events.fail_appends(2).await;
    h.record(4, false, None).await.expect("retries should recover");

    assert_eq!(h.store.scoreboard().await.score, 4);
    assert_eq!(h.events.event_count(h.fixture.match_id).await, 1);
}

// ========== Full match flow ==========

#[tokio::test]
async fn a_short_match_start_to_finish() {
    let h = harness(MatchFixture::new(11).with_overs_limit(1)).await;
    h.start_match().await;

    // A brisk over: boundary, dot, wicket, replacement, three singles.
    h.record(4, false, None).await.unwrap();
    h.record(0, false, None).await.unwrap();
    h.record(0, true, None).await.unwrap();
    h.select_batsman(h.fixture.home_players[2]).await;
    h.record(1, false, None).await.unwrap();
    h.record(1, false, None).await.unwrap();
    h.record(1, false, None).await.unwrap();

    let board = h.store.scoreboard().await;
    assert_eq!(board.score, 7);
    assert_eq!(board.wickets, 1);
    assert_eq!(board.overs, "1.0");

    // Second innings.
    h.store
        .send(
            h.operator,
            MatchAction::StartInnings {
                striker: h.fixture.away_players[0],
                non_striker: h.fixture.away_players[1],
                bowler: h.fixture.home_players[0],
            },
        )
        .await
        .unwrap();
    h.record(6, false, None).await.unwrap();

    let board = h.store.scoreboard().await;
    assert_eq!(board.innings, 2);
    assert_eq!(board.score, 6);

    // The operator records the result; it is never inferred.
    h.store
        .send(
            h.operator,
            MatchAction::CompleteMatch {
                winning_team: Some(h.fixture.home_team),
                man_of_the_match: Some(h.fixture.home_players[0]),
                result_description: Some("Home won by 1 run".to_string()),
            },
        )
        .await
        .unwrap();

    let update = h.store.match_update().await;
    assert_eq!(update.is_completed, Some(true));
    assert_eq!(update.winning_team_id, Some(h.fixture.home_team));

    let rejected = h.record(1, false, None).await;
    assert!(matches!(
        rejected,
        Err(ControllerError::Rejected(ScoringError::MatchNotLive { .. }))
    ));
}
