//! Property-based tests for the pure scoring arithmetic.
//!
//! Run with: `cargo test --test properties`

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use pavilion_core::controller::{MatchAction, MatchEnvironment, MatchReducer, MatchState};
use pavilion_core::event::BallEvent;
use pavilion_core::reducer::Reducer;
use pavilion_core::scoreboard::Scoreboard;
use pavilion_core::types::{ExtraType, Innings, MatchSettings, Overs};
use pavilion_core::validate::delivery_is_valid;
use pavilion_testing::fixtures::MatchFixture;
use pavilion_testing::test_clock;
use proptest::prelude::*;
use std::sync::Arc;

fn extra_type_strategy() -> impl Strategy<Value = Option<ExtraType>> {
    prop_oneof![
        Just(None),
        Just(Some(ExtraType::Wide)),
        Just(Some(ExtraType::NoBall)),
        Just(Some(ExtraType::Bye)),
        Just(Some(ExtraType::LegBye)),
    ]
}

/// One randomly generated delivery: runs, extras, wicket flag, extra kind.
fn delivery_strategy() -> impl Strategy<Value = (u32, u32, bool, Option<ExtraType>)> {
    (0_u32..=6, 0_u32..=4, any::<bool>(), extra_type_strategy())
}

/// Materializes generated deliveries as stored events against a fixture.
fn build_events(
    fixture: &MatchFixture,
    deliveries: &[(u32, u32, bool, Option<ExtraType>)],
) -> Vec<BallEvent> {
    let settings = MatchSettings::default();
    let mut valid_count = 0_u32;
    deliveries
        .iter()
        .map(|&(runs, extras, wicket, extra_type)| {
            let is_valid = delivery_is_valid(extra_type, &settings);
            let event = BallEvent {
                match_id: fixture.match_id,
                innings: Innings::First,
                over_number: valid_count / 6,
                ball_number: valid_count % 6 + 1,
                striker: fixture.opening_striker(),
                non_striker: fixture.opening_non_striker(),
                bowler: fixture.opening_bowler(),
                batting_team: fixture.home_team,
                runs_scored: runs,
                is_wicket: wicket,
                extras,
                extra_type,
                is_valid_ball: is_valid,
                recorded_at: fixture.created_at,
            };
            if is_valid {
                valid_count += 1;
            }
            event
        })
        .collect()
}

proptest! {
    /// The score is always the arithmetic sum of runs and extras.
    #[test]
    fn score_equals_sum_of_runs_and_extras(
        deliveries in proptest::collection::vec(delivery_strategy(), 0..60)
    ) {
        let fixture = MatchFixture::new(11);
        let events = build_events(&fixture, &deliveries);
        let state = fixture.live_state();
        let board = Scoreboard::rebuild(&events, &state.control);

        let expected: u32 = deliveries.iter().map(|(runs, extras, _, _)| runs + extras).sum();
        prop_assert_eq!(board.score, expected);
    }

    /// The overs display always matches div/mod 6 of the valid-ball count.
    #[test]
    fn overs_display_matches_valid_ball_arithmetic(
        deliveries in proptest::collection::vec(delivery_strategy(), 0..60)
    ) {
        let fixture = MatchFixture::new(11);
        let events = build_events(&fixture, &deliveries);
        let state = fixture.live_state();
        let board = Scoreboard::rebuild(&events, &state.control);

        let valid = u32::try_from(events.iter().filter(|e| e.is_valid_ball).count()).unwrap();
        prop_assert_eq!(board.valid_balls, valid);
        prop_assert_eq!(board.overs, Overs::from_valid_balls(valid));
        prop_assert_eq!(board.overs.to_string(), format!("{}.{}", valid / 6, valid % 6));
    }

    /// Reconstructing twice from the same immutable sequence yields the
    /// same board.
    #[test]
    fn reconstruction_is_idempotent(
        deliveries in proptest::collection::vec(delivery_strategy(), 0..40)
    ) {
        let fixture = MatchFixture::new(11);
        let events = build_events(&fixture, &deliveries);
        let state = fixture.live_state();

        let first = Scoreboard::rebuild(&events, &state.control);
        let second = Scoreboard::rebuild(&events, &state.control);
        prop_assert_eq!(first, second);
    }

    /// An accepted delivery swaps the striker exactly when the run value
    /// is odd.
    #[test]
    fn odd_runs_swap_the_striker(runs in 0_u32..=6) {
        let fixture = MatchFixture::new(11);
        let mut state: MatchState = fixture.live_state();
        let before_striker = state.control.striker;
        let before_non_striker = state.control.non_striker;

        let reducer = MatchReducer::new();
        let env = MatchEnvironment::new(Arc::new(test_clock()));
        reducer
            .reduce(
                &mut state,
                MatchAction::RecordBall {
                    runs_scored: runs,
                    is_wicket: false,
                    extras: None,
                    extra_type: None,
                },
                &env,
            )
            .expect("delivery should be accepted");

        if runs % 2 == 1 {
            prop_assert_eq!(state.control.striker, before_non_striker);
            prop_assert_eq!(state.control.non_striker, before_striker);
        } else {
            prop_assert_eq!(state.control.striker, before_striker);
            prop_assert_eq!(state.control.non_striker, before_non_striker);
        }
    }

    /// Validity follows the re-bowl rule for every extra kind.
    #[test]
    fn validity_matches_the_rebowl_rule(
        extra_type in extra_type_strategy(),
        rebowl in any::<bool>()
    ) {
        let settings = MatchSettings { rebowl_wide_or_no_ball: rebowl };
        let expected = !matches!(extra_type, Some(ExtraType::Wide | ExtraType::NoBall)) || !rebowl;
        prop_assert_eq!(delivery_is_valid(extra_type, &settings), expected);
    }
}
