//! Property-based tests for the round resolver

use super::*;
use crate::testing::ScriptedMoves;
use proptest::prelude::*;

fn arb_move() -> impl Strategy<Value = Move> {
    prop_oneof![Just(Move::Rock), Just(Move::Paper), Just(Move::Scissors)]
}

fn arb_rounds() -> impl Strategy<Value = Vec<(Move, Move)>> {
    prop::collection::vec((arb_move(), arb_move()), 1..60)
}

fn in_game() -> Session {
    Session {
        phase: Phase::InGame,
        ..Session::default()
    }
}

proptest! {
    #[test]
    fn scores_never_exceed_winning_score(rounds in arb_rounds()) {
        let mut session = in_game();
        for (user, ai) in rounds {
            if session.phase == Phase::Idle {
                session.phase = Phase::InGame;
            }
            let before = session.clone();
            let text = play_round(&mut session, user.name(), &ScriptedMoves::new([ai]));

            prop_assert!(session.user_score < WINNING_SCORE);
            prop_assert!(session.ai_score < WINNING_SCORE);

            if session.phase == Phase::Idle {
                // The game just ended: exactly one side had reached the threshold.
                let user_final = before.user_score + u32::from(user.beats(ai));
                let ai_final = before.ai_score + u32::from(ai.beats(user));
                prop_assert!((user_final == WINNING_SCORE) != (ai_final == WINNING_SCORE));
                prop_assert_eq!((session.user_score, session.ai_score), (0, 0));
                prop_assert!(text.contains("Final score"), "{}", text);
            } else {
                let score_line =
                    format!("Score: You {} - AI {}", session.user_score, session.ai_score);
                prop_assert!(text.contains(&score_line), "{}", text);
            }
        }
    }

    #[test]
    fn invalid_moves_never_change_state(
        input in "[a-z]{1,12}".prop_filter("not a move", |s| s.parse::<Move>().is_err()),
        user_score in 0u32..WINNING_SCORE,
        ai_score in 0u32..WINNING_SCORE,
        ai in arb_move(),
    ) {
        let mut session = Session { user_score, ai_score, ..in_game() };
        let before = session.clone();
        let text = play_round(&mut session, &input, &ScriptedMoves::new([ai]));
        prop_assert_eq!(text, INVALID_MOVE);
        prop_assert_eq!(session, before);
    }
}
