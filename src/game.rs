//! Rock-paper-scissors rounds played against the assistant
//!
//! All randomness comes from a `MoveSource` so rounds can be replayed
//! deterministically.

#[cfg(test)]
mod proptests;

use crate::session::{Phase, Session};
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Score at which a game ends
pub const WINNING_SCORE: u32 = 5;

pub const INVALID_MOVE: &str = "Invalid move! Please choose rock, paper, or scissors.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    pub fn name(self) -> &'static str {
        match self {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        }
    }

    pub fn beats(self, other: Move) -> bool {
        matches!(
            (self, other),
            (Move::Rock, Move::Scissors) | (Move::Scissors, Move::Paper) | (Move::Paper, Move::Rock)
        )
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a rock-paper-scissors move: {0:?}")]
pub struct InvalidMove(pub String);

impl FromStr for Move {
    type Err = InvalidMove;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rock" => Ok(Move::Rock),
            "paper" => Ok(Move::Paper),
            "scissors" => Ok(Move::Scissors),
            _ => Err(InvalidMove(s.to_string())),
        }
    }
}

/// Supplies the assistant's moves
pub trait MoveSource: Send + Sync {
    fn next_move(&self) -> Move;
}

/// Uniformly random moves from the thread-local generator
pub struct RandomMoves;

impl MoveSource for RandomMoves {
    fn next_move(&self) -> Move {
        Move::ALL[rand::thread_rng().gen_range(0..Move::ALL.len())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundOutcome {
    Win,
    Loss,
    Tie,
}

impl RoundOutcome {
    fn resolve(user: Move, ai: Move) -> Self {
        if user.beats(ai) {
            RoundOutcome::Win
        } else if ai.beats(user) {
            RoundOutcome::Loss
        } else {
            RoundOutcome::Tie
        }
    }

    fn summary(self) -> &'static str {
        match self {
            RoundOutcome::Win => "You win this round!",
            RoundOutcome::Loss => "AI wins this round!",
            RoundOutcome::Tie => "It's a tie!",
        }
    }
}

/// Play one round with `input` as the user's move and return the reply text.
///
/// An unrecognised move leaves the session untouched. When either side
/// reaches [`WINNING_SCORE`] the game ends: scores reset and the session
/// returns to `Idle`.
pub fn play_round(session: &mut Session, input: &str, moves: &dyn MoveSource) -> String {
    let Ok(user) = input.parse::<Move>() else {
        return INVALID_MOVE.to_string();
    };
    let ai = moves.next_move();
    let outcome = RoundOutcome::resolve(user, ai);

    match outcome {
        RoundOutcome::Win => session.user_score += 1,
        RoundOutcome::Loss => session.ai_score += 1,
        RoundOutcome::Tie => {}
    }

    let round = format!("You chose {user}, AI chose {ai}. {}", outcome.summary());

    if session.user_score >= WINNING_SCORE || session.ai_score >= WINNING_SCORE {
        let verdict = if session.user_score > session.ai_score {
            "You won the game!"
        } else {
            "AI won the game!"
        };
        let text = format!(
            "{round} Final score: You {} - AI {}. {verdict} Reply \"yes\" to play again.",
            session.user_score, session.ai_score
        );
        session.user_score = 0;
        session.ai_score = 0;
        session.phase = Phase::Idle;
        text
    } else {
        format!(
            "{round} Score: You {} - AI {}",
            session.user_score, session.ai_score
        )
    }
}
