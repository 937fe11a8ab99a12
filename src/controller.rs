// Authoritative game state. Every legality decision in the session is made here.
//
// `SessionController` is plain data: it does no IO and no locking. The coordinator owns the only
// instance and serializes access to it.

use enum_map::{EnumMap, enum_map};
use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::coord::Coord;
use crate::player::Player;
use crate::scores::Scores;


pub const TOTAL_PLAYERS: u32 = 2;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Outcome {
    Victory(Player),
    Draw,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionPhase {
    // At least one player hasn't registered a name yet.
    AwaitingNames,
    InProgress,
    // The round is over. Only a restart agreed by both players starts the next one.
    Terminal(Outcome),
    // Somebody left. Nothing can happen anymore.
    Abandoned,
}

#[derive(Debug)]
pub struct SessionController {
    board: Board,
    scores: Scores,
    turn_of: Player,
    has_name: EnumMap<Player, bool>,
    restart_vote: EnumMap<Player, bool>,
    departed: EnumMap<Player, bool>,
    participants_remaining: u32,
    // Outcome of the current round, once recorded into `scores`.
    round_outcome: Option<Outcome>,
}

impl SessionController {
    pub fn new() -> Self {
        SessionController {
            board: Board::new(),
            scores: Scores::new(),
            turn_of: Player::A,
            has_name: enum_map! { _ => false },
            restart_vote: enum_map! { _ => false },
            departed: enum_map! { _ => false },
            participants_remaining: TOTAL_PLAYERS,
            round_outcome: None,
        }
    }

    pub fn board(&self) -> &Board { &self.board }
    pub fn scores(&self) -> Scores { self.scores }
    pub fn turn_of(&self) -> Player { self.turn_of }
    pub fn has_name(&self, player: Player) -> bool { self.has_name[player] }
    pub fn has_voted_restart(&self, player: Player) -> bool { self.restart_vote[player] }
    pub fn has_departed(&self, player: Player) -> bool { self.departed[player] }
    pub fn participants_remaining(&self) -> u32 { self.participants_remaining }

    pub fn phase(&self) -> SessionPhase {
        if self.departed.values().any(|&d| d) {
            SessionPhase::Abandoned
        } else if let Some(outcome) = self.round_outcome {
            SessionPhase::Terminal(outcome)
        } else if !self.both_named() {
            SessionPhase::AwaitingNames
        } else {
            SessionPhase::InProgress
        }
    }

    // Name text is owned by the caller; empty names must be filtered out before this point.
    pub fn register_name(&mut self, player: Player) { self.has_name[player] = true; }

    pub fn attempt_move(&mut self, pos: Coord, player: Player) -> bool {
        if self.phase() != SessionPhase::InProgress
            || player != self.turn_of
            || !self.board.is_cell_empty(pos)
        {
            return false;
        }
        self.board.set_cell(pos, Some(player));
        self.turn_of = player.opponent();
        true
    }

    // Returns true iff this vote completed the pair, in which case a fresh round has begun.
    pub fn attempt_restart(&mut self, player: Player) -> bool {
        if self.phase() == SessionPhase::Abandoned {
            return false;
        }
        self.restart_vote[player] = true;
        if self.restart_vote.values().all(|&v| v) {
            self.restart_vote = enum_map! { _ => false };
            self.turn_of = Player::A;
            self.board.reset();
            self.round_outcome = None;
            true
        } else {
            false
        }
    }

    // Records the result of the round if the last move ended it.
    //
    // Not idempotent: call exactly once after each successful `attempt_move`.
    pub fn evaluate_outcome(&mut self) -> Option<Outcome> {
        debug_assert!(self.round_outcome.is_none(), "round outcome already recorded");
        let outcome = if let Some(winner) = self.board.check_winner() {
            self.scores.record_victory(winner);
            Outcome::Victory(winner)
        } else if self.board.is_full() {
            self.scores.record_draw();
            Outcome::Draw
        } else {
            return None;
        };
        self.round_outcome = Some(outcome);
        Some(outcome)
    }

    // Returns the number of participants still present. Repeated departures of the same player
    // are counted once.
    pub fn participant_departed(&mut self, player: Player) -> u32 {
        if !self.departed[player] {
            self.departed[player] = true;
            self.participants_remaining = self.participants_remaining.saturating_sub(1);
        }
        self.participants_remaining
    }

    fn both_named(&self) -> bool { self.has_name.values().all(|&n| n) }
}
