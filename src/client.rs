// Headless client: keeps a local view of the session built purely from server events and turns
// user commands into client events. The server stays authoritative; local checks only save a
// round trip for obviously illegal commands.

use std::sync::mpsc;

use log::info;

use crate::board::Board;
use crate::controller::Outcome;
use crate::coord::Coord;
use crate::event::{ClientEvent, ServerEvent, SessionRejection};
use crate::player::Player;
use crate::scores::Scores;


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveCommandError {
    NotConnected,
    NoGameInProgress,
    NotYourTurn,
    CellOccupied,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum NotableEvent {
    None,
    PlayerAssigned(Player),
    Waiting(String),
    NameConfirmed(String),
    GameStarted,
    OpponentMoved(Coord),
    GameOver(Outcome),
    OpponentLeft,
    Rejected(SessionRejection),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EventError {
    CannotApplyEvent(String),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClientPhase {
    Connecting,
    WaitingForOpponent,
    Playing,
    RoundOver(Outcome),
    OpponentLeft,
}

pub struct ClientState {
    my_name: String,
    my_player: Option<Player>,
    name_confirmed: bool,
    events_tx: mpsc::Sender<ClientEvent>,
    phase: ClientPhase,
    board: Board,
    scores: Scores,
    turn_of: Player,
}

impl ClientState {
    pub fn new(my_name: String, events_tx: mpsc::Sender<ClientEvent>) -> Self {
        ClientState {
            my_name,
            my_player: None,
            name_confirmed: false,
            events_tx,
            phase: ClientPhase::Connecting,
            board: Board::new(),
            scores: Scores::new(),
            turn_of: Player::A,
        }
    }

    pub fn my_name(&self) -> &str { &self.my_name }
    pub fn my_player(&self) -> Option<Player> { self.my_player }
    pub fn name_confirmed(&self) -> bool { self.name_confirmed }
    pub fn phase(&self) -> ClientPhase { self.phase }
    pub fn board(&self) -> &Board { &self.board }
    pub fn scores(&self) -> Scores { self.scores }
    pub fn turn_of(&self) -> Player { self.turn_of }
    pub fn is_my_turn(&self) -> bool {
        self.phase == ClientPhase::Playing && self.my_player == Some(self.turn_of)
    }

    // The board is updated when the server confirms the move, not here.
    pub fn make_move(&mut self, pos: Coord) -> Result<(), MoveCommandError> {
        let Some(player) = self.my_player else {
            return Err(MoveCommandError::NotConnected);
        };
        if self.phase != ClientPhase::Playing {
            return Err(MoveCommandError::NoGameInProgress);
        }
        if self.turn_of != player {
            return Err(MoveCommandError::NotYourTurn);
        }
        if !self.board.is_cell_empty(pos) {
            return Err(MoveCommandError::CellOccupied);
        }
        self.send(ClientEvent::Move { player, row: pos.row(), col: pos.col() });
        Ok(())
    }

    // Returns false if there is nobody to play with.
    pub fn request_restart(&mut self) -> bool {
        match (self.my_player, self.phase) {
            (None, _) | (_, ClientPhase::OpponentLeft) => false,
            (Some(player), _) => {
                self.send(ClientEvent::GameStart { player });
                true
            }
        }
    }

    pub fn leave(&mut self) {
        if let Some(player) = self.my_player {
            self.send(ClientEvent::Exit { player });
        }
    }

    pub fn process_server_event(&mut self, event: ServerEvent) -> Result<NotableEvent, EventError> {
        match event {
            ServerEvent::PlayerAssigned { player } => {
                if let Some(existing) = self.my_player {
                    return Err(EventError::CannotApplyEvent(format!(
                        "Already playing as {existing}, cannot become {player}"
                    )));
                }
                self.my_player = Some(player);
                self.send(ClientEvent::SetName { player, name: self.my_name.clone() });
                Ok(NotableEvent::PlayerAssigned(player))
            }
            ServerEvent::Wait { message } => {
                if self.phase == ClientPhase::Connecting {
                    self.phase = ClientPhase::WaitingForOpponent;
                }
                Ok(NotableEvent::Waiting(message))
            }
            ServerEvent::GameStart { scores } => {
                self.scores = scores;
                self.board.reset();
                self.turn_of = Player::A;
                if self.phase != ClientPhase::OpponentLeft {
                    self.phase = ClientPhase::Playing;
                }
                Ok(NotableEvent::GameStarted)
            }
            ServerEvent::SetName { player, name } => {
                if Some(player) != self.my_player {
                    return Err(EventError::CannotApplyEvent(format!(
                        "Got name confirmation for player {player}"
                    )));
                }
                self.name_confirmed = true;
                Ok(NotableEvent::NameConfirmed(name))
            }
            ServerEvent::Move { player, row, col } => {
                let Some(pos) = Coord::try_new(row, col) else {
                    return Err(EventError::CannotApplyEvent(format!(
                        "Cell ({row}, {col}) is off the board"
                    )));
                };
                if self.phase != ClientPhase::Playing {
                    return Err(EventError::CannotApplyEvent(format!(
                        "Cannot apply move {pos}: no game in progress"
                    )));
                }
                if !self.board.is_cell_empty(pos) {
                    return Err(EventError::CannotApplyEvent(format!(
                        "Cannot apply move {pos}: cell is occupied"
                    )));
                }
                self.board.set_cell(pos, Some(player));
                self.turn_of = player.opponent();
                Ok(if Some(player) == self.my_player {
                    NotableEvent::None
                } else {
                    NotableEvent::OpponentMoved(pos)
                })
            }
            ServerEvent::GameOver { outcome } => {
                if self.phase != ClientPhase::Playing {
                    return Err(EventError::CannotApplyEvent(
                        "Cannot record game result: no game in progress".to_owned(),
                    ));
                }
                // Scores arrive with the next `GameStart`; keep the local copy current meanwhile.
                match outcome {
                    Outcome::Victory(winner) => self.scores.record_victory(winner),
                    Outcome::Draw => self.scores.record_draw(),
                }
                self.phase = ClientPhase::RoundOver(outcome);
                Ok(NotableEvent::GameOver(outcome))
            }
            ServerEvent::Exit { player } => {
                if Some(player) == self.my_player {
                    return Ok(NotableEvent::None);
                }
                self.phase = ClientPhase::OpponentLeft;
                Ok(NotableEvent::OpponentLeft)
            }
            ServerEvent::Rejection(rejection) => {
                info!("Server refused the last command: {:?}", rejection);
                Ok(NotableEvent::Rejected(rejection))
            }
        }
    }

    fn send(&self, event: ClientEvent) {
        // Send fails only when the connection is gone, which the network reader reports.
        let _ = self.events_tx.send(event);
    }
}
