// Per-connection plumbing: a reader that validates incoming events and forwards them to the
// coordinator, and a writer that drains the connection's outlet into the socket.

use std::io;
use std::sync::{Arc, mpsc};

use derive_new::new;
use log::{info, warn};
use tungstenite::WebSocket;

use crate::coord::Coord;
use crate::coordinator::Coordinator;
use crate::event::{ClientEvent, ServerEvent, SessionRejection};
use crate::network::{self, CommunicationError};
use crate::player::Player;


#[must_use]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReadLoopStatus {
    Continue,
    // The player asked to leave.
    Stop,
}

#[derive(new)]
pub struct ConnectionHandler {
    player: Player,
    coordinator: Arc<Coordinator>,
}

impl ConnectionHandler {
    pub fn player(&self) -> Player { self.player }

    // Reads events until the player leaves or the connection breaks, then reports the departure.
    pub fn serve<S: io::Read + io::Write>(self, mut socket: WebSocket<S>) {
        loop {
            match network::read_obj::<ClientEvent, _>(&mut socket) {
                Ok(event) => {
                    if self.handle_event(event) == ReadLoopStatus::Stop {
                        info!("Player {} exited", self.player);
                        break;
                    }
                }
                Err(err) if err.is_recoverable() => {
                    warn!("Dropping message from player {}: {}", self.player, err);
                    self.coordinator.reject(self.player, SessionRejection::MalformedMessage {
                        reason: err.to_string(),
                    });
                }
                Err(CommunicationError::ConnectionClosed) => {
                    info!("Player {} disconnected", self.player);
                    break;
                }
                Err(err) => {
                    warn!("Player {} disconnected due to read error: {}", self.player, err);
                    break;
                }
            }
        }
        self.coordinator.depart(self.player);
    }

    // Structural validation happens here; game rules are checked by the controller.
    pub fn handle_event(&self, event: ClientEvent) -> ReadLoopStatus {
        if event.player() != self.player {
            warn!("Player {} tried to act as player {}: {:?}", self.player, event.player(), event);
            self.coordinator.reject(self.player, SessionRejection::MalformedMessage {
                reason: format!("connection is bound to player {}", self.player),
            });
            return ReadLoopStatus::Continue;
        }
        info!("Server received {:?}", event);
        match event {
            ClientEvent::SetName { name, .. } => {
                if name.is_empty() {
                    info!("Empty name from player {}", self.player);
                    self.coordinator.reject(self.player, SessionRejection::EmptyName);
                } else {
                    self.coordinator.register_name(self.player, name);
                }
            }
            ClientEvent::Move { row, col, .. } => match Coord::try_new(row, col) {
                None => {
                    warn!("Player {} sent out-of-range cell ({}, {})", self.player, row, col);
                    self.coordinator.reject(self.player, SessionRejection::MalformedMessage {
                        reason: format!("cell ({row}, {col}) is off the board"),
                    });
                }
                Some(pos) => {
                    if !self.coordinator.make_move(self.player, pos) {
                        info!("Illegal move {} by player {}", pos, self.player);
                        self.coordinator
                            .reject(self.player, SessionRejection::IllegalMove { row, col });
                    }
                }
            },
            ClientEvent::GameStart { .. } => {
                self.coordinator.vote_restart(self.player);
            }
            ClientEvent::Exit { .. } => return ReadLoopStatus::Stop,
        }
        ReadLoopStatus::Continue
    }
}

// Forwards events to the socket until the outlet is dropped (the player departed) or the socket
// fails, then closes the connection.
pub fn run_writer<S: io::Read + io::Write>(
    player: Player, mut socket: WebSocket<S>, events_rx: mpsc::Receiver<ServerEvent>,
) {
    for event in events_rx {
        if let Err(err) = network::write_obj(&mut socket, &event) {
            warn!("Cannot send {:?} to player {}: {}", event, player, err);
            return;
        }
        info!("Server sent {:?} to player {}", event, player);
    }
    if let Err(err) = socket.close(None).and_then(|()| socket.flush()) {
        match CommunicationError::from(err) {
            CommunicationError::ConnectionClosed => {}
            err => warn!("Cannot close connection to player {}: {}", player, err),
        }
    }
}
