use serde::{Deserialize, Serialize};

use crate::controller::Outcome;
use crate::player::Player;
use crate::scores::Scores;


pub const WAITING_FOR_OPPONENT_MESSAGE: &str = "Waiting for second player...";


// Why the server refused a client event. Only sent when `ServerOptions::report_rejections` is
// on; by default refused events are dropped without a reply.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SessionRejection {
    // Well-formed move refused by the game rules: wrong turn, occupied cell, names missing,
    // round over or opponent gone.
    IllegalMove { row: u8, col: u8 },
    EmptyName,
    // Structurally invalid event: cannot be parsed, coordinates out of range, or acting on
    // behalf of the other player.
    MalformedMessage { reason: String },
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ServerEvent {
    PlayerAssigned {
        player: Player,
    },
    Wait {
        message: String,
    },
    // Sent when both players are connected and after every agreed restart. Implies an empty
    // board with player A to move.
    GameStart {
        scores: Scores,
    },
    SetName {
        player: Player,
        name: String,
    },
    Move {
        player: Player,
        row: u8,
        col: u8,
    },
    GameOver {
        outcome: Outcome,
    },
    Exit {
        player: Player,
    },
    Rejection(SessionRejection),
}

// `player` is always the sender's own identity. The server checks it against the identity bound
// to the connection and drops the event on mismatch.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ClientEvent {
    SetName {
        player: Player,
        name: String,
    },
    Move {
        player: Player,
        row: u8,
        col: u8,
    },
    // Vote to start a new round. The round restarts once both players have voted.
    GameStart {
        player: Player,
    },
    Exit {
        player: Player,
    },
}

impl ClientEvent {
    pub fn player(&self) -> Player {
        match self {
            ClientEvent::SetName { player, .. }
            | ClientEvent::Move { player, .. }
            | ClientEvent::GameStart { player }
            | ClientEvent::Exit { player } => *player,
        }
    }
}
