use enum_map::{EnumMap, enum_map};
use serde::{Deserialize, Serialize};

use crate::player::Player;


// Cumulative results over the whole session. Only ever grows: starting a new round clears the
// board, never the scores.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Scores {
    pub wins: EnumMap<Player, u32>,
    pub draws: u32,
}

impl Scores {
    pub fn new() -> Self {
        Scores { wins: enum_map! { _ => 0 }, draws: 0 }
    }

    pub fn wins(&self, player: Player) -> u32 { self.wins[player] }
    pub fn rounds_played(&self) -> u32 { self.wins.values().sum::<u32>() + self.draws }

    pub fn record_victory(&mut self, player: Player) { self.wins[player] += 1; }
    pub fn record_draw(&mut self) { self.draws += 1; }
}
