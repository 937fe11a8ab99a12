use std::fmt;

use itertools::iproduct;
use serde::{Deserialize, Serialize};


pub const BOARD_SIZE: u8 = 3;


#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Coord {
    row: u8, // 0-based
    col: u8, // 0-based
}

impl Coord {
    // Panics on out-of-range input: use `try_new` for anything that came from the network.
    pub const fn new(row: u8, col: u8) -> Self {
        assert!(row < BOARD_SIZE && col < BOARD_SIZE);
        Coord { row, col }
    }

    pub fn try_new(row: u8, col: u8) -> Option<Self> {
        (row < BOARD_SIZE && col < BOARD_SIZE).then_some(Coord { row, col })
    }

    pub const fn row(self) -> u8 { self.row }
    pub const fn col(self) -> u8 { self.col }

    pub fn all() -> impl Iterator<Item = Self> + Clone {
        iproduct!(0..BOARD_SIZE, 0..BOARD_SIZE).map(|(row, col)| Coord::new(row, col))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}


// Every straight line of three cells in the order wins are checked: rows, then columns, then
// the two diagonals.
pub fn winning_lines() -> impl Iterator<Item = [Coord; 3]> {
    let rows = (0..BOARD_SIZE).map(|r| [Coord::new(r, 0), Coord::new(r, 1), Coord::new(r, 2)]);
    let cols = (0..BOARD_SIZE).map(|c| [Coord::new(0, c), Coord::new(1, c), Coord::new(2, c)]);
    let diagonals = [
        [Coord::new(0, 0), Coord::new(1, 1), Coord::new(2, 2)],
        [Coord::new(2, 0), Coord::new(1, 1), Coord::new(0, 2)],
    ];
    rows.chain(cols).chain(diagonals)
}
