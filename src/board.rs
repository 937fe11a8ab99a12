use std::{fmt, ops};

use ndarray::{Array, Array2};
use serde::{Deserialize, Serialize};

use crate::coord::{BOARD_SIZE, Coord, winning_lines};
use crate::player::{Player, mark_char};


// The 3x3 grid. Knows nothing about whose turn it is or whether a write is legal: that is the
// business of `SessionController`.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Board {
    cells: Array2<Option<Player>>,
}

impl Board {
    pub fn new() -> Self {
        Board {
            cells: Array::from_elem((BOARD_SIZE as usize, BOARD_SIZE as usize), None),
        }
    }

    pub fn get(&self, pos: Coord) -> Option<Player> { self[pos] }
    pub fn set_cell(&mut self, pos: Coord, mark: Option<Player>) { self[pos] = mark; }
    pub fn is_cell_empty(&self, pos: Coord) -> bool { self[pos].is_none() }
    pub fn is_full(&self) -> bool { self.cells.iter().all(Option::is_some) }
    pub fn is_empty(&self) -> bool { self.cells.iter().all(Option::is_none) }

    // Returns the owner of the first complete line, if any. `None` means either "no winner yet"
    // or "draw"; `is_full` tells them apart.
    pub fn check_winner(&self) -> Option<Player> {
        winning_lines().find_map(|[a, b, c]| {
            let mark = self[a]?;
            (self[b] == Some(mark) && self[c] == Some(mark)).then_some(mark)
        })
    }

    pub fn reset(&mut self) { self.cells.fill(None); }
}

impl ops::Index<Coord> for Board {
    type Output = Option<Player>;
    fn index(&self, pos: Coord) -> &Self::Output { &self.cells[coord_to_index(pos)] }
}

impl ops::IndexMut<Coord> for Board {
    fn index_mut(&mut self, pos: Coord) -> &mut Self::Output {
        &mut self.cells[coord_to_index(pos)]
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.rows() {
            let line: String = row.iter().map(|&mark| mark_char(mark)).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

fn coord_to_index(pos: Coord) -> [usize; 2] { [pos.row() as usize, pos.col() as usize] }
