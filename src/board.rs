//! Board state: ship placement, shots, random fleets and the board text codec.

use core::fmt;
use core::str::FromStr;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::common::BoardError;
use crate::config::{MAX_SHIPS, MAX_SIZE};

/// Restarts allowed before random fleet generation gives up.
pub const MAX_FLEET_ATTEMPTS: usize = 10_000;

const WATER: char = '.';
const MISS: char = '-';
const ATTESTED_HIT: char = '*';

/// Orientation of a ship on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

/// Position of a cell within its ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SegmentRole {
    Start,
    Mid,
    End,
    /// Length-1 ship: start and end at once.
    Single,
}

impl SegmentRole {
    pub fn is_start(self) -> bool {
        matches!(self, SegmentRole::Start | SegmentRole::Single)
    }

    pub fn is_end(self) -> bool {
        matches!(self, SegmentRole::End | SegmentRole::Single)
    }

    fn of(index: usize, length: usize) -> Self {
        if length == 1 {
            SegmentRole::Single
        } else if index == 0 {
            SegmentRole::Start
        } else if index == length - 1 {
            SegmentRole::End
        } else {
            SegmentRole::Mid
        }
    }
}

/// State of a single grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    pub occupied: bool,
    pub shot: bool,
    pub orientation: Orientation,
    /// `None` for water and for hits attested by the opponent.
    pub role: Option<SegmentRole>,
    /// Ship occupying the cell, 0 = none or unknown.
    pub ship_id: u8,
}

impl Cell {
    fn symbol(&self) -> char {
        match (self.occupied, self.shot, self.ship_id) {
            (false, false, _) => WATER,
            (false, true, _) => MISS,
            (true, _, 0) => ATTESTED_HIT,
            (true, false, id) => (b'A' + id - 1) as char,
            (true, true, id) => (b'a' + id - 1) as char,
        }
    }

    fn from_symbol(symbol: char) -> Option<Self> {
        let mut cell = Cell::default();
        match symbol {
            WATER => {}
            MISS => cell.shot = true,
            ATTESTED_HIT => {
                cell.occupied = true;
                cell.shot = true;
            }
            'A'..='Z' => {
                cell.occupied = true;
                cell.ship_id = symbol as u8 - b'A' + 1;
            }
            'a'..='z' => {
                cell.occupied = true;
                cell.shot = true;
                cell.ship_id = symbol as u8 - b'a' + 1;
            }
            _ => return None,
        }
        Some(cell)
    }
}

/// Square grid of cells. Used both for the own fleet and for the view of
/// the opponent's waters.
#[derive(Clone, PartialEq, Eq)]
pub struct BoardData {
    size: usize,
    cells: Vec<Cell>,
}

impl BoardData {
    /// Create an empty board of side `size`.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![Cell::default(); size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn index(&self, x: usize, y: usize) -> Result<usize, BoardError> {
        if x >= self.size || y >= self.size {
            return Err(BoardError::InvalidCoordinate { x, y });
        }
        Ok(y * self.size + x)
    }

    pub fn cell(&self, x: usize, y: usize) -> Result<Cell, BoardError> {
        self.index(x, y).map(|i| self.cells[i])
    }

    pub fn is_occupied(&self, x: usize, y: usize) -> Result<bool, BoardError> {
        self.cell(x, y).map(|c| c.occupied)
    }

    pub fn is_shot(&self, x: usize, y: usize) -> Result<bool, BoardError> {
        self.cell(x, y).map(|c| c.shot)
    }

    /// `true` once any ship has been placed. A board with ships is an own
    /// board; a board without is an opponent view.
    pub fn has_ships(&self) -> bool {
        self.cells.iter().any(|c| c.ship_id != 0)
    }

    /// `true` once any shot or result has been recorded.
    pub fn is_active(&self) -> bool {
        self.cells.iter().any(|c| c.shot)
    }

    pub fn is_placed(&self, ship_id: u8) -> bool {
        ship_id != 0 && self.cells.iter().any(|c| c.ship_id == ship_id)
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.occupied).count()
    }

    /// Occupied cells that have been shot.
    pub fn hit_count(&self) -> usize {
        self.cells.iter().filter(|c| c.occupied && c.shot).count()
    }

    /// Shot cells, hit or not.
    pub fn shot_count(&self) -> usize {
        self.cells.iter().filter(|c| c.shot).count()
    }

    /// Every ship segment on this board has been hit.
    pub fn all_sunk(&self) -> bool {
        self.has_ships() && self.cells.iter().all(|c| !c.occupied || c.shot)
    }

    /// Place ship `ship_id` (1-based) with its first segment at (`x`, `y`).
    ///
    /// Placement is only legal before any shot touched the board. On failure
    /// the board is left exactly as it was.
    pub fn place_ship(
        &mut self,
        ship_id: u8,
        x: usize,
        y: usize,
        length: usize,
        vertical: bool,
    ) -> Result<(), BoardError> {
        if self.is_active() {
            return Err(BoardError::InvalidState("board is already in use"));
        }
        if ship_id == 0 || ship_id as usize > MAX_SHIPS || length == 0 {
            return Err(BoardError::InvalidShip { ship_id, length });
        }
        if self.is_placed(ship_id) {
            return Err(BoardError::ShipAlreadyPlaced(ship_id));
        }
        // a single cell has no direction
        let orientation = if vertical && length > 1 {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        };
        let fits = match orientation {
            Orientation::Horizontal => {
                length <= self.size && x <= self.size - length && y < self.size
            }
            Orientation::Vertical => {
                length <= self.size && y <= self.size - length && x < self.size
            }
        };
        if !fits {
            return Err(BoardError::OutOfBounds { x, y, length });
        }

        let run: Vec<(usize, usize)> = (0..length)
            .map(|i| match orientation {
                Orientation::Horizontal => (x + i, y),
                Orientation::Vertical => (x, y + i),
            })
            .collect();
        for &(cx, cy) in &run {
            if self.cells[cy * self.size + cx].occupied {
                return Err(BoardError::Collision { x: cx, y: cy });
            }
        }
        for (i, &(cx, cy)) in run.iter().enumerate() {
            self.cells[cy * self.size + cx] = Cell {
                occupied: true,
                shot: false,
                orientation,
                role: Some(SegmentRole::of(i, length)),
                ship_id,
            };
        }
        Ok(())
    }

    /// Resolve incoming fire on an own board. Returns whether a ship was hit.
    pub fn shoot_at(&mut self, x: usize, y: usize) -> Result<bool, BoardError> {
        if !self.has_ships() {
            return Err(BoardError::InvalidState("this is not your own board"));
        }
        let idx = self.index(x, y)?;
        let cell = &mut self.cells[idx];
        cell.shot = true;
        Ok(cell.occupied)
    }

    /// Record the defender's attested outcome on the opponent view.
    pub fn mark_result(&mut self, x: usize, y: usize, hit: bool) -> Result<(), BoardError> {
        if self.has_ships() {
            return Err(BoardError::InvalidState("this is your own board"));
        }
        let idx = self.index(x, y)?;
        let cell = &mut self.cells[idx];
        cell.shot = true;
        cell.occupied = hit;
        Ok(())
    }

    /// Place `ships` (lengths, ids `1..=n` in order) at random positions.
    ///
    /// Any collision throws the whole partial fleet away and starts over, so
    /// the layout for a given rng state depends on the complete draw sequence.
    pub fn generate_random<R: Rng>(
        size: usize,
        ships: &[usize],
        rng: &mut R,
    ) -> Result<Self, BoardError> {
        if ships.len() > MAX_SHIPS {
            return Err(BoardError::InvalidShip {
                ship_id: ships.len() as u8,
                length: 0,
            });
        }
        if let Some(pos) = ships.iter().position(|&len| len == 0 || len > size) {
            return Err(BoardError::InvalidShip {
                ship_id: (pos + 1) as u8,
                length: ships[pos],
            });
        }

        'fleet: for _ in 0..MAX_FLEET_ATTEMPTS {
            let mut board = BoardData::new(size);
            for (i, &length) in ships.iter().enumerate() {
                let vertical: bool = rng.random();
                let (max_x, max_y) = if vertical {
                    (size - 1, size - length)
                } else {
                    (size - length, size - 1)
                };
                let x = rng.random_range(0..=max_x);
                let y = rng.random_range(0..=max_y);
                match board.place_ship((i + 1) as u8, x, y, length, vertical) {
                    Ok(()) => {}
                    Err(e) if e.is_invalid_placement() => continue 'fleet,
                    Err(e) => return Err(e),
                }
            }
            return Ok(board);
        }
        Err(BoardError::UnableToPlaceFleet)
    }

    /// Reproducible variant of [`BoardData::generate_random`].
    pub fn generate_seeded(size: usize, seed: u64, ships: &[usize]) -> Result<Self, BoardError> {
        let mut rng = SmallRng::seed_from_u64(seed);
        Self::generate_random(size, ships, &mut rng)
    }

    fn same_ship(&self, x: isize, y: isize, ship_id: u8) -> bool {
        if x < 0 || y < 0 || x as usize >= self.size || y as usize >= self.size {
            return false;
        }
        self.cells[y as usize * self.size + x as usize].ship_id == ship_id
    }

    /// Recover orientation and segment roles from same-id neighbours.
    fn restore_segments(&mut self) -> Result<(), BoardError> {
        let mut starts = [0usize; MAX_SHIPS + 1];
        for y in 0..self.size {
            for x in 0..self.size {
                let id = self.cells[y * self.size + x].ship_id;
                if id == 0 {
                    continue;
                }
                let (sx, sy) = (x as isize, y as isize);
                let west = self.same_ship(sx - 1, sy, id);
                let east = self.same_ship(sx + 1, sy, id);
                let north = self.same_ship(sx, sy - 1, id);
                let south = self.same_ship(sx, sy + 1, id);
                let horizontal = west || east;
                let vertical = north || south;
                if horizontal && vertical {
                    return Err(BoardError::InvalidFormat(format!(
                        "ship {} is not a straight run",
                        id
                    )));
                }
                let (orientation, before, after) = if vertical {
                    (Orientation::Vertical, north, south)
                } else {
                    (Orientation::Horizontal, west, east)
                };
                let role = match (before, after) {
                    (false, false) => SegmentRole::Single,
                    (false, true) => SegmentRole::Start,
                    (true, true) => SegmentRole::Mid,
                    (true, false) => SegmentRole::End,
                };
                if role.is_start() {
                    starts[id as usize] += 1;
                    if starts[id as usize] > 1 {
                        return Err(BoardError::InvalidFormat(format!(
                            "ship {} appears more than once",
                            id
                        )));
                    }
                }
                let cell = &mut self.cells[y * self.size + x];
                cell.orientation = orientation;
                cell.role = Some(role);
            }
        }
        Ok(())
    }
}

impl fmt::Display for BoardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in &self.cells {
            write!(f, "{}", cell.symbol())?;
        }
        Ok(())
    }
}

impl FromStr for BoardData {
    type Err = BoardError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let symbols: Vec<char> = text.chars().collect();
        let len = symbols.len();
        let size = (1..=MAX_SIZE).find(|s| s * s >= len).unwrap_or(0);
        if len == 0 || size * size != len {
            return Err(BoardError::InvalidFormat(format!(
                "{} cells do not form a square board",
                len
            )));
        }
        let cells = symbols
            .iter()
            .map(|&s| {
                Cell::from_symbol(s)
                    .ok_or_else(|| BoardError::InvalidFormat(format!("unknown symbol {:?}", s)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut board = BoardData { size, cells };
        board.restore_segments()?;
        Ok(board)
    }
}

impl fmt::Debug for BoardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BoardData {{ size: {}", self.size)?;
        let text = self.to_string();
        let chars: Vec<char> = text.chars().collect();
        for row in chars.chunks(self.size.max(1)) {
            writeln!(f, "  {}", row.iter().collect::<String>())?;
        }
        write!(f, "}}")
    }
}
