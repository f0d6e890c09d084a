//! Match parameters shared by both players through `CONFIG` records.

use crate::common::BoardError;

pub const DEFAULT_SIZE: usize = 10;
/// Largest grid and largest fleet the board text alphabet can express.
pub const MAX_SIZE: usize = 26;
pub const MAX_SHIPS: usize = 26;

pub const GAME_SIMPLE: [usize; 5] = [5, 4, 3, 3, 2];
pub const GAME_CLASSIC: [usize; 10] = [5, 4, 4, 3, 3, 3, 2, 2, 2, 2];

pub const KEY_SIZE: &str = "size";
pub const KEY_SHIPS: &str = "ships";

/// Board size and ship lengths of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GameConfig {
    pub size: usize,
    pub ships: Vec<usize>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            ships: GAME_SIMPLE.to_vec(),
        }
    }
}

impl GameConfig {
    pub fn new(size: usize, ships: &[usize]) -> Self {
        Self {
            size,
            ships: ships.to_vec(),
        }
    }

    /// Number of cells occupied by the whole fleet.
    pub fn fleet_cells(&self) -> usize {
        self.ships.iter().sum()
    }

    pub fn validate(&self) -> Result<(), BoardError> {
        if self.size == 0 || self.size > MAX_SIZE {
            return Err(BoardError::InvalidState("board size must be within 1..=26"));
        }
        if self.ships.is_empty() || self.ships.len() > MAX_SHIPS {
            return Err(BoardError::InvalidState("fleet must hold 1..=26 ships"));
        }
        if self.ships.iter().any(|&len| len == 0 || len > self.size) {
            return Err(BoardError::InvalidState("ship length must fit the board"));
        }
        if self.fleet_cells() > self.size * self.size {
            return Err(BoardError::InvalidState("fleet does not fit the board"));
        }
        Ok(())
    }

    /// Key/value pairs in the order they are written to the ledger.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        // keep sorted by key
        vec![
            (KEY_SHIPS, format_ships(&self.ships)),
            (KEY_SIZE, self.size.to_string()),
        ]
    }

    /// Rebuild a config from ledger entries. Unknown keys are ignored and
    /// missing keys keep their defaults.
    pub fn from_entries<'a, I>(entries: I) -> Result<Self, BoardError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = GameConfig::default();
        for (key, value) in entries {
            match key {
                KEY_SIZE => {
                    config.size = value
                        .trim()
                        .parse()
                        .map_err(|_| BoardError::InvalidFormat(format!("size={}", value)))?;
                }
                KEY_SHIPS => config.ships = parse_ships(value)?,
                other => log::debug!("ignoring unknown config key {}", other),
            }
        }
        config.validate()?;
        Ok(config)
    }
}

/// `"5,4,3,3,2"`
pub fn format_ships(ships: &[usize]) -> String {
    ships
        .iter()
        .map(|len| len.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn parse_ships(text: &str) -> Result<Vec<usize>, BoardError> {
    text.split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| BoardError::InvalidFormat(format!("ships={}", text)))
        })
        .collect()
}
