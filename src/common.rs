//! Common error types shared by boards, keys, the ledger and the engine.

use std::fmt;
use std::io;

/// Errors returned by board operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// Ship run would leave the grid.
    OutOfBounds { x: usize, y: usize, length: usize },
    /// Ship run crosses an already placed ship.
    Collision { x: usize, y: usize },
    /// Ship id outside `1..=26` or zero length.
    InvalidShip { ship_id: u8, length: usize },
    /// A ship with this id is already on the board.
    ShipAlreadyPlaced(u8),
    /// Coordinate outside the grid.
    InvalidCoordinate { x: usize, y: usize },
    /// Operation not legal for this board in its current phase.
    InvalidState(&'static str),
    /// Board text could not be parsed.
    InvalidFormat(String),
    /// Random fleet generation gave up.
    UnableToPlaceFleet,
}

impl BoardError {
    /// Recoverable placement failures; the user simply tries again.
    pub fn is_invalid_placement(&self) -> bool {
        matches!(
            self,
            BoardError::OutOfBounds { .. }
                | BoardError::Collision { .. }
                | BoardError::InvalidShip { .. }
                | BoardError::ShipAlreadyPlaced(_)
        )
    }
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::OutOfBounds { x, y, length } => write!(
                f,
                "Ship of length {} at ({}, {}) does not fit on the board",
                length, x, y
            ),
            BoardError::Collision { x, y } => {
                write!(f, "Ship collides with a placed ship at ({}, {})", x, y)
            }
            BoardError::InvalidShip { ship_id, length } => {
                write!(f, "Invalid ship id {} with length {}", ship_id, length)
            }
            BoardError::ShipAlreadyPlaced(id) => write!(f, "Ship {} is already placed", id),
            BoardError::InvalidCoordinate { x, y } => {
                write!(f, "Coordinate ({}, {}) is outside the board", x, y)
            }
            BoardError::InvalidState(reason) => write!(f, "Invalid board state: {}", reason),
            BoardError::InvalidFormat(reason) => write!(f, "Invalid board text: {}", reason),
            BoardError::UnableToPlaceFleet => write!(f, "Unable to place fleet"),
        }
    }
}

impl std::error::Error for BoardError {}

/// Errors returned by the key manager.
#[derive(Debug)]
pub enum KeyError {
    /// Payload was not sealed for this key pair.
    DecryptionFailed,
    /// Key manager only holds a public key.
    NoPrivateKey,
    /// Key material could not be decoded.
    InvalidKey(String),
    /// Sealing failed.
    Encryption(String),
    /// `open(seal(x)) != x` right after construction.
    SelfTestFailed { expected: String, got: String },
    /// Identity file could not be read or written.
    Io(io::Error),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::DecryptionFailed => write!(f, "Payload is not addressed to this key"),
            KeyError::NoPrivateKey => write!(f, "No private key available"),
            KeyError::InvalidKey(e) => write!(f, "Invalid key material: {}", e),
            KeyError::Encryption(e) => write!(f, "Encryption failed: {}", e),
            KeyError::SelfTestFailed { expected, got } => write!(
                f,
                "Key self test failed: expected {:?} but got {:?}",
                expected, got
            ),
            KeyError::Io(e) => write!(f, "Identity file error: {}", e),
        }
    }
}

impl std::error::Error for KeyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KeyError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for KeyError {
    fn from(err: io::Error) -> Self {
        KeyError::Io(err)
    }
}

/// Errors returned by the ledger and its record codec.
#[derive(Debug)]
pub enum LedgerError {
    /// Player number other than 1 or 2.
    InvalidPlayer(u32),
    /// Malformed record line or payload.
    InvalidFormat(String),
    /// First record is not `VERSION`.
    MissingVersion,
    /// `VERSION` names a format this build does not understand.
    UnsupportedVersion(String),
    /// `CONFIG` key already present with another value.
    DuplicateConfig(String),
    /// No paired ATTACK/RESULT record to delegate to.
    Unpaired(usize),
    /// Record at this index is neither ATTACK nor RESULT.
    NotAnAction(usize),
    /// Reading, locking or writing the backing store failed.
    Io(io::Error),
    Key(KeyError),
    Board(BoardError),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::InvalidPlayer(n) => write!(f, "Invalid player number {}", n),
            LedgerError::InvalidFormat(e) => write!(f, "Invalid record: {}", e),
            LedgerError::MissingVersion => write!(f, "No game version found"),
            LedgerError::UnsupportedVersion(v) => write!(f, "Unknown game version {}", v),
            LedgerError::DuplicateConfig(key) => {
                write!(f, "Config {} is already set to another value", key)
            }
            LedgerError::Unpaired(idx) => write!(f, "Record {} has no paired record", idx),
            LedgerError::NotAnAction(idx) => {
                write!(f, "Record {} is neither an attack nor a result", idx)
            }
            LedgerError::Io(e) => write!(f, "Savegame I/O failure: {}", e),
            LedgerError::Key(e) => write!(f, "{}", e),
            LedgerError::Board(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::Io(e) => Some(e),
            LedgerError::Key(e) => Some(e),
            LedgerError::Board(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LedgerError {
    fn from(err: io::Error) -> Self {
        LedgerError::Io(err)
    }
}

impl From<KeyError> for LedgerError {
    fn from(err: KeyError) -> Self {
        LedgerError::Key(err)
    }
}

impl From<BoardError> for LedgerError {
    fn from(err: BoardError) -> Self {
        LedgerError::Board(err)
    }
}

/// Errors surfaced by the game engine.
#[derive(Debug)]
pub enum GameError {
    Board(BoardError),
    Key(KeyError),
    Ledger(LedgerError),
    /// Operation attempted in the wrong phase.
    InvalidState(String),
    /// Both seats of the savegame belong to other keys.
    GameFull,
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::Board(e) => write!(f, "{}", e),
            GameError::Key(e) => write!(f, "{}", e),
            GameError::Ledger(e) => write!(f, "{}", e),
            GameError::InvalidState(reason) => write!(f, "Invalid game state: {}", reason),
            GameError::GameFull => write!(f, "The game already has two players"),
        }
    }
}

impl std::error::Error for GameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GameError::Board(e) => Some(e),
            GameError::Key(e) => Some(e),
            GameError::Ledger(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BoardError> for GameError {
    fn from(err: BoardError) -> Self {
        GameError::Board(err)
    }
}

impl From<KeyError> for GameError {
    fn from(err: KeyError) -> Self {
        GameError::Key(err)
    }
}

impl From<LedgerError> for GameError {
    fn from(err: LedgerError) -> Self {
        GameError::Ledger(err)
    }
}
