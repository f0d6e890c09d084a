//! Incremental replay of ledger records onto the two boards of one player.

use crate::board::BoardData;
use crate::common::LedgerError;
use crate::keys::KeyManager;
use crate::ledger::Ledger;
use crate::record::{AttackOutcome, Coordinate, PlayerId, Record, RecordKind};

/// Own board and opponent view as far as the ledger has been replayed.
#[derive(Debug, Clone)]
pub struct Playback {
    size: usize,
    own: BoardData,
    opponent: BoardData,
    cursor: usize,
    epoch: u64,
}

impl Playback {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            own: BoardData::new(size),
            opponent: BoardData::new(size),
            cursor: 0,
            epoch: 0,
        }
    }

    /// Own fleet with incoming shots. Empty until this player's `BOARD`
    /// record has been replayed.
    pub fn own(&self) -> &BoardData {
        &self.own
    }

    /// Outgoing shots with the outcomes the opponent attested.
    pub fn opponent(&self) -> &BoardData {
        &self.opponent
    }

    /// Number of records already replayed.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replay the records appended since the last call. Returns how many
    /// records were applied to a board.
    ///
    /// The playback starts over when the ledger no longer extends what was
    /// replayed: it got shorter, or its [`Ledger::epoch`] moved on.
    pub fn advance(&mut self, ledger: &Ledger, me: PlayerId, key: &KeyManager) -> usize {
        if ledger.len() < self.cursor || ledger.epoch() != self.epoch {
            log::warn!("savegame was rewritten, replaying from the start");
            *self = Playback::new(self.size);
            self.epoch = ledger.epoch();
        }
        let mut applied = 0;
        for (idx, rec) in ledger.records().iter().enumerate().skip(self.cursor) {
            if rec.player() != me {
                continue;
            }
            match self.apply(rec, key) {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(e) => log::warn!("skipping record {} ({}): {}", idx, rec.kind(), e),
            }
        }
        self.cursor = ledger.len();
        applied
    }

    fn apply(&mut self, rec: &Record, key: &KeyManager) -> Result<bool, LedgerError> {
        match rec.kind() {
            RecordKind::Board if !self.own.has_ships() => {
                let board: BoardData = key.open(rec.payload())?.parse()?;
                if board.size() != self.size {
                    return Err(LedgerError::InvalidFormat(format!(
                        "board of size {} in a game of size {}",
                        board.size(),
                        self.size
                    )));
                }
                self.own = board;
                Ok(true)
            }
            RecordKind::Attack => {
                let target: Coordinate = key.open(rec.payload())?.parse()?;
                self.own.shoot_at(target.x, target.y)?;
                Ok(true)
            }
            RecordKind::Result => {
                let outcome: AttackOutcome = key.open(rec.payload())?.parse()?;
                self.opponent.mark_result(outcome.x, outcome.y, outcome.hit)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
