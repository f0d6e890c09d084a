//! Append-only savegame shared by both players.

use core::fmt;

use crate::board::BoardData;
use crate::common::{KeyError, LedgerError};
use crate::config::GameConfig;
use crate::keys::KeyManager;
use crate::record::{AttackOutcome, Coordinate, PlayerId, Record, RecordKind};
use crate::store::LedgerStore;
use crate::sync::WatchHandle;

/// Ledger format written by this build.
pub const CURRENT_VERSION: &str = "0";

const COMMENT: char = ';';

/// One step of attack resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The record could be opened with the given key.
    Readable(AttackOutcome),
    /// The record is sealed for the other party; its paired record sits at
    /// this index.
    DelegateTo(usize),
}

/// Ordered list of records plus the store it is persisted to.
pub struct Ledger {
    records: Vec<Record>,
    comments: Vec<String>,
    store: Option<Box<dyn LedgerStore>>,
    epoch: u64,
}

impl Ledger {
    /// Start a new savegame holding only the `VERSION` record and persist it.
    pub fn create(store: Box<dyn LedgerStore>) -> Result<Self, LedgerError> {
        let mut ledger = Self {
            records: vec![Record::new(RecordKind::Version, PlayerId::One, CURRENT_VERSION)],
            comments: Vec::new(),
            store: Some(store),
            epoch: 0,
        };
        // whatever the store held before is replaced, not merged
        ledger.persist()?;
        Ok(ledger)
    }

    /// Read the savegame held by `store`.
    pub fn load(store: Box<dyn LedgerStore>) -> Result<Self, LedgerError> {
        let text = store.load()?.ok_or(LedgerError::MissingVersion)?;
        let mut ledger = Self::from_text(&text)?;
        ledger.store = Some(store);
        Ok(ledger)
    }

    /// Parse ledger text without any backing store.
    ///
    /// Blank lines are skipped, `;` lines kept as comments and malformed lines
    /// dropped with a warning.
    pub fn from_text(text: &str) -> Result<Self, LedgerError> {
        let mut records = Vec::new();
        let mut comments = Vec::new();
        for (lineno, raw) in text.lines().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with(COMMENT) {
                comments.push(trimmed.to_string());
                continue;
            }
            // trailing blanks belong to the payload
            let line = raw.trim_start().trim_end_matches('\r');
            match line.parse::<Record>() {
                Ok(rec) => records.push(rec),
                Err(e) => log::warn!("skipping savegame line {}: {}", lineno + 1, e),
            }
        }

        match records.first() {
            Some(first) if first.kind() == RecordKind::Version => {
                if first.payload().trim() != CURRENT_VERSION {
                    return Err(LedgerError::UnsupportedVersion(first.payload().to_string()));
                }
            }
            _ => return Err(LedgerError::MissingVersion),
        }

        Ok(Self {
            records,
            comments,
            store: None,
            epoch: 0,
        })
    }

    /// Full text as written to the store: comments first, then one record
    /// per line.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for comment in &self.comments {
            out.push_str(comment);
            out.push('\n');
        }
        for rec in &self.records {
            out.push_str(&rec.to_string());
            out.push('\n');
        }
        out
    }

    /// Re-read the attached store, replacing the in-memory records.
    pub fn reload(&mut self) -> Result<(), LedgerError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };
        let text = store.load()?.ok_or(LedgerError::MissingVersion)?;
        let fresh = Self::from_text(&text)?;
        if !fresh.records.starts_with(&self.records) {
            log::warn!(
                "savegame rewritten: {} records before, {} now",
                self.records.len(),
                fresh.records.len()
            );
            self.epoch += 1;
        }
        self.records = fresh.records;
        self.comments = fresh.comments;
        Ok(())
    }

    fn persist(&mut self) -> Result<(), LedgerError> {
        let text = self.to_text();
        if let Some(store) = self.store.as_mut() {
            store.store(&text)?;
        }
        Ok(())
    }

    /// Append a record and persist the whole ledger. Returns the record's
    /// index.
    ///
    /// Records stored by the other player in the meantime are merged in
    /// first; reading, merging and writing happen under one store lock. If
    /// persisting fails the ledger is left as it was.
    pub fn append(
        &mut self,
        kind: RecordKind,
        player: PlayerId,
        payload: &str,
    ) -> Result<usize, LedgerError> {
        let record = Record::new(kind, player, payload);
        let Some(store) = self.store.as_mut() else {
            self.records.push(record);
            return Ok(self.records.len() - 1);
        };

        let mut merged: Option<Self> = None;
        store.update(&mut |stored| {
            let mut next = Self {
                records: self.records.clone(),
                comments: self.comments.clone(),
                store: None,
                epoch: self.epoch,
            };
            if let Some(text) = stored {
                next.adopt(text);
            }
            next.records.push(record.clone());
            let text = next.to_text();
            merged = Some(next);
            Ok(text)
        })?;

        if let Some(next) = merged {
            self.records = next.records;
            self.comments = next.comments;
            self.epoch = next.epoch;
        }
        let idx = self.records.len() - 1;
        log::debug!("appended {}:{} as record {}", kind, player, idx);
        Ok(idx)
    }

    /// Take over the records another writer stored. Unreadable text is
    /// ignored; a store that does not extend our records wins anyway.
    fn adopt(&mut self, text: &str) {
        let fresh = match Self::from_text(text) {
            Ok(fresh) => fresh,
            Err(e) => {
                log::warn!("ignoring unreadable savegame: {}", e);
                return;
            }
        };
        if !fresh.records.starts_with(&self.records) {
            log::warn!("savegame diverged from the loaded copy, adopting the stored records");
            self.epoch += 1;
        }
        self.records = fresh.records;
        self.comments = fresh.comments;
    }

    /// Bumped whenever the records were replaced by ones that do not extend
    /// the previous list, so replays know to start over.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Forward own writes to `handle`.
    pub fn attach_watch(&mut self, handle: WatchHandle) {
        if let Some(store) = self.store.as_mut() {
            store.attach_watch(handle);
        }
    }

    /// Store `key=value` as a `CONFIG` record. Repeating the same value is a
    /// no-op; changing an existing key is refused.
    pub fn set_config(&mut self, key: &str, value: &str) -> Result<(), LedgerError> {
        match self.config(key) {
            Some(existing) if existing == value => Ok(()),
            Some(_) => Err(LedgerError::DuplicateConfig(key.to_string())),
            None => self
                .append(RecordKind::Config, PlayerId::One, &format!("{}={}", key, value))
                .map(|_| ()),
        }
    }

    fn config_entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.records
            .iter()
            .filter(|r| r.kind() == RecordKind::Config)
            .filter_map(|r| r.payload().split_once('='))
    }

    /// Value of config `key`, if set.
    pub fn config(&self, key: &str) -> Option<&str> {
        self.config_entries()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Match parameters; defaults for keys the ledger does not set.
    pub fn game_config(&self) -> Result<GameConfig, LedgerError> {
        Ok(GameConfig::from_entries(self.config_entries())?)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Records of `kind` addressed to `player`, in append order.
    pub fn records_of(
        &self,
        player: PlayerId,
        kind: RecordKind,
    ) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter().filter(move |r| r.is(kind, player))
    }

    pub fn has(&self, kind: RecordKind, player: PlayerId) -> bool {
        self.records_of(player, kind).next().is_some()
    }

    /// Last record that is not a `MESSAGE`, with its index.
    pub fn last_record(&self) -> Option<(usize, &Record)> {
        self.records
            .iter()
            .enumerate()
            .rev()
            .find(|(_, r)| r.kind() != RecordKind::Message)
    }

    pub fn last_index(&self) -> Option<usize> {
        self.records.len().checked_sub(1)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn location(&self) -> Option<&std::path::Path> {
        self.store.as_ref().and_then(|s| s.location())
    }

    /// Try to read the outcome of the ATTACK or RESULT at `index` with `key`.
    pub fn resolve_step(&self, index: usize, key: &KeyManager) -> Result<Resolution, LedgerError> {
        let rec = self
            .records
            .get(index)
            .ok_or(LedgerError::NotAnAction(index))?;
        match rec.kind() {
            RecordKind::Attack => match key.open(rec.payload()) {
                Ok(text) => {
                    let target: Coordinate = text.parse()?;
                    let board = self.open_board(rec.player(), key)?;
                    let hit = board.is_occupied(target.x, target.y)?;
                    Ok(Resolution::Readable(AttackOutcome {
                        x: target.x,
                        y: target.y,
                        hit,
                    }))
                }
                Err(KeyError::DecryptionFailed) => self.records[index + 1..]
                    .iter()
                    .position(|r| r.kind() == RecordKind::Result)
                    .map(|offset| Resolution::DelegateTo(index + 1 + offset))
                    .ok_or(LedgerError::Unpaired(index)),
                Err(e) => Err(e.into()),
            },
            RecordKind::Result => match key.open(rec.payload()) {
                Ok(text) => Ok(Resolution::Readable(text.parse()?)),
                Err(KeyError::DecryptionFailed) => self.records[..index]
                    .iter()
                    .rposition(|r| r.kind() == RecordKind::Attack)
                    .map(Resolution::DelegateTo)
                    .ok_or(LedgerError::Unpaired(index)),
                Err(e) => Err(e.into()),
            },
            _ => Err(LedgerError::NotAnAction(index)),
        }
    }

    /// Outcome of the action at `index`, following at most one delegation to
    /// its paired record.
    pub fn resolve_attack_outcome(
        &self,
        index: usize,
        key: &KeyManager,
    ) -> Result<AttackOutcome, LedgerError> {
        match self.resolve_step(index, key)? {
            Resolution::Readable(outcome) => Ok(outcome),
            Resolution::DelegateTo(paired) => match self.resolve_step(paired, key)? {
                Resolution::Readable(outcome) => Ok(outcome),
                Resolution::DelegateTo(_) => Err(LedgerError::Unpaired(index)),
            },
        }
    }

    /// Decrypt the `BOARD` record of `owner`.
    pub fn open_board(&self, owner: PlayerId, key: &KeyManager) -> Result<BoardData, LedgerError> {
        let rec = self
            .records_of(owner, RecordKind::Board)
            .next()
            .ok_or_else(|| LedgerError::InvalidFormat(format!("no board for player {}", owner)))?;
        let text = key.open(rec.payload())?;
        Ok(text.parse()?)
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("records", &self.records.len())
            .field("comments", &self.comments.len())
            .field("location", &self.location())
            .finish()
    }
}
