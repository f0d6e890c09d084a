//! Commonly used types and utilities for ease of import.

pub use crate::{
    AttackOutcome, BoardData, FileStore, GameConfig, GameEngine, GameError, GameEvent, KeyManager,
    Ledger, LedgerStore, MemoryStore, Phase, PlayerId, Record, RecordKind, StatusObserver,
    WatchHandle,
};

#[cfg(feature = "runtime")]
pub use crate::{LedgerChanged, LedgerWatcher};
