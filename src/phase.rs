//! Turn state derived from the tail of the ledger.
//!
//! Neither process ever stores whose turn it is. Both derive it from the
//! same records, so as long as they agree on the ledger they agree on the
//! phase.

use core::fmt;

use crate::common::LedgerError;
use crate::keys::KeyManager;
use crate::ledger::Ledger;
use crate::playback::Playback;
use crate::record::{PlayerId, RecordKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Not seated in a game yet.
    Init,
    /// Seated, fleet not committed.
    Placement,
    /// Own fleet committed, opponent missing or still placing.
    WaitForOpponentStart,
    /// Our shot.
    Attack,
    /// Opponent's shot.
    WaitForAttack,
    /// Opponent fired at us; a result is owed.
    UnderAttack,
    /// We fired; waiting for the opponent's result.
    WaitForResult,
    /// Our shot was just answered.
    ResultOfAttack,
    Finished { won: bool },
}

impl Phase {
    /// Derive the phase from scratch, replaying the whole ledger.
    pub fn derive(ledger: &Ledger, me: PlayerId, key: &KeyManager) -> Result<Phase, LedgerError> {
        let mut playback = Playback::new(ledger.game_config()?.size);
        playback.advance(ledger, me, key);
        derive_phase(ledger, me, key, &playback)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Phase::Finished { .. })
    }

    /// Phases in which the local player is expected to act.
    pub fn awaits_local_action(self) -> bool {
        matches!(self, Phase::Placement | Phase::Attack | Phase::UnderAttack)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Phase::Init => "No game loaded",
            Phase::Placement => "Place your ships",
            Phase::WaitForOpponentStart => "Waiting for the opponent to place ships",
            Phase::Attack => "Your turn: fire at the opponent",
            Phase::WaitForAttack => "Waiting for the opponent to fire",
            Phase::UnderAttack => "Under attack",
            Phase::WaitForResult => "Waiting for the result of your shot",
            Phase::ResultOfAttack => "Result of your shot arrived",
            Phase::Finished { won: true } => "You won!",
            Phase::Finished { won: false } => "You lost.",
        };
        f.write_str(text)
    }
}

/// Phase of player `me` given a ledger and a playback that has replayed it.
pub fn derive_phase(
    ledger: &Ledger,
    me: PlayerId,
    key: &KeyManager,
    playback: &Playback,
) -> Result<Phase, LedgerError> {
    let other = me.opponent();
    if !ledger.has(RecordKind::Player, me) {
        return Ok(Phase::Init);
    }
    if !ledger.has(RecordKind::Board, me) {
        return Ok(Phase::Placement);
    }
    if !ledger.has(RecordKind::Player, other) || !ledger.has(RecordKind::Board, other) {
        return Ok(Phase::WaitForOpponentStart);
    }

    let last = ledger.last_record();

    // an open attack is answered before the game can end
    if let Some((_, rec)) = last {
        if rec.kind() == RecordKind::Attack {
            return Ok(if rec.player() == me {
                Phase::UnderAttack
            } else {
                Phase::WaitForResult
            });
        }
    }

    if playback.own().all_sunk() {
        return Ok(Phase::Finished { won: false });
    }
    let fleet_cells = ledger.game_config()?.fleet_cells();
    if playback.opponent().hit_count() >= fleet_cells {
        return Ok(Phase::Finished { won: true });
    }

    match last {
        Some((idx, rec)) if rec.kind() == RecordKind::Result => {
            let outcome = ledger.resolve_attack_outcome(idx, key)?;
            let shooter = rec.player() == me;
            Ok(match (shooter, outcome.hit) {
                (true, true) | (false, false) => Phase::Attack,
                (true, false) | (false, true) => Phase::WaitForAttack,
            })
        }
        _ => Ok(match me {
            PlayerId::One => Phase::Attack,
            PlayerId::Two => Phase::WaitForAttack,
        }),
    }
}
