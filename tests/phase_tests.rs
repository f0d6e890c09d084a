mod common;

use battleship_ledger::{
    derive_phase, AttackOutcome, BoardData, KeyManager, Ledger, LedgerStore, MemoryStore, Phase,
    Playback, PlayerId, RecordKind,
};

/// Two players on a 4x4 board with a single ship of length 2 each.
struct Table {
    ledger: Ledger,
    alice: KeyManager,
    bob: KeyManager,
    alice_board: BoardData,
    bob_board: BoardData,
}

impl Table {
    fn new() -> Self {
        let mut alice_board = BoardData::new(4);
        alice_board.place_ship(1, 0, 0, 2, false).unwrap();
        let mut bob_board = BoardData::new(4);
        bob_board.place_ship(1, 3, 2, 2, true).unwrap();
        Self {
            ledger: Ledger::from_text("VERSION:1,0\nCONFIG:1,ships=2\nCONFIG:1,size=4\n").unwrap(),
            alice: common::keys(1),
            bob: common::keys(2),
            alice_board,
            bob_board,
        }
    }

    fn key(&self, player: PlayerId) -> &KeyManager {
        match player {
            PlayerId::One => &self.alice,
            PlayerId::Two => &self.bob,
        }
    }

    fn phases(&self) -> (Phase, Phase) {
        (
            Phase::derive(&self.ledger, PlayerId::One, &self.alice).unwrap(),
            Phase::derive(&self.ledger, PlayerId::Two, &self.bob).unwrap(),
        )
    }

    fn join(&mut self, player: PlayerId) {
        let key = self.key(player).public_key_base64().to_string();
        self.ledger.append(RecordKind::Player, player, &key).unwrap();
    }

    fn commit(&mut self, player: PlayerId) {
        let board = match player {
            PlayerId::One => self.alice_board.to_string(),
            PlayerId::Two => self.bob_board.to_string(),
        };
        let sealed = self.key(player).seal(&board).unwrap();
        self.ledger.append(RecordKind::Board, player, &sealed).unwrap();
    }

    /// `shooter` fires at (x, y) and the defender answers truthfully.
    fn shot(&mut self, shooter: PlayerId, x: usize, y: usize) {
        let target = shooter.opponent();
        let target_key = KeyManager::from_public_base64(self.key(target).public_key_base64()).unwrap();
        let shooter_key =
            KeyManager::from_public_base64(self.key(shooter).public_key_base64()).unwrap();
        self.ledger
            .append(
                RecordKind::Attack,
                target,
                &target_key.seal(&format!("{},{}", x, y)).unwrap(),
            )
            .unwrap();
        let defender_board = match target {
            PlayerId::One => &self.alice_board,
            PlayerId::Two => &self.bob_board,
        };
        let hit = defender_board.is_occupied(x, y).unwrap();
        let outcome = AttackOutcome { x, y, hit };
        self.ledger
            .append(
                RecordKind::Result,
                shooter,
                &shooter_key.seal(&outcome.to_string()).unwrap(),
            )
            .unwrap();
    }
}

#[test]
fn test_setup_phases() {
    let mut t = Table::new();
    assert_eq!(t.phases(), (Phase::Init, Phase::Init));
    t.join(PlayerId::One);
    assert_eq!(t.phases(), (Phase::Placement, Phase::Init));
    t.commit(PlayerId::One);
    assert_eq!(t.phases(), (Phase::WaitForOpponentStart, Phase::Init));
    t.join(PlayerId::Two);
    assert_eq!(t.phases(), (Phase::WaitForOpponentStart, Phase::Placement));
    t.commit(PlayerId::Two);
    assert_eq!(t.phases(), (Phase::Attack, Phase::WaitForAttack));
}

#[test]
fn test_attack_and_result() {
    let mut t = Table::new();
    t.join(PlayerId::One);
    t.join(PlayerId::Two);
    t.commit(PlayerId::One);
    t.commit(PlayerId::Two);

    // an unanswered attack
    let bob_public = KeyManager::from_public_base64(t.bob.public_key_base64()).unwrap();
    let mut pending = Ledger::from_text(&t.ledger.to_text()).unwrap();
    pending
        .append(RecordKind::Attack, PlayerId::Two, &bob_public.seal("3,2").unwrap())
        .unwrap();
    assert_eq!(
        Phase::derive(&pending, PlayerId::One, &t.alice).unwrap(),
        Phase::WaitForResult
    );
    assert_eq!(
        Phase::derive(&pending, PlayerId::Two, &t.bob).unwrap(),
        Phase::UnderAttack
    );

    // a hit keeps the turn
    t.shot(PlayerId::One, 3, 2);
    assert_eq!(t.phases(), (Phase::Attack, Phase::WaitForAttack));

    // a miss passes it on
    t.shot(PlayerId::One, 0, 0);
    assert_eq!(t.phases(), (Phase::WaitForAttack, Phase::Attack));

    t.shot(PlayerId::Two, 2, 2);
    assert_eq!(t.phases(), (Phase::Attack, Phase::WaitForAttack));
}

#[test]
fn test_messages_do_not_change_the_phase() {
    let mut t = Table::new();
    t.join(PlayerId::One);
    t.join(PlayerId::Two);
    t.commit(PlayerId::One);
    t.commit(PlayerId::Two);
    t.shot(PlayerId::One, 1, 1);
    let before = t.phases();
    t.ledger
        .append(RecordKind::Message, PlayerId::Two, "nice try")
        .unwrap();
    assert_eq!(t.phases(), before);
}

#[test]
fn test_sinking_the_fleet_finishes() {
    let mut t = Table::new();
    t.join(PlayerId::One);
    t.join(PlayerId::Two);
    t.commit(PlayerId::One);
    t.commit(PlayerId::Two);
    t.shot(PlayerId::One, 3, 2);
    assert_eq!(t.phases(), (Phase::Attack, Phase::WaitForAttack));
    t.shot(PlayerId::One, 3, 3);
    assert_eq!(
        t.phases(),
        (Phase::Finished { won: true }, Phase::Finished { won: false })
    );
}

#[test]
fn test_incremental_playback_matches_full_replay() {
    let mut t = Table::new();
    t.join(PlayerId::One);
    t.join(PlayerId::Two);
    t.commit(PlayerId::One);
    t.commit(PlayerId::Two);

    let mut playback = Playback::new(4);
    playback.advance(&t.ledger, PlayerId::Two, &t.bob);
    assert_eq!(playback.own(), &t.bob_board);

    t.shot(PlayerId::One, 3, 2);
    t.shot(PlayerId::One, 0, 0);
    assert_eq!(playback.advance(&t.ledger, PlayerId::Two, &t.bob), 2);
    assert_eq!(playback.cursor(), t.ledger.len());
    assert!(playback.own().is_shot(3, 2).unwrap());
    assert_eq!(playback.own().hit_count(), 1);
    assert_eq!(
        derive_phase(&t.ledger, PlayerId::Two, &t.bob, &playback).unwrap(),
        Phase::Attack
    );

    // a rewritten, shorter ledger forces a fresh replay
    let short = Ledger::from_text("VERSION:1,0\nCONFIG:1,ships=2\nCONFIG:1,size=4\n").unwrap();
    playback.advance(&short, PlayerId::Two, &t.bob);
    assert!(!playback.own().has_ships());
    assert_eq!(playback.cursor(), 3);
}

#[test]
fn test_playback_restarts_when_history_changes() {
    let mut t = Table::new();
    t.join(PlayerId::One);
    t.join(PlayerId::Two);
    t.commit(PlayerId::One);
    t.commit(PlayerId::Two);
    let base = t.ledger.to_text();
    t.shot(PlayerId::One, 3, 2);
    let hit = t.ledger.to_text();
    t.ledger = Ledger::from_text(&base).unwrap();
    t.shot(PlayerId::One, 0, 0);
    let miss = t.ledger.to_text();

    let store = MemoryStore::with_text(&hit);
    let mut ledger = Ledger::load(Box::new(store.clone())).unwrap();
    let mut playback = Playback::new(4);
    playback.advance(&ledger, PlayerId::Two, &t.bob);
    assert!(playback.own().is_shot(3, 2).unwrap());

    // same length, different shot
    store.clone().store(&miss).unwrap();
    ledger.reload().unwrap();
    assert_eq!(ledger.len(), playback.cursor());
    playback.advance(&ledger, PlayerId::Two, &t.bob);
    assert!(!playback.own().is_shot(3, 2).unwrap());
    assert!(playback.own().is_shot(0, 0).unwrap());
    assert_eq!(
        derive_phase(&ledger, PlayerId::Two, &t.bob, &playback).unwrap(),
        Phase::Attack
    );
}
