mod common;

use std::sync::{Arc, Mutex};

use battleship_ledger::{
    BoardData, FileStore, GameConfig, GameEngine, GameError, GameEvent, MemoryStore, Phase,
    PlayerId, StatusObserver,
};

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<GameEvent>>>);

impl Recorder {
    fn phases(&self) -> Vec<Phase> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                GameEvent::Phase(p) => Some(*p),
                GameEvent::Status(_) => None,
            })
            .collect()
    }
}

impl StatusObserver for Recorder {
    fn notify(&self, event: &GameEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

fn small() -> GameConfig {
    GameConfig::new(4, &[2, 1])
}

fn fleet(layout: &[(u8, usize, usize, usize, bool)]) -> BoardData {
    let mut board = BoardData::new(4);
    for &(id, x, y, len, vertical) in layout {
        board.place_ship(id, x, y, len, vertical).unwrap();
    }
    board
}

/// Both players seated with committed fleets on a shared memory store.
fn seated() -> (GameEngine, GameEngine, Recorder, MemoryStore) {
    let store = MemoryStore::new();
    let recorder = Recorder::default();
    let mut alice = GameEngine::new(&common::identity(1), small()).unwrap();
    alice.add_observer(Box::new(recorder.clone()));
    alice.create_game(Box::new(store.clone())).unwrap();
    assert_eq!(alice.player(), Some(PlayerId::One));
    assert_eq!(alice.phase(), Phase::Placement);

    let mut bob = GameEngine::new(&common::identity(2), GameConfig::default()).unwrap();
    bob.load_game(Box::new(store.clone())).unwrap();
    assert_eq!(bob.player(), Some(PlayerId::Two));
    assert_eq!(bob.config(), &small());
    assert_eq!(bob.phase(), Phase::Placement);

    alice
        .set_own_board(fleet(&[(1, 0, 0, 2, false), (2, 3, 3, 1, false)]))
        .unwrap();
    alice.commit_fleet().unwrap();
    assert_eq!(alice.phase(), Phase::WaitForOpponentStart);

    bob.place_ship(1, 1, 1, true).unwrap();
    bob.place_ship(2, 3, 0, false).unwrap();
    bob.commit_fleet().unwrap();
    assert_eq!(bob.phase(), Phase::WaitForAttack);

    alice.reload().unwrap();
    assert_eq!(alice.phase(), Phase::Attack);
    (alice, bob, recorder, store)
}

#[test]
fn test_full_game() {
    let (mut alice, mut bob, recorder, store) = seated();

    // miss: the turn passes
    alice.fire(0, 0).unwrap();
    assert_eq!(alice.phase(), Phase::WaitForResult);
    bob.reload().unwrap();
    assert_eq!(bob.phase(), Phase::Attack);
    assert!(bob.own_board().is_shot(0, 0).unwrap());
    alice.reload().unwrap();
    assert_eq!(alice.phase(), Phase::WaitForAttack);
    assert!(alice.opponent_board().is_shot(0, 0).unwrap());
    assert!(!alice.opponent_board().is_occupied(0, 0).unwrap());

    // bob hits and keeps shooting
    bob.fire(0, 0).unwrap();
    alice.reload().unwrap();
    bob.reload().unwrap();
    assert_eq!(bob.phase(), Phase::Attack);
    assert_eq!(alice.phase(), Phase::WaitForAttack);
    bob.fire(2, 2).unwrap();
    alice.reload().unwrap();
    bob.reload().unwrap();
    assert_eq!(alice.phase(), Phase::Attack);

    // alice sinks everything
    for (x, y) in [(1, 1), (1, 2), (3, 0)] {
        alice.fire(x, y).unwrap();
        bob.reload().unwrap();
        alice.reload().unwrap();
    }
    assert_eq!(alice.phase(), Phase::Finished { won: true });
    assert_eq!(bob.phase(), Phase::Finished { won: false });
    assert!(bob.own_board().all_sunk());
    assert_eq!(alice.opponent_board().hit_count(), 3);

    let phases = recorder.phases();
    assert_eq!(phases.first(), Some(&Phase::Placement));
    assert_eq!(phases.last(), Some(&Phase::Finished { won: true }));
    assert!(phases.contains(&Phase::ResultOfAttack));
    let text = store.contents().unwrap();
    assert_eq!(text.lines().filter(|l| l.starts_with("ATTACK:")).count(), 6);
    assert_eq!(text.lines().filter(|l| l.starts_with("RESULT:")).count(), 6);
}

#[test]
fn test_wrong_phase_is_rejected() {
    let (mut alice, mut bob, _, _) = seated();
    assert!(matches!(bob.fire(0, 0), Err(GameError::InvalidState(_))));
    assert!(matches!(
        alice.place_ship(1, 0, 3, false),
        Err(GameError::InvalidState(_))
    ));
    assert!(matches!(
        alice.resolve_incoming(),
        Err(GameError::InvalidState(_))
    ));
    alice.fire(2, 2).unwrap();
    assert!(matches!(alice.fire(2, 3), Err(GameError::InvalidState(_))));
}

#[test]
fn test_fleet_must_be_complete() {
    let store = MemoryStore::new();
    let mut alice = GameEngine::new(&common::identity(1), small()).unwrap();
    assert!(matches!(
        alice.place_ship(1, 0, 0, false),
        Err(GameError::InvalidState(_))
    ));
    alice.create_game(Box::new(store)).unwrap();
    assert!(matches!(
        alice.commit_fleet(),
        Err(GameError::InvalidState(_))
    ));
    alice.place_ship(1, 0, 0, false).unwrap();
    assert!(matches!(
        alice.commit_fleet(),
        Err(GameError::InvalidState(_))
    ));
    assert!(matches!(
        alice.place_ship(3, 2, 2, false),
        Err(GameError::Board(_))
    ));
    alice.place_random_fleet(Some(9)).unwrap();
    alice.commit_fleet().unwrap();
    assert_eq!(alice.phase(), Phase::WaitForOpponentStart);
}

#[test]
fn test_third_player_is_turned_away() {
    let (_, _, _, store) = seated();
    let mut carol = GameEngine::new(&common::identity(3), small()).unwrap();
    assert!(matches!(
        carol.load_game(Box::new(store)),
        Err(GameError::GameFull)
    ));
    assert_eq!(carol.phase(), Phase::Init);
}

#[test]
fn test_resume_takes_the_same_seat() {
    let (mut alice, _, _, store) = seated();
    alice.fire(1, 1).unwrap();

    let mut again = GameEngine::new(&common::identity(2), small()).unwrap();
    again.load_game(Box::new(store.clone())).unwrap();
    assert_eq!(again.player(), Some(PlayerId::Two));
    // the pending attack is answered while loading
    assert_eq!(again.phase(), Phase::WaitForAttack);
    assert!(again.own_board().is_shot(1, 1).unwrap());
    alice.reload().unwrap();
    assert_eq!(alice.phase(), Phase::Attack);
    assert!(alice.opponent_board().is_occupied(1, 1).unwrap());
}

#[test]
fn test_messages() {
    let (mut alice, mut bob, _, _) = seated();
    alice.say("good luck\nhave fun").unwrap();
    bob.reload().unwrap();
    bob.say("thanks").unwrap();
    alice.reload().unwrap();
    assert_eq!(alice.phase(), Phase::Attack);
    assert_eq!(
        alice.messages(),
        vec![
            (PlayerId::One, "good luck\nhave fun".to_string()),
            (PlayerId::Two, "thanks".to_string())
        ]
    );
}

#[test]
fn test_game_over_a_file() {
    let path = common::scratch_file("engine.game");
    let mut alice = GameEngine::new(&common::identity(1), small()).unwrap();
    alice.create_game(Box::new(FileStore::new(&path))).unwrap();
    let mut bob = GameEngine::new(&common::identity(2), small()).unwrap();
    bob.load_game(Box::new(FileStore::new(&path))).unwrap();

    alice.place_random_fleet(Some(1)).unwrap();
    alice.commit_fleet().unwrap();
    bob.place_random_fleet(Some(2)).unwrap();
    bob.commit_fleet().unwrap();
    alice.reload().unwrap();
    assert_eq!(alice.phase(), Phase::Attack);
    assert_eq!(alice.ledger().unwrap().location(), Some(path.as_path()));

    alice.fire(3, 3).unwrap();
    bob.reload().unwrap();
    alice.reload().unwrap();
    assert!(alice.opponent_board().is_shot(3, 3).unwrap());
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("VERSION:1,0\nCONFIG:1,ships=2,1\nCONFIG:1,size=4\nPLAYER:1,"));
}
