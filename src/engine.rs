//! Local player's view of a ledger-mediated game.

use std::path::Path;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::board::BoardData;
use crate::common::{BoardError, GameError};
use crate::config::GameConfig;
use crate::keys::KeyManager;
use crate::ledger::Ledger;
use crate::phase::{derive_phase, Phase};
use crate::playback::Playback;
use crate::record::{AttackOutcome, Coordinate, PlayerId, RecordKind};
use crate::store::LedgerStore;
use crate::sync::WatchHandle;
use crate::ui::format_coord;

/// Published to every registered [`StatusObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GameEvent {
    Phase(Phase),
    Status(String),
}

/// Receives phase changes and status lines from the engine.
pub trait StatusObserver: Send {
    fn notify(&self, event: &GameEvent);
}

/// Owns the keys, boards and ledger of the local player.
pub struct GameEngine {
    keys: KeyManager,
    opponent_key: Option<KeyManager>,
    config: GameConfig,
    player: Option<PlayerId>,
    ledger: Option<Ledger>,
    draft: BoardData,
    playback: Playback,
    phase: Phase,
    announced_result: Option<usize>,
    observers: Vec<Box<dyn StatusObserver>>,
    watch: Option<WatchHandle>,
}

impl GameEngine {
    /// Load or create the identity at `identity` and verify it can seal and
    /// open a board of the configured size.
    pub fn new(identity: &Path, config: GameConfig) -> Result<Self, GameError> {
        let keys = KeyManager::load_or_generate(identity)?;
        Self::with_keys(keys, config)
    }

    pub fn with_keys(keys: KeyManager, config: GameConfig) -> Result<Self, GameError> {
        config.validate()?;
        let sample = BoardData::generate_seeded(config.size, 0, &config.ships)?;
        keys.self_test(&sample.to_string())?;
        Ok(Self {
            keys,
            opponent_key: None,
            draft: BoardData::new(config.size),
            playback: Playback::new(config.size),
            config,
            player: None,
            ledger: None,
            phase: Phase::Init,
            announced_result: None,
            observers: Vec::new(),
            watch: None,
        })
    }

    pub fn add_observer(&mut self, observer: Box<dyn StatusObserver>) {
        self.observers.push(observer);
    }

    /// Route every following write through `handle` so the watcher does not
    /// report it as a remote change.
    pub fn attach_watch(&mut self, handle: WatchHandle) {
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.attach_watch(handle.clone());
        }
        self.watch = Some(handle);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn ledger(&self) -> Option<&Ledger> {
        self.ledger.as_ref()
    }

    pub fn public_key(&self) -> &str {
        self.keys.public_key_base64()
    }

    /// Fleet being placed, or the committed fleet with incoming shots.
    pub fn own_board(&self) -> &BoardData {
        if self.playback.own().has_ships() {
            self.playback.own()
        } else {
            &self.draft
        }
    }

    pub fn opponent_board(&self) -> &BoardData {
        self.playback.opponent()
    }

    /// Chat lines in ledger order.
    pub fn messages(&self) -> Vec<(PlayerId, String)> {
        self.ledger
            .iter()
            .flat_map(|l| l.records())
            .filter(|r| r.kind() == RecordKind::Message)
            .map(|r| (r.player(), r.text()))
            .collect()
    }

    fn emit(&self, event: GameEvent) {
        for observer in &self.observers {
            observer.notify(&event);
        }
    }

    fn status(&self, text: impl Into<String>) {
        let text = text.into();
        log::info!("{}", text);
        self.emit(GameEvent::Status(text));
    }

    fn require(&self, phase: Phase, action: &str) -> Result<(), GameError> {
        if self.phase != phase {
            return Err(GameError::InvalidState(format!(
                "cannot {} while in phase {:?}",
                action, self.phase
            )));
        }
        Ok(())
    }

    fn seat(&self) -> Result<PlayerId, GameError> {
        self.player
            .ok_or_else(|| GameError::InvalidState("no game loaded".to_string()))
    }

    fn append(
        &mut self,
        kind: RecordKind,
        player: PlayerId,
        payload: &str,
    ) -> Result<usize, GameError> {
        let ledger = self
            .ledger
            .as_mut()
            .ok_or_else(|| GameError::InvalidState("no game loaded".to_string()))?;
        let _quiet = self.watch.as_ref().map(|w| w.quiet());
        Ok(ledger.append(kind, player, payload)?)
    }

    /// Start a new savegame in `store` and take seat 1.
    pub fn create_game(&mut self, mut store: Box<dyn LedgerStore>) -> Result<(), GameError> {
        if let Some(watch) = &self.watch {
            store.attach_watch(watch.clone());
        }
        let mut ledger = {
            let _quiet = self.watch.as_ref().map(|w| w.quiet());
            Ledger::create(store)?
        };
        for (key, value) in self.config.entries() {
            let _quiet = self.watch.as_ref().map(|w| w.quiet());
            ledger.set_config(key, &value)?;
        }
        self.reset(ledger, PlayerId::One);
        let key = self.keys.public_key_base64().to_string();
        self.append(RecordKind::Player, PlayerId::One, &key)?;
        log::info!("created a new game as player 1");
        self.refresh()
    }

    /// Open an existing savegame. The seat is found by public key; a free
    /// seat is taken if this key is not seated yet.
    pub fn load_game(&mut self, mut store: Box<dyn LedgerStore>) -> Result<(), GameError> {
        if let Some(watch) = &self.watch {
            store.attach_watch(watch.clone());
        }
        let ledger = Ledger::load(store)?;
        let config = ledger.game_config()?;
        let mine = self.keys.public_key_base64();
        let seated = [PlayerId::One, PlayerId::Two].into_iter().find(|&p| {
            ledger
                .records_of(p, RecordKind::Player)
                .next()
                .is_some_and(|r| r.payload() == mine)
        });
        let free = [PlayerId::One, PlayerId::Two]
            .into_iter()
            .find(|&p| !ledger.has(RecordKind::Player, p));

        match (seated, free) {
            (Some(player), _) => {
                log::info!("resuming game as player {}", player);
                self.config = config;
                self.reset(ledger, player);
            }
            (None, Some(player)) => {
                self.config = config;
                self.reset(ledger, player);
                let key = self.keys.public_key_base64().to_string();
                self.append(RecordKind::Player, player, &key)?;
                log::info!("joined game as player {}", player);
            }
            (None, None) => return Err(GameError::GameFull),
        }
        self.refresh()
    }

    fn reset(&mut self, ledger: Ledger, player: PlayerId) {
        self.ledger = Some(ledger);
        self.player = Some(player);
        self.opponent_key = None;
        self.draft = BoardData::new(self.config.size);
        self.playback = Playback::new(self.config.size);
        self.announced_result = None;
        self.phase = Phase::Init;
    }

    /// Re-read the savegame after an external change. Redundant calls are
    /// harmless.
    pub fn reload(&mut self) -> Result<(), GameError> {
        let Some(ledger) = self.ledger.as_mut() else {
            return Ok(());
        };
        ledger.reload()?;
        self.refresh()
    }

    /// Replay unseen records, derive the phase and publish what changed.
    /// Answers an incoming attack right away.
    fn refresh(&mut self) -> Result<(), GameError> {
        let me = self.seat()?;
        let Some(ledger) = self.ledger.as_ref() else {
            return Ok(());
        };

        if self.opponent_key.is_none() {
            if let Some(rec) = ledger.records_of(me.opponent(), RecordKind::Player).next() {
                self.opponent_key = Some(KeyManager::from_public_base64(rec.payload())?);
                log::info!("opponent joined as player {}", me.opponent());
            }
        }

        self.playback.advance(ledger, me, &self.keys);
        let phase = derive_phase(ledger, me, &self.keys, &self.playback)?;

        let fresh_result = match ledger.last_record() {
            Some((idx, rec))
                if rec.is(RecordKind::Result, me) && self.announced_result != Some(idx) =>
            {
                Some((idx, rec.payload().to_string()))
            }
            _ => None,
        };
        if let Some((idx, sealed)) = fresh_result {
            self.announced_result = Some(idx);
            let outcome = self
                .keys
                .open(&sealed)
                .ok()
                .and_then(|text| text.parse::<AttackOutcome>().ok());
            if let Some(outcome) = outcome {
                self.emit(GameEvent::Phase(Phase::ResultOfAttack));
                self.status(format!(
                    "Shot at {}: {}",
                    format_coord(outcome.x, outcome.y),
                    if outcome.hit { "hit" } else { "miss" }
                ));
            }
        }

        if phase != self.phase {
            log::info!("phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
            self.emit(GameEvent::Phase(phase));
        }

        if self.phase == Phase::UnderAttack {
            self.resolve_incoming()?;
        }
        Ok(())
    }

    /// Place ship `ship_id` of the configured fleet on the draft board.
    pub fn place_ship(
        &mut self,
        ship_id: u8,
        x: usize,
        y: usize,
        vertical: bool,
    ) -> Result<(), GameError> {
        self.require(Phase::Placement, "place ships")?;
        let length = ship_id
            .checked_sub(1)
            .and_then(|i| self.config.ships.get(i as usize))
            .copied()
            .ok_or(BoardError::InvalidShip { ship_id, length: 0 })?;
        self.draft.place_ship(ship_id, x, y, length, vertical)?;
        Ok(())
    }

    /// Replace the draft with a random fleet; `seed` makes it reproducible.
    pub fn place_random_fleet(&mut self, seed: Option<u64>) -> Result<(), GameError> {
        self.require(Phase::Placement, "place ships")?;
        let mut rng = match seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_rng(&mut rand::rng()),
        };
        self.draft = BoardData::generate_random(self.config.size, &self.config.ships, &mut rng)?;
        Ok(())
    }

    /// Replace the draft with a fully placed board.
    pub fn set_own_board(&mut self, board: BoardData) -> Result<(), GameError> {
        self.require(Phase::Placement, "place ships")?;
        if board.size() != self.config.size {
            return Err(GameError::InvalidState(format!(
                "board has size {} but the game uses {}",
                board.size(),
                self.config.size
            )));
        }
        if board.is_active() {
            return Err(GameError::InvalidState("board already has shots".to_string()));
        }
        self.draft = board;
        Ok(())
    }

    /// Seal the draft fleet into the ledger. Every ship of the configured
    /// fleet must be placed.
    pub fn commit_fleet(&mut self) -> Result<(), GameError> {
        self.require(Phase::Placement, "commit the fleet")?;
        let complete = (1..=self.config.ships.len()).all(|id| self.draft.is_placed(id as u8))
            && self.draft.occupied_count() == self.config.fleet_cells();
        if !self.draft.has_ships() || !complete {
            return Err(GameError::InvalidState(
                "place every ship before committing".to_string(),
            ));
        }
        let me = self.seat()?;
        let sealed = self.keys.seal(&self.draft.to_string())?;
        self.append(RecordKind::Board, me, &sealed)?;
        self.status("Fleet committed");
        self.refresh()
    }

    /// Fire at (`x`, `y`) on the opponent's waters.
    pub fn fire(&mut self, x: usize, y: usize) -> Result<(), GameError> {
        self.require(Phase::Attack, "fire")?;
        if self.playback.opponent().is_shot(x, y)? {
            return Err(GameError::InvalidState(format!(
                "already fired at {}",
                format_coord(x, y)
            )));
        }
        let opponent = self.seat()?.opponent();
        let sealed = match self.opponent_key.as_ref() {
            Some(key) => key.seal(&Coordinate { x, y }.to_string())?,
            None => return Err(GameError::InvalidState("opponent key unknown".to_string())),
        };
        self.append(RecordKind::Attack, opponent, &sealed)?;
        self.status(format!("Fired at {}", format_coord(x, y)));
        self.refresh()
    }

    /// Answer the pending attack with a result sealed to the shooter.
    pub fn resolve_incoming(&mut self) -> Result<(), GameError> {
        self.require(Phase::UnderAttack, "answer an attack")?;
        let (ledger, key) = match (self.ledger.as_ref(), self.opponent_key.as_ref()) {
            (Some(ledger), Some(key)) => (ledger, key),
            _ => return Err(GameError::InvalidState("opponent key unknown".to_string())),
        };
        let (idx, _) = ledger
            .last_record()
            .ok_or_else(|| GameError::InvalidState("no attack to answer".to_string()))?;
        let outcome = ledger.resolve_attack_outcome(idx, &self.keys)?;
        let sealed = key.seal(&outcome.to_string())?;
        let shooter = self.seat()?.opponent();
        self.append(RecordKind::Result, shooter, &sealed)?;
        self.status(format!(
            "Opponent fired at {}: {}",
            format_coord(outcome.x, outcome.y),
            if outcome.hit { "hit" } else { "miss" }
        ));
        self.refresh()
    }

    /// Append a chat line. Messages are never sealed.
    pub fn say(&mut self, text: &str) -> Result<(), GameError> {
        let me = self.seat()?;
        self.append(RecordKind::Message, me, text)?;
        Ok(())
    }
}
