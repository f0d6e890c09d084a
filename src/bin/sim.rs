use anyhow::bail;
use battleship_ledger::{
    BoardData, GameConfig, GameEngine, KeyManager, MemoryStore, Phase,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde_json::json;

fn pick_target(view: &BoardData, rng: &mut SmallRng) -> Option<(usize, usize)> {
    let size = view.size();
    let open: Vec<(usize, usize)> = (0..size * size)
        .map(|i| (i % size, i / size))
        .filter(|&(x, y)| !view.is_shot(x, y).unwrap_or(true))
        .collect();
    if open.is_empty() {
        return None;
    }
    Some(open[rng.random_range(0..open.len())])
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <seed1> <seed2>", args[0]);
        std::process::exit(1);
    }
    let seed1: u64 = args[1].parse()?;
    let seed2: u64 = args[2].parse()?;

    let config = GameConfig::default();
    let store = MemoryStore::new();
    let mut p1 = GameEngine::with_keys(KeyManager::generate()?, config.clone())?;
    let mut p2 = GameEngine::with_keys(KeyManager::generate()?, config.clone())?;

    p1.create_game(Box::new(store.clone()))?;
    p2.load_game(Box::new(store.clone()))?;
    p1.place_random_fleet(Some(seed1))?;
    p1.commit_fleet()?;
    p2.place_random_fleet(Some(seed2))?;
    p2.commit_fleet()?;
    p1.reload()?;

    let mut engines = [p1, p2];
    let mut rngs = [
        SmallRng::seed_from_u64(seed1.wrapping_add(1)),
        SmallRng::seed_from_u64(seed2.wrapping_add(1)),
    ];
    let mut shots = [0usize; 2];
    let max_turns = 2 * config.size * config.size;

    let mut turns = 0;
    while !(engines[0].phase().is_finished() && engines[1].phase().is_finished()) {
        let shooter = match (engines[0].phase(), engines[1].phase()) {
            (Phase::Attack, _) => 0,
            (_, Phase::Attack) => 1,
            other => bail!("no player can move in phases {:?}", other),
        };
        let defender = 1 - shooter;
        let Some((x, y)) = pick_target(engines[shooter].opponent_board(), &mut rngs[shooter])
        else {
            bail!("player {} ran out of targets", shooter + 1);
        };
        engines[shooter].fire(x, y)?;
        shots[shooter] += 1;
        // the defender answers while reloading
        engines[defender].reload()?;
        engines[shooter].reload()?;

        turns += 1;
        if turns > max_turns {
            bail!("game did not finish after {} turns", turns);
        }
    }

    let winner = match (engines[0].phase(), engines[1].phase()) {
        (Phase::Finished { won: true }, _) => Some("player1"),
        (_, Phase::Finished { won: true }) => Some("player2"),
        _ => None,
    };

    let result = json!({
        "player1": {"phase": engines[0].phase(), "shots": shots[0]},
        "player2": {"phase": engines[1].phase(), "shots": shots[1]},
        "records": store.contents().map(|t| t.lines().count()),
        "winner": winner,
    });

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}
