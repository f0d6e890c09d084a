use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use battleship_ledger::ui::{parse_coord, render_board, render_view, ConsoleDisplay};
use battleship_ledger::{
    init_logging, parse_ships, FileStore, GameConfig, GameEngine, KeyManager, Ledger,
    LedgerChanged, LedgerWatcher, Phase, Playback, PlayerId, RecordKind, WatchHandle,
    DEFAULT_SIZE,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Duration;

const POLL: Duration = Duration::from_millis(250);
const DEBOUNCE: Duration = Duration::from_millis(400);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    /// Start a new savegame and take the first seat.
    New {
        #[arg(long, help = "Savegame file shared with the opponent")]
        game: PathBuf,
        #[arg(long, default_value = "battleship.id")]
        identity: PathBuf,
        #[arg(long, default_value_t = DEFAULT_SIZE)]
        size: usize,
        #[arg(long, default_value = "5,4,3,3,2")]
        ships: String,
        #[arg(long, help = "Place a reproducible random fleet (e.g., --seed 12345)")]
        seed: Option<u64>,
    },
    /// Join or resume a savegame.
    Join {
        #[arg(long)]
        game: PathBuf,
        #[arg(long, default_value = "battleship.id")]
        identity: PathBuf,
        #[arg(long, help = "Place a reproducible random fleet (e.g., --seed 12345)")]
        seed: Option<u64>,
    },
    /// Print the state of a savegame without changing it.
    Show {
        #[arg(long)]
        game: PathBuf,
        #[arg(long, default_value = "battleship.id")]
        identity: PathBuf,
    },
}

enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "\
Commands:
  random [seed]           place a random fleet
  place <id> <coord> h|v  place ship <id>, e.g. place 1 B4 h
  ready                   commit the fleet
  fire <coord>            fire at the opponent, e.g. fire C7
  say <text>              write a message into the savegame
  board                   show both boards
  reload                  re-read the savegame
  help                    this text
  quit                    leave (the game can be resumed later)";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::New {
            game,
            identity,
            size,
            ships,
            seed,
        } => {
            let config = GameConfig::new(size, &parse_ships(&ships)?);
            let mut engine = GameEngine::new(&identity, config)?;
            engine.add_observer(Box::new(ConsoleDisplay));
            engine.create_game(Box::new(FileStore::new(&game)))?;
            println!("Created {}; waiting for a second player to join.", game.display());
            play(engine, game, seed).await
        }
        Commands::Join {
            game,
            identity,
            seed,
        } => {
            let mut engine = GameEngine::new(&identity, GameConfig::default())?;
            engine.add_observer(Box::new(ConsoleDisplay));
            engine
                .load_game(Box::new(FileStore::new(&game)))
                .with_context(|| format!("cannot open {}", game.display()))?;
            play(engine, game, seed).await
        }
        Commands::Show { game, identity } => show(&game, &identity),
    }
}

async fn play(mut engine: GameEngine, game: PathBuf, seed: Option<u64>) -> anyhow::Result<()> {
    if let Some(s) = seed {
        if engine.phase() == Phase::Placement {
            println!("Using fixed seed: {} (fleet will be reproducible)", s);
            engine.place_random_fleet(Some(s))?;
        }
    }

    let handle = WatchHandle::new(&game);
    engine.attach_watch(handle.clone());
    let (mut watcher, mut changes) = LedgerWatcher::spawn(handle, POLL, DEBOUNCE);

    print!("{}", render_view(&engine));
    println!(">> {}", engine.phase());
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match run_command(&mut engine, line.trim()) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break,
                    Err(e) => println!("Error: {}", e),
                }
            }
            Some(LedgerChanged(path)) = changes.recv() => {
                log::debug!("reloading {}", path.display());
                if let Err(e) = engine.reload() {
                    println!("Error: {}", e);
                }
            }
        }
        if engine.phase().is_finished() {
            print!("{}", render_view(&engine));
            break;
        }
    }

    watcher.close();
    Ok(())
}

fn run_command(engine: &mut GameEngine, line: &str) -> anyhow::Result<Flow> {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();
    match cmd {
        "" => {}
        "random" => {
            let seed = args.first().map(|s| s.parse::<u64>()).transpose()?;
            engine.place_random_fleet(seed)?;
            print!("{}", render_board(engine.own_board(), true));
        }
        "place" => {
            let &[id, coord, dir] = args.as_slice() else {
                bail!("usage: place <id> <coord> h|v");
            };
            let id: u8 = id.parse()?;
            let (x, y) = parse_coord(coord).ok_or_else(|| anyhow!("invalid coordinate {}", coord))?;
            let vertical = match dir {
                "h" | "H" => false,
                "v" | "V" => true,
                other => bail!("orientation must be h or v, not {}", other),
            };
            engine.place_ship(id, x, y, vertical)?;
            print!("{}", render_board(engine.own_board(), true));
        }
        "ready" => engine.commit_fleet()?,
        "fire" => {
            let coord = args.first().ok_or_else(|| anyhow!("usage: fire <coord>"))?;
            let (x, y) = parse_coord(coord).ok_or_else(|| anyhow!("invalid coordinate {}", coord))?;
            engine.fire(x, y)?;
        }
        "say" => engine.say(rest.trim())?,
        "board" => print!("{}", render_view(engine)),
        "reload" => engine.reload()?,
        "help" => println!("{}", HELP),
        "quit" | "exit" => return Ok(Flow::Quit),
        other => println!("Unknown command {:?}, try 'help'", other),
    }
    Ok(Flow::Continue)
}

fn show(game: &Path, identity: &Path) -> anyhow::Result<()> {
    let keys = KeyManager::load(identity)
        .with_context(|| format!("cannot read identity {}", identity.display()))?;
    let ledger = Ledger::load(Box::new(FileStore::new(game)))?;
    let config = ledger.game_config()?;
    println!(
        "{}: {} records, board {}x{}, ships {:?}",
        game.display(),
        ledger.len(),
        config.size,
        config.size,
        config.ships
    );
    let seat = [PlayerId::One, PlayerId::Two].into_iter().find(|&p| {
        ledger
            .records_of(p, RecordKind::Player)
            .next()
            .is_some_and(|r| r.payload() == keys.public_key_base64())
    });
    let Some(me) = seat else {
        println!("This identity is not seated in the game.");
        return Ok(());
    };
    let mut playback = Playback::new(config.size);
    playback.advance(&ledger, me, &keys);
    println!("Player {}: {}", me, Phase::derive(&ledger, me, &keys)?);
    println!("Opponent board:");
    print!("{}", render_board(playback.opponent(), false));
    println!("\nYour board:");
    print!("{}", render_board(playback.own(), true));
    Ok(())
}
