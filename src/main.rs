/// Entry point and Game Master loop.

mod config;
mod domain;
mod error;
mod sim;
mod ui;

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::GameConfig;
use error::{RunError, SetupError};
use sim::level;
use sim::step;
use sim::world::World;
use ui::input::{self, Signal};
use ui::renderer::{Display, Headless, TerminalRenderer, ViewOptions};

/// Dedalus - Theseus against the Minotaur, one round at a time
#[derive(Parser, Debug)]
#[command(name = "dedalus", version, about, long_about = None)]
struct Cli {
    /// Map file, or the name of a map in the maps directory
    #[arg(required_unless_present = "list")]
    map: Option<String>,

    /// Moves a player can make before starving (at least 1)
    #[arg(short = 'M', long, value_parser = clap::value_parser!(u32).range(1..))]
    max_moves: Option<u32>,

    /// Delay between rounds and fight frames, in milliseconds
    #[arg(short, long)]
    delay: Option<u64>,

    /// Play rounds without waiting for a key
    #[arg(short, long)]
    auto: bool,

    /// AI driving the players (stationary, random)
    #[arg(long)]
    player_ai: Option<String>,

    /// AI driving the Minotaurs (stationary, random)
    #[arg(long)]
    minotaur_ai: Option<String>,

    /// Starting health of each player
    #[arg(long)]
    player_health: Option<u32>,

    /// Starting health of each Minotaur
    #[arg(long)]
    minotaur_health: Option<u32>,

    /// Random seed (default: random)
    #[arg(long)]
    seed: Option<u64>,

    /// Show map and settings details in the headers
    #[arg(long)]
    info: bool,

    /// Plain map glyphs, no colours
    #[arg(long)]
    no_color: bool,

    /// No terminal UI; endings are printed as text
    #[arg(long)]
    headless: bool,

    /// Where a player's view is written (a tty or a file); once per player, in setup order
    #[arg(long = "player-tty", value_name = "PATH")]
    player_tty: Vec<PathBuf>,

    /// Write logs to this file
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,

    /// Config file to use instead of the config.toml lookup
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// List the maps in the maps directory and exit
    #[arg(long)]
    list: bool,
}

impl Cli {
    /// Flags win over the config file.
    fn apply(&self, config: &mut GameConfig) {
        let rules = &mut config.rules;
        if let Some(n) = self.max_moves {
            rules.max_moves = n;
        }
        if let Some(ai) = &self.player_ai {
            rules.player_ai = ai.clone();
        }
        if let Some(ai) = &self.minotaur_ai {
            rules.minotaur_ai = ai.clone();
        }
        if let Some(h) = self.player_health {
            rules.player_health = h;
        }
        if let Some(h) = self.minotaur_health {
            rules.minotaur_health = h;
        }
        if self.seed.is_some() {
            rules.seed = self.seed;
        }

        let display = &mut config.display;
        if let Some(ms) = self.delay {
            display.delay_ms = ms;
        }
        if self.auto {
            display.interactive = false;
        }
        if self.info {
            display.game_info = true;
        }
        if self.no_color {
            display.color = false;
        }
    }
}

/// What happens between two rounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pacing {
    Key,
    Sleep(Duration),
    Free,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log.as_deref()) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins. Otherwise `info` into the log file, or `warn` on stderr.
fn init_tracing(log: Option<&Path>) -> Result<(), SetupError> {
    let default = if log.is_some() { "dedalus=info" } else { "dedalus=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log {
        Some(path) => {
            let file = File::create(path)
                .map_err(|source| SetupError::Log { path: path.to_path_buf(), source })?;
            builder.with_writer(Mutex::new(file)).with_ansi(false).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), RunError> {
    let mut config = match &cli.config {
        Some(path) => GameConfig::load_from(path)?,
        None => GameConfig::load(),
    };
    cli.apply(&mut config);

    if cli.list {
        let maps = level::list_maps(&config.maps_dir);
        if maps.is_empty() {
            println!("No maps in {}", config.maps_dir.display());
        }
        for path in maps {
            println!("{}", level::level_name(&path));
        }
        return Ok(());
    }

    // clap only lets MAP be absent together with --list.
    let Some(arg) = cli.map.as_deref() else {
        return Ok(());
    };
    let path = level::resolve_map_path(arg, &config.maps_dir);
    let map = level::load_map(&path).map_err(SetupError::from)?;
    let mut world = World::setup(&level::level_name(&path), map, &config.roster())?;

    let opts = ViewOptions {
        color: config.display.color,
        game_info: config.display.game_info,
        interactive: config.display.interactive,
        delay_ms: config.display.delay_ms,
    };

    let finished = if cli.headless {
        if !cli.player_tty.is_empty() {
            warn!("--player-tty is ignored in headless mode");
        }
        let mut display = Headless::new(io::stdout());
        game_loop(&mut world, &mut display, Pacing::Free)
    } else {
        let sinks = open_player_views(&cli.player_tty)?;
        let pacing = if opts.interactive {
            Pacing::Key
        } else {
            Pacing::Sleep(Duration::from_millis(opts.delay_ms))
        };
        let mut display = TerminalRenderer::new(opts, sinks, &world);
        let result = game_loop(&mut world, &mut display, pacing);
        display.cleanup()?;
        result
    }?;

    if !finished {
        println!("Game aborted after {} rounds.", world.steps);
    }
    world.teardown();
    Ok(())
}

fn open_player_views(paths: &[PathBuf]) -> Result<Vec<Box<dyn Write + Send>>, SetupError> {
    paths
        .iter()
        .map(|path| {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)
                .map_err(|source| SetupError::PlayerView { path: path.clone(), source })?;
            Ok(Box::new(BufWriter::new(file)) as Box<dyn Write + Send>)
        })
        .collect()
}

/// Play rounds until nobody is left on the board.
/// Returns false if the user quit before the end.
fn game_loop<D: Display>(world: &mut World, display: &mut D, pacing: Pacing) -> io::Result<bool> {
    display.start(world)?;

    while !world.is_over() {
        if pace(pacing)? == Signal::Quit {
            info!(step = world.steps, "game aborted");
            return Ok(false);
        }

        let events = step::round(world);
        for event in &events {
            display.fight_event(world, event)?;
        }
        display.refresh(world)?;
    }

    display.finish(world)?;
    info!(steps = world.steps, ending = ?world.gm_ending(), "game over");
    Ok(true)
}

fn pace(pacing: Pacing) -> io::Result<Signal> {
    match pacing {
        Pacing::Key => input::wait_key(),
        Pacing::Sleep(delay) => input::poll_quit(delay),
        Pacing::Free => Ok(Signal::Continue),
    }
}
