use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use courtside::{
    clock::format_clock,
    command::{Command, HELP},
    config::{Config, FileConfigStore},
    mirror::Mirror,
    report::{export_to_dir, ReportContext, ReportMode},
    runtime::{ChannelEventSource, CourtEvent, Runner, SystemTimeSource},
    session::{PlayerRef, SessionState},
    stats::{percentage, time_by_zone},
    store::{NewPlayer, SessionStore, SqliteStore},
    util::{mean, std_dev},
    ReportError, ShotTracker, StoreError,
};
use std::{
    error::Error,
    io::{self, Write},
    path::PathBuf,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// basketball shot charting from the sideline
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Record makes and misses by court zone during a timed shooting test, watch live zone percentages, and export sessions as CSV."
)]
pub struct Cli {
    /// shot database to use instead of the configured one
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// config file to use instead of the default location
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// keep sessions in memory only
    #[clap(long, global = true)]
    no_persist: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// manage the roster
    Player {
        #[clap(subcommand)]
        action: PlayerAction,
    },
    /// run an interactive shooting session
    Session {
        /// player name (defaults to the configured player)
        #[clap(short, long)]
        player: Option<String>,

        /// shoot without a player; nothing is saved
        #[clap(long, conflicts_with = "player")]
        guest: bool,

        /// write both csv reports here when the session is saved
        #[clap(long)]
        export: Option<PathBuf>,
    },
    /// list past sessions for a player
    History {
        player: String,

        /// first day to include (YYYY-MM-DD)
        #[clap(long)]
        from: Option<NaiveDate>,

        /// last day to include (YYYY-MM-DD)
        #[clap(long)]
        to: Option<NaiveDate>,
    },
    /// write a stored session as csv
    Export {
        session_id: String,

        #[clap(short, long, value_enum, default_value_t = ExportMode::Analytics)]
        mode: ExportMode,

        /// output directory
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
}

/// CSV layout picked on the command line
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ExportMode {
    /// one row per shot
    Analytics,
    /// shots interleaved with coach actions
    Audit,
}

impl From<ExportMode> for ReportMode {
    fn from(mode: ExportMode) -> Self {
        match mode {
            ExportMode::Analytics => ReportMode::Analytics,
            ExportMode::Audit => ReportMode::Audit,
        }
    }
}

#[derive(Subcommand, Debug)]
enum PlayerAction {
    /// add a player
    Add {
        name: String,

        #[clap(long)]
        jersey: Option<u32>,

        #[clap(long)]
        position: Option<String>,
    },
    /// list players
    List {
        /// include retired players
        #[clap(long)]
        all: bool,
    },
    /// mark a player inactive
    Retire { name: String },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_store = cli
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_default();
    let (config, config_err) = match config_store.try_load() {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };
    init_tracing(&config.log_level);
    if let Some(err) = config_err {
        warn!(error = %err, "ignoring unreadable config");
    }

    match &cli.command {
        Commands::Player { action } => run_player(&cli, &config, action),
        Commands::Session {
            player,
            guest,
            export,
        } => run_session(&cli, &config, player.clone(), *guest, export.clone()),
        Commands::History { player, from, to } => {
            run_history(&cli, &config, player, *from, *to)
        }
        Commands::Export {
            session_id,
            mode,
            out,
        } => run_export(&cli, &config, session_id, (*mode).into(), out.clone()),
    }
}

fn init_tracing(level: &str) {
    let filter =
        EnvFilter::try_from_env("COURTSIDE_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_store(cli: &Cli, config: &Config) -> Result<SqliteStore, StoreError> {
    match cli.db.clone().or_else(|| config.database_path()) {
        Some(path) => SqliteStore::open(path),
        None => SqliteStore::open_default(),
    }
}

fn run_player(cli: &Cli, config: &Config, action: &PlayerAction) -> Result<(), Box<dyn Error>> {
    let store = open_store(cli, config)?;
    match action {
        PlayerAction::Add {
            name,
            jersey,
            position,
        } => {
            let player = store.create_player(&NewPlayer {
                name: name.clone(),
                jersey_number: *jersey,
                position: position.clone(),
            })?;
            println!("added {} (id {})", player.name, player.id);
        }
        PlayerAction::List { all } => {
            for p in store.list_players(!all)? {
                println!(
                    "{:>4}  {:<24} #{:<3} {:<10}{}",
                    p.id,
                    p.name,
                    p.jersey_number.map_or("-".to_string(), |n| n.to_string()),
                    p.position.as_deref().unwrap_or("-"),
                    if p.active { "" } else { " (retired)" }
                );
            }
        }
        PlayerAction::Retire { name } => {
            let player = store.find_player(name)?.ok_or_else(|| StoreError::NotFound {
                what: "player",
                key: name.clone(),
            })?;
            store.set_player_active(player.id, false)?;
            println!("retired {}", player.name);
        }
    }
    Ok(())
}

/// Where a running session writes its exports and what it calls the player
struct SessionContext {
    player_name: String,
    export_dir: PathBuf,
    auto_export: bool,
}

enum Flow {
    Continue,
    Quit,
}

fn run_session(
    cli: &Cli,
    config: &Config,
    player: Option<String>,
    guest: bool,
    export: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let persist = config.persist && !cli.no_persist;

    let (player_ref, player_name, mirror) = if guest {
        (PlayerRef::Guest, "guest".to_string(), None)
    } else {
        let name = player
            .or_else(|| config.default_player.clone())
            .ok_or("no player given: pass --player NAME or --guest")?;
        let store = open_store(cli, config)?;
        let found = store
            .find_player(&name)?
            .ok_or_else(|| format!("unknown player '{name}': add with `courtside player add`"))?;
        let mirror = persist.then(|| Mirror::new(Box::new(store)));
        (PlayerRef::Player(found.id), found.name, mirror)
    };

    let ctx = SessionContext {
        player_name,
        auto_export: export.is_some(),
        export_dir: export.unwrap_or_else(|| config.export_dir()),
    };

    let mut tracker = ShotTracker::new(player_ref, SystemTimeSource, mirror);
    let session_id = tracker.start()?;
    println!("session {session_id} started for {}", ctx.player_name);
    println!("{HELP}");
    report_warnings(&mut tracker);

    let runner = Runner::new(ChannelEventSource::stdin(), config.tick_ms);

    loop {
        match runner.step(&tracker) {
            CourtEvent::Tick(clock) => {
                print!("\r{clock} ");
                io::stdout().flush()?;
            }
            CourtEvent::Invalid(message) => println!("{message}"),
            CourtEvent::Command(cmd) => {
                let flow = handle_command(&mut tracker, cmd, &ctx);
                report_warnings(&mut tracker);
                if let Flow::Quit = flow {
                    break;
                }
            }
            CourtEvent::Closed => break,
        }
    }

    if matches!(tracker.state(), SessionState::Active | SessionState::Paused | SessionState::Ended) {
        eprintln!("warning: session left without save or discard");
    }
    Ok(())
}

fn report_warnings(tracker: &mut ShotTracker) {
    for warning in tracker.take_warnings() {
        eprintln!("warning: {warning}");
    }
}

fn handle_command(
    tracker: &mut ShotTracker,
    cmd: Command,
    ctx: &SessionContext,
) -> Flow {
    let outcome = match cmd {
        Command::Start => {
            if tracker.state() == SessionState::Saved {
                tracker.next_session();
            }
            tracker.start().map(|id| println!("session {id} started"))
        }
        Command::Shot { zone, made } => tracker.record_shot(zone, made).map(|shot| {
            let overall = tracker.stats().overall;
            println!(
                "\r#{:<3} {:<12} {:<6} +{:.1}s  {}/{} ({}%)",
                shot.sequence_number,
                zone.label(),
                shot.result(),
                shot.time_taken_ms as f64 / 1000.0,
                overall.made,
                overall.attempts,
                overall.percentage
            );
            if tracker.state() == SessionState::Ended {
                println!("shot limit reached, session ended: save or discard");
            }
        }),
        Command::Pause => tracker.pause().map(|_| println!("\rpaused")),
        Command::Resume => tracker.resume().map(|_| println!("resumed")),
        Command::Undo => tracker.undo_last().map(|undone| match undone {
            Some(shot) => println!("\rremoved {} {}", shot.zone.label(), shot.result()),
            None => println!("\rnothing to undo"),
        }),
        Command::End => tracker.end().map(|elapsed| {
            println!("\rsession ended at {}", format_clock(elapsed));
            print_stats(tracker);
        }),
        Command::Save => match tracker.save() {
            Ok(summary) => {
                println!(
                    "saved: {}/{} ({}%) in {}",
                    summary.stats.overall.made,
                    summary.stats.overall.attempts,
                    summary.stats.overall.percentage,
                    format_clock(summary.elapsed_ms)
                );
                if ctx.auto_export {
                    export_or_warn(tracker, ctx);
                }
                Ok(())
            }
            Err(err) => Err(err),
        },
        Command::Discard => tracker.discard().map(|_| println!("\rsession discarded")),
        Command::Stats => {
            print_stats(tracker);
            Ok(())
        }
        Command::Export => {
            export_or_warn(tracker, ctx);
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => return Flow::Quit,
    };

    if let Err(err) = outcome {
        println!("\rnot allowed: {err}");
    }
    Flow::Continue
}

/// A failed export is reported and the session carries on.
fn export_or_warn(tracker: &ShotTracker, ctx: &SessionContext) {
    if let Err(err) = export_session(tracker, ctx) {
        warn!(dir = %ctx.export_dir.display(), error = %err, "export failed");
        println!("\rexport failed: {err}");
    }
}

fn export_session(tracker: &ShotTracker, ctx: &SessionContext) -> Result<(), ReportError> {
    let now = Local::now();
    let Some(report) = ReportContext::from_session(tracker.session(), now) else {
        println!("nothing to export yet");
        return Ok(());
    };
    for mode in [ReportMode::Analytics, ReportMode::Audit] {
        let path = export_to_dir(&ctx.export_dir, &ctx.player_name, &report, mode, now)?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn print_stats(tracker: &ShotTracker) {
    let stats = tracker.stats();
    let dwell = time_by_zone(tracker.session().shots());
    println!("\r{:<14} {:>7} {:>5} {:>7}", "zone", "fg", "pct", "time");
    for ((zone, tally), (_, ms)) in stats.zones.iter().zip(dwell) {
        println!(
            "{:<14} {:>7} {:>4}% {:>7}",
            zone.label(),
            format!("{}/{}", tally.made, tally.attempts),
            tally.percentage,
            format_clock(ms)
        );
    }
    println!(
        "{:<14} {:>7} {:>4}% {:>7}",
        "overall",
        format!("{}/{}", stats.overall.made, stats.overall.attempts),
        stats.overall.percentage,
        format_clock(tracker.elapsed_ms())
    );
}

fn run_history(
    cli: &Cli,
    config: &Config,
    name: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(), Box<dyn Error>> {
    let store = open_store(cli, config)?;
    let player = store.find_player(name)?.ok_or_else(|| StoreError::NotFound {
        what: "player",
        key: name.to_string(),
    })?;
    let sessions = store.sessions_for_player(player.id, from, to)?;
    if sessions.is_empty() {
        println!("no sessions for {}", player.name);
        return Ok(());
    }

    let mut percentages = Vec::with_capacity(sessions.len());
    for s in &sessions {
        let pct = percentage(s.made, s.attempts);
        if s.attempts > 0 {
            percentages.push(pct as f64);
        }
        println!(
            "{}  {}  {:>3}/{:<3} {:>3}%  {}{}",
            s.started_at.format("%Y-%m-%d %H:%M"),
            format_clock(s.duration_ms),
            s.made,
            s.attempts,
            pct,
            s.session_id,
            if s.ended_at.is_none() { "  (unfinished)" } else { "" }
        );
    }
    if let (Some(avg), Some(spread)) = (mean(&percentages), std_dev(&percentages)) {
        println!("{} sessions, fg {:.0}% ± {:.1}", sessions.len(), avg, spread);
    }
    Ok(())
}

fn run_export(
    cli: &Cli,
    config: &Config,
    session_id: &str,
    mode: ReportMode,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let store = open_store(cli, config)?;
    let stored = store.load_session(session_id)?;
    let dir = out.unwrap_or_else(|| config.export_dir());
    let path = export_to_dir(
        &dir,
        &stored.player.name,
        &stored.report_context(),
        mode,
        Local::now(),
    )?;
    println!("{}", path.display());
    Ok(())
}
