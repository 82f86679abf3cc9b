/// Cadence daemon - headless local audio player
use cadence_core::{InMemoryLibrary, InMemoryResumeStore, Library, ResumeStore, Track};
use cadence_playback::{ClockEngine, Command, PlaybackEvent, SessionBuilder, SessionHandle};
use cadence_storage::SqliteLibrary;
use cadenced::{
    config::DaemonConfig,
    console::{self, ConsoleInput},
    sinks::{LogHostService, LogMediaSession, LogNotification},
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cadenced")]
#[command(about = "Cadence headless audio player", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "CADENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a playback session driven by stdin commands
    Run {
        /// Keep library, history and resume state in memory
        #[arg(long)]
        ephemeral: bool,
    },
    /// Add audio files to the library
    Import {
        /// Files to add
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Duration in seconds recorded for the imported files
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        duration: Option<u64>,
    },
    /// List library tracks with their play counts
    Tracks,
    /// Show recent play history
    History {
        /// Number of entries
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadenced=info,cadence_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = DaemonConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { ephemeral } => {
            config.storage.ephemeral |= ephemeral;
            config.validate()?;
            run(config).await?;
        }
        Commands::Import { paths, duration } => {
            config.validate()?;
            let duration = duration.unwrap_or(config.engine.fallback_duration_secs);
            import(&config, &paths, Duration::from_secs(duration)).await?;
        }
        Commands::Tracks => {
            config.validate()?;
            list_tracks(&config).await?;
        }
        Commands::History { limit } => {
            config.validate()?;
            show_history(&config, limit).await?;
        }
    }

    Ok(())
}

async fn open_library(config: &DaemonConfig) -> anyhow::Result<SqliteLibrary> {
    let url = &config.storage.database_url;
    if let Some(parent) = url
        .strip_prefix("sqlite://")
        .and_then(|path| Path::new(path).parent())
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = cadence_storage::create_pool(url).await?;
    cadence_storage::run_migrations(&pool).await?;
    tracing::info!("Database connected");

    Ok(SqliteLibrary::new(pool))
}

async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    let (library, store): (Arc<dyn Library>, Arc<dyn ResumeStore>) = if config.storage.ephemeral {
        tracing::info!("Running with in-memory storage");
        (
            Arc::new(InMemoryLibrary::new()),
            Arc::new(InMemoryResumeStore::new()),
        )
    } else {
        let library = Arc::new(open_library(&config).await?);
        (library.clone(), library)
    };

    let builder = SessionBuilder::new(config.playback.clone(), library.clone(), store);
    let mut engine = ClockEngine::new(builder.sender(), config.playback.position_interval());
    if !config.engine.check_files {
        engine = engine.without_file_check();
    }

    let session = builder
        .engine(Box::new(engine))
        .media_session(Box::new(LogMediaSession::new()))
        .notification(Box::new(LogNotification::new()))
        .host_service(Box::new(LogHostService))
        .start()
        .await?;

    tracing::info!("Cadence session started");
    println!("{}", console::format_status(&session.snapshot()));

    let reporter = tokio::spawn(report_events(session.events()));

    let result = console_loop(&session, library.as_ref(), &config).await;

    session.shutdown().await?;
    reporter.abort();
    tracing::info!("Cadence session stopped");

    result
}

async fn console_loop(
    session: &SessionHandle,
    library: &dyn Library,
    config: &DaemonConfig,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        };
        // EOF
        let Some(line) = line else { break };

        let input = match console::parse_line(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(message) => {
                println!("error: {message}");
                continue;
            }
        };

        match input {
            ConsoleInput::Command(command) => session.command(command)?,
            ConsoleInput::Media(action) => session.media_action(action)?,
            ConsoleInput::System(event) => session.system(event)?,
            ConsoleInput::Add(path) => {
                let track = resolve_track(library, path, config).await?;
                println!("queued {}", track.title);
                session.command(Command::AddToQueue(vec![track]))?;
            }
            ConsoleInput::Status => println!("{}", console::format_status(&session.snapshot())),
            ConsoleInput::Help => println!("{}", console::HELP),
            ConsoleInput::Quit => break,
        }
    }

    Ok(())
}

async fn resolve_track(
    library: &dyn Library,
    path: PathBuf,
    config: &DaemonConfig,
) -> anyhow::Result<Track> {
    if let Some(track) = library.track_by_path(&path).await? {
        return Ok(track);
    }
    tracing::debug!(path = %path.display(), "Track not in library, using file name");
    Ok(Track::from_path(path)
        .with_duration(Duration::from_secs(config.engine.fallback_duration_secs)))
}

async fn report_events(mut events: broadcast::Receiver<PlaybackEvent>) {
    loop {
        match events.recv().await {
            Ok(PlaybackEvent::StateChanged { from, to }) => {
                println!("{from} -> {to}");
            }
            Ok(PlaybackEvent::TrackChanged { track_id, .. }) => {
                println!("now playing {track_id}");
            }
            Ok(PlaybackEvent::Error { message }) => {
                println!("error: {message}");
            }
            Ok(PlaybackEvent::PlayRecorded(record)) => {
                tracing::debug!(
                    track_id = %record.track_id,
                    outcome = record.outcome.as_str(),
                    "Play recorded"
                );
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Event reporter lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn import(
    config: &DaemonConfig,
    paths: &[PathBuf],
    duration: Duration,
) -> anyhow::Result<()> {
    let library = open_library(config).await?;

    let mut added = 0;
    for path in paths {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::warn!(path = %path.display(), "Skipping missing file");
            continue;
        }
        let path = tokio::fs::canonicalize(path).await?;
        if library.track_by_path(&path).await?.is_some() {
            tracing::info!(path = %path.display(), "Already in library");
            continue;
        }

        let track = Track::from_path(path).with_duration(duration);
        library.add_track(&track).await?;
        println!("added {} ({})", track.title, track.id);
        added += 1;
    }

    tracing::info!(added, "Import finished");
    Ok(())
}

async fn list_tracks(config: &DaemonConfig) -> anyhow::Result<()> {
    let library = open_library(config).await?;

    for track in library.all_tracks().await? {
        let plays = library.play_count(&track.id).await?;
        println!(
            "{}\t{} - {}\t{}s\t{} plays",
            track.id,
            track.display_artist(),
            track.title,
            track.duration.as_secs(),
            plays
        );
    }

    Ok(())
}

async fn show_history(config: &DaemonConfig, limit: u32) -> anyhow::Result<()> {
    let library = open_library(config).await?;

    for record in library.recent_plays(limit).await? {
        println!(
            "{}\t{}\t{}\t{}s / {}s",
            record.played_at.format("%Y-%m-%d %H:%M:%S"),
            record.outcome.as_str(),
            record.track_id,
            record.played.as_secs(),
            record.duration.as_secs()
        );
    }

    Ok(())
}
