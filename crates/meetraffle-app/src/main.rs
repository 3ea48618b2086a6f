// Raffle draw entry point.
//
// Startup sequence:
// 1. Parse CLI arguments
// 2. Initialize tracing (log to file, not terminal)
// 3. Load config
// 4. Load the roster
// 5. Load the audio cue and pick a player
// 6. Wire Ctrl+C to draw cancellation
// 7. Run the draw, rendering each selection
// 8. Report the winner

mod display;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use meetraffle_core::config::{self, Config};
use meetraffle_core::cue::{AudioCue, CommandCuePlayer, CuePlayer, SilentCuePlayer};
use meetraffle_core::{load_attendees, DrawEngine, DrawError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::display::TerminalDisplay;

#[derive(Parser)]
#[command(
    name = "meetraffle",
    version,
    about = "Draw a random attendee from a Meetup RSVP export"
)]
struct Cli {
    /// Attendee list exported from Meetup (comma- or tab-delimited)
    #[arg(value_name = "ROSTER")]
    roster: PathBuf,

    /// Total length of the draw in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    duration_ms: Option<u64>,

    /// Time between selections in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Audio file played when the draw starts (overrides config)
    #[arg(long, value_name = "FILE", conflicts_with = "no_cue")]
    cue: Option<PathBuf>,

    /// Do not play an audio cue
    #[arg(long)]
    no_cue: bool,

    /// Print the outcome as JSON instead of rendering the draw
    #[arg(long)]
    json: bool,

    /// Directory holding config/ and defaults/ (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Parse CLI arguments
    let cli = Cli::parse();

    // 2. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("Raffle starting up");

    // 3. Load config
    let config = match &cli.config_dir {
        Some(dir) => config::load_config_in(dir),
        None => config::load_config(),
    }
    .context("failed to load configuration")?;
    let (duration, interval) = draw_timing(&cli, &config);
    info!("Config loaded: duration {:?}, interval {:?}", duration, interval);

    // 4. Load the roster
    let roster = load_attendees(&cli.roster, &config.columns)
        .with_context(|| format!("failed to load roster {}", cli.roster.display()))?;
    info!("Loaded {} attendees from {}", roster.len(), cli.roster.display());

    // 5. Load the audio cue and pick a player
    let cue = load_cue(&cli, &config);
    let player = cue_player(&config);

    let display = Arc::new(TerminalDisplay::stdout());
    let mut engine = DrawEngine::new(roster).with_cue_player(player);
    if !cli.json {
        engine.add_observer(display.clone());
    }

    // 6. Wire Ctrl+C to draw cancellation
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received, cancelling draw");
                cancel.cancel();
            }
        }
    });

    // 7. Run the draw
    let result = engine
        .start_draw_cancellable(duration, interval, cue.as_ref(), &cancel)
        .await;

    // 8. Report the winner
    match result {
        Ok(outcome) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome).context("failed to encode outcome")?
                );
            } else {
                display
                    .show_winner(&outcome)
                    .context("failed to write to terminal")?;
            }
        }
        Err(DrawError::Cancelled) => {
            if !cli.json {
                display
                    .show_message("Draw cancelled")
                    .context("failed to write to terminal")?;
            }
            return Err(DrawError::Cancelled.into());
        }
        Err(e) => return Err(e).context("draw failed"),
    }

    info!("Raffle shut down cleanly");
    Ok(())
}

/// CLI values win over config values.
fn draw_timing(cli: &Cli, config: &Config) -> (Duration, Duration) {
    let duration = cli
        .duration_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.draw.duration());
    let interval = cli
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.draw.interval());
    (duration, interval)
}

/// A missing or unreadable cue never blocks the draw.
fn load_cue(cli: &Cli, config: &Config) -> Option<AudioCue> {
    if cli.no_cue {
        return None;
    }
    let path = cli
        .cue
        .clone()
        .or_else(|| config.cue.path.as_ref().map(PathBuf::from))?;
    match AudioCue::from_path(&path) {
        Ok(cue) => {
            info!("Audio cue loaded from {} ({} bytes)", path.display(), cue.len());
            Some(cue)
        }
        Err(e) => {
            warn!("Skipping audio cue {}: {}", path.display(), e);
            None
        }
    }
}

fn cue_player(config: &Config) -> Arc<dyn CuePlayer> {
    match config
        .cue
        .command
        .as_deref()
        .and_then(CommandCuePlayer::from_command_line)
    {
        Some(player) => Arc::new(player),
        None => {
            info!("No cue player command configured, draw will be silent");
            Arc::new(SilentCuePlayer)
        }
    }
}

/// Initialize tracing to log to a file (not the terminal, which shows the draw).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("meetraffle.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("meetraffle=info,meetraffle_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
