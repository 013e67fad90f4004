//! Binary entrypoint for the motion-aware video kiosk.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use video_kiosk::config::{Configuration, VIDEO_GLOB_ENV};
use video_kiosk::debounce::Debouncer;
use video_kiosk::events::Event;
use video_kiosk::player::Player;
use video_kiosk::player::mpv::MpvPlayer;
use video_kiosk::playlist::Playlist;
use video_kiosk::tasks::{files, inputs, orchestrator};

#[derive(Debug, Parser)]
#[command(
    name = "video-kiosk",
    version,
    about = "Cycles videos, pausing without motion and skipping on reset"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG", default_value = "config.yaml")]
    config: PathBuf,
    /// Override the video glob from the config file and environment
    #[arg(long = "video-glob", value_name = "PATTERN")]
    video_glob: Option<String>,
    /// Print the resolved playlist and exit without starting the player
    #[arg(long = "list")]
    list: bool,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    // RUST_LOG wins; otherwise map -v to a level
    let fallback = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:?}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let Args {
        config,
        video_glob,
        list,
        verbose: _,
    } = args;

    let cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .with_glob_overrides(std::env::var(VIDEO_GLOB_ENV).ok(), video_glob)
        .validated()
        .context("invalid configuration values")?;
    info!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    let videos = files::discover_videos(&cfg)?;
    let playlist = Playlist::new(videos)
        .with_context(|| format!("no videos match '{}'", cfg.video_glob))?;

    if list {
        for (idx, path) in playlist.items().iter().enumerate() {
            println!("  {:>4}: {}", idx + 1, path.display());
        }
        return Ok(());
    }

    // Open hardware before launching the player so setup failures abort early.
    let lines = if cfg.inputs.enabled {
        let reset = inputs::InputLine::open(
            cfg.inputs.reset.device.as_deref(),
            &cfg.inputs.reset.key_code,
        )
        .context("failed to set up reset button")?;
        let motion = inputs::InputLine::open(
            cfg.inputs.motion.device.as_deref(),
            &cfg.inputs.motion.key_code,
        )
        .context("failed to set up motion sensor")?;
        info!(
            reset = %reset.path().display(),
            motion = %motion.path().display(),
            "inputs ready"
        );
        Some((reset, motion))
    } else {
        warn!("inputs disabled; treating motion as always present");
        None
    };

    let (events_tx, events_rx) = mpsc::channel::<Event>(64); // producers -> orchestrator

    let mpv = MpvPlayer::launch(&cfg.player, events_tx.clone())
        .await
        .context("failed to start player")?;
    let player_closed = mpv.closed();
    let player: Arc<dyn Player> = Arc::new(mpv);

    let cancel = CancellationToken::new();
    spawn_signal_watchers(&cancel);

    let mut tasks = JoinSet::new();
    match lines {
        Some((reset, motion)) => {
            tasks.spawn({
                let events = events_tx.clone();
                let cancel = cancel.clone();
                let debouncer = Debouncer::new(cfg.inputs.reset.debounce);
                async move {
                    inputs::run_reset(reset, debouncer, events, cancel)
                        .await
                        .context("reset watcher failed")
                }
            });
            tasks.spawn({
                let events = events_tx.clone();
                let cancel = cancel.clone();
                async move {
                    inputs::run_motion(motion, events, cancel)
                        .await
                        .context("motion watcher failed")
                }
            });
        }
        None => {
            events_tx
                .send(Event::MotionChanged(true))
                .await
                .context("event queue closed before startup")?;
        }
    }

    let mut orchestrator = tokio::spawn({
        let player = Arc::clone(&player);
        let cancel = cancel.clone();
        let grace = cfg.player.startup_grace;
        async move {
            orchestrator::run(playlist, player, events_tx, events_rx, cancel, grace)
                .await
                .context("orchestrator failed")
        }
    });

    let mut orchestrator_done = false;
    let mut player_lost = false;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            // Losing the player is fatal.
            _ = player_closed.cancelled() => {
                error!("player is gone; shutting down");
                player_lost = true;
                break;
            }
            res = &mut orchestrator => {
                orchestrator_done = true;
                match res {
                    Ok(Ok(())) => info!("orchestrator finished"),
                    Ok(Err(e)) => error!("task error: {e:?}"),
                    Err(e) => error!("join error: {e}"),
                }
                break;
            }
            Some(res) = tasks.join_next() => match res {
                // Input watchers dying is not fatal; playback carries on.
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("task error: {e:?}"),
                Err(e) => error!("join error: {e}"),
            }
        }
    }

    cancel.cancel();
    if !orchestrator_done {
        if let Err(e) = orchestrator.await {
            error!("join error: {e}");
        }
    }
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("task error: {e:?}"),
            Err(e) => error!("join error: {e}"),
        }
    }
    drop(player);

    if player_lost {
        bail!("player exited unexpectedly");
    }
    info!("shutdown complete");
    Ok(())
}

fn spawn_signal_watchers(cancel: &CancellationToken) {
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sigterm.recv() => {
                            info!("SIGTERM received; initiating shutdown");
                            cancel.cancel();
                        }
                    }
                }
                Err(err) => warn!("failed to register SIGTERM handler: {err}"),
            }
        });
    }
}
