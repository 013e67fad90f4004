pub mod machine;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender, WeakSender};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::Event;
use crate::player::Player;
use crate::playlist::Playlist;

use self::machine::{Action, PlaybackSM};

/// Single consumer of the merged event queue.
///
/// Producers (inputs, player notifications, command completions) only ever
/// enqueue. Every transition runs here, one event at a time, in arrival order.
/// Player commands are spawned and report back through the same queue, so the
/// loop never blocks on the player. The one deliberate wait is `startup_grace`
/// before the first start.
///
/// The loop ends on cancellation or once every producer has hung up. A player
/// command that never completes stalls playback; no timeout is applied.
pub async fn run(
    playlist: Playlist,
    player: Arc<dyn Player>,
    events_tx: Sender<Event>,
    mut events_rx: Receiver<Event>,
    cancel: CancellationToken,
    startup_grace: Duration,
) -> Result<()> {
    // Completions hold only a weak handle so the queue can close when producers go away.
    let results = events_tx.downgrade();
    drop(events_tx);

    let mut machine = PlaybackSM::new(playlist);

    if !startup_grace.is_zero() {
        info!(grace = %humantime::format_duration(startup_grace), "waiting for player to settle");
        select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = sleep(startup_grace) => {}
        }
    }

    if let Some(action) = machine.on_startup() {
        dispatch(action, &player, &results);
    }

    loop {
        let event = select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting orchestrator");
                break;
            }
            maybe_event = events_rx.recv() => match maybe_event {
                Some(event) => event,
                None => {
                    info!("all event producers closed; exiting orchestrator");
                    break;
                }
            }
        };

        debug!(?event, state = ?machine.state(), "event");
        if let Some(action) = machine.on_event(event) {
            dispatch(action, &player, &results);
        }
    }

    Ok(())
}

fn dispatch(action: Action, player: &Arc<dyn Player>, results: &WeakSender<Event>) {
    let command = action.command();
    let player = Arc::clone(player);
    let results = results.clone();
    debug!(%command, "dispatching player command");

    tokio::spawn(async move {
        let outcome = match &action {
            Action::Start(video) => player.start(video).await,
            Action::Pause => player.pause().await,
            Action::Resume => player.resume().await,
            Action::Stop => player.stop().await,
        };
        let event = match outcome {
            Ok(()) => Event::CommandSucceeded(command),
            Err(err) => Event::CommandFailed(command, err),
        };
        match results.upgrade() {
            Some(tx) => {
                if tx.send(event).await.is_err() {
                    debug!(%command, "orchestrator gone; dropping command result");
                }
            }
            None => debug!(%command, "event queue closed; dropping command result"),
        }
    });
}
