use std::fmt;

use crate::player::PlayerError;

/// Everything the orchestrator reacts to, merged onto one queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Last-known motion sensor reading.
    MotionChanged(bool),
    /// Debounced press of the reset button.
    ResetPulse,
    /// The player finished or stopped the current item.
    PlaybackStopped,
    /// A previously issued command was acknowledged by the player.
    CommandSucceeded(PlayerCommand),
    /// A previously issued command failed; non-fatal.
    CommandFailed(PlayerCommand, PlayerError),
}

/// Logical reset press emitted by the debouncer. Carries no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPulse;

impl From<ResetPulse> for Event {
    fn from(_: ResetPulse) -> Self {
        Event::ResetPulse
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Start,
    Pause,
    Resume,
    Stop,
}

impl fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerCommand::Start => "start",
            PlayerCommand::Pause => "pause",
            PlayerCommand::Resume => "resume",
            PlayerCommand::Stop => "stop",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Starting,
    Playing,
    Paused,
    Stopping,
}
