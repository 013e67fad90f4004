pub mod mpv;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Failure of a single player command. Always non-fatal to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("player io error: {0}")]
    Io(String),
    #[error("malformed player reply: {0}")]
    Protocol(String),
    #[error("player rejected command: {0}")]
    Rejected(String),
    #[error("player connection closed")]
    Disconnected,
}

impl From<std::io::Error> for PlayerError {
    fn from(err: std::io::Error) -> Self {
        PlayerError::Io(err.to_string())
    }
}

/// Asynchronous command surface of the external player.
///
/// A successful `start` obliges the player to later report exactly one
/// playback-stopped notification for that item. `stop` only requests the end
/// of playback; it never advances anything by itself. Callers must keep at
/// most one command in flight.
#[async_trait]
pub trait Player: Send + Sync {
    async fn start(&self, video: &Path) -> Result<(), PlayerError>;

    async fn pause(&self) -> Result<(), PlayerError>;

    /// Unpauses unconditionally. Must never toggle.
    async fn resume(&self) -> Result<(), PlayerError>;

    async fn stop(&self) -> Result<(), PlayerError>;
}
