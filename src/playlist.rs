use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("playlist must contain at least one video")]
pub struct EmptyPlaylistError;

/// Fixed, cyclic list of videos with a cursor.
///
/// The set of items never changes after construction; only `advance` moves
/// the cursor, wrapping back to the first item after the last.
#[derive(Debug, Clone)]
pub struct Playlist {
    items: Vec<PathBuf>,
    cursor: usize,
}

impl Playlist {
    pub fn new(items: Vec<PathBuf>) -> Result<Self, EmptyPlaylistError> {
        if items.is_empty() {
            return Err(EmptyPlaylistError);
        }
        Ok(Self { items, cursor: 0 })
    }

    pub fn current(&self) -> &Path {
        &self.items[self.cursor]
    }

    pub fn advance(&mut self) -> &Path {
        self.cursor = (self.cursor + 1) % self.items.len();
        self.current()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn items(&self) -> &[PathBuf] {
        &self.items
    }
}
