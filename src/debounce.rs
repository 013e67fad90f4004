use std::time::{Duration, Instant};

use tracing::debug;

use crate::events::ResetPulse;

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(100);

/// Collapses bouncing reset presses into single logical pulses.
///
/// Only the asserted edge counts. A press is accepted when no earlier press
/// was accepted within `window`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted_at: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted_at: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn on_raw_signal(&mut self, asserted: bool, now: Instant) -> Option<ResetPulse> {
        if !asserted {
            return None;
        }
        if let Some(last) = self.last_accepted_at {
            let since = now.saturating_duration_since(last);
            if since < self.window {
                debug!(?since, window = ?self.window, "debounced reset press");
                return None;
            }
        }
        self.last_accepted_at = Some(now);
        Some(ResetPulse)
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
