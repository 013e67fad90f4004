//! GPIO lines exposed by the kernel `gpio-keys` driver as evdev devices.
//!
//! Pin polarity and glitch filtering live in the device tree; these tasks see
//! clean key transitions and turn them into orchestrator events.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use anyhow::{Context, Result};
use evdev::{Device, EventStream, EventSummary, KeyCode};
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;
use crate::events::Event;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("unknown key code: {0}")]
    UnknownKey(String),
    #[error("{path} does not report {key:?}")]
    KeyNotSupported { path: PathBuf, key: KeyCode },
    #[error("no input device reporting {0:?} found")]
    NoDevice(KeyCode),
}

/// One opened input line: a device plus the key code it reports.
pub struct InputLine {
    device: Device,
    path: PathBuf,
    key: KeyCode,
}

impl InputLine {
    /// Opens `device`, or the first device advertising `key_code` when `None`.
    pub fn open(device: Option<&Path>, key_code: &str) -> Result<Self> {
        let key = parse_key(key_code)?;
        let (device, path) = match device {
            Some(path) => {
                let device =
                    Device::open(path).with_context(|| format!("failed to open {}", path.display()))?;
                if !supports(&device, key) {
                    return Err(InputError::KeyNotSupported {
                        path: path.to_path_buf(),
                        key,
                    }
                    .into());
                }
                (device, path.to_path_buf())
            }
            None => find_device(key)?,
        };
        info!(
            device = %path.display(),
            name = device.name().unwrap_or("<unnamed>"),
            key = ?key,
            "input line opened"
        );
        Ok(Self { device, path, key })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn into_stream(self) -> Result<(EventStream, PathBuf, KeyCode)> {
        let stream = self
            .device
            .into_event_stream()
            .with_context(|| format!("event stream for {}", self.path.display()))?;
        Ok((stream, self.path, self.key))
    }
}

/// Debounced reset button: each accepted press becomes `Event::ResetPulse`.
pub async fn run_reset(
    line: InputLine,
    mut debouncer: Debouncer,
    events: Sender<Event>,
    cancel: CancellationToken,
) -> Result<()> {
    let (mut stream, path, key) = line.into_stream()?;
    info!(device = %path.display(), window = ?debouncer.window(), "watching reset button");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("reset watcher shutting down");
                break;
            }
            event = stream.next_event() => {
                let event = event.with_context(|| format!("failed reading {}", path.display()))?;
                let Some(asserted) = key_level(event.destructure(), key) else {
                    continue;
                };
                if let Some(pulse) = debouncer.on_raw_signal(asserted, Instant::now()) {
                    info!("reset button pressed");
                    if events.send(pulse.into()).await.is_err() {
                        debug!("event queue closed; stopping reset watcher");
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Motion sensor: reports the current level once, then every edge.
pub async fn run_motion(
    line: InputLine,
    events: Sender<Event>,
    cancel: CancellationToken,
) -> Result<()> {
    let initial = match line.device.get_key_state() {
        Ok(keys) => keys.contains(line.key),
        Err(err) => {
            warn!(%err, "failed to read initial motion state; assuming no motion");
            false
        }
    };
    let (mut stream, path, key) = line.into_stream()?;
    info!(device = %path.display(), motion = initial, "watching motion sensor");
    if events.send(Event::MotionChanged(initial)).await.is_err() {
        return Ok(());
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("motion watcher shutting down");
                break;
            }
            event = stream.next_event() => {
                let event = event.with_context(|| format!("failed reading {}", path.display()))?;
                let Some(motion) = key_level(event.destructure(), key) else {
                    continue;
                };
                debug!(motion, "motion edge");
                if events.send(Event::MotionChanged(motion)).await.is_err() {
                    debug!("event queue closed; stopping motion watcher");
                    break;
                }
            }
        }
    }
    Ok(())
}

fn parse_key(code: &str) -> Result<KeyCode, InputError> {
    KeyCode::from_str(code.trim()).map_err(|_| InputError::UnknownKey(code.to_string()))
}

/// Press/release level for `key`; autorepeat and other codes yield `None`.
fn key_level(summary: EventSummary, key: KeyCode) -> Option<bool> {
    match summary {
        EventSummary::Key(_, code, value) if code == key => level(value),
        _ => None,
    }
}

fn level(value: i32) -> Option<bool> {
    match value {
        1 => Some(true),
        0 => Some(false),
        _ => None,
    }
}

fn supports(device: &Device, key: KeyCode) -> bool {
    device
        .supported_keys()
        .map(|keys| keys.contains(key))
        .unwrap_or(false)
}

fn find_device(key: KeyCode) -> Result<(Device, PathBuf)> {
    let mut candidates: Vec<(PathBuf, Device)> = evdev::enumerate()
        .filter(|(_, device)| supports(device, key))
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    candidates
        .into_iter()
        .next()
        .map(|(path, device)| (device, path))
        .ok_or_else(|| InputError::NoDevice(key).into())
}
