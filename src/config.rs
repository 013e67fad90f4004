use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::debounce;

pub const DEFAULT_IPC_SOCKET_PATH: &str = "/run/video-kiosk/mpv.sock";
pub const VIDEO_GLOB_ENV: &str = "VIDEO_GLOB";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Configuration {
    /// Glob pattern resolving to the videos to cycle through.
    #[serde(default)]
    pub video_glob: String,
    /// Shuffle the resolved videos once at startup instead of sorting them.
    #[serde(default)]
    pub shuffle: bool,
    /// Deterministic seed for the startup shuffle.
    #[serde(default)]
    pub startup_shuffle_seed: Option<u64>,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub inputs: InputsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PlayerConfig {
    /// Player executable, looked up on `PATH` when relative.
    pub program: PathBuf,
    /// Extra arguments appended after the built-in kiosk flags.
    pub extra_args: Vec<String>,
    /// JSON IPC socket the player listens on.
    pub ipc_socket: PathBuf,
    /// Pause between connecting to the player and the first start command.
    #[serde(with = "humantime_serde")]
    pub startup_grace: Duration,
    /// How long to wait for the IPC socket to accept connections.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("mpv"),
            extra_args: Vec::new(),
            ipc_socket: PathBuf::from(DEFAULT_IPC_SOCKET_PATH),
            startup_grace: Duration::from_secs(4),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct InputsConfig {
    /// Disable to run without GPIO hardware; motion is then treated as always present.
    pub enabled: bool,
    pub reset: ResetInputConfig,
    pub motion: MotionInputConfig,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reset: ResetInputConfig::default(),
            motion: MotionInputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ResetInputConfig {
    /// Input device path (evdev). Auto-detects when omitted.
    pub device: Option<PathBuf>,
    pub key_code: String,
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
}

impl Default for ResetInputConfig {
    fn default() -> Self {
        Self {
            device: None,
            key_code: "KEY_RESTART".to_string(),
            debounce: debounce::DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct MotionInputConfig {
    /// Input device path (evdev). Auto-detects when omitted.
    pub device: Option<PathBuf>,
    pub key_code: String,
}

impl Default for MotionInputConfig {
    fn default() -> Self {
        Self {
            device: None,
            key_code: "KEY_WAKEUP".to_string(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let cfg = serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(cfg)
    }

    /// Applies `VIDEO_GLOB` from the environment, then an explicit override on top.
    pub fn with_glob_overrides(mut self, env_glob: Option<String>, cli_glob: Option<String>) -> Self {
        if let Some(glob) = env_glob.filter(|g| !g.trim().is_empty()) {
            self.video_glob = glob;
        }
        if let Some(glob) = cli_glob {
            self.video_glob = glob;
        }
        self
    }

    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.video_glob.trim().is_empty(),
            "video-glob must be set (or provided via {VIDEO_GLOB_ENV})"
        );
        glob::Pattern::new(&self.video_glob)
            .with_context(|| format!("invalid video-glob pattern '{}'", self.video_glob))?;
        ensure!(
            !self.player.program.as_os_str().is_empty(),
            "player.program must not be empty"
        );
        ensure!(
            !self.player.connect_timeout.is_zero(),
            "player.connect-timeout must be greater than zero"
        );
        ensure!(
            !self.inputs.reset.debounce.is_zero(),
            "inputs.reset.debounce must be greater than zero"
        );
        ensure!(
            !self.inputs.reset.key_code.trim().is_empty(),
            "inputs.reset.key-code must not be empty"
        );
        ensure!(
            !self.inputs.motion.key_code.trim().is_empty(),
            "inputs.motion.key-code must not be empty"
        );
        Ok(())
    }
}
