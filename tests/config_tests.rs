use std::path::PathBuf;
use std::time::Duration;

use video_kiosk::config::{Configuration, DEFAULT_IPC_SOCKET_PATH};

#[test]
fn parse_minimal_config_with_defaults() {
    let yaml = r#"
video-glob: "/media/videos/*.mp4"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.video_glob, "/media/videos/*.mp4");
    assert!(!cfg.shuffle);
    assert_eq!(cfg.player.program, PathBuf::from("mpv"));
    assert_eq!(cfg.player.ipc_socket, PathBuf::from(DEFAULT_IPC_SOCKET_PATH));
    assert_eq!(cfg.player.startup_grace, Duration::from_secs(4));
    assert!(cfg.inputs.enabled);
    assert_eq!(cfg.inputs.reset.key_code, "KEY_RESTART");
    assert_eq!(cfg.inputs.reset.debounce, Duration::from_millis(100));
    assert_eq!(cfg.inputs.motion.key_code, "KEY_WAKEUP");
    cfg.validate().unwrap();
}

#[test]
fn parse_full_config_with_humantime_durations() {
    let yaml = r#"
video-glob: "/srv/kiosk/**/*.mkv"
shuffle: true
startup-shuffle-seed: 7
player:
  program: /usr/local/bin/mpv
  extra-args: ["--hwdec=auto", "--ao=null"]
  ipc-socket: /tmp/kiosk.sock
  startup-grace: 1500ms
  connect-timeout: 3s
inputs:
  reset:
    device: /dev/input/by-path/platform-reset-event
    key-code: KEY_NEXT
    debounce: 50ms
  motion:
    key-code: KEY_PROG1
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.shuffle);
    assert_eq!(cfg.startup_shuffle_seed, Some(7));
    assert_eq!(cfg.player.extra_args, vec!["--hwdec=auto", "--ao=null"]);
    assert_eq!(cfg.player.startup_grace, Duration::from_millis(1500));
    assert_eq!(cfg.player.connect_timeout, Duration::from_secs(3));
    assert_eq!(
        cfg.inputs.reset.device,
        Some(PathBuf::from("/dev/input/by-path/platform-reset-event"))
    );
    assert_eq!(cfg.inputs.reset.debounce, Duration::from_millis(50));
    assert_eq!(cfg.inputs.motion.device, None);
    assert_eq!(cfg.inputs.motion.key_code, "KEY_PROG1");
    cfg.validate().unwrap();
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = r#"
video-glob: "*.mp4"
player:
  programme: mpv
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn missing_glob_fails_validation() {
    let cfg: Configuration = serde_yaml::from_str("shuffle: false\n").unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("video-glob"));
}

#[test]
fn env_glob_fills_missing_value_and_cli_wins() {
    let cfg: Configuration = serde_yaml::from_str("shuffle: false\n").unwrap();
    let cfg = cfg.with_glob_overrides(Some("/env/*.mp4".into()), None);
    assert_eq!(cfg.video_glob, "/env/*.mp4");
    cfg.validate().unwrap();

    let cfg = cfg.with_glob_overrides(Some("/env/*.mp4".into()), Some("/cli/*.mp4".into()));
    assert_eq!(cfg.video_glob, "/cli/*.mp4");
}

#[test]
fn blank_env_glob_is_ignored() {
    let cfg: Configuration = serde_yaml::from_str("video-glob: /file/*.mp4\n").unwrap();
    let cfg = cfg.with_glob_overrides(Some("   ".into()), None);
    assert_eq!(cfg.video_glob, "/file/*.mp4");
}

#[test]
fn zero_debounce_fails_validation() {
    let yaml = r#"
video-glob: "*.mp4"
inputs:
  reset:
    debounce: 0s
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn malformed_glob_fails_validation() {
    let cfg: Configuration = serde_yaml::from_str("video-glob: \"/videos/[*.mp4\"\n").unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn from_yaml_file_reads_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "video-glob: /v/*.mp4\ninputs:\n  enabled: false\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert!(!cfg.inputs.enabled);
    assert_eq!(cfg.video_glob, "/v/*.mp4");
}
