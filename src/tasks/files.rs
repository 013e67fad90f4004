use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::{debug, info, warn};

use crate::config::Configuration;

/// Resolves `video-glob` into the startup video list.
///
/// Only regular files are kept. The list is sorted, or shuffled once when
/// `shuffle` is enabled. An empty result is returned as-is; turning it into a
/// fatal error is the playlist's job.
pub fn discover_videos(cfg: &Configuration) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(&cfg.video_glob)
        .with_context(|| format!("invalid video-glob pattern '{}'", cfg.video_glob))?;

    let mut videos = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => {
                debug!(path = %path.display(), "video found");
                videos.push(path);
            }
            Ok(path) => debug!(path = %path.display(), "skipping non-file match"),
            Err(err) => warn!(path = %err.path().display(), error = %err.error(), "unreadable glob match"),
        }
    }

    videos.sort();
    if cfg.shuffle {
        let mut rng = match cfg.startup_shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        videos.shuffle(&mut rng);
    }

    info!(
        pattern = %cfg.video_glob,
        count = videos.len(),
        shuffled = cfg.shuffle,
        "video discovery complete"
    );
    for (idx, path) in videos.iter().enumerate() {
        info!(index = idx, path = %path.display(), "video");
    }
    Ok(videos)
}
