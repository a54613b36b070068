use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::DownloadsConfig;
use crate::links::Platform;

static TIKTOK_ID_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"tiktok\.com/@[\w.-]+/video/(\d+)",
        r"tiktok\.com/v/(\d+)",
        r"vm\.tiktok\.com/(\w+)",
        r"vt\.tiktok\.com/(\w+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static INSTAGRAM_ID_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"instagram\.com/p/([\w-]+)",
        r"instagram\.com/reel/([\w-]+)",
        r"instagr\.am/p/([\w-]+)",
        r"instagr\.am/reel/([\w-]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

fn first_capture(res: &[Regex], url: &str) -> Option<String> {
    res.iter()
        .find_map(|re| re.captures(url))
        .map(|c| c[1].to_string())
}

/// Video ID embedded in a TikTok URL, used as a stable output filename.
pub fn extract_tiktok_id(url: &str) -> Option<String> {
    first_capture(&TIKTOK_ID_RES, url)
}

/// Shortcode embedded in an Instagram post/reel URL.
pub fn extract_instagram_id(url: &str) -> Option<String> {
    first_capture(&INSTAGRAM_ID_RES, url)
}

/// Shells out to yt-dlp to fetch short videos.
pub struct VideoDownloader {
    config: DownloadsConfig,
}

impl VideoDownloader {
    pub fn new(config: DownloadsConfig) -> Self {
        Self { config }
    }

    /// Probe `yt-dlp --version` so a missing binary shows up at startup
    /// instead of on the first download.
    pub async fn check_installation(&self) -> bool {
        let probe = Command::new(&self.config.ytdlp_path)
            .arg("--version")
            .output();
        match tokio::time::timeout(Duration::from_secs(10), probe).await {
            Ok(Ok(output)) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("yt-dlp version: {}", version.trim());
                true
            }
            Ok(Ok(output)) => {
                warn!("yt-dlp check failed with status: {}", output.status);
                false
            }
            Ok(Err(e)) => {
                warn!("Failed to run yt-dlp: {}", e);
                false
            }
            Err(_) => {
                warn!("Timed out probing yt-dlp");
                false
            }
        }
    }

    /// Download a video and return the path of the produced file.
    pub async fn download(&self, platform: Platform, url: &str) -> Result<PathBuf> {
        let video_id = match platform {
            Platform::TikTok => extract_tiktok_id(url),
            Platform::Instagram => extract_instagram_id(url),
            Platform::Twitter => None,
        }
        .with_context(|| format!("Could not extract a video ID from URL: {url}"))?;

        let prefix = format!("{platform}_{video_id}");
        let output_template = self
            .config
            .directory
            .join(format!("{prefix}.%(ext)s"))
            .display()
            .to_string();

        let mut command = Command::new(&self.config.ytdlp_path);
        command
            .arg(url)
            .arg("--no-warnings")
            .arg("-o")
            .arg(&output_template)
            .arg("--force-overwrites");

        if platform == Platform::Instagram {
            if let Some(cookies) = &self.config.instagram_cookies {
                command.arg("--cookies").arg(cookies);
            }
        }

        debug!("Running yt-dlp for {} with output {}", url, output_template);

        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            command.output(),
        )
        .await
        .context("Timed out waiting for yt-dlp to complete")?
        .context("Failed to spawn yt-dlp")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed with {}: {}", output.status, stderr.trim());
        }

        let file = self
            .find_by_prefix(&prefix)
            .await?
            .with_context(|| format!("yt-dlp produced no file for video ID: {video_id}"))?;

        info!("Downloaded {} video to {}", platform, file.display());
        Ok(file)
    }

    // The extension depends on what yt-dlp picked, so scan for the prefix.
    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<PathBuf>> {
        let mut read_dir = tokio::fs::read_dir(&self.config.directory)
            .await
            .with_context(|| {
                format!(
                    "Failed to read download directory: {}",
                    self.config.directory.display()
                )
            })?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name();
            // the prefix must end exactly at the extension dot, so
            // "tiktok_123" can't pick up a stale "tiktok_1234.mp4"
            let is_match = name
                .to_string_lossy()
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('.'));
            if is_match {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }
}

/// Delete every regular file in the download directory. Used by the nightly
/// cleanup job together with the cache wipe.
pub async fn delete_downloaded_files(directory: &std::path::Path) -> Result<usize> {
    let mut deleted = 0;
    let mut read_dir = tokio::fs::read_dir(directory)
        .await
        .with_context(|| format!("Failed to read directory: {}", directory.display()))?;
    while let Some(entry) = read_dir.next_entry().await? {
        if entry.file_type().await?.is_file() {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Failed to delete {}: {}", entry.path().display(), e),
            }
        }
    }
    Ok(deleted)
}
