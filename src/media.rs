use std::path::PathBuf;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::types::FileId;
use tracing::info;

use crate::cache::VideoCache;
use crate::downloader::VideoDownloader;
use crate::gemini::{GeminiClient, Part};
use crate::links::Platform;

/// Fetch the raw bytes of a Telegram-hosted file (photo, voice note, ...).
pub async fn download_telegram_file(
    bot: &Bot,
    http: &reqwest::Client,
    bot_token: &str,
    file_id: FileId,
) -> Result<Vec<u8>> {
    let file = bot
        .get_file(file_id)
        .await
        .context("Failed to resolve Telegram file")?;

    let url = format!("https://api.telegram.org/file/bot{bot_token}/{}", file.path);
    let response = http
        .get(&url)
        .send()
        .await
        .context("Failed to download Telegram file")?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("Telegram file download failed with status {}", status);
    }

    let bytes = response
        .bytes()
        .await
        .context("Failed to read Telegram file body")?;
    Ok(bytes.to_vec())
}

/// Resolve a platform video to a local file: cache first, yt-dlp otherwise.
pub async fn fetch_video(
    cache: &VideoCache,
    downloader: &VideoDownloader,
    platform: Platform,
    url: &str,
) -> Result<PathBuf> {
    if let Some(path) = cache.get(url).await {
        info!("Using cached {} video for {}", platform, url);
        return Ok(path);
    }

    let path = downloader.download(platform, url).await?;
    cache.insert(url, &path).await;
    Ok(path)
}

/// Comment on a photo in the configured persona.
pub async fn photo_comment(
    gemini: &GeminiClient,
    picture_prompt: &str,
    analysis_instruction: &str,
    failure_message: &str,
    image: &[u8],
) -> String {
    let parts = vec![
        Part::text(picture_prompt),
        Part::text(analysis_instruction),
        Part::bytes(image, "image/jpeg"),
    ];
    gemini.generate_or_fallback(parts, failure_message).await
}

/// Transcribe a voice note (Telegram voice messages are OGG/Opus).
pub async fn transcribe_voice(
    gemini: &GeminiClient,
    instruction: &str,
    failure_message: &str,
    audio: &[u8],
) -> String {
    let parts = vec![Part::text(instruction), Part::bytes(audio, "audio/ogg")];
    gemini.generate_or_fallback(parts, failure_message).await
}

/// Caption attached to re-uploaded videos.
pub fn video_caption(username: &str, text: &str) -> String {
    format!("{username} sent: {text}")
}
