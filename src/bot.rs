use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ReplyParameters};
use tracing::{error, info, warn};

use crate::cache::VideoCache;
use crate::commands::{self, CommandOutcome};
use crate::config::Config;
use crate::downloader::VideoDownloader;
use crate::gemini::{GeminiClient, Part};
use crate::links::{Platform, UrlPipeline};
use crate::media;
use crate::message_log::MessageLog;
use crate::settings::SettingsStore;

const STYLE_SAMPLE_MAX_CHARS: usize = 4000;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub pipeline: UrlPipeline,
    pub gemini: GeminiClient,
    pub settings: SettingsStore,
    pub cache: VideoCache,
    pub downloader: VideoDownloader,
    pub message_log: MessageLog,
    http: reqwest::Client,
    joke_trigger: Regex,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let settings = SettingsStore::open(&config.database_path)?;
        let joke_trigger = Regex::new(&config.jokes.trigger_pattern)
            .context("Invalid joke trigger pattern in config")?;
        Ok(Self {
            pipeline: UrlPipeline::from_config(&config.links),
            gemini: GeminiClient::new(config.gemini.clone()),
            settings,
            cache: VideoCache::new(&config.cache),
            downloader: VideoDownloader::new(config.downloads.clone()),
            message_log: MessageLog::new(&config.impersonation.log_directory),
            http: reqwest::Client::new(),
            joke_trigger,
            config,
        })
    }

    /// Joke text for a chat, using the chat's prompt override when set.
    pub async fn random_joke(&self, chat_id: Option<i64>) -> String {
        let mut prompt = self.config.jokes.default_prompt.clone();
        if let Some(chat_id) = chat_id {
            match self.settings.get(chat_id).await {
                Ok(settings) => {
                    if let Some(override_prompt) = settings.joke_prompt {
                        prompt = override_prompt;
                    }
                }
                Err(e) => error!("Failed to load settings for chat {}: {:#}", chat_id, e),
            }
        }
        self.gemini
            .generate_or_fallback(vec![Part::text(prompt)], &self.config.jokes.failure_message)
            .await
    }
}

/// Start the Telegram bot
pub async fn run(bot: Bot, state: Arc<AppState>) -> Result<()> {
    info!("Starting Telegram bot...");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if let Err(e) = process_message(&bot, &msg, &state).await {
        error!("Error processing message in chat {}: {:#}", msg.chat.id, e);
    }
    Ok(())
}

async fn process_message(bot: &Bot, msg: &Message, state: &AppState) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    if user.is_bot {
        return Ok(());
    }

    let chat_id = msg.chat.id.0;
    let user_id = user.id.0 as i64;
    let user_name = user
        .username
        .clone()
        .unwrap_or_else(|| user.first_name.clone());

    let settings = state.settings.get(chat_id).await?;

    if let Some(photos) = msg.photo() {
        if settings.comment_on_pictures {
            handle_photo(bot, msg, state, photos, settings.picture_prompt.as_deref()).await?;
        }
        state.settings.register_chat(chat_id).await?;
        return Ok(());
    }

    if let Some(voice) = msg.voice() {
        if settings.transcribe_audio {
            handle_voice(bot, msg, state, voice).await?;
        }
        state.settings.register_chat(chat_id).await?;
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    info!("Message from {} in chat {}: {}", user_name, chat_id, text);

    // Replies in the admin chat are routed back to the originating chat.
    if state.config.telegram.admin_chat_id == Some(chat_id) {
        if let Some(forwarded) = msg.reply_to_message().and_then(|r| r.text()) {
            if let Some(origin) = parse_forward_line(forwarded) {
                bot.send_message(ChatId(origin.chat_id), text)
                    .reply_parameters(ReplyParameters::new(MessageId(origin.message_id)))
                    .await?;
                bot.send_message(msg.chat.id, "Reply sent").await?;
                return Ok(());
            }
        }
    }

    let addressed = is_addressed_to_bot(msg, text, &state.config.telegram.bot_username);
    let action = classify_reply(
        text,
        addressed,
        settings.send_random_joke,
        &state.joke_trigger,
        rand::random::<bool>(),
    );

    match action {
        ReplyAction::Command(command) => {
            match commands::apply(command, chat_id, &state.settings).await? {
                CommandOutcome::Reply(reply) => {
                    bot.send_message(msg.chat.id, reply).await?;
                }
                CommandOutcome::SendJoke => {
                    let joke = state.random_joke(Some(chat_id)).await;
                    bot.send_message(msg.chat.id, joke).await?;
                }
            }
        }
        ReplyAction::Mention => {
            if settings.comment_on_pictures {
                if let Err(e) = handle_mention(bot, msg, state, text).await {
                    warn!("Mention reply failed: {:#}", e);
                }
            }
        }
        ReplyAction::Joke => {
            let joke = state.random_joke(Some(chat_id)).await;
            bot.send_message(msg.chat.id, joke).await?;
        }
        ReplyAction::None => {}
    }

    // Link fixing and the bookkeeping below run for every text message,
    // even when a reply branch already fired above.
    let result = state.pipeline.process_text_and_replace(text);
    if !result.matches.is_empty() {
        handle_links(bot, msg, state, &user_name, &result).await?;
    }

    if let Some(admin_chat) = state.config.telegram.admin_chat_id {
        if admin_chat != chat_id {
            let line = forward_line(chat_id, &user_name, text, msg.id.0);
            if let Err(e) = bot.send_message(ChatId(admin_chat), line).await {
                warn!("Failed to forward message to admin chat: {}", e);
            }
        }
    }

    // Messages addressed to the bot never enter the style archive.
    if !addressed {
        state.message_log.append(user_id, text).await?;
    }
    state.settings.register_chat(chat_id).await?;
    Ok(())
}

/// Which reply, if any, a text message earns. Link fixing and bookkeeping
/// are independent of this and run regardless.
#[derive(Debug, PartialEq, Eq)]
enum ReplyAction {
    Command(commands::Command),
    Mention,
    Joke,
    None,
}

fn classify_reply(
    text: &str,
    addressed_to_bot: bool,
    joke_enabled: bool,
    joke_trigger: &Regex,
    coin_flip: bool,
) -> ReplyAction {
    if let Some(command) = commands::parse(text) {
        ReplyAction::Command(command)
    } else if addressed_to_bot {
        ReplyAction::Mention
    } else if joke_enabled && joke_trigger.is_match(text) && coin_flip {
        ReplyAction::Joke
    } else {
        ReplyAction::None
    }
}

async fn handle_photo(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    photos: &[teloxide::types::PhotoSize],
    picture_prompt: Option<&str>,
) -> Result<()> {
    let Some(largest) = photos.iter().max_by_key(|p| p.file.size) else {
        return Ok(());
    };

    let image = media::download_telegram_file(
        bot,
        &state.http,
        &state.config.telegram.bot_token,
        largest.file.id.clone(),
    )
    .await?;

    let imp = &state.config.impersonation;
    let prompt = picture_prompt.unwrap_or(&imp.persona_prompt);
    let comment = media::photo_comment(
        &state.gemini,
        prompt,
        &imp.picture_analysis_instruction,
        &imp.picture_failure_message,
        &image,
    )
    .await;

    send_chunked_reply(bot, msg, &comment).await
}

async fn handle_voice(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    voice: &teloxide::types::Voice,
) -> Result<()> {
    let audio = media::download_telegram_file(
        bot,
        &state.http,
        &state.config.telegram.bot_token,
        voice.file.id.clone(),
    )
    .await?;

    let imp = &state.config.impersonation;
    let transcript = media::transcribe_voice(
        &state.gemini,
        &imp.audio_instruction,
        &imp.audio_failure_message,
        &audio,
    )
    .await;

    send_chunked_reply(bot, msg, &transcript).await
}

async fn handle_mention(bot: &Bot, msg: &Message, state: &AppState, text: &str) -> Result<()> {
    let chat_id = msg.chat.id.0;
    let imp = &state.config.impersonation;
    let bot_username = &state.config.telegram.bot_username;
    let question = rewrite_bot_mention(text, bot_username, &imp.persona_name);

    let mut parts = vec![Part::text(&imp.persona_prompt)];

    // In persona chats, seed the reply with how the target user writes.
    if let Some(persona) = state.config.persona_for_chat(chat_id) {
        let sample = state
            .message_log
            .style_sample(persona.user_id, STYLE_SAMPLE_MAX_CHARS)
            .await;
        if !sample.is_empty() {
            parts.push(Part::text(format!(
                "Ось приклади повідомлень користувача, пиши у його стилі:\n{sample}"
            )));
        }
    }

    if let Some(replied) = msg.reply_to_message() {
        if let Some(replied_text) = replied.text() {
            let author = replied
                .from
                .as_ref()
                .map(|u| u.first_name.clone())
                .unwrap_or_else(|| "невідомий".to_string());
            let replied_text = rewrite_bot_mention(replied_text, bot_username, &imp.persona_name);
            parts.push(Part::text(format!(
                "Повідомлення, на яке відповідають (від {author}): {replied_text}"
            )));
        }

        // A photo in the replied message goes into the prompt as inline data.
        if let Some(largest) = replied
            .photo()
            .and_then(|photos| photos.iter().max_by_key(|p| p.file.size))
        {
            let image = media::download_telegram_file(
                bot,
                &state.http,
                &state.config.telegram.bot_token,
                largest.file.id.clone(),
            )
            .await?;
            parts.push(Part::text(&imp.picture_analysis_instruction));
            parts.push(Part::bytes(&image, "image/jpeg"));
        }
    }

    parts.push(Part::text(format!("Дай відповідь на повідомлення: {question}")));

    let reply = state.gemini.generate(parts).await?;
    send_chunked_reply(bot, msg, &reply).await
}

async fn handle_links(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    user_name: &str,
    result: &crate::links::TextProcessingResult,
) -> Result<()> {
    let mut sent_video = false;

    for m in &result.matches {
        if !matches!(m.platform, Platform::TikTok | Platform::Instagram) {
            continue;
        }
        match media::fetch_video(&state.cache, &state.downloader, m.platform, &m.original).await {
            Ok(path) => {
                let caption = media::video_caption(user_name, &result.modified_text);
                bot.send_video(msg.chat.id, InputFile::file(path))
                    .caption(caption)
                    .await?;
                sent_video = true;
            }
            Err(e) => {
                warn!("Video download failed for {}: {:#}", m.original, e);
            }
        }
    }

    // The converted links are still worth sending when no video made it.
    // Only videos carry the "{username} sent:" caption.
    if !sent_video {
        if let Some(fallback) = link_fallback_text(result) {
            bot.send_message(msg.chat.id, fallback.to_string()).await?;
        }
    }
    Ok(())
}

fn link_fallback_text(result: &crate::links::TextProcessingResult) -> Option<&str> {
    if result.modified_text != result.original_text {
        Some(&result.modified_text)
    } else {
        None
    }
}

async fn send_chunked_reply(bot: &Bot, msg: &Message, text: &str) -> Result<()> {
    for chunk in split_message(text, 4000) {
        bot.send_message(msg.chat.id, chunk)
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
    }
    Ok(())
}

fn is_addressed_to_bot(msg: &Message, text: &str, bot_username: &str) -> bool {
    let mention = format!("@{}", bot_username.to_lowercase());
    if text.to_lowercase().contains(&mention) {
        return true;
    }
    msg.reply_to_message()
        .and_then(|r| r.from.as_ref())
        .map(|u| u.is_bot && u.username.as_deref() == Some(bot_username))
        .unwrap_or(false)
}

/// Replace @-mentions of the bot with the persona name so prompts read as
/// if the persona were addressed directly.
fn rewrite_bot_mention(text: &str, bot_username: &str, persona_name: &str) -> String {
    let mention = format!("@{bot_username}");
    text.replace(&mention, persona_name).trim().to_string()
}

#[derive(Debug, PartialEq, Eq)]
struct ForwardOrigin {
    chat_id: i64,
    message_id: i32,
}

/// Line forwarded to the admin chat for every processed message. The admin
/// replies to it and `parse_forward_line` routes the answer back.
fn forward_line(chat_id: i64, user_name: &str, text: &str, message_id: i32) -> String {
    format!("{chat_id}: {user_name}: {text}: {message_id}")
}

fn parse_forward_line(line: &str) -> Option<ForwardOrigin> {
    // the user name and text may themselves contain ": ", so take the
    // outermost fields only
    let (chat_id_str, rest) = line.split_once(": ")?;
    let (_, message_id_str) = rest.rsplit_once(": ")?;
    Some(ForwardOrigin {
        chat_id: chat_id_str.trim().parse().ok()?,
        message_id: message_id_str.trim().parse().ok()?,
    })
}

fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}
