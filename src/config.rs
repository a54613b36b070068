use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub gemini: GeminiConfig,
    /// SQLite file holding per-chat settings.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub counter: CounterConfig,
    #[serde(default)]
    pub jokes: JokesConfig,
    #[serde(default)]
    pub impersonation: ImpersonationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_bot_username")]
    pub bot_username: String,
    /// Chat that receives a copy of every processed message and can reply
    /// back through the bot. Disabled when unset.
    #[serde(default)]
    pub admin_chat_id: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinksConfig {
    #[serde(default = "default_twitter_embed_domain")]
    pub twitter_embed_domain: String,
    #[serde(default = "default_instagram_embed_domain")]
    pub instagram_embed_domain: String,
    /// TikTok links are left untouched unless an embed mirror is configured.
    #[serde(default)]
    pub tiktok_embed_domain: Option<String>,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            twitter_embed_domain: default_twitter_embed_domain(),
            instagram_embed_domain: default_instagram_embed_domain(),
            tiktok_embed_domain: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DownloadsConfig {
    #[serde(default = "default_download_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
    /// Netscape cookies file passed to yt-dlp for Instagram downloads.
    #[serde(default)]
    pub instagram_cookies: Option<PathBuf>,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            directory: default_download_dir(),
            ytdlp_path: default_ytdlp_path(),
            timeout_secs: default_download_timeout(),
            instagram_cookies: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
            cleanup_cron: default_cleanup_cron(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CounterConfig {
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default = "default_counter_cron")]
    pub cron: String,
    /// Message templates with a `{days}` placeholder.
    #[serde(default = "default_counter_templates")]
    pub templates: Vec<String>,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            target_date: None,
            cron: default_counter_cron(),
            templates: default_counter_templates(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct JokesConfig {
    #[serde(default = "default_joke_prompt")]
    pub default_prompt: String,
    #[serde(default = "default_joke_failure")]
    pub failure_message: String,
    /// Messages matching this pattern may trigger a spontaneous joke.
    #[serde(default = "default_joke_trigger")]
    pub trigger_pattern: String,
    #[serde(default = "default_joke_cron")]
    pub cron: String,
}

impl Default for JokesConfig {
    fn default() -> Self {
        Self {
            default_prompt: default_joke_prompt(),
            failure_message: default_joke_failure(),
            trigger_pattern: default_joke_trigger(),
            cron: default_joke_cron(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Persona {
    pub chat_id: i64,
    /// User whose archived messages seed the impersonation style sample.
    pub user_id: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImpersonationConfig {
    /// Name substituted for @-mentions of the bot inside prompts.
    #[serde(default = "default_persona_name")]
    pub persona_name: String,
    #[serde(default = "default_persona_prompt")]
    pub persona_prompt: String,
    #[serde(default = "default_picture_instruction")]
    pub picture_analysis_instruction: String,
    #[serde(default = "default_picture_failure")]
    pub picture_failure_message: String,
    #[serde(default = "default_audio_instruction")]
    pub audio_instruction: String,
    #[serde(default = "default_audio_failure")]
    pub audio_failure_message: String,
    #[serde(default = "default_log_dir")]
    pub log_directory: PathBuf,
    #[serde(default)]
    pub personas: Vec<Persona>,
}

impl Default for ImpersonationConfig {
    fn default() -> Self {
        Self {
            persona_name: default_persona_name(),
            persona_prompt: default_persona_prompt(),
            picture_analysis_instruction: default_picture_instruction(),
            picture_failure_message: default_picture_failure(),
            audio_instruction: default_audio_instruction(),
            audio_failure_message: default_audio_failure(),
            log_directory: default_log_dir(),
            personas: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("linkfixer.db")
}

fn default_bot_username() -> String {
    "LinkFixer_Bot".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash-001".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_twitter_embed_domain() -> String {
    "fxtwitter.com".to_string()
}

fn default_instagram_embed_domain() -> String {
    "kkinstagram.com".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./videos")
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_download_timeout() -> u64 {
    60
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_ttl() -> u64 {
    86_400
}

fn default_cleanup_cron() -> String {
    "0 15 2 * * *".to_string()
}

fn default_counter_cron() -> String {
    "0 15 11 * * *".to_string()
}

fn default_counter_templates() -> Vec<String> {
    [
        "До перемоги України у війні над Росією залишилося всього {days} днів. Цей день стане новою сторінкою в історії нашої країни та усього вільного світу.",
        "Кожен із цих {days} днів наближає нас до моменту, коли Україна остаточно звільниться від гніту та насильства з боку агресора. Ми на порозі великої перемоги!",
        "Залишилося всього {days} днів до того моменту, коли український народ з гордістю скаже: ми перемогли, ми вистояли, ми вільні!",
        "Через {days} днів Україна покаже всьому світу, що сила духу, єдність та правда здатні перемогти будь-яку агресію. Цей день вже близько!",
        "Ще трохи терпіння, ще {days} днів - і Україна відсвяткує тріумфальне завершення війни.",
        "Кожен день наближає нас до перемоги. Ще {days} днів, і мрія про вільну Україну стане реальністю.",
        "Залишилося всього {days} днів до того, як мирне життя повернеться в кожен український дім.",
        "Через {days} днів ми зможемо з гордістю сказати: ми вистояли, ми перемогли, ми вільні.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_joke_prompt() -> String {
    "Ти - Лідер України, Володимир Зеленський, роскажи актуальну шутку \
     (просто роскажи шутку/анекдот, не вітайся, не роби висновків)"
        .to_string()
}

fn default_joke_failure() -> String {
    "Вибач, я шутку не придумав".to_string()
}

fn default_joke_trigger() -> String {
    r"(?i)\b(?:зеленский|зеленского|зеленским|зеля|зелю|зеле)\b".to_string()
}

fn default_joke_cron() -> String {
    "0 15 14 * * *".to_string()
}

fn default_persona_name() -> String {
    "Володимир Зеленський".to_string()
}

fn default_persona_prompt() -> String {
    "Ти - Володимир Зеленський. Не забувай, що ти президент воюючої країни, \
     також твоє улюблене слово - потужно."
        .to_string()
}

fn default_picture_instruction() -> String {
    "Уважно проаналізуй зображення та надай детальний коментар САМЕ про те, що ти бачиш \
     на цьому конкретному зображенні. Опиши об'єкти, людей, дії, обстановку та інші деталі, \
     які ти можеш розпізнати. Не давай загальних коментарів, які могли б підійти до \
     будь-якого зображення. Твій коментар має чітко відображати унікальний зміст цього \
     конкретного фото у схвальному тоні."
        .to_string()
}

fn default_picture_failure() -> String {
    "Не можу прокоментувати це зображення".to_string()
}

fn default_audio_instruction() -> String {
    "Транскрибуй це голосове повідомлення. Поверни лише текст повідомлення, без коментарів."
        .to_string()
}

fn default_audio_failure() -> String {
    "Не можу розпізнати це голосове повідомлення".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./data/messages")
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if !config.downloads.directory.exists() {
            std::fs::create_dir_all(&config.downloads.directory).with_context(|| {
                format!(
                    "Failed to create download directory: {}",
                    config.downloads.directory.display()
                )
            })?;
        }

        Ok(config)
    }

    pub fn persona_for_chat(&self, chat_id: i64) -> Option<&Persona> {
        self.impersonation
            .personas
            .iter()
            .find(|p| p.chat_id == chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:abc"

            [gemini]
            api_key = "key"
            "#,
        )
        .unwrap();

        assert_eq!(config.telegram.bot_username, "LinkFixer_Bot");
        assert_eq!(config.database_path, PathBuf::from("linkfixer.db"));
        assert_eq!(config.gemini.model, "gemini-2.0-flash-001");
        assert_eq!(config.links.twitter_embed_domain, "fxtwitter.com");
        assert_eq!(config.links.instagram_embed_domain, "kkinstagram.com");
        assert!(config.links.tiktok_embed_domain.is_none());
        assert_eq!(config.cache.capacity, 256);
        assert_eq!(config.downloads.timeout_secs, 60);
        assert!(!config.server.enabled);
        assert!(config.counter.target_date.is_none());
        assert!(!config.counter.templates.is_empty());
        assert_eq!(config.impersonation.persona_name, "Володимир Зеленський");
    }

    #[test]
    fn test_overrides_and_personas() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:abc"
            admin_chat_id = 123616664

            [gemini]
            api_key = "key"

            [links]
            instagram_embed_domain = "ddinstagram.com"
            tiktok_embed_domain = "kktiktok.com"

            [counter]
            target_date = "2025-05-02"

            [[impersonation.personas]]
            chat_id = -1001706199236
            user_id = 515794581
            "#,
        )
        .unwrap();

        assert_eq!(config.telegram.admin_chat_id, Some(123616664));
        assert_eq!(config.links.instagram_embed_domain, "ddinstagram.com");
        assert_eq!(
            config.links.tiktok_embed_domain.as_deref(),
            Some("kktiktok.com")
        );
        assert_eq!(
            config.counter.target_date,
            Some(NaiveDate::from_ymd_opt(2025, 5, 2).unwrap())
        );
        assert!(config.persona_for_chat(-1001706199236).is_some());
        assert!(config.persona_for_chat(0).is_none());
    }
}
