pub mod handlers;

use std::fmt;

use crate::config::LinksConfig;
use handlers::{InstagramHandler, TikTokHandler, TwitterHandler};

/// Which handler produced a given match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    TikTok,
    Instagram,
    Twitter,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::TikTok => write!(f, "tiktok"),
            Platform::Instagram => write!(f, "instagram"),
            Platform::Twitter => write!(f, "twitter"),
        }
    }
}

/// A platform-specific URL detector/converter.
///
/// `convert_url` is only defined for URLs the handler claims: callers gate
/// with `can_handle` or rely on `find_urls` having filtered already.
pub trait UrlHandler: Send + Sync {
    fn platform(&self) -> Platform;
    /// Every non-overlapping match in `text`, in left-to-right order,
    /// duplicates included.
    fn find_urls(&self, text: &str) -> Vec<String>;
    fn convert_url(&self, url: &str) -> String;
    fn can_handle(&self, url: &str) -> bool;
}

/// One detected URL together with its embed-friendly form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMatch {
    pub original: String,
    pub converted: String,
    pub platform: Platform,
}

#[derive(Debug, Clone)]
pub struct TextProcessingResult {
    pub original_text: String,
    pub modified_text: String,
    pub matches: Vec<UrlMatch>,
}

/// Fixed collection of platform handlers. Stateless after construction, so
/// it can be shared across tasks without synchronization.
pub struct UrlPipeline {
    handlers: Vec<Box<dyn UrlHandler>>,
}

impl UrlPipeline {
    pub fn new(handlers: Vec<Box<dyn UrlHandler>>) -> Self {
        Self { handlers }
    }

    /// The standard handler set, with embed domains taken from configuration.
    pub fn from_config(links: &LinksConfig) -> Self {
        Self::new(vec![
            Box::new(TikTokHandler::new(links.tiktok_embed_domain.clone())),
            Box::new(InstagramHandler::new(links.instagram_embed_domain.clone())),
            Box::new(TwitterHandler::new(links.twitter_embed_domain.clone())),
        ])
    }

    /// Run every handler over `text` and collect converted matches.
    /// Handler order is immaterial since the domain patterns are disjoint.
    pub fn process_text(&self, text: &str) -> Vec<UrlMatch> {
        self.handlers
            .iter()
            .flat_map(|handler| {
                handler.find_urls(text).into_iter().map(|url| UrlMatch {
                    converted: handler.convert_url(&url),
                    original: url,
                    platform: handler.platform(),
                })
            })
            .collect()
    }

    /// Like `process_text`, but also rewrites the matched URLs in the text.
    ///
    /// Replacement is literal substring substitution: if the same URL string
    /// occurs twice in the message, both occurrences are rewritten. No-op
    /// conversions are skipped so an untouched text compares equal to the
    /// original.
    pub fn process_text_and_replace(&self, text: &str) -> TextProcessingResult {
        let matches = self.process_text(text);
        let mut modified = text.to_string();
        for m in &matches {
            if m.original != m.converted {
                modified = modified.replace(&m.original, &m.converted);
            }
        }
        TextProcessingResult {
            original_text: text.to_string(),
            modified_text: modified,
            matches,
        }
    }

    /// Convert a single URL with the first handler that claims it.
    pub fn process_url(&self, url: &str) -> Option<UrlMatch> {
        let handler = self.handlers.iter().find(|h| h.can_handle(url))?;
        Some(UrlMatch {
            original: url.to_string(),
            converted: handler.convert_url(url),
            platform: handler.platform(),
        })
    }
}
