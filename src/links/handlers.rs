use once_cell::sync::Lazy;
use regex::Regex;

use super::{Platform, UrlHandler};

static TIKTOK_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"https?://(?:www\.)?(?:tiktok\.com|vm\.tiktok\.com)/(?:@[^/\s]+/video/|t/|v/)?([\w-]+)",
    )
    .unwrap()
});

static TWITTER_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:www\.)?(?:twitter\.com|x\.com)/[^/\s]+/status/\d+(?:\?\S*)?").unwrap()
});

static INSTAGRAM_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:www\.)?(?:instagram\.com|instagr\.am)/(?:p|reel)/([\w-]+)/?(?:\?\S*)?")
        .unwrap()
});

fn find_all(re: &Regex, text: &str) -> Vec<String> {
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// TikTok handler. Conversion is identity unless an embed domain is
/// configured, in which case the tiktok host is substituted.
pub struct TikTokHandler {
    embed_domain: Option<String>,
}

impl TikTokHandler {
    pub fn new(embed_domain: Option<String>) -> Self {
        Self { embed_domain }
    }
}

impl UrlHandler for TikTokHandler {
    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    fn find_urls(&self, text: &str) -> Vec<String> {
        find_all(&TIKTOK_URL_RE, text)
    }

    fn convert_url(&self, url: &str) -> String {
        match &self.embed_domain {
            // vm. first: the embed domain itself may contain "tiktok.com"
            Some(domain) if url.contains("vm.tiktok.com") => {
                url.replace("vm.tiktok.com", domain)
            }
            Some(domain) => url.replace("tiktok.com", domain),
            None => url.to_string(),
        }
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains("tiktok.com")
    }
}

/// Twitter/X handler: rewrites statuses onto the configured embed domain
/// (fxtwitter.com by default).
pub struct TwitterHandler {
    embed_domain: String,
}

impl TwitterHandler {
    pub fn new(embed_domain: String) -> Self {
        Self { embed_domain }
    }
}

impl UrlHandler for TwitterHandler {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn find_urls(&self, text: &str) -> Vec<String> {
        find_all(&TWITTER_URL_RE, text)
    }

    fn convert_url(&self, url: &str) -> String {
        if url.contains("twitter.com") {
            url.replace("twitter.com", &self.embed_domain)
        } else {
            url.replace("x.com", &self.embed_domain)
        }
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains("twitter.com") || url.contains("x.com")
    }
}

/// Instagram handler: rewrites posts and reels onto the configured embed
/// domain (kkinstagram.com by default).
pub struct InstagramHandler {
    embed_domain: String,
}

impl InstagramHandler {
    pub fn new(embed_domain: String) -> Self {
        Self { embed_domain }
    }
}

impl UrlHandler for InstagramHandler {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn find_urls(&self, text: &str) -> Vec<String> {
        find_all(&INSTAGRAM_URL_RE, text)
    }

    fn convert_url(&self, url: &str) -> String {
        if url.contains("instagram.com") {
            url.replace("instagram.com", &self.embed_domain)
        } else {
            url.replace("instagr.am", &self.embed_domain)
        }
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains("instagram.com") || url.contains("instagr.am")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiktok() -> TikTokHandler {
        TikTokHandler::new(None)
    }

    fn twitter() -> TwitterHandler {
        TwitterHandler::new("fxtwitter.com".to_string())
    }

    fn instagram() -> InstagramHandler {
        InstagramHandler::new("kkinstagram.com".to_string())
    }

    #[test]
    fn test_tiktok_valid_urls_match() {
        let valid = [
            "https://www.tiktok.com/@username/video/1234567890",
            "http://tiktok.com/@username/video/1234567890",
            "https://vm.tiktok.com/ZMB2dRrFd/",
            "https://www.tiktok.com/@maskedmaniacbeatz/video/7479110451599609134?_r=1&_t=ZM-8uf5Zdtze21",
        ];
        for url in valid {
            assert_eq!(
                tiktok().find_urls(url).len(),
                1,
                "valid TikTok URL did not match: {url}"
            );
        }
    }

    #[test]
    fn test_tiktok_invalid_urls_do_not_match() {
        let invalid = [
            "https://www.youtube.com/watch?v=abc123",
            "https://tiktok.com/",
            "randomStringNotAUrl",
        ];
        for url in invalid {
            assert!(
                tiktok().find_urls(url).is_empty(),
                "invalid TikTok URL matched: {url}"
            );
        }
    }

    #[test]
    fn test_tiktok_identity_conversion() {
        let url = "https://www.tiktok.com/@user/video/42";
        assert_eq!(tiktok().convert_url(url), url);
    }

    #[test]
    fn test_tiktok_vm_domain_substitution() {
        let h = TikTokHandler::new(Some("kktiktok.com".to_string()));
        assert_eq!(
            h.convert_url("https://vm.tiktok.com/ZMB2dRrFd"),
            "https://kktiktok.com/ZMB2dRrFd"
        );
    }

    #[test]
    fn test_twitter_both_domains_convert() {
        assert_eq!(
            twitter().convert_url("https://twitter.com/a/status/99"),
            "https://fxtwitter.com/a/status/99"
        );
        assert_eq!(
            twitter().convert_url("https://x.com/a/status/99"),
            "https://fxtwitter.com/a/status/99"
        );
    }

    #[test]
    fn test_twitter_requires_status_path() {
        assert!(twitter().find_urls("https://twitter.com/someone").is_empty());
        assert_eq!(
            twitter()
                .find_urls("https://twitter.com/someone/status/12345?s=20")
                .len(),
            1
        );
    }

    #[test]
    fn test_instagram_post_and_reel_shapes() {
        let h = instagram();
        assert_eq!(h.find_urls("https://www.instagram.com/p/AbC-123/").len(), 1);
        assert_eq!(h.find_urls("https://instagram.com/reel/xYz_9/").len(), 1);
        assert_eq!(h.find_urls("https://instagr.am/p/short1").len(), 1);
        assert!(h.find_urls("https://www.instagram.com/someprofile").is_empty());
    }

    #[test]
    fn test_instagram_conversion_keeps_path() {
        assert_eq!(
            instagram().convert_url("https://www.instagram.com/reel/AbC-123/"),
            "https://www.kkinstagram.com/reel/AbC-123/"
        );
        assert_eq!(
            instagram().convert_url("https://instagr.am/p/short1"),
            "https://kkinstagram.com/p/short1"
        );
    }

    #[test]
    fn test_can_handle_is_domain_containment() {
        assert!(tiktok().can_handle("https://vm.tiktok.com/x"));
        assert!(twitter().can_handle("https://x.com/a/status/1"));
        assert!(instagram().can_handle("https://instagr.am/p/x"));
        assert!(!tiktok().can_handle("https://example.com"));
        assert!(!twitter().can_handle("https://instagram.com/p/x"));
    }

    #[test]
    fn test_duplicate_urls_reported_twice() {
        let text = "https://x.com/a/status/7 and https://x.com/a/status/7";
        assert_eq!(twitter().find_urls(text).len(), 2);
    }
}
