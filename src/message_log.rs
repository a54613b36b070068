use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Flat-file archive of user messages, one file per user. The impersonation
/// flow samples from it to imitate how a user writes.
pub struct MessageLog {
    directory: PathBuf,
}

impl MessageLog {
    pub fn new(directory: &Path) -> Self {
        Self {
            directory: directory.to_path_buf(),
        }
    }

    fn user_file(&self, user_id: i64) -> PathBuf {
        self.directory.join(format!("{user_id}.txt"))
    }

    /// Append a message under a timestamp header.
    pub async fn append(&self, user_id: i64, text: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .with_context(|| {
                format!(
                    "Failed to create message log directory: {}",
                    self.directory.display()
                )
            })?;

        let path = self.user_file(user_id);
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let entry = format!("[{timestamp}]\n{text}\n\n");

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open message log: {}", path.display()))?;
        file.write_all(entry.as_bytes())
            .await
            .with_context(|| format!("Failed to write message log: {}", path.display()))?;

        debug!("Archived message from user {}", user_id);
        Ok(())
    }

    /// Tail of the user's archive, at most `max_chars` characters, for use
    /// as an impersonation style sample. Empty when nothing was archived.
    pub async fn style_sample(&self, user_id: i64, max_chars: usize) -> String {
        let content = tokio::fs::read_to_string(self.user_file(user_id))
            .await
            .unwrap_or_default();
        if content.chars().count() <= max_chars {
            return content;
        }
        let skip = content.chars().count() - max_chars;
        content.chars().skip(skip).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_log(name: &str) -> MessageLog {
        let dir = std::env::temp_dir().join(format!("linkfixer-msglog-{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        MessageLog::new(&dir)
    }

    #[tokio::test]
    async fn test_append_and_sample() {
        let log = test_log("append");
        log.append(42, "перше повідомлення").await.unwrap();
        log.append(42, "друге повідомлення").await.unwrap();

        let sample = log.style_sample(42, 10_000).await;
        assert!(sample.contains("перше повідомлення"));
        assert!(sample.contains("друге повідомлення"));
    }

    #[tokio::test]
    async fn test_sample_is_bounded_and_tail_biased() {
        let log = test_log("bounded");
        log.append(7, "oldest entry").await.unwrap();
        log.append(7, "newest entry").await.unwrap();

        let sample = log.style_sample(7, 20).await;
        assert!(sample.chars().count() <= 20);
        assert!(sample.contains("entry"));
        assert!(!sample.contains("oldest"));
    }

    #[tokio::test]
    async fn test_unknown_user_yields_empty_sample() {
        let log = test_log("unknown");
        assert_eq!(log.style_sample(999, 100).await, "");
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let log = test_log("isolated");
        log.append(1, "from one").await.unwrap();
        log.append(2, "from two").await.unwrap();
        assert!(!log.style_sample(1, 1000).await.contains("from two"));
    }
}
