use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::info;

/// Per-chat feature switches and prompt overrides. Booleans default to off;
/// prompts fall back to the configured defaults when unset.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub chat_id: i64,
    pub send_counter_until_win: bool,
    pub send_random_joke: bool,
    pub comment_on_pictures: bool,
    pub transcribe_audio: bool,
    pub joke_prompt: Option<String>,
    pub picture_prompt: Option<String>,
}

impl ChatSettings {
    fn defaults(chat_id: i64) -> Self {
        Self {
            chat_id,
            send_counter_until_win: false,
            send_random_joke: false,
            comment_on_pictures: false,
            transcribe_audio: false,
            joke_prompt: None,
            picture_prompt: None,
        }
    }
}

/// SQLite-backed chat settings store.
#[derive(Clone)]
pub struct SettingsStore {
    conn: Arc<Mutex<Connection>>,
}

impl SettingsStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // WAL mode for concurrent reads; the PRAGMA returns the resulting mode
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        Self::run_migrations(&conn)?;

        info!("Settings store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS chat_settings (
                chat_id INTEGER PRIMARY KEY,
                send_counter_until_win INTEGER NOT NULL DEFAULT 0,
                send_random_joke INTEGER NOT NULL DEFAULT 0,
                comment_on_pictures INTEGER NOT NULL DEFAULT 0,
                transcribe_audio INTEGER NOT NULL DEFAULT 0,
                joke_prompt TEXT,
                picture_prompt TEXT
            );
            ",
        )
        .context("Failed to run settings migrations")?;
        Ok(())
    }

    /// Settings for a chat; defaults when the chat has no row yet.
    pub async fn get(&self, chat_id: i64) -> Result<ChatSettings> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT chat_id, send_counter_until_win, send_random_joke,
                        comment_on_pictures, transcribe_audio, joke_prompt, picture_prompt
                 FROM chat_settings WHERE chat_id = ?1",
                rusqlite::params![chat_id],
                |row| {
                    Ok(ChatSettings {
                        chat_id: row.get(0)?,
                        send_counter_until_win: row.get(1)?,
                        send_random_joke: row.get(2)?,
                        comment_on_pictures: row.get(3)?,
                        transcribe_audio: row.get(4)?,
                        joke_prompt: row.get(5)?,
                        picture_prompt: row.get(6)?,
                    })
                },
            )
            .optional()
            .context("Failed to query chat settings")?;

        Ok(row.unwrap_or_else(|| ChatSettings::defaults(chat_id)))
    }

    /// Insert a default row for a chat if it doesn't exist yet. Called for
    /// every processed message so the scheduled senders know about the chat.
    pub async fn register_chat(&self, chat_id: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR IGNORE INTO chat_settings (chat_id) VALUES (?1)",
            rusqlite::params![chat_id],
        )
        .context("Failed to register chat")?;
        Ok(())
    }

    pub async fn set_send_counter(&self, chat_id: i64, enabled: bool) -> Result<()> {
        self.set_flag(chat_id, "send_counter_until_win", enabled)
            .await
    }

    pub async fn set_send_joke(&self, chat_id: i64, enabled: bool) -> Result<()> {
        self.set_flag(chat_id, "send_random_joke", enabled).await
    }

    pub async fn set_comment_on_pictures(&self, chat_id: i64, enabled: bool) -> Result<()> {
        self.set_flag(chat_id, "comment_on_pictures", enabled).await
    }

    pub async fn set_transcribe_audio(&self, chat_id: i64, enabled: bool) -> Result<()> {
        self.set_flag(chat_id, "transcribe_audio", enabled).await
    }

    pub async fn set_joke_prompt(&self, chat_id: i64, prompt: &str) -> Result<()> {
        self.set_prompt(chat_id, "joke_prompt", prompt).await
    }

    pub async fn set_picture_prompt(&self, chat_id: i64, prompt: &str) -> Result<()> {
        self.set_prompt(chat_id, "picture_prompt", prompt).await
    }

    /// All known chats, for the scheduled daily senders.
    pub async fn all_chats(&self) -> Result<Vec<ChatSettings>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT chat_id, send_counter_until_win, send_random_joke,
                        comment_on_pictures, transcribe_audio, joke_prompt, picture_prompt
                 FROM chat_settings ORDER BY chat_id ASC",
            )
            .context("Failed to prepare all_chats query")?;
        let chats = stmt
            .query_map([], |row| {
                Ok(ChatSettings {
                    chat_id: row.get(0)?,
                    send_counter_until_win: row.get(1)?,
                    send_random_joke: row.get(2)?,
                    comment_on_pictures: row.get(3)?,
                    transcribe_audio: row.get(4)?,
                    joke_prompt: row.get(5)?,
                    picture_prompt: row.get(6)?,
                })
            })
            .context("Failed to query chats")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to collect chats")?;
        Ok(chats)
    }

    async fn set_flag(&self, chat_id: i64, column: &str, enabled: bool) -> Result<()> {
        let conn = self.conn.lock().await;
        // column names come from the private setters above, never from input
        let sql = format!(
            "INSERT INTO chat_settings (chat_id, {column}) VALUES (?1, ?2)
             ON CONFLICT(chat_id) DO UPDATE SET {column} = ?2"
        );
        conn.execute(&sql, rusqlite::params![chat_id, enabled])
            .with_context(|| format!("Failed to update {column}"))?;
        Ok(())
    }

    async fn set_prompt(&self, chat_id: i64, column: &str, prompt: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "INSERT INTO chat_settings (chat_id, {column}) VALUES (?1, ?2)
             ON CONFLICT(chat_id) DO UPDATE SET {column} = ?2"
        );
        conn.execute(&sql, rusqlite::params![chat_id, prompt])
            .with_context(|| format!("Failed to update {column}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_chat_gets_defaults() {
        let store = SettingsStore::open_in_memory().unwrap();
        let settings = store.get(42).await.unwrap();
        assert_eq!(settings, ChatSettings::defaults(42));
    }

    #[tokio::test]
    async fn test_toggle_persists() {
        let store = SettingsStore::open_in_memory().unwrap();
        store.set_send_joke(7, true).await.unwrap();
        assert!(store.get(7).await.unwrap().send_random_joke);
        store.set_send_joke(7, false).await.unwrap();
        assert!(!store.get(7).await.unwrap().send_random_joke);
    }

    #[tokio::test]
    async fn test_flags_are_independent() {
        let store = SettingsStore::open_in_memory().unwrap();
        store.set_comment_on_pictures(1, true).await.unwrap();
        store.set_transcribe_audio(1, true).await.unwrap();
        let settings = store.get(1).await.unwrap();
        assert!(settings.comment_on_pictures);
        assert!(settings.transcribe_audio);
        assert!(!settings.send_random_joke);
        assert!(!settings.send_counter_until_win);
    }

    #[tokio::test]
    async fn test_register_chat_is_idempotent() {
        let store = SettingsStore::open_in_memory().unwrap();
        store.set_send_counter(5, true).await.unwrap();
        store.register_chat(5).await.unwrap();
        store.register_chat(5).await.unwrap();
        // registering must not reset existing settings
        assert!(store.get(5).await.unwrap().send_counter_until_win);
        assert_eq!(store.all_chats().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prompt_overrides() {
        let store = SettingsStore::open_in_memory().unwrap();
        assert!(store.get(9).await.unwrap().joke_prompt.is_none());
        store.set_joke_prompt(9, "tell a pun").await.unwrap();
        store.set_picture_prompt(9, "be a critic").await.unwrap();
        let settings = store.get(9).await.unwrap();
        assert_eq!(settings.joke_prompt.as_deref(), Some("tell a pun"));
        assert_eq!(settings.picture_prompt.as_deref(), Some("be a critic"));
    }

    #[tokio::test]
    async fn test_all_chats_lists_every_registered_chat() {
        let store = SettingsStore::open_in_memory().unwrap();
        store.register_chat(1).await.unwrap();
        store.register_chat(2).await.unwrap();
        store.set_send_counter(3, true).await.unwrap();
        let chats = store.all_chats().await.unwrap();
        assert_eq!(chats.len(), 3);
        assert_eq!(
            chats.iter().filter(|c| c.send_counter_until_win).count(),
            1
        );
    }
}
