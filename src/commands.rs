use anyhow::Result;

use crate::settings::SettingsStore;

/// A recognized slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleCounter,
    ToggleJoke,
    TogglePictureComment,
    ToggleAudioTranscription,
    GetRandomJoke,
    SetJokePrompt(String),
    SetPicturePrompt(String),
}

/// What the dispatcher should do after a command was applied.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Reply(String),
    /// Generate and send a joke (needs the AI client, resolved by the bot).
    SendJoke,
}

/// Parse a message as a command. Matching is a case-insensitive prefix
/// check, mirroring how the commands were historically typed with and
/// without arguments or @-mentions.
pub fn parse(text: &str) -> Option<Command> {
    let lower = text.to_lowercase();
    if lower.starts_with("/togglecounter") {
        Some(Command::ToggleCounter)
    } else if lower.starts_with("/togglejoke") {
        Some(Command::ToggleJoke)
    } else if lower.starts_with("/togglepicturecomment") {
        Some(Command::TogglePictureComment)
    } else if lower.starts_with("/toggleaudiotranscription") {
        Some(Command::ToggleAudioTranscription)
    } else if lower.starts_with("/getrandomjoke") {
        Some(Command::GetRandomJoke)
    } else if let Some(rest) = strip_prefix_ci(text, "/setjokeprompt") {
        Some(Command::SetJokePrompt(rest.trim().to_string()))
    } else if let Some(rest) = strip_prefix_ci(text, "/setpictureprompt") {
        Some(Command::SetPicturePrompt(rest.trim().to_string()))
    } else {
        None
    }
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    // byte-wise ASCII compare so a multibyte argument can't split a char
    if text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

/// Apply a command against the settings store and produce the outcome.
pub async fn apply(
    command: Command,
    chat_id: i64,
    settings: &SettingsStore,
) -> Result<CommandOutcome> {
    let outcome = match command {
        Command::ToggleCounter => {
            let enabled = !settings.get(chat_id).await?.send_counter_until_win;
            settings.set_send_counter(chat_id, enabled).await?;
            CommandOutcome::Reply(if enabled {
                "Counter until win will now be shown in this chat".to_string()
            } else {
                "Counter until win will not be shown in this chat".to_string()
            })
        }
        Command::ToggleJoke => {
            let enabled = !settings.get(chat_id).await?.send_random_joke;
            settings.set_send_joke(chat_id, enabled).await?;
            CommandOutcome::Reply(if enabled {
                "Joke enabled".to_string()
            } else {
                "Joke disabled".to_string()
            })
        }
        Command::TogglePictureComment => {
            let enabled = !settings.get(chat_id).await?.comment_on_pictures;
            settings.set_comment_on_pictures(chat_id, enabled).await?;
            CommandOutcome::Reply(if enabled {
                "Picture commenting enabled".to_string()
            } else {
                "Picture commenting disabled".to_string()
            })
        }
        Command::ToggleAudioTranscription => {
            let enabled = !settings.get(chat_id).await?.transcribe_audio;
            settings.set_transcribe_audio(chat_id, enabled).await?;
            CommandOutcome::Reply(if enabled {
                "Audio transcription enabled".to_string()
            } else {
                "Audio transcription disabled".to_string()
            })
        }
        Command::GetRandomJoke => CommandOutcome::SendJoke,
        Command::SetJokePrompt(prompt) => {
            if prompt.is_empty() {
                CommandOutcome::Reply(
                    "Please provide a prompt after the command. \
                     Example: /setJokePrompt Tell me a joke about programming"
                        .to_string(),
                )
            } else {
                settings.set_joke_prompt(chat_id, &prompt).await?;
                CommandOutcome::Reply("Joke prompt updated successfully!".to_string())
            }
        }
        Command::SetPicturePrompt(prompt) => {
            if prompt.is_empty() {
                CommandOutcome::Reply(
                    "Please provide a prompt after the command. \
                     Example: /setPicturePrompt Comment on this picture as if you were \
                     a famous comedian"
                        .to_string(),
                )
            } else {
                settings.set_picture_prompt(chat_id, &prompt).await?;
                CommandOutcome::Reply("Picture comment prompt updated successfully!".to_string())
            }
        }
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(parse("/toggleCounter"), Some(Command::ToggleCounter));
        assert_eq!(parse("/TOGGLEJOKE"), Some(Command::ToggleJoke));
        assert_eq!(parse("/getRandomJoke"), Some(Command::GetRandomJoke));
        assert_eq!(
            parse("/togglepicturecomment"),
            Some(Command::TogglePictureComment)
        );
        assert_eq!(
            parse("/toggleaudiotranscription"),
            Some(Command::ToggleAudioTranscription)
        );
    }

    #[test]
    fn test_parse_prompt_arguments() {
        assert_eq!(
            parse("/setJokePrompt Tell me a joke about Rust"),
            Some(Command::SetJokePrompt(
                "Tell me a joke about Rust".to_string()
            ))
        );
        assert_eq!(
            parse("/setPicturePrompt   be dramatic  "),
            Some(Command::SetPicturePrompt("be dramatic".to_string()))
        );
        assert_eq!(
            parse("/setjokeprompt"),
            Some(Command::SetJokePrompt(String::new()))
        );
    }

    #[test]
    fn test_parse_non_commands() {
        assert_eq!(parse("hello there"), None);
        assert_eq!(parse("/unknown"), None);
        assert_eq!(parse(""), None);
    }

    #[tokio::test]
    async fn test_toggle_flips_and_reports() {
        let store = SettingsStore::open_in_memory().unwrap();

        let outcome = apply(Command::ToggleJoke, 1, &store).await.unwrap();
        assert_eq!(outcome, CommandOutcome::Reply("Joke enabled".to_string()));
        assert!(store.get(1).await.unwrap().send_random_joke);

        let outcome = apply(Command::ToggleJoke, 1, &store).await.unwrap();
        assert_eq!(outcome, CommandOutcome::Reply("Joke disabled".to_string()));
        assert!(!store.get(1).await.unwrap().send_random_joke);
    }

    #[tokio::test]
    async fn test_set_prompt_requires_argument() {
        let store = SettingsStore::open_in_memory().unwrap();

        let outcome = apply(Command::SetJokePrompt(String::new()), 1, &store)
            .await
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Reply(msg) if msg.contains("provide a prompt")));
        assert!(store.get(1).await.unwrap().joke_prompt.is_none());

        let outcome = apply(Command::SetJokePrompt("about ferris".to_string()), 1, &store)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Reply("Joke prompt updated successfully!".to_string())
        );
        assert_eq!(
            store.get(1).await.unwrap().joke_prompt.as_deref(),
            Some("about ferris")
        );
    }

    #[tokio::test]
    async fn test_get_random_joke_defers_to_ai() {
        let store = SettingsStore::open_in_memory().unwrap();
        let outcome = apply(Command::GetRandomJoke, 1, &store).await.unwrap();
        assert_eq!(outcome, CommandOutcome::SendJoke);
    }
}
