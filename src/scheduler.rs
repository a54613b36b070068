use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use teloxide::prelude::*;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::bot::AppState;
use crate::downloader::delete_downloaded_files;

/// Wrapper around tokio-cron-scheduler for background tasks
pub struct Scheduler {
    inner: JobScheduler,
}

impl Scheduler {
    pub async fn new() -> Result<Self> {
        let inner = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;
        Ok(Self { inner })
    }

    /// Add a recurring cron job
    pub async fn add_cron_job<F>(&self, cron_expr: &str, name: &str, task: F) -> Result<()>
    where
        F: Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
            + Send
            + Sync
            + 'static,
    {
        let job_name = name.to_string();
        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let name = job_name.clone();
            let fut = task();
            Box::pin(async move {
                info!("Running scheduled task: {}", name);
                fut.await;
            })
        })
        .with_context(|| format!("Failed to create cron job: {}", name))?;

        self.inner
            .add(job)
            .await
            .with_context(|| format!("Failed to add job: {}", name))?;

        info!("Scheduled task '{}' with cron: {}", name, cron_expr);
        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        self.inner
            .start()
            .await
            .context("Failed to start scheduler")?;
        info!("Scheduler started");
        Ok(())
    }
}

/// Whole days from `today` until the victory target date.
pub fn days_until(today: NaiveDate, target: NaiveDate) -> i64 {
    (target - today).num_days()
}

/// Fill the `{days}` placeholder of a counter template.
pub fn render_counter_message(template: &str, days: i64) -> String {
    template.replace("{days}", &days.to_string())
}

fn pick_template(templates: &[String]) -> Option<&String> {
    templates.choose(&mut rand::thread_rng())
}

/// Register the three recurring jobs: the daily victory counter, the daily
/// joke, and the nightly cache/download wipe.
pub async fn register_jobs(scheduler: &Scheduler, bot: Bot, state: Arc<AppState>) -> Result<()> {
    let counter_state = state.clone();
    let counter_bot = bot.clone();
    scheduler
        .add_cron_job(&state.config.counter.cron.clone(), "daily-counter", move || {
            let state = counter_state.clone();
            let bot = counter_bot.clone();
            Box::pin(async move {
                if let Err(e) = send_daily_counter(&bot, &state).await {
                    error!("Daily counter job failed: {:#}", e);
                }
            })
        })
        .await?;

    let joke_state = state.clone();
    let joke_bot = bot.clone();
    scheduler
        .add_cron_job(&state.config.jokes.cron.clone(), "daily-joke", move || {
            let state = joke_state.clone();
            let bot = joke_bot.clone();
            Box::pin(async move {
                if let Err(e) = send_daily_joke(&bot, &state).await {
                    error!("Daily joke job failed: {:#}", e);
                }
            })
        })
        .await?;

    let cleanup_state = state.clone();
    scheduler
        .add_cron_job(
            &state.config.cache.cleanup_cron.clone(),
            "cache-cleanup",
            move || {
                let state = cleanup_state.clone();
                Box::pin(async move {
                    state.cache.clear().await;
                    match delete_downloaded_files(&state.config.downloads.directory).await {
                        Ok(count) => info!("Cleanup removed {} downloaded files", count),
                        Err(e) => error!("Cleanup failed: {:#}", e),
                    }
                })
            },
        )
        .await?;

    Ok(())
}

async fn send_daily_counter(bot: &Bot, state: &AppState) -> Result<()> {
    let Some(target_date) = state.config.counter.target_date else {
        return Ok(());
    };

    let chats = state.settings.all_chats().await?;
    let days = days_until(chrono::Local::now().date_naive(), target_date);
    let Some(template) = pick_template(&state.config.counter.templates) else {
        return Ok(());
    };
    let message = render_counter_message(template, days);

    for chat in chats.iter().filter(|c| c.send_counter_until_win) {
        if let Err(e) = bot.send_message(ChatId(chat.chat_id), &message).await {
            // keep going for the other chats
            error!("Failed to send counter to chat {}: {}", chat.chat_id, e);
        } else {
            info!("Sent counter message to chat {}", chat.chat_id);
        }
    }
    Ok(())
}

async fn send_daily_joke(bot: &Bot, state: &AppState) -> Result<()> {
    let chats = state.settings.all_chats().await?;
    for chat in chats.iter().filter(|c| c.send_random_joke) {
        let joke = state.random_joke(Some(chat.chat_id)).await;
        if let Err(e) = bot.send_message(ChatId(chat.chat_id), joke).await {
            error!("Failed to send joke to chat {}: {}", chat.chat_id, e);
        } else {
            info!("Sent daily joke to chat {}", chat.chat_id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_until() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 30).unwrap();
        let target = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
        assert_eq!(days_until(today, target), 2);
        assert_eq!(days_until(target, target), 0);
        assert_eq!(days_until(target, today), -2);
    }

    #[test]
    fn test_render_counter_message() {
        assert_eq!(
            render_counter_message("ще {days} днів до перемоги", 17),
            "ще 17 днів до перемоги"
        );
        assert_eq!(render_counter_message("no placeholder", 3), "no placeholder");
    }

    #[test]
    fn test_pick_template() {
        assert!(pick_template(&[]).is_none());
        let templates = vec!["a".to_string(), "b".to_string()];
        let picked = pick_template(&templates).unwrap();
        assert!(templates.contains(picked));
    }
}
