//! Reminder storage, resume and delivery.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use cogkit_core::embed::colour;
use cogkit_core::{Cog, CogError, ConfigStore, Embed, Messenger, PlatformError, Scope, UserId};

use crate::parse::parse_duration;

const COG_NAME: &str = "reminder";

/// One persisted reminder, keyed in the user scope by a random id.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Reminder {
    content: String,
    start_ts: i64,
    end_ts: i64,
}

pub struct ReminderCog<M: Messenger + ?Sized + 'static> {
    messenger: Arc<M>,
    store: Arc<ConfigStore>,
    /// In-flight sleep tasks, aborted wholesale on unload.
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    max_seconds: u64,
}

impl<M: Messenger + ?Sized + 'static> ReminderCog<M> {
    pub fn new(messenger: Arc<M>, store: Arc<ConfigStore>, max_seconds: u64) -> Self {
        Self {
            messenger,
            store,
            tasks: Mutex::new(HashMap::new()),
            max_seconds,
        }
    }

    /// Schedule a reminder for `user` and return the reply to show them.
    pub fn remind(&self, user: UserId, time_spec: &str, text: &str) -> Result<String, CogError> {
        let Some(duration) = parse_duration(time_spec) else {
            return Ok(":x: Invalid time format.".to_string());
        };
        let seconds = duration.as_secs();
        if seconds >= self.max_seconds {
            return Ok(format!(
                ":x: Too long amount of time. Maximum: {} total seconds",
                self.max_seconds
            ));
        }
        let now = Utc::now().timestamp();
        let reminder = Reminder {
            content: text.to_string(),
            start_ts: now,
            end_ts: now + seconds as i64,
        };
        let id = uuid::Uuid::new_v4().to_string();
        self.store
            .set(COG_NAME, &Scope::User(user), &id, &reminder)?;
        self.spawn(user, id, reminder.content, duration);
        Ok(format!(
            ":white_check_mark: I will remind you in {seconds} seconds."
        ))
    }

    fn spawn(&self, user: UserId, id: String, content: String, delay: Duration) {
        let messenger = Arc::clone(&self.messenger);
        let store = Arc::clone(&self.store);
        let key = id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let embed = Embed::new()
                .title("Reminder")
                .description(content)
                .colour(colour::BLUE);
            match messenger.send_user_embed(user, &embed).await {
                Ok(()) => {
                    if let Err(e) = store.clear(COG_NAME, &Scope::User(user), &id) {
                        warn!(%user, error = %e, "could not clear delivered reminder");
                    }
                }
                Err(PlatformError::NotFound(reason)) => {
                    // No mutual guild anymore; the reminder can never land.
                    warn!(%user, %reason, "dropping reminder for unreachable user");
                    if let Err(e) = store.clear(COG_NAME, &Scope::User(user), &id) {
                        warn!(%user, error = %e, "could not drop stale reminder");
                    }
                }
                Err(e) => {
                    // Kept in the store; it fires again on the next load.
                    warn!(%user, error = %e, "reminder delivery failed");
                }
            }
        });
        self.tasks.lock().unwrap().insert(key, handle);
    }
}

#[async_trait]
impl<M: Messenger + ?Sized + 'static> Cog for ReminderCog<M> {
    fn name(&self) -> &str {
        COG_NAME
    }

    /// Resume every saved reminder. Deadlines that passed while the process
    /// was down fire immediately.
    async fn load(&self) -> Result<(), CogError> {
        let now = Utc::now().timestamp();
        let mut resumed = 0usize;
        for user_id in self.store.scope_ids(COG_NAME, "user")? {
            let Ok(raw) = user_id.parse::<u64>() else {
                warn!(%user_id, "skipping malformed reminder scope");
                continue;
            };
            let user = UserId(raw);
            for (id, reminder) in self
                .store
                .entries::<Reminder>(COG_NAME, &Scope::User(user))?
            {
                let remaining = (reminder.end_ts - now).max(0) as u64;
                self.spawn(user, id, reminder.content, Duration::from_secs(remaining));
                resumed += 1;
            }
        }
        info!(resumed, "reminder cog loaded");
        Ok(())
    }

    async fn unload(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}
