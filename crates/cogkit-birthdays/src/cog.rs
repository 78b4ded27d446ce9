//! Birthday settings, the announcement pass and the daily wake loop.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cogkit_core::embed::colour;
use cogkit_core::{
    ChannelId, ChatHost, Cog, CogError, ConfigStore, Embed, GuildId, RoleId, Scope, UserId,
};

use crate::dates;

const COG_NAME: &str = "birthdays";
const DATE_GROUP: &str = "DATE";
const YESTERDAYS_KEY: &str = "yesterdays";

fn date_scope(ordinal: i32) -> Scope {
    Scope::custom(DATE_GROUP, ordinal.to_string())
}

fn configured_guilds(store: &ConfigStore) -> Result<Vec<GuildId>, CogError> {
    Ok(store
        .scope_ids(COG_NAME, "guild")?
        .into_iter()
        .filter_map(|id| id.parse().ok().map(GuildId))
        .collect())
}

pub struct BirthdaysCog<H: ChatHost + ?Sized + 'static> {
    host: Arc<H>,
    store: Arc<ConfigStore>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<H: ChatHost + ?Sized + 'static> BirthdaysCog<H> {
    pub fn new(host: Arc<H>, store: Arc<ConfigStore>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            host,
            store,
            shutdown,
            task: Mutex::new(None),
        }
    }

    pub fn set_channel(&self, guild: GuildId, channel: ChannelId) -> Result<String, CogError> {
        self.store
            .set(COG_NAME, &Scope::Guild(guild), "channel", &channel.0)?;
        Ok(format!(
            ":white_check_mark: The channel for announcing birthdays has been set to: <#{channel}>."
        ))
    }

    pub fn set_role(&self, guild: GuildId, role: RoleId) -> Result<String, CogError> {
        self.store
            .set(COG_NAME, &Scope::Guild(guild), "role", &role.0)?;
        Ok(":white_check_mark: The birthday role has been set.".to_string())
    }

    /// Store the user's birthday, replacing any previous date. The year is
    /// optional; without it no age is shown.
    pub fn set_birthday(
        &self,
        user: UserId,
        date_str: &str,
        year: Option<i32>,
    ) -> Result<String, CogError> {
        let Some(date) = dates::parse_birthday(date_str) else {
            return Ok(":x: The birthday date you entered is invalid. It must be `MM-DD`.".to_string());
        };
        self.forget_user(user)?;
        self.store
            .set(COG_NAME, &date_scope(dates::ordinal(date)), &user.to_string(), &year)?;
        Ok(format!(
            ":white_check_mark: Your birthday has been set to: **{}**.",
            dates::display_date(date)
        ))
    }

    pub fn remove_birthday(&self, user: UserId) -> Result<String, CogError> {
        self.forget_user(user)?;
        Ok(":put_litter_in_its_place: Your birthday has been removed.".to_string())
    }

    /// One embed grouping birthdays by month, day-sorted, with the age each
    /// user turns this year when their birth year is known. Entries of users
    /// with no mutual guild are cleaned first.
    pub async fn list(&self) -> Result<Embed, CogError> {
        self.clean_stale().await?;
        let mut buckets = Vec::new();
        for scope_id in self.store.scope_ids(COG_NAME, DATE_GROUP)? {
            let Some(date) = scope_id.parse().ok().and_then(dates::date_from_ordinal) else {
                continue;
            };
            let entries: Vec<(String, Option<i32>)> =
                self.store.entries(COG_NAME, &date_scope(dates::ordinal(date)))?;
            if !entries.is_empty() {
                buckets.push((date, entries));
            }
        }
        buckets.sort_by_key(|(date, _)| *date);

        let this_year = Utc::now().year();
        let mut embed = Embed::new().title("Birthday List").colour(colour::LIGHT_GREY);
        let mut month = 0u32;
        let mut lines: Vec<String> = Vec::new();
        let mut month_name = String::new();
        for (date, entries) in &buckets {
            if date.month() != month {
                if !lines.is_empty() {
                    embed = embed.field(month_name.clone(), lines.join("\n"));
                    lines.clear();
                }
                month = date.month();
                month_name = date.format("%B").to_string();
            }
            let people = entries
                .iter()
                .map(|(user, year)| match year {
                    Some(y) => format!("<@!{user}> ({})", this_year - y),
                    None => format!("<@!{user}>"),
                })
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("{}: {people}", date.day()));
        }
        if !lines.is_empty() {
            embed = embed.field(month_name, lines.join("\n"));
        }
        Ok(embed)
    }

    /// Remove the user from every date bucket they appear in.
    fn forget_user(&self, user: UserId) -> Result<(), CogError> {
        let key = user.to_string();
        for scope_id in self.store.scope_ids(COG_NAME, DATE_GROUP)? {
            let Ok(ordinal) = scope_id.parse::<i32>() else {
                continue;
            };
            self.store.clear(COG_NAME, &date_scope(ordinal), &key)?;
        }
        Ok(())
    }

    /// Drop entries of users the bot shares no configured guild with, and
    /// empty buckets along with them. Skipped entirely while no guild is
    /// configured, since reachability cannot be judged.
    async fn clean_stale(&self) -> Result<(), CogError> {
        let guilds = configured_guilds(&self.store)?;
        if guilds.is_empty() {
            return Ok(());
        }
        for scope_id in self.store.scope_ids(COG_NAME, DATE_GROUP)? {
            let Ok(ordinal) = scope_id.parse::<i32>() else {
                continue;
            };
            let scope = date_scope(ordinal);
            let entries: Vec<(String, Option<i32>)> = self.store.entries(COG_NAME, &scope)?;
            for (key, _) in entries {
                let Ok(raw) = key.parse::<u64>() else {
                    continue;
                };
                let mut reachable = false;
                for guild in &guilds {
                    if self.host.member_roles(*guild, UserId(raw)).await.is_ok() {
                        reachable = true;
                        break;
                    }
                }
                if !reachable {
                    debug!(user = %raw, "dropping birthday of unreachable user");
                    self.store.clear(COG_NAME, &scope, &key)?;
                }
            }
        }
        Ok(())
    }
}

/// Strip yesterday's birthday roles and clear the tracking list.
async fn clean_yesterdays<H: ChatHost + ?Sized>(
    host: &H,
    store: &ConfigStore,
) -> Result<(), CogError> {
    let yesterdays: Vec<u64> = store
        .get(COG_NAME, &Scope::Global, YESTERDAYS_KEY)?
        .unwrap_or_default();
    for user in yesterdays {
        for guild in configured_guilds(store)? {
            let Some(role) = store.get::<u64>(COG_NAME, &Scope::Guild(guild), "role")? else {
                continue;
            };
            if let Err(e) = host
                .remove_member_role(guild, UserId(user), RoleId(role))
                .await
            {
                debug!(%guild, %user, error = %e, "could not strip birthday role");
            }
        }
    }
    store.clear(COG_NAME, &Scope::Global, YESTERDAYS_KEY)?;
    Ok(())
}

/// Announce every birthday in today's bucket.
async fn announce_today<H: ChatHost + ?Sized>(
    host: &H,
    store: &ConfigStore,
) -> Result<(), CogError> {
    let Some(ordinal) = dates::today_ordinal(Utc::now()) else {
        return Ok(());
    };
    let entries: Vec<(String, Option<i32>)> = store.entries(COG_NAME, &date_scope(ordinal))?;
    for (key, year) in entries {
        let Ok(raw) = key.parse::<u64>() else {
            continue;
        };
        handle_birthday(host, store, UserId(raw), year).await?;
    }
    Ok(())
}

/// Give one user their birthday role and announcement in every configured
/// guild they are a member of. Role failures are ignored; only successful
/// grants are remembered for tomorrow's cleanup.
async fn handle_birthday<H: ChatHost + ?Sized>(
    host: &H,
    store: &ConfigStore,
    user: UserId,
    year: Option<i32>,
) -> Result<(), CogError> {
    let description = match year {
        Some(y) => format!(
            "<@!{user}> is now **{} years old**. :tada:",
            Utc::now().year() - y
        ),
        None => format!("It's <@!{user}>'s birthday today! :tada:"),
    };
    let embed = Embed::new().colour(colour::GOLD).description(description);

    for guild in configured_guilds(store)? {
        if host.member_roles(guild, user).await.is_err() {
            continue;
        }
        if let Some(role) = store.get::<u64>(COG_NAME, &Scope::Guild(guild), "role")? {
            match host.add_member_role(guild, user, RoleId(role)).await {
                Ok(()) => {
                    let mut yesterdays: Vec<u64> = store
                        .get(COG_NAME, &Scope::Global, YESTERDAYS_KEY)?
                        .unwrap_or_default();
                    yesterdays.push(user.0);
                    store.set(COG_NAME, &Scope::Global, YESTERDAYS_KEY, &yesterdays)?;
                }
                Err(e) => debug!(%guild, %user, error = %e, "could not grant birthday role"),
            }
        }
        if let Some(channel) = store.get::<u64>(COG_NAME, &Scope::Guild(guild), "channel")? {
            if let Err(e) = host.send_embed(ChannelId(channel), &embed).await {
                warn!(%guild, channel = %channel, error = %e, "birthday announcement failed");
            }
        }
    }
    Ok(())
}

async fn run_daily<H: ChatHost + ?Sized>(
    host: Arc<H>,
    store: Arc<ConfigStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("birthday loop started");
    loop {
        if let Err(e) = clean_yesterdays(&*host, &store).await {
            warn!(error = %e, "yesterday cleanup failed");
        }
        if let Err(e) = announce_today(&*host, &store).await {
            warn!(error = %e, "birthday announcement pass failed");
        }
        let wait = dates::until_next_utc_midnight(Utc::now());
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("birthday loop stopped");
}

#[async_trait]
impl<H: ChatHost + ?Sized + 'static> Cog for BirthdaysCog<H> {
    fn name(&self) -> &str {
        COG_NAME
    }

    async fn load(&self) -> Result<(), CogError> {
        let handle = tokio::spawn(run_daily(
            Arc::clone(&self.host),
            Arc::clone(&self.store),
            self.shutdown.subscribe(),
        ));
        *self.task.lock().unwrap() = Some(handle);
        Ok(())
    }

    async fn unload(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
    }
}
