//! The reactroles cog: event hooks, management operations and the worker
//! lifecycle.
//!
//! The host maps chat commands onto the management methods and feeds raw
//! reaction/delete events through the [`Cog`] hooks. Replies are returned
//! as strings or embeds for the host to deliver.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use cogkit_core::embed::colour;
use cogkit_core::{
    ChannelId, ChatHost, Cog, CogError, ConfigStore, Embed, Emoji, GuildId, MessageDeleteEvent,
    MessageId, ReactionEvent, RoleId,
};

use crate::bindings::RoleBindings;
use crate::queue::{role_queue, RoleQueue, RoleQueueWorker};

mod replies {
    use cogkit_core::{ChannelId, Emoji};

    pub const MESSAGE_NOT_FOUND: &str = ":x: Message not found.";
    pub const ALREADY_BOUND: &str = ":x: That emoji is already bound on the message.";
    pub const ROLE_NOT_BOUND: &str = ":x: The role is not bound to that message.";
    pub const ROLE_UNBOUND: &str = ":put_litter_in_its_place: Removed the binding.";
    pub const NOT_ENOUGH_MESSAGES: &str = ":x: A link needs at least two messages.";
    pub const NAME_TAKEN: &str = ":x: That link name is already used in this server.";
    pub const LINK_CREATED: &str = "The messages have been linked. :white_check_mark:";
    pub const LINK_NOT_FOUND: &str = ":x: Could not find a link with that name in this server.";
    pub const LINK_REMOVED: &str = "The link has been removed. :put_litter_in_its_place:";
    pub const CANT_CHECK_LINKED: &str = ":x: Cannot run a check on linked messages.";

    pub fn role_bound(emoji: &Emoji, channel: ChannelId) -> String {
        format!("The role has been bound to {emoji} on the message in <#{channel}>. :white_check_mark:")
    }

    pub fn check_done(granted: usize) -> String {
        format!("Check complete. Gave {granted} missing role(s). :white_check_mark:")
    }
}

pub struct ReactRolesCog<H: ChatHost + ?Sized + 'static> {
    host: Arc<H>,
    bindings: RoleBindings,
    queue: RoleQueue<H>,
    /// Consumed by the first `load`; the worker runs until `unload`.
    worker: Mutex<Option<RoleQueueWorker<H>>>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<H: ChatHost + ?Sized + 'static> ReactRolesCog<H> {
    pub fn new(host: Arc<H>, store: Arc<ConfigStore>, max_processed_per_second: u32) -> Self {
        let (queue, worker) = role_queue(Arc::clone(&host), max_processed_per_second);
        let (shutdown, _) = watch::channel(false);
        Self {
            host,
            bindings: RoleBindings::new(store),
            queue,
            worker: Mutex::new(Some(worker)),
            shutdown,
            task: Mutex::new(None),
        }
    }

    /// Bind `emoji` on a message to `role` and seed the bot's own reaction
    /// so the option stays visible once every member has clicked off.
    pub async fn bind(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
        emoji: &Emoji,
        role: RoleId,
    ) -> Result<String, CogError> {
        if !self.host.message_exists(channel, message).await? {
            return Ok(replies::MESSAGE_NOT_FOUND.to_string());
        }
        if !self.bindings.bind(guild, channel, message, &emoji.key(), role)? {
            return Ok(replies::ALREADY_BOUND.to_string());
        }
        if let Err(e) = self.host.add_reaction(channel, message, emoji).await {
            warn!(%channel, %message, error = %e, "could not seed bot reaction");
        }
        Ok(replies::role_bound(emoji, channel))
    }

    /// Remove the binding holding `role` and clear its reaction pile.
    pub async fn unbind(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
        role: RoleId,
    ) -> Result<String, CogError> {
        let Some(emoji_key) = self.bindings.unbind(guild, channel, message, role)? else {
            return Ok(replies::ROLE_NOT_BOUND.to_string());
        };
        let emoji = Emoji::parse(&emoji_key);
        match self.host.reaction_users(channel, message, &emoji).await {
            Ok(users) => {
                for user in users {
                    if let Err(e) = self
                        .host
                        .remove_reaction(channel, message, &emoji, user)
                        .await
                    {
                        warn!(%channel, %message, %user, error = %e, "could not clear reaction");
                    }
                }
            }
            Err(e) => warn!(%channel, %message, error = %e, "could not list reaction users"),
        }
        Ok(replies::ROLE_UNBOUND.to_string())
    }

    /// Link messages into a mutually-exclusive group.
    pub fn link(
        &self,
        guild: GuildId,
        name: &str,
        pairs: &[(ChannelId, MessageId)],
    ) -> Result<String, CogError> {
        if pairs.len() < 2 {
            return Ok(replies::NOT_ENOUGH_MESSAGES.to_string());
        }
        if !self.bindings.link(guild, name, pairs)? {
            return Ok(replies::NAME_TAKEN.to_string());
        }
        Ok(replies::LINK_CREATED.to_string())
    }

    pub fn unlink(&self, guild: GuildId, name: &str) -> Result<String, CogError> {
        if !self.bindings.unlink(guild, name)? {
            return Ok(replies::LINK_NOT_FOUND.to_string());
        }
        Ok(replies::LINK_REMOVED.to_string())
    }

    /// One field per link group, listing its `<channel>_<message>` pairs.
    pub fn link_list(&self, guild: GuildId) -> Result<Embed, CogError> {
        let groups = self.bindings.link_groups(guild)?;
        let mut names: Vec<_> = groups.keys().cloned().collect();
        names.sort();
        let mut embed = Embed::new()
            .title("Role links")
            .colour(colour::LIGHT_GREY);
        if names.is_empty() {
            embed = embed.description("No links in this server.");
        }
        for name in names {
            embed = embed.field(name.clone(), groups[&name].join("\n"));
        }
        Ok(embed)
    }

    /// Walk the reaction piles on a message and grant every bound role its
    /// reactors are missing. Linked messages are refused: re-granting all
    /// reacted roles would violate their mutual exclusion.
    pub async fn check(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<String, CogError> {
        if self.bindings.is_linked(guild, channel, message) {
            return Ok(replies::CANT_CHECK_LINKED.to_string());
        }
        let bot = self.host.bot_user();
        let mut granted = 0usize;
        for (emoji_key, role) in self.bindings.message_roles(guild, channel, message) {
            let emoji = Emoji::parse(&emoji_key);
            let users = self.host.reaction_users(channel, message, &emoji).await?;
            for user in users {
                if user == bot {
                    continue;
                }
                let current = match self.host.member_roles(guild, user).await {
                    Ok(roles) => roles,
                    Err(e) => {
                        warn!(%guild, %user, error = %e, "skipping unreadable member");
                        continue;
                    }
                };
                if current.contains(&role) {
                    continue;
                }
                match self.host.add_member_role(guild, user, role).await {
                    Ok(()) => granted += 1,
                    Err(e) => warn!(%guild, %user, %role, error = %e, "could not grant role"),
                }
            }
        }
        Ok(replies::check_done(granted))
    }
}

#[async_trait]
impl<H: ChatHost + ?Sized + 'static> Cog for ReactRolesCog<H> {
    fn name(&self) -> &str {
        crate::bindings::COG_NAME
    }

    async fn load(&self) -> Result<(), CogError> {
        self.bindings.load()?;
        if let Some(worker) = self.worker.lock().unwrap().take() {
            let handle = tokio::spawn(worker.run(self.shutdown.subscribe()));
            *self.task.lock().unwrap() = Some(handle);
        }
        info!(
            pending = self.queue.pending_subjects(),
            "reactroles cog loaded"
        );
        Ok(())
    }

    async fn unload(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
    }

    async fn on_reaction_add(&self, event: &ReactionEvent) -> Result<(), CogError> {
        if event.user_id == self.host.bot_user() {
            return Ok(());
        }
        let Some(role) = self.bindings.find_role(
            event.guild_id,
            event.channel_id,
            event.message_id,
            &event.emoji.key(),
        ) else {
            return Ok(());
        };
        let linked = self
            .bindings
            .linked_roles(event.guild_id, event.channel_id, event.message_id);
        self.queue
            .enqueue(event.guild_id, event.user_id, role, true, &linked);
        Ok(())
    }

    async fn on_reaction_remove(&self, event: &ReactionEvent) -> Result<(), CogError> {
        let bound = self.bindings.find_role(
            event.guild_id,
            event.channel_id,
            event.message_id,
            &event.emoji.key(),
        );
        if event.user_id == self.host.bot_user() {
            // The bot's seed reaction was stripped; put it back so the
            // option stays clickable.
            if bound.is_some() {
                self.host
                    .add_reaction(event.channel_id, event.message_id, &event.emoji)
                    .await?;
            }
            return Ok(());
        }
        if let Some(role) = bound {
            // Revoking never needs the linked set; the role just comes off.
            self.queue
                .enqueue(event.guild_id, event.user_id, role, false, &HashSet::new());
        }
        Ok(())
    }

    async fn on_message_delete(&self, event: &MessageDeleteEvent) -> Result<(), CogError> {
        self.bindings
            .remove_message(event.guild_id, event.channel_id, event.message_id)?;
        Ok(())
    }
}
