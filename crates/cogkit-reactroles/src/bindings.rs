//! Emoji→role bindings and link groups, mirrored in memory.
//!
//! Durable state lives in the config store; lookups on the reaction path
//! must be synchronous and cheap, so both tables are mirrored in `DashMap`
//! caches hydrated by [`RoleBindings::load`]. The caches are owned by this
//! struct and injected where needed — there is no module-level state.
//!
//! Storage layout:
//! - scope `("MESSAGE", "<guild>_<channel>_<message>")`, one key per emoji
//!   (its stable [`Emoji::key`]), value = bound role id;
//! - guild scope, key `links`, value = map of link name → list of
//!   `<channel>_<message>` pairs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

use cogkit_core::store::StoreError;
use cogkit_core::{ChannelId, ConfigStore, GuildId, MessageId, RoleId, Scope};

pub(crate) const COG_NAME: &str = "reactroles";
const MESSAGE_GROUP: &str = "MESSAGE";
const LINKS_KEY: &str = "links";

/// `<channel>_<message>` pair identifying a bound message inside a guild.
pub(crate) fn pair_key(channel: ChannelId, message: MessageId) -> String {
    format!("{channel}_{message}")
}

fn message_scope(guild: GuildId, channel: ChannelId, message: MessageId) -> Scope {
    Scope::custom(MESSAGE_GROUP, format!("{guild}_{channel}_{message}"))
}

pub struct RoleBindings {
    store: Arc<ConfigStore>,
    /// (guild, channel, message) → emoji key → role.
    bindings: DashMap<(GuildId, ChannelId, MessageId), HashMap<String, RoleId>>,
    /// guild → pair → roles reachable through that pair's link group.
    links: DashMap<GuildId, HashMap<String, HashSet<RoleId>>>,
}

impl RoleBindings {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            bindings: DashMap::new(),
            links: DashMap::new(),
        }
    }

    /// Hydrate both caches from the store. Malformed scope ids are logged
    /// and skipped rather than failing the whole load.
    pub fn load(&self) -> Result<(), StoreError> {
        self.bindings.clear();
        self.links.clear();

        for scope_id in self.store.scope_ids(COG_NAME, MESSAGE_GROUP)? {
            let Some(key) = parse_message_scope(&scope_id) else {
                warn!(%scope_id, "skipping malformed message binding scope");
                continue;
            };
            let scope = Scope::custom(MESSAGE_GROUP, scope_id);
            let entries: Vec<(String, u64)> = self.store.entries(COG_NAME, &scope)?;
            if entries.is_empty() {
                continue;
            }
            let map: HashMap<String, RoleId> = entries
                .into_iter()
                .map(|(emoji, role)| (emoji, RoleId(role)))
                .collect();
            self.bindings.insert(key, map);
        }

        for guild_id in self.store.scope_ids(COG_NAME, "guild")? {
            let Ok(raw) = guild_id.parse::<u64>() else {
                continue;
            };
            self.rebuild_links(GuildId(raw))?;
        }
        Ok(())
    }

    /// Role bound to `emoji_key` on the given message, if any.
    pub fn find_role(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
        emoji_key: &str,
    ) -> Option<RoleId> {
        self.bindings
            .get(&(guild, channel, message))
            .and_then(|map| map.get(emoji_key).copied())
    }

    /// All roles bound on one message.
    pub fn message_roles(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
    ) -> Vec<(String, RoleId)> {
        self.bindings
            .get(&(guild, channel, message))
            .map(|map| map.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default()
    }

    /// Roles mutually exclusive with anything bound on this message, i.e.
    /// the union of roles across its link group. Empty when unlinked.
    pub fn linked_roles(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
    ) -> HashSet<RoleId> {
        self.links
            .get(&guild)
            .and_then(|pairs| pairs.get(&pair_key(channel, message)).cloned())
            .unwrap_or_default()
    }

    pub fn is_linked(&self, guild: GuildId, channel: ChannelId, message: MessageId) -> bool {
        self.links
            .get(&guild)
            .map(|pairs| pairs.contains_key(&pair_key(channel, message)))
            .unwrap_or(false)
    }

    /// Persist a new emoji→role binding. Returns `false` when the emoji is
    /// already bound on that message.
    pub fn bind(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
        emoji_key: &str,
        role: RoleId,
    ) -> Result<bool, StoreError> {
        let key = (guild, channel, message);
        if self
            .bindings
            .get(&key)
            .is_some_and(|map| map.contains_key(emoji_key))
        {
            return Ok(false);
        }
        self.store.set(
            COG_NAME,
            &message_scope(guild, channel, message),
            emoji_key,
            &role.0,
        )?;
        self.bindings
            .entry(key)
            .or_default()
            .insert(emoji_key.to_string(), role);
        self.rebuild_links(guild)?;
        Ok(true)
    }

    /// Remove the binding holding `role` on a message. Returns the emoji
    /// key it was bound under, or `None` when the role is not bound there.
    pub fn unbind(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
        role: RoleId,
    ) -> Result<Option<String>, StoreError> {
        let key = (guild, channel, message);
        let emoji_key = self.bindings.get(&key).and_then(|map| {
            map.iter()
                .find(|(_, bound)| **bound == role)
                .map(|(emoji, _)| emoji.clone())
        });
        let Some(emoji_key) = emoji_key else {
            return Ok(None);
        };
        self.store.clear(
            COG_NAME,
            &message_scope(guild, channel, message),
            &emoji_key,
        )?;
        if let Some(mut map) = self.bindings.get_mut(&key) {
            map.remove(&emoji_key);
            if map.is_empty() {
                drop(map);
                self.bindings.remove(&key);
            }
        }
        self.rebuild_links(guild)?;
        Ok(Some(emoji_key))
    }

    /// Drop every trace of a deleted message: its bindings and its entry
    /// in any link group.
    pub fn remove_message(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), StoreError> {
        self.store
            .clear_scope(COG_NAME, &message_scope(guild, channel, message))?;
        self.bindings.remove(&(guild, channel, message));

        let pair = pair_key(channel, message);
        let mut link_lists = self.stored_links(guild)?;
        let mut changed = false;
        for pairs in link_lists.values_mut() {
            let before = pairs.len();
            pairs.retain(|p| *p != pair);
            changed |= pairs.len() != before;
        }
        if changed {
            self.store
                .set(COG_NAME, &Scope::Guild(guild), LINKS_KEY, &link_lists)?;
        }
        self.rebuild_links(guild)?;
        Ok(())
    }

    /// Create a named link group. Returns `false` when the name is taken.
    pub fn link(
        &self,
        guild: GuildId,
        name: &str,
        pairs: &[(ChannelId, MessageId)],
    ) -> Result<bool, StoreError> {
        let name = name.to_lowercase();
        let mut link_lists = self.stored_links(guild)?;
        if link_lists.contains_key(&name) {
            return Ok(false);
        }
        link_lists.insert(
            name,
            pairs.iter().map(|(c, m)| pair_key(*c, *m)).collect(),
        );
        self.store
            .set(COG_NAME, &Scope::Guild(guild), LINKS_KEY, &link_lists)?;
        self.rebuild_links(guild)?;
        Ok(true)
    }

    /// Remove a link group by name. Returns `false` when absent.
    pub fn unlink(&self, guild: GuildId, name: &str) -> Result<bool, StoreError> {
        let name = name.to_lowercase();
        let mut link_lists = self.stored_links(guild)?;
        if link_lists.remove(&name).is_none() {
            return Ok(false);
        }
        self.store
            .set(COG_NAME, &Scope::Guild(guild), LINKS_KEY, &link_lists)?;
        self.rebuild_links(guild)?;
        Ok(true)
    }

    /// Stored link groups, name → pair list, for listing.
    pub fn link_groups(&self, guild: GuildId) -> Result<HashMap<String, Vec<String>>, StoreError> {
        self.stored_links(guild)
    }

    fn stored_links(&self, guild: GuildId) -> Result<HashMap<String, Vec<String>>, StoreError> {
        Ok(self
            .store
            .get(COG_NAME, &Scope::Guild(guild), LINKS_KEY)?
            .unwrap_or_default())
    }

    /// Recompute the guild's pair → linked-role-union cache from stored
    /// link lists and the current binding cache.
    fn rebuild_links(&self, guild: GuildId) -> Result<(), StoreError> {
        let link_lists = self.stored_links(guild)?;
        let mut pair_roles: HashMap<String, HashSet<RoleId>> = HashMap::new();
        for pairs in link_lists.values() {
            let mut group_roles: HashSet<RoleId> = HashSet::new();
            for pair in pairs {
                if let Some((channel, message)) = parse_pair(pair) {
                    group_roles.extend(
                        self.message_roles(guild, channel, message)
                            .into_iter()
                            .map(|(_, role)| role),
                    );
                }
            }
            for pair in pairs {
                pair_roles.insert(pair.clone(), group_roles.clone());
            }
        }
        if pair_roles.is_empty() {
            self.links.remove(&guild);
        } else {
            self.links.insert(guild, pair_roles);
        }
        Ok(())
    }
}

fn parse_pair(pair: &str) -> Option<(ChannelId, MessageId)> {
    let (channel, message) = pair.split_once('_')?;
    Some((
        ChannelId(channel.parse().ok()?),
        MessageId(message.parse().ok()?),
    ))
}

fn parse_message_scope(scope_id: &str) -> Option<(GuildId, ChannelId, MessageId)> {
    let mut parts = scope_id.splitn(3, '_');
    let guild = parts.next()?.parse().ok()?;
    let channel = parts.next()?.parse().ok()?;
    let message = parts.next()?.parse().ok()?;
    Some((GuildId(guild), ChannelId(channel), MessageId(message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: GuildId = GuildId(1);
    const C: ChannelId = ChannelId(10);
    const M1: MessageId = MessageId(100);
    const M2: MessageId = MessageId(200);

    fn bindings() -> RoleBindings {
        RoleBindings::new(Arc::new(ConfigStore::open_in_memory().unwrap()))
    }

    #[test]
    fn bind_and_lookup() {
        let b = bindings();
        assert!(b.bind(G, C, M1, "🎂", RoleId(5)).unwrap());
        assert_eq!(b.find_role(G, C, M1, "🎂"), Some(RoleId(5)));
        assert_eq!(b.find_role(G, C, M1, "🎉"), None);
    }

    #[test]
    fn double_bind_is_rejected() {
        let b = bindings();
        assert!(b.bind(G, C, M1, "🎂", RoleId(5)).unwrap());
        assert!(!b.bind(G, C, M1, "🎂", RoleId(6)).unwrap());
        assert_eq!(b.find_role(G, C, M1, "🎂"), Some(RoleId(5)));
    }

    #[test]
    fn unbind_returns_emoji_key() {
        let b = bindings();
        b.bind(G, C, M1, "🎂", RoleId(5)).unwrap();
        assert_eq!(b.unbind(G, C, M1, RoleId(5)).unwrap().as_deref(), Some("🎂"));
        assert_eq!(b.unbind(G, C, M1, RoleId(5)).unwrap(), None);
        assert_eq!(b.find_role(G, C, M1, "🎂"), None);
    }

    #[test]
    fn linked_messages_share_role_union() {
        let b = bindings();
        b.bind(G, C, M1, "🎂", RoleId(5)).unwrap();
        b.bind(G, C, M2, "🎉", RoleId(6)).unwrap();
        assert!(b.link(G, "colours", &[(C, M1), (C, M2)]).unwrap());

        let linked = b.linked_roles(G, C, M1);
        assert!(linked.contains(&RoleId(5)));
        assert!(linked.contains(&RoleId(6)));
        assert!(b.is_linked(G, C, M2));
    }

    #[test]
    fn link_name_collision_rejected() {
        let b = bindings();
        assert!(b.link(G, "dupe", &[(C, M1)]).unwrap());
        assert!(!b.link(G, "DUPE", &[(C, M2)]).unwrap());
    }

    #[test]
    fn unlink_clears_cache() {
        let b = bindings();
        b.bind(G, C, M1, "🎂", RoleId(5)).unwrap();
        b.link(G, "solo", &[(C, M1)]).unwrap();
        assert!(b.unlink(G, "solo").unwrap());
        assert!(!b.is_linked(G, C, M1));
        assert!(!b.unlink(G, "solo").unwrap());
    }

    #[test]
    fn remove_message_scrubs_bindings_and_links() {
        let b = bindings();
        b.bind(G, C, M1, "🎂", RoleId(5)).unwrap();
        b.bind(G, C, M2, "🎉", RoleId(6)).unwrap();
        b.link(G, "group", &[(C, M1), (C, M2)]).unwrap();

        b.remove_message(G, C, M1).unwrap();
        assert_eq!(b.find_role(G, C, M1, "🎂"), None);
        assert!(!b.is_linked(G, C, M1));
        // The surviving message keeps its (now smaller) link group.
        assert_eq!(b.link_groups(G).unwrap()["group"], vec![pair_key(C, M2)]);
    }

    #[test]
    fn load_rehydrates_from_store() {
        let store = Arc::new(ConfigStore::open_in_memory().unwrap());
        {
            let b = RoleBindings::new(Arc::clone(&store));
            b.bind(G, C, M1, "🎂", RoleId(5)).unwrap();
            b.bind(G, C, M2, "🎉", RoleId(6)).unwrap();
            b.link(G, "group", &[(C, M1), (C, M2)]).unwrap();
        }
        let fresh = RoleBindings::new(store);
        fresh.load().unwrap();
        assert_eq!(fresh.find_role(G, C, M1, "🎂"), Some(RoleId(5)));
        assert!(fresh.linked_roles(G, C, M2).contains(&RoleId(5)));
    }
}
