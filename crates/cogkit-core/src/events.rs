//! Raw event payloads delivered by the host's event dispatcher.
//!
//! Delivery order is not guaranteed to match click order under load; cogs
//! that care about convergence must coalesce rather than order.

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, GuildId, MessageId, UserId};

/// An emoji as seen on a reaction: either a unicode literal or a custom
/// guild emote identified by its numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emoji {
    /// A plain unicode emoji, stored verbatim (e.g. `"🎂"`).
    Unicode(String),
    /// A custom emote. Only the id matters for identity; the name is kept
    /// for display.
    Custom { id: u64, name: String },
}

impl Emoji {
    /// Stable string key used when persisting emoji→role bindings: the id
    /// digits for custom emotes, the literal for unicode emoji.
    pub fn key(&self) -> String {
        match self {
            Emoji::Unicode(s) => s.clone(),
            Emoji::Custom { id, .. } => id.to_string(),
        }
    }

    /// Parse operator input: either the `<a?:name:id>` mention form of a
    /// custom emote, a bare emote id, or a unicode emoji.
    pub fn parse(input: &str) -> Emoji {
        let trimmed = input.trim();
        if let Some(inner) = trimmed
            .strip_prefix("<a:")
            .or_else(|| trimmed.strip_prefix("<:"))
            .and_then(|rest| rest.strip_suffix('>'))
        {
            if let Some((name, id)) = inner.rsplit_once(':') {
                if let Ok(id) = id.parse::<u64>() {
                    return Emoji::Custom {
                        id,
                        name: name.to_string(),
                    };
                }
            }
        }
        if trimmed.chars().all(|c| c.is_ascii_digit()) && !trimmed.is_empty() {
            if let Ok(id) = trimmed.parse::<u64>() {
                return Emoji::Custom {
                    id,
                    name: String::new(),
                };
            }
        }
        Emoji::Unicode(trimmed.to_string())
    }
}

impl std::fmt::Display for Emoji {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Emoji::Unicode(s) => write!(f, "{s}"),
            Emoji::Custom { id, name } => write!(f, "<:{name}:{id}>"),
        }
    }
}

/// A reaction was added to or removed from a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub emoji: Emoji,
}

/// A message was deleted (singly, or as one entry of a bulk delete).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeleteEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_custom_emote_mention() {
        let e = Emoji::parse("<:party:123456789>");
        assert_eq!(
            e,
            Emoji::Custom {
                id: 123456789,
                name: "party".to_string()
            }
        );
        assert_eq!(e.key(), "123456789");
    }

    #[test]
    fn parse_animated_emote_mention() {
        let e = Emoji::parse("<a:spin:42>");
        assert!(matches!(e, Emoji::Custom { id: 42, .. }));
    }

    #[test]
    fn parse_bare_id_is_custom() {
        assert!(matches!(Emoji::parse("987"), Emoji::Custom { id: 987, .. }));
    }

    #[test]
    fn parse_unicode_passthrough() {
        let e = Emoji::parse("🎂");
        assert_eq!(e, Emoji::Unicode("🎂".to_string()));
        assert_eq!(e.key(), "🎂");
    }

    #[test]
    fn malformed_mention_falls_back_to_unicode() {
        assert!(matches!(Emoji::parse("<:broken>"), Emoji::Unicode(_)));
    }
}
