//! The cog trait and the set that dispatches host events to cogs.

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::CogError;
use crate::events::{MessageDeleteEvent, ReactionEvent};

/// Common interface implemented by every cog.
///
/// Event hooks default to no-ops so a cog only implements the events it
/// cares about. Hooks must never panic the dispatcher: errors are returned
/// and logged by [`CogSet`], not propagated.
#[async_trait]
pub trait Cog: Send + Sync {
    /// Stable lowercase identifier for this cog (e.g. `"reactroles"`).
    fn name(&self) -> &str;

    /// Hydrate caches from the store and start background tasks.
    async fn load(&self) -> Result<(), CogError>;

    /// Stop background tasks and drop transient state. In-flight work is
    /// abandoned, not persisted.
    async fn unload(&self);

    async fn on_reaction_add(&self, _event: &ReactionEvent) -> Result<(), CogError> {
        Ok(())
    }

    async fn on_reaction_remove(&self, _event: &ReactionEvent) -> Result<(), CogError> {
        Ok(())
    }

    async fn on_message_delete(&self, _event: &MessageDeleteEvent) -> Result<(), CogError> {
        Ok(())
    }

    async fn on_bulk_message_delete(&self, events: &[MessageDeleteEvent]) -> Result<(), CogError> {
        for event in events {
            self.on_message_delete(event).await?;
        }
        Ok(())
    }
}

/// Holds every registered cog and fans host events out to them.
///
/// A failing hook is logged and skipped; one cog's error never stops
/// dispatch to the others and never terminates the producer task.
#[derive(Default)]
pub struct CogSet {
    cogs: Vec<Box<dyn Cog>>,
}

impl CogSet {
    pub fn new() -> Self {
        Self { cogs: Vec::new() }
    }

    pub fn register(&mut self, cog: Box<dyn Cog>) {
        info!(cog = %cog.name(), "registering cog");
        self.cogs.push(cog);
    }

    /// Load all cogs in registration order. A cog that fails to load is
    /// logged and left registered; its event hooks stay live.
    pub async fn load_all(&self) {
        for cog in &self.cogs {
            if let Err(e) = cog.load().await {
                error!(cog = %cog.name(), error = %e, "cog failed to load");
            }
        }
    }

    pub async fn unload_all(&self) {
        for cog in &self.cogs {
            cog.unload().await;
            info!(cog = %cog.name(), "cog unloaded");
        }
    }

    pub async fn dispatch_reaction_add(&self, event: &ReactionEvent) {
        for cog in &self.cogs {
            if let Err(e) = cog.on_reaction_add(event).await {
                error!(cog = %cog.name(), error = %e, "reaction-add hook failed");
            }
        }
    }

    pub async fn dispatch_reaction_remove(&self, event: &ReactionEvent) {
        for cog in &self.cogs {
            if let Err(e) = cog.on_reaction_remove(event).await {
                error!(cog = %cog.name(), error = %e, "reaction-remove hook failed");
            }
        }
    }

    pub async fn dispatch_message_delete(&self, event: &MessageDeleteEvent) {
        for cog in &self.cogs {
            if let Err(e) = cog.on_message_delete(event).await {
                error!(cog = %cog.name(), error = %e, "message-delete hook failed");
            }
        }
    }

    pub async fn dispatch_bulk_message_delete(&self, events: &[MessageDeleteEvent]) {
        for cog in &self.cogs {
            if let Err(e) = cog.on_bulk_message_delete(events).await {
                error!(cog = %cog.name(), error = %e, "bulk-delete hook failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ChannelId, GuildId, MessageId, UserId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Failing;

    #[async_trait]
    impl Cog for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn load(&self) -> Result<(), CogError> {
            Ok(())
        }
        async fn unload(&self) {}
        async fn on_reaction_add(&self, _: &ReactionEvent) -> Result<(), CogError> {
            Err(CogError::Internal("boom".to_string()))
        }
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl Cog for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        async fn load(&self) -> Result<(), CogError> {
            Ok(())
        }
        async fn unload(&self) {}
        async fn on_reaction_add(&self, _: &ReactionEvent) -> Result<(), CogError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_cog_does_not_block_others() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut set = CogSet::new();
        set.register(Box::new(Failing));
        set.register(Box::new(Counting(Arc::clone(&count))));

        let event = ReactionEvent {
            guild_id: GuildId(1),
            channel_id: ChannelId(2),
            message_id: MessageId(3),
            user_id: UserId(4),
            emoji: crate::events::Emoji::Unicode("🎉".to_string()),
        };
        set.dispatch_reaction_add(&event).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
