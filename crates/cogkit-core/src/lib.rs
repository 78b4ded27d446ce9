//! `cogkit-core` — shared plumbing for every cog crate.
//!
//! A *cog* is a plugin for a guild-based chat platform. The platform client
//! itself lives in the host process; cogs reach it exclusively through the
//! collaborator traits in [`platform`]. Durable per-cog settings go through
//! the keyed [`store::ConfigStore`]; transient state stays inside each cog.

pub mod cog;
pub mod embed;
pub mod error;
pub mod events;
pub mod ids;
pub mod platform;
pub mod settings;
pub mod store;

pub use cog::{Cog, CogSet};
pub use embed::Embed;
pub use error::{CogError, Result};
pub use events::{Emoji, MessageDeleteEvent, ReactionEvent};
pub use ids::{ChannelId, GuildId, MessageId, RoleId, Subject, UserId};
pub use platform::{ChatHost, Members, Messenger, PlatformError};
pub use settings::CogkitSettings;
pub use store::{ConfigStore, Scope};
