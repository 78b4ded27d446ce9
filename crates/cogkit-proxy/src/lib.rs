//! `cogkit-proxy` — send and edit messages through the bot.
//!
//! Sending with content goes through a placeholder-then-edit dance: the
//! bot first posts the literal text `Placeholder` and then edits it to the
//! real content, so mass mentions in the content never fire a ping.
//! Attachments are downloaded and re-uploaded as the bot's own file. The
//! reply after a content send is the pre-formed edit command for that
//! message, ready to copy.

pub mod cog;
pub mod error;

pub use cog::{Attachment, ProxyCog};
pub use error::ProxyError;
