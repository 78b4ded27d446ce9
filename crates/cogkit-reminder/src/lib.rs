//! `cogkit-reminder` — personal reminders delivered by direct message.
//!
//! A user asks to be reminded of some text after a duration like `10m30s`
//! or `1y1mo2w5d10h30m15s`. Reminders survive restarts: they are persisted
//! in the config store and resumed on load, firing immediately when their
//! deadline passed while the process was down.

pub mod cog;
pub mod parse;

pub use cog::ReminderCog;
pub use parse::parse_duration;
