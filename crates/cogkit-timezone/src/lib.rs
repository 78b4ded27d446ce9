//! `cogkit-timezone` — convert times between tz-database timezones.
//!
//! Zones are addressed by the last segment of their tz name (`Abidjan`
//! finds `Africa/Abidjan`) or by a stored alias. Conversion works on the
//! zones' current UTC offsets, so daylight saving is accounted for as of
//! the moment of the request.

pub mod clock;
pub mod cog;

pub use clock::{find_timezone, parse_time, TimeInput};
pub use cog::TimezoneCog;
