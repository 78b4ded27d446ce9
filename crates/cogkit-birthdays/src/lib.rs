//! `cogkit-birthdays` — announces birthdays and hands out a birthday role
//! for the whole UTC day.
//!
//! Dates are stored year-less, bucketed by the day-of-year ordinal of the
//! month/day in year 1, so everyone sharing a birthday lands in one
//! bucket. A single daily task wakes at UTC midnight, strips yesterday's
//! birthday roles and announces today's.

pub mod cog;
pub mod dates;

pub use cog::BirthdaysCog;
