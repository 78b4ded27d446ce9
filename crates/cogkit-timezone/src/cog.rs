//! Conversion replies and alias management.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use tracing::info;

use cogkit_core::embed::colour;
use cogkit_core::{Cog, CogError, ConfigStore, Embed, Scope};

use crate::clock::{
    self, find_timezone, parse_time, zone_display, TimeInput, TimeInputError,
};

const COG_NAME: &str = "timezone";
const ALIASES_KEY: &str = "aliases";
const LIST_OF_TZ: &str =
    "For a list of timezones: <https://en.wikipedia.org/wiki/List_of_tz_database_time_zones>";

pub struct TimezoneCog {
    store: Arc<ConfigStore>,
}

impl TimezoneCog {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    /// Convert `time` from one zone to another, or report the current time
    /// in a single zone. All failure modes become user replies.
    pub fn convert(
        &self,
        prefix: &str,
        time: &str,
        zone1: &str,
        zone2: Option<&str>,
    ) -> Result<String, CogError> {
        if time.is_empty() || zone1.is_empty() || zone2 == Some("") {
            return Ok(usage(prefix));
        }
        let aliases = self.aliases()?;
        let Some(zone2) = zone2 else {
            if time.eq_ignore_ascii_case("now") {
                let Some((name, tz)) = resolve_zone(&aliases, zone1) else {
                    return Ok(format!(":x: Invalid __source__ timezone. {LIST_OF_TZ}"));
                };
                let (hours, minutes) = clock::zone_time(tz);
                return Ok(format!(
                    "It is {} in **{name}** right now.",
                    clock::format_hours_minutes(hours, minutes)
                ));
            }
            return Ok(usage(prefix));
        };
        if time == "to" && zone1 == "stop" {
            return Ok("http://imgur.com/CoWZ05t.gif".to_string());
        }
        let parsed = match parse_time(time) {
            Ok(parsed) => parsed,
            Err(TimeInputError::Format) => {
                return Ok(":x: Invalid time format. Use now, 0am or 00:00.".to_string())
            }
            Err(TimeInputError::MoreThan24Hours) => {
                return Ok(
                    ":x: Invalid time. How do you have more than 24h in your day?".to_string(),
                )
            }
        };
        let Some((src_name, src)) = resolve_zone(&aliases, zone1) else {
            return Ok(format!(":x: Invalid __source__ timezone. {LIST_OF_TZ}"));
        };
        let Some((dst_name, dst)) = resolve_zone(&aliases, zone2) else {
            return Ok(format!(":x: Invalid __destination__ timezone. {LIST_OF_TZ}"));
        };

        let (hours, minutes) = match parsed {
            TimeInput::Now => clock::zone_time(src),
            TimeInput::At { hours, minutes } => (hours, minutes),
        };
        let delta = clock::zone_delta_minutes(src, dst);
        let total = (hours as i32 * 60 + minutes as i32 + delta).rem_euclid(24 * 60);
        let (dest_hours, dest_minutes) = ((total / 60) as u32, (total % 60) as u32);
        let sign = if delta < 0 { '-' } else { '+' };
        Ok(format!(
            "{} in **{src_name}** is equal to {} in **{dst_name}** ({sign}{}:{:02})",
            clock::format_hours_minutes(hours, minutes),
            clock::format_hours_minutes(dest_hours, dest_minutes),
            delta.abs() / 60,
            delta.abs() % 60,
        ))
    }

    /// Register `alias` for a zone. Names shadowing a real zone or an
    /// existing alias are rejected, as are names with spaces.
    pub fn alias_add(&self, alias: &str, zone: &str) -> Result<String, CogError> {
        if alias.contains(' ') || zone.contains(' ') {
            return Ok(":x: There cannot be spaces in aliases and timezones.".to_string());
        }
        let alias = alias.to_lowercase();
        let mut aliases = self.aliases()?;
        if aliases.contains_key(&alias) {
            return Ok(
                ":x: The alias already exists. Consider removing it before re-adding it."
                    .to_string(),
            );
        }
        if find_timezone(&alias).is_some() {
            return Ok(
                ":x: A timezone already has this name. Consider changing your alias' name."
                    .to_string(),
            );
        }
        let Some(tz) = find_timezone(&zone.to_lowercase()) else {
            return Ok(format!(":x: The timezone doesn't exist. {LIST_OF_TZ}"));
        };
        let zone_name = tz.name().to_string();
        aliases.insert(alias.clone(), zone_name.clone());
        self.store
            .set(COG_NAME, &Scope::Global, ALIASES_KEY, &aliases)?;
        Ok(format!(
            ":white_check_mark: Added alias *{alias}* refering to {zone_name}."
        ))
    }

    pub fn alias_remove(&self, alias: &str) -> Result<String, CogError> {
        let alias = alias.to_lowercase();
        let mut aliases = self.aliases()?;
        if aliases.remove(&alias).is_none() {
            return Ok(format!(
                ":x: Cannot remove alias *{alias}* because it doesn't exist."
            ));
        }
        self.store
            .set(COG_NAME, &Scope::Global, ALIASES_KEY, &aliases)?;
        Ok(format!(":white_check_mark: Removed alias *{alias}*."))
    }

    /// Two-column code-block listing of every alias.
    pub fn alias_list(&self) -> Result<Embed, CogError> {
        let aliases = self.aliases()?;
        let embed = Embed::new().title("Alias List").colour(colour::LIGHT_GREY);
        if aliases.is_empty() {
            return Ok(embed.description("No aliases to be listed."));
        }
        let mut items: Vec<_> = aliases.into_iter().collect();
        items.sort();
        let half = items.len().div_ceil(2);
        let mut description = String::from("```\n");
        for i in 0..half {
            let left = format!("{} → {}", items[i].0, items[i].1);
            let right = items
                .get(i + half)
                .map(|(a, z)| format!("{a} → {z}"))
                .unwrap_or_default();
            description.push_str(&format!("{left:<30}  {right:<30}\n"));
        }
        description.push_str("```");
        Ok(embed.description(description))
    }

    pub fn zone_list_link(&self) -> &'static str {
        LIST_OF_TZ
    }

    fn aliases(&self) -> Result<HashMap<String, String>, CogError> {
        Ok(self
            .store
            .get(COG_NAME, &Scope::Global, ALIASES_KEY)?
            .unwrap_or_default())
    }
}

fn usage(prefix: &str) -> String {
    format!(
        ":x: Invalid command.\n\
         Usage: `{prefix}time <time> <timezone1> [timezone2]`\n\
         Where *time* is *now* or a timestamp of format 0am or 00:00 \
         and *timezone* is the name of a tz timezone.\n\
         If timezone2 is omitted, it will only respond to *now* requests."
    )
}

/// Alias lookup first, then zone lookup by last name segment.
fn resolve_zone(aliases: &HashMap<String, String>, input: &str) -> Option<(String, Tz)> {
    let input = input.to_lowercase();
    if let Some(zone_name) = aliases.get(&input) {
        let tz: Tz = zone_name.parse().ok()?;
        return Some((zone_display(zone_name).to_string(), tz));
    }
    let tz = find_timezone(&input)?;
    Some((zone_display(tz.name()).to_string(), tz))
}

#[async_trait]
impl Cog for TimezoneCog {
    fn name(&self) -> &str {
        COG_NAME
    }

    async fn load(&self) -> Result<(), CogError> {
        info!(aliases = self.aliases()?.len(), "timezone cog loaded");
        Ok(())
    }

    async fn unload(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cog() -> TimezoneCog {
        TimezoneCog::new(Arc::new(ConfigStore::open_in_memory().unwrap()))
    }

    #[test]
    fn converts_between_fixed_offset_zones() {
        let c = cog();
        // UTC and Kathmandu never observe daylight saving.
        let reply = c.convert("!", "21:00", "utc", Some("kathmandu")).unwrap();
        assert_eq!(
            reply,
            "**9 PM** (21:00) in **UTC** is equal to **2:45 AM** (2:45) in **Kathmandu** (+5:45)"
        );
    }

    #[test]
    fn negative_offsets_render_with_sign() {
        let c = cog();
        let reply = c.convert("!", "2:45", "kathmandu", Some("utc")).unwrap();
        assert_eq!(
            reply,
            "**2:45 AM** (2:45) in **Kathmandu** is equal to **9 PM** (21:00) in **UTC** (-5:45)"
        );
    }

    #[test]
    fn now_in_a_single_zone() {
        let c = cog();
        let reply = c.convert("!", "now", "abidjan", None).unwrap();
        assert!(reply.starts_with("It is **"));
        assert!(reply.ends_with("in **Abidjan** right now."));
    }

    #[test]
    fn non_now_without_destination_is_usage() {
        let c = cog();
        let reply = c.convert("!", "9pm", "utc", None).unwrap();
        assert!(reply.starts_with(":x: Invalid command."));
    }

    #[test]
    fn bad_inputs_become_replies() {
        let c = cog();
        assert!(c
            .convert("!", "whenever", "utc", Some("utc"))
            .unwrap()
            .starts_with(":x: Invalid time format."));
        assert!(c
            .convert("!", "25:00", "utc", Some("utc"))
            .unwrap()
            .starts_with(":x: Invalid time."));
        assert!(c
            .convert("!", "9pm", "atlantis", Some("utc"))
            .unwrap()
            .contains("__source__"));
        assert!(c
            .convert("!", "9pm", "utc", Some("atlantis"))
            .unwrap()
            .contains("__destination__"));
    }

    #[test]
    fn aliases_resolve_in_conversion() {
        let c = cog();
        let reply = c.alias_add("npt", "kathmandu").unwrap();
        assert_eq!(
            reply,
            ":white_check_mark: Added alias *npt* refering to Asia/Kathmandu."
        );
        let converted = c.convert("!", "21:00", "utc", Some("npt")).unwrap();
        assert!(converted.contains("in **Kathmandu**"));
    }

    #[test]
    fn alias_name_collisions_are_rejected() {
        let c = cog();
        assert!(c
            .alias_add("kathmandu", "utc")
            .unwrap()
            .starts_with(":x: A timezone already has this name."));
        c.alias_add("npt", "kathmandu").unwrap();
        assert!(c
            .alias_add("NPT", "utc")
            .unwrap()
            .starts_with(":x: The alias already exists."));
        assert!(c
            .alias_add("my zone", "utc")
            .unwrap()
            .starts_with(":x: There cannot be spaces"));
        assert!(c
            .alias_add("lost", "atlantis")
            .unwrap()
            .starts_with(":x: The timezone doesn't exist."));
    }

    #[test]
    fn alias_remove_and_list() {
        let c = cog();
        c.alias_add("npt", "kathmandu").unwrap();
        c.alias_add("abj", "abidjan").unwrap();

        let embed = c.alias_list().unwrap();
        let description = embed.description.unwrap();
        assert!(description.starts_with("```"));
        assert!(description.contains("npt → Asia/Kathmandu"));
        assert!(description.contains("abj → Africa/Abidjan"));

        assert_eq!(
            c.alias_remove("npt").unwrap(),
            ":white_check_mark: Removed alias *npt*."
        );
        assert!(c
            .alias_remove("npt")
            .unwrap()
            .starts_with(":x: Cannot remove alias"));
        let empty = cog().alias_list().unwrap();
        assert_eq!(empty.description.as_deref(), Some("No aliases to be listed."));
    }
}
