//! Rich-message payload handed to [`Messenger`](crate::platform::Messenger).
//!
//! Deliberately minimal: title, description, colour and name/value fields
//! cover everything the cogs render. Mapping onto the platform's native
//! embed type is the host's job.

use serde::{Deserialize, Serialize};

/// Colours used across the cogs, as 0xRRGGBB.
pub mod colour {
    pub const GOLD: u32 = 0xf1c40f;
    pub const BLUE: u32 = 0x3498db;
    pub const LIGHT_GREY: u32 = 0x979c9f;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub colour: Option<u32>,
    /// (name, value) pairs rendered as embed fields, in order.
    pub fields: Vec<(String, String)>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn colour(mut self, colour: u32) -> Self {
        self.colour = Some(colour);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}
