//! Content identifiers and catalog entries.

use serde::{Deserialize, Serialize};

use crate::{window_charge, Amount, WINDOW_SECONDS};

/// Opaque identifier of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Create a new content ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A content item as returned by the catalog lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Content identifier.
    pub id: ContentId,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Price in minor units per second of playback.
    #[serde(rename = "price_per_second")]
    pub price_per_second_minor: Amount,
    /// Reference handed to the playback element.
    #[serde(rename = "playback_url", default)]
    pub playback_reference: String,
    /// Total length of the item, when known.
    #[serde(default)]
    pub duration_seconds: u64,
}

impl Content {
    /// Price of one full credit window.
    pub fn window_price(&self) -> Option<Amount> {
        window_charge(self.price_per_second_minor, WINDOW_SECONDS)
    }

    /// Number of windows needed to play the whole item (rounded up).
    pub fn window_count(&self) -> u64 {
        self.duration_seconds.div_ceil(WINDOW_SECONDS)
    }
}
