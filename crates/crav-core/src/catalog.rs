//! Collector catalogs and the creator marketplace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::{CollectibleId, UserId, VendorId};

/// Which collector catalog an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectibleKind {
    /// Trading cards.
    Card,
    /// Vinyl records.
    Vinyl,
    /// Comic books.
    Comic,
}

impl CollectibleKind {
    /// Lowercase name used in storage and query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Vinyl => "vinyl",
            Self::Comic => "comic",
        }
    }
}

impl std::str::FromStr for CollectibleKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "vinyl" => Ok(Self::Vinyl),
            "comic" => Ok(Self::Comic),
            other => Err(CoreError::UnknownVariant {
                kind: "collectible kind",
                value: other.to_string(),
            }),
        }
    }
}

/// One item in a user's collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collectible {
    /// Item id.
    pub id: CollectibleId,
    /// Collector who added the item.
    pub owner_id: UserId,
    /// Catalog.
    pub kind: CollectibleKind,
    /// Card name, album or comic title.
    pub title: String,
    /// Artist, label or publisher.
    pub artist_or_publisher: Option<String>,
    /// Release or print year.
    pub year: Option<i32>,
    /// Grading or condition note.
    pub condition: Option<String>,
    /// Owner's estimate in US cents.
    pub estimated_value_cents: Option<i64>,
    /// When the item was added.
    pub created_at: DateTime<Utc>,
}

impl Collectible {
    /// Whether `query` appears in the title or artist, case-insensitively.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self
                .artist_or_publisher
                .as_ref()
                .is_some_and(|a| a.to_lowercase().contains(&query))
    }
}

/// Marketplace category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// URL slug; primary key.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Display order, ascending.
    pub sort_order: i32,
}

/// A vendor listed in the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    /// Vendor id.
    pub id: VendorId,
    /// Display name.
    pub name: String,
    /// Category slug.
    pub category_slug: String,
    /// Vendor website.
    pub website: Option<String>,
    /// Short pitch.
    pub description: String,
    /// Reviewed by staff.
    pub verified: bool,
    /// When the vendor was listed.
    pub created_at: DateTime<Utc>,
}

/// Validate a non-empty trimmed text field with a length cap.
///
/// # Errors
///
/// `InvalidInput` naming `field` when the value is blank or too long.
pub fn require_text(field: &str, value: &str, max_chars: usize) -> Result<(), CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max_chars {
        return Err(CoreError::InvalidInput(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(())
}
