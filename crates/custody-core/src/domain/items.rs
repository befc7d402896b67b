//! Carried items, worn slots, and the opaque possession blobs stored on a
//! Subject record when no physical container is available.

use serde::{Deserialize, Serialize};

/// A stack of carried items, identified by its kind name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Item kind name, matched against the deny-list and worn-slot fragments.
    pub kind: String,
    /// Stack size.
    pub count: u32,
}

impl Item {
    #[must_use]
    pub fn new(kind: impl Into<String>, count: u32) -> Self {
        Self {
            kind: kind.into(),
            count,
        }
    }
}

/// The four worn-equipment slots restored on exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WornSlot {
    Head,
    Torso,
    Legs,
    Feet,
}

impl WornSlot {
    pub const ALL: [WornSlot; 4] = [
        WornSlot::Head,
        WornSlot::Torso,
        WornSlot::Legs,
        WornSlot::Feet,
    ];

    /// Kind-name fragment identifying items that belong in this slot.
    #[must_use]
    pub fn kind_fragment(self) -> &'static str {
        match self {
            Self::Head => "helmet",
            Self::Torso => "chestplate",
            Self::Legs => "leg",
            Self::Feet => "boots",
        }
    }

    /// Whether an item of the given kind belongs in this slot.
    #[must_use]
    pub fn matches_kind(self, kind: &str) -> bool {
        kind.to_ascii_lowercase().contains(self.kind_fragment())
    }

    /// The slot an item of the given kind belongs in, if any.
    ///
    /// Slots are checked in `ALL` order, so a kind matching several
    /// fragments resolves to the first.
    #[must_use]
    pub fn for_kind(kind: &str) -> Option<WornSlot> {
        Self::ALL.into_iter().find(|slot| slot.matches_kind(kind))
    }
}

/// Whether an item kind is on the deny-list.
///
/// Matching is a case-insensitive containment test, so a deny-list entry of
/// `"blade"` covers every bladed kind.
#[must_use]
pub fn is_denied(kind: &str, deny_list: &[String]) -> bool {
    let kind = kind.to_ascii_lowercase();
    deny_list
        .iter()
        .any(|entry| !entry.is_empty() && kind.contains(&entry.to_ascii_lowercase()))
}

/// Serialize items into the opaque blob form stored on a Subject record.
///
/// An empty slice encodes to the empty string, the "not applicable" marker.
#[must_use]
pub fn encode_items(items: &[Item]) -> String {
    if items.is_empty() {
        return String::new();
    }
    serde_json::to_string(items).unwrap_or_default()
}

/// Decode a possession blob. The empty string decodes to no items.
pub fn decode_items(blob: &str) -> Result<Vec<Item>, serde_json::Error> {
    if blob.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(blob)
}

/// Serialize worn items, keyed by slot, into blob form.
#[must_use]
pub fn encode_worn(items: &[(WornSlot, Item)]) -> String {
    if items.is_empty() {
        return String::new();
    }
    serde_json::to_string(items).unwrap_or_default()
}

/// Decode a worn-possession blob. The empty string decodes to no items.
pub fn decode_worn(blob: &str) -> Result<Vec<(WornSlot, Item)>, serde_json::Error> {
    if blob.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(blob)
}
