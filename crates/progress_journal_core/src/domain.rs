//! crates/progress_journal_core/src/domain.rs
//!
//! Defines the core data structures of the progress photo journal.
//! `MediaAsset` carries serde derives because its JSON form is the persistence
//! contract with the durable store; nothing here knows about HTTP or SQL.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::period::format_period_key;

/// The pose a progress photo was taken from. Closed set, never free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Front,
    Side,
    Back,
}

impl MediaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Front => "front",
            MediaCategory::Side => "side",
            MediaCategory::Back => "back",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a category label is not one of `front`, `side`, `back`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown photo category '{0}' (expected front, side or back)")]
pub struct UnknownCategory(pub String);

impl FromStr for MediaCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" => Ok(MediaCategory::Front),
            "side" => Ok(MediaCategory::Side),
            "back" => Ok(MediaCategory::Back),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// One uploaded progress photo. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub id: Uuid,
    pub category: MediaCategory,
    /// Self-contained `data:` URI holding the image bytes.
    pub payload: String,
    /// Wall-clock capture time, in the offset of the capturing device.
    pub captured_at: DateTime<FixedOffset>,
    /// "Month Year" label derived from `captured_at`; grouping key only.
    pub period_key: String,
}

impl MediaAsset {
    /// Builds a new asset captured at `captured_at` with a fresh id.
    pub fn new(category: MediaCategory, payload: String, captured_at: DateTime<FixedOffset>) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            payload,
            period_key: format_period_key(&captured_at),
            captured_at,
        }
    }
}

/// An opaque file handed over by the UI, not yet decoded.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// The grouped view of one period: at most one visible asset per category.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodBucket {
    pub period_key: String,
    pub front: Option<MediaAsset>,
    pub side: Option<MediaAsset>,
    pub back: Option<MediaAsset>,
}

impl PeriodBucket {
    pub fn empty(period_key: impl Into<String>) -> Self {
        Self {
            period_key: period_key.into(),
            front: None,
            side: None,
            back: None,
        }
    }

    pub fn get(&self, category: MediaCategory) -> Option<&MediaAsset> {
        match category {
            MediaCategory::Front => self.front.as_ref(),
            MediaCategory::Side => self.side.as_ref(),
            MediaCategory::Back => self.back.as_ref(),
        }
    }

    /// Places `asset` in its category slot, replacing whatever was there.
    pub fn put(&mut self, asset: MediaAsset) {
        let slot = match asset.category {
            MediaCategory::Front => &mut self.front,
            MediaCategory::Side => &mut self.side,
            MediaCategory::Back => &mut self.back,
        };
        *slot = Some(asset);
    }
}

/// Summary figures shown next to the photo grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JournalStats {
    pub total_assets: usize,
    pub periods_tracked: usize,
    pub days_since_first: i64,
    pub current_period_count: usize,
}
