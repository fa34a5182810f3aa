//! Popup window value objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::branding;

/// Reference to an externally-owned authorization window.
///
/// The window itself belongs to the host (and the user); the handle only
/// identifies it for polling and closing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PopupHandle {
    pub id: Uuid,
    pub opened_at: DateTime<Utc>,
}

impl PopupHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            opened_at: Utc::now(),
        }
    }
}

impl Default for PopupHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Window creation hints passed to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupFeatures {
    /// Window name; reusing it makes the host reuse a still-open window
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Default for PopupFeatures {
    fn default() -> Self {
        Self {
            name: branding::POPUP_WINDOW_NAME.to_string(),
            width: 600,
            height: 700,
        }
    }
}

impl PopupFeatures {
    /// `(left, top)` that centers the popup over a parent of the given size
    pub fn centered_within(&self, parent_width: u32, parent_height: u32) -> (u32, u32) {
        (
            parent_width.saturating_sub(self.width) / 2,
            parent_height.saturating_sub(self.height) / 2,
        )
    }

    /// Feature string in `window.open` syntax
    pub fn to_feature_string(&self, parent_width: u32, parent_height: u32) -> String {
        let (left, top) = self.centered_within(parent_width, parent_height);
        format!(
            "width={},height={},left={},top={},popup=yes",
            self.width, self.height, left, top
        )
    }
}
