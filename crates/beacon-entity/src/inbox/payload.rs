//! Structured notification content stored with each inbox message.

use std::collections::BTreeMap;
use std::fmt;

use beacon_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::push::{CampaignType, GatewaySource};

code_enum! {
    /// Kind of attached media.
    pub enum MediaKind {
        Image = 0 => "image",
        Gif = 1 => "gif",
        Audio = 2 => "audio",
        Video = 3 => "video",
    }
}

/// A remote media attachment and, once downloaded, its local copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    /// Remote URL.
    pub url: String,
    /// Media kind.
    pub kind: MediaKind,
    /// Local file path after a completed download.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
}

impl MediaReference {
    /// Reference a remote image.
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Image,
            local_path: None,
        }
    }
}

/// One card of a carousel notification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CarouselItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deeplink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaReference>,
}

/// Content of an inbox notification.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Headline.
    #[serde(default)]
    pub title: String,
    /// Secondary headline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Message text.
    #[serde(default)]
    pub body: String,
    /// Top-level media attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaReference>,
    /// Ordered carousel cards.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub carousel: Vec<CarouselItem>,
    /// URL opened when the message is clicked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deeplink: Option<String>,
    /// Application key/value data delivered with the deeplink.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_payload: BTreeMap<String, Value>,
    /// Delivering gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<GatewaySource>,
    /// Campaign kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_type: Option<CampaignType>,
}

/// Position of a media reference inside a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaSlot {
    /// The top-level media attachment.
    Main,
    /// The media of the carousel card at this index.
    Carousel(usize),
}

impl MediaSlot {
    /// Slot for an optional carousel index.
    pub fn from_index(carousel_index: Option<usize>) -> Self {
        carousel_index.map_or(Self::Main, Self::Carousel)
    }

    /// Key used for the transient download-progress map.
    pub fn key(&self) -> String {
        match self {
            Self::Main => "media".to_string(),
            Self::Carousel(index) => format!("carousel:{index}"),
        }
    }

    /// Inverse of [`MediaSlot::key`].
    pub fn parse_key(key: &str) -> Option<Self> {
        if key == "media" {
            return Some(Self::Main);
        }
        key.strip_prefix("carousel:")?.parse().ok().map(Self::Carousel)
    }
}

impl fmt::Display for MediaSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl NotificationPayload {
    /// The media reference at `slot`, if present.
    pub fn media_at(&self, slot: MediaSlot) -> Option<&MediaReference> {
        match slot {
            MediaSlot::Main => self.media.as_ref(),
            MediaSlot::Carousel(index) => self.carousel.get(index)?.media.as_ref(),
        }
    }

    /// Every slot that carries a media reference.
    pub fn media_slots(&self) -> Vec<MediaSlot> {
        let main = self.media.as_ref().map(|_| MediaSlot::Main);
        let cards = self
            .carousel
            .iter()
            .enumerate()
            .filter(|(_, item)| item.media.is_some())
            .map(|(index, _)| MediaSlot::Carousel(index));
        main.into_iter().chain(cards).collect()
    }

    /// Record the local path of the media at `slot`, touching nothing else.
    pub fn set_local_path(&mut self, slot: MediaSlot, path: impl Into<String>) -> AppResult<()> {
        let media = match slot {
            MediaSlot::Main => self.media.as_mut(),
            MediaSlot::Carousel(index) => {
                let len = self.carousel.len();
                let item = self.carousel.get_mut(index).ok_or_else(|| {
                    AppError::not_found(format!(
                        "carousel index {index} out of bounds (len {len})"
                    ))
                })?;
                item.media.as_mut()
            }
        };
        let media =
            media.ok_or_else(|| AppError::not_found(format!("no media reference at {slot}")))?;
        media.local_path = Some(path.into());
        Ok(())
    }
}
