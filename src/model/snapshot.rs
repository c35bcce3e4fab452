//! Snapshot Types
//!
//! The snapshot is the unit of persistence and comparison: everything the
//! dashboard synchronizes with the server, serialized as one JSON document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::widget::Widget;

/// A bookmark group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Group {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// A group with neither a title nor items carries no information
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() || !self.items.is_empty()
    }
}

/// A bookmark inside a group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lan_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            ..Default::default()
        }
    }
}

/// A named user script or stylesheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedSnippet {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_snippet_enabled")]
    pub enabled: bool,
}

fn default_snippet_enabled() -> bool {
    true
}

/// Presentation and behavior settings
///
/// Opaque to the sync core apart from the legacy fields that the
/// normalization pass migrates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Legacy single script, superseded by `custom_scripts`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_script: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_scripts: Vec<NamedSnippet>,
    /// Legacy single stylesheet, superseded by `custom_styles`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_css: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_styles: Vec<NamedSnippet>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An RSS subscription
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RssFeed {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default = "default_feed_enabled")]
    pub enable: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_feed_enabled() -> bool {
    true
}

/// A category grouping RSS feeds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RssCategory {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full synchronized dashboard state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(default)]
    pub app_config: AppConfig,
    #[serde(default)]
    pub rss_feeds: Vec<RssFeed>,
    #[serde(default)]
    pub rss_categories: Vec<RssCategory>,
}

impl Snapshot {
    /// Canonical serialized form used for persistence and comparison
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn widget(&self, id: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn widget_mut(&mut self, id: &str) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.id == id)
    }

    pub fn group_mut(&mut self, id: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == id)
    }
}
