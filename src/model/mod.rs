//! Dashboard Data Model
//!
//! Snapshot types, the widget payload union, the normalization pass and the
//! local model that owns the editable copy.
//!
//! ## Structure
//!
//! - **Snapshot**: groups, widgets, app config and RSS subscriptions as one
//!   persistence unit
//! - **Widget**: grid envelope plus a payload tagged by widget type
//! - **normalize**: idempotent repair of loaded snapshots
//! - **LocalModel**: the canonical in-memory copy with a logical version
//! - **Identity**: who the local copy belongs to

mod identity;
mod local;
mod normalize;
mod snapshot;
mod widget;

pub use identity::Identity;
pub use local::LocalModel;
pub use normalize::{normalize, NormalizeReport};
pub use snapshot::{AppConfig, Group, Item, NamedSnippet, RssCategory, RssFeed, Snapshot};
pub use widget::{
    ClockData, CountdownData, DockerData, IframeData, MemoData, RssData, SystemStatusData,
    TodoData, TodoEntry, WeatherData, Widget, WidgetKind, WidgetPayload,
};
